use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use flowpage_pdf::{Config, Error, IconMode};

#[derive(Clone, Copy, ValueEnum)]
enum Icons {
    Font,
    Text,
}

#[derive(Parser)]
#[command(name = "flowpage-pdf")]
#[command(version, about = "Lay out a JSON document tree as a paginated PDF", long_about = None)]
struct Cli {
    /// Document tree as JSON
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output PDF (defaults to INPUT with a .pdf extension)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Conversion settings as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How media and admonition icons are drawn
    #[arg(long, value_enum)]
    icons: Option<Icons>,

    /// Fetch remote posters and images
    #[arg(long)]
    allow_uri_read: bool,

    /// Extra directory searched for font families (repeatable)
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    if let Some(icons) = cli.icons {
        config.icon_mode = match icons {
            Icons::Font => IconMode::Font,
            Icons::Text => IconMode::Text,
        };
    }
    if cli.allow_uri_read {
        config.allow_uri_read = true;
    }
    config.fonts.dirs.extend(cli.font_dirs.iter().cloned());
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));
    let result = load_config(&cli)
        .and_then(|config| flowpage_pdf::convert_json_to_pdf(&cli.input, &output, config));
    match result {
        Ok(()) => {
            log::info!("wrote {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
