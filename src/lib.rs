pub mod annotations;
pub mod blocks;
pub mod config;
mod error;
pub mod flow;
pub mod fonts;
pub mod images;
pub mod media;
pub mod metrics;
pub mod model;
pub mod pdf;

pub use config::{Config, IconMode};
pub use error::Error;
pub use model::Document;

use std::path::Path;
use std::time::Instant;

use blocks::BlockBuilder;
use flow::{FlowEngine, Layout};
use fonts::FontLibrary;
use media::{NoFetch, PosterFetcher};
use metrics::Metrics;
use pdf::{PageSink, PdfSink, write_layout};

/// One configured conversion pipeline. Nothing is shared between calls.
pub struct Converter {
    config: Config,
    fetcher: Box<dyn PosterFetcher>,
}

impl Converter {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let fetcher = default_fetcher(&config);
        Ok(Self { config, fetcher })
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn PosterFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve and paginate `doc` without serializing it.
    pub fn layout(&self, doc: &Document, fonts: &FontLibrary) -> Result<Layout, Error> {
        let t0 = Instant::now();
        let mut builder = BlockBuilder::new(&self.config, doc.base_dir.as_deref(), self.fetcher.as_ref());
        let fragments = builder.build(doc)?;
        let t_resolve = t0.elapsed();

        let metrics = Metrics::new(fonts, self.config.fallback_em());
        let mut engine = FlowEngine::new(self.config.page, &metrics);
        engine.place_all(&fragments)?;
        let layout = engine.finalize()?;
        drop(engine);
        metrics.finish();
        let t_layout = t0.elapsed();

        log::info!(
            "Timing: resolve={:.1}ms ({} fragments), layout={:.1}ms ({} pages)",
            t_resolve.as_secs_f64() * 1000.0,
            fragments.len(),
            (t_layout - t_resolve).as_secs_f64() * 1000.0,
            layout.pages.len(),
        );
        Ok(layout)
    }

    /// Lay out `doc` and replay it into `sink`.
    pub fn render_with(&self, doc: &Document, fonts: &FontLibrary, sink: &mut dyn PageSink) -> Result<Vec<u8>, Error> {
        let layout = self.layout(doc, fonts)?;
        write_layout(layout, sink)
    }

    /// Full conversion to PDF bytes.
    pub fn render(&self, doc: &Document) -> Result<Vec<u8>, Error> {
        let fonts = FontLibrary::load(&self.config.fonts)?;
        let mut sink = PdfSink::new(&fonts).with_title(doc.title.clone());
        self.render_with(doc, &fonts, &mut sink)
    }
}

#[cfg(feature = "net")]
fn default_fetcher(config: &Config) -> Box<dyn PosterFetcher> {
    if config.allow_uri_read {
        Box::new(media::HttpFetcher::new(std::time::Duration::from_millis(
            config.fetch_timeout_ms,
        )))
    } else {
        Box::new(NoFetch)
    }
}

#[cfg(not(feature = "net"))]
fn default_fetcher(config: &Config) -> Box<dyn PosterFetcher> {
    if config.allow_uri_read {
        log::warn!("allow_uri_read is set but this build has no network support");
    }
    Box::new(NoFetch)
}

/// Convert a JSON document tree at `input` into a PDF at `output`.
/// Relative targets resolve against the input's directory unless the
/// document names a base directory. The output is written only on success.
pub fn convert_json_to_pdf(input: &Path, output: &Path, config: Config) -> Result<(), Error> {
    let t0 = Instant::now();

    let json = std::fs::read_to_string(input)?;
    let mut doc = Document::from_json(&json)?;
    if doc.base_dir.is_none() {
        doc.base_dir = input.parent().map(Path::to_path_buf);
    }
    let t_parse = t0.elapsed();

    let bytes = Converter::new(config)?.render(&doc)?;
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(())
}
