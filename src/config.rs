use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;
use crate::model::{BlockKind, ContentBlock};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconMode {
    /// Glyphs from the configured icon font.
    Font,
    /// Plain Unicode marker characters from the base font.
    #[default]
    Text,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSource {
    Helvetica,
    Courier,
    ZapfDingbats,
    /// A TrueType/OpenType file on disk.
    File(PathBuf),
    /// A family name looked up in the font directories.
    Family(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FamilyConfig {
    pub regular: FontSource,
    #[serde(default)]
    pub bold: Option<FontSource>,
    #[serde(default)]
    pub italic: Option<FontSource>,
    #[serde(default)]
    pub bold_italic: Option<FontSource>,
}

impl FamilyConfig {
    pub fn single(source: FontSource) -> Self {
        Self {
            regular: source,
            bold: None,
            italic: None,
            bold_italic: None,
        }
    }

    /// Source for a style variant. Unset file variants fall back to the regular face;
    /// built-in and family sources carry their own style variants.
    pub fn variant(&self, bold: bool, italic: bool) -> &FontSource {
        let explicit = match (bold, italic) {
            (false, false) => None,
            (true, false) => self.bold.as_ref(),
            (false, true) => self.italic.as_ref(),
            (true, true) => self.bold_italic.as_ref().or(self.bold.as_ref()),
        };
        explicit.unwrap_or(&self.regular)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub base: FamilyConfig,
    pub mono: FamilyConfig,
    /// Icon font (e.g. a FontAwesome TTF). Without it media icons are drawn
    /// with a stand-in from the symbol face and other icons are dropped.
    pub icon: Option<FontSource>,
    /// Face for characters the other faces lack; ZapfDingbats when unset.
    pub symbol: Option<FontSource>,
    pub dirs: Vec<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            base: FamilyConfig::single(FontSource::Helvetica),
            mono: FamilyConfig::single(FontSource::Courier),
            icon: None,
            symbol: None,
            dirs: Vec::new(),
        }
    }
}

impl FontConfig {
    /// Configured directories plus those listed in `FLOWPAGE_FONTS`.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.dirs.clone();
        if let Ok(val) = std::env::var("FLOWPAGE_FONTS") {
            let sep = if cfg!(windows) { ';' } else { ':' };
            for part in val.split(sep) {
                let trimmed = part.trim();
                if !trimmed.is_empty() {
                    dirs.push(PathBuf::from(trimmed));
                }
            }
        }
        dirs
    }
}

/// Page size and margins in points.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for PageSetup {
    fn default() -> Self {
        // A4, 0.5in top / 0.67in elsewhere
        Self {
            width: 595.28,
            height: 841.89,
            margin_top: 36.0,
            margin_bottom: 48.24,
            margin_left: 48.24,
            margin_right: 48.24,
        }
    }
}

impl PageSetup {
    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    /// PDF y coordinate (bottom-up) of the top edge of the content area.
    pub fn content_top(&self) -> f32 {
        self.height - self.margin_top
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub page: PageSetup,
    pub fonts: FontConfig,
    pub base_font_size: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub heading_sizes: [f32; 6],
    pub caption_size: f32,
    pub block_gap: f32,
    pub text_color: [u8; 3],
    pub link_color: [u8; 3],
    pub admonition_label_width: f32,
    pub admonition_padding: f32,
    pub table_cell_padding: f32,
    pub rule_width: f32,
    pub rule_color: [u8; 3],
    pub icon_mode: IconMode,
    pub allow_uri_read: bool,
    pub fetch_timeout_ms: u64,
    /// Advance used for glyphs a font cannot measure, in em.
    pub fallback_glyph_width: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page: PageSetup::default(),
            fonts: FontConfig::default(),
            base_font_size: 10.5,
            line_height: 1.15,
            heading_sizes: [22.0, 18.0, 15.0, 13.0, 11.5, 10.5],
            caption_size: 9.5,
            block_gap: 12.0,
            text_color: [51, 51, 51],
            link_color: [66, 139, 202],
            admonition_label_width: 60.0,
            admonition_padding: 12.0,
            table_cell_padding: 4.0,
            rule_width: 0.5,
            rule_color: [221, 221, 221],
            icon_mode: IconMode::Text,
            allow_uri_read: false,
            fetch_timeout_ms: 10_000,
            fallback_glyph_width: 0.5,
        }
    }
}

const MIN_FALLBACK_EM: f32 = 0.05;

impl Config {
    pub fn from_json(input: &str) -> Result<Self, Error> {
        let config: Config =
            serde_json::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let p = &self.page;
        if p.content_width() <= 0.0 || p.content_height() <= 0.0 {
            return Err(Error::Config(format!(
                "page {}x{} with margins leaves no usable area",
                p.width, p.height
            )));
        }
        if self.base_font_size <= 0.0 || self.line_height <= 0.0 {
            return Err(Error::Config(
                "base_font_size and line_height must be positive".into(),
            ));
        }
        if let Some(bad) = self.heading_sizes.iter().find(|s| **s <= 0.0) {
            return Err(Error::Config(format!("heading size {bad} must be positive")));
        }
        Ok(())
    }

    /// Fallback glyph advance in em, never zero.
    pub fn fallback_em(&self) -> f32 {
        self.fallback_glyph_width.max(MIN_FALLBACK_EM)
    }

    pub fn heading_size(&self, level: u8) -> f32 {
        let idx = (level.clamp(1, 6) - 1) as usize;
        self.heading_sizes[idx]
    }
}

/// Typographic parameters of one block, resolved from the block kind and its
/// attributes before layout starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockStyle {
    pub font_size: f32,
    pub line_height: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [u8; 3],
    pub align: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub keep_together: bool,
    pub keep_with_next: bool,
}

impl BlockStyle {
    pub fn resolve(config: &Config, block: &ContentBlock) -> Self {
        let mut style = BlockStyle {
            font_size: config.base_font_size,
            line_height: config.line_height,
            bold: false,
            italic: false,
            color: config.text_color,
            align: Alignment::Left,
            space_before: 0.0,
            space_after: config.block_gap,
            keep_together: false,
            keep_with_next: false,
        };
        match &block.kind {
            BlockKind::Heading { level } => {
                style.font_size = config.heading_size(*level);
                style.line_height = 1.2;
                style.bold = true;
                style.space_before = config.block_gap;
                style.space_after = config.block_gap * 0.5;
                style.keep_with_next = true;
            }
            BlockKind::Image | BlockKind::Video | BlockKind::Audio => {
                style.align = Alignment::Center;
                style.keep_together = true;
            }
            BlockKind::Admonition { .. } | BlockKind::Table => {
                style.space_before = config.block_gap * 0.5;
            }
            BlockKind::Paragraph | BlockKind::PageBreak => {}
        }

        if let Some(value) = block.attr("align") {
            match Alignment::parse(value) {
                Some(align) => style.align = align,
                None => log::warn!(
                    "ignoring unknown align={value:?} on {} block",
                    block.kind.name()
                ),
            }
        }
        if block.attr("keep-together").is_some() {
            style.keep_together = true;
        }
        style
    }

    /// Style for captions under images and media fallbacks.
    pub fn caption(config: &Config, align: Alignment) -> Self {
        BlockStyle {
            font_size: config.caption_size,
            line_height: config.line_height,
            bold: false,
            italic: true,
            color: config.text_color,
            align,
            space_before: 0.0,
            space_after: 0.0,
            keep_together: false,
            keep_with_next: false,
        }
    }
}
