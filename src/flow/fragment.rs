use crate::config::Alignment;
use crate::fonts::FontKey;
use crate::images::ImageData;
use crate::model::BlockId;

/// A styled span ready for layout.
#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub text: String,
    pub font: FontKey,
    pub size: f32,
    pub color: [u8; 3],
    pub link: Option<String>,
    /// Breakable runs wrap at whitespace; others are placed whole.
    pub breakable: bool,
}

impl Run {
    pub fn text(text: impl Into<String>, font: FontKey, size: f32, color: [u8; 3]) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            color,
            link: None,
            breakable: true,
        }
    }

    pub fn atomic(text: impl Into<String>, font: FontKey, size: f32, color: [u8; 3]) -> Self {
        Self {
            breakable: false,
            ..Self::text(text, font, size, color)
        }
    }

    pub fn with_link(mut self, uri: impl Into<String>) -> Self {
        self.link = Some(uri.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdmonitionFrame {
    pub label: Vec<Run>,
    pub label_width: f32,
    pub padding: f32,
    pub rule_width: f32,
    pub rule_color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub paragraphs: Vec<Vec<Run>>,
    pub align: Alignment,
    /// Line height as a multiple of each line's largest font size.
    pub line_height: f32,
    /// Vertical gap between consecutive paragraphs.
    pub paragraph_gap: f32,
    pub indent: f32,
    pub frame: Option<AdmonitionFrame>,
}

impl TextBlock {
    pub fn single(runs: Vec<Run>, align: Alignment, line_height: f32) -> Self {
        Self {
            paragraphs: vec![runs],
            align,
            line_height,
            paragraph_gap: 0.0,
            indent: 0.0,
            frame: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    pub image: ImageData,
    pub width: f32,
    pub height: f32,
    pub align: Alignment,
    /// URI of a link annotation covering the whole image.
    pub link: Option<String>,
    pub caption: Option<TextBlock>,
    pub caption_gap: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    /// Relative column weights.
    pub columns: Vec<f32>,
    pub rows: Vec<Vec<Vec<Run>>>,
    /// Leading rows repeated at the top of each continuation page.
    pub header_rows: usize,
    pub line_height: f32,
    pub padding: f32,
    pub rule_width: f32,
    pub rule_color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub enum FragmentBody {
    Text(TextBlock),
    Image(ImageBlock),
    Table(TableBlock),
    PageBreak,
}

/// The unit the flow engine schedules.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub block: BlockId,
    pub body: FragmentBody,
    pub space_before: f32,
    pub space_after: f32,
    pub keep_together: bool,
    pub keep_with_next: bool,
}

impl Fragment {
    pub fn new(block: BlockId, body: FragmentBody) -> Self {
        Self {
            block,
            body,
            space_before: 0.0,
            space_after: 0.0,
            keep_together: false,
            keep_with_next: false,
        }
    }

    pub fn spaced(mut self, before: f32, after: f32) -> Self {
        self.space_before = before.max(0.0);
        self.space_after = after.max(0.0);
        self
    }

    pub fn kept_together(mut self) -> Self {
        self.keep_together = true;
        self
    }

    pub fn kept_with_next(mut self) -> Self {
        self.keep_with_next = true;
        self
    }

    pub fn is_splittable(&self) -> bool {
        !self.keep_together && matches!(self.body, FragmentBody::Text(_) | FragmentBody::Table(_))
    }
}
