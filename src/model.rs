use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmonitionKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AdmonitionKind {
    pub fn label(self) -> &'static str {
        match self {
            AdmonitionKind::Note => "NOTE",
            AdmonitionKind::Tip => "TIP",
            AdmonitionKind::Important => "IMPORTANT",
            AdmonitionKind::Warning => "WARNING",
            AdmonitionKind::Caution => "CAUTION",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    Image,
    Video,
    Audio,
    Table,
    Admonition { variant: AdmonitionKind },
    PageBreak,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading { .. } => "heading",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::Audio => "audio",
            BlockKind::Table => "table",
            BlockKind::Admonition { .. } => "admonition",
            BlockKind::PageBreak => "page-break",
        }
    }
}

/// Inline text as delivered by the parser. Style fields left unset inherit
/// from the enclosing block.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "RunRepr")]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub size: Option<f32>,
    pub color: Option<[u8; 3]>,
    pub link: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RunRepr {
    Plain(String),
    Styled {
        text: String,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        italic: bool,
        #[serde(default)]
        monospace: bool,
        #[serde(default)]
        size: Option<f32>,
        #[serde(default)]
        color: Option<[u8; 3]>,
        #[serde(default)]
        link: Option<String>,
    },
}

impl From<RunRepr> for InlineRun {
    fn from(repr: RunRepr) -> Self {
        match repr {
            RunRepr::Plain(text) => InlineRun::plain(text),
            RunRepr::Styled {
                text,
                bold,
                italic,
                monospace,
                size,
                color,
                link,
            } => InlineRun {
                text,
                bold,
                italic,
                monospace,
                size,
                color,
                link,
            },
        }
    }
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }

    pub fn sized(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn linked(mut self, uri: impl Into<String>) -> Self {
        self.link = Some(uri.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub runs: Vec<InlineRun>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub header: bool,
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default)]
    pub runs: Vec<InlineRun>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub children: Vec<ContentBlock>,
}

impl ContentBlock {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            runs: Vec::new(),
            target: None,
            title: None,
            attributes: BTreeMap::new(),
            rows: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn paragraph(runs: Vec<InlineRun>) -> Self {
        Self {
            runs,
            ..Self::new(BlockKind::Paragraph)
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self {
            runs: vec![InlineRun::plain(text)],
            ..Self::new(BlockKind::Heading { level })
        }
    }

    pub fn image(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(BlockKind::Image)
        }
    }

    pub fn video(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(BlockKind::Video)
        }
    }

    pub fn audio(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(BlockKind::Audio)
        }
    }

    pub fn table(rows: Vec<TableRow>) -> Self {
        Self {
            rows,
            ..Self::new(BlockKind::Table)
        }
    }

    pub fn admonition(variant: AdmonitionKind, children: Vec<ContentBlock>) -> Self {
        Self {
            children,
            ..Self::new(BlockKind::Admonition { variant })
        }
    }

    pub fn page_break() -> Self {
        Self::new(BlockKind::PageBreak)
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: Option<String>,
    /// Directory that relative image and media targets resolve against.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    pub blocks: Vec<ContentBlock>,
}

impl Document {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self {
            title: None,
            base_dir: None,
            blocks,
        }
    }

    pub fn from_json(input: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Position of a block in the document tree, used to attribute errors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockId(pub Vec<usize>);

impl BlockId {
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", idx + 1)?;
        }
        Ok(())
    }
}
