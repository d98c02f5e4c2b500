use thiserror::Error;

use crate::model::BlockId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(
        "block {block} needs {needed:.2}pt but an empty page only has {available:.2}pt of usable height"
    )]
    Layout {
        block: BlockId,
        needed: f32,
        available: f32,
    },
    #[error("usage error: {0}")]
    Usage(String),
    #[error("PDF error: {0}")]
    Pdf(String),
}
