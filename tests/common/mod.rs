#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use std::fs;

use flowpage_pdf::flow::Layout;
use flowpage_pdf::fonts::FontLibrary;
use flowpage_pdf::media::{FetchError, PosterFetcher};
use flowpage_pdf::model::{ContentBlock, InlineRun};
use flowpage_pdf::pdf::RecordingSink;
use flowpage_pdf::{Config, Converter, Document};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("flowpage-{name}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// A PNG with enough detail not to compress into a placeholder-sized payload.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 ^ y * 13) as u8, (x * y) as u8, (x + y * 3) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn write_png(dir: &std::path::Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, png_bytes(width, height)).expect("write png");
    path
}

/// Serves canned bodies; every request is logged in `asked`.
#[derive(Clone, Default)]
pub struct CannedFetcher {
    responses: HashMap<String, Vec<u8>>,
    pub asked: Rc<RefCell<Vec<String>>>,
}

impl CannedFetcher {
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }
}

impl PosterFetcher for CannedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.asked.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

pub fn network_config() -> Config {
    Config {
        allow_uri_read: true,
        ..Config::default()
    }
}

pub fn layout(converter: &Converter, doc: &Document) -> Layout {
    converter
        .layout(doc, &FontLibrary::builtin())
        .expect("layout")
}

/// Lay out and replay `doc` into a recording sink using the built-in fonts.
pub fn record(converter: &Converter, doc: &Document) -> RecordingSink {
    let mut sink = RecordingSink::new();
    converter
        .render_with(doc, &FontLibrary::builtin(), &mut sink)
        .expect("render");
    sink
}

pub fn paragraph(text: &str) -> ContentBlock {
    ContentBlock::paragraph(vec![InlineRun::plain(text)])
}

/// Inflated bytes of every Flate stream in `pdf`.
pub fn inflated_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = pdf;
    while let Some(start) = find(rest, b"stream\n") {
        let body = &rest[start + b"stream\n".len()..];
        let Some(end) = find(body, b"\nendstream") else {
            break;
        };
        if let Ok(inflated) = miniz_oxide::inflate::decompress_to_vec_zlib(&body[..end]) {
            out.push(inflated);
        }
        rest = &body[end..];
    }
    out
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `count` numbered words, distinct so each can be traced through layout.
pub fn words(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}
