mod images;
mod recording;
mod sink;

pub use recording::{RecordingSink, SinkCall};
pub use sink::PdfSink;

use crate::annotations::LinkRect;
use crate::error::Error;
use crate::flow::{Layout, Placed, PlacedImage, PlacedRule, PlacedText};

/// Output backend for a finished layout.
pub trait PageSink {
    fn start_page(&mut self, width: f32, height: f32) -> Result<(), Error>;
    fn draw_text(&mut self, text: &PlacedText) -> Result<(), Error>;
    fn draw_image(&mut self, image: &PlacedImage) -> Result<(), Error>;
    fn draw_rule(&mut self, rule: &PlacedRule) -> Result<(), Error>;
    fn attach_annotation(&mut self, rect: LinkRect, uri: &str) -> Result<(), Error>;
    /// Completes the document. Callable once.
    fn finish(&mut self) -> Result<Vec<u8>, Error>;
}

/// Replays `layout` into `sink` page by page, attaching each page's links
/// after its content.
pub fn write_layout(layout: Layout, sink: &mut dyn PageSink) -> Result<Vec<u8>, Error> {
    let Layout { pages, mut links } = layout;
    for page in &pages {
        sink.start_page(page.width, page.height)?;
        for item in &page.items {
            match item {
                Placed::Text(text) => sink.draw_text(text)?,
                Placed::Image(image) => sink.draw_image(image)?,
                Placed::Rule(rule) => sink.draw_rule(rule)?,
            }
        }
        for annotation in links.drain(page.number) {
            sink.attach_annotation(annotation.rect, &annotation.uri)?;
        }
    }
    if !links.is_empty() {
        log::warn!("{} link(s) refer to pages that do not exist", links.len());
    }
    sink.finish()
}
