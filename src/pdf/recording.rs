use crate::annotations::LinkRect;
use crate::error::Error;
use crate::flow::{PlacedImage, PlacedRule, PlacedText};

use super::PageSink;

#[derive(Clone, Debug, PartialEq)]
pub enum SinkCall {
    StartPage { width: f32, height: f32 },
    Text(PlacedText),
    Image { x: f32, y: f32, width: f32, height: f32 },
    Rule(PlacedRule),
    Annotation { rect: LinkRect, uri: String },
    Finish,
}

/// Sink that keeps every call, for dry runs and inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
    finished: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn page_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SinkCall::StartPage { .. }))
            .count()
    }

    /// Calls grouped by page, `StartPage` excluded.
    fn per_page(&self) -> Vec<Vec<&SinkCall>> {
        let mut pages: Vec<Vec<&SinkCall>> = Vec::new();
        for call in &self.calls {
            match call {
                SinkCall::StartPage { .. } => pages.push(Vec::new()),
                SinkCall::Finish => {}
                other => {
                    if let Some(page) = pages.last_mut() {
                        page.push(other);
                    }
                }
            }
        }
        pages
    }

    /// Text strings of every run, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text strings of one 1-based page.
    pub fn page_texts(&self, page: usize) -> Vec<&str> {
        self.per_page()
            .get(page.wrapping_sub(1))
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| match c {
                        SinkCall::Text(t) => Some(t.text.as_str()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runs sharing a baseline joined into one string per visual line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for page in self.per_page() {
            let mut current: Option<(f32, String)> = None;
            for call in page {
                let SinkCall::Text(t) = call else { continue };
                let same_line = matches!(&current, Some((y, _)) if (*y - t.y).abs() < 0.01);
                if same_line {
                    if let Some((_, line)) = current.as_mut() {
                        line.push_str(&t.text);
                    }
                } else {
                    if let Some((_, line)) = current.take() {
                        lines.push(line);
                    }
                    current = Some((t.y, t.text.clone()));
                }
            }
            if let Some((_, line)) = current {
                lines.push(line);
            }
        }
        lines
    }

    /// (1-based page, rectangle, URI) of every annotation.
    pub fn annotations(&self) -> Vec<(usize, LinkRect, &str)> {
        let mut out = Vec::new();
        for (i, page) in self.per_page().into_iter().enumerate() {
            for call in page {
                if let SinkCall::Annotation { rect, uri } = call {
                    out.push((i + 1, *rect, uri.as_str()));
                }
            }
        }
        out
    }

    /// (1-based page, x, y, width, height) of every image.
    pub fn images(&self) -> Vec<(usize, f32, f32, f32, f32)> {
        let mut out = Vec::new();
        for (i, page) in self.per_page().into_iter().enumerate() {
            for call in page {
                if let SinkCall::Image {
                    x,
                    y,
                    width,
                    height,
                } = call
                {
                    out.push((i + 1, *x, *y, *width, *height));
                }
            }
        }
        out
    }

    fn record(&mut self, call: SinkCall) -> Result<(), Error> {
        if self.finished {
            return Err(Error::Usage("sink already finished".into()));
        }
        self.calls.push(call);
        Ok(())
    }
}

impl PageSink for RecordingSink {
    fn start_page(&mut self, width: f32, height: f32) -> Result<(), Error> {
        self.record(SinkCall::StartPage { width, height })
    }

    fn draw_text(&mut self, text: &PlacedText) -> Result<(), Error> {
        self.record(SinkCall::Text(text.clone()))
    }

    fn draw_image(&mut self, image: &PlacedImage) -> Result<(), Error> {
        self.record(SinkCall::Image {
            x: image.x,
            y: image.y,
            width: image.width,
            height: image.height,
        })
    }

    fn draw_rule(&mut self, rule: &PlacedRule) -> Result<(), Error> {
        self.record(SinkCall::Rule(rule.clone()))
    }

    fn attach_annotation(&mut self, rect: LinkRect, uri: &str) -> Result<(), Error> {
        self.record(SinkCall::Annotation {
            rect,
            uri: uri.to_string(),
        })
    }

    fn finish(&mut self) -> Result<Vec<u8>, Error> {
        self.record(SinkCall::Finish)?;
        self.finished = true;
        Ok(Vec::new())
    }
}
