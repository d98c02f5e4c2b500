use std::collections::{BTreeMap, BTreeSet};

/// Rectangle in PDF page coordinates (origin bottom-left, points).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LinkRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkAnnotation {
    /// 1-based page the linked content was physically placed on.
    pub page: usize,
    pub rect: LinkRect,
    pub uri: String,
}

/// Link annotations buffered per page until the page is written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkTracker {
    by_page: BTreeMap<usize, Vec<LinkAnnotation>>,
    drained: BTreeSet<usize>,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, page: usize, rect: LinkRect, uri: impl Into<String>) {
        if self.drained.contains(&page) {
            log::warn!("link recorded for page {page} after it was written; dropped");
            return;
        }
        self.by_page.entry(page).or_default().push(LinkAnnotation {
            page,
            rect,
            uri: uri.into(),
        });
    }

    /// Annotations of `page` in placement order. Each page drains once.
    pub fn drain(&mut self, page: usize) -> Vec<LinkAnnotation> {
        self.drained.insert(page);
        self.by_page.remove(&page).unwrap_or_default()
    }

    /// Annotations of `page` still buffered.
    pub fn on_page(&self, page: usize) -> &[LinkAnnotation] {
        self.by_page.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_page.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkAnnotation> {
        self.by_page.values().flatten()
    }
}
