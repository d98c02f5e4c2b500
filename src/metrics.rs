use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::fonts::FontKey;

/// What a measurement service reports for a string: the advance of the glyphs
/// it could measure plus the count of glyphs it could not.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawExtent {
    pub width: f32,
    pub ascent: f32,
    /// Negative below the baseline.
    pub descent: f32,
    pub missing: usize,
}

pub trait TextMeasure {
    fn measure(&self, text: &str, font: FontKey, size: f32) -> RawExtent;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dimensions {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

impl Dimensions {
    pub fn height(&self) -> f32 {
        self.ascent - self.descent
    }
}

/// Memoizing front of a [`TextMeasure`] for one conversion.
pub struct Metrics<'a> {
    service: &'a dyn TextMeasure,
    fallback_em: f32,
    cache: RefCell<HashMap<(String, FontKey, u32), Dimensions>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl<'a> Metrics<'a> {
    pub fn new(service: &'a dyn TextMeasure, fallback_em: f32) -> Self {
        Self {
            service,
            fallback_em,
            cache: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn measure(&self, text: &str, font: FontKey, size: f32) -> Dimensions {
        let key = (text.to_string(), font, size.to_bits());
        if let Some(dims) = self.cache.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            return *dims;
        }
        self.misses.set(self.misses.get() + 1);

        let raw = self.service.measure(text, font, size);
        if raw.missing > 0 {
            log::trace!("{} unmeasurable glyph(s) in {text:?} for {font:?}", raw.missing);
        }
        let dims = Dimensions {
            width: raw.width + raw.missing as f32 * self.fallback_em * size,
            ascent: raw.ascent,
            descent: raw.descent,
        };
        self.cache.borrow_mut().insert(key, dims);
        dims
    }

    pub fn width(&self, text: &str, font: FontKey, size: f32) -> f32 {
        self.measure(text, font, size).width
    }

    /// Drops the cache and logs its effectiveness.
    pub fn finish(self) {
        let entries = self.cache.borrow().len();
        log::debug!(
            "metrics cache: {} hits, {} misses, {} entries",
            self.hits.get(),
            self.misses.get(),
            entries,
        );
    }
}
