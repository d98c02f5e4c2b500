use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::annotations::LinkRect;
use crate::error::Error;
use crate::flow::{PlacedImage, PlacedRule, PlacedText};
use crate::fonts::{EmbeddedFont, FontKey, FontLibrary};
use crate::metrics::TextMeasure;
use crate::images::ImageData;

use super::PageSink;
use super::images::embed_image;

enum Op {
    Text {
        text: String,
        font: FontKey,
        size: f32,
        color: [u8; 3],
        x: f32,
        y: f32,
    },
    Image {
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Rule(PlacedRule),
}

struct PageOps {
    width: f32,
    height: f32,
    ops: Vec<Op>,
    links: Vec<(LinkRect, String)>,
}

fn rgb(color: [u8; 3]) -> (f32, f32, f32) {
    (
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
    )
}

/// Serializes pages with `pdf-writer`. Operations are buffered so fonts can
/// be subset to exactly the characters used once the last page is known.
pub struct PdfSink<'f> {
    fonts: &'f FontLibrary,
    title: Option<String>,
    pages: Vec<PageOps>,
    images: Vec<ImageData>,
    dropped_chars: usize,
    finished: bool,
}

impl<'f> PdfSink<'f> {
    pub fn new(fonts: &'f FontLibrary) -> Self {
        Self {
            fonts,
            title: None,
            pages: Vec::new(),
            images: Vec::new(),
            dropped_chars: 0,
            finished: false,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    fn current(&mut self) -> Result<&mut PageOps, Error> {
        if self.finished {
            return Err(Error::Usage("PDF already finished".into()));
        }
        self.pages
            .last_mut()
            .ok_or_else(|| Error::Usage("drawing before the first page was started".into()))
    }

    /// Index of `image`, sharing one XObject between placements of the same data.
    fn image_index(&mut self, image: &ImageData) -> usize {
        match self
            .images
            .iter()
            .position(|known| Arc::ptr_eq(&known.data, &image.data))
        {
            Some(index) => index,
            None => {
                self.images.push(image.clone());
                self.images.len() - 1
            }
        }
    }

    fn page_content(&self, page: &PageOps, embedded: &HashMap<FontKey, EmbeddedFont>, image_names: &[String]) -> Content {
        let mut content = Content::new();
        let mut in_text = false;
        let (mut td_x, mut td_y) = (0.0f32, 0.0f32);
        let mut cur_font: Option<(FontKey, f32)> = None;
        let mut cur_color: Option<[u8; 3]> = None;

        for op in &page.ops {
            match op {
                Op::Text {
                    text,
                    font,
                    size,
                    color,
                    x,
                    y,
                } => {
                    let Some(embedded_font) = embedded.get(font) else {
                        continue;
                    };
                    let bytes = embedded_font.encode(text);
                    if bytes.is_empty() {
                        continue;
                    }
                    if !in_text {
                        content.begin_text();
                        in_text = true;
                        td_x = 0.0;
                        td_y = 0.0;
                    }
                    if cur_color != Some(*color) {
                        let (r, g, b) = rgb(*color);
                        content.set_fill_rgb(r, g, b);
                        cur_color = Some(*color);
                    }
                    if cur_font != Some((*font, *size)) {
                        content.set_font(Name(embedded_font.pdf_name.as_bytes()), *size);
                        cur_font = Some((*font, *size));
                    }
                    content.next_line(x - td_x, y - td_y);
                    td_x = *x;
                    td_y = *y;
                    content.show(Str(&bytes));
                }
                Op::Image {
                    index,
                    x,
                    y,
                    width,
                    height,
                } => {
                    if in_text {
                        content.end_text();
                        in_text = false;
                    }
                    content.save_state();
                    content.transform([*width, 0.0, 0.0, *height, *x, *y]);
                    content.x_object(Name(image_names[*index].as_bytes()));
                    content.restore_state();
                }
                Op::Rule(rule) => {
                    if in_text {
                        content.end_text();
                        in_text = false;
                    }
                    let (r, g, b) = rgb(rule.color);
                    content.save_state();
                    content.set_stroke_rgb(r, g, b);
                    content.set_line_width(rule.width);
                    content.move_to(rule.from.0, rule.from.1);
                    content.line_to(rule.to.0, rule.to.1);
                    content.stroke();
                    content.restore_state();
                }
            }
        }
        if in_text {
            content.end_text();
        }
        content
    }
}

impl PageSink for PdfSink<'_> {
    fn start_page(&mut self, width: f32, height: f32) -> Result<(), Error> {
        if self.finished {
            return Err(Error::Usage("PDF already finished".into()));
        }
        self.pages.push(PageOps {
            width,
            height,
            ops: Vec::new(),
            links: Vec::new(),
        });
        Ok(())
    }

    fn draw_text(&mut self, text: &PlacedText) -> Result<(), Error> {
        self.current()?;
        let pieces = self.fonts.split_by_face(&text.text, text.font);
        if let [single] = pieces.as_slice()
            && single.font == Some(text.font)
        {
            self.current()?.ops.push(Op::Text {
                text: text.text.clone(),
                font: text.font,
                size: text.size,
                color: text.color,
                x: text.x,
                y: text.y,
            });
            return Ok(());
        }

        // Undrawable characters keep the width layout gave them
        let widths: Vec<Option<f32>> = pieces
            .iter()
            .map(|p| p.font.map(|key| self.fonts.measure(&p.text, key, text.size).width))
            .collect();
        let drawn: f32 = widths.iter().flatten().sum();
        let missing: usize = pieces
            .iter()
            .filter(|p| p.font.is_none())
            .map(|p| p.text.chars().count())
            .sum();
        let per_missing = if missing > 0 {
            ((text.width - drawn) / missing as f32).max(0.0)
        } else {
            0.0
        };

        let mut x = text.x;
        let mut ops = Vec::with_capacity(pieces.len());
        for (piece, width) in pieces.into_iter().zip(widths) {
            match (piece.font, width) {
                (Some(font), Some(width)) => {
                    ops.push(Op::Text {
                        text: piece.text,
                        font,
                        size: text.size,
                        color: text.color,
                        x,
                        y: text.y,
                    });
                    x += width;
                }
                _ => {
                    let count = piece.text.chars().count();
                    log::trace!("no face draws {:?} in {:?}", piece.text, text.font);
                    self.dropped_chars += count;
                    x += per_missing * count as f32;
                }
            }
        }
        self.current()?.ops.extend(ops);
        Ok(())
    }

    fn draw_image(&mut self, image: &PlacedImage) -> Result<(), Error> {
        self.current()?;
        let index = self.image_index(&image.image);
        self.current()?.ops.push(Op::Image {
            index,
            x: image.x,
            y: image.y,
            width: image.width,
            height: image.height,
        });
        Ok(())
    }

    fn draw_rule(&mut self, rule: &PlacedRule) -> Result<(), Error> {
        self.current()?.ops.push(Op::Rule(rule.clone()));
        Ok(())
    }

    fn attach_annotation(&mut self, rect: LinkRect, uri: &str) -> Result<(), Error> {
        self.current()?.links.push((rect, uri.to_string()));
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, Error> {
        if self.finished {
            return Err(Error::Usage("PDF already finished".into()));
        }
        self.finished = true;
        let t0 = std::time::Instant::now();

        let mut pdf = Pdf::new();
        let mut next_id = 1i32;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };
        let catalog_id = alloc();
        let pages_id = alloc();

        // Phase 1: subset and embed every font a run was drawn in
        let mut used: BTreeMap<FontKey, HashSet<char>> = BTreeMap::new();
        for page in &self.pages {
            for op in &page.ops {
                if let Op::Text { text, font, .. } = op {
                    used.entry(*font).or_default().extend(text.chars());
                }
            }
        }
        let mut embedded: HashMap<FontKey, EmbeddedFont> = HashMap::new();
        for (i, (key, chars)) in used.iter().enumerate() {
            if let Some(font) = self
                .fonts
                .embed(*key, &mut pdf, format!("F{}", i + 1), chars, &mut alloc)
            {
                embedded.insert(*key, font);
            }
        }
        let t_fonts = t0.elapsed();

        // Phase 2: images
        let mut image_names = Vec::with_capacity(self.images.len());
        let mut image_refs = Vec::with_capacity(self.images.len());
        for (i, image) in self.images.iter().enumerate() {
            image_refs.push(embed_image(&mut pdf, image, &mut alloc)?);
            image_names.push(format!("Im{}", i + 1));
        }
        let t_images = t0.elapsed();

        // Phase 3: pages, content streams and annotations
        let n = self.pages.len();
        let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
        let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

        let page_annot_refs: Vec<Vec<Ref>> = self
            .pages
            .iter()
            .map(|page| {
                page.links
                    .iter()
                    .map(|(rect, uri)| {
                        let annot_ref = alloc();
                        let mut annot = pdf.annotation(annot_ref);
                        annot
                            .subtype(AnnotationType::Link)
                            .rect(Rect::new(rect.x1, rect.y1, rect.x2, rect.y2))
                            .border(0.0, 0.0, 0.0, None);
                        annot
                            .action()
                            .action_type(ActionType::Uri)
                            .uri(Str(uri.as_bytes()));
                        annot_ref
                    })
                    .collect()
            })
            .collect();

        for (i, page) in self.pages.iter().enumerate() {
            let raw = self.page_content(page, &embedded, &image_names).finish();
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(n as i32);

        let mut font_pairs: Vec<(&str, Ref)> = embedded
            .values()
            .map(|f| (f.pdf_name.as_str(), f.font_ref))
            .collect();
        font_pairs.sort_by(|a, b| a.0.cmp(b.0));

        for (i, page_ops) in self.pages.iter().enumerate() {
            let mut page = pdf.page(page_ids[i]);
            page.media_box(Rect::new(0.0, 0.0, page_ops.width, page_ops.height))
                .parent(pages_id)
                .contents(content_ids[i]);
            if !page_annot_refs[i].is_empty() {
                page.annotations(page_annot_refs[i].iter().copied());
            }
            let mut resources = page.resources();
            {
                let mut fonts = resources.fonts();
                for (name, font_ref) in &font_pairs {
                    fonts.pair(Name(name.as_bytes()), *font_ref);
                }
            }
            if !image_refs.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in image_names.iter().zip(&image_refs) {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        let info_id = alloc();
        let mut info = pdf.document_info(info_id);
        if let Some(title) = &self.title {
            info.title(TextStr(title.as_str()));
        }
        info.producer(TextStr(concat!("flowpage-pdf ", env!("CARGO_PKG_VERSION"))));
        drop(info);

        if self.dropped_chars > 0 {
            log::warn!(
                "{} character(s) have no glyph in any available font and were not drawn",
                self.dropped_chars
            );
        }
        let t_total = t0.elapsed();
        log::info!(
            "PDF phases: fonts={:.1}ms ({} embedded), images={:.1}ms ({}), assembly={:.1}ms, {} page(s)",
            t_fonts.as_secs_f64() * 1000.0,
            embedded.len(),
            (t_images - t_fonts).as_secs_f64() * 1000.0,
            image_refs.len(),
            (t_total - t_images).as_secs_f64() * 1000.0,
            n,
        );

        Ok(pdf.finish())
    }
}
