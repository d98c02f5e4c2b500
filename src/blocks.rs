use std::path::Path;

use crate::config::{Alignment, BlockStyle, Config, IconMode};
use crate::error::Error;
use crate::flow::{AdmonitionFrame, Fragment, FragmentBody, ImageBlock, Run, TableBlock, TextBlock};
use crate::fonts::FontKey;
use crate::images::ImageData;
use crate::media::{Length, MediaReference, MediaResolver, PosterFetcher, fit_image};
use crate::model::{AdmonitionKind, BlockId, BlockKind, ContentBlock, Document, InlineRun};

/// Icon font glyphs for admonition labels.
fn admonition_glyph(kind: AdmonitionKind) -> &'static str {
    match kind {
        AdmonitionKind::Note => "\u{f05a}",
        AdmonitionKind::Tip => "\u{f0eb}",
        AdmonitionKind::Important => "\u{f06a}",
        AdmonitionKind::Warning => "\u{f071}",
        AdmonitionKind::Caution => "\u{f06d}",
    }
}

/// Converts document blocks into the fragment stream the flow engine consumes.
pub struct BlockBuilder<'a> {
    config: &'a Config,
    media: MediaResolver<'a>,
    figures: usize,
    tables: usize,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(config: &'a Config, base_dir: Option<&'a Path>, fetcher: &'a dyn PosterFetcher) -> Self {
        Self {
            config,
            media: MediaResolver::new(config, base_dir, fetcher),
            figures: 0,
            tables: 0,
        }
    }

    pub fn build(&mut self, doc: &Document) -> Result<Vec<Fragment>, Error> {
        let mut out = Vec::new();
        for (i, block) in doc.blocks.iter().enumerate() {
            self.block(&BlockId::root(i), block, &mut out)?;
        }
        Ok(out)
    }

    fn block(&mut self, id: &BlockId, block: &ContentBlock, out: &mut Vec<Fragment>) -> Result<(), Error> {
        let style = BlockStyle::resolve(self.config, block);
        match &block.kind {
            BlockKind::Paragraph | BlockKind::Heading { .. } => {
                let text = TextBlock::single(self.runs(&block.runs, &style), style.align, style.line_height);
                out.push(self.framed(id, FragmentBody::Text(text), &style));
            }
            BlockKind::Image => self.image(id, block, &style, out)?,
            BlockKind::Video | BlockKind::Audio => {
                let reference = MediaReference::from_block(id, block)?;
                out.extend(self.media.fragments(id, &reference, &style));
            }
            BlockKind::Table => self.table(id, block, &style, out),
            BlockKind::Admonition { variant } => self.admonition(id, *variant, block, &style, out)?,
            BlockKind::PageBreak => out.push(Fragment::new(id.clone(), FragmentBody::PageBreak)),
        }
        Ok(())
    }

    /// Fragment with the block's spacing and keep flags.
    fn framed(&self, id: &BlockId, body: FragmentBody, style: &BlockStyle) -> Fragment {
        let mut fragment = Fragment::new(id.clone(), body).spaced(style.space_before, style.space_after);
        fragment.keep_together = style.keep_together;
        fragment.keep_with_next = style.keep_with_next;
        fragment
    }

    fn run(&self, inline: &InlineRun, style: &BlockStyle) -> Run {
        let bold = inline.bold || style.bold;
        let italic = inline.italic || style.italic;
        let font = if inline.monospace {
            FontKey::mono(bold, italic)
        } else {
            FontKey::base(bold, italic)
        };
        let color = inline.color.unwrap_or(if inline.link.is_some() {
            self.config.link_color
        } else {
            style.color
        });
        let run = Run::text(inline.text.clone(), font, inline.size.unwrap_or(style.font_size), color);
        match &inline.link {
            Some(uri) => run.with_link(uri.clone()),
            None => run,
        }
    }

    fn runs(&self, inlines: &[InlineRun], style: &BlockStyle) -> Vec<Run> {
        inlines.iter().map(|r| self.run(r, style)).collect()
    }

    fn caption(&self, text: String, align: Alignment) -> TextBlock {
        let style = BlockStyle::caption(self.config, align);
        let run = Run::text(text, FontKey::base(style.bold, style.italic), style.font_size, style.color);
        TextBlock::single(vec![run], align, style.line_height)
    }

    fn load_image(&self, target: &str) -> Result<ImageData, String> {
        if target.starts_with("http://") || target.starts_with("https://") {
            if !self.config.allow_uri_read {
                return Err(format!("{target}: remote image needs allow-uri-read"));
            }
            ImageData::from_bytes(self.media.loader().remote(target)?)
        } else {
            self.media.loader().local(target)
        }
    }

    fn image(
        &mut self,
        id: &BlockId,
        block: &ContentBlock,
        style: &BlockStyle,
        out: &mut Vec<Fragment>,
    ) -> Result<(), Error> {
        let target = block.target.as_deref().map(str::trim).unwrap_or("");
        if target.is_empty() {
            return Err(Error::Usage(format!("image block {id} has no target")));
        }
        let caption = match &block.title {
            Some(title) => {
                self.figures += 1;
                Some(self.caption(format!("Figure {}. {title}", self.figures), style.align))
            }
            None => None,
        };

        let image = match self.load_image(target) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("image {target} unavailable, showing alt text: {e}");
                let alt = block.attr("alt").map(str::to_string).unwrap_or_else(|| {
                    Path::new(target)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| target.to_string())
                });
                let run = Run::text(format!("[{alt}]"), FontKey::base(false, false), style.font_size, style.color);
                let text = TextBlock::single(vec![run], style.align, style.line_height);
                out.push(self.framed(id, FragmentBody::Text(text), style));
                if let Some(caption) = caption {
                    out.push(Fragment::new(id.clone(), FragmentBody::Text(caption)));
                }
                return Ok(());
            }
        };

        let length = |name: &str| match block.attr(name).and_then(Length::parse) {
            Some(Length::Points(pt)) => Some(pt),
            _ => None,
        };
        let caption_reserve = if caption.is_some() {
            self.config.caption_size * self.config.line_height + self.config.block_gap * 0.5
        } else {
            0.0
        };
        let (width, height) = fit_image(
            &image,
            length("width"),
            length("height"),
            block.attr("pdfwidth").and_then(Length::parse),
            self.config.page.content_width(),
            self.config.page.content_height() - caption_reserve,
        );
        let body = FragmentBody::Image(ImageBlock {
            image,
            width,
            height,
            align: style.align,
            link: block.attr("link").map(str::to_string),
            caption,
            caption_gap: self.config.block_gap * 0.5,
        });
        out.push(self.framed(id, body, style).kept_together());
        Ok(())
    }

    fn table(&mut self, id: &BlockId, block: &ContentBlock, style: &BlockStyle, out: &mut Vec<Fragment>) {
        let ncols = block.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        if ncols == 0 {
            log::debug!("table {id} has no cells");
            return;
        }
        let header_rows = block.rows.iter().take_while(|r| r.header).count();
        let header_style = BlockStyle { bold: true, ..*style };
        let rows: Vec<Vec<Vec<Run>>> = block
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell_style = if i < header_rows { &header_style } else { style };
                row.cells.iter().map(|c| self.runs(&c.runs, cell_style)).collect()
            })
            .collect();

        let columns = match block.attr("cols") {
            Some(cols) => {
                let weights: Option<Vec<f32>> = cols
                    .split(',')
                    .map(|w| w.trim().parse::<f32>().ok().filter(|w| *w > 0.0))
                    .collect();
                match weights {
                    Some(w) if w.len() == ncols => w,
                    _ => {
                        log::warn!("table {id}: cols={cols:?} does not describe {ncols} columns");
                        vec![1.0; ncols]
                    }
                }
            }
            None => vec![1.0; ncols],
        };

        let mut space_before = style.space_before;
        if let Some(title) = &block.title {
            self.tables += 1;
            let caption = self.caption(format!("Table {}. {title}", self.tables), Alignment::Left);
            out.push(
                Fragment::new(id.clone(), FragmentBody::Text(caption))
                    .spaced(style.space_before, self.config.block_gap * 0.25)
                    .kept_with_next(),
            );
            space_before = 0.0;
        }
        let body = FragmentBody::Table(TableBlock {
            columns,
            rows,
            header_rows,
            line_height: style.line_height,
            padding: self.config.table_cell_padding,
            rule_width: self.config.rule_width,
            rule_color: self.config.rule_color,
        });
        let mut fragment = self.framed(id, body, style);
        fragment.space_before = space_before;
        out.push(fragment);
    }

    /// Admonition text is framed; other children sit between frame parts in
    /// document order. The label is drawn on the first part only.
    fn admonition(
        &mut self,
        id: &BlockId,
        kind: AdmonitionKind,
        block: &ContentBlock,
        style: &BlockStyle,
        out: &mut Vec<Fragment>,
    ) -> Result<(), Error> {
        let mut label = Some(self.admonition_label(kind, style));
        let mut paragraphs = Vec::new();
        if !block.runs.is_empty() {
            paragraphs.push(self.runs(&block.runs, style));
        }
        for (i, child) in block.children.iter().enumerate() {
            match child.kind {
                BlockKind::Paragraph => paragraphs.push(self.runs(&child.runs, style)),
                _ => {
                    self.frame_part(id, std::mem::take(&mut paragraphs), &mut label, style, out);
                    self.block(&id.child(i), child, out)?;
                }
            }
        }
        self.frame_part(id, paragraphs, &mut label, style, out);
        Ok(())
    }

    fn admonition_label(&self, kind: AdmonitionKind, style: &BlockStyle) -> Vec<Run> {
        match self.config.icon_mode {
            IconMode::Font => vec![Run::atomic(
                admonition_glyph(kind),
                FontKey::icon(),
                style.font_size * 1.5,
                style.color,
            )],
            IconMode::Text => vec![Run::atomic(
                kind.label(),
                FontKey::base(true, false),
                style.font_size,
                style.color,
            )],
        }
    }

    fn frame_part(
        &self,
        id: &BlockId,
        paragraphs: Vec<Vec<Run>>,
        label: &mut Option<Vec<Run>>,
        style: &BlockStyle,
        out: &mut Vec<Fragment>,
    ) {
        if paragraphs.is_empty() {
            return;
        }
        let text = TextBlock {
            paragraphs,
            align: style.align,
            line_height: style.line_height,
            paragraph_gap: self.config.block_gap * 0.5,
            indent: 0.0,
            frame: Some(AdmonitionFrame {
                label: label.take().unwrap_or_default(),
                label_width: self.config.admonition_label_width,
                padding: self.config.admonition_padding,
                rule_width: self.config.rule_width,
                rule_color: self.config.rule_color,
            }),
        };
        out.push(self.framed(id, FragmentBody::Text(text), style));
    }
}
