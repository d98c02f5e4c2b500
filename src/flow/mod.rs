mod fragment;
mod lines;
mod table;

pub use fragment::{AdmonitionFrame, Fragment, FragmentBody, ImageBlock, Run, TableBlock, TextBlock};
pub use lines::{Line, Segment, wrap_paragraphs};

use crate::annotations::{LinkRect, LinkTracker};
use crate::config::{Alignment, PageSetup};
use crate::error::Error;
use crate::fonts::FontKey;
use crate::images::ImageData;
use crate::metrics::Metrics;

use table::{TablePlan, plan_table};

/// Tolerance for every comparison of lengths, in points.
pub const EPSILON: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionState {
    /// Accepting content on the current page.
    Open,
    /// The current page has no height left; the next placement rolls over.
    Full,
    /// Finalized; no further placement.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageCursor {
    /// 1-based page number.
    pub page: usize,
    /// Distance from the top of the content area.
    pub offset: f32,
    pub remaining: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub font: FontKey,
    pub size: f32,
    pub color: [u8; 3],
    /// Left edge of the run, PDF coordinates.
    pub x: f32,
    /// Baseline, PDF coordinates.
    pub y: f32,
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedImage {
    pub image: ImageData,
    /// Bottom-left corner, PDF coordinates.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedRule {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub width: f32,
    pub color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub enum Placed {
    Text(PlacedText),
    Image(PlacedImage),
    Rule(PlacedRule),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub number: usize,
    pub width: f32,
    pub height: f32,
    /// Draw items in placement order.
    pub items: Vec<Placed>,
    /// Height consumed from the content area.
    pub used_height: f32,
}

/// Result of a finished flow: the pages and the links placed on them.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub pages: Vec<Page>,
    pub links: LinkTracker,
}

enum Prepared {
    Text { lines: Vec<Line>, label: Vec<Line> },
    Image { caption: Vec<Line> },
    Table(TablePlan),
    Break,
}

/// Horizontal band text is laid into.
#[derive(Clone, Copy)]
struct Band {
    x: f32,
    width: f32,
    align: Alignment,
}

fn lines_height(lines: &[Line], paragraph_gap: f32) -> f32 {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let gap = if i > 0 && lines[i - 1].last_in_paragraph {
                paragraph_gap
            } else {
                0.0
            };
            l.height + gap
        })
        .sum()
}

fn joins_words(align: Alignment) -> bool {
    align != Alignment::Justify
}

/// Places fragments onto pages in order, owning the single page cursor.
pub struct FlowEngine<'a, 'm> {
    setup: PageSetup,
    metrics: &'a Metrics<'m>,
    pages: Vec<Page>,
    links: LinkTracker,
    cursor: PageCursor,
    state: RegionState,
}

impl<'a, 'm> FlowEngine<'a, 'm> {
    pub fn new(setup: PageSetup, metrics: &'a Metrics<'m>) -> Self {
        let first = Page {
            number: 1,
            width: setup.width,
            height: setup.height,
            items: Vec::new(),
            used_height: 0.0,
        };
        Self {
            cursor: PageCursor {
                page: 1,
                offset: 0.0,
                remaining: setup.content_height(),
            },
            setup,
            metrics,
            pages: vec![first],
            links: LinkTracker::new(),
            state: RegionState::Open,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn state(&self) -> RegionState {
        self.state
    }

    /// Place a sequence, honoring keep-with-next between neighbours.
    pub fn place_all(&mut self, fragments: &[Fragment]) -> Result<(), Error> {
        for (i, fragment) in fragments.iter().enumerate() {
            if fragment.keep_with_next {
                if let Some(next) = fragments.get(i + 1) {
                    self.keep_with(fragment, next)?;
                }
            }
            self.place(fragment)?;
        }
        Ok(())
    }

    pub fn place(&mut self, fragment: &Fragment) -> Result<(), Error> {
        self.ensure_open()?;
        let prepared = self.prepare(fragment);
        let (total, _) = self.extent(fragment, &prepared);

        if let Prepared::Break = prepared {
            return self.break_page();
        }
        if total <= EPSILON {
            // Nothing to draw: no spacing either, and a Full page stays current.
            return Ok(());
        }
        if self.state == RegionState::Full {
            self.new_page();
        }

        match (&fragment.body, prepared) {
            (FragmentBody::Text(text), Prepared::Text { lines, label }) => {
                self.place_text(fragment, text, &lines, &label)?
            }
            (FragmentBody::Image(image), Prepared::Image { caption }) => {
                self.place_image(fragment, image, &caption, total)?
            }
            (FragmentBody::Table(table), Prepared::Table(plan)) => {
                self.place_table(fragment, table, &plan)?
            }
            _ => return Err(Error::Usage(format!("block {} has no layout", fragment.block))),
        }

        let after = fragment.space_after.min(self.cursor.remaining);
        self.advance(after);
        Ok(())
    }

    /// Force the next placement onto a new page. No-op on an untouched page.
    pub fn break_page(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.at_top() {
            log::debug!("explicit page break after page {}", self.cursor.page);
            self.new_page();
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<Layout, Error> {
        self.ensure_open()?;
        self.state = RegionState::Closed;
        log::debug!(
            "flow finalized: {} page(s), {} link(s)",
            self.pages.len(),
            self.links.len()
        );
        Ok(Layout {
            pages: std::mem::take(&mut self.pages),
            links: std::mem::take(&mut self.links),
        })
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.state == RegionState::Closed {
            return Err(Error::Usage("flow engine already finalized".into()));
        }
        Ok(())
    }

    fn at_top(&self) -> bool {
        self.cursor.offset <= EPSILON
    }

    fn fits(&self, height: f32) -> bool {
        height <= self.cursor.remaining + EPSILON
    }

    fn new_page(&mut self) {
        let number = self.cursor.page + 1;
        self.pages.push(Page {
            number,
            width: self.setup.width,
            height: self.setup.height,
            items: Vec::new(),
            used_height: 0.0,
        });
        self.cursor = PageCursor {
            page: number,
            offset: 0.0,
            remaining: self.setup.content_height(),
        };
        self.state = RegionState::Open;
    }

    fn advance(&mut self, height: f32) {
        self.cursor.offset += height;
        self.cursor.remaining = (self.cursor.remaining - height).max(0.0);
        let offset = self.cursor.offset;
        if let Some(page) = self.pages.last_mut() {
            page.used_height = offset;
        }
        if self.cursor.remaining <= EPSILON {
            self.state = RegionState::Full;
        }
    }

    fn push(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    /// PDF y of a distance from the content top.
    fn y_at(&self, offset: f32) -> f32 {
        self.setup.content_top() - offset
    }

    fn capacity_error(&self, fragment: &Fragment, needed: f32) -> Error {
        Error::Layout {
            block: fragment.block.clone(),
            needed,
            available: self.setup.content_height(),
        }
    }

    /// Space before, dropped at the top of a page.
    fn space_before(&self, fragment: &Fragment) -> f32 {
        if self.at_top() {
            0.0
        } else {
            fragment.space_before
        }
    }

    /// Roll to a fresh page unless `height` (plus spacing) fits here.
    /// Returns the spacing still owed before the content.
    fn make_room(&mut self, fragment: &Fragment, height: f32) -> f32 {
        let before = self.space_before(fragment);
        if !self.fits(before + height) && !self.at_top() {
            log::debug!(
                "block {} needs {height:.1}pt, {:.1}pt left on page {}; breaking",
                fragment.block,
                self.cursor.remaining,
                self.cursor.page
            );
            self.new_page();
            return 0.0;
        }
        before
    }

    fn keep_with(&mut self, fragment: &Fragment, next: &Fragment) -> Result<(), Error> {
        self.ensure_open()?;
        if self.at_top() || matches!(next.body, FragmentBody::PageBreak) {
            return Ok(());
        }
        let (total, _) = self.extent(fragment, &self.prepare(fragment));
        let (_, next_min) = self.extent(next, &self.prepare(next));
        let tail = fragment.space_after + next.space_before + next_min;
        let here = fragment.space_before + total + tail;
        let fresh = total + tail;
        if !self.fits(here) && fresh <= self.setup.content_height() + EPSILON {
            log::debug!(
                "block {} kept with block {}; moving to page {}",
                fragment.block,
                next.block,
                self.cursor.page + 1
            );
            self.new_page();
        }
        Ok(())
    }

    fn text_band(&self, text: &TextBlock) -> Band {
        let frame = text
            .frame
            .as_ref()
            .map(|f| f.label_width + f.padding)
            .unwrap_or(0.0);
        Band {
            x: self.setup.margin_left + text.indent + frame,
            width: (self.setup.content_width() - text.indent - frame).max(1.0),
            align: text.align,
        }
    }

    fn content_band(&self, align: Alignment) -> Band {
        Band {
            x: self.setup.margin_left,
            width: self.setup.content_width(),
            align,
        }
    }

    fn wrap(&self, text: &TextBlock, band: Band) -> Vec<Line> {
        wrap_paragraphs(
            &text.paragraphs,
            band.width,
            text.line_height,
            joins_words(text.align),
            self.metrics,
        )
    }

    fn prepare(&self, fragment: &Fragment) -> Prepared {
        match &fragment.body {
            FragmentBody::Text(text) => {
                let lines = self.wrap(text, self.text_band(text));
                let label = match &text.frame {
                    Some(frame) if !frame.label.is_empty() => wrap_paragraphs(
                        std::slice::from_ref(&frame.label),
                        frame.label_width.max(1.0),
                        text.line_height,
                        true,
                        self.metrics,
                    ),
                    _ => Vec::new(),
                };
                Prepared::Text { lines, label }
            }
            FragmentBody::Image(image) => {
                let caption = match &image.caption {
                    Some(caption) => self.wrap(caption, self.content_band(caption.align)),
                    None => Vec::new(),
                };
                Prepared::Image { caption }
            }
            FragmentBody::Table(table) => {
                Prepared::Table(plan_table(table, self.setup.content_width(), self.metrics))
            }
            FragmentBody::PageBreak => Prepared::Break,
        }
    }

    /// Total height and the minimum height that must fit before any part is placed.
    fn extent(&self, fragment: &Fragment, prepared: &Prepared) -> (f32, f32) {
        let (total, first) = match (&fragment.body, prepared) {
            (FragmentBody::Text(text), Prepared::Text { lines, .. }) => (
                lines_height(lines, text.paragraph_gap),
                lines.first().map(|l| l.height).unwrap_or(0.0),
            ),
            (FragmentBody::Image(image), Prepared::Image { caption }) => {
                let mut total = image.height;
                if !caption.is_empty() {
                    total += image.caption_gap + lines_height(caption, 0.0);
                }
                (total, total)
            }
            (FragmentBody::Table(_), Prepared::Table(plan)) => {
                let total = plan.total_height();
                let first = match plan.rows.get(plan.header_rows) {
                    Some(row) => plan.header_height() + row.height,
                    None => total,
                };
                (total, first)
            }
            _ => (0.0, 0.0),
        };
        if fragment.is_splittable() {
            (total, first)
        } else {
            (total, total)
        }
    }

    /// Draw one line whose top sits at `offset`.
    fn draw_line(&mut self, line: &Line, band: Band, offset: f32) {
        let slack = (band.width - line.width).max(0.0);
        let shift = match band.align {
            Alignment::Center => slack / 2.0,
            Alignment::Right => slack,
            Alignment::Left | Alignment::Justify => 0.0,
        };
        let gaps = |segments: &[Segment]| {
            segments
                .windows(2)
                .filter(|w| w[1].x > w[0].x + w[0].width + EPSILON)
                .count()
        };
        let stretch = if band.align == Alignment::Justify && !line.last_in_paragraph {
            let n = gaps(&line.segments);
            if n > 0 { slack / n as f32 } else { 0.0 }
        } else {
            0.0
        };

        let top = self.y_at(offset);
        let baseline = top - line.baseline;
        let bottom = top - line.height;
        let mut extra = 0.0;
        let mut link_run: Option<(String, f32, f32)> = None;
        let mut prev_end: Option<f32> = None;
        for seg in &line.segments {
            if let Some(end) = prev_end {
                if seg.x > end + EPSILON {
                    extra += stretch;
                }
            }
            prev_end = Some(seg.x + seg.width);
            let x = band.x + shift + seg.x + extra;
            self.push(Placed::Text(PlacedText {
                text: seg.text.clone(),
                font: seg.font,
                size: seg.size,
                color: seg.color,
                x,
                y: baseline,
                width: seg.width,
            }));

            // Adjacent segments with the same target share one rectangle
            let continues = matches!(
                (&link_run, &seg.link),
                (Some((uri, _, _)), Some(link)) if uri == link
            );
            if continues {
                if let Some((_, _, x2)) = link_run.as_mut() {
                    *x2 = x + seg.width;
                }
            } else {
                if let Some((uri, x1, x2)) = link_run.take() {
                    self.links
                        .record(self.cursor.page, LinkRect::new(x1, bottom, x2, top), uri);
                }
                link_run = seg.link.as_ref().map(|l| (l.clone(), x, x + seg.width));
            }
        }
        if let Some((uri, x1, x2)) = link_run {
            self.links
                .record(self.cursor.page, LinkRect::new(x1, bottom, x2, top), uri);
        }
    }

    /// Draw consecutive lines from `offset` without page checks; returns the height used.
    fn draw_lines(&mut self, lines: &[Line], band: Band, offset: f32) -> f32 {
        let mut y = offset;
        for line in lines {
            self.draw_line(line, band, y);
            y += line.height;
        }
        y - offset
    }

    fn rule(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: [u8; 3]) {
        self.push(Placed::Rule(PlacedRule {
            from,
            to,
            width,
            color,
        }));
    }

    fn place_text(
        &mut self,
        fragment: &Fragment,
        text: &TextBlock,
        lines: &[Line],
        label: &[Line],
    ) -> Result<(), Error> {
        let tallest = lines.iter().map(|l| l.height).fold(0.0f32, f32::max);
        if tallest > self.setup.content_height() + EPSILON {
            return Err(self.capacity_error(fragment, tallest));
        }
        let (total, min) = {
            let total = lines_height(lines, text.paragraph_gap);
            let first = lines.first().map(|l| l.height).unwrap_or(0.0);
            (total, if fragment.is_splittable() { first } else { total })
        };
        if min > self.setup.content_height() + EPSILON {
            return Err(self.capacity_error(fragment, min));
        }
        let band = self.text_band(text);
        let mut gap = self.make_room(fragment, min);
        let mut part_top: Option<f32> = None;
        let mut first_part = true;
        log::trace!("block {}: {} line(s), {total:.1}pt", fragment.block, lines.len());

        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                gap = if lines[i - 1].last_in_paragraph && !self.at_top() {
                    text.paragraph_gap
                } else {
                    0.0
                };
            }
            if !self.fits(gap + line.height) {
                log::debug!(
                    "block {} split after line {i} on page {}",
                    fragment.block,
                    self.cursor.page
                );
                if let Some(top) = part_top.take() {
                    self.close_frame_part(text, top);
                }
                first_part = false;
                self.new_page();
                gap = 0.0;
            }
            self.advance(gap);
            if part_top.is_none() {
                let top = self.cursor.offset;
                part_top = Some(top);
                if first_part && !label.is_empty() {
                    self.draw_label(text, label, top);
                }
            }
            let offset = self.cursor.offset;
            self.draw_line(line, band, offset);
            self.advance(line.height);
        }
        if let Some(top) = part_top {
            self.close_frame_part(text, top);
        }
        Ok(())
    }

    fn draw_label(&mut self, text: &TextBlock, label: &[Line], top: f32) {
        if let Some(frame) = &text.frame {
            let band = Band {
                x: self.setup.margin_left + text.indent,
                width: frame.label_width,
                align: Alignment::Center,
            };
            self.draw_lines(label, band, top);
        }
    }

    /// Vertical rule beside the part of an admonition on the current page.
    fn close_frame_part(&mut self, text: &TextBlock, top: f32) {
        if let Some(frame) = &text.frame {
            let x = self.setup.margin_left + text.indent + frame.label_width + frame.padding / 2.0;
            let from = (x, self.y_at(top));
            let to = (x, self.y_at(self.cursor.offset));
            self.rule(from, to, frame.rule_width, frame.rule_color);
        }
    }

    fn place_image(
        &mut self,
        fragment: &Fragment,
        image: &ImageBlock,
        caption: &[Line],
        total: f32,
    ) -> Result<(), Error> {
        if total > self.setup.content_height() + EPSILON {
            return Err(self.capacity_error(fragment, total));
        }
        let before = self.make_room(fragment, total);
        self.advance(before);

        let slack = (self.setup.content_width() - image.width).max(0.0);
        let x = self.setup.margin_left
            + match image.align {
                Alignment::Center => slack / 2.0,
                Alignment::Right => slack,
                Alignment::Left | Alignment::Justify => 0.0,
            };
        let top = self.y_at(self.cursor.offset);
        let y = top - image.height;
        self.push(Placed::Image(PlacedImage {
            image: image.image.clone(),
            x,
            y,
            width: image.width,
            height: image.height,
        }));
        if let Some(uri) = &image.link {
            self.links.record(
                self.cursor.page,
                LinkRect::new(x, y, x + image.width, top),
                uri.clone(),
            );
        }
        self.advance(image.height);

        if let (Some(text), false) = (&image.caption, caption.is_empty()) {
            self.advance(image.caption_gap);
            let band = self.content_band(text.align);
            let offset = self.cursor.offset;
            let used = self.draw_lines(caption, band, offset);
            self.advance(used);
        }
        Ok(())
    }

    fn draw_row(&mut self, table: &TableBlock, plan: &TablePlan, row: usize, offset: f32) {
        let mut x = self.setup.margin_left;
        for (col, width) in plan.col_widths.iter().enumerate() {
            let band = Band {
                x: x + table.padding,
                width: (width - 2.0 * table.padding).max(1.0),
                align: Alignment::Left,
            };
            self.draw_lines(&plan.rows[row].cells[col], band, offset + table.padding);
            x += width;
        }
    }

    /// Borders of the rows placed on the current page.
    fn draw_borders(&mut self, table: &TableBlock, plan: &TablePlan, row_tops: &[f32]) {
        let Some(&first) = row_tops.first() else {
            return;
        };
        let left = self.setup.margin_left;
        let right = left + plan.col_widths.iter().sum::<f32>();
        let top = self.y_at(first);
        let bottom = self.y_at(self.cursor.offset);
        for &offset in row_tops {
            let y = self.y_at(offset);
            self.rule((left, y), (right, y), table.rule_width, table.rule_color);
        }
        self.rule((left, bottom), (right, bottom), table.rule_width, table.rule_color);
        let mut x = left;
        self.rule((x, top), (x, bottom), table.rule_width, table.rule_color);
        for width in &plan.col_widths {
            x += width;
            self.rule((x, top), (x, bottom), table.rule_width, table.rule_color);
        }
    }

    fn place_table(
        &mut self,
        fragment: &Fragment,
        table: &TableBlock,
        plan: &TablePlan,
    ) -> Result<(), Error> {
        let tallest = plan.rows.iter().map(|r| r.height).fold(0.0f32, f32::max);
        if tallest > self.setup.content_height() + EPSILON {
            return Err(self.capacity_error(fragment, tallest));
        }
        let min = match plan.rows.get(plan.header_rows) {
            Some(row) if fragment.is_splittable() => plan.header_height() + row.height,
            _ => plan.total_height(),
        };
        if !fragment.is_splittable() && min > self.setup.content_height() + EPSILON {
            return Err(self.capacity_error(fragment, min));
        }
        let before = self.make_room(fragment, min.min(self.setup.content_height()));
        self.advance(before);

        let mut row_tops: Vec<f32> = Vec::new();
        for row in 0..plan.rows.len() {
            let height = plan.rows[row].height;
            if !self.fits(height) {
                log::debug!(
                    "table {} continues at row {} on page {}",
                    fragment.block,
                    row + 1,
                    self.cursor.page + 1
                );
                self.draw_borders(table, plan, &row_tops);
                row_tops.clear();
                self.new_page();
                if row >= plan.header_rows
                    && plan.header_height() + height <= self.setup.content_height() + EPSILON
                {
                    for header in 0..plan.header_rows {
                        let offset = self.cursor.offset;
                        row_tops.push(offset);
                        self.draw_row(table, plan, header, offset);
                        self.advance(plan.rows[header].height);
                    }
                } else if row >= plan.header_rows && plan.header_rows > 0 {
                    log::warn!(
                        "table {}: header does not fit above row {}, not repeated",
                        fragment.block,
                        row + 1
                    );
                }
            }
            let offset = self.cursor.offset;
            row_tops.push(offset);
            self.draw_row(table, plan, row, offset);
            self.advance(height);
        }
        self.draw_borders(table, plan, &row_tops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{RawExtent, TextMeasure};
    use crate::model::BlockId;

    /// Every glyph is half an em wide; ascent 0.8em, descent 0.2em.
    struct Uniform;

    impl TextMeasure for Uniform {
        fn measure(&self, text: &str, _font: FontKey, size: f32) -> RawExtent {
            RawExtent {
                width: text.chars().count() as f32 * size * 0.5,
                ascent: size * 0.8,
                descent: -size * 0.2,
                missing: 0,
            }
        }
    }

    /// 100pt of usable height, 200pt of width.
    fn setup() -> PageSetup {
        PageSetup {
            width: 220.0,
            height: 120.0,
            margin_top: 10.0,
            margin_bottom: 10.0,
            margin_left: 10.0,
            margin_right: 10.0,
        }
    }

    /// `n` paragraphs of one 10pt line each.
    fn lines(id: usize, n: usize) -> Fragment {
        let run = |i: usize| vec![Run::text(format!("line{i}"), FontKey::base(false, false), 10.0, [0; 3])];
        let text = TextBlock {
            paragraphs: (0..n).map(run).collect(),
            align: Alignment::Left,
            line_height: 1.0,
            paragraph_gap: 0.0,
            indent: 0.0,
            frame: None,
        };
        Fragment::new(BlockId::root(id), FragmentBody::Text(text))
    }

    fn texts(page: &Page) -> Vec<&str> {
        page.items
            .iter()
            .filter_map(|item| match item {
                Placed::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn exact_fit_stays_on_page_and_marks_it_full() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        engine.place(&lines(0, 10)).unwrap();
        assert_eq!(engine.cursor().page, 1);
        assert_eq!(engine.state(), RegionState::Full);

        engine.place(&lines(1, 1)).unwrap();
        assert_eq!(engine.cursor().page, 2);
        assert_eq!(engine.state(), RegionState::Open);
    }

    #[test]
    fn text_splits_between_lines() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        engine.place(&lines(0, 4)).unwrap();
        engine.place(&lines(1, 8)).unwrap();
        let layout = engine.finalize().unwrap();
        assert_eq!(layout.pages.len(), 2);
        assert_eq!(texts(&layout.pages[0]).len(), 10);
        assert_eq!(texts(&layout.pages[1]), ["line6", "line7"]);
        for page in &layout.pages {
            assert!(page.used_height <= 100.0 + EPSILON);
        }
    }

    #[test]
    fn spacing_before_is_dropped_at_page_top() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        engine.place(&lines(0, 1).spaced(30.0, 0.0)).unwrap();
        assert!((engine.cursor().offset - 10.0).abs() < EPSILON);
        engine.place(&lines(1, 1).spaced(30.0, 500.0)).unwrap();
        // 10 + 30 + 10, then the trailing space is cut at the bottom
        assert!((engine.cursor().remaining).abs() < EPSILON);
        assert_eq!(engine.cursor().page, 1);
        assert_eq!(engine.state(), RegionState::Full);
    }

    #[test]
    fn keep_together_moves_whole_block() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        engine.place(&lines(0, 7)).unwrap();
        engine.place(&lines(1, 4).kept_together()).unwrap();
        let layout = engine.finalize().unwrap();
        assert_eq!(texts(&layout.pages[0]).len(), 7);
        assert_eq!(texts(&layout.pages[1]).len(), 4);
    }

    #[test]
    fn keep_together_taller_than_page_is_a_capacity_error() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        let err = engine.place(&lines(3, 11).kept_together()).unwrap_err();
        match err {
            Error::Layout {
                block,
                needed,
                available,
            } => {
                assert_eq!(block, BlockId::root(3));
                assert!((needed - 110.0).abs() < EPSILON);
                assert!((available - 100.0).abs() < EPSILON);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn heading_moves_with_its_successor() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        let frags = vec![lines(0, 9), lines(1, 1).kept_with_next(), lines(2, 3)];
        engine.place_all(&frags).unwrap();
        let layout = engine.finalize().unwrap();
        assert_eq!(texts(&layout.pages[0]).len(), 9);
        assert_eq!(texts(&layout.pages[1]), ["line0", "line0", "line1", "line2"]);
    }

    #[test]
    fn page_break_is_ignored_on_untouched_page() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        let brk = Fragment::new(BlockId::root(0), FragmentBody::PageBreak);
        engine.place(&brk).unwrap();
        assert_eq!(engine.cursor().page, 1);
        engine.place(&lines(1, 1)).unwrap();
        engine.place(&brk).unwrap();
        engine.place(&brk).unwrap();
        assert_eq!(engine.cursor().page, 2);
        engine.break_page().unwrap();
        assert_eq!(engine.cursor().page, 2);
    }

    #[test]
    fn placing_after_finalize_is_a_usage_error() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        engine.finalize().unwrap();
        assert_eq!(engine.state(), RegionState::Closed);
        assert!(matches!(engine.place(&lines(0, 1)), Err(Error::Usage(_))));
        assert!(matches!(engine.finalize(), Err(Error::Usage(_))));
        assert!(matches!(engine.break_page(), Err(Error::Usage(_))));
    }

    #[test]
    fn linked_segments_record_one_rect_per_line() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        let font = FontKey::base(false, false);
        let runs = vec![
            Run::atomic("ab", font, 10.0, [0; 3]).with_link("https://x"),
            Run::atomic("cd", font, 10.0, [0; 3]).with_link("https://x"),
            Run::atomic(" ", font, 10.0, [0; 3]),
            Run::atomic("ef", font, 10.0, [0; 3]),
        ];
        let text = TextBlock::single(runs, Alignment::Left, 1.0);
        engine
            .place(&Fragment::new(BlockId::root(0), FragmentBody::Text(text)))
            .unwrap();
        let layout = engine.finalize().unwrap();
        let links: Vec<_> = layout.links.iter().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].page, 1);
        assert!((links[0].rect.x1 - 10.0).abs() < EPSILON);
        assert!((links[0].rect.width() - 20.0).abs() < EPSILON);
        assert!((links[0].rect.y2 - 110.0).abs() < EPSILON);
        assert!((links[0].rect.height() - 10.0).abs() < EPSILON);
    }

    #[test]
    fn justified_lines_fill_the_band_except_the_last() {
        let metrics = Metrics::new(&Uniform, 0.5);
        let mut engine = FlowEngine::new(setup(), &metrics);
        let font = FontKey::base(false, false);
        // 25 chars of 5pt: "aaaa " repeated wraps at 200pt
        let words = vec!["aaaa"; 12].join(" ");
        let text = TextBlock::single(vec![Run::text(words, font, 10.0, [0; 3])], Alignment::Justify, 1.0);
        engine
            .place(&Fragment::new(BlockId::root(0), FragmentBody::Text(text)))
            .unwrap();
        let layout = engine.finalize().unwrap();
        let placed: Vec<&PlacedText> = layout.pages[0]
            .items
            .iter()
            .filter_map(|item| match item {
                Placed::Text(t) => Some(t),
                _ => None,
            })
            .collect();
        let first_line_y = placed[0].y;
        let first_line: Vec<_> = placed.iter().filter(|t| t.y == first_line_y).collect();
        let last = first_line[first_line.len() - 1];
        assert!((last.x + last.width - 210.0).abs() < 0.05);
        let tail = placed[placed.len() - 1];
        assert!(tail.x + tail.width < 210.0 - 1.0);
    }
}
