use crate::fonts::FontKey;
use crate::metrics::Metrics;

use super::EPSILON;
use super::fragment::Run;

/// A run, or the part of a breakable run, that landed on one line.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub text: String,
    pub font: FontKey,
    pub size: f32,
    pub color: [u8; 3],
    pub link: Option<String>,
    /// x relative to line start
    pub x: f32,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    run_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub segments: Vec<Segment>,
    /// Width up to the last non-blank segment.
    pub width: f32,
    pub height: f32,
    /// Baseline distance from the line top.
    pub baseline: f32,
    pub last_in_paragraph: bool,
}

/// Whitespace that permits a line break. NBSP and its narrow variants glue.
pub(super) fn is_break_space(c: char) -> bool {
    c.is_whitespace() && !matches!(c, '\u{a0}' | '\u{2007}' | '\u{202f}')
}

fn is_blank(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_break_space)
}

struct LineBuilder<'a, 'm> {
    metrics: &'a Metrics<'m>,
    max_width: f32,
    line_height: f32,
    join_words: bool,
    lines: Vec<Line>,
    current: Vec<Segment>,
    current_x: f32,
    /// Width of a collapsed space owed before the next piece.
    gap: f32,
    /// A break is allowed before the next piece.
    break_ok: bool,
}

impl<'a, 'm> LineBuilder<'a, 'm> {
    fn finish_line(&mut self, last_in_paragraph: bool) {
        let segments = std::mem::take(&mut self.current);
        self.current_x = 0.0;
        if segments.is_empty() {
            return;
        }
        let width = segments
            .iter()
            .rev()
            .find(|s| !is_blank(&s.text))
            .map(|s| s.x + s.width)
            .unwrap_or(0.0);
        let height = segments
            .iter()
            .map(|s| s.size * self.line_height)
            .fold(0.0f32, f32::max);
        let ascent = segments.iter().map(|s| s.ascent).fold(0.0f32, f32::max);
        let descent = segments.iter().map(|s| s.descent).fold(0.0f32, f32::min);
        let content = ascent - descent;
        let height = height.max(content);
        let baseline = ascent + (height - content) / 2.0;
        self.lines.push(Line {
            segments,
            width,
            height,
            baseline,
            last_in_paragraph,
        });
    }

    /// Place one unbreakable piece, wrapping first if allowed and needed.
    fn push_piece(&mut self, run: &Run, run_index: usize, text: &str, join: bool) {
        let dims = self.metrics.measure(text, run.font, run.size);
        let mut proposed = if self.current.is_empty() {
            0.0
        } else {
            self.current_x + self.gap
        };
        let mut join = join;
        if !self.current.is_empty()
            && self.break_ok
            && !is_blank(text)
            && proposed + dims.width > self.max_width + EPSILON
        {
            self.finish_line(false);
            proposed = 0.0;
            join = false;
        }

        match self.current.last_mut() {
            Some(last) if join && self.join_words && last.run_index == run_index => {
                last.text.push(' ');
                last.text.push_str(text);
                last.width = proposed + dims.width - last.x;
            }
            _ => self.current.push(Segment {
                text: text.to_string(),
                font: run.font,
                size: run.size,
                color: run.color,
                link: run.link.clone(),
                x: proposed,
                width: dims.width,
                ascent: dims.ascent,
                descent: dims.descent,
                run_index,
            }),
        }
        self.current_x = proposed + dims.width;
        self.gap = 0.0;
        self.break_ok = false;
    }

    fn push_run(&mut self, run_index: usize, run: &Run) {
        if run.text.is_empty() {
            return;
        }
        let leads_with_space = run.text.starts_with(is_break_space);
        let ends_with_space = run.text.ends_with(is_break_space);

        if !run.breakable {
            if leads_with_space {
                self.break_ok = true;
                self.gap = 0.0;
            }
            let blank = is_blank(&run.text);
            self.push_piece(run, run_index, &run.text, false);
            self.break_ok = blank || ends_with_space;
            return;
        }

        let space_w = self.metrics.width(" ", run.font, run.size);
        let mut any_word = false;
        for (i, word) in run
            .text
            .split(is_break_space)
            .filter(|w| !w.is_empty())
            .enumerate()
        {
            if i > 0 || leads_with_space {
                self.gap = space_w;
                self.break_ok = true;
            }
            self.push_piece(run, run_index, word, i > 0);
            any_word = true;
        }
        if ends_with_space || !any_word {
            self.gap = space_w;
            self.break_ok = true;
        }
    }
}

/// Wrap paragraphs of runs into lines no wider than `max_width` where possible.
/// A piece wider than the line is placed alone on its own line.
pub fn wrap_paragraphs(
    paragraphs: &[Vec<Run>],
    max_width: f32,
    line_height: f32,
    join_words: bool,
    metrics: &Metrics,
) -> Vec<Line> {
    let mut builder = LineBuilder {
        metrics,
        max_width,
        line_height,
        join_words,
        lines: Vec::new(),
        current: Vec::new(),
        current_x: 0.0,
        gap: 0.0,
        break_ok: false,
    };
    for runs in paragraphs {
        for (run_index, run) in runs.iter().enumerate() {
            if let Some((head, tail)) = run.text.split_once('\n') {
                // Hard line breaks inside a run
                let mut first = Run {
                    text: head.to_string(),
                    ..run.clone()
                };
                builder.push_run(run_index, &first);
                for part in tail.split('\n').map(str::to_string) {
                    builder.finish_line(false);
                    builder.gap = 0.0;
                    builder.break_ok = false;
                    first.text = part;
                    builder.push_run(run_index, &first);
                }
            } else {
                builder.push_run(run_index, run);
            }
        }
        builder.finish_line(true);
        builder.gap = 0.0;
        builder.break_ok = false;
    }
    builder.lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontLibrary;

    const BLACK: [u8; 3] = [0, 0, 0];

    fn body(text: &str) -> Run {
        Run::text(text, FontKey::base(false, false), 10.0, BLACK)
    }

    fn atomic(text: &str) -> Run {
        Run::atomic(text, FontKey::base(false, false), 10.0, BLACK)
    }

    fn texts(line: &Line) -> Vec<&str> {
        line.segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn words_of_one_run_share_a_segment() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        let lines = wrap_paragraphs(&[vec![body("one two three")]], 500.0, 1.2, true, &metrics);
        assert_eq!(lines.len(), 1);
        assert_eq!(texts(&lines[0]), ["one two three"]);
    }

    #[test]
    fn wraps_between_words_never_inside() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        // "aaaa" = 4 * 5.56 = 22.24pt; two words plus a space do not fit in 40pt
        let lines = wrap_paragraphs(&[vec![body("aaaa aaaa aaaa")]], 40.0, 1.2, true, &metrics);
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(texts(line), ["aaaa"]);
            assert!(line.width <= 40.0);
        }
        assert!(lines[2].last_in_paragraph);
        assert!(!lines[0].last_in_paragraph);
    }

    #[test]
    fn atomic_runs_are_kept_whole_and_glued_by_nbsp() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        let runs = vec![
            atomic("\u{25ba}\u{a0}"),
            atomic("https://vimeo.com/77477140"),
            atomic(" "),
            atomic("(Vimeo video)"),
        ];
        let lines = wrap_paragraphs(&[runs.clone()], 1000.0, 1.2, true, &metrics);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            texts(&lines[0]),
            ["\u{25ba}\u{a0}", "https://vimeo.com/77477140", " ", "(Vimeo video)"]
        );

        // Too narrow for everything: the label moves down, the URL stays with the icon.
        let narrow = wrap_paragraphs(&[runs], 140.0, 1.2, true, &metrics);
        assert_eq!(narrow.len(), 2);
        assert_eq!(texts(&narrow[0])[..2], ["\u{25ba}\u{a0}", "https://vimeo.com/77477140"]);
        assert_eq!(texts(&narrow[1]), ["(Vimeo video)"]);
    }

    #[test]
    fn space_between_runs_is_not_duplicated() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        let lines = wrap_paragraphs(
            &[vec![body("bold"), body(", then "), body("more")]],
            500.0,
            1.2,
            true,
            &metrics,
        );
        let segs = &lines[0].segments;
        assert_eq!(texts(&lines[0]), ["bold", ", then", "more"]);
        // ", then" follows "bold" directly, "more" after the trailing space
        assert!((segs[1].x - segs[0].width).abs() < 1e-4);
        let space = metrics.width(" ", FontKey::base(false, false), 10.0);
        assert!((segs[2].x - (segs[1].x + segs[1].width + space)).abs() < 1e-4);
    }

    #[test]
    fn justify_mode_keeps_words_apart() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        let lines = wrap_paragraphs(&[vec![body("one two")]], 500.0, 1.2, false, &metrics);
        assert_eq!(texts(&lines[0]), ["one", "two"]);
    }

    #[test]
    fn empty_paragraph_has_no_lines_and_newline_breaks() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        assert!(wrap_paragraphs(&[vec![]], 100.0, 1.2, true, &metrics).is_empty());
        let lines = wrap_paragraphs(&[vec![body("a\nb")]], 100.0, 1.2, true, &metrics);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn line_height_follows_largest_run() {
        let lib = FontLibrary::builtin();
        let metrics = Metrics::new(&lib, 0.5);
        let big = Run::text("Big", FontKey::base(true, false), 20.0, BLACK);
        let lines = wrap_paragraphs(&[vec![body("small "), big]], 500.0, 1.2, true, &metrics);
        assert!((lines[0].height - 24.0).abs() < 1e-4);
        assert!(lines[0].baseline > 14.0);
    }
}
