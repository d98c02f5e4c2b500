mod common;

use flowpage_pdf::flow::{EPSILON, Placed};
use flowpage_pdf::fonts::FontLibrary;
use flowpage_pdf::model::{AdmonitionKind, BlockId, ContentBlock, InlineRun, TableCell, TableRow};
use flowpage_pdf::pdf::{PageSink, PdfSink, RecordingSink};
use flowpage_pdf::{Config, Converter, Document, Error};

fn row(header: bool, cells: &[&str]) -> TableRow {
    TableRow {
        header,
        cells: cells
            .iter()
            .map(|c| TableCell {
                runs: vec![InlineRun::plain(*c)],
            })
            .collect(),
    }
}

fn long_document() -> Document {
    let mut blocks = Vec::new();
    for section in 0..6 {
        blocks.push(ContentBlock::heading(2, format!("Section {section}")));
        for para in 0..4 {
            blocks.push(common::paragraph(&common::words(&format!("s{section}p{para}w"), 90)));
        }
    }
    Document::new(blocks)
}

#[test]
fn pages_never_overflow_their_content_area() {
    common::init_logging();
    let config = Config::default();
    let usable = config.page.content_height();
    let converter = Converter::new(config).unwrap();
    let layout = common::layout(&converter, &long_document());

    assert!(layout.pages.len() > 1);
    for page in &layout.pages {
        assert!(
            page.used_height <= usable + EPSILON,
            "page {} used {:.2}pt of {usable:.2}pt",
            page.number,
            page.used_height
        );
    }
    let numbers: Vec<usize> = layout.pages.iter().map(|p| p.number).collect();
    assert_eq!(numbers, (1..=layout.pages.len()).collect::<Vec<_>>());
}

#[test]
fn every_word_is_placed_exactly_once() {
    common::init_logging();
    let converter = Converter::new(Config::default()).unwrap();
    let document = long_document();
    let sink = common::record(&converter, &document);

    let placed: Vec<String> = sink
        .lines()
        .iter()
        .flat_map(|l| l.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .collect();
    let mut expected = Vec::new();
    for block in &document.blocks {
        for run in &block.runs {
            expected.extend(run.text.split_whitespace().map(str::to_string));
        }
    }
    assert_eq!(placed, expected);
}

#[test]
fn layout_is_deterministic() {
    common::init_logging();
    let converter = Converter::new(Config::default()).unwrap();
    let document = long_document();
    let first = common::layout(&converter, &document);
    let second = common::layout(&converter, &document);
    assert_eq!(first, second);
}

#[test]
fn oversized_image_reports_block_and_page_capacity() {
    common::init_logging();
    let dir = common::scratch_dir("tall");
    common::write_png(&dir, "tall.png", 20, 400);
    let config = Config::default();
    let usable = config.page.content_height();
    let mut document = Document::new(vec![
        ContentBlock::image("tall.png")
            .with_attr("width", "100")
            .with_attr("height", "2000"),
        common::paragraph("never reached"),
    ]);
    document.base_dir = Some(dir);

    let err = Converter::new(config)
        .unwrap()
        .layout(&document, &FontLibrary::builtin())
        .unwrap_err();
    match err {
        Error::Layout {
            block,
            needed,
            available,
        } => {
            assert_eq!(block, BlockId::root(0));
            assert!((needed - 2000.0).abs() < 0.01);
            assert!((available - usable).abs() < 0.01);
        }
        other => panic!("expected a layout error, got {other}"),
    }
}

#[test]
fn table_header_repeats_on_continuation_pages() {
    common::init_logging();
    let mut rows = vec![row(true, &["Name", "Value"])];
    for i in 0..120 {
        rows.push(row(false, &[&format!("item{i}"), &format!("{}", i * 3)]));
    }
    let document = Document::new(vec![ContentBlock::table(rows)]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);

    assert!(sink.page_count() >= 2);
    for page in 1..=sink.page_count() {
        let texts = sink.page_texts(page);
        assert_eq!(texts.first().copied(), Some("Name"), "page {page}");
        assert_eq!(texts.iter().filter(|t| **t == "Name").count(), 1);
    }
    let items: usize = (1..=sink.page_count())
        .map(|p| sink.page_texts(p).iter().filter(|t| t.starts_with("item")).count())
        .sum();
    assert_eq!(items, 120);
}

#[test]
fn admonition_label_is_drawn_once() {
    common::init_logging();
    let children = (0..8)
        .map(|i| common::paragraph(&common::words(&format!("n{i}w"), 120)))
        .collect();
    let document = Document::new(vec![ContentBlock::admonition(AdmonitionKind::Note, children)]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);

    assert!(sink.page_count() >= 2);
    assert!(sink.page_texts(1).contains(&"NOTE"));
    for page in 2..=sink.page_count() {
        assert!(!sink.page_texts(page).contains(&"NOTE"), "page {page}");
    }
}

#[test]
fn admonition_children_stay_in_document_order() {
    common::init_logging();
    let document = Document::new(vec![ContentBlock::admonition(
        AdmonitionKind::Note,
        vec![
            common::paragraph("first"),
            ContentBlock::video("/m/clip.mp4"),
            common::paragraph("last"),
        ],
    )]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);
    assert_eq!(
        sink.texts(),
        ["NOTE", "first", "\u{25ba}\u{a0}", "/m/clip.mp4", " ", "(video)", "last"]
    );
}

#[test]
fn forced_break_starts_a_new_page() {
    common::init_logging();
    let converter = Converter::new(Config::default()).unwrap();
    let document = Document::new(vec![
        common::paragraph("first"),
        ContentBlock::page_break(),
        common::paragraph("second"),
    ]);
    let sink = common::record(&converter, &document);
    assert_eq!(sink.page_count(), 2);
    assert_eq!(sink.page_texts(2), ["second"]);
}

#[test]
fn leading_break_does_not_emit_a_blank_page() {
    common::init_logging();
    let converter = Converter::new(Config::default()).unwrap();
    let document = Document::new(vec![
        ContentBlock::page_break(),
        common::paragraph("only"),
    ]);
    let layout = common::layout(&converter, &document);
    assert_eq!(layout.pages.len(), 1);
    assert!(layout.pages[0].items.iter().any(|item| matches!(item, Placed::Text(t) if t.text == "only")));
}

#[test]
fn empty_document_still_has_one_page() {
    common::init_logging();
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &Document::new(Vec::new()));
    assert_eq!(sink.page_count(), 1);
}

#[test]
fn sinks_reject_a_second_finish() {
    let mut recording = RecordingSink::new();
    recording.start_page(100.0, 100.0).unwrap();
    recording.finish().unwrap();
    assert!(matches!(recording.finish(), Err(Error::Usage(_))));

    let fonts = FontLibrary::builtin();
    let mut pdf = PdfSink::new(&fonts);
    pdf.start_page(100.0, 100.0).unwrap();
    let bytes = pdf.finish().unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(matches!(pdf.finish(), Err(Error::Usage(_))));
}
