mod common;

use flowpage_pdf::model::{ContentBlock, InlineRun};
use flowpage_pdf::{Config, Converter, Document};

const DOCS: &str = "https://docs.example.org/guide";

fn linked_paragraph(before: &str, link_text: &str, uri: &str, after: &str) -> ContentBlock {
    ContentBlock::paragraph(vec![
        InlineRun::plain(before),
        InlineRun::plain(link_text).linked(uri),
        InlineRun::plain(after),
    ])
}

#[test]
fn short_link_gets_one_rectangle() {
    common::init_logging();
    let document = Document::new(vec![linked_paragraph("Read the ", "user guide", DOCS, " first.")]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);

    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    let (page, rect, uri) = annotations[0];
    assert_eq!(page, 1);
    assert_eq!(uri, DOCS);
    assert!(rect.width() > 0.0);
    assert!(rect.height() > 0.0);
}

#[test]
fn wrapped_link_gets_one_rectangle_per_line() {
    common::init_logging();
    let link_text = common::words("linked", 60);
    let document = Document::new(vec![linked_paragraph("See ", &link_text, DOCS, " for more.")]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);

    let annotations = sink.annotations();
    assert!(annotations.len() > 1);
    assert!(annotations.iter().all(|(_, _, uri)| *uri == DOCS));
    let mut bottoms: Vec<f32> = annotations.iter().map(|(_, r, _)| r.y1).collect();
    bottoms.dedup_by(|a, b| (*a - *b).abs() < 0.01);
    assert_eq!(bottoms.len(), annotations.len());
    for pair in annotations.windows(2) {
        assert!(pair[1].1.y2 <= pair[0].1.y1 + 0.01);
    }
}

#[test]
fn adjacent_links_to_different_targets_stay_separate() {
    common::init_logging();
    let document = Document::new(vec![ContentBlock::paragraph(vec![
        InlineRun::plain("one").linked("https://one.example"),
        InlineRun::plain("two").linked("https://two.example"),
    ])]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);

    let uris: Vec<&str> = sink.annotations().iter().map(|(_, _, uri)| *uri).collect();
    assert_eq!(uris, ["https://one.example", "https://two.example"]);
}

#[test]
fn link_is_annotated_on_the_page_it_lands_on() {
    common::init_logging();
    let mut blocks: Vec<ContentBlock> = (0..12)
        .map(|i| common::paragraph(&common::words(&format!("f{i}w"), 80)))
        .collect();
    blocks.push(linked_paragraph("Finally, ", "the reference", DOCS, "."));
    let document = Document::new(blocks);
    let converter = Converter::new(Config::default()).unwrap();
    let sink = common::record(&converter, &document);

    assert!(sink.page_count() >= 2);
    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].0, sink.page_count());
    assert!(sink
        .page_texts(sink.page_count())
        .iter()
        .any(|t| t.contains("reference")));
}

#[test]
fn pdf_carries_one_annotation_per_rectangle() {
    common::init_logging();
    let link_text = common::words("wrapped", 50);
    let document = Document::new(vec![
        linked_paragraph("Start at ", "home", "https://home.example", "."),
        linked_paragraph("Then ", &link_text, DOCS, "."),
    ]);
    let converter = Converter::new(Config::default()).unwrap();
    let expected = common::layout(&converter, &document).links.len();
    assert!(expected > 2);

    let bytes = converter.render(&document).unwrap();
    let count = bytes
        .windows(b"/Subtype /Link".len())
        .filter(|w| *w == b"/Subtype /Link")
        .count();
    assert_eq!(count, expected);
}
