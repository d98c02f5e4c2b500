mod common;

use flowpage_pdf::model::ContentBlock;
use flowpage_pdf::{Config, Converter, Document, IconMode};

const YOUTUBE_ID: &str = "EJ09pSuA9hw";
const VIMEO_ID: &str = "77477140";

fn doc(blocks: Vec<ContentBlock>) -> Document {
    Document::new(blocks)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[test]
fn local_video_with_poster_is_replaced_by_image_at_declared_size() {
    common::init_logging();
    let dir = common::scratch_dir("poster");
    common::write_png(&dir, "logo.png", 64, 64);
    let mut document = doc(vec![
        ContentBlock::video("asciidoctor.mp4")
            .with_attr("poster", "logo.png")
            .with_attr("width", "200")
            .with_attr("height", "200"),
    ]);
    document.base_dir = Some(dir);

    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);
    let images = sink.images();
    assert_eq!(images.len(), 1);
    let (page, _, _, w, h) = images[0];
    assert_eq!(page, 1);
    assert_eq!((w, h), (200.0, 200.0));
    assert!(sink.annotations().is_empty());
    assert!(sink.texts().is_empty());
}

#[test]
fn local_video_without_poster_shows_play_glyph_and_path() {
    common::init_logging();
    let dir = common::scratch_dir("local");
    let config = Config {
        icon_mode: IconMode::Font,
        ..Config::default()
    };
    let mut document = doc(vec![ContentBlock::video("asciidoctor.mp4")]);
    document.base_dir = Some(dir.clone());

    let sink = common::record(&Converter::new(config).unwrap(), &document);
    let path = dir.join("asciidoctor.mp4").display().to_string();
    assert_eq!(sink.lines(), [format!("\u{f04b}\u{a0}{path} (video)")]);
    assert!(sink.annotations().is_empty());
}

#[test]
fn local_video_without_poster_shows_caption_below() {
    common::init_logging();
    let dir = common::scratch_dir("caption");
    let config = Config {
        icon_mode: IconMode::Font,
        ..Config::default()
    };
    let mut document = doc(vec![
        ContentBlock::video("asciidoctor.mp4").with_title("Asciidoctor training"),
    ]);
    document.base_dir = Some(dir.clone());

    let sink = common::record(&Converter::new(config).unwrap(), &document);
    let path = dir.join("asciidoctor.mp4").display().to_string();
    assert_eq!(
        sink.lines(),
        [
            format!("\u{f04b}\u{a0}{path} (video)"),
            "Asciidoctor training".to_string()
        ]
    );
}

#[test]
fn local_audio_in_text_mode_uses_marker() {
    common::init_logging();
    let document = doc(vec![ContentBlock::audio("/media/theme.ogg")]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);
    assert_eq!(
        sink.texts(),
        ["\u{25ba}\u{a0}", "/media/theme.ogg", " ", "(audio)"]
    );
}

#[test]
fn youtube_without_uri_read_is_replaced_by_link() {
    common::init_logging();
    let fetcher = common::CannedFetcher::default();
    let converter = Converter::new(Config::default())
        .unwrap()
        .with_fetcher(Box::new(fetcher.clone()));
    let document = doc(vec![
        ContentBlock::video(YOUTUBE_ID).with_attr("poster", "youtube"),
    ]);

    let sink = common::record(&converter, &document);
    let watch = format!("https://www.youtube.com/watch?v={YOUTUBE_ID}");
    assert_eq!(
        sink.texts(),
        ["\u{25ba}\u{a0}", watch.as_str(), " ", "(YouTube video)"]
    );
    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].0, 1);
    assert_eq!(annotations[0].2, watch);
    assert!(fetcher.asked.borrow().is_empty());
}

#[test]
fn vimeo_without_uri_read_is_replaced_by_link() {
    common::init_logging();
    let document = doc(vec![
        ContentBlock::video(VIMEO_ID).with_attr("poster", "vimeo"),
    ]);
    let sink = common::record(&Converter::new(Config::default()).unwrap(), &document);
    let watch = format!("https://vimeo.com/{VIMEO_ID}");
    assert_eq!(
        sink.texts(),
        ["\u{25ba}\u{a0}", watch.as_str(), " ", "(Vimeo video)"]
    );
    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].2, watch);
}

#[test]
fn youtube_poster_with_uri_read_links_the_image() {
    common::init_logging();
    let fetcher = common::CannedFetcher::default().with(
        &format!("https://img.youtube.com/vi/{YOUTUBE_ID}/maxresdefault.jpg"),
        common::png_bytes(320, 180),
    );
    let config = common::network_config();
    let content_width = config.page.content_width();
    let converter = Converter::new(config)
        .unwrap()
        .with_fetcher(Box::new(fetcher));
    let document = doc(vec![
        ContentBlock::video(YOUTUBE_ID)
            .with_attr("poster", "youtube")
            .with_attr("pdfwidth", "100%"),
    ]);

    let sink = common::record(&converter, &document);
    let images = sink.images();
    assert_eq!(images.len(), 1);
    let (_, x, y, w, h) = images[0];
    assert!((w - content_width).abs() < 0.01);

    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    let (page, rect, uri) = annotations[0];
    assert_eq!(page, 1);
    assert_eq!(uri, format!("https://www.youtube.com/watch?v={YOUTUBE_ID}"));
    assert!((rect.x1 - x).abs() < 0.01);
    assert!((rect.y1 - y).abs() < 0.01);
    assert!((rect.width() - w).abs() < 0.01);
    assert!((rect.height() - h).abs() < 0.01);
    assert!(sink.texts().is_empty());
}

#[test]
fn vimeo_poster_follows_metadata_thumbnail() {
    common::init_logging();
    let thumb = "https://i.vimeocdn.com/video/452001751_640.jpg";
    let meta = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><videos><video><id>{VIMEO_ID}</id>\
         <thumbnail_large>{thumb}</thumbnail_large></video></videos>"
    );
    let fetcher = common::CannedFetcher::default()
        .with(
            &format!("https://vimeo.com/api/v2/video/{VIMEO_ID}.xml"),
            meta.into_bytes(),
        )
        .with(thumb, common::png_bytes(64, 36));
    let converter = Converter::new(common::network_config())
        .unwrap()
        .with_fetcher(Box::new(fetcher));
    let document = doc(vec![
        ContentBlock::video(VIMEO_ID)
            .with_attr("poster", "vimeo")
            .with_attr("pdfwidth", "100%"),
    ]);

    let sink = common::record(&converter, &document);
    assert_eq!(sink.images().len(), 1);
    let annotations = sink.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].2, format!("https://vimeo.com/{VIMEO_ID}"));
}

#[test]
fn vimeo_skeleton_response_falls_back_to_link() {
    common::init_logging();
    let fetcher = common::CannedFetcher::default().with(
        &format!("https://vimeo.com/api/v2/video/{VIMEO_ID}.xml"),
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<videos/>".to_vec(),
    );
    let converter = Converter::new(common::network_config())
        .unwrap()
        .with_fetcher(Box::new(fetcher.clone()));
    let document = doc(vec![
        ContentBlock::video(VIMEO_ID)
            .with_attr("poster", "vimeo")
            .with_attr("pdfwidth", "100%"),
    ]);

    let sink = common::record(&converter, &document);
    assert!(sink.images().is_empty());
    assert_eq!(
        sink.lines(),
        [format!("\u{25ba}\u{a0}https://vimeo.com/{VIMEO_ID} (Vimeo video)")]
    );
    assert_eq!(sink.annotations().len(), 1);
    assert_eq!(fetcher.asked.borrow().len(), 1);
}

#[test]
fn failed_youtube_fetch_falls_back_to_link() {
    common::init_logging();
    let converter = Converter::new(common::network_config())
        .unwrap()
        .with_fetcher(Box::new(common::CannedFetcher::default()));
    let document = doc(vec![
        ContentBlock::video(YOUTUBE_ID).with_attr("poster", "youtube"),
    ]);
    let sink = common::record(&converter, &document);
    assert_eq!(sink.texts()[3], "(YouTube video)");
    assert_eq!(sink.annotations().len(), 1);
}

#[test]
fn rendered_pdf_has_one_link_annotation() {
    common::init_logging();
    let document = doc(vec![
        common::paragraph("Watch the talk:"),
        ContentBlock::video(YOUTUBE_ID).with_attr("poster", "youtube"),
    ]);
    let bytes = Converter::new(Config::default())
        .unwrap()
        .render(&document)
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(count(&bytes, b"/Subtype /Link"), 1);
    let watch = format!("https://www.youtube.com/watch?v={YOUTUBE_ID}");
    assert_eq!(count(&bytes, watch.as_bytes()), 1);
}

fn page_content(bytes: &[u8]) -> Vec<u8> {
    common::inflated_streams(bytes)
        .into_iter()
        .filter(|s| common::find(s, b"BT").is_some())
        .flatten()
        .collect()
}

#[test]
fn rendered_pdf_draws_text_marker() {
    common::init_logging();
    let document = doc(vec![
        ContentBlock::video(YOUTUBE_ID).with_attr("poster", "youtube"),
    ]);
    let bytes = Converter::new(Config::default())
        .unwrap()
        .render(&document)
        .unwrap();
    assert!(common::find(&bytes, b"/BaseFont /ZapfDingbats").is_some());
    let content = page_content(&bytes);
    assert!(common::find(&content, b"<E4> Tj").is_some());
    assert!(common::find(&content, b"<A0> Tj").is_some());
    assert!(common::find(&content, b"((YouTube video)) Tj").is_some());
}

#[test]
fn rendered_pdf_draws_play_icon_without_icon_font() {
    common::init_logging();
    let config = Config {
        icon_mode: IconMode::Font,
        ..Config::default()
    };
    let document = doc(vec![ContentBlock::video("/m/asciidoctor.mp4")]);
    let bytes = Converter::new(config).unwrap().render(&document).unwrap();
    let content = page_content(&bytes);
    let icon = common::find(&content, b"<E4> Tj").expect("play icon drawn");
    let path = common::find(&content, b"(/m/asciidoctor.mp4) Tj").expect("path drawn");
    assert!(icon < path);
}
