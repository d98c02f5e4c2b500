use std::path::{Path, PathBuf};

use crate::config::{BlockStyle, Config, IconMode};
use crate::error::Error;
use crate::flow::{Fragment, FragmentBody, ImageBlock, Run, TextBlock};
use crate::fonts::FontKey;
use crate::images::ImageData;
use crate::model::{BlockId, BlockKind, ContentBlock};

const PLAY_GLYPH: &str = "\u{f04b}";
const AUDIO_GLYPH: &str = "\u{f028}";
const NBSP: &str = "\u{a0}";
const TEXT_MARKER: &str = "\u{25ba}\u{a0}";

/// Payloads below this size are placeholders, not posters.
const MIN_POSTER_BYTES: usize = 128;
/// Images narrower or shorter than this are tracking pixels or placeholders.
const MIN_POSTER_PIXELS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    LocalFile,
    YouTube,
    Vimeo,
    /// Any other http(s) URL.
    Generic,
}

/// A length attribute: absolute points or a share of the content width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Length {
    Points(f32),
    Percent(f32),
}

impl Length {
    /// Accepts `50%`, `120`, `120pt`, `120px` (one pixel per point), `2in`, `5cm`, `40mm`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let units: [(&str, f32); 5] = [("pt", 1.0), ("px", 1.0), ("in", 72.0), ("cm", 28.3465), ("mm", 2.83465)];
        if let Some(number) = value.strip_suffix('%') {
            return number.trim().parse::<f32>().ok().filter(|n| *n > 0.0).map(Length::Percent);
        }
        let (number, factor) = units
            .iter()
            .find_map(|(suffix, factor)| value.strip_suffix(suffix).map(|n| (n, *factor)))
            .unwrap_or((value, 1.0));
        number
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|n| *n > 0.0)
            .map(|n| Length::Points(n * factor))
    }

    pub fn resolve(self, reference_width: f32) -> f32 {
        match self {
            Length::Points(pt) => pt,
            Length::Percent(pct) => reference_width * pct / 100.0,
        }
    }
}

/// Media block attributes, validated once before layout.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaReference {
    pub id: String,
    pub kind: MediaKind,
    pub provider: Provider,
    /// Poster image path or URL.
    pub poster: Option<String>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub pdfwidth: Option<Length>,
    pub caption: Option<String>,
}

fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

fn points_attr(block: &ContentBlock, name: &str) -> Option<f32> {
    let value = block.attr(name)?;
    match Length::parse(value) {
        Some(Length::Points(pt)) => Some(pt),
        _ => {
            log::warn!("ignoring {name}={value:?} on {} block", block.kind.name());
            None
        }
    }
}

impl MediaReference {
    pub fn from_block(id: &BlockId, block: &ContentBlock) -> Result<Self, Error> {
        let kind = match block.kind {
            BlockKind::Video => MediaKind::Video,
            BlockKind::Audio => MediaKind::Audio,
            _ => {
                return Err(Error::Usage(format!(
                    "block {id} is a {} block, not media",
                    block.kind.name()
                )));
            }
        };
        let target = block.target.as_deref().map(str::trim).unwrap_or("");
        if target.is_empty() {
            return Err(Error::Usage(format!(
                "{} block {id} has no target",
                block.kind.name()
            )));
        }

        let named = |value: &str| match value {
            "youtube" => Some(Provider::YouTube),
            "vimeo" => Some(Provider::Vimeo),
            _ => None,
        };
        let poster_attr = block.attr("poster").map(str::trim).filter(|p| !p.is_empty());
        let mut provider = block.attr("provider").and_then(named);
        let mut poster = None;
        if let Some(value) = poster_attr {
            match named(value) {
                Some(p) => provider = provider.or(Some(p)),
                None => poster = Some(value.to_string()),
            }
        }
        let provider = provider.unwrap_or(if is_url(target) {
            Provider::Generic
        } else {
            Provider::LocalFile
        });

        let pdfwidth = block.attr("pdfwidth").and_then(|value| {
            let parsed = Length::parse(value);
            if parsed.is_none() {
                log::warn!("ignoring pdfwidth={value:?} on block {id}");
            }
            parsed
        });

        Ok(Self {
            id: target.to_string(),
            kind,
            provider,
            poster,
            width: points_attr(block, "width"),
            height: points_attr(block, "height"),
            pdfwidth,
            caption: block.title.clone().filter(|t| !t.trim().is_empty()),
        })
    }
}

/// What the conversion is allowed to do while resolving media.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub allow_uri_read: bool,
    pub icon_mode: IconMode,
}

impl Capabilities {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allow_uri_read: config.allow_uri_read,
            icon_mode: config.icon_mode,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network access is disabled")]
    Disabled,
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response larger than {0} bytes")]
    TooLarge(u64),
}

/// Best-effort retrieval of remote posters and metadata.
pub trait PosterFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for conversions without network access.
pub struct NoFetch;

impl PosterFetcher for NoFetch {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Disabled)
    }
}

#[cfg(feature = "net")]
const MAX_FETCH_BYTES: u64 = 16 * 1024 * 1024;

/// Blocking HTTP fetcher with a per-request timeout.
#[cfg(feature = "net")]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

#[cfg(feature = "net")]
impl HttpFetcher {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

#[cfg(feature = "net")]
impl PosterFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        use std::io::Read;

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            other => FetchError::Transport(other.to_string()),
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FETCH_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        if bytes.len() as u64 > MAX_FETCH_BYTES {
            return Err(FetchError::TooLarge(MAX_FETCH_BYTES));
        }
        Ok(bytes)
    }
}

/// Reject placeholder payloads before they reach layout.
pub fn validate_poster(bytes: Vec<u8>) -> Result<ImageData, String> {
    if bytes.len() < MIN_POSTER_BYTES {
        return Err(format!("{} byte payload is too small to be a poster", bytes.len()));
    }
    let image = ImageData::from_bytes(bytes)?;
    if image.pixel_width < MIN_POSTER_PIXELS || image.pixel_height < MIN_POSTER_PIXELS {
        return Err(format!(
            "{}x{} image is a placeholder",
            image.pixel_width, image.pixel_height
        ));
    }
    Ok(image)
}

/// URL of the large thumbnail named by a Vimeo metadata document.
pub fn vimeo_thumbnail(xml: &str) -> Result<String, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| format!("bad metadata: {e}"))?;
    doc.descendants()
        .find(|n| n.has_tag_name("thumbnail_large"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|url| is_url(url))
        .map(str::to_string)
        .ok_or_else(|| "metadata has no thumbnail".to_string())
}

/// Outcome of resolving one reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Poster {
        image: ImageData,
        /// Watch URL covering the poster, for remote providers.
        link: Option<String>,
    },
    Fallback {
        /// Resolved path or URL shown in the text.
        reference: String,
        link: Option<String>,
        label: &'static str,
    },
}

/// Reads posters from disk or through the fetcher.
pub struct PosterLoader<'a> {
    base_dir: Option<&'a Path>,
    fetcher: &'a dyn PosterFetcher,
}

impl<'a> PosterLoader<'a> {
    pub fn new(base_dir: Option<&'a Path>, fetcher: &'a dyn PosterFetcher) -> Self {
        Self { base_dir, fetcher }
    }

    pub fn resolve_path(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        match self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn local(&self, target: &str) -> Result<ImageData, String> {
        ImageData::from_path(&self.resolve_path(target))
    }

    pub fn remote(&self, url: &str) -> Result<Vec<u8>, String> {
        self.fetcher.fetch(url).map_err(|e| format!("{url}: {e}"))
    }

    fn poster(&self, target: &str, caps: &Capabilities) -> Result<ImageData, String> {
        if is_url(target) {
            if !caps.allow_uri_read {
                return Err(format!("{target}: remote poster needs allow-uri-read"));
            }
            validate_poster(self.remote(target)?)
        } else {
            self.local(target)
        }
    }
}

impl Provider {
    pub fn label(self, kind: MediaKind) -> &'static str {
        match (self, kind) {
            (_, MediaKind::Audio) => "(audio)",
            (Provider::YouTube, MediaKind::Video) => "(YouTube video)",
            (Provider::Vimeo, MediaKind::Video) => "(Vimeo video)",
            (Provider::LocalFile | Provider::Generic, MediaKind::Video) => "(video)",
        }
    }

    /// Canonical page for a remote reference.
    pub fn watch_url(self, id: &str) -> Option<String> {
        match self {
            Provider::YouTube => Some(format!("https://www.youtube.com/watch?v={id}")),
            Provider::Vimeo => Some(format!("https://vimeo.com/{id}")),
            Provider::Generic => Some(id.to_string()),
            Provider::LocalFile => None,
        }
    }

    fn fetch_poster(self, id: &str, loader: &PosterLoader) -> Result<ImageData, String> {
        match self {
            Provider::YouTube => {
                let url = format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg");
                validate_poster(loader.remote(&url)?)
            }
            Provider::Vimeo => {
                let meta = loader.remote(&format!("https://vimeo.com/api/v2/video/{id}.xml"))?;
                let xml = String::from_utf8_lossy(&meta);
                let thumbnail = vimeo_thumbnail(&xml)?;
                validate_poster(loader.remote(&thumbnail)?)
            }
            Provider::LocalFile | Provider::Generic => Err("provider has no poster service".into()),
        }
    }

    pub fn resolve(
        self,
        reference: &MediaReference,
        caps: &Capabilities,
        loader: &PosterLoader,
    ) -> Resolution {
        if let Some(poster) = &reference.poster {
            match loader.poster(poster, caps) {
                Ok(image) => return Resolution::Poster { image, link: None },
                Err(e) => log::warn!("poster for {} unusable, linking instead: {e}", reference.id),
            }
        }

        let remote = matches!(self, Provider::YouTube | Provider::Vimeo);
        if remote && caps.allow_uri_read {
            match self.fetch_poster(&reference.id, loader) {
                Ok(image) => {
                    return Resolution::Poster {
                        image,
                        link: self.watch_url(&reference.id),
                    };
                }
                Err(e) => log::warn!("no poster for {}: {e}", reference.id),
            }
        }

        let label = self.label(reference.kind);
        match self {
            Provider::LocalFile => Resolution::Fallback {
                reference: loader.resolve_path(&reference.id).display().to_string(),
                link: None,
                label,
            },
            _ => {
                let url = self.watch_url(&reference.id).unwrap_or_else(|| reference.id.clone());
                Resolution::Fallback {
                    reference: url.clone(),
                    link: Some(url),
                    label,
                }
            }
        }
    }
}

/// Fits an image into the content box. Explicit sizes win, then `pdfwidth`,
/// then the intrinsic size; anything wider than the content is scaled down.
pub fn fit_image(
    image: &ImageData,
    width: Option<f32>,
    height: Option<f32>,
    pdfwidth: Option<Length>,
    content_width: f32,
    max_height: f32,
) -> (f32, f32) {
    let (iw, ih) = image.intrinsic_size();
    let aspect = ih / iw;
    let (mut w, mut h, explicit) = match (width, height) {
        (Some(w), Some(h)) => (w, h, true),
        (Some(w), None) => (w, w * aspect, true),
        (None, Some(h)) => (h / aspect, h, true),
        (None, None) => match pdfwidth {
            Some(len) => {
                let w = len.resolve(content_width);
                (w, w * aspect, false)
            }
            None => (iw, ih, false),
        },
    };
    if w > content_width {
        let scale = content_width / w;
        w *= scale;
        h *= scale;
    }
    if !explicit && h > max_height && max_height > 0.0 {
        let scale = max_height / h;
        w *= scale;
        h *= scale;
    }
    (w, h)
}

/// Turns media references into flow fragments.
pub struct MediaResolver<'a> {
    config: &'a Config,
    caps: Capabilities,
    loader: PosterLoader<'a>,
}

impl<'a> MediaResolver<'a> {
    pub fn new(config: &'a Config, base_dir: Option<&'a Path>, fetcher: &'a dyn PosterFetcher) -> Self {
        Self {
            config,
            caps: Capabilities::from_config(config),
            loader: PosterLoader::new(base_dir, fetcher),
        }
    }

    pub fn loader(&self) -> &PosterLoader<'a> {
        &self.loader
    }

    pub fn resolve(&self, reference: &MediaReference) -> Resolution {
        reference.provider.resolve(reference, &self.caps, &self.loader)
    }

    fn icon_runs(&self, kind: MediaKind, style: &BlockStyle) -> Vec<Run> {
        let base = FontKey::base(style.bold, style.italic);
        match self.caps.icon_mode {
            IconMode::Font => {
                let glyph = match kind {
                    MediaKind::Video => PLAY_GLYPH,
                    MediaKind::Audio => AUDIO_GLYPH,
                };
                vec![
                    Run::atomic(glyph, FontKey::icon(), style.font_size, style.color),
                    Run::atomic(NBSP, base, style.font_size, style.color),
                ]
            }
            IconMode::Text => vec![Run::atomic(TEXT_MARKER, base, style.font_size, style.color)],
        }
    }

    fn caption_block(&self, caption: &str, style: &BlockStyle) -> TextBlock {
        let caption_style = BlockStyle::caption(self.config, style.align);
        let run = Run::text(
            caption,
            FontKey::base(caption_style.bold, caption_style.italic),
            caption_style.font_size,
            caption_style.color,
        );
        TextBlock::single(vec![run], caption_style.align, caption_style.line_height)
    }

    pub fn fragments(&self, block: &BlockId, reference: &MediaReference, style: &BlockStyle) -> Vec<Fragment> {
        match self.resolve(reference) {
            Resolution::Poster { image, link } => {
                let caption = reference.caption.as_deref().map(|c| self.caption_block(c, style));
                let caption_reserve = if caption.is_some() {
                    self.config.caption_size * self.config.line_height + self.config.block_gap * 0.5
                } else {
                    0.0
                };
                let page = &self.config.page;
                let (width, height) = fit_image(
                    &image,
                    reference.width,
                    reference.height,
                    reference.pdfwidth,
                    page.content_width(),
                    page.content_height() - caption_reserve,
                );
                let body = FragmentBody::Image(ImageBlock {
                    image,
                    width,
                    height,
                    align: style.align,
                    link,
                    caption,
                    caption_gap: self.config.block_gap * 0.5,
                });
                vec![
                    Fragment::new(block.clone(), body)
                        .spaced(style.space_before, style.space_after)
                        .kept_together(),
                ]
            }
            Resolution::Fallback {
                reference: shown,
                link,
                label,
            } => {
                let base = FontKey::base(style.bold, style.italic);
                let mut runs = self.icon_runs(reference.kind, style);
                let target = match link {
                    Some(uri) => Run::atomic(shown, base, style.font_size, self.config.link_color).with_link(uri),
                    None => Run::atomic(shown, base, style.font_size, style.color),
                };
                runs.push(target);
                runs.push(Run::atomic(" ", base, style.font_size, style.color));
                runs.push(Run::atomic(label, base, style.font_size, style.color));

                let line = TextBlock::single(runs, style.align, style.line_height);
                let mut main = Fragment::new(block.clone(), FragmentBody::Text(line));
                if style.keep_together {
                    main = main.kept_together();
                }
                match &reference.caption {
                    Some(caption) => {
                        let caption = Fragment::new(
                            block.clone(),
                            FragmentBody::Text(self.caption_block(caption, style)),
                        )
                        .spaced(0.0, style.space_after);
                        vec![main.spaced(style.space_before, 0.0).kept_with_next(), caption]
                    }
                    None => vec![main.spaced(style.space_before, style.space_after)],
                }
            }
        }
    }
}
