use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::config::{FamilyConfig, FontConfig, FontSource};
use crate::error::Error;
use crate::metrics::{RawExtent, TextMeasure};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontRole {
    Base,
    Mono,
    Icon,
    /// Last resort for characters the other faces lack.
    Symbol,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    pub role: FontRole,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub const fn base(bold: bool, italic: bool) -> Self {
        Self {
            role: FontRole::Base,
            bold,
            italic,
        }
    }

    pub const fn mono(bold: bool, italic: bool) -> Self {
        Self {
            role: FontRole::Mono,
            bold,
            italic,
        }
    }

    pub const fn icon() -> Self {
        Self {
            role: FontRole::Icon,
            bold: false,
            italic: false,
        }
    }

    pub const fn symbol() -> Self {
        Self {
            role: FontRole::Symbol,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Builtin {
    Helvetica,
    Courier,
    ZapfDingbats,
}

impl Builtin {
    fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (Builtin::Helvetica, false, false) => "Helvetica",
            (Builtin::Helvetica, true, false) => "Helvetica-Bold",
            (Builtin::Helvetica, false, true) => "Helvetica-Oblique",
            (Builtin::Helvetica, true, true) => "Helvetica-BoldOblique",
            (Builtin::Courier, false, false) => "Courier",
            (Builtin::Courier, true, false) => "Courier-Bold",
            (Builtin::Courier, false, true) => "Courier-Oblique",
            (Builtin::Courier, true, true) => "Courier-BoldOblique",
            (Builtin::ZapfDingbats, _, _) => "ZapfDingbats",
        }
    }

    /// Byte for `ch` in the font's encoding, if it has a glyph.
    fn encode_char(self, ch: char) -> Option<u8> {
        match self {
            Builtin::Helvetica | Builtin::Courier => Some(char_to_winansi(ch)).filter(|&b| b >= 32),
            Builtin::ZapfDingbats => char_to_dingbat(ch),
        }
    }

    fn width_1000(self, byte: u8) -> f32 {
        match self {
            Builtin::Courier => 600.0,
            Builtin::Helvetica => helvetica_width(byte),
            Builtin::ZapfDingbats if byte == 0x20 => 278.0,
            // approximate: the arrowheads and geometric shapes run 760-840
            Builtin::ZapfDingbats => 790.0,
        }
    }

    fn ascender_1000(self) -> f32 {
        match self {
            Builtin::Helvetica => 718.0,
            Builtin::Courier => 629.0,
            Builtin::ZapfDingbats => 800.0,
        }
    }

    fn descender_1000(self) -> f32 {
        match self {
            Builtin::Helvetica => -207.0,
            Builtin::Courier => -157.0,
            Builtin::ZapfDingbats => -200.0,
        }
    }
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi bytes.
fn helvetica_width(b: u8) -> f32 {
    match b {
        32 | 160 => 278.0,                    // space, nbsp
        33..=47 => 333.0,                     // punctuation
        48..=57 => 556.0,                     // digits
        58..=64 => 333.0,                     // more punctuation
        73 | 74 => 278.0,                     // I J (narrow uppercase)
        77 => 833.0,                          // M (wide)
        65..=90 => 667.0,                     // uppercase A-Z (average)
        91..=96 => 333.0,                     // brackets etc.
        102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
        109 | 119 => 833.0,                   // m w (wide)
        97..=122 => 556.0,                    // lowercase a-z (average)
        _ => 556.0,
    }
}

enum FontBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for FontBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FontBytes::Owned(v) => v,
            FontBytes::Mapped(m) => m,
        }
    }
}

struct TrueTypeFace {
    name: String,
    data: Arc<FontBytes>,
    index: u32,
    units: f32,
    ascender: f32,
    descender: f32,
}

enum LoadedFace {
    Builtin {
        family: Builtin,
        bold: bool,
        italic: bool,
    },
    TrueType(TrueTypeFace),
}

impl LoadedFace {
    fn advance_1000(&self, face: Option<&Face>, ch: char) -> Option<f32> {
        match self {
            LoadedFace::Builtin { family, .. } => family.encode_char(ch).map(|b| family.width_1000(b)),
            LoadedFace::TrueType(tt) => {
                let face = face?;
                let gid = face.glyph_index(ch)?;
                face.glyph_hor_advance(gid)
                    .map(|adv| adv as f32 / tt.units * 1000.0)
            }
        }
    }

    fn vertical_1000(&self) -> (f32, f32) {
        match self {
            LoadedFace::Builtin { family, .. } => (family.ascender_1000(), family.descender_1000()),
            LoadedFace::TrueType(tt) => (tt.ascender, tt.descender),
        }
    }

    fn parse(&self) -> Option<Face<'_>> {
        match self {
            LoadedFace::TrueType(tt) => Face::parse(&tt.data, tt.index).ok(),
            LoadedFace::Builtin { .. } => None,
        }
    }
}

/// Part of a run drawn in one face. `font` is `None` for characters no
/// available face can draw.
#[derive(Clone, Debug, PartialEq)]
pub struct FacePiece {
    pub font: Option<FontKey>,
    pub text: String,
}

const ZAPF_DINGBATS: LoadedFace = LoadedFace::Builtin {
    family: Builtin::ZapfDingbats,
    bold: false,
    italic: false,
};

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

/// Fonts available to one conversion, keyed by role and style.
pub struct FontLibrary {
    faces: HashMap<FontKey, LoadedFace>,
}

impl FontLibrary {
    /// Library using only the built-in standard fonts.
    pub fn builtin() -> Self {
        let mut faces = HashMap::new();
        for (bold, italic) in STYLES {
            faces.insert(
                FontKey::base(bold, italic),
                LoadedFace::Builtin {
                    family: Builtin::Helvetica,
                    bold,
                    italic,
                },
            );
            faces.insert(
                FontKey::mono(bold, italic),
                LoadedFace::Builtin {
                    family: Builtin::Courier,
                    bold,
                    italic,
                },
            );
        }
        faces.insert(FontKey::symbol(), ZAPF_DINGBATS);
        Self { faces }
    }

    pub fn load(config: &FontConfig) -> Result<Self, Error> {
        let t0 = std::time::Instant::now();
        let mut loader = Loader {
            dirs: config.search_dirs(),
            lookup: None,
            files: HashMap::new(),
        };
        let mut faces = HashMap::new();
        for (role, family, fallback) in [
            (FontRole::Base, &config.base, Builtin::Helvetica),
            (FontRole::Mono, &config.mono, Builtin::Courier),
        ] {
            for (bold, italic) in STYLES {
                let key = FontKey { role, bold, italic };
                faces.insert(key, loader.load_variant(family, bold, italic, fallback)?);
            }
        }
        if let Some(source) = &config.icon {
            let family = FamilyConfig::single(source.clone());
            faces.insert(
                FontKey::icon(),
                loader.load_variant(&family, false, false, Builtin::Helvetica)?,
            );
        }
        let symbol = match &config.symbol {
            Some(source) => {
                let family = FamilyConfig::single(source.clone());
                loader.load_variant(&family, false, false, Builtin::ZapfDingbats)?
            }
            None => ZAPF_DINGBATS,
        };
        faces.insert(FontKey::symbol(), symbol);
        log::debug!(
            "font library: {} faces from {} files in {:.1}ms",
            faces.len(),
            loader.files.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(Self { faces })
    }

    /// Split `text` into runs of characters sharing the face that draws them:
    /// the face of `key` where it has the glyph, the symbol face otherwise.
    pub fn split_by_face(&self, text: &str, key: FontKey) -> Vec<FacePiece> {
        let primary = self.faces.get(&key);
        let primary_parsed = primary.and_then(LoadedFace::parse);
        let symbol = self.faces.get(&FontKey::symbol()).filter(|_| key.role != FontRole::Symbol);
        let symbol_parsed = symbol.and_then(LoadedFace::parse);

        let mut pieces: Vec<FacePiece> = Vec::new();
        for ch in text.chars() {
            let covers = |face: Option<&LoadedFace>, parsed: Option<&Face>| {
                face.is_some_and(|f| f.advance_1000(parsed, ch).is_some())
            };
            let font = if covers(primary, primary_parsed.as_ref()) {
                Some(key)
            } else if covers(symbol, symbol_parsed.as_ref()) {
                Some(FontKey::symbol())
            } else {
                None
            };
            match pieces.last_mut() {
                Some(last) if last.font == font => last.text.push(ch),
                _ => pieces.push(FacePiece {
                    font,
                    text: ch.to_string(),
                }),
            }
        }
        pieces
    }

    /// Ascent and descent (negative) of a font at 1000 units/em.
    fn vertical_metrics(&self, key: FontKey) -> (f32, f32) {
        self.faces
            .get(&key)
            .map(LoadedFace::vertical_1000)
            .unwrap_or((750.0, -250.0))
    }

    pub(crate) fn embed(
        &self,
        key: FontKey,
        pdf: &mut Pdf,
        pdf_name: String,
        used_chars: &HashSet<char>,
        alloc: &mut impl FnMut() -> Ref,
    ) -> Option<EmbeddedFont> {
        let t0 = std::time::Instant::now();
        let face = self.faces.get(&key)?;
        let font_ref = alloc();
        let encoder = match face {
            LoadedFace::TrueType(tt) => {
                match embed_truetype(pdf, font_ref, tt, used_chars, alloc) {
                    Some(map) => Encoder::Gids(map),
                    None => {
                        log::warn!("Embedding {} failed; using Helvetica", tt.name);
                        write_type1(pdf, font_ref, Builtin::Helvetica, key.bold, key.italic);
                        Encoder::Builtin(Builtin::Helvetica)
                    }
                }
            }
            LoadedFace::Builtin {
                family,
                bold,
                italic,
            } => {
                write_type1(pdf, font_ref, *family, *bold, *italic);
                Encoder::Builtin(*family)
            }
        };
        log::debug!(
            "embed font {key:?} as {pdf_name}: {} chars → {:.1}ms",
            used_chars.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Some(EmbeddedFont {
            pdf_name,
            font_ref,
            encoder,
        })
    }
}

const STYLES: [(bool, bool); 4] = [(false, false), (true, false), (false, true), (true, true)];

impl TextMeasure for FontLibrary {
    fn measure(&self, text: &str, font: FontKey, size: f32) -> RawExtent {
        let (ascender, descender) = self.vertical_metrics(font);
        let mut extent = RawExtent {
            width: 0.0,
            ascent: ascender * size / 1000.0,
            descent: descender * size / 1000.0,
            missing: 0,
        };
        for piece in self.split_by_face(text, font) {
            let Some(loaded) = piece.font.and_then(|key| self.faces.get(&key)) else {
                extent.missing += piece.text.chars().count();
                continue;
            };
            let parsed = loaded.parse();
            for ch in piece.text.chars() {
                match loaded.advance_1000(parsed.as_ref(), ch) {
                    Some(w) => extent.width += w * size / 1000.0,
                    None => extent.missing += 1,
                }
            }
        }
        extent
    }
}

struct Loader {
    dirs: Vec<PathBuf>,
    lookup: Option<FontLookup>,
    files: HashMap<PathBuf, Arc<FontBytes>>,
}

impl Loader {
    fn load_variant(
        &mut self,
        family: &FamilyConfig,
        bold: bool,
        italic: bool,
        fallback: Builtin,
    ) -> Result<LoadedFace, Error> {
        match family.variant(bold, italic) {
            FontSource::Helvetica => Ok(LoadedFace::Builtin {
                family: Builtin::Helvetica,
                bold,
                italic,
            }),
            FontSource::Courier => Ok(LoadedFace::Builtin {
                family: Builtin::Courier,
                bold,
                italic,
            }),
            FontSource::ZapfDingbats => Ok(ZAPF_DINGBATS),
            FontSource::File(path) => self
                .open_truetype(path, 0)
                .map(LoadedFace::TrueType)
                .ok_or_else(|| Error::Config(format!("cannot load font file {}", path.display()))),
            FontSource::Family(name) => {
                let found = self
                    .find_font_file(name, bold, italic)
                    .and_then(|(path, index)| self.open_truetype(&path, index));
                match found {
                    Some(face) => Ok(LoadedFace::TrueType(face)),
                    None => {
                        log::warn!(
                            "Font not found: {name} bold={bold} italic={italic}; using {:?}",
                            fallback
                        );
                        Ok(LoadedFace::Builtin {
                            family: fallback,
                            bold,
                            italic,
                        })
                    }
                }
            }
        }
    }

    fn open_truetype(&mut self, path: &Path, index: u32) -> Option<TrueTypeFace> {
        let data = match self.files.get(path) {
            Some(data) => Arc::clone(data),
            None => {
                let file = std::fs::File::open(path).ok()?;
                // SAFETY: font files are opened read-only and not modified while mapped
                let bytes = match unsafe { Mmap::map(&file) } {
                    Ok(map) => FontBytes::Mapped(map),
                    Err(_) => FontBytes::Owned(std::fs::read(path).ok()?),
                };
                let data = Arc::new(bytes);
                self.files.insert(path.to_path_buf(), Arc::clone(&data));
                data
            }
        };
        let face = Face::parse(&data, index).ok()?;
        let units = face.units_per_em() as f32;
        let name = font_family_name(&face).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Embedded".into())
        });
        Some(TrueTypeFace {
            name,
            index,
            units,
            ascender: face.ascender() as f32 / units * 1000.0,
            descender: face.descender() as f32 / units * 1000.0,
            data: Arc::clone(&data),
        })
    }

    /// Look up a font file by family name and style using the OS/2 table metadata index.
    /// Falls back to the regular variant if the requested bold/italic is not available.
    fn find_font_file(&mut self, font_name: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
        let dirs = &self.dirs;
        let index = self.lookup.get_or_insert_with(|| scan_font_dirs(dirs));
        let key = font_name.to_lowercase();
        index
            .get(&(key.clone(), bold, italic))
            .or_else(|| {
                if bold || italic {
                    index.get(&(key, false, false))
                } else {
                    None
                }
            })
            .cloned()
    }
}

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family) separates "Noto Sans Mono" from "Noto Sans"; ID 16 groups them.
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"))
}

fn scan_font_dirs(dirs: &[PathBuf]) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut visited: HashSet<PathBuf> = HashSet::new();

    let mut stack: Vec<PathBuf> = dirs.to_vec();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: mapped read-only for the duration of the scan
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = if is_font_collection(&path) {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited.len(),
        files_scanned,
        index.len(),
    );
    index
}

enum Encoder {
    Builtin(Builtin),
    Gids(HashMap<char, u16>),
}

pub(crate) struct EmbeddedFont {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    encoder: Encoder,
}

impl EmbeddedFont {
    /// Content-stream bytes for `text`: glyph IDs for embedded faces, the
    /// standard font's single-byte encoding otherwise.
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.encoder {
            Encoder::Gids(map) => encode_as_gids(text, map),
            Encoder::Builtin(Builtin::ZapfDingbats) => text.chars().filter_map(char_to_dingbat).collect(),
            Encoder::Builtin(_) => to_winansi_bytes(text),
        }
    }
}

fn write_type1(pdf: &mut Pdf, font_ref: Ref, family: Builtin, bold: bool, italic: bool) {
    let base_font = family.base_font(bold, italic);
    let mut font = pdf.type1_font(font_ref);
    font.base_font(Name(base_font.as_bytes()));
    // ZapfDingbats keeps its built-in encoding
    if family != Builtin::ZapfDingbats {
        font.encoding_predefined(Name(b"WinAnsiEncoding"));
    }
}

/// ZapfDingbats code for the media and list markers it can stand in for.
/// Icon-font media glyphs map to the arrowhead.
fn char_to_dingbat(c: char) -> Option<u8> {
    match c {
        ' ' | '\u{a0}' => Some(0x20),
        '\u{2605}' => Some(0x48),
        '\u{25cf}' => Some(0x6c),
        '\u{25a0}' => Some(0x6e),
        '\u{25b2}' => Some(0x73),
        '\u{25bc}' => Some(0x74),
        '\u{25c6}' => Some(0x75),
        '\u{2713}' => Some(0x33),
        '\u{2714}' => Some(0x34),
        '\u{2717}' => Some(0x37),
        '\u{27a4}' | '\u{25b6}' | '\u{25ba}' | '\u{f04b}' | '\u{f028}' => Some(0xe4),
        _ => None,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes; unmappable chars are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(char_to_winansi)
        .filter(|&b| b >= 32)
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let Some(&gid) = char_to_gid.get(&ch) else {
            continue;
        };
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

/// Embed a TrueType/OpenType face as a CIDFont (Type0 composite) with Identity-H encoding,
/// subsetted to the glyphs in `used_chars`. Returns the char → new GID map.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    tt: &TrueTypeFace,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(&tt.data, tt.index).ok()?;
    let units = tt.units;
    let to_1000 = |v: f32| v / units * 1000.0;

    let cap_height = face
        .capital_height()
        .map(|h| to_1000(h as f32))
        .unwrap_or(700.0);
    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        to_1000(bb.x_min as f32),
        to_1000(bb.y_min as f32),
        to_1000(bb.x_max as f32),
        to_1000(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();
    for ch in chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            if char_to_gid.insert(ch, new_gid).is_none() {
                let w = face
                    .glyph_hor_advance(gid)
                    .map(|adv| to_1000(adv as f32))
                    .unwrap_or(0.0);
                gid_widths.push((new_gid, w));
            }
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(&tt.data, tt.index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {}: {e}; embedding full font", tt.name);
        tt.data.to_vec()
    });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name = tt.name.replace(' ', "");
    let flags = if face.is_monospaced() {
        pdf_writer::types::FontFlags::NON_SYMBOLIC | pdf_writer::types::FontFlags::FIXED_PITCH
    } else {
        pdf_writer::types::FontFlags::NON_SYMBOLIC
    };

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(flags)
        .bbox(bbox)
        .italic_angle(face.italic_angle())
        .ascent(tt.ascender)
        .descent(tt.descender)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };

    let cid_font_ref = alloc();
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}
