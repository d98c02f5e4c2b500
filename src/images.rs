use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    /// Anything else the `image` crate can decode; re-encoded when embedded.
    Other,
}

/// An image payload with its sniffed format and pixel size.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub data: Arc<[u8]>,
    pub format: ImageFormat,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImageData {
    /// Sniff format and dimensions without decoding pixel data.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let reader = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| format!("cannot guess image format: {e}"))?;
        let format = match reader.format() {
            Some(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
            Some(image::ImageFormat::Png) => ImageFormat::Png,
            Some(_) => ImageFormat::Other,
            None => return Err("unrecognized image format".into()),
        };
        let (pixel_width, pixel_height) = reader
            .into_dimensions()
            .map_err(|e| format!("cannot read image dimensions: {e}"))?;
        if pixel_width == 0 || pixel_height == 0 {
            return Err("image has zero size".into());
        }
        Ok(Self {
            data: bytes.into(),
            format,
            pixel_width,
            pixel_height,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        Self::from_bytes(bytes)
    }

    /// Intrinsic size in points, one pixel per point (72 dpi).
    pub fn intrinsic_size(&self) -> (f32, f32) {
        (self.pixel_width as f32, self.pixel_height as f32)
    }
}
