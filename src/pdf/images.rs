use std::io::Cursor;

use image::ImageDecoder;
use image::codecs::jpeg::JpegDecoder;
use pdf_writer::{Filter, Pdf, Ref};

use crate::error::Error;
use crate::images::{ImageData, ImageFormat};

/// Writes `image` as an XObject and returns its reference. JPEG data is
/// passed through; everything else is decoded to RGB with an optional SMask.
pub(super) fn embed_image(
    pdf: &mut Pdf,
    image: &ImageData,
    alloc: &mut impl FnMut() -> Ref,
) -> Result<Ref, Error> {
    if image.format == ImageFormat::Jpeg {
        if let Some(xobj_ref) = embed_jpeg(pdf, image, alloc) {
            return Ok(xobj_ref);
        }
        log::debug!("JPEG color model not passable; re-encoding");
    }

    let decoded = image::load_from_memory(&image.data)
        .map_err(|e| Error::Pdf(format!("cannot decode image: {e}")))?;
    let rgba = decoded.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb_data: Vec<u8> = rgba
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();
    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

    let smask_ref = if has_alpha {
        let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
        let mask_ref = alloc();
        let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(w as i32);
        mask.height(h as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        Some(mask_ref)
    } else {
        None
    };

    let xobj_ref = alloc();
    let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
    xobj.filter(Filter::FlateDecode);
    xobj.width(w as i32);
    xobj.height(h as i32);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
    if let Some(mask_ref) = smask_ref {
        xobj.s_mask(mask_ref);
    }
    Ok(xobj_ref)
}

fn embed_jpeg(pdf: &mut Pdf, image: &ImageData, alloc: &mut impl FnMut() -> Ref) -> Option<Ref> {
    let decoder = JpegDecoder::new(Cursor::new(&image.data[..])).ok()?;
    let gray = match decoder.color_type() {
        image::ColorType::L8 => true,
        image::ColorType::Rgb8 => false,
        _ => return None,
    };
    let xobj_ref = alloc();
    let mut xobj = pdf.image_xobject(xobj_ref, &image.data);
    xobj.filter(Filter::DctDecode);
    xobj.width(image.pixel_width as i32);
    xobj.height(image.pixel_height as i32);
    if gray {
        xobj.color_space().device_gray();
    } else {
        xobj.color_space().device_rgb();
    }
    xobj.bits_per_component(8);
    Some(xobj_ref)
}
