//! Themed-icon compositing: back, scaled default, mask, upon.

use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Composites one themed icon.
///
/// The pipeline is: start from the back image (or a transparent canvas the
/// size of the default icon), draw the default icon scaled by `scale` and
/// centered, knock out the mask's opaque region (DST_OUT), then draw the
/// upon overlay on top. Any part may be absent.
pub fn compose(
    default_icon: &RgbaImage,
    back: Option<&RgbaImage>,
    mask: Option<&RgbaImage>,
    upon: Option<&RgbaImage>,
    scale: f32,
) -> RgbaImage {
    let mut result = match back {
        Some(back) => back.clone(),
        None => RgbaImage::new(default_icon.width(), default_icon.height()),
    };
    let (width, height) = (result.width(), result.height());

    let scale = scale.clamp(0.01, 1.0);
    let scaled_w = ((width as f32) * scale).round().max(1.0) as u32;
    let scaled_h = ((height as f32) * scale).round().max(1.0) as u32;
    let scaled = imageops::resize(default_icon, scaled_w, scaled_h, FilterType::Triangle);
    let x = i64::from((width - scaled_w) / 2);
    let y = i64::from((height - scaled_h) / 2);
    imageops::overlay(&mut result, &scaled, x, y);

    if let Some(mask) = mask {
        apply_dst_out_mask(&mut result, mask);
    }

    if let Some(upon) = upon {
        if upon.dimensions() == result.dimensions() {
            imageops::overlay(&mut result, upon, 0, 0);
        } else {
            let fitted = imageops::resize(upon, width, height, FilterType::Triangle);
            imageops::overlay(&mut result, &fitted, 0, 0);
        }
    }
    result
}

/// DST_OUT: destination pixels survive in proportion to the mask's
/// transparency. Fully opaque mask pixels erase, fully transparent keep.
fn apply_dst_out_mask(target: &mut RgbaImage, mask: &RgbaImage) {
    let fitted;
    let mask = if mask.dimensions() == target.dimensions() {
        mask
    } else {
        fitted = imageops::resize(mask, target.width(), target.height(), FilterType::Triangle);
        &fitted
    };
    for (pixel, mask_pixel) in target.pixels_mut().zip(mask.pixels()) {
        let keep = 255 - u16::from(mask_pixel.0[3]);
        pixel.0[3] = ((u16::from(pixel.0[3]) * keep) / 255) as u8;
    }
}
