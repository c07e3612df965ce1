use anyhow::Result;
use fast_image_resize::{images::Image, ResizeOptions, Resizer};
use image::{imageops, ImageBuffer, Rgb, RgbImage};

use super::planner::CropWindow;

/// Extract the planned window from the source image.
///
/// Window coordinates are truncated to whole pixels and clamped to the
/// image, so the call is total; a degenerate window still yields at least
/// one pixel on each axis.
pub fn crop_to_window(img: &RgbImage, window: &CropWindow) -> RgbImage {
    let (img_w, img_h) = img.dimensions();

    let x = (window.x0.max(0.0) as u32).min(img_w.saturating_sub(1));
    let y = (window.y0.max(0.0) as u32).min(img_h.saturating_sub(1));
    let right = (window.x1.max(0.0) as u32).clamp(x + 1, img_w);
    let bottom = (window.y1.max(0.0) as u32).clamp(y + 1, img_h);

    imageops::crop_imm(img, x, y, right - x, bottom - y).to_image()
}

/// Resize to exactly `width` x `height` with the Lanczos3 convolution
/// (fast_image_resize's default), the same filter the batch has always
/// used for display output.
pub fn resize_exact(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_w, src_h) = img.dimensions();

    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!(
            "cannot resize to {}x{}: dimensions must be positive",
            width,
            height
        ));
    }
    if (src_w, src_h) == (width, height) {
        return Ok(img.clone());
    }

    let src = Image::from_vec_u8(
        src_w,
        src_h,
        img.as_raw().clone(),
        fast_image_resize::PixelType::U8x3,
    )?;
    let mut dst = Image::new(width, height, fast_image_resize::PixelType::U8x3);

    let mut resizer = Resizer::new();
    resizer.resize(&src, &mut dst, Some(&ResizeOptions::default()))?;

    ImageBuffer::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| anyhow::anyhow!("resized buffer has wrong length for {}x{}", width, height))
}

/// Scale the image to the largest size that fits entirely inside the
/// canvas, then paste it centered on a solid background.
pub fn letterbox_fit(
    img: &RgbImage,
    width: u32,
    height: u32,
    background: Rgb<u8>,
) -> Result<RgbImage> {
    let (src_w, src_h) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!(
            "cannot letterbox into {}x{}: dimensions must be positive",
            width,
            height
        ));
    }

    let scale = (width as f64 / src_w as f64).min(height as f64 / src_h as f64);
    let new_w = ((src_w as f64 * scale) as u32).clamp(1, width);
    let new_h = ((src_h as f64 * scale) as u32).clamp(1, height);

    let scaled = resize_exact(img, new_w, new_h)?;

    let mut canvas = ImageBuffer::from_pixel(width, height, background);
    let paste_x = (width - new_w) / 2;
    let paste_y = (height - new_h) / 2;
    imageops::replace(&mut canvas, &scaled, paste_x as i64, paste_y as i64);

    Ok(canvas)
}
