//! Crop window planning.
//!
//! Given the source image dimensions, the detected subject boxes (possibly
//! none) and the target canvas, compute the pixel-space rectangle to crop
//! before scaling. The window always has the target aspect ratio and always
//! lies inside the image. With no subjects the window is the covering
//! center crop; with subjects it is the smallest ratio-constrained
//! rectangle around the union of the boxes, grown by a margin and clamped
//! back into the image.

use serde::Serialize;

use crate::error::PrepError;

/// Immutable per-run output geometry.
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Fractional margin added around the subject safe region (0.05 = 5%).
    pub margin_fraction: f64,
}

impl TargetSpec {
    pub fn new(width: u32, height: u32, margin_fraction: f64) -> Self {
        Self {
            width,
            height,
            margin_fraction,
        }
    }

    /// Width over height of the target canvas.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A detected subject, normalized to `[0, 1]` on both axes with
/// `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl SubjectBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Pixel-space crop rectangle produced by the planner.
///
/// Invariants: `0 <= x0 < x1 <= image width`, `0 <= y0 < y1 <= image
/// height`, and `width() / height()` equals the target aspect ratio within
/// floating-point tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropWindow {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl CropWindow {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }

    /// Whether the pixel rectangle `(x1, y1, x2, y2)` lies inside the window.
    pub fn contains_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        self.x0 <= x1 && self.y0 <= y1 && self.x1 >= x2 && self.y1 >= y2
    }
}

/// Compute the crop window for one image.
///
/// With `boxes` empty this is the covering center crop: the largest
/// target-ratio rectangle that fits the image, centered. With boxes it is
/// the subject-anchored window described in the module docs.
///
/// Fails with [`PrepError::InvalidInput`] when the image or target has a
/// zero dimension. Pure and deterministic otherwise.
pub fn plan_crop_window(
    width: u32,
    height: u32,
    boxes: &[SubjectBox],
    target: &TargetSpec,
) -> Result<CropWindow, PrepError> {
    if width == 0 || height == 0 {
        return Err(PrepError::InvalidInput(format!(
            "image dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    if target.width == 0 || target.height == 0 {
        return Err(PrepError::InvalidInput(format!(
            "target dimensions must be positive, got {}x{}",
            target.width, target.height
        )));
    }

    let w = width as f64;
    let h = height as f64;

    if boxes.is_empty() {
        Ok(centered_window(w, h, target))
    } else {
        Ok(subject_window(w, h, boxes, target))
    }
}

/// Largest target-ratio rectangle that fits inside `w` x `h`, centered.
///
/// Equivalent to scaling the image by `max(tw/w, th/h)` to cover the canvas
/// and mapping the canvas back into source coordinates.
fn centered_window(w: f64, h: f64, target: &TargetSpec) -> CropWindow {
    let ratio = target.aspect_ratio();
    let (win_w, win_h) = if target.width as f64 * h >= target.height as f64 * w {
        // Width is the binding side of the covering scale.
        (w, w / ratio)
    } else {
        (h * ratio, h)
    };

    let x0 = (w - win_w) / 2.0;
    let y0 = (h - win_h) / 2.0;
    CropWindow {
        x0,
        y0,
        x1: x0 + win_w,
        y1: y0 + win_h,
    }
}

/// Subject-anchored window: minimal ratio-constrained cover of the box
/// union, grown by the margin, clamped to the image without breaking the
/// ratio, then slid fully inside the bounds.
fn subject_window(w: f64, h: f64, boxes: &[SubjectBox], target: &TargetSpec) -> CropWindow {
    let ratio = target.aspect_ratio();

    // Union of all subject boxes, in pixels: the safe region.
    let mut sx1 = f64::INFINITY;
    let mut sy1 = f64::INFINITY;
    let mut sx2 = f64::NEG_INFINITY;
    let mut sy2 = f64::NEG_INFINITY;
    for b in boxes {
        sx1 = sx1.min(b.x1 * w);
        sy1 = sy1.min(b.y1 * h);
        sx2 = sx2.max(b.x2 * w);
        sy2 = sy2.max(b.y2 * h);
    }
    let cx = (sx1 + sx2) / 2.0;
    let cy = (sy1 + sy2) / 2.0;
    let safe_w = sx2 - sx1;
    let safe_h = sy2 - sy1;

    // Tightest window at the target ratio that still covers the safe
    // region, then the configured breathing room around it.
    let mut win_w = safe_w.max(safe_h * ratio);
    let mut win_h = win_w / ratio;
    win_w *= 1.0 + target.margin_fraction;
    win_h *= 1.0 + target.margin_fraction;

    // Shrink-only clamp that keeps the ratio. When the safe region is
    // larger than the image allows at this ratio, the window ends up
    // smaller than the safe region and subjects get clipped.
    if win_h > h {
        win_h = h;
        win_w = win_h * ratio;
    }
    if win_w > w {
        win_w = w;
        win_h = win_w / ratio;
    }

    // Anchor on the safe-region center, then slide inside the image.
    let x0 = (cx - win_w / 2.0).clamp(0.0, w - win_w);
    let y0 = (cy - win_h / 2.0).clamp(0.0, h - win_h);
    CropWindow {
        x0,
        y0,
        x1: x0 + win_w,
        y1: y0 + win_h,
    }
}
