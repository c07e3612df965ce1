use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::planner::{CropWindow, SubjectBox};

const SUBJECT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const WINDOW_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const STROKE_WIDTH: i32 = 3;

/// Draw the detection boxes (red) and the planned crop window (green)
/// on a copy of the source image.
///
/// The window is drawn last so it stays visible where it rides over a
/// subject box.
pub fn render_overlay(img: &RgbImage, boxes: &[SubjectBox], window: &CropWindow) -> RgbImage {
    let mut canvas = img.clone();
    let (w, h) = canvas.dimensions();

    for b in boxes {
        let x0 = (b.x1 * w as f64) as i32;
        let y0 = (b.y1 * h as f64) as i32;
        let bw = ((b.x2 - b.x1) * w as f64) as i32;
        let bh = ((b.y2 - b.y1) * h as f64) as i32;
        draw_thick_rect(&mut canvas, x0, y0, bw, bh, SUBJECT_COLOR);
    }

    draw_thick_rect(
        &mut canvas,
        window.x0 as i32,
        window.y0 as i32,
        window.width() as i32,
        window.height() as i32,
        WINDOW_COLOR,
    );

    canvas
}

/// Hollow rectangle with the stroke growing inward, like the historical
/// overlays.
fn draw_thick_rect(img: &mut RgbImage, x0: i32, y0: i32, width: i32, height: i32, color: Rgb<u8>) {
    for inset in 0..STROKE_WIDTH {
        let w = width - 2 * inset;
        let h = height - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(x0 + inset, y0 + inset).of_size(w as u32, h as u32),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn white_canvas() -> RgbImage {
        ImageBuffer::from_pixel(100, 100, WHITE)
    }

    fn full_frame_window() -> CropWindow {
        CropWindow {
            x0: 0.0,
            y0: 0.0,
            x1: 100.0,
            y1: 100.0,
        }
    }

    #[test]
    fn subject_boxes_are_outlined_in_red() {
        let img = white_canvas();
        let boxes = [SubjectBox::new(0.2, 0.2, 0.6, 0.6)];
        let out = render_overlay(&img, &boxes, &full_frame_window());

        // Box maps to (20,20)-(60,60); the stroke covers three pixels
        // inward from the edge.
        assert_eq!(*out.get_pixel(20, 40), SUBJECT_COLOR);
        assert_eq!(*out.get_pixel(21, 40), SUBJECT_COLOR);
        assert_eq!(*out.get_pixel(22, 40), SUBJECT_COLOR);
        assert_eq!(*out.get_pixel(23, 40), WHITE);
        assert_eq!(*out.get_pixel(40, 40), WHITE);
    }

    #[test]
    fn crop_window_is_outlined_in_green() {
        let img = white_canvas();
        let window = CropWindow {
            x0: 10.0,
            y0: 10.0,
            x1: 90.0,
            y1: 90.0,
        };
        let out = render_overlay(&img, &[], &window);

        assert_eq!(*out.get_pixel(10, 50), WINDOW_COLOR);
        assert_eq!(*out.get_pixel(12, 50), WINDOW_COLOR);
        assert_eq!(*out.get_pixel(13, 50), WHITE);
        assert_eq!(*out.get_pixel(50, 50), WHITE);
    }

    #[test]
    fn window_stroke_wins_where_it_overlaps_a_subject() {
        let img = white_canvas();
        // Box edge and window edge coincide at x = 30.
        let boxes = [SubjectBox::new(0.3, 0.3, 0.7, 0.7)];
        let window = CropWindow {
            x0: 30.0,
            y0: 30.0,
            x1: 70.0,
            y1: 70.0,
        };
        let out = render_overlay(&img, &boxes, &window);

        assert_eq!(*out.get_pixel(30, 50), WINDOW_COLOR);
    }

    #[test]
    fn source_image_is_not_mutated() {
        let img = white_canvas();
        let boxes = [SubjectBox::new(0.1, 0.1, 0.9, 0.9)];
        let _ = render_overlay(&img, &boxes, &full_frame_window());

        assert_eq!(*img.get_pixel(10, 50), WHITE);
    }

    #[test]
    fn degenerate_boxes_do_not_panic() {
        let img = white_canvas();
        let boxes = [SubjectBox::new(0.5, 0.5, 0.5, 0.5)];
        let window = CropWindow {
            x0: 99.0,
            y0: 99.0,
            x1: 100.0,
            y1: 100.0,
        };
        let out = render_overlay(&img, &boxes, &window);
        assert_eq!(out.dimensions(), (100, 100));
    }
}
