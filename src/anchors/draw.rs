//! Anchor visualization.
//!
//! Renders each centroid as a hollow rectangle on a blank canvas so the
//! derived shapes can be eyeballed. Rectangles share an origin region but
//! are stepped diagonally so overlapping anchors stay distinguishable.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::BoxShape;

const CANVAS_MARGIN: u32 = 50;
const OFFSET_STEP: i64 = 5;
const STROKE_PX: i64 = 2;

const PALETTE: [Rgb<u8>; 10] = [
    Rgb([255, 0, 0]),
    Rgb([255, 255, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 0, 255]),
    Rgb([0, 255, 255]),
    Rgb([55, 0, 0]),
    Rgb([255, 55, 0]),
    Rgb([0, 55, 0]),
    Rgb([0, 0, 25]),
    Rgb([0, 255, 55]),
];

/// Renders anchors onto a black canvas sized to the largest anchor plus a
/// margin. An empty anchor list yields a bare margin-sized canvas.
pub fn draw_anchors(anchors: &[BoxShape]) -> RgbImage {
    let max_w = anchors.iter().fold(0.0f64, |acc, a| acc.max(a.w));
    let max_h = anchors.iter().fold(0.0f64, |acc, a| acc.max(a.h));

    let width = max_w.ceil() as u32 + CANVAS_MARGIN;
    let height = max_h.ceil() as u32 + CANVAS_MARGIN;
    let mut canvas = RgbImage::new(width, height);

    let mut offset = OFFSET_STEP;
    for (idx, anchor) in anchors.iter().enumerate() {
        offset += OFFSET_STEP;
        let color = PALETTE[idx % PALETTE.len()];
        draw_box(&mut canvas, offset, anchor, color);
    }

    canvas
}

/// Draws one hollow rectangle spanning (offset, offset) to the anchor's
/// (w, h) corner, with a 2 px stroke built from nested 1 px rectangles.
fn draw_box(canvas: &mut RgbImage, offset: i64, anchor: &BoxShape, color: Rgb<u8>) {
    let right = anchor.w.round() as i64;
    let bottom = anchor.h.round() as i64;

    for inset in 0..STROKE_PX {
        let left = offset + inset;
        let top = offset + inset;
        let w = right - inset - left;
        let h = bottom - inset - top;
        if w <= 0 || h <= 0 {
            break;
        }

        draw_hollow_rect_mut(
            canvas,
            Rect::at(left as i32, top as i32).of_size(w as u32, h as u32),
            color,
        );
    }
}
