//! Shared helpers for the module tests: synthetic forms and hand-built
//! markers.

use image::{Rgb, RgbImage};

use crate::detection::Marker;
use crate::geometry::BoundingBox;

pub(crate) fn blank_form(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

pub(crate) fn draw_block(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, Rgb([0, 0, 0]));
        }
    }
}

pub(crate) fn marker_at(cx: f64, cy: f64, confidence: f64) -> Marker {
    Marker {
        polygon: Vec::new(),
        area: 900.0,
        bbox: BoundingBox {
            x: cx as i32 - 15,
            y: cy as i32 - 15,
            width: 30,
            height: 30,
        },
        center: (cx, cy),
        confidence,
    }
}
