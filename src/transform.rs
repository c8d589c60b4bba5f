use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::rect::Rect;

use crate::orientation::Rotation;

/// Luminance threshold above which a pixel is treated as part of the printed
/// reference template rather than ink
const TEMPLATE_LUMA_THRESHOLD: f64 = 200.0;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 3;

/// Rotate by a quarter turn without interpolation
pub fn rotate_exact(image: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => imageops::rotate90(image),
        Rotation::Deg180 => imageops::rotate180(image),
        Rotation::Deg270 => imageops::rotate270(image),
    }
}

/// Interpolated rotation for angles that are not quarter turns. The
/// orientation resolver never produces such angles; this path exists for
/// callers that supply their own.
pub fn rotate_arbitrary(image: &RgbImage, degrees: f32) -> RgbImage {
    rotate_about_center(
        image,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
    )
}

/// Crop the half-open rectangle [x_min, x_max) x [y_min, y_max), clamped to
/// the image bounds
pub fn crop_clamped(image: &RgbImage, x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> RgbImage {
    let (width, height) = image.dimensions();

    let x0 = x_min.clamp(0, width as i32) as u32;
    let y0 = y_min.clamp(0, height as i32) as u32;
    let x1 = x_max.clamp(0, width as i32) as u32;
    let y1 = y_max.clamp(0, height as i32) as u32;

    let w = x1.saturating_sub(x0).max(1);
    let h = y1.saturating_sub(y0).max(1);

    imageops::crop_imm(image, x0, y0, w, h).to_image()
}

fn luminance(pixel: &Rgb<u8>) -> f64 {
    0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64
}

/// Blend near-white pixels toward white so the printed reference template
/// fades while genuine ink stays untouched
pub fn lighten_template(region: &mut RgbImage, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0) as f64;

    for pixel in region.pixels_mut() {
        if luminance(pixel) > TEMPLATE_LUMA_THRESHOLD {
            for channel in pixel.0.iter_mut() {
                let blended = *channel as f64 * alpha + 255.0 * (1.0 - alpha);
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Draw a hollow rectangle a few pixels thick around the given box
pub fn draw_region_box(image: &mut RgbImage, x_min: i32, y_min: i32, x_max: i32, y_max: i32) {
    let (width, height) = image.dimensions();

    for offset in 0..BOX_THICKNESS {
        let x = (x_min - offset).max(0);
        let y = (y_min - offset).max(0);
        let right = (x_max + offset).min(width as i32 - 1);
        let bottom = (y_max + offset).min(height as i32 - 1);

        if right <= x || bottom <= y {
            continue;
        }

        let rect = Rect::at(x, y).of_size((right - x) as u32, (bottom - y) as u32);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}
