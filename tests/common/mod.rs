//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;

use ab_glyph::FontVec;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{Rgba, RgbaImage};
use trackor_qr::encoder::load_font;

/// DejaVu Sans, shipped under `tests/fixtures` with its license.
pub const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

/// Caption font for tests.
pub fn fixture_font() -> FontVec {
    load_font(Path::new(FIXTURE_FONT)).expect("fixture font loads")
}

/// Decode base64 PNG data into a bitmap.
pub fn decode_base64_png(data: &str) -> RgbaImage {
    let bytes = STANDARD.decode(data).expect("valid base64");
    image::load_from_memory(&bytes)
        .expect("valid PNG")
        .to_rgba8()
}

/// Read the QR payload of a rendered image.
///
/// The image is composited over white and padded so a narrow quiet zone does
/// not confuse the detector.
pub fn decode_qr(image: &RgbaImage) -> String {
    const PAD: u32 = 40;
    let width = image.width() + 2 * PAD;
    let height = image.height() + 2 * PAD;

    let luma = |p: &Rgba<u8>| -> u8 {
        let [r, g, b, a] = p.0.map(u32::from);
        let lum = (r * 299 + g * 587 + b * 114) / 1000;
        ((lum * a + 255 * (255 - a)) / 255) as u8
    };

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            let (x, y) = (x as u32, y as u32);
            let inside = (PAD..PAD + image.width()).contains(&x)
                && (PAD..PAD + image.height()).contains(&y);
            if inside {
                luma(image.get_pixel(x - PAD, y - PAD))
            } else {
                255
            }
        });
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR symbol");
    let (_meta, content) = grids[0].decode().expect("decodable QR symbol");
    content
}
