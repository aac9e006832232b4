//! QR image encoder.
//!
//! Renders a value as a QR symbol, optionally adds a title/value caption, and
//! returns the PNG base64-encoded for embedding in a JSON update payload.
//!
//! Symbol parameters (error-correction level, pixels per module, quiet zone)
//! are fixed when the encoder is built. Every call renders from scratch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trackor_qr::encoder::{QrEncoder, RenderStyle};
//!
//! let encoder = QrEncoder::new(RenderStyle::default());
//! let base64_png = encoder.encode("AST-001", None)?;
//! ```

pub mod caption;
pub mod color;

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use qrcode::{Color, EcLevel, QrCode};

use crate::config::RenderConfig;
use crate::error::RenderError;
use caption::{measure_text, CaptionLayout, TextExtent};
use color::parse_color;

/// Visual parameters of a rendered symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    /// Dark module colour, also used for the value caption
    pub fill: Rgba<u8>,
    /// Light module and canvas colour
    pub background: Rgba<u8>,
    /// Title caption colour
    pub title: Rgba<u8>,
    /// Pixels per module
    pub box_size: u32,
    /// Quiet zone, in modules
    pub border: u32,
    /// Caption font size in pixels
    pub font_size: f32,
    /// Error-correction level
    pub ec_level: EcLevel,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            fill: Rgba([0x15, 0x2B, 0x42, 255]),
            background: color::TRANSPARENT,
            title: Rgba([0xD9, 0x82, 0x2B, 255]),
            box_size: 10,
            border: 1,
            font_size: 24.0,
            ec_level: EcLevel::M,
        }
    }
}

impl RenderStyle {
    /// Build a style from the `[render]` settings.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        Ok(Self {
            fill: parse_color(&config.fill_color)?,
            background: parse_color(&config.back_color)?,
            title: parse_color(&config.title_color)?,
            box_size: config.box_size,
            border: config.border,
            font_size: config.font_size,
            ..Self::default()
        })
    }
}

/// A base64 PNG ready for upload, with its synthesized file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// `<value>.png`, with path-hostile characters replaced
    pub file_name: String,
    /// Base64 (standard alphabet, padded) PNG bytes
    pub data: String,
}

impl GeneratedImage {
    /// Name the image after the encoded value.
    pub fn new(value: &str, data: String) -> Self {
        Self {
            file_name: file_name_for(value),
            data,
        }
    }
}

/// File name for an encoded value: `<value>.png`.
///
/// Characters outside `[A-Za-z0-9._-]` become `_` so the name is safe as a
/// single path component; an empty value becomes `qrcode.png`.
pub fn file_name_for(value: &str) -> String {
    let stem: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "qrcode.png".to_string()
    } else {
        format!("{stem}.png")
    }
}

/// Renders QR images for record values.
pub struct QrEncoder {
    style: RenderStyle,
    font: Option<FontVec>,
}

impl QrEncoder {
    /// Encoder without caption support.
    pub fn new(style: RenderStyle) -> Self {
        Self { style, font: None }
    }

    /// Encoder that can draw captions with the given font.
    pub fn with_font(style: RenderStyle, font: FontVec) -> Self {
        Self {
            style,
            font: Some(font),
        }
    }

    /// Build from the `[render]` settings, loading the caption font if one is
    /// configured.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        let style = RenderStyle::from_config(config)?;
        match &config.font_path {
            Some(path) => Ok(Self::with_font(style, load_font(path)?)),
            None => Ok(Self::new(style)),
        }
    }

    /// Active style.
    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Render `value` (captioned when `title` is given) and return the PNG as
    /// base64.
    pub fn encode(&self, value: &str, title: Option<&str>) -> Result<String, RenderError> {
        Ok(STANDARD.encode(self.encode_png(value, title)?))
    }

    /// Render `value` and return raw PNG bytes.
    pub fn encode_png(&self, value: &str, title: Option<&str>) -> Result<Vec<u8>, RenderError> {
        let image = self.render(value, title)?;
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Render `value` to a bitmap.
    pub fn render(&self, value: &str, title: Option<&str>) -> Result<RgbaImage, RenderError> {
        let symbol = self.render_symbol(value)?;
        match title {
            Some(title) => self.add_caption(symbol, title, value),
            None => Ok(symbol),
        }
    }

    fn render_symbol(&self, value: &str) -> Result<RgbaImage, RenderError> {
        let code = QrCode::with_error_correction_level(value.as_bytes(), self.style.ec_level)?;
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let box_size = self.style.box_size;
        let border = self.style.border;
        let side = (modules + 2 * border) * box_size;

        let image = RgbaImage::from_fn(side, side, |x, y| {
            let (mx, my) = (x / box_size, y / box_size);
            let inside = (border..border + modules).contains(&mx)
                && (border..border + modules).contains(&my);
            if inside {
                let index = ((my - border) * modules + (mx - border)) as usize;
                if colors[index] == Color::Dark {
                    return self.style.fill;
                }
            }
            self.style.background
        });
        Ok(image)
    }

    /// Where the symbol and both captions land for a titled render of `value`.
    pub fn caption_layout(&self, value: &str, title: &str) -> Result<CaptionLayout, RenderError> {
        let font = self.font.as_ref().ok_or(RenderError::FontNotConfigured)?;
        let symbol_side = self.render_symbol(value)?.width();
        Ok(self.layout_for(font, symbol_side, title, value).0)
    }

    fn layout_for(
        &self,
        font: &FontVec,
        symbol_side: u32,
        title: &str,
        value: &str,
    ) -> (CaptionLayout, TextExtent, TextExtent) {
        let scale = PxScale::from(self.style.font_size);
        let title_extent = measure_text(font, scale, title);
        let value_extent = measure_text(font, scale, value);
        let layout = CaptionLayout::compute(
            symbol_side,
            title_extent.size(),
            value_extent.size(),
            self.style.box_size,
        );
        (layout, title_extent, value_extent)
    }

    fn add_caption(
        &self,
        symbol: RgbaImage,
        title: &str,
        value: &str,
    ) -> Result<RgbaImage, RenderError> {
        let font = self.font.as_ref().ok_or(RenderError::FontNotConfigured)?;
        let scale = PxScale::from(self.style.font_size);
        let (layout, title_extent, value_extent) =
            self.layout_for(font, symbol.width(), title, value);

        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, self.style.background);
        image::imageops::replace(
            &mut canvas,
            &symbol,
            i64::from(layout.symbol_origin.0),
            i64::from(layout.symbol_origin.1),
        );
        draw_text_mut(
            &mut canvas,
            self.style.title,
            layout.title.x - title_extent.min_x,
            layout.title.y - title_extent.min_y,
            scale,
            font,
            title,
        );
        draw_text_mut(
            &mut canvas,
            self.style.fill,
            layout.value.x - value_extent.min_x,
            layout.value.y - value_extent.min_y,
            scale,
            font,
            value,
        );
        Ok(canvas)
    }
}

/// Load a TrueType/OpenType font for captions.
pub fn load_font(path: &Path) -> Result<FontVec, RenderError> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))
}
