//! Colour settings parsing.

use image::Rgba;

use crate::error::RenderError;

/// Fully transparent pixel used for the `transparent` background sentinel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Parse a configured colour.
///
/// Accepts `#RRGGBB`, `#RRGGBBAA`, `transparent`, `white` and `black`
/// (case-insensitive).
pub fn parse_color(raw: &str) -> Result<Rgba<u8>, RenderError> {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "transparent" => return Ok(TRANSPARENT),
        "white" => return Ok(Rgba([255, 255, 255, 255])),
        "black" => return Ok(Rgba([0, 0, 0, 255])),
        _ => {}
    }

    let invalid = || RenderError::InvalidColor(raw.to_string());
    let hex = trimmed.strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert_eq!(parse_color("#152B42").unwrap(), Rgba([0x15, 0x2B, 0x42, 255]));
        assert_eq!(parse_color("#152b4280").unwrap(), Rgba([0x15, 0x2B, 0x42, 0x80]));
    }

    #[test]
    fn named_colors() {
        assert_eq!(parse_color("Transparent").unwrap()[3], 0);
        assert_eq!(parse_color("white").unwrap(), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn malformed_colors() {
        for raw in ["152B42", "#152B4", "#GG0000", "", "#ééé"] {
            assert!(parse_color(raw).is_err(), "{raw} should be rejected");
        }
    }
}
