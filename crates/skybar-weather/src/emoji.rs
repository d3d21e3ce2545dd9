//! Weather symbols as plain Unicode, optionally with a Twemoji image.

use crate::types::{Glyph, WeatherIcon};

const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const TWEMOJI_BASE: &str = "https://twemoji.maxcdn.com/2/72x72";

/// Image URL for a code point on the Twemoji CDN.
pub fn twemoji_url(code_point: u32) -> String {
    format!("{}/{:x}.png", TWEMOJI_BASE, code_point)
}

/// Render `icon`. Unknown icons give an empty glyph and no image.
pub fn glyph(icon: WeatherIcon, use_twemoji: bool) -> Glyph {
    let Some(code_point) = icon.code_point() else {
        return Glyph::default();
    };
    let Some(symbol) = char::from_u32(code_point) else {
        return Glyph::default();
    };

    Glyph {
        text: format!("{}{}", symbol, VARIATION_SELECTOR_16),
        image_url: use_twemoji.then(|| twemoji_url(code_point)),
    }
}

/// Shorthand for mapping a provider code straight to a glyph.
pub fn glyph_for_code(code: Option<&str>, use_twemoji: bool) -> Glyph {
    glyph(WeatherIcon::from_provider_code(code.unwrap_or_default()), use_twemoji)
}
