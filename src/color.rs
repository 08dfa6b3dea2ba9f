//! Color normalization for the properties panel and swatches.
//!
//! Color inputs only accept `#rrggbb`, but values read back from elements or
//! pasted by the user can be `#rgb` or CSS `rgb(r, g, b)`.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Parse `#RGB` or `#RRGGBB` into RGB channels.
#[must_use]
pub fn parse_hex_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    let digits: Vec<u8> = hex.chars().map(hex_digit).collect::<Option<_>>()?;
    match digits.as_slice() {
        [r, g, b] => Some((r * 17, g * 17, b * 17)),
        [r1, r2, g1, g2, b1, b2] => Some((r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hex_digit(c: char) -> Option<u8> {
    // to_digit(16) is at most 15
    c.to_digit(16).map(|d| d as u8)
}

/// Parse CSS `rgb(r, g, b)` or `rgba(r, g, b, a)`; alpha is discarded.
#[must_use]
pub fn parse_rgb_function(raw: &str) -> Option<(u8, u8, u8)> {
    let lower = raw.trim().to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let Ok(channels) = inner.split(',').take(3).map(|part| part.trim().parse::<u8>()).collect::<Result<Vec<u8>, _>>()
    else {
        return None;
    };
    match channels.as_slice() {
        [r, g, b] => Some((*r, *g, *b)),
        _ => None,
    }
}

/// Format channels as lowercase `#rrggbb`.
#[must_use]
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Any supported color form, as channels.
#[must_use]
pub fn parse_color(raw: &str) -> Option<(u8, u8, u8)> {
    parse_hex_rgb(raw).or_else(|| parse_rgb_function(raw))
}

/// Normalize a color to canonical lowercase `#rrggbb`, falling back to
/// `fallback` (and then black) when the input does not parse.
#[must_use]
pub fn normalize_hex_color(value: &str, fallback: &str) -> String {
    let (r, g, b) = parse_color(value).or_else(|| parse_color(fallback)).unwrap_or((0, 0, 0));
    rgb_to_hex(r, g, b)
}
