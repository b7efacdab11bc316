//! SVG sizing without rasterizing.

use regex::Regex;
use std::sync::OnceLock;

fn root_tag() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<svg\b([^>]*)>").ok())
        .as_ref()
}

fn attribute() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)(width|height|viewBox)\s*=\s*["']([^"']*)["']"#).ok()
    })
    .as_ref()
}

/// A length like `120`, `120.5` or `120px`. Relative units such as `%` or `em` are not sizes.
fn parse_length(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    let value: f64 = number.parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}

fn parse_view_box(raw: &str) -> Option<(u32, u32)> {
    let parts: Vec<f64> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((w.round() as u32, h.round() as u32)),
        _ => None,
    }
}

/// Intrinsic size of an SVG document from the root element.
///
/// Numeric `width` and `height` attributes win; otherwise the `viewBox` extent is used.
pub fn svg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let text = String::from_utf8_lossy(data);
    let attrs = root_tag()?.captures(&text)?.get(1)?.as_str();

    let mut width = None;
    let mut height = None;
    let mut view_box = None;
    for caps in attribute()?.captures_iter(attrs) {
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("width") => width = parse_length(value),
            Some("height") => height = parse_length(value),
            Some("viewbox") => view_box = parse_view_box(value),
            _ => {}
        }
    }

    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => view_box,
    }
}
