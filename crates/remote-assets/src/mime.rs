//! Content-Type to file extension lookup.

/// Used when the response has no content type or an unknown one.
pub const FALLBACK_EXTENSION: &str = "bin";

// mime_guess lists extensions alphabetically, which picks odd ones for a few
// common types (image/jpeg -> "jfif").
const PREFERRED: &[(&str, &str)] = &[
    ("application/javascript", "js"),
    ("application/json", "json"),
    ("application/octet-stream", "bin"),
    ("application/xml", "xml"),
    ("font/otf", "otf"),
    ("font/ttf", "ttf"),
    ("font/woff", "woff"),
    ("font/woff2", "woff2"),
    ("image/jpeg", "jpeg"),
    ("image/svg+xml", "svg"),
    ("image/x-icon", "ico"),
    ("text/css", "css"),
    ("text/html", "html"),
    ("text/javascript", "js"),
    ("text/plain", "txt"),
    ("video/mp4", "mp4"),
];

/// Returns the extension for a `Content-Type` header value, without the dot.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return FALLBACK_EXTENSION;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return FALLBACK_EXTENSION;
    }

    if let Some((_, ext)) = PREFERRED.iter().find(|(mime, _)| *mime == essence) {
        return *ext;
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first().copied())
        .unwrap_or(FALLBACK_EXTENSION)
}
