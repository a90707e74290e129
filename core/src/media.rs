//! Content-type shorthands and header parsing.

use mime::Mime;

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Expand `json`, `form`, `png`... into a full media type. Anything that
/// already contains a `/` is returned unchanged.
pub fn expand(shorthand: &str) -> String {
    if shorthand.contains('/') {
        return shorthand.to_string();
    }
    by_extension(shorthand)
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Media type for a bare shorthand or file extension.
pub fn by_extension(ext: &str) -> Option<&'static str> {
    let ty = match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "json" => JSON,
        "form" | "urlencoded" | "form-data" => FORM,
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "text" | "txt" => "text/plain",
        "csv" => "text/csv",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "png" => "image/png",
        "jpeg" | "jpg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "bin" | "octet-stream" => OCTET_STREAM,
        _ => return None,
    };
    Some(ty)
}

/// Guess an attachment's type from its filename.
pub fn guess_from_filename(filename: &str) -> &'static str {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| by_extension(ext))
        .unwrap_or(OCTET_STREAM)
}

/// `type/subtype` without parameters, lowercased. Empty when unparsable.
pub fn essence(content_type: &str) -> String {
    match content_type.parse::<Mime>() {
        Ok(mime) => mime.essence_str().to_ascii_lowercase(),
        Err(_) => content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase(),
    }
}

pub fn charset(content_type: &str) -> Option<String> {
    let mime = content_type.parse::<Mime>().ok()?;
    mime.get_param(mime::CHARSET).map(|cs| cs.as_str().to_ascii_lowercase())
}

/// `application/json` or any `+json` suffix type.
pub fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == JSON || essence.ends_with("+json")
}

pub fn is_form(content_type: &str) -> bool {
    essence(content_type) == FORM
}

pub fn is_text(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence.starts_with("text/") || essence.ends_with("+xml") || essence == "application/xml"
}
