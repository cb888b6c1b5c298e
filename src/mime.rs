use std::path::Path;

/// Media types the resolver can answer with, indexed into a static table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    Html,
    Css,
    Javascript,
    Json,
    Xml,
    PlainText,
    Icon,
    Png,
    Jpeg,
    Gif,
    Svg,
    Webp,
    Pdf,
    Woff,
    Woff2,
    Ttf,
    Eot,
    Mp4,
    Webm,
    Mp3,
    Wav,
    Ogg,
    Zip,
    Gzip,
    Wasm,
    OctetStream,
}

impl MediaType {
    const MEDIA_STRINGS: [&'static str; 26] = [
        "text/html",                     // Html
        "text/css",                      // Css
        "text/javascript",               // Javascript
        "application/json",              // Json
        "application/xml",               // Xml
        "text/plain",                    // PlainText
        "image/x-icon",                  // Icon
        "image/png",                     // Png
        "image/jpeg",                    // Jpeg
        "image/gif",                     // Gif
        "image/svg+xml",                 // Svg
        "image/webp",                    // Webp
        "application/pdf",               // Pdf
        "font/woff",                     // Woff
        "font/woff2",                    // Woff2
        "font/ttf",                      // Ttf
        "application/vnd.ms-fontobject", // Eot
        "video/mp4",                     // Mp4
        "video/webm",                    // Webm
        "audio/mpeg",                    // Mp3
        "audio/wav",                     // Wav
        "audio/ogg",                     // Ogg
        "application/zip",               // Zip
        "application/gzip",              // Gzip
        "application/wasm",              // Wasm
        "application/octet-stream",      // OctetStream
    ];

    pub fn as_str(self) -> &'static str {
        Self::MEDIA_STRINGS[self as usize]
    }
}

/// Resolve a file extension to a media type. Case-insensitive; a leading
/// dot is tolerated. Unknown extensions map to `application/octet-stream`.
pub fn resolve(extension: &str) -> MediaType {
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => MediaType::Html,
        "css" => MediaType::Css,
        "js" | "mjs" => MediaType::Javascript,
        "json" => MediaType::Json,
        "xml" => MediaType::Xml,
        "txt" => MediaType::PlainText,
        "ico" => MediaType::Icon,
        "png" => MediaType::Png,
        "jpg" | "jpeg" => MediaType::Jpeg,
        "gif" => MediaType::Gif,
        "svg" => MediaType::Svg,
        "webp" => MediaType::Webp,
        "pdf" => MediaType::Pdf,
        "woff" => MediaType::Woff,
        "woff2" => MediaType::Woff2,
        "ttf" => MediaType::Ttf,
        "eot" => MediaType::Eot,
        "mp4" | "m4v" => MediaType::Mp4,
        "webm" => MediaType::Webm,
        "mp3" => MediaType::Mp3,
        "wav" => MediaType::Wav,
        "ogg" | "oga" => MediaType::Ogg,
        "zip" => MediaType::Zip,
        "gz" => MediaType::Gzip,
        "wasm" => MediaType::Wasm,
        _ => MediaType::OctetStream,
    }
}

/// Resolve straight from a filesystem path.
pub fn from_path(path: &str) -> MediaType {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(resolve)
        .unwrap_or(MediaType::OctetStream)
}
