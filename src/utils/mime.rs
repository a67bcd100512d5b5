//! MIME type detection for served artifacts.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const PDF: &str = "application/pdf";
    pub const DVI: &str = "application/x-dvi";
    pub const POSTSCRIPT: &str = "application/postscript";
    pub const SVG: &str = "image/svg+xml";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Guess MIME type from file extension.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    from_extension(ext.as_deref())
}

/// Guess MIME type from a lowercase file extension.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("pdf") => types::PDF,
        Some("dvi") => types::DVI,
        Some("ps" | "eps") => types::POSTSCRIPT,
        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("html" | "htm") => types::HTML,
        Some("txt" | "log") => types::PLAIN,
        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path() {
        assert_eq!(from_path(&PathBuf::from("output.pdf")), types::PDF);
        assert_eq!(from_path(&PathBuf::from("OUTPUT.PDF")), types::PDF);
        assert_eq!(from_path(&PathBuf::from("thesis.dvi")), types::DVI);
        assert_eq!(from_path(&PathBuf::from("figure.png")), types::PNG);
        assert_eq!(from_path(&PathBuf::from("unknown.xyz")), types::OCTET_STREAM);
        assert_eq!(from_path(&PathBuf::from("no_extension")), types::OCTET_STREAM);
    }
}
