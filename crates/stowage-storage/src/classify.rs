//! MIME classification for filesystem routing.
//!
//! Content types are derived from file extensions via a static table, then
//! mapped onto category partitions. Unknown extensions fall back to
//! `application/octet-stream` and land in `others`.

use stowage_core::models::Category;

/// Extension to content-type table. Lookup is case insensitive.
const CONTENT_TYPES: &[(&str, &str)] = &[
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("tiff", "image/tiff"),
    // Videos
    ("mp4", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    // Documents
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    // Archives
    ("zip", "application/zip"),
];

/// Resolve a content type from a filename. Falls back to
/// `application/octet-stream` for unknown or missing extensions.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or("application/octet-stream")
}

/// Map a content type onto its category partition.
pub fn category_for_mime(mime_type: &str) -> Category {
    if mime_type.starts_with("image/") {
        return Category::Images;
    }
    if mime_type.starts_with("video/") {
        return Category::Videos;
    }
    if mime_type.starts_with("audio/") {
        return Category::Audios;
    }
    if mime_type == "application/pdf"
        || mime_type.contains("word")
        || mime_type.contains("excel")
        || mime_type.contains("spreadsheetml")
        || mime_type.contains("text")
    {
        return Category::Docs;
    }
    if mime_type == "application/zip" || mime_type == "application/x-zip-compressed" {
        return Category::Zips;
    }
    Category::Others
}

/// Classify a filename into its content type and category in one step.
pub fn classify(filename: &str) -> (&'static str, Category) {
    let content_type = content_type_for(filename);
    (content_type, category_for_mime(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_for("photo.PNG"), "image/png");
        assert_eq!(content_type_for("clip.mov"), "video/quicktime");
        assert_eq!(content_type_for("report.pdf"), "application/pdf");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
        assert_eq!(content_type_for("weird.xyz"), "application/octet-stream");
    }

    #[test]
    fn test_category_for_mime() {
        assert_eq!(category_for_mime("image/webp"), Category::Images);
        assert_eq!(category_for_mime("video/mp4"), Category::Videos);
        assert_eq!(category_for_mime("audio/mpeg"), Category::Audios);
        assert_eq!(category_for_mime("application/pdf"), Category::Docs);
        assert_eq!(category_for_mime("application/msword"), Category::Docs);
        assert_eq!(category_for_mime("text/plain"), Category::Docs);
        assert_eq!(category_for_mime("application/zip"), Category::Zips);
        assert_eq!(
            category_for_mime("application/octet-stream"),
            Category::Others
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("song.mp3"), ("audio/mpeg", Category::Audios));
        assert_eq!(
            classify("bundle.zip"),
            ("application/zip", Category::Zips)
        );
        assert_eq!(
            classify("mystery"),
            ("application/octet-stream", Category::Others)
        );
    }
}
