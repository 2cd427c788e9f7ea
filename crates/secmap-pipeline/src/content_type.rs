//! Content-type resolution for uploaded files

use std::path::Path;

/// Resolve the MIME type for a file from its extension.
///
/// Unknown or missing extensions resolve to `application/octet-stream`.
/// Pure lookup, no I/O.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let extension = path
        .as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("json") => "application/json",
        Some("geojson") => "application/geo+json",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("shp") => "application/octet-stream",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("data.geojson"), "application/geo+json");
        assert_eq!(content_type_for("secciones.csv"), "text/csv");
        assert_eq!(content_type_for("map.png"), "image/png");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("bundle.shp"), "application/octet-stream");
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        assert_eq!(content_type_for("data.unknownext"), "application/octet-stream");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(content_type_for("DATA.GEOJSON"), "application/geo+json");
        assert_eq!(content_type_for("Map.PNG"), "image/png");
    }

    #[test]
    fn test_full_paths() {
        assert_eq!(
            content_type_for("/data/output/secciones_with_shapes.geojson"),
            "application/geo+json"
        );
    }
}
