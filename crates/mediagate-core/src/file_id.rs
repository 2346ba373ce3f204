//! Object identifier generation.
//!
//! Identifiers are uuid v7 (time-ordered) rendered as strings. When the
//! original filename has a recognizable extension it is appended, lowercased,
//! so downloads keep a usable suffix.

use uuid::Uuid;

/// Generate a fresh object identifier, optionally carrying the extension of
/// the original filename.
pub fn generate_file_id(original_filename: Option<&str>) -> String {
    let id = Uuid::now_v7();
    match original_filename.and_then(extension_of) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Extract a usable extension from a filename, lowercased.
///
/// A trailing dot or a dotfile like `.gitignore` has no extension.
fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn appends_lowercased_extension() {
        let id = generate_file_id(Some("Report.PDF"));
        assert!(id.ends_with(".pdf"));
        let bare = id.trim_end_matches(".pdf");
        assert!(Uuid::parse_str(bare).is_ok());
    }

    #[test]
    fn no_extension_when_filename_missing_or_bare() {
        for input in [None, Some("archive"), Some(".bashrc"), Some("trailing.")] {
            let id = generate_file_id(input);
            assert!(
                Uuid::parse_str(&id).is_ok(),
                "expected bare uuid for {:?}, got {}",
                input,
                id
            );
        }
    }

    #[test]
    fn identifiers_are_time_ordered() {
        let a = generate_file_id(None);
        // Ordering is only defined across distinct timestamps.
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate_file_id(None);
        assert!(a < b);
    }

    #[test]
    fn extension_taken_from_last_path_segment() {
        let id = generate_file_id(Some("videos/2024.archive/clip.MP4"));
        assert!(id.ends_with(".mp4"));
    }
}
