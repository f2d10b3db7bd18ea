//! Uploaded photo storage.
//!
//! Files land in the configured upload directory under a
//! `<millis>-<original name>` file name and are served back at
//! `/uploads/<name>`.

use std::path::Path;

use chrono::Utc;

/// Strips any path components and characters that do not belong in a stored
/// file name.
fn sanitize_file_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes the uploaded bytes to disk and returns the stored file name.
pub async fn store_photo(
    upload_dir: &str,
    original_name: &str,
    data: &[u8],
) -> std::io::Result<String> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let file_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(original_name)
    );
    let path = Path::new(upload_dir).join(&file_name);

    tokio::fs::write(&path, data).await?;
    Ok(file_name)
}

/// Public URL path for a stored photo file name.
pub fn public_path(file_name: &str) -> String {
    format!("/uploads/{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("/tmp/photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_file_name("obra norte (1).jpg"), "obra_norte__1_.jpg");
    }

    #[test]
    fn test_sanitize_empty_name_falls_back() {
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_public_path() {
        assert_eq!(public_path("123-photo.jpg"), "/uploads/123-photo.jpg");
    }
}
