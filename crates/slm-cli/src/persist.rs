//! Session file and attachment I/O.

use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use slm_core::messages::Part;
use slm_runtime::SessionSnapshot;

/// Snapshot file name inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Load a snapshot, or `None` if the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<SessionSnapshot>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let snapshot = SessionSnapshot::from_json(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Write a snapshot through a temporary file so a crash never leaves a
/// truncated session behind.
pub fn save_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, snapshot.to_json()?)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// MIME type for a supported image extension.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read an image into a base64 inline part.
pub fn read_attachment(path: &Path) -> Result<Part> {
    let Some(mime_type) = image_mime_type(path) else {
        bail!("unsupported image type: {}", path.display());
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Part::inline(mime_type, STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use slm_core::documents::Document;
    use slm_core::messages::InlineData;

    use super::*;

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join(SESSION_FILE)).unwrap().is_none());
    }

    #[test]
    fn snapshot_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SESSION_FILE);
        let snapshot = SessionSnapshot {
            documents: vec![Document::new("a.txt", "A")],
            ..SessionSnapshot::default()
        };

        save_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), Some(snapshot));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_snapshot(&path).is_err());
    }

    #[test]
    fn attachment_is_base64_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.PNG");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let part = read_attachment(&path).unwrap();
        assert_eq!(
            part,
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: "image/png".into(),
                    data: "AQID".into(),
                }
            }
        );
    }

    #[test]
    fn unsupported_attachment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        assert!(read_attachment(&path).is_err());
    }
}
