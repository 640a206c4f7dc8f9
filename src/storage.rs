//! Durable-record helpers shared by the task store, the id allocator,
//! and the output store.
//!
//! Every entity is an independent file; writes go through a temp file
//! plus rename so a crashed write leaves the prior record untouched.

use std::path::Path;

use tokio::fs;

use crate::error::StorageError;

/// Write `content` to `path` atomically: create parent dirs, write a
/// sibling temp file, then rename it into place.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Sanitize an id for use as a filename: every character other than
/// ASCII alphanumerics, `_` and `-` is replaced with `_`.
pub(crate) fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/record.json");
        write_atomic(&path, "{\"ok\":true}").await.unwrap();
        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();
        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "second");
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        write_atomic(&path, "data").await.unwrap();
        assert!(!dir.path().join("record.tmp").exists());
    }

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_id("42"), "42");
        assert_eq!(sanitize_id("t17"), "t17");
        assert_eq!(sanitize_id("my-task_3"), "my-task_3");
    }

    #[test]
    fn sanitize_replaces_everything_else() {
        assert_eq!(sanitize_id("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_id("a b/c"), "a_b_c");
        assert_eq!(sanitize_id("日本語"), "___");
    }
}
