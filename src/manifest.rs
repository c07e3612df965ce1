//! The meta.txt manifest.
//!
//! The display firmware iterates manifest lines to find its images, so
//! the file format is deliberately rigid: one destination-relative path
//! per line, in processing order, no header, no trailing newline.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_NAME: &str = "meta.txt";

/// Write the manifest into the destination root, overwriting any
/// previous run's file. Returns the manifest path.
pub fn write_manifest(dst_root: &Path, entries: &[PathBuf]) -> Result<PathBuf> {
    let path = dst_root.join(MANIFEST_NAME);

    let lines: Vec<String> = entries
        .iter()
        .map(|entry| entry.display().to_string())
        .collect();

    fs::create_dir_all(dst_root)
        .with_context(|| format!("Failed to create destination root {}", dst_root.display()))?;
    fs::write(&path, lines.join("\n"))
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_written_one_per_line_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            PathBuf::from("b/second.jpg"),
            PathBuf::from("a/first.jpg"),
            PathBuf::from("top.jpg"),
        ];

        let path = write_manifest(dir.path(), &entries).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "b/second.jpg\na/first.jpg\ntop.jpg");
    }

    #[test]
    fn manifest_has_no_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![PathBuf::from("only.jpg")];

        let path = write_manifest(dir.path(), &entries).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "only.jpg");
        assert!(!content.ends_with('\n'));
    }

    #[test]
    fn empty_batch_writes_an_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), &[]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn rewriting_replaces_the_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), &[PathBuf::from("old.jpg")]).unwrap();
        let path = write_manifest(dir.path(), &[PathBuf::from("new.jpg")]).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "new.jpg");
    }

    #[test]
    fn missing_destination_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("prod/deep");

        let path = write_manifest(&dst, &[PathBuf::from("x.jpg")]).unwrap();

        assert!(path.starts_with(&dst));
        assert_eq!(fs::read_to_string(path).unwrap(), "x.jpg");
    }
}
