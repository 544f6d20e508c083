//! Media root layout and output file naming.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ComposerError, Result};
use crate::types::{OutputBase, Style};

/// Subfolder of the media root that holds generated clips.
pub const COMPOSITIONS_DIR: &str = "compositions";

/// Length of the random token in file names, in hex characters.
pub const TOKEN_HEX_LEN: usize = 8;

/// Filesystem location generated clips are written under.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Creates a store rooted at `root`. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The media root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the compositions folder.
    pub fn compositions_dir(&self) -> PathBuf {
        self.root.join(COMPOSITIONS_DIR)
    }

    /// Creates the compositions folder if needed and returns a fresh,
    /// extensionless output location for `style`.
    pub fn prepare(&self, style: &Style) -> Result<OutputBase> {
        let dir = self.compositions_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            ComposerError::storage_failed(format!("Failed to create {}", dir.display()), e)
        })?;

        let name = output_base_name(style);
        Ok(OutputBase {
            relative: format!("{}/{}", COMPOSITIONS_DIR, name),
            absolute: dir.join(name),
        })
    }

    /// Resolves a relative path returned by the orchestrator.
    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

/// `"<style>_<8 hex chars>"`, with the style made safe for a file name.
pub fn output_base_name(style: &Style) -> String {
    let token: [u8; TOKEN_HEX_LEN / 2] = rand::random();
    format!("{}_{}", sanitize_label(style.label()), hex::encode(token))
}

/// Replaces every character other than ASCII letters, digits, `-` and `_`
/// with `_`. An empty label becomes `Track`.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "Track".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn name_is_style_and_hex_token() {
        let name = output_base_name(&Style::Jazz);
        let (style, token) = name.split_once('_').unwrap();
        assert_eq!(style, "Jazz");
        assert_eq!(token.len(), TOKEN_HEX_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn names_do_not_collide() {
        let names: HashSet<String> = (0..200).map(|_| output_base_name(&Style::Pop)).collect();
        assert_eq!(names.len(), 200);
    }

    #[test]
    fn labels_are_made_path_safe() {
        assert_eq!(sanitize_label("Jazz"), "Jazz");
        assert_eq!(sanitize_label("lo-fi hip_hop"), "lo-fi_hip_hop");
        assert_eq!(sanitize_label("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_label("Ambient 2.0"), "Ambient_2_0");
        assert_eq!(sanitize_label("   "), "Track");
        assert_eq!(sanitize_label("Café"), "Caf_");
    }

    #[test]
    fn prepare_creates_folder_on_demand() {
        let dir = tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("media"));
        assert!(!store.compositions_dir().exists());

        let base = store.prepare(&Style::Classical).unwrap();

        assert!(store.compositions_dir().is_dir());
        assert!(base.relative.starts_with("compositions/Classical_"));
        assert_eq!(store.resolve(&base.relative), base.absolute);
    }

    #[test]
    fn prepare_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"x").unwrap();

        let err = MediaStore::new(&root).prepare(&Style::Pop).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::StorageFailed);
    }
}
