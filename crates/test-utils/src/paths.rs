//! Path utilities for test output and on-disk fixtures.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    // Start from the test-utils crate manifest dir
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Write a region mask resource (`[[lon, lat], ...]`) into `dir`.
pub fn write_mask_file(dir: &Path, name: &str, cells: &[(f64, f64)]) -> PathBuf {
    let path = dir.join(name);
    let pairs: Vec<[f64; 2]> = cells.iter().map(|&(lon, lat)| [lon, lat]).collect();
    let json = serde_json::to_string(&pairs).expect("Failed to serialize mask");
    std::fs::write(&path, json).expect("Failed to write mask file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        // Should contain Cargo.toml at workspace level
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("composite_test_");
        let path_str = dir.path().to_string_lossy();
        assert!(path_str.contains("composite_test_"));
    }

    #[test]
    fn test_write_mask_file() {
        let dir = temp_test_dir();
        let path = write_mask_file(dir.path(), "ohio.json", &[(-84.25, 39.75)]);
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "[[-84.25,39.75]]");
    }
}
