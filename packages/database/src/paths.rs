//! Default file locations for the client map.
//!
//! Relative paths resolve against the working directory the binary is run
//! from, which is where the cache file and rendered map live by default.

use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Default geocode cache file name.
pub const DEFAULT_CACHE_FILE: &str = "city_coords_cache.json";

/// Default rendered map file name.
pub const DEFAULT_MAP_FILE: &str = "client_map.html";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "client_map.toml";

/// Returns the default geocode cache path.
#[must_use]
pub fn geocode_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_FILE)
}

/// Returns the default rendered map path.
#[must_use]
pub fn map_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_MAP_FILE)
}

/// Returns the sibling temp path used for atomic writes (`<name>.tmp`).
#[must_use]
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensures the parent directory of `path` exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes `contents` to `path` via `<path>.tmp`, fsync, and rename, so a
/// crash never leaves a truncated file at `path`.
///
/// # Errors
///
/// Returns an I/O error if any step fails. The temp file may be left
/// behind; `path` itself is untouched in that case.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    ensure_parent_dir(path)?;

    let tmp = tmp_path(path);
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("data/city_coords_cache.json")),
            PathBuf::from("data/city_coords_cache.json.tmp")
        );
        assert_eq!(
            tmp_path(Path::new("map.html")),
            PathBuf::from("map.html.tmp")
        );
    }

    #[test]
    fn ensure_parent_dir_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/cache.json");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn ensure_parent_dir_accepts_bare_file_name() {
        ensure_parent_dir(Path::new("cache.json")).unwrap();
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/map.html");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!tmp_path(&path).exists());
    }
}
