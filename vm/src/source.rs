//! Guest bytecode loading with an mtime-keyed build cache.
//!
//! Raw `.wasm` files are read as-is. Other sources consult
//! `<root>/.ab_cache/<file>.abc` and use it only when its modification time
//! is strictly newer than the source file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;

/// Cache directory under the loader root.
pub const CACHE_DIR: &str = ".ab_cache";

/// Extension appended to cached artifacts.
pub const CACHE_EXTENSION: &str = "abc";

/// Bytes read for the VM, and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub bytes: Vec<u8>,
    /// True for `.wasm` input and for cache hits.
    pub precompiled: bool,
    pub path: PathBuf,
}

/// Reads guest files relative to a root directory.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    root: PathBuf,
}

impl SourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loader rooted at the process working directory.
    pub fn from_current_dir() -> Result<Self, SourceError> {
        let root = std::env::current_dir().map_err(|source| SourceError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::new(root))
    }

    /// Where the cached artifact for `file` lives.
    pub fn cache_path(&self, file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_os_string();
        name.push(".");
        name.push(CACHE_EXTENSION);
        self.root.join(CACHE_DIR).join(name)
    }

    /// Load `file`. `is_wasm` skips the cache entirely.
    pub fn load(&self, file: &Path, is_wasm: bool) -> Result<LoadedSource, SourceError> {
        let source_path = self.root.join(file);
        if is_wasm {
            let bytes = read(&source_path)?;
            return Ok(LoadedSource {
                bytes,
                precompiled: true,
                path: source_path,
            });
        }

        let source_modified = modified(&source_path)?;
        let cache_path = self.cache_path(file);
        // A missing or unreadable cache is a miss, never an error.
        let cache_modified = fs::metadata(&cache_path).and_then(|m| m.modified()).ok();

        match cache_modified {
            Some(cached) if cached > source_modified => {
                debug!(cache = %cache_path.display(), "using cached artifact");
                Ok(LoadedSource {
                    bytes: read(&cache_path)?,
                    precompiled: true,
                    path: cache_path,
                })
            }
            _ => Ok(LoadedSource {
                bytes: read(&source_path)?,
                precompiled: false,
                path: source_path,
            }),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, SourceError> {
    fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn modified(path: &Path) -> Result<std::time::SystemTime, SourceError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn setup(source: &[u8], cache: Option<&[u8]>) -> (tempfile::TempDir, SourceLoader) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prog.ab"), source).unwrap();
        let loader = SourceLoader::new(dir.path());
        if let Some(cache) = cache {
            let path = loader.cache_path(Path::new("prog.ab"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, cache).unwrap();
        }
        (dir, loader)
    }

    #[test]
    fn test_cache_path_layout() {
        let loader = SourceLoader::new("/work");
        assert_eq!(
            loader.cache_path(Path::new("src/prog.ab")),
            PathBuf::from("/work/.ab_cache/src/prog.ab.abc")
        );
    }

    #[test]
    fn test_wasm_skips_cache() {
        let (_dir, loader) = setup(b"wasm-bytes", Some(b"cached"));
        let loaded = loader.load(Path::new("prog.ab"), true).unwrap();
        assert_eq!(loaded.bytes, b"wasm-bytes");
        assert!(loaded.precompiled);
    }

    #[test]
    fn test_no_cache_reads_source() {
        let (_dir, loader) = setup(b"source", None);
        let loaded = loader.load(Path::new("prog.ab"), false).unwrap();
        assert_eq!(loaded.bytes, b"source");
        assert!(!loaded.precompiled);
    }

    #[test]
    fn test_newer_cache_is_used() {
        let (dir, loader) = setup(b"source", Some(b"cached"));
        let now = SystemTime::now();
        set_mtime(&dir.path().join("prog.ab"), now - Duration::from_secs(60));
        set_mtime(&loader.cache_path(Path::new("prog.ab")), now);

        let loaded = loader.load(Path::new("prog.ab"), false).unwrap();
        assert_eq!(loaded.bytes, b"cached");
        assert!(loaded.precompiled);
    }

    #[test]
    fn test_stale_cache_is_ignored() {
        let (dir, loader) = setup(b"source", Some(b"cached"));
        let now = SystemTime::now();
        set_mtime(&dir.path().join("prog.ab"), now);
        set_mtime(&loader.cache_path(Path::new("prog.ab")), now - Duration::from_secs(60));

        let loaded = loader.load(Path::new("prog.ab"), false).unwrap();
        assert_eq!(loaded.bytes, b"source");
        assert!(!loaded.precompiled);
    }

    #[test]
    fn test_equal_mtime_prefers_source() {
        let (dir, loader) = setup(b"source", Some(b"cached"));
        let when = SystemTime::now() - Duration::from_secs(30);
        set_mtime(&dir.path().join("prog.ab"), when);
        set_mtime(&loader.cache_path(Path::new("prog.ab")), when);

        let loaded = loader.load(Path::new("prog.ab"), false).unwrap();
        assert_eq!(loaded.bytes, b"source");
    }

    #[test]
    fn test_from_current_dir_roots_at_cwd() {
        let loader = SourceLoader::from_current_dir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            loader.cache_path(Path::new("prog.ab")),
            cwd.join(CACHE_DIR).join("prog.ab.abc")
        );
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SourceLoader::new(dir.path());
        let err = loader.load(Path::new("absent.ab"), false).unwrap_err();
        assert!(err.to_string().contains("absent.ab"));
    }
}
