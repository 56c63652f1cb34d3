//! [`Persistence`] sinks for exported images.

use std::io::Write;
use std::path::{Path, PathBuf};

use horizon_canvas_core::{CanvasError, CanvasResult, Persistence};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Writes exports into a directory.
///
/// Files are written to a temporary file in the same directory and renamed
/// into place, so a failed write never leaves a truncated image behind. The
/// directory is created on first use.
#[derive(Debug, Clone)]
pub struct DirectoryPersistence {
    root: PathBuf,
}

impl DirectoryPersistence {
    /// Persist into `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Target directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Persistence for DirectoryPersistence {
    fn persist(&mut self, bytes: &[u8], filename: &str) -> CanvasResult<String> {
        validate_filename(filename)?;
        let fail = |reason: String| CanvasError::Persistence {
            filename: filename.to_string(),
            reason,
        };

        std::fs::create_dir_all(&self.root).map_err(|err| fail(err.to_string()))?;

        let mut file = NamedTempFile::new_in(&self.root).map_err(|err| fail(err.to_string()))?;
        file.write_all(bytes).map_err(|err| fail(err.to_string()))?;
        file.as_file().sync_all().map_err(|err| fail(err.to_string()))?;

        let path = self.root.join(filename);
        file.persist(&path).map_err(|err| fail(err.error.to_string()))?;

        info!(
            target: "horizon_canvas::persistence",
            path = %path.display(),
            bytes = bytes.len(),
            "wrote image file"
        );
        Ok(path.display().to_string())
    }
}

/// Keeps exports in memory. Useful for tests and for hosts that upload the
/// bytes themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    files: Vec<(String, Vec<u8>)>,
}

impl MemoryPersistence {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `filename`, if any.
    pub fn get(&self, filename: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Stored filenames in write order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Persistence for MemoryPersistence {
    fn persist(&mut self, bytes: &[u8], filename: &str) -> CanvasResult<String> {
        validate_filename(filename)?;
        match self.files.iter_mut().find(|(name, _)| name == filename) {
            Some((_, stored)) => *stored = bytes.to_vec(),
            None => self.files.push((filename.to_string(), bytes.to_vec())),
        }

        debug!(
            target: "horizon_canvas::persistence",
            filename,
            bytes = bytes.len(),
            "stored image in memory"
        );
        Ok(format!("memory://{filename}"))
    }
}

/// Filenames must name a single entry inside the target.
fn validate_filename(filename: &str) -> CanvasResult<()> {
    let valid = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(CanvasError::Persistence {
            filename: filename.to_string(),
            reason: "not a plain file name".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectoryPersistence::new(dir.path().join("exports"));

        let location = sink.persist(b"abc", "edited-image-1.png").unwrap();
        let path = dir.path().join("exports").join("edited-image-1.png");
        assert_eq!(location, path.display().to_string());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_directory_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectoryPersistence::new(dir.path());
        sink.persist(b"first", "a.png").unwrap();
        sink.persist(b"second", "a.png").unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), b"second");

        // no temporary files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectoryPersistence::new(dir.path());
        for name in ["", "..", "../escape.png", "nested/file.png"] {
            let err = sink.persist(b"x", name).unwrap_err();
            assert!(matches!(err, CanvasError::Persistence { .. }), "{name:?}");
        }
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemoryPersistence::new();
        assert!(sink.is_empty());
        assert_eq!(sink.persist(b"one", "a.bmp").unwrap(), "memory://a.bmp");
        sink.persist(b"two", "b.bmp").unwrap();
        sink.persist(b"three", "a.bmp").unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.get("a.bmp"), Some(&b"three"[..]));
        assert_eq!(sink.filenames().collect::<Vec<_>>(), ["a.bmp", "b.bmp"]);
        assert!(sink.get("missing").is_none());
    }
}
