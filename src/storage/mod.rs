use std::io::Write;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

/// Files addressed by paths relative to the media root.
#[derive(Clone, Debug)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `certificates/student_{id}/certificate_{number}.pdf`
    pub fn certificate_path(student_id: i64, certificate_number: &str) -> String {
        format!("certificates/student_{student_id}/certificate_{certificate_number}.pdf")
    }

    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        let clean = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Writes through a temp file in the target directory and renames it into place,
    /// so readers see either the previous file or the complete new one.
    pub fn write_atomic(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(relative)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(relative.to_string()))?;
        std::fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| io_err(dir, source))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|source| io_err(tmp.path(), source))?;
        tmp.persist(&path).map_err(|e| io_err(&path, e.error))?;
        Ok(path)
    }

    /// `Ok(None)` when the file does not exist.
    pub fn read(&self, relative: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(relative)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_err(&path, source)),
        }
    }

    /// Whether a regular file sits at `relative`. Invalid paths count as absent.
    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Missing files are not an error.
    pub fn remove(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&path, source)),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn ensure_dirs(media_root: &Path, assets_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(media_root.join("certificates"))?;
    std::fs::create_dir_all(assets_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_absolute_paths() {
        let storage = DocumentStorage::new("/srv/media");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert!(storage.resolve("certificates/a.pdf").is_ok());
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStorage::new(dir.path());
        let rel = DocumentStorage::certificate_path(7, "CERT-1");

        storage.write_atomic(&rel, b"first").unwrap();
        storage.write_atomic(&rel, b"second").unwrap();
        assert_eq!(storage.read(&rel).unwrap().unwrap(), b"second");

        let entries = std::fs::read_dir(dir.path().join("certificates/student_7"))
            .unwrap()
            .count();
        assert_eq!(entries, 1, "temp files must not be left behind");
    }

    #[test]
    fn read_and_remove_tolerate_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStorage::new(dir.path());
        assert!(storage.read("certificates/nope.pdf").unwrap().is_none());
        storage.remove("certificates/nope.pdf").unwrap();
    }

    #[test]
    fn exists_tracks_the_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStorage::new(dir.path());
        let rel = DocumentStorage::certificate_path(3, "CERT-3");

        assert!(!storage.exists(&rel));
        storage.write_atomic(&rel, b"pdf").unwrap();
        assert!(storage.exists(&rel));
        assert!(!storage.exists("certificates/student_3"), "directories are not documents");
        assert!(!storage.exists("../outside.pdf"));

        storage.remove(&rel).unwrap();
        assert!(!storage.exists(&rel));
    }
}
