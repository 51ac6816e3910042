use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, StorageError};

/// Scratch file an export writes into before it is moved over the destination
///
/// The file sits next to the destination as `.{stem}.partial.{ext}`, so the final rename
/// never crosses filesystems. Unless `commit` succeeds, dropping the guard deletes it.
#[derive(Debug)]
pub struct PartialOutput {
    partial: PathBuf,
    destination: PathBuf,
    committed: bool,
}

impl PartialOutput {
    pub fn new(destination: &Path) -> Result<Self> {
        let unavailable = |reason: &str| StorageError::Unavailable {
            path: destination.display().to_string(),
            reason: reason.to_string(),
        };

        let file_name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| unavailable("destination has no file name"))?;
        let parent = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.is_dir() {
            return Err(unavailable("directory does not exist").into());
        }
        if destination.is_dir() {
            return Err(unavailable("destination is a directory").into());
        }

        let partial_name = match file_name.rsplit_once('.') {
            Some((stem, ext)) => format!(".{}.partial.{}", stem, ext),
            None => format!(".{}.partial", file_name),
        };

        Ok(Self {
            partial: parent.join(partial_name),
            destination: destination.to_path_buf(),
            committed: false,
        })
    }

    /// Where the encoder should write
    pub fn path(&self) -> &Path {
        &self.partial
    }

    /// Move the finished file over the destination
    pub fn commit(mut self) -> Result<PathBuf> {
        std::fs::rename(&self.partial, &self.destination).map_err(|e| {
            StorageError::from_io(&self.destination, &e).unwrap_or_else(|| StorageError::CommitFailed {
                path: self.destination.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        self.committed = true;
        Ok(self.destination.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.partial) {
            Ok(()) => debug!("Discarded partial output {:?}", self.partial),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial output {:?}: {}", self.partial, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use tempfile::tempdir;

    #[test]
    fn test_partial_is_hidden_sibling() {
        let dir = tempdir().unwrap();
        let output = PartialOutput::new(&dir.path().join("clip.mp4")).unwrap();
        assert_eq!(output.path(), dir.path().join(".clip.partial.mp4"));
    }

    #[test]
    fn test_drop_discards_uncommitted_file() {
        let dir = tempdir().unwrap();
        let output = PartialOutput::new(&dir.path().join("clip.mp4")).unwrap();
        std::fs::write(output.path(), b"half a video").unwrap();
        let partial = output.path().to_path_buf();

        drop(output);
        assert!(!partial.exists());
        assert!(!dir.path().join("clip.mp4").exists());
    }

    #[test]
    fn test_commit_moves_into_place() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("clip.mp4");
        let output = PartialOutput::new(&destination).unwrap();
        std::fs::write(output.path(), b"video").unwrap();

        assert_eq!(output.commit().unwrap(), destination);
        assert_eq!(std::fs::read(&destination).unwrap(), b"video");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_storage_error() {
        let dir = tempdir().unwrap();
        let err = PartialOutput::new(&dir.path().join("missing").join("clip.mp4")).unwrap_err();
        assert!(matches!(err, EditorError::Storage(StorageError::Unavailable { .. })));
    }
}
