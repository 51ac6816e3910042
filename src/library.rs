//! Storage collaborator that receives finished exports.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::config::LibraryConfig;
use crate::error::{PermissionError, Result, StorageError};

/// Answer to a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Where a saved file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedItem {
    pub location: PathBuf,
}

/// Photo-library style destination for exported videos
pub trait PhotoLibrary: Send + Sync {
    fn request_permission(&self) -> PermissionStatus;

    /// Store a copy of `file`; the caller keeps ownership of `file` itself
    fn save(&self, file: &Path) -> Result<SavedItem>;
}

/// Library backed by a plain directory
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    directory: PathBuf,
    access_granted: bool,
}

impl DirectoryLibrary {
    pub fn new(directory: impl Into<PathBuf>, access_granted: bool) -> Self {
        Self {
            directory: directory.into(),
            access_granted,
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(config.directory.clone(), config.access_granted)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn destination_for(&self, file: &Path) -> PathBuf {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut candidate = self.directory.join(format!("snapreel-{}.{}", stamp, ext));
        let mut n = 1;
        while candidate.exists() {
            candidate = self.directory.join(format!("snapreel-{}-{}.{}", stamp, n, ext));
            n += 1;
        }
        candidate
    }
}

impl PhotoLibrary for DirectoryLibrary {
    fn request_permission(&self) -> PermissionStatus {
        if self.access_granted {
            PermissionStatus::Granted
        } else {
            warn!("Library access denied for {:?}", self.directory);
            PermissionStatus::Denied
        }
    }

    fn save(&self, file: &Path) -> Result<SavedItem> {
        if !self.access_granted {
            return Err(PermissionError::Denied {
                destination: self.directory.display().to_string(),
            }
            .into());
        }

        std::fs::create_dir_all(&self.directory).map_err(|e| StorageError::Unavailable {
            path: self.directory.display().to_string(),
            reason: e.to_string(),
        })?;

        let location = self.destination_for(file);
        std::fs::copy(file, &location).map_err(|e| StorageError::CommitFailed {
            path: location.display().to_string(),
            reason: e.to_string(),
        })?;

        info!("Saved {:?} to library as {:?}", file, location);
        Ok(SavedItem { location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use tempfile::tempdir;

    #[test]
    fn test_save_copies_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("export.mp4");
        std::fs::write(&source, b"video").unwrap();

        let library = DirectoryLibrary::new(dir.path().join("library"), true);
        assert_eq!(library.request_permission(), PermissionStatus::Granted);

        let first = library.save(&source).unwrap();
        let second = library.save(&source).unwrap();
        assert_ne!(first.location, second.location);
        assert_eq!(std::fs::read(&first.location).unwrap(), b"video");
        assert!(source.exists());
    }

    #[test]
    fn test_denied_library_refuses_save() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("export.mp4");
        std::fs::write(&source, b"video").unwrap();

        let library = DirectoryLibrary::new(dir.path().join("library"), false);
        assert_eq!(library.request_permission(), PermissionStatus::Denied);
        assert!(matches!(library.save(&source), Err(EditorError::Permission(_))));
        assert!(!dir.path().join("library").exists());
    }
}
