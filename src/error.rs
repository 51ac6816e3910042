use std::io;
use std::path::Path;

use thiserror::Error;

/// Main error type for the Snapreel library
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Source could not be read or decoded
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open media file: {path} ({reason})")]
    OpenFailed { path: String, reason: String },

    #[error("Unsupported media format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to probe media file: {path} ({reason})")]
    ProbeFailed { path: String, reason: String },

    #[error("Corrupt stream at frame {frame}: {reason}")]
    Corrupt { frame: u64, reason: String },

    #[error("Decoder failed: {reason}")]
    DecoderFailed { reason: String },
}

/// Failure while writing or finalizing the encoded output
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to start encoder: {reason}")]
    StartFailed { reason: String },

    #[error("Failed to write frame {frame}: {reason}")]
    WriteFailed { frame: u64, reason: String },

    #[error("Failed to finalize output: {reason}")]
    FinalizeFailed { reason: String },

    #[error("Invalid encoder parameters: {details}")]
    InvalidParameters { details: String },
}

/// Destination could not be used
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Destination unavailable: {path} ({reason})")]
    Unavailable { path: String, reason: String },

    #[error("Insufficient space at {path}")]
    InsufficientSpace { path: String },

    #[error("Failed to move finished output into place: {path} ({reason})")]
    CommitFailed { path: String, reason: String },
}

impl StorageError {
    /// Classify an I/O failure while writing `path`, if the destination is the problem
    pub fn from_io(path: &Path, error: &io::Error) -> Option<Self> {
        match error.kind() {
            io::ErrorKind::StorageFull => Some(Self::InsufficientSpace {
                path: path.display().to_string(),
            }),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => Some(Self::Unavailable {
                path: path.display().to_string(),
                reason: error.to_string(),
            }),
            _ => None,
        }
    }

    /// Classify an encoder's error output
    pub fn from_encoder_log(path: &Path, log: &str) -> Option<Self> {
        if log.contains("No space left on device") {
            Some(Self::InsufficientSpace {
                path: path.display().to_string(),
            })
        } else if log.contains("Read-only file system") || log.contains("Permission denied") {
            Some(Self::Unavailable {
                path: path.display().to_string(),
                reason: log.lines().last().unwrap_or_default().to_string(),
            })
        } else {
            None
        }
    }
}

/// Access denied by the platform
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Access to {destination} was denied")]
    Denied { destination: String },
}

/// Filter lookup and construction errors
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Filter not found: {name}")]
    NotFound { name: String },

    #[error("Invalid parameter for {filter}: {key} = {value}")]
    InvalidParameter { filter: String, key: String, value: String },

    #[error("Filter index {index} out of range (catalog has {len} filters)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Coarse error class, used to report outcomes without matching on variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Encode,
    Storage,
    Permission,
    Other,
}

/// Convenience type alias for Results using EditorError
pub type Result<T> = std::result::Result<T, EditorError>;

impl EditorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Error for a failed write to `path`: storage problems keep their class,
    /// anything else becomes the encode error built by `encode`
    pub fn from_write(path: &Path, error: io::Error, encode: impl FnOnce(String) -> EncodeError) -> Self {
        match StorageError::from_io(path, &error) {
            Some(storage) => storage.into(),
            None => encode(error.to_string()).into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Permission(_) => ErrorKind::Permission,
            _ => ErrorKind::Other,
        }
    }

    /// Check if this error is recoverable (can be retried)
    ///
    /// Nothing here is fatal to the process; this only says whether retrying the
    /// same operation without changing anything has a chance of succeeding.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Storage(StorageError::Unavailable { .. }) => true,
            Self::Storage(StorageError::InsufficientSpace { .. }) => true,
            Self::Encode(EncodeError::WriteFailed { .. }) => true,
            Self::Decode(DecodeError::DecoderFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(DecodeError::OpenFailed { path, .. }) => {
                format!("Could not open video '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Decode(DecodeError::Corrupt { frame, .. }) => {
                format!("The video is damaged near frame {}. Try a different file.", frame)
            }
            Self::Decode(_) => "The video could not be read.".to_string(),
            Self::Encode(_) => "Saving the edited video failed. Please try again.".to_string(),
            Self::Storage(StorageError::InsufficientSpace { .. }) => {
                "There is not enough free space to save the video.".to_string()
            }
            Self::Storage(_) => "The video could not be saved to the chosen location.".to_string(),
            Self::Permission(_) => {
                "Access to the photo library was not granted. Allow access and try again.".to_string()
            }
            Self::Filter(FilterError::NotFound { name }) => {
                format!("Filter '{}' not found.", name)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_taxonomy() {
        let err: EditorError = DecodeError::Corrupt { frame: 200, reason: "eof".into() }.into();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let err: EditorError = PermissionError::Denied { destination: "photos".into() }.into();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_full_disk_is_storage_error() {
        let path = Path::new("out.mp4");
        let full = io::Error::from(io::ErrorKind::StorageFull);
        let err = EditorError::from_write(path, full, |reason| EncodeError::WriteFailed { frame: 5, reason });

        assert!(matches!(err, EditorError::Storage(StorageError::InsufficientSpace { .. })));
        assert!(err.user_message().contains("not enough free space"));
    }

    #[test]
    fn test_write_errors_by_cause() {
        let path = Path::new("out.mp4");
        let encode = |reason: String| EncodeError::WriteFailed { frame: 0, reason };

        let denied = EditorError::from_write(path, io::Error::from(io::ErrorKind::PermissionDenied), encode);
        assert!(matches!(denied, EditorError::Storage(StorageError::Unavailable { .. })));

        let pipe = EditorError::from_write(path, io::Error::from(io::ErrorKind::BrokenPipe), encode);
        assert_eq!(pipe.kind(), ErrorKind::Encode);
    }

    #[test]
    fn test_encoder_log_classification() {
        let path = Path::new("out.mp4");
        let log = "[out#0/mp4] Error writing trailer: No space left on device";
        assert!(matches!(
            StorageError::from_encoder_log(path, log),
            Some(StorageError::InsufficientSpace { .. })
        ));
        assert!(StorageError::from_encoder_log(path, "Unknown encoder 'libx265'").is_none());
    }

    #[test]
    fn test_user_message_mentions_frame() {
        let err: EditorError = DecodeError::Corrupt { frame: 42, reason: "eof".into() }.into();
        assert!(err.user_message().contains("42"));
    }
}
