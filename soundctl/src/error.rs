/// Error types for the OS-facing leaves and the profile store.
///
/// Every enum carries an `Unsupported` variant: on platforms without the
/// backing OS facility the component refuses up front instead of returning
/// made-up values.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reading or writing sound event bindings.
#[derive(Debug, Error)]
pub enum SoundError {
    #[error("sound store is not available on this platform")]
    Unsupported,

    #[error("registry key not found: {0}")]
    NotFound(String),

    #[error("permission denied accessing registry key {0}. Try running as administrator.")]
    PermissionDenied(String),

    #[error("registry operation on {path} failed with code {code}")]
    Registry { path: String, code: u32 },

    #[error("registry value at {0} is not a string")]
    UnexpectedType(String),

    #[error("sound file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

/// Failures in the profile store.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile name '{0}': use letters, numbers, spaces, underscores, hyphens")]
    InvalidName(String),

    #[error("profile '{0}' not found")]
    NotFound(String),

    #[error("invalid profile format in {}: {reason}", .path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("profile file {} could not be accessed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to snapshot current sounds: {0}")]
    Snapshot(#[from] SoundError),

    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ProfileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure came from the OS refusing access.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
            Self::Snapshot(SoundError::PermissionDenied(_)) => true,
            _ => false,
        }
    }
}

/// Failures from the audio endpoint layer.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio endpoint control is not available on this platform")]
    Unsupported,

    #[error("invalid volume level {0}: must be between 0.0 and 1.0")]
    InvalidLevel(f32),

    #[error("setting the default audio device is not supported")]
    DefaultDeviceUnsupported,

    #[error("audio API call {call} failed: {message}")]
    Api { call: &'static str, message: String },
}

/// Failures starting playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound playback is not available on this platform")]
    Unsupported,

    #[error("WAV file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("no sound file configured for event '{category}\\{sub_event}'")]
    NotConfigured { category: String, sub_event: String },

    #[error("could not look up the event binding: {0}")]
    Lookup(#[from] SoundError),

    #[error("PlaySound failed for {}", .0.display())]
    Failed(PathBuf),
}
