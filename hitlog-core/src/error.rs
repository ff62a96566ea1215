use std::io;
use std::path::PathBuf;

/// Errors produced while assembling a run configuration.
///
/// These are fatal: the run must not start with a broken configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no output path was configured for the hit-count artifact")]
    MissingOutput,

    #[error("'{0}' is not a valid hexadecimal offset")]
    BadOffset(String),
}

/// Errors produced while creating or flushing the hit-count artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to create artifact at {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
