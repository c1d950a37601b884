/// Error types shared across the viewer
///
/// `FetchError` travels inside iced messages, so it is `Clone` and carries
/// rendered messages instead of the underlying error values.
use std::path::PathBuf;
use thiserror::Error;

/// A step list or image fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("no sample for {run}/{tag} at step {step}")]
    NotFound { run: String, tag: String, step: u64 },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("background task failed: {0}")]
    Join(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

impl From<CatalogError> for FetchError {
    fn from(err: CatalogError) -> Self {
        FetchError::Catalog(err.to_string())
    }
}

impl From<image::ImageError> for FetchError {
    fn from(err: image::ImageError) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        FetchError::Join(err.to_string())
    }
}

/// Errors raised by the SQLite sample catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not determine the user data directory")]
    NoDataDir,
}

/// Errors raised while loading or saving the viewer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not determine the user config directory")]
    NoConfigDir,
}

/// Errors raised while importing a log directory
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("log directory does not exist: {0}")]
    MissingLogdir(PathBuf),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("background task failed: {0}")]
    Join(String),
}

impl From<CatalogError> for ImportError {
    fn from(err: CatalogError) -> Self {
        ImportError::Catalog(err.to_string())
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Catalog(err.to_string())
    }
}
