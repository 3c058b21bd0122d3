use std::fmt;

use async_trait::async_trait;

/// A loaded view asset: the raw contents stored under a path.
///
/// Views decide how to read `contents`; the bundled demo views parse it as TOML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: String,
    pub contents: String,
}

impl Asset {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Errors that can occur while resolving an asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Nothing is stored under the path (or the path escapes the asset root).
    NotFound(String),
    /// The backend failed to read an existing asset.
    Io { path: String, message: String },
    /// The backing store exists but cannot be interpreted.
    Malformed { path: String, message: String },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound(path) => write!(f, "asset not found: {path}"),
            AssetError::Io { path, message } => write!(f, "failed to read asset {path}: {message}"),
            AssetError::Malformed { path, message } => {
                write!(f, "malformed asset store {path}: {message}")
            }
        }
    }
}

impl std::error::Error for AssetError {}

/// Loads view assets by path.
///
/// Implementations are interchangeable; which one backs a navigator is a
/// deployment choice (see [`build_loader`](super::build_loader)). Loaders run on
/// the UI thread, so the futures they return are not required to be `Send`.
#[async_trait(?Send)]
pub trait AssetLoader {
    /// Returns the name of the backend, used in logs.
    fn name(&self) -> &str;

    /// Resolves `path` to an asset.
    async fn load(&self, path: &str) -> Result<Asset, AssetError>;

    /// Returns an asset handle once its view has been torn down.
    fn release(&self, _asset: &Asset) {}
}
