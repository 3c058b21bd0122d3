//! Addressable asset lookup: `Screens/Main` resolves to `<root>/Screens/Main.toml`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use crate::assets::{Asset, AssetError, AssetLoader};

pub const DEFAULT_EXTENSION: &str = "toml";

pub struct DirectoryLoader {
    root: PathBuf,
    extension: String,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an asset path to a file under the root. Paths that are empty,
    /// absolute, or contain `.`/`..` segments never resolve.
    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return None;
        }
        Some(self.root.join(format!("{path}.{}", self.extension)))
    }
}

#[async_trait(?Send)]
impl AssetLoader for DirectoryLoader {
    fn name(&self) -> &str {
        "directory"
    }

    async fn load(&self, path: &str) -> Result<Asset, AssetError> {
        let Some(file) = self.file_for(path) else {
            warn!("Rejected asset path outside {}: {:?}", self.root.display(), path);
            return Err(AssetError::NotFound(path.to_string()));
        };

        debug!("Reading asset {} from {}", path, file.display());
        match tokio::fs::read_to_string(&file).await {
            Ok(contents) => Ok(Asset::new(path, contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AssetError::NotFound(path.to_string())),
            Err(e) => Err(AssetError::Io {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
