//! Flat resource bundle: every asset lives in one TOML document, keyed by path.
//!
//! ```toml
//! ["Screens/Main"]
//! title = "Main menu"
//!
//! ["Popups/Settings"]
//! title = "Settings"
//! ```
//!
//! Each top-level table becomes the contents of the asset stored under its key.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};

use crate::assets::{Asset, AssetError, AssetLoader};

/// In-memory asset bundle.
#[derive(Debug, Default, Clone)]
pub struct BundleLoader {
    assets: HashMap<String, String>,
}

impl BundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            assets: entries
                .into_iter()
                .map(|(path, contents)| (path.into(), contents.into()))
                .collect(),
        }
    }

    /// Parses a bundle document. Tables are re-serialized as the asset
    /// contents; plain strings are stored verbatim.
    pub fn from_toml_str(source: &str) -> Result<Self, AssetError> {
        let table: toml::Table = toml::from_str(source).map_err(|e| AssetError::Malformed {
            path: "<bundle>".to_string(),
            message: e.to_string(),
        })?;

        let mut bundle = Self::new();
        for (path, value) in table {
            let contents = match value {
                toml::Value::String(s) => s,
                toml::Value::Table(t) => toml::to_string(&t).map_err(|e| AssetError::Malformed {
                    path: path.clone(),
                    message: e.to_string(),
                })?,
                other => {
                    return Err(AssetError::Malformed {
                        path,
                        message: format!("expected a table or string, found {}", other.type_str()),
                    });
                }
            };
            bundle.insert(path, contents);
        }
        Ok(bundle)
    }

    /// Reads and parses a bundle file. Called once at startup, so it reads synchronously.
    pub fn from_file(path: &Path) -> Result<Self, AssetError> {
        let source = fs::read_to_string(path).map_err(|e| AssetError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let bundle = Self::from_toml_str(&source).map_err(|e| match e {
            AssetError::Malformed { message, .. } => AssetError::Malformed {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        info!("Loaded asset bundle {} ({} assets)", path.display(), bundle.len());
        Ok(bundle)
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.assets.insert(path.into(), contents.into());
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[async_trait(?Send)]
impl AssetLoader for BundleLoader {
    fn name(&self) -> &str {
        "bundle"
    }

    async fn load(&self, path: &str) -> Result<Asset, AssetError> {
        debug!("Bundle lookup: {}", path);
        self.assets
            .get(path)
            .map(|contents| Asset::new(path, contents.clone()))
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }
}
