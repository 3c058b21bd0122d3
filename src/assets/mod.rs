pub mod loader;
pub mod loaders;

pub use loader::{Asset, AssetError, AssetLoader};
pub use loaders::{BundleLoader, DirectoryLoader};

use log::info;

use crate::core::config::{AssetBackend, ResolvedConfig};

/// Build the asset backend selected by a resolved config.
pub fn build_loader(config: &ResolvedConfig) -> Result<Box<dyn AssetLoader>, AssetError> {
    match config.asset_backend {
        AssetBackend::Bundle => {
            let bundle = BundleLoader::from_file(&config.asset_bundle)?;
            Ok(Box::new(bundle))
        }
        AssetBackend::Directory => {
            info!("Resolving assets from {}", config.asset_root.display());
            Ok(Box::new(DirectoryLoader::new(config.asset_root.clone())))
        }
    }
}
