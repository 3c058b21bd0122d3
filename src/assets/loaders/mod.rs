pub mod bundle;
pub mod directory;

pub use bundle::BundleLoader;
pub use directory::DirectoryLoader;
