//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.uinav/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::transition::TransitionTiming;

// ============================================================================
// Policies
// ============================================================================

/// What `open_screen::<P>` does when a `P` is already the active screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReopenPolicy {
    /// Keep the active instance and hand back its handle.
    #[default]
    Ignore,
    /// Close and destroy the active instance, then open a fresh one in its place.
    Replace,
}

/// Whether several popups of the same type may be open at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Opening a popup type that is already open fails with `AlreadyOpen`.
    #[default]
    Reject,
    /// Stack another instance on top.
    Allow,
}

/// What happens to the active screen when another screen opens over it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// Hide it into history; closing the new screen reveals it again.
    #[default]
    Keep,
    /// Close and destroy it; nothing is kept to go back to.
    Destroy,
}

/// Which asset backend resolves view paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AssetBackend {
    /// One file per asset under a root directory.
    #[default]
    Directory,
    /// A single TOML bundle holding every asset.
    Bundle,
}

/// Behaviour switches for a [`Navigator`](crate::core::Navigator).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigatorSettings {
    pub screen_reopen: ReopenPolicy,
    pub duplicate_popups: DuplicatePolicy,
    pub screen_history: HistoryPolicy,
    /// Transitions keyed by asset path. Paths not listed open and close instantly.
    pub transitions: HashMap<String, TransitionTiming>,
}

impl NavigatorSettings {
    pub fn transition_for(&self, path: &str) -> Option<TransitionTiming> {
        self.transitions.get(path).copied()
    }
}

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UinavConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub transitions: HashMap<String, TransitionEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub screen_reopen: Option<ReopenPolicy>,
    pub duplicate_popups: Option<DuplicatePolicy>,
    pub screen_history: Option<HistoryPolicy>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AssetsConfig {
    pub backend: Option<AssetBackend>,
    pub root: Option<String>,
    pub bundle: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransitionEntry {
    pub open_ms: Option<u64>,
    pub close_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ASSET_ROOT: &str = "assets";
pub const DEFAULT_ASSET_BUNDLE: &str = "assets/bundle.toml";
pub const DEFAULT_TRANSITION_MS: u64 = 200;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: NavigatorSettings,
    pub asset_backend: AssetBackend,
    pub asset_root: PathBuf,
    pub asset_bundle: PathBuf,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.uinav/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".uinav").join("config.toml"))
}

/// Load config from `~/.uinav/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `UinavConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<UinavConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(UinavConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(UinavConfig::default());
    }

    load_config_from(&path)
}

/// Load config from an explicit path. The file must exist.
pub fn load_config_from(path: &Path) -> Result<UinavConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: UinavConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# uinav Configuration
# Every setting is optional; anything left out uses its default.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# screen_reopen = "ignore"         # "ignore" or "replace"
# duplicate_popups = "reject"      # "reject" or "allow"
# screen_history = "keep"          # "keep" or "destroy"

# [assets]
# backend = "directory"            # "directory" or "bundle" (or UINAV_ASSET_BACKEND)
# root = "assets"                  # Or set UINAV_ASSET_ROOT
# bundle = "assets/bundle.toml"    # Or set UINAV_ASSET_BUNDLE

# Transitions per asset path. Paths not listed open and close instantly.
# [transitions."Popups/Settings"]
# open_ms = 200
# close_ms = 150
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_backend` and `cli_root` are from CLI flags (None = not specified).
pub fn resolve(
    config: &UinavConfig,
    cli_backend: Option<AssetBackend>,
    cli_root: Option<&str>,
) -> ResolvedConfig {
    // Backend: CLI → env → config → default
    let asset_backend = cli_backend
        .or_else(|| {
            std::env::var("UINAV_ASSET_BACKEND")
                .ok()
                .and_then(|s| match AssetBackend::from_str(&s, true) {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("Ignoring UINAV_ASSET_BACKEND: {}", e);
                        None
                    }
                })
        })
        .or(config.assets.backend)
        .unwrap_or_default();

    // Asset root: CLI → env → config → default
    let asset_root = cli_root
        .map(|s| s.to_string())
        .or_else(|| std::env::var("UINAV_ASSET_ROOT").ok())
        .or_else(|| config.assets.root.clone())
        .unwrap_or_else(|| DEFAULT_ASSET_ROOT.to_string());

    // Bundle file: env → config → default
    let asset_bundle = std::env::var("UINAV_ASSET_BUNDLE")
        .ok()
        .or_else(|| config.assets.bundle.clone())
        .unwrap_or_else(|| DEFAULT_ASSET_BUNDLE.to_string());

    let transitions = config
        .transitions
        .iter()
        .map(|(path, entry)| {
            let timing = TransitionTiming::from_millis(
                entry.open_ms.unwrap_or(DEFAULT_TRANSITION_MS),
                entry.close_ms.unwrap_or(DEFAULT_TRANSITION_MS),
            );
            (path.clone(), timing)
        })
        .collect();

    ResolvedConfig {
        settings: NavigatorSettings {
            screen_reopen: config.general.screen_reopen.unwrap_or_default(),
            duplicate_popups: config.general.duplicate_popups.unwrap_or_default(),
            screen_history: config.general.screen_history.unwrap_or_default(),
            transitions,
        },
        asset_backend,
        asset_root: PathBuf::from(asset_root),
        asset_bundle: PathBuf::from(asset_bundle),
    }
}
