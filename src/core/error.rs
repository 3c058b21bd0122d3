//! # Navigation Errors
//!
//! Everything an open or close call can fail with. Access violations are not
//! listed here: calling a lifecycle operation from outside the navigator does
//! not compile.

use std::fmt;

use crate::assets::AssetError;

/// Which lifecycle hook produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Construct,
    Activate,
    Deactivate,
    Destroy,
}

impl HookKind {
    pub fn label(&self) -> &'static str {
        match self {
            HookKind::Construct => "construct",
            HookKind::Activate => "activate",
            HookKind::Deactivate => "deactivate",
            HookKind::Destroy => "destroy",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned by a presenter's lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HookError {}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        HookError::new(message)
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        HookError::new(message)
    }
}

pub type HookResult = Result<(), HookError>;

/// Error returned when a loaded asset cannot be turned into a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    message: String,
}

impl ViewError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ViewError {}

/// Errors surfaced by [`Navigator`](crate::core::Navigator) operations.
///
/// Failed opens never leave partial state behind: the stacks are unchanged
/// and any acquired asset has been released by the time the error is returned.
#[derive(Debug)]
pub enum NavigationError {
    /// The view asset could not be loaded (missing path, I/O, malformed data).
    AssetResolution(AssetError),
    /// The asset loaded but the view could not be built from it.
    Instantiation { path: String, message: String },
    /// The operation does not apply to the current state (nothing to close, etc).
    InvalidTransition(String),
    /// A presenter hook failed. Propagated as-is after cleanup.
    Hook {
        path: String,
        hook: HookKind,
        source: HookError,
    },
    /// Another open/close is still in flight for the same slot.
    Busy(String),
    /// The popup type is already open and duplicates are rejected.
    AlreadyOpen(String),
    /// The navigator shut down while the operation was suspended.
    Cancelled,
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::AssetResolution(e) => write!(f, "asset resolution failed: {e}"),
            NavigationError::Instantiation { path, message } => {
                write!(f, "failed to instantiate view for {path}: {message}")
            }
            NavigationError::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            NavigationError::Hook { path, hook, source } => {
                write!(f, "{hook} hook failed for {path}: {source}")
            }
            NavigationError::Busy(slot) => {
                write!(f, "{slot} already has an operation in flight")
            }
            NavigationError::AlreadyOpen(path) => write!(f, "popup {path} is already open"),
            NavigationError::Cancelled => write!(f, "navigation cancelled: navigator shut down"),
        }
    }
}

impl std::error::Error for NavigationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NavigationError::AssetResolution(e) => Some(e),
            NavigationError::Hook { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<AssetError> for NavigationError {
    fn from(e: AssetError) -> Self {
        NavigationError::AssetResolution(e)
    }
}
