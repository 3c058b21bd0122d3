//! # Core Navigation Logic
//!
//! This module contains the screen/popup lifecycle controller.
//! It knows nothing about how views are drawn or how assets are stored.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Presenter (hooks)    │
//!                    │  • Navigator (stacks)   │
//!                    │  • Config (policies)    │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │   Assets   │      │ Transition │      │   Driver   │
//!     │  (loader)  │      │  (player)  │      │  (script)  │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`presenter`]: The `Presenter` and `View` traits, status and transforms
//! - [`navigator`]: The `Navigator` and the handles it gives out
//! - [`config`]: Navigator policies and the config file
//! - [`error`]: Everything a navigation call can fail with

pub mod config;
pub mod error;
pub mod navigator;
pub mod presenter;

pub use error::{HookError, HookKind, HookResult, NavigationError, ViewError};
pub use navigator::{EntrySnapshot, NavigationSnapshot, Navigator, PresenterHandle};
pub use presenter::{
    CloseRequester, Layer, Lifecycle, Presenter, PublicPresenter, Status, Transform, View,
};
