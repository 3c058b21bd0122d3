//! # Presenters
//!
//! A presenter is the unit of navigation: one model, one view, and a set of
//! lifecycle hooks. Application code implements [`Presenter`] (the hooks) and
//! [`View`] (how to build the visual instance from an asset); the navigator
//! owns the instance and drives it through its lifecycle.
//!
//! ```text
//!  Unloaded ──open──▶ Opening ──activate + transition──▶ Opened ──close──▶ Closing ──▶ Closed
//!                                                         │  ▲
//!                                                    hide │  │ reveal   (screens in history)
//!                                                         ▼  │
//!                                                        Hidden
//! ```
//!
//! Hooks on open: `on_construct` (model and view bound, nothing visible yet)
//! then `on_activate` (parented, about to appear). On close: `on_deactivate`
//! then `on_destroy`. A closed presenter is never reopened; the next open
//! builds a fresh instance.
//!
//! Application code only ever sees the [`PublicPresenter`] surface. The
//! lifecycle operations live on a trait private to the navigator module.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::assets::Asset;
use crate::core::error::{HookResult, ViewError};

/// Lifecycle state of a presenter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unloaded,
    Opening,
    Opened,
    /// A screen deactivated into history. Not visible, not destroyed.
    Hidden,
    Closing,
    Closed,
}

/// Layer a view is parented under. Popups always sit above screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Screen,
    Popup,
}

/// Where a view sits once parented: its layer and its stacking order in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transform {
    pub layer: Layer,
    pub z_index: u64,
}

impl Transform {
    pub fn new(layer: Layer, z_index: u64) -> Self {
        Self { layer, z_index }
    }
}

/// The visual instance a presenter owns.
pub trait View: Sized + 'static {
    /// Marks views that already exist in the initial layout. The navigator
    /// takes these from its scene (see `Navigator::place_in_scene`) and never
    /// asks the asset loader for them.
    const PREPLACED: bool = false;

    /// Builds the view from a loaded asset.
    fn instantiate(asset: &Asset) -> Result<Self, ViewError>;
}

/// Hook set for one kind of screen or popup.
///
/// The implementing type is the addressing key: `navigator.open_popup::<Settings>(None)`.
/// All hooks default to doing nothing.
pub trait Presenter: Default + 'static {
    type View: View;
    type Model: Default + 'static;

    /// Asset path the view is loaded from, e.g. `"Popups/Settings"`.
    const PATH: &'static str;

    /// Model and view are bound; the view is not parented or visible yet.
    fn on_construct(&mut self, _cx: &mut Lifecycle<'_, Self>) -> HookResult {
        Ok(())
    }

    /// The view is parented and about to become visible. Subscribe to input here.
    fn on_activate(&mut self, _cx: &mut Lifecycle<'_, Self>) -> HookResult {
        Ok(())
    }

    /// The view is about to disappear (closing, or hidden into history).
    fn on_deactivate(&mut self, _cx: &mut Lifecycle<'_, Self>) -> HookResult {
        Ok(())
    }

    /// Final cleanup. Runs exactly once for every constructed presenter.
    fn on_destroy(&mut self, _cx: &mut Lifecycle<'_, Self>) -> HookResult {
        Ok(())
    }
}

/// What a hook gets to work with.
///
/// Hooks must not reach back into the presenter's handle (`with_model` and
/// friends); the data is already borrowed here.
pub struct Lifecycle<'a, P: Presenter> {
    pub model: &'a mut P::Model,
    pub view: &'a mut P::View,
    closer: &'a CloseRequester,
}

impl<'a, P: Presenter> Lifecycle<'a, P> {
    pub(crate) fn new(
        model: &'a mut P::Model,
        view: &'a mut P::View,
        closer: &'a CloseRequester,
    ) -> Self {
        Self {
            model,
            view,
            closer,
        }
    }

    /// Ask the navigator to close this presenter.
    pub fn request_close(&self) {
        self.closer.request_close();
    }

    /// A requester that outlives the hook, for input callbacks.
    pub fn close_requester(&self) -> CloseRequester {
        self.closer.clone()
    }
}

/// The part of a presenter any caller may use.
pub trait PublicPresenter {
    /// Asset path of the presenter's view.
    fn path(&self) -> &'static str;

    fn status(&self) -> Status;

    /// Where the view is parented. `None` until the navigator places it.
    fn transform(&self) -> Option<Transform>;

    /// Signal that this presenter should close. The navigator performs the
    /// close on its next `process_close_requests`; repeated requests and
    /// requests against a presenter already closing are ignored.
    fn request_close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct InstanceId(pub(crate) u64);

/// State shared between a presenter instance and its close requesters.
#[derive(Debug)]
pub(crate) struct SlotState {
    pub(crate) status: Cell<Status>,
    pub(crate) transform: Cell<Option<Transform>>,
    pub(crate) close_requested: Cell<bool>,
}

impl SlotState {
    pub(crate) fn new() -> Self {
        Self {
            status: Cell::new(Status::Unloaded),
            transform: Cell::new(None),
            close_requested: Cell::new(false),
        }
    }
}

/// A queued self-close request.
pub(crate) struct CloseRequest {
    pub(crate) id: InstanceId,
    pub(crate) state: Weak<SlotState>,
}

/// Forwards close requests for one presenter to its navigator.
///
/// Cheap to clone; keep one inside input callbacks that need to dismiss
/// their own screen or popup.
#[derive(Clone)]
pub struct CloseRequester {
    id: InstanceId,
    path: &'static str,
    state: Rc<SlotState>,
    requests: UnboundedSender<CloseRequest>,
}

impl CloseRequester {
    pub(crate) fn new(
        id: InstanceId,
        path: &'static str,
        state: Rc<SlotState>,
        requests: UnboundedSender<CloseRequest>,
    ) -> Self {
        Self {
            id,
            path,
            state,
            requests,
        }
    }

    pub fn request_close(&self) {
        let status = self.state.status.get();
        if matches!(status, Status::Closing | Status::Closed) {
            debug!("Ignoring close request for {}: already {:?}", self.path, status);
            return;
        }
        if self.state.close_requested.replace(true) {
            debug!("Close already requested for {}", self.path);
            return;
        }

        let request = CloseRequest {
            id: self.id,
            state: Rc::downgrade(&self.state),
        };
        if self.requests.send(request).is_err() {
            warn!("Close request for {} dropped: navigator is gone", self.path);
        } else {
            debug!("Queued close request for {}", self.path);
        }
    }
}
