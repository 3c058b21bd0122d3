//! # Navigator
//!
//! Owns every open screen and popup and is the only thing allowed to move
//! them through their lifecycle.
//!
//! ```text
//!   popup layer   ┌──────────────┐  z = 3   (topmost, closed first)
//!                 │   Confirm    │
//!                 ├──────────────┤  z = 1
//!                 │   Settings   │
//!   ─────────────────────────────────────────
//!   screen layer  ┌──────────────┐
//!                 │ Game (active)│  Opened
//!                 ├──────────────┤
//!                 │ Main         │  Hidden   (history, not destroyed)
//!                 └──────────────┘
//! ```
//!
//! Opening loads the view asset, instantiates the view, binds model and view,
//! runs the construct hook, parents the view, then activates and plays the
//! open transition. Closing runs the same steps backwards and releases the
//! asset. If anything fails before the presenter is committed to a stack,
//! the stacks are untouched and every acquired asset is released.
//!
//! Everything runs on one thread. Operations suspend only while an asset
//! loads or a transition plays. Each slot (the screen slot, or one popup
//! type) admits a single operation at a time; a second one gets
//! [`NavigationError::Busy`]. [`Navigator::shutdown`] cancels whatever is
//! suspended and tears down every presenter still alive.

mod handle;
mod managed;
mod popup_stack;
mod scene;
mod screen_stack;

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

pub use handle::PresenterHandle;

use managed::{ManagedPresenter, Slot};
use popup_stack::PopupStack;
use scene::Scene;
use screen_stack::ScreenStack;

use crate::assets::{AssetLoader, build_loader};
use crate::core::config::{
    DuplicatePolicy, HistoryPolicy, NavigatorSettings, ReopenPolicy, ResolvedConfig,
};
use crate::core::error::NavigationError;
use crate::core::presenter::{
    CloseRequest, InstanceId, Layer, Presenter, PublicPresenter, Status, Transform, View,
};
use crate::transition::{TimedTransitions, TransitionPlayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKey {
    Screen,
    Popup(TypeId),
}

/// Marks slots as busy for as long as it lives.
struct InFlight<'a> {
    slots: &'a RefCell<HashSet<SlotKey>>,
    keys: Vec<SlotKey>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slots = self.slots.borrow_mut();
        for key in &self.keys {
            slots.remove(key);
        }
    }
}

/// One presenter as reported by [`Navigator::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub path: &'static str,
    pub status: Status,
    pub transform: Option<Transform>,
}

impl EntrySnapshot {
    fn of(presenter: &dyn ManagedPresenter) -> Self {
        Self {
            path: presenter.path(),
            status: presenter.status(),
            transform: presenter.transform(),
        }
    }
}

/// Point-in-time view of both stacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationSnapshot {
    pub screen: Option<EntrySnapshot>,
    /// Oldest first.
    pub history: Vec<EntrySnapshot>,
    /// Bottom first.
    pub popups: Vec<EntrySnapshot>,
}

pub struct Navigator {
    loader: Box<dyn AssetLoader>,
    transitions: Box<dyn TransitionPlayer>,
    settings: NavigatorSettings,
    screens: RefCell<ScreenStack>,
    popups: RefCell<PopupStack>,
    scene: RefCell<Scene>,
    next_id: Cell<u64>,
    close_tx: UnboundedSender<CloseRequest>,
    close_rx: RefCell<UnboundedReceiver<CloseRequest>>,
    deferred: RefCell<Vec<CloseRequest>>,
    in_flight: RefCell<HashSet<SlotKey>>,
    shutdown: watch::Sender<bool>,
}

impl Navigator {
    pub fn new(
        loader: Box<dyn AssetLoader>,
        transitions: Box<dyn TransitionPlayer>,
        settings: NavigatorSettings,
    ) -> Self {
        info!(
            "Navigator using {} assets and {} transitions",
            loader.name(),
            transitions.name()
        );
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            loader,
            transitions,
            settings,
            screens: RefCell::new(ScreenStack::default()),
            popups: RefCell::new(PopupStack::default()),
            scene: RefCell::new(Scene::default()),
            next_id: Cell::new(1),
            close_tx,
            close_rx: RefCell::new(close_rx),
            deferred: RefCell::new(Vec::new()),
            in_flight: RefCell::new(HashSet::new()),
            shutdown,
        }
    }

    /// Builds a navigator with the configured asset backend and timed transitions.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, NavigationError> {
        let loader = build_loader(config)?;
        Ok(Self::new(
            loader,
            Box::new(TimedTransitions),
            config.settings.clone(),
        ))
    }

    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    // ========================================================================
    // Screens
    // ========================================================================

    /// Opens `P` as the active screen, hiding the current one into history.
    ///
    /// `model` defaults to `P::Model::default()`.
    pub async fn open_screen<P: Presenter>(
        &self,
        model: Option<P::Model>,
    ) -> Result<PresenterHandle<P>, NavigationError> {
        self.ensure_running()?;
        let _busy = self.acquire(vec![SlotKey::Screen], "screen slot")?;

        let current = self.screens.borrow().active().cloned();
        let same_type = current
            .as_ref()
            .is_some_and(|screen| screen.type_key() == TypeId::of::<P>());

        if same_type && self.settings.screen_reopen == ReopenPolicy::Ignore {
            if let Some(handle) = current.and_then(PresenterHandle::from_erased) {
                debug!("{} is already the active screen", P::PATH);
                return Ok(handle);
            }
        }

        let slot = self.instantiate::<P>(model).await?;
        let presenter: Rc<dyn ManagedPresenter> = slot.clone();

        let outgoing = self.screens.borrow().active().cloned().filter(|_| {
            same_type || self.settings.screen_history == HistoryPolicy::Destroy
        });
        if let Some(outgoing) = outgoing {
            let retired = self.retire(&outgoing).await;
            self.screens.borrow_mut().discard_current();
            if let Err(e) = retired {
                self.discard(presenter.as_ref());
                if let Err(reveal) = self.screens.borrow_mut().restore_previous() {
                    warn!("Restoring history after {} failed to close: {}", outgoing.path(), reveal);
                }
                return Err(e);
            }
        }

        presenter.set_parent_transform(Transform::new(Layer::Screen, 0));
        let pushed = self.screens.borrow_mut().open(presenter.clone());
        if let Err(e) = pushed {
            self.discard(presenter.as_ref());
            return Err(e);
        }

        if let Err(e) = self.present(&presenter).await {
            self.screens.borrow_mut().abandon(presenter.id());
            return Err(e);
        }

        info!("Opened screen {}", P::PATH);
        Ok(PresenterHandle::new(slot))
    }

    /// Closes and destroys the active screen and reactivates the previous one.
    pub async fn close_current_screen(&self) -> Result<(), NavigationError> {
        self.ensure_running()?;
        let _busy = self.acquire(vec![SlotKey::Screen], "screen slot")?;
        self.close_active_screen().await
    }

    async fn close_active_screen(&self) -> Result<(), NavigationError> {
        let Some(current) = self.screens.borrow().active().cloned() else {
            return Err(NavigationError::InvalidTransition(
                "no screen is open".to_string(),
            ));
        };

        let retired = self.retire(&current).await;
        if matches!(retired, Err(NavigationError::Cancelled)) {
            return retired;
        }
        let revealed = self.screens.borrow_mut().close_current();
        info!("Closed screen {}", current.path());
        retired.and(revealed)
    }

    // ========================================================================
    // Popups
    // ========================================================================

    /// Opens `P` above every popup currently open.
    pub async fn open_popup<P: Presenter>(
        &self,
        model: Option<P::Model>,
    ) -> Result<PresenterHandle<P>, NavigationError> {
        self.ensure_running()?;
        let key = TypeId::of::<P>();
        let _busy = self.acquire(vec![SlotKey::Popup(key)], P::PATH)?;

        if self.settings.duplicate_popups == DuplicatePolicy::Reject
            && self.popups.borrow().contains_type(key)
        {
            return Err(NavigationError::AlreadyOpen(P::PATH.to_string()));
        }

        let slot = self.instantiate::<P>(model).await?;
        let presenter: Rc<dyn ManagedPresenter> = slot.clone();
        self.popups.borrow_mut().open(presenter.clone());

        if let Err(e) = self.present(&presenter).await {
            self.popups.borrow_mut().close_one(presenter.id());
            return Err(e);
        }

        info!("Opened popup {}", P::PATH);
        Ok(PresenterHandle::new(slot))
    }

    /// Closes the topmost popup of type `P`. Other popups are not touched.
    pub async fn close_popup<P: Presenter>(&self) -> Result<(), NavigationError> {
        self.ensure_running()?;
        let key = TypeId::of::<P>();
        let _busy = self.acquire(vec![SlotKey::Popup(key)], P::PATH)?;

        let Some(popup) = self.popups.borrow().topmost_of(key) else {
            return Err(NavigationError::InvalidTransition(format!(
                "popup {} is not open",
                P::PATH
            )));
        };
        self.close_popup_instance(&popup).await
    }

    /// Closes every open popup, topmost first.
    ///
    /// A failing popup does not stop the others from closing; the first
    /// error is returned once all have been attempted.
    pub async fn close_all_popups(&self) -> Result<(), NavigationError> {
        self.ensure_running()?;
        let order = self.popups.borrow().closing_order();
        let keys: HashSet<SlotKey> = order
            .iter()
            .map(|popup| SlotKey::Popup(popup.type_key()))
            .collect();
        let _busy = self.acquire(keys.into_iter().collect(), "popup stack")?;

        let mut first_error = None;
        for popup in order {
            match self.close_popup_instance(&popup).await {
                Ok(()) => {}
                Err(NavigationError::Cancelled) => return Err(NavigationError::Cancelled),
                Err(e) => {
                    warn!("Closing {}: {}", popup.path(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn close_popup_instance(
        &self,
        popup: &Rc<dyn ManagedPresenter>,
    ) -> Result<(), NavigationError> {
        let retired = self.retire(popup).await;
        if matches!(retired, Err(NavigationError::Cancelled)) {
            return retired;
        }
        self.popups.borrow_mut().close_one(popup.id());
        info!("Closed popup {}", popup.path());
        retired
    }

    // ========================================================================
    // Self-close requests
    // ========================================================================

    /// Performs the closes presenters asked for through `request_close`.
    ///
    /// Requests from presenters that are still opening, or whose slot is busy,
    /// are kept for the next call. Returns how many presenters were closed.
    pub async fn process_close_requests(&self) -> Result<usize, NavigationError> {
        self.ensure_running()?;

        let mut pending: Vec<CloseRequest> = self.deferred.borrow_mut().drain(..).collect();
        {
            let mut rx = self.close_rx.borrow_mut();
            while let Ok(request) = rx.try_recv() {
                pending.push(request);
            }
        }

        let mut closed = 0;
        let mut first_error = None;
        for request in pending {
            let Some(state) = request.state.upgrade() else {
                continue;
            };
            match state.status.get() {
                Status::Closing | Status::Closed => continue,
                Status::Unloaded | Status::Opening => {
                    self.deferred.borrow_mut().push(request);
                    continue;
                }
                Status::Opened | Status::Hidden => {}
            }

            match self.close_requested(request.id).await {
                Ok(true) => closed += 1,
                Ok(false) => debug!("Close request for a presenter no longer held"),
                Err(NavigationError::Busy(slot)) => {
                    debug!("Deferring close request: {} is busy", slot);
                    self.deferred.borrow_mut().push(request);
                }
                Err(NavigationError::Cancelled) => return Err(NavigationError::Cancelled),
                Err(e) => {
                    closed += 1;
                    warn!("Requested close failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(closed), Err)
    }

    async fn close_requested(&self, id: InstanceId) -> Result<bool, NavigationError> {
        let is_active = self
            .screens
            .borrow()
            .active()
            .is_some_and(|screen| screen.id() == id);
        if is_active {
            let _busy = self.acquire(vec![SlotKey::Screen], "screen slot")?;
            self.close_active_screen().await?;
            return Ok(true);
        }

        let is_hidden = self
            .screens
            .borrow()
            .history()
            .iter()
            .any(|screen| screen.id() == id);
        if is_hidden {
            let _busy = self.acquire(vec![SlotKey::Screen], "screen slot")?;
            let removed = self.screens.borrow_mut().remove_hidden(id);
            if let Some(screen) = removed {
                debug!("Dropping {} from history", screen.path());
                self.retire_instantly(&screen).await?;
            }
            return Ok(true);
        }

        let popup = self.popups.borrow().find(id);
        if let Some(popup) = popup {
            let _busy = self.acquire(vec![SlotKey::Popup(popup.type_key())], popup.path())?;
            self.close_popup_instance(&popup).await?;
            return Ok(true);
        }

        Ok(false)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Registers a view that already exists in the layout. Presenters whose
    /// view type is pre-placed take it from here instead of loading an asset.
    pub fn place_in_scene<V: View>(&self, view: V) {
        self.scene.borrow_mut().place(view);
    }

    /// The active screen, if it is a `P`.
    pub fn active_screen<P: Presenter>(&self) -> Option<PresenterHandle<P>> {
        let active = self.screens.borrow().active().cloned()?;
        PresenterHandle::from_erased(active)
    }

    /// The topmost open popup of type `P`.
    pub fn popup<P: Presenter>(&self) -> Option<PresenterHandle<P>> {
        let popup = self.popups.borrow().topmost_of(TypeId::of::<P>())?;
        PresenterHandle::from_erased(popup)
    }

    pub fn popup_count(&self) -> usize {
        self.popups.borrow().entries().len()
    }

    pub fn history_depth(&self) -> usize {
        self.screens.borrow().history().len()
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        let screens = self.screens.borrow();
        let popups = self.popups.borrow();
        NavigationSnapshot {
            screen: screens.active().map(|screen| EntrySnapshot::of(screen.as_ref())),
            history: screens
                .history()
                .iter()
                .map(|screen| EntrySnapshot::of(screen.as_ref()))
                .collect(),
            popups: popups
                .entries()
                .iter()
                .map(|popup| EntrySnapshot::of(popup.as_ref()))
                .collect(),
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Cancels suspended operations and tears down every presenter.
    ///
    /// Popups go first (topmost first), then the active screen, then history.
    /// Safe to call more than once; dropping the navigator calls it too.
    pub fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        info!("Navigator shutting down");

        let popups = self.popups.borrow_mut().drain();
        let screens = self.screens.borrow_mut().drain();
        for presenter in popups.iter().chain(screens.iter()) {
            debug!("Tearing down {}", presenter.path());
            self.discard(presenter.as_ref());
        }

        self.deferred.borrow_mut().clear();
        self.close_rx.borrow_mut().close();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_running(&self) -> Result<(), NavigationError> {
        if self.is_shut_down() {
            return Err(NavigationError::Cancelled);
        }
        Ok(())
    }

    fn acquire(&self, keys: Vec<SlotKey>, label: &str) -> Result<InFlight<'_>, NavigationError> {
        let mut slots = self.in_flight.borrow_mut();
        if keys.iter().any(|key| slots.contains(key)) {
            return Err(NavigationError::Busy(label.to_string()));
        }
        slots.extend(keys.iter().copied());
        Ok(InFlight {
            slots: &self.in_flight,
            keys,
        })
    }

    fn allocate_id(&self) -> InstanceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        InstanceId(id)
    }

    /// Races `fut` against shutdown.
    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, NavigationError> {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|done| *done) => Err(NavigationError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Loads, instantiates, binds and constructs a fresh `P`. On error nothing
    /// is left behind.
    async fn instantiate<P: Presenter>(
        &self,
        model: Option<P::Model>,
    ) -> Result<Rc<Slot<P>>, NavigationError> {
        let slot = Rc::new(Slot::<P>::new(self.allocate_id(), self.close_tx.clone()));
        slot.bind_model(model.unwrap_or_default());

        if <P::View as View>::PREPLACED {
            let Some(view) = self.scene.borrow_mut().take::<P::View>() else {
                return Err(NavigationError::Instantiation {
                    path: P::PATH.to_string(),
                    message: "no pre-placed view in the scene".to_string(),
                });
            };
            debug!("Bound pre-placed view for {}", P::PATH);
            slot.bind_view(view, None);
        } else {
            let asset = self.cancellable(self.loader.load(P::PATH)).await??;
            let view = match <P::View as View>::instantiate(&asset) {
                Ok(view) => view,
                Err(e) => {
                    self.loader.release(&asset);
                    return Err(NavigationError::Instantiation {
                        path: P::PATH.to_string(),
                        message: e.to_string(),
                    });
                }
            };
            debug!("Instantiated view for {} from {}", P::PATH, self.loader.name());
            slot.bind_view(view, Some(asset));
        }

        if let Err(e) = slot.construct() {
            self.discard(slot.as_ref());
            return Err(e);
        }
        Ok(slot)
    }

    /// Activates and animates in; tears the presenter down if that fails.
    async fn present(&self, presenter: &Rc<dyn ManagedPresenter>) -> Result<(), NavigationError> {
        let transition = self.settings.transition_for(presenter.path());
        match self
            .cancellable(presenter.open(self.transitions.as_ref(), transition))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) | Err(e) => {
                self.discard(presenter.as_ref());
                Err(e)
            }
        }
    }

    /// Closes with the configured transition and releases the presenter's
    /// resources whatever the outcome.
    async fn retire(&self, presenter: &Rc<dyn ManagedPresenter>) -> Result<(), NavigationError> {
        let transition = self.settings.transition_for(presenter.path());
        let closed = self
            .cancellable(presenter.close(self.transitions.as_ref(), transition))
            .await
            .and_then(|outcome| outcome);
        if closed.is_err() {
            presenter.teardown();
        }
        presenter.release(self.loader.as_ref(), &mut self.scene.borrow_mut());
        closed
    }

    /// Closes a presenter that is not on screen; no transition is played.
    async fn retire_instantly(
        &self,
        presenter: &Rc<dyn ManagedPresenter>,
    ) -> Result<(), NavigationError> {
        let closed = presenter.close(self.transitions.as_ref(), None).await;
        if closed.is_err() {
            presenter.teardown();
        }
        presenter.release(self.loader.as_ref(), &mut self.scene.borrow_mut());
        closed
    }

    fn discard(&self, presenter: &dyn ManagedPresenter) {
        presenter.teardown();
        presenter.release(self.loader.as_ref(), &mut self.scene.borrow_mut());
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use crate::core::error::HookKind;
    use crate::test_support::{
        ConfirmPopup, CorruptPopup, Gate, GameScreen, HudScreen, HudView, MainScreen,
        MissingPopup, SettingsPopup, ShopScreen, TestModel, ToastPopup, animated, harness,
        harness_with,
    };
    use tokio_test::task::spawn;
    use tokio_test::{assert_pending, assert_ready};

    // ------------------------------------------------------------------------
    // Screens
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_screen_history_round_trip_without_reload() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let game = h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();

        assert_eq!(main.status(), Status::Hidden);
        assert_eq!(game.status(), Status::Opened);
        assert_eq!(h.journal.count("deactivate Screens/Main"), 1);
        assert_eq!(h.journal.count("destroy Screens/Main"), 0);

        h.navigator.close_current_screen().await.unwrap();

        assert_eq!(game.status(), Status::Closed);
        assert_eq!(main.status(), Status::Opened);
        assert_eq!(h.journal.count("destroy Screens/Game"), 1);
        assert_eq!(h.journal.count("activate Screens/Main"), 2);
        assert_eq!(h.loader.loads_of("Screens/Main"), 1);
        assert_eq!(h.loader.outstanding(), 1);
        assert!(
            h.navigator
                .active_screen::<MainScreen>()
                .unwrap()
                .same_instance(&main)
        );
    }

    #[tokio::test]
    async fn test_hooks_run_in_lifecycle_order() {
        let h = harness();
        h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        h.navigator.close_current_screen().await.unwrap();

        assert_eq!(
            h.journal.entries(),
            vec![
                "construct Screens/Main",
                "activate Screens/Main",
                "deactivate Screens/Main",
                "destroy Screens/Main",
            ]
        );
        assert!(h.navigator.snapshot().screen.is_none());
        assert_eq!(h.loader.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_at_most_one_screen_opened() {
        let h = harness();
        h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        h.navigator.open_screen::<ShopScreen>(h.model()).await.unwrap();

        let snapshot = h.navigator.snapshot();
        assert_eq!(snapshot.screen.as_ref().map(|s| s.path), Some("Screens/Shop"));
        assert_eq!(snapshot.history.len(), 2);
        assert!(
            snapshot
                .history
                .iter()
                .all(|entry| entry.status == Status::Hidden)
        );
    }

    #[tokio::test]
    async fn test_close_screen_with_nothing_open_is_invalid() {
        let h = harness();
        let err = h.navigator.close_current_screen().await.unwrap_err();
        assert!(matches!(err, NavigationError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_reopen_active_screen_ignored_by_default() {
        let h = harness();
        let first = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let again = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();

        assert!(first.same_instance(&again));
        assert_eq!(h.loader.loads_of("Screens/Main"), 1);
        assert_eq!(h.navigator.history_depth(), 0);
    }

    #[tokio::test]
    async fn test_reopen_active_screen_with_replace_policy() {
        let h = harness_with(NavigatorSettings {
            screen_reopen: ReopenPolicy::Replace,
            ..Default::default()
        });
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        let first = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let second = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();

        assert!(!first.same_instance(&second));
        assert_eq!(first.status(), Status::Closed);
        assert_eq!(second.status(), Status::Opened);
        assert_eq!(h.journal.count("destroy Screens/Main"), 1);
        // Game stays the only history entry
        assert_eq!(h.navigator.history_depth(), 1);
        assert_eq!(h.loader.outstanding(), 2);
    }

    #[tokio::test]
    async fn test_replace_failure_restores_history() {
        let h = harness_with(NavigatorSettings {
            screen_reopen: ReopenPolicy::Replace,
            ..Default::default()
        });
        let game = h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        let main = h
            .navigator
            .open_screen::<MainScreen>(Some(TestModel::failing(&h.journal, HookKind::Deactivate)))
            .await
            .unwrap();

        let err = h
            .navigator
            .open_screen::<MainScreen>(h.model())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NavigationError::Hook {
                hook: HookKind::Deactivate,
                ..
            }
        ));
        assert_eq!(main.status(), Status::Closed);
        assert_eq!(game.status(), Status::Opened);
        assert!(
            h.navigator
                .active_screen::<GameScreen>()
                .unwrap()
                .same_instance(&game)
        );
        assert_eq!(h.navigator.history_depth(), 0);
        assert_eq!(h.loader.outstanding(), 1);

        h.navigator.close_current_screen().await.unwrap();
        assert_eq!(game.status(), Status::Closed);
    }

    #[tokio::test]
    async fn test_reveal_failure_leaves_screen_opened() {
        let h = harness();
        let main = h
            .navigator
            .open_screen::<MainScreen>(h.model())
            .await
            .unwrap();
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        main.with_model_mut(|model| model.fail_on = Some(HookKind::Activate));

        let err = h.navigator.close_current_screen().await.unwrap_err();

        assert!(matches!(
            err,
            NavigationError::Hook {
                hook: HookKind::Activate,
                ..
            }
        ));
        let active = h.navigator.snapshot().screen.unwrap();
        assert_eq!(active.path, "Screens/Main");
        assert_eq!(active.status, Status::Opened);
        assert_eq!(main.status(), Status::Opened);
    }

    #[tokio::test]
    async fn test_history_destroy_policy_closes_previous_screen() {
        let h = harness_with(NavigatorSettings {
            screen_history: HistoryPolicy::Destroy,
            ..Default::default()
        });
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();

        assert_eq!(main.status(), Status::Closed);
        assert_eq!(h.journal.count("destroy Screens/Main"), 1);
        assert_eq!(h.navigator.history_depth(), 0);

        h.navigator.close_current_screen().await.unwrap();
        assert!(h.navigator.snapshot().screen.is_none());
        assert_eq!(h.loader.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_hidden_screen_model_survives() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        main.with_model_mut(|model| model.value = 42);
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        h.navigator.close_current_screen().await.unwrap();

        assert_eq!(main.with_model(|model| model.value), Some(42));
    }

    // ------------------------------------------------------------------------
    // Popups
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_popups_stack_above_screen_in_open_order() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let settings = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        let confirm = h.navigator.open_popup::<ConfirmPopup>(h.model()).await.unwrap();

        assert_eq!(main.transform(), Some(Transform::new(Layer::Screen, 0)));
        let low = settings.transform().unwrap();
        let high = confirm.transform().unwrap();
        assert_eq!(low.layer, Layer::Popup);
        assert!(high.z_index > low.z_index);
        assert_eq!(main.status(), Status::Opened);
    }

    #[tokio::test]
    async fn test_close_popup_leaves_others_untouched() {
        let h = harness();
        let settings = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        let confirm = h.navigator.open_popup::<ConfirmPopup>(h.model()).await.unwrap();
        let confirm_transform = confirm.transform();

        h.navigator.close_popup::<SettingsPopup>().await.unwrap();

        assert_eq!(settings.status(), Status::Closed);
        assert_eq!(confirm.status(), Status::Opened);
        assert_eq!(confirm.transform(), confirm_transform);
        assert_eq!(h.navigator.popup_count(), 1);
        assert_eq!(h.journal.count("deactivate Popups/Confirm"), 0);
    }

    #[tokio::test]
    async fn test_close_all_popups_runs_topmost_first() {
        let h = harness_with(animated(&[
            "Popups/Settings",
            "Popups/Confirm",
            "Popups/Toast",
        ]));
        h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        h.navigator.open_popup::<ConfirmPopup>(h.model()).await.unwrap();
        h.navigator.open_popup::<ToastPopup>(h.model()).await.unwrap();

        h.navigator.close_all_popups().await.unwrap();

        let played = h.transitions.entries();
        assert_eq!(
            played[played.len() - 3..],
            ["close Popups/Toast", "close Popups/Confirm", "close Popups/Settings"]
        );
        let toast = h.journal.position("destroy Popups/Toast").unwrap();
        let confirm = h.journal.position("destroy Popups/Confirm").unwrap();
        let settings = h.journal.position("destroy Popups/Settings").unwrap();
        assert!(toast < confirm && confirm < settings);
        assert_eq!(h.navigator.popup_count(), 0);
        assert_eq!(h.loader.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_close_all_popups_continues_past_failure() {
        let h = harness();
        h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        h.navigator
            .open_popup::<ConfirmPopup>(Some(TestModel::failing(&h.journal, HookKind::Deactivate)))
            .await
            .unwrap();

        let err = h.navigator.close_all_popups().await.unwrap_err();

        assert!(matches!(
            err,
            NavigationError::Hook {
                hook: HookKind::Deactivate,
                ..
            }
        ));
        assert_eq!(h.navigator.popup_count(), 0);
        assert_eq!(h.journal.count("destroy Popups/Confirm"), 1);
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
        assert_eq!(h.loader.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_popup_rejected_by_default() {
        let h = harness();
        h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        let err = h
            .navigator
            .open_popup::<SettingsPopup>(h.model())
            .await
            .unwrap_err();

        assert!(matches!(err, NavigationError::AlreadyOpen(_)));
        assert_eq!(h.loader.loads_of("Popups/Settings"), 1);
        assert_eq!(h.navigator.popup_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_popups_allowed_close_topmost() {
        let h = harness_with(NavigatorSettings {
            duplicate_popups: DuplicatePolicy::Allow,
            ..Default::default()
        });
        let lower = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        let upper = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        assert_eq!(h.navigator.popup_count(), 2);
        assert!(h.navigator.popup::<SettingsPopup>().unwrap().same_instance(&upper));

        h.navigator.close_popup::<SettingsPopup>().await.unwrap();

        assert_eq!(upper.status(), Status::Closed);
        assert_eq!(lower.status(), Status::Opened);
    }

    #[tokio::test]
    async fn test_close_popup_not_open_is_invalid() {
        let h = harness();
        let err = h.navigator.close_popup::<ConfirmPopup>().await.unwrap_err();
        assert!(matches!(err, NavigationError::InvalidTransition(_)));
    }

    // ------------------------------------------------------------------------
    // Failures
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_asset_commits_nothing() {
        let h = harness();
        h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let before = h.navigator.snapshot();

        let err = h
            .navigator
            .open_popup::<MissingPopup>(h.model())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NavigationError::AssetResolution(AssetError::NotFound(_))
        ));
        assert_eq!(h.navigator.snapshot(), before);
        assert_eq!(h.journal.count("construct Popups/Missing"), 0);
    }

    #[tokio::test]
    async fn test_instantiation_failure_releases_asset() {
        let h = harness();
        let err = h
            .navigator
            .open_popup::<CorruptPopup>(h.model())
            .await
            .unwrap_err();

        assert!(matches!(err, NavigationError::Instantiation { .. }));
        assert_eq!(h.loader.loads_of("Popups/Corrupt"), 1);
        assert_eq!(h.loader.outstanding(), 0);
        assert_eq!(h.navigator.popup_count(), 0);
    }

    #[tokio::test]
    async fn test_construct_failure_releases_and_skips_destroy() {
        let h = harness();
        let err = h
            .navigator
            .open_popup::<SettingsPopup>(Some(TestModel::failing(&h.journal, HookKind::Construct)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NavigationError::Hook {
                hook: HookKind::Construct,
                ..
            }
        ));
        assert_eq!(h.journal.count("destroy Popups/Settings"), 0);
        assert_eq!(h.loader.outstanding(), 0);
        assert_eq!(h.navigator.popup_count(), 0);
    }

    #[tokio::test]
    async fn test_activate_failure_rolls_back_screen() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let err = h
            .navigator
            .open_screen::<GameScreen>(Some(TestModel::failing(&h.journal, HookKind::Activate)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NavigationError::Hook {
                hook: HookKind::Activate,
                ..
            }
        ));
        assert_eq!(h.journal.count("destroy Screens/Game"), 1);
        assert_eq!(main.status(), Status::Opened);
        assert_eq!(h.navigator.history_depth(), 0);
        assert_eq!(h.loader.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_destroy_failure_still_releases() {
        let h = harness();
        h.navigator
            .open_popup::<SettingsPopup>(Some(TestModel::failing(&h.journal, HookKind::Destroy)))
            .await
            .unwrap();

        let err = h.navigator.close_popup::<SettingsPopup>().await.unwrap_err();

        assert!(matches!(err, NavigationError::Hook { .. }));
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
        assert_eq!(h.navigator.popup_count(), 0);
        assert_eq!(h.loader.outstanding(), 0);
    }

    // ------------------------------------------------------------------------
    // Self-close requests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_request_close_is_forwarded_once() {
        let h = harness();
        let settings = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();

        settings.request_close();
        settings.request_close();
        settings.close_requester().request_close();

        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 1);
        assert_eq!(settings.status(), Status::Closed);
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_request_close_during_close_is_ignored() {
        let h = harness_with(animated(&["Popups/Settings"]));
        let settings = h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        let gate = Gate::closed();
        h.transitions.hold(&gate);

        let mut closing = spawn(h.navigator.close_popup::<SettingsPopup>());
        assert_pending!(closing.poll());
        assert_eq!(settings.status(), Status::Closing);

        settings.request_close();
        gate.open();
        assert_ready!(closing.poll()).unwrap();

        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 0);
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
    }

    #[tokio::test]
    async fn test_request_close_from_activate_hook_deferred_until_opened() {
        let h = harness();
        let toast = h
            .navigator
            .open_popup::<ToastPopup>(Some(TestModel::closing_from(&h.journal, HookKind::Activate)))
            .await
            .unwrap();
        assert_eq!(toast.status(), Status::Opened);

        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 1);
        assert_eq!(toast.status(), Status::Closed);
    }

    #[tokio::test]
    async fn test_request_close_while_opening_is_deferred() {
        let h = harness_with(animated(&["Popups/Confirm"]));
        let gate = Gate::closed();
        h.transitions.hold(&gate);

        let mut opening = spawn(h.navigator.open_popup::<ConfirmPopup>(h.model()));
        assert_pending!(opening.poll());
        let confirm = h.navigator.popup::<ConfirmPopup>().unwrap();
        assert_eq!(confirm.status(), Status::Opening);

        confirm.request_close();
        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 0);

        gate.open();
        assert_ready!(opening.poll()).unwrap();
        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 1);
        assert_eq!(confirm.status(), Status::Closed);
    }

    #[tokio::test]
    async fn test_request_close_on_active_screen_reveals_previous() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let game = h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();

        game.request_close();
        h.navigator.process_close_requests().await.unwrap();

        assert_eq!(game.status(), Status::Closed);
        assert_eq!(main.status(), Status::Opened);
    }

    #[tokio::test]
    async fn test_request_close_on_hidden_screen_drops_it_from_history() {
        let h = harness();
        let main = h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        let game = h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();

        main.request_close();
        assert_eq!(h.navigator.process_close_requests().await.unwrap(), 1);

        assert_eq!(main.status(), Status::Closed);
        assert_eq!(game.status(), Status::Opened);
        assert_eq!(h.navigator.history_depth(), 0);
        // Deactivated when hidden, not again when dropped
        assert_eq!(h.journal.count("deactivate Screens/Main"), 1);
        assert_eq!(h.journal.count("destroy Screens/Main"), 1);
    }

    // ------------------------------------------------------------------------
    // Concurrency and cancellation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_second_operation_on_busy_slot_rejected() {
        let h = harness();
        let gate = Gate::closed();
        h.loader.hold(&gate);

        let mut first = spawn(h.navigator.open_screen::<MainScreen>(h.model()));
        assert_pending!(first.poll());

        let err = h
            .navigator
            .open_screen::<GameScreen>(h.model())
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Busy(_)));

        gate.open();
        assert_ready!(first.poll()).unwrap();
        assert_eq!(h.loader.loads_of("Screens/Game"), 0);
    }

    #[tokio::test]
    async fn test_different_popup_types_interleave() {
        let h = harness_with(animated(&["Popups/Settings", "Popups/Confirm"]));
        let gate = Gate::closed();
        h.transitions.hold(&gate);

        let mut settings = spawn(h.navigator.open_popup::<SettingsPopup>(h.model()));
        let mut confirm = spawn(h.navigator.open_popup::<ConfirmPopup>(h.model()));
        assert_pending!(settings.poll());
        assert_pending!(confirm.poll());
        assert_eq!(h.navigator.popup_count(), 2);

        gate.open();
        let confirm = assert_ready!(confirm.poll()).unwrap();
        let settings = assert_ready!(settings.poll()).unwrap();
        assert_eq!(settings.status(), Status::Opened);
        assert_eq!(confirm.status(), Status::Opened);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_suspended_open() {
        let h = harness_with(animated(&["Popups/Settings"]));
        let gate = Gate::closed();
        h.transitions.hold(&gate);

        let mut opening = spawn(h.navigator.open_popup::<SettingsPopup>(h.model()));
        assert_pending!(opening.poll());

        h.navigator.shutdown();
        let result = assert_ready!(opening.poll());

        assert!(matches!(result, Err(NavigationError::Cancelled)));
        assert_eq!(h.journal.count("activate Popups/Settings"), 1);
        assert_eq!(h.journal.count("deactivate Popups/Settings"), 1);
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
        assert_eq!(h.loader.outstanding(), 0);
        assert_eq!(h.navigator.popup_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_suspended_load() {
        let h = harness();
        let gate = Gate::closed();
        h.loader.hold(&gate);

        let mut opening = spawn(h.navigator.open_screen::<MainScreen>(h.model()));
        assert_pending!(opening.poll());

        h.navigator.shutdown();
        let result = assert_ready!(opening.poll());

        assert!(matches!(result, Err(NavigationError::Cancelled)));
        assert!(h.journal.entries().is_empty());
        assert_eq!(h.loader.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_everything() {
        let h = harness();
        h.navigator.open_screen::<MainScreen>(h.model()).await.unwrap();
        h.navigator.open_screen::<GameScreen>(h.model()).await.unwrap();
        h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();

        h.navigator.shutdown();
        h.navigator.shutdown();

        assert_eq!(h.journal.count("destroy Screens/Main"), 1);
        assert_eq!(h.journal.count("destroy Screens/Game"), 1);
        assert_eq!(h.journal.count("destroy Popups/Settings"), 1);
        // Main was already deactivated into history
        assert_eq!(h.journal.count("deactivate Screens/Main"), 1);
        assert_eq!(h.loader.outstanding(), 0);
        assert!(matches!(
            h.navigator.open_popup::<ConfirmPopup>(h.model()).await,
            Err(NavigationError::Cancelled)
        ));
    }

    // ------------------------------------------------------------------------
    // Scene
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_preplaced_view_never_hits_loader() {
        let h = harness();
        h.navigator.place_in_scene(HudView::new("overlay"));

        let hud = h.navigator.open_screen::<HudScreen>(h.model()).await.unwrap();
        assert_eq!(hud.with_view(|view| view.label.clone()), Some("overlay".to_string()));
        assert_eq!(h.loader.load_count(), 0);

        h.navigator.close_current_screen().await.unwrap();
        // The view went back to the scene and can be bound again
        h.navigator.open_screen::<HudScreen>(h.model()).await.unwrap();
        assert_eq!(h.loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_preplaced_view_missing_from_scene() {
        let h = harness();
        let err = h
            .navigator
            .open_screen::<HudScreen>(h.model())
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Instantiation { .. }));
    }

    #[tokio::test]
    async fn test_transitions_only_played_when_configured() {
        let h = harness_with(animated(&["Popups/Settings"]));
        h.navigator.open_popup::<SettingsPopup>(h.model()).await.unwrap();
        h.navigator.open_popup::<ConfirmPopup>(h.model()).await.unwrap();
        h.navigator.close_all_popups().await.unwrap();

        assert_eq!(
            h.transitions.entries(),
            vec!["open Popups/Settings", "close Popups/Settings"]
        );
    }
}
