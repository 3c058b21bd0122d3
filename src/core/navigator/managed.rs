//! Lifecycle operations reachable only from inside the navigator.
//!
//! [`ManagedPresenter`] is the restricted capability set. It is private to the
//! `navigator` module tree, so code outside it has no way to name the trait or
//! the [`Slot`] that implements it; the handles given to application code only
//! expose [`PublicPresenter`].
//!
//! Hook bookkeeping: `constructed` and `active` flip after their hook succeeds,
//! `active` and `destroyed` flip before the matching teardown hook runs. Each
//! hook therefore runs at most once per pairing, however the instance ends up
//! being closed.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::scene::Scene;
use crate::assets::{Asset, AssetLoader};
use crate::core::error::{HookKind, NavigationError};
use crate::core::presenter::{
    CloseRequest, CloseRequester, InstanceId, Lifecycle, Presenter, PublicPresenter, SlotState,
    Status, Transform, View,
};
use crate::transition::{TransitionPlayer, TransitionTiming, TransitionTarget};

/// The restricted set: everything that mutates a presenter's lifecycle.
#[async_trait(?Send)]
pub(super) trait ManagedPresenter: PublicPresenter {
    fn id(&self) -> InstanceId;

    /// Type identity of the concrete presenter; the addressing key for popups.
    fn type_key(&self) -> TypeId;

    /// Runs the construct hook. Model and view must be bound.
    fn construct(&self) -> Result<(), NavigationError>;

    fn set_parent_transform(&self, parent: Transform);

    /// Activates and animates in. Resolves once the presenter is `Opened`.
    async fn open(
        &self,
        player: &dyn TransitionPlayer,
        transition: Option<TransitionTiming>,
    ) -> Result<(), NavigationError>;

    /// Deactivates, animates out, destroys. Resolves once the presenter is `Closed`.
    async fn close(
        &self,
        player: &dyn TransitionPlayer,
        transition: Option<TransitionTiming>,
    ) -> Result<(), NavigationError>;

    /// Deactivates without destroying (screen pushed into history).
    fn hide(&self) -> Result<(), NavigationError>;

    /// Reactivates a hidden screen. The presenter is `Opened` afterwards
    /// even if its activate hook fails; deactivate will not run for it.
    fn reveal(&self) -> Result<(), NavigationError>;

    /// Runs whichever of deactivate/destroy have not run yet and marks the
    /// presenter closed. Used on failures and cancellation; hook errors here
    /// are logged, never returned.
    fn teardown(&self);

    /// Drops model and view and hands the asset back to the loader.
    /// Pre-placed views go back into the scene instead.
    fn release(&self, loader: &dyn AssetLoader, scene: &mut Scene);

    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// A presenter instance together with everything bound to it.
pub(super) struct Slot<P: Presenter> {
    id: InstanceId,
    state: Rc<SlotState>,
    closer: CloseRequester,
    presenter: RefCell<P>,
    model: RefCell<Option<P::Model>>,
    view: RefCell<Option<P::View>>,
    asset: RefCell<Option<Asset>>,
    constructed: Cell<bool>,
    active: Cell<bool>,
    destroyed: Cell<bool>,
}

impl<P: Presenter> Slot<P> {
    pub(super) fn new(id: InstanceId, requests: UnboundedSender<CloseRequest>) -> Self {
        let state = Rc::new(SlotState::new());
        Self {
            id,
            closer: CloseRequester::new(id, P::PATH, state.clone(), requests),
            state,
            presenter: RefCell::new(P::default()),
            model: RefCell::new(None),
            view: RefCell::new(None),
            asset: RefCell::new(None),
            constructed: Cell::new(false),
            active: Cell::new(false),
            destroyed: Cell::new(false),
        }
    }

    pub(super) fn bind_model(&self, model: P::Model) {
        *self.model.borrow_mut() = Some(model);
    }

    /// Binds the view and remembers the asset it came from, if any.
    pub(super) fn bind_view(&self, view: P::View, asset: Option<Asset>) {
        *self.view.borrow_mut() = Some(view);
        *self.asset.borrow_mut() = asset;
    }

    pub(super) fn with_model<R>(&self, f: impl FnOnce(&P::Model) -> R) -> Option<R> {
        self.model.borrow().as_ref().map(f)
    }

    pub(super) fn with_model_mut<R>(&self, f: impl FnOnce(&mut P::Model) -> R) -> Option<R> {
        self.model.borrow_mut().as_mut().map(f)
    }

    pub(super) fn with_view<R>(&self, f: impl FnOnce(&P::View) -> R) -> Option<R> {
        self.view.borrow().as_ref().map(f)
    }

    pub(super) fn with_presenter<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.presenter.borrow())
    }

    pub(super) fn closer(&self) -> &CloseRequester {
        &self.closer
    }

    fn run_hook(&self, hook: HookKind) -> Result<(), NavigationError> {
        let mut presenter = self.presenter.borrow_mut();
        let mut model = self.model.borrow_mut();
        let mut view = self.view.borrow_mut();
        let (Some(model), Some(view)) = (model.as_mut(), view.as_mut()) else {
            return Err(NavigationError::InvalidTransition(format!(
                "{} hook on {} before model and view were bound",
                hook,
                P::PATH
            )));
        };

        debug!("Running {} hook for {}", hook, P::PATH);
        let mut cx = Lifecycle::new(model, view, &self.closer);
        let outcome = match hook {
            HookKind::Construct => presenter.on_construct(&mut cx),
            HookKind::Activate => presenter.on_activate(&mut cx),
            HookKind::Deactivate => presenter.on_deactivate(&mut cx),
            HookKind::Destroy => presenter.on_destroy(&mut cx),
        };
        outcome.map_err(|source| NavigationError::Hook {
            path: P::PATH.to_string(),
            hook,
            source,
        })
    }

    fn target(&self, timing: TransitionTiming) -> TransitionTarget<'static> {
        TransitionTarget {
            path: P::PATH,
            transform: self.state.transform.get(),
            timing,
        }
    }

    fn destroy(&self) -> Result<(), NavigationError> {
        if self.constructed.get() && !self.destroyed.replace(true) {
            self.run_hook(HookKind::Destroy)?;
        }
        Ok(())
    }
}

impl<P: Presenter> PublicPresenter for Slot<P> {
    fn path(&self) -> &'static str {
        P::PATH
    }

    fn status(&self) -> Status {
        self.state.status.get()
    }

    fn transform(&self) -> Option<Transform> {
        self.state.transform.get()
    }

    fn request_close(&self) {
        self.closer.request_close();
    }
}

#[async_trait(?Send)]
impl<P: Presenter> ManagedPresenter for Slot<P> {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn type_key(&self) -> TypeId {
        TypeId::of::<P>()
    }

    fn construct(&self) -> Result<(), NavigationError> {
        self.run_hook(HookKind::Construct)?;
        self.constructed.set(true);
        Ok(())
    }

    fn set_parent_transform(&self, parent: Transform) {
        self.state.transform.set(Some(parent));
    }

    async fn open(
        &self,
        player: &dyn TransitionPlayer,
        transition: Option<TransitionTiming>,
    ) -> Result<(), NavigationError> {
        self.state.status.set(Status::Opening);
        self.run_hook(HookKind::Activate)?;
        self.active.set(true);

        if let Some(timing) = transition {
            player.play_open(self.target(timing)).await;
        }

        self.state.status.set(Status::Opened);
        Ok(())
    }

    async fn close(
        &self,
        player: &dyn TransitionPlayer,
        transition: Option<TransitionTiming>,
    ) -> Result<(), NavigationError> {
        self.state.status.set(Status::Closing);
        if self.active.replace(false) {
            self.run_hook(HookKind::Deactivate)?;
        }

        if let Some(timing) = transition {
            player.play_close(self.target(timing)).await;
        }

        self.destroy()?;
        self.state.status.set(Status::Closed);
        Ok(())
    }

    fn hide(&self) -> Result<(), NavigationError> {
        if self.active.replace(false) {
            self.run_hook(HookKind::Deactivate)?;
        }
        self.state.status.set(Status::Hidden);
        Ok(())
    }

    fn reveal(&self) -> Result<(), NavigationError> {
        // Revealed screens are the active one whether or not the hook succeeds
        self.state.status.set(Status::Opened);
        self.run_hook(HookKind::Activate)?;
        self.active.set(true);
        Ok(())
    }

    fn teardown(&self) {
        if self.active.replace(false) {
            if let Err(e) = self.run_hook(HookKind::Deactivate) {
                warn!("Teardown of {}: {}", P::PATH, e);
            }
        }
        if let Err(e) = self.destroy() {
            warn!("Teardown of {}: {}", P::PATH, e);
        }
        self.state.status.set(Status::Closed);
    }

    fn release(&self, loader: &dyn AssetLoader, scene: &mut Scene) {
        let view = self.view.borrow_mut().take();
        if let Some(view) = view {
            if P::View::PREPLACED {
                scene.place(view);
            }
        }
        self.model.borrow_mut().take();

        let asset = self.asset.borrow_mut().take();
        if let Some(asset) = asset {
            debug!("Releasing asset {} to {}", asset.path, loader.name());
            loader.release(&asset);
        }
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Builds a bound and constructed slot without going through a navigator.
#[cfg(test)]
pub(super) fn constructed_slot<P: Presenter>(id: u64, model: P::Model, view: P::View) -> Rc<Slot<P>> {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let slot = Rc::new(Slot::<P>::new(InstanceId(id), tx));
    slot.bind_model(model);
    slot.bind_view(view, None);
    slot.construct().expect("construct hook");
    slot
}
