use std::rc::Rc;

use super::managed::{ManagedPresenter, Slot};
use crate::core::presenter::{CloseRequester, Presenter, PublicPresenter, Status, Transform};

/// Typed access to a presenter the navigator has opened.
///
/// Handles only carry the public capability set. Lifecycle operations are
/// not reachable through them:
///
/// ```compile_fail
/// use uinav::core::{PresenterHandle, Presenter};
///
/// fn force_close<P: Presenter>(handle: &PresenterHandle<P>) {
///     handle.teardown();
/// }
/// ```
///
/// A handle keeps the instance's memory alive but not its lifecycle: once the
/// navigator closes it, `status()` reports `Closed` and the model and view
/// accessors return `None`.
pub struct PresenterHandle<P: Presenter> {
    slot: Rc<Slot<P>>,
}

impl<P: Presenter> Clone for PresenterHandle<P> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<P: Presenter> PresenterHandle<P> {
    pub(super) fn new(slot: Rc<Slot<P>>) -> Self {
        Self { slot }
    }

    /// Recovers the typed handle from a type-erased stack entry.
    pub(super) fn from_erased(presenter: Rc<dyn ManagedPresenter>) -> Option<Self> {
        presenter
            .as_any()
            .downcast::<Slot<P>>()
            .ok()
            .map(Self::new)
    }

    pub fn with_model<R>(&self, f: impl FnOnce(&P::Model) -> R) -> Option<R> {
        self.slot.with_model(f)
    }

    pub fn with_model_mut<R>(&self, f: impl FnOnce(&mut P::Model) -> R) -> Option<R> {
        self.slot.with_model_mut(f)
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&P::View) -> R) -> Option<R> {
        self.slot.with_view(f)
    }

    pub fn with_presenter<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        self.slot.with_presenter(f)
    }

    pub fn close_requester(&self) -> CloseRequester {
        self.slot.closer().clone()
    }

    /// True if both handles point at the same instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<P: Presenter> PublicPresenter for PresenterHandle<P> {
    fn path(&self) -> &'static str {
        P::PATH
    }

    fn status(&self) -> Status {
        self.slot.status()
    }

    fn transform(&self) -> Option<Transform> {
        self.slot.transform()
    }

    fn request_close(&self) {
        self.slot.request_close();
    }
}

impl<P: Presenter> std::fmt::Debug for PresenterHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenterHandle")
            .field("path", &P::PATH)
            .field("status", &self.status())
            .finish()
    }
}
