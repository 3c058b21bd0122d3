use std::any::TypeId;
use std::rc::Rc;

use super::managed::ManagedPresenter;
use crate::core::presenter::{InstanceId, Layer, Transform};

/// Open popups in stacking order, bottom first.
///
/// Z-indices come from a counter that only moves forward, so closing a popup
/// never reorders the ones above or below it.
pub(super) struct PopupStack {
    entries: Vec<Rc<dyn ManagedPresenter>>,
    next_z: u64,
}

impl Default for PopupStack {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_z: 1,
        }
    }
}

impl PopupStack {
    pub(super) fn entries(&self) -> &[Rc<dyn ManagedPresenter>] {
        &self.entries
    }

    /// Parents `presenter` above every popup currently open.
    pub(super) fn open(&mut self, presenter: Rc<dyn ManagedPresenter>) {
        presenter.set_parent_transform(Transform::new(Layer::Popup, self.next_z));
        self.next_z += 1;
        self.entries.push(presenter);
    }

    /// The most recently opened popup of the given type.
    pub(super) fn topmost_of(&self, key: TypeId) -> Option<Rc<dyn ManagedPresenter>> {
        self.entries
            .iter()
            .rev()
            .find(|popup| popup.type_key() == key)
            .cloned()
    }

    pub(super) fn find(&self, id: InstanceId) -> Option<Rc<dyn ManagedPresenter>> {
        self.entries.iter().find(|popup| popup.id() == id).cloned()
    }

    pub(super) fn contains_type(&self, key: TypeId) -> bool {
        self.entries.iter().any(|popup| popup.type_key() == key)
    }

    /// Removes one popup; the rest keep their order and z-indices.
    pub(super) fn close_one(&mut self, id: InstanceId) -> Option<Rc<dyn ManagedPresenter>> {
        let index = self.entries.iter().position(|popup| popup.id() == id)?;
        Some(self.entries.remove(index))
    }

    /// Topmost first.
    pub(super) fn closing_order(&self) -> Vec<Rc<dyn ManagedPresenter>> {
        self.entries.iter().rev().cloned().collect()
    }

    pub(super) fn drain(&mut self) -> Vec<Rc<dyn ManagedPresenter>> {
        let mut popups: Vec<_> = self.entries.drain(..).collect();
        popups.reverse();
        popups
    }
}
