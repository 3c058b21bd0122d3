use std::rc::Rc;

use log::{debug, warn};

use super::managed::ManagedPresenter;
use crate::core::error::NavigationError;
use crate::core::presenter::{InstanceId, PublicPresenter};

/// The active screen plus the screens hidden beneath it.
///
/// Only the active screen is ever `Opened`; everything in history is
/// `Hidden`. Transitions are the navigator's business; this type only does
/// the bookkeeping and the hide/reveal hooks.
#[derive(Default)]
pub(super) struct ScreenStack {
    active: Option<Rc<dyn ManagedPresenter>>,
    history: Vec<Rc<dyn ManagedPresenter>>,
}

impl ScreenStack {
    pub(super) fn active(&self) -> Option<&Rc<dyn ManagedPresenter>> {
        self.active.as_ref()
    }

    /// Oldest first.
    pub(super) fn history(&self) -> &[Rc<dyn ManagedPresenter>] {
        &self.history
    }

    /// Hides the active screen into history and makes `presenter` active.
    ///
    /// If the outgoing screen's deactivate hook fails it stays active and
    /// `presenter` is not adopted.
    pub(super) fn open(&mut self, presenter: Rc<dyn ManagedPresenter>) -> Result<(), NavigationError> {
        if let Some(current) = self.active.take() {
            if let Err(e) = current.hide() {
                self.active = Some(current);
                return Err(e);
            }
            debug!("Hid {} into history (depth {})", current.path(), self.history.len() + 1);
            self.history.push(current);
        }
        self.active = Some(presenter);
        Ok(())
    }

    /// Drops the active screen, already closed by the navigator, and
    /// reactivates the most recent screen from history.
    pub(super) fn close_current(&mut self) -> Result<(), NavigationError> {
        let Some(closed) = self.active.take() else {
            return Err(NavigationError::InvalidTransition(
                "no screen is active".to_string(),
            ));
        };
        debug!("Removed screen {}", closed.path());
        self.restore_previous()
    }

    /// Makes the most recent screen in history active again. Only called
    /// once the active slot has been emptied.
    ///
    /// The revealed screen becomes active even if its activate hook fails;
    /// the hook error is returned.
    pub(super) fn restore_previous(&mut self) -> Result<(), NavigationError> {
        if let Some(previous) = self.history.pop() {
            self.active = Some(previous.clone());
            previous.reveal()?;
            debug!("Revealed {} from history", previous.path());
        }
        Ok(())
    }

    /// Removes the active screen without revealing anything.
    pub(super) fn discard_current(&mut self) -> Option<Rc<dyn ManagedPresenter>> {
        self.active.take()
    }

    /// Rolls back an `open` whose presenter failed to come up: removes it and
    /// brings back whatever it displaced.
    pub(super) fn abandon(&mut self, id: InstanceId) {
        if !self.active.as_ref().is_some_and(|active| active.id() == id) {
            return;
        }
        self.active = None;
        if let Err(e) = self.restore_previous() {
            warn!("Restoring the previous screen after a failed open: {}", e);
        }
    }

    /// Takes a hidden screen out of history.
    pub(super) fn remove_hidden(&mut self, id: InstanceId) -> Option<Rc<dyn ManagedPresenter>> {
        let index = self.history.iter().position(|screen| screen.id() == id)?;
        Some(self.history.remove(index))
    }

    /// Empties the stack: active screen first, then history newest first.
    pub(super) fn drain(&mut self) -> Vec<Rc<dyn ManagedPresenter>> {
        let mut screens: Vec<_> = self.active.take().into_iter().collect();
        screens.extend(self.history.drain(..).rev());
        screens
    }
}
