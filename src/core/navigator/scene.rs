use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::core::presenter::View;

/// Views that exist in the initial layout, waiting to be bound.
#[derive(Default)]
pub(super) struct Scene {
    views: HashMap<TypeId, Vec<Box<dyn Any>>>,
}

impl Scene {
    pub(super) fn place<V: View>(&mut self, view: V) {
        self.views
            .entry(TypeId::of::<V>())
            .or_default()
            .push(Box::new(view));
    }

    pub(super) fn take<V: View>(&mut self) -> Option<V> {
        let placed = self.views.get_mut(&TypeId::of::<V>())?;
        let view = placed.pop()?;
        view.downcast::<V>().ok().map(|v| *v)
    }

    #[cfg(test)]
    pub(super) fn count<V: View>(&self) -> usize {
        self.views.get(&TypeId::of::<V>()).map_or(0, Vec::len)
    }
}
