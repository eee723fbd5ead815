//! Delivery of entity events to contexts and child entities.

use tracing::trace;

use crate::component::ComponentID;
use crate::entity::{EntityEvent, EntityID};
use crate::world::World;

impl World {
    /// Deliver an event raised by an entity.
    ///
    /// Every context sees the event, in creation order, before this returns.
    pub(crate) fn emit(&mut self, entity: EntityID, event: EntityEvent) {
        match &event {
            EntityEvent::Destroyed => {
                self.pending_destroy.push(entity);
                self.triggers.get_mut().on_destroyed(entity);
            }
            EntityEvent::MessageSent(id, message) => {
                self.messaged.insert(entity);
                self.triggers.get_mut().on_message(entity, *id, message);
            }
            _ => {}
        }

        let e = match self.entities.get(&entity) {
            Some(e) => e,
            None => return,
        };
        for context in self.contexts.iter_mut() {
            context.on_event(e, &event, &mut self.triggered);
        }

        match event {
            EntityEvent::ComponentAdded(id) | EntityEvent::ComponentModified(id)
                if self.lookup.is_relative(id) => self.propagate_to_children(entity, id),
            _ => {}
        }
    }

    fn propagate_to_children(&mut self, parent: EntityID, id: ComponentID) {
        let children: Vec<EntityID> = match self.entities.get(&parent) {
            Some(p) if !p.children.is_empty() => p.children().collect(),
            _ => return,
        };

        for child in children {
            let tracking = self.entities.get(&child).map_or(false, |c| c.is_tracking(id));
            if tracking {
                trace!(%parent, %child, component = self.lookup.name(id), "propagating to child");
                self.push_parent_value(child, id);
            }
        }
    }

    /// Recompute a tracked relative component from the parent's value.
    ///
    /// Returns false if either side is missing the component.
    pub(crate) fn push_parent_value(&mut self, child: EntityID, id: ComponentID) -> bool {
        let parent = match self.entities.get(&child).and_then(|c| c.parent) {
            Some(p) => p,
            None => return false,
        };

        let value = {
            let parent_value = self.entities.get(&parent).and_then(|p| p.get_by_id(id));
            let child_value = self.entities.get(&child)
                .and_then(|c| c.get_by_id(id))
                .and_then(|c| c.as_relative());
            match (parent_value, child_value) {
                (Some(parent_value), Some(child_value)) => child_value.with_parent(parent_value),
                _ => return false,
            }
        };

        self.replace_component(child, id, value, false);
        true
    }
}
