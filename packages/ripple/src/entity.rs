//! Entities and the events they raise.
//!
//! An `Entity` is read-only from the outside. All mutation goes through
//! [`EntityMut`](crate::world::EntityMut) so that the world can deliver
//! notifications synchronously, in order, as each change happens.

use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use bit_vec::BitVec;

use crate::component::{Component, ComponentID, Message};
use crate::lookup::ComponentsLookup;
use crate::modifiable::SubscriptionToken;
use crate::sorted_vec::{VecMap, VecSet};

/// An entity ID which is unique within a world.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityID(u32);

impl EntityID {
    /// Construct a new `EntityID` from the inner value.
    pub const fn new(inner: u32) -> EntityID {
        EntityID(inner)
    }

    /// Return the inner ID.
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Debug for EntityID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EntityID(#{})", self.0)
    }
}

impl Display for EntityID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A change to an entity, delivered to every context in order.
#[derive(Clone, Debug)]
pub enum EntityEvent {
    ComponentAdded(ComponentID),
    ComponentRemoved {
        id: ComponentID,
        by_destroy: bool,
    },
    ComponentModified(ComponentID),
    MessageSent(ComponentID, Rc<dyn Message>),
    Activated,
    Deactivated,
    Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Active,
    Deactivated,
    Destroyed,
}

/// A sparse bag of components.
pub struct Entity {
    pub(crate) id: EntityID,
    pub(crate) lookup: Arc<ComponentsLookup>,
    pub(crate) presence: BitVec,
    pub(crate) components: VecMap<ComponentID, Box<dyn Component>>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) destroying: bool,
    pub(crate) parent: Option<EntityID>,
    pub(crate) children: Vec<(EntityID, Option<String>)>,
    /// Relative components mirrored from the parent.
    pub(crate) tracked: VecSet<ComponentID>,
    pub(crate) messages: VecSet<ComponentID>,
    pub(crate) tokens: VecMap<ComponentID, SubscriptionToken>,
}

impl Entity {
    pub(crate) fn new(id: EntityID, lookup: Arc<ComponentsLookup>) -> Entity {
        let presence = BitVec::from_elem(lookup.len(), false);

        Entity {
            id,
            lookup,
            presence,
            components: VecMap::new(),
            lifecycle: Lifecycle::Active,
            destroying: false,
            parent: None,
            children: Vec::new(),
            tracked: VecSet::new(),
            messages: VecSet::new(),
            tokens: VecMap::new(),
        }
    }

    /// Get the ID of this entity.
    pub fn id(&self) -> EntityID {
        self.id
    }

    /// Returns true if the component with the given ID is present.
    pub fn has_id(&self, id: ComponentID) -> bool {
        self.presence.get(id.id()).unwrap_or(false)
    }

    /// Returns true if a component of the given type is present.
    pub fn has<T: Component>(&self) -> bool {
        self.has_id(self.lookup.id::<T>())
    }

    /// Get a component by type.
    ///
    /// Panics if the component is not present.
    pub fn get<T: Component>(&self) -> &T {
        match self.try_get::<T>() {
            Some(c) => c,
            None => panic!("entity {} has no {}", self.id, std::any::type_name::<T>()),
        }
    }

    /// Get a component by type, if present.
    pub fn try_get<T: Component>(&self) -> Option<&T> {
        self.get_by_id(self.lookup.id::<T>())
            .and_then(|c| c.downcast_ref::<T>())
    }

    /// Get a component by ID, if present.
    pub fn get_by_id(&self, id: ComponentID) -> Option<&dyn Component> {
        self.components.get(&id).map(|c| &**c)
    }

    /// Iterate over the IDs of every component present, in order.
    pub fn component_ids(&self) -> impl Iterator<Item=ComponentID> + '_ {
        self.presence.iter()
            .enumerate()
            .filter(|(_, present)| *present)
            .map(|(idx, _)| ComponentID::new(idx))
    }

    /// Return the number of components present.
    pub fn len(&self) -> usize {
        self.presence.iter().filter(|x| *x).count()
    }

    /// Returns true if no components are present.
    pub fn is_empty(&self) -> bool {
        self.presence.none()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_deactivated(&self) -> bool {
        self.lifecycle == Lifecycle::Deactivated
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    /// Get the parent of this entity.
    pub fn parent(&self) -> Option<EntityID> {
        self.parent
    }

    /// Iterate over the children of this entity in the order they were added.
    pub fn children(&self) -> impl Iterator<Item=EntityID> + '_ {
        self.children.iter().map(|(id, _)| *id)
    }

    /// Find a child by the name it was added under.
    pub fn child_named(&self, name: &str) -> Option<EntityID> {
        self.children.iter()
            .find(|(_, n)| n.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    /// Returns true if this entity mirrors the given relative component from
    /// its parent.
    pub fn is_tracking(&self, id: ComponentID) -> bool {
        self.tracked.has(&id)
    }

    /// Returns true if a message of the given type was sent to this entity
    /// during the current tick.
    pub fn has_message<T: Message>(&self) -> bool {
        self.has_message_id(self.lookup.message_id::<T>())
    }

    /// Returns true if a message with the given ID was sent this tick.
    pub fn has_message_id(&self, id: ComponentID) -> bool {
        self.messages.has(&id)
    }

    pub(crate) fn set_present(&mut self, id: ComponentID, present: bool) {
        let idx = id.id();
        if idx >= self.presence.len() {
            if !present {
                return;
            }

            let grow = (idx + 1).max(self.lookup.len()) - self.presence.len();
            self.presence.grow(grow, false);
        }

        self.presence.set(idx, present);
    }
}

impl Debug for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Entity");
        s.field("id", &self.id)
            .field("lifecycle", &self.lifecycle);
        if let Some(parent) = self.parent {
            s.field("parent", &parent);
        }
        s.field("components", &self.components.values().collect::<Vec<_>>())
            .finish()
    }
}
