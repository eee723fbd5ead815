//! Interactions triggered by one entity on another.

use std::fmt::{self, Debug, Formatter};

use crate::component::{Component, ComponentID};
use crate::entity::EntityID;
use crate::world::World;

/// Behaviour run when an entity is interacted with.
pub trait Interaction: 'static {
    /// Perform the interaction.
    fn interact(&self, world: &mut World, interactor: EntityID, interacted: EntityID);
}

/// The object-safe view of a component holding an `Interaction`.
pub trait Interactive {
    fn interact(&self, world: &mut World, interactor: EntityID, interacted: EntityID);
}

/// A component which runs an `Interaction` when its entity is interacted
/// with.
///
/// Every `InteractiveComponent` shares the interaction umbrella ID, so an
/// entity holds at most one.
pub struct InteractiveComponent<I> {
    interaction: I,
}

impl<I: Interaction> InteractiveComponent<I> {
    pub fn new(interaction: I) -> InteractiveComponent<I> {
        InteractiveComponent {
            interaction,
        }
    }

    pub fn interaction(&self) -> &I {
        &self.interaction
    }
}

impl<I> Debug for InteractiveComponent<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "InteractiveComponent<{}>", std::any::type_name::<I>())
    }
}

impl<I: Interaction> Component for InteractiveComponent<I> {
    fn umbrella() -> Option<ComponentID> {
        Some(ComponentID::INTERACTIVE)
    }

    fn dyn_eq(&self, _other: &dyn Component) -> bool {
        false
    }

    fn as_interactive(&self) -> Option<&dyn Interactive> {
        Some(self)
    }
}

impl<I: Interaction> Interactive for InteractiveComponent<I> {
    fn interact(&self, world: &mut World, interactor: EntityID, interacted: EntityID) {
        self.interaction.interact(world, interactor, interacted);
    }
}
