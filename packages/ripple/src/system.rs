//! Systems and their registration.
//!
//! A system is any type implementing `System`. It opts into the phases it
//! takes part in by returning itself from the matching `as_*` accessor, and
//! describes what it operates on through a `SystemDescriptor` handed to the
//! world builder.

use std::any::{type_name, TypeId};

use crate::component::{ComponentID, Message};
use crate::context::{AccessKind, ContextID, Filter, FilterKind};
use crate::entity::EntityID;
use crate::world::World;

/// A system ID which is unique within a world.
///
/// IDs follow registration order, which is also execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemID(usize);

impl SystemID {
    pub(crate) fn new(inner: usize) -> SystemID {
        SystemID(inner)
    }

    /// Return the inner index.
    pub fn id(&self) -> usize {
        self.0
    }
}

/// The phases a system can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Startup,
    Update,
    FixedUpdate,
    Render,
    Exit,
    Reactive,
}

impl Phase {
    pub(crate) const SCHEDULED: [Phase; 4] = [
        Phase::Update,
        Phase::FixedUpdate,
        Phase::Render,
        Phase::Exit,
    ];
}

/// An ECS system.
///
/// Every accessor defaults to `None`; override the ones matching the roles
/// this system plays.
pub trait System: 'static {
    fn as_startup(&mut self) -> Option<&mut dyn StartupSystem> { None }
    fn as_update(&mut self) -> Option<&mut dyn UpdateSystem> { None }
    fn as_fixed_update(&mut self) -> Option<&mut dyn FixedUpdateSystem> { None }
    fn as_render(&mut self) -> Option<&mut dyn RenderSystem> { None }
    fn as_exit(&mut self) -> Option<&mut dyn ExitSystem> { None }
    fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { None }
    fn as_messager(&mut self) -> Option<&mut dyn MessagerSystem> { None }
}

/// Runs once, the first time the system is active when the world starts.
pub trait StartupSystem {
    fn start(&mut self, world: &mut World, context: ContextID);
}

/// Runs on every `World::update`.
pub trait UpdateSystem {
    fn update(&mut self, world: &mut World, context: ContextID);
}

/// Runs on every `World::fixed_update`.
pub trait FixedUpdateSystem {
    fn fixed_update(&mut self, world: &mut World, context: ContextID);
}

/// Runs on every `World::render`.
pub trait RenderSystem {
    fn render(&mut self, world: &mut World, context: ContextID);
}

/// Runs on `World::exit`.
pub trait ExitSystem {
    fn exit(&mut self, world: &mut World, context: ContextID);
}

/// Receives batched notifications for the components the system watches.
///
/// Within a sweep, batches arrive in the order added, removed, modified,
/// activated, deactivated. Each entity appears at most once per batch.
pub trait ReactiveSystem {
    fn on_added(&mut self, _world: &mut World, _entities: &[EntityID]) {}
    fn on_removed(&mut self, _world: &mut World, _entities: &[EntityID]) {}
    fn on_modified(&mut self, _world: &mut World, _entities: &[EntityID]) {}
    fn on_activated(&mut self, _world: &mut World, _entities: &[EntityID]) {}
    fn on_deactivated(&mut self, _world: &mut World, _entities: &[EntityID]) {}

    /// Called after every batch has been delivered for this sweep iteration.
    fn on_after_trigger(&mut self, _world: &mut World) {}
}

/// Receives messages sent to entities in the system's context.
pub trait MessagerSystem {
    fn on_message(&mut self, world: &mut World, entity: EntityID, message: &dyn Message);
}

/// A registration used for building worlds.
pub struct SystemDescriptor {
    pub(crate) system: Box<dyn System>,
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) filter: Option<Filter>,
    pub(crate) accesses: Vec<(AccessKind, ComponentID)>,
    pub(crate) watch: Vec<ComponentID>,
    pub(crate) messages: Vec<ComponentID>,
    pub(crate) requires: Vec<(TypeId, &'static str)>,
    pub(crate) do_not_pause: bool,
    pub(crate) include_on_pause: bool,
}

impl SystemDescriptor {
    /// Create a new registration from any object implementing `System`.
    pub fn new<S: System>(system: S) -> SystemDescriptor {
        SystemDescriptor {
            system: Box::new(system),
            type_id: TypeId::of::<S>(),
            name: type_name::<S>(),
            filter: None,
            accesses: Vec::new(),
            watch: Vec::new(),
            messages: Vec::new(),
            requires: Vec::new(),
            do_not_pause: false,
            include_on_pause: false,
        }
    }

    /// Add a filter clause to the system's context.
    ///
    /// A system which declares no clauses gets a context matching nothing.
    pub fn filter(mut self, kind: FilterKind, access: AccessKind, ids: &[ComponentID]) -> Self {
        let filter = self.filter.take().unwrap_or_default();
        self.filter = Some(filter.with(kind, ids));

        if kind != FilterKind::NoneOf && kind != FilterKind::None {
            self.accesses.extend(ids.iter().map(|id| (access, *id)));
        }
        self
    }

    /// Watch components for reactive notifications.
    pub fn watch(mut self, ids: &[ComponentID]) -> Self {
        self.watch.extend_from_slice(ids);
        self
    }

    /// Receive messages of the given IDs.
    pub fn messages(mut self, ids: &[ComponentID]) -> Self {
        self.messages.extend_from_slice(ids);
        self
    }

    /// Require that system `S` is registered before this one.
    pub fn requires<S: System>(mut self) -> Self {
        self.requires.push((TypeId::of::<S>(), type_name::<S>()));
        self
    }

    /// Keep running this system while the world is paused.
    pub fn do_not_pause(mut self) -> Self {
        self.do_not_pause = true;
        self
    }

    /// Only run this system while the world is paused.
    pub fn include_on_pause(mut self) -> Self {
        self.include_on_pause = true;
        self
    }

    /// Get the name of the system type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the filter for this system's context.
    pub fn context_filter(&self) -> Filter {
        self.filter.clone().unwrap_or_else(Filter::nothing)
    }

    /// Return the declared component accesses.
    pub fn accesses(&self) -> &[(AccessKind, ComponentID)] {
        &self.accesses
    }
}
