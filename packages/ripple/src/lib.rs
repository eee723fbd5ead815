//! A reactive entity component system.
//!
//! Entities are sparse bags of components. Systems declare which entities
//! they care about through filters, which the world keeps as live contexts.
//! Changes are batched per context and component, and handed to reactive
//! systems in a sweep at the end of every tick.

pub use component::{
    Component,
    ComponentID,
    Message,
    RelativeComponent,
};
pub use lookup::{
    ComponentsLookup,
    LookupBuilder,
};
pub use entity::{
    Entity,
    EntityEvent,
    EntityID,
};
pub use context::{
    AccessKind,
    Context,
    ContextID,
    Filter,
    FilterKind,
};
pub use watcher::{
    ComponentWatcher,
    MessageWatcher,
    WatchBatch,
    WatchKind,
};
pub use system::{
    ExitSystem,
    FixedUpdateSystem,
    MessagerSystem,
    Phase,
    ReactiveSystem,
    RenderSystem,
    StartupSystem,
    System,
    SystemDescriptor,
    SystemID,
    UpdateSystem,
};
pub use world::{
    EntityBuilder,
    EntityMut,
    World,
    WorldBuilder,
};
pub use state_machine::{
    Routine,
    State,
    StateMachine,
    StateMachineComponent,
    StateMachineSystem,
    Step,
    Wait,
};
pub use modifiable::{
    ModifiableComponent,
    Notifier,
    Shared,
    SharedHandle,
    SubscriptionToken,
};
pub use interaction::{
    Interaction,
    InteractiveComponent,
};
pub use transform::Position;
pub use config::WorldSettings;
pub use diagnostics::SmoothCounter;
pub use error::{ConfigError, WorldError};

#[macro_use]
pub mod component;
mod sorted_vec;
pub mod lookup;
pub mod entity;
pub mod context;
pub mod watcher;
pub mod system;
pub mod world;
pub mod state_machine;
pub mod modifiable;
pub mod interaction;
pub mod transform;
pub mod config;
pub mod diagnostics;
pub mod error;
