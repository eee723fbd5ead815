//! Per-entity coroutines with explicit wait conditions.
//!
//! A `StateMachine` is stepped once per tick by the `StateMachineSystem`.
//! Each state produces a `Routine`: a resumable body which is called every
//! time its previous `Wait` is satisfied, and which returns the next thing
//! to wait for.
//!
//! Waits are consumed before they are checked: `Wait::Frames(1)` resumes on
//! the next tick, `Wait::For(d)` resumes on the first tick where the
//! accumulated delta reaches `d`. Once a wait is met the routine advances in
//! that same tick.

use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::component::{Component, ComponentID, Message};
use crate::context::{AccessKind, ContextID, FilterKind};
use crate::entity::EntityID;
use crate::system::{System, SystemDescriptor, UpdateSystem};
use crate::world::{EntityMut, World};

/// The number of routine steps a machine may take in one tick before it is
/// forced to yield.
const MAX_STEPS_PER_TICK: usize = 256;

/// A state is a function which creates the routine run while in that state.
pub type State<M> = fn(&mut M) -> Routine<M>;

type RoutineBody<M> = Box<dyn FnMut(&mut M, &mut Step<'_>) -> anyhow::Result<Wait<M>>>;

/// A resumable body, called each time its last wait is met.
pub struct Routine<M> {
    name: &'static str,
    body: RoutineBody<M>,
}

impl<M> Routine<M> {
    /// Create a new routine.
    pub fn new(
        name: &'static str,
        body: impl FnMut(&mut M, &mut Step<'_>) -> anyhow::Result<Wait<M>> + 'static,
    ) -> Routine<M> {
        Routine {
            name,
            body: Box::new(body),
        }
    }

    /// Get the name of this routine.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<M> Debug for Routine<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Routine({})", self.name)
    }
}

/// What a routine waits for before it is resumed.
pub enum Wait<M> {
    /// Finish this routine. The machine finishes when no routine remains.
    Stop,
    /// Resume after the given amount of world time.
    For(Duration),
    /// Resume after the given number of ticks.
    Frames(u32),
    /// Resume when a message arrives.
    ///
    /// The message is awaited on `target`, or the owning entity if `None`.
    /// If the target is destroyed the routine resumes without a message.
    Message {
        id: ComponentID,
        target: Option<EntityID>,
        timeout: Option<Duration>,
    },
    /// Run a nested routine to completion, then resume.
    Routine(Routine<M>),
    /// Switch state and run the new state's routine immediately.
    GoTo(State<M>),
    /// Switch state and run the new state's routine on the next tick.
    Transition(State<M>),
}

impl<M> Wait<M> {
    /// Resume on the next tick.
    pub fn next_frame() -> Wait<M> {
        Wait::Frames(1)
    }

    /// Wait for a message with the given ID on the owning entity.
    pub fn message(id: ComponentID) -> Wait<M> {
        Wait::Message {
            id,
            target: None,
            timeout: None,
        }
    }

    /// Wait for a message of type `T` on the owning entity.
    pub fn for_message<T: Message>(step: &Step<'_>) -> Wait<M> {
        Wait::message(step.message_id::<T>())
    }

    /// Wait for a message on another entity.
    pub fn message_on(id: ComponentID, target: EntityID) -> Wait<M> {
        Wait::Message {
            id,
            target: Some(target),
            timeout: None,
        }
    }

    /// Give up waiting for a message after the given time.
    ///
    /// Has no effect on other kinds of wait.
    pub fn or_timeout(self, after: Duration) -> Wait<M> {
        match self {
            Wait::Message { id, target, .. } => Wait::Message {
                id,
                target,
                timeout: Some(after),
            },
            other => other,
        }
    }
}

impl<M> Debug for Wait<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Wait::Stop => write!(f, "Stop"),
            Wait::For(d) => write!(f, "For({:?})", d),
            Wait::Frames(n) => write!(f, "Frames({})", n),
            Wait::Message { id, target, timeout } => f.debug_struct("Message")
                .field("id", id)
                .field("target", target)
                .field("timeout", timeout)
                .finish(),
            Wait::Routine(r) => write!(f, "Routine({})", r.name),
            Wait::GoTo(_) => write!(f, "GoTo"),
            Wait::Transition(_) => write!(f, "Transition"),
        }
    }
}

/// The context passed to routine bodies.
pub struct Step<'w> {
    world: &'w mut World,
    entity: EntityID,
    message: Option<Rc<dyn Message>>,
    timed_out: bool,
}

impl<'w> Step<'w> {
    pub fn world(&mut self) -> &mut World {
        &mut *self.world
    }

    /// Get the entity which owns this machine.
    pub fn entity(&self) -> EntityID {
        self.entity
    }

    /// Get mutable access to the owning entity.
    pub fn entity_mut(&mut self) -> EntityMut<'_> {
        self.world.entity_mut(self.entity)
    }

    /// Get the message which resumed this routine, if any.
    pub fn message(&self) -> Option<&dyn Message> {
        self.message.as_deref()
    }

    /// Returns true if this routine was resumed because a message wait timed
    /// out.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Look up the ID of message type `T`, for building message waits.
    pub fn message_id<T: Message>(&self) -> ComponentID {
        self.world.lookup().message_id::<T>()
    }
}

/// A coroutine-driven behaviour attached to an entity.
pub trait StateMachine: 'static {
    /// Return the state the machine starts in.
    fn initial_state(&self) -> State<Self> where Self: Sized;

    /// Called when the machine is attached to an entity, before any
    /// notification for the attachment is delivered.
    fn on_start(&mut self, _step: &mut Step<'_>) {}

    /// Called when the machine is removed or its entity destroyed.
    fn on_destroyed(&mut self, _world: &mut World, _entity: EntityID) {}
}

/// The object-safe interface the world uses to drive state machines.
pub trait StateMachineDriver {
    fn initialize(&mut self, world: &mut World, entity: EntityID);

    /// Advance the machine. Returns false once it has finished.
    fn tick(&mut self, world: &mut World, entity: EntityID, dt: Duration) -> bool;

    fn on_destroyed(&mut self, world: &mut World, entity: EntityID);

    /// Get the name of the routine currently running, if any.
    fn state_name(&self) -> Option<&'static str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Time(Duration),
    Frames(u32),
    Message {
        timeout: Option<Duration>,
    },
}

/// A component running a `StateMachine`.
///
/// Every state machine component shares the state machine umbrella ID, so
/// an entity runs at most one machine.
pub struct StateMachineComponent<M> {
    machine: M,
    stack: Vec<Routine<M>>,
    pending: Pending,
    finished: bool,
}

impl<M: StateMachine> StateMachineComponent<M> {
    pub fn new(machine: M) -> StateMachineComponent<M> {
        StateMachineComponent {
            machine,
            stack: Vec::new(),
            pending: Pending::None,
            finished: false,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Returns true once the machine has stopped.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn switch(&mut self, world: &mut World, entity: EntityID, state: State<M>) {
        world.triggers().lock().cancel(entity);
        self.stack.clear();
        self.pending = Pending::None;
        let routine = state(&mut self.machine);
        self.stack.push(routine);
    }

    fn advance(&mut self, world: &mut World, entity: EntityID,
               mut message: Option<Rc<dyn Message>>, mut timed_out: bool) -> bool {
        for _ in 0..MAX_STEPS_PER_TICK {
            let routine = match self.stack.last_mut() {
                Some(r) => r,
                None => {
                    self.finished = true;
                    return false;
                }
            };

            let name = routine.name;
            let mut step = Step {
                world: &mut *world,
                entity,
                message: message.take(),
                timed_out: std::mem::take(&mut timed_out),
            };

            let wait = match (routine.body)(&mut self.machine, &mut step) {
                Ok(wait) => wait,
                Err(err) => {
                    warn!(%entity, routine = name, error = %err, "routine failed, stopping state machine");
                    world.triggers().lock().cancel(entity);
                    self.stack.clear();
                    self.finished = true;
                    return false;
                }
            };

            match wait {
                Wait::Stop => {
                    self.stack.pop();
                }
                Wait::For(duration) => {
                    self.pending = Pending::Time(duration);
                    return true;
                }
                Wait::Frames(0) => {}
                Wait::Frames(frames) => {
                    self.pending = Pending::Frames(frames);
                    return true;
                }
                Wait::Message { id, target, timeout } => {
                    let target = target.unwrap_or(entity);
                    let alive = world.try_entity(target).map_or(false, |e| !e.is_destroyed());
                    let mut triggers = world.triggers().lock();
                    if alive {
                        triggers.register(entity, target, id);
                    } else {
                        triggers.register_cancelled(entity, target, id);
                    }
                    self.pending = Pending::Message { timeout };
                    return true;
                }
                Wait::Routine(nested) => self.stack.push(nested),
                Wait::GoTo(state) => self.switch(world, entity, state),
                Wait::Transition(state) => {
                    self.switch(world, entity, state);
                    return true;
                }
            }
        }

        warn!(%entity, "state machine did not yield within {} steps", MAX_STEPS_PER_TICK);
        true
    }
}

impl<M: StateMachine> StateMachineDriver for StateMachineComponent<M> {
    fn initialize(&mut self, world: &mut World, entity: EntityID) {
        world.triggers().lock().cancel(entity);
        self.stack.clear();
        self.pending = Pending::None;
        self.finished = false;

        let state = self.machine.initial_state();
        let routine = state(&mut self.machine);
        self.stack.push(routine);

        let mut step = Step {
            world,
            entity,
            message: None,
            timed_out: false,
        };
        self.machine.on_start(&mut step);
    }

    fn tick(&mut self, world: &mut World, entity: EntityID, dt: Duration) -> bool {
        if self.finished {
            return false;
        }

        let mut message = None;
        let mut timed_out = false;

        match &mut self.pending {
            Pending::None => {}
            Pending::Time(remaining) => {
                if *remaining > dt {
                    *remaining -= dt;
                    return true;
                }
            }
            Pending::Frames(frames) => {
                *frames -= 1;
                if *frames > 0 {
                    return true;
                }
            }
            Pending::Message { timeout } => {
                let outcome = world.triggers().lock().poll(entity);
                match outcome {
                    Some(TriggerOutcome::Received(m)) => message = Some(m),
                    Some(TriggerOutcome::Cancelled) => {}
                    None => match timeout {
                        Some(left) if *left > dt => {
                            *left -= dt;
                            return true;
                        }
                        Some(_) => {
                            world.triggers().lock().cancel(entity);
                            timed_out = true;
                        }
                        None => return true,
                    },
                }
            }
        }

        self.pending = Pending::None;
        self.advance(world, entity, message, timed_out)
    }

    fn on_destroyed(&mut self, world: &mut World, entity: EntityID) {
        world.triggers().lock().cancel(entity);
        self.stack.clear();
        self.finished = true;
        self.machine.on_destroyed(world, entity);
    }

    fn state_name(&self) -> Option<&'static str> {
        self.stack.first().map(|r| r.name)
    }
}

impl<M> Debug for StateMachineComponent<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineComponent")
            .field("machine", &std::any::type_name::<M>())
            .field("routines", &self.stack)
            .field("pending", &self.pending)
            .finish()
    }
}

impl<M: StateMachine> Component for StateMachineComponent<M> {
    fn umbrella() -> Option<ComponentID> {
        Some(ComponentID::STATE_MACHINE)
    }

    fn dyn_eq(&self, _other: &dyn Component) -> bool {
        false
    }

    fn as_state_machine(&mut self) -> Option<&mut dyn StateMachineDriver> {
        Some(self)
    }
}

pub(crate) enum TriggerOutcome {
    Received(Rc<dyn Message>),
    Cancelled,
}

struct Trigger {
    owner: EntityID,
    target: EntityID,
    message: ComponentID,
    outcome: Option<TriggerOutcome>,
}

/// Pending message waits, keyed by the entity that owns the machine.
///
/// Each owner has at most one registration.
#[derive(Default)]
pub(crate) struct MessageTriggers {
    triggers: Vec<Trigger>,
}

impl MessageTriggers {
    pub fn register(&mut self, owner: EntityID, target: EntityID, message: ComponentID) {
        self.cancel(owner);
        self.triggers.push(Trigger {
            owner,
            target,
            message,
            outcome: None,
        });
    }

    /// Register a wait on a target which is already gone, so it resolves on
    /// the next poll.
    pub fn register_cancelled(&mut self, owner: EntityID, target: EntityID, message: ComponentID) {
        self.cancel(owner);
        self.triggers.push(Trigger {
            owner,
            target,
            message,
            outcome: Some(TriggerOutcome::Cancelled),
        });
    }

    pub fn cancel(&mut self, owner: EntityID) {
        self.triggers.retain(|t| t.owner != owner);
    }

    /// Take the outcome of the owner's wait, if it has resolved.
    pub fn poll(&mut self, owner: EntityID) -> Option<TriggerOutcome> {
        let idx = self.triggers.iter()
            .position(|t| t.owner == owner && t.outcome.is_some())?;
        self.triggers.swap_remove(idx).outcome
    }

    pub fn on_message(&mut self, target: EntityID, message: ComponentID, value: &Rc<dyn Message>) {
        for trigger in self.triggers.iter_mut() {
            if trigger.target == target && trigger.message == message && trigger.outcome.is_none() {
                trigger.outcome = Some(TriggerOutcome::Received(value.clone()));
            }
        }
    }

    pub fn on_destroyed(&mut self, entity: EntityID) {
        self.cancel(entity);
        for trigger in self.triggers.iter_mut() {
            if trigger.target == entity && trigger.outcome.is_none() {
                trigger.outcome = Some(TriggerOutcome::Cancelled);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }
}

/// Ticks every state machine with the world's delta time.
///
/// Finished machines are removed from their entities.
#[derive(Debug, Default)]
pub struct StateMachineSystem;

impl StateMachineSystem {
    /// Create the registration for this system.
    pub fn descriptor() -> SystemDescriptor {
        SystemDescriptor::new(StateMachineSystem)
            .filter(FilterKind::AnyOf, AccessKind::Write, &[ComponentID::STATE_MACHINE])
    }
}

impl System for StateMachineSystem {
    fn as_update(&mut self) -> Option<&mut dyn UpdateSystem> {
        Some(self)
    }
}

impl UpdateSystem for StateMachineSystem {
    fn update(&mut self, world: &mut World, context: ContextID) {
        let dt = world.delta_time();
        let entities = world.context(context).entities();

        for &entity in entities.iter() {
            if !world.try_entity(entity).map_or(false, |e| e.is_active()) {
                continue;
            }

            let ticked = world.with_detached(entity, ComponentID::STATE_MACHINE, |component, world| {
                component.as_state_machine()
                    .map_or(false, |driver| driver.tick(world, entity, dt))
            });

            match ticked {
                Some((_, Some(mut orphan))) => {
                    if let Some(driver) = orphan.as_state_machine() {
                        driver.on_destroyed(world, entity);
                    }
                }
                Some((false, None)) => {
                    world.entity_mut(entity).remove_id(ComponentID::STATE_MACHINE);
                }
                _ => {}
            }
        }
    }
}
