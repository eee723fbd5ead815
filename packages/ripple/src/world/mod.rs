//! A world which owns entities, contexts and systems.
//!
//! Everything in a world happens on one thread. Systems run in registration
//! order; entity mutations are delivered synchronously to every context; and
//! at the end of `start()` and `update()` the world runs the reactive sweep,
//! disposes destroyed entities and applies deferred system activation.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use tracing::debug;

pub use entity::{BoxedComponent, EntityBuilder, EntityMut};

use crate::component::{Component, ComponentID};
use crate::config::WorldSettings;
use crate::context::{Context, ContextID, Filter};
use crate::diagnostics::SmoothCounter;
use crate::entity::{Entity, EntityID};
use crate::error::WorldError;
use crate::lookup::ComponentsLookup;
use crate::sorted_vec::VecSet;
use crate::state_machine::MessageTriggers;
use crate::system::{Phase, SystemDescriptor, SystemID};
use crate::watcher::WatcherKey;
use systems::Systems;

mod dispatch;
mod entity;
mod sweep;
mod systems;

/// A builder for `World`s.
///
/// Systems are registered in execution order.
pub struct WorldBuilder {
    lookup: Option<Arc<ComponentsLookup>>,
    settings: WorldSettings,
    systems: Vec<(SystemDescriptor, bool)>,
}

impl WorldBuilder {
    fn new() -> WorldBuilder {
        WorldBuilder {
            lookup: None,
            settings: WorldSettings::default(),
            systems: Vec::new(),
        }
    }

    /// Set the component lookup table.
    pub fn lookup(mut self, lookup: Arc<ComponentsLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Set the world settings.
    pub fn settings(mut self, settings: WorldSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a system, and whether it starts active.
    pub fn system(mut self, descriptor: SystemDescriptor, active: bool) -> Self {
        self.systems.push((descriptor, active));
        self
    }

    /// Register several systems in order.
    pub fn systems(mut self, systems: impl IntoIterator<Item=(SystemDescriptor, bool)>) -> Self {
        self.systems.extend(systems);
        self
    }

    fn validate(&self) -> Result<(), WorldError> {
        if self.systems.is_empty() {
            return Err(WorldError::NoSystems);
        }

        let mut positions = HashMap::new();
        for (idx, (desc, _)) in self.systems.iter().enumerate() {
            if positions.insert(desc.type_id, idx).is_some() {
                return Err(WorldError::DuplicateSystem(desc.name));
            }
        }

        for (idx, (desc, _)) in self.systems.iter().enumerate() {
            for (required, required_name) in desc.requires.iter() {
                match positions.get(required) {
                    None => return Err(WorldError::MissingDependency {
                        system: desc.name,
                        requires: *required_name,
                    }),
                    Some(pos) if *pos >= idx => return Err(WorldError::DependencyOrder {
                        system: desc.name,
                        requires: *required_name,
                    }),
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// Build the world.
    pub fn build(self) -> Result<World, WorldError> {
        self.validate()?;
        let lookup = self.lookup.ok_or(WorldError::MissingLookup)?;

        let mut world = World {
            lookup,
            settings: self.settings,
            entities: BTreeMap::new(),
            next_entity: 0,
            pending_destroy: Vec::new(),
            messaged: VecSet::new(),
            contexts: Vec::new(),
            contexts_by_filter: HashMap::new(),
            triggered: VecSet::new(),
            modified: Arc::new(SegQueue::new()),
            triggers: Mutex::new(MessageTriggers::default()),
            systems: Systems::new(),
            started: false,
            delta_time: Duration::ZERO,
            fixed_delta_time: Duration::ZERO,
            elapsed: Duration::ZERO,
            counters: HashMap::new(),
        };

        let count = self.systems.len();
        for (desc, active) in self.systems {
            world.register_system(desc, active);
        }

        debug!(systems = count, contexts = world.contexts.len(), "world constructed");
        Ok(world)
    }
}

/// The root of an ECS: entities, the contexts over them and the systems
/// which process them.
pub struct World {
    lookup: Arc<ComponentsLookup>,
    settings: WorldSettings,
    entities: BTreeMap<EntityID, Entity>,
    next_entity: u32,
    pending_destroy: Vec<EntityID>,
    messaged: VecSet<EntityID>,
    contexts: Vec<Context>,
    contexts_by_filter: HashMap<Filter, ContextID>,
    triggered: VecSet<WatcherKey>,
    modified: Arc<SegQueue<(EntityID, ComponentID)>>,
    triggers: Mutex<MessageTriggers>,
    systems: Systems,
    started: bool,
    delta_time: Duration,
    fixed_delta_time: Duration,
    elapsed: Duration,
    counters: HashMap<(SystemID, Phase), SmoothCounter>,
}

impl World {
    /// Start building a new world.
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    /// Create a world from a lookup table and an ordered list of systems.
    pub fn new(
        lookup: Arc<ComponentsLookup>,
        systems: impl IntoIterator<Item=(SystemDescriptor, bool)>,
    ) -> Result<World, WorldError> {
        World::builder()
            .lookup(lookup)
            .systems(systems)
            .build()
    }

    /// Get the component lookup table.
    pub fn lookup(&self) -> &Arc<ComponentsLookup> {
        &self.lookup
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Get an entity.
    ///
    /// Panics if the entity does not exist. Destroyed entities exist until
    /// the end of the tick in which they were destroyed.
    pub fn entity(&self, id: EntityID) -> &Entity {
        match self.entities.get(&id) {
            Some(e) => e,
            None => panic!("entity {} does not exist", id),
        }
    }

    /// Get an entity, if it exists.
    pub fn try_entity(&self, id: EntityID) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get mutable access to an entity.
    ///
    /// Panics if the entity does not exist.
    pub fn entity_mut(&mut self, id: EntityID) -> EntityMut<'_> {
        assert!(self.entities.contains_key(&id), "entity {} does not exist", id);
        EntityMut::new(self, id)
    }

    /// Get mutable access to an entity, if it exists.
    pub fn try_entity_mut(&mut self, id: EntityID) -> Option<EntityMut<'_>> {
        if self.entities.contains_key(&id) {
            Some(EntityMut::new(self, id))
        } else {
            None
        }
    }

    /// Return every active entity, ordered by ID.
    pub fn all_entities(&self) -> Vec<EntityID> {
        self.entities.values()
            .filter(|e| e.is_active())
            .map(Entity::id)
            .collect()
    }

    /// Return every deactivated entity, ordered by ID.
    pub fn deactivated_entities(&self) -> Vec<EntityID> {
        self.entities.values()
            .filter(|e| e.is_deactivated())
            .map(Entity::id)
            .collect()
    }

    /// Get a context by ID.
    pub fn context(&self, id: ContextID) -> &Context {
        &self.contexts[id.id()]
    }

    /// Return the context for a filter, creating it if needed.
    ///
    /// Equal filters always share a context.
    pub fn context_for(&mut self, filter: Filter) -> ContextID {
        if let Some(id) = self.contexts_by_filter.get(&filter) {
            return *id;
        }

        let id = ContextID::new(self.contexts.len());
        let context = Context::new(id, filter.clone(), self.entities.values());
        self.contexts.push(context);
        self.contexts_by_filter.insert(filter, id);
        id
    }

    /// Return the active entities matching a filter.
    pub fn entities_with(&mut self, filter: Filter) -> Rc<[EntityID]> {
        let id = self.context_for(filter);
        self.contexts[id.id()].entities()
    }

    /// Return the active entities holding a component type.
    pub fn entities_with_component<T: Component>(&mut self) -> Rc<[EntityID]> {
        let id = self.lookup.id::<T>();
        self.entities_with(Filter::new().all_of(&[id]))
    }

    /// Find the single active entity holding a component type.
    pub fn try_unique_entity<T: Component>(&self) -> Option<EntityID> {
        let id = self.lookup.id::<T>();
        self.entities.values()
            .find(|e| e.is_active() && e.has_id(id))
            .map(Entity::id)
    }

    /// Get the component held by the single entity holding its type.
    pub fn try_unique<T: Component>(&self) -> Option<&T> {
        self.try_unique_entity::<T>()
            .and_then(|id| self.entities.get(&id))
            .and_then(|e| e.try_get::<T>())
    }

    /// Get a unique component.
    ///
    /// Panics if no active entity holds the type.
    pub fn unique<T: Component>(&self) -> &T {
        match self.try_unique::<T>() {
            Some(c) => c,
            None => panic!("no unique {} in world", std::any::type_name::<T>()),
        }
    }

    /// The delta passed to the last `update`.
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    /// The delta passed to the last `fixed_update`.
    pub fn fixed_delta_time(&self) -> Duration {
        self.fixed_delta_time
    }

    /// The total time passed to `update`.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns true once `start` has been called.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Get the diagnostic counters recorded for a system.
    pub fn counters(&self, system: SystemID) -> Vec<(Phase, &SmoothCounter)> {
        let mut counters: Vec<_> = self.counters.iter()
            .filter(|((id, _), _)| *id == system)
            .map(|((_, phase), counter)| (*phase, counter))
            .collect();
        counters.sort_by_key(|(phase, _)| *phase);
        counters
    }

    pub(crate) fn triggers(&self) -> &Mutex<MessageTriggers> {
        &self.triggers
    }

    /// Start the world.
    ///
    /// Runs every active startup system once, then settles.
    pub fn start(&mut self) {
        if self.started {
            return;
        }

        self.started = true;
        debug!("starting world");
        for id in self.systems.ids() {
            if self.systems.is_active(id) {
                self.run_start(id);
            }
        }

        self.end_of_tick(false);
    }

    /// Run the update phase.
    pub fn update(&mut self, dt: Duration) {
        self.delta_time = dt;
        self.elapsed += dt;
        self.run_phase(Phase::Update);
        self.end_of_tick(true);
    }

    /// Run the fixed update phase.
    pub fn fixed_update(&mut self, dt: Duration) {
        self.fixed_delta_time = dt;
        self.run_phase(Phase::FixedUpdate);
    }

    /// Run the render phase.
    pub fn render(&mut self) {
        self.run_phase(Phase::Render);
    }

    /// Run the exit phase.
    pub fn exit(&mut self) {
        self.run_phase(Phase::Exit);
    }

    fn end_of_tick(&mut self, clear_messages: bool) {
        self.sweep();
        if clear_messages {
            self.clear_messages();
        }
        self.destroy_pending();
        self.flush_activation();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    use crate::context::{AccessKind, FilterKind};
    use crate::system::{ReactiveSystem, System};
    use crate::watcher::WatchKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    component!(Health);

    #[derive(Debug, Clone, PartialEq)]
    struct Poisoned;
    component!(Poisoned);

    thread_local! {
        static SEEN: RefCell<Vec<(WatchKind, Vec<EntityID>)>> = RefCell::new(Vec::new());
    }

    fn seen() -> Vec<(WatchKind, Vec<EntityID>)> {
        SEEN.with(|s| s.borrow_mut().drain(..).collect())
    }

    fn push(kind: WatchKind, entities: &[EntityID]) {
        SEEN.with(|s| s.borrow_mut().push((kind, entities.to_vec())));
    }

    struct HealthWatcher;

    impl System for HealthWatcher {
        fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
    }

    impl ReactiveSystem for HealthWatcher {
        fn on_added(&mut self, _: &mut World, e: &[EntityID]) { push(WatchKind::Added, e) }
        fn on_removed(&mut self, _: &mut World, e: &[EntityID]) { push(WatchKind::Removed, e) }
        fn on_modified(&mut self, _: &mut World, e: &[EntityID]) { push(WatchKind::Modified, e) }
        fn on_activated(&mut self, _: &mut World, e: &[EntityID]) { push(WatchKind::Activated, e) }
        fn on_deactivated(&mut self, _: &mut World, e: &[EntityID]) { push(WatchKind::Deactivated, e) }
    }

    fn world() -> World {
        let lookup = ComponentsLookup::builder()
            .component::<Health>()
            .component::<Poisoned>()
            .build();
        let health = lookup.id::<Health>();

        World::builder()
            .lookup(lookup)
            .system(SystemDescriptor::new(HealthWatcher)
                        .filter(FilterKind::AllOf, AccessKind::Read, &[health])
                        .watch(&[health]), true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_entity_is_destroyed() {
        let mut world = world();
        let entity = world.add_entity(Vec::new());

        assert!(world.entity(entity).is_destroyed());
        world.update(Duration::ZERO);
        assert!(world.try_entity(entity).is_none());
    }

    #[test]
    fn test_identical_filters_share_context() {
        let mut world = world();
        let health = world.lookup().id::<Health>();
        let poisoned = world.lookup().id::<Poisoned>();

        let a = world.context_for(Filter::new().all_of(&[health, poisoned]));
        let b = world.context_for(Filter::new().all_of(&[poisoned]).all_of(&[health]));
        let c = world.context_for(Filter::new().any_of(&[health, poisoned]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_add_then_remove_before_sweep() {
        let mut world = world();
        world.start();
        seen();

        let keep = world.build_entity().with(Poisoned).spawn();
        world.entity_mut(keep).add(Health(5));
        world.entity_mut(keep).remove::<Health>();
        world.update(Duration::ZERO);
        assert!(seen().is_empty());

        world.entity_mut(keep).add(Health(5));
        world.update(Duration::ZERO);
        assert_eq!(seen(), vec![(WatchKind::Added, vec![keep])]);

        world.entity_mut(keep).remove::<Health>();
        world.update(Duration::ZERO);
        assert_eq!(seen(), vec![(WatchKind::Removed, vec![keep])]);
    }

    #[test]
    fn test_added_then_destroyed_reports_removed() {
        let mut world = world();
        world.start();
        seen();

        let entity = world.build_entity().with(Health(1)).spawn();
        world.entity_mut(entity).destroy();
        world.update(Duration::ZERO);
        assert_eq!(seen(), vec![(WatchKind::Removed, vec![entity])]);
    }

    #[test]
    fn test_kinds_delivered_in_order() {
        let mut world = world();
        world.start();
        let old = world.build_entity().with(Health(1)).with(Poisoned).spawn();
        let changed = world.build_entity().with(Health(1)).spawn();
        world.update(Duration::ZERO);
        seen();

        world.entity_mut(changed).replace(Health(2));
        world.entity_mut(old).remove::<Health>();
        let new = world.build_entity().with(Health(3)).spawn();
        world.update(Duration::ZERO);

        assert_eq!(seen(), vec![
            (WatchKind::Added, vec![new]),
            (WatchKind::Removed, vec![old]),
            (WatchKind::Modified, vec![changed]),
        ]);
    }

    #[test]
    fn test_deactivation_round_trip() {
        let mut world = world();
        world.start();
        let health = world.lookup().id::<Health>();
        let entity = world.build_entity().with(Health(1)).spawn();
        world.update(Duration::ZERO);
        seen();

        assert!(world.entity_mut(entity).deactivate());
        assert!(!world.entity_mut(entity).deactivate());
        assert!(world.entities_with(Filter::new().all_of(&[health])).is_empty());
        assert_eq!(world.deactivated_entities(), vec![entity]);
        assert!(world.all_entities().is_empty());
        world.update(Duration::ZERO);
        assert_eq!(seen(), vec![(WatchKind::Deactivated, vec![entity])]);
        assert!(world.try_entity(entity).is_some());

        assert!(world.entity_mut(entity).activate());
        world.update(Duration::ZERO);
        assert_eq!(seen(), vec![(WatchKind::Activated, vec![entity])]);
        assert_eq!(&*world.entities_with(Filter::new().all_of(&[health])), &[entity]);
    }

    #[test]
    fn test_context_matches_after_mutation() {
        let mut world = world();
        let health = world.lookup().id::<Health>();
        let poisoned = world.lookup().id::<Poisoned>();
        let ctx = world.context_for(Filter::new().all_of(&[health]).none_of(&[poisoned]));

        let a = world.build_entity().with(Health(1)).spawn();
        let b = world.build_entity().with(Health(1)).with(Poisoned).spawn();
        assert_eq!(&*world.context(ctx).entities(), &[a]);

        world.entity_mut(b).remove::<Poisoned>();
        world.entity_mut(a).add(Poisoned);
        assert_eq!(&*world.context(ctx).entities(), &[b]);

        for id in world.all_entities() {
            let e = world.entity(id);
            assert_eq!(world.context(ctx).contains(id), world.context(ctx).filter().matches(e));
        }
    }

    #[test]
    fn test_uniques() {
        let mut world = world();
        assert!(world.try_unique::<Health>().is_none());

        let entity = world.build_entity().with(Health(9)).spawn();
        assert_eq!(world.try_unique_entity::<Health>(), Some(entity));
        assert_eq!(world.unique::<Health>(), &Health(9));
        assert_eq!(&*world.entities_with_component::<Health>(), &[entity]);
    }

    #[test]
    fn test_time_accumulates() {
        let mut world = world();
        world.start();
        world.update(Duration::from_millis(16));
        world.update(Duration::from_millis(17));
        world.fixed_update(Duration::from_millis(20));

        assert_eq!(world.delta_time(), Duration::from_millis(17));
        assert_eq!(world.elapsed(), Duration::from_millis(33));
        assert_eq!(world.fixed_delta_time(), Duration::from_millis(20));
    }

    #[test]
    fn test_missing_lookup() {
        let err = World::builder()
            .system(SystemDescriptor::new(HealthWatcher), true)
            .build()
            .err();
        assert_eq!(err, Some(WorldError::MissingLookup));
    }
}
