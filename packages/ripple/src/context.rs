//! Live query results.
//!
//! A `Context` tracks every active entity which satisfies its `Filter`.
//! The set is computed once, when the context is created, and then kept up
//! to date incrementally from entity events. Systems with equal filters
//! share the same context.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::component::ComponentID;
use crate::entity::{Entity, EntityEvent, EntityID};
use crate::sorted_vec::{VecMap, VecSet};
use crate::watcher::{ComponentWatcher, MessageWatcher, WatchKind, WatcherKey};

/// A context ID which is unique within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextID(usize);

impl ContextID {
    pub(crate) fn new(inner: usize) -> ContextID {
        ContextID(inner)
    }

    /// Return the inner ID.
    pub fn id(&self) -> usize {
        self.0
    }
}

/// The clauses a filter can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    /// Every listed component must be present.
    AllOf,
    /// At least one listed component must be present.
    AnyOf,
    /// None of the listed components may be present.
    NoneOf,
    /// Matches nothing.
    None,
}

/// How a system accesses the components it filters on.
///
/// This is recorded for tooling only; systems never run in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessKind {
    Read,
    Write,
}

/// A declarative entity query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filter {
    all_of: VecSet<ComponentID>,
    any_of: VecSet<ComponentID>,
    none_of: VecSet<ComponentID>,
    none: bool,
}

impl Filter {
    /// Create a filter which matches every entity.
    pub fn new() -> Filter {
        Filter::default()
    }

    /// Create a filter which matches no entity.
    pub fn nothing() -> Filter {
        Filter {
            none: true,
            ..Filter::default()
        }
    }

    /// Add a clause to the filter.
    pub fn with(mut self, kind: FilterKind, ids: &[ComponentID]) -> Self {
        let set = match kind {
            FilterKind::AllOf => &mut self.all_of,
            FilterKind::AnyOf => &mut self.any_of,
            FilterKind::NoneOf => &mut self.none_of,
            FilterKind::None => {
                self.none = true;
                return self;
            }
        };

        for id in ids {
            set.insert(*id);
        }
        self
    }

    pub fn all_of(self, ids: &[ComponentID]) -> Self {
        self.with(FilterKind::AllOf, ids)
    }

    pub fn any_of(self, ids: &[ComponentID]) -> Self {
        self.with(FilterKind::AnyOf, ids)
    }

    pub fn none_of(self, ids: &[ComponentID]) -> Self {
        self.with(FilterKind::NoneOf, ids)
    }

    /// Returns true if an entity's components satisfy this filter.
    ///
    /// This only considers presence, not whether the entity is active.
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.none {
            return false;
        }

        if self.none_of.iter().any(|id| entity.has_id(*id)) {
            return false;
        }

        if !self.all_of.iter().all(|id| entity.has_id(*id)) {
            return false;
        }

        self.any_of.is_empty() || self.any_of.iter().any(|id| entity.has_id(*id))
    }

    /// Return an order-independent hash of this filter.
    pub fn hash_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// An incrementally maintained set of the entities matching a filter.
pub struct Context {
    id: ContextID,
    filter: Filter,
    members: VecSet<EntityID>,
    snapshot: OnceCell<Rc<[EntityID]>>,
    watchers: VecMap<ComponentID, ComponentWatcher>,
    message_watchers: VecMap<ComponentID, MessageWatcher>,
}

impl Context {
    /// Create a new context, scanning the existing population.
    ///
    /// Deactivated entities are considered but never become members.
    pub(crate) fn new<'a>(id: ContextID, filter: Filter, entities: impl Iterator<Item=&'a Entity>) -> Context {
        let members = entities
            .filter(|e| e.is_active() && filter.matches(e))
            .map(|e| e.id())
            .collect();

        Context {
            id,
            filter,
            members: VecSet::from_inner(members),
            snapshot: OnceCell::new(),
            watchers: VecMap::new(),
            message_watchers: VecMap::new(),
        }
    }

    /// Get the ID of this context.
    pub fn id(&self) -> ContextID {
        self.id
    }

    /// Get the filter of this context.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Returns true if the entity is a member.
    pub fn contains(&self, entity: EntityID) -> bool {
        self.members.has(&entity)
    }

    /// Return the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get a snapshot of the members, ordered by ID.
    ///
    /// The snapshot is shared until membership next changes, so it is safe to
    /// iterate while mutating the world.
    pub fn entities(&self) -> Rc<[EntityID]> {
        self.snapshot.get_or_init(|| self.members.iter().copied().collect()).clone()
    }

    /// Get the watcher for a component ID, if one exists.
    pub fn watcher(&self, target: ComponentID) -> Option<&ComponentWatcher> {
        self.watchers.get(&target)
    }

    /// Get the message watcher for a message ID, if one exists.
    pub fn message_watcher(&self, target: ComponentID) -> Option<&MessageWatcher> {
        self.message_watchers.get(&target)
    }

    pub(crate) fn watcher_mut(&mut self, target: ComponentID) -> &mut ComponentWatcher {
        if !self.watchers.has_key(&target) {
            self.watchers.insert(target, ComponentWatcher::new(target));
        }

        match self.watchers.get_mut(&target) {
            Some(w) => w,
            None => unreachable!(),
        }
    }

    pub(crate) fn message_watcher_mut(&mut self, target: ComponentID) -> &mut MessageWatcher {
        if !self.message_watchers.has_key(&target) {
            self.message_watchers.insert(target, MessageWatcher::new(target));
        }

        match self.message_watchers.get_mut(&target) {
            Some(w) => w,
            None => unreachable!(),
        }
    }

    fn insert(&mut self, entity: EntityID) -> bool {
        let inserted = self.members.insert(entity);
        if inserted {
            self.snapshot.take();
        }
        inserted
    }

    fn remove(&mut self, entity: EntityID) -> bool {
        let removed = self.members.remove(&entity);
        if removed {
            self.snapshot.take();
        }
        removed
    }

    fn key(&self, target: ComponentID, message: bool) -> WatcherKey {
        WatcherKey {
            context: self.id,
            target,
            message,
        }
    }

    /// Notify every watcher following a component the entity holds.
    fn notify_held(&mut self, entity: &Entity, kind: WatchKind, triggered: &mut VecSet<WatcherKey>) {
        let id = self.id;
        for (target, watcher) in self.watchers.iter_mut() {
            if entity.has_id(*target) {
                watcher.record(kind, entity.id());
                triggered.insert(WatcherKey { context: id, target: *target, message: false });
            }
        }
    }

    /// Handle a newly created entity.
    pub(crate) fn on_created(&mut self, entity: &Entity, triggered: &mut VecSet<WatcherKey>) {
        if entity.is_active() && self.filter.matches(entity) && self.insert(entity.id()) {
            self.notify_held(entity, WatchKind::Added, triggered);
        }
    }

    /// Handle an event raised by an entity.
    pub(crate) fn on_event(&mut self, entity: &Entity, event: &EntityEvent, triggered: &mut VecSet<WatcherKey>) {
        let entity_id = entity.id();

        match event {
            EntityEvent::ComponentAdded(target) => {
                if !entity.is_active() {
                    return;
                }

                let was = self.contains(entity_id);
                let now = self.filter.matches(entity);
                if was && now {
                    if let Some(watcher) = self.watchers.get_mut(target) {
                        watcher.record(WatchKind::Added, entity_id);
                        triggered.insert(self.key(*target, false));
                    }
                } else if now {
                    self.insert(entity_id);
                    self.notify_held(entity, WatchKind::Added, triggered);
                } else if was {
                    self.remove(entity_id);
                    self.notify_removed(entity, None, false, triggered);
                }
            }
            EntityEvent::ComponentRemoved { id: target, by_destroy } => {
                if !entity.is_active() {
                    return;
                }

                let was = self.contains(entity_id);
                let now = self.filter.matches(entity);
                if was && now {
                    if let Some(watcher) = self.watchers.get_mut(target) {
                        if watcher.record_removed(entity_id, *by_destroy) {
                            triggered.insert(self.key(*target, false));
                        }
                    }
                } else if now {
                    self.insert(entity_id);
                    self.notify_held(entity, WatchKind::Added, triggered);
                } else if was {
                    self.remove(entity_id);
                    self.notify_removed(entity, Some(*target), *by_destroy, triggered);
                }
            }
            EntityEvent::ComponentModified(target) => {
                if !entity.is_active() || !self.contains(entity_id) {
                    return;
                }

                if let Some(watcher) = self.watchers.get_mut(target) {
                    watcher.record(WatchKind::Modified, entity_id);
                    triggered.insert(self.key(*target, false));
                }
            }
            EntityEvent::MessageSent(target, message) => {
                if !entity.is_active() || !self.contains(entity_id) {
                    return;
                }

                if let Some(watcher) = self.message_watchers.get_mut(target) {
                    watcher.record(entity_id, message.clone());
                    triggered.insert(self.key(*target, true));
                }
            }
            EntityEvent::Activated => {
                if self.filter.matches(entity) && self.insert(entity_id) {
                    self.notify_held(entity, WatchKind::Activated, triggered);
                }
            }
            EntityEvent::Deactivated => {
                if self.remove(entity_id) {
                    self.notify_held(entity, WatchKind::Deactivated, triggered);
                }
            }
            EntityEvent::Destroyed => {
                self.remove(entity_id);
            }
        }
    }

    fn notify_removed(&mut self, entity: &Entity, removed: Option<ComponentID>, by_destroy: bool,
                      triggered: &mut VecSet<WatcherKey>) {
        let id = self.id;
        for (target, watcher) in self.watchers.iter_mut() {
            if (entity.has_id(*target) || removed == Some(*target))
                && watcher.record_removed(entity.id(), by_destroy) {
                triggered.insert(WatcherKey { context: id, target: *target, message: false });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lookup::ComponentsLookup;

    fn id(n: usize) -> ComponentID {
        ComponentID::new(n)
    }

    fn entity_with(n: u32, ids: &[usize]) -> Entity {
        let mut entity = Entity::new(EntityID::new(n), ComponentsLookup::empty());
        for i in ids {
            entity.set_present(id(*i), true);
        }
        entity
    }

    #[test]
    fn test_filter_clause_order() {
        let e = entity_with(1, &[3, 4]);

        assert!(Filter::new().matches(&e));
        assert!(Filter::new().all_of(&[id(3), id(4)]).matches(&e));
        assert!(!Filter::new().all_of(&[id(3), id(5)]).matches(&e));
        assert!(Filter::new().any_of(&[id(5), id(4)]).matches(&e));
        assert!(!Filter::new().any_of(&[id(5)]).matches(&e));
        assert!(!Filter::new().all_of(&[id(3)]).none_of(&[id(4)]).matches(&e));
        assert!(!Filter::nothing().matches(&e));
        assert!(!Filter::new().with(FilterKind::None, &[]).matches(&entity_with(2, &[])));
    }

    #[test]
    fn test_filter_hash_is_order_independent() {
        let a = Filter::new().all_of(&[id(4), id(3)]).none_of(&[id(7)]);
        let b = Filter::new().none_of(&[id(7)]).all_of(&[id(3), id(4)]);

        assert_eq!(a, b);
        assert_eq!(a.hash_key(), b.hash_key());
        assert_ne!(a.hash_key(), Filter::new().any_of(&[id(3), id(4)]).hash_key());
    }

    #[test]
    fn test_scan_skips_deactivated() {
        let active = entity_with(1, &[3]);
        let mut inactive = entity_with(2, &[3]);
        inactive.lifecycle = crate::entity::Lifecycle::Deactivated;

        let ctx = Context::new(ContextID::new(0), Filter::new().all_of(&[id(3)]),
                               vec![&active, &inactive].into_iter());
        assert!(ctx.contains(EntityID::new(1)));
        assert!(!ctx.contains(EntityID::new(2)));
        assert_eq!(&*ctx.entities(), &[EntityID::new(1)]);
    }

    #[test]
    fn test_entering_reports_held_components() {
        let mut ctx = Context::new(ContextID::new(0), Filter::new().all_of(&[id(3), id(4)]),
                                   std::iter::empty());
        ctx.watcher_mut(id(3));
        ctx.watcher_mut(id(5));
        let mut triggered = VecSet::new();

        let e = entity_with(1, &[3]);
        ctx.on_event(&e, &EntityEvent::ComponentAdded(id(3)), &mut triggered);
        assert!(!ctx.contains(e.id()));
        assert!(triggered.is_empty());

        let e = entity_with(1, &[3, 4]);
        ctx.on_event(&e, &EntityEvent::ComponentAdded(id(4)), &mut triggered);
        assert!(ctx.contains(e.id()));
        assert_eq!(triggered.len(), 1);

        let batch = ctx.watcher_mut(id(3)).drain(|_| false);
        assert_eq!(batch.get(WatchKind::Added), &[e.id()]);
        assert!(!ctx.watcher(id(5)).unwrap().is_triggered());
    }

    #[test]
    fn test_leaving_reports_removed_component() {
        let e = entity_with(1, &[3, 4]);
        let mut ctx = Context::new(ContextID::new(0), Filter::new().all_of(&[id(3)]),
                                   vec![&e].into_iter());
        ctx.watcher_mut(id(3));
        ctx.watcher_mut(id(4));
        let before = ctx.entities();
        let mut triggered = VecSet::new();

        let e = entity_with(1, &[4]);
        ctx.on_event(&e, &EntityEvent::ComponentRemoved { id: id(3), by_destroy: false }, &mut triggered);
        assert!(!ctx.contains(e.id()));
        assert_eq!(before.len(), 1);
        assert!(ctx.entities().is_empty());

        for target in [id(3), id(4)] {
            let batch = ctx.watcher_mut(target).drain(|_| false);
            assert_eq!(batch.get(WatchKind::Removed), &[e.id()]);
        }
    }

    #[test]
    fn test_deactivated_events_ignored() {
        let e = entity_with(1, &[3]);
        let mut ctx = Context::new(ContextID::new(0), Filter::new().all_of(&[id(3)]),
                                   vec![&e].into_iter());
        ctx.watcher_mut(id(3));
        let mut triggered = VecSet::new();

        let mut e = entity_with(1, &[3]);
        e.lifecycle = crate::entity::Lifecycle::Deactivated;
        ctx.on_event(&e, &EntityEvent::Deactivated, &mut triggered);
        assert!(!ctx.contains(e.id()));
        ctx.on_event(&e, &EntityEvent::ComponentModified(id(3)), &mut triggered);

        e.lifecycle = crate::entity::Lifecycle::Active;
        ctx.on_event(&e, &EntityEvent::Activated, &mut triggered);
        assert!(ctx.contains(e.id()));

        let batch = ctx.watcher_mut(id(3)).drain(|_| false);
        assert_eq!(batch.get(WatchKind::Deactivated), &[e.id()]);
        assert_eq!(batch.get(WatchKind::Activated), &[e.id()]);
        assert!(batch.get(WatchKind::Added).is_empty());
        assert!(batch.get(WatchKind::Modified).is_empty());
    }
}
