//! Per-tick batching of component events for reactive systems.
//!
//! Each `ComponentWatcher` belongs to a context and follows a single
//! component ID. Between sweeps it collects which entities were added,
//! removed, modified, activated or deactivated, recording each entity at
//! most once per kind.

use std::rc::Rc;

use crate::component::{ComponentID, Message};
use crate::context::ContextID;
use crate::entity::EntityID;
use crate::sorted_vec::VecSet;
use crate::system::SystemID;

/// The kinds of notification a watcher batches, in delivery order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchKind {
    Added,
    Removed,
    Modified,
    Activated,
    Deactivated,
}

impl WatchKind {
    /// Every kind, in the order batches are delivered.
    pub const ALL: [WatchKind; 5] = [
        WatchKind::Added,
        WatchKind::Removed,
        WatchKind::Modified,
        WatchKind::Activated,
        WatchKind::Deactivated,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Identifies a watcher within a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WatcherKey {
    pub context: ContextID,
    pub target: ComponentID,
    pub message: bool,
}

/// The entities collected by a watcher, grouped by kind.
#[derive(Clone, Debug, Default)]
pub struct WatchBatch {
    kinds: [VecSet<EntityID>; 5],
}

impl WatchBatch {
    /// Get the entities recorded under a kind, ordered by ID.
    pub fn get(&self, kind: WatchKind) -> &[EntityID] {
        &self.kinds[kind.index()]
    }

    /// Merge another batch into this one.
    pub fn merge(&mut self, other: &WatchBatch) {
        for (mine, theirs) in self.kinds.iter_mut().zip(other.kinds.iter()) {
            for entity in theirs.iter() {
                mine.insert(*entity);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.iter().all(|k| k.is_empty())
    }
}

/// Batches notifications about one component ID within one context.
#[derive(Debug)]
pub struct ComponentWatcher {
    target: ComponentID,
    pending: WatchBatch,
    subscribers: VecSet<SystemID>,
}

impl ComponentWatcher {
    pub(crate) fn new(target: ComponentID) -> ComponentWatcher {
        ComponentWatcher {
            target,
            pending: WatchBatch::default(),
            subscribers: VecSet::new(),
        }
    }

    /// Get the component ID this watcher follows.
    pub fn target(&self) -> ComponentID {
        self.target
    }

    /// Get the active systems subscribed to this watcher, in execution order.
    pub fn subscribers(&self) -> &[SystemID] {
        &self.subscribers
    }

    /// Returns true if there are undrained notifications.
    pub fn is_triggered(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Record a notification.
    ///
    /// Returns true if anything was recorded.
    pub(crate) fn record(&mut self, kind: WatchKind, entity: EntityID) -> bool {
        self.pending.kinds[kind.index()].insert(entity);
        true
    }

    /// Record a removal.
    ///
    /// An undrained `Added` for the same entity is retracted instead, unless
    /// the removal was caused by destruction.
    pub(crate) fn record_removed(&mut self, entity: EntityID, by_destroy: bool) -> bool {
        let retracted = self.pending.kinds[WatchKind::Added.index()].remove(&entity);
        if retracted && !by_destroy {
            return false;
        }

        self.record(WatchKind::Removed, entity)
    }

    /// Take the pending batch.
    ///
    /// Entities which have since been destroyed are only reported as removed.
    pub(crate) fn drain(&mut self, is_destroyed: impl Fn(EntityID) -> bool) -> WatchBatch {
        let mut batch = std::mem::take(&mut self.pending);
        for kind in WatchKind::ALL {
            if kind == WatchKind::Removed {
                continue;
            }

            let set = &mut batch.kinds[kind.index()];
            let kept = set.take().into_iter().filter(|e| !is_destroyed(*e)).collect();
            *set = VecSet::from_inner(kept);
        }

        batch
    }

    pub(crate) fn subscribe(&mut self, system: SystemID) {
        self.subscribers.insert(system);
    }

    pub(crate) fn unsubscribe(&mut self, system: SystemID) {
        self.subscribers.remove(&system);
    }
}

/// Collects messages of one type sent to entities within one context.
#[derive(Debug)]
pub struct MessageWatcher {
    target: ComponentID,
    pending: Vec<(EntityID, Rc<dyn Message>)>,
    subscribers: VecSet<SystemID>,
}

impl MessageWatcher {
    pub(crate) fn new(target: ComponentID) -> MessageWatcher {
        MessageWatcher {
            target,
            pending: Vec::new(),
            subscribers: VecSet::new(),
        }
    }

    /// Get the message ID this watcher follows.
    pub fn target(&self) -> ComponentID {
        self.target
    }

    pub fn subscribers(&self) -> &[SystemID] {
        &self.subscribers
    }

    pub fn is_triggered(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn record(&mut self, entity: EntityID, message: Rc<dyn Message>) -> bool {
        self.pending.push((entity, message));
        true
    }

    /// Take the pending messages in arrival order, skipping destroyed
    /// entities.
    pub(crate) fn drain(&mut self, is_destroyed: impl Fn(EntityID) -> bool) -> Vec<(EntityID, Rc<dyn Message>)> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.retain(|(e, _)| !is_destroyed(*e));
        pending
    }

    pub(crate) fn subscribe(&mut self, system: SystemID) {
        self.subscribers.insert(system);
    }

    pub(crate) fn unsubscribe(&mut self, system: SystemID) {
        self.subscribers.remove(&system);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn e(id: u32) -> EntityID {
        EntityID::new(id)
    }

    #[test]
    fn test_one_record_per_kind() {
        let mut watcher = ComponentWatcher::new(ComponentID::new(5));
        watcher.record(WatchKind::Modified, e(2));
        watcher.record(WatchKind::Modified, e(1));
        watcher.record(WatchKind::Modified, e(2));

        let batch = watcher.drain(|_| false);
        assert_eq!(batch.get(WatchKind::Modified), &[e(1), e(2)]);
        assert!(!watcher.is_triggered());
    }

    #[test]
    fn test_removal_retracts_added() {
        let mut watcher = ComponentWatcher::new(ComponentID::new(5));
        watcher.record(WatchKind::Added, e(1));
        assert!(!watcher.record_removed(e(1), false));

        let batch = watcher.drain(|_| false);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_destroyed_removal_still_fires() {
        let mut watcher = ComponentWatcher::new(ComponentID::new(5));
        watcher.record(WatchKind::Added, e(1));
        watcher.record(WatchKind::Modified, e(1));
        assert!(watcher.record_removed(e(1), true));

        let batch = watcher.drain(|id| id == e(1));
        assert!(batch.get(WatchKind::Added).is_empty());
        assert!(batch.get(WatchKind::Modified).is_empty());
        assert_eq!(batch.get(WatchKind::Removed), &[e(1)]);
    }

    #[test]
    fn test_plain_removal_reported() {
        let mut watcher = ComponentWatcher::new(ComponentID::new(5));
        assert!(watcher.record_removed(e(3), false));
        assert_eq!(watcher.drain(|_| false).get(WatchKind::Removed), &[e(3)]);
    }

    #[test]
    fn test_merge_dedups() {
        let mut a = ComponentWatcher::new(ComponentID::new(5));
        let mut b = ComponentWatcher::new(ComponentID::new(6));
        a.record(WatchKind::Added, e(1));
        b.record(WatchKind::Added, e(1));
        b.record(WatchKind::Added, e(0));

        let mut merged = a.drain(|_| false);
        merged.merge(&b.drain(|_| false));
        assert_eq!(merged.get(WatchKind::Added), &[e(0), e(1)]);
    }
}
