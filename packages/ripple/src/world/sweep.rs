//! The end-of-tick reactive sweep.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::component::Message;
use crate::entity::{EntityEvent, EntityID};
use crate::system::SystemID;
use crate::watcher::{WatchBatch, WatchKind, WatcherKey};
use crate::world::World;

#[derive(Default)]
struct SystemBatch {
    watched: WatchBatch,
    messages: Vec<(EntityID, Rc<dyn Message>)>,
}

impl World {
    /// Deliver batched notifications until no watcher is triggered.
    ///
    /// Panics if the systems keep triggering each other for more than
    /// `max_sweep_iterations` rounds.
    pub(crate) fn sweep(&mut self) {
        let mut iterations = 0;

        loop {
            self.drain_modified();
            if self.triggered.is_empty() {
                break;
            }

            iterations += 1;
            if iterations > self.settings.max_sweep_iterations {
                let watchers: Vec<String> = self.triggered.iter()
                    .map(|key| format!("{} in context {}", self.lookup.name(key.target), key.context.id()))
                    .collect();
                panic!("reactive sweep did not settle after {} iterations; still triggered: {}",
                       self.settings.max_sweep_iterations, watchers.join(", "));
            }

            let triggered = self.triggered.take();
            trace!(iteration = iterations, watchers = triggered.len(), "sweeping");

            let batches = self.drain_watchers(&triggered);
            for (id, batch) in batches {
                if self.systems.is_active(id) {
                    self.dispatch_batch(id, batch);
                }
            }
        }
    }

    /// Turn out-of-band change signals into Modified events.
    fn drain_modified(&mut self) {
        while let Some((entity, id)) = self.modified.pop() {
            let live = self.entities.get(&entity)
                .map_or(false, |e| !e.is_destroyed() && e.has_id(id));
            if live {
                self.emit(entity, EntityEvent::ComponentModified(id));
            } else {
                warn!(%entity, component = self.lookup.name(id), "change signalled for vanished component");
            }
        }
    }

    fn drain_watchers(&mut self, triggered: &[WatcherKey]) -> BTreeMap<SystemID, SystemBatch> {
        let mut batches: BTreeMap<SystemID, SystemBatch> = BTreeMap::new();
        let entities = &self.entities;
        let is_destroyed = |e: EntityID| entities.get(&e).map_or(true, |e| e.is_destroyed());

        for key in triggered {
            let context = &mut self.contexts[key.context.id()];

            if key.message {
                let watcher = context.message_watcher_mut(key.target);
                let messages = watcher.drain(is_destroyed);
                trace!(component = ?key.target, messages = messages.len(), "drained message watcher");

                for system in watcher.subscribers() {
                    batches.entry(*system).or_default().messages.extend(messages.iter().cloned());
                }
            } else {
                let watcher = context.watcher_mut(key.target);
                let batch = watcher.drain(is_destroyed);
                trace!(component = ?key.target, "drained watcher");

                if batch.is_empty() {
                    continue;
                }
                for system in watcher.subscribers() {
                    batches.entry(*system).or_default().watched.merge(&batch);
                }
            }
        }

        batches
    }

    fn dispatch_batch(&mut self, id: SystemID, batch: SystemBatch) {
        self.run_reactive(id, |system, world| {
            if let Some(reactive) = system.as_reactive() {
                for kind in WatchKind::ALL {
                    let entities = batch.watched.get(kind);
                    if entities.is_empty() {
                        continue;
                    }

                    match kind {
                        WatchKind::Added => reactive.on_added(world, entities),
                        WatchKind::Removed => reactive.on_removed(world, entities),
                        WatchKind::Modified => reactive.on_modified(world, entities),
                        WatchKind::Activated => reactive.on_activated(world, entities),
                        WatchKind::Deactivated => reactive.on_deactivated(world, entities),
                    }
                }
            }

            if let Some(messager) = system.as_messager() {
                for (entity, message) in batch.messages.iter() {
                    messager.on_message(world, *entity, &**message);
                }
            }

            if let Some(reactive) = system.as_reactive() {
                reactive.on_after_trigger(world);
            }
        });
    }

    /// Forget every message sent this tick.
    pub(crate) fn clear_messages(&mut self) {
        for entity in self.messaged.take().iter() {
            if let Some(e) = self.entities.get_mut(entity) {
                e.messages.clear();
            }
        }
    }

    /// Drop every entity destroyed this tick.
    pub(crate) fn destroy_pending(&mut self) {
        for entity in std::mem::take(&mut self.pending_destroy) {
            if self.entities.remove(&entity).is_some() {
                debug!(%entity, "disposed entity");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::time::Duration;

    use crate::config::WorldSettings;
    use crate::context::{AccessKind, ContextID, FilterKind};
    use crate::lookup::ComponentsLookup;
    use crate::modifiable::Shared;
    use crate::system::{MessagerSystem, ReactiveSystem, System, SystemDescriptor, UpdateSystem};
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ball(u32);
    component!(Ball);

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u32);
    component!(Tag);

    #[derive(Debug)]
    struct Hit(u32);
    message!(Hit);

    thread_local! {
        static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
    }

    fn take_log() -> Vec<String> {
        LOG.with(|l| l.borrow_mut().drain(..).collect())
    }

    fn log(line: String) {
        LOG.with(|l| l.borrow_mut().push(line));
    }

    /// Bumps every modified ball, so it never settles.
    struct PingPong;

    impl System for PingPong {
        fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
    }

    impl ReactiveSystem for PingPong {
        fn on_added(&mut self, world: &mut World, entities: &[EntityID]) {
            self.on_modified(world, entities);
        }

        fn on_modified(&mut self, world: &mut World, entities: &[EntityID]) {
            for entity in entities {
                let next = world.entity(*entity).get::<Ball>().0 + 1;
                world.entity_mut(*entity).replace(Ball(next));
            }
        }
    }

    struct Listener;

    impl System for Listener {
        fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
        fn as_messager(&mut self) -> Option<&mut dyn MessagerSystem> { Some(self) }
    }

    impl ReactiveSystem for Listener {
        fn on_modified(&mut self, _: &mut World, entities: &[EntityID]) {
            log(format!("modified {:?}", entities));
        }

        fn on_after_trigger(&mut self, _: &mut World) {
            log("after".to_string());
        }
    }

    impl MessagerSystem for Listener {
        fn on_message(&mut self, _: &mut World, entity: EntityID, message: &dyn Message) {
            if let Some(hit) = message.downcast_ref::<Hit>() {
                log(format!("hit {} {}", entity, hit.0));
            }
        }
    }

    struct Merger;

    impl System for Merger {
        fn as_reactive(&mut self) -> Option<&mut dyn ReactiveSystem> { Some(self) }
    }

    impl ReactiveSystem for Merger {
        fn on_added(&mut self, _: &mut World, entities: &[EntityID]) {
            log(format!("add {:?}", entities));
        }

        fn on_modified(&mut self, _: &mut World, entities: &[EntityID]) {
            log(format!("mod {:?}", entities));
        }
    }

    struct Thrower;

    impl System for Thrower {
        fn as_update(&mut self) -> Option<&mut dyn UpdateSystem> { Some(self) }
    }

    impl UpdateSystem for Thrower {
        fn update(&mut self, world: &mut World, context: ContextID) {
            for entity in world.context(context).entities().iter() {
                world.entity_mut(*entity).send_message(Hit(entity.id()));
            }
        }
    }

    #[test]
    #[should_panic(expected = "did not settle")]
    fn test_sweep_cap_is_fatal() {
        let lookup = ComponentsLookup::builder().component::<Ball>().build();
        let ball = lookup.id::<Ball>();

        let mut world = World::builder()
            .lookup(lookup)
            .settings(WorldSettings {
                max_sweep_iterations: 4,
                ..WorldSettings::default()
            })
            .system(SystemDescriptor::new(PingPong)
                        .filter(FilterKind::AllOf, AccessKind::Write, &[ball])
                        .watch(&[ball]), true)
            .build()
            .unwrap();

        world.start();
        world.build_entity().with(Ball(0)).spawn();
        world.update(Duration::ZERO);
    }

    #[test]
    fn test_messages_and_shared_changes() {
        let lookup = ComponentsLookup::builder()
            .component::<Ball>()
            .component::<Shared<u32>>()
            .message::<Hit>()
            .build();
        let ball = lookup.id::<Ball>();
        let shared = lookup.id::<Shared<u32>>();
        let hit = lookup.message_id::<Hit>();

        let mut world = World::builder()
            .lookup(lookup)
            .system(SystemDescriptor::new(Thrower)
                        .filter(FilterKind::AllOf, AccessKind::Read, &[ball]), true)
            .system(SystemDescriptor::new(Listener)
                        .filter(FilterKind::AllOf, AccessKind::Read, &[ball])
                        .watch(&[shared])
                        .messages(&[hit]), true)
            .build()
            .unwrap();

        let value = Shared::new(1u32);
        let handle = value.handle();
        let entity = world.build_entity().with(Ball(0)).with(value).spawn();
        world.start();
        take_log();

        world.update(Duration::ZERO);
        assert_eq!(take_log(), vec![format!("hit {} {}", entity, entity.id()), "after".to_string()]);
        assert!(!world.entity(entity).has_message::<Hit>());

        std::thread::spawn(move || handle.set(7)).join().unwrap();
        world.deactivate_system_immediately::<Thrower>();
        world.update(Duration::ZERO);
        assert_eq!(take_log(), vec![format!("modified {:?}", [entity]), "after".to_string()]);
        assert_eq!(world.entity(entity).get::<Shared<u32>>().get(), 7);
    }

    #[test]
    fn test_vanished_changes_are_dropped() {
        let lookup = ComponentsLookup::builder().component::<Shared<u32>>().build();
        let shared = lookup.id::<Shared<u32>>();
        let mut world = World::builder()
            .lookup(lookup)
            .system(SystemDescriptor::new(Listener)
                        .filter(FilterKind::AllOf, AccessKind::Read, &[shared])
                        .watch(&[shared]), true)
            .build()
            .unwrap();

        let value = Shared::new(0u32);
        let handle = value.handle();
        let entity = world.build_entity().with(value).spawn();
        world.start();
        take_log();

        world.entity_mut(entity).destroy();
        handle.set(3);
        world.update(Duration::ZERO);
        assert_eq!(take_log(), vec!["after".to_string()]);
        assert!(world.try_entity(entity).is_none());
    }

    #[test]
    fn test_watchers_merge_per_system() {
        let lookup = ComponentsLookup::builder()
            .component::<Ball>()
            .component::<Tag>()
            .build();
        let ball = lookup.id::<Ball>();
        let tag = lookup.id::<Tag>();

        let mut world = World::builder()
            .lookup(lookup)
            .system(SystemDescriptor::new(Merger)
                        .filter(FilterKind::AllOf, AccessKind::Read, &[ball])
                        .watch(&[ball, tag]), true)
            .build()
            .unwrap();

        world.start();
        take_log();

        let entity = world.build_entity().with(Ball(0)).with(Tag(0)).spawn();
        world.update(Duration::ZERO);
        assert_eq!(take_log(), vec![format!("add {:?}", [entity])]);

        world.entity_mut(entity).replace(Ball(1));
        world.entity_mut(entity).replace(Tag(1));
        world.update(Duration::ZERO);
        assert_eq!(take_log(), vec![format!("mod {:?}", [entity])]);
    }
}
