//! Entity creation and mutation.

use std::ops::Deref;
use std::rc::Rc;

use tracing::trace;

use crate::component::{Component, ComponentID, Message};
use crate::entity::{Entity, EntityEvent, EntityID, Lifecycle};
use crate::world::World;

/// A component paired with the ID it is stored under.
pub type BoxedComponent = (ComponentID, Box<dyn Component>);

/// Builds a new entity from a set of components.
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    id: Option<EntityID>,
    components: Vec<BoxedComponent>,
}

impl<'w> EntityBuilder<'w> {
    /// Add a component to the new entity.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        let id = self.world.lookup.id::<T>();
        self.components.push((id, Box::new(value)));
        self
    }

    /// Use a specific ID for the new entity.
    pub fn with_id(mut self, id: EntityID) -> Self {
        self.id = Some(id);
        self
    }

    /// Create the entity.
    pub fn spawn(self) -> EntityID {
        match self.id {
            Some(id) => self.world.add_entity_with_id(id, self.components),
            None => self.world.add_entity(self.components),
        }
    }
}

/// Mutable access to an entity.
///
/// Every mutation is delivered to the world's contexts before the call
/// returns.
pub struct EntityMut<'w> {
    world: &'w mut World,
    id: EntityID,
}

impl<'w> EntityMut<'w> {
    pub(crate) fn new(world: &'w mut World, id: EntityID) -> EntityMut<'w> {
        EntityMut {
            world,
            id,
        }
    }

    /// Get the ID of this entity.
    pub fn id(&self) -> EntityID {
        self.id
    }

    /// Get the world this entity lives in.
    pub fn world(&mut self) -> &mut World {
        &mut *self.world
    }

    /// Add a component.
    ///
    /// Panics if a component with the same ID is already present.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        let id = self.world.lookup.id::<T>();
        self.world.add_component(self.id, id, Box::new(value));
        self
    }

    /// Add a boxed component under the given ID.
    pub fn add_boxed(&mut self, id: ComponentID, value: Box<dyn Component>) -> &mut Self {
        self.world.add_component(self.id, id, value);
        self
    }

    /// Replace a component.
    ///
    /// Replacing with an equal value does nothing. Panics if the component is
    /// not present.
    pub fn replace<T: Component>(&mut self, value: T) -> &mut Self {
        let id = self.world.lookup.id::<T>();
        self.world.replace_component(self.id, id, Box::new(value), false);
        self
    }

    /// Replace a component, notifying even if the value is unchanged.
    pub fn replace_forced<T: Component>(&mut self, value: T) -> &mut Self {
        let id = self.world.lookup.id::<T>();
        self.world.replace_component(self.id, id, Box::new(value), true);
        self
    }

    /// Replace a boxed component under the given ID.
    pub fn replace_boxed(&mut self, id: ComponentID, value: Box<dyn Component>, force: bool) -> &mut Self {
        self.world.replace_component(self.id, id, value, force);
        self
    }

    /// Add a component, or replace it if already present.
    pub fn add_or_replace<T: Component>(&mut self, value: T) -> &mut Self {
        let id = self.world.lookup.id::<T>();
        if self.has_id(id) {
            self.world.replace_component(self.id, id, Box::new(value), false);
        } else {
            self.world.add_component(self.id, id, Box::new(value));
        }
        self
    }

    /// Remove a component by type.
    ///
    /// Returns true if it was present.
    pub fn remove<T: Component>(&mut self) -> bool {
        let id = self.world.lookup.id::<T>();
        self.world.remove_component(self.id, id, false)
    }

    /// Remove a component by ID.
    pub fn remove_id(&mut self, id: ComponentID) -> bool {
        self.world.remove_component(self.id, id, false)
    }

    /// Destroy this entity and its children.
    ///
    /// Returns false if it was already destroyed.
    pub fn destroy(&mut self) -> bool {
        self.world.destroy_entity(self.id)
    }

    /// Reactivate a deactivated entity.
    pub fn activate(&mut self) -> bool {
        self.world.set_entity_active(self.id, true)
    }

    /// Deactivate this entity. It leaves every context but keeps its
    /// components.
    pub fn deactivate(&mut self) -> bool {
        self.world.set_entity_active(self.id, false)
    }

    /// Send a message to this entity. It is visible until the end of the tick.
    pub fn send_message<T: Message>(&mut self, message: T) {
        let id = self.world.lookup.message_id::<T>();
        self.world.send_message(self.id, id, Rc::new(message));
    }

    /// Make this entity a child of `parent`.
    ///
    /// If `parent` is destroyed, this entity is destroyed instead.
    pub fn reparent(&mut self, parent: EntityID) {
        self.world.set_parent(self.id, parent, None);
    }

    /// Detach this entity from its parent.
    pub fn unparent(&mut self) {
        self.world.unparent(self.id);
    }

    /// Add a child entity, optionally under a name.
    pub fn add_child(&mut self, child: EntityID, name: Option<&str>) {
        self.world.set_parent(child, self.id, name.map(str::to_string));
    }

    /// Detach a child entity. Returns false if it was not a child.
    pub fn remove_child(&mut self, child: EntityID) -> bool {
        let is_child = self.world.try_entity(child)
            .map_or(false, |c| c.parent() == Some(self.id));
        if is_child {
            self.world.unparent(child);
        }
        is_child
    }

    /// Run this entity's interaction on behalf of `interactor`.
    ///
    /// Returns false if this entity has no interactive component.
    pub fn interact(&mut self, interactor: EntityID) -> bool {
        let interacted = self.id;
        let ran = self.world.with_detached(interacted, ComponentID::INTERACTIVE, |component, world| {
            match component.as_interactive() {
                Some(interactive) => {
                    interactive.interact(world, interactor, interacted);
                    true
                }
                None => false,
            }
        });
        ran.map_or(false, |(ran, _)| ran)
    }
}

impl<'w> Deref for EntityMut<'w> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.world.entities[&self.id]
    }
}

impl World {
    /// Start building a new entity.
    pub fn build_entity(&mut self) -> EntityBuilder<'_> {
        EntityBuilder {
            world: self,
            id: None,
            components: Vec::new(),
        }
    }

    /// Create an entity from a set of components.
    ///
    /// An entity created with no components is destroyed immediately.
    pub fn add_entity(&mut self, components: Vec<BoxedComponent>) -> EntityID {
        let id = EntityID::new(self.next_entity);
        self.insert_entity(id, components)
    }

    /// Create an entity with a specific ID.
    ///
    /// Panics if an entity with that ID still exists. IDs become free once a
    /// destroyed entity has been disposed at the end of a tick.
    pub fn add_entity_with_id(&mut self, id: EntityID, components: Vec<BoxedComponent>) -> EntityID {
        assert!(!self.entities.contains_key(&id), "entity {} already exists", id);
        self.insert_entity(id, components)
    }

    fn insert_entity(&mut self, id: EntityID, components: Vec<BoxedComponent>) -> EntityID {
        self.next_entity = self.next_entity.max(id.id() + 1);

        let mut entity = Entity::new(id, self.lookup.clone());
        for (component_id, value) in components {
            assert!(!entity.has_id(component_id), "entity {} given {} twice",
                    id, self.lookup.name(component_id));
            entity.set_present(component_id, true);
            entity.components.insert(component_id, value);
        }

        let ids: Vec<ComponentID> = entity.component_ids().collect();
        self.entities.insert(id, entity);
        trace!(entity = %id, components = ids.len(), "spawned entity");

        if ids.is_empty() {
            self.destroy_entity(id);
            return id;
        }

        for component_id in ids {
            self.with_detached(id, component_id, |value, world| world.attach(id, component_id, value));
        }

        if let Some(entity) = self.entities.get(&id) {
            if !entity.is_destroyed() {
                for context in self.contexts.iter_mut() {
                    context.on_created(entity, &mut self.triggered);
                }
            }
        }

        id
    }

    /// Hook a component up to the world before it is announced.
    fn attach(&mut self, entity: EntityID, id: ComponentID, value: &mut dyn Component) {
        if let Some(modifiable) = value.as_modifiable() {
            let queue = self.modified.clone();
            let token = modifiable.on_changed(Box::new(move || queue.push((entity, id))));
            if let Some(e) = self.entities.get_mut(&entity) {
                e.tokens.insert(id, token);
            }
        }

        if let Some(driver) = value.as_state_machine() {
            driver.initialize(self, entity);
        }
    }

    fn detach(&mut self, entity: EntityID, id: ComponentID, value: Option<&mut dyn Component>) {
        let token = self.entities.get_mut(&entity).and_then(|e| e.tokens.remove(&id));
        if let (Some(token), Some(value)) = (token, value) {
            if let Some(modifiable) = value.as_modifiable() {
                modifiable.remove_subscription(token);
            }
        }
    }

    /// Temporarily take a component out of its entity while `f` runs.
    ///
    /// Presence is untouched and no events are raised. If the component was
    /// replaced or removed in the meantime, the detached value is handed back
    /// instead of being restored.
    pub(crate) fn with_detached<R>(
        &mut self,
        entity: EntityID,
        id: ComponentID,
        f: impl FnOnce(&mut dyn Component, &mut World) -> R,
    ) -> Option<(R, Option<Box<dyn Component>>)> {
        let mut value = self.entities.get_mut(&entity)?.components.remove(&id)?;
        let result = f(&mut *value, self);

        match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() && e.has_id(id) && !e.components.has_key(&id) => {
                e.components.insert(id, value);
                Some((result, None))
            }
            _ => Some((result, Some(value))),
        }
    }

    pub(crate) fn add_component(&mut self, entity: EntityID, id: ComponentID, mut value: Box<dyn Component>) {
        match self.entities.get(&entity) {
            None => panic!("entity {} does not exist", entity),
            Some(e) if e.is_destroyed() => {
                trace!(%entity, component = self.lookup.name(id), "ignoring add to destroyed entity");
                return;
            }
            Some(e) => assert!(!e.has_id(id), "entity {} already has {}", entity, self.lookup.name(id)),
        }

        self.attach(entity, id, &mut *value);

        let relative = self.lookup.is_relative(id);
        let tracked = match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() => {
                e.set_present(id, true);
                e.components.insert(id, value);
                let tracked = relative && e.parent.is_some();
                if tracked {
                    e.tracked.insert(id);
                }
                tracked
            }
            _ => return,
        };

        self.emit(entity, EntityEvent::ComponentAdded(id));

        if tracked {
            self.push_parent_value(entity, id);
        }
    }

    pub(crate) fn replace_component(&mut self, entity: EntityID, id: ComponentID, mut value: Box<dyn Component>, force: bool) {
        let e = match self.entities.get(&entity) {
            None => panic!("entity {} does not exist", entity),
            Some(e) if e.is_destroyed() => {
                trace!(%entity, component = self.lookup.name(id), "ignoring replace on destroyed entity");
                return;
            }
            Some(e) => e,
        };
        assert!(e.has_id(id), "entity {} has no {} to replace", entity, self.lookup.name(id));

        if !force && !value.always_notify() {
            if let Some(old) = e.get_by_id(id) {
                if old.dyn_eq(&*value) {
                    return;
                }
            }
        }

        // A relative value without its parent's contribution is routed
        // through the parent so the stored value stays consistent.
        let routed = match value.as_relative() {
            Some(relative) if !relative.has_parent() && e.is_tracking(id) => e.parent
                .and_then(|p| self.entities.get(&p))
                .and_then(|p| p.get_by_id(id))
                .map(|parent_value| relative.with_parent(parent_value)),
            _ => None,
        };
        if let Some(routed) = routed {
            self.replace_component(entity, id, routed, force);
            return;
        }

        let mut old = self.entities.get_mut(&entity).and_then(|e| e.components.remove(&id));
        self.detach(entity, id, old.as_deref_mut());
        drop(old);

        self.attach(entity, id, &mut *value);

        match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() && e.has_id(id) => {
                e.components.insert(id, value);
            }
            _ => return,
        }

        self.emit(entity, EntityEvent::ComponentModified(id));
    }

    pub(crate) fn remove_component(&mut self, entity: EntityID, id: ComponentID, by_destroy: bool) -> bool {
        let mut old = match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() && e.has_id(id) => {
                e.set_present(id, false);
                e.tracked.remove(&id);
                e.components.remove(&id)
            }
            _ => return false,
        };

        self.detach(entity, id, old.as_deref_mut());
        if let Some(driver) = old.as_mut().and_then(|c| c.as_state_machine()) {
            driver.on_destroyed(self, entity);
        }
        drop(old);

        self.emit(entity, EntityEvent::ComponentRemoved { id, by_destroy });

        let drained = self.entities.get(&entity)
            .map_or(false, |e| !e.destroying && !e.is_destroyed() && e.is_empty());
        if !by_destroy && drained {
            self.destroy_entity(entity);
        }

        true
    }

    pub(crate) fn destroy_entity(&mut self, entity: EntityID) -> bool {
        let (children, parent) = match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() && !e.destroying => {
                e.destroying = true;
                (e.children().collect::<Vec<_>>(), e.parent)
            }
            _ => return false,
        };

        for child in children {
            self.destroy_entity(child);
        }

        if parent.is_some() {
            self.unparent(entity);
        }

        let ids: Vec<ComponentID> = self.entities[&entity].component_ids().collect();
        for id in ids {
            self.remove_component(entity, id, true);
        }

        if let Some(e) = self.entities.get_mut(&entity) {
            e.lifecycle = Lifecycle::Destroyed;
            e.destroying = false;
            e.children.clear();
        }

        self.emit(entity, EntityEvent::Destroyed);
        true
    }

    pub(crate) fn set_entity_active(&mut self, entity: EntityID, active: bool) -> bool {
        let changed = match self.entities.get_mut(&entity) {
            Some(e) if active && e.is_deactivated() => {
                e.lifecycle = Lifecycle::Active;
                true
            }
            Some(e) if !active && e.is_active() && !e.destroying => {
                e.lifecycle = Lifecycle::Deactivated;
                true
            }
            _ => false,
        };

        if changed {
            let event = if active { EntityEvent::Activated } else { EntityEvent::Deactivated };
            self.emit(entity, event);
        }
        changed
    }

    pub(crate) fn send_message(&mut self, entity: EntityID, id: ComponentID, message: Rc<dyn Message>) {
        match self.entities.get_mut(&entity) {
            Some(e) if !e.is_destroyed() => {
                e.messages.insert(id);
            }
            _ => return,
        }

        self.emit(entity, EntityEvent::MessageSent(id, message));
    }

    pub(crate) fn set_parent(&mut self, child: EntityID, parent: EntityID, name: Option<String>) {
        assert!(child != parent, "entity {} cannot be its own parent", child);

        let current = match self.entities.get(&child) {
            Some(c) if !c.is_destroyed() => c.parent,
            _ => return,
        };
        if current == Some(parent) {
            return;
        }
        if current.is_some() {
            self.unparent(child);
        }

        let parent_alive = self.entities.get(&parent)
            .map_or(false, |p| !p.is_destroyed() && !p.destroying);
        if !parent_alive {
            self.destroy_entity(child);
            return;
        }

        if let Some(p) = self.entities.get_mut(&parent) {
            p.children.push((child, name));
        }

        let lookup = self.lookup.clone();
        let tracked: Vec<ComponentID> = match self.entities.get_mut(&child) {
            Some(c) => {
                c.parent = Some(parent);
                let ids: Vec<ComponentID> = c.component_ids()
                    .filter(|id| lookup.is_relative(*id))
                    .collect();
                for id in ids.iter() {
                    c.tracked.insert(*id);
                }
                ids
            }
            None => return,
        };

        for id in tracked {
            self.push_parent_value(child, id);
        }
    }

    /// Detach an entity from its parent without notifying.
    pub(crate) fn unparent(&mut self, child: EntityID) {
        let parent = match self.entities.get_mut(&child) {
            Some(c) => {
                c.tracked.clear();
                c.parent.take()
            }
            None => return,
        };

        if let Some(p) = parent.and_then(|p| self.entities.get_mut(&p)) {
            p.children.retain(|(id, _)| *id != child);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lookup::ComponentsLookup;
    use crate::system::{System, SystemDescriptor};
    use crate::transform::Position;

    #[derive(Debug, Clone, PartialEq)]
    struct Label(&'static str);
    component!(Label);

    #[derive(Debug, Clone, PartialEq)]
    struct Pulse(u32);
    component!(Pulse, always_notify);

    struct Noop;
    impl System for Noop {}

    fn world() -> World {
        World::builder()
            .lookup(ComponentsLookup::empty())
            .system(SystemDescriptor::new(Noop), true)
            .build()
            .unwrap()
    }

    fn modified_count(world: &mut World, entity: EntityID, id: ComponentID) -> usize {
        let ctx = world.context_for(crate::context::Filter::new());
        let watcher = world.contexts[ctx.id()].watcher_mut(id);
        let batch = watcher.drain(|_| false);
        batch.get(crate::watcher::WatchKind::Modified).iter().filter(|e| **e == entity).count()
    }

    #[test]
    #[should_panic(expected = "already has")]
    fn test_add_present_is_fatal() {
        let mut world = world();
        let entity = world.build_entity().with(Label("a")).spawn();
        world.entity_mut(entity).add(Label("b"));
    }

    #[test]
    #[should_panic(expected = "to replace")]
    fn test_replace_absent_is_fatal() {
        let mut world = world();
        let entity = world.build_entity().with(Label("a")).spawn();
        world.entity_mut(entity).replace(Pulse(1));
    }

    #[test]
    fn test_replace_equal_is_noop() {
        let mut world = world();
        let label = world.lookup().id::<Label>();
        let pulse = world.lookup().id::<Pulse>();
        let ctx = world.context_for(crate::context::Filter::new());
        world.contexts[ctx.id()].watcher_mut(label);
        world.contexts[ctx.id()].watcher_mut(pulse);

        let entity = world.build_entity().with(Label("a")).with(Pulse(1)).spawn();
        modified_count(&mut world, entity, label);

        world.entity_mut(entity).replace(Label("a"));
        assert_eq!(modified_count(&mut world, entity, label), 0);

        world.entity_mut(entity).replace_forced(Label("a"));
        assert_eq!(modified_count(&mut world, entity, label), 1);

        world.entity_mut(entity).replace(Pulse(1));
        assert_eq!(modified_count(&mut world, entity, pulse), 1);
    }

    #[test]
    fn test_remove_last_component_destroys() {
        let mut world = world();
        let entity = world.build_entity().with(Label("a")).spawn();

        assert!(!world.entity_mut(entity).remove::<Pulse>());
        assert!(world.entity_mut(entity).remove::<Label>());
        assert!(world.entity(entity).is_destroyed());
        assert!(!world.entity_mut(entity).destroy());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut world = world();
        let label = world.lookup().id::<Label>();
        let ctx = world.context_for(crate::context::Filter::new());
        world.contexts[ctx.id()].watcher_mut(label);

        let entity = world.build_entity().with(Label("a")).spawn();
        world.contexts[ctx.id()].watcher_mut(label).drain(|_| false);

        assert!(world.entity_mut(entity).destroy());
        assert!(!world.entity_mut(entity).destroy());

        let batch = world.contexts[ctx.id()].watcher_mut(label).drain(|_| true);
        assert_eq!(batch.get(crate::watcher::WatchKind::Removed), &[entity]);
        assert_eq!(world.pending_destroy, vec![entity]);
    }

    #[test]
    fn test_reparent_delivers_parent_value_once() {
        let mut world = world();
        let position = world.lookup().id::<Position>();
        let ctx = world.context_for(crate::context::Filter::new());
        world.contexts[ctx.id()].watcher_mut(position);

        let parent = world.build_entity().with(Position::new(10.0, 0.0)).spawn();
        let child = world.build_entity().with(Position::new(1.0, 1.0)).spawn();
        modified_count(&mut world, child, position);

        world.entity_mut(child).reparent(parent);
        assert_eq!(modified_count(&mut world, child, position), 1);
        assert_eq!(world.entity(child).get::<Position>().global(), (11.0, 1.0));
        assert_eq!(world.entity(parent).children().collect::<Vec<_>>(), vec![child]);

        world.entity_mut(parent).replace(Position::new(20.0, 0.0));
        assert_eq!(world.entity(child).get::<Position>().global(), (21.0, 1.0));
        assert_eq!(modified_count(&mut world, child, position), 1);

        world.entity_mut(child).unparent();
        assert_eq!(modified_count(&mut world, child, position), 0);
        world.entity_mut(parent).replace(Position::new(30.0, 0.0));
        assert_eq!(modified_count(&mut world, child, position), 0);
        assert_eq!(world.entity(child).get::<Position>().global(), (21.0, 1.0));
        assert_eq!(world.entity(child).parent(), None);
    }

    #[test]
    fn test_unparented_replace_routes_through_parent() {
        let mut world = world();
        let position = world.lookup().id::<Position>();
        let ctx = world.context_for(crate::context::Filter::new());
        world.contexts[ctx.id()].watcher_mut(position);

        let parent = world.build_entity().with(Position::new(5.0, 5.0)).spawn();
        let child = world.build_entity().with(Label("c")).spawn();
        world.entity_mut(parent).add_child(child, Some("arm"));
        world.entity_mut(child).add(Position::new(1.0, 0.0));
        assert_eq!(world.entity(child).get::<Position>().global(), (6.0, 5.0));
        modified_count(&mut world, child, position);

        world.entity_mut(child).replace(Position::new(2.0, 0.0));
        assert_eq!(modified_count(&mut world, child, position), 1);
        assert_eq!(world.entity(child).get::<Position>().global(), (7.0, 5.0));
        assert_eq!(world.entity(parent).child_named("arm"), Some(child));
    }

    #[test]
    fn test_routed_replace_with_equal_local_is_noop() {
        let mut world = world();
        let position = world.lookup().id::<Position>();
        let ctx = world.context_for(crate::context::Filter::new());
        world.contexts[ctx.id()].watcher_mut(position);

        let parent = world.build_entity().with(Position::new(5.0, 5.0)).spawn();
        let child = world.build_entity().with(Position::new(1.0, 0.0)).spawn();
        world.entity_mut(child).reparent(parent);
        assert_eq!(world.entity(child).get::<Position>().global(), (6.0, 5.0));
        modified_count(&mut world, child, position);

        world.entity_mut(child).replace(Position::new(1.0, 0.0));
        assert_eq!(modified_count(&mut world, child, position), 0);
        assert_eq!(world.entity(child).get::<Position>().global(), (6.0, 5.0));

        world.entity_mut(child).replace_forced(Position::new(1.0, 0.0));
        assert_eq!(modified_count(&mut world, child, position), 1);
    }

    #[test]
    fn test_hierarchy_destruction() {
        let mut world = world();
        let parent = world.build_entity().with(Label("p")).spawn();
        let child = world.build_entity().with(Label("c")).spawn();
        let orphan = world.build_entity().with(Label("o")).spawn();
        world.entity_mut(parent).add_child(child, None);

        world.entity_mut(parent).destroy();
        assert!(world.entity(child).is_destroyed());

        world.entity_mut(orphan).reparent(parent);
        assert!(world.entity(orphan).is_destroyed());
    }

    #[test]
    fn test_child_destruction_detaches() {
        let mut world = world();
        let parent = world.build_entity().with(Label("p")).spawn();
        let child = world.build_entity().with(Label("c")).spawn();
        world.entity_mut(parent).add_child(child, Some("c"));

        world.entity_mut(child).destroy();
        assert!(!world.entity(parent).is_destroyed());
        assert_eq!(world.entity(parent).children().count(), 0);
        assert!(!world.entity_mut(parent).remove_child(child));
    }

    #[test]
    fn test_ids_reused_only_after_disposal() {
        let mut world = world();
        let first = world.build_entity().with(Label("a")).spawn();
        let second = world.build_entity().with(Label("b")).spawn();
        assert_ne!(first, second);

        world.entity_mut(first).destroy();
        world.update(std::time::Duration::ZERO);
        assert!(world.try_entity(first).is_none());

        let again = world.build_entity().with(Label("c")).with_id(first).spawn();
        assert_eq!(again, first);
        let next = world.build_entity().with(Label("d")).spawn();
        assert!(next > second);
    }

    #[test]
    fn test_messages_last_one_tick() {
        #[derive(Debug)]
        struct Shout;
        message!(Shout);

        let mut world = world();
        let entity = world.build_entity().with(Label("a")).spawn();
        world.entity_mut(entity).send_message(Shout);
        assert!(world.entity(entity).has_message::<Shout>());

        world.update(std::time::Duration::ZERO);
        assert!(!world.entity(entity).has_message::<Shout>());
    }
}
