//! Stable ID assignment for component and message types.
//!
//! A `ComponentsLookup` is normally produced once by the host (or a build
//! step) with every known type pre-registered, which claims a contiguous block
//! of IDs starting after the reserved umbrella IDs. Types which were not
//! registered up front are assigned the next free ID on first use, unless
//! they specialize an umbrella, in which case they alias it.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::{Component, ComponentID, Message};

/// What sort of type an ID was assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Umbrella,
    Component,
    Message,
}

/// Registration information for a single ID.
#[derive(Clone, Debug)]
pub struct TypeInfo {
    name: &'static str,
    kind: TypeKind,
    relative: bool,
}

impl TypeInfo {
    /// Get the name of the type registered under this ID.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the kind of type registered under this ID.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns true if values under this ID propagate from parents.
    pub fn is_relative(&self) -> bool {
        self.relative
    }
}

struct LookupState {
    by_type: HashMap<TypeId, ComponentID>,
    infos: Vec<TypeInfo>,
}

impl LookupState {
    fn new() -> LookupState {
        let umbrella = |name, relative| TypeInfo { name, kind: TypeKind::Umbrella, relative };

        LookupState {
            by_type: HashMap::new(),
            infos: vec![
                umbrella("StateMachine", false),
                umbrella("Interactive", false),
                umbrella("Transform", true),
            ],
        }
    }

    fn register(
        &mut self,
        type_id: TypeId,
        name: &'static str,
        kind: TypeKind,
        umbrella: Option<ComponentID>,
        relative: bool,
    ) -> ComponentID {
        if let Some(id) = self.by_type.get(&type_id) {
            return *id;
        }

        let id = match umbrella {
            Some(umbrella) => {
                if relative {
                    self.infos[umbrella.id()].relative = true;
                }
                umbrella
            }
            None => {
                let id = ComponentID::new(self.infos.len());
                self.infos.push(TypeInfo { name, kind, relative });
                id
            }
        };

        self.by_type.insert(type_id, id);
        id
    }
}

/// A table mapping component and message types to dense IDs.
///
/// IDs are never reused and the table only ever grows.
pub struct ComponentsLookup {
    state: RwLock<LookupState>,
    claimed: Range<usize>,
}

impl ComponentsLookup {
    /// Start building a lookup table with pre-registered types.
    pub fn builder() -> LookupBuilder {
        LookupBuilder::new()
    }

    /// Create a lookup table with no pre-registered types.
    pub fn empty() -> Arc<ComponentsLookup> {
        LookupBuilder::new().build()
    }

    /// Get the ID of a component type, assigning one if needed.
    ///
    /// Panics if the type was registered as a message.
    pub fn id<T: Component>(&self) -> ComponentID {
        let id = self.lookup_or_register(
            TypeId::of::<T>(),
            type_name::<T>(),
            TypeKind::Component,
            T::umbrella(),
            T::is_relative(),
        );

        let kind = self.state.read().infos[id.id()].kind;
        assert!(kind != TypeKind::Message,
                "{} is registered as a message, not a component", type_name::<T>());
        id
    }

    /// Get the ID of a message type, assigning one if needed.
    ///
    /// Panics if the type was registered as a component.
    pub fn message_id<T: Message>(&self) -> ComponentID {
        let id = self.lookup_or_register(
            TypeId::of::<T>(),
            type_name::<T>(),
            TypeKind::Message,
            None,
            false,
        );

        let kind = self.state.read().infos[id.id()].kind;
        assert!(kind == TypeKind::Message,
                "{} is registered as a component, not a message", type_name::<T>());
        id
    }

    fn lookup_or_register(
        &self,
        type_id: TypeId,
        name: &'static str,
        kind: TypeKind,
        umbrella: Option<ComponentID>,
        relative: bool,
    ) -> ComponentID {
        if let Some(id) = self.state.read().by_type.get(&type_id) {
            return *id;
        }

        self.state.write().register(type_id, name, kind, umbrella, relative)
    }

    /// Returns true if values under this ID propagate from parents.
    pub fn is_relative(&self, id: ComponentID) -> bool {
        self.state.read().infos.get(id.id()).map_or(false, |info| info.relative)
    }

    /// Returns true if this ID belongs to a message type.
    pub fn is_message(&self, id: ComponentID) -> bool {
        self.state.read().infos.get(id.id()).map_or(false, |info| info.kind == TypeKind::Message)
    }

    /// Fetch the registration information for an ID.
    pub fn info(&self, id: ComponentID) -> Option<TypeInfo> {
        self.state.read().infos.get(id.id()).cloned()
    }

    /// Get the name of the type registered under an ID.
    pub fn name(&self, id: ComponentID) -> &'static str {
        self.state.read().infos.get(id.id()).map_or("<unregistered>", |info| info.name)
    }

    /// Return the number of IDs assigned so far.
    pub fn len(&self) -> usize {
        self.state.read().infos.len()
    }

    /// Returns true if no IDs have been assigned, which is never the case
    /// since the umbrella IDs are always reserved.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Return the block of IDs claimed by pre-registered types.
    pub fn claimed(&self) -> Range<usize> {
        self.claimed.clone()
    }
}

type Registration = (TypeId, &'static str, TypeKind, Option<ComponentID>, bool);

/// A builder for `ComponentsLookup` tables.
///
/// Types are assigned IDs in the order they are registered.
pub struct LookupBuilder {
    registrations: Vec<Registration>,
}

impl LookupBuilder {
    fn new() -> LookupBuilder {
        LookupBuilder {
            registrations: Vec::new(),
        }
    }

    /// Pre-register a component type.
    pub fn component<T: Component>(mut self) -> Self {
        self.registrations.push((
            TypeId::of::<T>(),
            type_name::<T>(),
            TypeKind::Component,
            T::umbrella(),
            T::is_relative(),
        ));
        self
    }

    /// Pre-register a message type.
    pub fn message<T: Message>(mut self) -> Self {
        self.registrations.push((TypeId::of::<T>(), type_name::<T>(), TypeKind::Message, None, false));
        self
    }

    /// Build the lookup table.
    pub fn build(self) -> Arc<ComponentsLookup> {
        let mut state = LookupState::new();
        for (type_id, name, kind, umbrella, relative) in self.registrations {
            state.register(type_id, name, kind, umbrella, relative);
        }

        let claimed = ComponentID::RESERVED..state.infos.len();
        Arc::new(ComponentsLookup {
            state: RwLock::new(state),
            claimed,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::RelativeComponent;

    #[derive(Debug, PartialEq)]
    struct A;
    component!(A);

    #[derive(Debug, PartialEq)]
    struct B;
    component!(B);

    #[derive(Debug, PartialEq)]
    struct C;
    component!(C);

    #[derive(Debug)]
    struct Hit;
    message!(Hit);

    #[derive(Debug, PartialEq)]
    struct Anchor(i32);

    impl Component for Anchor {
        fn umbrella() -> Option<ComponentID> {
            Some(ComponentID::TRANSFORM)
        }

        fn is_relative() -> bool {
            true
        }

        fn dyn_eq(&self, other: &dyn Component) -> bool {
            other.downcast_ref::<Anchor>().map_or(false, |o| o == self)
        }

        fn as_relative(&self) -> Option<&dyn RelativeComponent> {
            Some(self)
        }
    }

    impl RelativeComponent for Anchor {
        fn has_parent(&self) -> bool {
            false
        }

        fn with_parent(&self, _parent: &dyn Component) -> Box<dyn Component> {
            Box::new(Anchor(self.0))
        }
    }

    #[test]
    fn test_registered_ids_are_contiguous() {
        let lookup = ComponentsLookup::builder()
            .component::<A>()
            .message::<Hit>()
            .component::<B>()
            .build();

        assert_eq!(lookup.id::<A>(), ComponentID::new(3));
        assert_eq!(lookup.message_id::<Hit>(), ComponentID::new(4));
        assert_eq!(lookup.id::<B>(), ComponentID::new(5));
        assert_eq!(lookup.claimed(), 3..6);
        assert!(lookup.is_message(ComponentID::new(4)));
    }

    #[test]
    fn test_first_use_assigns_next_id() {
        let lookup = ComponentsLookup::builder().component::<A>().build();

        let c = lookup.id::<C>();
        assert_eq!(c, ComponentID::new(4));
        assert_eq!(lookup.id::<C>(), c);
        assert_eq!(lookup.len(), 5);
        assert!(lookup.name(c).ends_with("C"));
    }

    #[test]
    fn test_umbrella_alias() {
        let lookup = ComponentsLookup::empty();

        assert_eq!(lookup.id::<Anchor>(), ComponentID::TRANSFORM);
        assert!(lookup.is_relative(ComponentID::TRANSFORM));
        assert_eq!(lookup.len(), ComponentID::RESERVED);
    }

    #[test]
    #[should_panic(expected = "registered as a message")]
    fn test_kind_mismatch_is_fatal() {
        #[derive(Debug, PartialEq)]
        struct Both;
        component!(Both);
        message!(Both);

        let lookup = ComponentsLookup::builder().message::<Both>().build();
        lookup.id::<Both>();
    }
}
