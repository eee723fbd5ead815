//! Base definitions for components and messages.
//!
//! Entities in this library are nothing more than a bag of components. Each
//! component type is mapped to a unique `ComponentID` by a
//! [`ComponentsLookup`](crate::ComponentsLookup), and that ID is the only key
//! used for storage and filtering.
//!
//! There are macros (`component!` and `message!`) to implement the traits
//! for plain data types.

use std::any::Any;
use std::fmt::{self, Debug, Formatter};

use crate::interaction::Interactive;
use crate::modifiable::ModifiableComponent;
use crate::state_machine::StateMachineDriver;

/// A component ID which is unique for a specific component or message type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentID(usize);

impl ComponentID {
    /// The umbrella ID shared by every state machine component.
    pub const STATE_MACHINE: ComponentID = ComponentID(0);

    /// The umbrella ID shared by every interactive component.
    pub const INTERACTIVE: ComponentID = ComponentID(1);

    /// The umbrella ID shared by every spatial position component.
    pub const TRANSFORM: ComponentID = ComponentID(2);

    /// The number of reserved umbrella IDs; registered types start here.
    pub const RESERVED: usize = 3;

    /// Construct a new `ComponentID` from the inner value.
    pub const fn new(inner: usize) -> ComponentID {
        ComponentID(inner)
    }

    /// Return the inner unique ID.
    pub fn id(&self) -> usize {
        self.0
    }

    /// Returns true if this is one of the reserved umbrella IDs.
    pub fn is_umbrella(&self) -> bool {
        self.0 < ComponentID::RESERVED
    }
}

impl Debug for ComponentID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentID(#{})", self.0)
    }
}

/// Access to `Any` for trait objects.
pub trait AsAny {
    /// Borrow this value as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow this value as `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The component trait is implemented on all component types.
///
/// Most types should use the `component!` macro rather than implementing
/// this directly. The optional capability accessors (`as_relative`,
/// `as_state_machine`, ...) are how the runtime discovers behaviour on a
/// boxed component.
pub trait Component: AsAny + Debug + 'static {
    /// The umbrella ID this component type specializes, if any.
    fn umbrella() -> Option<ComponentID> where Self: Sized {
        None
    }

    /// Whether this component type is mirrored from parents to children.
    fn is_relative() -> bool where Self: Sized {
        false
    }

    /// Compare against another component value.
    ///
    /// Returning true makes a non-forced replace a no-op.
    fn dyn_eq(&self, other: &dyn Component) -> bool;

    /// Components returning true are always notified on replace, even when
    /// the new value is equal to the old one.
    fn always_notify(&self) -> bool {
        false
    }

    /// Access the parent-relative behaviour of this component.
    fn as_relative(&self) -> Option<&dyn RelativeComponent> {
        None
    }

    /// Access the coroutine this component drives.
    fn as_state_machine(&mut self) -> Option<&mut dyn StateMachineDriver> {
        None
    }

    /// Access the change subscriptions of this component.
    fn as_modifiable(&mut self) -> Option<&mut dyn ModifiableComponent> {
        None
    }

    /// Access the interaction this component performs.
    fn as_interactive(&self) -> Option<&dyn Interactive> {
        None
    }
}

impl dyn Component {
    /// Attempt to downcast this component to a concrete type.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Attempt to mutably downcast this component to a concrete type.
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A component whose value is partially derived from the same component on
/// the parent entity.
pub trait RelativeComponent: Component {
    /// Returns true if this value already incorporates a parent value.
    fn has_parent(&self) -> bool;

    /// Produce a copy of this value that incorporates the parent's value.
    fn with_parent(&self, parent: &dyn Component) -> Box<dyn Component>;
}

/// Messages are one-tick-lived, component-shaped notifications.
pub trait Message: AsAny + Debug + 'static {}

impl dyn Message {
    /// Attempt to downcast this message to a concrete type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns true if this message is of the given type.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Implement the `Component` trait on a type.
///
/// - `component!(T)` compares values with `PartialEq`.
/// - `component!(T, always_notify)` notifies on every replace.
/// - `component!(T, relative)` also requires `T: RelativeComponent`.
#[macro_export]
macro_rules! component {
    ($t:ty) => {
        impl $crate::component::Component for $t {
            fn dyn_eq(&self, other: &dyn $crate::component::Component) -> bool {
                other.downcast_ref::<$t>().map_or(false, |o| o == self)
            }
        }
    };
    ($t:ty, always_notify) => {
        impl $crate::component::Component for $t {
            fn dyn_eq(&self, _other: &dyn $crate::component::Component) -> bool {
                false
            }

            fn always_notify(&self) -> bool {
                true
            }
        }
    };
    ($t:ty, relative) => {
        impl $crate::component::Component for $t {
            fn is_relative() -> bool {
                true
            }

            fn dyn_eq(&self, other: &dyn $crate::component::Component) -> bool {
                other.downcast_ref::<$t>().map_or(false, |o| o == self)
            }

            fn as_relative(&self) -> Option<&dyn $crate::component::RelativeComponent> {
                Some(self)
            }
        }
    };
}

/// Implement the `Message` trait on a type.
#[macro_export]
macro_rules! message {
    ($t:ty) => {
        impl $crate::component::Message for $t {}
    };
}
