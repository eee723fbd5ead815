//! Components whose contents can change without going through the entity.
//!
//! A modifiable component hands out change subscriptions. The world
//! subscribes when such a component is stored on an entity and turns every
//! change into an ordinary `Modified` notification on the next sweep. The
//! callbacks may fire on any thread.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::component::Component;

/// A token identifying a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionToken(u64);

/// A callback invoked whenever a modifiable component changes.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Implemented by components which can change out-of-band.
pub trait ModifiableComponent {
    /// Register a callback to be invoked on every change.
    fn on_changed(&mut self, callback: ChangeCallback) -> SubscriptionToken;

    /// Remove a previously registered callback.
    fn remove_subscription(&mut self, token: SubscriptionToken);
}

#[derive(Default)]
struct NotifierInner {
    next_token: u64,
    callbacks: Vec<(SubscriptionToken, ChangeCallback)>,
}

/// A list of change callbacks.
///
/// Clones share the same list.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<Mutex<NotifierInner>>,
}

impl Notifier {
    /// Create an empty notifier.
    pub fn new() -> Notifier {
        Notifier::default()
    }

    /// Register a callback.
    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionToken {
        let mut inner = self.inner.lock();
        let token = SubscriptionToken(inner.next_token);
        inner.next_token += 1;
        inner.callbacks.push((token, callback));
        token
    }

    /// Remove a callback, returning true if it was registered.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(t, _)| *t != token);
        inner.callbacks.len() != before
    }

    /// Invoke every registered callback in registration order.
    pub fn notify(&self) {
        let inner = self.inner.lock();
        for (_, callback) in inner.callbacks.iter() {
            callback();
        }
    }

    /// Return the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    /// Returns true if there are no registered callbacks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscriptions", &self.len())
            .finish()
    }
}

/// A component holding a value which can be modified from any thread.
///
/// Every modification made through a `SharedHandle` raises a `Modified`
/// notification for the owning entity on the next sweep.
pub struct Shared<T> {
    value: Arc<Mutex<T>>,
    notifier: Notifier,
}

impl<T: Send + 'static> Shared<T> {
    /// Create a new shared value.
    pub fn new(value: T) -> Shared<T> {
        Shared {
            value: Arc::new(Mutex::new(value)),
            notifier: Notifier::new(),
        }
    }

    /// Get a handle which can modify this value from elsewhere.
    pub fn handle(&self) -> SharedHandle<T> {
        SharedHandle {
            value: self.value.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Lock the value for reading.
    ///
    /// Writes through this guard are not notified.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock()
    }

    /// Return a copy of the current value.
    pub fn get(&self) -> T where T: Clone {
        self.value.lock().clone()
    }
}

impl<T: Debug> Debug for Shared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared")
            .field(&*self.value.lock())
            .finish()
    }
}

impl<T: Debug + Send + 'static> Component for Shared<T> {
    fn dyn_eq(&self, other: &dyn Component) -> bool {
        other.downcast_ref::<Shared<T>>()
            .map_or(false, |o| Arc::ptr_eq(&o.value, &self.value))
    }

    fn as_modifiable(&mut self) -> Option<&mut dyn ModifiableComponent> {
        Some(self)
    }
}

impl<T> ModifiableComponent for Shared<T> {
    fn on_changed(&mut self, callback: ChangeCallback) -> SubscriptionToken {
        self.notifier.subscribe(callback)
    }

    fn remove_subscription(&mut self, token: SubscriptionToken) {
        self.notifier.unsubscribe(token);
    }
}

/// A handle onto a `Shared` value.
pub struct SharedHandle<T> {
    value: Arc<Mutex<T>>,
    notifier: Notifier,
}

impl<T> SharedHandle<T> {
    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.value.lock() = value;
        self.notifier.notify();
    }

    /// Modify the value in place and notify subscribers.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut *self.value.lock());
        self.notifier.notify();
        result
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        SharedHandle {
            value: self.value.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_notifier_tokens() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let a = notifier.subscribe(Box::new(move || { c.fetch_add(1, Ordering::SeqCst); }));
        let c = count.clone();
        let b = notifier.subscribe(Box::new(move || { c.fetch_add(10, Ordering::SeqCst); }));
        assert_ne!(a, b);

        notifier.notify();
        assert_eq!(count.load(Ordering::SeqCst), 11);

        assert!(notifier.unsubscribe(b));
        assert!(!notifier.unsubscribe(b));
        notifier.notify();
        assert_eq!(count.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn test_shared_modify_from_thread() {
        let mut shared = Shared::new(1u32);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        shared.on_changed(Box::new(move || { c.fetch_add(1, Ordering::SeqCst); }));

        let handle = shared.handle();
        thread::spawn(move || handle.modify(|v| *v += 4)).join().unwrap();

        assert_eq!(shared.get(), 5);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_equality_is_identity() {
        let a = Shared::new(3);
        let b = Shared::new(3);
        let again = Shared { value: a.value.clone(), notifier: a.notifier.clone() };

        assert!(!a.dyn_eq(&b));
        assert!(a.dyn_eq(&again));
    }
}
