use super::log_panic;
use ampcord_protocol::management::instance::SanitizedInstance;
use log::error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Fire-and-forget notification with one payload type.
///
/// Listeners run inline on the invoking task. A panicking listener is logged
/// and does not reach the invoker or the other listeners.
pub struct Event<T: Clone + Send + 'static> {
    name: &'static str,
    listeners: scc::HashMap<u64, Callback<T>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> Event<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: scc::HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_sync_listener<F>(&self, callback: F) -> u64
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.listeners.insert(id, Arc::new(callback));
        id
    }

    fn call(&self, callback: &Callback<T>, payload: T) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(payload))) {
            error!("{} listener failed: {}", self.name, log_panic(panic));
        }
    }

    /// Notifies every listener in registration order.
    pub fn invoke(&self, payload: T) {
        let mut due = vec![];
        self.listeners.scan(|id, callback| due.push((*id, callback.clone())));
        due.sort_by_key(|(id, _)| *id);
        for (_, callback) in due {
            self.call(&callback, payload.clone());
        }
    }
}

/// Declares a named event type carrying one payload.
#[macro_export]
macro_rules! event_decl {
    ($(#[$meta:meta])* $event_name:ident, $payload:ty) => {
        $(#[$meta])*
        pub struct $event_name($crate::utils::event::Event<$payload>);

        impl $event_name {
            pub fn new() -> Self {
                Self($crate::utils::event::Event::new(stringify!($event_name)))
            }
        }

        impl Default for $event_name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $event_name {
            type Target = $crate::utils::event::Event<$payload>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

event_decl!(
    /// An instance showed up in the panel listing.
    InstanceCreated,
    SanitizedInstance
);
event_decl!(
    /// An instance is gone from the panel listing; carries its last record.
    InstanceDeleted,
    SanitizedInstance
);

/// Membership changes announced by the poller.
#[derive(Default)]
pub struct InstanceEvents {
    pub created: InstanceCreated,
    pub deleted: InstanceDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    event_decl!(TestEvent, (i32, String));

    #[tokio::test]
    async fn test_sync_listener() {
        let event = TestEvent::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        event.add_sync_listener(move |(num, data)| {
            assert_eq!(num, 42);
            assert_eq!(data, "World");
            counter_clone.fetch_add(1, Ordering::Relaxed);
        });

        event.invoke((42, "World".to_string()));
        event.invoke((42, "World".to_string()));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let event = TestEvent::new();
        let seen = Arc::new(Mutex::new(vec![]));
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            event.add_sync_listener(move |_| seen.lock().unwrap().push(tag));
        }

        event.invoke((1, String::new()));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_panicking_listener_is_contained() {
        let event = TestEvent::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        event.add_sync_listener(|_| panic!("listener bug"));
        event.add_sync_listener(move |_| {
            counter_clone.fetch_add(1, Ordering::Relaxed);
        });

        event.invoke((1, String::new()));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
