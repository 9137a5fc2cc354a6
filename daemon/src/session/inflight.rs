use super::SessionError;
use futures::future::{BoxFuture, FutureExt, Shared};
use scc::hash_map::Entry;

type PendingLogin<T> = Shared<BoxFuture<'static, Result<T, SessionError>>>;

/// Logins currently running, keyed by session key.
///
/// Every caller asking for a key that is already being logged in awaits the
/// same future instead of starting a second login.
pub struct Inflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pending: scc::HashMap<String, PendingLogin<T>>,
}

impl<T> Inflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: scc::HashMap::new(),
        }
    }

    pub async fn run<F>(&self, key: &str, login: F) -> Result<T, SessionError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, SessionError>>,
    {
        let pending = match self.pending.entry_async(key.to_string()).await {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let fut = login().shared();
                entry.insert_entry(fut.clone());
                fut
            }
        };

        let result = pending.clone().await;
        // settled either way; only drop our own marker, a newer login may own the key now
        self.pending
            .remove_if_async(key, |current| current.ptr_eq(&pending))
            .await;
        result
    }
}

impl<T> Default for Inflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
