use std::sync::Arc;

use tokio::task::AbortHandle;

/// Ownership token for a live stream subscription. Releasing it terminates
/// the underlying task.
pub struct Subscription {
    handle: AbortHandle,
}

impl Subscription {
    pub fn new(handle: AbortHandle) -> Self {
        Self { handle }
    }

    pub fn release(&self) {
        self.handle.abort();
    }
}

/// Registry of active subscriptions, owned by the store for its whole
/// lifetime. Subscriptions stay alive until `release_all`.
#[derive(Clone, Default)]
pub struct Subscriptions {
    inner: Arc<parking_lot::Mutex<Vec<Subscription>>>,
}

impl Subscriptions {
    pub fn register(&self, subscription: Subscription) {
        self.inner.lock().push(subscription);
    }

    pub fn release_all(&self) {
        for subscription in self.inner.lock().drain(..) {
            subscription.release();
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn release_all_aborts_registered_tasks() {
        let subscriptions = Subscriptions::default();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        subscriptions.register(Subscription::new(task.abort_handle()));

        subscriptions.release_all();

        let result = task.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
