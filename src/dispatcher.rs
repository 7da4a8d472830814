use tokio::sync::mpsc;

/// The top-level dispatch entry point. Posts actions onto the store's serial
/// run loop, so dispatching is asynchronous from the caller's perspective;
/// the resulting state is observable through the store's snapshot and change
/// channel. Clones all feed the same run loop.
pub struct Dispatcher<Action> {
    sender: mpsc::UnboundedSender<Action>,
}

impl<Action> Clone for Dispatcher<Action> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<Action> Dispatcher<Action>
where
    Action: std::fmt::Debug + Send + 'static,
{
    pub(crate) fn new(sender: mpsc::UnboundedSender<Action>) -> Self {
        Self { sender }
    }

    pub fn dispatch(&self, action: Action) {
        if let Err(err) = self.sender.send(action) {
            log::warn!("dispatch after store teardown, dropping {:?}", err.0);
        }
    }

    /// True once the store's run loop is gone.
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn dispatch_preserves_caller_order() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(sender);

        dispatcher.dispatch(1);
        dispatcher.clone().dispatch(2);
        dispatcher.dispatch(3);

        assert_eq!(receiver.recv().await, Some(1));
        assert_eq!(receiver.recv().await, Some(2));
        assert_eq!(receiver.recv().await, Some(3));
    }

    #[tokio::test]
    async fn dispatch_after_teardown_does_not_panic() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(sender);
        drop(receiver);

        dispatcher.dispatch(1);
    }
}
