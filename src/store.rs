use std::fmt::Debug;

use tokio::sync::broadcast;

use crate::dispatcher::Dispatcher;
use crate::engine::StoreEngine;
use crate::middleware::Middleware;
use crate::reducer::Reducer;
use crate::subscription::{Subscription, Subscriptions};

/// The single source of truth. State changes only through `dispatch`, which
/// runs the action through the composed middleware chain and the reducer on
/// one serial run loop. Requires an ambient tokio runtime.
pub struct Store<State, Action>
where
    State: Clone + Send + 'static,
    Action: Debug + Send + 'static,
{
    engine: StoreEngine<State, Action>,
    subscriptions: Subscriptions,
}

impl<State, Action> Store<State, Action>
where
    State: Clone + Send + 'static,
    Action: Debug + Send + 'static,
{
    /// Composes `middleware` right-to-left around the terminal reducer step:
    /// the first middleware in the list sees every action first.
    pub fn new(
        reducer: impl Reducer<State, Action> + 'static,
        initial_state: State,
        middleware: Vec<Box<dyn Middleware<State, Action>>>,
    ) -> Self {
        let subscriptions = Subscriptions::default();
        let engine = StoreEngine::start(reducer, initial_state, middleware, &subscriptions);
        Self {
            engine,
            subscriptions,
        }
    }

    /// The sole mutation entry point. Posts the action onto the serial run
    /// loop; observe the outcome via [`Store::state`] or
    /// [`Store::observe_changes`].
    pub fn dispatch(&self, action: Action) {
        self.engine.dispatcher().dispatch(action);
    }

    /// Snapshot of the most recently committed state.
    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// Notification channel for the UI-binding collaborator: one value per
    /// reduced action, in reduction order, no deduplication.
    pub fn observe_changes(&self) -> broadcast::Receiver<State> {
        self.engine.observe_changes()
    }

    /// Cloneable dispatch handle for callers on other tasks.
    pub fn dispatcher(&self) -> Dispatcher<Action> {
        self.engine.dispatcher().clone()
    }

    /// Retains the handle for the lifetime of the store; released on drop.
    pub fn register_subscription(&self, subscription: Subscription) {
        self.subscriptions.register(subscription);
    }
}

impl<State, Action> Drop for Store<State, Action>
where
    State: Clone + Send + 'static,
    Action: Debug + Send + 'static,
{
    fn drop(&mut self) {
        self.subscriptions.release_all();
    }
}
