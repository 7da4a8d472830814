use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::middleware::{compose, DispatchFn, GetState, Middleware};
use crate::reducer::Reducer;
use crate::subscription::{Subscription, Subscriptions};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Owns the live state cell and the composed dispatch chain, driven by a
/// single run-loop task.
pub(crate) struct StoreEngine<State, Action> {
    state: Arc<Mutex<State>>,
    dispatcher: Dispatcher<Action>,
    changes: broadcast::Sender<State>,
}

impl<State, Action> StoreEngine<State, Action>
where
    State: Clone + Send + 'static,
    Action: Debug + Send + 'static,
{
    pub(crate) fn start(
        reducer: impl Reducer<State, Action> + 'static,
        initial_state: State,
        middleware: Vec<Box<dyn Middleware<State, Action>>>,
        subscriptions: &Subscriptions,
    ) -> Self {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Action>();
        let dispatcher = Dispatcher::new(event_tx);
        let state = Arc::new(Mutex::new(initial_state));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let get_state: GetState<State> = {
            let state = state.clone();
            Arc::new(move || state.lock().clone())
        };

        // Terminal step of every chain: reducer application, wholesale state
        // replacement, then publication to the change channel.
        let terminal: DispatchFn<Action> = {
            let state = state.clone();
            let changes = changes.clone();
            Box::new(move |action: Action| {
                let next_state = {
                    let mut current = state.lock();
                    let next_state = reducer.reduce(&current, &action);
                    *current = next_state.clone();
                    next_state
                };
                // No receivers simply means no UI collaborator is attached.
                let _ = changes.send(next_state);
            })
        };

        let chain = compose(middleware, &dispatcher, &get_state, subscriptions, terminal);

        // The single serialization point: every dispatch path funnels through
        // this task, so reduction and state publication for one action always
        // complete before the next action enters the chain.
        let run_loop = tokio::spawn(async move {
            while let Some(action) = event_rx.recv().await {
                log::debug!("dispatching {:?}", action);
                chain(action);
            }
        });
        subscriptions.register(Subscription::new(run_loop.abort_handle()));

        Self {
            state,
            dispatcher,
            changes,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state.lock().clone()
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher<Action> {
        &self.dispatcher
    }

    pub(crate) fn observe_changes(&self) -> broadcast::Receiver<State> {
        self.changes.subscribe()
    }
}
