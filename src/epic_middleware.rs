use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::watch;

use crate::dispatcher::Dispatcher;
use crate::epic::{ActionStream, Epic};
use crate::middleware::{DispatchFn, GetState, Middleware};
use crate::subscription::{Subscription, Subscriptions};

/// A subscriber slower than this backlog starts skipping actions (logged).
const ACTION_CHANNEL_CAPACITY: usize = 256;

type BoxEpic<State, Action> = Box<dyn Epic<State, Action>>;

/// The epic engine. Owns the multicast action-event channel and the
/// latest-state-value channel, and bridges them into long-lived epic
/// subscriptions whose emitted actions re-enter the pipeline from the top.
///
/// Per action, the chain step runs `next` first (the reducer commits), then
/// broadcasts the action paired with the state that reduction committed, so
/// an epic reacting to action A always observes the post-A state even when
/// later dispatches have already advanced the store.
pub struct EpicMiddleware<State, Action> {
    engine: EpicEngine<State, Action>,
}

/// Handle for submitting epics to a running engine; survives the middleware
/// being moved into the store. Once the middleware is installed, `run`
/// subscribes the epic before returning.
pub struct EpicRunner<State, Action> {
    engine: EpicEngine<State, Action>,
}

impl<State, Action> Clone for EpicRunner<State, Action> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<State, Action> EpicRunner<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    pub fn run(&self, epic: impl Epic<State, Action> + 'static) {
        self.engine.run(Box::new(epic));
    }
}

struct EpicEngine<State, Action> {
    inner: Arc<Mutex<EngineState<State, Action>>>,
}

impl<State, Action> Clone for EpicEngine<State, Action> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

enum EngineState<State, Action> {
    /// Epics submitted before installation, subscribed when the middleware
    /// is applied.
    Pending(Vec<BoxEpic<State, Action>>),
    Active(ActiveEngine<State, Action>),
}

struct ActiveEngine<State, Action> {
    action_tx: broadcast::Sender<(Action, State)>,
    state_rx: watch::Receiver<State>,
    dispatch: Dispatcher<Action>,
    subscriptions: Subscriptions,
}

impl<State, Action> EpicEngine<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineState::Pending(Vec::new()))),
        }
    }

    fn run(&self, epic: BoxEpic<State, Action>) {
        let mut inner = self.inner.lock();
        match &mut *inner {
            EngineState::Pending(queued) => queued.push(epic),
            EngineState::Active(engine) => {
                if engine.dispatch.is_closed() {
                    log::warn!("epic submitted after store teardown");
                    return;
                }
                subscribe(epic, engine);
            }
        }
    }

    fn activate(&self, engine: ActiveEngine<State, Action>) {
        let mut inner = self.inner.lock();
        if let EngineState::Pending(queued) = &mut *inner {
            for epic in queued.drain(..) {
                subscribe(epic, &engine);
            }
        }
        *inner = EngineState::Active(engine);
    }
}

impl<State, Action> EpicMiddleware<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    /// Dynamic mode: epics are submitted at any time through a runner.
    pub fn new() -> Self {
        Self {
            engine: EpicEngine::new(),
        }
    }

    /// Static mode: the root epic activates exactly once, as soon as the
    /// middleware is installed into a store.
    pub fn with_root(epic: impl Epic<State, Action> + 'static) -> Self {
        let middleware = Self::new();
        middleware.run(epic);
        middleware
    }

    pub fn run(&self, epic: impl Epic<State, Action> + 'static) {
        self.engine.run(Box::new(epic));
    }

    pub fn runner(&self) -> EpicRunner<State, Action> {
        EpicRunner {
            engine: self.engine.clone(),
        }
    }
}

impl<State, Action> Default for EpicMiddleware<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<State, Action> Middleware<State, Action> for EpicMiddleware<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    fn apply(
        self: Box<Self>,
        dispatch: Dispatcher<Action>,
        get_state: GetState<State>,
        subscriptions: &Subscriptions,
        next: DispatchFn<Action>,
    ) -> DispatchFn<Action> {
        let (action_tx, _) = broadcast::channel(ACTION_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel((get_state)());

        // Epics queued before installation (the static root) subscribe here,
        // synchronously, so they observe every action from the first
        // dispatch onwards.
        self.engine.activate(ActiveEngine {
            action_tx: action_tx.clone(),
            state_rx,
            dispatch,
            subscriptions: subscriptions.clone(),
        });

        Box::new(move |action: Action| {
            // Downstream middleware and the reducer run before any epic can
            // observe the action.
            next(action.clone());
            // The action travels with the state its own reduction committed;
            // a later dispatch advances the watch but never the snapshot an
            // epic reads for this action.
            let snapshot = (get_state)();
            let _ = state_tx.send_replace(snapshot.clone());
            // No subscribers is fine; there is simply nothing observing.
            let _ = action_tx.send((action, snapshot));
        })
    }
}

fn subscribe<State, Action>(epic: BoxEpic<State, Action>, engine: &ActiveEngine<State, Action>)
where
    State: Clone + Send + Sync + 'static,
    Action: Debug + Clone + Send + 'static,
{
    let mut output = epic.run(
        ActionStream::new(engine.action_tx.clone()),
        engine.state_rx.clone(),
    );
    let dispatch = engine.dispatch.clone();
    let forwarder = tokio::spawn(async move {
        let forward = async {
            while let Some(action) = output.next().await {
                dispatch.dispatch(action);
            }
        };
        // A defect in one epic terminates only its own subscription; the
        // shared channels and sibling epics stay alive.
        if let Err(payload) = AssertUnwindSafe(forward).catch_unwind().await {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            log::error!("epic subscription failed: {}", reason);
        }
    });
    engine
        .subscriptions
        .register(Subscription::new(forwarder.abort_handle()));
}
