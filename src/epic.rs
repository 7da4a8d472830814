use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// The stream of actions an epic emits for re-dispatch.
pub type EpicOutput<Action> = BoxStream<'static, Action>;

/// Continuously-updated view of the latest committed state, for reads that
/// are not tied to a particular action. The authoritative per-action
/// snapshot is the one paired with each delivered action in
/// [`ActionStream`].
pub type StateSnapshots<State> = watch::Receiver<State>;

/// A long-lived transformation of the observed action timeline into new
/// actions. Epics see every action strictly after it has been reduced, and
/// their output is re-dispatched through the whole pipeline, so one epic's
/// emission can trigger another.
pub trait Epic<State, Action>: Send {
    fn run(
        &self,
        actions: ActionStream<Action, State>,
        state: StateSnapshots<State>,
    ) -> EpicOutput<Action>;
}

impl<State, Action, F> Epic<State, Action> for F
where
    F: Fn(ActionStream<Action, State>, StateSnapshots<State>) -> EpicOutput<Action> + Send,
{
    fn run(
        &self,
        actions: ActionStream<Action, State>,
        state: StateSnapshots<State>,
    ) -> EpicOutput<Action> {
        self(actions, state)
    }
}

/// Live multicast stream of post-reduction actions. Each action arrives
/// paired with the state its own reduction committed, so a reaction to
/// action A reads exactly the post-A snapshot even when later dispatches
/// have already advanced the store. Never completes during normal
/// operation; it ends only when the owning engine is torn down.
pub struct ActionStream<Action, State> {
    stream: BroadcastStream<(Action, State)>,
    source: broadcast::Sender<(Action, State)>,
}

impl<Action, State> ActionStream<Action, State>
where
    Action: Clone + Send + 'static,
    State: Clone + Send + 'static,
{
    pub(crate) fn new(source: broadcast::Sender<(Action, State)>) -> Self {
        Self {
            stream: BroadcastStream::new(source.subscribe()),
            source,
        }
    }

    /// Opens an independent subscription starting at the current tail.
    pub fn fork(&self) -> Self {
        Self::new(self.source.clone())
    }
}

impl<Action, State> Stream for ActionStream<Action, State>
where
    Action: Clone + Send + 'static,
    State: Clone + Send + 'static,
{
    type Item = (Action, State);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(delivery))) => return Poll::Ready(Some(delivery)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    log::warn!("action stream lagged, skipped {} actions", skipped);
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Merges several epics into one root. Each epic gets its own fork of the
/// action stream; their outputs interleave by emission time, so no epic's
/// emission blocks another's.
pub fn combine<State, Action>(
    epics: Vec<Box<dyn Epic<State, Action>>>,
) -> impl Epic<State, Action>
where
    State: Clone + Send + Sync + 'static,
    Action: Clone + Send + 'static,
{
    move |actions: ActionStream<Action, State>,
          state: StateSnapshots<State>|
          -> EpicOutput<Action> {
        let outputs: Vec<_> = epics
            .iter()
            .map(|epic| epic.run(actions.fork(), state.clone()))
            .collect();
        futures::stream::select_all(outputs).boxed()
    }
}
