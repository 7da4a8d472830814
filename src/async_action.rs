use crate::dispatcher::Dispatcher;
use crate::middleware::{DispatchFn, GetState, Middleware};
use crate::subscription::Subscriptions;

/// An executable side effect attached to an action. Receives the state
/// snapshot current at interception time and a dispatcher for delivering
/// follow-up actions, possibly later and from other tasks.
pub type SideEffect<State, Action> =
    Box<dyn FnOnce(State, Dispatcher<Action>) -> anyhow::Result<()> + Send>;

/// Capability contract consumed by [`AsyncActionMiddleware`]: an action may
/// optionally expose a side effect. The default carries none.
pub trait AsyncAction<State>: Sized {
    fn side_effect(&self) -> Option<SideEffect<State, Self>> {
        None
    }
}

/// Pure interception point: runs an action's side effect (when present)
/// before forwarding, and never suppresses the action itself. A failing
/// side effect is logged and isolated from the chain; the recommended
/// recovery path is dispatching an error-carrying follow-up action.
pub struct AsyncActionMiddleware;

impl<State, Action> Middleware<State, Action> for AsyncActionMiddleware
where
    State: Clone + Send + 'static,
    Action: AsyncAction<State> + std::fmt::Debug + Send + 'static,
{
    fn apply(
        self: Box<Self>,
        dispatch: Dispatcher<Action>,
        get_state: GetState<State>,
        _subscriptions: &Subscriptions,
        next: DispatchFn<Action>,
    ) -> DispatchFn<Action> {
        Box::new(move |action: Action| {
            if let Some(effect) = action.side_effect() {
                if let Err(err) = effect((get_state)(), dispatch.clone()) {
                    log::error!("side effect of {:?} failed: {:#}", action, err);
                }
            }
            next(action);
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::store::Store;

    #[derive(Default, Clone, Debug, PartialEq)]
    struct FetchState {
        loaded: bool,
    }

    #[derive(Clone, Debug)]
    enum FetchAction {
        Fetch,
        Loaded,
    }

    impl AsyncAction<FetchState> for FetchAction {
        fn side_effect(&self) -> Option<SideEffect<FetchState, Self>> {
            match self {
                FetchAction::Fetch => Some(Box::new(|state, dispatch| {
                    anyhow::ensure!(!state.loaded, "already loaded");
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        dispatch.dispatch(FetchAction::Loaded);
                    });
                    Ok(())
                })),
                FetchAction::Loaded => None,
            }
        }
    }

    fn reducer(state: &FetchState, action: &FetchAction) -> FetchState {
        let mut state = state.clone();
        if let FetchAction::Loaded = action {
            state.loaded = true;
        }
        state
    }

    fn store() -> Store<FetchState, FetchAction> {
        Store::new(
            reducer,
            FetchState::default(),
            vec![Box::new(AsyncActionMiddleware) as Box<dyn Middleware<_, _>>],
        )
    }

    #[tokio::test]
    async fn side_effect_delivers_follow_up_action() {
        let store = store();
        let mut changes = store.observe_changes();

        store.dispatch(FetchAction::Fetch);

        let state = timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!state.loaded, "Fetch itself must not mutate state");

        let state = timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(state.loaded);
    }

    #[tokio::test]
    async fn failing_side_effect_still_forwards_the_action() {
        let store = store();
        let mut changes = store.observe_changes();

        store.dispatch(FetchAction::Loaded);
        let state = timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(state.loaded);

        // The effect errors on an already-loaded state, but the action is
        // reduced regardless and no second Loaded ever arrives.
        store.dispatch(FetchAction::Fetch);
        let state = timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(state.loaded);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(changes.try_recv().is_err());
    }
}
