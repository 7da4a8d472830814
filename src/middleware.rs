use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::subscription::Subscriptions;

/// One link of the dispatch chain: the `next` continuation handed to each
/// middleware, and the shape every middleware produces.
pub type DispatchFn<Action> = Box<dyn Fn(Action) + Send>;

/// Snapshot accessor for the most recently committed state.
pub type GetState<State> = Arc<dyn Fn() -> State + Send + Sync>;

/// A chain-wrapping interception point around the reducer.
///
/// `dispatch` is the top-level re-entry point: calling it enqueues a brand
/// new, independently serialized pipeline run. Calling `next` instead
/// continues down the chain synchronously within the current run. Every
/// middleware in a store receives the same `dispatch`/`get_state` pair.
/// Handles for any tasks the middleware spawns go into `subscriptions`,
/// which the store retains until teardown.
pub trait Middleware<State, Action>: Send {
    fn apply(
        self: Box<Self>,
        dispatch: Dispatcher<Action>,
        get_state: GetState<State>,
        subscriptions: &Subscriptions,
        next: DispatchFn<Action>,
    ) -> DispatchFn<Action>;
}

/// Folds the middleware list right-to-left around the terminal
/// reducer-application step: the first middleware in the list becomes the
/// outermost wrapper and sees every action first.
pub(crate) fn compose<State, Action>(
    middleware: Vec<Box<dyn Middleware<State, Action>>>,
    dispatch: &Dispatcher<Action>,
    get_state: &GetState<State>,
    subscriptions: &Subscriptions,
    terminal: DispatchFn<Action>,
) -> DispatchFn<Action> {
    middleware
        .into_iter()
        .rev()
        .fold(terminal, |next, middleware| {
            middleware.apply(dispatch.clone(), get_state.clone(), subscriptions, next)
        })
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;

    struct Tape {
        log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    impl Middleware<(), u8> for Tape {
        fn apply(
            self: Box<Self>,
            _dispatch: Dispatcher<u8>,
            _get_state: GetState<()>,
            _subscriptions: &Subscriptions,
            next: DispatchFn<u8>,
        ) -> DispatchFn<u8> {
            let Tape { log, name } = *self;
            Box::new(move |action| {
                log.lock().push(name);
                next(action);
            })
        }
    }

    struct Suppress;

    impl Middleware<(), u8> for Suppress {
        fn apply(
            self: Box<Self>,
            _dispatch: Dispatcher<u8>,
            _get_state: GetState<()>,
            _subscriptions: &Subscriptions,
            _next: DispatchFn<u8>,
        ) -> DispatchFn<u8> {
            Box::new(|_action| {})
        }
    }

    fn harness() -> (Dispatcher<u8>, GetState<()>, Subscriptions) {
        let (sender, _receiver) = mpsc::unbounded_channel();
        (
            Dispatcher::new(sender),
            Arc::new(|| ()),
            Subscriptions::default(),
        )
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (dispatch, get_state, subscriptions) = harness();

        let terminal: DispatchFn<u8> = {
            let log = log.clone();
            Box::new(move |_action| log.lock().push("reduce"))
        };
        let chain = compose(
            vec![
                Box::new(Tape {
                    log: log.clone(),
                    name: "outer",
                }) as Box<dyn Middleware<(), u8>>,
                Box::new(Tape {
                    log: log.clone(),
                    name: "inner",
                }),
            ],
            &dispatch,
            &get_state,
            &subscriptions,
            terminal,
        );

        chain(0);

        assert_eq!(*log.lock(), vec!["outer", "inner", "reduce"]);
    }

    #[tokio::test]
    async fn suppressing_middleware_stops_the_chain() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (dispatch, get_state, subscriptions) = harness();

        let terminal: DispatchFn<u8> = {
            let log = log.clone();
            Box::new(move |_action| log.lock().push("reduce"))
        };
        let chain = compose(
            vec![
                Box::new(Tape {
                    log: log.clone(),
                    name: "outer",
                }) as Box<dyn Middleware<(), u8>>,
                Box::new(Suppress),
            ],
            &dispatch,
            &get_state,
            &subscriptions,
            terminal,
        );

        chain(0);

        assert_eq!(*log.lock(), vec!["outer"]);
    }
}
