/// Pure state transition: computes the next state from the current state and
/// an action. Total over all actions; unrecognized actions return the state
/// unchanged.
pub trait Reducer<State, Action>: Send + Sync {
    fn reduce(&self, state: &State, action: &Action) -> State;
}

impl<State, Action, F> Reducer<State, Action> for F
where
    F: Fn(&State, &Action) -> State + Send + Sync,
{
    fn reduce(&self, state: &State, action: &Action) -> State {
        self(state, action)
    }
}
