mod async_action;
mod dispatcher;
mod engine;
mod epic;
mod epic_middleware;
mod middleware;
mod reducer;
mod store;
mod subscription;

pub use async_action::{AsyncAction, AsyncActionMiddleware, SideEffect};
pub use dispatcher::Dispatcher;
pub use epic::{combine, ActionStream, Epic, EpicOutput, StateSnapshots};
pub use epic_middleware::{EpicMiddleware, EpicRunner};
pub use middleware::{DispatchFn, GetState, Middleware};
pub use reducer::Reducer;
pub use store::Store;
pub use subscription::{Subscription, Subscriptions};
