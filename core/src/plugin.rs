//! Request plugins.

use crate::request::Request;

/// Inspects or rewrites a request before it is dispatched.
///
/// Plugins run in registration order: an agent's plugins when it creates
/// the request, then each `use_plugin` call as it is made.
pub trait Plugin: Send + Sync {
    fn apply(&self, request: Request) -> Request;
}

impl<F> Plugin for F
where
    F: Fn(Request) -> Request + Send + Sync,
{
    fn apply(&self, request: Request) -> Request {
        self(request)
    }
}
