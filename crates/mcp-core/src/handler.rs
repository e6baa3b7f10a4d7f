//! Handler registration traits (§4.2: `register_request_handler`,
//! `register_notification_handler`).

use futures::future::BoxFuture;
use lucentmcp_protocol::{Result, Value};

use crate::context::RequestContext;

/// A handler for an inbound request. Returns a typed result or a typed
/// [`lucentmcp_protocol::Error`] (propagated to the wire verbatim); panics
/// inside the future are caught by the dispatcher and folded into
/// `internalError`.
pub trait RequestHandler: Send + Sync + 'static {
    fn call(&self, params: Option<Value>, cx: RequestContext) -> BoxFuture<'static, Result<Value>>;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(Option<Value>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, params: Option<Value>, cx: RequestContext) -> BoxFuture<'static, Result<Value>> {
        Box::pin(self(params, cx))
    }
}

/// A handler for an inbound notification. Multiple handlers may be
/// registered for the same method; they run in registration order (§5).
/// Exceptions are logged, never propagated (§4.2).
pub trait NotificationHandler: Send + Sync + 'static {
    fn call(&self, params: Option<Value>) -> BoxFuture<'static, ()>;
}

impl<F, Fut> NotificationHandler for F
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    fn call(&self, params: Option<Value>) -> BoxFuture<'static, ()> {
        Box::pin(self(params))
    }
}
