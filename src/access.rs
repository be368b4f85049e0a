//! Collection access predicate.

use crate::extractors::RequestContext;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

type AccessFn = dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, bool> + Send + Sync;

/// Evaluated once per request before any hook or driver call. Defaults to allow.
#[derive(Clone)]
pub struct Access(Arc<AccessFn>);

impl Access {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Access(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    pub fn allow_all() -> Self {
        Access::new(|_| async { true })
    }

    pub fn deny_all() -> Self {
        Access::new(|_| async { false })
    }

    /// Allow only requests carrying `header` with exactly `value`.
    pub fn require_header(header: &'static str, value: impl Into<String>) -> Self {
        let expected: Arc<str> = value.into().into();
        Access::new(move |ctx| {
            let expected = expected.clone();
            async move { ctx.header(header) == Some(&*expected) }
        })
    }

    pub async fn check(&self, ctx: Arc<RequestContext>) -> bool {
        (self.0)(ctx).await
    }
}

impl Default for Access {
    fn default() -> Self {
        Access::allow_all()
    }
}
