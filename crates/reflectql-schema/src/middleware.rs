//! Field middleware.
//!
//! Middleware runs between argument validation and handler invocation,
//! strictly sequentially: class-level middleware first, then
//! field-level middleware, each in registration order. A middleware
//! signals the chain through its [`MiddlewareNext`] continuation:
//! `proceed` hands control to the next middleware, `abort` fails the
//! field with the given error and the handler is never invoked. A
//! middleware that never signals leaves the field unresolved; timeout
//! policy belongs to the transport layer, not here.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::FieldError;

enum Signal {
    Proceed,
    Abort(String),
}

/// Continuation handed to each middleware.
///
/// The first signal wins; later calls on the same continuation are
/// ignored.
#[derive(Clone)]
pub struct MiddlewareNext {
    signal: Arc<Mutex<Option<Signal>>>,
}

impl MiddlewareNext {
    fn fresh() -> Self {
        Self {
            signal: Arc::new(Mutex::new(None)),
        }
    }

    /// Continues the chain.
    pub fn proceed(&self) {
        let mut signal = self.signal.lock().expect("middleware signal poisoned");
        if signal.is_none() {
            *signal = Some(Signal::Proceed);
        }
    }

    /// Aborts the chain; the field fails with this error.
    pub fn abort(&self, error: impl Into<String>) {
        let mut signal = self.signal.lock().expect("middleware signal poisoned");
        if signal.is_none() {
            *signal = Some(Signal::Abort(error.into()));
        }
    }

    fn take(&self) -> Option<Signal> {
        self.signal.lock().expect("middleware signal poisoned").take()
    }
}

/// A field middleware.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs the middleware. Call `next.proceed()` to continue the
    /// chain or `next.abort(..)` to fail the field.
    async fn execute(&self, context: &ExecutionContext, next: MiddlewareNext);
}

/// Shared handle to a middleware.
pub type DynMiddleware = Arc<dyn Middleware>;

/// Adapter for synchronous closure middleware.
pub struct FnMiddleware<F>(pub F);

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&ExecutionContext, MiddlewareNext) + Send + Sync,
{
    async fn execute(&self, context: &ExecutionContext, next: MiddlewareNext) {
        (self.0)(context, next);
    }
}

/// Wraps a synchronous closure into a shared middleware.
pub fn middleware_fn<F>(f: F) -> DynMiddleware
where
    F: Fn(&ExecutionContext, MiddlewareNext) + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Runs a middleware chain to completion, strictly in order.
pub(crate) async fn run_chain(
    chain: &[DynMiddleware],
    context: &ExecutionContext,
) -> Result<(), FieldError> {
    for middleware in chain {
        let next = MiddlewareNext::fresh();
        middleware.execute(context, next.clone()).await;
        match next.take() {
            Some(Signal::Proceed) => {}
            Some(Signal::Abort(message)) => return Err(FieldError::Middleware(message)),
            // Never signalled: the field stays unresolved.
            None => futures_util::future::pending::<()>().await,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::{ExecutionContext, SimpleInjector};

    fn test_context() -> ExecutionContext {
        ExecutionContext::builder()
            .with_injector(Arc::new(SimpleInjector::new()))
            .with_request_id("req-test")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn chain_runs_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let order = order.clone();
            middleware_fn(move |_, next| {
                order.lock().unwrap().push("first");
                next.proceed();
            })
        };
        let second = {
            let order = order.clone();
            middleware_fn(move |_, next| {
                order.lock().unwrap().push("second");
                next.proceed();
            })
        };

        run_chain(&[first, second], &test_context()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn abort_stops_the_chain() {
        let reached = Arc::new(AtomicUsize::new(0));

        let aborting = middleware_fn(|_, next| next.abort("not allowed"));
        let later = {
            let reached = reached.clone();
            middleware_fn(move |_, next| {
                reached.fetch_add(1, Ordering::SeqCst);
                next.proceed();
            })
        };

        let err = run_chain(&[aborting, later], &test_context())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not allowed");
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_signal_wins() {
        let next = MiddlewareNext::fresh();
        next.abort("first");
        next.proceed();
        match next.take() {
            Some(Signal::Abort(message)) => assert_eq!(message, "first"),
            _ => panic!("expected the abort to win"),
        }
    }

    #[tokio::test]
    async fn silent_middleware_leaves_the_field_pending() {
        let silent = [middleware_fn(|_, _| {})];
        let context = test_context();
        let mut chain = tokio_test::task::spawn(run_chain(&silent, &context));
        tokio_test::assert_pending!(chain.poll());
        tokio_test::assert_pending!(chain.poll());
    }
}
