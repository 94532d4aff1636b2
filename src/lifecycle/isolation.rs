//! Panic boundaries for probes and cleanup tasks.
//!
//! # Design Decisions
//! - A panic inside an isolated future becomes an `Err` for the caller
//! - A thread-local depth marks isolated polls so the process panic hook
//!   can tell contained panics from ones that must stop the service

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

thread_local! {
    static ISOLATION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Future returned by [`isolate`].
pub struct Isolated<F> {
    inner: Pin<Box<F>>,
}

/// Run `future` so that a panic while polling it resolves to `Err(payload)`.
pub fn isolate<F: Future>(future: F) -> Isolated<F> {
    Isolated {
        inner: Box::pin(future),
    }
}

impl<F: Future> Future for Isolated<F> {
    type Output = Result<F::Output, PanicPayload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let polled = catch_unwind(AssertUnwindSafe(|| self.inner.as_mut().poll(cx)));
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));

        match polled {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

/// True while the current thread is polling an isolated future.
pub fn is_isolated() -> bool {
    ISOLATION_DEPTH.with(|depth| depth.get() > 0)
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_becomes_error() {
        let result = isolate(async {
            if true {
                panic!("listing index corrupt");
            }
            7
        })
        .await;

        let payload = result.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "listing index corrupt");
        assert!(!is_isolated());
    }

    #[tokio::test]
    async fn output_passes_through() {
        let value = isolate(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn depth_is_visible_while_polling() {
        let inside = isolate(async { is_isolated() }).await.unwrap();
        assert!(inside);
        assert!(!is_isolated());
    }

    #[test]
    fn formatted_payloads_are_read() {
        let payload: PanicPayload = Box::new(format!("code {}", 3));
        assert_eq!(panic_message(payload.as_ref()), "code 3");

        let payload: PanicPayload = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
