//! Future wrapper that contains panics raised while it is polled.
//!
//! [`Boundary`] runs every poll of the wrapped future inside
//! [`std::panic::catch_unwind`]. A panic completes the boundary with a
//! [`Fault`] instead of unwinding into the executor.
//!
//! Stack traces are taken by a process-wide panic hook, installed once by
//! [`install_panic_hook`]. While a boundary is polling on a thread, the hook
//! records the panic location and, if that boundary asked for one, the
//! backtrace into a thread-local instead of printing the default stderr
//! report. A panic that code below the boundary catches by itself is
//! reported through `tracing` once the poll returns. Outside any boundary
//! the previously installed hook runs unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use tracing::warn;

thread_local! {
    // Some(capture_stack) while a boundary is polling on this thread.
    static ACTIVE: Cell<Option<bool>> = const { Cell::new(None) };
    static CAPTURED: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

/// What the hook saw of the latest panic inside a boundary.
struct Captured {
    location: String,
    stack: Option<String>,
}

/// Install the stack-capturing panic hook. Later calls are no-ops.
pub fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| match ACTIVE.with(Cell::get) {
            Some(capture_stack) => {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_default();
                let stack = capture_stack
                    .then(|| format!("panicked at {location}\n{}", Backtrace::force_capture()));
                CAPTURED.with(|c| *c.borrow_mut() = Some(Captured { location, stack }));
            }
            None => previous(info),
        }));
    });
}

/// A panic caught by a [`Boundary`].
pub struct Fault {
    /// Raw panic payload.
    pub payload: Box<dyn Any + Send>,
    /// Backtrace, when the boundary was asked to capture one.
    pub stack: Option<String>,
}

impl std::fmt::Debug for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fault")
            .field("payload", &super::classify::describe(self.payload.as_ref()))
            .field("stack", &self.stack.is_some())
            .finish()
    }
}

/// Marks this thread as inside a boundary until dropped.
struct ActiveGuard {
    previous: Option<bool>,
}

impl ActiveGuard {
    fn enter(capture_stack: bool) -> Self {
        CAPTURED.with(|c| c.borrow_mut().take());
        let previous = ACTIVE.with(|a| a.replace(Some(capture_stack)));
        Self { previous }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|a| a.set(self.previous));
    }
}

/// Run `f`, turning a panic into a [`Fault`].
///
/// Shared by [`Boundary`] and anything else that polls user code on behalf
/// of the recovery interceptor, such as a response body.
pub(crate) fn contain<T>(capture_stack: bool, f: impl FnOnce() -> T) -> Result<T, Fault> {
    let outcome = {
        let _active = ActiveGuard::enter(capture_stack);
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    let captured = CAPTURED.with(|c| c.borrow_mut().take());

    match outcome {
        Ok(value) => {
            if let Some(captured) = captured {
                warn!(location = %captured.location, "Panic caught below the recovery boundary");
            }
            Ok(value)
        }
        Err(payload) => {
            let stack = capture_stack.then(|| {
                // Another hook may have replaced ours; fall back to the catch site.
                captured
                    .and_then(|c| c.stack)
                    .unwrap_or_else(|| Backtrace::force_capture().to_string())
            });
            Err(Fault { payload, stack })
        }
    }
}

/// Future that resolves to `Err(Fault)` if the inner future panics.
///
/// After a fault the inner future is left in place, poisoned, until the
/// boundary is dropped; the owner decides when its destructors run.
pub struct Boundary<F> {
    inner: Pin<Box<F>>,
    capture_stack: bool,
}

impl<F: Future> Boundary<F> {
    /// Guard `inner`, capturing a stack trace on panic if `capture_stack`.
    pub fn new(inner: F, capture_stack: bool) -> Self {
        install_panic_hook();
        Self {
            inner: Box::pin(inner),
            capture_stack,
        }
    }
}

impl<F: Future> Future for Boundary<F> {
    type Output = Result<F::Output, Fault>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let capture_stack = self.capture_stack;
        let inner = self.inner.as_mut();

        match contain(capture_stack, || inner.poll(cx)) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(fault) => Poll::Ready(Err(fault)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_completion() {
        let outcome = Boundary::new(async { 7 }, true).await;
        assert!(matches!(outcome, Ok(7)));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let outcome = Boundary::new(async { panic!("boom") }, false).await;
        let Err(fault) = outcome else {
            panic!("expected a fault");
        };
        assert_eq!(fault.payload.downcast_ref::<&str>(), Some(&"boom"));
        assert!(fault.stack.is_none());
    }

    #[tokio::test]
    async fn test_stack_captured_with_location() {
        let outcome: Result<(), Fault> = Boundary::new(async { panic!("with stack") }, true).await;
        let Err(fault) = outcome else {
            panic!("expected a fault");
        };
        let stack = fault.stack.unwrap_or_default();
        assert!(stack.starts_with("panicked at "));
        assert!(stack.contains("boundary.rs"));
    }

    #[tokio::test]
    async fn test_panic_after_await() {
        let outcome = Boundary::new(
            async {
                tokio::task::yield_now().await;
                panic!("late")
            },
            false,
        )
        .await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_panic_caught_downstream_leaves_no_stack() {
        let outcome = Boundary::new(
            async {
                let inner = std::panic::catch_unwind(|| panic!("handled below"));
                inner.is_err()
            },
            true,
        )
        .await;
        assert!(matches!(outcome, Ok(true)));
        assert!(CAPTURED.with(|c| c.borrow().is_none()));

        let outcome: Result<(), Fault> = Boundary::new(async { panic!("second") }, true).await;
        let Err(fault) = outcome else {
            panic!("expected a fault");
        };
        assert_eq!(fault.payload.downcast_ref::<&str>(), Some(&"second"));
        assert!(fault.stack.is_some_and(|s| s.starts_with("panicked at ")));
    }

    #[test]
    fn test_entering_clears_stale_capture() {
        CAPTURED.with(|c| {
            *c.borrow_mut() = Some(Captured {
                location: "stale.rs:1:1".to_string(),
                stack: Some("stale".to_string()),
            });
        });
        let _active = ActiveGuard::enter(true);
        assert!(CAPTURED.with(|c| c.borrow().is_none()));
    }

    #[test]
    fn test_active_flag_restored() {
        assert_eq!(ACTIVE.with(Cell::get), None);
        {
            let _outer = ActiveGuard::enter(false);
            {
                let _inner = ActiveGuard::enter(true);
                assert_eq!(ACTIVE.with(Cell::get), Some(true));
            }
            assert_eq!(ACTIVE.with(Cell::get), Some(false));
        }
        assert_eq!(ACTIVE.with(Cell::get), None);
    }
}
