//! Per-request state shared by the interceptors of a single request.

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::Request;
use axum::http::StatusCode;

use super::logging::EntryDraft;

/// Mutable context of one request.
///
/// The outermost interceptor inserts it into the request extensions and
/// every interceptor (and any handler extracting `Extension<RequestScope>`)
/// sees the same instance. It records the final status once known, the
/// private handler errors, and the access entry parked while a panic unwinds.
///
/// # Examples
///
/// ```
/// use axum::Extension;
/// use request_guard::api::middleware::RequestScope;
///
/// async fn handler(Extension(scope): Extension<RequestScope>) -> &'static str {
///     scope.record_error("cache miss, served from origin");
///     "ok"
/// }
/// ```
#[derive(Clone, Default)]
pub struct RequestScope {
    inner: Arc<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    status: AtomicU16,
    errors: Mutex<Vec<String>>,
    deferred: Mutex<Option<EntryDraft>>,
}

impl RequestScope {
    /// Scope attached to `request`, inserting a fresh one if absent.
    pub fn of<B>(request: &mut axum::http::Request<B>) -> Self {
        if let Some(scope) = request.extensions().get::<Self>() {
            return scope.clone();
        }
        let scope = Self::default();
        request.extensions_mut().insert(scope.clone());
        scope
    }

    /// Record the status the response finished with.
    pub fn set_status(&self, status: StatusCode) {
        self.inner.status.store(status.as_u16(), Ordering::SeqCst);
    }

    /// Final status, if one has been recorded.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status_code()).ok()
    }

    /// Final status code, `0` while none has been recorded.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.inner.status.load(Ordering::SeqCst)
    }

    /// Append a private error to the request's error list.
    pub fn record_error(&self, error: impl fmt::Display) {
        self.inner
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }

    /// Recorded errors in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.inner
            .errors
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Recorded errors joined into one string, empty if none.
    #[must_use]
    pub fn joined_errors(&self) -> String {
        join_errors(&self.errors())
    }

    /// Park an access entry that could not be completed during unwinding.
    pub(crate) fn defer(&self, draft: EntryDraft) {
        *self
            .inner
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(draft);
    }

    /// Emit a parked access entry with the status and errors known now.
    pub(crate) fn release_deferred(&self) {
        let draft = self
            .inner
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(draft) = draft {
            draft.emit(self.status_code(), self.joined_errors());
        }
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("status", &self.status_code())
            .field("errors", &self.errors())
            .finish_non_exhaustive()
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let draft = self
            .deferred
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(draft) = draft {
            let errors = self
                .errors
                .get_mut()
                .map(|e| join_errors(e))
                .unwrap_or_default();
            draft.emit(*self.status.get_mut(), errors);
        }
    }
}

fn join_errors(errors: &[String]) -> String {
    errors.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_of_reuses_existing_scope() {
        let mut request = axum::http::Request::new(Body::empty());
        let first = RequestScope::of(&mut request);
        first.record_error("first");

        let second = RequestScope::of(&mut request);
        second.record_error("second");

        assert_eq!(first.joined_errors(), "first; second");
    }

    #[test]
    fn test_status_unset_until_recorded() {
        let scope = RequestScope::default();
        assert_eq!(scope.status_code(), 0);
        assert!(scope.status().is_none());

        scope.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(scope.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_joined_errors_empty() {
        assert_eq!(RequestScope::default().joined_errors(), "");
    }
}
