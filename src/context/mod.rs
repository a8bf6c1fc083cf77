//! Request-scoped values threaded through every handler call

use crate::jwt::Claims;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Source of the per-request "now". Handlers never read the wall clock.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Cooperative cancellation shared between a request and its owner.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Owning half of a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        CancelSignal { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the signal has been raised. A dropped handle does not
    /// count as cancellation.
    pub async fn cancelled(&self) {
        if let Some(rx) = &self.rx {
            let mut rx = rx.clone();
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

/// Immutable bag of request-scoped values.
///
/// Built once per inbound request by the context layer; derivations such as
/// [`RequestContext::with_claims`] produce new values instead of mutating.
#[derive(Debug, Clone)]
pub struct RequestContext {
    now: DateTime<Utc>,
    trace_id: String,
    claims: Option<Arc<Claims>>,
    deadline: Option<Instant>,
    cancel: CancelSignal,
}

impl RequestContext {
    pub fn new(now: DateTime<Utc>, trace_id: impl Into<String>) -> Self {
        Self {
            now,
            trace_id: trace_id.into(),
            claims: None,
            deadline: None,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_claims(&self, claims: Claims) -> Self {
        Self {
            claims: Some(Arc::new(claims)),
            ..self.clone()
        }
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_cancel_signal(&self, cancel: CancelSignal) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// When this request started.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the request is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "request context layer is not installed",
        ))
    }
}
