use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Per-invocation state shared by reference with every crawl unit: the
/// cancellation token, an optional deadline, and the invocation's trace span.
///
/// Cancellation is cooperative. Units are expected to race their I/O against
/// [`InvocationContext::cancelled`]; nothing terminates a unit that ignores it.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    invocation_id: Uuid,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    span: Span,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            deadline: None,
            span: Span::none(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the invocation is cancelled or its deadline passes.
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
