//! Root trace span bounding one invocation.
//!
//! [`TraceScope::begin`] opens an `invocation` span and threads it into the
//! [`InvocationContext`] so every unit's work is attributed to it. The scope
//! must be closed with [`TraceScope::close`]; if it is dropped first (early
//! return, panic unwinding) it closes itself with outcome `aborted`.

use std::fmt;
use std::time::Instant;

use tracing::{field, Span};

use crate::context::InvocationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    Ok,
    Error,
    Aborted,
}

impl TraceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TraceScope {
    span: Span,
    started: Instant,
    closed: bool,
}

impl TraceScope {
    /// Open the root span and return the context that carries it.
    pub fn begin(ctx: InvocationContext, name: &str) -> (InvocationContext, TraceScope) {
        let span = tracing::info_span!(
            "invocation",
            name = %name,
            invocation_id = %ctx.invocation_id(),
            targets = field::Empty,
            outcome = field::Empty,
        );
        span.in_scope(|| tracing::info!("invocation started"));
        let scope = TraceScope {
            span: span.clone(),
            started: Instant::now(),
            closed: false,
        };
        (ctx.with_span(span), scope)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_targets(&self, n: usize) {
        self.span.record("targets", n);
    }

    /// Close the span with the invocation's result.
    pub fn close<T, E: fmt::Display>(mut self, result: &Result<T, E>) -> TraceOutcome {
        let outcome = match result {
            Ok(_) => TraceOutcome::Ok,
            Err(_) => TraceOutcome::Error,
        };
        let error = result.as_ref().err().map(|e| e.to_string());
        self.finish(outcome, error.as_deref());
        outcome
    }

    fn finish(&mut self, outcome: TraceOutcome, error: Option<&str>) {
        self.closed = true;
        self.span.record("outcome", outcome.as_str());
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let _enter = self.span.enter();
        match (outcome, error) {
            (TraceOutcome::Ok, _) => {
                tracing::info!(outcome = %outcome, elapsed_ms, "invocation finished")
            }
            (TraceOutcome::Error, err) => {
                tracing::error!(outcome = %outcome, elapsed_ms, error = err.unwrap_or(""), "invocation failed")
            }
            (TraceOutcome::Aborted, _) => {
                tracing::warn!(outcome = %outcome, elapsed_ms, "invocation aborted before close")
            }
        }
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if !self.closed {
            self.finish(TraceOutcome::Aborted, None);
        }
    }
}
