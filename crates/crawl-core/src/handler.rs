//! Invocation entry point: trace, load, fan out, barrier, persist.

use std::path::Path;
use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::context::InvocationContext;
use crate::crawl::CrawlUnit;
use crate::error::Result;
use crate::orchestrator::{run_all, OrchestratorOptions, PassReport};
use crate::registry::RegistryStore;
use crate::trace::TraceScope;

/// Span name for the root invocation trace.
pub const TRACE_NAME: &str = "crawler";

/// Serves invocations with collaborators injected once at process start.
///
/// The client is built by the caller and handed in as an `Arc`; every
/// invocation and every unit share that one handle.
pub struct Handler<S, U: CrawlUnit> {
    config: Arc<Config>,
    store: S,
    unit: Arc<U>,
    client: Arc<U::Client>,
    options: OrchestratorOptions,
}

impl<S, U> Handler<S, U>
where
    S: RegistryStore,
    U: CrawlUnit,
{
    pub fn new(config: Arc<Config>, store: S, unit: Arc<U>, client: Arc<U::Client>) -> Self {
        let options = OrchestratorOptions::with_limit(config.orchestrator.max_parallel);
        Self {
            config,
            store,
            unit,
            client,
            options,
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.config.registry_path
    }

    pub fn client(&self) -> &Arc<U::Client> {
        &self.client
    }

    /// Fresh context for one invocation, with the configured deadline.
    pub fn new_context(&self) -> InvocationContext {
        let ctx = InvocationContext::new();
        match self.config.invocation_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Serve one invocation. `event` is the trigger's payload; it is logged
    /// and otherwise unused.
    pub async fn handle(&self, event: serde_json::Value) -> Result<PassReport> {
        self.handle_in(self.new_context(), event).await
    }

    /// Like [`Handler::handle`] but with a caller-owned context, so the
    /// caller can cancel the invocation.
    pub async fn handle_in(
        &self,
        ctx: InvocationContext,
        event: serde_json::Value,
    ) -> Result<PassReport> {
        let (ctx, scope) = TraceScope::begin(ctx, TRACE_NAME);
        let span = ctx.span().clone();
        let result = self.invoke(&ctx, &scope, &event).instrument(span).await;
        scope.close(&result);
        result
    }

    async fn invoke(
        &self,
        ctx: &InvocationContext,
        scope: &TraceScope,
        event: &serde_json::Value,
    ) -> Result<PassReport> {
        tracing::debug!(%event, "invocation payload");
        let path = self.registry_path();

        let registry = self.store.load(ctx, path).await?;
        scope.record_targets(registry.len());

        let (registry, report) = run_all(
            ctx,
            registry,
            Arc::clone(&self.unit),
            Arc::clone(&self.client),
            &self.options,
        )
        .await?;

        // Every unit has returned; only now is the registry written back.
        self.store.save(ctx, path, &registry).await?;

        if report.failed() > 0 {
            tracing::warn!(
                failed = report.failed(),
                succeeded = report.succeeded(),
                "pass finished with unit failures"
            );
        }
        Ok(report)
    }
}
