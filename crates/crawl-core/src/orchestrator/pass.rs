//! One orchestration pass: fan out a unit per target, join them all.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::context::InvocationContext;
use crate::crawl::CrawlUnit;
use crate::error::{CrawlError, Result};
use crate::registry::Registry;

use super::report::{PassReport, UnitOutcome, UnitStatus};

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// `None` launches every unit at once (fan-out = target count).
    /// `Some(n)` gates units behind an `n`-permit semaphore.
    pub max_parallel: Option<usize>,
}

impl OrchestratorOptions {
    pub fn unbounded() -> Self {
        Self { max_parallel: None }
    }

    pub fn bounded(n: usize) -> Self {
        Self {
            max_parallel: Some(n),
        }
    }

    /// `None` means unbounded.
    pub fn with_limit(limit: Option<usize>) -> Self {
        match limit {
            Some(n) => Self::bounded(n),
            None => Self::unbounded(),
        }
    }
}

/// Run `unit` once per target in `registry`, concurrently, and return the
/// registry after every unit has finished.
///
/// Each spawned task takes ownership of exactly one target and hands it back
/// when it completes, so no two units ever share a target and no locking is
/// needed. Target order is preserved. A failing or panicking unit neither
/// cancels its siblings nor releases the barrier early; its result lands in
/// the returned [`PassReport`] instead of the `Err` path.
///
/// The only error is [`CrawlError::Join`]: a task that never handed its
/// target back (runtime shutdown). It is reported only after every other
/// task has been joined.
pub async fn run_all<U: CrawlUnit>(
    ctx: &InvocationContext,
    registry: Registry,
    unit: Arc<U>,
    client: Arc<U::Client>,
    opts: &OrchestratorOptions,
) -> Result<(Registry, PassReport)> {
    let n = registry.len();
    if n == 0 {
        tracing::info!("registry is empty; nothing to crawl");
        return Ok((registry, PassReport::default()));
    }

    let semaphore = opts
        .max_parallel
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
    let shared_ctx = Arc::new(ctx.clone());

    tracing::info!(
        targets = n,
        max_parallel = ?opts.max_parallel,
        "launching crawl units"
    );

    let mut handles = Vec::with_capacity(n);
    for mut target in registry.crawlers {
        let name = target.name.clone();
        let unit = Arc::clone(&unit);
        let client = Arc::clone(&client);
        let ctx = Arc::clone(&shared_ctx);
        let sem = semaphore.clone();
        let span = tracing::info_span!(parent: ctx.span(), "unit", target_name = %name);

        let handle = tokio::spawn(
            async move {
                let _permit = match sem {
                    Some(s) => match s.acquire_owned().await {
                        Ok(p) => Some(p),
                        Err(_) => {
                            let outcome = UnitOutcome {
                                target: target.name.clone(),
                                status: UnitStatus::Failed {
                                    reason: "semaphore closed".into(),
                                },
                                elapsed_ms: 0,
                            };
                            return (target, outcome);
                        }
                    },
                    None => None,
                };

                let started = Instant::now();
                let result = AssertUnwindSafe(unit.run(&ctx, &mut target, &client))
                    .catch_unwind()
                    .await;
                let status = match result {
                    Ok(Ok(())) => UnitStatus::Succeeded,
                    Ok(Err(e)) => UnitStatus::Failed {
                        reason: e.to_string(),
                    },
                    Err(panic) => UnitStatus::Panicked {
                        reason: panic_message(panic.as_ref()),
                    },
                };
                let outcome = UnitOutcome {
                    target: target.name.clone(),
                    status,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
                (target, outcome)
            }
            .instrument(span),
        );
        handles.push((name, handle));
    }

    // Barrier: every handle is awaited before anything is returned.
    let mut crawlers = Vec::with_capacity(n);
    let mut outcomes = Vec::with_capacity(n);
    let mut lost = None;
    for (name, handle) in handles {
        match handle.await {
            Ok((target, outcome)) => {
                match &outcome.status {
                    UnitStatus::Succeeded => {
                        tracing::debug!(target_name = %name, elapsed_ms = outcome.elapsed_ms, "crawl unit finished")
                    }
                    UnitStatus::Failed { reason } => {
                        tracing::warn!(target_name = %name, %reason, "crawl unit failed")
                    }
                    UnitStatus::Panicked { reason } => {
                        tracing::error!(target_name = %name, %reason, "crawl unit panicked")
                    }
                }
                crawlers.push(target);
                outcomes.push(outcome);
            }
            Err(e) => {
                tracing::error!(target_name = %name, error = %e, "crawl unit task lost");
                lost.get_or_insert(CrawlError::Join {
                    target: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(err) = lost {
        return Err(err);
    }

    if ctx.is_done() {
        tracing::warn!("invocation was cancelled; some units may have stopped early");
    }

    let report = PassReport { outcomes };
    tracing::info!(
        targets = n,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "all crawl units finished"
    );
    Ok((Registry::new(crawlers), report))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}
