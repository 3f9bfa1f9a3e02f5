//! Contention harness: drives many concurrent operations against one stock
//! id and tallies the outcomes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stockkeeper_core::error::{DomainError, ErrorKind};
use tokio::sync::Barrier;
use tokio::task::JoinSet;

/// Outcome tally of a contention run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentionReport {
    /// Operations that returned `Ok`.
    pub succeeded: usize,
    /// Failed operations, counted by error kind.
    pub failures: BTreeMap<ErrorKind, usize>,
}

impl ContentionReport {
    /// Total number of failed operations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    /// Number of failures of one kind.
    #[must_use]
    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    fn record<T>(&mut self, outcome: &Result<T, DomainError>) {
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(e) => *self.failures.entry(e.kind()).or_default() += 1,
        }
    }
}

/// Runs `requests` invocations of `op` spread over `workers` tasks.
///
/// Workers start together behind a barrier and pull request indices from a
/// shared counter until all `requests` have been issued. Each invocation
/// receives its index in `0..requests`.
///
/// # Panics
///
/// Re-raises the panic of any worker that panicked.
pub async fn run_contention<F, Fut, T>(requests: usize, workers: usize, op: F) -> ContentionReport
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    T: Send + 'static,
{
    let workers = workers.max(1);
    let op = Arc::new(op);
    let next = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(workers));

    let mut tasks = JoinSet::new();
    for _ in 0..workers {
        let op = Arc::clone(&op);
        let next = Arc::clone(&next);
        let barrier = Arc::clone(&barrier);
        tasks.spawn(async move {
            let mut report = ContentionReport::default();
            barrier.wait().await;
            loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                if index >= requests {
                    break;
                }
                report.record(&op(index).await);
            }
            report
        });
    }

    let mut total = ContentionReport::default();
    while let Some(joined) = tasks.join_next().await {
        let report = match joined {
            Ok(report) => report,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => panic!("contention worker was cancelled: {e}"),
        };
        total.succeeded += report.succeeded;
        for (kind, count) in report.failures {
            *total.failures.entry(kind).or_default() += count;
        }
    }
    total
}
