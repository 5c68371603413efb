//! Drain driver: re-invoke until the dataset is exhausted

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::engine::InvocationHandler;
use super::payload::{InvocationPayload, RunningTotals};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainStop {
    /// The last invocation reported no more records
    Exhausted,
    /// The invocation ceiling was reached with work remaining
    InvocationLimit,
    /// An invocation returned a failure response
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrainSummary {
    pub invocations: u32,
    /// Sum of per-invocation counts
    pub totals: RunningTotals,
    pub duration: Duration,
    pub stop: DrainStop,
}

#[derive(Debug, Clone)]
pub struct DrainDriver {
    /// Pause between invocations
    pub delay: Duration,
    /// `None` for no limit
    pub max_invocations: Option<u32>,
}

impl Default for DrainDriver {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_invocations: None,
        }
    }
}

impl DrainDriver {
    pub fn new(delay: Duration, max_invocations: Option<u32>) -> Self {
        Self {
            delay,
            max_invocations: max_invocations.filter(|n| *n > 0),
        }
    }

    pub async fn drain(
        &self,
        handler: &dyn InvocationHandler,
        initial: InvocationPayload,
    ) -> DrainSummary {
        let started = Instant::now();
        let mut totals = RunningTotals::default();
        let mut invocations = 0u32;
        let mut payload = initial;

        let stop = loop {
            if self.max_invocations.is_some_and(|max| invocations >= max) {
                info!(invocations, "Reached maximum number of invocations");
                break DrainStop::InvocationLimit;
            }
            invocations += 1;

            let response = handler.handle(payload).await;
            totals.add(response.body.invocation_totals());
            info!(
                invocation = invocations,
                processed = response.body.processed,
                updated = response.body.updated,
                failed = response.body.failed,
                duration_secs = response.body.duration,
                "Invocation finished"
            );

            if !response.is_success() {
                let error = response.body.error.clone().unwrap_or_default();
                warn!(invocation = invocations, %error, "Invocation failed, stopping");
                break DrainStop::Failed { error };
            }
            match response.next_payload() {
                Some(next) => {
                    payload = next;
                    sleep(self.delay).await;
                }
                None => break DrainStop::Exhausted,
            }
        };

        let summary = DrainSummary {
            invocations,
            totals,
            duration: started.elapsed(),
            stop,
        };
        info!(
            invocations = summary.invocations,
            processed = summary.totals.processed,
            updated = summary.totals.updated,
            failed = summary.totals.failed,
            duration_secs = summary.duration.as_secs_f64(),
            "Drain complete"
        );
        summary
    }
}
