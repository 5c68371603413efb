//! Continue-or-stop decision at the end of an invocation

use std::time::Duration;

use crate::store::ContinuationToken;

/// Self-reinvocation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    pub auto_continue: bool,
    pub max_auto_invocations: u32,
    pub time_budget: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueReason {
    /// The page or item cap was reached and the store has more
    MoreRecords,
    /// The wall-clock budget ran out mid-page
    TimeBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue {
        token: ContinuationToken,
        /// Number of this invocation within the chain
        invocation_count: u32,
        reason: ContinueReason,
        /// Whether to fire a self-reinvocation
        reinvoke: bool,
    },
    Done {
        invocation_count: u32,
    },
}

impl Decision {
    pub fn has_more(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }

    pub fn invocation_count(&self) -> u32 {
        match self {
            Self::Continue {
                invocation_count, ..
            }
            | Self::Done { invocation_count } => *invocation_count,
        }
    }
}

/// `previous_invocations` is the count carried in by the payload.
pub fn decide(
    cursor: Option<ContinuationToken>,
    previous_invocations: u32,
    elapsed: Duration,
    policy: &ContinuationPolicy,
) -> Decision {
    let invocation_count = previous_invocations.saturating_add(1);
    match cursor {
        None => Decision::Done { invocation_count },
        Some(token) => Decision::Continue {
            token,
            invocation_count,
            reason: if elapsed >= policy.time_budget {
                ContinueReason::TimeBudget
            } else {
                ContinueReason::MoreRecords
            },
            reinvoke: policy.auto_continue && invocation_count < policy.max_auto_invocations,
        },
    }
}
