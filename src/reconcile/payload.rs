//! Invocation payload and response wire types (camelCase JSON)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReconcileError;
use crate::store::ContinuationToken;

/// Counters accumulated across a chain of invocations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTotals {
    pub processed: u64,
    pub updated: u64,
    pub failed: u64,
}

impl RunningTotals {
    pub fn add(&mut self, other: RunningTotals) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationPayload {
    /// Issued token (string) or a raw store key (object)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_token: Option<Value>,
    pub invocation_count: u32,
    pub running_total_processed: u64,
    pub running_total_updated: u64,
    pub running_total_failed: u64,
}

impl InvocationPayload {
    /// Payload resuming at `token` with the totals so far
    pub fn resume(token: &ContinuationToken, invocation_count: u32, totals: RunningTotals) -> Self {
        Self {
            pagination_token: Some(Value::String(token.as_str().to_string())),
            invocation_count,
            running_total_processed: totals.processed,
            running_total_updated: totals.updated,
            running_total_failed: totals.failed,
        }
    }

    pub fn token(&self) -> Result<Option<ContinuationToken>, ReconcileError> {
        match &self.pagination_token {
            None => Ok(None),
            Some(value) => ContinuationToken::from_payload_value(value)
                .map_err(|e| ReconcileError::Payload(e.to_string())),
        }
    }

    /// Whether this payload starts a new pass: no token, or a null/blank one
    pub fn is_fresh(&self) -> bool {
        matches!(self.token(), Ok(None))
    }

    pub fn totals(&self) -> RunningTotals {
        RunningTotals {
            processed: self.running_total_processed,
            updated: self.running_total_updated,
            failed: self.running_total_failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub processed: u64,
    pub updated: u64,
    pub failed: u64,
    /// Seconds
    pub duration: f64,
    pub has_more_records: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination_token: Option<ContinuationToken>,
    pub invocation_count: u32,
    pub running_total_processed: u64,
    pub running_total_updated: u64,
    pub running_total_failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseBody {
    pub fn totals(&self) -> RunningTotals {
        RunningTotals {
            processed: self.running_total_processed,
            updated: self.running_total_updated,
            failed: self.running_total_failed,
        }
    }

    pub fn invocation_totals(&self) -> RunningTotals {
        RunningTotals {
            processed: self.processed,
            updated: self.updated,
            failed: self.failed,
        }
    }
}

impl InvocationResponse {
    pub const OK: u16 = 200;
    pub const FAILED: u16 = 500;

    pub fn is_success(&self) -> bool {
        self.status_code == Self::OK
    }

    /// Payload for the next invocation, if there is more to do
    pub fn next_payload(&self) -> Option<InvocationPayload> {
        if !self.body.has_more_records {
            return None;
        }
        let token = self.body.pagination_token.as_ref()?;
        Some(InvocationPayload::resume(
            token,
            self.body.invocation_count,
            self.body.totals(),
        ))
    }
}
