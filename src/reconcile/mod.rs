//! Pagination-driven reconciliation of pending person records
//!
//! ## Layout
//!
//! - `engine`: the per-invocation loop ([`Reconciler`])
//! - `enrich`: knowledge lookups and change detection for one record
//! - `continuation`: the pure continue-or-stop decision
//! - `invoker`: self-reinvocation seam
//! - `driver`: repeated invocation until the dataset is exhausted
//! - `payload`: invocation payload/response wire types

pub mod continuation;
pub mod driver;
pub mod engine;
pub mod enrich;
pub mod invoker;
pub mod payload;

pub use continuation::{decide, ContinuationPolicy, ContinueReason, Decision};
pub use driver::{DrainDriver, DrainStop, DrainSummary};
pub use engine::{InvocationHandler, LoopSettings, Reconciler};
pub use enrich::{EnrichOutcome, Enricher};
pub use invoker::{ChannelInvoker, NoopInvoker, RecordingInvoker, SelfInvoker};
pub use payload::{InvocationPayload, InvocationResponse, ResponseBody, RunningTotals};
