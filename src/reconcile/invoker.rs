//! Self-reinvocation
//!
//! Reinvocation is fire-and-forget: the current invocation hands the next
//! payload off and returns its own response without waiting.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::payload::InvocationPayload;

#[async_trait]
pub trait SelfInvoker: Send + Sync {
    async fn reinvoke(&self, payload: InvocationPayload) -> Result<()>;
}

/// Drops every request
#[derive(Debug, Default)]
pub struct NoopInvoker;

#[async_trait]
impl SelfInvoker for NoopInvoker {
    async fn reinvoke(&self, _payload: InvocationPayload) -> Result<()> {
        Ok(())
    }
}

/// Queues payloads for a local runner loop to pick up
pub struct ChannelInvoker {
    tx: mpsc::UnboundedSender<InvocationPayload>,
}

impl ChannelInvoker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InvocationPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SelfInvoker for ChannelInvoker {
    async fn reinvoke(&self, payload: InvocationPayload) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| anyhow!("invocation runner has shut down"))
    }
}

/// Remembers requested payloads
#[derive(Debug, Default)]
pub struct RecordingInvoker {
    payloads: Mutex<Vec<InvocationPayload>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<InvocationPayload> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SelfInvoker for RecordingInvoker {
    async fn reinvoke(&self, payload: InvocationPayload) -> Result<()> {
        self.payloads
            .lock()
            .map_err(|_| anyhow!("recording invoker poisoned"))?
            .push(payload);
        Ok(())
    }
}
