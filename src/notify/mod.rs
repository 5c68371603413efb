//! Death notifications
//!
//! `DeathNotifier` formats the SMS text and hands it to a
//! [`NotificationTransport`]. Publishing is best-effort: nothing here can
//! fail the write that triggered it.

pub mod transport;

pub use transport::{
    HttpTopicTransport, LogTransport, MemoryTransport, MessageAttribute, MessageAttributes,
    PublishedMessage,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{KnowledgeConfig, NotifyConfig};
use crate::error::{NotifyError, StoreError};
use crate::model::Subscriber;
use crate::store::StoreAdapter;

pub const SMS_TYPE_ATTRIBUTE: &str = "AWS.SNS.SMS.SMSType";
pub const SMS_TYPE_TRANSACTIONAL: &str = "Transactional";

/// Publishes a message to a topic, returning the message id
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> Result<String, NotifyError>;
}

/// Source of opted-in subscribers
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;
}

#[async_trait]
impl SubscriberDirectory for StoreAdapter {
    async fn opted_in_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        StoreAdapter::opted_in_subscribers(self).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Published { message_id: String },
    NoTopic,
    NoSubscribers,
    Failed,
}

/// SMS text for a newly discovered death
pub fn death_message(name: &str, death_date: NaiveDate) -> String {
    format!(
        "🎯 {} has passed away on {}. Check the game for updates!",
        name,
        death_date.format("%Y-%m-%d")
    )
}

pub struct DeathNotifier {
    topic: Option<String>,
    transport: Arc<dyn NotificationTransport>,
    subscribers: Arc<dyn SubscriberDirectory>,
}

impl DeathNotifier {
    pub fn new(
        topic: Option<String>,
        transport: Arc<dyn NotificationTransport>,
        subscribers: Arc<dyn SubscriberDirectory>,
    ) -> Self {
        Self {
            topic,
            transport,
            subscribers,
        }
    }

    /// HTTP transport when an endpoint is configured, log-only otherwise
    pub fn from_config(
        config: &NotifyConfig,
        knowledge: &KnowledgeConfig,
        subscribers: Arc<dyn SubscriberDirectory>,
    ) -> Result<Self, NotifyError> {
        let transport: Arc<dyn NotificationTransport> = match &config.endpoint {
            Some(endpoint) => Arc::new(HttpTopicTransport::new(endpoint, &knowledge.user_agent)?),
            None => Arc::new(LogTransport),
        };
        Ok(Self::new(config.topic.clone(), transport, subscribers))
    }

    pub async fn on_death_discovered(&self, name: &str, death_date: NaiveDate) -> NotifyOutcome {
        let Some(topic) = self.topic.as_deref() else {
            warn!(name, "No notification topic configured, skipping");
            return NotifyOutcome::NoTopic;
        };

        match self.subscribers.opted_in_subscribers().await {
            Ok(subs) if subs.is_empty() => {
                info!(name, "No opted-in subscribers, skipping notification");
                return NotifyOutcome::NoSubscribers;
            }
            Ok(subs) => info!(name, subscribers = subs.len(), "Notifying subscribers"),
            Err(e) => {
                warn!(name, error = %e, "Subscriber lookup failed, skipping notification");
                return NotifyOutcome::Failed;
            }
        }

        let mut attributes = MessageAttributes::new();
        attributes.insert(
            SMS_TYPE_ATTRIBUTE.to_string(),
            MessageAttribute::string(SMS_TYPE_TRANSACTIONAL),
        );

        let message = death_message(name, death_date);
        match self.transport.publish(topic, &message, &attributes).await {
            Ok(message_id) => {
                info!(name, %message_id, "Death notification published");
                NotifyOutcome::Published { message_id }
            }
            Err(e) => {
                warn!(name, error = %e, "Failed to publish death notification");
                NotifyOutcome::Failed
            }
        }
    }
}
