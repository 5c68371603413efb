//! Notification transports

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use super::NotificationTransport;
use crate::error::NotifyError;

/// Typed message attribute, as topic publish APIs expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    #[serde(rename = "DataType")]
    pub data_type: String,
    #[serde(rename = "StringValue")]
    pub string_value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }
}

pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    #[serde(rename = "TopicArn")]
    topic: &'a str,
    #[serde(rename = "Message")]
    message: &'a str,
    #[serde(rename = "MessageAttributes")]
    attributes: &'a MessageAttributes,
}

/// Publishes by POSTing JSON to a topic gateway
pub struct HttpTopicTransport {
    http: Client,
    endpoint: url::Url,
}

impl HttpTopicTransport {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self, NotifyError> {
        let endpoint = url::Url::parse(endpoint)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl NotificationTransport for HttpTopicTransport {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> Result<String, NotifyError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&PublishRequest {
                topic,
                message,
                attributes,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        #[derive(Deserialize)]
        struct PublishResponse {
            #[serde(rename = "MessageId", default)]
            message_id: Option<String>,
        }

        let parsed: PublishResponse = response.json().await?;
        Ok(parsed.message_id.unwrap_or_default())
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        _attributes: &MessageAttributes,
    ) -> Result<String, NotifyError> {
        info!(topic, message, "Notification (log only)");
        Ok(format!("log-{}", uuid::Uuid::new_v4()))
    }
}

/// A message captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: String,
    pub attributes: MessageAttributes,
}

/// Keeps published messages in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<PublishedMessage>>,
    fail: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationTransport for MemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        message: &str,
        attributes: &MessageAttributes,
    ) -> Result<String, NotifyError> {
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "transport failure injected".to_string(),
            });
        }
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        published.push(PublishedMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            attributes: attributes.clone(),
        });
        Ok(format!("msg-{}", published.len()))
    }
}
