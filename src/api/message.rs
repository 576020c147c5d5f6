//! Request and response shapes for the boundary operations.
//!
//! These are what an external RPC layer deserializes tool arguments into and
//! serializes results from. Field names follow the wire contract, so the
//! subscriber is called `agent_id` here and TTLs are fractional seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broker::{AckState, ChannelInfo, DeliveryRecord, SubscriptionFilter};

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishMessageRequest {
    pub channel: String,
    pub content: serde_json::Value,
    pub sender: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub ttl_seconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishMessageResponse {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub latency_ms: f64,
    pub recipients: usize,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscribeChannelRequest {
    pub channel: String,
    pub agent_id: String,
    #[serde(default)]
    pub filters: Option<SubscriptionFilter>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscribeChannelResponse {
    pub channel: String,
    pub agent_id: String,
    pub subscribed: bool,
    pub subscriber_count: usize,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SubscriptionFilter>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnsubscribeChannelRequest {
    pub channel: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnsubscribeChannelResponse {
    pub channel: String,
    pub agent_id: String,
    pub subscribed: bool,
    /// Whether a subscription existed before the call.
    pub found: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetMessagesRequest {
    pub agent_id: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// A delivery record as seen by the subscriber.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveredMessage {
    pub id: String,
    pub channel: String,
    pub sender: String,
    pub content: serde_json::Value,
    pub priority: i64,
    pub timestamp: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
    pub delivery_time: DateTime<Utc>,
    pub ack_state: AckState,
}

impl From<&DeliveryRecord> for DeliveredMessage {
    fn from(record: &DeliveryRecord) -> Self {
        let msg = &record.message;
        Self {
            id: msg.id.clone(),
            channel: msg.channel.clone(),
            sender: msg.sender.clone(),
            content: msg.content.clone(),
            priority: msg.priority,
            timestamp: msg.timestamp,
            expiry: msg.expiry(),
            delivery_time: record.delivery_time,
            ack_state: record.state,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetMessagesResponse {
    pub agent_id: String,
    pub messages: Vec<DeliveredMessage>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcknowledgeMessageRequest {
    pub message_id: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcknowledgeMessageResponse {
    pub message_id: String,
    pub agent_id: String,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListChannelsResponse {
    pub channels: Vec<ChannelInfo>,
    pub total_channels: usize,
}
