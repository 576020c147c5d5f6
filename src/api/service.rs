//! Boundary operations over a shared `Broker`.
//!
//! `MessageQueueService` exposes one typed method per operation plus `call`,
//! which routes a tool name and JSON arguments to the matching method. Wire
//! framing (JSON-RPC envelopes, transports) belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::api::message::{
    AcknowledgeMessageRequest, AcknowledgeMessageResponse, DeliveredMessage, GetMessagesRequest,
    GetMessagesResponse, ListChannelsResponse, PublishMessageRequest, PublishMessageResponse,
    SubscribeChannelRequest, SubscribeChannelResponse, UnsubscribeChannelRequest,
    UnsubscribeChannelResponse,
};
use crate::broker::{AckOutcome, Broker, MetricsSnapshot};
use crate::utils::{ApiError, BrokerError};

/// Names accepted by [`MessageQueueService::call`].
pub const TOOLS: [&str; 7] = [
    "publish_message",
    "subscribe_channel",
    "unsubscribe_channel",
    "get_messages",
    "acknowledge_message",
    "get_performance_metrics",
    "list_channels",
];

#[derive(Debug, Clone)]
pub struct MessageQueueService {
    broker: Arc<Broker>,
}

impl MessageQueueService {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn publish_message(
        &self,
        req: PublishMessageRequest,
    ) -> Result<PublishMessageResponse, BrokerError> {
        let ttl = req.ttl_seconds.map(ttl_from_secs).transpose()?;
        let receipt = self
            .broker
            .publish(&req.channel, &req.sender, req.content, req.priority, ttl)?;

        Ok(PublishMessageResponse {
            message_id: receipt.message_id,
            timestamp: receipt.timestamp,
            channel: receipt.channel,
            latency_ms: receipt.latency.as_secs_f64() * 1000.0,
            recipients: receipt.recipients,
            rejected: receipt.rejected,
        })
    }

    pub fn subscribe_channel(
        &self,
        req: SubscribeChannelRequest,
    ) -> Result<SubscribeChannelResponse, BrokerError> {
        let outcome = self
            .broker
            .subscribe(&req.channel, &req.agent_id, req.filters.clone())?;

        Ok(SubscribeChannelResponse {
            channel: req.channel,
            agent_id: req.agent_id,
            subscribed: true,
            subscriber_count: outcome.subscriber_count,
            message_count: outcome.message_count,
            filters: req.filters,
        })
    }

    pub fn unsubscribe_channel(&self, req: UnsubscribeChannelRequest) -> UnsubscribeChannelResponse {
        let found = self.broker.unsubscribe(&req.channel, &req.agent_id);
        UnsubscribeChannelResponse {
            channel: req.channel,
            agent_id: req.agent_id,
            subscribed: false,
            found,
        }
    }

    pub fn get_messages(&self, req: GetMessagesRequest) -> Result<GetMessagesResponse, BrokerError> {
        let records =
            self.broker
                .get_messages(&req.agent_id, req.channel.as_deref(), req.limit)?;
        let messages: Vec<DeliveredMessage> = records.iter().map(DeliveredMessage::from).collect();

        Ok(GetMessagesResponse {
            agent_id: req.agent_id,
            count: messages.len(),
            messages,
        })
    }

    pub fn acknowledge_message(
        &self,
        req: AcknowledgeMessageRequest,
    ) -> Result<AcknowledgeMessageResponse, BrokerError> {
        let outcome = self.broker.ack(&req.message_id, &req.agent_id)?;
        let reason = match outcome {
            AckOutcome::Acknowledged => None,
            AckOutcome::NotFound(reason) => Some(reason.as_str().to_string()),
        };

        Ok(AcknowledgeMessageResponse {
            message_id: req.message_id,
            agent_id: req.agent_id,
            acknowledged: outcome.is_acknowledged(),
            reason,
        })
    }

    pub fn get_performance_metrics(&self) -> MetricsSnapshot {
        self.broker.metrics_snapshot()
    }

    pub fn list_channels(&self) -> ListChannelsResponse {
        let channels = self.broker.list_channels();
        ListChannelsResponse {
            total_channels: channels.len(),
            channels,
        }
    }

    /// Dispatches a tool call by name. `arguments` may be `null` for tools
    /// that take none.
    pub fn call(&self, tool: &str, arguments: Value) -> Result<Value, ApiError> {
        debug!(tool, "tool call");
        match tool {
            "publish_message" => respond(self.publish_message(parse(arguments)?)?),
            "subscribe_channel" => respond(self.subscribe_channel(parse(arguments)?)?),
            "unsubscribe_channel" => respond(self.unsubscribe_channel(parse(arguments)?)),
            "get_messages" => respond(self.get_messages(parse(arguments)?)?),
            "acknowledge_message" => respond(self.acknowledge_message(parse(arguments)?)?),
            "get_performance_metrics" => respond(self.get_performance_metrics()),
            "list_channels" => respond(self.list_channels()),
            other => Err(ApiError::UnknownTool(other.to_string())),
        }
    }
}

fn ttl_from_secs(secs: f64) -> Result<Duration, BrokerError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(BrokerError::Validation {
            field: "ttl_seconds",
            reason: "must be positive",
        });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| BrokerError::Validation {
        field: "ttl_seconds",
        reason: "out of range",
    })
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(arguments)?)
}

fn respond<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}
