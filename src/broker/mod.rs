pub mod ack;
pub mod channel;
pub mod engine;
pub mod message;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod sweeper;

pub use ack::{AckOutcome, NotFoundReason};
pub use channel::{SubscriberId, Subscription, SubscriptionFilter};
pub use engine::{Broker, BrokerOptions, PublishReceipt, SubscribeOutcome};
pub use message::{AckState, DeliveryRecord, Message, MessageId};
pub use metrics::{MetricEvent, MetricsCollector, MetricsSnapshot};
pub use registry::{ChannelInfo, ChannelRegistry};
pub use sweeper::{ExpirationSweeper, SweepReport, SweeperHandle};
