//! CLI for agentmq
//!
//! Subcommands:
//! - `demo`: walk two agents through a request/response exchange
//! - `bench`: concurrent publish benchmark against the latency budget

use std::sync::Arc;
use std::time::Duration;

use agentmq::api::{
    AcknowledgeMessageRequest, GetMessagesRequest, PublishMessageRequest, SubscribeChannelRequest,
};
use agentmq::config::Settings;
use agentmq::utils::logging;
use agentmq::{Broker, BrokerOptions, ExpirationSweeper, MessageQueueService, load_config};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "agentmq")]
enum Command {
    /// Run the frontend/backend coordination demo
    Demo,
    /// Measure publish latency under concurrent load
    Bench {
        /// Concurrent publishing tasks
        #[arg(long, default_value_t = 10)]
        senders: usize,
        /// Channels published to
        #[arg(long, default_value_t = 10)]
        channels: usize,
        /// Subscribers per channel
        #[arg(long, default_value_t = 5)]
        subscribers: usize,
        /// Messages published by each sender
        #[arg(long, default_value_t = 1000)]
        messages: usize,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    let broker = Arc::new(Broker::new(BrokerOptions::from(&settings.broker)));
    let sweeper = ExpirationSweeper::new(
        broker.clone(),
        Duration::from_secs(settings.broker.sweep_interval_secs),
    )
    .spawn();

    let result = tokio::select! {
        res = run(cmd, broker, &settings) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    };

    sweeper.shutdown().await;

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(
    cmd: Command,
    broker: Arc<Broker>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Demo => run_demo(MessageQueueService::new(broker), settings),
        Command::Bench {
            senders,
            channels,
            subscribers,
            messages,
        } => run_bench(broker, settings, senders, channels, subscribers, messages).await,
    }
}

fn run_demo(
    svc: MessageQueueService,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let budget = settings.broker.latency_budget_ms;

    for (channel, agent) in [
        ("api-requests", "backend-agent"),
        ("api-responses", "frontend-agent"),
    ] {
        let sub = svc.subscribe_channel(SubscribeChannelRequest {
            channel: channel.to_string(),
            agent_id: agent.to_string(),
            filters: None,
        })?;
        println!("{agent} subscribed to {channel}: {}", sub.subscribed);
    }

    let request = svc.publish_message(PublishMessageRequest {
        channel: "api-requests".to_string(),
        content: json!({
            "request_id": "REQ-001",
            "endpoint": "/api/auth/login",
            "method": "POST",
        }),
        sender: "frontend-agent".to_string(),
        priority: 8,
        ttl_seconds: None,
    })?;
    println!(
        "request published in {:.3}ms ({} {budget}ms budget)",
        request.latency_ms,
        verdict(request.latency_ms, budget)
    );

    let inbox = svc.get_messages(GetMessagesRequest {
        agent_id: "backend-agent".to_string(),
        channel: Some("api-requests".to_string()),
        limit: 10,
    })?;
    println!("backend-agent received {} message(s)", inbox.count);

    for msg in inbox.messages {
        println!("  {} from {}: {}", msg.id, msg.sender, msg.content);

        let reply = svc.publish_message(PublishMessageRequest {
            channel: "api-responses".to_string(),
            content: json!({ "request_id": msg.content["request_id"], "status": "implemented" }),
            sender: "backend-agent".to_string(),
            priority: 5,
            ttl_seconds: Some(300.0),
        })?;
        println!("  reply {} published", reply.message_id);

        let ack = svc.acknowledge_message(AcknowledgeMessageRequest {
            message_id: msg.id,
            agent_id: "backend-agent".to_string(),
        })?;
        println!("  acknowledged: {}", ack.acknowledged);
    }

    let replies = svc.get_messages(GetMessagesRequest {
        agent_id: "frontend-agent".to_string(),
        channel: None,
        limit: 10,
    })?;
    for msg in &replies.messages {
        println!("frontend-agent got reply: {}", msg.content);
    }

    println!(
        "metrics: {}",
        serde_json::to_string_pretty(&svc.get_performance_metrics())?
    );
    println!(
        "channels: {}",
        serde_json::to_string_pretty(&svc.list_channels())?
    );
    Ok(())
}

async fn run_bench(
    broker: Arc<Broker>,
    settings: &Settings,
    senders: usize,
    channels: usize,
    subscribers: usize,
    messages: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if senders == 0 || channels == 0 || messages == 0 {
        return Err("senders, channels and messages must be at least 1".into());
    }

    for c in 0..channels {
        for s in 0..subscribers {
            broker.subscribe(&format!("bench-{c}"), &format!("bench-{c}-sub-{s}"), None)?;
        }
    }
    info!(senders, channels, subscribers, messages, "starting benchmark");

    let started = tokio::time::Instant::now();
    let mut tasks = Vec::with_capacity(senders);
    for sender in 0..senders {
        let broker = broker.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("bench-sender-{sender}");
            for i in 0..messages {
                let channel = format!("bench-{}", (sender + i) % channels);
                broker.publish(&channel, &name, json!({ "i": i }), (i % 10) as i64, None)?;
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok::<(), agentmq::utils::BrokerError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }
    let elapsed = started.elapsed();

    let metrics = broker.metrics();
    let budget = settings.broker.latency_budget_ms;
    let p99 = metrics.latency_percentile(99.0);
    let total = senders * messages;

    println!(
        "published {total} messages in {:.1}ms ({:.0} msg/s)",
        elapsed.as_secs_f64() * 1000.0,
        total as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!(
        "latency avg {:.3}ms, peak {:.3}ms, p99 {:.3}ms ({} {budget}ms budget)",
        metrics.avg_latency_ms(),
        metrics.peak_latency_ms(),
        p99,
        verdict(p99, budget)
    );
    Ok(())
}

fn verdict(latency_ms: f64, budget_ms: f64) -> &'static str {
    if latency_ms < budget_ms {
        "within"
    } else {
        "over"
    }
}
