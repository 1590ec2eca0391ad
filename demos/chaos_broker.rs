//! In-process broker with fault injection
//!
//! Run with: cargo run --example chaos_broker -- [config.json]
//!
//! Without a config file every topic is passed through unchanged. A config
//! such as
//!
//! ```json
//! [
//!   { "topic": "sensors/temp", "operators": [{ "type": "randomDrop", "chance": 0.3 }] },
//!   { "topic": "sensors/batch", "operators": [{ "type": "buffer", "maxSize": 4 }] }
//! ]
//! ```
//!
//! drops about a third of `sensors/temp` and groups `sensors/batch` in fours.

use std::sync::Arc;
use std::time::Duration;

use mqtt_chaos::{
    Ack, BusDiagnostics, ChaosConfig, ChaosEngine, Handler, HandlerId, MemoryBus, Packet,
    PublishBus, RegistryConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("mqtt_chaos=info".parse()?),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ChaosConfig::load(&path)?,
        None => {
            tracing::warn!("No config path given, starting without config file");
            ChaosConfig::empty()
        }
    };

    let bus = Arc::new(MemoryBus::new());
    let settings = RegistryConfig::default();
    let diagnostics = Arc::new(BusDiagnostics::new(bus.clone(), settings.log_topic.clone()));

    // Mirror everything the engine reports on the log topic
    bus.on(
        &settings.log_topic,
        Arc::new(|packet: Packet, ack: Ack| {
            println!("[log] {}", String::from_utf8_lossy(&packet.payload));
            ack.ack();
        }),
    );

    let mut engine = ChaosEngine::builder(config, bus.clone())
        .diagnostics(diagnostics)
        .settings(settings)
        .build();

    let topics = ["sensors/temp", "sensors/batch", "sensors/raw"];
    for (i, topic) in topics.iter().enumerate() {
        let name = format!("client-{}", i + 1);
        let handler: Handler = Arc::new(move |packet: Packet| {
            println!(
                "{} <- {}: {}",
                name,
                packet.topic,
                String::from_utf8_lossy(&packet.payload)
            );
        });
        engine
            .interceptor()
            .on_subscribe(topic, HandlerId(i as u64 + 1), handler, || {
                tracing::info!(topic = %topic, "Subscription acknowledged");
            });
    }

    for n in 0..12 {
        for topic in &topics {
            bus.publish(Packet::new(*topic, format!("reading {}", n))).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    bus.publish(Packet::new(engine.settings().control_topic.clone(), "get_stats"))
        .await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    engine.shutdown();

    Ok(())
}
