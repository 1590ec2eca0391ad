//! End-to-end behaviour of topic pipelines through the in-memory bus

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Barrier};

use mqtt_chaos::{
    ChaosConfig, ChaosEngine, Emission, Handler, HandlerId, MemoryBus, MemoryDiagnostics, Packet,
    RegistryConfig,
};

struct Harness {
    bus: Arc<MemoryBus>,
    engine: ChaosEngine,
    diagnostics: Arc<MemoryDiagnostics>,
}

fn harness(config: &str) -> Harness {
    let bus = Arc::new(MemoryBus::new());
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let engine = ChaosEngine::builder(ChaosConfig::from_json_str(config).unwrap(), bus.clone())
        .diagnostics(diagnostics.clone())
        .settings(RegistryConfig::default().seed(7))
        .without_control_channel()
        .build();
    Harness {
        bus,
        engine,
        diagnostics,
    }
}

fn recorder() -> (Handler, mpsc::UnboundedReceiver<Packet>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: Handler = Arc::new(move |packet: Packet| {
        let _ = tx.send(packet);
    });
    (handler, rx)
}

async fn publish_numbered(bus: &MemoryBus, topic: &str, count: usize) {
    for i in 0..count {
        bus.publish(Packet::new(topic, i.to_string())).await;
    }
}

/// Everything delivered until nothing arrives for a second
async fn delivered(rx: &mut mpsc::UnboundedReceiver<Packet>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(Some(packet)) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        out.push(String::from_utf8_lossy(&packet.payload).into_owned());
    }
    out
}

fn numbered(indexes: &[usize]) -> Vec<String> {
    indexes.iter().map(ToString::to_string).collect()
}

#[tokio::test(start_paused = true)]
async fn unconfigured_topic_is_passthrough() {
    let h = harness("[]");
    let (handler, mut rx) = recorder();

    h.engine
        .interceptor()
        .on_subscribe("plain", HandlerId(1), handler, || {});
    publish_numbered(&h.bus, "plain", 10).await;

    assert_eq!(
        delivered(&mut rx).await,
        numbered(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9])
    );
    assert!(h.diagnostics.contains("\"plain\" that is not present in the config"));
}

#[tokio::test(start_paused = true)]
async fn shared_stream_is_singleton_while_subscribed() {
    let h = harness("[]");
    let registry = h.engine.registry();
    let (h1, _rx1) = recorder();
    let (h2, _rx2) = recorder();

    h.engine.interceptor().on_subscribe("s", HandlerId(1), h1, || {});
    let first = registry.get_or_create("s").unwrap();
    h.engine.interceptor().on_subscribe("s", HandlerId(2), h2, || {});
    let second = registry.get_or_create("s").unwrap();
    h.engine.interceptor().on_unsubscribe("s", HandlerId(1), || {});
    let third = registry.get_or_create("s").unwrap();

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&third));
    assert_eq!(h.bus.listener_count("s"), 1);
}

#[tokio::test(start_paused = true)]
async fn random_drop_extremes() {
    let h = harness(
        r#"[
            { "topic": "keep", "operators": [{ "type": "randomDrop", "chance": 0 }] },
            { "topic": "lose", "operators": [{ "type": "randomDrop", "chance": 1 }] }
        ]"#,
    );
    let (keep, mut keep_rx) = recorder();
    let (lose, mut lose_rx) = recorder();

    h.engine.interceptor().on_subscribe("keep", HandlerId(1), keep, || {});
    h.engine.interceptor().on_subscribe("lose", HandlerId(2), lose, || {});
    publish_numbered(&h.bus, "keep", 50).await;
    publish_numbered(&h.bus, "lose", 50).await;

    assert_eq!(delivered(&mut keep_rx).await.len(), 50);
    assert!(delivered(&mut lose_rx).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn buffer_by_count_emits_ordered_batches() {
    let h = harness(r#"[{ "topic": "b", "operators": [{ "type": "buffer", "maxSize": 3 }] }]"#);
    let stream = h.engine.registry().get_or_create("b").unwrap();
    let mut rx = stream.subscribe();

    publish_numbered(&h.bus, "b", 6).await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    let payloads = |e: Emission| -> Vec<String> {
        e.into_packets()
            .into_iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    };
    assert_eq!(payloads(first), numbered(&[0, 1, 2]));
    assert_eq!(payloads(second), numbered(&[3, 4, 5]));

    let extra = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test(start_paused = true)]
async fn buffer_by_time_emits_one_batch_per_window() {
    let h = harness(r#"[{ "topic": "t", "operators": [{ "type": "buffer", "time": 500 }] }]"#);
    let stream = h.engine.registry().get_or_create("t").unwrap();
    let mut rx = stream.subscribe();

    publish_numbered(&h.bus, "t", 4).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let mut batches = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if !item.is_empty() {
            batches.push(item.into_packets().len());
        }
    }
    assert_eq!(batches, vec![4]);
}

#[tokio::test(start_paused = true)]
async fn teardown_then_rebuild_starts_fresh() {
    let h = harness(r#"[{ "topic": "b", "operators": [{ "type": "buffer", "maxSize": 3 }] }]"#);
    let registry = h.engine.registry();
    let (h1, _rx1) = recorder();

    h.engine.interceptor().on_subscribe("b", HandlerId(1), h1, || {});
    publish_numbered(&h.bus, "b", 2).await;
    h.engine.interceptor().on_unsubscribe("b", HandlerId(1), || {});

    assert!(!registry.contains("b"));
    assert_eq!(h.bus.listener_count("b"), 0);

    let (h2, mut rx2) = recorder();
    h.engine.interceptor().on_subscribe("b", HandlerId(2), h2, || {});
    h.bus.publish(Packet::new("b", "fresh")).await;

    // One message is not a full batch: the two old ones were not carried over
    assert!(delivered(&mut rx2).await.is_empty());
    assert_eq!(registry.topic_stats("b").unwrap().messages_received, 1);
}

#[tokio::test(start_paused = true)]
async fn range_gate_drops_only_in_range_indexes() {
    let h = harness(
        r#"[{ "topic": "c", "startAfter": 2, "stopAfter": 4,
              "operators": [{ "type": "randomDrop", "chance": 1 }] }]"#,
    );
    let (handler, mut rx) = recorder();

    h.engine.interceptor().on_subscribe("c", HandlerId(1), handler, || {});
    publish_numbered(&h.bus, "c", 6).await;

    assert_eq!(delivered(&mut rx).await, numbered(&[0, 1, 5]));
}

#[tokio::test(start_paused = true)]
async fn unknown_operator_does_not_abort_chain() {
    let h = harness(
        r#"[{ "topic": "u", "operators": [{ "type": "bogus" }, { "type": "randomDrop", "chance": 1 }] }]"#,
    );
    let (handler, mut rx) = recorder();

    h.engine.interceptor().on_subscribe("u", HandlerId(1), handler, || {});
    publish_numbered(&h.bus, "u", 20).await;

    assert!(delivered(&mut rx).await.is_empty());
    assert!(h.diagnostics.contains("bogus"));
}

#[tokio::test(start_paused = true)]
async fn every_subscriber_sees_the_same_faults() {
    let h = harness(
        r#"[{ "topic": "f", "operators": [{ "type": "randomDrop", "chance": 0.5 }] }]"#,
    );
    let (h1, mut rx1) = recorder();
    let (h2, mut rx2) = recorder();

    h.engine.interceptor().on_subscribe("f", HandlerId(1), h1, || {});
    h.engine.interceptor().on_subscribe("f", HandlerId(2), h2, || {});
    publish_numbered(&h.bus, "f", 100).await;

    let first = delivered(&mut rx1).await;
    let second = delivered(&mut rx2).await;
    assert_eq!(first, second);
    assert!(!first.is_empty() && first.len() < 100);
}

#[tokio::test(start_paused = true)]
async fn delayed_messages_all_arrive() {
    let h = harness(
        r#"[{ "topic": "d", "operators": [{ "type": "randomDelay", "min": 10, "max": 300 }] }]"#,
    );
    let (handler, mut rx) = recorder();

    h.engine.interceptor().on_subscribe("d", HandlerId(1), handler, || {});
    publish_numbered(&h.bus, "d", 20).await;

    let mut got = delivered(&mut rx).await;
    got.sort_by_key(|s| s.parse::<usize>().unwrap_or(usize::MAX));
    assert_eq!(got, numbered(&(0..20).collect::<Vec<_>>()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_subscribers_share_one_pipeline() {
    const SUBSCRIBERS: u64 = 8;

    let h = harness(
        r#"[{ "topic": "x", "operators": [{ "type": "randomDrop", "chance": 0.5 }] }]"#,
    );
    let registry = h.engine.registry().clone();
    let barrier = Arc::new(Barrier::new(SUBSCRIBERS as usize));

    let mut receivers = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..SUBSCRIBERS {
        let (handler, rx) = recorder();
        receivers.push(rx);
        let registry = registry.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            registry.register_subscriber("x", HandlerId(i), handler)
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.bus.listener_count("x"), 1);
    assert_eq!(registry.topic_count(), 1);
    assert_eq!(registry.subscriber_count("x"), SUBSCRIBERS as usize);

    publish_numbered(&h.bus, "x", 100).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let sequences: Vec<Vec<String>> = receivers
        .iter_mut()
        .map(|rx| {
            let mut out = Vec::new();
            while let Ok(packet) = rx.try_recv() {
                out.push(String::from_utf8_lossy(&packet.payload).into_owned());
            }
            out
        })
        .collect();

    assert!(!sequences[0].is_empty() && sequences[0].len() < 100);
    for sequence in &sequences[1..] {
        assert_eq!(sequence, &sequences[0]);
    }
}
