//! End-to-end contract propagation through the running receiver.

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_receiver::bus::Message;
use event_receiver::contract::RECONCILER_ADDRESS;
use event_receiver::ingress::INGRESS_ADDRESS;
use event_receiver::lifecycle::LifecycleState;
use event_receiver::Receiver;

mod common;

type Seen = Arc<Mutex<Vec<Message>>>;

fn collect(mut rx: tokio::sync::mpsc::UnboundedReceiver<Message>) -> Seen {
    let seen: Seen = Arc::default();
    let sink = seen.clone();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            sink.lock().unwrap().push(message);
        }
    });
    seen
}

#[tokio::test]
async fn test_contract_published_once_per_distinct_content() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::receiver_config(dir.path(), br#"{"generation":1}"#);
    let contract = config.paths.contract.clone();

    let receiver = Receiver::new(Arc::new(config));
    let seen = collect(receiver.bus().consumer(RECONCILER_ADDRESS).unwrap());
    let running = receiver.start().await.unwrap();

    assert!(common::wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 1).await);
    assert_eq!(&*seen.lock().unwrap()[0].payload, br#"{"generation":1}"#);

    // Identical bytes are not a change.
    fs::write(&contract, br#"{"generation":1}"#).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    fs::write(&contract, br#"{"generation":2}"#).unwrap();
    assert!(common::wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 2).await);
    assert_eq!(&*seen.lock().unwrap()[1].payload, br#"{"generation":2}"#);

    let report = running.shutdown().await;
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(running.coordinator().state(), LifecycleState::Stopped);

    // Nothing is published after teardown.
    fs::write(&contract, br#"{"generation":3}"#).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_contract_created_after_boot_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::receiver_config(dir.path(), b"");
    let contract = config.paths.contract.clone();
    fs::remove_file(&contract).unwrap();

    let receiver = Receiver::new(Arc::new(config));
    let seen = collect(receiver.bus().consumer(RECONCILER_ADDRESS).unwrap());
    let running = receiver.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(seen.lock().unwrap().is_empty());

    fs::write(&contract, b"created").unwrap();
    assert!(common::wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 1).await);

    running.shutdown().await;
}

#[tokio::test]
async fn test_ingress_forwards_events_to_the_bus() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::receiver_config(dir.path(), b"{}");

    let receiver = Receiver::new(Arc::new(config));
    let events = collect(receiver.bus().consumer(INGRESS_ADDRESS).unwrap());
    let running = receiver.start().await.unwrap();
    let addr = running.context().ingress_addr;

    let client = reqwest::Client::new();
    for _ in 0..4 {
        let response = client
            .post(format!("http://{addr}/shop/default"))
            .header("ce-type", "dev.shop.order.created")
            .body(r#"{"order":1}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }
    assert!(common::wait_until(Duration::from_secs(5), || events.lock().unwrap().len() == 4).await);

    let report = running.shutdown().await;
    assert!(report.attempted.iter().any(|name| name == "ingress-worker-0"));
    assert!(report.attempted.iter().any(|name| name == "ingress-worker-1"));
}
