//! Publisher behavior against the in-memory transport
//!
//! Runs on paused tokio time so backoff windows can be stepped through
//! exactly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flexlink_device::{
    DeliveryStatus, MemoryTransport, Outcome, PublishStatus, PublisherConfig, ReliablePublisher,
};
use flexlink_schemas::{types, FfrPrioritizer, Message, Reading};

type Statuses<M> = Arc<Mutex<Vec<PublishStatus<M>>>>;

/// Advances paused time and lets spawned tasks catch up.
async fn settle(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn reading(ts: i64) -> Message {
    let mut message: Message = Reading::new("L1", types::POWER, 1.0).into();
    message.stamp(ts);
    message
}

fn message_publisher() -> (Arc<MemoryTransport<Message>>, ReliablePublisher<Message>) {
    let transport = Arc::new(MemoryTransport::<Message>::new());
    let publisher =
        ReliablePublisher::new(transport.clone(), FfrPrioritizer, PublisherConfig::default())
            .unwrap();
    (transport, publisher)
}

/// Publisher over string payloads whose priority is looked up by name.
fn named_publisher(
    capacity: usize,
) -> (Arc<MemoryTransport<&'static str>>, ReliablePublisher<&'static str>) {
    let transport = Arc::new(MemoryTransport::<&'static str>::new());
    let priority = |name: &&'static str| match *name {
        "asdf" => 4,
        "qwer" => 3,
        "zxcv" => 2,
        "low" => 1,
        _ => 5,
    };
    let publisher = ReliablePublisher::new(
        transport.clone(),
        priority,
        PublisherConfig::new().capacity(capacity),
    )
    .unwrap();
    (transport, publisher)
}

fn record<M: Send + Sync + 'static>(publisher: &ReliablePublisher<M>) -> Statuses<M> {
    let statuses: Statuses<M> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    publisher.on_publish(move |status| sink.lock().unwrap().push(status));
    statuses
}

#[tokio::test(start_paused = true)]
async fn server_busy_is_retried_after_the_backoff_window() {
    let (transport, publisher) = message_publisher();
    let statuses = record(&publisher);

    let token = publisher.publish(reading(1_000)).unwrap();
    assert_eq!(transport.sent_count(), 1);

    transport.complete(token, DeliveryStatus::ServerBusy);
    let entry = publisher.buffer().get(token).unwrap();
    assert!(!entry.is_leased(), "released for the drain loop");
    assert!(publisher.backoff().is_backing_off());
    assert_eq!(publisher.backoff().current_interval(), Duration::from_secs(4));
    assert!(statuses.lock().unwrap().is_empty());

    settle(1_900).await;
    assert_eq!(transport.sent_count(), 1, "still inside the 2s window");

    settle(200).await;
    assert_eq!(transport.sent_tokens(), vec![token, token]);

    transport.complete(token, DeliveryStatus::Ok);
    assert!(publisher.buffer().is_empty());
    assert_eq!(publisher.backoff().current_interval(), Duration::from_secs(2));
    assert!(!publisher.backoff().is_backing_off());

    let statuses = statuses.lock().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].token, token);
    assert_eq!(statuses[0].outcome(), Outcome::Delivered);
    assert_eq!(statuses[0].message.as_deref(), Some(&reading(1_000)));
}

#[tokio::test(start_paused = true)]
async fn publish_while_backing_off_waits_for_the_drain_loop() {
    let (transport, publisher) = message_publisher();

    let first = publisher.publish(reading(1_000)).unwrap();
    transport.complete(first, DeliveryStatus::Throttled);

    let second = publisher.publish(reading(2_000)).unwrap();
    assert_eq!(transport.sent_count(), 1, "no immediate send while backing off");
    assert!(!publisher.buffer().get(second).unwrap().is_leased());

    settle(2_100).await;
    // Newer reading scores higher and goes first.
    assert_eq!(transport.sent_tokens(), vec![first, second, first]);
}

#[tokio::test(start_paused = true)]
async fn consecutive_retries_widen_the_window() {
    let (transport, publisher) = message_publisher();
    let token = publisher.publish(reading(1_000)).unwrap();

    transport.complete(token, DeliveryStatus::ServerBusy);
    settle(2_000).await;
    assert_eq!(transport.sent_count(), 2);

    transport.complete(token, DeliveryStatus::InternalServerError);
    assert_eq!(publisher.backoff().current_interval(), Duration::from_secs(6));

    settle(3_900).await;
    assert_eq!(transport.sent_count(), 2, "second window lasts 4s");
    settle(200).await;
    assert_eq!(transport.sent_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_are_deleted_and_reported() {
    let (transport, publisher) = message_publisher();
    let statuses = record(&publisher);

    let token = publisher.publish(reading(1_000)).unwrap();
    transport.complete(token, DeliveryStatus::BadFormat);

    assert!(publisher.buffer().is_empty());
    let statuses = statuses.lock().unwrap();
    assert_eq!(statuses[0].outcome(), Outcome::Rejected);
    assert_eq!(statuses[0].description(), "message rejected: malformed request");
}

#[tokio::test(start_paused = true)]
async fn unknown_statuses_are_dropped_without_touching_backoff() {
    let (transport, publisher) = message_publisher();
    let statuses = record(&publisher);

    let busy = publisher.publish(reading(1_000)).unwrap();
    transport.complete(busy, DeliveryStatus::ServerBusy);
    let odd = publisher.publish(reading(2_000)).unwrap();

    transport.complete(odd, "CONNECTION_RESET".parse().unwrap());
    assert!(publisher.buffer().get(odd).is_err());
    assert!(publisher.backoff().is_backing_off());
    assert_eq!(statuses.lock().unwrap()[0].outcome(), Outcome::Unclassified);
}

#[tokio::test(start_paused = true)]
async fn full_buffer_rejects_low_priority_and_evicts_for_high() {
    let (transport, publisher) = named_publisher(3);
    let statuses = record(&publisher);

    let asdf = publisher.publish("asdf").unwrap();
    publisher.publish("qwer").unwrap();
    let zxcv = publisher.publish("zxcv").unwrap();

    let err = publisher.publish("low").unwrap_err();
    assert!(err.is_buffer_full());
    assert_eq!(publisher.buffer().len(), 3);
    assert_eq!(**publisher.buffer().get(asdf).unwrap().payload(), "asdf");
    assert_eq!(transport.sent_count(), 3, "rejected message is never sent");

    // Priority 5 evicts the in-flight priority-2 entry.
    publisher.publish("urgent").unwrap();
    assert!(publisher.buffer().get(zxcv).is_err());
    assert_eq!(publisher.buffer().len(), 3);

    // A late status for the evicted entry is still reported, without payload.
    transport.complete(zxcv, DeliveryStatus::Ok);
    let statuses = statuses.lock().unwrap();
    assert_eq!(statuses[0].token, zxcv);
    assert!(statuses[0].message.is_none());
}

#[tokio::test(start_paused = true)]
async fn send_errors_back_off_until_the_transport_recovers() {
    let transport = Arc::new(MemoryTransport::<Message>::strict());
    let publisher =
        ReliablePublisher::new(transport.clone(), FfrPrioritizer, PublisherConfig::default())
            .unwrap();

    let token = publisher.publish(reading(1_000)).unwrap();
    assert_eq!(transport.sent_count(), 0);
    assert!(publisher.backoff().is_backing_off());
    assert!(!publisher.buffer().get(token).unwrap().is_leased());

    publisher.connect().await.unwrap();
    assert!(publisher.is_connected());
    settle(2_100).await;
    assert_eq!(transport.sent_tokens(), vec![token]);
}

#[tokio::test(start_paused = true)]
async fn auto_acknowledged_messages_leave_the_buffer() {
    let transport = Arc::new(MemoryTransport::<Message>::new().with_auto_ack(DeliveryStatus::OkEmpty));
    let publisher =
        ReliablePublisher::new(transport.clone(), FfrPrioritizer, PublisherConfig::default())
            .unwrap();

    for ts in 0..10 {
        publisher.publish(reading(ts)).unwrap();
    }
    assert!(publisher.buffer().is_empty());
    assert_eq!(publisher.buffer().total_inserted(), 10);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_drain_loop() {
    let (transport, mut publisher) = message_publisher();
    let token = publisher.publish(reading(1_000)).unwrap();
    transport.complete(token, DeliveryStatus::ServerBusy);

    publisher.shutdown().await;
    settle(5_000).await;
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(publisher.buffer().len(), 1);
}

#[test]
fn construction_outside_a_runtime_fails() {
    let transport = Arc::new(MemoryTransport::<Message>::new());
    let err = ReliablePublisher::new(transport, FfrPrioritizer, PublisherConfig::default())
        .err()
        .unwrap();
    assert_eq!(err.as_label(), "publish_no_runtime");
}
