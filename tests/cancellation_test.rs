use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use courier::prelude::*;

#[path = "support/fake_transport.rs"]
mod support;

use support::{FakeTransport, Reply};

fn client_with(transport: Arc<FakeTransport>) -> NamedClient {
    let mut registry = ClientRegistry::new();
    registry
        .register_clients([("slow", "https://slow.example.test/")])
        .unwrap();
    registry
        .build(Arc::new(ServiceRegistry::new()), transport)
        .client("slow")
        .unwrap()
}

fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

#[tokio::test]
async fn cancel_mid_send_releases_the_connection() {
    let transport = Arc::new(FakeTransport::new(Reply::Hang));
    let client = client_with(transport.clone());
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(20));

    let err = client.get("report", &cancel).await.unwrap_err();

    assert_eq!(err, CourierError::Cancelled);
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert_eq!(transport.sends(), 1);
    assert_eq!(transport.handles.opened(), 1);
    assert_eq!(transport.handles.closed(), 1);
}

#[tokio::test]
async fn cancel_mid_json_send_releases_the_connection() {
    let transport = Arc::new(FakeTransport::new(Reply::Hang));
    let client = client_with(transport.clone());
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(20));

    let err = client
        .post_json("report", &serde_json::json!({"x": 1}), None, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(transport.handles.opened(), transport.handles.closed());
}

#[tokio::test]
async fn cancel_while_reading_body_releases_the_stream() {
    let transport = Arc::new(FakeTransport::new(Reply::StallingBody(Bytes::from_static(
        br#"{"x":"#,
    ))));
    let client = client_with(transport.clone());
    let cancel = CancellationToken::new();

    let response = client.get("report", &cancel).await.unwrap();
    assert_eq!(transport.handles.opened(), 1);
    assert_eq!(transport.handles.closed(), 0);

    cancel_after(&cancel, Duration::from_millis(20));
    let err = response
        .json::<serde_json::Value>(&cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(transport.handles.closed(), 1);
}

#[tokio::test]
async fn dropping_an_unread_response_releases_the_stream() {
    let transport = Arc::new(FakeTransport::new(Reply::StallingBody(Bytes::new())));
    let client = client_with(transport.clone());

    let response = client
        .get("report", &CancellationToken::new())
        .await
        .unwrap();
    drop(response);

    assert_eq!(transport.handles.opened(), 1);
    assert_eq!(transport.handles.closed(), 1);
}
