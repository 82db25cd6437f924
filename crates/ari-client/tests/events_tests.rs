//! Event socket behaviour of the ARI client: routing, reconnect and give-up

use std::time::Duration;

use futures_util::SinkExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::oneshot;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rvoip_ari_client::{AriClient, AriConfig, ReconnectConfig};
use rvoip_bridge_core::{BridgeId, ChannelId, DepartureEvent, DepartureStream, SignalingBus};

async fn rest_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ari/asterisk/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"system": {"version": "20.5.0"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ari/bridges/b1/addChannel"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, listener: &TcpListener, max_attempts: Option<u32>) -> AriConfig {
    AriConfig {
        url: format!("{}/ari", server.uri()),
        websocket_url: format!("ws://{}/ari/events", listener.local_addr().unwrap()),
        password: "secret".to_string(),
        reconnect: ReconnectConfig {
            initial_delay_ms: 20,
            max_delay_ms: 20,
            multiplier: 2.0,
            max_attempts,
        },
        ..Default::default()
    }
}

fn left_bridge(bridge: &str, channel: &str) -> Message {
    Message::Text(
        json!({
            "type": "ChannelLeftBridge",
            "bridge": {"id": bridge, "channels": []},
            "channel": {"id": channel, "name": "PJSIP/alice-00000001", "state": "Up"}
        })
        .to_string(),
    )
}

async fn next_departure(departures: &mut DepartureStream) -> DepartureEvent {
    tokio::time::timeout(Duration::from_secs(5), departures.recv())
        .await
        .expect("departure delivered")
        .expect("stream open")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached");
}

#[tokio::test]
async fn test_departure_routed_from_socket() {
    let server = rest_server().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&server, &listener, None);
    let (send_tx, send_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        send_rx.await.ok();
        socket
            .send(Message::Text(json!({"type": "StasisStart"}).to_string()))
            .await
            .unwrap();
        socket.send(left_bridge("b9", "c9")).await.unwrap();
        socket.send(left_bridge("b1", "c1")).await.unwrap();
        std::future::pending::<()>().await;
    });

    let client = AriClient::connect(config).await.unwrap();
    assert!(client.events_connected());
    let mut departures = client.subscribe_departures(&BridgeId::from("b1")).await.unwrap();
    send_tx.send(()).unwrap();

    assert_eq!(
        next_departure(&mut departures).await,
        DepartureEvent::new(BridgeId::from("b1"), ChannelId::from("c1"))
    );
}

#[tokio::test]
async fn test_reconnect_keeps_streams_and_replays_missed_departures() {
    let server = rest_server().await;
    // c1 left while the socket was down; c2 is still in the bridge
    Mock::given(method("GET"))
        .and(path("/ari/bridges/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b1",
            "bridge_type": "mixing",
            "channels": ["c2"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&server, &listener, None);
    let (drop_tx, drop_rx) = oneshot::channel::<()>();
    let (accept_tx, accept_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let first = accept_async(stream).await.unwrap();
        drop_rx.await.ok();
        drop(first);

        accept_rx.await.ok();
        let (stream, _) = listener.accept().await.unwrap();
        let mut second = accept_async(stream).await.unwrap();
        second.send(left_bridge("b1", "c2")).await.unwrap();
        std::future::pending::<()>().await;
    });

    let client = AriClient::connect(config).await.unwrap();
    let b1 = BridgeId::from("b1");
    let mut departures = client.subscribe_departures(&b1).await.unwrap();
    client.add_channel_to_bridge(&b1, &ChannelId::from("c1")).await.unwrap();
    client.add_channel_to_bridge(&b1, &ChannelId::from("c2")).await.unwrap();

    drop_tx.send(()).unwrap();
    wait_until(|| !client.events_connected()).await;

    // The socket is down but the stream stays open
    assert_eq!(departures.try_recv(), Err(TryRecvError::Empty));
    let err = client
        .subscribe_departures(&BridgeId::from("b2"))
        .await
        .unwrap_err();
    assert!(err.is_signaling());

    accept_tx.send(()).unwrap();
    assert_eq!(next_departure(&mut departures).await.channel_id, ChannelId::from("c1"));
    assert_eq!(next_departure(&mut departures).await.channel_id, ChannelId::from("c2"));
    assert!(client.events_connected());
}

#[tokio::test]
async fn test_giving_up_closes_departure_streams() {
    let server = rest_server().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&server, &listener, Some(1));
    let (drop_tx, drop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = accept_async(stream).await.unwrap();
        drop_rx.await.ok();
        // Nothing listens on the port afterwards
        drop(socket);
        drop(listener);
    });

    let client = AriClient::connect(config).await.unwrap();
    let mut departures = client.subscribe_departures(&BridgeId::from("b1")).await.unwrap();
    drop_tx.send(()).unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), departures.recv())
        .await
        .expect("stream closed after giving up");
    assert!(closed.is_none());
    assert!(!client.events_connected());
    assert_eq!(client.router().subscriber_count(), 0);
}
