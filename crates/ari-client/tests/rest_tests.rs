//! REST behaviour of the ARI client against a mock Asterisk

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rvoip_ari_client::{AriClient, AriConfig, AriError};
use rvoip_bridge_core::{BridgeId, ChannelId, EndpointAddress, SignalingBus, SoundRef};

async fn client_for(server: &MockServer) -> AriClient {
    let config = AriConfig {
        url: format!("{}/ari", server.uri()),
        username: "asterisk".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    };
    AriClient::new(config).expect("valid config")
}

#[tokio::test]
async fn test_create_bridge_posts_mixing_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ari/bridges"))
        .and(query_param("type", "mixing"))
        .and(basic_auth("asterisk", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "bridge-42",
            "technology": "simple_bridge",
            "bridge_type": "mixing",
            "bridge_class": "stasis",
            "channels": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let bridge_id = client.create_bridge("mixing").await.unwrap();
    assert_eq!(bridge_id, BridgeId::from("bridge-42"));
}

#[tokio::test]
async fn test_create_and_dial_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ari/channels/create"))
        .and(query_param("endpoint", "PJSIP/alice"))
        .and(query_param("app", "ARI"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1700000000.1",
            "name": "PJSIP/alice-00000001",
            "state": "Down"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ari/channels/1700000000.1/dial"))
        .and(query_param("caller", "ARI"))
        .and(query_param("timeout", "30"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let endpoint = EndpointAddress::qualify("alice", "PJSIP");
    let channel_id = client.create_channel(&endpoint).await.unwrap();
    assert_eq!(channel_id, ChannelId::from("1700000000.1"));

    client
        .dial_channel(&channel_id, "ARI", Duration::from_secs(30))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bridge_membership_and_attach() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ari/bridges/bridge-1/addChannel"))
        .and(query_param("channel", "chan-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ari/bridges/bridge-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "bridge-1",
            "channels": ["chan-1", "chan-2"]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let bridge = BridgeId::from("bridge-1");
    client
        .add_channel_to_bridge(&bridge, &ChannelId::from("chan-1"))
        .await
        .unwrap();
    let channels = client.bridge_channel_ids(&bridge).await.unwrap();
    assert_eq!(channels, vec![ChannelId::from("chan-1"), ChannelId::from("chan-2")]);
}

#[tokio::test]
async fn test_play_hangup_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ari/bridges/bridge-1/play"))
        .and(query_param("media", "sound:confbridge-join"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "pb-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/ari/channels/chan-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/ari/bridges/bridge-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let bridge = BridgeId::from("bridge-1");
    // No event socket yet, so the bus refuses to hand out a departure stream
    let err = client.subscribe_departures(&bridge).await.unwrap_err();
    assert!(err.is_signaling());
    let _departures = client.router().subscribe(&bridge);
    assert_eq!(client.router().subscriber_count(), 1);

    client
        .play_sound(&bridge, &SoundRef::new("sound:confbridge-join"))
        .await
        .unwrap();
    client.hangup_channel(&ChannelId::from("chan-1")).await.unwrap();
    client.delete_bridge(&bridge).await.unwrap();

    // Deleting the bridge drops its departure subscription
    assert_eq!(client.router().subscriber_count(), 0);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/ari/channels/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Channel not found"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.hangup("missing").await.unwrap_err();
    assert!(err.is_not_found());
    match &err {
        AriError::Status { status, body } => {
            assert_eq!(*status, 404);
            assert!(body.contains("Channel not found"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let bridged = client
        .hangup_channel(&ChannelId::from("missing"))
        .await
        .unwrap_err();
    assert!(bridged.is_signaling());
}

#[tokio::test]
async fn test_unauthorized_info_request_fails_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ari/asterisk/info"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authentication required"))
        .mount(&server)
        .await;

    let config = AriConfig {
        url: format!("{}/ari", server.uri()),
        ..Default::default()
    };
    let err = AriClient::connect(config).await.unwrap_err();
    assert!(matches!(err, AriError::Status { status: 401, .. }));
}
