//! ARI client
//!
//! Bridge and channel operations go over ARI's REST interface; departures
//! arrive on its event WebSocket and are routed to the monitor of the bridge
//! they concern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, Response};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use rvoip_bridge_core::{
    BridgeError, BridgeId, ChannelId, DepartureStream, EndpointAddress, Result as BridgeResult,
    SignalingBus, SoundRef,
};

use crate::config::{AriConfig, ReconnectConfig};
use crate::error::{AriError, Result};
use crate::models::{AriEvent, Bridge, Channel};
use crate::router::EventRouter;

type EventSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client for one Stasis application on one Asterisk
#[derive(Debug)]
pub struct AriClient {
    config: AriConfig,
    base: Url,
    http: reqwest::Client,
    router: Arc<EventRouter>,
    /// True while the event socket is open
    connected: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl AriClient {
    /// Build a client without touching the network
    pub fn new(config: AriConfig) -> Result<Self> {
        config.validate()?;
        let base = config.rest_base()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            config,
            base,
            http,
            router: Arc::new(EventRouter::new()),
            connected: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        })
    }

    /// Build a client, verify the REST interface answers and open the event
    /// socket.
    pub async fn connect(config: AriConfig) -> Result<Arc<Self>> {
        let client = Arc::new(Self::new(config)?);
        tracing::info!("Connecting to ARI at {}", client.config.url);

        let info = client.asterisk_info().await?;
        if let Some(version) = info.pointer("/system/version").and_then(|v| v.as_str()) {
            tracing::info!("Connected to Asterisk {}", version);
        } else {
            tracing::info!("Connected to Asterisk");
        }

        client.open_events().await?;
        Ok(client)
    }

    pub fn config(&self) -> &AriConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Whether the event socket is currently open
    pub fn events_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Stop the event reader and close every departure stream
    pub async fn close(&self) {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::Relaxed);
        self.router.close_all();
        tracing::info!("ARI client closed");
    }

    /// Open the event WebSocket and start routing events.
    ///
    /// A failure here is returned to the caller. Once open, a dropped socket
    /// is re-opened with backoff; departure streams are only closed if
    /// reconnecting gives up.
    pub async fn open_events(self: &Arc<Self>) -> Result<()> {
        let url = self.config.events_url()?;
        let (socket, _response) = connect_async(url.as_str()).await?;
        self.connected.store(true, Ordering::Relaxed);
        tracing::info!("ARI event socket open for application {}", self.config.application);

        let reader = EventReader {
            client: Arc::downgrade(self),
            url,
            reconnect: self.config.reconnect.clone(),
            router: Arc::clone(&self.router),
            connected: Arc::clone(&self.connected),
        };
        let handle = tokio::spawn(reader.run(socket));

        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        self.http
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AriError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            })
        }
    }

    /// `GET /asterisk/info`
    pub async fn asterisk_info(&self) -> Result<serde_json::Value> {
        let response = self.send(self.request(Method::GET, "asterisk/info")).await?;
        Ok(response.json().await?)
    }

    /// `POST /bridges?type=..`
    pub async fn create_bridge_resource(&self, bridge_type: &str) -> Result<Bridge> {
        let request = self
            .request(Method::POST, "bridges")
            .query(&[("type", bridge_type)]);
        Ok(self.send(request).await?.json().await?)
    }

    /// `GET /bridges/{id}`
    pub async fn get_bridge(&self, bridge_id: &str) -> Result<Bridge> {
        let request = self.request(Method::GET, &format!("bridges/{}", bridge_id));
        Ok(self.send(request).await?.json().await?)
    }

    /// `DELETE /bridges/{id}`
    pub async fn destroy_bridge(&self, bridge_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("bridges/{}", bridge_id));
        self.send(request).await?;
        Ok(())
    }

    /// `POST /channels/create?endpoint=..&app=..`
    pub async fn create_channel_resource(&self, endpoint: &str) -> Result<Channel> {
        let request = self
            .request(Method::POST, "channels/create")
            .query(&[("endpoint", endpoint), ("app", self.config.application.as_str())]);
        Ok(self.send(request).await?.json().await?)
    }

    /// `POST /channels/{id}/dial?caller=..&timeout=..`
    pub async fn dial(&self, channel_id: &str, caller: &str, timeout: Duration) -> Result<()> {
        let seconds = timeout.as_secs().max(1).to_string();
        let request = self
            .request(Method::POST, &format!("channels/{}/dial", channel_id))
            .query(&[("caller", caller), ("timeout", seconds.as_str())])
            .timeout(timeout + self.config.request_timeout());
        self.send(request).await?;
        Ok(())
    }

    /// `POST /bridges/{id}/addChannel?channel=..`
    pub async fn add_channel(&self, bridge_id: &str, channel_id: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("bridges/{}/addChannel", bridge_id))
            .query(&[("channel", channel_id)]);
        self.send(request).await?;
        Ok(())
    }

    /// `DELETE /channels/{id}`
    pub async fn hangup(&self, channel_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("channels/{}", channel_id));
        self.send(request).await?;
        Ok(())
    }

    /// `POST /bridges/{id}/play?media=..`
    pub async fn play(&self, bridge_id: &str, media: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("bridges/{}/play", bridge_id))
            .query(&[("media", media)]);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl SignalingBus for AriClient {
    async fn create_bridge(&self, bridge_type: &str) -> BridgeResult<BridgeId> {
        let bridge = self
            .create_bridge_resource(bridge_type)
            .await
            .map_err(|e| e.into_bridge_error("create_bridge"))?;
        Ok(BridgeId::new(bridge.id))
    }

    async fn delete_bridge(&self, bridge_id: &BridgeId) -> BridgeResult<()> {
        self.router.unsubscribe(bridge_id);
        self.destroy_bridge(bridge_id.as_str())
            .await
            .map_err(|e| e.into_bridge_error("delete_bridge"))
    }

    async fn create_channel(&self, endpoint: &EndpointAddress) -> BridgeResult<ChannelId> {
        let channel = self
            .create_channel_resource(endpoint.as_str())
            .await
            .map_err(|e| e.into_bridge_error("create_channel"))?;
        Ok(ChannelId::new(channel.id))
    }

    async fn dial_channel(
        &self,
        channel_id: &ChannelId,
        caller: &str,
        timeout: Duration,
    ) -> BridgeResult<()> {
        self.dial(channel_id.as_str(), caller, timeout)
            .await
            .map_err(|e| e.into_bridge_error("dial_channel"))
    }

    async fn add_channel_to_bridge(
        &self,
        bridge_id: &BridgeId,
        channel_id: &ChannelId,
    ) -> BridgeResult<()> {
        self.add_channel(bridge_id.as_str(), channel_id.as_str())
            .await
            .map_err(|e| e.into_bridge_error("add_channel_to_bridge"))?;
        self.router.track(bridge_id, channel_id);
        Ok(())
    }

    async fn hangup_channel(&self, channel_id: &ChannelId) -> BridgeResult<()> {
        self.hangup(channel_id.as_str())
            .await
            .map_err(|e| e.into_bridge_error("hangup_channel"))
    }

    async fn bridge_channel_ids(&self, bridge_id: &BridgeId) -> BridgeResult<Vec<ChannelId>> {
        let bridge = self
            .get_bridge(bridge_id.as_str())
            .await
            .map_err(|e| e.into_bridge_error("bridge_channel_ids"))?;
        Ok(bridge.channels.into_iter().map(ChannelId::new).collect())
    }

    async fn subscribe_departures(&self, bridge_id: &BridgeId) -> BridgeResult<DepartureStream> {
        if !self.events_connected() {
            return Err(BridgeError::signaling(
                "subscribe_departures",
                "ARI event socket is not connected",
            ));
        }
        Ok(self.router.subscribe(bridge_id))
    }

    async fn play_sound(&self, bridge_id: &BridgeId, sound: &SoundRef) -> BridgeResult<()> {
        self.play(bridge_id.as_str(), sound.as_str())
            .await
            .map_err(|e| e.into_bridge_error("play_sound"))
    }
}

/// Owns the event socket for the lifetime of the client
struct EventReader {
    client: Weak<AriClient>,
    url: Url,
    reconnect: ReconnectConfig,
    router: Arc<EventRouter>,
    connected: Arc<AtomicBool>,
}

impl EventReader {
    async fn run(self, mut socket: EventSocket) {
        loop {
            self.read(&mut socket).await;
            self.connected.store(false, Ordering::Relaxed);
            tracing::warn!("ARI event socket lost, reconnecting");

            match self.reopen().await {
                Some(next) => {
                    socket = next;
                    self.connected.store(true, Ordering::Relaxed);
                    self.resync().await;
                }
                None => {
                    // Without events no departure can be observed; let monitors know
                    tracing::error!("Gave up on the ARI event socket, closing departure streams");
                    self.router.close_all();
                    return;
                }
            }
        }
    }

    async fn read(&self, socket: &mut EventSocket) {
        while let Some(message) = socket.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<AriEvent>(&text) {
                    Ok(event) => {
                        self.router.dispatch(event);
                    }
                    Err(e) => tracing::warn!("Undecodable ARI event: {}", e),
                },
                Ok(Message::Close(frame)) => {
                    tracing::warn!("ARI event socket closed by server: {:?}", frame);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("ARI event socket error: {}", e);
                    return;
                }
            }
        }
    }

    async fn reopen(&self) -> Option<EventSocket> {
        let mut attempt = 0;
        while self.reconnect.allows(attempt) {
            tokio::time::sleep(self.reconnect.delay_for_attempt(attempt)).await;
            if self.client.strong_count() == 0 {
                return None;
            }
            match connect_async(self.url.as_str()).await {
                Ok((socket, _response)) => {
                    tracing::info!("ARI event socket re-opened after {} attempts", attempt + 1);
                    return Some(socket);
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!("Event socket reconnect attempt {} failed: {}", attempt, e);
                }
            }
        }
        None
    }

    /// Replay departures that happened while the socket was down
    async fn resync(&self) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        for bridge_id in self.router.bridges() {
            match client.get_bridge(bridge_id.as_str()).await {
                Ok(bridge) => {
                    let present: Vec<ChannelId> =
                        bridge.channels.into_iter().map(ChannelId::new).collect();
                    let replayed = self.router.reconcile(&bridge_id, &present);
                    if replayed > 0 {
                        tracing::info!("Replayed {} departures for bridge {}", replayed, bridge_id);
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!("Bridge {} vanished while events were down", bridge_id);
                    self.router.unsubscribe(&bridge_id);
                }
                Err(e) => tracing::warn!("Could not resync bridge {}: {}", bridge_id, e),
            }
        }
    }
}
