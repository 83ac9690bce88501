// ── Transport seam ──
//
// The connection manager drives any `Connector`. Production uses
// `HttpConnector` (REST + WebSocket via `fleetwatch-api`); tests plug in
// scripted in-memory connectors.

use std::future::Future;

use fleetwatch_api::{DeviceRecord, Error, FleetClient, LiveChannel, PositionRecord};
use secrecy::SecretString;

use crate::config::SyncConfig;
use crate::error::CoreError;

/// An open live channel.
pub trait LiveSource: Send + 'static {
    /// Next text frame. `None` once the channel has closed.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<String, Error>>> + Send;

    /// Close gracefully.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens live channels and fetches authoritative snapshots.
pub trait Connector: Send + Sync + 'static {
    type Channel: LiveSource;

    /// Establish (or reuse) a session and open the live channel.
    fn open(&self) -> impl Future<Output = Result<Self::Channel, Error>> + Send;

    /// Full device and position lists, for resync.
    fn snapshot(
        &self,
    ) -> impl Future<Output = Result<(Vec<DeviceRecord>, Vec<PositionRecord>), Error>> + Send;

    /// End the server-side session.
    fn close_session(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

// ── Production connector ────────────────────────────────────────────

impl LiveSource for LiveChannel {
    async fn next_frame(&mut self) -> Option<Result<String, Error>> {
        LiveChannel::next_frame(self).await
    }

    async fn close(self) {
        LiveChannel::close(self).await;
    }
}

/// REST session + WebSocket channel against a real server.
pub struct HttpConnector {
    client: FleetClient,
    token: Option<SecretString>,
}

impl HttpConnector {
    pub fn new(client: FleetClient, token: Option<SecretString>) -> Self {
        Self { client, token }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, CoreError> {
        let client = FleetClient::new(config.url.clone(), &config.transport())?;
        Ok(Self::new(client, config.token.clone()))
    }

    pub fn client(&self) -> &FleetClient {
        &self.client
    }

    /// Make sure the cookie jar holds a live session.
    pub async fn ensure_session(&self) -> Result<(), Error> {
        if self.client.cookie_header().is_some() {
            return Ok(());
        }
        let user = match &self.token {
            Some(token) => self.client.open_session(token).await?,
            None => self.client.current_session().await?,
        };
        tracing::info!(user_id = user.id, user = %user.name, "session established");
        Ok(())
    }
}

impl Connector for HttpConnector {
    type Channel = LiveChannel;

    async fn open(&self) -> Result<LiveChannel, Error> {
        self.ensure_session().await?;
        let url = self.client.socket_url()?;
        let cookie = self.client.cookie_header();
        LiveChannel::open(&url, cookie.as_deref()).await
    }

    async fn snapshot(&self) -> Result<(Vec<DeviceRecord>, Vec<PositionRecord>), Error> {
        tokio::try_join!(self.client.list_devices(), self.client.list_positions())
    }

    async fn close_session(&self) -> Result<(), Error> {
        self.client.close_session().await
    }
}
