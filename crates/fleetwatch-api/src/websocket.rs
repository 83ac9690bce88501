//! Live update channel over WebSocket.
//!
//! [`LiveChannel`] is one physical connection: open it, pull frames until it
//! drops, open a new one. Reconnection policy lives in the core
//! connection manager, which owns the state machine around this type.
//!
//! # Envelope
//!
//! Every text frame is a JSON object, versioned by an optional `v` field
//! (absent means version 1):
//!
//! ```json
//! { "v": 1, "devices": [ ... ], "positions": [ ... ] }
//! { "logout": true }
//! ```
//!
//! Unknown keys (e.g. `events`) are ignored as long as at least one known
//! key is present.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::models::{DeviceRecord, PositionRecord, decode_records};

/// Highest envelope version this client understands.
pub const ENVELOPE_VERSION: u64 = 1;

// ── LiveMessage ──────────────────────────────────────────────────────

/// One decoded unit of the live stream. Each message is applied to the
/// store as an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
    DeviceUpdate(Vec<DeviceRecord>),
    PositionUpdate(Vec<PositionRecord>),
    /// The server revoked the session (`{"logout": true}`).
    AuthInvalid,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, rename = "v")]
    version: Option<u64>,
    #[serde(default)]
    devices: Option<Vec<Value>>,
    #[serde(default)]
    positions: Option<Vec<Value>>,
    #[serde(default)]
    logout: bool,
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// Decode one text frame into the messages it carries.
///
/// A logout flag wins over any payload in the same frame. Otherwise the
/// device update (if any) comes before the position update so positions of
/// newly announced devices land after their device.
pub fn decode_frame(text: &str) -> Result<Vec<LiveMessage>, Error> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })?;

    let version = envelope.version.unwrap_or(ENVELOPE_VERSION);
    if version > ENVELOPE_VERSION {
        return Err(Error::UnsupportedVersion {
            version,
            supported: ENVELOPE_VERSION,
        });
    }

    if envelope.logout {
        return Ok(vec![LiveMessage::AuthInvalid]);
    }

    let mut messages = Vec::with_capacity(2);
    if let Some(devices) = envelope.devices {
        messages.push(LiveMessage::DeviceUpdate(decode_records(devices, "device")));
    }
    if let Some(positions) = envelope.positions {
        messages.push(LiveMessage::PositionUpdate(decode_records(
            positions, "position",
        )));
    }

    if messages.is_empty() {
        let keys = envelope
            .other
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        return Err(Error::UnrecognizedMessage { keys });
    }

    Ok(messages)
}

// ── LiveChannel ──────────────────────────────────────────────────────

/// A single open WebSocket connection to the server's update socket.
pub struct LiveChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LiveChannel {
    /// Perform the WebSocket handshake.
    ///
    /// `cookie` is sent as the `Cookie` header of the upgrade request; the
    /// server authenticates the channel with the session it names. A
    /// handshake answered with HTTP 401 maps to [`Error::SessionExpired`].
    pub async fn open(url: &Url, cookie: Option<&str>) -> Result<Self, Error> {
        tracing::info!(url = %url, "opening live channel");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocket(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(cookie_val) = cookie {
            request = request.with_header("Cookie", cookie_val);
        }

        match tokio_tungstenite::connect_async(request).await {
            Ok((stream, _response)) => {
                tracing::info!("live channel open");
                Ok(Self { stream })
            }
            Err(tungstenite::Error::Http(resp))
                if resp.status() == tungstenite::http::StatusCode::UNAUTHORIZED =>
            {
                Err(Error::SessionExpired)
            }
            Err(e) => Err(Error::WebSocket(e.to_string())),
        }
    }

    /// Next text frame. `None` once the server closed the channel or the
    /// stream ended; control and binary frames are skipped.
    pub async fn next_frame(&mut self) -> Option<Result<String, Error>> {
        loop {
            match self.stream.next().await? {
                Ok(tungstenite::Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(tungstenite::Message::Close(frame)) => {
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "live channel closed by server");
                    } else {
                        tracing::info!("live channel closed by server (no payload)");
                    }
                    return None;
                }
                Ok(tungstenite::Message::Ping(_)) => {
                    // tungstenite queues the pong itself
                    tracing::trace!("live channel ping");
                }
                Ok(_) => {}
                Err(e) => return Some(Err(Error::WebSocket(e.to_string()))),
            }
        }
    }

    /// Send a close frame. Errors are irrelevant at this point.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "error while closing live channel");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
