// REST client for the tracking server
//
// Wraps `reqwest::Client` with URL construction, status mapping and the
// session cookie needed by the live channel. Only the endpoints the sync
// engine consumes are exposed: session bootstrap/teardown and the device
// and position snapshots.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::cookie::{CookieStore, Jar};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{DeviceRecord, PositionRecord, SessionUser, decode_records};
use crate::transport::TransportConfig;

/// HTTP client for the tracking server's REST API.
///
/// All paths are resolved under `<base_url>/api/`. A cookie jar is always
/// attached when built through [`new`](Self::new) because the live channel
/// authenticates with the session cookie obtained from `/api/session`.
pub struct FleetClient {
    http: reqwest::Client,
    base_url: Url,
    cookie_jar: Option<Arc<Jar>>,
}

impl FleetClient {
    /// Create a session-capable client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let session = transport.session_client()?;
        Ok(Self {
            http: session.http,
            base_url: normalize_base(base_url),
            cookie_jar: Some(session.jar),
        })
    }

    /// Create a client around a pre-built `reqwest::Client` (tests, shared
    /// connection pools). No cookie jar is tracked.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            cookie_jar: None,
        }
    }

    /// The server base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Open a session with a bearer-style session token
    /// (`GET /api/session?token=…`). The response sets the session cookie.
    pub async fn open_session(&self, token: &SecretString) -> Result<SessionUser, Error> {
        let mut url = self.api_url("session")?;
        url.query_pairs_mut()
            .append_pair("token", token.expose_secret());
        debug!(path = url.path(), "opening session");

        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "session token rejected".into(),
            });
        }
        parse_response(resp).await
    }

    /// Fetch the user bound to the current session cookie.
    pub async fn current_session(&self) -> Result<SessionUser, Error> {
        let url = self.api_url("session")?;
        self.get_json(url).await
    }

    /// Tear down the server-side session (`DELETE /api/session`).
    pub async fn close_session(&self) -> Result<(), Error> {
        let url = self.api_url("session")?;
        debug!("closing session");
        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Http {
            status: status.as_u16(),
            body,
        })
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Full device snapshot. Undecodable elements are dropped.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.api_url("devices")?;
        let values: Vec<Value> = self.get_json(url).await?;
        Ok(decode_records(values, "device"))
    }

    /// Latest-position snapshot. Undecodable elements are dropped.
    pub async fn list_positions(&self) -> Result<Vec<PositionRecord>, Error> {
        let url = self.api_url("positions")?;
        let values: Vec<Value> = self.get_json(url).await?;
        Ok(decode_records(values, "position"))
    }

    // ── Live channel helpers ─────────────────────────────────────────

    /// The `Cookie` header value for the WebSocket upgrade request, if the
    /// jar holds a session cookie for the server.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    /// `ws(s)://host[:port]/<base path>api/socket`
    pub fn socket_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("socket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocket(format!("cannot derive socket URL from {url}")))?;
        Ok(url)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("api/{path}"))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        trace!(path = url.path(), "GET");
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

/// Map auth statuses, surface other failures with their body, and decode
/// the success body.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    match status {
        StatusCode::UNAUTHORIZED => return Err(Error::SessionExpired),
        StatusCode::FORBIDDEN => {
            return Err(Error::Authentication {
                message: "access denied".into(),
            });
        }
        _ => {}
    }

    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
