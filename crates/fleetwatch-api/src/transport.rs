// HTTP transport settings shared by the REST client.
//
// A session-authenticated client always owns a cookie jar: the live channel
// reads the session cookie back out of it for the WebSocket upgrade.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;
use reqwest::cookie::Jar;

use crate::error::Error;

const USER_AGENT: &str = concat!("fleetwatch/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the TCP/TLS connect phase, so a dead server fails fast
/// and the reconnect backoff takes over.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Certificate trust for REST calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    System,
    /// Trust an extra CA from a PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate.
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Jar to share with another client. A fresh one is made when `None`.
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            cookie_jar: None,
        }
    }
}

/// A client bound to the jar its session cookie lands in.
pub(crate) struct SessionHttp {
    pub http: reqwest::Client,
    pub jar: Arc<Jar>,
}

impl TransportConfig {
    /// Client with a cookie jar attached, reusing `cookie_jar` if set.
    pub(crate) fn session_client(&self) -> Result<SessionHttp, Error> {
        let jar = self.cookie_jar.clone().unwrap_or_default();
        let http = finish(self.builder()?.cookie_provider(Arc::clone(&jar)))?;
        Ok(SessionHttp { http, jar })
    }

    fn connect_timeout(&self) -> Duration {
        self.timeout.min(MAX_CONNECT_TIMEOUT)
    }

    fn builder(&self) -> Result<ClientBuilder, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout())
            .user_agent(USER_AGENT);

        Ok(match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => {
                tracing::warn!("TLS certificate verification disabled for REST calls");
                builder.danger_accept_invalid_certs(true)
            }
        })
    }
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::Tls(format!("cannot read CA file {}: {e}", path.display())))?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("{} is not a PEM certificate: {e}", path.display())))
}

fn finish(builder: ClientBuilder) -> Result<reqwest::Client, Error> {
    builder
        .build()
        .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn session_client_reuses_shared_jar() {
        let jar = Arc::new(Jar::default());
        let config = TransportConfig {
            cookie_jar: Some(Arc::clone(&jar)),
            ..TransportConfig::default()
        };
        let session = config.session_client().unwrap();
        assert!(Arc::ptr_eq(&session.jar, &jar));
    }

    #[test]
    fn connect_timeout_is_capped() {
        let slow = TransportConfig {
            timeout: Duration::from_secs(120),
            ..TransportConfig::default()
        };
        let quick = TransportConfig {
            timeout: Duration::from_secs(3),
            ..TransportConfig::default()
        };
        assert_eq!(slow.connect_timeout(), MAX_CONNECT_TIMEOUT);
        assert_eq!(quick.connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        let err = config.session_client().err().unwrap();
        assert!(matches!(err, Error::Tls(ref m) if m.contains("/nonexistent/ca.pem")));
    }
}
