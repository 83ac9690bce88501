// ── Runtime sync configuration ──
//
// Describes how to reach a tracking server and how the engine behaves.
// Carries credential data and tuning, but never touches disk: the CLI
// builds a `SyncConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::connection::ReconnectConfig;
use crate::filter::{FilterCriteria, ViewOptions};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). REST only.
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for fleetwatch_api::TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for syncing with a single server.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL (e.g. `https://track.example.com`).
    pub url: Url,
    /// Session token. Without one, an existing session cookie is required.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout for REST calls.
    pub timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub view: ViewOptions,
    /// Criteria active when the engine starts.
    pub criteria: FilterCriteria,
    /// Directory holding `<category>.svg` icons.
    pub assets_dir: Option<PathBuf>,
    /// How long the map waits for icons before substituting the fallback.
    pub asset_timeout: Duration,
}

impl SyncConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            view: ViewOptions::default(),
            criteria: FilterCriteria::default(),
            assets_dir: None,
            asset_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub(crate) fn transport(&self) -> fleetwatch_api::TransportConfig {
        fleetwatch_api::TransportConfig {
            tls: (&self.tls).into(),
            timeout: self.timeout,
            cookie_jar: None,
        }
    }
}
