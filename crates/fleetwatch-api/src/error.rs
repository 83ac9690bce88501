use thiserror::Error;

/// Top-level error type for the `fleetwatch-api` crate.
///
/// Covers every failure mode of the transport surfaces: session
/// authentication, HTTP snapshots, the live WebSocket channel, and frame
/// decoding. `fleetwatch-core` maps these into its own error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the credentials outright.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session is missing, expired, or revoked (HTTP 401).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status that is not an auth failure.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// Handshake or socket-level failure on the live channel.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A well-formed frame that carries none of the known message keys.
    #[error("Unrecognized live message (keys: {keys})")]
    UnrecognizedMessage { keys: String },

    /// Envelope version newer than this client understands.
    #[error("Unsupported envelope version {version} (supported: {supported})")]
    UnsupportedVersion { version: u64, supported: u64 },
}

impl Error {
    /// Returns `true` if this error means the session is gone and only a
    /// fresh authentication can help.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::SessionExpired => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocket(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` for frame-level decode failures. These are local to a
    /// single message and never justify closing the channel.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Deserialization { .. }
                | Self::UnrecognizedMessage { .. }
                | Self::UnsupportedVersion { .. }
        )
    }
}
