// ── Connection manager ──
//
// Drives the live channel through its lifecycle:
//
//   Idle → Connecting → Open → (Closed | Errored) → backoff → Connecting …
//
// Every successful open is followed by a full REST resync. Live frames are
// decoded and applied as one store batch each. Authentication loss (from
// the transport or an explicit server message) clears the store, returns
// to Idle and is announced on `auth_events()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fleetwatch_api::{LiveMessage, decode_frame};
use serde::Serialize;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::{ReconnectConfig, backoff_delay};
use super::connector::{Connector, LiveSource};
use crate::sync::FleetSync;

// ── Public state types ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    /// Closed by the server; a reconnect is scheduled.
    Closed,
    /// Failed; a reconnect is scheduled unless the retry limit was hit.
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    pub attempt: u32,
}

impl ConnectionStatus {
    const IDLE: Self = Self {
        state: ConnectionState::Idle,
        attempt: 0,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The server rejected the session; the user must log in again.
    AuthLost { reason: String },
    /// `logout()` completed.
    LoggedOut,
}

// ── ConnectionManager ───────────────────────────────────────────────

/// Handle to the live connection. Cheaply cloneable.
pub struct ConnectionManager<C: Connector> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ManagerInner<C: Connector> {
    connector: C,
    sync: Arc<FleetSync>,
    reconnect: ReconnectConfig,
    status: watch::Sender<ConnectionStatus>,
    auth_events: broadcast::Sender<AuthEvent>,
    session: Mutex<Option<Session>>,
    /// Set when the retry limit stopped the loop; cleared by `connect()`.
    exhausted: AtomicBool,
}

/// One run of the connection loop.
struct Session {
    cancel: CancellationToken,
    retry_now: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, sync: Arc<FleetSync>, reconnect: ReconnectConfig) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::IDLE);
        let (auth_events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                sync,
                reconnect,
                status,
                auth_events,
                session: Mutex::new(None),
                exhausted: AtomicBool::new(false),
            }),
        }
    }

    pub fn sync(&self) -> &Arc<FleetSync> {
        &self.inner.sync
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    pub fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.auth_events.subscribe()
    }

    /// `true` once the loop stopped after `max_retries` failed attempts.
    /// Published before the final `Errored` status.
    pub fn gave_up(&self) -> bool {
        self.inner.exhausted.load(Ordering::Acquire)
    }

    /// Start the connection loop.
    ///
    /// No-op while connecting or open. While a reconnect delay is pending
    /// the delay is cut short. Must be called within a Tokio runtime.
    pub fn connect(&self) {
        let mut session = self.inner.lock_session();
        if let Some(running) = session.as_ref() {
            if !running.handle.is_finished() {
                match self.state() {
                    ConnectionState::Closed | ConnectionState::Errored => {
                        debug!("reconnect requested, skipping backoff");
                        running.retry_now.notify_one();
                        return;
                    }
                    ConnectionState::Connecting | ConnectionState::Open => {
                        debug!(state = %self.state(), "connect ignored");
                        return;
                    }
                    // loop is winding down after auth loss
                    ConnectionState::Idle => running.cancel.cancel(),
                }
            }
        }

        self.inner.exhausted.store(false, Ordering::Release);
        self.inner.set_status(ConnectionState::Connecting, 0);
        let cancel = CancellationToken::new();
        let retry_now = Arc::new(Notify::new());
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            cancel.clone(),
            Arc::clone(&retry_now),
        ));
        *session = Some(Session {
            cancel,
            retry_now,
            handle,
        });
    }

    /// Stop the loop, end the server session, clear the store and go Idle.
    pub async fn logout(&self) {
        let running = self.inner.lock_session().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "connection task ended abnormally");
            }
        }

        if let Err(e) = self.inner.connector.close_session().await {
            // best effort: the local state is torn down regardless
            warn!(error = %e, "failed to close server session");
        }

        self.inner.sync.clear();
        self.inner.set_status(ConnectionState::Idle, 0);
        let _ = self.inner.auth_events.send(AuthEvent::LoggedOut);
        info!("logged out");
    }

    /// Stop the loop without touching the server session or the store.
    pub async fn shutdown(&self) {
        let running = self.inner.lock_session().take();
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.handle.await;
        }
        self.inner.set_status(ConnectionState::Idle, 0);
    }
}

impl<C: Connector> ManagerInner<C> {
    fn set_status(&self, state: ConnectionState, attempt: u32) {
        let next = ConnectionStatus { state, attempt };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current.state, to = %state, attempt, "connection state");
            *current = next;
            true
        });
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn auth_lost(&self, reason: String) {
        warn!(%reason, "authentication lost, clearing fleet state");
        self.sync.clear();
        self.set_status(ConnectionState::Idle, 0);
        let _ = self.auth_events.send(AuthEvent::AuthLost { reason });
    }
}

// ── Connection loop ─────────────────────────────────────────────────

enum Outcome {
    /// Channel ended. `was_open` resets the attempt counter.
    Ended { was_open: bool, errored: bool },
    AuthLost(String),
}

async fn run_loop<C: Connector>(
    inner: Arc<ManagerInner<C>>,
    cancel: CancellationToken,
    retry_now: Arc<Notify>,
) {
    let mut failures: u32 = 0;

    loop {
        inner.set_status(ConnectionState::Connecting, failures);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = run_session(&inner) => outcome,
        };

        let (was_open, errored) = match outcome {
            Outcome::AuthLost(reason) => {
                inner.auth_lost(reason);
                return;
            }
            Outcome::Ended { was_open, errored } => (was_open, errored),
        };

        if was_open {
            failures = 0;
        }
        let state = if errored {
            ConnectionState::Errored
        } else {
            ConnectionState::Closed
        };

        if let Some(max) = inner.reconnect.max_retries {
            if failures >= max {
                error!(max_retries = max, "reconnection limit reached, giving up");
                inner.exhausted.store(true, Ordering::Release);
                inner.set_status(ConnectionState::Errored, failures);
                return;
            }
        }

        let delay = backoff_delay(failures, &inner.reconnect);
        failures = failures.saturating_add(1);
        inner.set_status(state, failures);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = failures,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = retry_now.notified() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("connection loop exiting");
}

/// One channel lifetime: open, resync, pump frames until it ends.
async fn run_session<C: Connector>(inner: &ManagerInner<C>) -> Outcome {
    let mut channel = match inner.connector.open().await {
        Ok(channel) => channel,
        Err(e) if e.is_auth_expired() => return Outcome::AuthLost(e.to_string()),
        Err(e) => {
            warn!(error = %e, "failed to open live channel");
            return Outcome::Ended {
                was_open: false,
                errored: true,
            };
        }
    };
    inner.set_status(ConnectionState::Open, 0);

    match inner.connector.snapshot().await {
        Ok((devices, positions)) => {
            let change = inner.sync.replace_all(devices, positions);
            info!(
                version = change.version,
                devices = inner.sync.store().device_count(),
                "resynced fleet"
            );
        }
        Err(e) if e.is_auth_expired() => {
            channel.close().await;
            return Outcome::AuthLost(e.to_string());
        }
        Err(e) => warn!(error = %e, "resync failed, continuing on live updates"),
    }

    loop {
        let text = match channel.next_frame().await {
            None => {
                info!("live channel closed");
                return Outcome::Ended {
                    was_open: true,
                    errored: false,
                };
            }
            Some(Err(e)) if e.is_auth_expired() => return Outcome::AuthLost(e.to_string()),
            Some(Err(e)) => {
                warn!(error = %e, "live channel error");
                return Outcome::Ended {
                    was_open: true,
                    errored: true,
                };
            }
            Some(Ok(text)) => text,
        };

        let messages = match decode_frame(&text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "dropping undecodable live message");
                continue;
            }
        };

        if dispatch(&inner.sync, messages).is_err() {
            channel.close().await;
            return Outcome::AuthLost("session invalidated by server".into());
        }
    }
}

struct AuthInvalid;

/// Apply one frame's messages as a single batch.
fn dispatch(sync: &FleetSync, messages: Vec<LiveMessage>) -> Result<(), AuthInvalid> {
    let mut devices = Vec::new();
    let mut positions = Vec::new();
    for message in messages {
        match message {
            LiveMessage::AuthInvalid => return Err(AuthInvalid),
            LiveMessage::DeviceUpdate(batch) => devices.extend(batch),
            LiveMessage::PositionUpdate(batch) => positions.extend(batch),
        }
    }

    let change = sync.apply_batch(devices, positions);
    if !change.is_empty() || change.stale > 0 || change.rejected > 0 {
        debug!(
            version = change.version,
            devices = change.devices.len(),
            positions = change.positions.len(),
            stale = change.stale,
            rejected = change.rejected,
            "applied live batch"
        );
    }
    Ok(())
}
