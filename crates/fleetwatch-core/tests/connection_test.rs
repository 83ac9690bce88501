#![allow(clippy::unwrap_used)]
//! Connection manager lifecycle against a scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetwatch_api::{DeviceRecord, Error, PositionRecord};
use fleetwatch_core::{
    AuthEvent, ConnectionManager, ConnectionState, Connector, DeviceId, FleetSync, LiveSource,
    ReconnectConfig, ViewOptions,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

// ── Scripted transport ──────────────────────────────────────────────

type FrameTx = mpsc::UnboundedSender<Result<String, Error>>;

struct FakeChannel {
    frames: mpsc::UnboundedReceiver<Result<String, Error>>,
}

impl LiveSource for FakeChannel {
    async fn next_frame(&mut self) -> Option<Result<String, Error>> {
        self.frames.recv().await
    }

    async fn close(self) {}
}

fn channel() -> (FrameTx, FakeChannel) {
    let (tx, frames) = mpsc::unbounded_channel();
    (tx, FakeChannel { frames })
}

#[derive(Default)]
struct Shared {
    opens: Mutex<VecDeque<Result<FakeChannel, Error>>>,
    devices: Mutex<Vec<DeviceRecord>>,
    snapshot_expired: Mutex<bool>,
    open_calls: AtomicUsize,
    session_closes: AtomicUsize,
}

#[derive(Clone, Default)]
struct FakeConnector(Arc<Shared>);

impl FakeConnector {
    fn push_open(&self, result: Result<FakeChannel, Error>) {
        self.0.opens.lock().unwrap().push_back(result);
    }

    fn push_channel(&self) -> FrameTx {
        let (tx, ch) = channel();
        self.push_open(Ok(ch));
        tx
    }

    fn set_devices(&self, ids: &[i64]) {
        *self.0.devices.lock().unwrap() = ids.iter().map(|&id| device(id, "online")).collect();
    }

    fn open_calls(&self) -> usize {
        self.0.open_calls.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Channel = FakeChannel;

    async fn open(&self) -> Result<FakeChannel, Error> {
        self.0.open_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.0.opens.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Error::WebSocket("connection refused".into())))
    }

    async fn snapshot(&self) -> Result<(Vec<DeviceRecord>, Vec<PositionRecord>), Error> {
        if *self.0.snapshot_expired.lock().unwrap() {
            return Err(Error::SessionExpired);
        }
        Ok((self.0.devices.lock().unwrap().clone(), Vec::new()))
    }

    async fn close_session(&self) -> Result<(), Error> {
        self.0.session_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn device(id: i64, status: &str) -> DeviceRecord {
    DeviceRecord {
        id: Some(id),
        name: Some(format!("unit {id}")),
        status: Some(status.into()),
        ..DeviceRecord::default()
    }
}

fn manager(connector: &FakeConnector, reconnect: ReconnectConfig) -> ConnectionManager<FakeConnector> {
    let sync = Arc::new(FleetSync::new(ViewOptions::default()));
    ConnectionManager::new(connector.clone(), sync, reconnect)
}

async fn wait_state(mgr: &ConnectionManager<FakeConnector>, state: ConnectionState) {
    let mut rx = mgr.subscribe_status();
    timeout(Duration::from_secs(120), rx.wait_for(|s| s.state == state))
        .await
        .unwrap()
        .unwrap();
}

async fn wait_devices(mgr: &ConnectionManager<FakeConnector>, count: usize) {
    let mut views = mgr.sync().subscribe_view();
    timeout(Duration::from_secs(120), async {
        while views.latest().len() != count {
            views.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
}

// ── Open & resync ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_connect_resyncs_on_open() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1, 2]);
    let _frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    mgr.connect();
    wait_state(&mgr, ConnectionState::Open).await;
    wait_devices(&mgr, 2).await;
    assert_eq!(mgr.status().attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_live_frames_are_applied() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1]);
    let frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    mgr.connect();
    wait_devices(&mgr, 1).await;

    frames
        .send(Ok(r#"{"devices":[{"id":2,"name":"late joiner","status":"online"}]}"#.into()))
        .unwrap();
    wait_devices(&mgr, 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1]);
    let frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    mgr.connect();
    wait_devices(&mgr, 1).await;

    frames.send(Ok("{not json".into())).unwrap();
    frames.send(Ok(r#"{"events":[]}"#.into())).unwrap();
    frames
        .send(Ok(r#"{"devices":[{"id":5,"status":"offline"}]}"#.into()))
        .unwrap();
    wait_devices(&mgr, 2).await;

    assert_eq!(mgr.state(), ConnectionState::Open);
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_open_is_noop() {
    let connector = FakeConnector::default();
    let _frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    mgr.connect();
    wait_state(&mgr, ConnectionState::Open).await;
    mgr.connect();
    mgr.connect();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(connector.open_calls(), 1);
    assert_eq!(mgr.state(), ConnectionState::Open);
}

// ── Auth loss ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_logout_message_clears_state() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1, 2, 3]);
    let frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());
    let mut auth = mgr.auth_events();

    mgr.connect();
    wait_devices(&mgr, 3).await;
    assert!(mgr.sync().select(DeviceId(2)));

    frames.send(Ok(r#"{"logout":true}"#.into())).unwrap();
    let event = timeout(Duration::from_secs(5), auth.recv()).await.unwrap().unwrap();

    assert!(matches!(event, AuthEvent::AuthLost { .. }));
    assert_eq!(mgr.state(), ConnectionState::Idle);
    assert!(mgr.sync().devices().is_empty());
    assert_eq!(mgr.sync().selection(), None);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_open_is_auth_loss() {
    let connector = FakeConnector::default();
    connector.push_open(Err(Error::SessionExpired));
    let mgr = manager(&connector, ReconnectConfig::default());
    let mut auth = mgr.auth_events();

    mgr.connect();
    let event = timeout(Duration::from_secs(5), auth.recv()).await.unwrap().unwrap();

    assert!(matches!(event, AuthEvent::AuthLost { .. }));
    assert_eq!(mgr.state(), ConnectionState::Idle);
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_during_resync_is_auth_loss() {
    let connector = FakeConnector::default();
    *connector.0.snapshot_expired.lock().unwrap() = true;
    let _frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());
    let mut auth = mgr.auth_events();

    mgr.connect();
    let event = timeout(Duration::from_secs(5), auth.recv()).await.unwrap().unwrap();
    assert!(matches!(event, AuthEvent::AuthLost { .. }));
    assert_eq!(mgr.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_logout_tears_down() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1]);
    let _frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());
    let mut auth = mgr.auth_events();

    mgr.connect();
    wait_devices(&mgr, 1).await;
    mgr.logout().await;

    assert_eq!(mgr.state(), ConnectionState::Idle);
    assert!(mgr.sync().devices().is_empty());
    assert_eq!(connector.0.session_closes.load(Ordering::SeqCst), 1);
    assert_eq!(auth.recv().await.unwrap(), AuthEvent::LoggedOut);
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_reconnects_with_backoff() {
    let connector = FakeConnector::default();
    connector.push_open(Err(Error::WebSocket("refused".into())));
    connector.push_open(Err(Error::WebSocket("refused".into())));
    let _frames = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    let started = Instant::now();
    mgr.connect();
    wait_state(&mgr, ConnectionState::Open).await;
    let elapsed = started.elapsed();

    // ceilings 1s + 2s, each jittered down by at most 25%
    assert!(elapsed >= Duration::from_millis(2250), "{elapsed:?}");
    assert!(elapsed <= Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(connector.open_calls(), 3);
    assert_eq!(mgr.status().attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_skips_pending_delay() {
    let connector = FakeConnector::default();
    connector.push_open(Err(Error::WebSocket("refused".into())));
    let _frames = connector.push_channel();
    let mgr = manager(
        &connector,
        ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            ..ReconnectConfig::default()
        },
    );

    let started = Instant::now();
    mgr.connect();
    wait_state(&mgr, ConnectionState::Errored).await;
    assert_eq!(mgr.status().attempt, 1);

    mgr.connect();
    wait_state(&mgr, ConnectionState::Open).await;
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_server_close_reconnects_and_resyncs() {
    let connector = FakeConnector::default();
    connector.set_devices(&[1]);
    let first = connector.push_channel();
    let _second = connector.push_channel();
    let mgr = manager(&connector, ReconnectConfig::default());

    mgr.connect();
    wait_devices(&mgr, 1).await;

    connector.set_devices(&[1, 2, 3]);
    drop(first);
    wait_devices(&mgr, 3).await;

    assert_eq!(connector.open_calls(), 2);
    assert_eq!(mgr.state(), ConnectionState::Open);
    assert_eq!(mgr.status().attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let connector = FakeConnector::default();
    let mgr = manager(
        &connector,
        ReconnectConfig {
            max_retries: Some(2),
            ..ReconnectConfig::default()
        },
    );

    mgr.connect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.open_calls(), 3);
    assert_eq!(mgr.state(), ConnectionState::Errored);
    assert!(mgr.gave_up());

    // a fresh connect() starts over
    mgr.connect();
    assert!(!mgr.gave_up());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.open_calls(), 6);
}
