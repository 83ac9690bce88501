// ── Device icon asset gate ──
//
// The map must not render markers before their category icons are
// available, and must not wait for them forever either. `AssetGate`
// starts concurrent loads, then resolves every key to either its loaded
// bytes or the built-in fallback once the timeout passes. A fallback
// substitution is final for the gate's lifetime.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::watch;

use crate::error::CoreError;

/// Icon keys with a dedicated asset. Everything else maps to `default`.
pub const ICON_KEYS: &[&str] = &[
    "animal",
    "bicycle",
    "boat",
    "bus",
    "camper",
    "car",
    "crane",
    "default",
    "helicopter",
    "motorcycle",
    "offroad",
    "person",
    "pickup",
    "plane",
    "scooter",
    "ship",
    "tractor",
    "train",
    "tram",
    "trolleybus",
    "truck",
    "van",
];

/// Built-in marker drawn when an icon is unavailable.
pub const FALLBACK_ICON: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><circle cx="12" cy="12" r="8"/></svg>"#;

/// Map a device category to its icon key.
pub fn icon_key(category: &str) -> &'static str {
    let wanted = category.trim();
    ICON_KEYS
        .iter()
        .find(|key| key.eq_ignore_ascii_case(wanted))
        .copied()
        .unwrap_or("default")
}

// ── Loader seam ─────────────────────────────────────────────────────

pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, key: &str) -> impl Future<Output = Result<Bytes, CoreError>> + Send;
}

/// Reads `<dir>/<key>.svg`.
#[derive(Debug, Clone)]
pub struct DirAssetLoader {
    dir: PathBuf,
}

impl DirAssetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AssetLoader for DirAssetLoader {
    async fn load(&self, key: &str) -> Result<Bytes, CoreError> {
        let path = self.dir.join(format!("{key}.svg"));
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| CoreError::Asset {
                key: key.to_owned(),
                reason: format!("{}: {e}", path.display()),
            })
    }
}

// ── Gate ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Loaded(Bytes),
    Fallback,
}

/// Slot table shared by the gate, its load tasks and issued signals.
struct Table {
    slots: Mutex<HashMap<&'static str, Slot>>,
    /// Bumped whenever a slot resolves.
    resolved: watch::Sender<u64>,
}

impl Table {
    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, key: &'static str, slot: Slot) {
        {
            let mut slots = self.lock();
            match slots.get(key) {
                Some(Slot::Pending) => {
                    slots.insert(key, slot);
                }
                _ => return,
            }
        }
        self.resolved.send_modify(|n| *n += 1);
    }
}

pub struct AssetGate<L: AssetLoader> {
    loader: Arc<L>,
    timeout: Duration,
    table: Arc<Table>,
}

impl<L: AssetLoader> AssetGate<L> {
    pub fn new(loader: L, timeout: Duration) -> Self {
        let (resolved, _) = watch::channel(0);
        Self {
            loader: Arc::new(loader),
            timeout,
            table: Arc::new(Table {
                slots: Mutex::new(HashMap::new()),
                resolved,
            }),
        }
    }

    /// Start loading icons for `categories` and return a signal that
    /// completes once each one is loaded or replaced by the fallback.
    ///
    /// Keys already known (loaded, failed or in flight) are not reloaded.
    /// Must be called within a Tokio runtime.
    pub fn ensure_ready<I, S>(&self, categories: I) -> ReadySignal
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: BTreeSet<&'static str> = categories
            .into_iter()
            .map(|c| icon_key(c.as_ref()))
            .collect();

        let fresh: Vec<&'static str> = {
            let mut slots = self.table.lock();
            keys.iter()
                .copied()
                .filter(|&key| {
                    if slots.contains_key(key) {
                        return false;
                    }
                    slots.insert(key, Slot::Pending);
                    true
                })
                .collect()
        };

        if !fresh.is_empty() {
            tokio::spawn(load_all(
                Arc::clone(&self.loader),
                Arc::clone(&self.table),
                fresh,
                self.timeout,
            ));
        }

        ReadySignal {
            keys: keys.into_iter().collect(),
            table: Arc::clone(&self.table),
            resolved: self.table.resolved.subscribe(),
        }
    }

    /// Icon for `category`: loaded bytes, or the fallback while pending,
    /// failed or timed out.
    pub fn icon(&self, category: &str) -> Bytes {
        match self.table.lock().get(icon_key(category)) {
            Some(Slot::Loaded(bytes)) => bytes.clone(),
            _ => Bytes::from_static(FALLBACK_ICON),
        }
    }

    /// `true` once `category` is permanently on the fallback icon.
    pub fn is_fallback(&self, category: &str) -> bool {
        matches!(
            self.table.lock().get(icon_key(category)),
            Some(Slot::Fallback)
        )
    }
}

async fn load_all<L: AssetLoader>(
    loader: Arc<L>,
    table: Arc<Table>,
    keys: Vec<&'static str>,
    timeout: Duration,
) {
    let mut loads: FuturesUnordered<_> = keys
        .iter()
        .map(|&key| {
            let loader = Arc::clone(&loader);
            async move { (key, loader.load(key).await) }
        })
        .collect();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            next = loads.next() => match next {
                Some((key, Ok(bytes))) => table.resolve(key, Slot::Loaded(bytes)),
                Some((key, Err(e))) => {
                    tracing::warn!(key, error = %e, "icon failed to load, using fallback");
                    table.resolve(key, Slot::Fallback);
                }
                None => return,
            },
            () = &mut deadline => {
                for &key in &keys {
                    table.resolve(key, Slot::Fallback);
                }
                tracing::warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "icon loading timed out, pending icons use fallback"
                );
                return;
            }
        }
    }
}

// ── ReadySignal ─────────────────────────────────────────────────────

/// Completes when every requested icon has resolved.
pub struct ReadySignal {
    keys: Vec<&'static str>,
    table: Arc<Table>,
    resolved: watch::Receiver<u64>,
}

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        let slots = self.table.lock();
        self.keys
            .iter()
            .all(|key| !matches!(slots.get(key), Some(Slot::Pending) | None))
    }

    pub async fn wait(mut self) {
        while !self.is_ready() {
            if self.resolved.changed().await.is_err() {
                return;
            }
        }
    }
}
