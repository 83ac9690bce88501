// ── Reconnect backoff ──

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnection policy for the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    #[serde(with = "secs_f64")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "secs_f64")]
    pub max_delay: Duration,
    /// Fraction of the delay that may be shaved off at random (0.0..=1.0).
    pub jitter: f64,
    /// Give up after this many consecutive failures. `None` = retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
            max_retries: None,
        }
    }
}

/// Un-jittered delay for the given 0-based attempt:
/// `min(initial * 2^attempt, max)`. Non-decreasing in `attempt`.
pub fn backoff_ceiling(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    Duration::from_secs_f64(base.min(config.max_delay.as_secs_f64()))
}

/// Jittered delay, uniformly drawn from `[ceiling * (1 - jitter), ceiling]`.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    jittered(backoff_ceiling(attempt, config), config.jitter, rand::random::<f64>())
}

/// `sample` is in `[0, 1)`.
fn jittered(ceiling: Duration, jitter: f64, sample: f64) -> Duration {
    let jitter = jitter.clamp(0.0, 1.0);
    ceiling.mul_f64(1.0 - jitter * sample)
}

mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
