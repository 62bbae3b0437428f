//! Runtime tuning for the synchronization core.

use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Timing and sizing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How often each subscriber is pinged.
    pub ping_interval: Duration,
    /// A subscriber that has not acknowledged a ping for this long is reaped.
    pub heartbeat_timeout: Duration,
    /// Bounded wait for the per-order mutation lock.
    pub lock_timeout: Duration,
    /// Per-frame limit on a transport send.
    pub send_timeout: Duration,
    /// Events buffered per subscriber before it is dropped for backpressure.
    pub subscriber_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl SyncConfig {
    /// Reads overrides from `KITCHEN_SYNC_*` variables.
    ///
    /// Missing, unparsable or zero values fall back to the defaults. A
    /// heartbeat timeout that does not exceed the ping interval becomes three
    /// ping intervals.
    ///
    /// | Variable | Unit | Default |
    /// |---|---|---|
    /// | `KITCHEN_SYNC_PING_INTERVAL_SECS` | s | 15 |
    /// | `KITCHEN_SYNC_HEARTBEAT_TIMEOUT_SECS` | s | 45 |
    /// | `KITCHEN_SYNC_LOCK_TIMEOUT_MS` | ms | 5000 |
    /// | `KITCHEN_SYNC_SEND_TIMEOUT_SECS` | s | 10 |
    /// | `KITCHEN_SYNC_SUBSCRIBER_BUFFER` | events | 256 |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let secs = |key: &str| parse(key).map(Duration::from_secs).filter(|d| !d.is_zero());

        let ping_interval = secs("KITCHEN_SYNC_PING_INTERVAL_SECS").unwrap_or(defaults.ping_interval);
        let heartbeat_timeout = secs("KITCHEN_SYNC_HEARTBEAT_TIMEOUT_SECS")
            .unwrap_or(defaults.heartbeat_timeout);
        let heartbeat_timeout = if heartbeat_timeout > ping_interval {
            heartbeat_timeout
        } else {
            warn!(?ping_interval, ?heartbeat_timeout, "Heartbeat timeout must exceed ping interval");
            ping_interval * 3
        };

        Self {
            ping_interval,
            heartbeat_timeout,
            lock_timeout: parse("KITCHEN_SYNC_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.lock_timeout),
            send_timeout: secs("KITCHEN_SYNC_SEND_TIMEOUT_SECS").unwrap_or(defaults.send_timeout),
            subscriber_buffer: lookup("KITCHEN_SYNC_SUBSCRIBER_BUFFER")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.subscriber_buffer),
        }
    }
}
