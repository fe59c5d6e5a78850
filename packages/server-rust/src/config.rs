//! Node configuration types.

use std::time::Duration;

/// Top-level configuration for an AVS node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Operators without a heartbeat for longer than this are expired.
    pub operator_ttl: Duration,
    /// Interval between maintenance sweeps (expiry + snapshot refresh).
    pub sweep_interval: Duration,
    /// Maximum time to wait for a directory transaction receipt.
    pub confirmation_timeout: Duration,
    pub broadcast: BroadcastConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            operator_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
            confirmation_timeout: Duration::from_secs(120),
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Operator TTL in milliseconds, as compared against `last_seen_ms`.
    #[must_use]
    pub fn operator_ttl_ms(&self) -> u64 {
        duration_ms(self.operator_ttl)
    }
}

/// Fan-out limits for a single broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Maximum number of sends in flight within one broadcast.
    pub max_concurrent_sends: usize,
    /// Upper bound on a single send attempt.
    pub send_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sends: 64,
            send_timeout: Duration::from_secs(5),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_config_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.operator_ttl, Duration::from_secs(60));
        assert_eq!(config.operator_ttl_ms(), 60_000);
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
        assert_eq!(config.confirmation_timeout, Duration::from_secs(120));
    }

    #[test]
    fn broadcast_config_defaults() {
        let config = BroadcastConfig::default();
        assert_eq!(config.max_concurrent_sends, 64);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }
}
