//! Service configuration.
//!
//! All tunables live in one explicit struct threaded through the
//! dispatcher; nothing reads globals. Tests construct a config pointing at
//! a temp directory and get a fully isolated service.

use std::{path::PathBuf, time::Duration};

/// Hard cap on registered identities.
pub const MAX_CLIENTS: usize = 10_000;

/// Retention limits for the message queue.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Queue capacity; at or above this the queue evicts stale messages
    /// and rejects if still full.
    pub max_pending: usize,
    /// Age in milliseconds past which a pending message counts as stale.
    pub stale_ms: u64,
    /// Pending messages one sender may hold; strictly above this the
    /// sender's oldest is evicted.
    pub per_sender_quota: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        // One week of staleness at 3000 pending.
        Self { max_pending: 3000, stale_ms: 604_800_000, per_sender_quota: 20 }
    }
}

/// Everything the dispatcher needs to serve one request.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the registry and queue files.
    pub data_dir: PathBuf,
    /// Identity registry file.
    pub registry_path: PathBuf,
    /// Message queue file.
    pub queue_path: PathBuf,
    /// Client source template for the artifact generator.
    pub template_path: PathBuf,
    /// External compiler the generator invokes.
    pub compiler_path: PathBuf,
    /// Scratch directory for generated sources and artifacts.
    pub work_dir: PathBuf,
    /// Identity hash allowed to issue purge requests.
    pub admin_id_hash: [u8; 32],
    /// Queue retention limits.
    pub retention: RetentionPolicy,
    /// Cap on registered identities.
    pub max_clients: usize,
    /// How long a request may wait for the store lock before aborting.
    pub lock_timeout: Duration,
    /// How long one compiler run may take.
    pub compile_timeout: Duration,
}

impl ServiceConfig {
    /// Config with default limits rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            registry_path: data_dir.join("identities.db"),
            queue_path: data_dir.join("messages.db"),
            template_path: data_dir.join("client.tmpl"),
            compiler_path: PathBuf::from("cc"),
            work_dir: data_dir.clone(),
            data_dir,
            admin_id_hash: [0; 32],
            retention: RetentionPolicy::default(),
            max_clients: MAX_CLIENTS,
            lock_timeout: Duration::from_secs(10),
            compile_timeout: Duration::from_secs(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn paths_derive_from_data_dir() {
        let config = ServiceConfig::new("/var/lib/sealpost");
        assert_eq!(config.registry_path, Path::new("/var/lib/sealpost/identities.db"));
        assert_eq!(config.queue_path, Path::new("/var/lib/sealpost/messages.db"));
    }

    #[test]
    fn default_retention_matches_service_limits() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.max_pending, 3000);
        assert_eq!(policy.stale_ms, 604_800_000);
        assert_eq!(policy.per_sender_quota, 20);
    }
}
