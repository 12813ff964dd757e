use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for a [`crate::engine::Hub`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Where `hub.json` and `audit.log` live. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Upper bound for acquiring the store before an operation fails closed.
    pub store_timeout: Duration,
    /// Pending audit records buffered before new ones are dropped.
    pub audit_queue_capacity: usize,
    /// Maximum number of records returned by an audit query.
    pub audit_query_limit: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            store_timeout: Duration::from_secs(5),
            audit_queue_capacity: 1024,
            audit_query_limit: 200,
        }
    }
}

impl HubConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("hub.json"))
    }

    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("audit.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HubConfig::default();
        assert!(config.data_dir.is_none());
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.audit_query_limit, 200);
        assert!(config.snapshot_path().is_none());
    }

    #[test]
    fn persistent_paths() {
        let config = HubConfig::persistent("/tmp/hub");
        assert_eq!(config.snapshot_path().unwrap(), PathBuf::from("/tmp/hub/hub.json"));
        assert_eq!(config.audit_log_path().unwrap(), PathBuf::from("/tmp/hub/audit.log"));
    }
}
