//! Node configuration for cache backends.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for disk-backed stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory under which database trees are rooted.
    pub base_path: PathBuf,
    /// Database/directory name override. When absent, the name derives from
    /// the store's root block GUID.
    pub database_name: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./offs-data"),
            database_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.base_path, PathBuf::from("./offs-data"));
        assert!(config.database_name.is_none());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = NodeConfig {
            base_path: PathBuf::from("/var/lib/offs"),
            database_name: Some("node-a".into()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.base_path, config.base_path);
        assert_eq!(parsed.database_name.as_deref(), Some("node-a"));
    }
}
