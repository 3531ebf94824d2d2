use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0)
    pub host: String,

    /// Port to bind (default: 5000)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.bind_addr().parse().ok()
    }
}

/// Entry listing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Entries per page (default: 20)
    pub page_size: usize,

    /// Title of the root category's entry listing
    pub all_feeds_title: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            all_feeds_title: "All Feeds".to_string(),
        }
    }
}

/// Server-side pagination cursor retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Maximum number of suspended cursors kept (default: 10)
    pub capacity: usize,

    /// Minutes an untouched cursor survives (default: 30)
    pub ttl_minutes: u64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            ttl_minutes: 30,
        }
    }
}

impl CursorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}
