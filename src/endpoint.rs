//! Addressable remote SMRT Link systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A monitored remote system, identified by `host:port`.
///
/// # Example
///
/// ```
/// use smrtlink_doctor::RemoteEndpoint;
///
/// let endpoint = RemoteEndpoint::new("smrtlink-alpha", 8081);
/// assert_eq!(endpoint.base_url(), "http://smrtlink-alpha:8081");
/// assert_eq!(endpoint.url("status"), "http://smrtlink-alpha:8081/status");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    host: String,
    port: u16,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL without a trailing slash, e.g. `http://host:8081`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Absolute URL for an endpoint-relative path segment.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for RemoteEndpoint {
    type Err = String;

    /// Parse `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got '{}'", s))?;
        if host.is_empty() {
            return Err(format!("missing host in '{}'", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in '{}': {}", s, e))?;
        Ok(Self::new(host, port))
    }
}
