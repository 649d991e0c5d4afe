//! Web server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the admin API server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to allow cross-origin requests from the settings UI
    pub enable_cors: bool,
    /// Directory served at `/` instead of the built-in index
    pub static_path: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            static_path: None,
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_static_path(mut self, path: Option<String>) -> Self {
        self.static_path = path;
        self
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = WebConfig::default()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_cors(false);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(!config.enable_cors);
        assert_eq!(WebConfig::new("::1", 80).port, 80);
    }
}
