//! Error handling for the show_admin crate.

/// A specialized `Result` type for show_admin operations.
pub type Result<T> = std::result::Result<T, AdminError>;

/// The main error type for show_admin operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document or command output could not be parsed
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// Network operation failed (pin inventory, player API)
    #[error("Network error: {0}")]
    Network(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// External command failed
    #[error("Command failed: {0}")]
    Command(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an invalid value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// GPIO operation failed (only available with gpio feature)
    #[cfg(feature = "gpio")]
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdminError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new command error
    pub fn command_error(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new GPIO error
    #[cfg(feature = "gpio")]
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
