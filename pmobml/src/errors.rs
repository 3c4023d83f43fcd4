use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Unknown or malformed host message: always dropped by the dispatcher
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Cannot resolve audio stream: {0}")]
    Resolution(String),
    #[error("Network access is gated (network disabled or recorded stream)")]
    NetworkGated,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("NVRAM error: {0}")]
    Nvram(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn protocol(message: impl Into<String>) -> Self {
        BridgeError::Protocol(message.into())
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        BridgeError::Resolution(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        BridgeError::Transport(message.into())
    }

    pub fn nvram(message: impl Into<String>) -> Self {
        BridgeError::Nvram(message.into())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        BridgeError::Transport(e.to_string())
    }
}
