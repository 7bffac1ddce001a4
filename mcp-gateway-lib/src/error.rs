use thiserror::Error;

/// Errors that can occur while configuring, starting or stopping the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Protocol engine error: {0}")]
    Engine(String),

    #[error("Invalid gateway state: {0}")]
    InvalidState(String),

    #[error("No private key found in key file")]
    NoPrivateKey,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
