//! Error types for the audio streaming application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors, caught before a session ever starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Not a multicast group address: {0}")]
    InvalidGroup(String),

    #[error("Port out of range (expected 1024-65535): {0}")]
    PortOutOfRange(u16),

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Channel count must be positive")]
    InvalidChannels,

    #[error("Frame size must be positive")]
    InvalidFrameSize,

    #[error("Jitter buffer capacity must be positive")]
    InvalidJitterCapacity,

    #[error("Receive timeout must be positive")]
    InvalidRecvTimeout,

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to parse config file: {0}")]
    FileParse(String),
}

/// Network transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Socket setup failed: {0}")]
    SocketSetup(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Multicast group join failed: {0}")]
    JoinFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Audio device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Device stopped responding: {0}")]
    Stalled(String),
}

/// Malformed wire data, dropped and counted on the hot path
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Undersized packet: {len} bytes, expected at least {expected}")]
    UndersizedPacket { len: usize, expected: usize },
}

/// Session state machine violations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is already active")]
    AlreadyActive,

    #[error("Configuration change rejected while session is active")]
    ConfigLocked,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
