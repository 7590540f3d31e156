use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to create browser environment: {0}")]
    EnvironmentCreationFailed(String),

    #[error("Failed to create controller: {0}")]
    ControllerCreationFailed(String),

    #[error("Browsing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Web view is already initialized")]
    AlreadyInitialized,

    #[error("Web view is not initialized yet")]
    NotReady,

    #[error("Web view has been torn down")]
    TornDown,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Controller was not ready within {0:?}")]
    NavigationTimeout(Duration),

    #[error("Platform call failed: {0}")]
    Platform(String),

    #[error("Window handle error")]
    WindowHandle,

    #[error("Event loop error: {0}")]
    EventLoop(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
