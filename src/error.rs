use thiserror::Error;

/// Tracker error types.
///
/// Acquisition-path variants never cross the controller boundary; they are
/// logged and retried. `Bind` and the config variants surface to the host so
/// it can decide whether to abort.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("positioning permission not granted")]
    PrivilegeDenied,

    #[error("location updates failed to start: {0}")]
    AcquisitionStart(String),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid port {0}: must be in 1024-65535")]
    InvalidPort(u16),

    #[error("config store error: {0}")]
    Config(#[from] std::io::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
