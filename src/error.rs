use thiserror::Error;

/// Application-wide error type. Each variant maps to one row of the error
/// taxonomy: the fatal ones abort startup with a non-zero exit code, the
/// recoverable ones are logged at their point of occurrence and never
/// propagate past the component that raised them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("required private framework not available: {0}")]
    FrameworkMissing(String),

    #[error("no simulator device found for udid {0}")]
    DeviceNotFound(String),

    #[error("device has no usable display surface")]
    NoDisplaySurface,

    #[error("failed to bind mjpeg http server: {0}")]
    HttpBindFailed(String),

    #[error("hardware encode timed out after {0:?}")]
    EncodeTimeout(std::time::Duration),

    #[error("encode failed: {0}")]
    EncodeFailure(String),

    #[error("client write failed: {0}")]
    ClientWriteError(String),

    #[error("could not parse command line: {0}")]
    CommandParseError(String),

    #[error("hid send failed: {0}")]
    HidSendFailure(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Exit code a fatal instance of this error should produce from `main`.
    /// Only meaningful for the startup-fatal variants; recoverable variants
    /// never reach main unhandled.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
