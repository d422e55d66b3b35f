use thiserror::Error;

/// Invalid or unreadable simulation configuration. Always raised before the
/// first physics step.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field for `Invalid` errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Recoverable: the ball was clamped back to the speed limit
    #[error("Ball {ball} reached {speed:.1} px/s, clamped to {limit:.1} px/s")]
    RunawaySpeed { ball: usize, speed: f32, limit: f32 },

    /// Fatal: position or velocity became NaN/infinite
    #[error("Ball {ball} has non-finite state at t={time:.4}s")]
    NonFinite { ball: usize, time: f64 },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frame buffer {width}x{height} is too large")]
    BufferTooLarge { width: u64, height: u64 },

    #[error("Could not allocate {bytes} bytes for a {width}x{height} frame")]
    OutOfMemory { width: u32, height: u32, bytes: usize },

    #[error("Frame is {actual:?} but sink expects {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Frame {got} delivered out of order, expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Failed to write frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event at t={got:.4}s arrived after t={last:.4}s")]
    OutOfOrder { last: f64, got: f64 },

    #[error("Event receiver disconnected")]
    Disconnected,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),

    #[error("Event delivery failed: {0}")]
    Event(#[from] EventError),

    #[error("Render error on frame {frame}: {source}")]
    Render {
        frame: u64,
        #[source]
        source: RenderError,
    },

    #[error("Job cancelled at frame {frame}")]
    Cancelled { frame: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to start render workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Render worker exited without delivering frame {frame}")]
    WorkerLost { frame: u64 },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type EventResult<T> = Result<T, EventError>;
pub type JobResult<T> = Result<T, JobError>;
