use crate::executor::UnitId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn execution unit: {0}")]
    Spawn(String),

    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("execution unit {unit} faulted: {reason}")]
    UnitFault { unit: UnitId, reason: String },

    #[error("no execution units available")]
    NoUnits,

    #[error("pool is shut down")]
    ShutDown,

    #[error("task abandoned before it settled")]
    Abandoned,

    #[cfg(feature = "telemetry")]
    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::Spawn(msg.into())
    }

    #[cfg(feature = "telemetry")]
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Telemetry(msg.into())
    }

    /// True when the task was rejected because some unit in the pool faulted.
    pub fn is_unit_fault(&self) -> bool {
        matches!(self, Error::UnitFault { .. })
    }
}
