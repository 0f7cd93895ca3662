use thiserror::Error;

/// Convenience alias for Results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across the master, the agent, and the bits they share.
///
/// Handlers never propagate these to callers beyond what §7 allows: transport
/// and decode failures are logged and swallowed by the caller, task failures
/// are recorded against the task instead of returned.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to decode message envelope: {0}")]
    Decode(#[from] bincode::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("failed to pull image {image}: {message}")]
    ImagePull { image: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("host probe error: {0}")]
    HostProbe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
