use crate::endpoint::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// Run-level failures. Per-request problems (transport errors, validation failures,
/// cancelled slots) never surface here; they are folded into the endpoint summary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no endpoints defined")]
    NoEndpoints,

    #[error("invalid endpoint `{endpoint}`")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: ConfigError,
    },

    #[error("worker task failed")]
    Join(#[from] tokio::task::JoinError),
}
