use thiserror::Error;

/// Error taxonomy shared by every fallible operation in the flow table,
/// packet buffer, uSDN codec/engine and controller dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdnError {
    #[error("pool exhausted: {pool}")]
    PoolFull { pool: &'static str },

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("no route available")]
    NoRoute,

    #[error("southbound not configured")]
    NotConfigured,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("unexpected dispatch state")]
    Unknown,
}

pub type SdnResult<T> = Result<T, SdnError>;
