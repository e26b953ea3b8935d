use std::sync::Arc;
use thiserror::Error;

/// Unified error type for the DNS front-end.
///
/// Variants line up with the disposition table in the error handling design:
/// per-query failures never propagate past the query that caused them, while
/// the fatal family (see `is_fatal`) always terminates the event loop.
#[derive(Debug, Clone, Error)]
pub enum FrontendError {
    #[error("IO error: {0}")]
    IoError(Arc<std::io::Error>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed DNS wire data: {0}")]
    Parse(String),

    #[error("query violates policy, responding {0}")]
    Policy(crate::dns::Rcode),

    #[error("pending query table is full")]
    TableFull,

    #[error("unknown pending query id {0}")]
    UnknownPendingId(u64),

    #[error("TCP idle timeout")]
    TcpTimeout,

    #[error("resolver reported failure: {0}")]
    ResolverFailure(String),

    #[error("invalid routing socket message: {0}")]
    InvalidRouteMessage(String),

    #[error("IPC peer closed")]
    PeerClosed,

    #[error("unexpected duplicate message from parent: {0}")]
    DuplicateSetup(&'static str),

    #[error("out of memory")]
    OutOfMemory,

    #[error("capability violation: {0}")]
    CapabilityViolation(String),
}

impl From<std::io::Error> for FrontendError {
    fn from(err: std::io::Error) -> Self {
        FrontendError::IoError(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FrontendError>;

impl FrontendError {
    /// Process-lifecycle failures that must terminate the event loop, as
    /// opposed to per-query failures that are handled locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrontendError::PeerClosed
                | FrontendError::DuplicateSetup(_)
                | FrontendError::CapabilityViolation(_)
        )
    }
}
