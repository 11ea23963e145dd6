//! Foreign message port trait

use std::fmt;
use thiserror::Error;

use crate::encoder::WireMessage;

/// Opaque address of a consumer port. Zero is not a valid port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PortId(pub i64);

impl PortId {
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum PortError {
    #[error("Port closed: {0}")]
    Closed(PortId),
    #[error("Unknown port: {0}")]
    UnknownPort(PortId),
    #[error("Message rejected: {0}")]
    Rejected(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Trait for delivering wire messages across the boundary
///
/// One synchronous attempt per call; implementations do not buffer or retry.
///
/// Production: channel registry, JSON lines writer, C callback
/// Testing: Recorded messages
#[cfg_attr(test, mockall::automock)]
pub trait MessagePort: Send + Sync {
    fn post(&self, port: PortId, message: &WireMessage) -> Result<(), PortError>;
}
