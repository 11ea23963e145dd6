//! Dispatch Sink: single-attempt delivery of wire messages to a port

use std::sync::Arc;
use thiserror::Error;

use crate::debug_log;
use crate::encoder::{ChangeEvent, EncodeError, WireMessage};
use crate::traits::{MessagePort, PortError, PortId, RawEvent};

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("Send failed: {0}")]
    SendFailed(#[from] PortError),
}

/// Delivers messages to one consumer port.
///
/// Holds only a fixed port id and the transport, so the event path needs no
/// locks.
#[derive(Clone)]
pub struct DispatchSink {
    port: PortId,
    transport: Arc<dyn MessagePort>,
}

impl DispatchSink {
    pub fn new(port: PortId, transport: Arc<dyn MessagePort>) -> Self {
        Self { port, transport }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    /// Post `message` once. The message is consumed and released on every
    /// outcome.
    pub fn send(&self, message: WireMessage) -> Result<(), DispatchError> {
        match self.transport.post(self.port, &message) {
            Ok(()) => {
                debug_log!(
                    port = %self.port,
                    action = message.action_code,
                    path = %message.path,
                    "Event posted"
                );
                Ok(())
            }
            Err(e) => {
                debug_log!(
                    port = %self.port,
                    path = %message.path,
                    error = %e,
                    "Failed to send message to port"
                );
                Err(DispatchError::SendFailed(e))
            }
        }
    }

    /// Full per-event pipeline: resolve paths, encode, send.
    ///
    /// Malformed parameters and encode failures drop the event with a warning;
    /// nothing partial is ever posted.
    pub fn forward(&self, raw: &RawEvent<'_>) -> Result<(), DispatchError> {
        let event = match ChangeEvent::resolve(raw) {
            Ok(event) => event,
            Err(EncodeError::MissingParameter(which)) => {
                tracing::warn!(
                    root_dir = ?raw.root_dir,
                    path = ?raw.path,
                    "Invalid callback parameters, missing {}",
                    which
                );
                return Err(EncodeError::MissingParameter(which).into());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve event paths");
                return Err(e.into());
            }
        };

        let message = event.encode().map_err(|e| {
            tracing::warn!(path = %event.full_path, error = %e, "Failed to encode event");
            e
        })?;

        self.send(message)
    }
}
