//! In-process port registry backed by tokio channels
//!
//! Each opened port gets a non-zero id and an unbounded receiver. Posting is
//! synchronous and never blocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::encoder::WireMessage;
use crate::traits::{MessagePort, PortError, PortId};

pub struct ChannelPort {
    next_id: AtomicI64,
    ports: RwLock<HashMap<PortId, UnboundedSender<WireMessage>>>,
}

impl ChannelPort {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ports: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new port and return its id with the consumer end.
    pub fn open(&self) -> (PortId, UnboundedReceiver<WireMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = PortId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().insert(id, tx);
        tracing::debug!(port = %id, "Port opened");
        (id, rx)
    }

    /// Close a port; returns whether it was open.
    pub fn close(&self, port: PortId) -> bool {
        let removed = self.write().remove(&port).is_some();
        if removed {
            tracing::debug!(port = %port, "Port closed");
        }
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PortId, UnboundedSender<WireMessage>>> {
        self.ports.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PortId, UnboundedSender<WireMessage>>> {
        self.ports.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ChannelPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePort for ChannelPort {
    fn post(&self, port: PortId, message: &WireMessage) -> Result<(), PortError> {
        let ports = self.read();
        let sender = ports.get(&port).ok_or(PortError::UnknownPort(port))?;
        sender
            .send(message.clone())
            .map_err(|_| PortError::Closed(port))
    }
}
