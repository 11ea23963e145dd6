//! JSON lines port: one wire message per line on a writer

use std::io::Write;
use std::sync::Mutex;

use crate::encoder::WireMessage;
use crate::traits::{MessagePort, PortError, PortId};

pub struct WriterPort<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterPort<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl WriterPort<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> MessagePort for WriterPort<W> {
    fn post(&self, _port: PortId, message: &WireMessage) -> Result<(), PortError> {
        let line = message
            .to_json()
            .map_err(|e| PortError::Rejected(e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{}", line).map_err(|e| PortError::Io(e.to_string()))?;
        writer.flush().map_err(|e| PortError::Io(e.to_string()))
    }
}
