//! Production implementations of traits

mod channel_port;
mod notify_engine;
mod writer_port;

pub use channel_port::ChannelPort;
pub use notify_engine::NotifyEngine;
pub use writer_port::WriterPort;
