//! Transports carrying TLV elements between the Face and the forwarder.
//!
//! A transport owns the byte stream and re-frames it into whole TLV
//! elements. The Face pumps it from the event loop: [`Transport::wait`]
//! blocks for at most the given duration and appends every complete element
//! that arrived to the sink.

mod dummy;
mod stream;

pub use dummy::DummyTransport;
pub use stream::{tcp_transport, unix_transport, AddressFamily, StreamTransport};

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Closed,
    Connecting,
    Running,
    Paused,
    Failed,
}

#[derive(Error, Debug)]
pub enum TransportError {
    /// A dummy transport can be linked to a peer at most once.
    #[error("transport is already linked")]
    AlreadyLinked,

    #[error("transport is closed")]
    Closed,

    #[error("framing error: {0}")]
    Framing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport {
    /// Establishes the connection. A no-op when already connected.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Sends one whole TLV element.
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Waits up to `timeout` (forever if `None`) for incoming elements and
    /// appends them to `sink`. Returns as soon as at least one element is
    /// available. Does not read while paused.
    fn wait(&mut self, timeout: Option<Duration>, sink: &mut Vec<Bytes>)
        -> Result<(), TransportError>;

    /// Stops delivering received elements until resumed.
    fn pause(&mut self);

    /// Resumes delivery after a pause.
    fn resume(&mut self);

    /// Closes the connection.
    fn close(&mut self);

    fn state(&self) -> TransportState;
}
