//! TLV re-framing over stream sockets.

use super::{Transport, TransportError, TransportState};
use bytes::{Bytes, BytesMut};
use log::trace;
use rust_ndnc_common::{tlv, MAX_PACKET_SIZE};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

/// Address family restriction for TCP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Any,
    V4,
    V6,
}

/// The stream-socket operations the re-framing layer needs.
pub trait ByteStream: Read + Write {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl ByteStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

impl ByteStream for UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        UnixStream::set_read_timeout(self, timeout)
    }
}

/// A [`Transport`] over any blocking byte stream, connected lazily through
/// the supplied connector.
pub struct StreamTransport<S: ByteStream> {
    connector: Box<dyn Fn() -> std::io::Result<S>>,
    stream: Option<S>,
    rx_buffer: BytesMut,
    state: TransportState,
}

impl<S: ByteStream> StreamTransport<S> {
    pub fn new(connector: impl Fn() -> std::io::Result<S> + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            stream: None,
            rx_buffer: BytesMut::with_capacity(MAX_PACKET_SIZE),
            state: TransportState::Closed,
        }
    }

    /// Moves every complete TLV element from the receive buffer to `sink`.
    fn extract_elements(&mut self, sink: &mut Vec<Bytes>) -> Result<(), TransportError> {
        loop {
            let span = tlv::element_span(&self.rx_buffer)
                .map_err(|e| TransportError::Framing(e.to_string()))?;
            match span {
                None => {
                    if self.rx_buffer.len() > MAX_PACKET_SIZE {
                        self.state = TransportState::Failed;
                        return Err(TransportError::Framing(
                            "incoming element exceeds maximum packet size".into(),
                        ));
                    }
                    return Ok(());
                }
                Some(span) => {
                    let element = self.rx_buffer.split_to(span).freeze();
                    trace!("received element of {} bytes", element.len());
                    sink.push(element);
                }
            }
        }
    }
}

impl<S: ByteStream> Transport for StreamTransport<S> {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.state = TransportState::Connecting;
        match (self.connector)() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = TransportState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Failed;
                Err(e.into())
            }
        }
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        if let Err(e) = stream.write_all(packet) {
            self.state = TransportState::Failed;
            return Err(e.into());
        }
        Ok(())
    }

    fn wait(
        &mut self,
        timeout: Option<Duration>,
        sink: &mut Vec<Bytes>,
    ) -> Result<(), TransportError> {
        if self.state != TransportState::Running {
            return Ok(());
        }

        // hand over anything already buffered before touching the socket
        self.extract_elements(sink)?;
        if !sink.is_empty() {
            return Ok(());
        }

        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        // zero means nonblocking here; the socket API reserves zero for
        // "no timeout", so substitute the smallest effective value
        let socket_timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        stream.set_read_timeout(socket_timeout)?;

        let mut chunk = [0u8; 8192];
        match stream.read(&mut chunk) {
            Ok(0) => {
                self.state = TransportState::Closed;
                self.stream = None;
                Err(TransportError::Closed)
            }
            Ok(n) => {
                self.rx_buffer.extend_from_slice(&chunk[..n]);
                self.extract_elements(sink)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(()),
            Err(e) => {
                self.state = TransportState::Failed;
                Err(e.into())
            }
        }
    }

    fn pause(&mut self) {
        if self.state == TransportState::Running {
            self.state = TransportState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == TransportState::Paused {
            self.state = TransportState::Running;
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.rx_buffer.clear();
        self.state = TransportState::Closed;
    }

    fn state(&self) -> TransportState {
        self.state
    }
}

/// Transport connecting to a forwarder over TCP.
pub fn tcp_transport(host: String, port: u16, family: AddressFamily) -> StreamTransport<TcpStream> {
    StreamTransport::new(move || {
        let addrs = (host.as_str(), port).to_socket_addrs()?;
        let mut last_error = None;
        for addr in addrs {
            let acceptable = match family {
                AddressFamily::Any => true,
                AddressFamily::V4 => matches!(addr, SocketAddr::V4(_)),
                AddressFamily::V6 => matches!(addr, SocketAddr::V6(_)),
            };
            if !acceptable {
                continue;
            }
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AddrNotAvailable, "no usable address")
        }))
    })
}

/// Transport connecting to a forwarder over a Unix domain socket.
pub fn unix_transport(path: PathBuf) -> StreamTransport<UnixStream> {
    StreamTransport::new(move || UnixStream::connect(&path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnc_common::tlv::TlvElement;
    use std::io;

    /// In-memory stream feeding scripted bytes.
    struct ScriptedStream {
        incoming: Vec<u8>,
        written: Vec<u8>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.incoming.is_empty() {
                return Err(io::Error::new(ErrorKind::WouldBlock, "no data"));
            }
            let n = self.incoming.len().min(buf.len());
            buf[..n].copy_from_slice(&self.incoming[..n]);
            self.incoming.drain(..n);
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteStream for ScriptedStream {
        fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    fn transport_with(incoming: Vec<u8>) -> StreamTransport<ScriptedStream> {
        let mut transport = StreamTransport::new(move || {
            Ok(ScriptedStream {
                incoming: incoming.clone(),
                written: Vec::new(),
            })
        });
        transport.connect().unwrap();
        transport
    }

    #[test]
    fn reassembles_coalesced_elements() {
        let a = TlvElement::new(6, Bytes::from_static(b"one")).to_bytes();
        let b = TlvElement::new(6, Bytes::from_static(b"two")).to_bytes();
        let mut wire = a.to_vec();
        wire.extend_from_slice(&b);

        let mut transport = transport_with(wire);
        let mut sink = Vec::new();
        transport.wait(Some(Duration::ZERO), &mut sink).unwrap();
        assert_eq!(sink, vec![a, b]);
    }

    #[test]
    fn waits_for_partial_element() {
        let full = TlvElement::new(6, Bytes::from_static(b"partial")).to_bytes();
        let cut = full.len() - 3;

        let mut transport = transport_with(full[..cut].to_vec());
        let mut sink = Vec::new();
        transport.wait(Some(Duration::ZERO), &mut sink).unwrap();
        assert!(sink.is_empty());

        // feed the remainder
        transport.rx_buffer.extend_from_slice(&full[cut..]);
        transport.extract_elements(&mut sink).unwrap();
        assert_eq!(sink, vec![full]);
    }

    #[test]
    fn paused_transport_does_not_deliver() {
        let element = TlvElement::new(6, Bytes::from_static(b"x")).to_bytes();
        let mut transport = transport_with(element.to_vec());
        transport.pause();

        let mut sink = Vec::new();
        transport.wait(Some(Duration::ZERO), &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(transport.state(), TransportState::Paused);

        transport.resume();
        transport.wait(Some(Duration::ZERO), &mut sink).unwrap();
        assert_eq!(sink, vec![element]);
    }

    #[test]
    fn peer_close_is_reported() {
        // empty incoming script: read returns WouldBlock, not close; emulate
        // close by a stream that reads Ok(0)
        struct ClosedStream;
        impl Read for ClosedStream {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
        }
        impl Write for ClosedStream {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        impl ByteStream for ClosedStream {
            fn set_read_timeout(&self, _t: Option<Duration>) -> io::Result<()> {
                Ok(())
            }
        }

        let mut transport = StreamTransport::new(|| Ok(ClosedStream));
        transport.connect().unwrap();
        let mut sink = Vec::new();
        assert!(matches!(
            transport.wait(Some(Duration::ZERO), &mut sink),
            Err(TransportError::Closed)
        ));
        assert_eq!(transport.state(), TransportState::Closed);
    }
}
