//! In-process transport double for tests and examples.

use super::{Transport, TransportError, TransportState};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

type PacketQueue = Rc<RefCell<VecDeque<Bytes>>>;

/// A [`Transport`] that records sent packets and delivers injected ones.
///
/// Two dummy transports can be linked pairwise, in which case everything
/// sent on one side is queued for receipt on the other. Linking a transport
/// twice fails with [`TransportError::AlreadyLinked`].
pub struct DummyTransport {
    state: TransportState,
    sent: Rc<RefCell<Vec<Bytes>>>,
    rx_queue: PacketQueue,
    peer: Option<PacketQueue>,
}

impl DummyTransport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Closed,
            sent: Rc::new(RefCell::new(Vec::new())),
            rx_queue: Rc::new(RefCell::new(VecDeque::new())),
            peer: None,
        }
    }

    /// Shared view of every packet sent through this transport.
    pub fn sent_packets(&self) -> Rc<RefCell<Vec<Bytes>>> {
        Rc::clone(&self.sent)
    }

    /// Handle for injecting packets to be received.
    pub fn rx_injector(&self) -> PacketQueue {
        Rc::clone(&self.rx_queue)
    }

    /// Queues a packet as if it arrived from the forwarder.
    pub fn receive(&self, packet: Bytes) {
        self.rx_queue.borrow_mut().push_back(packet);
    }

    /// Connects two dummy transports back to back.
    pub fn link(a: &mut DummyTransport, b: &mut DummyTransport) -> Result<(), TransportError> {
        if a.peer.is_some() || b.peer.is_some() {
            return Err(TransportError::AlreadyLinked);
        }
        a.peer = Some(Rc::clone(&b.rx_queue));
        b.peer = Some(Rc::clone(&a.rx_queue));
        Ok(())
    }
}

impl Default for DummyTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for DummyTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Closed {
            self.state = TransportState::Running;
        }
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        if self.state == TransportState::Closed {
            return Err(TransportError::Closed);
        }
        let packet = Bytes::copy_from_slice(packet);
        self.sent.borrow_mut().push(packet.clone());
        if let Some(peer) = &self.peer {
            peer.borrow_mut().push_back(packet);
        }
        Ok(())
    }

    fn wait(
        &mut self,
        _timeout: Option<Duration>,
        sink: &mut Vec<Bytes>,
    ) -> Result<(), TransportError> {
        if self.state != TransportState::Running {
            return Ok(());
        }
        sink.extend(self.rx_queue.borrow_mut().drain(..));
        Ok(())
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
        self.state = TransportState::Closed;
        self.rx_queue.borrow_mut().clear();
    }

    fn state(&self) -> TransportState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sent_packets() {
        let mut transport = DummyTransport::new();
        transport.connect().unwrap();
        transport.send(b"abc").unwrap();

        let sent = transport.sent_packets();
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(sent.borrow()[0].as_ref(), b"abc");
    }

    #[test]
    fn linked_transports_exchange_packets() {
        let mut a = DummyTransport::new();
        let mut b = DummyTransport::new();
        DummyTransport::link(&mut a, &mut b).unwrap();
        a.connect().unwrap();
        b.connect().unwrap();

        a.send(b"ping").unwrap();
        let mut sink = Vec::new();
        b.wait(None, &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].as_ref(), b"ping");
    }

    #[test]
    fn linking_twice_fails() {
        let mut a = DummyTransport::new();
        let mut b = DummyTransport::new();
        let mut c = DummyTransport::new();
        DummyTransport::link(&mut a, &mut b).unwrap();
        assert!(matches!(
            DummyTransport::link(&mut a, &mut c),
            Err(TransportError::AlreadyLinked)
        ));
    }

    #[test]
    fn paused_transport_holds_packets() {
        let mut transport = DummyTransport::new();
        transport.connect().unwrap();
        transport.receive(Bytes::from_static(b"queued"));
        transport.pause();

        let mut sink = Vec::new();
        transport.wait(None, &mut sink).unwrap();
        assert!(sink.is_empty());

        transport.resume();
        transport.wait(None, &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
