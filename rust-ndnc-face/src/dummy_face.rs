//! A Face over an in-process transport, for tests and examples.

use crate::clock::ManualClock;
use crate::face::{Face, FaceBuilder};
use crate::transport::{DummyTransport, Transport};
use bytes::Bytes;
use rust_ndnc_common::{lp, Data, Interest, Nack, NetPacket};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::Deref;
use std::rc::Rc;
use std::time::Duration;

/// A [`Face`] whose forwarder side is scripted by the test.
///
/// Outgoing packets are captured for inspection; incoming packets are
/// injected with [`DummyFace::receive_data`] and friends and delivered on
/// the next [`Face::poll`]. Time is driven by a [`ManualClock`] through
/// [`DummyFace::advance_clocks`].
pub struct DummyFace {
    face: Face,
    clock: Rc<ManualClock>,
    sent: Rc<RefCell<Vec<Bytes>>>,
    rx_queue: Rc<RefCell<VecDeque<Bytes>>>,
}

impl DummyFace {
    pub fn new() -> Self {
        Self::with_builder(|builder| builder)
    }

    /// Builds a dummy face with a custom validator or signer.
    pub fn with_builder(configure: impl FnOnce(FaceBuilder) -> FaceBuilder) -> Self {
        let mut transport = DummyTransport::new();
        // connect upfront so injected packets flow before the first send
        transport.connect().expect("dummy transport connect");
        let sent = transport.sent_packets();
        let rx_queue = transport.rx_injector();
        let clock = ManualClock::new();

        let face = configure(
            FaceBuilder::new()
                .transport(Box::new(transport))
                .clock(clock.clone()),
        )
        .build()
        .expect("dummy face construction cannot fail");

        Self {
            face,
            clock,
            sent,
            rx_queue,
        }
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    pub fn clock(&self) -> &Rc<ManualClock> {
        &self.clock
    }

    /// Queues an Interest as if the forwarder delivered it.
    pub fn receive_interest(&self, interest: &Interest) {
        self.rx_queue
            .borrow_mut()
            .push_back(lp::encode_interest_frame(interest));
    }

    /// Queues a Data as if the forwarder delivered it.
    pub fn receive_data(&self, data: &Data) {
        self.rx_queue
            .borrow_mut()
            .push_back(lp::encode_data_frame(data));
    }

    /// Queues a Nack as if the forwarder delivered it.
    pub fn receive_nack(&self, nack: &Nack) {
        self.rx_queue
            .borrow_mut()
            .push_back(lp::encode_nack_frame(nack));
    }

    /// Every packet sent so far, in order, decoded.
    pub fn sent_packets(&self) -> Vec<NetPacket> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|wire| lp::decode_packet(wire).ok())
            .collect()
    }

    /// Interests sent so far, in order.
    pub fn sent_interests(&self) -> Vec<Interest> {
        self.sent_packets()
            .into_iter()
            .filter_map(|packet| match packet {
                NetPacket::Interest(interest) => Some(interest),
                _ => None,
            })
            .collect()
    }

    /// Data packets sent so far, in order.
    pub fn sent_data(&self) -> Vec<Data> {
        self.sent_packets()
            .into_iter()
            .filter_map(|packet| match packet {
                NetPacket::Data(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Nacks sent so far, in order.
    pub fn sent_nacks(&self) -> Vec<Nack> {
        self.sent_packets()
            .into_iter()
            .filter_map(|packet| match packet {
                NetPacket::Nack(nack) => Some(nack),
                _ => None,
            })
            .collect()
    }

    /// Forgets all captured outgoing packets.
    pub fn clear_sent(&self) {
        self.sent.borrow_mut().clear();
    }

    /// Advances the clock in `count` steps of `step`, pumping the event
    /// loop after each step.
    pub fn advance_clocks(&self, step: Duration, count: usize) {
        debug_assert!(count > 0);
        for _ in 0..count {
            self.clock.advance(step);
            self.face.poll();
        }
    }

    /// Delivers already-queued packets and fires already-due events.
    pub fn pump(&self) {
        self.face.poll();
    }
}

impl Default for DummyFace {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DummyFace {
    type Target = Face;

    fn deref(&self) -> &Face {
        &self.face
    }
}
