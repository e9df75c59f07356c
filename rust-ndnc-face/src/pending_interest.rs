//! Pending Interest records.

use crate::scheduler::EventId;
use rust_ndnc_common::{Data, Interest, Nack};
use std::fmt;
use std::rc::Rc;

/// Where a pending Interest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInterestOrigin {
    /// Expressed by this application through `Face::express_interest`.
    App,
    /// Received from the forwarder through the transport.
    Forwarder,
}

impl fmt::Display for PendingInterestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Forwarder => write!(f, "forwarder"),
        }
    }
}

pub type DataCallback = Box<dyn FnMut(&Interest, &Data)>;
pub type NackCallback = Box<dyn FnMut(&Interest, &Nack)>;
pub type TimeoutCallback = Box<dyn FnMut(&Interest)>;

/// One outstanding Interest with its callbacks and Nack-aggregation state.
///
/// The record owns its timeout event; dropping the record cancels it.
pub(crate) struct PendingInterest {
    interest: Rc<Interest>,
    origin: PendingInterestOrigin,
    on_data: Option<DataCallback>,
    on_nack: Option<NackCallback>,
    on_timeout: Option<TimeoutCallback>,
    _timeout_event: EventId,
    n_not_nacked: u32,
    least_severe_nack: Option<Nack>,
}

impl PendingInterest {
    /// Record for an Interest expressed by the application.
    pub(crate) fn new_app(
        interest: Rc<Interest>,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
        timeout_event: EventId,
    ) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::App,
            on_data,
            on_nack,
            on_timeout,
            _timeout_event: timeout_event,
            n_not_nacked: 0,
            least_severe_nack: None,
        }
    }

    /// Record for an Interest received from the forwarder.
    pub(crate) fn new_forwarder(interest: Rc<Interest>, timeout_event: EventId) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::Forwarder,
            on_data: None,
            on_nack: None,
            on_timeout: None,
            _timeout_event: timeout_event,
            n_not_nacked: 0,
            least_severe_nack: None,
        }
    }

    pub(crate) fn interest(&self) -> &Rc<Interest> {
        &self.interest
    }

    pub(crate) fn origin(&self) -> PendingInterestOrigin {
        self.origin
    }

    /// Notes that the Interest went to one more destination (the forwarder
    /// or a local filter).
    pub(crate) fn record_forwarding(&mut self) {
        self.n_not_nacked += 1;
    }

    /// Records an incoming Nack against one destination.
    ///
    /// Returns the least severe Nack seen once every destination has
    /// Nacked, `None` while some destination is still outstanding.
    pub(crate) fn record_nack(&mut self, nack: &Nack) -> Option<Nack> {
        debug_assert!(self.n_not_nacked > 0);
        self.n_not_nacked = self.n_not_nacked.saturating_sub(1);

        let keep_existing = self
            .least_severe_nack
            .as_ref()
            .is_some_and(|least| least.reason().least_severe(nack.reason()) == least.reason());
        if !keep_existing {
            self.least_severe_nack = Some(nack.clone());
        }

        if self.n_not_nacked > 0 {
            None
        } else {
            self.least_severe_nack.clone()
        }
    }

    pub(crate) fn take_data_callback(&mut self) -> Option<DataCallback> {
        self.on_data.take()
    }

    pub(crate) fn take_nack_callback(&mut self) -> Option<NackCallback> {
        self.on_nack.take()
    }

    pub(crate) fn take_timeout_callback(&mut self) -> Option<TimeoutCallback> {
        self.on_timeout.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnc_common::NackReason;

    fn record_with_destinations(n: u32) -> PendingInterest {
        let mut interest = Interest::new("/A".parse().unwrap());
        interest.set_nonce(1);
        let mut record =
            PendingInterest::new_app(Rc::new(interest), None, None, None, EventId::default());
        for _ in 0..n {
            record.record_forwarding();
        }
        record
    }

    fn nack(reason: NackReason) -> Nack {
        let mut interest = Interest::new("/A".parse().unwrap());
        interest.set_nonce(1);
        Nack::new(interest, reason)
    }

    #[test]
    fn aggregates_least_severe_reason() {
        let mut record = record_with_destinations(3);
        assert!(record.record_nack(&nack(NackReason::NoRoute)).is_none());
        assert!(record.record_nack(&nack(NackReason::Congestion)).is_none());

        let aggregated = record.record_nack(&nack(NackReason::Duplicate)).unwrap();
        assert_eq!(aggregated.reason(), NackReason::Congestion);
    }

    #[test]
    fn single_destination_nacks_immediately() {
        let mut record = record_with_destinations(1);
        let aggregated = record.record_nack(&nack(NackReason::NoRoute)).unwrap();
        assert_eq!(aggregated.reason(), NackReason::NoRoute);
    }
}
