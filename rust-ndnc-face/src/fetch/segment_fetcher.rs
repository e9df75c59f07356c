//! Fetches a versioned, segmented object over a Face.
//!
//! Segment names follow `/<prefix>/<version>/<segment>`. The first Interest
//! discovers the version (CanBePrefix, and MustBeFresh when probing the
//! latest version); subsequent Interests request exact segments, paced by
//! an AIMD congestion window with Conservative Window Adaptation. Segment
//! count becomes known when a validated Data carries a FinalBlockId.

use crate::cancel::{CancelHandle, ScopedCancelHandle};
use crate::clock::Clock;
use crate::face::Face;
use crate::fetch::rtt::{RttEstimatorOptions, RttEstimatorWithStats};
use crate::pending_interest::{DataCallback, NackCallback};
use crate::scheduler::{EventId, Scheduler};
use crate::security::Validator;
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use rust_ndnc_common::{Data, Interest, Nack, NackReason, Name};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lowest slow-start threshold the window decrease may choose.
pub const MIN_SSTHRESH: f64 = 2.0;

/// Why a transfer was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorCode {
    /// The quiet period between validated segments exceeded `max_timeout`.
    InterestTimeout = 1,
    /// A retrieved Data lacked a segment number in its last name component.
    DataHasNoSegment = 2,
    /// A segment failed validation.
    SegmentValidationFail = 3,
    /// An unrecoverable Nack was received.
    NackError = 4,
    /// A FinalBlockId did not contain a segment component.
    FinalBlockIdNotSegment = 5,
}

#[derive(Error, Debug, Clone)]
#[error("fetch failed ({code:?}): {message}")]
pub struct FetchError {
    pub code: FetchErrorCode,
    pub message: String,
}

#[derive(Error, Debug)]
#[error("invalid fetcher options: {0}")]
pub struct InvalidOptions(String);

/// Transfer options; every field is individually settable.
#[derive(Debug, Clone)]
pub struct Options {
    /// Lifetime of each sent Interest, independent of the fetcher timeout.
    pub interest_lifetime: Duration,
    /// Maximum quiet period between validated segments; also caps the RTO.
    pub max_timeout: Duration,
    /// Set MustBeFresh on the discovery Interest.
    pub probe_latest_version: bool,
    /// Deliver segments as they become contiguous instead of as one block.
    pub in_order: bool,
    /// Use `max_timeout` as the per-Interest timeout instead of the RTO.
    pub use_constant_interest_timeout: bool,
    /// Keep the window fixed at `init_cwnd`.
    pub use_constant_cwnd: bool,
    /// Disable Conservative Window Adaptation.
    pub disable_cwa: bool,
    /// On loss, reset cwnd to `init_cwnd` instead of ssthresh.
    pub reset_cwnd_to_init: bool,
    /// Do not decrease the window on congestion marks.
    pub ignore_cong_marks: bool,
    pub init_cwnd: f64,
    pub init_ssthresh: f64,
    /// Additive increase step, in segments.
    pub ai_step: f64,
    /// Multiplicative decrease coefficient.
    pub md_coef: f64,
    /// Maximum number of buffered out-of-order segments (in-order mode).
    pub flow_control_window: usize,
    pub rtt_options: RttEstimatorOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interest_lifetime: Duration::from_secs(4),
            max_timeout: Duration::from_secs(60),
            probe_latest_version: true,
            in_order: false,
            use_constant_interest_timeout: false,
            use_constant_cwnd: false,
            disable_cwa: false,
            reset_cwnd_to_init: false,
            ignore_cong_marks: false,
            init_cwnd: 1.0,
            init_ssthresh: f64::MAX,
            ai_step: 1.0,
            md_coef: 0.5,
            flow_control_window: 25_000,
            rtt_options: RttEstimatorOptions::default(),
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<(), InvalidOptions> {
        if self.max_timeout < Duration::from_millis(1) {
            return Err(InvalidOptions(
                "maxTimeout must be at least 1 millisecond".into(),
            ));
        }
        if self.init_cwnd < 1.0 {
            return Err(InvalidOptions("initCwnd must be at least 1".into()));
        }
        if self.ai_step < 0.0 {
            return Err(InvalidOptions("aiStep must be nonnegative".into()));
        }
        if !(0.0..=1.0).contains(&self.md_coef) {
            return Err(InvalidOptions("mdCoef must be in [0, 1]".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    /// First Interest for this segment; eligible for RTT sampling.
    FirstInterest,
    /// Timed out or Nacked, waiting in the retransmission queue.
    InRetxQueue,
    /// Retransmitted at least once (excluded from RTT sampling).
    Retransmitted,
}

struct PendingSegment {
    state: SegmentState,
    send_time: Instant,
    // replacing either handle cancels its predecessor
    interest_hdl: ScopedCancelHandle,
    timeout_event: EventId,
}

type DataHook = Rc<RefCell<dyn FnMut(&Data)>>;
type EventHook = Rc<RefCell<dyn FnMut()>>;

struct Inner {
    options: Options,
    face: Face,
    scheduler: Scheduler,
    clock: Rc<dyn Clock>,
    validator: Rc<dyn Validator>,
    base_interest: Interest,

    // strong self-reference held for the duration of the transfer
    self_ref: Option<SegmentFetcher>,

    versioned_name: Option<Name>,
    next_segment: u64,
    n_segments: Option<u64>,
    cwnd: f64,
    ssthresh: f64,
    n_in_flight: u64,
    high_interest: u64,
    high_data: u64,
    rec_point: u64,
    retx_queue: VecDeque<u64>,
    pending: BTreeMap<u64, PendingSegment>,
    received: BTreeMap<u64, Bytes>,
    n_received: u64,
    n_bytes_received: u64,
    next_to_deliver: u64,
    time_last_segment: Instant,
    rtt: RttEstimatorWithStats,

    on_complete: Option<Box<dyn FnOnce(Bytes)>>,
    on_error: Option<Box<dyn FnOnce(FetchError)>>,
    on_in_order_data: Option<Rc<RefCell<dyn FnMut(Bytes)>>>,
    on_in_order_complete: Option<Box<dyn FnOnce()>>,
    after_segment_received: Option<DataHook>,
    after_segment_validated: Option<DataHook>,
    after_segment_nacked: Option<EventHook>,
    after_segment_timed_out: Option<EventHook>,
}

/// Handle to a running transfer. Clones share the same transfer.
#[derive(Clone)]
pub struct SegmentFetcher {
    inner: Rc<RefCell<Inner>>,
}

impl SegmentFetcher {
    /// Initiates fetching. Completion, failure and progress are reported
    /// through the callbacks installed with the `on_*`/`after_*` setters.
    ///
    /// The fetcher keeps itself alive for the duration of the transfer;
    /// the returned handle only needs to be kept for connecting callbacks
    /// or calling [`SegmentFetcher::stop`].
    pub fn start(
        face: &Face,
        base_interest: Interest,
        validator: Rc<dyn Validator>,
        options: Options,
    ) -> Result<SegmentFetcher, InvalidOptions> {
        options.validate()?;

        let clock = face.clock();
        let now = clock.now();
        let rtt = RttEstimatorWithStats::new(options.rtt_options.clone());
        let inner = Rc::new(RefCell::new(Inner {
            face: face.clone(),
            scheduler: face.scheduler(),
            clock,
            validator,
            base_interest,
            self_ref: None,
            versioned_name: None,
            next_segment: 0,
            n_segments: None,
            cwnd: options.init_cwnd,
            ssthresh: options.init_ssthresh,
            n_in_flight: 0,
            high_interest: 0,
            high_data: 0,
            rec_point: 0,
            retx_queue: VecDeque::new(),
            pending: BTreeMap::new(),
            received: BTreeMap::new(),
            n_received: 0,
            n_bytes_received: 0,
            next_to_deliver: 0,
            time_last_segment: now,
            rtt,
            options,
            on_complete: None,
            on_error: None,
            on_in_order_data: None,
            on_in_order_complete: None,
            after_segment_received: None,
            after_segment_validated: None,
            after_segment_nacked: None,
            after_segment_timed_out: None,
        }));

        let fetcher = SegmentFetcher { inner };
        fetcher.inner.borrow_mut().self_ref = Some(fetcher.clone());
        fetch_first_segment(&fetcher, false);
        Ok(fetcher)
    }

    /// Stops fetching, cancelling all pending Interests and timeouts.
    ///
    /// Safe to call from within any fetcher callback; the self-reference is
    /// released on the event loop, never synchronously.
    pub fn stop(&self) {
        let (self_ref, scheduler) = {
            let mut inner = self.inner.borrow_mut();
            if inner.self_ref.is_none() {
                return;
            }
            inner.pending.clear(); // cancels pending Interests and timeouts
            (inner.self_ref.take(), inner.scheduler.clone())
        };
        let mut event = scheduler.schedule(Duration::ZERO, move || drop(self_ref));
        event.release();
    }

    /// Whether the transfer is still running.
    pub fn is_running(&self) -> bool {
        self.inner.borrow().self_ref.is_some()
    }

    /// Whether two handles refer to the same transfer.
    pub fn is_same(&self, other: &SegmentFetcher) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn on_complete(&self, callback: impl FnOnce(Bytes) + 'static) {
        self.inner.borrow_mut().on_complete = Some(Box::new(callback));
    }

    pub fn on_error(&self, callback: impl FnOnce(FetchError) + 'static) {
        self.inner.borrow_mut().on_error = Some(Box::new(callback));
    }

    pub fn on_in_order_data(&self, callback: impl FnMut(Bytes) + 'static) {
        self.inner.borrow_mut().on_in_order_data = Some(Rc::new(RefCell::new(callback)));
    }

    pub fn on_in_order_complete(&self, callback: impl FnOnce() + 'static) {
        self.inner.borrow_mut().on_in_order_complete = Some(Box::new(callback));
    }

    pub fn after_segment_received(&self, callback: impl FnMut(&Data) + 'static) {
        self.inner.borrow_mut().after_segment_received = Some(Rc::new(RefCell::new(callback)));
    }

    pub fn after_segment_validated(&self, callback: impl FnMut(&Data) + 'static) {
        self.inner.borrow_mut().after_segment_validated = Some(Rc::new(RefCell::new(callback)));
    }

    pub fn after_segment_nacked(&self, callback: impl FnMut() + 'static) {
        self.inner.borrow_mut().after_segment_nacked = Some(Rc::new(RefCell::new(callback)));
    }

    pub fn after_segment_timed_out(&self, callback: impl FnMut() + 'static) {
        self.inner.borrow_mut().after_segment_timed_out = Some(Rc::new(RefCell::new(callback)));
    }

    /// Number of validated segments so far.
    pub fn n_segments_received(&self) -> u64 {
        self.inner.borrow().n_received
    }

    /// Number of validated payload bytes so far.
    pub fn n_bytes_received(&self) -> u64 {
        self.inner.borrow().n_bytes_received
    }
}

fn is_stopped(fetcher: &SegmentFetcher) -> bool {
    fetcher.inner.borrow().self_ref.is_none()
}

fn signal_error(fetcher: &SegmentFetcher, code: FetchErrorCode, message: impl Into<String>) {
    let message = message.into();
    debug!("fetch error {code:?}: {message}");
    let on_error = fetcher.inner.borrow_mut().on_error.take();
    if let Some(on_error) = on_error {
        on_error(FetchError { code, message });
    }
    fetcher.stop();
}

fn fetch_first_segment(fetcher: &SegmentFetcher, is_retransmission: bool) {
    let interest = {
        let inner = fetcher.inner.borrow();
        let mut interest = inner.base_interest.clone();
        interest.set_can_be_prefix(true);
        if inner.options.probe_latest_version {
            interest.set_must_be_fresh(true);
        }
        interest.set_lifetime(inner.options.interest_lifetime);
        if is_retransmission {
            interest.refresh_nonce();
        }
        interest
    };
    send_interest(fetcher, 0, interest, is_retransmission);
}

/// Mode-specific completion state, checked before requesting more.
enum Completion {
    NotDone,
    Block,
    InOrder,
}

fn check_completion(inner: &mut Inner) -> Completion {
    let Some(n_segments) = inner.n_segments else {
        return Completion::NotDone;
    };

    if inner.options.in_order {
        if inner.next_to_deliver >= n_segments {
            return Completion::InOrder;
        }
        return Completion::NotDone;
    }

    if inner.n_received < n_segments {
        return Completion::NotDone;
    }
    // re-request any holes in the window
    let mut complete = true;
    for segment in 0..n_segments {
        if !inner.received.contains_key(&segment)
            && !inner.retx_queue.contains(&segment)
            && !inner.pending.contains_key(&segment)
        {
            inner.retx_queue.push_back(segment);
            complete = false;
        } else if !inner.received.contains_key(&segment) {
            complete = false;
        }
    }
    if complete {
        Completion::Block
    } else {
        Completion::NotDone
    }
}

fn fetch_segments_in_window(fetcher: &SegmentFetcher) {
    enum Plan {
        Finalize(Completion),
        Send(Vec<(u64, Interest, bool)>),
    }

    let plan = {
        let mut inner = fetcher.inner.borrow_mut();
        match check_completion(&mut inner) {
            Completion::NotDone => {
                let mut to_send = Vec::new();
                let mut available = inner.cwnd as i64 - inner.n_in_flight as i64;
                while available > 0 {
                    let request;
                    if let Some(segment) = inner.retx_queue.pop_front() {
                        match inner.pending.get(&segment) {
                            // received after its timeout; nothing to resend
                            None => continue,
                            Some(pending) => {
                                debug_assert_eq!(pending.state, SegmentState::InRetxQueue);
                                request = (segment, true);
                            }
                        }
                    } else if inner.n_segments.map_or(true, |n| inner.next_segment < n) {
                        if inner.options.in_order
                            && inner.next_segment
                                >= inner.next_to_deliver + inner.options.flow_control_window as u64
                        {
                            break;
                        }
                        let segment = inner.next_segment;
                        inner.next_segment += 1;
                        if inner.received.contains_key(&segment) {
                            // answered by the discovery Interest already
                            continue;
                        }
                        request = (segment, false);
                    } else {
                        break;
                    }

                    let Some(versioned_name) = inner.versioned_name.clone() else {
                        break; // version still unknown; discovery in flight
                    };
                    let mut interest = inner.base_interest.clone();
                    let mut name = versioned_name;
                    name.append_segment(request.0);
                    interest.set_name(name);
                    interest.set_can_be_prefix(false);
                    interest.set_must_be_fresh(false);
                    interest.set_lifetime(inner.options.interest_lifetime);
                    interest.refresh_nonce();
                    to_send.push((request.0, interest, request.1));
                    available -= 1;
                }
                Plan::Send(to_send)
            }
            done => Plan::Finalize(done),
        }
    };

    match plan {
        Plan::Finalize(Completion::Block) => finalize_block(fetcher),
        Plan::Finalize(Completion::InOrder) => finalize_in_order(fetcher),
        Plan::Finalize(Completion::NotDone) => {}
        Plan::Send(to_send) => {
            for (segment, interest, is_retransmission) in to_send {
                send_interest(fetcher, segment, interest, is_retransmission);
            }
        }
    }
}

fn send_interest(fetcher: &SegmentFetcher, segment: u64, interest: Interest, is_retransmission: bool) {
    let weak = Rc::downgrade(&fetcher.inner);
    let face = {
        let mut inner = fetcher.inner.borrow_mut();
        inner.n_in_flight += 1;
        inner.face.clone()
    };

    let data_weak = weak.clone();
    let on_data: DataCallback = Box::new(move |_interest, data| {
        handle_data(&data_weak, data);
    });
    let nack_weak = weak.clone();
    let on_nack: NackCallback = Box::new(move |_interest, nack| {
        handle_nack(&nack_weak, segment, nack);
    });

    let handle = match face.express_interest(interest, Some(on_data), Some(on_nack), None) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("cannot express segment Interest: {e}");
            fetcher.inner.borrow_mut().n_in_flight -= 1;
            return;
        }
    };

    let mut inner = fetcher.inner.borrow_mut();
    let timeout = if inner.options.use_constant_interest_timeout {
        inner.options.max_timeout
    } else {
        inner.rtt.estimated_rto().min(inner.options.max_timeout)
    };
    let timeout_weak = weak;
    let timeout_event = inner.scheduler.schedule(timeout, move || {
        handle_timeout(&timeout_weak, segment);
    });
    let interest_hdl =
        ScopedCancelHandle::new(CancelHandle::new(move || handle.cancel()));

    if is_retransmission {
        if let Some(pending) = inner.pending.get_mut(&segment) {
            debug_assert_eq!(pending.state, SegmentState::InRetxQueue);
            pending.state = SegmentState::Retransmitted;
            pending.interest_hdl = interest_hdl;
            pending.timeout_event = timeout_event;
        }
        return;
    }

    let send_time = inner.clock.now();
    let fresh = inner
        .pending
        .insert(
            segment,
            PendingSegment {
                state: SegmentState::FirstInterest,
                send_time,
                interest_hdl,
                timeout_event,
            },
        )
        .is_none();
    debug_assert!(fresh);
    inner.high_interest = inner.high_interest.max(segment);
}

fn handle_data(weak: &Weak<RefCell<Inner>>, data: &Data) {
    let Some(inner_rc) = weak.upgrade() else { return };
    let fetcher = SegmentFetcher { inner: inner_rc };
    if is_stopped(&fetcher) {
        return;
    }

    enum Step {
        Ignore,
        NoSegmentNumber,
        Validate(u64),
    }

    let step = {
        let mut inner = fetcher.inner.borrow_mut();
        inner.n_in_flight = inner.n_in_flight.saturating_sub(1);

        let segment = data.name().at(-1).and_then(|c| c.to_segment().ok());
        match segment {
            None => Step::NoSegmentNumber,
            Some(segment) => {
                // the reply to the discovery Interest can carry any segment
                let key = if inner.received.is_empty() {
                    inner.pending.keys().next().copied()
                } else if inner.pending.contains_key(&segment) {
                    Some(segment)
                } else {
                    None
                };
                match key {
                    None => Step::Ignore,
                    Some(key) => {
                        if let Some(pending) = inner.pending.get_mut(&key) {
                            pending.timeout_event.cancel();
                        }
                        Step::Validate(key)
                    }
                }
            }
        }
    };

    match step {
        Step::Ignore => {}
        Step::NoSegmentNumber => {
            signal_error(
                &fetcher,
                FetchErrorCode::DataHasNoSegment,
                "Data name has no segment number",
            );
        }
        Step::Validate(key) => {
            invoke_data_hook(&fetcher, |inner| inner.after_segment_received.clone(), data);

            let validator = fetcher.inner.borrow().validator.clone();
            let ok_weak = Rc::downgrade(&fetcher.inner);
            let fail_weak = ok_weak.clone();
            validator.validate(
                data,
                Box::new(move |data| {
                    let Some(inner_rc) = ok_weak.upgrade() else { return };
                    let fetcher = SegmentFetcher { inner: inner_rc };
                    if !is_stopped(&fetcher) {
                        handle_validated(&fetcher, key, data);
                    }
                }),
                Box::new(move |_data, error| {
                    let Some(inner_rc) = fail_weak.upgrade() else { return };
                    let fetcher = SegmentFetcher { inner: inner_rc };
                    if !is_stopped(&fetcher) {
                        signal_error(
                            &fetcher,
                            FetchErrorCode::SegmentValidationFail,
                            format!("segment validation failed: {error}"),
                        );
                    }
                }),
            );
        }
    }
}

fn handle_validated(fetcher: &SegmentFetcher, key: u64, data: &Data) {
    enum Step {
        BadFinalBlock,
        Continue(Vec<Bytes>),
    }

    let step = {
        let mut inner = fetcher.inner.borrow_mut();
        let inner = &mut *inner;
        inner.time_last_segment = inner.clock.now();
        inner.n_received += 1;

        // presence of the segment component was checked before validation
        let Some(segment) = data.name().at(-1).and_then(|c| c.to_segment().ok()) else {
            return;
        };

        if let Some(pending) = inner.pending.get(&key) {
            if pending.state == SegmentState::FirstInterest {
                let sample = inner.time_last_segment.duration_since(pending.send_time);
                let expected = (inner.n_in_flight + 1).max(1) as usize;
                inner.rtt.add_measurement(sample, expected);
            }
        }
        inner.pending.remove(&key);

        inner.received.insert(segment, data.content().clone());
        inner.n_bytes_received += data.content().len() as u64;

        let mut bad_final_block = false;
        if let Some(final_block) = data.final_block_id() {
            match final_block.to_segment() {
                Err(_) => bad_final_block = true,
                Ok(last) => {
                    if inner.n_segments != Some(last + 1) {
                        inner.n_segments = Some(last + 1);
                        cancel_excess_in_flight(inner);
                    }
                }
            }
        }

        if bad_final_block {
            Step::BadFinalBlock
        } else {
            if inner.received.len() == 1 {
                inner.versioned_name = Some(data.name().prefix(data.name().len() - 1));
                if segment == 0 {
                    // discovery returned segment 0; move past it
                    inner.next_segment = inner.next_segment.max(1);
                }
            }
            inner.high_data = inner.high_data.max(segment);

            let congested = data.tags().congestion_mark.unwrap_or(0) > 0
                && !inner.options.ignore_cong_marks;
            if congested {
                window_decrease(inner);
            } else {
                window_increase(inner);
            }

            let mut deliveries = Vec::new();
            if inner.options.in_order {
                while let Some(payload) = inner.received.remove(&inner.next_to_deliver) {
                    deliveries.push(payload);
                    inner.next_to_deliver += 1;
                }
            }
            Step::Continue(deliveries)
        }
    };

    match step {
        Step::BadFinalBlock => {
            signal_error(
                fetcher,
                FetchErrorCode::FinalBlockIdNotSegment,
                "FinalBlockId does not contain a segment component",
            );
        }
        Step::Continue(deliveries) => {
            invoke_data_hook(fetcher, |inner| inner.after_segment_validated.clone(), data);
            if !deliveries.is_empty() {
                let hook = fetcher.inner.borrow().on_in_order_data.clone();
                if let Some(hook) = hook {
                    for payload in deliveries {
                        (hook.borrow_mut())(payload);
                    }
                }
            }
            if is_stopped(fetcher) {
                return; // a hook stopped the transfer
            }
            fetch_segments_in_window(fetcher);
        }
    }
}

fn handle_nack(weak: &Weak<RefCell<Inner>>, segment: u64, nack: &Nack) {
    let Some(inner_rc) = weak.upgrade() else { return };
    let fetcher = SegmentFetcher { inner: inner_rc };
    if is_stopped(&fetcher) {
        return;
    }

    debug!("segment {segment} nacked: {}", nack.reason());
    invoke_event_hook(&fetcher, |inner| inner.after_segment_nacked.clone());
    {
        let mut inner = fetcher.inner.borrow_mut();
        inner.n_in_flight = inner.n_in_flight.saturating_sub(1);
    }

    match nack.reason() {
        NackReason::Congestion | NackReason::Duplicate => {
            after_nack_or_timeout(&fetcher, segment);
        }
        _ => {
            signal_error(&fetcher, FetchErrorCode::NackError, "Nack error");
        }
    }
}

fn handle_timeout(weak: &Weak<RefCell<Inner>>, segment: u64) {
    let Some(inner_rc) = weak.upgrade() else { return };
    let fetcher = SegmentFetcher { inner: inner_rc };
    if is_stopped(&fetcher) {
        return;
    }

    debug!("segment {segment} timed out");
    invoke_event_hook(&fetcher, |inner| inner.after_segment_timed_out.clone());
    {
        let mut inner = fetcher.inner.borrow_mut();
        inner.n_in_flight = inner.n_in_flight.saturating_sub(1);
    }
    after_nack_or_timeout(&fetcher, segment);
}

fn after_nack_or_timeout(fetcher: &SegmentFetcher, segment: u64) {
    enum Next {
        Fail,
        ResendFirst,
        Resume,
    }

    let next = {
        let mut inner = fetcher.inner.borrow_mut();
        if inner.clock.now() >= inner.time_last_segment + inner.options.max_timeout {
            Next::Fail
        } else {
            if let Some(pending) = inner.pending.get_mut(&segment) {
                pending.timeout_event.cancel();
                pending.state = SegmentState::InRetxQueue;
            }
            inner.rtt.backoff_rto();

            if inner.received.is_empty() {
                Next::ResendFirst
            } else {
                window_decrease(&mut inner);
                inner.retx_queue.push_back(segment);
                Next::Resume
            }
        }
    };

    match next {
        Next::Fail => signal_error(fetcher, FetchErrorCode::InterestTimeout, "timeout exceeded"),
        Next::ResendFirst => fetch_first_segment(fetcher, true),
        Next::Resume => fetch_segments_in_window(fetcher),
    }
}

fn finalize_block(fetcher: &SegmentFetcher) {
    let (payload, on_complete) = {
        let mut inner = fetcher.inner.borrow_mut();
        let n_segments = inner.n_segments.unwrap_or(0);
        let mut payload = BytesMut::with_capacity(inner.n_bytes_received as usize);
        for segment in 0..n_segments {
            if let Some(bytes) = inner.received.get(&segment) {
                payload.extend_from_slice(bytes);
            }
        }
        (payload.freeze(), inner.on_complete.take())
    };

    if let Some(on_complete) = on_complete {
        on_complete(payload);
    }
    fetcher.stop();
}

fn finalize_in_order(fetcher: &SegmentFetcher) {
    let on_complete = fetcher.inner.borrow_mut().on_in_order_complete.take();
    if let Some(on_complete) = on_complete {
        on_complete();
    }
    fetcher.stop();
}

fn window_increase(inner: &mut Inner) {
    if inner.options.use_constant_cwnd {
        return;
    }
    if inner.cwnd < inner.ssthresh {
        inner.cwnd += inner.options.ai_step; // additive increase
    } else {
        inner.cwnd += inner.options.ai_step / inner.cwnd.floor(); // congestion avoidance
    }
}

fn window_decrease(inner: &mut Inner) {
    // Conservative Window Adaptation: react at most once per RTT
    if inner.options.disable_cwa || inner.high_data > inner.rec_point {
        inner.rec_point = inner.high_interest;
        if inner.options.use_constant_cwnd {
            return;
        }
        inner.ssthresh = MIN_SSTHRESH.max(inner.cwnd * inner.options.md_coef);
        inner.cwnd = if inner.options.reset_cwnd_to_init {
            inner.options.init_cwnd
        } else {
            inner.ssthresh
        };
    }
}

fn cancel_excess_in_flight(inner: &mut Inner) {
    let Some(n_segments) = inner.n_segments else {
        return;
    };
    let excess: Vec<u64> = inner.pending.range(n_segments..).map(|(s, _)| *s).collect();
    for segment in excess {
        inner.pending.remove(&segment);
        inner.n_in_flight = inner.n_in_flight.saturating_sub(1);
    }
}

fn invoke_data_hook(
    fetcher: &SegmentFetcher,
    select: impl FnOnce(&Inner) -> Option<DataHook>,
    data: &Data,
) {
    let hook = select(&fetcher.inner.borrow());
    if let Some(hook) = hook {
        (hook.borrow_mut())(data);
    }
}

fn invoke_event_hook(fetcher: &SegmentFetcher, select: impl FnOnce(&Inner) -> Option<EventHook>) {
    let hook = select(&fetcher.inner.borrow());
    if let Some(hook) = hook {
        (hook.borrow_mut())();
    }
}
