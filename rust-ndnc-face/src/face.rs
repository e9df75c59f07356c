//! The Face runtime: one logical link between the application and the
//! forwarder.
//!
//! Logging follows the packet direction: `<` marks an outgoing packet, `>`
//! an incoming one, followed by `I`/`D`/`N` for Interest, Data, Nack.
//! Registration events log at info level, packet traffic at debug level.

use crate::clock::{Clock, SystemClock};
use crate::config::{self, ConfigError};
use crate::interest_filter::{InterestCallback, InterestFilter, InterestFilterRecord};
use crate::mgmt::controller::{self, CommandError, CommandOptions};
use crate::mgmt::{ControlParameters, RibRegisterCommand, RibUnregisterCommand};
use crate::pending_interest::{
    DataCallback, NackCallback, PendingInterest, PendingInterestOrigin, TimeoutCallback,
};
use crate::record::{RecordContainer, RecordId};
use crate::registered_prefix::RegisteredPrefix;
use crate::scheduler::{EventId, Scheduler};
use crate::security::{AcceptAllValidator, DigestSigner, Signer, Validator};
use crate::transport::{Transport, TransportState};
use bytes::Bytes;
use log::{debug, info, warn};
use rust_ndnc_common::{lp, Data, Interest, Nack, Name, NetPacket, MAX_PACKET_SIZE};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use thiserror::Error;

/// How long the event loop naps when it has nothing to wait on.
const IDLE_NAP: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum FaceError {
    /// The encoded packet exceeds [`MAX_PACKET_SIZE`].
    #[error("'{pkt_type}' packet {name} has wire size {wire_size}, exceeding the maximum packet size")]
    OversizedPacket {
        pkt_type: char,
        name: Name,
        wire_size: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) struct FaceImpl {
    pub(crate) transport: Rc<RefCell<Box<dyn Transport>>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) signer: Rc<dyn Signer>,
    pub(crate) validator: Rc<dyn Validator>,
    pub(crate) pit: RecordContainer<PendingInterest>,
    pub(crate) filters: RecordContainer<InterestFilterRecord>,
    pub(crate) prefixes: RecordContainer<RegisteredPrefix>,
    weak_self: Weak<RefCell<FaceImpl>>,
    stopped: bool,
}

impl FaceImpl {
    fn ensure_connected(&mut self, want_resume: bool) {
        let mut transport = self.transport.borrow_mut();
        if transport.state() == TransportState::Closed {
            if let Err(e) = transport.connect() {
                warn!("transport connect failed: {e}");
            }
        }
        if want_resume {
            transport.resume();
        }
    }

    /// Transport failures are recorded on the transport, not surfaced to
    /// the caller; affected pending Interests will time out normally.
    fn send_wire(&mut self, wire: &[u8]) {
        if let Err(e) = self.transport.borrow_mut().send(wire) {
            warn!("transport send failed: {e}");
        }
    }

    /// Schedules the lifetime timeout for pending-Interest record `id`.
    fn arm_timeout(&mut self, id: RecordId, interest: Rc<Interest>) -> EventId {
        let weak = self.weak_self.clone();
        self.scheduler.schedule(interest.lifetime(), move || {
            let Some(inner) = weak.upgrade() else { return };
            let record = inner.borrow_mut().pit.erase(id);
            if let Some(mut record) = record {
                debug!("   timeout {}", record.interest());
                if let Some(mut on_timeout) = record.take_timeout_callback() {
                    on_timeout(&interest);
                }
            }
        })
    }
}

/// Builds a [`Face`] with non-default collaborators.
#[derive(Default)]
pub struct FaceBuilder {
    transport: Option<Box<dyn Transport>>,
    clock: Option<Rc<dyn Clock>>,
    signer: Option<Rc<dyn Signer>>,
    validator: Option<Rc<dyn Validator>>,
}

impl FaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn signer(mut self, signer: Rc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn validator(mut self, validator: Rc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn build(self) -> Result<Face, FaceError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => config::create_transport(&config::discover_transport_uri()?)?,
        };
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        let scheduler = Scheduler::new(Rc::clone(&clock));

        let inner = Rc::new(RefCell::new(FaceImpl {
            transport: Rc::new(RefCell::new(transport)),
            scheduler: scheduler.clone(),
            clock,
            signer: self.signer.unwrap_or_else(|| Rc::new(DigestSigner::new())),
            validator: self
                .validator
                .unwrap_or_else(|| Rc::new(AcceptAllValidator)),
            pit: RecordContainer::new(),
            filters: RecordContainer::new(),
            prefixes: RecordContainer::new(),
            weak_self: Weak::new(),
            stopped: false,
        }));

        {
            let mut im = inner.borrow_mut();
            im.weak_self = Rc::downgrade(&inner);
            im.pit
                .set_on_empty(make_idle_check(Rc::downgrade(&inner), scheduler.clone()));
            im.prefixes
                .set_on_empty(make_idle_check(Rc::downgrade(&inner), scheduler));
        }

        Ok(Face { inner })
    }
}

/// Reacts to the pending-Interest or registered-prefix table becoming
/// empty. The reaction is deferred through a zero-delay event so the
/// transport is never paused from inside a dispatch.
fn make_idle_check(weak: Weak<RefCell<FaceImpl>>, scheduler: Scheduler) -> impl Fn() {
    move || {
        let weak = weak.clone();
        let mut event = scheduler.schedule(Duration::ZERO, move || {
            if let Some(inner) = weak.upgrade() {
                let im = inner.borrow();
                if im.pit.is_empty() && im.prefixes.is_empty() {
                    im.transport.borrow_mut().pause();
                }
            }
        });
        event.release();
    }
}

/// The application's end of a single logical link to a forwarder.
///
/// `Face` is a cheap handle; clones share the same state. All callbacks run
/// on the thread inside [`Face::process_events`] (or [`Face::poll`]).
#[derive(Clone)]
pub struct Face {
    pub(crate) inner: Rc<RefCell<FaceImpl>>,
}

impl Face {
    /// Creates a Face using the transport discovered from the environment
    /// and client configuration file.
    pub fn new() -> Result<Self, FaceError> {
        FaceBuilder::new().build()
    }

    /// Creates a Face over the given transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        FaceBuilder::new()
            .transport(transport)
            .build()
            .expect("face construction cannot fail with an explicit transport")
    }

    pub fn builder() -> FaceBuilder {
        FaceBuilder::new()
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.borrow().clock)
    }

    pub fn signer(&self) -> Rc<dyn Signer> {
        Rc::clone(&self.inner.borrow().signer)
    }

    pub fn validator(&self) -> Rc<dyn Validator> {
        Rc::clone(&self.inner.borrow().validator)
    }

    /// Expresses an Interest toward the forwarder and any local filters
    /// that allow loopback.
    ///
    /// Each of the three callbacks may be `None`, in which case the
    /// corresponding outcome is silently swallowed.
    pub fn express_interest(
        &self,
        mut interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<PendingInterestHandle, FaceError> {
        interest.ensure_nonce();
        let wire = lp::encode_interest_frame(&interest);
        if wire.len() > MAX_PACKET_SIZE {
            return Err(FaceError::OversizedPacket {
                pkt_type: 'I',
                name: interest.name().clone(),
                wire_size: wire.len(),
            });
        }

        debug!("<I {interest}");
        let interest = Rc::new(interest);
        let id = {
            let mut im = self.inner.borrow_mut();
            im.ensure_connected(true);
            let id = im.pit.allocate_id();
            let timeout_event = im.arm_timeout(id, Rc::clone(&interest));
            let mut record =
                PendingInterest::new_app(Rc::clone(&interest), on_data, on_nack, on_timeout, timeout_event);
            record.record_forwarding(); // the forwarder is one destination
            im.pit.put(id, record);
            im.send_wire(&wire);
            id
        };
        self.dispatch_interest(id, &interest);

        Ok(PendingInterestHandle {
            inner: Rc::downgrade(&self.inner),
            id,
        })
    }

    /// Publishes a Data packet: satisfies local pending Interests and
    /// forwards to the forwarder when appropriate.
    pub fn put_data(&self, data: &Data) -> Result<(), FaceError> {
        let wire = lp::encode_data_frame(data);
        if wire.len() > MAX_PACKET_SIZE {
            return Err(FaceError::OversizedPacket {
                pkt_type: 'D',
                name: data.name().clone(),
                wire_size: wire.len(),
            });
        }

        debug!("<D {}", data.name());
        let should_send = self.satisfy_pending_interests(data);
        if !should_send {
            return Ok(());
        }

        let mut im = self.inner.borrow_mut();
        im.ensure_connected(true);
        im.send_wire(&wire);
        Ok(())
    }

    /// Sends a Nack for a previously received Interest.
    ///
    /// The Nack is aggregated against the pending record: it reaches the
    /// forwarder only when every destination of that Interest has Nacked,
    /// carrying the least severe reason seen. Unsolicited Nacks are
    /// silently dropped.
    pub fn put_nack(&self, nack: &Nack) -> Result<(), FaceError> {
        debug!("<N {nack}");
        let Some(out_nack) = self.nack_pending_interests(nack) else {
            return Ok(());
        };

        let wire = lp::encode_nack_frame(&out_nack);
        if wire.len() > MAX_PACKET_SIZE {
            return Err(FaceError::OversizedPacket {
                pkt_type: 'N',
                name: out_nack.interest().name().clone(),
                wire_size: wire.len(),
            });
        }

        let mut im = self.inner.borrow_mut();
        im.ensure_connected(true);
        im.send_wire(&wire);
        Ok(())
    }

    /// Installs a local Interest filter; no forwarder interaction.
    pub fn set_interest_filter(
        &self,
        filter: impl Into<InterestFilter>,
        on_interest: impl FnMut(&InterestFilter, &Interest) + 'static,
    ) -> InterestFilterHandle {
        let filter = filter.into();
        info!("setting InterestFilter: {filter}");
        let callback: InterestCallback = Rc::new(RefCell::new(on_interest));
        let mut im = self.inner.borrow_mut();
        let (id, _) = im
            .filters
            .insert(InterestFilterRecord::new(filter, callback));
        InterestFilterHandle {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Registers a prefix with the forwarder.
    ///
    /// `on_success` receives the ControlParameters echoed by the forwarder.
    pub fn register_prefix(
        &self,
        prefix: Name,
        options: CommandOptions,
        flags: u64,
        on_success: Option<Box<dyn FnOnce(&ControlParameters)>>,
        on_failure: Option<Box<dyn FnOnce(&Name, &CommandError)>>,
    ) -> RegisteredPrefixHandle {
        self.register_prefix_impl(prefix, options, flags, None, on_success, on_failure)
    }

    /// Registers the filter's prefix with the forwarder and installs the
    /// filter once registration succeeds.
    pub fn register_prefix_with_filter(
        &self,
        filter: InterestFilter,
        on_interest: impl FnMut(&InterestFilter, &Interest) + 'static,
        options: CommandOptions,
        flags: u64,
        on_success: Option<Box<dyn FnOnce(&ControlParameters)>>,
        on_failure: Option<Box<dyn FnOnce(&Name, &CommandError)>>,
    ) -> RegisteredPrefixHandle {
        let prefix = filter.prefix().clone();
        let callback: InterestCallback = Rc::new(RefCell::new(on_interest));
        self.register_prefix_impl(
            prefix,
            options,
            flags,
            Some((filter, callback)),
            on_success,
            on_failure,
        )
    }

    fn register_prefix_impl(
        &self,
        prefix: Name,
        options: CommandOptions,
        flags: u64,
        filter: Option<(InterestFilter, InterestCallback)>,
        on_success: Option<Box<dyn FnOnce(&ControlParameters)>>,
        on_failure: Option<Box<dyn FnOnce(&Name, &CommandError)>>,
    ) -> RegisteredPrefixHandle {
        info!("registering prefix: {prefix}");
        let id = self.inner.borrow_mut().prefixes.allocate_id();

        let params = ControlParameters::new()
            .with_name(prefix.clone())
            .with_flags(flags);

        let face = self.clone();
        let success_prefix = prefix.clone();
        let success_options = options.clone();
        let failure_prefix = prefix;
        controller::start_command(
            self,
            RibRegisterCommand,
            params,
            &options,
            Box::new(move |response_params| {
                info!("registered prefix: {success_prefix}");
                let filter_id = filter.map(|(filter, callback)| {
                    info!("setting InterestFilter: {filter}");
                    face.inner
                        .borrow_mut()
                        .filters
                        .insert(InterestFilterRecord::new(filter, callback))
                        .0
                });
                face.inner.borrow_mut().prefixes.put(
                    id,
                    RegisteredPrefix::new(success_prefix.clone(), success_options, filter_id),
                );
                if let Some(on_success) = on_success {
                    on_success(&response_params);
                }
            }),
            Box::new(move |response| {
                info!("register prefix failed: {failure_prefix}");
                if let Some(on_failure) = on_failure {
                    on_failure(&failure_prefix, &CommandError::from(&response));
                }
            }),
        );

        RegisteredPrefixHandle {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Withdraws a registration: unsets the associated filter, sends
    /// `rib/unregister`, and erases the record when the forwarder confirms.
    pub(crate) fn unregister_prefix(&self, id: RecordId) {
        let registered = {
            let im = self.inner.borrow();
            im.prefixes
                .get(id)
                .map(|record| (record.prefix().clone(), record.options().clone(), record.filter_id()))
        };
        let Some((prefix, options, filter_id)) = registered else {
            return;
        };

        if let Some(filter_id) = filter_id {
            self.unset_interest_filter(filter_id);
        }
        info!("unregistering prefix: {prefix}");

        let face = self.clone();
        let failed_prefix = prefix.clone();
        controller::start_command(
            self,
            RibUnregisterCommand,
            ControlParameters::new().with_name(prefix.clone()),
            &options,
            Box::new(move |_| {
                info!("unregistered prefix: {prefix}");
                face.inner.borrow_mut().prefixes.erase(id);
            }),
            Box::new(move |response| {
                warn!("unregister prefix failed: {failed_prefix}: {response}");
            }),
        );
    }

    pub(crate) fn unset_interest_filter(&self, id: RecordId) {
        let mut im = self.inner.borrow_mut();
        if let Some(record) = im.filters.get(id) {
            info!("unsetting InterestFilter: {}", record.filter());
            im.filters.erase(id);
        }
    }

    /// Clears the pending-Interest table without invoking any callbacks.
    pub fn remove_all_pending_interests(&self) {
        self.inner.borrow_mut().pit.clear();
    }

    /// Number of outstanding pending Interests (from both origins).
    pub fn n_pending_interests(&self) -> usize {
        self.inner.borrow().pit.len()
    }

    /// Runs the event loop.
    ///
    /// With `timeout: None` the loop runs until out of work (or forever
    /// when `keep_running` is set); otherwise it returns once the timeout
    /// elapses. Use [`Face::poll`] to run only handlers that are already
    /// due. A panicking scheduler callback propagates to the caller;
    /// remaining due events run on the next invocation.
    pub fn process_events(&self, timeout: Option<Duration>, keep_running: bool) {
        let (scheduler, clock) = {
            let mut im = self.inner.borrow_mut();
            im.stopped = false;
            (im.scheduler.clone(), Rc::clone(&im.clock))
        };
        let deadline = timeout.map(|t| clock.now() + t);

        loop {
            self.run_ready(&scheduler);

            if self.inner.borrow().stopped {
                break;
            }

            let transport = self.inner.borrow().transport.clone();
            let transport_active = transport.borrow().state() == TransportState::Running;
            if !keep_running && !scheduler.has_pending() && !transport_active {
                break; // out of work
            }

            let now = clock.now();
            if let Some(deadline) = deadline {
                if now >= deadline {
                    break;
                }
            }

            let mut budget = deadline.map(|d| d.saturating_duration_since(now));
            if let Some(next) = scheduler.next_deadline() {
                let until = next.saturating_duration_since(now);
                budget = Some(budget.map_or(until, |b| b.min(until)));
            }

            if transport_active {
                let mut sink = Vec::new();
                let result = transport.borrow_mut().wait(budget, &mut sink);
                if let Err(e) = result {
                    warn!("transport error: {e}");
                }
                for wire in sink {
                    self.handle_incoming(wire);
                }
            } else {
                std::thread::sleep(budget.unwrap_or(IDLE_NAP).min(IDLE_NAP));
            }
        }
    }

    /// Processes handlers that are already due, without blocking.
    pub fn poll(&self) {
        let scheduler = self.inner.borrow().scheduler.clone();
        self.run_ready(&scheduler);
    }

    /// Cancels all tables and stops the event loop.
    pub fn shutdown(&self) {
        info!("shutting down Face");
        let mut im = self.inner.borrow_mut();
        im.stopped = true;
        im.pit.clear();
        im.prefixes.clear();
        im.transport.borrow_mut().close();
    }

    fn run_ready(&self, scheduler: &Scheduler) {
        let transport = self.inner.borrow().transport.clone();
        if transport.borrow().state() == TransportState::Running {
            let mut sink = Vec::new();
            let result = transport
                .borrow_mut()
                .wait(Some(Duration::ZERO), &mut sink);
            if let Err(e) = result {
                warn!("transport error: {e}");
            }
            for wire in sink {
                self.handle_incoming(wire);
            }
        }
        while let Some(callback) = scheduler.pop_due() {
            callback();
        }
    }

    /// Entry point for one whole TLV element received from the transport.
    pub(crate) fn handle_incoming(&self, wire: Bytes) {
        if wire.len() > MAX_PACKET_SIZE {
            warn!("dropping oversized incoming packet of {} bytes", wire.len());
            return;
        }
        match lp::decode_packet(&wire) {
            Err(e) => warn!("failed to decode incoming packet: {e}"),
            Ok(NetPacket::Interest(interest)) => {
                debug!(">I {interest}");
                self.process_incoming_interest(interest);
            }
            Ok(NetPacket::Data(data)) => {
                debug!(">D {}", data.name());
                // Data from the forwarder is never echoed back
                self.satisfy_pending_interests(&data);
            }
            Ok(NetPacket::Nack(nack)) => {
                debug!(">N {nack}");
                self.nack_pending_interests(&nack);
            }
        }
    }

    fn process_incoming_interest(&self, interest: Interest) {
        let interest = Rc::new(interest);
        let id = {
            let mut im = self.inner.borrow_mut();
            let id = im.pit.allocate_id();
            let timeout_event = im.arm_timeout(id, Rc::clone(&interest));
            im.pit
                .put(id, PendingInterest::new_forwarder(Rc::clone(&interest), timeout_event));
            id
        };
        self.dispatch_interest(id, &interest);
    }

    /// Delivers an Interest to every matching filter, counting each filter
    /// as one destination of the pending record.
    ///
    /// Destinations are counted before any callback runs, so Nacks put
    /// from inside the callbacks aggregate across all matched filters.
    fn dispatch_interest(&self, pit_id: RecordId, interest: &Interest) {
        let mut matched: Vec<(InterestFilter, InterestCallback)> = Vec::new();
        {
            let mut im = self.inner.borrow_mut();
            let Some(origin) = im.pit.get(pit_id).map(|record| record.origin()) else {
                return;
            };
            im.filters.for_each(|_, record| {
                if record.does_match(origin, interest.name()) {
                    matched.push((record.filter().clone(), record.callback()));
                }
            });
            if let Some(record) = im.pit.get_mut(pit_id) {
                for _ in 0..matched.len() {
                    record.record_forwarding();
                }
            }
        }

        for (filter, callback) in matched {
            debug!("   matches {filter}");
            match callback.try_borrow_mut() {
                Ok(mut callback) => callback(&filter, interest),
                // the callback re-entered its own filter; drop this delivery
                Err(_) => warn!("skipping reentrant dispatch to {filter}"),
            }
        }
    }

    /// Satisfies every pending record matched by `data`.
    ///
    /// Returns whether the Data should go to the forwarder: it should
    /// unless it only satisfied local APP Interests.
    fn satisfy_pending_interests(&self, data: &Data) -> bool {
        let mut has_app_match = false;
        let mut has_forwarder_match = false;
        let mut cursor: RecordId = 0;

        loop {
            let satisfied = {
                let mut im = self.inner.borrow_mut();
                match im
                    .pit
                    .next_id_where(cursor, |record| record.interest().matches_data(data))
                {
                    None => None,
                    Some(id) => {
                        cursor = id;
                        im.pit.erase(id)
                    }
                }
            };
            let Some(mut record) = satisfied else { break };

            debug!("   satisfying {} from {}", record.interest(), record.origin());
            match record.origin() {
                PendingInterestOrigin::App => {
                    has_app_match = true;
                    let interest = Rc::clone(record.interest());
                    if let Some(mut on_data) = record.take_data_callback() {
                        on_data(&interest, data);
                    }
                }
                PendingInterestOrigin::Forwarder => has_forwarder_match = true,
            }
        }

        has_forwarder_match || !has_app_match
    }

    /// Applies a Nack to every matching pending record.
    ///
    /// Returns the aggregated Nack to emit upstream when at least one
    /// forwarder-origin record became fully Nacked.
    fn nack_pending_interests(&self, nack: &Nack) -> Option<Nack> {
        let mut out_nack: Option<Nack> = None;
        let mut cursor: RecordId = 0;

        loop {
            let fully_nacked = {
                let mut im = self.inner.borrow_mut();
                match im
                    .pit
                    .next_id_where(cursor, |record| nack.matches_interest(record.interest()))
                {
                    None => break,
                    Some(id) => {
                        cursor = id;
                        let aggregated = im
                            .pit
                            .get_mut(id)
                            .and_then(|record| record.record_nack(nack));
                        aggregated.and_then(|aggregated| {
                            im.pit.erase(id).map(|record| (record, aggregated))
                        })
                    }
                }
            };
            let Some((mut record, aggregated)) = fully_nacked else {
                continue;
            };

            debug!("   nacking {} from {}", record.interest(), record.origin());
            match record.origin() {
                PendingInterestOrigin::App => {
                    let interest = Rc::clone(record.interest());
                    if let Some(mut on_nack) = record.take_nack_callback() {
                        on_nack(&interest, &aggregated);
                    }
                }
                PendingInterestOrigin::Forwarder => {
                    out_nack = Some(match out_nack.take() {
                        None => aggregated,
                        Some(previous) => {
                            if previous.reason().least_severe(aggregated.reason())
                                == previous.reason()
                            {
                                previous
                            } else {
                                aggregated
                            }
                        }
                    });
                }
            }
        }

        out_nack
    }
}

/// Handle to a pending Interest; `cancel` erases the record and its
/// timeout so no callback fires afterwards.
#[derive(Clone)]
pub struct PendingInterestHandle {
    inner: Weak<RefCell<FaceImpl>>,
    id: RecordId,
}

impl PendingInterestHandle {
    /// Cancels the pending Interest. A no-op if it already completed.
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().pit.erase(self.id);
        }
    }

    /// Converts into a handle that cancels when dropped.
    pub fn scoped(self) -> crate::cancel::ScopedCancelHandle {
        crate::cancel::ScopedCancelHandle::new(crate::cancel::CancelHandle::new(move || {
            self.cancel()
        }))
    }
}

/// Handle to a local Interest filter.
#[derive(Clone)]
pub struct InterestFilterHandle {
    inner: Weak<RefCell<FaceImpl>>,
    id: RecordId,
}

impl InterestFilterHandle {
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Face { inner }.unset_interest_filter(self.id);
        }
    }

    pub fn scoped(self) -> crate::cancel::ScopedCancelHandle {
        crate::cancel::ScopedCancelHandle::new(crate::cancel::CancelHandle::new(move || {
            self.cancel()
        }))
    }
}

/// Handle to a registered prefix; `cancel` withdraws the registration from
/// the forwarder and removes the associated filter, if any.
#[derive(Clone)]
pub struct RegisteredPrefixHandle {
    inner: Weak<RefCell<FaceImpl>>,
    id: RecordId,
}

impl RegisteredPrefixHandle {
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Face { inner }.unregister_prefix(self.id);
        }
    }

    pub fn scoped(self) -> crate::cancel::ScopedCancelHandle {
        crate::cancel::ScopedCancelHandle::new(crate::cancel::CancelHandle::new(move || {
            self.cancel()
        }))
    }
}
