//! Client-side runtime of the NDN library.
//!
//! The central type is [`Face`]: the application's end of one logical link
//! to a local NDN forwarder. A Face multiplexes many concurrent
//! Interest/Data exchanges over a single stream transport, dispatches
//! incoming packets to application callbacks, registers prefixes with the
//! forwarder through signed management commands, and supports reliable bulk
//! transfer of segmented objects via [`fetch::SegmentFetcher`].
//!
//! Everything runs on one thread: callbacks fire from within
//! [`Face::process_events`], and the types are deliberately `!Send`.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod dummy_face;
pub mod face;
pub mod fetch;
pub mod interest_filter;
pub mod mgmt;
pub mod pending_interest;
pub mod record;
pub mod registered_prefix;
pub mod scheduler;
pub mod security;
pub mod transport;

pub use cancel::{CancelHandle, ScopedCancelHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ConfigError;
pub use dummy_face::DummyFace;
pub use face::{
    Face, FaceBuilder, FaceError, InterestFilterHandle, PendingInterestHandle,
    RegisteredPrefixHandle,
};
pub use interest_filter::InterestFilter;
pub use pending_interest::{DataCallback, NackCallback, PendingInterestOrigin, TimeoutCallback};
pub use record::{RecordContainer, RecordId};
pub use scheduler::{EventId, Scheduler};
pub use security::{Signer, SigningInfo, Validator};
pub use transport::{DummyTransport, Transport, TransportError, TransportState};

pub use rust_ndnc_common::MAX_PACKET_SIZE;
