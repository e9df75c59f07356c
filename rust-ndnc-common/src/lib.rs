//! Shared packet types and TLV codec for the NDN client library.
//!
//! This crate holds everything that crosses the wire: names, Interest and
//! Data packets, link-layer (NDNLP) frames with their out-of-band tags, and
//! the TLV primitives they are built from.

pub mod error;
pub mod lp;
pub mod name;
pub mod packet;
pub mod tlv;

pub use error::NdnError;
pub use lp::{CachePolicy, Nack, NackReason, NetPacket, Tags};
pub use name::{Component, Name};
pub use packet::{Data, Interest, SignatureInfo};

/// Maximum size of an NDN packet on the wire, including any NDNLP framing.
pub const MAX_PACKET_SIZE: usize = 8800;
