//! Error types shared by the packet codec.

use thiserror::Error;

/// All possible errors raised while encoding or decoding NDN packets.
#[derive(Error, Debug)]
pub enum NdnError {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("packet error: {0}")]
    Packet(String),
}
