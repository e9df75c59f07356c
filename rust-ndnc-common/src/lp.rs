//! NDNLP link-layer framing: Nacks and out-of-band packet tags.
//!
//! A network packet goes on the wire bare unless at least one link-layer
//! field is present, in which case it is wrapped into an LpPacket whose
//! Fragment field carries the network packet. Fragmentation itself is not
//! used on the forwarder link, so a frame claiming more than one fragment
//! is rejected.

use crate::error::NdnError;
use crate::packet::{Data, Interest};
use crate::tlv::{self, TlvElement};
use bytes::{Bytes, BytesMut};
use std::fmt;

pub const TLV_LP_PACKET: u64 = 100;
pub const TLV_LP_FRAGMENT: u64 = 80;
pub const TLV_LP_SEQUENCE: u64 = 81;
pub const TLV_LP_FRAG_INDEX: u64 = 82;
pub const TLV_LP_FRAG_COUNT: u64 = 83;
pub const TLV_LP_NACK: u64 = 800;
pub const TLV_LP_NACK_REASON: u64 = 801;
pub const TLV_LP_NEXT_HOP_FACE_ID: u64 = 816;
pub const TLV_LP_INCOMING_FACE_ID: u64 = 817;
pub const TLV_LP_CACHE_POLICY: u64 = 820;
pub const TLV_LP_CACHE_POLICY_TYPE: u64 = 821;
pub const TLV_LP_CONGESTION_MARK: u64 = 832;

/// Reason code carried in a Nack header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum NackReason {
    None = 0,
    Congestion = 50,
    Duplicate = 100,
    NoRoute = 150,
}

impl NackReason {
    pub fn from_code(code: u64) -> Self {
        match code {
            50 => Self::Congestion,
            100 => Self::Duplicate,
            150 => Self::NoRoute,
            _ => Self::None,
        }
    }

    pub fn code(self) -> u64 {
        self as u64
    }

    /// Returns the less severe of two reasons.
    ///
    /// Severity ascends None < Congestion < Duplicate < NoRoute.
    pub fn least_severe(self, other: Self) -> Self {
        if self.code() <= other.code() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::None => "None",
            Self::Congestion => "Congestion",
            Self::Duplicate => "Duplicate",
            Self::NoRoute => "NoRoute",
        };
        write!(f, "{text}")
    }
}

/// Cache directive attached to outgoing Data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    NoCache,
}

impl CachePolicy {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::NoCache),
            _ => None,
        }
    }

    pub fn code(self) -> u64 {
        match self {
            Self::NoCache => 1,
        }
    }
}

/// Out-of-band annotations carried next to a packet in the link layer.
///
/// Tags do not participate in signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub incoming_face_id: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub congestion_mark: Option<u64>,
    pub cache_policy: Option<CachePolicy>,
}

/// A link-layer negative acknowledgement: an Interest plus a reason.
#[derive(Debug, Clone)]
pub struct Nack {
    interest: Interest,
    reason: NackReason,
    tags: Tags,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self {
            interest,
            reason,
            tags: Tags::default(),
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn reason(&self) -> NackReason {
        self.reason
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    /// Whether this Nack refers to `interest` (same Name and Nonce).
    pub fn matches_interest(&self, interest: &Interest) -> bool {
        self.interest.matches_interest(interest)
    }
}

impl fmt::Display for Nack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.interest, self.reason)
    }
}

/// A decoded network-layer packet, possibly unwrapped from an LpPacket.
#[derive(Debug, Clone)]
pub enum NetPacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

/// Encodes an Interest, wrapping into an LpPacket iff a link field is set.
pub fn encode_interest_frame(interest: &Interest) -> Bytes {
    let wire = interest.encode();
    match interest.tags().next_hop_face_id {
        None => wire,
        Some(face_id) => {
            let mut fields = BytesMut::new();
            TlvElement::new(TLV_LP_FRAGMENT, wire).encode(&mut fields);
            TlvElement::from_nonneg_integer(TLV_LP_NEXT_HOP_FACE_ID, face_id).encode(&mut fields);
            TlvElement::new(TLV_LP_PACKET, fields.freeze()).to_bytes()
        }
    }
}

/// Encodes a Data, wrapping into an LpPacket iff a link field is set.
pub fn encode_data_frame(data: &Data) -> Bytes {
    let wire = data.encode();
    let tags = data.tags();
    if tags.cache_policy.is_none() && tags.congestion_mark.is_none() {
        return wire;
    }

    let mut fields = BytesMut::new();
    TlvElement::new(TLV_LP_FRAGMENT, wire).encode(&mut fields);
    if let Some(policy) = tags.cache_policy {
        let mut inner = BytesMut::new();
        TlvElement::from_nonneg_integer(TLV_LP_CACHE_POLICY_TYPE, policy.code()).encode(&mut inner);
        TlvElement::new(TLV_LP_CACHE_POLICY, inner.freeze()).encode(&mut fields);
    }
    if let Some(mark) = tags.congestion_mark {
        TlvElement::from_nonneg_integer(TLV_LP_CONGESTION_MARK, mark).encode(&mut fields);
    }
    TlvElement::new(TLV_LP_PACKET, fields.freeze()).to_bytes()
}

/// Encodes a Nack; Nacks always travel inside an LpPacket.
pub fn encode_nack_frame(nack: &Nack) -> Bytes {
    let mut fields = BytesMut::new();
    TlvElement::new(TLV_LP_FRAGMENT, nack.interest().encode()).encode(&mut fields);

    let mut header = BytesMut::new();
    if nack.reason() != NackReason::None {
        TlvElement::from_nonneg_integer(TLV_LP_NACK_REASON, nack.reason().code())
            .encode(&mut header);
    }
    TlvElement::new(TLV_LP_NACK, header.freeze()).encode(&mut fields);

    if let Some(mark) = nack.tags().congestion_mark {
        TlvElement::from_nonneg_integer(TLV_LP_CONGESTION_MARK, mark).encode(&mut fields);
    }
    TlvElement::new(TLV_LP_PACKET, fields.freeze()).to_bytes()
}

/// Decodes a wire element into a network packet, unwrapping NDNLP framing
/// and attaching the recognised tags.
pub fn decode_packet(wire: &Bytes) -> Result<NetPacket, NdnError> {
    let mut buf = wire.clone();
    let outer = TlvElement::decode(&mut buf)?;

    match outer.tlv_type {
        tlv::TLV_INTEREST => Ok(NetPacket::Interest(Interest::from_tlv(&outer)?)),
        tlv::TLV_DATA => Ok(NetPacket::Data(Data::from_tlv(&outer)?)),
        TLV_LP_PACKET => decode_lp_packet(&outer),
        other => Err(NdnError::Packet(format!(
            "unrecognized packet TLV type {other}"
        ))),
    }
}

fn decode_lp_packet(outer: &TlvElement) -> Result<NetPacket, NdnError> {
    let mut fragment = None;
    let mut nack_reason = None;
    let mut tags = Tags::default();

    for element in TlvElement::decode_all(outer.value.clone())? {
        match element.tlv_type {
            TLV_LP_FRAGMENT => fragment = Some(element.value.clone()),
            TLV_LP_FRAG_INDEX => {
                if element.as_nonneg_integer()? != 0 {
                    return Err(NdnError::Packet("fragmented LpPacket not supported".into()));
                }
            }
            TLV_LP_FRAG_COUNT => {
                if element.as_nonneg_integer()? > 1 {
                    return Err(NdnError::Packet("fragmented LpPacket not supported".into()));
                }
            }
            TLV_LP_NACK => {
                let mut reason = NackReason::None;
                for inner in TlvElement::decode_all(element.value.clone())? {
                    if inner.tlv_type == TLV_LP_NACK_REASON {
                        reason = NackReason::from_code(inner.as_nonneg_integer()?);
                    }
                }
                nack_reason = Some(reason);
            }
            TLV_LP_INCOMING_FACE_ID => tags.incoming_face_id = Some(element.as_nonneg_integer()?),
            TLV_LP_NEXT_HOP_FACE_ID => tags.next_hop_face_id = Some(element.as_nonneg_integer()?),
            TLV_LP_CONGESTION_MARK => tags.congestion_mark = Some(element.as_nonneg_integer()?),
            TLV_LP_CACHE_POLICY => {
                for inner in TlvElement::decode_all(element.value.clone())? {
                    if inner.tlv_type == TLV_LP_CACHE_POLICY_TYPE {
                        tags.cache_policy = CachePolicy::from_code(inner.as_nonneg_integer()?);
                    }
                }
            }
            // other link fields are non-critical for this client; skip
            _ => {}
        }
    }

    let fragment = fragment.ok_or_else(|| NdnError::Packet("LpPacket has no fragment".into()))?;
    let mut buf = fragment;
    let inner = TlvElement::decode(&mut buf)?;

    match inner.tlv_type {
        tlv::TLV_INTEREST => {
            let mut interest = Interest::from_tlv(&inner)?;
            if let Some(reason) = nack_reason {
                let mut nack = Nack::new(interest, reason);
                nack.tags_mut().incoming_face_id = tags.incoming_face_id;
                nack.tags_mut().congestion_mark = tags.congestion_mark;
                Ok(NetPacket::Nack(nack))
            } else {
                interest.tags_mut().incoming_face_id = tags.incoming_face_id;
                interest.tags_mut().congestion_mark = tags.congestion_mark;
                Ok(NetPacket::Interest(interest))
            }
        }
        tlv::TLV_DATA => {
            if nack_reason.is_some() {
                return Err(NdnError::Packet("Nack header on a Data packet".into()));
            }
            let mut data = Data::from_tlv(&inner)?;
            data.tags_mut().incoming_face_id = tags.incoming_face_id;
            data.tags_mut().congestion_mark = tags.congestion_mark;
            data.tags_mut().cache_policy = tags.cache_policy;
            Ok(NetPacket::Data(data))
        }
        other => Err(NdnError::Packet(format!(
            "LpPacket fragment has unexpected TLV type {other}"
        ))),
    }
}
