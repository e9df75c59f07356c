//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! Both the type and the length of an element are encoded as NDN variable
//! length numbers: one octet below 253, otherwise a marker octet (253, 254
//! or 255) followed by the value in 2, 4 or 8 big-endian octets.

use crate::error::NdnError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Network-layer TLV types.
pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_NAME: u64 = 0x07;
pub const TLV_GENERIC_COMPONENT: u64 = 0x08;
pub const TLV_CAN_BE_PREFIX: u64 = 0x21;
pub const TLV_MUST_BE_FRESH: u64 = 0x12;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0C;
pub const TLV_HOP_LIMIT: u64 = 0x22;
pub const TLV_META_INFO: u64 = 0x14;
pub const TLV_CONTENT_TYPE: u64 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u64 = 0x19;
pub const TLV_FINAL_BLOCK_ID: u64 = 0x1A;
pub const TLV_CONTENT: u64 = 0x15;
pub const TLV_SIGNATURE_INFO: u64 = 0x16;
pub const TLV_SIGNATURE_VALUE: u64 = 0x17;
pub const TLV_SIGNATURE_TYPE: u64 = 0x1B;
pub const TLV_KEY_LOCATOR: u64 = 0x1C;
pub const TLV_KEY_DIGEST: u64 = 0x1D;

/// Typed name component numbers (NDN naming conventions, rev 2).
pub const TLV_SEGMENT_COMPONENT: u64 = 50;
pub const TLV_BYTE_OFFSET_COMPONENT: u64 = 52;
pub const TLV_VERSION_COMPONENT: u64 = 54;
pub const TLV_TIMESTAMP_COMPONENT: u64 = 56;
pub const TLV_SEQUENCE_NUM_COMPONENT: u64 = 58;

/// Encodes a variable-length number (used for both TLV types and lengths).
pub fn encode_var_number(n: u64, buf: &mut BytesMut) {
    if n < 253 {
        buf.put_u8(n as u8);
    } else if n <= 0xFFFF {
        buf.put_u8(253);
        buf.put_u16(n as u16);
    } else if n <= 0xFFFF_FFFF {
        buf.put_u8(254);
        buf.put_u32(n as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(n);
    }
}

/// Returns the encoded size of a variable-length number.
pub fn var_number_size(n: u64) -> usize {
    if n < 253 {
        1
    } else if n <= 0xFFFF {
        3
    } else if n <= 0xFFFF_FFFF {
        5
    } else {
        9
    }
}

/// Decodes a variable-length number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, NdnError> {
    if !buf.has_remaining() {
        return Err(NdnError::Tlv("buffer underflow in var-number".into()));
    }

    let first = buf.get_u8();
    match first {
        0..=252 => Ok(u64::from(first)),
        253 => {
            if buf.remaining() < 2 {
                return Err(NdnError::Tlv("buffer underflow in 16-bit var-number".into()));
            }
            Ok(u64::from(buf.get_u16()))
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(NdnError::Tlv("buffer underflow in 32-bit var-number".into()));
            }
            Ok(u64::from(buf.get_u32()))
        }
        255 => {
            if buf.remaining() < 8 {
                return Err(NdnError::Tlv("buffer underflow in 64-bit var-number".into()));
            }
            Ok(buf.get_u64())
        }
    }
}

/// Encodes a nonnegative integer in the shortest of 1, 2, 4 or 8 octets.
pub fn encode_nonneg_integer(n: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if n <= 0xFF {
        buf.put_u8(n as u8);
    } else if n <= 0xFFFF {
        buf.put_u16(n as u16);
    } else if n <= 0xFFFF_FFFF {
        buf.put_u32(n as u32);
    } else {
        buf.put_u64(n);
    }
    buf.freeze()
}

/// Decodes a nonnegative integer from a 1, 2, 4 or 8 octet value.
pub fn decode_nonneg_integer(value: &[u8]) -> Result<u64, NdnError> {
    match value.len() {
        1 => Ok(u64::from(value[0])),
        2 => Ok(u64::from(u16::from_be_bytes([value[0], value[1]]))),
        4 => Ok(u64::from(u32::from_be_bytes([
            value[0], value[1], value[2], value[3],
        ]))),
        8 => Ok(u64::from_be_bytes([
            value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
        ])),
        n => Err(NdnError::Tlv(format!(
            "nonnegative integer has invalid length {n}"
        ))),
    }
}

/// A generic TLV element consisting of a type and a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    /// Creates a new TLV element.
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Creates an element whose value is a nonnegative integer.
    pub fn from_nonneg_integer(tlv_type: u64, n: u64) -> Self {
        Self::new(tlv_type, encode_nonneg_integer(n))
    }

    /// Interprets the value as a nonnegative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, NdnError> {
        decode_nonneg_integer(&self.value)
    }

    /// Returns the total length of this element when encoded.
    pub fn len(&self) -> usize {
        var_number_size(self.tlv_type) + var_number_size(self.value.len() as u64) + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encodes this element into the provided buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Encodes this element into a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes one element from the front of the provided buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, NdnError> {
        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(NdnError::Tlv(format!(
                "TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }

    /// Decodes a sequence of elements filling the whole buffer.
    pub fn decode_all(mut buf: Bytes) -> Result<Vec<Self>, NdnError> {
        let mut elements = Vec::new();
        while buf.has_remaining() {
            elements.push(Self::decode(&mut buf)?);
        }
        Ok(elements)
    }
}

/// Determines whether `buf` starts with a complete TLV element.
///
/// Returns the total size of the element if fully present, `None` if more
/// bytes are needed. Used by stream transports to re-frame the byte stream
/// into whole TLV blocks.
pub fn element_span(buf: &[u8]) -> Result<Option<usize>, NdnError> {
    let mut cursor = buf;
    let start = cursor.remaining();
    match peek_var_number(&mut cursor)? {
        None => return Ok(None),
        Some(_) => {}
    }
    let length = match peek_var_number(&mut cursor)? {
        None => return Ok(None),
        Some(n) => n as usize,
    };
    let header = start - cursor.remaining();
    if cursor.remaining() < length {
        return Ok(None);
    }
    Ok(Some(header + length))
}

fn peek_var_number(buf: &mut &[u8]) -> Result<Option<u64>, NdnError> {
    if !buf.has_remaining() {
        return Ok(None);
    }
    let needed = match buf[0] {
        0..=252 => 1,
        253 => 3,
        254 => 5,
        255 => 9,
    };
    if buf.remaining() < needed {
        return Ok(None);
    }
    Ok(Some(decode_var_number(buf)?))
}
