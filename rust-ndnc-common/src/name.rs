//! NDN names and name components.
//!
//! A [`Name`] is an ordered sequence of typed, opaque byte components.
//! Besides generic components, the typed components of the NDN naming
//! conventions used by this library (segment and version numbers) get
//! dedicated constructors and accessors.

use crate::error::NdnError;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One name component: a TLV type plus opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    typ: u64,
    value: Bytes,
}

impl Component {
    /// Creates a generic (type 8) component.
    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self {
            typ: tlv::TLV_GENERIC_COMPONENT,
            value: value.into(),
        }
    }

    /// Creates a component with an explicit TLV type.
    pub fn typed(typ: u64, value: impl Into<Bytes>) -> Self {
        Self {
            typ,
            value: value.into(),
        }
    }

    /// Creates a segment-number component.
    pub fn segment(seg: u64) -> Self {
        Self {
            typ: tlv::TLV_SEGMENT_COMPONENT,
            value: tlv::encode_nonneg_integer(seg),
        }
    }

    /// Creates a version-number component.
    pub fn version(version: u64) -> Self {
        Self {
            typ: tlv::TLV_VERSION_COMPONENT,
            value: tlv::encode_nonneg_integer(version),
        }
    }

    /// Creates a timestamp component (milliseconds since the Unix epoch).
    pub fn timestamp(millis: u64) -> Self {
        Self {
            typ: tlv::TLV_TIMESTAMP_COMPONENT,
            value: tlv::encode_nonneg_integer(millis),
        }
    }

    pub fn typ(&self) -> u64 {
        self.typ
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn is_generic(&self) -> bool {
        self.typ == tlv::TLV_GENERIC_COMPONENT
    }

    pub fn is_segment(&self) -> bool {
        self.typ == tlv::TLV_SEGMENT_COMPONENT
    }

    pub fn is_version(&self) -> bool {
        self.typ == tlv::TLV_VERSION_COMPONENT
    }

    /// Interprets this component as a segment number.
    pub fn to_segment(&self) -> Result<u64, NdnError> {
        if !self.is_segment() {
            return Err(NdnError::Packet("component is not a segment number".into()));
        }
        tlv::decode_nonneg_integer(&self.value)
    }

    /// Interprets this component as a version number.
    pub fn to_version(&self) -> Result<u64, NdnError> {
        if !self.is_version() {
            return Err(NdnError::Packet("component is not a version number".into()));
        }
        tlv::decode_nonneg_integer(&self.value)
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(self.typ, self.value.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Self {
        Self {
            typ: element.tlv_type,
            value: element.value.clone(),
        }
    }
}

/// Canonical NDN component order: type, then length, then value bytes.
impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            tlv::TLV_SEGMENT_COMPONENT => {
                if let Ok(seg) = tlv::decode_nonneg_integer(&self.value) {
                    return write!(f, "seg={seg}");
                }
            }
            tlv::TLV_VERSION_COMPONENT => {
                if let Ok(v) = tlv::decode_nonneg_integer(&self.value) {
                    return write!(f, "v={v}");
                }
            }
            tlv::TLV_TIMESTAMP_COMPONENT => {
                if let Ok(t) = tlv::decode_nonneg_integer(&self.value) {
                    return write!(f, "t={t}");
                }
            }
            _ => {}
        }
        if self.typ != tlv::TLV_GENERIC_COMPONENT {
            write!(f, "{}=", self.typ)?;
        }
        for &b in &self.value {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Component {
    type Err = NdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((prefix, rest)) = s.split_once('=') {
            let number = || {
                rest.parse::<u64>()
                    .map_err(|_| NdnError::Packet(format!("invalid component number in '{s}'")))
            };
            match prefix {
                "seg" => return Ok(Self::segment(number()?)),
                "v" => return Ok(Self::version(number()?)),
                "t" => return Ok(Self::timestamp(number()?)),
                _ => {
                    if let Ok(typ) = prefix.parse::<u64>() {
                        return Ok(Self::typed(typ, unescape(rest)?));
                    }
                }
            }
        }
        Ok(Self::generic(unescape(s)?))
    }
}

fn unescape(s: &str) -> Result<Bytes, NdnError> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next();
            let lo = chars.next();
            let byte = match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    let hex = [hi, lo];
                    let hex = std::str::from_utf8(&hex).ok();
                    hex.and_then(|h| u8::from_str_radix(h, 16).ok())
                }
                _ => None,
            };
            match byte {
                Some(byte) => out.push(byte),
                None => return Err(NdnError::Packet(format!("invalid escape in '{s}'"))),
            }
        } else {
            out.push(b);
        }
    }
    Ok(out.into())
}

/// An ordered sequence of name components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Indexes from the end when `index` is negative, as in `at(-1)`.
    pub fn at(&self, index: isize) -> Option<&Component> {
        if index >= 0 {
            self.components.get(index as usize)
        } else {
            let back = index.unsigned_abs();
            self.components.len().checked_sub(back).map(|i| &self.components[i])
        }
    }

    pub fn push(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn append_segment(&mut self, seg: u64) -> &mut Self {
        self.push(Component::segment(seg))
    }

    pub fn append_version(&mut self, version: u64) -> &mut Self {
        self.push(Component::version(version))
    }

    /// Returns the prefix consisting of the first `len` components.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, NdnError> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(NdnError::Tlv(format!(
                "expected Name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            components.push(Component::from_tlv(&TlvElement::decode(&mut buf)?));
        }
        Ok(Self { components })
    }
}

/// Canonical NDN name order: component-wise, shorter names first.
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .split('/')
            .filter(|part| !part.is_empty())
            .map(Component::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }
}
