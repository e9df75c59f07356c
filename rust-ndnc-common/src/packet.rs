//! Interest and Data packets.

use crate::error::NdnError;
use crate::lp::Tags;
use crate::name::{Component, Name};
use crate::tlv::{self, TlvElement};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// Default lifetime of an Interest.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// DigestSha256 signature type code.
pub const SIGNATURE_DIGEST_SHA256: u64 = 0;

/// A request for named data.
#[derive(Debug, Clone)]
pub struct Interest {
    name: Name,
    can_be_prefix: bool,
    must_be_fresh: bool,
    nonce: Option<u32>,
    lifetime: Duration,
    hop_limit: Option<u8>,
    tags: Tags,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: None,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            hop_limit: None,
            tags: Tags::default(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn set_name(&mut self, name: Name) -> &mut Self {
        self.name = name;
        self
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    pub fn set_can_be_prefix(&mut self, on: bool) -> &mut Self {
        self.can_be_prefix = on;
        self
    }

    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }

    pub fn set_must_be_fresh(&mut self, on: bool) -> &mut Self {
        self.must_be_fresh = on;
        self
    }

    pub fn nonce(&self) -> Option<u32> {
        self.nonce
    }

    pub fn set_nonce(&mut self, nonce: u32) -> &mut Self {
        self.nonce = Some(nonce);
        self
    }

    /// Assigns a random nonce if none is set, returning the nonce in use.
    pub fn ensure_nonce(&mut self) -> u32 {
        *self.nonce.get_or_insert_with(rand::random)
    }

    /// Replaces the nonce with a fresh random value.
    pub fn refresh_nonce(&mut self) -> &mut Self {
        self.nonce = Some(rand::random());
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn set_lifetime(&mut self, lifetime: Duration) -> &mut Self {
        self.lifetime = lifetime;
        self
    }

    pub fn hop_limit(&self) -> Option<u8> {
        self.hop_limit
    }

    pub fn set_hop_limit(&mut self, limit: Option<u8>) -> &mut Self {
        self.hop_limit = limit;
        self
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    /// Whether `data` satisfies this Interest.
    pub fn matches_data(&self, data: &Data) -> bool {
        if self.can_be_prefix {
            if !self.name.is_prefix_of(data.name()) {
                return false;
            }
        } else if &self.name != data.name() {
            return false;
        }

        if self.must_be_fresh && data.freshness_period().map_or(true, |p| p.is_zero()) {
            return false;
        }

        true
    }

    /// Whether `other` refers to the same Interest (same Name and Nonce).
    ///
    /// This is the matching rule for Nacks.
    pub fn matches_interest(&self, other: &Interest) -> bool {
        self.name == other.name && self.nonce == other.nonce
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut body);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut body);
        }
        if let Some(nonce) = self.nonce {
            TlvElement::new(tlv::TLV_NONCE, Bytes::copy_from_slice(&nonce.to_be_bytes()))
                .encode(&mut body);
        }
        if self.lifetime != DEFAULT_INTEREST_LIFETIME {
            TlvElement::from_nonneg_integer(tlv::TLV_INTEREST_LIFETIME, self.lifetime.as_millis() as u64)
                .encode(&mut body);
        }
        if let Some(limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, Bytes::copy_from_slice(&[limit])).encode(&mut body);
        }

        TlvElement::new(tlv::TLV_INTEREST, body.freeze()).to_bytes()
    }

    pub fn decode(wire: &Bytes) -> Result<Self, NdnError> {
        let mut buf = wire.clone();
        let outer = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&outer)
    }

    pub fn from_tlv(outer: &TlvElement) -> Result<Self, NdnError> {
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(NdnError::Packet(format!(
                "expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut interest = Self::new(Name::new());
        for element in TlvElement::decode_all(outer.value.clone())? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_CAN_BE_PREFIX => {
                    interest.can_be_prefix = true;
                }
                tlv::TLV_MUST_BE_FRESH => {
                    interest.must_be_fresh = true;
                }
                tlv::TLV_NONCE => {
                    if element.value.len() != 4 {
                        return Err(NdnError::Packet("Nonce must be 4 octets".into()));
                    }
                    let v = &element.value;
                    interest.nonce = Some(u32::from_be_bytes([v[0], v[1], v[2], v[3]]));
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime = Duration::from_millis(element.as_nonneg_integer()?);
                }
                tlv::TLV_HOP_LIMIT => {
                    if element.value.len() != 1 {
                        return Err(NdnError::Packet("HopLimit must be 1 octet".into()));
                    }
                    interest.hop_limit = Some(element.value[0]);
                }
                // unrecognized elements (e.g. ApplicationParameters) are skipped
                _ => {}
            }
        }

        interest.name = name.ok_or_else(|| NdnError::Packet("Interest has no Name".into()))?;
        Ok(interest)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.can_be_prefix {
            write!(f, "?CanBePrefix")?;
        }
        if self.must_be_fresh {
            write!(f, "?MustBeFresh")?;
        }
        Ok(())
    }
}

/// Signature metadata carried by a Data packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature_type: u64,
    pub key_locator: Option<Name>,
}

impl SignatureInfo {
    pub fn digest_sha256() -> Self {
        Self {
            signature_type: SIGNATURE_DIGEST_SHA256,
            key_locator: None,
        }
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut body = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_SIGNATURE_TYPE, self.signature_type)
            .encode(&mut body);
        if let Some(locator) = &self.key_locator {
            let mut inner = BytesMut::new();
            locator.to_tlv().encode(&mut inner);
            TlvElement::new(tlv::TLV_KEY_LOCATOR, inner.freeze()).encode(&mut body);
        }
        TlvElement::new(tlv::TLV_SIGNATURE_INFO, body.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, NdnError> {
        let mut info = Self::default();
        for inner in TlvElement::decode_all(element.value.clone())? {
            match inner.tlv_type {
                tlv::TLV_SIGNATURE_TYPE => info.signature_type = inner.as_nonneg_integer()?,
                tlv::TLV_KEY_LOCATOR => {
                    let mut buf = inner.value.clone();
                    let name = TlvElement::decode(&mut buf)?;
                    if name.tlv_type == tlv::TLV_NAME {
                        info.key_locator = Some(Name::from_tlv(&name)?);
                    }
                }
                _ => {}
            }
        }
        Ok(info)
    }
}

/// A reply carrying named, signed content.
#[derive(Debug, Clone)]
pub struct Data {
    name: Name,
    content_type: u64,
    freshness_period: Option<Duration>,
    final_block_id: Option<Component>,
    content: Bytes,
    signature_info: SignatureInfo,
    signature_value: Bytes,
    tags: Tags,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content_type: 0,
            freshness_period: None,
            final_block_id: None,
            content: content.into(),
            signature_info: SignatureInfo::digest_sha256(),
            signature_value: Bytes::new(),
            tags: Tags::default(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn set_name(&mut self, name: Name) -> &mut Self {
        self.name = name;
        self
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.content = content.into();
        self
    }

    pub fn content_type(&self) -> u64 {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: u64) -> &mut Self {
        self.content_type = content_type;
        self
    }

    pub fn freshness_period(&self) -> Option<Duration> {
        self.freshness_period
    }

    pub fn set_freshness_period(&mut self, period: Option<Duration>) -> &mut Self {
        self.freshness_period = period;
        self
    }

    pub fn final_block_id(&self) -> Option<&Component> {
        self.final_block_id.as_ref()
    }

    pub fn set_final_block_id(&mut self, component: Option<Component>) -> &mut Self {
        self.final_block_id = component;
        self
    }

    pub fn signature_info(&self) -> &SignatureInfo {
        &self.signature_info
    }

    pub fn set_signature_info(&mut self, info: SignatureInfo) -> &mut Self {
        self.signature_info = info;
        self
    }

    pub fn signature_value(&self) -> &Bytes {
        &self.signature_value
    }

    pub fn set_signature_value(&mut self, value: impl Into<Bytes>) -> &mut Self {
        self.signature_value = value.into();
        self
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);

        let mut meta = BytesMut::new();
        if self.content_type != 0 {
            TlvElement::from_nonneg_integer(tlv::TLV_CONTENT_TYPE, self.content_type)
                .encode(&mut meta);
        }
        if let Some(period) = self.freshness_period {
            TlvElement::from_nonneg_integer(tlv::TLV_FRESHNESS_PERIOD, period.as_millis() as u64)
                .encode(&mut meta);
        }
        if let Some(final_block) = &self.final_block_id {
            let mut inner = BytesMut::new();
            final_block.to_tlv().encode(&mut inner);
            TlvElement::new(tlv::TLV_FINAL_BLOCK_ID, inner.freeze()).encode(&mut meta);
        }
        if !meta.is_empty() {
            TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut body);
        }

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut body);
        self.signature_info.to_tlv().encode(&mut body);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature_value.clone()).encode(&mut body);

        TlvElement::new(tlv::TLV_DATA, body.freeze()).to_bytes()
    }

    pub fn decode(wire: &Bytes) -> Result<Self, NdnError> {
        let mut buf = wire.clone();
        let outer = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&outer)
    }

    pub fn from_tlv(outer: &TlvElement) -> Result<Self, NdnError> {
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(NdnError::Packet(format!(
                "expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut data = Self::new(Name::new(), Bytes::new());
        for element in TlvElement::decode_all(outer.value.clone())? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_META_INFO => {
                    for meta in TlvElement::decode_all(element.value.clone())? {
                        match meta.tlv_type {
                            tlv::TLV_CONTENT_TYPE => {
                                data.content_type = meta.as_nonneg_integer()?;
                            }
                            tlv::TLV_FRESHNESS_PERIOD => {
                                data.freshness_period =
                                    Some(Duration::from_millis(meta.as_nonneg_integer()?));
                            }
                            tlv::TLV_FINAL_BLOCK_ID => {
                                let mut buf = meta.value.clone();
                                let component = TlvElement::decode(&mut buf)?;
                                data.final_block_id = Some(Component::from_tlv(&component));
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => data.content = element.value.clone(),
                tlv::TLV_SIGNATURE_INFO => {
                    data.signature_info = SignatureInfo::from_tlv(&element)?;
                }
                tlv::TLV_SIGNATURE_VALUE => data.signature_value = element.value.clone(),
                _ => {}
            }
        }

        data.name = name.ok_or_else(|| NdnError::Packet("Data has no Name".into()))?;
        Ok(data)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_round_trip() {
        let mut interest = Interest::new("/test/interest".parse().unwrap());
        interest
            .set_can_be_prefix(true)
            .set_must_be_fresh(true)
            .set_nonce(42)
            .set_lifetime(Duration::from_millis(2500))
            .set_hop_limit(Some(32));

        let wire = interest.encode();
        let parsed = Interest::decode(&wire).unwrap();

        assert_eq!(parsed.name(), interest.name());
        assert!(parsed.can_be_prefix());
        assert!(parsed.must_be_fresh());
        assert_eq!(parsed.nonce(), Some(42));
        assert_eq!(parsed.lifetime(), Duration::from_millis(2500));
        assert_eq!(parsed.hop_limit(), Some(32));
    }

    #[test]
    fn interest_default_lifetime_omitted() {
        let mut interest = Interest::new("/a".parse().unwrap());
        interest.set_nonce(1);
        let wire = interest.encode();
        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(parsed.lifetime(), DEFAULT_INTEREST_LIFETIME);
    }

    #[test]
    fn data_round_trip() {
        let mut data = Data::new("/test/data".parse().unwrap(), &b"Hello, NDN!"[..]);
        data.set_freshness_period(Some(Duration::from_secs(10)))
            .set_final_block_id(Some(Component::segment(12)))
            .set_signature_value(Bytes::from_static(&[0u8; 32]));

        let wire = data.encode();
        let parsed = Data::decode(&wire).unwrap();

        assert_eq!(parsed.name(), data.name());
        assert_eq!(parsed.content(), data.content());
        assert_eq!(parsed.freshness_period(), Some(Duration::from_secs(10)));
        assert_eq!(parsed.final_block_id().unwrap().to_segment().unwrap(), 12);
        assert_eq!(parsed.signature_value().len(), 32);
    }

    #[test]
    fn exact_match_and_prefix_match() {
        let mut data = Data::new("/hello/world/a".parse().unwrap(), Bytes::new());

        let mut exact = Interest::new("/hello/world/a".parse().unwrap());
        assert!(exact.matches_data(&data));

        let mut prefix = Interest::new("/hello/world".parse().unwrap());
        assert!(!prefix.matches_data(&data));
        prefix.set_can_be_prefix(true);
        assert!(prefix.matches_data(&data));

        exact.set_must_be_fresh(true);
        assert!(!exact.matches_data(&data));
        data.set_freshness_period(Some(Duration::from_secs(1)));
        assert!(exact.matches_data(&data));
    }

    #[test]
    fn interest_matching_uses_nonce() {
        let mut a = Interest::new("/A".parse().unwrap());
        let mut b = Interest::new("/A".parse().unwrap());
        a.set_nonce(14333271);
        b.set_nonce(14333271);
        assert!(a.matches_interest(&b));

        b.refresh_nonce();
        // refresh_nonce may theoretically draw the same value; force distinct
        if b.nonce() == a.nonce() {
            b.set_nonce(a.nonce().unwrap().wrapping_add(1));
        }
        assert!(!a.matches_interest(&b));
    }
}
