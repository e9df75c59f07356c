//! Signing and validation seams.
//!
//! Cryptography is not this library's business: commands are signed through
//! the [`Signer`] trait and replies checked through the [`Validator`] trait.
//! The built-in implementations cover the digest-only case; applications
//! with real trust anchors plug in their own.

use bytes::{Bytes, BytesMut};
use rust_ndnc_common::tlv::{self, TlvElement};
use rust_ndnc_common::{Component, Data, Interest, Name, NdnError};
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Selects the identity used to sign a command Interest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SigningInfo {
    /// Sign with a SHA-256 digest (no identity).
    #[default]
    DigestSha256,
    /// Sign with the key of the given identity.
    Identity(Name),
}

/// Signs command Interests in the signed-Interest format: four components
/// (timestamp, nonce, SignatureInfo, SignatureValue) appended to the name.
pub trait Signer {
    fn make_signed_interest(
        &self,
        interest: &mut Interest,
        info: &SigningInfo,
    ) -> Result<(), NdnError>;
}

/// Number of components a signed Interest appends to the bare command name.
pub const SIGNED_INTEREST_COMPONENTS: usize = 4;

/// A [`Signer`] producing SHA-256 digest signatures.
///
/// Timestamps are strictly increasing across calls from one signer, so two
/// commands signed within the same millisecond stay distinguishable.
pub struct DigestSigner {
    last_timestamp: Cell<u64>,
}

impl DigestSigner {
    pub fn new() -> Self {
        Self {
            last_timestamp: Cell::new(0),
        }
    }

    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let stamp = now.max(self.last_timestamp.get() + 1);
        self.last_timestamp.set(stamp);
        stamp
    }
}

impl Default for DigestSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for DigestSigner {
    fn make_signed_interest(
        &self,
        interest: &mut Interest,
        info: &SigningInfo,
    ) -> Result<(), NdnError> {
        let mut name = interest.name().clone();
        name.push(Component::timestamp(self.next_timestamp()));
        name.push(Component::generic(Bytes::copy_from_slice(
            &rand::random::<u64>().to_be_bytes(),
        )));

        let mut sig_info = rust_ndnc_common::SignatureInfo::digest_sha256();
        if let SigningInfo::Identity(identity) = info {
            sig_info.key_locator = Some(identity.clone());
        }
        let mut encoded_info = BytesMut::new();
        sig_info.to_tlv().encode(&mut encoded_info);
        name.push(Component::generic(encoded_info.freeze()));

        // digest over the name components signed so far
        let mut hasher = Sha256::new();
        for component in name.components() {
            hasher.update(component.to_tlv().to_bytes());
        }
        let mut encoded_value = BytesMut::new();
        TlvElement::new(
            tlv::TLV_SIGNATURE_VALUE,
            Bytes::copy_from_slice(&hasher.finalize()),
        )
        .encode(&mut encoded_value);
        name.push(Component::generic(encoded_value.freeze()));

        interest.set_name(name);
        Ok(())
    }
}

/// Checks a Data packet and reports through exactly one of two callbacks.
pub trait Validator {
    fn validate(
        &self,
        data: &Data,
        on_ok: Box<dyn FnOnce(&Data)>,
        on_fail: Box<dyn FnOnce(&Data, String)>,
    );
}

/// A [`Validator`] accepting every packet.
#[derive(Debug, Default)]
pub struct AcceptAllValidator;

impl Validator for AcceptAllValidator {
    fn validate(
        &self,
        data: &Data,
        on_ok: Box<dyn FnOnce(&Data)>,
        _on_fail: Box<dyn FnOnce(&Data, String)>,
    ) {
        on_ok(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_interest_appends_four_components() {
        let signer = DigestSigner::new();
        let mut interest = Interest::new("/localhost/nfd/rib/register".parse().unwrap());
        let base_len = interest.name().len();

        signer
            .make_signed_interest(&mut interest, &SigningInfo::default())
            .unwrap();
        assert_eq!(interest.name().len(), base_len + SIGNED_INTEREST_COMPONENTS);
        // the original command name is still a prefix
        let prefix: Name = "/localhost/nfd/rib/register".parse().unwrap();
        assert!(prefix.is_prefix_of(interest.name()));
    }

    #[test]
    fn timestamps_strictly_increase() {
        let signer = DigestSigner::new();
        let mut a = Interest::new("/cmd".parse().unwrap());
        let mut b = Interest::new("/cmd".parse().unwrap());
        signer.make_signed_interest(&mut a, &SigningInfo::default()).unwrap();
        signer.make_signed_interest(&mut b, &SigningInfo::default()).unwrap();

        let base = 1;
        let ts_a = a.name().get(base).unwrap().clone();
        let ts_b = b.name().get(base).unwrap().clone();
        assert_ne!(ts_a, ts_b);
    }

    #[test]
    fn accept_all_validator_calls_on_ok() {
        let validator = AcceptAllValidator;
        let data = Data::new("/x".parse().unwrap(), Bytes::new());
        let called = std::rc::Rc::new(Cell::new(false));
        let called2 = std::rc::Rc::clone(&called);
        validator.validate(
            &data,
            Box::new(move |_| called2.set(true)),
            Box::new(|_, _| panic!("validation must not fail")),
        );
        assert!(called.get());
    }
}
