//! ControlParameters, ControlResponse and the control command vocabulary.

use bytes::{Bytes, BytesMut};
use rust_ndnc_common::tlv::TlvElement;
use rust_ndnc_common::{Name, NdnError};
use std::fmt;
use std::time::Duration;

pub const TLV_CONTROL_PARAMETERS: u64 = 0x68;
const TLV_FACE_ID: u64 = 0x69;
const TLV_URI: u64 = 0x72;
const TLV_LOCAL_URI: u64 = 0x81;
const TLV_ORIGIN: u64 = 0x6F;
const TLV_COST: u64 = 0x6A;
const TLV_CAPACITY: u64 = 0x83;
const TLV_COUNT: u64 = 0x84;
const TLV_FLAGS: u64 = 0x6C;
const TLV_MASK: u64 = 0x70;
const TLV_STRATEGY: u64 = 0x6B;
const TLV_EXPIRATION_PERIOD: u64 = 0x6D;
const TLV_FACE_PERSISTENCY: u64 = 0x85;
const TLV_BASE_CONGESTION_MARKING_INTERVAL: u64 = 0x87;
const TLV_DEFAULT_CONGESTION_THRESHOLD: u64 = 0x88;

pub const TLV_CONTROL_RESPONSE: u64 = 0x65;
const TLV_STATUS_CODE: u64 = 0x66;
const TLV_STATUS_TEXT: u64 = 0x67;

/// Route inheritance flags.
pub const ROUTE_FLAG_CHILD_INHERIT: u64 = 1;
pub const ROUTE_FLAG_CAPTURE: u64 = 2;

/// Who created a RIB route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOrigin {
    App,
    AutoReg,
    Client,
    AutoConf,
    Nlsr,
    Static,
    Other(u64),
}

impl RouteOrigin {
    pub fn code(self) -> u64 {
        match self {
            Self::App => 0,
            Self::AutoReg => 64,
            Self::Client => 65,
            Self::AutoConf => 66,
            Self::Nlsr => 128,
            Self::Static => 255,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::App,
            64 => Self::AutoReg,
            65 => Self::Client,
            66 => Self::AutoConf,
            128 => Self::Nlsr,
            255 => Self::Static,
            other => Self::Other(other),
        }
    }
}

/// Lifetime class of a forwarder face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacePersistency {
    Persistent,
    OnDemand,
    Permanent,
    Other(u64),
}

impl FacePersistency {
    pub fn code(self) -> u64 {
        match self {
            Self::Persistent => 0,
            Self::OnDemand => 1,
            Self::Permanent => 2,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Persistent,
            1 => Self::OnDemand,
            2 => Self::Permanent,
            other => Self::Other(other),
        }
    }
}

/// Parameters of a control command request or response.
///
/// Every field is optional; a field is present on the wire iff it is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub uri: Option<String>,
    pub local_uri: Option<String>,
    pub origin: Option<RouteOrigin>,
    pub cost: Option<u64>,
    pub capacity: Option<u64>,
    pub count: Option<u64>,
    pub flags: Option<u64>,
    pub mask: Option<u64>,
    pub strategy: Option<Name>,
    pub expiration_period: Option<Duration>,
    pub face_persistency: Option<FacePersistency>,
    pub base_congestion_marking_interval: Option<Duration>,
    pub default_congestion_threshold: Option<u64>,
}

impl ControlParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_face_id(mut self, face_id: u64) -> Self {
        self.face_id = Some(face_id);
        self
    }

    pub fn with_origin(mut self, origin: RouteOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_expiration_period(mut self, period: Duration) -> Self {
        self.expiration_period = Some(period);
        self
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut body = BytesMut::new();
        if let Some(name) = &self.name {
            name.to_tlv().encode(&mut body);
        }
        if let Some(face_id) = self.face_id {
            TlvElement::from_nonneg_integer(TLV_FACE_ID, face_id).encode(&mut body);
        }
        if let Some(uri) = &self.uri {
            TlvElement::new(TLV_URI, Bytes::copy_from_slice(uri.as_bytes())).encode(&mut body);
        }
        if let Some(local_uri) = &self.local_uri {
            TlvElement::new(TLV_LOCAL_URI, Bytes::copy_from_slice(local_uri.as_bytes()))
                .encode(&mut body);
        }
        if let Some(origin) = self.origin {
            TlvElement::from_nonneg_integer(TLV_ORIGIN, origin.code()).encode(&mut body);
        }
        if let Some(cost) = self.cost {
            TlvElement::from_nonneg_integer(TLV_COST, cost).encode(&mut body);
        }
        if let Some(capacity) = self.capacity {
            TlvElement::from_nonneg_integer(TLV_CAPACITY, capacity).encode(&mut body);
        }
        if let Some(count) = self.count {
            TlvElement::from_nonneg_integer(TLV_COUNT, count).encode(&mut body);
        }
        if let Some(flags) = self.flags {
            TlvElement::from_nonneg_integer(TLV_FLAGS, flags).encode(&mut body);
        }
        if let Some(mask) = self.mask {
            TlvElement::from_nonneg_integer(TLV_MASK, mask).encode(&mut body);
        }
        if let Some(strategy) = &self.strategy {
            let mut inner = BytesMut::new();
            strategy.to_tlv().encode(&mut inner);
            TlvElement::new(TLV_STRATEGY, inner.freeze()).encode(&mut body);
        }
        if let Some(period) = self.expiration_period {
            TlvElement::from_nonneg_integer(TLV_EXPIRATION_PERIOD, period.as_millis() as u64)
                .encode(&mut body);
        }
        if let Some(persistency) = self.face_persistency {
            TlvElement::from_nonneg_integer(TLV_FACE_PERSISTENCY, persistency.code())
                .encode(&mut body);
        }
        if let Some(interval) = self.base_congestion_marking_interval {
            TlvElement::from_nonneg_integer(
                TLV_BASE_CONGESTION_MARKING_INTERVAL,
                interval.as_nanos() as u64,
            )
            .encode(&mut body);
        }
        if let Some(threshold) = self.default_congestion_threshold {
            TlvElement::from_nonneg_integer(TLV_DEFAULT_CONGESTION_THRESHOLD, threshold)
                .encode(&mut body);
        }
        TlvElement::new(TLV_CONTROL_PARAMETERS, body.freeze())
    }

    pub fn encode(&self) -> Bytes {
        self.to_tlv().to_bytes()
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, NdnError> {
        if element.tlv_type != TLV_CONTROL_PARAMETERS {
            return Err(NdnError::Tlv(format!(
                "expected ControlParameters TLV type {TLV_CONTROL_PARAMETERS}, got {}",
                element.tlv_type
            )));
        }

        let mut params = Self::default();
        for inner in TlvElement::decode_all(element.value.clone())? {
            match inner.tlv_type {
                rust_ndnc_common::tlv::TLV_NAME => params.name = Some(Name::from_tlv(&inner)?),
                TLV_FACE_ID => params.face_id = Some(inner.as_nonneg_integer()?),
                TLV_URI => {
                    params.uri = Some(
                        String::from_utf8(inner.value.to_vec())
                            .map_err(|_| NdnError::Tlv("Uri is not valid UTF-8".into()))?,
                    )
                }
                TLV_LOCAL_URI => {
                    params.local_uri = Some(
                        String::from_utf8(inner.value.to_vec())
                            .map_err(|_| NdnError::Tlv("LocalUri is not valid UTF-8".into()))?,
                    )
                }
                TLV_ORIGIN => {
                    params.origin = Some(RouteOrigin::from_code(inner.as_nonneg_integer()?))
                }
                TLV_COST => params.cost = Some(inner.as_nonneg_integer()?),
                TLV_CAPACITY => params.capacity = Some(inner.as_nonneg_integer()?),
                TLV_COUNT => params.count = Some(inner.as_nonneg_integer()?),
                TLV_FLAGS => params.flags = Some(inner.as_nonneg_integer()?),
                TLV_MASK => params.mask = Some(inner.as_nonneg_integer()?),
                TLV_STRATEGY => {
                    let mut buf = inner.value.clone();
                    let name = TlvElement::decode(&mut buf)?;
                    params.strategy = Some(Name::from_tlv(&name)?);
                }
                TLV_EXPIRATION_PERIOD => {
                    params.expiration_period =
                        Some(Duration::from_millis(inner.as_nonneg_integer()?))
                }
                TLV_FACE_PERSISTENCY => {
                    params.face_persistency =
                        Some(FacePersistency::from_code(inner.as_nonneg_integer()?))
                }
                TLV_BASE_CONGESTION_MARKING_INTERVAL => {
                    params.base_congestion_marking_interval =
                        Some(Duration::from_nanos(inner.as_nonneg_integer()?))
                }
                TLV_DEFAULT_CONGESTION_THRESHOLD => {
                    params.default_congestion_threshold = Some(inner.as_nonneg_integer()?)
                }
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn decode(wire: &Bytes) -> Result<Self, NdnError> {
        let mut buf = wire.clone();
        Self::from_tlv(&TlvElement::decode(&mut buf)?)
    }
}

/// Reply to a control command: numeric code, text, optional nested body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlResponse {
    pub code: u32,
    pub text: String,
    pub body: Option<Bytes>,
}

impl ControlResponse {
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.code >= 400
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        TlvElement::from_nonneg_integer(TLV_STATUS_CODE, u64::from(self.code)).encode(&mut body);
        TlvElement::new(TLV_STATUS_TEXT, Bytes::copy_from_slice(self.text.as_bytes()))
            .encode(&mut body);
        if let Some(nested) = &self.body {
            body.extend_from_slice(nested);
        }
        TlvElement::new(TLV_CONTROL_RESPONSE, body.freeze()).to_bytes()
    }

    pub fn decode(wire: &Bytes) -> Result<Self, NdnError> {
        let mut buf = wire.clone();
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != TLV_CONTROL_RESPONSE {
            return Err(NdnError::Tlv(format!(
                "expected ControlResponse TLV type {TLV_CONTROL_RESPONSE}, got {}",
                outer.tlv_type
            )));
        }

        let mut response = Self::default();
        let mut trailing = BytesMut::new();
        for inner in TlvElement::decode_all(outer.value.clone())? {
            match inner.tlv_type {
                TLV_STATUS_CODE => response.code = inner.as_nonneg_integer()? as u32,
                TLV_STATUS_TEXT => {
                    response.text = String::from_utf8(inner.value.to_vec())
                        .map_err(|_| NdnError::Tlv("StatusText is not valid UTF-8".into()))?
                }
                _ => inner.encode(&mut trailing),
            }
        }
        if !trailing.is_empty() {
            response.body = Some(trailing.freeze());
        }
        Ok(response)
    }
}

impl fmt::Display for ControlResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// One verb of the forwarder management protocol.
pub trait ControlCommand {
    fn module(&self) -> &'static str;
    fn verb(&self) -> &'static str;

    /// Checks that a request carries the mandatory fields.
    fn validate_request(&self, params: &ControlParameters) -> Result<(), String>;

    /// Fills in the defaults the forwarder would assume.
    fn apply_defaults(&self, params: &mut ControlParameters);

    /// Checks that a response echoes what the command requires.
    fn validate_response(&self, params: &ControlParameters) -> Result<(), String>;
}

/// `rib/register`: create or update a route for a prefix.
#[derive(Debug, Clone, Copy)]
pub struct RibRegisterCommand;

impl ControlCommand for RibRegisterCommand {
    fn module(&self) -> &'static str {
        "rib"
    }

    fn verb(&self) -> &'static str {
        "register"
    }

    fn validate_request(&self, params: &ControlParameters) -> Result<(), String> {
        if params.name.is_none() {
            return Err("rib/register requires a Name".into());
        }
        Ok(())
    }

    fn apply_defaults(&self, params: &mut ControlParameters) {
        params.origin.get_or_insert(RouteOrigin::App);
        params.cost.get_or_insert(0);
        params.flags.get_or_insert(ROUTE_FLAG_CHILD_INHERIT);
    }

    fn validate_response(&self, params: &ControlParameters) -> Result<(), String> {
        if params.name.is_none() {
            return Err("response lacks Name".into());
        }
        Ok(())
    }
}

/// `rib/unregister`: remove a route for a prefix.
#[derive(Debug, Clone, Copy)]
pub struct RibUnregisterCommand;

impl ControlCommand for RibUnregisterCommand {
    fn module(&self) -> &'static str {
        "rib"
    }

    fn verb(&self) -> &'static str {
        "unregister"
    }

    fn validate_request(&self, params: &ControlParameters) -> Result<(), String> {
        if params.name.is_none() {
            return Err("rib/unregister requires a Name".into());
        }
        Ok(())
    }

    fn apply_defaults(&self, params: &mut ControlParameters) {
        params.origin.get_or_insert(RouteOrigin::App);
    }

    fn validate_response(&self, params: &ControlParameters) -> Result<(), String> {
        if params.name.is_none() {
            return Err("response lacks Name".into());
        }
        Ok(())
    }
}
