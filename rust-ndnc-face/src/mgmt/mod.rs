//! Forwarder management: control commands, their encodings, and the
//! controller that sends them as signed Interests.

pub mod control;
pub mod controller;

pub use control::{
    ControlCommand, ControlParameters, ControlResponse, FacePersistency, RibRegisterCommand,
    RibUnregisterCommand, RouteOrigin, ROUTE_FLAG_CAPTURE, ROUTE_FLAG_CHILD_INHERIT,
};
pub use controller::{
    CommandError, CommandOptions, Controller, ERROR_LBOUND, ERROR_NACK, ERROR_SERVER,
    ERROR_TIMEOUT, ERROR_VALIDATION,
};
