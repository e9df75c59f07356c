//! Sends control commands to the forwarder as signed Interests and
//! validates the signed replies.

use crate::face::Face;
use crate::fetch::{FetchError, FetchErrorCode, FetcherOptions, SegmentFetcher};
use crate::mgmt::control::{ControlCommand, ControlParameters, ControlResponse};
use crate::pending_interest::{DataCallback, NackCallback, TimeoutCallback};
use crate::security::{SigningInfo, Validator};
use bytes::Bytes;
use log::debug;
use rust_ndnc_common::{Component, Data, Interest, Name};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Lower bound of forwarder-reported failure codes.
pub const ERROR_LBOUND: u32 = 400;
/// Decoding or validation failure of the reply content.
pub const ERROR_SERVER: u32 = 500;
/// The reply Data did not pass the validator.
pub const ERROR_VALIDATION: u32 = 10021;
/// The command Interest timed out.
pub const ERROR_TIMEOUT: u32 = 10060;
/// The command Interest was Nacked.
pub const ERROR_NACK: u32 = 10800;

/// Default lifetime of a command Interest.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Options shared by every command of one management session.
#[derive(Clone)]
pub struct CommandOptions {
    /// Management prefix of the forwarder.
    pub prefix: Name,
    /// Command Interest lifetime; also bounds dataset fetches.
    pub timeout: Duration,
    /// Identity signing the command.
    pub signing_info: SigningInfo,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            prefix: "/localhost/nfd".parse().expect("static name"),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            signing_info: SigningInfo::default(),
        }
    }
}

/// A failed management command, in the stable numeric taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("command failed with code {code}: {text}")]
pub struct CommandError {
    pub code: u32,
    pub text: String,
}

impl From<&ControlResponse> for CommandError {
    fn from(response: &ControlResponse) -> Self {
        Self {
            code: response.code,
            text: response.text.clone(),
        }
    }
}

pub type CommandSuccessCallback = Box<dyn FnOnce(ControlParameters)>;
pub type CommandFailureCallback = Box<dyn FnOnce(ControlResponse)>;

/// Sends one control command through `face`.
///
/// All outcomes are reported through the callbacks; a request that cannot
/// even be sent fails with [`ERROR_SERVER`].
pub fn start_command<C: ControlCommand + Clone + 'static>(
    face: &Face,
    command: C,
    mut params: ControlParameters,
    options: &CommandOptions,
    on_success: CommandSuccessCallback,
    on_failure: CommandFailureCallback,
) {
    if let Err(e) = command.validate_request(&params) {
        on_failure(ControlResponse::new(ERROR_SERVER, format!("invalid request: {e}")));
        return;
    }
    command.apply_defaults(&mut params);

    let mut name = options.prefix.clone();
    name.push(Component::generic(Bytes::copy_from_slice(
        command.module().as_bytes(),
    )));
    name.push(Component::generic(Bytes::copy_from_slice(
        command.verb().as_bytes(),
    )));
    name.push(Component::generic(params.encode()));

    let mut interest = Interest::new(name);
    interest.set_must_be_fresh(true);
    interest.set_lifetime(options.timeout);
    if let Err(e) = face
        .signer()
        .make_signed_interest(&mut interest, &options.signing_info)
    {
        on_failure(ControlResponse::new(ERROR_SERVER, format!("signing failed: {e}")));
        return;
    }
    debug!("sending command {}/{}", command.module(), command.verb());

    let validator = face.validator();
    let on_success = Rc::new(RefCell::new(Some(on_success)));
    let on_failure = Rc::new(RefCell::new(Some(on_failure)));

    let data_success = Rc::clone(&on_success);
    let data_failure = Rc::clone(&on_failure);
    let on_data: DataCallback = Box::new(move |_interest, data| {
        let (Some(on_success), Some(on_failure)) = (
            data_success.borrow_mut().take(),
            data_failure.borrow_mut().take(),
        ) else {
            return;
        };
        process_command_response(&command, &validator, data, on_success, on_failure);
    });

    let nack_failure = Rc::clone(&on_failure);
    let on_nack: NackCallback = Box::new(move |_interest, nack| {
        if let Some(on_failure) = nack_failure.borrow_mut().take() {
            on_failure(ControlResponse::new(
                ERROR_NACK,
                format!("received Nack: {}", nack.reason()),
            ));
        }
    });

    let timeout_failure = Rc::clone(&on_failure);
    let on_timeout: TimeoutCallback = Box::new(move |_interest| {
        if let Some(on_failure) = timeout_failure.borrow_mut().take() {
            on_failure(ControlResponse::new(ERROR_TIMEOUT, "request timed out"));
        }
    });

    if let Err(e) = face.express_interest(interest, Some(on_data), Some(on_nack), Some(on_timeout))
    {
        if let Some(on_failure) = on_failure.borrow_mut().take() {
            on_failure(ControlResponse::new(
                ERROR_SERVER,
                format!("cannot send command: {e}"),
            ));
        }
    }
}

fn process_command_response<C: ControlCommand + Clone + 'static>(
    command: &C,
    validator: &Rc<dyn Validator>,
    data: &Data,
    on_success: CommandSuccessCallback,
    on_failure: CommandFailureCallback,
) {
    let command = command.clone();
    let fail_failure = Rc::new(RefCell::new(Some(on_failure)));
    let ok_failure = Rc::clone(&fail_failure);
    validator.validate(
        data,
        Box::new(move |data| {
            let Some(on_failure) = ok_failure.borrow_mut().take() else {
                return;
            };
            process_validated_response(&command, data, on_success, on_failure);
        }),
        Box::new(move |_data, error| {
            if let Some(on_failure) = fail_failure.borrow_mut().take() {
                on_failure(ControlResponse::new(ERROR_VALIDATION, error));
            }
        }),
    );
}

fn process_validated_response<C: ControlCommand>(
    command: &C,
    data: &Data,
    on_success: CommandSuccessCallback,
    on_failure: CommandFailureCallback,
) {
    let response = match ControlResponse::decode(data.content()) {
        Ok(response) => response,
        Err(e) => {
            on_failure(ControlResponse::new(
                ERROR_SERVER,
                format!("ControlResponse decoding failure: {e}"),
            ));
            return;
        }
    };

    if response.code >= ERROR_LBOUND {
        on_failure(response);
        return;
    }

    let Some(body) = &response.body else {
        on_failure(ControlResponse::new(
            ERROR_SERVER,
            "ControlResponse has no body".to_owned(),
        ));
        return;
    };
    let params = match ControlParameters::decode(body) {
        Ok(params) => params,
        Err(e) => {
            on_failure(ControlResponse::new(
                ERROR_SERVER,
                format!("ControlParameters decoding failure: {e}"),
            ));
            return;
        }
    };

    if let Err(e) = command.validate_response(&params) {
        on_failure(ControlResponse::new(
            ERROR_SERVER,
            format!("invalid response: {e}"),
        ));
        return;
    }

    on_success(params);
}

/// Client of the forwarder management protocol.
///
/// Wraps a [`Face`] for sending commands and fetching status datasets;
/// running dataset fetches are stopped when the controller is dropped.
pub struct Controller {
    face: Face,
    fetchers: Rc<RefCell<Vec<SegmentFetcher>>>,
}

impl Controller {
    pub fn new(face: Face) -> Self {
        Self {
            face,
            fetchers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Sends one control command.
    pub fn start<C: ControlCommand + Clone + 'static>(
        &self,
        command: C,
        params: ControlParameters,
        options: &CommandOptions,
        on_success: CommandSuccessCallback,
        on_failure: CommandFailureCallback,
    ) {
        start_command(&self.face, command, params, options, on_success, on_failure);
    }

    /// Fetches a segmented status dataset and reports the reassembled
    /// payload, or a failure mapped into the command error taxonomy.
    pub fn fetch_dataset(
        &self,
        dataset: Name,
        options: &CommandOptions,
        on_data: Box<dyn FnOnce(Bytes)>,
        on_failure: Box<dyn FnOnce(CommandError)>,
    ) {
        let mut fetcher_options = FetcherOptions::default();
        fetcher_options.max_timeout = options.timeout;

        let fetcher = match SegmentFetcher::start(
            &self.face,
            Interest::new(dataset),
            self.face.validator(),
            fetcher_options,
        ) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                on_failure(CommandError {
                    code: ERROR_SERVER,
                    text: e.to_string(),
                });
                return;
            }
        };
        self.fetchers.borrow_mut().push(fetcher.clone());

        let complete_registry = Rc::clone(&self.fetchers);
        let complete_fetcher = fetcher.clone();
        fetcher.on_complete(move |payload| {
            complete_registry
                .borrow_mut()
                .retain(|f| !f.is_same(&complete_fetcher));
            on_data(payload);
        });

        let error_registry = Rc::clone(&self.fetchers);
        let error_fetcher = fetcher.clone();
        fetcher.on_error(move |error| {
            error_registry
                .borrow_mut()
                .retain(|f| !f.is_same(&error_fetcher));
            on_failure(dataset_fetch_error(error));
        });
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        for fetcher in self.fetchers.borrow().iter() {
            fetcher.stop();
        }
    }
}

fn dataset_fetch_error(error: FetchError) -> CommandError {
    let code = match error.code {
        FetchErrorCode::InterestTimeout => ERROR_TIMEOUT,
        FetchErrorCode::DataHasNoSegment | FetchErrorCode::FinalBlockIdNotSegment => ERROR_SERVER,
        FetchErrorCode::SegmentValidationFail => ERROR_VALIDATION,
        FetchErrorCode::NackError => ERROR_NACK,
    };
    CommandError {
        code,
        text: error.message,
    }
}
