//! Prefix registration and management command exchange.

mod common;

use bytes::Bytes;
use common::{make_segment, name};
use rust_ndnc_face::mgmt::{
    CommandError, CommandOptions, ControlParameters, ControlResponse, Controller,
    RibRegisterCommand, ERROR_NACK, ERROR_TIMEOUT, ROUTE_FLAG_CHILD_INHERIT,
};
use rust_ndnc_face::DummyFace;
use rust_ndnc_common::{Data, Interest, Nack, NackReason};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// The command Interest a register/unregister call puts on the wire.
fn sent_command(face: &DummyFace) -> Interest {
    let sent = face.sent_interests();
    assert_eq!(sent.len(), 1, "expected exactly one command Interest");
    sent[0].clone()
}

/// Builds the forwarder's signed reply to `command`.
fn command_reply(command: &Interest, response: &ControlResponse) -> Data {
    let mut data = Data::new(command.name().clone(), response.encode());
    data.set_freshness_period(Some(Duration::from_secs(1)));
    data
}

#[test]
fn register_prefix_round_trip() {
    let face = DummyFace::new();

    let succeeded: Rc<RefCell<Option<ControlParameters>>> = Rc::new(RefCell::new(None));
    let succeeded2 = Rc::clone(&succeeded);
    face.register_prefix(
        name("/ndn/com/example"),
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        Some(Box::new(move |params| {
            *succeeded2.borrow_mut() = Some(params.clone());
        })),
        Some(Box::new(|prefix, error| {
            panic!("registration of {prefix} failed: {error}");
        })),
    );
    face.pump();

    let command = sent_command(&face);
    assert!(name("/localhost/nfd/rib/register").is_prefix_of(command.name()));
    // prefix(2) + module + verb + parameters + 4 signed-Interest components
    assert_eq!(command.name().len(), 9);

    // the ControlParameters component carries the prefix and flags
    let params_component = command.name().get(4).unwrap();
    let sent_params = ControlParameters::decode(params_component.value()).unwrap();
    assert_eq!(sent_params.name, Some(name("/ndn/com/example")));
    assert_eq!(sent_params.flags, Some(ROUTE_FLAG_CHILD_INHERIT));

    let body = ControlParameters::new()
        .with_name(name("/ndn/com/example"))
        .with_face_id(3001)
        .encode();
    let response = ControlResponse::new(200, "OK").with_body(body);
    face.receive_data(&command_reply(&command, &response));
    face.pump();

    let params = succeeded.borrow().clone().expect("onSuccess must fire");
    assert_eq!(params.name, Some(name("/ndn/com/example")));
    assert_eq!(params.face_id, Some(3001));
}

#[test]
fn forwarder_error_code_is_reported() {
    let face = DummyFace::new();

    let failure: Rc<RefCell<Option<CommandError>>> = Rc::new(RefCell::new(None));
    let failure2 = Rc::clone(&failure);
    face.register_prefix(
        name("/denied"),
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        Some(Box::new(|_| panic!("registration must not succeed"))),
        Some(Box::new(move |_prefix, error| {
            *failure2.borrow_mut() = Some(error.clone());
        })),
    );
    face.pump();

    let command = sent_command(&face);
    let response = ControlResponse::new(403, "Unauthorized");
    face.receive_data(&command_reply(&command, &response));
    face.pump();

    let error = failure.borrow().clone().expect("onFailure must fire");
    assert_eq!(error.code, 403);
    assert_eq!(error.text, "Unauthorized");
}

#[test]
fn command_timeout_maps_to_10060() {
    let face = DummyFace::new();

    let failure: Rc<RefCell<Option<CommandError>>> = Rc::new(RefCell::new(None));
    let failure2 = Rc::clone(&failure);
    face.register_prefix(
        name("/slow"),
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        None,
        Some(Box::new(move |_prefix, error| {
            *failure2.borrow_mut() = Some(error.clone());
        })),
    );
    face.pump();

    // the command lifetime is 10 s by default
    face.advance_clocks(Duration::from_secs(1), 11);

    let error = failure.borrow().clone().expect("onFailure must fire");
    assert_eq!(error.code, ERROR_TIMEOUT);
}

#[test]
fn command_nack_maps_to_10800() {
    let face = DummyFace::new();

    let failure: Rc<RefCell<Option<CommandError>>> = Rc::new(RefCell::new(None));
    let failure2 = Rc::clone(&failure);
    face.register_prefix(
        name("/nacked"),
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        None,
        Some(Box::new(move |_prefix, error| {
            *failure2.borrow_mut() = Some(error.clone());
        })),
    );
    face.pump();

    let command = sent_command(&face);
    face.receive_nack(&Nack::new(command, NackReason::NoRoute));
    face.pump();

    let error = failure.borrow().clone().expect("onFailure must fire");
    assert_eq!(error.code, ERROR_NACK);
    assert!(error.text.contains("NoRoute"));
}

#[test]
fn registered_filter_receives_interests_after_success() {
    let face = DummyFace::new();

    let deliveries: Rc<RefCell<Vec<Interest>>> = Rc::new(RefCell::new(Vec::new()));
    let deliveries2 = Rc::clone(&deliveries);
    face.register_prefix_with_filter(
        name("/producer").into(),
        move |_filter, interest| {
            deliveries2.borrow_mut().push(interest.clone());
        },
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        None,
        None,
    );
    face.pump();

    // before the forwarder confirms, the filter is not installed
    face.receive_interest(&Interest::new(name("/producer/item")));
    face.pump();
    assert!(deliveries.borrow().is_empty());

    let command = sent_command(&face);
    let body = ControlParameters::new().with_name(name("/producer")).encode();
    face.receive_data(&command_reply(
        &command,
        &ControlResponse::new(200, "OK").with_body(body),
    ));
    face.pump();

    face.receive_interest(&Interest::new(name("/producer/item")));
    face.pump();
    assert_eq!(deliveries.borrow().len(), 1);
}

#[test]
fn controller_start_sends_signed_command() {
    let face = DummyFace::new();
    let controller = Controller::new(face.face().clone());

    let succeeded = Rc::new(RefCell::new(None));
    let succeeded2 = Rc::clone(&succeeded);
    controller.start(
        RibRegisterCommand,
        ControlParameters::new().with_name(name("/via/controller")),
        &CommandOptions::default(),
        Box::new(move |params| *succeeded2.borrow_mut() = Some(params)),
        Box::new(|response| panic!("command failed: {response}")),
    );
    face.pump();

    let command = sent_command(&face);
    // defaults are applied to the request before encoding
    let sent_params =
        ControlParameters::decode(command.name().get(4).unwrap().value()).unwrap();
    assert_eq!(sent_params.cost, Some(0));
    assert!(sent_params.origin.is_some());

    let body = ControlParameters::new().with_name(name("/via/controller")).encode();
    face.receive_data(&command_reply(
        &command,
        &ControlResponse::new(200, "OK").with_body(body),
    ));
    face.pump();
    assert!(succeeded.borrow().is_some());
}

#[test]
fn fetch_dataset_reassembles_segments() {
    let face = DummyFace::new();
    let controller = Controller::new(face.face().clone());

    let result: Rc<RefCell<Option<Bytes>>> = Rc::new(RefCell::new(None));
    let result2 = Rc::clone(&result);
    controller.fetch_dataset(
        name("/localhost/nfd/faces/list"),
        &CommandOptions::default(),
        Box::new(move |payload| *result2.borrow_mut() = Some(payload)),
        Box::new(|error| panic!("dataset fetch failed: {error}")),
    );
    face.pump();

    let base = name("/localhost/nfd/faces/list");
    common::drive(&face, 100, |face, interest| {
        if !base.is_prefix_of(interest.name()) {
            return false;
        }
        let seg = match interest.name().at(-1) {
            Some(component) if component.is_segment() => component.to_segment().unwrap(),
            _ => 0,
        };
        face.receive_data(&make_segment(&base, 1, seg, Some(2)));
        true
    });

    let payload = result.borrow().clone().expect("dataset must arrive");
    let expected: Vec<u8> = (0..=2u64)
        .flat_map(|seg| common::segment_payload(seg).to_vec())
        .collect();
    assert_eq!(payload.as_ref(), expected.as_slice());
}

#[test]
fn unregister_is_sent_on_handle_cancel() {
    let face = DummyFace::new();

    let handle = face.register_prefix(
        name("/transient"),
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        None,
        None,
    );
    face.pump();

    let register = sent_command(&face);
    let body = ControlParameters::new().with_name(name("/transient")).encode();
    face.receive_data(&command_reply(
        &register,
        &ControlResponse::new(200, "OK").with_body(body),
    ));
    face.pump();
    face.clear_sent();

    handle.cancel();
    face.pump();

    let sent = face.sent_interests();
    assert_eq!(sent.len(), 1);
    assert!(name("/localhost/nfd/rib/unregister").is_prefix_of(sent[0].name()));
}
