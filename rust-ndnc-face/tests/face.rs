//! Face runtime behavior over a dummy transport.

mod common;

use bytes::Bytes;
use common::{make_data, name};
use rust_ndnc_face::{DummyFace, FaceError, InterestFilter};
use rust_ndnc_common::{Component, Data, Interest, Nack, NackReason, Name};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

fn counted<T: 'static>(slot: &Rc<RefCell<Vec<T>>>) -> Rc<RefCell<Vec<T>>> {
    Rc::clone(slot)
}

#[test]
fn express_interest_then_data() {
    let face = DummyFace::new();

    let received: Rc<RefCell<Vec<Name>>> = Rc::new(RefCell::new(Vec::new()));
    let timeouts = Rc::new(Cell::new(0u32));

    let mut interest = Interest::new(name("/Hello/World"));
    interest
        .set_can_be_prefix(true)
        .set_must_be_fresh(true)
        .set_lifetime(Duration::from_millis(50));

    let received2 = counted(&received);
    let timeouts2 = Rc::clone(&timeouts);
    face.express_interest(
        interest,
        Some(Box::new(move |_interest, data| {
            received2.borrow_mut().push(data.name().clone());
        })),
        None,
        Some(Box::new(move |_interest| {
            timeouts2.set(timeouts2.get() + 1);
        })),
    )
    .unwrap();
    face.pump();

    assert_eq!(face.sent_interests().len(), 1);
    assert_eq!(face.sent_interests()[0].name(), &name("/Hello/World"));

    face.advance_clocks(Duration::from_millis(10), 4);
    face.receive_data(&make_data("/Bye/World/a"));
    face.receive_data(&make_data("/Hello/World/a"));
    face.pump();

    assert_eq!(*received.borrow(), vec![name("/Hello/World/a")]);

    face.advance_clocks(Duration::from_millis(10), 10);
    assert_eq!(timeouts.get(), 0);
    assert_eq!(received.borrow().len(), 1);
}

#[test]
fn express_interest_times_out() {
    let face = DummyFace::new();

    let data_count = Rc::new(Cell::new(0u32));
    let nack_count = Rc::new(Cell::new(0u32));
    let timeout_names: Rc<RefCell<Vec<Name>>> = Rc::new(RefCell::new(Vec::new()));

    let mut interest = Interest::new(name("/Hello/World"));
    interest.set_lifetime(Duration::from_millis(50));

    let data2 = Rc::clone(&data_count);
    let nack2 = Rc::clone(&nack_count);
    let timeouts2 = counted(&timeout_names);
    face.express_interest(
        interest,
        Some(Box::new(move |_, _| data2.set(data2.get() + 1))),
        Some(Box::new(move |_, _| nack2.set(nack2.get() + 1))),
        Some(Box::new(move |interest| {
            timeouts2.borrow_mut().push(interest.name().clone());
        })),
    )
    .unwrap();

    face.advance_clocks(Duration::from_millis(10), 20);

    assert_eq!(*timeout_names.borrow(), vec![name("/Hello/World")]);
    assert_eq!(data_count.get(), 0);
    assert_eq!(nack_count.get(), 0);
}

#[test]
fn nacks_from_two_filters_are_aggregated() {
    let face = DummyFace::new();

    {
        let face2 = face.face().clone();
        face.set_interest_filter(name("/A"), move |_filter, interest| {
            let nack = Nack::new(interest.clone(), NackReason::Congestion);
            face2.put_nack(&nack).unwrap();
        });
    }
    {
        let face2 = face.face().clone();
        face.set_interest_filter(name("/A"), move |_filter, interest| {
            let nack = Nack::new(interest.clone(), NackReason::NoRoute);
            face2.put_nack(&nack).unwrap();
        });
    }

    let mut interest = Interest::new(name("/A"));
    interest.set_nonce(14333271);
    face.receive_interest(&interest);
    face.pump();

    let nacks = face.sent_nacks();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].reason(), NackReason::Congestion);
    assert_eq!(nacks[0].interest().nonce(), Some(14333271));
}

#[test]
fn producer_answers_forwarder_interest() {
    let face = DummyFace::new();

    let face2 = face.face().clone();
    face.set_interest_filter(name("/store"), move |_filter, interest| {
        let mut data = Data::new(interest.name().clone(), Bytes::from_static(b"value"));
        data.set_freshness_period(Some(Duration::from_secs(1)));
        face2.put_data(&data).unwrap();
    });

    face.receive_interest(&Interest::new(name("/store/item")));
    face.pump();

    let sent = face.sent_data();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name(), &name("/store/item"));
    assert_eq!(sent[0].content().as_ref(), b"value");
}

#[test]
fn loopback_satisfaction_stays_local() {
    let face = DummyFace::new();

    // producer side answers looped-back Interests
    let face2 = face.face().clone();
    face.set_interest_filter(name("/local"), move |_filter, interest| {
        let mut data = Data::new(interest.name().clone(), Bytes::from_static(b"x"));
        data.set_freshness_period(Some(Duration::from_secs(1)));
        face2.put_data(&data).unwrap();
    });

    let got_data = Rc::new(Cell::new(false));
    let got_data2 = Rc::clone(&got_data);
    face.express_interest(
        Interest::new(name("/local/item")),
        Some(Box::new(move |_, _| got_data2.set(true))),
        None,
        None,
    )
    .unwrap();
    face.pump();

    assert!(got_data.get());
    // the Data satisfied only a local APP Interest: nothing goes upstream
    assert_eq!(face.sent_data().len(), 0);
}

#[test]
fn no_loopback_filter_ignores_own_interests() {
    let face = DummyFace::new();

    let deliveries = Rc::new(Cell::new(0u32));
    let mut filter = InterestFilter::new(name("/quiet"));
    filter.set_allows_loopback(false);
    let deliveries2 = Rc::clone(&deliveries);
    face.set_interest_filter(filter, move |_, _| deliveries2.set(deliveries2.get() + 1));

    face.express_interest(Interest::new(name("/quiet/item")), None, None, None)
        .unwrap();
    face.pump();
    assert_eq!(deliveries.get(), 0);

    // the same Interest from the forwarder is delivered
    face.receive_interest(&Interest::new(name("/quiet/item")));
    face.pump();
    assert_eq!(deliveries.get(), 1);
}

#[test]
fn remove_all_pending_interests_suppresses_callbacks() {
    let face = DummyFace::new();

    let fired = Rc::new(Cell::new(false));
    let fired2 = Rc::clone(&fired);
    let mut interest = Interest::new(name("/gone"));
    interest.set_can_be_prefix(true);
    face.express_interest(
        interest,
        Some(Box::new(move |_, _| fired2.set(true))),
        None,
        Some(Box::new({
            let fired = Rc::clone(&fired);
            move |_| fired.set(true)
        })),
    )
    .unwrap();

    face.remove_all_pending_interests();
    assert_eq!(face.n_pending_interests(), 0);

    face.receive_data(&make_data("/gone/a"));
    face.advance_clocks(Duration::from_millis(100), 50);
    assert!(!fired.get());
}

#[test]
fn cancelled_handle_never_fires() {
    let face = DummyFace::new();

    let fired = Rc::new(Cell::new(false));
    let fired2 = Rc::clone(&fired);
    let mut interest = Interest::new(name("/cancelled"));
    interest.set_can_be_prefix(true);
    let handle = face
        .express_interest(
            interest,
            Some(Box::new(move |_, _| fired2.set(true))),
            None,
            None,
        )
        .unwrap();
    face.pump();

    handle.cancel();
    face.receive_data(&make_data("/cancelled/a"));
    face.advance_clocks(Duration::from_millis(100), 50);
    assert!(!fired.get());
}

#[test]
fn oversized_interest_is_rejected_synchronously() {
    let face = DummyFace::new();

    let mut huge = Name::new();
    huge.push(Component::generic(Bytes::from(vec![0u8; 9000])));
    let result = face.express_interest(Interest::new(huge), None, None, None);

    assert!(matches!(
        result,
        Err(FaceError::OversizedPacket { pkt_type: 'I', .. })
    ));
    assert_eq!(face.sent_interests().len(), 0);
}

#[test]
fn oversized_data_is_rejected_synchronously() {
    let face = DummyFace::new();

    let data = Data::new(name("/big"), Bytes::from(vec![0u8; 9000]));
    assert!(matches!(
        face.put_data(&data),
        Err(FaceError::OversizedPacket { pkt_type: 'D', .. })
    ));
}

#[test]
fn unsolicited_nack_is_dropped() {
    let face = DummyFace::new();

    let mut interest = Interest::new(name("/nobody"));
    interest.set_nonce(1);
    face.put_nack(&Nack::new(interest, NackReason::NoRoute)).unwrap();
    face.pump();
    assert_eq!(face.sent_nacks().len(), 0);
}

#[test]
fn unsolicited_data_is_forwarded() {
    let face = DummyFace::new();

    // keep the read side alive so the transport is connected
    face.express_interest(Interest::new(name("/keepalive")), None, None, None)
        .unwrap();

    face.put_data(&make_data("/announcement")).unwrap();
    let sent = face.sent_data();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name(), &name("/announcement"));
}

#[test]
fn app_nack_callback_receives_least_severe_reason() {
    let face = DummyFace::new();

    let reasons: Rc<RefCell<Vec<NackReason>>> = Rc::new(RefCell::new(Vec::new()));
    let reasons2 = counted(&reasons);
    let mut interest = Interest::new(name("/towards/void"));
    interest.set_nonce(99);
    face.express_interest(
        interest.clone(),
        None,
        Some(Box::new(move |_, nack| {
            reasons2.borrow_mut().push(nack.reason());
        })),
        None,
    )
    .unwrap();
    face.pump();

    // the Nack must carry the nonce actually sent
    let sent = &face.sent_interests()[0];
    face.receive_nack(&Nack::new(sent.clone(), NackReason::Duplicate));
    face.pump();

    assert_eq!(*reasons.borrow(), vec![NackReason::Duplicate]);
}
