//! Shared helpers for the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use rust_ndnc_face::security::Validator;
use rust_ndnc_face::DummyFace;
use rust_ndnc_common::{Component, Data, Interest, Name};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

pub fn name(uri: &str) -> Name {
    uri.parse().expect("test name")
}

/// A Data packet that satisfies MustBeFresh Interests.
pub fn make_data(uri: &str) -> Data {
    let mut data = Data::new(name(uri), Bytes::new());
    data.set_freshness_period(Some(Duration::from_secs(1)));
    data
}

/// Payload used for segment `seg`, distinct per segment.
pub fn segment_payload(seg: u64) -> Bytes {
    Bytes::from(format!("{seg:06}|"))
}

/// A segment Data under `<prefix>/<version>/<seg>`.
pub fn make_segment(prefix: &Name, version: u64, seg: u64, last_segment: Option<u64>) -> Data {
    let mut segment_name = prefix.clone();
    segment_name.append_version(version);
    segment_name.append_segment(seg);

    let mut data = Data::new(segment_name, segment_payload(seg));
    data.set_freshness_period(Some(Duration::from_secs(1)));
    if let Some(last) = last_segment {
        data.set_final_block_id(Some(Component::segment(last)));
    }
    data
}

/// Answers every Interest the face has sent, like a forwarder in front of
/// a segment producer would. Returns the number of Interests answered.
///
/// `respond` maps one sent Interest to the packet to inject; `None` leaves
/// the Interest unanswered.
pub fn drive<R>(face: &DummyFace, max_rounds: usize, mut respond: R) -> usize
where
    R: FnMut(&DummyFace, &Interest) -> bool,
{
    let mut answered = 0;
    let mut seen = 0;
    for _ in 0..max_rounds {
        let interests = face.sent_interests();
        if interests.len() == seen {
            break;
        }
        let fresh: Vec<Interest> = interests[seen..].to_vec();
        seen = interests.len();
        for interest in &fresh {
            if respond(face, interest) {
                answered += 1;
            }
        }
        face.pump();
    }
    answered
}

/// A validator rejecting segments selected by a predicate.
pub struct SelectiveValidator {
    reject: Box<dyn Fn(&Data) -> bool>,
    pub n_validated: Rc<Cell<u32>>,
}

impl SelectiveValidator {
    pub fn accept_all() -> Self {
        Self::rejecting(|_| false)
    }

    pub fn rejecting(reject: impl Fn(&Data) -> bool + 'static) -> Self {
        Self {
            reject: Box::new(reject),
            n_validated: Rc::new(Cell::new(0)),
        }
    }
}

impl Validator for SelectiveValidator {
    fn validate(
        &self,
        data: &Data,
        on_ok: Box<dyn FnOnce(&Data)>,
        on_fail: Box<dyn FnOnce(&Data, String)>,
    ) {
        if (self.reject)(data) {
            on_fail(data, "rejected by test policy".to_owned());
        } else {
            self.n_validated.set(self.n_validated.get() + 1);
            on_ok(data);
        }
    }
}
