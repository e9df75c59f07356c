//! `ndnc peek`: express one Interest, print the reply.

use anyhow::{bail, Context, Result};
use log::debug;
use rust_ndnc_common::{Interest, Name};
use rust_ndnc_face::Face;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

enum Outcome {
    Data(bytes::Bytes),
    Nack(String),
    Timeout,
}

pub fn run(name: &str, lifetime_ms: u64, prefix: bool, fresh: bool) -> Result<()> {
    let name: Name = name.parse().context("invalid name")?;
    let face = Face::new().context("cannot connect to forwarder")?;

    let mut interest = Interest::new(name);
    interest
        .set_can_be_prefix(prefix)
        .set_must_be_fresh(fresh)
        .set_lifetime(Duration::from_millis(lifetime_ms));
    debug!("requesting {interest}");

    let outcome: Rc<RefCell<Option<Outcome>>> = Rc::new(RefCell::new(None));

    let data_outcome = Rc::clone(&outcome);
    let nack_outcome = Rc::clone(&outcome);
    let timeout_outcome = Rc::clone(&outcome);
    face.express_interest(
        interest,
        Some(Box::new(move |_interest, data| {
            *data_outcome.borrow_mut() = Some(Outcome::Data(data.content().clone()));
        })),
        Some(Box::new(move |_interest, nack| {
            *nack_outcome.borrow_mut() = Some(Outcome::Nack(nack.reason().to_string()));
        })),
        Some(Box::new(move |_interest| {
            *timeout_outcome.borrow_mut() = Some(Outcome::Timeout);
        })),
    )?;

    face.process_events(None, false);

    let taken = outcome.borrow_mut().take();
    match taken {
        Some(Outcome::Data(content)) => {
            std::io::stdout().write_all(&content)?;
            Ok(())
        }
        Some(Outcome::Nack(reason)) => bail!("nacked with reason {reason}"),
        Some(Outcome::Timeout) | None => bail!("timeout"),
    }
}
