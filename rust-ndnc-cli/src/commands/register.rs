//! `ndnc register`: register a prefix in the forwarder's RIB.

use anyhow::{bail, Context, Result};
use rust_ndnc_common::Name;
use rust_ndnc_face::mgmt::{
    controller, CommandOptions, ControlParameters, RibRegisterCommand, ROUTE_FLAG_CAPTURE,
    ROUTE_FLAG_CHILD_INHERIT,
};
use rust_ndnc_face::Face;
use std::cell::RefCell;
use std::rc::Rc;

pub fn run(prefix: &str, cost: u64, no_inherit: bool, capture: bool) -> Result<()> {
    let prefix: Name = prefix.parse().context("invalid prefix")?;
    let face = Face::new().context("cannot connect to forwarder")?;

    let mut flags = 0;
    if !no_inherit {
        flags |= ROUTE_FLAG_CHILD_INHERIT;
    }
    if capture {
        flags |= ROUTE_FLAG_CAPTURE;
    }

    let params = ControlParameters::new()
        .with_name(prefix.clone())
        .with_cost(cost)
        .with_flags(flags);

    let outcome: Rc<RefCell<Option<Result<ControlParameters, String>>>> =
        Rc::new(RefCell::new(None));

    let ok_outcome = Rc::clone(&outcome);
    let err_outcome = Rc::clone(&outcome);
    controller::start_command(
        &face,
        RibRegisterCommand,
        params,
        &CommandOptions::default(),
        Box::new(move |params| *ok_outcome.borrow_mut() = Some(Ok(params))),
        Box::new(move |response| {
            *err_outcome.borrow_mut() = Some(Err(response.to_string()));
        }),
    );

    face.process_events(None, false);

    let taken = outcome.borrow_mut().take();
    match taken {
        Some(Ok(params)) => {
            println!(
                "registered {} (FaceId {}, cost {})",
                prefix,
                params.face_id.map_or_else(|| "?".to_owned(), |id| id.to_string()),
                params.cost.unwrap_or(cost),
            );
            Ok(())
        }
        Some(Err(message)) => bail!("registration failed: {message}"),
        None => bail!("no response from forwarder"),
    }
}
