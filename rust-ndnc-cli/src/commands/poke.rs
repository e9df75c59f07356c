//! `ndnc poke`: publish one Data packet read from stdin.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rust_ndnc_common::{Data, Name};
use rust_ndnc_face::mgmt::{CommandOptions, ROUTE_FLAG_CHILD_INHERIT};
use rust_ndnc_face::{Face, InterestFilter};
use std::cell::Cell;
use std::io::Read;
use std::rc::Rc;
use std::time::Duration;

pub fn run(name: &str, freshness_ms: u64) -> Result<()> {
    let name: Name = name.parse().context("invalid name")?;
    let mut content = Vec::new();
    std::io::stdin()
        .read_to_end(&mut content)
        .context("cannot read content from stdin")?;

    let face = Face::new().context("cannot connect to forwarder")?;
    let served = Rc::new(Cell::new(false));
    let failed = Rc::new(Cell::new(false));

    let mut data = Data::new(name.clone(), content);
    data.set_freshness_period(Some(Duration::from_millis(freshness_ms)));

    let answer_face = face.clone();
    let answer_served = Rc::clone(&served);
    let filter = InterestFilter::new(name.clone());
    face.register_prefix_with_filter(
        filter,
        move |_filter, interest| {
            if answer_served.get() {
                return;
            }
            if !interest.matches_data(&data) {
                return;
            }
            if let Err(e) = answer_face.put_data(&data) {
                warn!("cannot send Data: {e}");
                return;
            }
            answer_served.set(true);
            answer_face.shutdown();
        },
        CommandOptions::default(),
        ROUTE_FLAG_CHILD_INHERIT,
        Some(Box::new({
            let prefix = name.clone();
            move |_params| info!("prefix {prefix} registered, waiting for Interest")
        })),
        Some(Box::new({
            let shutdown_face = face.clone();
            let failed = Rc::clone(&failed);
            move |prefix, error| {
                warn!("cannot register {prefix}: {error}");
                failed.set(true);
                shutdown_face.shutdown();
            }
        })),
    );

    face.process_events(None, true);

    if failed.get() {
        bail!("prefix registration failed");
    }
    if !served.get() {
        bail!("no Interest arrived");
    }
    Ok(())
}
