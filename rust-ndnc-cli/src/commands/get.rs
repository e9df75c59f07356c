//! `ndnc get`: fetch a segmented object to stdout.

use anyhow::{bail, Context, Result};
use rust_ndnc_common::{Interest, Name};
use rust_ndnc_face::fetch::{FetcherOptions, SegmentFetcher};
use rust_ndnc_face::Face;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

pub fn run(name: &str, in_order: bool) -> Result<()> {
    let name: Name = name.parse().context("invalid name")?;
    let face = Face::new().context("cannot connect to forwarder")?;

    let mut options = FetcherOptions::default();
    options.in_order = in_order;

    let fetcher = SegmentFetcher::start(
        &face,
        Interest::new(name),
        face.validator(),
        options,
    )?;

    let error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let done = Rc::new(RefCell::new(false));

    let fetch_error = Rc::clone(&error);
    fetcher.on_error(move |e| {
        *fetch_error.borrow_mut() = Some(e.to_string());
    });

    if in_order {
        fetcher.on_in_order_data(|payload| {
            let _ = std::io::stdout().write_all(&payload);
        });
        let done2 = Rc::clone(&done);
        fetcher.on_in_order_complete(move || *done2.borrow_mut() = true);
    } else {
        let done2 = Rc::clone(&done);
        fetcher.on_complete(move |payload| {
            let _ = std::io::stdout().write_all(&payload);
            *done2.borrow_mut() = true;
        });
    }

    face.process_events(None, false);

    if let Some(message) = error.borrow_mut().take() {
        bail!("fetch failed: {message}");
    }
    if !*done.borrow() {
        bail!("fetch did not complete");
    }
    Ok(())
}
