//! Registered prefix records.

use crate::mgmt::CommandOptions;
use crate::record::RecordId;
use rust_ndnc_common::Name;

/// A prefix registered in the forwarder's RIB, with the options used to
/// register it and the id of the Interest filter set alongside, if any.
pub(crate) struct RegisteredPrefix {
    prefix: Name,
    options: CommandOptions,
    filter_id: Option<RecordId>,
}

impl RegisteredPrefix {
    pub(crate) fn new(prefix: Name, options: CommandOptions, filter_id: Option<RecordId>) -> Self {
        Self {
            prefix,
            options,
            filter_id,
        }
    }

    pub(crate) fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub(crate) fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub(crate) fn filter_id(&self) -> Option<RecordId> {
        self.filter_id
    }
}
