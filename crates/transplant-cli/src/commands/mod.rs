//! Command handlers.

pub(crate) mod migrate;
pub(crate) mod status;
