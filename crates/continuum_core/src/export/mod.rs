//! Read-only reporting surface over engine state.

pub mod clusters;
pub mod records;
