//! Command implementations for the Tally CLI

pub mod purge;
pub mod read;
pub mod serve;
pub mod status;
pub mod sync;
