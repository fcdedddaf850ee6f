//! Domain vocabulary for the roster lifecycle core.
//!
//! This crate is deliberately free of async and storage dependencies so the
//! business rules (status machines, exclusivity policies, tombstone naming)
//! can be used and tested by the db and service layers alike.

pub mod container;
pub mod error;
pub mod membership;
pub mod policy;
pub mod project_status;
pub mod tombstone;
pub mod types;
