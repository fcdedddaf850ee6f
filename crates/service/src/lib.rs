//! Lifecycle coordination for teams and projects.
//!
//! The ledgers ([`membership::MembershipLedger`],
//! [`leadership::LeadershipLedger`]) create and close intervals inside a
//! caller-supplied store session and enforce the "at most one open
//! interval" rules. The coordinators ([`team::TeamCoordinator`],
//! [`project::ProjectCoordinator`]) sequence ledger operations into the
//! user-facing lifecycle actions, each inside one atomic unit of work.

pub mod error;
pub mod leadership;
pub mod membership;
pub mod project;
pub mod team;

pub use error::{ServiceError, ServiceResult};
pub use project::ProjectCoordinator;
pub use team::TeamCoordinator;
