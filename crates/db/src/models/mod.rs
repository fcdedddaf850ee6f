//! Row models and create DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, and where the service layer creates rows, a
//! `Deserialize` create DTO.

pub mod leadership;
pub mod membership;
pub mod project;
pub mod team;
pub mod user;
