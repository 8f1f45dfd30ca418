//! Core domain types shared by the gatehouse crates.
//!
//! This crate provides the strongly-typed identifiers and the `Result`
//! alias used across the authentication layer.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, UserId};
