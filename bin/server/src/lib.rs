//! Gatehouse server library.
//!
//! Exposes the router and its parts so the binary and the integration tests
//! build the same application.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod home;
pub mod views;
