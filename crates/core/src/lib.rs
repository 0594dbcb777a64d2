//! DPIcon Core - Shared domain types.
//!
//! This crate provides the domain model used by the `site` binary and its
//! integration tests:
//! - identity snapshots published by the external identity provider
//! - the credit balance and the static plan catalog
//! - the session state machine that reacts to identity snapshots
//! - validation of Face Fusion generation requests
//!
//! # Architecture
//!
//! The core crate contains only types and pure transitions - no I/O, no
//! timers, no HTTP clients. Everything asynchronous (provider notifications,
//! the simulated generation delay, the payment widget) lives in the site
//! crate and drives these types.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, credits, prices, plans and ids
//! - [`session`] - Signed-in / signed-out state machine and credit resets
//! - [`generation`] - Independent validation of image and prompt inputs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod generation;
pub mod session;
pub mod types;

pub use generation::{GenerationInput, ValidationReport};
pub use session::SessionState;
pub use types::*;
