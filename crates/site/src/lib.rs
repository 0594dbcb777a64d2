//! DPIcon site library.
//!
//! This crate provides the marketing site and the Face Fusion product page
//! as a library, allowing the full router to be driven in-process by the
//! integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
