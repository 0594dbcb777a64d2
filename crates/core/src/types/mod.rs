//! Core types for DPIcon.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credits;
pub mod email;
pub mod id;
pub mod identity;
pub mod plan;
pub mod price;
pub mod status;

pub use credits::Credits;
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{IdentitySnapshot, UserIdentity};
pub use plan::{BillingPeriod, Plan, PlanId, UnknownPlan, catalog};
pub use price::{CurrencyCode, Price};
pub use status::*;
