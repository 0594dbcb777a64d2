//! Business logic shared by the route handlers.

pub mod checkout;
pub mod generation;
pub mod identity;
pub mod session;
