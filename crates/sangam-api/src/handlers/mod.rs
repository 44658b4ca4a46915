//! Route handlers, grouped by resource.

pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod discovery;
pub mod profiles;
