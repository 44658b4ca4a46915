//! Core types, filters and services for the Sangam matrimony backend.
//!
//! Nothing here speaks HTTP or SQL. Storage backends implement the traits in
//! [`store`]; delivery channels implement the collaborator traits in
//! [`notify`] and [`registration`].

pub mod admin;
pub mod catalog;
pub mod eligibility;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod matching;
pub mod notify;
pub mod profile;
pub mod registration;
pub mod social;
pub mod store;

pub use error::{Error, ErrorKind, Result};
