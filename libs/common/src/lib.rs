//! Common library for the Reactivities application
//!
//! This crate provides shared functionality used by the account service, the
//! activities API and the client store: database connectivity, the uniform
//! handler outcome, paging, the activity filter, token handling and input
//! validation.

pub mod database;
pub mod error;
pub mod filter;
pub mod jwt;
pub mod models;
pub mod outcome;
pub mod paging;
pub mod validation;

pub use outcome::Outcome;
pub use paging::{PagedList, PaginationHeader, PagingParams};
