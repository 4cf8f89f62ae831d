//! Foundation types for rosh.
//!
//! Shared by every rosh crate: the error enum, typed argument values,
//! configuration, and the iproute2 name/id tables.

pub mod config;
pub mod error;
pub mod lookup;
pub mod value;
