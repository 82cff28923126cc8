//! Common crate
//!
//! Shared column/table types and error handling for the Floe connectors.
//!
//! # Example
//! ```rust
//! use floe_common::{Error, ErrorCode};
//! let err = Error::malformed("missing 'query' argument");
//! assert_eq!(err.code(), ErrorCode::MalformedRequest);
//! ```

pub mod catalog;
pub mod error;

pub use catalog::{CasePolicy, Column, DataType, TableName};
pub use error::{Error, ErrorCode, Result};
