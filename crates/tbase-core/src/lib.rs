//! Core contracts shared by the tbase crates.
//!
//! This crate defines the typed database values, search criteria, and the
//! error and redaction helpers used by the planner, the executor, and the
//! matching engine.

pub mod catalog;
pub mod criteria;
pub mod error;
pub mod redaction;
pub mod value;

pub use catalog::{Catalog, CatalogColumn, CatalogTable};
pub use criteria::{DemographicCriteria, KeyValue, SearchCriteria};
pub use error::{CriteriaError, DatabaseError};
pub use redaction::{
    describe_parameters, redact_connection_string, scrub_parameters, RedactedConnection,
};
pub use value::{Row, SqlValue};

/// Date format accepted for date-of-birth input.
pub const DOB_FORMAT: &str = "%Y-%m-%d";
