//! Identity resolution over assembled join plans.
//!
//! [`resolve`] runs one exact-key or demographic lookup; [`run_batch`] and
//! [`run_batch_concurrent`] drive many lookups from CSV rows and aggregate
//! per-row failures into a [`BatchResult`].

pub mod batch;
pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod similarity;

pub use batch::input::{
    demographic_builder, exact_key_builder, fallback_builder, read_batch_file, read_batch_rows,
    BatchMode,
};
pub use batch::{run_batch, run_batch_concurrent, CancelSignal};
pub use config::{CsvColumns, MatchConfig, NameWeights};
pub use engine::{resolve, resolve_exact_demographic};
pub use errors::{BatchInputError, ConfigError, InvalidRowError, ResolveError};
pub use model::{BatchOutcome, BatchResult, BatchRow, ErrorKind, MatchCandidate};
pub use similarity::{composite_score, name_similarity};
