//! # TOSCA Core
//!
//! Foundation types for parsing and validating TOSCA Simple YAML profiles.
//!
//! This crate provides the building blocks the parse engine is built on:
//! the ordered YAML value model, scalar-with-unit types, per-property
//! schemas with constraint evaluators, intrinsic-function shape detection,
//! and the accumulating error channel that lets a parse report every
//! violation in a single pass.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

/// Error kinds for TOSCA parsing and validation
pub mod error;

/// Accumulating, per-parse error channel
pub mod collector;

/// Ordered YAML-shaped value model
pub mod value;

/// Scalar-with-unit types (size, time, frequency, bitrate)
pub mod scalar_unit;

/// Per-property schema definitions
pub mod schema;

/// Constraint evaluators (equal, in_range, pattern, ...)
pub mod constraints;

/// Intrinsic-function expression recognition
pub mod functions;

pub use collector::ErrorCollector;
pub use constraints::Constraint;
pub use error::{Result, ToscaError};
pub use schema::Schema;
pub use value::{Mapping, Provenance, Value};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collector::ErrorCollector;
    pub use crate::constraints::Constraint;
    pub use crate::error::{Result, ToscaError};
    pub use crate::schema::Schema;
    pub use crate::value::{Mapping, Provenance, Value};
}
