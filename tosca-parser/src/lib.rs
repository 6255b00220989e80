//! # TOSCA Parser
//!
//! Parses and validates TOSCA Simple YAML profiles into a fully resolved
//! in-memory model: typed node templates with materialized properties,
//! capabilities, interfaces and artifacts, requirements matched to target
//! nodes, relationship templates bound, and namespaced imports resolved.
//!
//! ```no_run
//! use tosca_parser::ToscaParser;
//!
//! let parser = ToscaParser::new();
//! let model = parser.parse_file("service.yaml", None)?;
//! for node in model.topology.node_templates.values() {
//!     println!("{}: {}", node.name(), node.type_name().unwrap_or("untyped"));
//! }
//! # Ok::<(), tosca_core::ToscaError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

/// Parser configuration
pub mod config;

/// Per-parse context: namespaces, type registry, error channel
pub mod context;

/// Namespaces of type definitions with prefixed imports
pub mod namespace;

/// Import-list traversal and namespace population
pub mod imports;

/// The resolver contract and the bundled filesystem/URL resolver
pub mod resolver;

/// Repository records
pub mod repository;

/// Embedded built-in TOSCA type definitions
pub mod builtin;

/// Entity types and the inheritance engine
pub mod types;

/// Entity templates: nodes, relationships, groups, policies, artifacts
pub mod templates;

/// Topology templates
pub mod topology;

/// Substitution mappings
pub mod substitution;

/// The top-level template model and parse entry points
pub mod template;

pub use config::ParserConfig;
pub use context::ParseContext;
pub use template::{ToscaParser, ToscaTemplate};
pub use tosca_core::{ErrorCollector, Result, ToscaError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ParserConfig;
    pub use crate::resolver::{DefaultResolver, ImportResolver};
    pub use crate::template::{ToscaParser, ToscaTemplate};
    pub use crate::topology::TopologyTemplate;
    pub use tosca_core::prelude::*;
}
