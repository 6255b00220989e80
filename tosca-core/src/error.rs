//! Error types for TOSCA parsing and validation

use thiserror::Error;

/// Main error type for TOSCA operations
///
/// Most of these kinds are never returned as `Err` directly: the parse
/// engine appends them to an [`crate::ErrorCollector`] so a single pass can
/// report every violation, and raises one [`ToscaError::Aggregate`] at the
/// end. `Err` returns are reserved for fatal conditions such as an
/// unreadable root document.
#[derive(Error, Debug)]
pub enum ToscaError {
    /// The root document or an imported document could not be parsed
    #[error("failed to parse document: {message}")]
    Parse {
        /// Error message
        message: String,
        /// Location of the document if known
        location: Option<String>,
    },

    /// A mapping contains a key that is not defined for its section
    #[error("{what} contains unknown field \"{field}\"")]
    UnknownField {
        /// The section or template holding the field
        what: String,
        /// The offending key
        field: String,
    },

    /// A required key is missing from a mapping
    #[error("{what} is missing required field \"{required}\"")]
    MissingRequiredField {
        /// The section or template missing the field
        what: String,
        /// The missing key (or comma-joined keys)
        required: String,
    },

    /// A section has the wrong YAML shape
    #[error("{what} must be a {expected}")]
    TypeMismatch {
        /// The section with the wrong shape
        what: String,
        /// The expected shape, e.g. "map" or "list"
        expected: String,
    },

    /// A property schema or constraint definition is malformed
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Error message
        message: String,
    },

    /// A type definition is structurally invalid
    #[error("invalid definition of type \"{type_name}\": {what}")]
    InvalidTypeDefinition {
        /// The type being defined
        type_name: String,
        /// What is wrong with it
        what: String,
    },

    /// A referenced type cannot be found in any namespace
    #[error("type \"{type_name}\" was not found")]
    MissingType {
        /// The unresolved type name
        type_name: String,
    },

    /// An import could not be resolved or loaded
    #[error("failed to import \"{import}\": {reason}")]
    Import {
        /// The import location as written
        import: String,
        /// Reason for the failure
        reason: String,
    },

    /// Two imports in one document use the same name
    #[error("duplicate import name \"{name}\"")]
    DuplicateImportName {
        /// The repeated import name
        name: String,
    },

    /// A value failed constraint or structural validation
    #[error("{message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// A range value is malformed or out of order
    #[error("invalid range {what}: {why}")]
    RangeValue {
        /// The range as written
        what: String,
        /// Reason it is invalid
        why: String,
    },

    /// A property value has the wrong type or cannot be parsed
    #[error("invalid value for {what}")]
    InvalidPropertyValue {
        /// The property or context holding the value
        what: String,
    },

    /// A requirement's occurrences bound is malformed
    #[error("invalid occurrences {what}: {why}")]
    InvalidOccurrences {
        /// The occurrences value as written
        what: String,
        /// Reason it is invalid
        why: String,
    },

    /// A group or policy names a target that does not exist
    #[error("{message}")]
    InvalidGroupTarget {
        /// Error message
        message: String,
    },

    /// A required topology input was not supplied
    #[error("{what} is missing required input \"{input_name}\"")]
    MissingRequiredInput {
        /// The topology requiring the input
        what: String,
        /// The input name
        input_name: String,
    },

    /// The document declares an unrecognized tosca_definitions_version
    #[error("template version \"{version}\" is invalid; valid versions are: {valid_versions}")]
    InvalidTemplateVersion {
        /// The declared version
        version: String,
        /// Comma-joined list of accepted versions
        valid_versions: String,
    },

    /// IO error while reading a document
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML or JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The grouped report of every error collected during one parse
    #[error("the input {location} failed validation with {count} error(s):\n\t{}", report.join("\n\t"))]
    Aggregate {
        /// The root document location, or "pre-parsed input"
        location: String,
        /// Number of collected errors
        count: usize,
        /// One formatted line per collected error
        report: Vec<String>,
    },
}

/// Result type alias for TOSCA operations
pub type Result<T> = std::result::Result<T, ToscaError>;

impl ToscaError {
    /// Create a parse error
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            location: None,
        }
    }

    /// Create a parse error with a document location
    #[must_use]
    pub fn parse_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create an unknown-field error
    #[must_use]
    pub fn unknown_field(what: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            what: what.into(),
            field: field.into(),
        }
    }

    /// Create a missing-required-field error
    #[must_use]
    pub fn missing_field(what: impl Into<String>, required: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            what: what.into(),
            required: required.into(),
        }
    }

    /// Create a type-mismatch error
    #[must_use]
    pub fn type_mismatch(what: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            what: what.into(),
            expected: expected.into(),
        }
    }

    /// Create an invalid-schema error
    #[must_use]
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Create an invalid-type-definition error
    #[must_use]
    pub fn invalid_type_definition(
        type_name: impl Into<String>,
        what: impl Into<String>,
    ) -> Self {
        Self::InvalidTypeDefinition {
            type_name: type_name.into(),
            what: what.into(),
        }
    }

    /// Create a missing-type error
    #[must_use]
    pub fn missing_type(type_name: impl Into<String>) -> Self {
        Self::MissingType {
            type_name: type_name.into(),
        }
    }

    /// Create an import error
    #[must_use]
    pub fn import(import: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Import {
            import: import.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid-property-value error
    #[must_use]
    pub fn invalid_value(what: impl Into<String>) -> Self {
        Self::InvalidPropertyValue { what: what.into() }
    }
}

impl From<serde_yaml::Error> for ToscaError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ToscaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for ToscaError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidSchema {
            message: err.to_string(),
        }
    }
}
