//! Per-property schema definitions
//!
//! A `Schema` is the parsed form of a property, input, attribute or
//! parameter definition: its type, requiredness, default, constraints and
//! (for lists and maps) key/entry schemas.

use crate::collector::ErrorCollector;
use crate::constraints::Constraint;
use crate::error::ToscaError;
use crate::value::{Mapping, Value};

/// Names of the built-in property types
pub mod property_types {
    pub const INTEGER: &str = "integer";
    pub const STRING: &str = "string";
    pub const BOOLEAN: &str = "boolean";
    pub const FLOAT: &str = "float";
    pub const RANGE: &str = "range";
    pub const NUMBER: &str = "number";
    pub const TIMESTAMP: &str = "timestamp";
    pub const LIST: &str = "list";
    pub const MAP: &str = "map";
    pub const SCALAR_UNIT_SIZE: &str = "scalar-unit.size";
    pub const SCALAR_UNIT_FREQUENCY: &str = "scalar-unit.frequency";
    pub const SCALAR_UNIT_TIME: &str = "scalar-unit.time";
    pub const SCALAR_UNIT_BITRATE: &str = "scalar-unit.bitrate";
    pub const VERSION: &str = "version";
    pub const PORT_DEF: &str = "tosca.datatypes.network.PortDef";
    pub const PORT_DEF_SHORT: &str = "PortDef";
    pub const PORT_SPEC: &str = "tosca.datatypes.network.PortSpec";
    pub const PORT_SPEC_SHORT: &str = "PortSpec";
    pub const ANY: &str = "any";

    /// Every built-in property type name
    pub const ALL: &[&str] = &[
        INTEGER,
        STRING,
        BOOLEAN,
        FLOAT,
        RANGE,
        NUMBER,
        TIMESTAMP,
        LIST,
        MAP,
        SCALAR_UNIT_SIZE,
        SCALAR_UNIT_FREQUENCY,
        SCALAR_UNIT_TIME,
        SCALAR_UNIT_BITRATE,
        VERSION,
        PORT_DEF,
        PORT_DEF_SHORT,
        PORT_SPEC,
        PORT_SPEC_SHORT,
        ANY,
    ];

    /// True if the name is a built-in property type
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Recognized keys of a schema definition
pub const SCHEMA_KEYS: &[&str] = &[
    "type",
    "required",
    "description",
    "default",
    "constraints",
    "key_schema",
    "entry_schema",
    "status",
    "metadata",
    "title",
];

/// A parsed property/input/attribute schema
#[derive(Debug, Clone)]
pub struct Schema {
    /// The property name this schema describes
    pub name: String,
    /// The declared type name
    pub type_name: String,
    /// Whether a value is required (defaults to true)
    pub required: bool,
    /// Human-readable description
    pub description: Option<String>,
    /// Human-readable title
    pub title: Option<String>,
    /// Default value used when the template assigns none
    pub default: Option<Value>,
    /// Lifecycle status, e.g. `experimental` or `deprecated`
    pub status: Option<String>,
    /// Schema metadata
    pub metadata: Option<Mapping>,
    /// Constraint clauses bound to this property
    pub constraints: Vec<Constraint>,
    /// Key schema for map-typed properties
    pub key_schema: Option<Mapping>,
    /// Entry schema for list- and map-typed properties
    pub entry_schema: Option<Mapping>,
}

impl Schema {
    /// Parse a schema definition mapping
    ///
    /// `datatype` overrides the declared `type` (used when the enclosing
    /// definition already fixed it). A missing `type` is an `InvalidSchema`
    /// collector entry; the schema is still produced with type `any` so
    /// parsing can continue.
    #[must_use]
    pub fn new(
        name: &str,
        definition: &Mapping,
        datatype: Option<&str>,
        collector: &ErrorCollector,
    ) -> Self {
        let type_name = match datatype.or_else(|| definition.get_str("type")) {
            Some(type_name) => type_name.to_string(),
            None => {
                collector.append(ToscaError::invalid_schema(format!(
                    "schema definition of \"{name}\" must have a \"type\" attribute"
                )));
                property_types::ANY.to_string()
            }
        };
        let constraints = definition
            .get_list("constraints")
            .map(|clauses| Constraint::from_list(name, &type_name, clauses, collector))
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            type_name,
            required: definition.get_bool("required").unwrap_or(true),
            description: definition.get_str("description").map(str::to_string),
            title: definition.get_str("title").map(str::to_string),
            default: definition.get("default").cloned(),
            status: definition.get_str("status").map(str::to_string),
            metadata: definition.get_map("metadata").cloned(),
            constraints,
            key_schema: definition.get_map("key_schema").cloned(),
            entry_schema: definition.get_map("entry_schema").cloned(),
        }
    }

    /// Parse a schema that must be a mapping, collecting a shape error otherwise
    #[must_use]
    pub fn from_value(name: &str, definition: &Value, collector: &ErrorCollector) -> Self {
        match definition.as_map() {
            Some(map) => Self::new(name, map, None, collector),
            None => {
                collector.append(ToscaError::invalid_schema(format!(
                    "schema definition of \"{name}\" ({definition}) must be a map, not a {}",
                    definition.type_name()
                )));
                Self::new(name, &Mapping::new(), None, collector)
            }
        }
    }

    /// Run every constraint against a value
    pub fn validate_constraints(&self, value: &Value, collector: &ErrorCollector) {
        for constraint in &self.constraints {
            constraint.validate(value, collector);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Value::from_yaml(&tree, None)
    }

    #[test]
    fn test_required_defaults_to_true() {
        let collector = ErrorCollector::new();
        collector.start();
        let def = parse("{type: integer}");
        let schema = Schema::new("p", def.as_map().unwrap(), None, &collector);
        assert!(schema.required);
        assert_eq!(schema.type_name, "integer");
        assert!(collector.is_empty());
    }

    #[test]
    fn test_full_definition() {
        let collector = ErrorCollector::new();
        collector.start();
        let def = parse(
            "{type: string, required: false, default: web, description: role,\n constraints: [{valid_values: [web, db]}]}",
        );
        let schema = Schema::new("role", def.as_map().unwrap(), None, &collector);
        assert!(!schema.required);
        assert_eq!(schema.default, Some(Value::String("web".into())));
        assert_eq!(schema.constraints.len(), 1);

        schema.validate_constraints(&Value::String("db".into()), &collector);
        assert!(collector.is_empty());
        schema.validate_constraints(&Value::String("cache".into()), &collector);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_missing_type_is_collected() {
        let collector = ErrorCollector::new();
        collector.start();
        let def = parse("{default: 1}");
        let schema = Schema::new("p", def.as_map().unwrap(), None, &collector);
        assert_eq!(schema.type_name, "any");
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_non_mapping_definition_is_collected() {
        let collector = ErrorCollector::new();
        collector.start();
        let schema = Schema::from_value("p", &parse("just a string"), &collector);
        assert_eq!(schema.type_name, "any");
        assert!(collector.caught());
    }

    #[test]
    fn test_entry_schema_is_kept() {
        let collector = ErrorCollector::new();
        collector.start();
        let def = parse("{type: list, entry_schema: {type: integer}}");
        let schema = Schema::new("ports", def.as_map().unwrap(), None, &collector);
        let entry = schema.entry_schema.expect("entry schema present");
        assert_eq!(entry.get_str("type"), Some("integer"));
    }
}
