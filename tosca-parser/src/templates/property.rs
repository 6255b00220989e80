//! Materialized properties
//!
//! A property binds a template's assigned value (or the type's default) to
//! its schema. Validation checks the value's type, entry schemas and
//! constraints; intrinsic function values pass untouched.

use crate::context::ParseContext;
use crate::types::data_type;
use tosca_core::schema::Schema;
use tosca_core::value::Value;

/// A property with its resolved value and schema
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name
    pub name: String,
    /// The assigned value, or the schema default
    pub value: Value,
    /// The property's schema
    pub schema: Schema,
    /// Namespace the schema's type names resolve in
    pub namespace_id: String,
}

impl Property {
    /// Create a property from a value and its schema
    #[must_use]
    pub fn new(name: &str, value: Value, schema: Schema, namespace_id: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            schema,
            namespace_id: namespace_id.to_string(),
        }
    }

    /// The property's declared type name
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.schema.type_name
    }

    /// Validate the value against the schema's type and constraints
    pub fn validate(&self, ctx: &ParseContext) {
        data_type::validate_with_schema(
            ctx,
            &self.schema,
            &self.value,
            &format!("property \"{}\"", self.name),
            &self.namespace_id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use tosca_core::collector::ErrorCollector;

    fn schema(yaml: &str) -> Schema {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        let def = Value::from_yaml(&tree, None);
        let collector = ErrorCollector::new();
        collector.start();
        Schema::from_value("p", &def, &collector)
    }

    #[test]
    fn test_constraint_violation_reported() {
        let ctx = ParseContext::new(ParserConfig::default());
        let property = Property::new(
            "p",
            Value::Integer(0),
            schema("{type: integer, constraints: [{greater_than: 0}]}"),
            "",
        );
        property.validate(&ctx);
        let report = ctx.collector.report();
        assert_eq!(report.len(), 1);
        assert!(report[0].contains("greater_than"));
    }

    #[test]
    fn test_valid_value_passes() {
        let ctx = ParseContext::new(ParserConfig::default());
        let property = Property::new(
            "p",
            Value::Integer(4),
            schema("{type: integer, constraints: [{greater_than: 0}]}"),
            "",
        );
        property.validate(&ctx);
        assert!(ctx.collector.is_empty());
    }
}
