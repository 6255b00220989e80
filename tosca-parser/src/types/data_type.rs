//! Value validation against named types
//!
//! Validates property and parameter values against built-in property types
//! and custom data types, recursing through entry schemas and complex data
//! type properties. Intrinsic function expressions are always accepted;
//! their evaluation is out of scope.

use crate::context::ParseContext;
use crate::types::entity_type::{EntityType, TypeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tosca_core::error::ToscaError;
use tosca_core::functions;
use tosca_core::scalar_unit::{ScalarUnit, ScalarUnitKind};
use tosca_core::schema::{property_types, Schema};
use tosca_core::value::{Mapping, Value};

/// TOSCA version strings: major.minor[.fix[.qualifier[-build]]]
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+(\.\d+(\.\w+(-\d+)?)?)?$").expect("version grammar is valid")
});

/// Validate a value against a type name
///
/// `namespace_id` is the namespace custom type names resolve in.
pub fn validate_value(
    ctx: &ParseContext,
    type_name: &str,
    value: &Value,
    what: &str,
    namespace_id: &str,
) {
    if functions::is_function(value) {
        return;
    }
    let mismatch = |expected: &str| {
        ctx.collector.append(ToscaError::type_mismatch(
            format!("{what} ({value})"),
            expected,
        ));
    };
    match type_name {
        property_types::ANY => {}
        property_types::STRING => {
            if value.as_str().is_none() {
                mismatch("string");
            }
        }
        property_types::INTEGER => {
            if value.as_i64().is_none() {
                mismatch("integer");
            }
        }
        property_types::BOOLEAN => {
            if value.as_bool().is_none() {
                mismatch("boolean");
            }
        }
        property_types::FLOAT | property_types::NUMBER => {
            if value.as_f64().is_none() {
                mismatch("number");
            }
        }
        property_types::TIMESTAMP => {
            let parses = value.as_str().is_some_and(|text| {
                chrono::DateTime::parse_from_rfc3339(text).is_ok()
                    || chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
            });
            if !parses {
                mismatch("timestamp");
            }
        }
        property_types::RANGE => validate_range(ctx, value),
        property_types::LIST => {
            if value.as_list().is_none() {
                mismatch("list");
            }
        }
        property_types::MAP => {
            if value.as_map().is_none() {
                mismatch("map");
            }
        }
        property_types::VERSION => {
            let valid = match value {
                Value::String(text) => VERSION_RE.is_match(text),
                Value::Integer(_) | Value::Float(_) => true,
                _ => false,
            };
            if !valid {
                mismatch("version");
            }
        }
        property_types::PORT_DEF | property_types::PORT_DEF_SHORT => {
            let valid = value.as_i64().is_some_and(|port| (1..=65535).contains(&port));
            if !valid {
                mismatch("port number in [1, 65535]");
            }
        }
        name => {
            if let Some(kind) = ScalarUnitKind::for_type_name(name) {
                if let Some(literal) = value.as_str() {
                    if let Err(err) = ScalarUnit::parse(kind, literal) {
                        ctx.collector.append(err);
                    }
                } else if value.as_f64().is_none() {
                    mismatch(name);
                }
                return;
            }
            validate_custom_type(ctx, name, value, what, namespace_id);
        }
    }
}

/// Validate a value against a schema: type, entry/key schemas, constraints
pub fn validate_with_schema(
    ctx: &ParseContext,
    schema: &Schema,
    value: &Value,
    what: &str,
    namespace_id: &str,
) {
    if functions::is_function(value) {
        return;
    }
    validate_value(ctx, &schema.type_name, value, what, namespace_id);

    if let Some(entry_schema) = &schema.entry_schema {
        let entry = Schema::new(&schema.name, entry_schema, None, &ctx.collector);
        match value {
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    validate_with_schema(
                        ctx,
                        &entry,
                        item,
                        &format!("{what}[{index}]"),
                        namespace_id,
                    );
                }
            }
            Value::Map(entries) => {
                for (key, item) in entries {
                    validate_with_schema(
                        ctx,
                        &entry,
                        item,
                        &format!("{what}[{key}]"),
                        namespace_id,
                    );
                }
            }
            _ => {}
        }
    }
    if let (Some(key_schema), Some(entries)) = (&schema.key_schema, value.as_map()) {
        let key_schema = Schema::new(&schema.name, key_schema, None, &ctx.collector);
        for key in entries.keys() {
            validate_with_schema(
                ctx,
                &key_schema,
                &Value::String(key.clone()),
                &format!("key \"{key}\" of {what}"),
                namespace_id,
            );
        }
    }
    schema.validate_constraints(value, &ctx.collector);
}

fn validate_range(ctx: &ParseContext, value: &Value) {
    let bounds = value.as_list().filter(|bounds| bounds.len() == 2);
    let Some(bounds) = bounds else {
        ctx.collector.append(ToscaError::RangeValue {
            what: value.to_string(),
            why: "not a list with 2 items".into(),
        });
        return;
    };
    let mut numeric = Vec::new();
    for bound in bounds {
        match bound {
            Value::Integer(number) => numeric.push(Some(*number)),
            Value::String(text) if text == "UNBOUNDED" => numeric.push(None),
            _ => {
                ctx.collector.append(ToscaError::RangeValue {
                    what: value.to_string(),
                    why: format!("bound {bound} is not an integer or UNBOUNDED"),
                });
                return;
            }
        }
    }
    if let (Some(Some(low)), Some(Some(high))) = (numeric.first(), numeric.last()) {
        if low > high {
            ctx.collector.append(ToscaError::RangeValue {
                what: value.to_string(),
                why: "lower bound exceeds upper bound".into(),
            });
        }
    }
}

/// Validate against a custom data type: either a refinement of a primitive
/// (the ancestor chain ends at a built-in type) or a complex type with its
/// own property definitions.
fn validate_custom_type(
    ctx: &ParseContext,
    type_name: &str,
    value: &Value,
    what: &str,
    namespace_id: &str,
) {
    let Some(datatype) = EntityType::lookup(ctx, TypeKind::Data, type_name, namespace_id) else {
        ctx.collector.append(ToscaError::missing_type(type_name));
        return;
    };

    // constraints declared anywhere along the chain apply
    let ancestors = datatype.ancestors(ctx);
    let mut primitive = None;
    for ancestor in &ancestors {
        for parent_name in ancestor.derived_from_names() {
            if property_types::is_builtin(&parent_name) {
                primitive = Some(parent_name);
            }
        }
    }

    if let Some(primitive) = primitive {
        validate_value(ctx, &primitive, value, what, namespace_id);
        for ancestor in &ancestors {
            if let Some(clauses) = ancestor.defs().get_list("constraints") {
                let constraints = tosca_core::constraints::Constraint::from_list(
                    what,
                    &primitive,
                    clauses,
                    &ctx.collector,
                );
                for constraint in &constraints {
                    constraint.validate(value, &ctx.collector);
                }
            }
        }
        return;
    }

    let Some(entries) = value.as_map() else {
        ctx.collector.append(ToscaError::type_mismatch(
            format!("{what} ({value})"),
            format!("map (data type \"{type_name}\")"),
        ));
        return;
    };

    let properties = datatype.properties_def(ctx);
    let additional = datatype
        .defs()
        .get_map("metadata")
        .and_then(|metadata| metadata.get_bool("additionalProperties"))
        .unwrap_or(false);
    for (name, entry) in entries {
        match properties.get(name) {
            Some(def) => validate_with_schema(
                ctx,
                &def.schema,
                entry,
                &format!("{what}.{name}"),
                &def.namespace_id,
            ),
            None if additional => {}
            None => ctx.collector.append(ToscaError::unknown_field(
                format!("{what} (data type \"{type_name}\")"),
                name,
            )),
        }
    }
    let missing: Vec<&str> = properties
        .iter()
        .filter(|(name, def)| {
            def.schema.required && def.schema.default.is_none() && !entries.contains_key(*name)
        })
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        ctx.collector.append(ToscaError::missing_field(
            format!("{what} (data type \"{type_name}\")"),
            missing.join(", "),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn parse(yaml: &str) -> Value {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Value::from_yaml(&tree, None)
    }

    fn check(type_name: &str, value: &str) -> Vec<String> {
        let ctx = ParseContext::new(ParserConfig::default());
        validate_value(&ctx, type_name, &parse(value), "p", "");
        ctx.collector.report()
    }

    #[test]
    fn test_primitives() {
        assert!(check("integer", "3").is_empty());
        assert!(!check("integer", "\"3x\"").is_empty());
        assert!(check("boolean", "true").is_empty());
        assert!(check("float", "1.5").is_empty());
        assert!(check("string", "hello").is_empty());
        assert!(!check("string", "[1]").is_empty());
    }

    #[test]
    fn test_version_strings() {
        assert!(check("version", "\"1.0\"").is_empty());
        assert!(check("version", "\"1.2.3.beta-4\"").is_empty());
        assert!(!check("version", "\"not-a-version\"").is_empty());
    }

    #[test]
    fn test_range_values() {
        assert!(check("range", "[1, 4]").is_empty());
        assert!(check("range", "[1, UNBOUNDED]").is_empty());
        assert!(!check("range", "[4, 1]").is_empty());
        assert!(!check("range", "[1]").is_empty());
    }

    #[test]
    fn test_timestamps() {
        assert!(check("timestamp", "\"2026-08-01T10:00:00+00:00\"").is_empty());
        assert!(check("timestamp", "\"2026-08-01\"").is_empty());
        assert!(!check("timestamp", "\"yesterday\"").is_empty());
    }

    #[test]
    fn test_scalar_units() {
        assert!(check("scalar-unit.size", "\"4 GB\"").is_empty());
        assert!(!check("scalar-unit.size", "\"4 parsecs\"").is_empty());
    }

    #[test]
    fn test_builtin_credential_datatype() {
        assert!(check("tosca.datatypes.Credential", "{token: secret}").is_empty());
        let report = check("tosca.datatypes.Credential", "{token: secret, unknown_key: 1}");
        assert_eq!(report.len(), 1);
        assert!(report[0].contains("unknown_key"));
    }

    #[test]
    fn test_primitive_refinement_applies_constraints() {
        // PortDef derives from integer with an in_range constraint
        assert!(check("tosca.datatypes.network.PortDef", "8080").is_empty());
        assert!(!check("tosca.datatypes.network.PortDef", "70000").is_empty());
        assert!(!check("tosca.datatypes.network.PortDef", "0").is_empty());
    }

    #[test]
    fn test_entry_schema_recursion() {
        let ctx = ParseContext::new(ParserConfig::default());
        let schema_def = parse("{type: list, entry_schema: {type: integer}}");
        let schema = Schema::new("ids", schema_def.as_map().unwrap(), None, &ctx.collector);
        validate_with_schema(&ctx, &schema, &parse("[1, 2, 3]"), "ids", "");
        assert!(ctx.collector.is_empty());
        validate_with_schema(&ctx, &schema, &parse("[1, oops]"), "ids", "");
        assert_eq!(ctx.collector.len(), 1);
        assert!(ctx.collector.report()[0].contains("ids[1]"));
    }

    #[test]
    fn test_functions_always_pass() {
        assert!(check("integer", "{get_input: cpus}").is_empty());
        assert!(check("tosca.datatypes.Credential", "{get_property: [SELF, cred]}").is_empty());
    }
}
