//! Topology inputs and outputs

use crate::context::ParseContext;
use crate::types::data_type;
use tosca_core::error::ToscaError;
use tosca_core::schema::Schema;
use tosca_core::value::{Mapping, Value};

/// Recognized keys of an input definition
pub const INPUT_KEYS: &[&str] = &[
    "type",
    "description",
    "default",
    "constraints",
    "required",
    "status",
    "entry_schema",
    "key_schema",
    "metadata",
    "title",
];

/// Recognized keys of an output definition
pub const OUTPUT_KEYS: &[&str] = &["description", "value", "type", "metadata"];

/// A topology input parameter
#[derive(Debug, Clone)]
pub struct Input {
    /// The input's schema
    pub schema: Schema,
    /// The supplied or defaulted value, when one is known
    pub value: Option<Value>,
}

impl Input {
    /// Parse an input definition
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, definition: &Value) -> Self {
        if let Some(map) = definition.as_map() {
            for key in map.keys() {
                if !INPUT_KEYS.contains(&key.as_str()) {
                    ctx.collector
                        .append(ToscaError::unknown_field(format!("input \"{name}\""), key));
                }
            }
        }
        let schema = Schema::from_value(name, definition, &ctx.collector);
        Self {
            schema,
            value: None,
        }
    }

    /// The input's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// True when a value must be supplied
    #[must_use]
    pub fn required(&self) -> bool {
        self.schema.required
    }

    /// The declared default, if any
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.schema.default.as_ref()
    }

    /// Validate a supplied value and record it
    pub fn validate_value(&mut self, ctx: &ParseContext, value: Value, namespace_id: &str) {
        data_type::validate_with_schema(
            ctx,
            &self.schema,
            &value,
            &format!("input \"{}\"", self.name()),
            namespace_id,
        );
        self.value = Some(value);
    }
}

/// A topology output parameter
#[derive(Debug, Clone)]
pub struct Output {
    /// The output's name
    pub name: String,
    /// The declared value (usually an intrinsic expression)
    pub value: Option<Value>,
    /// Human-readable description
    pub description: Option<String>,
}

impl Output {
    /// Parse an output definition; `value` is required
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, definition: &Value) -> Self {
        let Some(map) = definition.as_map() else {
            ctx.collector.append(ToscaError::type_mismatch(
                format!("output \"{name}\""),
                "map",
            ));
            return Self {
                name: name.to_string(),
                value: None,
                description: None,
            };
        };
        for key in map.keys() {
            if !OUTPUT_KEYS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field(format!("output \"{name}\""), key));
            }
        }
        if !map.contains_key("value") {
            ctx.collector.append(ToscaError::missing_field(
                format!("output \"{name}\""),
                "value",
            ));
        }
        Self {
            name: name.to_string(),
            value: map.get("value").cloned(),
            description: map.get_str("description").map(str::to_string),
        }
    }
}
