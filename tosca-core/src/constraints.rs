//! Constraint clauses for properties, inputs and attributes
//!
//! Each constraint is bound to its property's type at construction, which is
//! when its configuration is checked (a bad constraint definition is an
//! `InvalidSchema` collector entry). Evaluation never evaluates intrinsic
//! function expressions: those satisfy every constraint vacuously.

use crate::collector::ErrorCollector;
use crate::error::ToscaError;
use crate::functions;
use crate::scalar_unit::{self, ScalarUnitKind};
use crate::schema::property_types;
use crate::value::{Mapping, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// The `in_range` sentinel that disables one side of the range
pub const UNBOUNDED: &str = "UNBOUNDED";

const COMPARABLE_TYPES: &[&str] = &[
    property_types::INTEGER,
    property_types::FLOAT,
    property_types::NUMBER,
    property_types::TIMESTAMP,
    property_types::SCALAR_UNIT_SIZE,
    property_types::SCALAR_UNIT_FREQUENCY,
    property_types::SCALAR_UNIT_TIME,
    property_types::SCALAR_UNIT_BITRATE,
];

const IN_RANGE_TYPES: &[&str] = &[
    property_types::INTEGER,
    property_types::FLOAT,
    property_types::NUMBER,
    property_types::TIMESTAMP,
    property_types::SCALAR_UNIT_SIZE,
    property_types::SCALAR_UNIT_FREQUENCY,
    property_types::SCALAR_UNIT_TIME,
    property_types::SCALAR_UNIT_BITRATE,
    property_types::RANGE,
    property_types::PORT_DEF,
    property_types::PORT_DEF_SHORT,
];

const LENGTH_TYPES: &[&str] = &[property_types::STRING];

const SIZE_TYPES: &[&str] = &[
    property_types::STRING,
    property_types::MAP,
    property_types::LIST,
];

/// A compiled JSON-Schema constraint argument
#[derive(Clone)]
pub struct CompiledJsonSchema {
    source: String,
    validator: Arc<jsonschema::Validator>,
}

impl fmt::Debug for CompiledJsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledJsonSchema")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum ConstraintKind {
    Equal {
        expected: Value,
    },
    GreaterThan {
        bound: Value,
    },
    GreaterOrEqual {
        bound: Value,
    },
    LessThan {
        bound: Value,
    },
    LessOrEqual {
        bound: Value,
    },
    InRange {
        /// `None` when the lower bound is UNBOUNDED
        min: Option<Value>,
        /// `None` when the upper bound is UNBOUNDED
        max: Option<Value>,
    },
    ValidValues {
        allowed: Vec<Value>,
    },
    Length {
        expected: usize,
    },
    MinLength {
        minimum: usize,
    },
    MaxLength {
        maximum: usize,
    },
    Pattern {
        pattern: String,
        regex: Regex,
    },
    JsonSchema(CompiledJsonSchema),
}

/// A single constraint clause bound to a property
#[derive(Debug, Clone)]
pub struct Constraint {
    property_name: String,
    property_type: String,
    key: &'static str,
    /// The constraint value as written, for diagnostics
    display: Value,
    kind: ConstraintKind,
}

impl Constraint {
    /// Build a constraint from its single-key clause mapping
    ///
    /// Invalid configurations are appended to the collector and yield `None`.
    pub fn new(
        property_name: &str,
        property_type: &str,
        clause: &Value,
        collector: &ErrorCollector,
    ) -> Option<Self> {
        let Some(map) = clause.as_map().filter(|map| map.len() == 1) else {
            collector.append(ToscaError::invalid_schema(format!(
                "invalid constraint {clause} (must be a map with one key)"
            )));
            return None;
        };
        let (key, argument) = map.iter().next()?;
        let (key, valid_types) = match key.as_str() {
            "equal" => ("equal", &[][..]),
            "greater_than" => ("greater_than", COMPARABLE_TYPES),
            "greater_or_equal" => ("greater_or_equal", COMPARABLE_TYPES),
            "less_than" => ("less_than", COMPARABLE_TYPES),
            "less_or_equal" => ("less_or_equal", COMPARABLE_TYPES),
            "in_range" => ("in_range", IN_RANGE_TYPES),
            "valid_values" => ("valid_values", &[][..]),
            "length" => ("length", LENGTH_TYPES),
            "min_length" => ("min_length", SIZE_TYPES),
            "max_length" => ("max_length", SIZE_TYPES),
            "pattern" => ("pattern", LENGTH_TYPES),
            "schema" => ("schema", &[property_types::STRING, property_types::ANY][..]),
            other => {
                collector.append(ToscaError::invalid_schema(format!(
                    "invalid constraint \"{other}\""
                )));
                return None;
            }
        };
        if !valid_types.is_empty() && !valid_types.contains(&property_type) {
            collector.append(ToscaError::invalid_schema(format!(
                "constraint \"{key}\" is not valid for data type \"{property_type}\""
            )));
            return None;
        }

        let scalar_kind = ScalarUnitKind::for_type_name(property_type);
        let kind = Self::build_kind(key, argument, scalar_kind, collector)?;
        Some(Self {
            property_name: property_name.to_string(),
            property_type: property_type.to_string(),
            key,
            display: argument.clone(),
            kind,
        })
    }

    /// Build every constraint in a `constraints:` list
    #[must_use]
    pub fn from_list(
        property_name: &str,
        property_type: &str,
        clauses: &[Value],
        collector: &ErrorCollector,
    ) -> Vec<Constraint> {
        clauses
            .iter()
            .filter_map(|clause| Constraint::new(property_name, property_type, clause, collector))
            .collect()
    }

    fn build_kind(
        key: &'static str,
        argument: &Value,
        scalar_kind: Option<ScalarUnitKind>,
        collector: &ErrorCollector,
    ) -> Option<ConstraintKind> {
        let invalid = |message: String| {
            collector.append(ToscaError::invalid_schema(message));
        };
        match key {
            "equal" => Some(ConstraintKind::Equal {
                expected: normalize_bound(argument, scalar_kind, collector)?,
            }),
            "greater_than" | "greater_or_equal" | "less_than" | "less_or_equal" => {
                let bound = normalize_bound(argument, scalar_kind, collector)?;
                if !is_comparable(&bound) {
                    invalid(format!("the property \"{key}\" expects comparable values"));
                    return None;
                }
                Some(match key {
                    "greater_than" => ConstraintKind::GreaterThan { bound },
                    "greater_or_equal" => ConstraintKind::GreaterOrEqual { bound },
                    "less_than" => ConstraintKind::LessThan { bound },
                    _ => ConstraintKind::LessOrEqual { bound },
                })
            }
            "in_range" => {
                let Some(items) = argument.as_list().filter(|items| items.len() == 2) else {
                    invalid("the property \"in_range\" expects a list of two values".to_string());
                    return None;
                };
                let mut bounds = Vec::with_capacity(2);
                for item in items {
                    if item.as_str() == Some(UNBOUNDED) {
                        bounds.push(None);
                        continue;
                    }
                    let bound = normalize_bound(item, scalar_kind, collector)?;
                    if !is_comparable(&bound) {
                        invalid(format!(
                            "the property \"in_range\" expects comparable values, not {item}"
                        ));
                        return None;
                    }
                    bounds.push(Some(bound));
                }
                let max = bounds.pop()?;
                let min = bounds.pop()?;
                Some(ConstraintKind::InRange { min, max })
            }
            "valid_values" => {
                let Some(items) = argument.as_list() else {
                    invalid("the property \"valid_values\" expects a list".to_string());
                    return None;
                };
                let allowed = items
                    .iter()
                    .map(|item| normalize_bound(item, scalar_kind, collector))
                    .collect::<Option<Vec<_>>>()?;
                Some(ConstraintKind::ValidValues { allowed })
            }
            "length" | "min_length" | "max_length" => {
                let Some(count) = argument.as_i64().filter(|count| *count >= 0) else {
                    invalid(format!("the property \"{key}\" expects an integer"));
                    return None;
                };
                let count = count as usize;
                Some(match key {
                    "length" => ConstraintKind::Length { expected: count },
                    "min_length" => ConstraintKind::MinLength { minimum: count },
                    _ => ConstraintKind::MaxLength { maximum: count },
                })
            }
            "pattern" => {
                let Some(pattern) = argument.as_str() else {
                    invalid("the property \"pattern\" expects a string".to_string());
                    return None;
                };
                match Regex::new(pattern) {
                    Ok(regex) => Some(ConstraintKind::Pattern {
                        pattern: pattern.to_string(),
                        regex,
                    }),
                    Err(err) => {
                        invalid(format!("invalid pattern \"{pattern}\": {err}"));
                        None
                    }
                }
            }
            "schema" => {
                let Some(source) = argument.as_str() else {
                    invalid("the \"schema\" constraint expects a string".to_string());
                    return None;
                };
                let document: serde_json::Value = match serde_json::from_str(source) {
                    Ok(document) => document,
                    Err(err) => {
                        invalid(format!("\"schema\" constraint is not valid JSON: {err}"));
                        return None;
                    }
                };
                match jsonschema::validator_for(&document) {
                    Ok(validator) => Some(ConstraintKind::JsonSchema(CompiledJsonSchema {
                        source: source.to_string(),
                        validator: Arc::new(validator),
                    })),
                    Err(err) => {
                        invalid(format!("\"schema\" constraint is not a valid JSON schema: {err}"));
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// The constraint's key name, e.g. `greater_than`
    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Validate a value, appending a `Validation` error on failure
    ///
    /// Intrinsic function expressions pass vacuously; scalar-unit values are
    /// normalized to the family's base unit before comparison.
    pub fn validate(&self, value: &Value, collector: &ErrorCollector) {
        if functions::is_function(value) {
            return;
        }
        let normalized;
        let value = if let Some(kind) = ScalarUnitKind::for_type_name(&self.property_type) {
            match scalar_unit::normalized_value(kind, value) {
                Ok(number) => {
                    normalized = Value::Float(number);
                    &normalized
                }
                Err(err) => {
                    collector.append(err);
                    return;
                }
            }
        } else {
            value
        };
        if !self.is_valid(value) {
            collector.append(ToscaError::validation(self.error_message(value)));
        }
    }

    /// Test a value without touching the collector
    ///
    /// Used by node_filter matching, where failure means "not a match"
    /// rather than an error. Function expressions match vacuously;
    /// unparseable scalar-unit values do not match.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        if functions::is_function(value) {
            return true;
        }
        if let Some(kind) = ScalarUnitKind::for_type_name(&self.property_type) {
            return match scalar_unit::normalized_value(kind, value) {
                Ok(number) => self.is_valid(&Value::Float(number)),
                Err(_) => false,
            };
        }
        self.is_valid(value)
    }

    fn is_valid(&self, value: &Value) -> bool {
        match &self.kind {
            ConstraintKind::Equal { expected } => value == expected,
            ConstraintKind::GreaterThan { bound } => {
                self.compare(value, bound) == Some(Ordering::Greater)
            }
            ConstraintKind::GreaterOrEqual { bound } => matches!(
                self.compare(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ConstraintKind::LessThan { bound } => self.compare(value, bound) == Some(Ordering::Less),
            ConstraintKind::LessOrEqual { bound } => matches!(
                self.compare(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ConstraintKind::InRange { min, max } => {
                // a range-typed value checks both of its ends
                let (low, high) = match value.as_list() {
                    Some([low, high]) => (low, high),
                    _ => (value, value),
                };
                if let Some(min) = min {
                    if !matches!(
                        self.compare(low, min),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) {
                        return false;
                    }
                }
                if let Some(max) = max {
                    if !matches!(
                        self.compare(high, max),
                        Some(Ordering::Less | Ordering::Equal)
                    ) {
                        return false;
                    }
                }
                true
            }
            ConstraintKind::ValidValues { allowed } => match value.as_list() {
                Some(items) => items.iter().all(|item| allowed.contains(item)),
                None => allowed.contains(value),
            },
            ConstraintKind::Length { expected } => value.length() == Some(*expected),
            ConstraintKind::MinLength { minimum } => {
                value.length().is_some_and(|len| len >= *minimum)
            }
            ConstraintKind::MaxLength { maximum } => {
                value.length().is_some_and(|len| len <= *maximum)
            }
            ConstraintKind::Pattern { regex, .. } => match value.as_str() {
                // a full match, not merely a prefix
                Some(text) => regex
                    .find(text)
                    .is_some_and(|found| found.start() == 0 && found.end() == text.len()),
                None => false,
            },
            ConstraintKind::JsonSchema(compiled) => {
                let instance = if self.property_type == property_types::ANY {
                    value.to_json()
                } else {
                    match value.as_str().map(serde_yaml::from_str::<serde_yaml::Value>) {
                        Some(Ok(parsed)) => Value::from_yaml(&parsed, None).to_json(),
                        _ => return false,
                    }
                };
                compiled.validator.is_valid(&instance)
            }
        }
    }

    fn compare(&self, value: &Value, bound: &Value) -> Option<Ordering> {
        if self.property_type == property_types::TIMESTAMP {
            let value = chrono::DateTime::parse_from_rfc3339(value.as_str()?).ok()?;
            let bound = chrono::DateTime::parse_from_rfc3339(bound.as_str()?).ok()?;
            return Some(value.cmp(&bound));
        }
        value.compare(bound)
    }

    fn error_message(&self, value: &Value) -> String {
        format!(
            "the value \"{value}\" of property \"{}\" violates constraint \"{}: {}\"",
            self.property_name, self.key, self.display
        )
    }
}

/// Build a constraint from an already-split key and argument
///
/// Used by node_filter condition clauses, where the property type is not
/// known up front.
#[must_use]
pub fn condition_constraint(
    property_name: &str,
    property_type: Option<&str>,
    key: &str,
    argument: &Value,
    collector: &ErrorCollector,
) -> Option<Constraint> {
    let mut clause = Mapping::new();
    clause.insert(key.to_string(), argument.clone());
    Constraint::new(
        property_name,
        property_type.unwrap_or(property_types::ANY),
        &Value::Map(clause),
        collector,
    )
}

fn is_comparable(value: &Value) -> bool {
    matches!(
        value,
        Value::Integer(_) | Value::Float(_) | Value::String(_) | Value::Timestamp(_)
    )
}

/// Normalize a constraint bound at construction time
///
/// For scalar-unit property types the written form (`"2 GB"`) is converted
/// to the base-unit number once, so evaluation compares plain numbers.
fn normalize_bound(
    value: &Value,
    scalar_kind: Option<ScalarUnitKind>,
    collector: &ErrorCollector,
) -> Option<Value> {
    match scalar_kind {
        Some(kind) => match scalar_unit::normalized_value(kind, value) {
            Ok(number) => Some(Value::Float(number)),
            Err(err) => {
                collector.append(err);
                None
            }
        },
        None => Some(value.clone()),
    }
}
