//! Intrinsic-function expressions
//!
//! Values like `{get_input: cpus}` are opaque to the core: their shape is
//! recorded and checked, but they are never evaluated. Constraints treat
//! them as vacuously satisfied; evaluation belongs to the orchestrator.

use crate::collector::ErrorCollector;
use crate::error::ToscaError;
use crate::value::Value;

/// Names of the TOSCA intrinsic functions
pub const FUNCTION_NAMES: &[&str] = &[
    "get_input",
    "get_property",
    "get_attribute",
    "get_operation_output",
    "get_nodes_of_type",
    "get_artifact",
    "concat",
    "join",
    "token",
];

/// The recorded shape of an intrinsic call
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall<'a> {
    /// Function name, e.g. `get_input`
    pub name: &'a str,
    /// The raw argument value (scalar or list)
    pub args: &'a Value,
}

/// Recognize an intrinsic call: a single-key mapping keyed by a function name
#[must_use]
pub fn function_call(value: &Value) -> Option<FunctionCall<'_>> {
    let map = value.as_map()?;
    if map.len() != 1 {
        return None;
    }
    let (name, args) = map.iter().next()?;
    if FUNCTION_NAMES.contains(&name.as_str()) {
        Some(FunctionCall { name, args })
    } else {
        None
    }
}

/// True if the value is an intrinsic call
#[must_use]
pub fn is_function(value: &Value) -> bool {
    function_call(value).is_some()
}

/// Shape-check every intrinsic call nested in `value`
///
/// `what` names the property or section holding the value; malformed calls
/// are appended to the collector.
pub fn validate_shape(value: &Value, what: &str, collector: &ErrorCollector) {
    if let Some(call) = function_call(value) {
        validate_call(&call, what, collector);
        return;
    }
    match value {
        Value::List(items) => {
            for item in items {
                validate_shape(item, what, collector);
            }
        }
        Value::Map(map) => {
            for entry in map.values() {
                validate_shape(entry, what, collector);
            }
        }
        _ => {}
    }
}

fn validate_call(call: &FunctionCall<'_>, what: &str, collector: &ErrorCollector) {
    match call.name {
        "get_input" => {
            // a name, or a name followed by nested keys/indexes
            let well_formed = match call.args {
                Value::String(_) => true,
                Value::List(items) => {
                    !items.is_empty() && items[0].as_str().is_some()
                }
                _ => false,
            };
            if !well_formed {
                collector.append(ToscaError::validation(format!(
                    "get_input in {what} expects an input name"
                )));
            }
        }
        "get_property" | "get_attribute" | "get_operation_output" => {
            let well_formed = matches!(call.args, Value::List(items) if items.len() >= 2);
            if !well_formed {
                collector.append(ToscaError::validation(format!(
                    "{} in {what} expects [entity, name, ...]",
                    call.name
                )));
            }
        }
        "get_nodes_of_type" => {
            if call.args.as_str().is_none() {
                collector.append(ToscaError::validation(format!(
                    "get_nodes_of_type in {what} expects a type name"
                )));
            }
        }
        "get_artifact" => {
            let well_formed = matches!(call.args, Value::List(items) if items.len() >= 2);
            if !well_formed {
                collector.append(ToscaError::validation(format!(
                    "get_artifact in {what} expects [entity, artifact_name, ...]"
                )));
            }
        }
        // concat/join/token take argument lists that may nest further calls
        _ => {
            match call.args {
                Value::List(items) => {
                    for item in items {
                        validate_shape(item, what, collector);
                    }
                }
                _ => collector.append(ToscaError::validation(format!(
                    "{} in {what} expects a list of arguments",
                    call.name
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn parse(yaml: &str) -> Value {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Value::from_yaml(&tree, None)
    }

    #[test]
    fn test_recognizes_functions() {
        assert!(is_function(&parse("{get_input: cpus}")));
        assert!(is_function(&parse("{get_property: [SELF, port]}")));
        assert!(!is_function(&parse("{type: string}")));
        assert!(!is_function(&parse("{get_input: a, extra: b}")));
        assert!(!is_function(&parse("plain string")));
    }

    #[test]
    fn test_shape_errors_collected() {
        let collector = ErrorCollector::new();
        collector.start();
        validate_shape(&parse("{get_property: just_a_string}"), "property \"p\"", &collector);
        assert_eq!(collector.len(), 1);
        assert!(collector.report()[0].contains("get_property"));
    }

    #[test]
    fn test_nested_calls_are_checked() {
        let collector = ErrorCollector::new();
        collector.start();
        let value = parse("{concat: [\"http://\", {get_attribute: [server]}]}");
        validate_shape(&value, "output \"url\"", &collector);
        assert_eq!(collector.len(), 1);
        assert!(collector.report()[0].contains("get_attribute"));
    }

    #[test]
    fn test_valid_shapes_pass() {
        let collector = ErrorCollector::new();
        collector.start();
        validate_shape(&parse("{get_input: cpus}"), "p", &collector);
        validate_shape(&parse("{get_property: [SELF, db, port]}"), "p", &collector);
        validate_shape(&parse("{concat: [a, b]}"), "p", &collector);
        assert!(collector.is_empty());
    }
}
