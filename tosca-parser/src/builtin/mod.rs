//! Embedded built-in TOSCA type definitions
//!
//! The built-in profile ships with the parser and is loaded once per
//! process. Built-in types live in the empty namespace: their global name
//! is the bare type name.

use once_cell::sync::Lazy;
use tosca_core::value::{Mapping, Value};

/// The per-kind sections a definitions document may carry
pub const TYPE_DEFINITION_SECTIONS: &[&str] = &[
    "node_types",
    "data_types",
    "artifact_types",
    "group_types",
    "relationship_types",
    "capability_types",
    "interface_types",
    "policy_types",
    "types",
];

const TOSCA_DEFINITIONS_1_3: &str = include_str!("tosca_definitions_1_3.yaml");

/// Every built-in type definition, flattened across sections
static TOSCA_DEF: Lazy<Mapping> = Lazy::new(|| {
    let tree: serde_yaml::Value = serde_yaml::from_str(TOSCA_DEFINITIONS_1_3)
        .expect("embedded TOSCA definitions are valid YAML");
    let document = match Value::from_yaml(&tree, None) {
        Value::Map(map) => map,
        _ => panic!("embedded TOSCA definitions are not a mapping"),
    };
    let mut flattened = Mapping::new();
    for section in TYPE_DEFINITION_SECTIONS {
        if let Some(types) = document.get_map(section) {
            for (name, def) in types {
                flattened.insert(name.clone(), def.clone());
            }
        }
    }
    flattened
});

/// Look up a built-in type definition by name
#[must_use]
pub fn find(name: &str) -> Option<&'static Mapping> {
    TOSCA_DEF.get_map(name)
}

/// True if a built-in type of this name exists
#[must_use]
pub fn contains(name: &str) -> bool {
    TOSCA_DEF.contains_key(name)
}

/// The full flattened definition table
#[must_use]
pub fn all() -> &'static Mapping {
    &TOSCA_DEF
}
