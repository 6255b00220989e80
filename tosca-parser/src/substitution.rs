//! Substitution mappings
//!
//! A topology may expose itself as a node of a given type: inputs map to
//! that type's properties, and its capabilities and requirements map back
//! to the substituting node. The core records and wires the mapping;
//! recursive instantiation belongs to the consumer.

use crate::context::ParseContext;
use tosca_core::error::ToscaError;
use tosca_core::value::Mapping;

/// Recognized keys of a substitution mapping
pub const SUBSTITUTION_KEYS: &[&str] = &[
    "node_type",
    "node",
    "substitution_filter",
    "properties",
    "attributes",
    "capabilities",
    "requirements",
    "interfaces",
];

/// A topology's declaration that it implements a node type
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMappings {
    /// The node type the topology implements
    pub node_type: Option<String>,
    /// An existing node template the mapping refers to, when given
    pub node: Option<String>,
    /// Property-to-input mappings
    pub properties: Mapping,
    /// Attribute mappings
    pub attributes: Mapping,
    /// Capability mappings
    pub capabilities: Mapping,
    /// Requirement mappings
    pub requirements: Mapping,
    /// Interface mappings
    pub interfaces: Mapping,
}

impl SubstitutionMappings {
    /// Parse a `substitution_mappings` section
    #[must_use]
    pub fn new(ctx: &ParseContext, definition: &Mapping) -> Self {
        for key in definition.keys() {
            if !SUBSTITUTION_KEYS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field("substitution_mappings", key));
            }
        }
        let node_type = definition.get_str("node_type").map(str::to_string);
        let node = definition.get_str("node").map(str::to_string);
        if node_type.is_none() && node.is_none() {
            ctx.collector.append(ToscaError::missing_field(
                "substitution_mappings",
                "node_type",
            ));
        }
        Self {
            node_type,
            node,
            properties: definition.get_map("properties").cloned().unwrap_or_default(),
            attributes: definition.get_map("attributes").cloned().unwrap_or_default(),
            capabilities: definition
                .get_map("capabilities")
                .cloned()
                .unwrap_or_default(),
            requirements: definition
                .get_map("requirements")
                .cloned()
                .unwrap_or_default(),
            interfaces: definition.get_map("interfaces").cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use tosca_core::value::Value;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn test_node_type_required() {
        let ctx = ParseContext::new(ParserConfig::default());
        SubstitutionMappings::new(&ctx, &parse_map("properties: {}"));
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("node_type")));
    }

    #[test]
    fn test_mappings_recorded() {
        let ctx = ParseContext::new(ParserConfig::default());
        let mappings = SubstitutionMappings::new(
            &ctx,
            &parse_map(
                "node_type: example.Database\nproperties:\n  port: [db_port]\ncapabilities:\n  database_endpoint: [db, database_endpoint]\n",
            ),
        );
        assert_eq!(mappings.node_type.as_deref(), Some("example.Database"));
        assert!(mappings.properties.contains_key("port"));
        assert!(mappings.capabilities.contains_key("database_endpoint"));
        assert!(ctx.collector.is_empty());
    }
}
