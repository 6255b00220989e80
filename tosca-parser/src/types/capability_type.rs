//! Capability declarations on node types

use crate::context::ParseContext;
use crate::types::entity_type::{EntityType, TypeKind, NAMESPACE_KEY};
use indexmap::IndexMap;
use tosca_core::value::{Mapping, Value};

/// A capability as declared on a node type
///
/// Binds the symbolic name used on the node type to the resolved
/// capability type plus any inline refinements from the declaration.
#[derive(Debug, Clone)]
pub struct CapabilityTypeDef {
    /// Symbolic name of the capability on the node type
    pub name: String,
    /// The node type declaring it
    pub node_type: String,
    /// The resolved capability type, when the declaration's type resolves
    pub type_def: Option<EntityType>,
    /// The raw declaration entry (type, inline properties, valid_source_types)
    pub declared: Mapping,
}

impl CapabilityTypeDef {
    /// Build from a capability declaration entry
    #[must_use]
    pub fn new(
        ctx: &ParseContext,
        name: &str,
        declaration: &Mapping,
        node_type: &str,
        namespace_id: &str,
    ) -> Self {
        let namespace = declaration.get_str(NAMESPACE_KEY).unwrap_or(namespace_id);
        let type_def = declaration
            .get_str("type")
            .and_then(|type_name| EntityType::resolve(ctx, TypeKind::Capability, type_name, namespace));
        Self {
            name: name.to_string(),
            node_type: node_type.to_string(),
            type_def,
            declared: declaration.clone(),
        }
    }

    /// The capability type's name
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_def.as_ref().map(EntityType::type_name)
    }

    /// True if the capability's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.type_def
            .as_ref()
            .is_some_and(|def| def.is_derived_from(ctx, type_name))
    }

    /// Effective property definitions of the capability type
    #[must_use]
    pub fn properties_def(
        &self,
        ctx: &ParseContext,
    ) -> IndexMap<String, crate::types::entity_type::PropertyDef> {
        self.type_def
            .as_ref()
            .map(|def| def.properties_def(ctx))
            .unwrap_or_default()
    }

    /// Node types allowed to fulfill requirements against this capability
    #[must_use]
    pub fn valid_source_types(&self) -> Vec<String> {
        match self.declared.get("valid_source_types") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl EntityType {
    /// Every capability declared on this type or inherited from an ancestor
    #[must_use]
    pub fn capabilities_def(&self, ctx: &ParseContext) -> IndexMap<String, CapabilityTypeDef> {
        let mut capabilities = IndexMap::new();
        let Some(Value::Map(declared)) = self.get_value(ctx, "capabilities", None, true, true, true)
        else {
            return capabilities;
        };
        for (name, declaration) in &declared {
            if name.starts_with('!') || name.starts_with('_') {
                continue;
            }
            let Some(declaration) = declaration.as_map() else {
                continue;
            };
            capabilities.insert(
                name.clone(),
                CapabilityTypeDef::new(ctx, name, declaration, self.type_name(), self.source_namespace_id()),
            );
        }
        capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    #[test]
    fn test_compute_capabilities_inherit_feature() {
        let ctx = ParseContext::new(ParserConfig::default());
        let compute =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Compute", "").expect("built-in");
        let capabilities = compute.capabilities_def(&ctx);
        assert!(capabilities.contains_key("host"));
        assert!(capabilities.contains_key("os"));
        // inherited from tosca.nodes.Root
        assert!(capabilities.contains_key("feature"));

        let host = &capabilities["host"];
        assert_eq!(host.type_name(), Some("tosca.capabilities.Compute"));
        assert!(host.is_derived_from(&ctx, "tosca.capabilities.Container"));
        assert_eq!(host.valid_source_types(), vec!["tosca.nodes.SoftwareComponent"]);
    }

    #[test]
    fn test_capability_properties_come_from_its_type() {
        let ctx = ParseContext::new(ParserConfig::default());
        let compute =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Compute", "").expect("built-in");
        let capabilities = compute.capabilities_def(&ctx);
        let properties = capabilities["host"].properties_def(&ctx);
        assert!(properties.contains_key("num_cpus"));
        assert!(properties.contains_key("mem_size"));
    }
}
