//! Relationship-type helpers

use crate::context::ParseContext;
use crate::types::entity_type::EntityType;
use tosca_core::value::Value;

impl EntityType {
    /// Capability types this relationship may target
    ///
    /// Inherited from the nearest ancestor that declares them when the
    /// type itself does not.
    #[must_use]
    pub fn valid_target_types(&self, ctx: &ParseContext) -> Vec<String> {
        match self.get_value(ctx, "valid_target_types", None, true, false, false) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParserConfig;
    use crate::context::ParseContext;
    use crate::types::entity_type::{EntityType, TypeKind};

    #[test]
    fn test_hosted_on_targets_container() {
        let ctx = ParseContext::new(ParserConfig::default());
        let hosted_on = EntityType::resolve(
            &ctx,
            TypeKind::Relationship,
            "tosca.relationships.HostedOn",
            "",
        )
        .expect("built-in");
        assert_eq!(
            hosted_on.valid_target_types(&ctx),
            vec!["tosca.capabilities.Container"]
        );
    }

    #[test]
    fn test_routes_to_inherits_connects_to_targets() {
        let ctx = ParseContext::new(ParserConfig::default());
        let routes_to = EntityType::resolve(
            &ctx,
            TypeKind::Relationship,
            "tosca.relationships.RoutesTo",
            "",
        )
        .expect("built-in");
        assert_eq!(
            routes_to.valid_target_types(&ctx),
            vec!["tosca.capabilities.Endpoint"]
        );
        assert!(routes_to.is_derived_from(&ctx, "tosca.relationships.ConnectsTo"));
    }

    #[test]
    fn test_root_relationship_has_no_target_bound() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Relationship, "tosca.relationships.Root", "")
                .expect("built-in");
        assert!(root.valid_target_types(&ctx).is_empty());
    }
}
