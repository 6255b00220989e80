//! Relationship templates
//!
//! A relationship template links a source node template to a capability on
//! a target node template. It is either declared in the document's
//! `relationship_templates` section or synthesized when a requirement is
//! resolved.

use crate::context::ParseContext;
use crate::templates::capability::Capability;
use crate::templates::entity_template::{EntityTemplate, TemplateKind};
use crate::templates::node_template::NodeTemplate;
use crate::types::entity_type::{EntityType, TypeKind};
use tosca_core::value::{Mapping, Value};

/// A typed source-to-capability binding
#[derive(Debug, Clone)]
pub struct RelationshipTemplate {
    /// The underlying typed template
    pub template: EntityTemplate,
    /// Name of the requirement this relationship satisfies
    pub requirement_name: Option<String>,
    /// Source node template name
    pub source: Option<String>,
    /// Target node template name
    pub target: Option<String>,
    /// The capability on the target the relationship binds to
    pub capability: Option<String>,
    /// `default_for` marker from the document
    pub default_for: Option<String>,
}

impl RelationshipTemplate {
    /// Instantiate from a relationship body (a `{type: ...}` mapping)
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, body: &Mapping, namespace_id: &str) -> Self {
        let template =
            EntityTemplate::new(ctx, name, body, TemplateKind::Relationship, namespace_id);
        let default_for = body.get_str("default_for").map(str::to_string);
        Self {
            template,
            requirement_name: None,
            source: None,
            target: None,
            capability: None,
            default_for,
        }
    }

    /// The relationship's type name
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.template.type_name()
    }

    /// True if the relationship's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.template.is_derived_from(ctx, type_name)
    }

    /// The capabilities on a candidate target this relationship can bind to
    ///
    /// `capability_name` matches a capability's symbolic name first, then a
    /// capability type name (resolved in `capability_namespace` when the
    /// requirement definition carried a namespace tag). The relationship
    /// type's `valid_target_types` filter the result; with no name given
    /// and several candidates, the generic `feature` capability wins.
    #[must_use]
    pub fn matching_capabilities<'a>(
        &self,
        ctx: &ParseContext,
        target: &'a NodeTemplate,
        capability_name: Option<&str>,
        capability_namespace: Option<&str>,
    ) -> Vec<&'a Capability> {
        let capabilities = &target.template.capabilities;
        let mut candidates: Vec<&Capability> = match capability_name {
            Some(name) => match capabilities.get(name) {
                Some(capability) => vec![capability],
                None => {
                    // not a symbolic name: try it as a capability type
                    let namespace =
                        capability_namespace.unwrap_or(&self.template.namespace_id);
                    let type_name = EntityType::lookup(ctx, TypeKind::Capability, name, namespace)
                        .map_or_else(|| name.to_string(), |t| t.global_name().to_string());
                    capabilities
                        .values()
                        .filter(|capability| capability.is_derived_from(ctx, &type_name))
                        .collect()
                }
            },
            None => capabilities.values().collect(),
        };

        let valid_targets = self
            .template
            .type_definition
            .as_ref()
            .map(|def| def.valid_target_types(ctx))
            .unwrap_or_default();
        if !valid_targets.is_empty() {
            candidates.retain(|capability| {
                valid_targets
                    .iter()
                    .any(|target_type| capability.is_derived_from(ctx, target_type))
            });
        } else if capability_name.is_none() && candidates.len() > 1 {
            if let Some(feature) = capabilities.get("feature") {
                return vec![feature];
            }
        }
        candidates
    }

    /// True when this template is the document-declared default connection
    #[must_use]
    pub fn is_default_connection(&self) -> bool {
        self.default_for.as_deref() == Some("SELF")
    }
}
