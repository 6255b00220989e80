//! Policy templates

use crate::context::ParseContext;
use crate::templates::entity_template::{EntityTemplate, TemplateKind};
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// What a policy's targets resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyTargets {
    /// Targets name groups
    Groups,
    /// Targets name node templates
    NodeTemplates,
}

/// A policy applied to groups or node templates
#[derive(Debug, Clone)]
pub struct Policy {
    /// The underlying typed template
    pub template: EntityTemplate,
    /// Target names as declared
    pub targets: Vec<String>,
    /// Whether the targets resolved to groups or node templates
    pub targets_type: PolicyTargets,
}

impl Policy {
    /// Instantiate a policy; a policy without a type is an error
    #[must_use]
    pub fn new(
        ctx: &ParseContext,
        name: &str,
        policy_tpl: &Mapping,
        targets_type: PolicyTargets,
        namespace_id: &str,
    ) -> Self {
        if policy_tpl.get_str("type").is_none() {
            ctx.collector.append(ToscaError::validation(format!(
                "policy definition of \"{name}\" must have a \"type\" attribute"
            )));
        }
        let template =
            EntityTemplate::new(ctx, name, policy_tpl, TemplateKind::Policy, namespace_id);
        let targets = match policy_tpl.get("targets") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            template,
            targets,
            targets_type,
        }
    }

    /// The policy's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }
}
