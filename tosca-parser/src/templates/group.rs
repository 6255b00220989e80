//! Group templates

use crate::context::ParseContext;
use crate::templates::entity_template::{EntityTemplate, TemplateKind};
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// A named group of node templates
#[derive(Debug, Clone)]
pub struct Group {
    /// The underlying typed template
    pub template: EntityTemplate,
    /// Member node template names
    pub members: Vec<String>,
}

impl Group {
    /// Instantiate a group template
    ///
    /// Member lists must be non-empty and free of repeats; membership
    /// against the topology is checked by the topology itself.
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, group_tpl: &Mapping, namespace_id: &str) -> Self {
        let template = EntityTemplate::new(ctx, name, group_tpl, TemplateKind::Group, namespace_id);
        let members = match group_tpl.get("members") {
            None => Vec::new(),
            Some(Value::List(items)) => {
                let members: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                let mut unique = members.clone();
                unique.sort();
                unique.dedup();
                if members.is_empty() || unique.len() != members.len() {
                    ctx.collector.append(ToscaError::InvalidGroupTarget {
                        message: format!(
                            "member nodes {:?} of group \"{name}\" should be >= 1 and not repeated",
                            members
                        ),
                    });
                }
                members
            }
            Some(other) => {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("\"members\" of group \"{name}\" ({other})"),
                    "list",
                ));
                Vec::new()
            }
        };
        Self { template, members }
    }

    /// The group's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }
}
