//! Topology templates
//!
//! The collection of inputs, outputs, node templates, relationship
//! templates, groups, policies and workflows declared by one
//! `topology_template` section, with intrinsic-function expressions
//! shape-checked across the whole tree.

use crate::context::ParseContext;
use crate::substitution::SubstitutionMappings;
use crate::templates::group::Group;
use crate::templates::node_template::NodeTemplate;
use crate::templates::parameters::{Input, Output};
use crate::templates::policy::{Policy, PolicyTargets};
use crate::templates::relationship_template::RelationshipTemplate;
use crate::templates::workflow::Workflow;
use indexmap::IndexMap;
use tosca_core::error::ToscaError;
use tosca_core::functions;
use tosca_core::value::{Mapping, Value};

/// Recognized keys of a `topology_template` section
pub const TOPOLOGY_SECTIONS: &[&str] = &[
    "description",
    "inputs",
    "node_templates",
    "relationship_templates",
    "outputs",
    "groups",
    "substitution_mappings",
    "policies",
    "workflows",
];

/// A parsed topology
#[derive(Debug, Clone, Default)]
pub struct TopologyTemplate {
    /// Topology description
    pub description: Option<String>,
    /// Input parameters by name
    pub inputs: IndexMap<String, Input>,
    /// Output parameters by name
    pub outputs: IndexMap<String, Output>,
    /// Node templates by name
    pub node_templates: IndexMap<String, NodeTemplate>,
    /// Relationship templates declared in the document
    pub relationship_templates: IndexMap<String, RelationshipTemplate>,
    /// Relationship templates bound by requirement resolution
    pub relationships: Vec<RelationshipTemplate>,
    /// Groups by name
    pub groups: IndexMap<String, Group>,
    /// Policies in declaration order
    pub policies: Vec<Policy>,
    /// Workflows by name
    pub workflows: IndexMap<String, Workflow>,
    /// The topology's substitution mapping, when declared
    pub substitution_mappings: Option<SubstitutionMappings>,
    /// Namespace the topology's type references resolve in
    pub namespace_id: String,
}

impl TopologyTemplate {
    /// Parse a topology section
    ///
    /// `parsed_params` supplies input values; missing required inputs are
    /// collected.
    #[must_use]
    pub fn new(
        ctx: &ParseContext,
        tpl: &Mapping,
        namespace_id: &str,
        parsed_params: Option<&Mapping>,
    ) -> Self {
        for key in tpl.keys() {
            if !TOPOLOGY_SECTIONS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field("topology template", key));
            }
        }

        let mut topology = Self {
            description: tpl
                .get_str("description")
                .map(|description| description.trim_end().to_string()),
            namespace_id: namespace_id.to_string(),
            ..Self::default()
        };

        topology.parse_inputs(ctx, tpl, parsed_params);
        topology.parse_relationship_templates(ctx, tpl);
        topology.parse_node_templates(ctx, tpl);
        topology.parse_outputs(ctx, tpl);
        topology.parse_groups(ctx, tpl);
        topology.parse_policies(ctx, tpl);
        topology.parse_workflows(ctx, tpl);
        if let Some(mappings) = section_map(ctx, tpl, "substitution_mappings") {
            topology.substitution_mappings = Some(SubstitutionMappings::new(ctx, &mappings));
        }
        topology.validate_function_shapes(ctx);
        topology
    }

    fn parse_inputs(&mut self, ctx: &ParseContext, tpl: &Mapping, parsed_params: Option<&Mapping>) {
        let Some(inputs) = section_map(ctx, tpl, "inputs") else {
            return;
        };
        for (name, definition) in &inputs {
            let mut input = Input::new(ctx, name, definition);
            let supplied = parsed_params.and_then(|params| params.get(name)).cloned();
            match supplied {
                Some(value) => input.validate_value(ctx, value, &self.namespace_id),
                None => {
                    if let Some(default) = input.default().cloned() {
                        input.validate_value(ctx, default, &self.namespace_id);
                    } else if input.required() {
                        ctx.collector.append(ToscaError::MissingRequiredInput {
                            what: "topology template".into(),
                            input_name: name.clone(),
                        });
                    }
                }
            }
            self.inputs.insert(name.clone(), input);
        }
    }

    fn parse_node_templates(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(node_templates) = section_map(ctx, tpl, "node_templates") else {
            return;
        };
        for (name, node_tpl) in &node_templates {
            let Some(node_tpl) = node_tpl.as_map() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("node template \"{name}\""),
                    "map",
                ));
                continue;
            };
            let node = NodeTemplate::new(ctx, name, node_tpl, &self.namespace_id);
            node.validate(ctx);
            self.node_templates.insert(name.clone(), node);
        }
    }

    fn parse_relationship_templates(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(templates) = section_map(ctx, tpl, "relationship_templates") else {
            return;
        };
        for (name, body) in &templates {
            let Some(body) = body.as_map() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("relationship template \"{name}\""),
                    "map",
                ));
                continue;
            };
            let relationship = RelationshipTemplate::new(ctx, name, body, &self.namespace_id);
            relationship.template.validate(ctx);
            self.relationship_templates.insert(name.clone(), relationship);
        }
    }

    fn parse_outputs(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(outputs) = section_map(ctx, tpl, "outputs") else {
            return;
        };
        for (name, definition) in &outputs {
            self.outputs
                .insert(name.clone(), Output::new(ctx, name, definition));
        }
    }

    fn parse_groups(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(groups) = section_map(ctx, tpl, "groups") else {
            return;
        };
        for (name, group_tpl) in &groups {
            let Some(group_tpl) = group_tpl.as_map() else {
                ctx.collector
                    .append(ToscaError::type_mismatch(format!("group \"{name}\""), "map"));
                continue;
            };
            let group = Group::new(ctx, name, group_tpl, &self.namespace_id);
            for member in &group.members {
                if !self.node_templates.contains_key(member) && !groups.contains_key(member) {
                    ctx.collector.append(ToscaError::InvalidGroupTarget {
                        message: format!(
                            "target member \"{member}\" is not found in node_templates or groups"
                        ),
                    });
                }
            }
            self.groups.insert(name.clone(), group);
        }
    }

    fn parse_policies(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(policies) = tpl.get("policies") else {
            return;
        };
        let Some(policies) = policies.as_list() else {
            ctx.collector
                .append(ToscaError::type_mismatch("\"policies\"", "list"));
            return;
        };
        for entry in policies {
            let item = entry.as_map().filter(|item| item.len() == 1);
            let Some((name, policy_tpl)) = item.and_then(|item| item.iter().next()) else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("policy entry ({entry})"),
                    "single-key map",
                ));
                continue;
            };
            let Some(policy_tpl) = policy_tpl.as_map() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("policy \"{name}\""),
                    "map",
                ));
                continue;
            };
            // targets name groups first, then node templates
            let declared_targets: Vec<&str> = policy_tpl
                .get_list("targets")
                .map(|targets| targets.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let targets_type = if !declared_targets.is_empty()
                && declared_targets
                    .iter()
                    .all(|target| self.groups.contains_key(*target))
            {
                PolicyTargets::Groups
            } else {
                PolicyTargets::NodeTemplates
            };
            if targets_type == PolicyTargets::NodeTemplates {
                for target in &declared_targets {
                    if !self.node_templates.contains_key(*target)
                        && !self.groups.contains_key(*target)
                    {
                        ctx.collector.append(ToscaError::InvalidGroupTarget {
                            message: format!(
                                "policy \"{name}\" target \"{target}\" is not found in node_templates or groups"
                            ),
                        });
                    }
                }
            }
            self.policies.push(Policy::new(
                ctx,
                name,
                policy_tpl,
                targets_type,
                &self.namespace_id,
            ));
        }
    }

    fn parse_workflows(&mut self, ctx: &ParseContext, tpl: &Mapping) {
        let Some(workflows) = section_map(ctx, tpl, "workflows") else {
            return;
        };
        for (name, workflow_tpl) in &workflows {
            let Some(workflow_tpl) = workflow_tpl.as_map() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("workflow \"{name}\""),
                    "map",
                ));
                continue;
            };
            self.workflows
                .insert(name.clone(), Workflow::new(ctx, name, workflow_tpl));
        }
    }

    /// Shape-check every intrinsic call in properties, capability
    /// properties, interface inputs and outputs
    fn validate_function_shapes(&self, ctx: &ParseContext) {
        for node in self.node_templates.values() {
            for property in node.template.properties.values() {
                functions::validate_shape(
                    &property.value,
                    &format!("property \"{}\" of \"{}\"", property.name, node.name()),
                    &ctx.collector,
                );
            }
            for capability in node.template.capabilities.values() {
                for property in capability.properties.values() {
                    functions::validate_shape(
                        &property.value,
                        &format!(
                            "property \"{}\" of capability \"{}\" on \"{}\"",
                            property.name,
                            capability.name,
                            node.name()
                        ),
                        &ctx.collector,
                    );
                }
            }
            for operation in &node.template.interfaces {
                for (input_name, input_value) in &operation.inputs {
                    functions::validate_shape(
                        input_value,
                        &format!(
                            "input \"{input_name}\" of operation \"{}:{}\" on \"{}\"",
                            operation.interface_name,
                            operation.name,
                            node.name()
                        ),
                        &ctx.collector,
                    );
                }
            }
        }
        for output in self.outputs.values() {
            if let Some(value) = &output.value {
                functions::validate_shape(
                    value,
                    &format!("output \"{}\"", output.name),
                    &ctx.collector,
                );
            }
        }
    }

    /// Bound relationships whose source is the named node
    pub fn node_relationships<'a>(&'a self, node_name: &'a str) -> impl Iterator<Item = &'a RelationshipTemplate> + 'a {
        self.relationships
            .iter()
            .filter(move |relationship| relationship.source.as_deref() == Some(node_name))
    }

    /// Bound relationships targeting the named node
    pub fn inbound_relationships<'a>(
        &'a self,
        node_name: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipTemplate> + 'a {
        self.relationships
            .iter()
            .filter(move |relationship| relationship.target.as_deref() == Some(node_name))
    }

    /// The node type this topology exposes through substitution, if any
    #[must_use]
    pub fn exposed_node_type(&self) -> Option<&str> {
        self.substitution_mappings
            .as_ref()
            .and_then(|mappings| mappings.node_type.as_deref())
    }
}

/// Fetch a section that must be a mapping when present
fn section_map(ctx: &ParseContext, tpl: &Mapping, key: &str) -> Option<Mapping> {
    match tpl.get(key) {
        None => None,
        Some(Value::Map(section)) => Some(section.clone()),
        Some(Value::Null) => None,
        Some(_) => {
            ctx.collector
                .append(ToscaError::type_mismatch(format!("\"{key}\""), "map"));
            None
        }
    }
}
