//! Node templates
//!
//! Beyond the shared template machinery, a node template collects its
//! artifacts (merging type-declared and template-declared, enforcing
//! required-artifact shapes), normalizes its requirements and matches
//! node_filters.

use crate::context::ParseContext;
use crate::templates::artifact::Artifact;
use crate::templates::entity_template::{EntityTemplate, TemplateKind};
use crate::types::node_type::{
    merge_requirement_definition, validate_requirement_keys,
};
use indexmap::IndexMap;
use tosca_core::constraints::condition_constraint;
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// A normalized requirement of one node template
#[derive(Debug, Clone)]
pub struct NodeRequirement {
    /// Requirement name
    pub name: String,
    /// The merged definition (template assignment over type definition)
    pub definition: Mapping,
    /// True when the template itself assigned this requirement
    pub from_template: bool,
    /// True when the template's assignment named the target node
    pub node_on_template: bool,
}

/// A node template in a topology
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    /// The underlying typed template
    pub template: EntityTemplate,
    /// Artifacts merged from the type chain and the template
    pub artifacts: IndexMap<String, Artifact>,
    /// Requirements that could not be satisfied, by name
    pub missing_requirements: IndexMap<String, Mapping>,
    /// Type-declared artifact shapes (no `file`) the template must satisfy
    pub required_shapes: IndexMap<String, Mapping>,
    /// Key of the nested topology substituted for this node, when wired
    pub substitution: Option<String>,
}

impl NodeTemplate {
    /// Instantiate a node template
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, entity_tpl: &Mapping, namespace_id: &str) -> Self {
        ctx.collector
            .set_near(format!(" in node template \"{name}\""));
        let template = EntityTemplate::new(ctx, name, entity_tpl, TemplateKind::Node, namespace_id);
        let mut node = Self {
            template,
            artifacts: IndexMap::new(),
            missing_requirements: IndexMap::new(),
            required_shapes: IndexMap::new(),
            substitution: None,
        };
        node.collect_artifacts(ctx);
        ctx.collector.set_near("");
        node
    }

    /// The template's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// The template's type name
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.template.type_name()
    }

    /// True if the node's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.template.is_derived_from(ctx, type_name)
    }

    /// Requirements assigned on the template merged with those declared by
    /// the type, template entries first
    #[must_use]
    pub fn all_requirements(&self, ctx: &ParseContext) -> Vec<NodeRequirement> {
        let mut requirements = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        let Some(type_definition) = &self.template.type_definition else {
            return requirements;
        };
        let type_requirements = type_definition.requirement_definitions(ctx);

        if let Some(Value::List(assigned)) = self.template.entity_tpl.get("requirements") {
            for entry in assigned {
                let entry_map = entry.as_map().filter(|map| map.len() == 1);
                let Some((name, value)) = entry_map.and_then(|map| map.iter().next()) else {
                    continue; // shape errors are reported by validate()
                };
                seen.push(name.clone());
                let type_def = type_requirements
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| type_definition.requirement_definition(ctx, name));
                let (definition, node_on_template) = match value {
                    Value::Map(assignment) => {
                        let merged = merge_requirement_definition(&type_def, assignment);
                        (merged, assignment.contains_key("node"))
                    }
                    Value::String(node) => {
                        let mut merged = type_def;
                        merged.insert("node".into(), Value::String(node.clone()));
                        (merged, true)
                    }
                    _ => (type_def, false),
                };
                requirements.push(NodeRequirement {
                    name: name.clone(),
                    definition,
                    from_template: true,
                    node_on_template,
                });
            }
        }

        for (name, definition) in type_requirements {
            if !seen.contains(&name) {
                requirements.push(NodeRequirement {
                    name,
                    definition,
                    from_template: false,
                    node_on_template: false,
                });
            }
        }
        requirements
    }

    /// Validate template structure: capabilities, requirements shape,
    /// occurrences, node_filters, artifacts and property values
    pub fn validate(&self, ctx: &ParseContext) {
        ctx.collector
            .set_near(format!(" in node template \"{}\"", self.name()));
        self.template.validate(ctx);
        self.validate_requirements(ctx);
        self.validate_required_artifacts(ctx);
        ctx.collector.set_near("");
    }

    fn validate_requirements(&self, ctx: &ParseContext) {
        let Some(requirements) = self.template.entity_tpl.get("requirements") else {
            return;
        };
        let Some(items) = requirements.as_list() else {
            ctx.collector.append(ToscaError::type_mismatch(
                format!("\"requirements\" of template \"{}\"", self.name()),
                "list",
            ));
            return;
        };
        for item in items {
            let Some(entry) = item.as_map() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("a \"requirement\" in template \"{}\"", self.name()),
                    "map",
                ));
                continue;
            };
            if entry.len() != 1 {
                ctx.collector.append(ToscaError::invalid_value(format!(
                    "requirement {item} in template \"{}\"",
                    self.name()
                )));
                continue;
            }
            let (name, value) = entry.iter().next().expect("one entry");
            match value {
                Value::Map(assignment) => {
                    validate_requirement_keys(
                        assignment,
                        &format!("template \"{}\"", self.name()),
                        ctx,
                    );
                    if let Some(occurrences) = assignment.get("occurrences") {
                        self.validate_occurrences(ctx, occurrences);
                    }
                    if let Some(node_filter) = assignment.get("node_filter") {
                        self.validate_node_filter(ctx, node_filter);
                    }
                }
                Value::String(_) => {}
                other => ctx.collector.append(ToscaError::validation(format!(
                    "bad value \"{other}\" for requirement \"{name}\" in template \"{}\"",
                    self.name()
                ))),
            }
        }
    }

    fn validate_occurrences(&self, ctx: &ParseContext, occurrences: &Value) {
        let bounds = occurrences.as_list().filter(|bounds| bounds.len() == 2);
        let Some(bounds) = bounds else {
            ctx.collector.append(ToscaError::InvalidOccurrences {
                what: occurrences.to_string(),
                why: "not a list with 2 items".into(),
            });
            return;
        };
        let min = bounds[0].as_i64();
        let Some(min) = min else {
            ctx.collector.append(ToscaError::InvalidOccurrences {
                what: occurrences.to_string(),
                why: "minimum is not an integer".into(),
            });
            return;
        };
        match &bounds[1] {
            Value::String(text) if text == "UNBOUNDED" => {}
            Value::Integer(max) => {
                if !(0 <= min && min <= *max) || *max == 0 {
                    ctx.collector.append(ToscaError::InvalidOccurrences {
                        what: occurrences.to_string(),
                        why: "invalid range".into(),
                    });
                }
            }
            other => ctx.collector.append(ToscaError::InvalidOccurrences {
                what: occurrences.to_string(),
                why: format!("maximum {other} is not an integer or UNBOUNDED"),
            }),
        }
    }

    fn validate_node_filter(&self, ctx: &ParseContext, node_filter: &Value) {
        let what = format!("nodefilter on template \"{}\"", self.name());
        let Some(filter) = node_filter.as_map() else {
            ctx.collector
                .append(ToscaError::type_mismatch(what, "map"));
            return;
        };
        if let Some(properties) = filter.get("properties") {
            self.validate_filter_conditions(ctx, properties, &what);
        }
        if let Some(capabilities) = filter.get("capabilities") {
            let Some(items) = capabilities.as_list() else {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("\"capabilities\" of {what}"),
                    "list",
                ));
                return;
            };
            for item in items {
                let entry = item.as_map().filter(|entry| entry.len() == 1);
                let Some((cap_name, cap_filter)) = entry.and_then(|entry| entry.iter().next())
                else {
                    ctx.collector.append(ToscaError::validation(format!(
                        "invalid {what}: only one capability name per list item"
                    )));
                    continue;
                };
                if let Value::Map(cap_filter) = cap_filter {
                    if let Some(properties) = cap_filter.get("properties") {
                        self.validate_filter_conditions(
                            ctx,
                            properties,
                            &format!("capability \"{cap_name}\" on {what}"),
                        );
                    }
                }
            }
        }
    }

    fn validate_filter_conditions(&self, ctx: &ParseContext, properties: &Value, what: &str) {
        let Some(conditions) = properties.as_list() else {
            ctx.collector.append(ToscaError::type_mismatch(
                format!("\"properties\" of {what}"),
                "list",
            ));
            return;
        };
        for condition in conditions {
            match condition.as_map() {
                Some(entry) if entry.len() == 1 => {}
                Some(_) => ctx.collector.append(ToscaError::validation(format!(
                    "invalid {what}: only one property allowed per filter condition"
                ))),
                None => ctx.collector.append(ToscaError::type_mismatch(
                    format!("filter in {what}"),
                    "map",
                )),
            }
        }
    }

    /// Match this node against a requirement's node_filter
    #[must_use]
    pub fn matches_node_filter(&self, ctx: &ParseContext, node_filter: &Mapping) -> bool {
        if let Some(properties) = node_filter.get("properties") {
            if !self.matches_property_conditions(ctx, properties, |name| {
                self.template.property_value(name)
            }) {
                return false;
            }
        }
        let Some(capabilities) = node_filter.get("capabilities") else {
            return node_filter.contains_key("properties");
        };
        let Some(filters) = capabilities.as_list() else {
            return false;
        };
        for filter in filters {
            let entry = filter.as_map().and_then(|entry| entry.iter().next());
            let Some((cap_name, cap_filter)) = entry else {
                return false;
            };
            let Some(capability) = self.template.capability(cap_name) else {
                return false;
            };
            let Some(cap_filter) = cap_filter.as_map() else {
                return false;
            };
            if let Some(properties) = cap_filter.get("properties") {
                if !self.matches_property_conditions(ctx, properties, |name| {
                    capability.property_value(name)
                }) {
                    return false;
                }
            }
        }
        true
    }

    fn matches_property_conditions<'a>(
        &'a self,
        ctx: &ParseContext,
        properties: &Value,
        lookup: impl Fn(&str) -> Option<&'a Value>,
    ) -> bool {
        let Some(conditions) = properties.as_list() else {
            return false;
        };
        for condition in conditions {
            let entry = condition.as_map().and_then(|entry| entry.iter().next());
            let Some((name, expected)) = entry else {
                return false;
            };
            let Some(actual) = lookup(name) else {
                return false;
            };
            match expected {
                Value::Map(clauses) => {
                    // opaque expressions cannot be filtered on
                    if clauses.contains_key("eval") || clauses.contains_key("q") {
                        continue;
                    }
                    let property_type = self
                        .template
                        .properties
                        .get(name)
                        .map(|property| property.type_name().to_string());
                    for (op, argument) in clauses {
                        ctx.collector.pause();
                        let constraint = condition_constraint(
                            name,
                            property_type.as_deref(),
                            op,
                            argument,
                            &ctx.collector,
                        );
                        ctx.collector.resume();
                        if let Some(constraint) = constraint {
                            if !constraint.matches(actual) {
                                return false;
                            }
                        }
                    }
                }
                simple => {
                    if actual != simple {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Merge type-declared artifacts (most-base first) with the template's
    fn collect_artifacts(&mut self, ctx: &ParseContext) {
        let Some(type_definition) = &self.template.type_definition else {
            return;
        };
        let mut required_shapes: IndexMap<String, Mapping> = IndexMap::new();
        for ancestor in type_definition.ancestors(ctx).iter().rev() {
            let Some(Value::Map(declared)) = ancestor.defs().get("artifacts") else {
                continue;
            };
            for (name, definition) in declared {
                match definition {
                    Value::Map(map) if !map.contains_key("file") => {
                        // a required-artifact shape, not an artifact
                        required_shapes.insert(name.clone(), map.clone());
                    }
                    other => {
                        self.artifacts.insert(
                            name.clone(),
                            Artifact::new(ctx, name, other, ancestor.source_namespace_id()),
                        );
                    }
                }
            }
        }
        if let Some(declared) = self.template.entity_tpl.get_map("artifacts") {
            for (name, definition) in declared {
                self.artifacts.insert(
                    name.clone(),
                    Artifact::new(ctx, name, definition, &self.template.namespace_id),
                );
            }
        }
        self.required_shapes = required_shapes;
    }

    fn validate_required_artifacts(&self, ctx: &ParseContext) {
        for (name, shape) in &self.required_shapes {
            let type_name = shape.get_str("type");
            match self.artifacts.get(name) {
                None => {
                    if shape.get_bool("required").unwrap_or(false) {
                        ctx.collector.append(ToscaError::validation(format!(
                            "required artifact \"{name}\" of type \"{}\" not defined on node \"{}\"",
                            type_name.unwrap_or("unknown"),
                            self.name()
                        )));
                    }
                }
                Some(artifact) => {
                    if let Some(type_name) = type_name {
                        if !artifact.is_derived_from(ctx, type_name) {
                            ctx.collector.append(ToscaError::validation(format!(
                                "artifact \"{name}\" on node \"{}\" must be derived from type \"{type_name}\"",
                                self.name()
                            )));
                        }
                    }
                }
            }
        }
    }
}
