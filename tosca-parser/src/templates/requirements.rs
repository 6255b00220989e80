//! Requirement resolution
//!
//! Matches every node's requirements to target node templates and binds a
//! relationship template for each satisfied requirement. A requirement
//! moves through `declared -> matched -> bound`, or ends `missing` (no
//! target and a non-zero minimum) or `skipped` (optional and unsatisfied).

use crate::context::ParseContext;
use crate::resolver::ImportResolver;
use crate::templates::node_template::{NodeRequirement, NodeTemplate};
use crate::templates::relationship_template::RelationshipTemplate;
use crate::topology::TopologyTemplate;
use crate::types::entity_type::{EntityType, TypeKind};
use tosca_core::error::ToscaError;
use tosca_core::functions;
use tosca_core::value::{Mapping, Value};
use tracing::{debug, warn};

enum Outcome {
    Bound(RelationshipTemplate),
    Missing,
    Skipped,
}

/// Resolve every requirement of every node template in the topology
///
/// `outer` is the enclosing topology when `topology` came from an imported
/// nested document; its templates are candidate targets too. Bound
/// relationships land in `topology.relationships`; unsatisfied mandatory
/// requirements are recorded per node.
pub fn resolve_requirements(
    ctx: &ParseContext,
    topology: &mut TopologyTemplate,
    outer: Option<&TopologyTemplate>,
    resolver: Option<&dyn ImportResolver>,
) {
    let mut bound = Vec::new();
    let mut missing: Vec<(String, String, Mapping)> = Vec::new();

    for (node_name, node) in &topology.node_templates {
        ctx.collector
            .set_near(format!(" in node template \"{node_name}\""));
        for requirement in node.all_requirements(ctx) {
            match resolve_requirement(ctx, topology, outer, resolver, node, &requirement) {
                Outcome::Bound(relationship) => bound.push(relationship),
                Outcome::Missing => missing.push((
                    node_name.clone(),
                    requirement.name.clone(),
                    requirement.definition.clone(),
                )),
                Outcome::Skipped => {}
            }
        }
    }
    ctx.collector.set_near("");

    topology.relationships = bound;
    for (node_name, requirement_name, definition) in missing {
        if let Some(node) = topology.node_templates.get_mut(&node_name) {
            node.missing_requirements
                .insert(requirement_name, definition);
        }
    }

    // bound relationships carry properties and interface inputs of their
    // own; their intrinsic calls get the same shape check
    for relationship in &topology.relationships {
        let name = relationship.template.name.as_str();
        for property in relationship.template.properties.values() {
            functions::validate_shape(
                &property.value,
                &format!("property \"{}\" of relationship \"{name}\"", property.name),
                &ctx.collector,
            );
        }
        for operation in &relationship.template.interfaces {
            for (input_name, input_value) in &operation.inputs {
                functions::validate_shape(
                    input_value,
                    &format!(
                        "input \"{input_name}\" of operation \"{}:{}\" on relationship \"{name}\"",
                        operation.interface_name, operation.name
                    ),
                    &ctx.collector,
                );
            }
        }
    }
}

fn resolve_requirement(
    ctx: &ParseContext,
    topology: &TopologyTemplate,
    outer: Option<&TopologyTemplate>,
    resolver: Option<&dyn ImportResolver>,
    source: &NodeTemplate,
    requirement: &NodeRequirement,
) -> Outcome {
    let definition = &requirement.definition;
    let min_occurrences = definition
        .get_list("occurrences")
        .and_then(|bounds| bounds.first())
        .and_then(Value::as_i64)
        .unwrap_or(1);

    let node_ref = definition.get_str("node");
    let named_template =
        node_ref.and_then(|name| find_node_template(topology, outer, name));

    // a requirement declared only on the type resolves solely through a
    // named template or the resolver's matcher
    if !requirement.from_template && named_template.is_none() {
        if let Some(resolver) = resolver {
            // trial construction: errors from a relationship that may never
            // bind must not pollute the report
            ctx.collector.pause();
            let trial = build_relationship(ctx, topology, source, requirement);
            ctx.collector.resume();
            if let Some(mut relationship) = trial {
                if let Some((target_name, capability)) =
                    resolver.find_matching_node(&relationship, &requirement.name, definition)
                {
                    relationship.target = Some(target_name);
                    relationship.capability = Some(capability);
                    return Outcome::Bound(relationship);
                }
            }
        }
        return if min_occurrences == 0 {
            Outcome::Skipped
        } else {
            Outcome::Missing
        };
    }

    let Some(mut relationship) = build_relationship(ctx, topology, source, requirement) else {
        return Outcome::Skipped;
    };

    let capability = definition.get_str("capability");
    let capability_namespace = definition.get_str("!namespace-capability");
    let node_filter = definition.get_map("node_filter");

    let mut matched: Option<(String, Option<String>)> = None;
    if let Some(target) = named_template {
        let capabilities =
            relationship.matching_capabilities(ctx, target, capability, capability_namespace);
        match capabilities.first() {
            Some(found) => {
                matched = Some((target.name().to_string(), Some(found.name.clone())));
            }
            None => {
                let message = match capability {
                    Some(capability) => format!(
                        "no matching capability \"{capability}\" found on target node \"{}\" for requirement \"{}\" of node \"{}\"",
                        target.name(), requirement.name, source.name()
                    ),
                    None => format!(
                        "no capability with a matching target type found on target node \"{}\" for requirement \"{}\" of node \"{}\"",
                        target.name(), requirement.name, source.name()
                    ),
                };
                ctx.collector.append(ToscaError::validation(message));
                return Outcome::Skipped;
            }
        }
    } else {
        let has_target_bound = relationship
            .template
            .type_definition
            .as_ref()
            .is_some_and(|def| !def.valid_target_types(ctx).is_empty());
        if node_ref.is_none() && capability.is_none() && node_filter.is_none() && !has_target_bound
        {
            if min_occurrences != 0 {
                ctx.collector.append(ToscaError::validation(format!(
                    "requirement \"{}\" of node \"{}\" must specify a node_filter, a node or a capability",
                    requirement.name,
                    source.name()
                )));
            }
            return Outcome::Skipped;
        }
        matched = find_matching_node(
            ctx,
            topology,
            &relationship,
            requirement,
            node_ref,
            definition.get_str("!namespace-node"),
            capability,
            capability_namespace,
            node_filter,
            source,
        );
    }

    if matched.is_none() {
        if let Some(resolver) = resolver {
            if let Some((target_name, found_capability)) =
                resolver.find_matching_node(&relationship, &requirement.name, definition)
            {
                matched = Some((target_name, Some(found_capability)));
            }
        }
    }

    match matched {
        Some((target_name, found_capability)) => {
            relationship.target = Some(target_name);
            relationship.capability = found_capability;
            Outcome::Bound(relationship)
        }
        None => {
            if min_occurrences == 0 {
                return Outcome::Skipped;
            }
            let namespace = definition
                .get_str("!namespace-node")
                .unwrap_or(&source.template.namespace_id);
            let message = match node_ref {
                Some(node_name) => {
                    // "node" naming a type that simply has no instance is
                    // not an error unless the template itself asked for it
                    if !requirement.node_on_template
                        && EntityType::lookup(ctx, TypeKind::Node, node_name, namespace).is_some()
                    {
                        None
                    } else {
                        Some(format!(
                            "could not find target template \"{node_name}\" for requirement \"{}\"",
                            requirement.name
                        ))
                    }
                }
                None => Some(format!(
                    "no matching target template found for requirement \"{}\"",
                    requirement.name
                )),
            };
            if let Some(message) = message {
                if source.template.has_directive("default") {
                    warn!(
                        "{message} on default node template \"{}\"",
                        source.name()
                    );
                } else {
                    ctx.collector.append(ToscaError::validation(message));
                }
            }
            Outcome::Missing
        }
    }
}

/// Build the relationship template a requirement will bind
///
/// A `relationship` naming a declared relationship template binds to (a
/// copy of) it; a type name or mapping synthesizes a fresh template.
fn build_relationship(
    ctx: &ParseContext,
    topology: &TopologyTemplate,
    source: &NodeTemplate,
    requirement: &NodeRequirement,
) -> Option<RelationshipTemplate> {
    let definition = &requirement.definition;
    let namespace = definition
        .get_str("!namespace-relationship")
        .unwrap_or(&source.template.namespace_id);

    let body = match definition.get("relationship") {
        Some(Value::Map(body)) if body.contains_key("type") => body.clone(),
        Some(Value::Map(_)) => {
            ctx.collector.append(ToscaError::missing_field(
                format!(
                    "\"relationship\" used in template \"{}\"",
                    source.name()
                ),
                "type",
            ));
            return None;
        }
        Some(Value::String(reference)) => {
            if let Some(declared) = topology.relationship_templates.get(reference) {
                let mut relationship = declared.clone();
                relationship.requirement_name = Some(requirement.name.clone());
                relationship.source = Some(source.name().to_string());
                return Some(relationship);
            }
            if EntityType::lookup(ctx, TypeKind::Relationship, reference, namespace).is_some() {
                let mut body = Mapping::new();
                body.insert("type".into(), Value::String(reference.clone()));
                body
            } else {
                ctx.collector.append(ToscaError::validation(format!(
                    "relationship template \"{reference}\" was not found for requirement \"{}\" of node \"{}\"",
                    requirement.name,
                    source.name()
                )));
                return None;
            }
        }
        _ => {
            let mut body = Mapping::new();
            body.insert(
                "type".into(),
                Value::String(crate::types::node_type::ROOT_RELATIONSHIP.into()),
            );
            body
        }
    };

    let mut relationship = RelationshipTemplate::new(ctx, &requirement.name, &body, namespace);
    relationship.requirement_name = Some(requirement.name.clone());
    relationship.source = Some(source.name().to_string());
    Some(relationship)
}

/// Find a requirement's target by name, preferring the outer topology for
/// nested documents when the local match is only a `default` template
fn find_node_template<'a>(
    topology: &'a TopologyTemplate,
    outer: Option<&'a TopologyTemplate>,
    name: &str,
) -> Option<&'a NodeTemplate> {
    let local = topology.node_templates.get(name);
    let Some(outer) = outer else {
        return local;
    };
    match local {
        Some(node) if !node.template.has_directive("default") => Some(node),
        Some(node) => outer.node_templates.get(name).or(Some(node)),
        None => outer.node_templates.get(name),
    }
}

/// Enumerate candidate targets and pick one
///
/// Candidates must satisfy the node-type bound, offer a matching
/// capability, and pass the node_filter. `default`-directive templates are
/// demoted; ambiguity among non-default candidates is an error when a
/// node_filter drove the match, otherwise the first candidate wins.
#[allow(clippy::too_many_arguments)]
fn find_matching_node(
    ctx: &ParseContext,
    topology: &TopologyTemplate,
    relationship: &RelationshipTemplate,
    requirement: &NodeRequirement,
    node_type: Option<&str>,
    node_namespace: Option<&str>,
    capability: Option<&str>,
    capability_namespace: Option<&str>,
    node_filter: Option<&Mapping>,
    source: &NodeTemplate,
) -> Option<(String, Option<String>)> {
    // resolve a namespaced type bound to its global name once
    let type_bound = node_type.map(|name| {
        let namespace = node_namespace.unwrap_or(&source.template.namespace_id);
        EntityType::lookup(ctx, TypeKind::Node, name, namespace)
            .map_or_else(|| name.to_string(), |t| t.global_name().to_string())
    });
    let has_target_bound = relationship
        .template
        .type_definition
        .as_ref()
        .is_some_and(|def| !def.valid_target_types(ctx).is_empty());

    let mut best: Option<(&NodeTemplate, Option<String>)> = None;
    for candidate in topology.node_templates.values() {
        if let Some(bound) = &type_bound {
            if !candidate.is_derived_from(ctx, bound) {
                continue;
            }
        }
        let mut found: Option<(&NodeTemplate, Option<String>)> = None;
        if capability.is_some() || has_target_bound {
            let capabilities = relationship.matching_capabilities(
                ctx,
                candidate,
                capability,
                capability_namespace,
            );
            match capabilities.first() {
                Some(matched) => found = Some((candidate, Some(matched.name.clone()))),
                None => continue,
            }
        }
        if let Some(filter) = node_filter {
            if !candidate.matches_node_filter(ctx, filter) {
                continue;
            }
            if found.is_none() {
                let capabilities = relationship.matching_capabilities(
                    ctx,
                    candidate,
                    capability,
                    capability_namespace,
                );
                found = Some((
                    candidate,
                    capabilities.first().map(|matched| matched.name.clone()),
                ));
            }
        }
        let Some(found) = found else {
            continue;
        };
        match &best {
            None => best = Some(found),
            Some((current, _)) => {
                if found.0.template.has_directive("default") {
                    // stick with what we have
                    continue;
                }
                if current.template.has_directive("default") {
                    best = Some(found);
                    continue;
                }
                if node_filter.is_some() || ctx.config.strict {
                    ctx.collector.append(ToscaError::validation(format!(
                        "requirement \"{}\" of node \"{}\" is ambiguous, targets more than one template: \"{}\" and \"{}\"",
                        requirement.name,
                        source.name(),
                        current.name(),
                        found.0.name()
                    )));
                    return None;
                }
                // without a node_filter the first candidate wins
                debug!(
                    requirement = %requirement.name,
                    kept = %current.name(),
                    ignored = %found.0.name(),
                    "multiple requirement targets; keeping the first"
                );
            }
        }
    }
    best.map(|(node, capability)| (node.name().to_string(), capability))
}
