//! Node-type requirement definitions
//!
//! Requirement declarations use several shorthand grammars; everything is
//! normalized here into one mapping per requirement with the relationship
//! key always present as a `{type: ...}` mapping.

use crate::context::ParseContext;
use crate::types::entity_type::EntityType;
use indexmap::IndexMap;
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// The default relationship type bound when a requirement declares none
pub const ROOT_RELATIONSHIP: &str = "tosca.relationships.Root";

/// Recognized keys of a requirement definition or assignment
pub const REQUIREMENT_KEYS: &[&str] = &[
    "node",
    "capability",
    "relationship",
    "occurrences",
    "node_filter",
    "description",
    "metadata",
    "title",
];

impl EntityType {
    /// Every requirement declared on this type or an ancestor, normalized
    ///
    /// Requirements with the same name merge along the chain: the
    /// most-derived declaration wins on scalars, missing keys are
    /// inherited, metadata maps merge.
    #[must_use]
    pub fn requirement_definitions(&self, ctx: &ParseContext) -> IndexMap<String, Mapping> {
        let mut definitions: IndexMap<String, Mapping> = IndexMap::new();
        let Some(raw) = self.get_value(ctx, "requirements", None, true, true, true) else {
            return definitions;
        };
        let Some(items) = raw.as_list() else {
            ctx.collector.append(ToscaError::invalid_type_definition(
                self.type_name(),
                "\"requirements\" field value must be a list",
            ));
            return definitions;
        };
        for item in items {
            let entry = item.as_map().filter(|entry| entry.len() == 1);
            let Some((name, value)) = entry.and_then(|entry| entry.iter().next()) else {
                ctx.collector.append(ToscaError::invalid_type_definition(
                    self.type_name(),
                    format!("bad value for requirement list item: {item}"),
                ));
                continue;
            };
            let normalized = match value {
                // capability-type-only simple grammar
                Value::String(node) => {
                    let mut map = Mapping::new();
                    map.insert("node".into(), Value::String(node.clone()));
                    map
                }
                Value::Map(map) => {
                    validate_requirement_keys(map, &format!("{} \"{}\"", self.kind.label(), self.type_name()), ctx);
                    map.clone()
                }
                other => {
                    ctx.collector.append(ToscaError::invalid_type_definition(
                        self.type_name(),
                        format!("invalid requirement \"{name}\": {other}"),
                    ));
                    continue;
                }
            };
            match definitions.get_mut(name) {
                None => {
                    definitions.insert(name.clone(), normalized);
                }
                Some(current) => {
                    // the stored entry is more derived; the later one is its base
                    *current = merge_requirement_definition(&normalized, current);
                }
            }
        }
        for definition in definitions.values_mut() {
            normalize_relationship(definition);
        }
        definitions
    }

    /// The normalized definition of one requirement, defaulting to an
    /// unconstrained root-relationship requirement when undeclared
    #[must_use]
    pub fn requirement_definition(&self, ctx: &ParseContext, name: &str) -> Mapping {
        if let Some(definition) = self.requirement_definitions(ctx).shift_remove(name) {
            return definition;
        }
        let mut relationship = Mapping::new();
        relationship.insert("type".into(), Value::String(ROOT_RELATIONSHIP.into()));
        let mut definition = Mapping::new();
        definition.insert("relationship".into(), Value::Map(relationship));
        definition
    }
}

/// Merge a requirement assignment over the type's definition
///
/// The overriding side wins on scalars, missing keys are inherited from the
/// base, and `metadata` maps are merged key-wise with the overriding side
/// winning.
#[must_use]
pub fn merge_requirement_definition(base: &Mapping, overriding: &Mapping) -> Mapping {
    let mut merged = Mapping::with_provenance(
        overriding
            .provenance
            .clone()
            .or_else(|| base.provenance.clone()),
    );
    for (key, value) in base {
        merged.insert(key.clone(), value.clone());
    }
    for (key, value) in overriding {
        merged.insert(key.clone(), value.clone());
    }
    if let (Some(Value::Map(base_meta)), Some(Value::Map(over_meta))) =
        (base.get("metadata"), overriding.get("metadata"))
    {
        let mut metadata = base_meta.clone();
        for (key, value) in over_meta {
            metadata.insert(key.clone(), value.clone());
        }
        merged.insert("metadata".into(), Value::Map(metadata));
    }
    merged
}

/// Flag unknown keys on a requirement definition or assignment
pub fn validate_requirement_keys(requirement: &Mapping, what: &str, ctx: &ParseContext) {
    for key in requirement.keys() {
        if key.starts_with('!') || key.starts_with('_') {
            continue;
        }
        if !REQUIREMENT_KEYS.contains(&key.as_str()) {
            ctx.collector.append(ToscaError::unknown_field(
                format!("\"requirements\" of {what}"),
                key,
            ));
        }
    }
}

/// Force the `relationship` key into its `{type: ...}` mapping form
fn normalize_relationship(definition: &mut Mapping) {
    let normalized = match definition.get("relationship") {
        Some(Value::Map(map)) if map.contains_key("type") => None,
        Some(Value::String(type_name)) => {
            let mut map = Mapping::new();
            map.insert("type".into(), Value::String(type_name.clone()));
            Some(map)
        }
        // a malformed or absent relationship falls back to the root type
        _ => {
            let mut map = Mapping::new();
            map.insert("type".into(), Value::String(ROOT_RELATIONSHIP.into()));
            Some(map)
        }
    };
    if let Some(map) = normalized {
        definition.insert("relationship".into(), Value::Map(map));
    }
}
