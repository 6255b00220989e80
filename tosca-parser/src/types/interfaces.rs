//! Interface and operation merging
//!
//! Interface definitions are unioned along the ancestor chain and merged
//! with template-level assignments. Interface-level `inputs` are split into
//! assignments (plain values) and definitions (schemas, recognized by a
//! `type` key); assignments propagate to every operation, definitions
//! become the operation's input schemas. A synthetic `default` operation
//! carries the shared inputs and implementation so downstream code treats
//! per-operation and shared data uniformly.

use crate::context::ParseContext;
use crate::types::entity_type::EntityType;
use indexmap::IndexMap;
use tosca_core::error::ToscaError;
use tosca_core::schema::Schema;
use tosca_core::value::{Mapping, Value};

/// The built-in lifecycle interface type
pub const LIFECYCLE: &str = "tosca.interfaces.node.lifecycle.Standard";
/// The built-in relationship-configuration interface type
pub const CONFIGURE: &str = "tosca.interfaces.relationship.Configure";

/// Keys reserved at the interface level (everything else is an operation)
pub const INTERFACE_KEYS: &[&str] = &[
    "type",
    "inputs",
    "outputs",
    "operations",
    "notifications",
    "description",
    "implementation",
    "requirements",
    "derived_from",
    "metadata",
];

/// Keys allowed on an operation definition
pub const OPERATION_KEYS: &[&str] = &[
    "description",
    "implementation",
    "inputs",
    "outputs",
    "entry_state",
    "exit_state",
    "metadata",
];

/// Keys allowed on a mapping-form implementation
pub const IMPLEMENTATION_KEYS: &[&str] = &[
    "primary",
    "dependencies",
    "timeout",
    "operation_host",
    "environment",
];

/// A materialized operation of an interface
#[derive(Debug, Clone)]
pub struct Operation {
    /// The interface's symbolic name, e.g. `Standard`
    pub interface_name: String,
    /// The interface's type name
    pub interface_type: String,
    /// Operation name; `default` for the synthetic shared-data operation
    pub name: String,
    /// The implementation (artifact reference or mapping form)
    pub implementation: Option<Value>,
    /// Input value assignments
    pub inputs: Mapping,
    /// Input schemas declared on the type
    pub input_defs: IndexMap<String, Schema>,
    /// Output declarations (`{type, mapping}` combined form)
    pub outputs: Mapping,
    /// Node state entered when the operation runs
    pub entry_state: Option<String>,
    /// Operation metadata
    pub metadata: Option<Mapping>,
    /// Operation description
    pub description: Option<String>,
}

/// Split an `inputs` mapping into value assignments and input definitions
///
/// An entry whose value is a mapping with a `type` key is a definition; its
/// `default` (or `mapping`) doubles as an assignment.
#[must_use]
pub fn split_inputs(inputs: &Mapping) -> (Mapping, Mapping) {
    let mut assignments = Mapping::with_provenance(inputs.provenance.clone());
    let mut definitions = Mapping::with_provenance(inputs.provenance.clone());
    for (name, value) in inputs {
        match value.as_map() {
            Some(map) if map.contains_key("type") => {
                definitions.insert(name.clone(), value.clone());
                if let Some(default) = map.get("default") {
                    assignments.insert(name.clone(), default.clone());
                } else if let Some(mapping) = map.get("mapping") {
                    assignments.insert(name.clone(), mapping.clone());
                }
            }
            _ => {
                assignments.insert(name.clone(), value.clone());
            }
        }
    }
    (assignments, definitions)
}

/// Merge output declarations
///
/// When one side is the bare attribute-mapping form and the other the
/// schema mapping form, the two combine into `{type: ..., mapping: ...}`;
/// otherwise the new side wins.
#[must_use]
pub fn merge_outputs(old: &Mapping, new: &Mapping) -> Mapping {
    let mut merged = old.clone();
    for (key, new_value) in new {
        let combined = match (merged.get(key), new_value) {
            (Some(Value::Map(schema)), value) if !matches!(value, Value::Map(_)) => {
                let mut combined = schema.clone();
                combined.insert("mapping".into(), value.clone());
                Value::Map(combined)
            }
            (Some(bare), Value::Map(schema)) if !matches!(bare, Value::Map(_)) => {
                let mut combined = schema.clone();
                combined.insert("mapping".into(), bare.clone());
                Value::Map(combined)
            }
            _ => new_value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

/// Merge template-level interface assignments over the type's definitions
#[must_use]
pub fn merge_interface_defs(base: &Mapping, derived: &Mapping) -> Mapping {
    let mut merged = base.clone();
    for (interface_name, derived_def) in derived {
        let Some(derived_map) = derived_def.as_map() else {
            continue;
        };
        let Some(Value::Map(base_map)) = merged.get(interface_name).cloned() else {
            merged.insert(interface_name.clone(), derived_def.clone());
            continue;
        };
        merged.insert(
            interface_name.clone(),
            Value::Map(merge_single_interface(&base_map, derived_map)),
        );
    }
    merged
}

/// Merge one interface body over its base
#[must_use]
pub fn merge_single_interface(base_map: &Mapping, derived_map: &Mapping) -> Mapping {
    let mut combined = derived_map.clone();

    // shared inputs merge with the derived side winning
    if let (Some(Value::Map(base_inputs)), Some(Value::Map(derived_inputs))) =
        (base_map.get("inputs"), derived_map.get("inputs"))
    {
        let mut inputs = base_inputs.clone();
        for (key, value) in derived_inputs {
            inputs.insert(key.clone(), value.clone());
        }
        combined.insert("inputs".into(), Value::Map(inputs));
    } else if let Some(base_inputs) = base_map.get("inputs") {
        combined.entry("inputs".into()).or_insert_with(|| base_inputs.clone());
    }

    if let (Some(Value::Map(base_outputs)), Some(Value::Map(derived_outputs))) =
        (base_map.get("outputs"), derived_map.get("outputs"))
    {
        combined.insert(
            "outputs".into(),
            Value::Map(merge_outputs(base_outputs, derived_outputs)),
        );
    } else if let Some(base_outputs) = base_map.get("outputs") {
        combined
            .entry("outputs".into())
            .or_insert_with(|| base_outputs.clone());
    }

    for inherited in ["type", "requirements", "description", "implementation"] {
        if let Some(value) = base_map.get(inherited) {
            combined
                .entry(inherited.into())
                .or_insert_with(|| value.clone());
        }
    }

    if let (Some(Value::Map(base_meta)), Some(Value::Map(derived_meta))) =
        (base_map.get("metadata"), derived_map.get("metadata"))
    {
        let mut metadata = base_meta.clone();
        for (key, value) in derived_meta {
            metadata.insert(key.clone(), value.clone());
        }
        combined.insert("metadata".into(), Value::Map(metadata));
    } else if let Some(metadata) = base_map.get("metadata") {
        combined
            .entry("metadata".into())
            .or_insert_with(|| metadata.clone());
    }

    // union operations; per operation the derived definition wins
    let base_ops = operations_of(base_map);
    let mut operations = operations_of(&combined);
    for (op_name, base_op) in &base_ops {
        match operations.get(op_name) {
            None => {
                operations.insert(op_name.clone(), base_op.clone());
            }
            Some(derived_op) => {
                let merged_op = merge_operation(base_op, derived_op);
                operations.insert(op_name.clone(), merged_op);
            }
        }
    }
    set_operations(&mut combined, operations);
    combined
}

/// Pull the operations out of an interface definition, whichever grammar
/// (explicit `operations:` block or operations inline beside the reserved
/// keys) the document used
fn operations_of(interface: &Mapping) -> Mapping {
    if let Some(Value::Map(operations)) = interface.get("operations") {
        return operations.clone();
    }
    let mut operations = Mapping::new();
    for (key, value) in interface {
        if INTERFACE_KEYS.contains(&key.as_str()) || key.starts_with('!') || key.starts_with('_') {
            continue;
        }
        operations.insert(key.clone(), value.clone());
    }
    operations
}

fn set_operations(interface: &mut Mapping, operations: Mapping) {
    if interface.contains_key("operations") {
        interface.insert("operations".into(), Value::Map(operations));
        return;
    }
    let inline: Vec<String> = interface
        .keys()
        .filter(|key| {
            !INTERFACE_KEYS.contains(&key.as_str())
                && !key.starts_with('!')
                && !key.starts_with('_')
        })
        .cloned()
        .collect();
    for key in inline {
        interface.shift_remove(&key);
    }
    interface.insert("operations".into(), Value::Map(operations));
}

/// Merge one operation definition over its base: the derived side wins per
/// key, inputs merge key-wise
fn merge_operation(base: &Value, derived: &Value) -> Value {
    // an explicit opt-out must survive merging so the operation is dropped
    if derived.as_str() == Some("not_implemented") {
        return derived.clone();
    }
    let base = match base.as_map() {
        Some(map) => map.clone(),
        None => {
            let mut map = Mapping::new();
            map.insert("implementation".into(), base.clone());
            map
        }
    };
    let derived = match derived.as_map() {
        Some(map) => map.clone(),
        None => {
            let mut map = Mapping::new();
            map.insert("implementation".into(), derived.clone());
            map
        }
    };
    let mut merged = base.clone();
    for (key, value) in &derived {
        merged.insert(key.clone(), value.clone());
    }
    if let (Some(Value::Map(base_inputs)), Some(Value::Map(derived_inputs))) =
        (base.get("inputs"), derived.get("inputs"))
    {
        let mut inputs = base_inputs.clone();
        for (key, value) in derived_inputs {
            inputs.insert(key.clone(), value.clone());
        }
        merged.insert("inputs".into(), Value::Map(inputs));
    }
    if let (Some(Value::Map(base_outputs)), Some(Value::Map(derived_outputs))) =
        (base.get("outputs"), derived.get("outputs"))
    {
        merged.insert(
            "outputs".into(),
            Value::Map(merge_outputs(base_outputs, derived_outputs)),
        );
    }
    Value::Map(merged)
}

/// The interface type's own body (operations and shared data declared on
/// the interface type itself), folded across the interface type's ancestors
fn interface_type_body(
    ctx: &ParseContext,
    entity: &EntityType,
    interface_type: &str,
) -> Option<Mapping> {
    let resolved = EntityType::lookup(
        ctx,
        crate::types::entity_type::TypeKind::Interface,
        interface_type,
        entity.source_namespace_id(),
    )?;
    let mut body = Mapping::new();
    for ancestor in resolved.ancestors(ctx).iter().rev() {
        for (key, value) in ancestor.defs() {
            if key == "derived_from" || key.starts_with('_') || key.starts_with('!') {
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
    }
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Expand interface shortnames to the built-in interface type names
fn interface_type_of(interface_name: &str, definition: &Mapping) -> String {
    if let Some(type_name) = definition.get_str("type") {
        return type_name.to_string();
    }
    match interface_name {
        "Standard" => LIFECYCLE.to_string(),
        "Configure" => CONFIGURE.to_string(),
        other => other.to_string(),
    }
}

/// Materialize the operations of an entity's interfaces
///
/// `template_interfaces` are the assignments from the template, merged over
/// the type's merged interface definitions, which in turn sit on top of the
/// interface type's own body (so operations declared on the interface type
/// are the most-base layer). `what` names the template or type for
/// diagnostics.
#[must_use]
pub fn create_operations(
    ctx: &ParseContext,
    type_definition: &EntityType,
    template_interfaces: Option<&Mapping>,
    what: &str,
) -> Vec<Operation> {
    let base = type_definition.merged_interfaces(ctx);
    let merged = match template_interfaces {
        Some(template) => merge_interface_defs(&base, template),
        None => base,
    };

    let mut operations = Vec::new();
    for (interface_name, definition) in &merged {
        let Some(definition) = definition.as_map() else {
            ctx.collector.append(ToscaError::type_mismatch(
                format!("interface \"{interface_name}\" of {what}"),
                "map",
            ));
            continue;
        };
        let interface_type = interface_type_of(interface_name, definition);
        let definition = match interface_type_body(ctx, type_definition, &interface_type) {
            Some(body) => merge_single_interface(&body, definition),
            None => definition.clone(),
        };
        let definition = &definition;

        let (shared_inputs, shared_defs) = match definition.get("inputs") {
            Some(Value::Map(inputs)) => split_inputs(inputs),
            Some(other) => {
                ctx.collector.append(ToscaError::validation(format!(
                    "inputs of interface \"{interface_name}\" on {what} must be a map, not {other}"
                )));
                (Mapping::new(), Mapping::new())
            }
            None => (Mapping::new(), Mapping::new()),
        };
        let shared_outputs = definition.get_map("outputs").cloned().unwrap_or_default();
        let shared_implementation = definition.get("implementation").cloned();
        let shared_metadata = definition.get_map("metadata").cloned();

        for (op_name, op_def) in &operations_of(definition) {
            // explicitly unimplemented operations are dropped
            if op_def.as_str() == Some("not_implemented") {
                continue;
            }
            if let Some(operation) = build_operation(
                ctx,
                interface_name,
                &interface_type,
                op_name,
                op_def,
                &shared_inputs,
                &shared_defs,
                &shared_outputs,
                shared_implementation.as_ref(),
                shared_metadata.as_ref(),
                what,
            ) {
                operations.push(operation);
            }
        }

        // the synthetic operation carrying the shared interface data
        if !shared_inputs.is_empty()
            || !shared_defs.is_empty()
            || !shared_outputs.is_empty()
            || shared_implementation.is_some()
        {
            operations.push(Operation {
                interface_name: interface_name.clone(),
                interface_type: interface_type.clone(),
                name: "default".into(),
                implementation: shared_implementation.clone(),
                inputs: shared_inputs.clone(),
                input_defs: schemas_of(ctx, &shared_defs),
                outputs: shared_outputs.clone(),
                entry_state: None,
                metadata: shared_metadata.clone(),
                description: None,
            });
        }
    }
    operations
}

#[allow(clippy::too_many_arguments)]
fn build_operation(
    ctx: &ParseContext,
    interface_name: &str,
    interface_type: &str,
    op_name: &str,
    op_def: &Value,
    shared_inputs: &Mapping,
    shared_defs: &Mapping,
    shared_outputs: &Mapping,
    shared_implementation: Option<&Value>,
    shared_metadata: Option<&Mapping>,
    what: &str,
) -> Option<Operation> {
    let msg = format!("operation \"{interface_name}:{op_name}\" on {what}");
    let definition = match op_def {
        Value::Map(map) => map.clone(),
        // a bare scalar is the implementation
        other => {
            let mut map = Mapping::new();
            if !other.is_null() {
                map.insert("implementation".into(), other.clone());
            }
            map
        }
    };
    for key in definition.keys() {
        if key.starts_with('!') || key.starts_with('_') {
            continue;
        }
        if !OPERATION_KEYS.contains(&key.as_str()) {
            ctx.collector
                .append(ToscaError::unknown_field(msg.clone(), key));
        }
    }

    let (own_inputs, own_defs) = match definition.get("inputs") {
        Some(Value::Map(inputs)) => split_inputs(inputs),
        Some(other) => {
            ctx.collector.append(ToscaError::validation(format!(
                "{msg}: inputs must be a map, not {other}"
            )));
            (Mapping::new(), Mapping::new())
        }
        None => (Mapping::new(), Mapping::new()),
    };
    let mut inputs = shared_inputs.clone();
    for (key, value) in &own_inputs {
        inputs.insert(key.clone(), value.clone());
    }
    let mut input_defs = shared_defs.clone();
    for (key, value) in &own_defs {
        input_defs.insert(key.clone(), value.clone());
    }

    let outputs = match definition.get_map("outputs") {
        Some(own) => merge_outputs(shared_outputs, own),
        None => shared_outputs.clone(),
    };

    let implementation = definition
        .get("implementation")
        .cloned()
        .or_else(|| shared_implementation.cloned());
    if let Some(implementation) = &implementation {
        validate_implementation(ctx, implementation, &msg);
    }

    let metadata = match (shared_metadata, definition.get_map("metadata")) {
        (Some(shared), Some(own)) => {
            let mut merged = shared.clone();
            for (key, value) in own {
                merged.insert(key.clone(), value.clone());
            }
            Some(merged)
        }
        (None, Some(own)) => Some(own.clone()),
        (shared, None) => shared.cloned(),
    };

    Some(Operation {
        interface_name: interface_name.to_string(),
        interface_type: interface_type.to_string(),
        name: op_name.to_string(),
        implementation,
        inputs,
        input_defs: schemas_of(ctx, &input_defs),
        outputs,
        entry_state: definition.get_str("entry_state").map(str::to_string),
        metadata,
        description: definition.get_str("description").map(str::to_string),
    })
}

fn schemas_of(ctx: &ParseContext, defs: &Mapping) -> IndexMap<String, Schema> {
    defs.iter()
        .map(|(name, def)| (name.clone(), Schema::from_value(name, def, &ctx.collector)))
        .collect()
}

/// Check a mapping-form implementation: recognized keys only, inline
/// artifacts must name a `file`
fn validate_implementation(ctx: &ParseContext, implementation: &Value, msg: &str) {
    let Some(map) = implementation.as_map() else {
        return;
    };
    for (key, value) in map {
        if key.starts_with('!') || key.starts_with('_') {
            continue;
        }
        match key.as_str() {
            "primary" => validate_inline_artifact(ctx, value, msg),
            "dependencies" => match value.as_list() {
                Some(artifacts) => {
                    for artifact in artifacts {
                        validate_inline_artifact(ctx, artifact, msg);
                    }
                }
                None => ctx.collector.append(ToscaError::validation(format!(
                    "{msg}: 'dependencies' must be a list"
                ))),
            },
            other if !IMPLEMENTATION_KEYS.contains(&other) => {
                ctx.collector.append(ToscaError::unknown_field(
                    format!("implementation in {msg}"),
                    other,
                ));
            }
            _ => {}
        }
    }
}

fn validate_inline_artifact(ctx: &ParseContext, artifact: &Value, msg: &str) {
    if let Some(map) = artifact.as_map() {
        if !map.contains_key("file") {
            ctx.collector.append(ToscaError::missing_field(
                format!("inline artifact in {msg}"),
                "file",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::namespace::Namespace;
    use crate::types::entity_type::TypeKind;
    use pretty_assertions::assert_eq;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn test_split_inputs() {
        let inputs = parse_map(
            "endpoint: \"http://example\"\nretries: {type: integer, default: 3}\nname: {type: string}\n",
        );
        let (assignments, definitions) = split_inputs(&inputs);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments.get("retries"), Some(&Value::Integer(3)));
        assert!(assignments.get("endpoint").is_some());
        assert_eq!(definitions.len(), 2);
        assert!(definitions.contains_key("name"));
    }

    #[test]
    fn test_merge_outputs_combines_forms() {
        let old = parse_map("status: {type: string}");
        let new = parse_map("status: [SELF, state]");
        let merged = merge_outputs(&old, &new);
        let status = merged.get_map("status").expect("combined");
        assert_eq!(status.get_str("type"), Some("string"));
        assert!(status.get("mapping").is_some());

        // and the mirrored order
        let merged = merge_outputs(&new, &old);
        let status = merged.get_map("status").expect("combined");
        assert_eq!(status.get_str("type"), Some("string"));
        assert!(status.get("mapping").is_some());
    }

    #[test]
    fn test_builtin_standard_operations() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Root", "").expect("built-in");
        let operations = create_operations(&ctx, &root, None, "type \"tosca.nodes.Root\"");
        let names: Vec<&str> = operations
            .iter()
            .filter(|op| op.interface_name == "Standard")
            .map(|op| op.name.as_str())
            .collect();
        for expected in ["create", "configure", "start", "stop", "delete"] {
            assert!(names.contains(&expected), "missing operation {expected}");
        }
        assert!(operations
            .iter()
            .all(|op| op.interface_type == LIFECYCLE || op.interface_type == CONFIGURE));
    }

    #[test]
    fn test_derived_op_wins_but_inherits_inputs() {
        let mut ctx = ParseContext::new(ParserConfig::default());
        let mut ns = Namespace::new("");
        ns.defs.insert(
            "Base".into(),
            Value::Map(parse_map(
                "derived_from: tosca.nodes.Root\ninterfaces:\n  Standard:\n    create:\n      implementation: base.sh\n      inputs: {retries: 1, timeout: 30}\n",
            )),
        );
        ns.defs.insert(
            "Derived".into(),
            Value::Map(parse_map(
                "derived_from: Base\ninterfaces:\n  Standard:\n    create:\n      implementation: derived.sh\n",
            )),
        );
        ctx.namespaces.register(ns);

        let derived = EntityType::resolve(&ctx, TypeKind::Node, "Derived", "").expect("found");
        let merged = derived.merged_interfaces(&ctx);
        let standard = merged.get_map("Standard").expect("interface");
        let create = standard.get_map("create").expect("operation");
        // the derived definition wins wholesale per operation
        assert_eq!(create.get_str("implementation"), Some("derived.sh"));
    }

    #[test]
    fn test_template_assignment_merges_and_keeps_base_ops() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Root", "").expect("built-in");
        let template = parse_map(
            "Standard:\n  inputs: {mode: fast}\n  create:\n    implementation: install.sh\n    inputs: {retries: 2}\n",
        );
        let operations =
            create_operations(&ctx, &root, Some(&template), "template \"server\"");
        let create = operations
            .iter()
            .find(|op| op.interface_name == "Standard" && op.name == "create")
            .expect("create operation");
        assert_eq!(
            create.implementation.as_ref().and_then(Value::as_str),
            Some("install.sh")
        );
        // shared inputs propagate to the operation
        assert_eq!(create.inputs.get("mode"), Some(&Value::String("fast".into())));
        assert_eq!(create.inputs.get("retries"), Some(&Value::Integer(2)));
        // base operations survive
        assert!(operations
            .iter()
            .any(|op| op.interface_name == "Standard" && op.name == "delete"));
        // the synthetic default operation carries the shared inputs
        let default = operations
            .iter()
            .find(|op| op.interface_name == "Standard" && op.name == "default")
            .expect("default operation");
        assert_eq!(default.inputs.get("mode"), Some(&Value::String("fast".into())));
    }

    #[test]
    fn test_input_definitions_become_schemas() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Root", "").expect("built-in");
        let template = parse_map(
            "Standard:\n  create:\n    implementation: install.sh\n    inputs:\n      level: {type: integer, default: 2}\n      tag: latest\n",
        );
        let operations = create_operations(&ctx, &root, Some(&template), "template \"n\"");
        let create = operations
            .iter()
            .find(|op| op.name == "create")
            .expect("create");
        assert_eq!(create.input_defs["level"].type_name, "integer");
        // the definition's default doubles as an assignment
        assert_eq!(create.inputs.get("level"), Some(&Value::Integer(2)));
        assert_eq!(create.inputs.get("tag"), Some(&Value::String("latest".into())));
        assert!(!create.input_defs.contains_key("tag"));
    }

    #[test]
    fn test_not_implemented_operation_dropped() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Root", "").expect("built-in");
        let template = parse_map("Standard:\n  create: not_implemented\n");
        let operations = create_operations(&ctx, &root, Some(&template), "template \"n\"");
        assert!(!operations
            .iter()
            .any(|op| op.interface_name == "Standard" && op.name == "create"));
    }

    #[test]
    fn test_implementation_validation() {
        let ctx = ParseContext::new(ParserConfig::default());
        let root =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Root", "").expect("built-in");
        let template = parse_map(
            "Standard:\n  create:\n    implementation:\n      primary: {type: tosca.artifacts.Implementation.Bash}\n      dependences: oops\n",
        );
        create_operations(&ctx, &root, Some(&template), "template \"n\"");
        let report = ctx.collector.report();
        assert!(report.iter().any(|line| line.contains("file")));
        assert!(report.iter().any(|line| line.contains("dependences")));
    }
}
