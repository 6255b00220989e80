//! The base entity type: identity, ancestry and definition merging

use crate::builtin;
use crate::context::{ParseContext, TypeDef};
use crate::namespace::SOURCE_KEY;
use std::collections::HashSet;
use std::sync::Arc;
use tosca_core::error::ToscaError;
use tosca_core::schema::{property_types, Schema};
use tosca_core::value::{Mapping, Value};

/// Annotation key recording which namespace a merged entry came from
pub const NAMESPACE_KEY: &str = "!namespace";

/// The kinds of TOSCA types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Node types
    Node,
    /// Relationship types
    Relationship,
    /// Capability types
    Capability,
    /// Data types
    Data,
    /// Artifact types
    Artifact,
    /// Interface types
    Interface,
    /// Policy types
    Policy,
    /// Group types
    Group,
}

impl TypeKind {
    /// The built-in name prefix used to expand shorthand references
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Node => "tosca.nodes.",
            Self::Relationship => "tosca.relationships.",
            Self::Capability => "tosca.capabilities.",
            Self::Data => "tosca.datatypes.",
            Self::Artifact => "tosca.artifacts.",
            Self::Interface => "tosca.interfaces.",
            Self::Policy => "tosca.policies.",
            Self::Group => "tosca.groups.",
        }
    }

    /// Human-readable kind label for diagnostics
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Node => "node type",
            Self::Relationship => "relationship type",
            Self::Capability => "capability type",
            Self::Data => "data type",
            Self::Artifact => "artifact type",
            Self::Interface => "interface type",
            Self::Policy => "policy type",
            Self::Group => "group type",
        }
    }
}

/// A resolved TOSCA type
#[derive(Debug, Clone)]
pub struct EntityType {
    /// Which kind of type this is
    pub kind: TypeKind,
    /// The cached definition
    pub def: Arc<TypeDef>,
}

/// A property definition together with the namespace its type names
/// resolve in
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// The parsed schema
    pub schema: Schema,
    /// Namespace for resolving the schema's type references
    pub namespace_id: String,
}

impl EntityType {
    /// Resolve a type name without reporting a miss
    ///
    /// Lookup order follows the importing document: the enclosing
    /// namespace (with its global-namespace fallback), then the built-in
    /// definitions, expanding the `tosca:` shorthand and the kind prefix.
    #[must_use]
    pub fn lookup(
        ctx: &ParseContext,
        kind: TypeKind,
        name: &str,
        namespace_id: &str,
    ) -> Option<Self> {
        let name = match name.strip_prefix("tosca:") {
            Some(rest) => format!("{}{rest}", kind.prefix()),
            None => name.to_string(),
        };

        if let Some((namespace, def)) = ctx.namespaces.lookup_def(namespace_id, &name) {
            let global_name = namespace.get_global_name(&name);
            if let Some(cached) = ctx.registry.find_type(&global_name, None) {
                return Some(Self { kind, def: cached });
            }
            let source_namespace_id = def
                .get_map(SOURCE_KEY)
                .and_then(|source| source.get_str("namespace_id"))
                .unwrap_or(&namespace.namespace_id)
                .to_string();
            let typedef = Arc::new(TypeDef {
                name: name.clone(),
                global_name,
                namespace_id: namespace.namespace_id.clone(),
                source_namespace_id,
                defs: def.clone(),
            });
            ctx.registry.add_type(Arc::clone(&typedef), false);
            return Some(Self { kind, def: typedef });
        }

        let prefixed = format!("{}{name}", kind.prefix());
        let mut candidates = Vec::with_capacity(2);
        if !name.starts_with("tosca.") {
            candidates.push(prefixed.as_str());
        }
        candidates.push(name.as_str());
        for candidate in candidates {
            if let Some(def) = builtin::find(candidate) {
                if let Some(cached) = ctx.registry.find_type(candidate, None) {
                    return Some(Self { kind, def: cached });
                }
                let typedef = Arc::new(TypeDef {
                    name: candidate.to_string(),
                    global_name: candidate.to_string(),
                    namespace_id: String::new(),
                    source_namespace_id: String::new(),
                    defs: def.clone(),
                });
                ctx.registry.add_type(Arc::clone(&typedef), false);
                return Some(Self { kind, def: typedef });
            }
        }
        None
    }

    /// Resolve a type name, collecting a `MissingType` error on a miss
    #[must_use]
    pub fn resolve(
        ctx: &ParseContext,
        kind: TypeKind,
        name: &str,
        namespace_id: &str,
    ) -> Option<Self> {
        let found = Self::lookup(ctx, kind, name, namespace_id);
        if found.is_none() {
            ctx.collector.append(ToscaError::missing_type(name));
        }
        found
    }

    /// The local type name
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.def.name
    }

    /// The canonical `local_name@namespace_id` identity
    #[must_use]
    pub fn global_name(&self) -> &str {
        &self.def.global_name
    }

    /// The raw definition body
    #[must_use]
    pub fn defs(&self) -> &Mapping {
        &self.def.defs
    }

    /// Namespace the type's internal references resolve in
    #[must_use]
    pub fn source_namespace_id(&self) -> &str {
        &self.def.source_namespace_id
    }

    /// The type's description, if any
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.def.defs.get_str("description")
    }

    /// The declared `derived_from` parents; the first is the primary parent
    #[must_use]
    pub fn derived_from_names(&self) -> Vec<String> {
        match self.def.defs.get("derived_from") {
            Some(Value::String(parent)) => vec![parent.clone()],
            Some(Value::List(parents)) => parents
                .iter()
                .filter_map(|parent| parent.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The primary parent type
    #[must_use]
    pub fn parent_type(&self, ctx: &ParseContext) -> Option<EntityType> {
        self.parent_types(ctx).into_iter().next()
    }

    /// Every declared parent, in declaration order
    ///
    /// Node types with no `derived_from` implicitly derive from
    /// `tosca.nodes.Root`. A type naming itself as parent is an
    /// `InvalidTypeDefinition`.
    #[must_use]
    pub fn parent_types(&self, ctx: &ParseContext) -> Vec<EntityType> {
        let mut names = self.derived_from_names();
        if names.is_empty() {
            if self.kind == TypeKind::Node && self.type_name() != "tosca.nodes.Root" {
                names.push("tosca.nodes.Root".to_string());
            } else {
                return Vec::new();
            }
        }
        let mut parents = Vec::with_capacity(names.len());
        for name in names {
            if name == self.type_name() || name == self.global_name() {
                ctx.collector.append(ToscaError::invalid_type_definition(
                    self.type_name(),
                    "type cannot derive from itself",
                ));
                continue;
            }
            // primitive-derived data types (e.g. PortDef from integer)
            // terminate the chain
            if self.kind == TypeKind::Data && property_types::is_builtin(&name) {
                continue;
            }
            let mut found = Self::lookup(ctx, self.kind, &name, self.source_namespace_id());
            if found.is_none() && self.def.namespace_id != self.def.source_namespace_id {
                found = Self::lookup(ctx, self.kind, &name, &self.def.namespace_id);
            }
            match found {
                Some(parent) => parents.push(parent),
                None => ctx.collector.append(ToscaError::missing_type(&name)),
            }
        }
        parents
    }

    /// Self followed by every ancestor, depth-first, each visited once
    #[must_use]
    pub fn ancestors(&self, ctx: &ParseContext) -> Vec<EntityType> {
        let mut seen = HashSet::new();
        seen.insert(self.global_name().to_string());
        let mut chain = vec![self.clone()];
        self.walk_ancestors(ctx, &mut seen, &mut chain);
        chain
    }

    fn walk_ancestors(
        &self,
        ctx: &ParseContext,
        seen: &mut HashSet<String>,
        chain: &mut Vec<EntityType>,
    ) {
        for parent in self.parent_types(ctx) {
            if seen.insert(parent.global_name().to_string()) {
                chain.push(parent.clone());
                parent.walk_ancestors(ctx, seen, chain);
            }
        }
    }

    /// True if this type is, or derives from, the named type
    ///
    /// A name containing `@` is matched against global identities.
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.ancestors(ctx).iter().any(|ancestor| {
            if type_name.contains('@') {
                ancestor.global_name() == type_name
            } else {
                ancestor.type_name() == type_name
            }
        })
    }

    /// The effective value of a definition field
    ///
    /// `tpl` overrides the type's own definitions (used for template
    /// sections). With `parent` the ancestor chain is folded in:
    /// mapping entries missing from the derived value are appended, and
    /// with `merge` both-mapping entries merge shallowly by key (derived
    /// wins, `metadata` merged) and list values append ancestor items not
    /// already present. With `add_namespace`, entries contributed by an
    /// ancestor defined in a namespace are tagged with that namespace so
    /// later name resolution stays correct.
    #[must_use]
    pub fn get_value(
        &self,
        ctx: &ParseContext,
        key: &str,
        tpl: Option<&Mapping>,
        parent: bool,
        merge: bool,
        add_namespace: bool,
    ) -> Option<Value> {
        let mut value: Option<Value> = match tpl {
            Some(template) => template.get(key).cloned(),
            None => self.def.defs.get(key).cloned(),
        };
        if !parent {
            return value;
        }
        for ancestor in self.ancestors(ctx) {
            let Some(parent_value) = ancestor.def.defs.get(key) else {
                continue;
            };
            let namespace = ancestor.source_namespace_id().to_string();
            let tag = add_namespace && !namespace.is_empty();
            match &mut value {
                Some(Value::Map(current)) => {
                    if let Value::Map(parent_map) = parent_value {
                        merge_mapping(current, parent_map, merge, tag, &namespace);
                    }
                }
                Some(Value::List(current)) => {
                    if merge {
                        if let Value::List(parent_items) = parent_value {
                            for item in parent_items {
                                if !current.contains(item) {
                                    let mut item = item.clone();
                                    if tag && key == "requirements" {
                                        tag_requirement_namespaces(&mut item, &namespace);
                                    }
                                    current.push(item);
                                }
                            }
                        }
                    }
                }
                // a scalar stays: the most-derived value wins
                Some(_) => {}
                None => {
                    let mut copied = parent_value.clone();
                    if tag {
                        match (&mut copied, key) {
                            (Value::List(items), "requirements") => {
                                for item in items {
                                    tag_requirement_namespaces(item, &namespace);
                                }
                            }
                            (Value::Map(map), _) => {
                                for entry in map.values_mut() {
                                    if let Value::Map(entry) = entry {
                                        if entry.contains_key("type") {
                                            entry.insert(
                                                NAMESPACE_KEY.into(),
                                                Value::String(namespace.clone()),
                                            );
                                        }
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    value = Some(copied);
                }
            }
        }
        value
    }

    /// The fully merged definition of a field (property, attribute,
    /// interface definitions and the like)
    #[must_use]
    pub fn get_definition(&self, ctx: &ParseContext, key: &str) -> Option<Value> {
        self.get_value(ctx, key, None, true, true, true)
    }

    /// Effective property definitions across the ancestor chain
    #[must_use]
    pub fn properties_def(&self, ctx: &ParseContext) -> indexmap::IndexMap<String, PropertyDef> {
        self.schemas_from_definition(ctx, "properties")
    }

    /// Effective attribute definitions across the ancestor chain
    #[must_use]
    pub fn attributes_def(&self, ctx: &ParseContext) -> indexmap::IndexMap<String, PropertyDef> {
        self.schemas_from_definition(ctx, "attributes")
    }

    fn schemas_from_definition(
        &self,
        ctx: &ParseContext,
        key: &str,
    ) -> indexmap::IndexMap<String, PropertyDef> {
        let mut defs = indexmap::IndexMap::new();
        let Some(Value::Map(entries)) = self.get_definition(ctx, key) else {
            return defs;
        };
        for (name, entry) in &entries {
            if name.starts_with('!') || name.starts_with('_') {
                continue;
            }
            let namespace_id = entry
                .as_map()
                .and_then(|map| map.get_str(NAMESPACE_KEY))
                .unwrap_or(self.source_namespace_id())
                .to_string();
            let schema = Schema::from_value(name, entry, &ctx.collector);
            defs.insert(name.clone(), PropertyDef { schema, namespace_id });
        }
        defs
    }

    /// Interface definitions unioned across the ancestor chain
    ///
    /// Walks most-base-first so that per-interface keys (including each
    /// operation) are overwritten by more derived definitions.
    #[must_use]
    pub fn merged_interfaces(&self, ctx: &ParseContext) -> Mapping {
        let mut interfaces = Mapping::new();
        for ancestor in self.ancestors(ctx).iter().rev() {
            let Some(Value::Map(ancestor_interfaces)) = ancestor.def.defs.get("interfaces") else {
                continue;
            };
            for (name, def) in ancestor_interfaces {
                match interfaces.get_mut(name) {
                    Some(Value::Map(existing)) => {
                        if let Value::Map(def) = def {
                            for (key, value) in def {
                                existing.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    _ => {
                        interfaces.insert(name.clone(), def.clone());
                    }
                }
            }
        }
        interfaces
    }
}

fn merge_mapping(
    current: &mut Mapping,
    parent_map: &Mapping,
    merge: bool,
    tag: bool,
    namespace: &str,
) {
    for (key, parent_entry) in parent_map {
        if !current.contains_key(key) {
            let mut entry = parent_entry.clone();
            if tag {
                if let Value::Map(map) = &mut entry {
                    if map.contains_key("type") {
                        map.insert(NAMESPACE_KEY.into(), Value::String(namespace.to_string()));
                    }
                }
            }
            current.insert(key.clone(), entry);
        } else if merge {
            let merged = match (current.get(key), parent_entry) {
                (Some(Value::Map(derived_entry)), Value::Map(parent_entry)) => {
                    let had_type = derived_entry.contains_key("type");
                    let mut merged = shallow_merge(parent_entry, derived_entry);
                    if let (Some(Value::Map(parent_meta)), Some(Value::Map(derived_meta))) =
                        (parent_entry.get("metadata"), derived_entry.get("metadata"))
                    {
                        merged.insert(
                            "metadata".into(),
                            Value::Map(shallow_merge(parent_meta, derived_meta)),
                        );
                    }
                    if tag && parent_entry.contains_key("type") && !had_type {
                        merged.insert(NAMESPACE_KEY.into(), Value::String(namespace.to_string()));
                    }
                    Some(Value::Map(merged))
                }
                _ => None,
            };
            if let Some(merged) = merged {
                current.insert(key.clone(), merged);
            }
        }
    }
}

/// Shallow key-wise merge: parent entries as the base, derived keys win
fn shallow_merge(parent: &Mapping, derived: &Mapping) -> Mapping {
    let mut merged = Mapping::with_provenance(derived.provenance.clone());
    for (key, value) in parent {
        merged.insert(key.clone(), value.clone());
    }
    for (key, value) in derived {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Tag a requirement list entry's node/capability/relationship references
/// with the namespace they were declared in
fn tag_requirement_namespaces(requirement: &mut Value, namespace: &str) {
    let Some(entry) = requirement.as_map_mut() else {
        return;
    };
    let Some((_, assignment)) = entry.iter_mut().next() else {
        return;
    };
    let Some(assignment) = assignment.as_map_mut() else {
        return;
    };
    for key in ["node", "capability", "relationship"] {
        let tag = match assignment.get(key) {
            // a relationship mapping only references a type when it has one
            Some(Value::Map(map)) => map.contains_key("type"),
            Some(_) => true,
            None => false,
        };
        if tag {
            assignment.insert(
                format!("!namespace-{key}"),
                Value::String(namespace.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::namespace::Namespace;
    use pretty_assertions::assert_eq;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    fn context() -> ParseContext {
        ParseContext::new(ParserConfig::default())
    }

    #[test]
    fn test_builtin_ancestry() {
        let ctx = context();
        let database = EntityType::resolve(&ctx, TypeKind::Node, "tosca.nodes.Database", "")
            .expect("built-in type");
        assert!(database.is_derived_from(&ctx, "tosca.nodes.Root"));
        assert!(!database.is_derived_from(&ctx, "tosca.nodes.Compute"));

        let chain: Vec<_> = database
            .ancestors(&ctx)
            .iter()
            .map(|t| t.type_name().to_string())
            .collect();
        assert_eq!(chain, vec!["tosca.nodes.Database", "tosca.nodes.Root"]);
    }

    #[test]
    fn test_shorthand_expansion() {
        let ctx = context();
        let compute =
            EntityType::resolve(&ctx, TypeKind::Node, "tosca:Compute", "").expect("expanded");
        assert_eq!(compute.type_name(), "tosca.nodes.Compute");
    }

    #[test]
    fn test_custom_type_defaults_to_root() {
        let mut ctx = context();
        let mut ns = Namespace::new("");
        ns.defs
            .insert("my.Custom".into(), Value::Map(parse_map("properties: {p: {type: string}}")));
        ctx.namespaces.register(ns);
        let custom = EntityType::resolve(&ctx, TypeKind::Node, "my.Custom", "").expect("found");
        assert!(custom.is_derived_from(&ctx, "tosca.nodes.Root"));
    }

    #[test]
    fn test_missing_type_collected() {
        let ctx = context();
        assert!(EntityType::resolve(&ctx, TypeKind::Node, "no.such.Type", "").is_none());
        assert!(ctx.collector.caught());
    }

    #[test]
    fn test_property_definitions_inherited_and_merged() {
        let mut ctx = context();
        let mut ns = Namespace::new("");
        ns.defs.insert(
            "Base".into(),
            Value::Map(parse_map(
                "derived_from: tosca.nodes.Root\nproperties:\n  shared: {type: string, default: base}\n  own: {type: integer}\n",
            )),
        );
        ns.defs.insert(
            "Derived".into(),
            Value::Map(parse_map(
                "derived_from: Base\nproperties:\n  shared: {default: derived}\n",
            )),
        );
        ctx.namespaces.register(ns);

        let derived = EntityType::resolve(&ctx, TypeKind::Node, "Derived", "").expect("found");
        let props = derived.properties_def(&ctx);
        // the derived override keeps the inherited type but wins on default
        let shared = &props["shared"].schema;
        assert_eq!(shared.type_name, "string");
        assert_eq!(shared.default, Some(Value::String("derived".into())));
        assert!(props.contains_key("own"));
    }

    #[test]
    fn test_diamond_ancestors_visited_once() {
        let mut ctx = context();
        let mut ns = Namespace::new("");
        ns.defs.insert(
            "Left".into(),
            Value::Map(parse_map("derived_from: tosca.nodes.Root")),
        );
        ns.defs.insert(
            "Right".into(),
            Value::Map(parse_map("derived_from: tosca.nodes.Root")),
        );
        ns.defs.insert(
            "Bottom".into(),
            Value::Map(parse_map("derived_from: [Left, Right]")),
        );
        ctx.namespaces.register(ns);

        let bottom = EntityType::resolve(&ctx, TypeKind::Node, "Bottom", "").expect("found");
        let chain: Vec<_> = bottom
            .ancestors(&ctx)
            .iter()
            .map(|t| t.type_name().to_string())
            .collect();
        assert_eq!(chain, vec!["Bottom", "Left", "tosca.nodes.Root", "Right"]);
        assert!(bottom.is_derived_from(&ctx, "Right"));
    }

    #[test]
    fn test_self_derivation_is_invalid() {
        let mut ctx = context();
        let mut ns = Namespace::new("");
        ns.defs
            .insert("Loop".into(), Value::Map(parse_map("derived_from: Loop")));
        ctx.namespaces.register(ns);

        let looped = EntityType::resolve(&ctx, TypeKind::Node, "Loop", "").expect("found");
        let chain = looped.ancestors(&ctx);
        assert_eq!(chain.len(), 1);
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("derive from itself")));
    }

    #[test]
    fn test_namespace_tagging_on_inherited_entries() {
        let mut ctx = context();
        let mut types_ns = Namespace::new("types.yaml");
        types_ns.add_def(
            "Base",
            parse_map(
                "derived_from: tosca.nodes.Root\nproperties:\n  endpoint: {type: Settings}\n",
            ),
        );
        ctx.namespaces.register(types_ns.clone());

        let mut main = Namespace::new("main.yaml");
        main.add_with_prefix(&types_ns, "ext");
        main.add_def("Mine", parse_map("derived_from: ext.Base"));
        ctx.namespaces.register(main);

        let mine = EntityType::resolve(&ctx, TypeKind::Node, "Mine", "main.yaml").expect("found");
        // derivation holds under global identities, across the prefix
        assert!(mine.is_derived_from(&ctx, "Base@types.yaml"));
        for ancestor in mine.ancestors(&ctx) {
            assert!(mine.is_derived_from(&ctx, ancestor.global_name()));
        }
        let props = mine.get_definition(&ctx, "properties").expect("properties");
        let endpoint = props.as_map().unwrap().get_map("endpoint").expect("entry");
        assert_eq!(endpoint.get_str(NAMESPACE_KEY), Some("types.yaml"));

        let defs = mine.properties_def(&ctx);
        assert_eq!(defs["endpoint"].namespace_id, "types.yaml");
    }
}
