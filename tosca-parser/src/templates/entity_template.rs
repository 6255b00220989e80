//! The template base shared by nodes, relationships, groups and policies
//!
//! Construction resolves the template's type, materializes properties
//! (assignment, else type default), instantiates capabilities and builds
//! interface operations. Validation happens in a separate pass so that a
//! template with structural problems still materializes as far as it can.

use crate::context::ParseContext;
use crate::templates::capability::Capability;
use crate::templates::property::Property;
use crate::types::capability_type::CapabilityTypeDef;
use crate::types::entity_type::{EntityType, TypeKind, NAMESPACE_KEY};
use crate::types::interfaces::{self, Operation};
use indexmap::IndexMap;
use tosca_core::error::ToscaError;
use tosca_core::schema::{property_types, Schema};
use tosca_core::value::{Mapping, Value};

/// Which kind of template is being instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Node template
    Node,
    /// Relationship template
    Relationship,
    /// Group template
    Group,
    /// Policy template
    Policy,
}

impl TemplateKind {
    fn type_kind(self) -> TypeKind {
        match self {
            Self::Node => TypeKind::Node,
            Self::Relationship => TypeKind::Relationship,
            Self::Group => TypeKind::Group,
            Self::Policy => TypeKind::Policy,
        }
    }

    fn sections(self) -> &'static [&'static str] {
        match self {
            Self::Node => &[
                "type",
                "description",
                "metadata",
                "directives",
                "properties",
                "attributes",
                "requirements",
                "capabilities",
                "interfaces",
                "artifacts",
                "node_filter",
                "copy",
            ],
            Self::Relationship => &[
                "type",
                "description",
                "metadata",
                "properties",
                "attributes",
                "interfaces",
                "copy",
                "default_for",
            ],
            Self::Group => &[
                "type",
                "description",
                "metadata",
                "properties",
                "members",
                "interfaces",
            ],
            Self::Policy => &[
                "type",
                "description",
                "metadata",
                "properties",
                "targets",
                "triggers",
            ],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Node => "node template",
            Self::Relationship => "relationship template",
            Self::Group => "group",
            Self::Policy => "policy",
        }
    }
}

/// A concrete typed instance in a topology
#[derive(Debug, Clone)]
pub struct EntityTemplate {
    /// Template name, unique within its collection
    pub name: String,
    /// Which kind of template this is
    pub kind: TemplateKind,
    /// The raw template body
    pub entity_tpl: Mapping,
    /// Namespace type references resolve in
    pub namespace_id: String,
    /// The resolved type; absent when the type is missing or deferred
    pub type_definition: Option<EntityType>,
    /// Template directives (`select`, `substitute`, `default`)
    pub directives: Vec<String>,
    /// Materialized properties
    pub properties: IndexMap<String, Property>,
    /// Materialized capabilities
    pub capabilities: IndexMap<String, Capability>,
    /// Materialized interface operations
    pub interfaces: Vec<Operation>,
    /// Whether undeclared properties are permitted (type metadata)
    pub additional_properties: bool,
}

impl EntityTemplate {
    /// Instantiate a template against its type
    #[must_use]
    pub fn new(
        ctx: &ParseContext,
        name: &str,
        entity_tpl: &Mapping,
        kind: TemplateKind,
        namespace_id: &str,
    ) -> Self {
        let what = format!("{} \"{name}\"", kind.label());
        for key in entity_tpl.keys() {
            if !kind.sections().contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field(what.clone(), key));
            }
        }

        let directives = Self::parse_directives(ctx, entity_tpl, &what);

        let type_definition = match entity_tpl.get_str("type") {
            Some(type_name) => EntityType::resolve(ctx, kind.type_kind(), type_name, namespace_id),
            None => {
                // typing may be deferred by a directive; otherwise required
                if !directives.iter().any(|d| d == "select" || d == "substitute") {
                    ctx.collector
                        .append(ToscaError::missing_field(what.clone(), "type"));
                }
                None
            }
        };

        // undeclared properties are rejected unless the type's metadata
        // opts in
        let additional_properties = type_definition
            .as_ref()
            .and_then(|def| def.get_definition(ctx, "metadata"))
            .and_then(|metadata| {
                metadata
                    .as_map()
                    .and_then(|metadata| metadata.get_bool("additionalProperties"))
            })
            .unwrap_or(false);

        let mut template = Self {
            name: name.to_string(),
            kind,
            entity_tpl: entity_tpl.clone(),
            namespace_id: namespace_id.to_string(),
            type_definition,
            directives,
            properties: IndexMap::new(),
            capabilities: IndexMap::new(),
            interfaces: Vec::new(),
            additional_properties,
        };
        template.create_properties(ctx);
        template.create_capabilities(ctx);
        template.create_interfaces(ctx);
        template
    }

    fn parse_directives(ctx: &ParseContext, entity_tpl: &Mapping, what: &str) -> Vec<String> {
        match entity_tpl.get("directives") {
            None => Vec::new(),
            Some(Value::List(items)) => {
                let mut directives = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(directive) => directives.push(directive.to_string()),
                        None => ctx.collector.append(ToscaError::validation(format!(
                            "directives of {what} must be a list of strings"
                        ))),
                    }
                }
                directives
            }
            Some(_) => {
                ctx.collector.append(ToscaError::validation(format!(
                    "directives of {what} must be a list of strings"
                )));
                Vec::new()
            }
        }
    }

    /// The template's type name
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_definition.as_ref().map(EntityType::type_name)
    }

    /// True if the template's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.type_definition
            .as_ref()
            .is_some_and(|def| def.is_derived_from(ctx, type_name))
    }

    /// True if the template carries the given directive
    #[must_use]
    pub fn has_directive(&self, directive: &str) -> bool {
        self.directives.iter().any(|d| d == directive)
    }

    /// The value of a materialized property
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|property| &property.value)
    }

    /// A materialized capability by name
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    fn create_properties(&mut self, ctx: &ParseContext) {
        let Some(type_definition) = &self.type_definition else {
            return;
        };
        let assigned = type_definition
            .get_value(ctx, "properties", Some(&self.entity_tpl), false, false, false)
            .and_then(|value| value.as_map().cloned())
            .unwrap_or_default();
        let definitions = type_definition.properties_def(ctx);

        for (name, value) in &assigned {
            if let Some(def) = definitions.get(name) {
                self.properties.insert(
                    name.clone(),
                    Property::new(name, value.clone(), def.schema.clone(), &def.namespace_id),
                );
            } else if self.additional_properties {
                let mut any = Mapping::new();
                any.insert("type".into(), Value::String(property_types::ANY.into()));
                let schema = Schema::new(name, &any, None, &ctx.collector);
                self.properties.insert(
                    name.clone(),
                    Property::new(name, value.clone(), schema, &self.namespace_id),
                );
            }
        }
        for (name, def) in &definitions {
            if !assigned.contains_key(name) {
                if let Some(default) = &def.schema.default {
                    self.properties.insert(
                        name.clone(),
                        Property::new(name, default.clone(), def.schema.clone(), &def.namespace_id),
                    );
                }
            }
        }
    }

    fn create_capabilities(&mut self, ctx: &ParseContext) {
        let Some(type_definition) = &self.type_definition else {
            return;
        };
        let merged = type_definition
            .get_value(ctx, "capabilities", Some(&self.entity_tpl), true, false, true)
            .and_then(|value| value.as_map().cloned())
            .unwrap_or_default();
        let declared = type_definition.capabilities_def(ctx);

        for (name, entry) in &merged {
            if name.starts_with('!') || name.starts_with('_') {
                continue;
            }
            let Some(entry) = entry.as_map() else {
                continue;
            };
            let Some(declaration) = declared.get(name) else {
                // unknown capability names surface during validation
                continue;
            };
            let declaration = self.narrowed_declaration(ctx, declaration, entry);
            let mut properties = IndexMap::new();
            let definitions = declaration.properties_def(ctx);
            for (prop_name, def) in &definitions {
                if let Some(default) = &def.schema.default {
                    properties.insert(
                        prop_name.clone(),
                        Property::new(prop_name, default.clone(), def.schema.clone(), &def.namespace_id),
                    );
                }
            }
            if let Some(assigned) = entry.get_map("properties") {
                for (prop_name, value) in assigned {
                    if let Some(def) = definitions.get(prop_name) {
                        properties.insert(
                            prop_name.clone(),
                            Property::new(prop_name, value.clone(), def.schema.clone(), &def.namespace_id),
                        );
                    }
                }
            }
            self.capabilities.insert(
                name.clone(),
                Capability {
                    name: name.clone(),
                    type_def: declaration.type_def.clone(),
                    properties,
                },
            );
        }
    }

    /// A template may narrow a capability to a type derived from the
    /// declared one
    fn narrowed_declaration(
        &self,
        ctx: &ParseContext,
        declaration: &CapabilityTypeDef,
        entry: &Mapping,
    ) -> CapabilityTypeDef {
        let Some(assigned_type) = entry.get_str("type") else {
            return declaration.clone();
        };
        if Some(assigned_type) == declaration.type_name() {
            return declaration.clone();
        }
        let namespace = entry.get_str(NAMESPACE_KEY).unwrap_or(&self.namespace_id);
        let mut narrowed = declaration.clone();
        narrowed.type_def =
            EntityType::resolve(ctx, TypeKind::Capability, assigned_type, namespace);
        narrowed
    }

    fn create_interfaces(&mut self, ctx: &ParseContext) {
        let Some(type_definition) = &self.type_definition else {
            return;
        };
        let template_interfaces = self
            .entity_tpl
            .get_map("interfaces");
        self.interfaces = interfaces::create_operations(
            ctx,
            type_definition,
            template_interfaces,
            &format!("template \"{}\"", self.name),
        );
    }

    /// Whether property values should be validated for this template
    ///
    /// `select` and `substitute` templates defer to their eventual match.
    #[must_use]
    pub fn should_validate_properties(&self) -> bool {
        !self.has_directive("select") && !self.has_directive("substitute")
    }

    /// Validate required/unknown properties and every property value
    pub fn validate(&self, ctx: &ParseContext) {
        let Some(type_definition) = &self.type_definition else {
            return;
        };
        if !self.should_validate_properties() {
            return;
        }
        let what = format!("\"properties\" of {} \"{}\"", self.kind.label(), self.name);
        let definitions = type_definition.properties_def(ctx);
        let assigned = type_definition
            .get_value(ctx, "properties", Some(&self.entity_tpl), false, false, false)
            .and_then(|value| value.as_map().cloned())
            .unwrap_or_default();

        if !self.additional_properties {
            for name in assigned.keys() {
                if !definitions.contains_key(name) {
                    ctx.collector
                        .append(ToscaError::unknown_field(what.clone(), name));
                }
            }
        }
        let missing: Vec<&str> = definitions
            .iter()
            .filter(|(name, def)| {
                def.schema.required
                    && def.schema.default.is_none()
                    && !assigned.contains_key(*name)
            })
            .map(|(name, _)| name.as_str())
            .collect();
        if !missing.is_empty() {
            ctx.collector
                .append(ToscaError::missing_field(what, missing.join(", ")));
        }

        for property in self.properties.values() {
            property.validate(ctx);
        }
        self.validate_capabilities(ctx);
    }

    fn validate_capabilities(&self, ctx: &ParseContext) {
        let Some(type_definition) = &self.type_definition else {
            return;
        };
        // capability names assigned on the template must be declared
        if let Some(assigned) = self.entity_tpl.get_map("capabilities") {
            let declared = type_definition.capabilities_def(ctx);
            for name in assigned.keys() {
                if !declared.contains_key(name) {
                    ctx.collector.append(ToscaError::unknown_field(
                        format!("\"capabilities\" of {} \"{}\"", self.kind.label(), self.name),
                        name,
                    ));
                }
            }
        }
        for capability in self.capabilities.values() {
            capability.validate(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use pretty_assertions::assert_eq;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn test_properties_materialize_with_defaults() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map("type: tosca.nodes.DBMS\nproperties:\n  port: 5432\n");
        let template = EntityTemplate::new(&ctx, "dbms", &tpl, TemplateKind::Node, "");
        assert_eq!(template.property_value("port"), Some(&Value::Integer(5432)));
        template.validate(&ctx);
        assert!(ctx.collector.is_empty(), "{:?}", ctx.collector.report());
    }

    #[test]
    fn test_unknown_template_section() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map("type: tosca.nodes.Compute\npropertis: {}\n");
        EntityTemplate::new(&ctx, "server", &tpl, TemplateKind::Node, "");
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("propertis")));
    }

    #[test]
    fn test_capabilities_materialize_with_assignments() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map(
            "type: tosca.nodes.Compute\ncapabilities:\n  host:\n    properties:\n      num_cpus: 4\n",
        );
        let template = EntityTemplate::new(&ctx, "server", &tpl, TemplateKind::Node, "");
        let host = template.capability("host").expect("host capability");
        assert_eq!(host.property_value("num_cpus"), Some(&Value::Integer(4)));
        // type-declared capabilities materialize even without assignments
        assert!(template.capability("os").is_some());
        assert!(template.capability("feature").is_some());
        template.validate(&ctx);
        assert!(ctx.collector.is_empty(), "{:?}", ctx.collector.report());
    }

    #[test]
    fn test_capability_constraint_violation() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map(
            "type: tosca.nodes.Compute\ncapabilities:\n  host:\n    properties:\n      num_cpus: 0\n",
        );
        let template = EntityTemplate::new(&ctx, "server", &tpl, TemplateKind::Node, "");
        template.validate(&ctx);
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("greater_or_equal")));
    }

    #[test]
    fn test_unknown_capability_name() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map("type: tosca.nodes.Compute\ncapabilities:\n  no_such_cap: {}\n");
        let template = EntityTemplate::new(&ctx, "server", &tpl, TemplateKind::Node, "");
        template.validate(&ctx);
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("no_such_cap")));
    }

    #[test]
    fn test_select_directive_defers_validation() {
        let ctx = ParseContext::new(ParserConfig::default());
        // BlockStorage requires "size"; with the select directive the
        // template only has to be well-formed
        let tpl = parse_map("type: tosca.nodes.BlockStorage\ndirectives: [select]\n");
        let template = EntityTemplate::new(&ctx, "volume", &tpl, TemplateKind::Node, "");
        template.validate(&ctx);
        assert!(ctx.collector.is_empty(), "{:?}", ctx.collector.report());
    }

    #[test]
    fn test_missing_required_property() {
        let ctx = ParseContext::new(ParserConfig::default());
        let tpl = parse_map("type: tosca.nodes.BlockStorage\n");
        let template = EntityTemplate::new(&ctx, "volume", &tpl, TemplateKind::Node, "");
        template.validate(&ctx);
        let report = ctx.collector.report();
        assert!(report.iter().any(|line| line.contains("size")));
    }
}
