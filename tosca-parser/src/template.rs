//! The top-level template model and parse entry points
//!
//! `ToscaParser` drives a whole parse: the root document is loaded (or
//! supplied pre-parsed), imports are resolved into namespaces, the topology
//! is instantiated, requirements are bound, nested topologies are wired for
//! substitution, and every collected error is raised as one aggregate.

use crate::config::ParserConfig;
use crate::context::ParseContext;
use crate::imports::ImportLoader;
use crate::repository::Repository;
use crate::resolver::{DefaultResolver, ImportResolver, ResolvedImport};
use crate::templates::requirements::resolve_requirements;
use crate::topology::TopologyTemplate;
use crate::types::entity_type::{EntityType, TypeKind};
use crate::types::data_type;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use tosca_core::error::{Result, ToscaError};
use tosca_core::value::{Mapping, Value};
use tracing::{debug, info};

/// Recognized top-level keys of a TOSCA document
pub const TOP_LEVEL_SECTIONS: &[&str] = &[
    "tosca_definitions_version",
    "namespace",
    "template_name",
    "topology_template",
    "template_author",
    "template_version",
    "description",
    "imports",
    "dsl_definitions",
    "types",
    "node_types",
    "relationship_types",
    "relationship_templates",
    "capability_types",
    "artifact_types",
    "data_types",
    "interface_types",
    "policy_types",
    "group_types",
    "repositories",
    "metadata",
    "decorators",
];

/// A fully parsed and resolved TOSCA model
#[derive(Debug)]
pub struct ToscaTemplate {
    /// The declared `tosca_definitions_version`
    pub version: Option<String>,
    /// The document's description
    pub description: Option<String>,
    /// The document's metadata
    pub metadata: Option<Mapping>,
    /// The root topology
    pub topology: TopologyTemplate,
    /// Repositories merged across the document set
    pub repositories: IndexMap<String, Repository>,
    /// Topologies found in imported documents, by canonical location
    pub nested_topologies: IndexMap<String, TopologyTemplate>,
    /// Every error collected during the parse (non-empty only with
    /// `verify` off)
    pub errors: Vec<String>,
    /// The root document's location, when parsed from one
    pub input_path: Option<String>,
}

impl ToscaTemplate {
    /// Node templates of the root topology
    pub fn nodetemplates(&self) -> impl Iterator<Item = &crate::templates::NodeTemplate> {
        self.topology.node_templates.values()
    }

    /// Declared relationship templates of the root topology
    #[must_use]
    pub fn relationship_templates(
        &self,
    ) -> &IndexMap<String, crate::templates::RelationshipTemplate> {
        &self.topology.relationship_templates
    }

    /// Inputs of the root topology
    #[must_use]
    pub fn inputs(&self) -> &IndexMap<String, crate::templates::Input> {
        &self.topology.inputs
    }

    /// Outputs of the root topology
    #[must_use]
    pub fn outputs(&self) -> &IndexMap<String, crate::templates::Output> {
        &self.topology.outputs
    }

    /// Groups of the root topology
    #[must_use]
    pub fn groups(&self) -> &IndexMap<String, crate::templates::Group> {
        &self.topology.groups
    }

    /// Policies of the root topology
    #[must_use]
    pub fn policies(&self) -> &[crate::templates::Policy] {
        &self.topology.policies
    }

    /// Workflows of the root topology
    #[must_use]
    pub fn workflows(&self) -> &IndexMap<String, crate::templates::Workflow> {
        &self.topology.workflows
    }
}

/// Parses TOSCA documents into [`ToscaTemplate`] models
#[derive(Debug, Clone)]
pub struct ToscaParser {
    config: ParserConfig,
    resolver: Arc<dyn ImportResolver>,
}

impl Default for ToscaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToscaParser {
    /// A parser with default configuration and the bundled resolver
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
            resolver: Arc::new(DefaultResolver::new()),
        }
    }

    /// A parser with the given configuration
    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(DefaultResolver::new()),
        }
    }

    /// Replace the resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ImportResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Parse a local template file (`.yaml`/`.yml`, or a CSAR archive the
    /// resolver can unpack)
    ///
    /// # Errors
    ///
    /// Fatal errors (unreadable or non-mapping root document, unsupported
    /// extension) return immediately; collected validation errors are
    /// raised as one [`ToscaError::Aggregate`] unless `verify` is off.
    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        parsed_params: Option<&Mapping>,
    ) -> Result<ToscaTemplate> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let lowered = path.to_lowercase();
        let location = if lowered.ends_with(".yaml") || lowered.ends_with(".yml") {
            path
        } else if lowered.ends_with(".zip") || lowered.ends_with(".csar") {
            self.resolver.extract_archive(&path)?
        } else {
            return Err(ToscaError::validation(format!(
                "\"{path}\" is not a valid file"
            )));
        };
        let document = self.load_root(&location, true)?;
        self.parse_document(document, Some(location), parsed_params)
    }

    /// Parse a template from a URL
    ///
    /// # Errors
    ///
    /// As [`Self::parse_file`].
    pub fn parse_url(&self, url: &str, parsed_params: Option<&Mapping>) -> Result<ToscaTemplate> {
        let document = self.load_root(url, false)?;
        self.parse_document(document, Some(url.to_string()), parsed_params)
    }

    /// Parse an already-parsed YAML tree
    ///
    /// Relative local imports cannot be resolved without `base_location`.
    ///
    /// # Errors
    ///
    /// As [`Self::parse_file`].
    pub fn parse_tree(
        &self,
        document: &Mapping,
        parsed_params: Option<&Mapping>,
        base_location: Option<&str>,
    ) -> Result<ToscaTemplate> {
        self.parse_document(
            document.clone(),
            base_location.map(str::to_string),
            parsed_params,
        )
    }

    fn load_root(&self, location: &str, is_local: bool) -> Result<Mapping> {
        let tree = self.resolver.load(&ResolvedImport {
            location: location.to_string(),
            is_local,
            fragment: None,
        })?;
        match tree {
            Value::Map(document) => Ok(document),
            other => Err(ToscaError::parse_at(
                format!("root document is a {}, not a map", other.type_name()),
                location,
            )),
        }
    }

    fn parse_document(
        &self,
        document: Mapping,
        location: Option<String>,
        parsed_params: Option<&Mapping>,
    ) -> Result<ToscaTemplate> {
        let mut ctx = ParseContext::new(self.config.clone());
        ctx.registry.reset();

        let version = document
            .get_str("tosca_definitions_version")
            .map(str::to_string);
        match version.as_deref() {
            None => ctx.collector.append(ToscaError::missing_field(
                "template",
                "tosca_definitions_version",
            )),
            Some(version) if !self.config.is_valid_version(version) => {
                ctx.collector.append(ToscaError::InvalidTemplateVersion {
                    version: version.to_string(),
                    valid_versions: self.config.valid_versions(),
                });
            }
            Some(_) => {}
        }
        for key in document.keys() {
            if !TOP_LEVEL_SECTIONS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field("template", key));
            }
        }

        let mut loader = ImportLoader::new(
            self.resolver.as_ref(),
            document.get_map("repositories").cloned().unwrap_or_default(),
        );
        let root_id = loader.load_root(&mut ctx, &document, location.as_deref());
        debug!(namespace = %root_id, "namespaces loaded");

        let mut repositories = IndexMap::new();
        for (name, definition) in &loader.repositories {
            let repository = self
                .resolver
                .get_repository(name, definition, &ctx.collector);
            if let Some(credential) = &repository.credential {
                data_type::validate_value(
                    &ctx,
                    "tosca.datatypes.Credential",
                    &Value::Map(credential.clone()),
                    &format!("credential of repository \"{name}\""),
                    &root_id,
                );
            }
            repositories.insert(name.clone(), repository);
        }

        let topology_tpl = document
            .get_map("topology_template")
            .cloned()
            .unwrap_or_default();
        let mut topology = TopologyTemplate::new(&ctx, &topology_tpl, &root_id, parsed_params);
        resolve_requirements(&ctx, &mut topology, None, Some(self.resolver.as_ref()));

        let mut nested_topologies = IndexMap::new();
        for (nested_location, (nested_document, namespace_id)) in &loader.nested_documents {
            let Some(nested_tpl) = nested_document.get_map("topology_template") else {
                continue;
            };
            let mut nested = TopologyTemplate::new(&ctx, nested_tpl, namespace_id, None);
            resolve_requirements(&ctx, &mut nested, Some(&topology), Some(self.resolver.as_ref()));
            nested_topologies.insert(nested_location.clone(), nested);
        }

        wire_substitutions(&ctx, &mut topology, &nested_topologies);

        ctx.collector.stop();
        let errors = ctx.collector.report();
        let location_label = location
            .as_deref()
            .map_or_else(|| "pre-parsed input".to_string(), |l| format!("\"{l}\""));
        if self.config.verify && !errors.is_empty() {
            return Err(ctx.collector.into_aggregate(&location_label));
        }
        info!("the input {location_label} passed validation with {} error(s)", errors.len());

        Ok(ToscaTemplate {
            version,
            description: document
                .get_str("description")
                .map(|description| description.trim_end().to_string()),
            metadata: document.get_map("metadata").cloned(),
            topology,
            repositories,
            nested_topologies,
            errors,
            input_path: location,
        })
    }
}

/// Link outer `substitute`-directive nodes to nested topologies exposing a
/// matching node type
fn wire_substitutions(
    ctx: &ParseContext,
    topology: &mut TopologyTemplate,
    nested_topologies: &IndexMap<String, TopologyTemplate>,
) {
    for (key, nested) in nested_topologies {
        let Some(exposed) = nested.exposed_node_type() else {
            continue;
        };
        let exposed = EntityType::lookup(ctx, TypeKind::Node, exposed, &nested.namespace_id)
            .map_or_else(|| exposed.to_string(), |t| t.global_name().to_string());
        for node in topology.node_templates.values_mut() {
            if node.substitution.is_none()
                && node.template.has_directive("substitute")
                && node.is_derived_from(ctx, &exposed)
            {
                node.substitution = Some(key.clone());
            }
        }
    }
}
