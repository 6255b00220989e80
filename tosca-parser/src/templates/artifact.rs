//! Artifacts declared on node types and templates
//!
//! The short form (a bare string) expands to a root-typed artifact. A
//! type-declared artifact without a `file` is not an artifact at all but a
//! required-artifact shape the template must satisfy.

use crate::context::ParseContext;
use crate::types::{EntityType, TypeKind};
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// Recognized keys of an artifact definition
pub const ARTIFACT_KEYS: &[&str] = &[
    "type",
    "file",
    "repository",
    "description",
    "metadata",
    "deploy_path",
    "version",
    "checksum",
    "checksum_algorithm",
    "permissions",
    "intent",
    "target",
    "contents",
    "order",
    "dependencies",
    "properties",
    "attributes",
    "interfaces",
];

/// An artifact attached to a node
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Artifact name
    pub name: String,
    /// The resolved artifact type
    pub type_def: Option<EntityType>,
    /// The artifact's file reference
    pub file: Option<String>,
    /// Repository the file lives in
    pub repository: Option<String>,
    /// Target path on deployment
    pub deploy_path: Option<String>,
    /// The full normalized definition
    pub definition: Mapping,
}

impl Artifact {
    /// Parse an artifact definition (string short form or mapping)
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, definition: &Value, namespace_id: &str) -> Self {
        let normalized = match definition {
            Value::String(file) => {
                let mut map = Mapping::new();
                map.insert("file".into(), Value::String(file.clone()));
                map.insert("type".into(), Value::String("tosca.artifacts.Root".into()));
                map
            }
            Value::Map(map) => {
                let mut map = map.clone();
                if !map.contains_key("type") {
                    map.insert("type".into(), Value::String("tosca.artifacts.Root".into()));
                }
                map
            }
            other => {
                ctx.collector.append(ToscaError::type_mismatch(
                    format!("artifact \"{name}\" ({other})"),
                    "map or string",
                ));
                Mapping::new()
            }
        };

        for key in normalized.keys() {
            if key.starts_with('!') || key.starts_with('_') {
                continue;
            }
            if !ARTIFACT_KEYS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field(format!("artifact \"{name}\""), key));
            }
        }
        if !normalized.is_empty() && !normalized.contains_key("file") {
            ctx.collector.append(ToscaError::missing_field(
                format!("artifact \"{name}\""),
                "file",
            ));
        }
        if normalized
            .get("permissions")
            .is_some_and(|permissions| permissions.as_str().is_none())
        {
            ctx.collector.append(ToscaError::type_mismatch(
                format!("permissions field on artifact \"{name}\""),
                "string",
            ));
        }

        let type_def = normalized
            .get_str("type")
            .and_then(|type_name| EntityType::resolve(ctx, TypeKind::Artifact, type_name, namespace_id));

        Self {
            name: name.to_string(),
            type_def,
            file: normalized.get_str("file").map(str::to_string),
            repository: normalized.get_str("repository").map(str::to_string),
            deploy_path: normalized.get_str("deploy_path").map(str::to_string),
            definition: normalized,
        }
    }

    /// True if the artifact's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.type_def
            .as_ref()
            .is_some_and(|def| def.is_derived_from(ctx, type_name))
    }

    /// MIME type declared on the artifact's type
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.type_def
            .as_ref()
            .and_then(|def| def.defs().get_str("mime_type"))
    }
}
