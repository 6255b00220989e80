//! Import-list traversal and namespace population
//!
//! Walks the `imports` section of a document, loading each referenced
//! document at most once per canonical location, registering a namespace
//! for it, recursing into its own imports, and copying its definitions into
//! the importer under the requested prefix. Cycles are tolerated: a
//! location that is already registered is reused as-is.

use crate::builtin::TYPE_DEFINITION_SECTIONS;
use crate::context::ParseContext;
use crate::namespace::Namespace;
use crate::resolver::{ImportResolver, ImportSpec};
use indexmap::IndexMap;
use std::collections::HashSet;
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};
use tracing::debug;

/// Recognized keys of a mapping-form import
pub const IMPORT_KEYS: &[&str] = &[
    "file",
    "repository",
    "namespace_uri",
    "namespace_prefix",
    "when",
];

/// Loads the transitive import graph of one document
pub struct ImportLoader<'a> {
    resolver: &'a dyn ImportResolver,
    /// Repositories visible to import resolution, merged across documents
    pub repositories: Mapping,
    /// Every loaded document by canonical location, with its namespace_id
    pub nested_documents: IndexMap<String, (Mapping, String)>,
}

impl<'a> ImportLoader<'a> {
    /// Create a loader over the given resolver and the root document's
    /// repositories
    #[must_use]
    pub fn new(resolver: &'a dyn ImportResolver, repositories: Mapping) -> Self {
        Self {
            resolver,
            repositories,
            nested_documents: IndexMap::new(),
        }
    }

    /// Build the root namespace: load the document's imports, then add its
    /// own type definitions (which win over imported names)
    ///
    /// Returns the root namespace_id.
    pub fn load_root(
        &mut self,
        ctx: &mut ParseContext,
        document: &Mapping,
        location: Option<&str>,
    ) -> String {
        let namespace_id = document
            .get_str("namespace")
            .or(location)
            .unwrap_or_default()
            .to_string();
        let mut namespace = Namespace::new(namespace_id.clone());
        if document
            .get_map("metadata")
            .and_then(|metadata| metadata.get_bool("global_namespace"))
            .unwrap_or(false)
        {
            namespace.global = Some(namespace_id.clone());
        }
        ctx.namespaces.register(namespace);

        if let Some(imports) = document.get("imports") {
            match imports.as_list() {
                Some(imports) => {
                    debug!(count = imports.len(), "loading imports");
                    self.load_imports(ctx, imports, &namespace_id, location, 0);
                }
                None => ctx.collector.append(ToscaError::type_mismatch(
                    "\"imports\" section",
                    "list",
                )),
            }
        }

        self.collect_definitions(ctx, document, &namespace_id);
        namespace_id
    }

    /// Process one document's import list into the importing namespace
    fn load_imports(
        &mut self,
        ctx: &mut ParseContext,
        imports: &[Value],
        importer_id: &str,
        base_location: Option<&str>,
        depth: usize,
    ) {
        if imports.is_empty() {
            ctx.collector.append(ToscaError::validation(
                "\"imports\" keyname is defined without including templates",
            ));
            return;
        }
        if depth >= ctx.config.max_import_depth {
            ctx.collector.append(ToscaError::import(
                base_location.unwrap_or("pre-parsed input"),
                format!("maximum import depth ({}) exceeded", ctx.config.max_import_depth),
            ));
            return;
        }

        let mut import_names = HashSet::new();
        for import_tpl in imports {
            let Some(spec) = self.parse_import(ctx, import_tpl, &mut import_names) else {
                continue;
            };
            let resolved = match self.resolver.resolve(base_location, &self.repositories, &spec) {
                Ok(resolved) => resolved,
                Err(err) => {
                    ctx.collector.append(err);
                    continue;
                }
            };

            let prefix = spec.namespace_prefix.clone().unwrap_or_default();
            if ctx.namespaces.contains(&resolved.location) {
                // already loaded (or mid-load on a cycle): reuse the cache
                self.merge_into(ctx, importer_id, &resolved.location, &prefix);
                continue;
            }

            let document = match self.resolver.load(&resolved) {
                Ok(Value::Map(document)) => document,
                Ok(other) => {
                    ctx.collector.append(ToscaError::import(
                        &resolved.location,
                        format!("imported document is a {}, not a map", other.type_name()),
                    ));
                    continue;
                }
                Err(err) => {
                    ctx.collector.append(err);
                    continue;
                }
            };
            self.validate_imported_document(ctx, &document, &resolved.location);

            ctx.namespaces.register(Namespace::new(resolved.location.clone()));
            if let Some(repositories) = document.get_map("repositories") {
                for (name, definition) in repositories {
                    if !self.repositories.contains_key(name) {
                        self.repositories.insert(name.clone(), definition.clone());
                    }
                }
            }

            if let Some(nested_imports) = document.get("imports") {
                match nested_imports.as_list() {
                    Some(nested) => self.load_imports(
                        ctx,
                        nested,
                        &resolved.location,
                        Some(&resolved.location),
                        depth + 1,
                    ),
                    None => ctx.collector.append(ToscaError::type_mismatch(
                        format!("\"imports\" section of \"{}\"", resolved.location),
                        "list",
                    )),
                }
            }

            self.collect_definitions(ctx, &document, &resolved.location);
            self.nested_documents
                .insert(resolved.location.clone(), (document, resolved.location.clone()));
            self.merge_into(ctx, importer_id, &resolved.location, &prefix);
        }
    }

    /// Normalize one entry of the imports list
    fn parse_import(
        &self,
        ctx: &ParseContext,
        import_tpl: &Value,
        import_names: &mut HashSet<String>,
    ) -> Option<ImportSpec> {
        match import_tpl {
            Value::String(file) => Some(ImportSpec {
                file: file.clone(),
                ..ImportSpec::default()
            }),
            Value::Map(map) if map.len() == 1 && !map.contains_key("file") => {
                // old style {name: uri}
                let (name, uri) = map.iter().next()?;
                if !import_names.insert(name.clone()) {
                    ctx.collector
                        .append(ToscaError::DuplicateImportName { name: name.clone() });
                }
                match uri {
                    Value::String(file) => Some(ImportSpec {
                        file: file.clone(),
                        name: Some(name.clone()),
                        ..ImportSpec::default()
                    }),
                    Value::Map(definition) => {
                        let mut spec = self.mapping_import(ctx, definition, Some(name))?;
                        spec.name = Some(name.clone());
                        Some(spec)
                    }
                    other => {
                        ctx.collector.append(ToscaError::validation(format!(
                            "import \"{name}\" has an invalid definition: {other}"
                        )));
                        None
                    }
                }
            }
            Value::Map(map) => self.mapping_import(ctx, map, None),
            other => {
                ctx.collector.append(ToscaError::validation(format!(
                    "invalid import definition: {other}"
                )));
                None
            }
        }
    }

    fn mapping_import(
        &self,
        ctx: &ParseContext,
        definition: &Mapping,
        name: Option<&str>,
    ) -> Option<ImportSpec> {
        let what = match name {
            Some(name) => format!("import of template \"{name}\""),
            None => "import definition".to_string(),
        };
        for key in definition.keys() {
            if !IMPORT_KEYS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field(what.clone(), key));
            }
        }
        let Some(file) = definition.get_str("file") else {
            ctx.collector
                .append(ToscaError::missing_field(what, "file"));
            return None;
        };
        Some(ImportSpec {
            file: file.to_string(),
            repository: definition.get_str("repository").map(str::to_string),
            namespace_prefix: definition.get_str("namespace_prefix").map(str::to_string),
            namespace_uri: definition.get_str("namespace_uri").map(str::to_string),
            when: definition.get("when").cloned(),
            name: None,
        })
    }

    /// Imported documents must themselves be valid definitions documents
    fn validate_imported_document(&self, ctx: &ParseContext, document: &Mapping, location: &str) {
        match document.get_str("tosca_definitions_version") {
            None => ctx.collector.append(ToscaError::missing_field(
                format!("imported template \"{location}\""),
                "tosca_definitions_version",
            )),
            Some(version) if !ctx.config.is_valid_version(version) => {
                ctx.collector.append(ToscaError::InvalidTemplateVersion {
                    version: version.to_string(),
                    valid_versions: ctx.config.valid_versions(),
                });
            }
            Some(_) => {}
        }
    }

    /// Gather a document's type definitions into its namespace
    fn collect_definitions(&self, ctx: &mut ParseContext, document: &Mapping, namespace_id: &str) {
        let Some(namespace) = ctx.namespaces.get_mut(namespace_id) else {
            return;
        };
        for section in TYPE_DEFINITION_SECTIONS {
            let Some(types) = document.get_map(section) else {
                continue;
            };
            for (name, definition) in types {
                match definition.as_map() {
                    Some(definition) => namespace.add_def(name, definition.clone()),
                    None => ctx.collector.append(ToscaError::invalid_type_definition(
                        name,
                        format!("definition must be a map, not a {}", definition.type_name()),
                    )),
                }
            }
        }
    }

    /// Copy a loaded namespace into the importer under a prefix
    fn merge_into(&self, ctx: &mut ParseContext, importer_id: &str, imported_id: &str, prefix: &str) {
        let Some(imported) = ctx.namespaces.get(imported_id).cloned() else {
            return;
        };
        if let Some(importer) = ctx.namespaces.get_mut(importer_id) {
            importer.add_with_prefix(&imported, prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::resolver::DefaultResolver;
    use std::fs;
    use tempfile::TempDir;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    fn write(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, body).expect("writes");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_prefixed_import_is_visible() {
        let dir = TempDir::new().expect("temp dir");
        write(
            &dir,
            "types.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\nnode_types:\n  X:\n    derived_from: tosca.nodes.Root\n",
        );
        let root_path = write(
            &dir,
            "main.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\n",
        );

        let mut ctx = ParseContext::new(ParserConfig::default());
        let resolver = DefaultResolver::new();
        let mut loader = ImportLoader::new(&resolver, Mapping::new());
        let document = parse_map(
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports:\n  - {file: types.yaml, namespace_prefix: ext}\n",
        );
        let root_id = loader.load_root(&mut ctx, &document, Some(&root_path));

        let root_ns = ctx.namespaces.get(&root_id).expect("root namespace");
        assert!(root_ns.defs.contains_key("ext.X"));
        let types_path = dir.path().join("types.yaml").to_string_lossy().into_owned();
        assert_eq!(root_ns.get_global_name("ext.X"), format!("X@{types_path}"));
        assert!(ctx.collector.is_empty(), "{:?}", ctx.collector.report());
    }

    #[test]
    fn test_duplicate_import_name_collected() {
        let dir = TempDir::new().expect("temp dir");
        write(
            &dir,
            "a.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\n",
        );
        let root_path = write(
            &dir,
            "main.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\n",
        );

        let mut ctx = ParseContext::new(ParserConfig::default());
        let resolver = DefaultResolver::new();
        let mut loader = ImportLoader::new(&resolver, Mapping::new());
        let document = parse_map(
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports:\n  - {common: a.yaml}\n  - {common: a.yaml}\n",
        );
        loader.load_root(&mut ctx, &document, Some(&root_path));
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("duplicate import name")));
    }

    #[test]
    fn test_cyclic_imports_terminate() {
        let dir = TempDir::new().expect("temp dir");
        let a_path = dir.path().join("a.yaml").to_string_lossy().into_owned();
        write(
            &dir,
            "a.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports: [b.yaml]\nnode_types:\n  A:\n    derived_from: tosca.nodes.Root\n",
        );
        write(
            &dir,
            "b.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports: [a.yaml]\nnode_types:\n  B:\n    derived_from: tosca.nodes.Root\n",
        );
        let root_path = write(
            &dir,
            "main.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\n",
        );

        let mut ctx = ParseContext::new(ParserConfig::default());
        let resolver = DefaultResolver::new();
        let mut loader = ImportLoader::new(&resolver, Mapping::new());
        let document = parse_map(
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports: [a.yaml]\n",
        );
        let root_id = loader.load_root(&mut ctx, &document, Some(&root_path));

        let root_ns = ctx.namespaces.get(&root_id).expect("root namespace");
        assert!(root_ns.defs.contains_key("A"));
        assert!(root_ns.defs.contains_key("B"));
        assert!(ctx.namespaces.contains(&a_path));
    }

    #[test]
    fn test_unknown_import_key_collected() {
        let mut ctx = ParseContext::new(ParserConfig::default());
        let resolver = DefaultResolver::new();
        let mut loader = ImportLoader::new(&resolver, Mapping::new());
        let document = parse_map(
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports:\n  - {file: /abs/types.yaml, namespce_prefix: typo}\n",
        );
        loader.load_root(&mut ctx, &document, None);
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("namespce_prefix")));
    }

    #[test]
    fn test_missing_import_file_collected() {
        let dir = TempDir::new().expect("temp dir");
        let root_path = write(
            &dir,
            "main.yaml",
            "tosca_definitions_version: tosca_simple_yaml_1_3\n",
        );
        let mut ctx = ParseContext::new(ParserConfig::default());
        let resolver = DefaultResolver::new();
        let mut loader = ImportLoader::new(&resolver, Mapping::new());
        let document = parse_map(
            "tosca_definitions_version: tosca_simple_yaml_1_3\nimports:\n  - missing-types.yaml\n",
        );
        loader.load_root(&mut ctx, &document, Some(&root_path));
        assert!(ctx.collector.caught());
    }
}
