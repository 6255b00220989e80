//! Namespaces of type definitions
//!
//! Each loaded document becomes a namespace identified by its canonical
//! location. Imported definitions are copied into the importer, optionally
//! under a dotted prefix; prefixes compose across transitive imports. Every
//! definition keeps a `_source` tag naming where it was originally defined,
//! so global names stay correct no matter how many prefixes deep a type is
//! referenced from.

use indexmap::IndexMap;
use tosca_core::value::{Mapping, Value};

/// Key of the definition entry recording the original definition point
pub const SOURCE_KEY: &str = "_source";

/// A named scope of type definitions
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Canonical location of the defining document; empty for built-ins
    pub namespace_id: String,
    /// Local name (possibly prefixed) to raw type definition
    pub defs: Mapping,
    /// Imported namespace_id to the prefix its types appear under
    /// (empty string: imported without prefix)
    pub imports: IndexMap<String, String>,
    /// namespace_id of the shared global namespace, when one is designated
    pub global: Option<String>,
}

impl Namespace {
    /// Create an empty namespace
    #[must_use]
    pub fn new(namespace_id: impl Into<String>) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            ..Self::default()
        }
    }

    /// The `local_name@namespace_id` identity of a locally visible type
    ///
    /// When the definition carries a `_source` tag the original definition
    /// point wins; otherwise a prefixed name is resolved through the import
    /// table, and an unprefixed name belongs to this namespace.
    #[must_use]
    pub fn get_global_name(&self, local_name: &str) -> String {
        if self.namespace_id.is_empty() || !self.defs.contains_key(local_name) {
            return local_name.to_string();
        }
        if let Some(source) = self.defs.get_map(local_name).and_then(|def| def.get_map(SOURCE_KEY)) {
            if let (Some(name), Some(namespace_id)) =
                (source.get_str("local_name"), source.get_str("namespace_id"))
            {
                return format!("{name}@{namespace_id}");
            }
        }
        if local_name.contains('.') {
            for (imported_id, prefix) in &self.imports {
                if !prefix.is_empty() {
                    if let Some(stripped) = local_name.strip_prefix(&format!("{prefix}.")) {
                        return format!("{stripped}@{imported_id}");
                    }
                }
            }
        }
        format!("{local_name}@{}", self.namespace_id)
    }

    /// The name a globally identified type is visible under here, if any
    #[must_use]
    pub fn get_local_name(&self, global_name: &str) -> Option<String> {
        let (local, namespace_id) = match global_name.split_once('@') {
            Some(parts) => parts,
            // built-in type
            None => return Some(global_name.to_string()),
        };
        if namespace_id == self.namespace_id {
            return Some(local.to_string());
        }
        match self.imports.get(namespace_id) {
            Some(prefix) if prefix.is_empty() => Some(local.to_string()),
            Some(prefix) => Some(format!("{prefix}.{local}")),
            None => None,
        }
    }

    /// Copy another namespace's definitions into this one under `prefix`
    ///
    /// The other namespace's own imports are re-recorded here with the
    /// prefixes composed, so that `p` over `q` yields `p.q`.
    pub fn add_with_prefix(&mut self, imported: &Namespace, prefix: &str) {
        self.imports
            .insert(imported.namespace_id.clone(), prefix.to_string());
        for (name, def) in &imported.defs {
            if prefix.is_empty() {
                self.defs.insert(name.clone(), def.clone());
            } else {
                self.defs.insert(format!("{prefix}.{name}"), def.clone());
            }
        }
        for (transitive_id, transitive_prefix) in &imported.imports {
            let composed = if prefix.is_empty() {
                transitive_prefix.clone()
            } else if transitive_prefix.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{transitive_prefix}")
            };
            self.imports.insert(transitive_id.clone(), composed);
        }
    }

    /// Record a type definition, tagging its original definition point
    pub fn add_def(&mut self, local_name: &str, mut def: Mapping) {
        if !def.contains_key(SOURCE_KEY) && !self.namespace_id.is_empty() {
            let mut source = Mapping::new();
            source.insert("local_name".into(), Value::String(local_name.to_string()));
            source.insert(
                "namespace_id".into(),
                Value::String(self.namespace_id.clone()),
            );
            def.insert(SOURCE_KEY.into(), Value::Map(source));
        }
        self.defs.insert(local_name.to_string(), Value::Map(def));
    }
}

/// Every namespace created during one parse, keyed by namespace_id
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    all: IndexMap<String, Namespace>,
}

impl NamespaceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the namespace_id has been registered
    #[must_use]
    pub fn contains(&self, namespace_id: &str) -> bool {
        self.all.contains_key(namespace_id)
    }

    /// Register a namespace; re-registering an id keeps the first entry
    /// (cycle tolerance) and returns false
    pub fn register(&mut self, namespace: Namespace) -> bool {
        if self.all.contains_key(&namespace.namespace_id) {
            return false;
        }
        self.all.insert(namespace.namespace_id.clone(), namespace);
        true
    }

    /// Look up a namespace
    #[must_use]
    pub fn get(&self, namespace_id: &str) -> Option<&Namespace> {
        self.all.get(namespace_id)
    }

    /// Look up a namespace for mutation during the import phase
    pub fn get_mut(&mut self, namespace_id: &str) -> Option<&mut Namespace> {
        self.all.get_mut(namespace_id)
    }

    /// Find a type definition visible from `namespace_id`
    ///
    /// Falls back to the namespace's designated global namespace when the
    /// name is not found locally. Returns the definition together with the
    /// namespace it was found in.
    #[must_use]
    pub fn lookup_def<'a>(
        &'a self,
        namespace_id: &str,
        local_name: &str,
    ) -> Option<(&'a Namespace, &'a Mapping)> {
        let namespace = self.all.get(namespace_id)?;
        if let Some(def) = namespace.defs.get_map(local_name) {
            return Some((namespace, def));
        }
        let global_id = namespace.global.clone()?;
        let global = self.all.get(&global_id)?;
        global.defs.get_map(local_name).map(|def| (global, def))
    }

    /// Iterate every registered namespace in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.all.values()
    }
}
