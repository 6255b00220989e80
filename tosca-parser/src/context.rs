//! Per-parse context
//!
//! Everything a parse mutates lives here: the namespace graph built during
//! the import phase, the type cache, the parser configuration and the error
//! collector. The context is created per parse — there is no process-global
//! mutable state, so independent parses can run on parallel threads.

use crate::config::ParserConfig;
use crate::namespace::NamespaceRegistry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tosca_core::collector::ErrorCollector;
use tosca_core::value::Mapping;

/// A resolved type definition held by the registry
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// The local name the type was resolved under
    pub name: String,
    /// Canonical `local_name@namespace_id` identity (bare name for built-ins)
    pub global_name: String,
    /// Namespace the definition was found in ("" for built-ins)
    pub namespace_id: String,
    /// Namespace of the original definition point; differs from
    /// `namespace_id` when the type arrived through a prefixed import
    pub source_namespace_id: String,
    /// The raw definition body
    pub defs: Mapping,
}

/// Cache of resolved types for one parse
///
/// The guard flag refuses registrations that would mix definitions from a
/// different custom-definitions scope into an already-populated registry.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<IndexMap<String, Arc<TypeDef>>>,
}

impl TypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached type by global name
    ///
    /// With `guard_scope` set, a cached entry found under a different
    /// namespace scope is treated as absent.
    #[must_use]
    pub fn find_type(&self, global_name: &str, guard_scope: Option<&str>) -> Option<Arc<TypeDef>> {
        let types = self.types.read();
        let found = types.get(global_name)?;
        if let Some(scope) = guard_scope {
            if found.namespace_id != scope {
                return None;
            }
        }
        Some(Arc::clone(found))
    }

    /// Register a type; returns false when a guarded add is refused
    pub fn add_type(&self, typedef: Arc<TypeDef>, guard: bool) -> bool {
        let mut types = self.types.write();
        if guard {
            if let Some(first) = types.values().next() {
                if first.namespace_id != typedef.namespace_id {
                    return false;
                }
            }
        }
        types.insert(typedef.global_name.clone(), typedef);
        true
    }

    /// Drop every cached type
    pub fn reset(&self) {
        self.types.write().clear();
    }

    /// Number of cached types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// True when nothing has been cached yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

/// State threaded through one parse
#[derive(Debug)]
pub struct ParseContext {
    /// The accumulating error channel
    pub collector: ErrorCollector,
    /// Parse options
    pub config: ParserConfig,
    /// Every namespace loaded by the import phase
    pub namespaces: NamespaceRegistry,
    /// The per-parse type cache
    pub registry: TypeRegistry,
}

impl ParseContext {
    /// Create a context for one parse
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        let collector = ErrorCollector::new();
        collector.start();
        Self {
            collector,
            config,
            namespaces: NamespaceRegistry::new(),
            registry: TypeRegistry::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typedef(global_name: &str, namespace_id: &str) -> Arc<TypeDef> {
        Arc::new(TypeDef {
            name: global_name.split('@').next().unwrap_or_default().to_string(),
            global_name: global_name.to_string(),
            namespace_id: namespace_id.to_string(),
            source_namespace_id: namespace_id.to_string(),
            defs: Mapping::new(),
        })
    }

    #[test]
    fn test_find_and_reset() {
        let registry = TypeRegistry::new();
        assert!(registry.add_type(typedef("A@ns1", "ns1"), false));
        assert!(registry.find_type("A@ns1", None).is_some());
        registry.reset();
        assert!(registry.find_type("A@ns1", None).is_none());
    }

    #[test]
    fn test_guard_refuses_foreign_scope() {
        let registry = TypeRegistry::new();
        assert!(registry.add_type(typedef("A@ns1", "ns1"), false));
        assert!(!registry.add_type(typedef("B@ns2", "ns2"), true));
        assert!(registry.add_type(typedef("C@ns1", "ns1"), true));
    }

    #[test]
    fn test_guard_scope_on_lookup() {
        let registry = TypeRegistry::new();
        registry.add_type(typedef("A@ns1", "ns1"), false);
        assert!(registry.find_type("A@ns1", Some("ns1")).is_some());
        assert!(registry.find_type("A@ns1", Some("ns2")).is_none());
    }
}
