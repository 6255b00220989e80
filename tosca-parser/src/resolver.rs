//! The resolver contract and the bundled filesystem/URL resolver
//!
//! The parse engine never touches the filesystem or network itself: a
//! resolver turns import specifications into canonical locations and loads
//! raw YAML trees from them. Resolvers own every I/O resource they open.

use crate::repository::Repository;
use crate::templates::relationship_template::RelationshipTemplate;
use std::fmt;
use std::path::{Path, PathBuf};
use tosca_core::collector::ErrorCollector;
use tosca_core::error::{Result, ToscaError};
use tosca_core::value::{Mapping, Provenance, Value};
use tracing::debug;

/// A normalized import specification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSpec {
    /// The file/URL to import
    pub file: String,
    /// Repository the file is relative to
    pub repository: Option<String>,
    /// Prefix imported type names appear under in the importer
    pub namespace_prefix: Option<String>,
    /// Declared namespace URI (informational)
    pub namespace_uri: Option<String>,
    /// Conditional-import expression, recorded but never evaluated
    pub when: Option<Value>,
    /// Old-style import name, when the `{name: uri}` form was used
    pub name: Option<String>,
}

/// A location the resolver can load from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImport {
    /// Canonical location (normalized path or URL)
    pub location: String,
    /// True for local filesystem paths
    pub is_local: bool,
    /// Sub-document fragment, when the import carried one
    pub fragment: Option<String>,
}

/// Supplies raw documents to the parse engine
pub trait ImportResolver: Send + Sync + fmt::Debug {
    /// Turn an import specification into a loadable location
    ///
    /// `base` is the canonical location of the importing document (`None`
    /// for pre-parsed input); `repositories` maps repository names to their
    /// definitions.
    ///
    /// # Errors
    ///
    /// Returns an `Import` error when the specification cannot name a
    /// location (unknown repository, relative import without a base, an
    /// absolute local path inside a URL-based template).
    fn resolve(
        &self,
        base: Option<&str>,
        repositories: &Mapping,
        spec: &ImportSpec,
    ) -> Result<ResolvedImport>;

    /// Load and parse the document at a resolved location
    ///
    /// # Errors
    ///
    /// Returns an `Import` error when the document cannot be read or parsed.
    fn load(&self, resolved: &ResolvedImport) -> Result<Value>;

    /// Build a repository record from its definition
    fn get_repository(
        &self,
        name: &str,
        definition: &Value,
        collector: &ErrorCollector,
    ) -> Repository {
        Repository::new(name, definition, collector)
    }

    /// Unpack a CSAR archive and return the entry-definitions location
    ///
    /// # Errors
    ///
    /// The default implementation rejects archives; resolvers that support
    /// CSAR override this.
    fn extract_archive(&self, location: &str) -> Result<String> {
        Err(ToscaError::import(
            location,
            "CSAR archive extraction is not supported by this resolver",
        ))
    }

    /// Find a target for a requirement no in-topology template satisfies
    ///
    /// Returns `(node_template_name, capability_name)`; the default
    /// resolver matches nothing.
    fn find_matching_node(
        &self,
        _relationship: &RelationshipTemplate,
        _requirement_name: &str,
        _requirement_def: &Mapping,
    ) -> Option<(String, String)> {
        None
    }
}

/// True if the location parses as a non-file URL
#[must_use]
pub fn is_url(location: &str) -> bool {
    url::Url::parse(location)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// The bundled resolver: local files via `std::fs`, URLs via blocking HTTP
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver;

impl DefaultResolver {
    /// Create the default resolver
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn base_dir(base: &str) -> PathBuf {
        let path = Path::new(base);
        if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        }
    }

    fn repository_url(
        &self,
        base: Option<&str>,
        repositories: &Mapping,
        repository: &str,
        file: &str,
    ) -> Result<ResolvedImport> {
        let Some(definition) = repositories.get(repository) else {
            return Err(ToscaError::import(
                file,
                format!("repository not found: \"{repository}\""),
            ));
        };
        let url = match definition {
            Value::String(short) => short.trim().to_string(),
            Value::Map(map) => map.get_str("url").unwrap_or_default().trim().to_string(),
            _ => String::new(),
        };
        if url.is_empty() {
            return Err(ToscaError::import(
                file,
                format!("repository \"{repository}\" has no url"),
            ));
        }
        if let Some(local) = url.strip_prefix("file:") {
            let local = local.trim_start_matches("//");
            let mut path = PathBuf::from(local);
            if path.is_relative() {
                if let Some(base) = base {
                    path = Self::base_dir(base).join(path);
                }
            }
            let path = path.join(file);
            return Ok(ResolvedImport {
                location: normalize_path(&path),
                is_local: true,
                fragment: None,
            });
        }
        Ok(ResolvedImport {
            location: format!("{}/{}", url.trim_end_matches('/'), file),
            is_local: false,
            fragment: None,
        })
    }
}

impl ImportResolver for DefaultResolver {
    fn resolve(
        &self,
        base: Option<&str>,
        repositories: &Mapping,
        spec: &ImportSpec,
    ) -> Result<ResolvedImport> {
        let (file, fragment) = split_fragment(&spec.file);

        if is_url(&file) {
            // absolute URL: the repository, if any, is ignored
            return Ok(ResolvedImport {
                location: file,
                is_local: false,
                fragment,
            });
        }

        if let Some(repository) = &spec.repository {
            let mut resolved = self.repository_url(base, repositories, repository, &file)?;
            resolved.fragment = fragment;
            return Ok(resolved);
        }

        match base {
            Some(base) if is_url(base) => {
                if Path::new(&file).is_absolute() {
                    return Err(ToscaError::import(
                        &spec.file,
                        format!(
                            "absolute file name cannot be used in the URL-based template \"{base}\""
                        ),
                    ));
                }
                let joined = url::Url::parse(base)
                    .and_then(|base_url| base_url.join(&file))
                    .map_err(|err| ToscaError::import(&spec.file, err.to_string()))?;
                Ok(ResolvedImport {
                    location: joined.to_string(),
                    is_local: false,
                    fragment,
                })
            }
            Some(base) => {
                let path = Path::new(&file);
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    Self::base_dir(base).join(path)
                };
                Ok(ResolvedImport {
                    location: normalize_path(&path),
                    is_local: true,
                    fragment,
                })
            }
            None => {
                // pre-parsed template: only absolute paths can be resolved
                if Path::new(&file).is_absolute() {
                    Ok(ResolvedImport {
                        location: file,
                        is_local: true,
                        fragment,
                    })
                } else {
                    Err(ToscaError::import(
                        &spec.file,
                        "relative file name cannot be used in a pre-parsed input template",
                    ))
                }
            }
        }
    }

    fn load(&self, resolved: &ResolvedImport) -> Result<Value> {
        debug!(location = %resolved.location, local = resolved.is_local, "loading import");
        let text = if resolved.is_local {
            std::fs::read_to_string(&resolved.location)
                .map_err(|err| ToscaError::import(&resolved.location, err.to_string()))?
        } else {
            let response = reqwest::blocking::get(&resolved.location)
                .map_err(|err| ToscaError::import(&resolved.location, err.to_string()))?;
            if !response.status().is_success() {
                return Err(ToscaError::import(
                    &resolved.location,
                    format!("http status {}", response.status()),
                ));
            }
            response
                .text()
                .map_err(|err| ToscaError::import(&resolved.location, err.to_string()))?
        };
        let tree: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|err| ToscaError::import(&resolved.location, err.to_string()))?;
        let provenance = Provenance::from_file(&resolved.location);
        let value = Value::from_yaml(&tree, Some(&provenance));
        match &resolved.fragment {
            Some(fragment) => descend_fragment(value, fragment, &resolved.location),
            None => Ok(value),
        }
    }
}

/// Split a `path#fragment` import location
fn split_fragment(file: &str) -> (String, Option<String>) {
    match file.rsplit_once('#') {
        Some((path, fragment)) if !is_url(file) => {
            (path.to_string(), Some(fragment.to_string()))
        }
        _ => (file.to_string(), None),
    }
}

/// Descend a loaded document by a `/`-separated key path
fn descend_fragment(value: Value, fragment: &str, location: &str) -> Result<Value> {
    let mut current = value;
    for key in fragment.split('/').filter(|key| !key.is_empty()) {
        current = match current.as_map().and_then(|map| map.get(key)) {
            Some(next) => next.clone(),
            None => {
                return Err(ToscaError::import(
                    location,
                    format!("fragment \"{fragment}\" not found in document"),
                ))
            }
        };
    }
    Ok(current)
}

/// Lexically normalize a path (no filesystem access)
fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if parts.last().is_some_and(|last| last != "..") {
                    parts.pop();
                } else {
                    parts.push(component.as_os_str().to_os_string());
                }
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }
    let mut normalized = PathBuf::new();
    for part in parts {
        normalized.push(part);
    }
    normalized.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(file: &str) -> ImportSpec {
        ImportSpec {
            file: file.to_string(),
            ..ImportSpec::default()
        }
    }

    #[test]
    fn test_relative_import_joins_base_dir() {
        let resolver = DefaultResolver::new();
        let resolved = resolver
            .resolve(Some("/work/service.yaml"), &Mapping::new(), &spec("types/db.yaml"))
            .expect("resolves");
        assert_eq!(resolved.location, "/work/types/db.yaml");
        assert!(resolved.is_local);
    }

    #[test]
    fn test_url_import_passes_through() {
        let resolver = DefaultResolver::new();
        let resolved = resolver
            .resolve(
                Some("/work/service.yaml"),
                &Mapping::new(),
                &spec("https://example.com/types.yaml"),
            )
            .expect("resolves");
        assert_eq!(resolved.location, "https://example.com/types.yaml");
        assert!(!resolved.is_local);
    }

    #[test]
    fn test_absolute_local_in_url_template_is_error() {
        let resolver = DefaultResolver::new();
        let err = resolver
            .resolve(
                Some("https://example.com/service.yaml"),
                &Mapping::new(),
                &spec("/etc/types.yaml"),
            )
            .unwrap_err();
        assert!(matches!(err, ToscaError::Import { .. }));
    }

    #[test]
    fn test_relative_in_preparsed_is_error() {
        let resolver = DefaultResolver::new();
        let err = resolver
            .resolve(None, &Mapping::new(), &spec("types.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("pre-parsed"));
    }

    #[test]
    fn test_fragment_split() {
        let resolver = DefaultResolver::new();
        let resolved = resolver
            .resolve(Some("/work/main.yaml"), &Mapping::new(), &spec("shared.yaml#node_types"))
            .expect("resolves");
        assert_eq!(resolved.location, "/work/shared.yaml");
        assert_eq!(resolved.fragment.as_deref(), Some("node_types"));
    }

    #[test]
    fn test_repository_relative_file_url() {
        let resolver = DefaultResolver::new();
        let mut repositories = Mapping::new();
        repositories.insert("local".into(), Value::String("file:packages".into()));
        let resolved = resolver
            .resolve(
                Some("/work/service.yaml"),
                &repositories,
                &ImportSpec {
                    file: "db.yaml".into(),
                    repository: Some("local".into()),
                    ..ImportSpec::default()
                },
            )
            .expect("resolves");
        assert_eq!(resolved.location, "/work/packages/db.yaml");
    }

    #[test]
    fn test_unknown_repository_is_error() {
        let resolver = DefaultResolver::new();
        let err = resolver
            .resolve(
                Some("/work/service.yaml"),
                &Mapping::new(),
                &ImportSpec {
                    file: "db.yaml".into(),
                    repository: Some("missing".into()),
                    ..ImportSpec::default()
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_archive_extraction_rejected_by_default() {
        let resolver = DefaultResolver::new();
        let err = resolver.extract_archive("/work/app.csar").unwrap_err();
        assert!(err.to_string().contains("CSAR"));
    }
}
