//! Repository definitions
//!
//! A repository names an external location imports can be fetched from.
//! The TOSCA 1.0 short form (a bare URL string) is still accepted.

use tosca_core::collector::ErrorCollector;
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// Recognized keys of a repository definition
pub const REPOSITORY_KEYS: &[&str] = &[
    "description",
    "url",
    "credential",
    "revision",
    "metadata",
    "file",
];

/// A named repository record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Location documents are fetched relative to
    pub url: String,
    /// Human-readable description
    pub description: Option<String>,
    /// Credential mapping (validated against `tosca.datatypes.Credential`)
    pub credential: Option<Mapping>,
    /// Revision selector
    pub revision: Option<String>,
    /// Repository metadata
    pub metadata: Option<Mapping>,
    /// Hostname extracted from the URL, when it parses
    pub hostname: Option<String>,
}

impl Repository {
    /// Parse a repository definition (mapping or bare-URL short form)
    #[must_use]
    pub fn new(name: &str, definition: &Value, collector: &ErrorCollector) -> Self {
        let mut repository = Self {
            name: name.to_string(),
            ..Self::default()
        };
        match definition {
            Value::String(short_url) => {
                repository.url = short_url.clone();
            }
            Value::Map(map) => {
                match map.get_str("url") {
                    Some(url) => repository.url = url.to_string(),
                    None => collector.append(ToscaError::missing_field(
                        format!("repository \"{name}\""),
                        "url",
                    )),
                }
                for key in map.keys() {
                    if !REPOSITORY_KEYS.contains(&key.as_str()) {
                        collector.append(ToscaError::unknown_field(
                            format!("repository \"{name}\""),
                            key,
                        ));
                    }
                }
                repository.description = map.get_str("description").map(str::to_string);
                repository.credential = map.get_map("credential").cloned();
                repository.revision = map.get_str("revision").map(str::to_string);
                repository.metadata = map.get_map("metadata").cloned();
            }
            other => {
                collector.append(ToscaError::type_mismatch(
                    format!("repository \"{name}\" ({other})"),
                    "map",
                ));
            }
        }
        if !repository.url.is_empty() {
            match url::Url::parse(&repository.url) {
                Ok(parsed) => repository.hostname = parsed.host_str().map(str::to_string),
                // bare paths and file:-relative urls are resolved later
                Err(_) if repository.url.starts_with("file:") => {}
                Err(_) if !repository.url.contains("://") => {}
                Err(err) => collector.append(ToscaError::import(
                    repository.url.clone(),
                    format!("repository \"{name}\" has an invalid url: {err}"),
                )),
            }
        }
        repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        Value::from_yaml(&tree, None)
    }

    #[test]
    fn test_short_form() {
        let collector = ErrorCollector::new();
        collector.start();
        let repo = Repository::new("docker", &parse("\"https://registry.example.com/\""), &collector);
        assert_eq!(repo.url, "https://registry.example.com/");
        assert_eq!(repo.hostname.as_deref(), Some("registry.example.com"));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_url_is_required() {
        let collector = ErrorCollector::new();
        collector.start();
        Repository::new("broken", &parse("{description: no url here}"), &collector);
        assert_eq!(collector.len(), 1);
        assert!(collector.report()[0].contains("url"));
    }

    #[test]
    fn test_unknown_field() {
        let collector = ErrorCollector::new();
        collector.start();
        Repository::new(
            "repo",
            &parse("{url: \"https://example.com\", mirror: backup}"),
            &collector,
        );
        assert_eq!(collector.len(), 1);
        assert!(collector.report()[0].contains("mirror"));
    }
}
