//! Parser configuration

use serde::{Deserialize, Serialize};

/// The template versions the parser always recognizes
pub const MAIN_TEMPLATE_VERSIONS: &[&str] = &[
    "tosca_simple_yaml_1_0",
    "tosca_simple_yaml_1_2",
    "tosca_simple_yaml_1_3",
];

/// Options controlling a parse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Raise the aggregate error at the end of the parse; when false the
    /// (possibly inconsistent) model is returned with its errors retained
    pub verify: bool,
    /// Treat ambiguous requirement targets as errors even without a node_filter
    pub strict: bool,
    /// Abort import traversal past this depth
    pub max_import_depth: usize,
    /// Externally-declared `tosca_definitions_version` values to accept
    /// in addition to [`MAIN_TEMPLATE_VERSIONS`]
    pub additional_versions: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            verify: true,
            strict: false,
            max_import_depth: 32,
            additional_versions: Vec::new(),
        }
    }
}

impl ParserConfig {
    /// True if `version` is an accepted template version
    #[must_use]
    pub fn is_valid_version(&self, version: &str) -> bool {
        MAIN_TEMPLATE_VERSIONS.contains(&version)
            || self.additional_versions.iter().any(|v| v == version)
    }

    /// Comma-joined list of every accepted version, for diagnostics
    #[must_use]
    pub fn valid_versions(&self) -> String {
        MAIN_TEMPLATE_VERSIONS
            .iter()
            .map(|v| (*v).to_string())
            .chain(self.additional_versions.iter().cloned())
            .collect::<Vec<_>>()
            .join("\", \"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_versions_accepted() {
        let config = ParserConfig::default();
        assert!(config.is_valid_version("tosca_simple_yaml_1_0"));
        assert!(config.is_valid_version("tosca_simple_yaml_1_3"));
        assert!(!config.is_valid_version("tosca_simple_yaml_2_0"));
    }

    #[test]
    fn test_additional_versions() {
        let config = ParserConfig {
            additional_versions: vec!["tosca_simple_profile_for_nfv_1_0_0".into()],
            ..ParserConfig::default()
        };
        assert!(config.is_valid_version("tosca_simple_profile_for_nfv_1_0_0"));
    }
}
