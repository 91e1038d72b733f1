use crate::xml::{ENGINE_NS, LEGACY_ENGINE_NS};
use serde::{Deserialize, Serialize};

/// Compiler options. Every field has a default, so a YAML file only needs the
/// keys it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compile `<process>` elements that omit `isExecutable`.
    pub missing_executable_is_executable: bool,
    /// Value of `camunda:exclusive` when the attribute is absent.
    pub default_exclusive: bool,
    /// Run the BPMNDI pass that captures shapes, edges and waypoints.
    pub parse_diagram_interchange: bool,
    /// Used for script tasks without a `scriptFormat`.
    pub default_script_format: String,
    /// Namespace URIs accepted for vendor extension attributes and elements.
    pub engine_namespaces: Vec<String>,
    /// Report blank or missing `source`/`target` on call activity variable
    /// mappings instead of accepting them.
    pub strict_call_activity_validation: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            missing_executable_is_executable: true,
            default_exclusive: true,
            parse_diagram_interchange: true,
            default_script_format: "javascript".to_string(),
            engine_namespaces: vec![ENGINE_NS.to_string(), LEGACY_ENGINE_NS.to_string()],
            strict_call_activity_validation: true,
        }
    }
}

impl CompilerConfig {
    /// Parse a `CompilerConfig` from YAML.
    ///
    /// ```yaml
    /// default_exclusive: false
    /// parse_diagram_interchange: false
    /// engine_namespaces:
    ///   - http://camunda.org/schema/1.0/bpmn
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
