//! Compile entry point: XML text in, process graphs and job declarations out.

use crate::builder::build_processes;
use crate::config::CompilerConfig;
use crate::context::DocumentContext;
use crate::diagnostics::Diagnostic;
use crate::error::CompileError;
use crate::hooks::{HookEvent, ParseHooks};
use crate::model::{JobDeclarationIndex, ProcessGraph};
use crate::xml::parse_document;

/// Everything a successful compile produces.
#[derive(Debug)]
pub struct CompileOutput {
    pub processes: Vec<ProcessGraph>,
    /// Job declarations keyed by process key.
    pub job_declarations: JobDeclarationIndex,
    pub warnings: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn process(&self, key: &str) -> Option<&ProcessGraph> {
        self.processes.iter().find(|p| p.key == key)
    }
}

/// Single-use compiler for one deployment resource.
///
/// ```ignore
/// let output = BpmnCompiler::new(CompilerConfig::default())
///     .with_hook("audit", |event| {
///         tracing::debug!(element = %event.describe(), "built");
///         Ok(())
///     })
///     .compile("order.bpmn", &xml)?;
/// ```
#[derive(Debug, Default)]
pub struct BpmnCompiler {
    config: CompilerConfig,
    hooks: ParseHooks,
}

impl BpmnCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            hooks: ParseHooks::new(),
        }
    }

    pub fn with_hook(
        mut self,
        name: impl Into<String>,
        hook: impl FnMut(&mut HookEvent<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.push(name, hook);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Schema problems fail before any semantic pass. Semantic errors are
    /// collected over the whole document and returned together.
    pub fn compile(mut self, resource: &str, xml: &str) -> Result<CompileOutput, CompileError> {
        let root = parse_document(xml, &self.config.engine_namespaces).map_err(|e| {
            CompileError::SchemaViolation {
                resource: resource.to_string(),
                line: e.line,
                message: e.message,
            }
        })?;
        if !root.is_bpmn("definitions") {
            return Err(CompileError::SchemaViolation {
                resource: resource.to_string(),
                line: root.line,
                message: format!("expected root element 'definitions', found '{}'", root.name),
            });
        }
        tracing::debug!(resource, "compiling document");

        let mut doc = DocumentContext::new(resource, &self.config, &root, &mut self.hooks);
        let processes = build_processes(&root, &mut doc)?;
        let job_declarations = std::mem::take(&mut doc.job_declarations);
        let report = doc.diagnostics.into_report();

        for warning in &report.warnings {
            tracing::warn!(resource, %warning, "compile warning");
        }
        if !report.errors.is_empty() {
            tracing::error!(
                resource,
                errors = report.errors.len(),
                "compile aborted with semantic errors"
            );
            return Err(CompileError::Semantic(report));
        }

        tracing::debug!(resource, processes = processes.len(), "compiled document");
        Ok(CompileOutput {
            processes,
            job_declarations,
            warnings: report.warnings,
        })
    }
}

/// Compile with the default configuration and no hooks.
pub fn compile_str(resource: &str, xml: &str) -> Result<CompileOutput, CompileError> {
    BpmnCompiler::default().compile(resource, xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Malformed XML is a schema violation with a line.
    #[test]
    fn t_compiler_1_malformed_xml() {
        let err = compile_str("bad.bpmn", "<definitions><process></definitions>").unwrap_err();
        assert!(matches!(err, CompileError::SchemaViolation { .. }), "{err}");
    }

    /// A root other than `definitions` is rejected before the semantic walk.
    #[test]
    fn t_compiler_2_wrong_root() {
        let err = compile_str("x.bpmn", "<process id=\"p\"/>").unwrap_err();
        match err {
            CompileError::SchemaViolation { message, .. } => assert!(message.contains("definitions")),
            other => panic!("unexpected {other}"),
        }
    }

    /// A document without processes compiles to nothing.
    #[test]
    fn t_compiler_3_empty_definitions() {
        let output = compile_str(
            "empty.bpmn",
            r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL" targetNamespace="t"/>"#,
        )
        .unwrap();
        assert!(output.processes.is_empty());
        assert!(output.warnings.is_empty());
    }
}
