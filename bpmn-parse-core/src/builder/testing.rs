//! Whole-document helpers shared by the builder unit tests.

use crate::compiler::{compile_str, CompileOutput};
use crate::diagnostics::{Diagnostic, DiagnosticReport};
use crate::error::CompileError;
use crate::model::{ActivityNode, ProcessGraph};

/// Wrap `body` in a `definitions` root with the engine and `tns` prefixes.
pub(super) fn definitions(body: &str) -> String {
    format!(
        r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL"
    xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
    xmlns:tns="urn:test"
    targetNamespace="urn:test">
{body}
</definitions>"#
    )
}

/// Wrap `body` in an executable process `p`.
pub(super) fn process(body: &str) -> String {
    format!(r#"<process id="p" isExecutable="true">{body}</process>"#)
}

pub(super) fn compile(document_body: &str) -> CompileOutput {
    match compile_str("test.bpmn", &definitions(document_body)) {
        Ok(output) => output,
        Err(err) => panic!("compile failed: {err}"),
    }
}

pub(super) fn semantic_errors(document_body: &str) -> DiagnosticReport {
    match compile_str("test.bpmn", &definitions(document_body)) {
        Err(CompileError::Semantic(report)) => report,
        Err(other) => panic!("expected semantic errors, got {other}"),
        Ok(_) => panic!("expected semantic errors, compile succeeded"),
    }
}

pub(super) fn messages(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.message.as_str()).collect()
}

pub(super) fn graph<'a>(output: &'a CompileOutput) -> &'a ProcessGraph {
    match output.process("p") {
        Some(graph) => graph,
        None => panic!("process 'p' not compiled"),
    }
}

pub(super) fn node<'a>(graph: &'a ProcessGraph, id: &str) -> &'a ActivityNode {
    match graph.activity_by_id(id) {
        Some(node) => node,
        None => panic!("no activity '{id}'"),
    }
}
