use crate::xml::XmlElement;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One finding, with enough element/line context to locate it in the source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub resource: String,
    /// Ids of the elements involved. The first entry is the reporting element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn mentions(&self, element_id: &str) -> bool {
        self.element_ids.iter().any(|id| id == element_id)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} | {}", self.severity, self.message, self.resource)?;
        if let Some(line) = self.line {
            write!(f, " | line {line}")?;
        }
        if !self.element_ids.is_empty() {
            write!(f, " | {}", self.element_ids.join(", "))?;
        }
        Ok(())
    }
}

/// Accumulates warnings and errors across every pass. Nothing here ever
/// aborts; the compiler inspects the collector once the walk is complete.
#[derive(Debug, Default)]
pub struct Diagnostics {
    resource: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            entries: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>, element: Option<&XmlElement>) {
        self.push(Severity::Error, message.into(), element, &[]);
    }

    pub fn warning(&mut self, message: impl Into<String>, element: Option<&XmlElement>) {
        self.push(Severity::Warning, message.into(), element, &[]);
    }

    /// Error involving several elements; `element` reports, `related` are listed after it.
    pub fn error_with(
        &mut self,
        message: impl Into<String>,
        element: Option<&XmlElement>,
        related: &[&str],
    ) {
        self.push(Severity::Error, message.into(), element, related);
    }

    pub fn warning_with(
        &mut self,
        message: impl Into<String>,
        element: Option<&XmlElement>,
        related: &[&str],
    ) {
        self.push(Severity::Warning, message.into(), element, related);
    }

    /// Error raised on a graph node rather than an element, e.g. gateway checks
    /// that run once the whole process is built.
    pub fn error_at(&mut self, message: impl Into<String>, element_ids: &[&str], line: Option<u32>) {
        self.push_at(Severity::Error, message.into(), element_ids, line);
    }

    pub fn warning_at(&mut self, message: impl Into<String>, element_ids: &[&str], line: Option<u32>) {
        self.push_at(Severity::Warning, message.into(), element_ids, line);
    }

    fn push_at(&mut self, severity: Severity, message: String, element_ids: &[&str], line: Option<u32>) {
        let mut ids: Vec<String> = Vec::with_capacity(element_ids.len());
        for id in element_ids {
            if !ids.iter().any(|e| e == id) {
                ids.push(id.to_string());
            }
        }
        self.entries.push(Diagnostic {
            severity,
            message,
            resource: self.resource.clone(),
            element_ids: ids,
            line,
        });
    }

    fn push(
        &mut self,
        severity: Severity,
        message: String,
        element: Option<&XmlElement>,
        related: &[&str],
    ) {
        let mut element_ids: Vec<String> = element
            .and_then(|e| e.id())
            .map(|id| vec![id.to_string()])
            .unwrap_or_default();
        for id in related {
            if !element_ids.iter().any(|e| e == id) {
                element_ids.push(id.to_string());
            }
        }
        self.entries.push(Diagnostic {
            severity,
            message,
            resource: self.resource.clone(),
            element_ids,
            line: element.map(|e| e.line),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn into_report(self) -> DiagnosticReport {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .entries
            .into_iter()
            .partition(|d| d.severity == Severity::Error);
        DiagnosticReport {
            resource: self.resource,
            errors,
            warnings,
        }
    }
}

/// Aggregate of a whole compile, used when errors reject the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub resource: String,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s) while compiling '{}'",
            self.errors.len(),
            self.resource
        )?;
        for d in self.errors.iter().chain(&self.warnings) {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, line: u32) -> XmlElement {
        XmlElement {
            namespace: None,
            name: "task".to_string(),
            attributes: vec![crate::xml::XmlAttribute {
                namespace: None,
                name: "id".to_string(),
                value: id.to_string(),
            }],
            namespace_declarations: vec![],
            children: vec![],
            text: String::new(),
            line,
        }
    }

    /// Errors and warnings accumulate in order.
    #[test]
    fn t_diag_1_accumulates_without_short_circuit() {
        let mut diags = Diagnostics::new("order.bpmn");
        diags.warning("first", None);
        diags.error("second", Some(&element("a", 3)));
        diags.error_with("third", Some(&element("b", 7)), &["a", "b"]);

        assert!(diags.has_errors());
        let report = diags.into_report();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.errors[1].element_ids, vec!["b", "a"]);
        assert_eq!(report.errors[0].line, Some(3));
    }

    /// Reports render one line per diagnostic.
    #[test]
    fn t_diag_2_display_format() {
        let mut diags = Diagnostics::new("r.bpmn");
        diags.error("broken", Some(&element("x", 2)));
        let report = diags.into_report();
        assert_eq!(report.errors[0].to_string(), "[error] broken | r.bpmn | line 2 | x");
        assert!(report.to_string().starts_with("1 error(s) while compiling 'r.bpmn'"));
    }
}
