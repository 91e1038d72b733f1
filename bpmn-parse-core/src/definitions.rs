use crate::diagnostics::Diagnostics;
use crate::xml::XmlElement;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Only schema imports are understood; they carry no process semantics.
pub const XSD_IMPORT_TYPE: &str = "http://www.w3.org/2001/XMLSchema";

// ─── Named definitions ────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDefinition {
    /// `targetNamespace:id`.
    pub id: String,
    /// Name text; may be an expression resolved at runtime.
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDefinition {
    pub id: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDefinition {
    pub id: String,
    pub name: Option<String>,
    pub escalation_code: Option<String>,
}

// ─── Registry ─────────────────────────────────────────────────

/// Document-scoped symbol tables. Filled once from the `definitions` root and
/// read by every process of the document.
#[derive(Debug, Default)]
pub struct Definitions {
    target_namespace: Option<String>,
    prefixes: HashMap<String, String>,
    element_ids: HashSet<String>,
    messages: BTreeMap<String, MessageDefinition>,
    signals: BTreeMap<String, SignalDefinition>,
    errors: BTreeMap<String, ErrorDefinition>,
    escalations: BTreeMap<String, EscalationDefinition>,
}

impl Definitions {
    /// Read imports, messages, signals, errors and escalations in that order.
    pub fn collect(root: &XmlElement, diagnostics: &mut Diagnostics) -> Self {
        let mut defs = Definitions {
            target_namespace: root.attr("targetNamespace").map(str::to_string),
            prefixes: root.namespace_declarations.iter().cloned().collect(),
            ..Default::default()
        };

        root.walk(&mut |el| {
            if let Some(id) = el.id() {
                defs.element_ids.insert(id.to_string());
            }
        });

        defs.collect_imports(root, diagnostics);
        defs.collect_messages(root);
        defs.collect_signals(root, diagnostics);
        defs.collect_errors(root, diagnostics);
        defs.collect_escalations(root, diagnostics);

        tracing::debug!(
            messages = defs.messages.len(),
            signals = defs.signals.len(),
            errors = defs.errors.len(),
            escalations = defs.escalations.len(),
            "definitions registered"
        );
        defs
    }

    fn collect_imports(&mut self, root: &XmlElement, diagnostics: &mut Diagnostics) {
        for import in root.children_named("import") {
            let import_type = import.attr("importType").unwrap_or_default();
            if import_type != XSD_IMPORT_TYPE {
                diagnostics.error(format!("Could not import item of type {import_type}"), Some(import));
            }
        }
    }

    fn collect_messages(&mut self, root: &XmlElement) {
        for message in root.children_named("message") {
            let Some(id) = message.id() else { continue };
            let qualified = self.qualify(id);
            self.messages.insert(
                qualified.clone(),
                MessageDefinition {
                    id: qualified,
                    name: message.attr("name").map(str::to_string),
                },
            );
        }
    }

    fn collect_signals(&mut self, root: &XmlElement, diagnostics: &mut Diagnostics) {
        for signal in root.children_named("signal") {
            let name = signal.attr("name");
            if let Some(name) = name {
                if self.signals.values().any(|s| s.name == name) {
                    diagnostics.error(format!("duplicate signal name '{name}'."), Some(signal));
                }
            }
            match (signal.id(), name) {
                (None, _) => diagnostics.error("signal must have an id", Some(signal)),
                (Some(id), None) => {
                    diagnostics.error(format!("signal with id '{id}' has no name"), Some(signal))
                }
                (Some(id), Some(name)) => {
                    let qualified = self.qualify(id);
                    self.signals.insert(
                        qualified.clone(),
                        SignalDefinition {
                            id: qualified,
                            name: name.to_string(),
                        },
                    );
                }
            }
        }
    }

    fn collect_errors(&mut self, root: &XmlElement, diagnostics: &mut Diagnostics) {
        for error in root.children_named("error") {
            let Some(id) = error.id() else {
                diagnostics.error("'id' is mandatory on error definition", Some(error));
                continue;
            };
            self.errors.insert(
                id.to_string(),
                ErrorDefinition {
                    id: id.to_string(),
                    error_code: error.attr("errorCode").map(str::to_string),
                    error_message: error.engine_attr("errorMessage").map(str::to_string),
                },
            );
        }
    }

    fn collect_escalations(&mut self, root: &XmlElement, diagnostics: &mut Diagnostics) {
        for escalation in root.children_named("escalation") {
            let Some(id) = escalation.id() else {
                diagnostics.error("escalation must have an id", Some(escalation));
                continue;
            };
            self.escalations.insert(
                id.to_string(),
                EscalationDefinition {
                    id: id.to_string(),
                    name: escalation.attr("name").map(str::to_string),
                    escalation_code: escalation
                        .attr("escalationCode")
                        .filter(|c| !c.is_empty())
                        .map(str::to_string),
                },
            );
        }
    }

    // ── Resolution ──

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    fn qualify(&self, id: &str) -> String {
        format!("{}:{id}", self.target_namespace.as_deref().unwrap_or("null"))
    }

    /// `prefix:local` resolves through the prefix table, a bare name is
    /// qualified with the target namespace.
    pub fn resolve_name(&self, name: &str) -> String {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.prefixes.get(prefix).map(String::as_str).unwrap_or("null");
                format!("{uri}:{local}")
            }
            None => self.qualify(name),
        }
    }

    pub fn message(&self, reference: &str) -> Option<&MessageDefinition> {
        self.messages.get(&self.resolve_name(reference))
    }

    pub fn signal(&self, reference: &str) -> Option<&SignalDefinition> {
        self.signals.get(&self.resolve_name(reference))
    }

    /// Errors and escalations are keyed by their raw id.
    pub fn error(&self, reference: &str) -> Option<&ErrorDefinition> {
        self.errors.get(reference)
    }

    pub fn escalation(&self, reference: &str) -> Option<&EscalationDefinition> {
        self.escalations.get(reference)
    }

    /// Any element of the document carries this id.
    pub fn contains_element(&self, id: &str) -> bool {
        self.element_ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_document, ENGINE_NS};

    fn collect(xml: &str) -> (Definitions, Diagnostics) {
        let root = parse_document(xml, &[ENGINE_NS.to_string()]).unwrap();
        let mut diags = Diagnostics::new("defs.bpmn");
        let defs = Definitions::collect(&root, &mut diags);
        (defs, diags)
    }

    const HEADER: &str = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL"
        xmlns:other="urn:other" targetNamespace="urn:orders">"#;

    /// Message ids are namespace-qualified; refs resolve bare and prefixed.
    #[test]
    fn t_defs_1_message_resolution() {
        let xml = format!(
            r#"{HEADER}
            <message id="m1" name="order-placed"/>
            </definitions>"#
        );
        let (defs, diags) = collect(&xml);
        assert!(!diags.has_errors());
        assert_eq!(defs.resolve_name("m1"), "urn:orders:m1");
        assert_eq!(defs.resolve_name("other:x"), "urn:other:x");
        assert_eq!(
            defs.message("m1").and_then(|m| m.name.as_deref()),
            Some("order-placed")
        );
        assert!(defs.message("other:m1").is_none());
    }

    /// Duplicate signal names are reported but both still register.
    #[test]
    fn t_defs_2_duplicate_signal_name() {
        let xml = format!(
            r#"{HEADER}
            <signal id="s1" name="alert"/>
            <signal id="s2" name="alert"/>
            <signal id="s3"/>
            <signal name="nameless"/>
            </definitions>"#
        );
        let (defs, diags) = collect(&xml);
        let errors: Vec<_> = diags.errors().map(|d| d.message.clone()).collect();
        assert!(errors.iter().any(|m| m == "duplicate signal name 'alert'."), "{errors:?}");
        assert!(errors.iter().any(|m| m == "signal with id 's3' has no name"));
        assert!(errors.iter().any(|m| m == "signal must have an id"));
        assert_eq!(defs.signal("s1").map(|s| s.name.as_str()), Some("alert"));
        assert_eq!(defs.signal("s2").map(|s| s.name.as_str()), Some("alert"));
    }

    /// Errors and escalations are looked up by their raw id.
    #[test]
    fn t_defs_3_errors_and_escalations_keyed_by_raw_id() {
        let xml = format!(
            r#"{HEADER}
            <error id="e1" errorCode="E_LIMIT"/>
            <error errorCode="orphan"/>
            <escalation id="esc1" escalationCode=""/>
            <escalation name="missing"/>
            </definitions>"#
        );
        let (defs, diags) = collect(&xml);
        assert_eq!(
            defs.error("e1").and_then(|e| e.error_code.as_deref()),
            Some("E_LIMIT")
        );
        assert!(defs.escalation("esc1").unwrap().escalation_code.is_none());
        assert_eq!(diags.errors().count(), 2);
    }

    /// Only XML schema and WSDL imports are known.
    #[test]
    fn t_defs_4_unknown_import_type() {
        let xml = format!(
            r#"{HEADER}
            <import importType="http://www.w3.org/2001/XMLSchema" location="a.xsd"/>
            <import importType="http://schemas.xmlsoap.org/wsdl/" location="a.wsdl"/>
            </definitions>"#
        );
        let (_, diags) = collect(&xml);
        let errors: Vec<_> = diags.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Could not import item of type http://schemas.xmlsoap.org/wsdl/"
        );
    }

    /// Ids of every element are collected, not only flow nodes.
    #[test]
    fn t_defs_5_element_ids_collected() {
        let xml = format!(
            r#"{HEADER}
            <process id="p"><textAnnotation id="note"/></process>
            </definitions>"#
        );
        let (defs, _) = collect(&xml);
        assert!(defs.contains_element("note"));
        assert!(!defs.contains_element("missing"));
    }
}
