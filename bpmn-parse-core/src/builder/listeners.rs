use crate::context::DocumentContext;
use crate::model::{
    DelegateImplementation, ExecutionListener, FieldDeclaration, FieldValue, ListenerEvent,
    ScriptBody, ScriptSource,
};
use crate::xml::XmlElement;

// ─── Scripts ──────────────────────────────────────────────────

/// `<camunda:script scriptFormat=".." resource="..">body</camunda:script>`.
pub(super) fn parse_engine_script(
    script_el: &XmlElement,
    ancestor_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<ScriptSource> {
    let Some(language) = script_el.non_empty_attr("scriptFormat") else {
        doc.error_with(
            "Missing attribute 'scriptFormat' for 'script' element",
            script_el,
            &[ancestor_id],
        );
        return None;
    };
    let body = match script_el.non_empty_attr("resource") {
        Some(resource) => ScriptBody::Resource(resource.to_string()),
        None => ScriptBody::Inline(script_el.text().to_string()),
    };
    Some(ScriptSource {
        language: language.to_string(),
        body,
    })
}

// ─── Field injection ──────────────────────────────────────────

/// `camunda:field` children of `extensionElements`, or of the element itself
/// when it has none (listeners carry fields directly).
pub(super) fn parse_fields(el: &XmlElement, doc: &mut DocumentContext<'_>) -> Vec<FieldDeclaration> {
    let holder = el.child("extensionElements").unwrap_or(el);
    let owner_id = el.id().unwrap_or_default();
    holder
        .engine_children("field")
        .filter_map(|field| parse_field(field, el, owner_id, doc))
        .collect()
}

fn parse_field(
    field: &XmlElement,
    owner: &XmlElement,
    owner_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<FieldDeclaration> {
    let name = field.attr("name").unwrap_or_default().to_string();
    if let Some(value) = attribute_or_element("stringValue", "string", field, owner_id, doc) {
        return Some(FieldDeclaration {
            name,
            value: FieldValue::String(value),
        });
    }
    if let Some(value) = attribute_or_element("expression", "expression", field, owner_id, doc)
        .filter(|v| !v.trim().is_empty())
    {
        return Some(FieldDeclaration {
            name,
            value: FieldValue::Expression(value),
        });
    }
    doc.error(
        "One of the following is mandatory on a field declaration: one of attributes stringValue|expression or one of child elements string|expression",
        owner,
    );
    None
}

/// Value given either as an attribute or as a child element, never both.
fn attribute_or_element(
    attribute: &str,
    element: &str,
    field: &XmlElement,
    owner_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<String> {
    let attr_value = field.attr(attribute);
    let child = field.engine_child(element);
    match (attr_value, child) {
        (Some(_), Some(_)) => {
            doc.error_with(
                format!("Can't use attribute '{attribute}' and element '{element}' together, only use one"),
                field,
                &[owner_id],
            );
            None
        }
        (_, Some(child)) if child.text.is_empty() => {
            doc.error_with(
                format!("No valid value found in attribute '{attribute}' nor element '{element}'"),
                field,
                &[owner_id],
            );
            None
        }
        (_, Some(child)) => Some(child.text.clone()),
        (Some(value), None) if !value.is_empty() => Some(value.to_string()),
        _ => None,
    }
}

// ─── Execution listeners ──────────────────────────────────────

/// `class`, `expression`, `delegateExpression` or a nested `camunda:script`.
pub(super) fn parse_listener_implementation(
    listener_el: &XmlElement,
    ancestor_id: &str,
    doc: &mut DocumentContext<'_>,
    mandatory_message: &str,
    reject_empty: bool,
) -> Option<(DelegateImplementation, Vec<FieldDeclaration>)> {
    if let Some(class_name) = listener_el.attr("class") {
        if reject_empty && class_name.is_empty() {
            doc.error_with("Attribute 'class' cannot be empty", listener_el, &[ancestor_id]);
            return None;
        }
        let fields = parse_fields(listener_el, doc);
        return Some((DelegateImplementation::Class(class_name.to_string()), fields));
    }
    if let Some(expression) = listener_el.attr("expression") {
        return Some((DelegateImplementation::Expression(expression.to_string()), Vec::new()));
    }
    if let Some(delegate) = listener_el.attr("delegateExpression") {
        if reject_empty && delegate.is_empty() {
            doc.error_with(
                "Attribute 'delegateExpression' cannot be empty",
                listener_el,
                &[ancestor_id],
            );
            return None;
        }
        let fields = parse_fields(listener_el, doc);
        return Some((
            DelegateImplementation::DelegateExpression(delegate.to_string()),
            fields,
        ));
    }
    if let Some(script_el) = listener_el.engine_child("script") {
        let script = parse_engine_script(script_el, ancestor_id, doc)?;
        return Some((DelegateImplementation::Script(script), Vec::new()));
    }
    doc.error_with(mandatory_message, listener_el, &[ancestor_id]);
    None
}

fn parse_execution_listener(
    listener_el: &XmlElement,
    event: ListenerEvent,
    ancestor_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<ExecutionListener> {
    let (implementation, fields) = parse_listener_implementation(
        listener_el,
        ancestor_id,
        doc,
        "Element 'class', 'expression', 'delegateExpression' or 'script' is mandatory on executionListener",
        true,
    )?;
    Some(ExecutionListener {
        event,
        implementation,
        fields,
    })
}

/// `start`/`end` listeners of a process or activity.
pub(super) fn parse_execution_listeners_on_scope(
    el: &XmlElement,
    doc: &mut DocumentContext<'_>,
) -> Vec<ExecutionListener> {
    let scope_id = el.id().unwrap_or_default();
    let mut listeners = Vec::new();
    for listener_el in el.extensions("executionListener") {
        let event = match listener_el.attr("event").map(str::trim) {
            Some("start") => ListenerEvent::Start,
            Some("end") => ListenerEvent::End,
            Some(e) if !e.is_empty() => {
                doc.error_with(
                    "Attribute 'event' must be one of {start|end}",
                    listener_el,
                    &[scope_id],
                );
                continue;
            }
            _ => {
                doc.error_with(
                    "Attribute 'event' is mandatory on listener",
                    listener_el,
                    &[scope_id],
                );
                continue;
            }
        };
        listeners.extend(parse_execution_listener(listener_el, event, scope_id, doc));
    }
    listeners
}

/// Listeners on a sequence flow fire on `take`; their `event` attribute is ignored.
pub(super) fn parse_execution_listeners_on_transition(
    el: &XmlElement,
    doc: &mut DocumentContext<'_>,
) -> Vec<ExecutionListener> {
    let flow_id = el.id().unwrap_or_default();
    el.extensions("executionListener")
        .filter_map(|listener_el| {
            parse_execution_listener(listener_el, ListenerEvent::Take, flow_id, doc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process, semantic_errors};
    use crate::model::{DelegateImplementation, ExecutionListener, FieldDeclaration, FieldValue, ListenerEvent};

    /// Activity, process and flow listeners land on their owners.
    #[test]
    fn t_listeners_1_owners_and_events() {
        let output = compile(&process(
            r#"<extensionElements>
              <camunda:executionListener event="start" expression="${audit.started()}"/>
            </extensionElements>
            <startEvent id="s"/>
            <userTask id="work">
              <extensionElements>
                <camunda:executionListener event="start" class="org.acme.Notify">
                  <camunda:field name="channel" stringValue="mail"/>
                </camunda:executionListener>
                <camunda:executionListener event="end" delegateExpression="${closer}"/>
              </extensionElements>
            </userTask>
            <sequenceFlow id="f1" sourceRef="s" targetRef="work">
              <extensionElements>
                <camunda:executionListener event="end" expression="${taken}"/>
              </extensionElements>
            </sequenceFlow>"#,
        ));
        let g = graph(&output);
        assert_eq!(
            g.listeners,
            vec![ExecutionListener {
                event: ListenerEvent::Start,
                implementation: DelegateImplementation::Expression("${audit.started()}".into()),
                fields: Vec::new(),
            }]
        );
        assert_eq!(
            node(g, "work").listeners,
            vec![
                ExecutionListener {
                    event: ListenerEvent::Start,
                    implementation: DelegateImplementation::Class("org.acme.Notify".into()),
                    fields: vec![FieldDeclaration {
                        name: "channel".into(),
                        value: FieldValue::String("mail".into()),
                    }],
                },
                ExecutionListener {
                    event: ListenerEvent::End,
                    implementation: DelegateImplementation::DelegateExpression("${closer}".into()),
                    fields: Vec::new(),
                },
            ]
        );
        let f1 = g.find_transition("f1").expect("f1 built");
        assert_eq!(f1.listeners.len(), 1);
        assert_eq!(f1.listeners[0].event, ListenerEvent::Take);
    }

    /// Activity listeners accept only start and end.
    #[test]
    fn t_listeners_2_unknown_event() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <userTask id="work">
              <extensionElements>
                <camunda:executionListener event="take" class="org.acme.Notify"/>
              </extensionElements>
            </userTask>"#,
        ));
        assert_eq!(messages(&report.errors), vec!["Attribute 'event' must be one of {start|end}"]);
        assert!(report.errors[0].mentions("work"));
    }

    /// A field value comes from an attribute or a child element, not both.
    #[test]
    fn t_listeners_3_field_value_given_twice() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <userTask id="work">
              <extensionElements>
                <camunda:executionListener event="start" class="org.acme.Notify">
                  <camunda:field name="channel" stringValue="mail">
                    <camunda:string>sms</camunda:string>
                  </camunda:field>
                </camunda:executionListener>
              </extensionElements>
            </userTask>"#,
        ));
        let errors = messages(&report.errors);
        assert_eq!(
            errors[0],
            "Can't use attribute 'stringValue' and element 'string' together, only use one"
        );
    }
}
