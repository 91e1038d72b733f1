//! Catch-event wiring: named reference resolution, subscription uniqueness
//! per event scope, and the error/escalation handler lists.

use super::split_comma_list;
use crate::context::{DocumentContext, ProcessContext};
use crate::model::{
    is_expression, ActivityId, ConditionalEventDefinition, ErrorEventDefinition,
    EscalationEventDefinition, EventSubscriptionDeclaration, EventType, ScopeRef,
};
use crate::xml::XmlElement;

const VARIABLE_EVENTS: [&str; 3] = ["create", "update", "delete"];

// ─── Named references ─────────────────────────────────────────

/// Resolve `messageRef`. `None` when the reference is missing or unknown.
pub(super) fn message_name(
    definition_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<Option<String>> {
    let Some(message_ref) = definition_el.attr("messageRef") else {
        doc.error_with("attribute 'messageRef' is required", definition_el, &[activity_id]);
        return None;
    };
    match doc.definitions.message(message_ref) {
        Some(message) => Some(message.name.clone()),
        None => {
            doc.error_with(
                format!("Invalid 'messageRef': no message with id '{message_ref}' found."),
                definition_el,
                &[activity_id],
            );
            None
        }
    }
}

/// Message subscription for a catching event.
pub(super) fn message_subscription(
    definition_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<EventSubscriptionDeclaration> {
    let name = message_name(definition_el, activity_id, doc)?;
    Some(subscription(EventType::Message, name, activity_id))
}

/// Resolve `signalRef` into a signal subscription; `camunda:async` marks
/// asynchronous delivery.
pub(super) fn signal_subscription(
    definition_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<EventSubscriptionDeclaration> {
    let Some(signal_ref) = definition_el.attr("signalRef") else {
        doc.error_with(
            "signalEventDefinition does not have required property 'signalRef'",
            definition_el,
            &[activity_id],
        );
        return None;
    };
    let Some(signal) = doc.definitions.signal(signal_ref) else {
        doc.error_with(
            format!("Could not find signal with id '{signal_ref}'"),
            definition_el,
            &[activity_id],
        );
        return None;
    };
    let mut sub = subscription(EventType::Signal, Some(signal.name.clone()), activity_id);
    sub.is_async = definition_el.engine_attr("async") == Some("true");
    Some(sub)
}

fn subscription(event_type: EventType, event_name: Option<String>, activity_id: &str) -> EventSubscriptionDeclaration {
    EventSubscriptionDeclaration {
        event_type,
        event_name,
        activity_id: activity_id.to_string(),
        event_scope_id: None,
        start_event: false,
        is_async: false,
        condition: None,
    }
}

/// Message start events subscribe by a fixed name.
pub(super) fn ensure_no_expression_in_message_start(
    definition_el: &XmlElement,
    sub: &EventSubscriptionDeclaration,
    doc: &mut DocumentContext<'_>,
) {
    if let Some(name) = sub.event_name.as_deref().filter(|n| is_expression(n)) {
        doc.error_with(
            format!(
                "Invalid message name '{name}' for element '{}': expressions in the message start event name are not allowed!",
                definition_el.name
            ),
            definition_el,
            &[&sub.activity_id],
        );
    }
}

// ─── Conditional events ───────────────────────────────────────

pub(super) fn parse_conditional(
    definition_el: &XmlElement,
    activity_id: &str,
    interrupting: bool,
    doc: &mut DocumentContext<'_>,
) -> Option<ConditionalEventDefinition> {
    let Some(condition_el) = definition_el.child("condition") else {
        doc.error_with(
            "Conditional event must contain an expression for evaluation.",
            definition_el,
            &[activity_id],
        );
        return None;
    };

    let variable_events = definition_el
        .engine_attr("variableEvents")
        .map(split_comma_list)
        .unwrap_or_default();
    for event in &variable_events {
        if !VARIABLE_EVENTS.contains(&event.as_str()) {
            doc.warning_with(
                format!(
                    "Variable event: {event} is not valid. Possible variable change events are: [{}]",
                    VARIABLE_EVENTS.join(", ")
                ),
                definition_el,
                &[activity_id],
            );
        }
    }

    Some(ConditionalEventDefinition {
        condition: condition_el.text().to_string(),
        language: condition_el.attr("language").map(str::to_string),
        variable_name: definition_el.engine_attr("variableName").map(str::to_string),
        variable_events,
        interrupting,
    })
}

pub(super) fn conditional_subscription(
    definition: ConditionalEventDefinition,
    activity_id: &str,
    start_event: bool,
) -> EventSubscriptionDeclaration {
    EventSubscriptionDeclaration {
        start_event,
        condition: Some(definition),
        ..subscription(EventType::Conditional, None, activity_id)
    }
}

// ─── Registration ─────────────────────────────────────────────

/// Register `sub` on `scope`, enforcing one message and one signal
/// subscription per (name, start flag) and one start condition per text.
/// An existing entry for the same activity is replaced.
pub(super) fn add_subscription(
    mut sub: EventSubscriptionDeclaration,
    scope: ScopeRef,
    element: &XmlElement,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    sub.event_scope_id = pcx.graph.scope_id(scope).map(str::to_string);

    if sub.event_type == EventType::Message && sub.event_name.as_deref().map_or(true, str::is_empty) {
        doc.error_with(
            "Cannot have a message event subscription with an empty or missing name",
            element,
            &[&sub.activity_id],
        );
    }

    let scope_name = pcx.graph.scope_name(scope).to_string();
    let existing = &pcx.graph.declarations_of(scope).event_subscriptions;
    for other in existing.iter().filter(|o| o.activity_id != sub.activity_id) {
        let named = matches!(sub.event_type, EventType::Message | EventType::Signal);
        if named
            && other.event_type == sub.event_type
            && other.start_event == sub.start_event
            && other.event_name.is_some()
            && other.event_name == sub.event_name
        {
            doc.error_with(
                format!(
                    "Cannot have more than one {} event subscription with name '{}' for scope '{scope_name}'",
                    sub.event_type,
                    sub.event_name.as_deref().unwrap_or_default()
                ),
                element,
                &[&other.activity_id, &sub.activity_id],
            );
        }
        if sub.event_type == EventType::Conditional && sub.start_event && other.start_event {
            let condition = |s: &EventSubscriptionDeclaration| s.condition.as_ref().map(|c| c.condition.clone());
            if condition(other).is_some() && condition(other) == condition(&sub) {
                doc.error_with(
                    format!(
                        "Cannot have more than one conditional event subscription with the same condition '{}'",
                        condition(&sub).unwrap_or_default()
                    ),
                    element,
                    &[&sub.activity_id],
                );
            }
        }
    }

    let subscriptions = &mut pcx.graph.declarations_of_mut(scope).event_subscriptions;
    match subscriptions.iter_mut().find(|s| s.activity_id == sub.activity_id) {
        Some(slot) => *slot = sub,
        None => subscriptions.push(sub),
    }
}

// ─── Error and escalation handlers ────────────────────────────

/// `errorRef` of a catching definition: the referenced error's code, or the
/// reference itself when no such error exists. `None` catches everything.
pub(super) fn catching_error_definition(
    definition_el: &XmlElement,
    handler_activity_id: &str,
    base_precedence: i32,
    reporting_id: &str,
    doc: &mut DocumentContext<'_>,
) -> ErrorEventDefinition {
    let error_code = definition_el.attr("errorRef").and_then(|error_ref| {
        match doc.definitions.error(error_ref) {
            Some(error) => Some(error.error_code.clone().unwrap_or_else(|| error_ref.to_string())),
            None => unresolved_error_ref(definition_el, error_ref, reporting_id, doc),
        }
    });
    ErrorEventDefinition {
        handler_activity_id: handler_activity_id.to_string(),
        error_code,
        error_code_variable: definition_el.engine_attr("errorCodeVariable").map(str::to_string),
        error_message_variable: definition_el
            .engine_attr("errorMessageVariable")
            .map(str::to_string),
        base_precedence,
    }
}

/// An `errorRef` naming no error is still used verbatim as the error code.
pub(super) fn unresolved_error_ref(
    definition_el: &XmlElement,
    error_ref: &str,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<String> {
    doc.warning_with(
        format!("Could not find error with id '{error_ref}', the reference is used as error code"),
        definition_el,
        &[activity_id, error_ref],
    );
    Some(error_ref.to_string())
}

fn handler_kind(from_event_subprocess: bool) -> &'static str {
    if from_event_subprocess {
        "event subprocess"
    } else {
        "boundary event"
    }
}

/// Register an error handler on `scope`. Two catch-alls, or two handlers for
/// the same code, conflict whether they are boundary events or event
/// subprocesses.
pub(super) fn add_error_definition(
    definition: ErrorEventDefinition,
    scope: ScopeRef,
    element: &XmlElement,
    catching_activity_id: &str,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let from_event_subprocess = definition.is_from_event_subprocess();
    let conflicts: Vec<(String, String)> = pcx
        .graph
        .declarations_of(scope)
        .error_event_definitions
        .iter()
        .filter(|d| d.error_code == definition.error_code)
        .map(|other| {
            let message = if other.is_from_event_subprocess() == from_event_subprocess {
                let kind = handler_kind(from_event_subprocess);
                match &definition.error_code {
                    None => format!("multiple error {kind}s without errorCode are not supported on same scope"),
                    Some(code) => format!(
                        "multiple error {kind}s with the same errorCode '{code}' are not supported on same scope"
                    ),
                }
            } else {
                match &definition.error_code {
                    None => "an error boundary event and an error event subprocess without errorCode are not \
                             supported on same scope. Both catch all errors."
                        .to_string(),
                    Some(code) => format!(
                        "an error boundary event and an error event subprocess with the same errorCode '{code}' \
                         are not supported on same scope"
                    ),
                }
            };
            (message, other.handler_activity_id.clone())
        })
        .collect();
    for (message, other) in conflicts {
        doc.error_with(message, element, &[catching_activity_id, &other]);
    }
    pcx.graph
        .declarations_of_mut(scope)
        .insert_error_definition(definition);
}

/// `escalationRef` of a catching definition. An unknown reference is an error;
/// a missing one catches every escalation.
pub(super) fn catching_escalation_definition(
    definition_el: &XmlElement,
    handler_activity_id: &str,
    cancel_activity: bool,
    from_event_subprocess: bool,
    reporting_id: &str,
    doc: &mut DocumentContext<'_>,
) -> EscalationEventDefinition {
    let mut escalation_code = None;
    if let Some(escalation_ref) = definition_el.attr("escalationRef") {
        match doc.definitions.escalation(escalation_ref) {
            Some(escalation) => escalation_code = escalation.escalation_code.clone(),
            None => doc.error_with(
                format!("could not find escalation with id '{escalation_ref}'"),
                definition_el,
                &[reporting_id],
            ),
        }
    }
    EscalationEventDefinition {
        handler_activity_id: handler_activity_id.to_string(),
        escalation_code,
        escalation_code_variable: definition_el
            .engine_attr("escalationCodeVariable")
            .map(str::to_string),
        cancel_activity,
        from_event_subprocess,
    }
}

/// Register an escalation handler on `scope`. Two catch-alls, or two handlers
/// for the same code, conflict whatever kind of handler they are.
pub(super) fn add_escalation_definition(
    definition: EscalationEventDefinition,
    scope: ScopeRef,
    element: &XmlElement,
    catching_activity_id: &str,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let existing = &pcx.graph.declarations_of(scope).escalation_event_definitions;
    let mut messages = Vec::new();
    for other in existing.iter().filter(|o| o.escalation_code == definition.escalation_code) {
        let same_kind = other.from_event_subprocess == definition.from_event_subprocess;
        let message = match (&definition.escalation_code, same_kind) {
            (None, true) => {
                let kind = handler_kind(definition.from_event_subprocess);
                format!(
                    "The same scope can not contains more than one escalation {kind} without escalation code. \
                     An escalation {kind} without escalation code catch all escalation events."
                )
            }
            (None, false) => "The same scope can not contains an escalation boundary event and an escalation event subprocess \
                 without escalation code. Both catch all escalation events."
                .to_string(),
            (Some(code), true) => {
                let kind = if definition.from_event_subprocess {
                    "event subprocesses"
                } else {
                    "boundary events"
                };
                format!("multiple escalation {kind} with the same escalationCode '{code}' are not supported on same scope")
            }
            (Some(code), false) => format!(
                "an escalation boundary event and an escalation event subprocess with the same escalationCode '{code}' \
                 are not supported on same scope"
            ),
        };
        messages.push((message, other.handler_activity_id.clone()));
    }
    for (message, other) in messages {
        doc.error_with(message, element, &[catching_activity_id, &other]);
    }
    pcx.graph
        .declarations_of_mut(scope)
        .insert_escalation_definition(definition);
}

// ─── Compensation ─────────────────────────────────────────────

/// Catching compensation ignores the throw-side attributes.
pub(super) fn validate_catch_compensate(
    definition_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) {
    if definition_el.attr("activityRef").is_some() {
        doc.warning_with(
            "attribute 'activityRef' is not supported on catching compensation event. attribute will be ignored",
            definition_el,
            &[activity_id],
        );
    }
    if definition_el.attr("waitForCompletion").is_some() {
        doc.warning_with(
            "attribute 'waitForCompletion' is not supported on catching compensation event. attribute will be ignored",
            definition_el,
            &[activity_id],
        );
    }
}

/// The compensation handler already registered for `activity`, if any.
pub(super) fn compensation_handler_of(pcx: &ProcessContext<'_>, activity: ActivityId) -> Option<ActivityId> {
    let handler_id = pcx.graph.activity(activity).compensation_handler_id.as_deref()?;
    pcx.find(handler_id)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process, semantic_errors};
    use crate::model::{ActivityBehavior, EventTrigger, EventType};

    fn subprocess_with_catch_all_handler(boundary: &str) -> String {
        process(&format!(
            r#"<startEvent id="s"/>
            <subProcess id="work">
              <startEvent id="ws"/>
              <subProcess id="on_error" triggeredByEvent="true">
                <startEvent id="esp_start"><errorEventDefinition/></startEvent>
              </subProcess>
            </subProcess>
            {boundary}"#
        ))
    }

    /// A catch-all boundary and a catch-all event subprocess on one scope conflict.
    #[test]
    fn t_subs_1_catch_all_boundary_and_event_subprocess_conflict() {
        let report = semantic_errors(&subprocess_with_catch_all_handler(
            r#"<boundaryEvent id="caught" attachedToRef="work"><errorEventDefinition/></boundaryEvent>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec![
                "an error boundary event and an error event subprocess without errorCode are not supported on \
                 same scope. Both catch all errors."
            ]
        );
        assert!(report.errors[0].mentions("caught"));
        assert!(report.errors[0].mentions("on_error"));
    }

    /// A coded boundary next to a catch-all event subprocess is fine and
    /// ranks first.
    #[test]
    fn t_subs_2_coded_handler_precedes_catch_all() {
        let body = format!(
            r#"<error id="limit" errorCode="E_LIMIT"/>{}"#,
            subprocess_with_catch_all_handler(
                r#"<boundaryEvent id="limit_hit" attachedToRef="work">
                     <errorEventDefinition errorRef="limit"/>
                   </boundaryEvent>"#,
            )
        );
        let output = compile(&body);
        let work = node(graph(&output), "work");
        let handlers: Vec<(&str, Option<&str>)> = work
            .declarations
            .error_event_definitions
            .iter()
            .map(|d| (d.handler_activity_id.as_str(), d.error_code.as_deref()))
            .collect();
        assert_eq!(handlers, vec![("limit_hit", Some("E_LIMIT")), ("on_error", None)]);
        assert!(!work.declarations.error_event_definitions[0].is_from_event_subprocess());
        assert!(work.declarations.error_event_definitions[1].is_from_event_subprocess());
    }

    /// Two boundaries catching the same code on one host conflict.
    #[test]
    fn t_subs_3_same_error_code_twice() {
        let report = semantic_errors(&format!(
            r#"<error id="limit" errorCode="E_LIMIT"/>{}"#,
            process(
                r#"<startEvent id="s"/>
                <userTask id="work"/>
                <boundaryEvent id="b1" attachedToRef="work"><errorEventDefinition errorRef="limit"/></boundaryEvent>
                <boundaryEvent id="b2" attachedToRef="work"><errorEventDefinition errorRef="limit"/></boundaryEvent>"#
            )
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["multiple error boundary events with the same errorCode 'E_LIMIT' are not supported on same scope"]
        );
        assert!(report.errors[0].mentions("b1"));
        assert!(report.errors[0].mentions("b2"));
    }

    /// An unknown errorRef warns and is kept as the literal error code.
    #[test]
    fn t_subs_4_unknown_error_ref_warns() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <userTask id="work"/>
            <boundaryEvent id="caught" attachedToRef="work">
              <errorEventDefinition errorRef="doesNotExist"/>
            </boundaryEvent>"#,
        ));
        assert_eq!(
            messages(&output.warnings),
            vec!["Could not find error with id 'doesNotExist', the reference is used as error code"]
        );
        assert!(output.warnings[0].mentions("caught"));
        assert!(output.warnings[0].mentions("doesNotExist"));

        let g = graph(&output);
        assert_eq!(
            node(g, "caught").behavior,
            ActivityBehavior::BoundaryEvent {
                trigger: EventTrigger::Error {
                    error_code: Some("doesNotExist".into())
                },
                cancel_activity: true,
            }
        );
        assert_eq!(
            node(g, "work").declarations.error_event_definitions[0].error_code.as_deref(),
            Some("doesNotExist")
        );
    }

    /// Two boundaries subscribing to one signal on the same host conflict.
    #[test]
    fn t_subs_5_duplicate_signal_subscription() {
        let report = semantic_errors(&format!(
            r#"<signal id="sig" name="alert"/>{}"#,
            process(
                r#"<startEvent id="s"/>
                <userTask id="work"/>
                <boundaryEvent id="b1" attachedToRef="work"><signalEventDefinition signalRef="sig"/></boundaryEvent>
                <boundaryEvent id="b2" attachedToRef="work"><signalEventDefinition signalRef="sig"/></boundaryEvent>"#
            )
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["Cannot have more than one signal event subscription with name 'alert' for scope 'work'"]
        );
        assert!(report.errors[0].mentions("b1"));
        assert!(report.errors[0].mentions("b2"));
    }

    /// A prefixed messageRef resolves through the target namespace.
    #[test]
    fn t_subs_6_prefixed_message_ref() {
        let output = compile(&format!(
            r#"<message id="m" name="order"/>{}"#,
            process(r#"<startEvent id="s"><messageEventDefinition messageRef="tns:m"/></startEvent>"#)
        ));
        let g = graph(&output);
        assert_eq!(
            node(g, "s").behavior,
            ActivityBehavior::StartEvent {
                trigger: EventTrigger::Message {
                    message_name: Some("order".into())
                }
            }
        );
        let sub = &g.declarations.event_subscriptions[0];
        assert_eq!(sub.event_type, EventType::Message);
        assert_eq!(sub.event_name.as_deref(), Some("order"));
        assert!(sub.start_event);
    }

    /// A messageRef naming no message is an error.
    #[test]
    fn t_subs_7_unknown_message_ref() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"><messageEventDefinition messageRef="tns:missing"/></startEvent>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["Invalid 'messageRef': no message with id 'tns:missing' found."]
        );
        assert!(report.errors[0].mentions("s"));
    }
}
