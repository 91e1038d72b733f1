//! Task builders: script, service-like, send, business rule, receive, user,
//! and the plain `task`/`manualTask` pass-throughs.

use super::callable::parse_binding;
use super::jobs::{add_timer, parse_async_for_activity, TimerTarget};
use super::listeners::{parse_fields, parse_listener_implementation};
use super::subscriptions::{add_subscription, message_subscription, unresolved_error_ref};
use super::{
    create_activity, finish_activity, parse_documentation, parse_extension_properties,
    parse_priority, split_comma_list, strip_call,
};
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::hooks::HookEvent;
use crate::model::{
    job_handlers, ActivityBehavior, ActivityId, DecisionResultMapper, DecisionTaskDefinition, EventThrow,
    ExternalErrorEventDefinition, ExternalTaskDefinition, FieldDeclaration, FormDefinition,
    ScopeRef, ScriptBody, ScriptSource, ServiceImplementation, TaskDefinition, TaskListener, TimerDefinition,
    VariableDeclaration,
};
use crate::xml::XmlElement;

const FORM_REF_BINDINGS: [&str; 3] = ["deployment", "latest", "version"];
const TASK_LISTENER_EVENTS: [&str; 5] = ["create", "assignment", "complete", "update", "delete"];

// ─── Pass-through tasks ───────────────────────────────────────

pub(super) fn build_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::Task;
    parse_async_for_activity(el, id, doc, pcx);
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

pub(super) fn build_manual_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::ManualTask;
    parse_async_for_activity(el, id, doc, pcx);
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

// ─── Script task ──────────────────────────────────────────────

fn result_variable(el: &XmlElement) -> Option<String> {
    el.engine_attr("resultVariable")
        .or_else(|| el.engine_attr("resultVariableName"))
        .map(str::to_string)
}

pub(super) fn build_script_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);

    let language = el
        .attr("scriptFormat")
        .map(str::to_string)
        .unwrap_or_else(|| doc.config.default_script_format.clone());
    let inline = el.child("script").map(|s| s.text.clone());
    let body = match (inline, el.engine_attr("resource")) {
        (Some(source), _) => ScriptBody::Inline(source.trim().to_string()),
        (None, Some(resource)) => ScriptBody::Resource(resource.to_string()),
        (None, None) => {
            doc.error(
                "Unable to process ScriptTask: No script source or resource was given",
                el,
            );
            return Ok(Some(id));
        }
    };

    parse_async_for_activity(el, id, doc, pcx);
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::ScriptTask {
        script: ScriptSource { language, body },
        result_variable: result_variable(el),
    };
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

// ─── Service-task-like ────────────────────────────────────────

/// Carries at least one of the attributes or extensions that give it a
/// service implementation.
pub(super) fn is_service_task_like(el: &XmlElement) -> bool {
    ["class", "expression", "delegateExpression", "type"]
        .iter()
        .any(|a| el.engine_attr(a).is_some())
        || el.extension("connector").is_some()
}

/// Implementation read from `impl_el` (the task, or the message event
/// definition of a throwing event). `properties_el` holds `camunda:properties`
/// for external tasks. Sets the activity to a scope for external tasks.
pub(super) fn parse_service_implementation(
    tag: &str,
    impl_el: &XmlElement,
    properties_el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> Option<ServiceImplementation> {
    let result_variable = result_variable(impl_el);

    if let Some(kind) = impl_el.engine_attr("type") {
        return match kind.to_ascii_lowercase().as_str() {
            "mail" => {
                let fields = parse_fields(impl_el, doc);
                validate_mail_fields(impl_el, &fields, doc);
                Some(ServiceImplementation::Mail { fields })
            }
            "shell" => {
                let fields = parse_fields(impl_el, doc);
                validate_shell_fields(impl_el, &fields, doc);
                Some(ServiceImplementation::Shell { fields })
            }
            "external" => {
                pcx.graph.activity_mut(activity).is_scope = true;
                let definition = parse_external_task(impl_el, properties_el, activity, doc, pcx);
                definition.map(ServiceImplementation::External)
            }
            _ => {
                doc.error(format!("Invalid usage of type attribute on {tag}: '{kind}'"), impl_el);
                None
            }
        };
    }

    if let Some(class_name) = impl_el.non_empty_engine_attr("class") {
        if result_variable.is_some() {
            doc.error(
                format!("'resultVariableName' not supported for {tag} elements using 'class'"),
                impl_el,
            );
        }
        return Some(ServiceImplementation::Class {
            class_name: class_name.to_string(),
            fields: parse_fields(impl_el, doc),
        });
    }

    if let Some(expression) = impl_el.engine_attr("delegateExpression") {
        if result_variable.is_some() {
            doc.error(
                format!("'resultVariableName' not supported for {tag} elements using 'delegateExpression'"),
                impl_el,
            );
        }
        return Some(ServiceImplementation::DelegateExpression {
            expression: expression.to_string(),
            fields: parse_fields(impl_el, doc),
        });
    }

    if let Some(expression) = impl_el.non_empty_engine_attr("expression") {
        return Some(ServiceImplementation::Expression {
            expression: expression.to_string(),
            result_variable,
        });
    }

    impl_el
        .extension("connector")
        .and_then(|c| c.engine_child("connectorId"))
        .map(|id| id.text())
        .filter(|id| !id.is_empty())
        .map(|connector_id| ServiceImplementation::Connector {
            connector_id: connector_id.to_string(),
        })
}

/// Reported after the hooks ran, since a hook may supply the behavior.
pub(super) fn validate_service_task_like(
    tag: &str,
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &ProcessContext<'_>,
) {
    let resolved = match &pcx.graph.activity(activity).behavior {
        ActivityBehavior::Unresolved => false,
        ActivityBehavior::IntermediateThrowEvent { throws } | ActivityBehavior::EndEvent { throws } => {
            !matches!(throws, EventThrow::Message { implementation: None })
        }
        _ => true,
    };
    if !resolved {
        doc.error(
            format!(
                "One of the attributes 'class', 'delegateExpression', 'type', or 'expression' is mandatory on {tag}. \
                 If you are using a connector, make sure the connector extension is available."
            ),
            el,
        );
    }
}

fn validate_mail_fields(el: &XmlElement, fields: &[FieldDeclaration], doc: &mut DocumentContext<'_>) {
    let has = |name: &str| fields.iter().any(|f| f.name == name);
    if !has("to") {
        doc.error("No recipient is defined on the mail activity", el);
    }
    if !has("text") && !has("html") {
        doc.error("Text or html field should be provided", el);
    }
}

fn validate_shell_fields(el: &XmlElement, fields: &[FieldDeclaration], doc: &mut DocumentContext<'_>) {
    for field in fields {
        if matches!(field.name.as_str(), "wait" | "redirectError" | "cleanEnv") {
            let value = field.text().to_ascii_lowercase();
            if value != "true" && value != "false" {
                doc.error(
                    format!("undefined value for shell {} parameter :{}", field.name, field.text()),
                    el,
                );
            }
        }
    }
    if !fields.iter().any(|f| f.name == "command") {
        doc.error("No shell command is defined on the shell activity", el);
    }
}

fn parse_external_task(
    el: &XmlElement,
    properties_el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &ProcessContext<'_>,
) -> Option<ExternalTaskDefinition> {
    let Some(topic) = el.engine_attr("topic") else {
        doc.error("External tasks must specify a 'topic' attribute in the camunda namespace", el);
        return None;
    };
    let activity_id = &pcx.graph.activity(activity).id;
    let error_event_definitions = el
        .child("extensionElements")
        .into_iter()
        .flat_map(|ext| ext.children.iter().filter(|c| c.name == "errorEventDefinition"))
        .filter_map(|def| {
            let error_ref = def.attr("errorRef")?;
            let error_code = match doc.definitions.error(error_ref) {
                Some(error) => error.error_code.clone(),
                None => unresolved_error_ref(def, error_ref, activity_id, doc),
            };
            Some(ExternalErrorEventDefinition {
                id: def.id().unwrap_or(activity_id.as_str()).to_string(),
                error_code,
                expression: def.attr("expression").map(str::to_string),
            })
        })
        .collect();
    Some(ExternalTaskDefinition {
        topic: topic.to_string(),
        task_priority: parse_priority(el, "taskPriority", doc),
        properties: parse_extension_properties(properties_el),
        error_event_definitions,
    })
}

/// Shared body of `serviceTask`, service-like `sendTask` and `businessRuleTask`.
fn build_service_like<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<ActivityId> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);
    if let Some(implementation) = parse_service_implementation(&el.name, el, el, id, doc, pcx) {
        pcx.graph.activity_mut(id).behavior = ActivityBehavior::ServiceTask { implementation };
    }
    finish_activity(el, id, doc, pcx)?;
    validate_service_task_like(&el.name, el, id, doc, pcx);
    Ok(id)
}

pub(super) fn build_service_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    build_service_like(el, scope, doc, pcx).map(Some)
}

pub(super) fn build_send_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    if is_service_task_like(el) {
        return build_service_like(el, scope, doc, pcx).map(Some);
    }
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);
    finish_activity(el, id, doc, pcx)?;
    if matches!(pcx.graph.activity(id).behavior, ActivityBehavior::Unresolved) {
        doc.error(
            "One of the attributes 'class', 'delegateExpression', 'type', or 'expression' is mandatory on sendTask.",
            el,
        );
    }
    Ok(Some(id))
}

// ─── Business rule task ───────────────────────────────────────

pub(super) fn build_business_rule_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let Some(decision_ref) = el.engine_attr("decisionRef") else {
        return build_service_like(el, scope, doc, pcx).map(Some);
    };

    let id = create_activity(el, scope.scope, doc, pcx);
    // the result variable is stored locally
    pcx.graph.activity_mut(id).is_scope = true;
    parse_async_for_activity(el, id, doc, pcx);

    let binding = parse_binding(
        el,
        "decisionRefBinding",
        "decisionRefVersion",
        "decisionRefVersionTag",
        doc,
    );
    let result_mapper = parse_decision_result_mapper(el, doc);
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::DecisionTask(DecisionTaskDefinition {
        decision_ref: decision_ref.to_string(),
        binding,
        tenant_id: el.non_empty_engine_attr("decisionRefTenantId").map(str::to_string),
        result_variable: result_variable(el),
        result_mapper,
    });
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

fn parse_decision_result_mapper(el: &XmlElement, doc: &mut DocumentContext<'_>) -> DecisionResultMapper {
    match el.engine_attr("mapDecisionResult") {
        None | Some("resultList") => DecisionResultMapper::ResultList,
        Some("singleEntry") => DecisionResultMapper::SingleEntry,
        Some("singleResult") => DecisionResultMapper::SingleResult,
        Some("collectEntries") => DecisionResultMapper::CollectEntries,
        Some(other) => {
            doc.error(
                format!(
                    "No decision result mapper found for name '{other}'. Supported mappers are 'singleEntry', \
                     'singleResult', 'collectEntries' and 'resultList'."
                ),
                el,
            );
            DecisionResultMapper::ResultList
        }
    }
}

// ─── Receive task ─────────────────────────────────────────────

pub(super) fn build_receive_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);

    let mut message_name = None;
    if el.attr("messageRef").is_some() {
        let activity_id = pcx.graph.activity(id).id.clone();
        let node = pcx.graph.activity_mut(id);
        node.is_scope = true;
        node.event_scope = Some(ScopeRef::Activity(id));
        if let Some(sub) = message_subscription(el, &activity_id, doc) {
            message_name = sub.event_name.clone();
            add_subscription(sub, ScopeRef::Activity(id), el, doc, pcx);
        }
    }
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::ReceiveTask { message_name };
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

// ─── User task ────────────────────────────────────────────────

pub(super) fn build_user_task<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);

    let key = pcx.graph.activity(id).id.clone();
    let definition = parse_task_definition(el, &key, id, doc, pcx);
    pcx.graph.task_definitions.insert(key.clone(), definition);
    pcx.graph.activity_mut(id).behavior = ActivityBehavior::UserTask {
        task_definition_key: key,
    };

    parse_properties(el, id, doc, pcx)?;
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

fn parse_task_definition(
    el: &XmlElement,
    key: &str,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> TaskDefinition {
    let mut definition = TaskDefinition {
        key: key.to_string(),
        form: parse_form_definition(el, doc),
        name_expression: el.attr("name").map(str::to_string),
        description_expression: parse_documentation(el),
        ..Default::default()
    };
    let display_name = definition.name_expression.clone().unwrap_or_else(|| "null".to_string());

    let performers: Vec<&XmlElement> = el.children_named("humanPerformer").collect();
    if performers.len() > 1 {
        doc.error(
            format!("Invalid task definition: multiple humanPerformer sub elements defined for {display_name}"),
            el,
        );
    } else if let Some(performer) = performers.first() {
        if let Some(expression) = formal_expression(performer) {
            definition.assignee_expression = Some(expression.to_string());
        }
    }

    for owner in el.children_named("potentialOwner") {
        for entry in formal_expression(owner).map(split_comma_list).unwrap_or_default() {
            if let Some(user) = strip_call(&entry, "user") {
                definition.candidate_user_expressions.push(user.to_string());
            } else if let Some(group) = strip_call(&entry, "group") {
                definition.candidate_group_expressions.push(group.to_string());
            } else {
                definition.candidate_group_expressions.push(entry);
            }
        }
    }

    if let Some(assignee) = el.engine_attr("assignee") {
        if definition.assignee_expression.is_none() {
            definition.assignee_expression = Some(assignee.to_string());
        } else {
            doc.error(
                format!("Invalid usage: duplicate assignee declaration for task {display_name}"),
                el,
            );
        }
    }
    if let Some(users) = el.engine_attr("candidateUsers") {
        definition.candidate_user_expressions.extend(split_comma_list(users));
    }
    if let Some(groups) = el.engine_attr("candidateGroups") {
        definition.candidate_group_expressions.extend(split_comma_list(groups));
    }

    definition.task_listeners = parse_task_listeners(el, activity, doc, pcx);

    definition.due_date_expression = el.engine_attr("dueDate").map(str::to_string);
    definition.follow_up_date_expression = el.engine_attr("followUpDate").map(str::to_string);
    definition.priority_expression = el.engine_attr("priority").map(str::to_string);
    definition
}

fn formal_expression(performer: &XmlElement) -> Option<&str> {
    performer
        .child("resourceAssignmentExpression")?
        .child("formalExpression")
        .map(|f| f.text())
}

/// `camunda:formKey` or `camunda:formRef` with its binding. Used for user
/// tasks and for the process start form.
pub(super) fn parse_form_definition(el: &XmlElement, doc: &mut DocumentContext<'_>) -> FormDefinition {
    let form_key = el.engine_attr("formKey");
    let form_ref = el.engine_attr("formRef");
    if form_key.is_some() && form_ref.is_some() {
        doc.error(
            "Invalid element definition: only one of the attributes formKey and formRef is allowed.",
            el,
        );
    }

    let mut form = FormDefinition {
        form_key: form_key.map(str::to_string),
        ..Default::default()
    };
    if let Some(form_ref) = form_ref {
        form.form_ref = Some(form_ref.to_string());
        let binding = el.engine_attr("formRefBinding");
        if !binding.is_some_and(|b| FORM_REF_BINDINGS.contains(&b)) {
            doc.error(
                format!(
                    "Invalid element definition: value for formRefBinding attribute has to be one of [{}] but was {}",
                    FORM_REF_BINDINGS.join(", "),
                    binding.unwrap_or("null")
                ),
                el,
            );
        }
        form.form_ref_binding = binding.map(str::to_string);
        if binding == Some("version") {
            form.form_ref_version = el.engine_attr("formRefVersion").map(str::to_string);
        }
    }
    form
}

// ── Task listeners ──

fn parse_task_listeners(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> Vec<TaskListener> {
    let activity_id = pcx.graph.activity(activity).id.clone();
    let mut listeners = Vec::new();
    for listener_el in el.extensions("taskListener") {
        let Some(event) = listener_el.attr("event") else {
            doc.error("Attribute 'event' is mandatory on taskListener", el);
            continue;
        };
        let timeout = match event {
            "timeout" => Some(parse_timeout(listener_el, activity, doc, pcx)),
            e if TASK_LISTENER_EVENTS.contains(&e) => None,
            _ => {
                doc.error(
                    "Attribute 'event' must be one of {create|assignment|complete|update|delete|timeout}",
                    el,
                );
                continue;
            }
        };
        let Some((implementation, fields)) = parse_listener_implementation(
            listener_el,
            &activity_id,
            doc,
            "Element 'class', 'expression', 'delegateExpression' or 'script' is mandatory on taskListener",
            false,
        ) else {
            continue;
        };
        listeners.push(TaskListener {
            event: event.to_string(),
            id: listener_el.id().map(str::to_string),
            implementation,
            fields,
            timeout: timeout.flatten(),
        });
    }
    listeners
}

/// Timer of a `timeout` listener. The task becomes a scope and the event
/// scope of its own timer.
fn parse_timeout(
    listener_el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> Option<TimerDefinition> {
    let activity_id = pcx.graph.activity(activity).id.clone();
    let listener_id = listener_el.id();
    if listener_id.is_none() {
        doc.error_with(
            "Element 'id' is mandatory on taskListener of type 'timeout'",
            listener_el,
            &[&activity_id],
        );
    }
    let timer_el = listener_el.child("timerEventDefinition");
    if timer_el.is_none() {
        doc.error_with(
            "Element 'timerEventDefinition' is mandatory on taskListener of type 'timeout'",
            listener_el,
            &[&activity_id],
        );
    }
    let node = pcx.graph.activity_mut(activity);
    node.is_scope = true;
    node.event_scope = Some(ScopeRef::Activity(activity));

    let listener_id = listener_id.unwrap_or("null");
    add_timer(
        timer_el?,
        activity,
        TimerTarget {
            handler: job_handlers::TIMER_TASK_LISTENER,
            configuration: Some(format!("{activity_id}$taskListener~{listener_id}")),
            event_scope: ScopeRef::Activity(activity),
            interrupting: false,
            listener_id: Some(listener_id.to_string()),
        },
        doc,
        pcx,
    )
}

// ── Properties ──

/// BPMN `property` children become variable declarations; the activity
/// becomes a scope.
pub(super) fn parse_properties(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    for property in el.children_named("property") {
        let Some(name) = property.attr("name").or_else(|| property.id()) else {
            let activity_id = pcx.graph.activity(activity).id.clone();
            doc.error_with(
                format!(
                    "Invalid property usage on line {}: no id or name specified.",
                    property.line
                ),
                property,
                &[&activity_id],
            );
            continue;
        };
        let type_name = property.engine_attr("type").unwrap_or("string");
        let node = pcx.graph.activity_mut(activity);
        node.variable_declarations.push(VariableDeclaration {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        node.is_scope = true;
        doc.fire(HookEvent::Property {
            element: property,
            graph: &mut pcx.graph,
            activity,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process};
    use super::*;
    use crate::xml::parse_document;

    fn element(xml: &str) -> XmlElement {
        parse_document(xml, &[crate::xml::ENGINE_NS.to_string()]).unwrap()
    }

    /// External service tasks count as service-like, plain send tasks do not.
    #[test]
    fn t_tasks_1_service_like_detection() {
        let el = element(
            r#"<serviceTask xmlns:camunda="http://camunda.org/schema/1.0/bpmn" camunda:type="external"/>"#,
        );
        assert!(is_service_task_like(&el));
        let el = element(r#"<sendTask/>"#);
        assert!(!is_service_task_like(&el));
    }

    /// The legacy `resultVariableName` attribute is still read.
    #[test]
    fn t_tasks_2_result_variable_fallback() {
        let el = element(
            r#"<scriptTask xmlns:camunda="http://camunda.org/schema/1.0/bpmn" camunda:resultVariableName="out"/>"#,
        );
        assert_eq!(result_variable(&el).as_deref(), Some("out"));
    }

    /// An external task error definition with an unknown errorRef warns.
    #[test]
    fn t_tasks_3_external_error_definition_unknown_ref() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <serviceTask id="charge" camunda:type="external" camunda:topic="payments">
              <extensionElements>
                <camunda:errorEventDefinition id="card_declined" errorRef="missing" expression="${declined}"/>
              </extensionElements>
            </serviceTask>"#,
        ));
        assert_eq!(
            messages(&output.warnings),
            vec!["Could not find error with id 'missing', the reference is used as error code"]
        );
        let warning = &output.warnings[0];
        assert!(warning.mentions("card_declined"));
        assert!(warning.mentions("charge"));
        assert!(warning.mentions("missing"));

        let ActivityBehavior::ServiceTask {
            implementation: ServiceImplementation::External(external),
        } = &node(graph(&output), "charge").behavior
        else {
            panic!("expected an external service task");
        };
        assert_eq!(external.topic, "payments");
        assert_eq!(
            external.error_event_definitions,
            vec![ExternalErrorEventDefinition {
                id: "card_declined".into(),
                error_code: Some("missing".into()),
                expression: Some("${declined}".into()),
            }]
        );
    }
}
