//! Start, intermediate, end and boundary events.
//!
//! Catching events register their subscription, timer, error or escalation
//! handler on their event scope. That is the process or enclosing subprocess
//! for start events, the event itself (or its event-based gateway) for
//! intermediate catches, and the host or its multi-instance body for
//! boundary events.

use super::io::{ensure_no_io_mapping, parse_activity_io};
use super::jobs::{add_event_subscription_job, add_timer, parse_async, parse_async_for_activity, TimerTarget};
use super::subscriptions::{
    add_error_definition, add_escalation_definition, add_subscription, catching_error_definition,
    catching_escalation_definition, compensation_handler_of, conditional_subscription,
    ensure_no_expression_in_message_start, message_subscription, parse_conditional, signal_subscription,
    unresolved_error_ref, validate_catch_compensate,
};
use super::tasks::{
    is_service_task_like, parse_form_definition, parse_service_implementation, validate_service_task_like,
};
use super::{create_activity, finish_activity};
use crate::context::{DocumentContext, PendingActivityRef, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::hooks::HookEvent;
use crate::model::activity_types as types;
use crate::model::{
    job_handlers, ActivityBehavior, ActivityId, ActivityStartBehavior, ErrorEventDefinition, EventThrow,
    EventTrigger, EventType, ScopeRef,
};
use crate::xml::XmlElement;

fn set_type(pcx: &mut ProcessContext<'_>, activity: ActivityId, kind: &str) {
    pcx.graph.activity_mut(activity).activity_type = kind.to_string();
}

fn fire_definition(
    definition_el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    doc.fire(HookEvent::EventDefinition {
        kind: &definition_el.name,
        element: definition_el,
        graph: &mut pcx.graph,
        activity,
    })
}

fn warn_time_cycle(timer_el: &XmlElement, kind: &str, activity_id: &str, doc: &mut DocumentContext<'_>) {
    if let Some(cycle) = timer_el.child("timeCycle") {
        doc.warning_with(
            format!("It is not recommended to use a {kind} timer event with a time cycle."),
            cycle,
            &[activity_id],
        );
    }
}

// ─── Start events ─────────────────────────────────────────────

/// Every `startEvent` of the scope element. On a process this also selects
/// the initial activity and reads the start form.
pub(super) fn parse_start_events<'x>(
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    let mut started = Vec::new();
    for el in scope.element.children_named("startEvent") {
        let id = create_activity(el, scope.scope, doc, pcx);
        parse_async_for_activity(el, id, doc, pcx);
        if scope.is_process() {
            parse_process_start_event(el, id, doc, pcx)?;
        } else {
            parse_scope_start_event(el, id, scope, doc, pcx)?;
        }
        ensure_no_io_mapping(el, doc);
        started.push((el, id));
    }

    let tag = scope.element.name.as_str();
    if started.is_empty() && matches!(tag, "process" | "subProcess") {
        doc.error(format!("{tag} must define a startEvent element"), scope.element);
    }
    if scope.is_process() {
        select_initial(scope.element, &started, doc, pcx);
    }

    for (el, id) in started {
        finish_activity(el, id, doc, pcx)?;
    }
    Ok(())
}

/// One none or timer start event becomes the initial activity; a lone start
/// event of any kind does too.
fn select_initial(
    process_el: &XmlElement,
    started: &[(&XmlElement, ActivityId)],
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    for (_, id) in started {
        let node = pcx.graph.activity(*id);
        if node.activity_type != types::START_EVENT && node.activity_type != types::START_EVENT_TIMER {
            continue;
        }
        let activity_id = node.id.clone();
        if pcx.graph.initial.is_none() {
            pcx.graph.initial = Some(*id);
        } else {
            doc.error_with(
                "multiple none start events or timer start events not supported on process definition",
                process_el,
                &[activity_id.as_str()],
            );
        }
    }
    if pcx.graph.initial.is_none() {
        if let [(_, only)] = started {
            pcx.graph.initial = Some(*only);
        }
    }

    let initial_el = started
        .iter()
        .find(|(_, id)| Some(*id) == pcx.graph.initial)
        .map(|(el, _)| *el);
    if let Some(el) = initial_el {
        pcx.graph.start_form = parse_form_definition(el, doc);
    }
}

fn parse_process_start_event(
    el: &XmlElement,
    id: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    if let Some(initiator) = el.engine_attr("initiator") {
        pcx.graph.initiator_variable = Some(initiator.to_string());
    }
    let activity_id = pcx.graph.activity(id).id.clone();
    let mut trigger = EventTrigger::None;

    if let Some(def) = el.child("timerEventDefinition") {
        set_type(pcx, id, types::START_EVENT_TIMER);
        let target = TimerTarget {
            handler: job_handlers::TIMER_START_EVENT,
            configuration: Some(pcx.graph.key.clone()),
            event_scope: ScopeRef::Process,
            interrupting: true,
            listener_id: None,
        };
        if let Some(timer) = add_timer(def, id, target, doc, pcx) {
            trigger = EventTrigger::Timer(timer);
        }
        fire_definition(def, id, doc, pcx)?;
    } else if let Some(def) = el.child("messageEventDefinition") {
        set_type(pcx, id, types::START_EVENT_MESSAGE);
        if let Some(mut sub) = message_subscription(def, &activity_id, doc) {
            sub.start_event = true;
            ensure_no_expression_in_message_start(def, &sub, doc);
            trigger = EventTrigger::Message {
                message_name: sub.event_name.clone(),
            };
            add_subscription(sub, ScopeRef::Process, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
    } else if let Some(def) = el.child("signalEventDefinition") {
        set_type(pcx, id, types::START_EVENT_SIGNAL);
        pcx.graph.activity_mut(id).event_scope = Some(ScopeRef::Process);
        if let Some(mut sub) = signal_subscription(def, &activity_id, doc) {
            sub.start_event = true;
            let name = sub.event_name.clone();
            trigger = EventTrigger::Signal {
                signal_name: name.clone(),
            };
            add_subscription(sub, ScopeRef::Process, def, doc, pcx);
            add_event_subscription_job(def, id, EventType::Signal, name, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
    } else if let Some(def) = el.child("conditionalEventDefinition") {
        set_type(pcx, id, types::START_EVENT_CONDITIONAL);
        if let Some(condition) = parse_conditional(def, &activity_id, true, doc) {
            trigger = EventTrigger::Conditional(condition.clone());
            let sub = conditional_subscription(condition, &activity_id, true);
            add_subscription(sub, ScopeRef::Process, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
    }

    pcx.graph.activity_mut(id).behavior = ActivityBehavior::StartEvent { trigger };
    Ok(())
}

fn parse_scope_start_event(
    el: &XmlElement,
    id: ActivityId,
    scope: Scope<'_>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    let ScopeRef::Activity(sub) = scope.scope else {
        return Ok(());
    };
    let activity_id = pcx.graph.activity(id).id.clone();

    let sub_node = pcx.graph.activity_mut(sub);
    if sub_node.initial.is_none() {
        sub_node.initial = Some(id);
    } else {
        doc.error_with(
            "multiple start events not supported for subprocess",
            scope.element,
            &[activity_id.as_str()],
        );
    }

    if pcx.graph.activity(sub).triggered_by_event {
        parse_event_subprocess_start(el, id, sub, doc, pcx)
    } else {
        reject_subprocess_start_definitions(el, &activity_id, doc);
        pcx.graph.activity_mut(id).behavior = ActivityBehavior::StartEvent {
            trigger: EventTrigger::None,
        };
        Ok(())
    }
}

/// Only a none start event may start an embedded subprocess.
fn reject_subprocess_start_definitions(el: &XmlElement, activity_id: &str, doc: &mut DocumentContext<'_>) {
    const REJECTED: [(&str, &str); 7] = [
        (
            "conditionalEventDefinition",
            "conditionalEventDefinition is not allowed on start event within a subprocess",
        ),
        (
            "timerEventDefinition",
            "timerEventDefinition is not allowed on start event within a subprocess",
        ),
        (
            "escalationEventDefinition",
            "escalationEventDefinition is not allowed on start event within a subprocess",
        ),
        (
            "compensateEventDefinition",
            "compensateEventDefinition is not allowed on start event within a subprocess",
        ),
        (
            "errorEventDefinition",
            "errorEventDefinition only allowed on start event if subprocess is an event subprocess",
        ),
        (
            "messageEventDefinition",
            "messageEventDefinition only allowed on start event if subprocess is an event subprocess",
        ),
        (
            "signalEventDefinition",
            "signalEventDefintion only allowed on start event if subprocess is an event subprocess",
        ),
    ];
    for (tag, message) in REJECTED {
        if let Some(def) = el.child(tag) {
            doc.error_with(message, def, &[activity_id]);
        }
    }
}

fn parse_event_subprocess_start(
    el: &XmlElement,
    id: ActivityId,
    sub: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    let activity_id = pcx.graph.activity(id).id.clone();
    let interrupting = el
        .attr("isInterrupting")
        .map_or(true, |v| v.eq_ignore_ascii_case("true"));

    let sub_node = pcx.graph.activity_mut(sub);
    sub_node.start_behavior = if interrupting {
        ActivityStartBehavior::InterruptEventScope
    } else {
        ActivityStartBehavior::ConcurrentInFlowScope
    };
    let sub_id = sub_node.id.clone();
    let sub_flow_scope = sub_node.flow_scope;
    let event_scope = sub_node.event_scope.unwrap_or(sub_flow_scope);
    pcx.graph.activity_mut(id).event_scope = Some(event_scope);

    let trigger = if let Some(def) = el.child("errorEventDefinition") {
        if !interrupting {
            doc.error_with(
                "error start event of event subprocess must be interrupting",
                el,
                &[activity_id.as_str()],
            );
        }
        set_type(pcx, id, types::START_EVENT_ERROR);
        let definition = catching_error_definition(
            def,
            &sub_id,
            ErrorEventDefinition::EVENT_SUBPROCESS_PRECEDENCE,
            &activity_id,
            doc,
        );
        let error_code = definition.error_code.clone();
        add_error_definition(definition, event_scope, def, &activity_id, doc, pcx);
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Error { error_code }
    } else if let Some(def) = el.child("messageEventDefinition") {
        set_type(pcx, id, types::START_EVENT_MESSAGE);
        let mut message_name = None;
        if let Some(sub_decl) = message_subscription(def, &activity_id, doc) {
            message_name = sub_decl.event_name.clone();
            add_subscription(sub_decl, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Message { message_name }
    } else if let Some(def) = el.child("signalEventDefinition") {
        set_type(pcx, id, types::START_EVENT_SIGNAL);
        let mut signal_name = None;
        if let Some(sub_decl) = signal_subscription(def, &activity_id, doc) {
            signal_name = sub_decl.event_name.clone();
            add_subscription(sub_decl, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Signal { signal_name }
    } else if let Some(def) = el.child("timerEventDefinition") {
        set_type(pcx, id, types::START_EVENT_TIMER);
        let target = TimerTarget {
            handler: job_handlers::TIMER_START_EVENT_SUBPROCESS,
            configuration: Some(sub_id.clone()),
            event_scope,
            interrupting,
            listener_id: None,
        };
        let timer = add_timer(def, id, target, doc, pcx);
        if interrupting {
            warn_time_cycle(def, "interrupting start", &activity_id, doc);
        }
        fire_definition(def, id, doc, pcx)?;
        timer.map_or(EventTrigger::None, EventTrigger::Timer)
    } else if let Some(def) = el.child("compensateEventDefinition") {
        set_type(pcx, id, types::START_EVENT_COMPENSATION);
        pcx.graph.activity_mut(sub).is_for_compensation = true;
        register_compensation_subprocess(el, &activity_id, &sub_id, sub_flow_scope, doc, pcx);
        validate_catch_compensate(def, &activity_id, doc);
        EventTrigger::Compensation
    } else if let Some(def) = el.child("escalationEventDefinition") {
        set_type(pcx, id, types::START_EVENT_ESCALATION);
        let definition =
            catching_escalation_definition(def, &sub_id, interrupting, true, &activity_id, doc);
        let escalation_code = definition.escalation_code.clone();
        add_escalation_definition(definition, event_scope, def, &activity_id, doc, pcx);
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Escalation { escalation_code }
    } else if let Some(def) = el.child("conditionalEventDefinition") {
        set_type(pcx, id, types::START_EVENT_CONDITIONAL);
        let mut trigger = EventTrigger::None;
        if let Some(condition) = parse_conditional(def, &activity_id, interrupting, doc) {
            trigger = EventTrigger::Conditional(condition.clone());
            let sub_decl = conditional_subscription(condition, &activity_id, false);
            add_subscription(sub_decl, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        trigger
    } else {
        doc.error_with(
            "start event of event subprocess must be of type 'error', 'message', 'timer', 'signal', 'compensation' or 'escalation'",
            el,
            &[activity_id.as_str()],
        );
        EventTrigger::None
    };

    pcx.graph.activity_mut(id).behavior = ActivityBehavior::EventSubProcessStartEvent {
        trigger,
        interrupting,
    };
    Ok(())
}

/// A compensation event subprocess is the compensation handler of the
/// embedded subprocess around it; one handler per subprocess.
fn register_compensation_subprocess(
    el: &XmlElement,
    activity_id: &str,
    sub_id: &str,
    sub_flow_scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let ScopeRef::Activity(parent) = sub_flow_scope else {
        doc.error_with(
            "event subprocess with compensation start event is only supported for embedded subprocess \
             (since throwing compensation through a call activity-induced process hierarchy is not supported)",
            el,
            &[activity_id],
        );
        return;
    };
    match compensation_handler_of(pcx, parent) {
        None => pcx.graph.activity_mut(parent).compensation_handler_id = Some(sub_id.to_string()),
        Some(existing) if pcx.graph.activity(existing).is_subprocess_scope => doc.error_with(
            "multiple event subprocesses with compensation start event are not supported on the same scope",
            el,
            &[activity_id],
        ),
        Some(_) => doc.error_with(
            "compensation boundary event and event subprocess with compensation start event are not supported on the same scope",
            el,
            &[activity_id],
        ),
    }
}

// ─── Intermediate catch events ────────────────────────────────

/// Build a catch event. After an event-based gateway the gateway is the
/// event scope and the catch cancels its siblings; otherwise the catch is
/// its own scope.
pub(super) fn build_intermediate_catch<'x>(
    el: &'x XmlElement,
    scope: ScopeRef,
    gateway: Option<ActivityId>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<ActivityId> {
    let id = create_activity(el, scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);
    let activity_id = pcx.graph.activity(id).id.clone();

    let node = pcx.graph.activity_mut(id);
    let event_scope = match gateway {
        Some(gateway) => {
            node.start_behavior = ActivityStartBehavior::CancelEventScope;
            ScopeRef::Activity(gateway)
        }
        None => {
            node.is_scope = true;
            ScopeRef::Activity(id)
        }
    };
    node.event_scope = Some(event_scope);

    let trigger = if let Some(def) = el.child("timerEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_TIMER);
        let target = TimerTarget {
            handler: job_handlers::TIMER_INTERMEDIATE_TRANSITION,
            configuration: None,
            event_scope,
            interrupting: false,
            listener_id: None,
        };
        let timer = add_timer(def, id, target, doc, pcx);
        warn_time_cycle(def, "intermediate catch", &activity_id, doc);
        fire_definition(def, id, doc, pcx)?;
        timer.map_or(EventTrigger::None, EventTrigger::Timer)
    } else if let Some(def) = el.child("signalEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_SIGNAL);
        let mut signal_name = None;
        if let Some(sub) = signal_subscription(def, &activity_id, doc) {
            signal_name = sub.event_name.clone();
            add_subscription(sub, event_scope, def, doc, pcx);
            add_event_subscription_job(def, id, EventType::Signal, signal_name.clone(), doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Signal { signal_name }
    } else if let Some(def) = el.child("messageEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_MESSAGE);
        let mut message_name = None;
        if let Some(sub) = message_subscription(def, &activity_id, doc) {
            message_name = sub.event_name.clone();
            add_subscription(sub, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Message { message_name }
    } else if let Some(def) = el.child("linkEventDefinition") {
        if gateway.is_some() {
            doc.error("IntermediateCatchLinkEvent is not allowed after an EventBasedGateway.", el);
        }
        set_type(pcx, id, types::INTERMEDIATE_EVENT_LINK);
        let link_name = def.attr("name").unwrap_or_default().to_string();
        register_link_target(el, &link_name, &activity_id, doc, pcx);
        EventTrigger::Link { link_name }
    } else if let Some(def) = el.child("conditionalEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_CONDITIONAL);
        let mut trigger = EventTrigger::None;
        if let Some(condition) = parse_conditional(def, &activity_id, false, doc) {
            trigger = EventTrigger::Conditional(condition.clone());
            let sub = conditional_subscription(condition, &activity_id, false);
            add_subscription(sub, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        trigger
    } else {
        doc.error("Unsupported intermediate catch event type", el);
        EventTrigger::None
    };

    pcx.graph.activity_mut(id).behavior = ActivityBehavior::IntermediateCatchEvent { trigger };
    finish_activity(el, id, doc, pcx)?;
    Ok(id)
}

fn register_link_target(
    el: &XmlElement,
    link_name: &str,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    if pcx.link_targets.contains_key(link_name) {
        doc.error(
            format!("Multiple Intermediate Catch Events with the same link event name ('{link_name}') are not allowed."),
            el,
        );
        return;
    }
    let element_name = el.attr("name").unwrap_or_default();
    if element_name != link_name {
        doc.warning(
            format!(
                "Link Event named '{element_name}' contains link event definition with name '{link_name}' \
                 - it is recommended to use the same name for both."
            ),
            el,
        );
    }
    pcx.link_targets
        .insert(link_name.to_string(), activity_id.to_string());
}

// ─── Throwing events ──────────────────────────────────────────

/// A throwing link event builds no node; its name is kept so sequence flows
/// into it can be redirected to the matching catch.
pub(super) fn build_intermediate_throw<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    if let Some(link) = el.child("linkEventDefinition") {
        pcx.link_sources.insert(
            el.id().unwrap_or_default().to_string(),
            link.attr("name").unwrap_or_default().to_string(),
        );
        return Ok(None);
    }

    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);
    let activity_id = pcx.graph.activity(id).id.clone();
    let message_el = el.child("messageEventDefinition");
    let service_like = message_el.filter(|m| is_service_task_like(m));

    let throws = if let Some(def) = el.child("signalEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_SIGNAL_THROW);
        throwing_signal(def, &activity_id, doc)
    } else if let Some(def) = el.child("compensateEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_COMPENSATION_THROW);
        pcx.graph.activity_mut(id).is_scope = true;
        throwing_compensation(def, scope.scope, &activity_id, doc, pcx)
    } else if message_el.is_some() {
        match service_like {
            Some(def) => {
                set_type(pcx, id, types::INTERMEDIATE_EVENT_MESSAGE_THROW);
                let implementation = parse_service_implementation(
                    types::INTERMEDIATE_EVENT_MESSAGE_THROW,
                    def,
                    el,
                    id,
                    doc,
                    pcx,
                );
                EventThrow::Message { implementation }
            }
            None => {
                set_type(pcx, id, types::INTERMEDIATE_EVENT_NONE_THROW);
                EventThrow::None
            }
        }
    } else if let Some(def) = el.child("escalationEventDefinition") {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_ESCALATION_THROW);
        EventThrow::Escalation {
            escalation_code: throwing_escalation_code(
                def,
                &activity_id,
                "throwing escalation event must have an 'escalationCode'",
                doc,
            ),
        }
    } else {
        set_type(pcx, id, types::INTERMEDIATE_EVENT_NONE_THROW);
        EventThrow::None
    };

    pcx.graph.activity_mut(id).behavior = ActivityBehavior::IntermediateThrowEvent { throws };
    finish_activity(el, id, doc, pcx)?;
    if let Some(def) = service_like {
        validate_service_task_like(types::INTERMEDIATE_EVENT_MESSAGE_THROW, def, id, doc, pcx);
    }
    Ok(Some(id))
}

fn throwing_signal(def: &XmlElement, activity_id: &str, doc: &mut DocumentContext<'_>) -> EventThrow {
    match signal_subscription(def, activity_id, doc) {
        Some(sub) => EventThrow::Signal {
            signal_name: sub.event_name,
            is_async: sub.is_async,
        },
        None => EventThrow::Signal {
            signal_name: None,
            is_async: def.engine_attr("async") == Some("true"),
        },
    }
}

/// `escalationRef` must name a known escalation that carries a code.
fn throwing_escalation_code(
    def: &XmlElement,
    activity_id: &str,
    missing_code: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<String> {
    let Some(escalation_ref) = def.attr("escalationRef") else {
        doc.error_with(
            "escalationEventDefinition does not have required attribute 'escalationRef'",
            def,
            &[activity_id],
        );
        return None;
    };
    let code = doc
        .definitions
        .escalation(escalation_ref)
        .map(|e| e.escalation_code.clone());
    match code {
        None => {
            doc.error_with(
                format!("could not find escalation with id '{escalation_ref}'"),
                def,
                &[activity_id],
            );
            None
        }
        Some(None) => {
            doc.error_with(missing_code, def, &[activity_id]);
            None
        }
        Some(code) => code,
    }
}

/// An `activityRef` not yet visible is checked once the enclosing scope (or,
/// inside an event subprocess, its parent scope) is complete.
fn throwing_compensation<'x>(
    def: &'x XmlElement,
    scope: ScopeRef,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> EventThrow {
    let activity_ref = def.attr("activityRef");
    let wait_for_completion = def.attr("waitForCompletion").map_or(true, |v| v == "true");

    if let Some(activity_ref) = activity_ref {
        if pcx.graph.find_at_subprocess_level(scope, activity_ref).is_none() {
            let mut check_scope = scope;
            if let ScopeRef::Activity(a) = scope {
                let node = pcx.graph.activity(a);
                if node.triggered_by_event && node.activity_type == "subProcess" {
                    check_scope = node.flow_scope;
                }
            }
            if pcx.graph.find_at_subprocess_level(check_scope, activity_ref).is_none() {
                pcx.pending_activity_refs.push(PendingActivityRef {
                    element: def,
                    throwing_activity: activity_id.to_string(),
                    activity_ref: activity_ref.to_string(),
                    scope: check_scope,
                });
            }
        }
    }

    if !wait_for_completion {
        doc.warning_with(
            "Unsupported attribute value for 'waitForCompletion': 'waitForCompletion=false' is not supported. \
             Compensation event will wait for compensation to join.",
            def,
            &[activity_id],
        );
    }
    EventThrow::Compensation {
        activity_ref: activity_ref.map(str::to_string),
        wait_for_completion,
    }
}

// ─── End events ───────────────────────────────────────────────

pub(super) fn parse_end_events<'x>(
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    for el in scope.element.children_named("endEvent") {
        let id = create_activity(el, scope.scope, doc, pcx);
        let activity_id = pcx.graph.activity(id).id.clone();
        let mut service_like = None;

        let throws = if let Some(def) = el.child("errorEventDefinition") {
            throwing_error(def, id, &activity_id, doc, pcx)
        } else if let Some(def) = el.child("cancelEventDefinition") {
            let in_transaction = match scope.scope {
                ScopeRef::Activity(a) => pcx.graph.activity(a).activity_type == "transaction",
                ScopeRef::Process => false,
            };
            if in_transaction {
                set_type(pcx, id, types::END_EVENT_CANCEL);
                let node = pcx.graph.activity_mut(id);
                node.start_behavior = ActivityStartBehavior::InterruptFlowScope;
                node.is_scope = true;
                EventThrow::Cancel { boundary_event_id: None }
            } else {
                doc.error_with(
                    "end event with cancelEventDefinition only supported inside transaction subprocess",
                    def,
                    &[activity_id.as_str()],
                );
                EventThrow::None
            }
        } else if el.child("terminateEventDefinition").is_some() {
            set_type(pcx, id, types::END_EVENT_TERMINATE);
            pcx.graph.activity_mut(id).start_behavior = ActivityStartBehavior::InterruptFlowScope;
            EventThrow::Terminate
        } else if let Some(def) = el.child("messageEventDefinition") {
            if is_service_task_like(def) {
                service_like = Some(def);
                set_type(pcx, id, types::END_EVENT_MESSAGE);
                let implementation =
                    parse_service_implementation(types::END_EVENT_MESSAGE, def, el, id, doc, pcx);
                EventThrow::Message { implementation }
            } else {
                EventThrow::None
            }
        } else if let Some(def) = el.child("signalEventDefinition") {
            set_type(pcx, id, types::END_EVENT_SIGNAL);
            throwing_signal(def, &activity_id, doc)
        } else if let Some(def) = el.child("compensateEventDefinition") {
            set_type(pcx, id, types::END_EVENT_COMPENSATION);
            pcx.graph.activity_mut(id).is_scope = true;
            throwing_compensation(def, scope.scope, &activity_id, doc, pcx)
        } else if let Some(def) = el.child("escalationEventDefinition") {
            set_type(pcx, id, types::END_EVENT_ESCALATION);
            EventThrow::Escalation {
                escalation_code: throwing_escalation_code(
                    def,
                    &activity_id,
                    "escalation end event must have an 'escalationCode'",
                    doc,
                ),
            }
        } else {
            set_type(pcx, id, types::END_EVENT_NONE);
            EventThrow::None
        };

        pcx.graph.activity_mut(id).behavior = ActivityBehavior::EndEvent { throws };
        parse_activity_io(el, id, doc, pcx);
        parse_async_for_activity(el, id, doc, pcx);
        finish_activity(el, id, doc, pcx)?;
        if let Some(def) = service_like {
            validate_service_task_like(types::END_EVENT_MESSAGE, def, id, doc, pcx);
        }
    }
    Ok(())
}

/// `errorRef` is mandatory and the referenced error must carry a code. An
/// unknown reference is thrown as its own code.
fn throwing_error(
    def: &XmlElement,
    id: ActivityId,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> EventThrow {
    let Some(error_ref) = def.non_empty_attr("errorRef") else {
        doc.error_with("'errorRef' attribute is mandatory on error end event", def, &[activity_id]);
        return EventThrow::Error {
            error_code: None,
            error_message: None,
        };
    };
    set_type(pcx, id, types::END_EVENT_ERROR);
    match doc.definitions.error(error_ref).cloned() {
        Some(error) => {
            if error.error_code.as_deref().map_or(true, str::is_empty) {
                doc.error_with(
                    format!(
                        "'errorCode' is mandatory on errors referenced by throwing error event definitions, \
                         but the error '{}' does not define one.",
                        error.id
                    ),
                    def,
                    &[activity_id],
                );
            }
            EventThrow::Error {
                error_code: error.error_code,
                error_message: error.error_message,
            }
        }
        None => EventThrow::Error {
            error_code: unresolved_error_ref(def, error_ref, activity_id, doc),
            error_message: None,
        },
    }
}

// ─── Boundary events ──────────────────────────────────────────

pub(super) fn parse_boundary_events<'x>(
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    for el in scope.element.children_named("boundaryEvent") {
        let attached_ref = el.attr("attachedToRef").unwrap_or_default();
        if attached_ref.is_empty() {
            doc.error("AttachedToRef is required when using a timerEventDefinition", el);
        }

        let id = create_activity(el, scope.scope, doc, pcx);
        parse_async(el, id, doc, pcx);
        let activity_id = pcx.graph.activity(id).id.clone();
        let cancel_activity = el
            .attr("cancelActivity")
            .map_or(true, |v| v.eq_ignore_ascii_case("true"));

        let trigger = match pcx.graph.find_at_subprocess_level(scope.scope, attached_ref) {
            Some(host) => parse_boundary_definition(el, id, &activity_id, host, cancel_activity, doc, pcx)?,
            None => {
                doc.error(
                    "Invalid reference in boundary event. Make sure that the referenced activity is defined in the same scope as the boundary event",
                    el,
                );
                EventTrigger::None
            }
        };

        ensure_no_io_mapping(el, doc);
        pcx.graph.activity_mut(id).behavior = ActivityBehavior::BoundaryEvent {
            trigger,
            cancel_activity,
        };
        finish_activity(el, id, doc, pcx)?;
    }
    Ok(())
}

/// Event scope and trigger of a boundary event attached to `host`.
fn parse_boundary_definition(
    el: &XmlElement,
    id: ActivityId,
    activity_id: &str,
    host: ActivityId,
    cancel_activity: bool,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult<EventTrigger> {
    let compensation = el.child("compensateEventDefinition");
    let event_scope = match compensation {
        Some(_) => ScopeRef::Activity(host),
        None => {
            let body = pcx
                .graph
                .activity(host)
                .is_multi_instance
                .then(|| pcx.graph.multi_instance_body_of(host))
                .flatten();
            match body {
                Some(body) => ScopeRef::Activity(body),
                None => {
                    pcx.graph.activity_mut(host).is_scope = true;
                    ScopeRef::Activity(host)
                }
            }
        }
    };
    let node = pcx.graph.activity_mut(id);
    node.event_scope = Some(event_scope);
    node.start_behavior = if cancel_activity {
        ActivityStartBehavior::CancelEventScope
    } else {
        ActivityStartBehavior::ConcurrentInFlowScope
    };

    let trigger = if let Some(def) = el.child("timerEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_TIMER);
        let target = TimerTarget {
            handler: job_handlers::TIMER_TRANSITION,
            configuration: None,
            event_scope,
            interrupting: cancel_activity,
            listener_id: None,
        };
        let timer = add_timer(def, id, target, doc, pcx);
        if cancel_activity {
            warn_time_cycle(def, "cancelling boundary", activity_id, doc);
        }
        fire_definition(def, id, doc, pcx)?;
        timer.map_or(EventTrigger::None, EventTrigger::Timer)
    } else if let Some(def) = el.child("errorEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_ERROR);
        let definition = catching_error_definition(
            def,
            activity_id,
            ErrorEventDefinition::BOUNDARY_PRECEDENCE,
            activity_id,
            doc,
        );
        let error_code = definition.error_code.clone();
        add_error_definition(definition, event_scope, def, activity_id, doc, pcx);
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Error { error_code }
    } else if let Some(def) = el.child("signalEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_SIGNAL);
        let mut signal_name = None;
        if let Some(sub) = signal_subscription(def, activity_id, doc) {
            signal_name = sub.event_name.clone();
            add_subscription(sub, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Signal { signal_name }
    } else if let Some(def) = el.child("cancelEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_CANCEL);
        wire_cancel_boundary(def, id, activity_id, event_scope, doc, pcx);
        EventTrigger::Cancel
    } else if let Some(def) = compensation {
        set_type(pcx, id, types::BOUNDARY_COMPENSATION);
        let flow_scope = pcx.graph.activity(id).flow_scope;
        let duplicate = pcx.graph.children_of(flow_scope).iter().any(|sibling| {
            let node = pcx.graph.activity(*sibling);
            *sibling != id && node.activity_type == types::BOUNDARY_COMPENSATION && node.event_scope == Some(event_scope)
        });
        if duplicate {
            doc.error_with(
                "multiple boundary events with compensateEventDefinition not supported on same activity",
                def,
                &[activity_id],
            );
        }
        validate_catch_compensate(def, activity_id, doc);
        EventTrigger::Compensation
    } else if let Some(def) = el.child("messageEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_MESSAGE);
        let mut message_name = None;
        if let Some(sub) = message_subscription(def, activity_id, doc) {
            message_name = sub.event_name.clone();
            add_subscription(sub, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        EventTrigger::Message { message_name }
    } else if let Some(def) = el.child("escalationEventDefinition") {
        let host_node = pcx.graph.activity(host);
        let escalating_host = host_node.is_subprocess_scope
            || matches!(
                host_node.behavior,
                ActivityBehavior::CallActivity(_) | ActivityBehavior::UserTask { .. }
            );
        if escalating_host {
            set_type(pcx, id, types::BOUNDARY_ESCALATION);
            let definition =
                catching_escalation_definition(def, activity_id, cancel_activity, false, activity_id, doc);
            let escalation_code = definition.escalation_code.clone();
            add_escalation_definition(definition, event_scope, def, activity_id, doc, pcx);
            fire_definition(def, id, doc, pcx)?;
            EventTrigger::Escalation { escalation_code }
        } else {
            doc.error(
                "An escalation boundary event should only be attached to a subprocess, a call activity or an user task",
                el,
            );
            EventTrigger::None
        }
    } else if let Some(def) = el.child("conditionalEventDefinition") {
        set_type(pcx, id, types::BOUNDARY_CONDITIONAL);
        let mut trigger = EventTrigger::None;
        if let Some(condition) = parse_conditional(def, activity_id, cancel_activity, doc) {
            trigger = EventTrigger::Conditional(condition.clone());
            let sub = conditional_subscription(condition, activity_id, false);
            add_subscription(sub, event_scope, def, doc, pcx);
        }
        fire_definition(def, id, doc, pcx)?;
        trigger
    } else {
        doc.error("Unsupported boundary event type", el);
        EventTrigger::None
    };
    Ok(trigger)
}

/// One cancel boundary per transaction; every cancel end event directly
/// inside the transaction is pointed at it.
fn wire_cancel_boundary(
    def: &XmlElement,
    id: ActivityId,
    activity_id: &str,
    event_scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let transaction = match event_scope {
        ScopeRef::Activity(a) if pcx.graph.activity(a).behavior.is_multi_instance_body() => {
            pcx.graph.activity(a).children.first().copied()
        }
        ScopeRef::Activity(a) => Some(a),
        ScopeRef::Process => None,
    };
    let Some(transaction) = transaction.filter(|t| pcx.graph.activity(*t).behavior.is_transaction()) else {
        doc.error_with(
            "boundary event with cancelEventDefinition only supported on transaction subprocesses",
            def,
            &[activity_id],
        );
        return;
    };

    let flow_scope = pcx.graph.activity(id).flow_scope;
    let duplicate = pcx.graph.children_of(flow_scope).iter().any(|sibling| {
        let node = pcx.graph.activity(*sibling);
        *sibling != id && node.activity_type == types::BOUNDARY_CANCEL && node.event_scope == Some(event_scope)
    });
    if duplicate {
        doc.error_with(
            "multiple boundary events with cancelEventDefinition not supported on same transaction subprocess",
            def,
            &[activity_id],
        );
    }

    for child in pcx.graph.children_of(ScopeRef::Activity(transaction)).to_vec() {
        if let ActivityBehavior::EndEvent {
            throws: EventThrow::Cancel { boundary_event_id },
        } = &mut pcx.graph.activity_mut(child).behavior
        {
            *boundary_event_id = Some(activity_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process, semantic_errors};
    use crate::model::{ActivityBehavior, ActivityStartBehavior, EventThrow, EventTrigger, ScopeRef};

    fn transaction(boundaries: &str) -> String {
        process(&format!(
            r#"<startEvent id="s"/>
            <transaction id="tx">
              <startEvent id="txs"/>
              <endEvent id="abort"><cancelEventDefinition/></endEvent>
              <sequenceFlow id="tf" sourceRef="txs" targetRef="abort"/>
            </transaction>
            {boundaries}"#
        ))
    }

    /// The cancel boundary is wired into the transaction's cancel end events.
    #[test]
    fn t_events_1_cancel_boundary_wires_end_events() {
        let output = compile(&transaction(
            r#"<boundaryEvent id="cancelled" attachedToRef="tx"><cancelEventDefinition/></boundaryEvent>"#,
        ));
        let g = graph(&output);
        let abort = node(g, "abort");
        assert_eq!(
            abort.behavior,
            ActivityBehavior::EndEvent {
                throws: EventThrow::Cancel {
                    boundary_event_id: Some("cancelled".into())
                }
            }
        );
        assert_eq!(abort.start_behavior, ActivityStartBehavior::InterruptFlowScope);

        let boundary = node(g, "cancelled");
        assert_eq!(boundary.event_scope, g.find_activity("tx").map(ScopeRef::Activity));
        assert_eq!(
            boundary.behavior,
            ActivityBehavior::BoundaryEvent {
                trigger: EventTrigger::Cancel,
                cancel_activity: true,
            }
        );
    }

    /// A transaction takes a single cancel boundary.
    #[test]
    fn t_events_2_second_cancel_boundary() {
        let report = semantic_errors(&transaction(
            r#"<boundaryEvent id="c1" attachedToRef="tx"><cancelEventDefinition/></boundaryEvent>
               <boundaryEvent id="c2" attachedToRef="tx"><cancelEventDefinition/></boundaryEvent>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["multiple boundary events with cancelEventDefinition not supported on same transaction subprocess"]
        );
        assert!(report.errors[0].mentions("c2"));
    }

    /// Cancel boundaries attach to transactions only.
    #[test]
    fn t_events_3_cancel_boundary_outside_transaction() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <userTask id="work"/>
            <boundaryEvent id="cancelled" attachedToRef="work"><cancelEventDefinition/></boundaryEvent>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["boundary event with cancelEventDefinition only supported on transaction subprocesses"]
        );
    }

    /// Cancel end events live inside a transaction.
    #[test]
    fn t_events_4_cancel_end_event_outside_transaction() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <endEvent id="abort"><cancelEventDefinition/></endEvent>
            <sequenceFlow id="f1" sourceRef="s" targetRef="abort"/>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["end event with cancelEventDefinition only supported inside transaction subprocess"]
        );
        assert!(report.errors[0].mentions("abort"));
    }

    /// An error end event with an unknown errorRef throws the reference as code.
    #[test]
    fn t_events_5_error_end_event_unknown_ref() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <endEvent id="fail"><errorEventDefinition errorRef="E_UNKNOWN"/></endEvent>
            <sequenceFlow id="f1" sourceRef="s" targetRef="fail"/>"#,
        ));
        assert_eq!(
            node(graph(&output), "fail").behavior,
            ActivityBehavior::EndEvent {
                throws: EventThrow::Error {
                    error_code: Some("E_UNKNOWN".into()),
                    error_message: None,
                }
            }
        );
        assert_eq!(
            messages(&output.warnings),
            vec!["Could not find error with id 'E_UNKNOWN', the reference is used as error code"]
        );
        assert!(output.warnings[0].mentions("fail"));
    }

    /// A cancelling timer boundary with a cycle is accepted with a warning.
    #[test]
    fn t_events_6_cancelling_cycle_timer_warns() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <userTask id="work"/>
            <boundaryEvent id="every" attachedToRef="work">
              <timerEventDefinition><timeCycle>R3/PT1H</timeCycle></timerEventDefinition>
            </boundaryEvent>"#,
        ));
        assert_eq!(
            messages(&output.warnings),
            vec!["It is not recommended to use a cancelling boundary timer event with a time cycle."]
        );
        assert!(output.warnings[0].mentions("every"));
    }
}
