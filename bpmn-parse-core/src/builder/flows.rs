//! Sequence flows, their conditions, and the associations that wire
//! compensation boundary events to their handlers.

use super::listeners::parse_execution_listeners_on_transition;
use super::scope::parse_activity;
use super::subscriptions::compensation_handler_of;
use super::parse_documentation;
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::hooks::HookEvent;
use crate::model::activity_types::BOUNDARY_COMPENSATION;
use crate::model::{ActivityBehavior, ActivityId, Condition, ScopeRef, ScriptBody, ScriptSource, TransitionNode};
use crate::xml::{XmlElement, BPMN_NS, XSI_NS};

// ─── Sequence flows ───────────────────────────────────────────

fn is_handler(handlers: &[&XmlElement], id: &str) -> bool {
    handlers.iter().any(|h| h.id() == Some(id))
}

/// Resolve both ends at the scope's subprocess level and create the
/// transition. A flow into a throwing link event is redirected to the catch
/// with the same link name. Flows touching a multi-instance activity attach to
/// its body.
pub(super) fn parse_sequence_flows<'x>(
    scope: Scope<'x>,
    compensation_handlers: &[&'x XmlElement],
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    for flow_el in scope.element.children_named("sequenceFlow") {
        let id = flow_el.id();
        let flow_id = id.unwrap_or_default();
        let source_ref = flow_el.attr("sourceRef").unwrap_or_default();
        let mut destination_ref = flow_el.attr("targetRef").unwrap_or_default().to_string();

        if let Some(link_name) = pcx.link_sources.get(&destination_ref) {
            match pcx.link_targets.get(link_name) {
                Some(target) => destination_ref = target.clone(),
                None => {
                    doc.error(
                        format!(
                            "sequence flow points to link event source with name '{link_name}' but no event target \
                             with that name exists. Most probably your link events are not configured correctly."
                        ),
                        flow_el,
                    );
                    continue;
                }
            }
        }

        let source = pcx.graph.find_at_subprocess_level(scope.scope, source_ref);
        let destination = pcx.graph.find_at_subprocess_level(scope.scope, &destination_ref);
        let is_compensation = |found: Option<ActivityId>, reference: &str| match found {
            Some(a) => pcx.graph.activity(a).is_for_compensation,
            None => is_handler(compensation_handlers, reference),
        };

        if is_compensation(source, source_ref) {
            doc.error_with(
                format!(
                    "Invalid outgoing sequence flow of compensation activity '{source_ref}'. \
                     A compensation activity should not have an incoming or outgoing sequence flow."
                ),
                flow_el,
                &[source_ref, flow_id],
            );
            continue;
        }
        if is_compensation(destination, &destination_ref) {
            doc.error_with(
                format!(
                    "Invalid incoming sequence flow of compensation activity '{destination_ref}'. \
                     A compensation activity should not have an incoming or outgoing sequence flow."
                ),
                flow_el,
                &[destination_ref.as_str(), flow_id],
            );
            continue;
        }
        let Some(source) = source else {
            doc.error(format!("Invalid source '{source_ref}' of sequence flow '{flow_id}'"), flow_el);
            continue;
        };
        let Some(destination) = destination else {
            doc.error(
                format!("Invalid destination '{destination_ref}' of sequence flow '{flow_id}'"),
                flow_el,
            );
            continue;
        };

        let source_node = pcx.graph.activity(source);
        let destination_node = pcx.graph.activity(destination);
        if source_node.behavior.is_event_based_gateway() {
            // the gateway built its catches already
            continue;
        }
        let after_gateway = matches!(destination_node.behavior, ActivityBehavior::IntermediateCatchEvent { .. })
            && matches!(
                destination_node.event_scope,
                Some(ScopeRef::Activity(g)) if pcx.graph.activity(g).behavior.is_event_based_gateway()
            );
        if after_gateway {
            doc.error(
                format!(
                    "Invalid incoming sequenceflow for intermediateCatchEvent with id '{}' connected to an event-based gateway.",
                    destination_node.id
                ),
                flow_el,
            );
            continue;
        }
        if matches!(source_node.behavior, ActivityBehavior::EventSubProcess) {
            doc.error("Invalid outgoing sequence flow of event subprocess", flow_el);
            continue;
        }
        if matches!(destination_node.behavior, ActivityBehavior::EventSubProcess) {
            doc.error("Invalid incoming sequence flow of event subprocess", flow_el);
            continue;
        }

        let source = multi_instance_scope(pcx, source);
        let destination = multi_instance_scope(pcx, destination);
        let transition = TransitionNode {
            id: id.map(str::to_string),
            source,
            destination,
            name: flow_el.attr("name").map(str::to_string),
            documentation: parse_documentation(flow_el),
            condition: flow_el
                .child("conditionExpression")
                .and_then(|c| parse_condition(c, flow_id, doc)),
            listeners: parse_execution_listeners_on_transition(flow_el, doc),
            waypoints: Vec::new(),
        };
        let transition = pcx.graph.add_transition(transition);
        if let Some(id) = id {
            pcx.sequence_flows.insert(id.to_string(), transition);
        }
        doc.fire(HookEvent::SequenceFlow {
            element: flow_el,
            graph: &mut pcx.graph,
            transition,
        })?;
    }
    Ok(())
}

fn multi_instance_scope(pcx: &ProcessContext<'_>, activity: ActivityId) -> ActivityId {
    if !pcx.graph.activity(activity).is_multi_instance {
        return activity;
    }
    pcx.graph.multi_instance_body_of(activity).unwrap_or(activity)
}

/// Only `tFormalExpression` is accepted. A `language` makes the condition a
/// script, inline or from `camunda:resource`.
pub(super) fn parse_condition(
    condition_el: &XmlElement,
    ancestor_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<Condition> {
    if let Some(xsi_type) = condition_el.attr_ns(XSI_NS, "type") {
        let resolved = if xsi_type.contains(':') {
            doc.definitions.resolve_name(xsi_type)
        } else {
            format!("{BPMN_NS}:{xsi_type}")
        };
        if resolved != format!("{BPMN_NS}:tFormalExpression") {
            doc.error_with(
                "Invalid type, only tFormalExpression is currently supported",
                condition_el,
                &[ancestor_id],
            );
        }
    }

    let text = condition_el.text();
    let condition = match condition_el.attr("language") {
        None => Condition::Expression(text.to_string()),
        Some(language) => {
            let body = match condition_el.engine_attr("resource") {
                Some(resource) => ScriptBody::Resource(resource.to_string()),
                None => ScriptBody::Inline(text.to_string()),
            };
            Condition::Script(ScriptSource {
                language: language.to_string(),
                body,
            })
        }
    };
    Some(condition)
}

// ─── Associations ─────────────────────────────────────────────

/// Associations from a compensation boundary event name its handler. A
/// handler not built yet is built here, inside the host's multi-instance body
/// when the host is multi-instance, and removed from `compensation_handlers`.
pub(super) fn parse_associations<'x>(
    scope: Scope<'x>,
    compensation_handlers: &mut Vec<&'x XmlElement>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    for assoc_el in scope.element.children_named("association") {
        let source_ref = assoc_el.attr("sourceRef");
        if source_ref.is_none() {
            doc.error("association element missing attribute 'sourceRef'", assoc_el);
        }
        let target_ref = assoc_el.attr("targetRef");
        if target_ref.is_none() {
            doc.error("association element missing attribute 'targetRef'", assoc_el);
        }
        let (Some(source_ref), Some(target_ref)) = (source_ref, target_ref) else {
            continue;
        };

        let source = pcx.graph.find_in_scope(scope.scope, source_ref);
        let mut target = pcx.graph.find_in_scope(scope.scope, target_ref);

        if source.is_none() && !doc.definitions.contains_element(source_ref) {
            doc.error(
                format!("Invalid reference sourceRef '{source_ref}' of association element "),
                assoc_el,
            );
            continue;
        }
        if target.is_none() && !doc.definitions.contains_element(target_ref) {
            doc.error(
                format!("Invalid reference targetRef '{target_ref}' of association element "),
                assoc_el,
            );
            continue;
        }

        let Some(source) = source.filter(|s| pcx.graph.activity(*s).activity_type == BOUNDARY_COMPENSATION)
        else {
            continue;
        };
        if target.is_none() {
            if let Some(position) = compensation_handlers.iter().position(|h| h.id() == Some(target_ref)) {
                let handler_el = compensation_handlers.remove(position);
                target = build_compensation_handler(handler_el, scope, source, doc, pcx)?;
            }
        }
        if let Some(target) = target {
            wire_compensation_handler(assoc_el, source, target, doc, pcx);
        }
    }
    Ok(())
}

fn build_compensation_handler<'x>(
    handler_el: &'x XmlElement,
    scope: Scope<'x>,
    boundary: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let host = match pcx.graph.activity(boundary).event_scope {
        Some(ScopeRef::Activity(host)) => Some(host),
        _ => None,
    };
    let handler_scope = host
        .filter(|h| pcx.graph.activity(*h).is_multi_instance)
        .map(|h| pcx.graph.activity(h).flow_scope)
        .unwrap_or(scope.scope);
    parse_activity(handler_el, Scope::new(scope.element, handler_scope), doc, pcx)
}

fn wire_compensation_handler(
    assoc_el: &XmlElement,
    boundary: ActivityId,
    handler: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let boundary_id = pcx.graph.activity(boundary).id.clone();
    let handler_node = pcx.graph.activity(handler);
    if !handler_node.is_for_compensation {
        let handler_id = handler_node.id.clone();
        doc.error_with(
            "compensation boundary catch must be connected to element with isForCompensation=true",
            assoc_el,
            &[boundary_id.as_str(), handler_id.as_str()],
        );
        return;
    }
    let handler_id = handler_node.id.clone();

    let Some(ScopeRef::Activity(host)) = pcx.graph.activity(boundary).event_scope else {
        return;
    };
    let existing = compensation_handler_of(pcx, host);
    if existing.is_some_and(|e| pcx.graph.activity(e).is_subprocess_scope) {
        let host_id = pcx.graph.activity(host).id.clone();
        doc.error_with(
            "compensation boundary event and event subprocess with compensation start event are not supported on the same scope",
            assoc_el,
            &[host_id.as_str(), boundary_id.as_str()],
        );
        return;
    }
    pcx.graph.activity_mut(host).compensation_handler_id = Some(handler_id);
}
