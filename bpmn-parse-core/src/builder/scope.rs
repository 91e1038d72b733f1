//! Scope pass driver. Pass order matters: flows need every node (boundary
//! events included) to exist, and association wiring must run before leftover
//! compensation handlers are built in place.

use super::jobs::parse_async_for_activity;
use super::multi_instance::parse_multi_instance_body;
use super::{
    create_activity, dispatch, events, finish_activity, flows, io, is_compensation_handler,
    listeners, parse_boolean, parse_start_authorization,
};
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::model::{ActivityBehavior, ActivityId, ScopeRef};
use crate::xml::XmlElement;

/// Build the contents of a process or subprocess element into `scope`.
pub(super) fn parse_scope<'x>(
    el: &'x XmlElement,
    scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult {
    let scope_ctx = Scope::new(el, scope);
    tracing::trace!(scope = pcx.graph.scope_name(scope), "parsing scope");

    let mut intermediate_catches = Vec::new();
    let mut compensation_handlers = Vec::new();
    let mut activities = Vec::new();
    for child in &el.children {
        if child.is_bpmn("intermediateCatchEvent") {
            intermediate_catches.push(child);
        } else if is_compensation_handler(child) && child.id().is_some() {
            compensation_handlers.push(child);
        } else {
            activities.push(child);
        }
    }

    events::parse_start_events(scope_ctx, doc, pcx)?;

    for child in activities {
        parse_activity(child, scope_ctx, doc, pcx)?;
    }

    for catch_el in intermediate_catches {
        let built = catch_el
            .id()
            .and_then(|id| pcx.graph.find_in_scope(scope, id))
            .is_some();
        if !built {
            let catch = events::build_intermediate_catch(catch_el, scope, None, doc, pcx)?;
            io::parse_activity_io(catch_el, catch, doc, pcx);
        }
    }

    events::parse_end_events(scope_ctx, doc, pcx)?;
    events::parse_boundary_events(scope_ctx, doc, pcx)?;
    flows::parse_sequence_flows(scope_ctx, &compensation_handlers, doc, pcx)?;

    // a subprocess gets its own listeners when its node is finished
    if scope_ctx.is_process() {
        let scope_listeners = listeners::parse_execution_listeners_on_scope(el, doc);
        pcx.graph.listeners.extend(scope_listeners);
    }

    flows::parse_associations(scope_ctx, &mut compensation_handlers, doc, pcx)?;
    for handler in compensation_handlers {
        parse_activity(handler, scope_ctx, doc, pcx)?;
    }

    check_pending_activity_refs(scope, doc, pcx);

    if scope_ctx.is_process() {
        parse_start_authorization(el, &mut pcx.graph);
    }
    Ok(())
}

/// Build one activity element, lowering it into a multi-instance body when it
/// carries loop characteristics. Unknown elements are skipped.
pub(super) fn parse_activity<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let tag = el.name.as_str();
    if dispatch::UNSUPPORTED.contains(&tag) {
        doc.warning("Ignoring unsupported activity type", el);
        return Ok(None);
    }
    let Some(builder) = dispatch::builder_for(tag) else {
        return Ok(None);
    };

    let loop_el = el.child("multiInstanceLoopCharacteristics");
    let inner_scope = match loop_el {
        Some(loop_el) => {
            let body = parse_multi_instance_body(el, loop_el, scope.scope, doc, pcx)?;
            Scope::new(scope.element, ScopeRef::Activity(body))
        }
        None => scope,
    };

    let Some(activity) = builder(el, inner_scope, doc, pcx)? else {
        return Ok(None);
    };
    if loop_el.is_some() {
        pcx.graph.activity_mut(activity).is_multi_instance = true;
    }
    io::parse_activity_io(el, activity, doc, pcx);
    Ok(Some(activity))
}

/// `activityRef` of a compensation throw must name an activity of the scope
/// it was checked against, once that scope is complete.
fn check_pending_activity_refs(
    scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut pcx.pending_activity_refs)
        .into_iter()
        .partition(|pending| pending.scope == scope);
    pcx.pending_activity_refs = rest;

    for pending in due {
        if pcx
            .graph
            .find_at_subprocess_level(scope, &pending.activity_ref)
            .is_some()
        {
            continue;
        }
        doc.error_with(
            format!(
                "Invalid attribute value for 'activityRef': no activity with id '{}' in scope '{}'",
                pending.activity_ref,
                pcx.graph.scope_name(scope)
            ),
            pending.element,
            &[pending.throwing_activity.as_str()],
        );
    }
}

// ─── Subprocesses ─────────────────────────────────────────────

pub(super) fn build_sub_process<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);

    let triggered_by_event = el
        .attr("triggeredByEvent")
        .and_then(parse_boolean)
        .unwrap_or(false);
    let node = pcx.graph.activity_mut(id);
    node.is_scope = true;
    node.is_subprocess_scope = true;
    node.triggered_by_event = triggered_by_event;
    if triggered_by_event {
        node.behavior = ActivityBehavior::EventSubProcess;
        node.event_scope = Some(scope.scope);
    } else {
        node.behavior = ActivityBehavior::SubProcess;
    }

    parse_scope(el, ScopeRef::Activity(id), doc, pcx)?;
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

pub(super) fn build_transaction<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);

    let node = pcx.graph.activity_mut(id);
    node.is_scope = true;
    node.is_subprocess_scope = true;
    node.behavior = ActivityBehavior::Transaction;

    parse_scope(el, ScopeRef::Activity(id), doc, pcx)?;
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process, semantic_errors};
    use crate::model::{ActivityBehavior, EventThrow, ScopeRef};

    /// An activityRef naming nothing in the scope is reported once the scope is built.
    #[test]
    fn t_scope_1_unknown_compensation_activity_ref() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <intermediateThrowEvent id="undo_all"><compensateEventDefinition activityRef="ghost"/></intermediateThrowEvent>
            <sequenceFlow id="f1" sourceRef="s" targetRef="undo_all"/>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["Invalid attribute value for 'activityRef': no activity with id 'ghost' in scope 'p'"]
        );
        assert!(report.errors[0].mentions("undo_all"));
    }

    /// An activityRef may name an activity declared later in the same scope.
    #[test]
    fn t_scope_2_forward_compensation_activity_ref() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <intermediateThrowEvent id="undo_all"><compensateEventDefinition activityRef="book"/></intermediateThrowEvent>
            <userTask id="book"/>
            <sequenceFlow id="f1" sourceRef="s" targetRef="undo_all"/>"#,
        ));
        assert_eq!(
            node(graph(&output), "undo_all").behavior,
            ActivityBehavior::IntermediateThrowEvent {
                throws: EventThrow::Compensation {
                    activity_ref: Some("book".into()),
                    wait_for_completion: true,
                }
            }
        );
    }

    /// Unsupported constructs are skipped with a warning.
    #[test]
    fn t_scope_3_unsupported_activity_skipped() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <complexGateway id="cg"/>"#,
        ));
        let g = graph(&output);
        assert!(g.find_activity("cg").is_none());
        assert_eq!(messages(&output.warnings), vec!["Ignoring unsupported activity type"]);
        assert!(output.warnings[0].mentions("cg"));
    }

    /// Children of an embedded subprocess are scoped to it.
    #[test]
    fn t_scope_4_nested_flow_scope() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <subProcess id="sub">
              <startEvent id="sub_start"/>
              <userTask id="inner"/>
              <sequenceFlow id="sf" sourceRef="sub_start" targetRef="inner"/>
            </subProcess>
            <sequenceFlow id="f1" sourceRef="s" targetRef="sub"/>"#,
        ));
        let g = graph(&output);
        let sub = g.find_activity("sub").expect("subprocess built");
        assert_eq!(node(g, "inner").flow_scope, ScopeRef::Activity(sub));
        assert_eq!(node(g, "sub").flow_scope, ScopeRef::Process);
        assert_eq!(g.activity(sub).initial, g.find_activity("sub_start"));
    }
}
