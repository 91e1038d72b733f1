use super::events::build_intermediate_catch;
use super::io::parse_activity_io;
use super::jobs::parse_async_for_activity;
use super::{create_activity, finish_activity};
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::model::{ActivityBehavior, ActivityId};
use crate::xml::XmlElement;

fn build_gateway<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    behavior: ActivityBehavior,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    pcx.graph.activity_mut(id).behavior = behavior;
    parse_async_for_activity(el, id, doc, pcx);
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

pub(super) fn build_exclusive_gateway<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    build_gateway(el, scope, ActivityBehavior::ExclusiveGateway, doc, pcx)
}

pub(super) fn build_inclusive_gateway<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    build_gateway(el, scope, ActivityBehavior::InclusiveGateway, doc, pcx)
}

pub(super) fn build_parallel_gateway<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    build_gateway(el, scope, ActivityBehavior::ParallelGateway, doc, pcx)
}

/// The gateway is a scope; the intermediate catches its flows lead to are
/// built right here with the gateway as their event scope.
pub(super) fn build_event_based_gateway<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    let node = pcx.graph.activity_mut(id);
    node.behavior = ActivityBehavior::EventBasedGateway;
    node.is_scope = true;
    parse_async_for_activity(el, id, doc, pcx);
    if pcx.graph.activity(id).async_after {
        doc.error("'asyncAfter' not supported for eventBasedGateway elements.", el);
    }
    finish_activity(el, id, doc, pcx)?;

    let Some(gateway_id) = el.id() else {
        return Ok(Some(id));
    };
    for flow in scope.element.children_named("sequenceFlow") {
        if flow.attr("sourceRef") != Some(gateway_id) {
            continue;
        }
        let Some(target_ref) = flow.attr("targetRef") else {
            continue;
        };
        let Some(target) = scope.element.children.iter().find(|c| c.id() == Some(target_ref)) else {
            continue;
        };
        if target.is_bpmn("intermediateCatchEvent") {
            let catch = build_intermediate_catch(target, scope.scope, Some(id), doc, pcx)?;
            parse_activity_io(target, catch, doc, pcx);
        } else {
            doc.error(
                "Event based gateway can only be connected to elements of type intermediateCatchEvent",
                el,
            );
        }
    }
    Ok(Some(id))
}
