//! Checks that need the finished graph: exclusive gateway flow conditions and
//! ids on flows leaving an `asyncAfter` activity.

use crate::diagnostics::Diagnostics;
use crate::model::{ActivityBehavior, ActivityNode, ProcessGraph, ScopeRef};

pub(super) fn validate_process(graph: &ProcessGraph, diagnostics: &mut Diagnostics) {
    validate_scope(graph, ScopeRef::Process, diagnostics);
}

fn validate_scope(graph: &ProcessGraph, scope: ScopeRef, diagnostics: &mut Diagnostics) {
    for child in graph.children_of(scope) {
        let activity = graph.activity(*child);
        if matches!(activity.behavior, ActivityBehavior::ExclusiveGateway) {
            validate_exclusive_gateway(graph, activity, diagnostics);
        }
        validate_outgoing_flows(graph, activity, diagnostics);
        validate_scope(graph, ScopeRef::Activity(*child), diagnostics);
    }
}

fn validate_outgoing_flows(graph: &ProcessGraph, activity: &ActivityNode, diagnostics: &mut Diagnostics) {
    if !activity.async_after {
        return;
    }
    for transition in &activity.outgoing {
        if graph.transition(*transition).id.is_none() {
            diagnostics.error_at(
                format!(
                    "Sequence flow with sourceRef='{0}' must have an id, activity with id '{0}' uses 'asyncAfter'.",
                    activity.id
                ),
                &[&activity.id],
                activity.line,
            );
        }
    }
}

/// More than one unconditioned flow, or any next to a default flow, is an
/// error per flow. A single unconditioned flow without a default is taken as
/// the default with a warning.
fn validate_exclusive_gateway(graph: &ProcessGraph, gateway: &ActivityNode, diagnostics: &mut Diagnostics) {
    let gateway_id = gateway.id.as_str();
    let flow_id = move |t| graph.transition(t).id.as_deref().unwrap_or_default();

    match gateway.outgoing.as_slice() {
        [] => diagnostics.error_at(
            format!("Exclusive Gateway '{gateway_id}' has no outgoing sequence flows."),
            &[gateway_id],
            gateway.line,
        ),
        [only] => {
            if graph.transition(*only).condition.is_some() {
                let flow = flow_id(*only);
                diagnostics.error_at(
                    format!(
                        "Exclusive Gateway '{gateway_id}' has only one outgoing sequence flow ('{flow}'). \
                         This is not allowed to have a condition."
                    ),
                    &[gateway_id, flow],
                    gateway.line,
                );
            }
        }
        outgoing => {
            let default_flow = gateway.default_flow.as_deref().filter(|d| !d.is_empty());
            let mut without_condition = Vec::new();
            for transition in outgoing {
                let flow = graph.transition(*transition);
                let is_default = flow.id.is_some() && flow.id.as_deref() == gateway.default_flow.as_deref();
                match (flow.condition.is_some(), is_default) {
                    (false, false) => without_condition.push(flow_id(*transition)),
                    (true, true) => diagnostics.error_at(
                        format!(
                            "Exclusive Gateway '{gateway_id}' has outgoing sequence flow '{}' \
                             which is the default flow but has a condition too.",
                            flow_id(*transition)
                        ),
                        &[gateway_id, flow_id(*transition)],
                        gateway.line,
                    ),
                    _ => {}
                }
            }

            if default_flow.is_some() || without_condition.len() > 1 {
                for flow in without_condition {
                    diagnostics.error_at(
                        format!(
                            "Exclusive Gateway '{gateway_id}' has outgoing sequence flow '{flow}' \
                             without condition which is not the default flow."
                        ),
                        &[gateway_id, flow],
                        gateway.line,
                    );
                }
            } else if let [flow] = without_condition.as_slice() {
                diagnostics.warning_at(
                    format!(
                        "Exclusive Gateway '{gateway_id}' has outgoing sequence flow '{flow}' without condition \
                         which is not the default flow. We assume it to be the default flow, but it is bad \
                         modeling practice, better set the default flow in your gateway."
                    ),
                    &[gateway_id, flow],
                    gateway.line,
                );
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityId, Condition, TransitionNode};

    fn flow(graph: &mut ProcessGraph, id: &str, from: ActivityId, to: ActivityId, condition: bool) {
        graph.add_transition(TransitionNode {
            id: Some(id.to_string()),
            source: from,
            destination: to,
            name: None,
            documentation: None,
            condition: condition.then(|| Condition::Expression("${ok}".into())),
            listeners: Vec::new(),
            waypoints: Vec::new(),
        });
    }

    fn gateway_graph() -> (ProcessGraph, ActivityId, ActivityId, ActivityId) {
        let mut graph = ProcessGraph::new("p");
        let mut gateway = ActivityNode::new("g", "exclusiveGateway", ScopeRef::Process);
        gateway.behavior = ActivityBehavior::ExclusiveGateway;
        let g = graph.add_activity(gateway);
        let a = graph.add_activity(ActivityNode::new("a", "task", ScopeRef::Process));
        let b = graph.add_activity(ActivityNode::new("b", "task", ScopeRef::Process));
        (graph, g, a, b)
    }

    /// One unconditioned flow among several is a warning, not an error.
    #[test]
    fn t_validate_1_single_unconditioned_flow_warns() {
        let (mut graph, g, a, b) = gateway_graph();
        flow(&mut graph, "f1", g, a, true);
        flow(&mut graph, "f2", g, b, false);
        let mut diagnostics = Diagnostics::new("t.bpmn");
        validate_process(&graph, &mut diagnostics);
        assert!(!diagnostics.has_errors());
        let warnings: Vec<_> = diagnostics.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].element_ids, vec!["g".to_string(), "f2".to_string()]);
    }

    /// Two unconditioned flows give one error each.
    #[test]
    fn t_validate_2_two_unconditioned_flows_error() {
        let (mut graph, g, a, b) = gateway_graph();
        flow(&mut graph, "f1", g, a, false);
        flow(&mut graph, "f2", g, b, false);
        let mut diagnostics = Diagnostics::new("t.bpmn");
        validate_process(&graph, &mut diagnostics);
        assert_eq!(diagnostics.errors().count(), 2);
        assert_eq!(diagnostics.warnings().count(), 0);
    }

    /// A gateway with no outgoing flow is reported.
    #[test]
    fn t_validate_3_gateway_without_flows() {
        let (graph, ..) = gateway_graph();
        let mut diagnostics = Diagnostics::new("t.bpmn");
        validate_process(&graph, &mut diagnostics);
        let errors: Vec<_> = diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("has no outgoing sequence flows"));
    }
}
