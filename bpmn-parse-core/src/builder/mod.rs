//! Element tree to process graph.
//!
//! One [`ProcessContext`] per executable `<process>`; the document context
//! (definitions, diagnostics, hooks, job index) is shared by all of them.
//! Every builder takes the element it reads, the scope it builds into and both
//! contexts, and returns the node it created. Semantic problems go to the
//! diagnostics collector; the only `Err` is a failing hook.

mod callable;
mod diagram;
mod dispatch;
mod events;
mod flows;
mod gateways;
mod io;
mod jobs;
mod listeners;
mod multi_instance;
mod scope;
mod subscriptions;
mod tasks;
mod validate;

#[cfg(test)]
mod testing;

use crate::context::{DocumentContext, ProcessContext};
use crate::error::BuildResult;
use crate::hooks::HookEvent;
use crate::model::{
    is_expression, ActivityId, ActivityNode, Lane, LaneSet, Participant, PriorityProvider,
    ProcessGraph, ScopeRef,
};
use crate::xml::XmlElement;
use std::collections::{BTreeMap, HashMap};

// ─── Document entry ───────────────────────────────────────────

/// Build every executable process of the document, then run the diagram pass
/// and the root hook.
pub(crate) fn build_processes(
    root: &XmlElement,
    doc: &mut DocumentContext<'_>,
) -> BuildResult<Vec<ProcessGraph>> {
    let participants = collect_participants(root);
    let mut graphs = Vec::new();

    for process in root.children_named("process") {
        let key = process.id().unwrap_or_default();
        match process.attr("isExecutable") {
            None => {
                tracing::info!(
                    resource = doc.resource,
                    process = key,
                    "process has no isExecutable attribute"
                );
                if !doc.config.missing_executable_is_executable {
                    continue;
                }
            }
            Some(flag) if !flag.eq_ignore_ascii_case("true") => {
                tracing::info!(
                    resource = doc.resource,
                    process = key,
                    "ignoring non-executable process"
                );
                continue;
            }
            Some(_) => {}
        }

        let mut graph = parse_process(process, doc)?;
        if let Some(participant) = participants.get(graph.key.as_str()) {
            graph.participant = Some(participant.clone());
        }
        graphs.push(graph);
    }

    if doc.config.parse_diagram_interchange {
        diagram::parse_diagrams(root, doc, &mut graphs);
    }

    doc.fire(HookEvent::Root {
        element: root,
        processes: &mut graphs,
    })?;
    Ok(graphs)
}

/// `processRef` of every collaboration participant.
fn collect_participants(root: &XmlElement) -> HashMap<String, Participant> {
    let mut participants = HashMap::new();
    for collaboration in root.children_named("collaboration") {
        for participant in collaboration.children_named("participant") {
            let (Some(id), Some(process_ref)) = (participant.id(), participant.attr("processRef"))
            else {
                continue;
            };
            participants.insert(
                process_ref.to_string(),
                Participant {
                    id: id.to_string(),
                    name: participant.attr("name").map(str::to_string),
                    bounds: None,
                },
            );
        }
    }
    participants
}

// ─── Process ──────────────────────────────────────────────────

fn parse_process(el: &XmlElement, doc: &mut DocumentContext<'_>) -> BuildResult<ProcessGraph> {
    let key = match el.id() {
        Some(id) => id.to_string(),
        None => {
            doc.error("Attribute 'id' is required on process", el);
            String::new()
        }
    };
    tracing::debug!(resource = doc.resource, process = %key, "parsing process");

    let mut graph = ProcessGraph::new(key);
    graph.name = el.attr("name").map(str::to_string);
    graph.category = doc.definitions.target_namespace().map(str::to_string);
    graph.documentation = parse_documentation(el);
    graph.job_priority = parse_priority(el, "jobPriority", doc);
    graph.task_priority = parse_priority(el, "taskPriority", doc);
    graph.version_tag = el.engine_attr("versionTag").map(str::to_string);
    graph.history_time_to_live = parse_history_time_to_live(el, doc);
    graph.startable_in_tasklist = el
        .engine_attr("isStartableInTasklist")
        .map_or(true, |v| v.eq_ignore_ascii_case("true"));

    let mut pcx = ProcessContext::new(el, graph);
    scope::parse_scope(el, ScopeRef::Process, doc, &mut pcx)?;
    pcx.graph.lane_sets = parse_lane_sets(el);

    doc.fire(HookEvent::Process {
        element: el,
        graph: &mut pcx.graph,
    })?;

    validate::validate_process(&pcx.graph, &mut doc.diagnostics);
    Ok(pcx.graph)
}

/// Integer days, or an ISO period of whole days (`P5D`). Kept raw on the graph.
fn parse_history_time_to_live(el: &XmlElement, doc: &mut DocumentContext<'_>) -> Option<String> {
    let raw = el.engine_attr("historyTimeToLive").filter(|v| !v.is_empty())?;
    let days = raw
        .strip_prefix('P')
        .and_then(|rest| rest.strip_suffix('D'))
        .unwrap_or(raw);
    match days.parse::<i64>() {
        Ok(n) if n < 0 => doc.error(
            "Cannot parse historyTimeToLive: negative value is not allowed",
            el,
        ),
        Ok(_) => {}
        Err(_) => doc.error(
            format!("Cannot parse historyTimeToLive: '{raw}' is not a valid number of days"),
            el,
        ),
    }
    Some(raw.to_string())
}

fn parse_lane_sets(el: &XmlElement) -> Vec<LaneSet> {
    el.children_named("laneSet")
        .map(|lane_set| LaneSet {
            id: lane_set.id().map(str::to_string),
            name: lane_set.attr("name").map(str::to_string),
            lanes: lane_set
                .children_named("lane")
                .filter_map(|lane| {
                    Some(Lane {
                        id: lane.id()?.to_string(),
                        name: lane.attr("name").map(str::to_string),
                        flow_node_ids: lane
                            .children_named("flowNodeRef")
                            .map(|r| r.text().to_string())
                            .filter(|r| !r.is_empty())
                            .collect(),
                        bounds: None,
                    })
                })
                .collect(),
        })
        .collect()
}

/// `potentialStarter` assignments plus the `camunda:candidateStarter*` lists.
fn parse_start_authorization(el: &XmlElement, graph: &mut ProcessGraph) {
    for starter in el.extensions("potentialStarter") {
        let expressions = starter
            .child("resourceAssignmentExpression")
            .and_then(|r| r.child("formalExpression"))
            .map(|f| split_comma_list(f.text()))
            .unwrap_or_default();
        for expression in expressions {
            if let Some(user) = strip_call(&expression, "user") {
                graph.candidate_starter_users.push(user.to_string());
            } else if let Some(group) = strip_call(&expression, "group") {
                graph.candidate_starter_groups.push(group.to_string());
            } else {
                graph.candidate_starter_groups.push(expression);
            }
        }
    }
    if let Some(users) = el.engine_attr("candidateStarterUsers") {
        graph.candidate_starter_users.extend(split_comma_list(users));
    }
    if let Some(groups) = el.engine_attr("candidateStarterGroups") {
        graph.candidate_starter_groups.extend(split_comma_list(groups));
    }
}

/// `user(x)` gives `x`.
pub(crate) fn strip_call<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.strip_prefix(prefix)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

// ─── Shared helpers ───────────────────────────────────────────

/// Create the node for an activity element with the attributes every
/// activity carries.
pub(crate) fn create_activity(
    el: &XmlElement,
    scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> ActivityId {
    let id = match el.id() {
        Some(id) => id.to_string(),
        None => {
            doc.error(format!("Attribute 'id' is required on {}", el.name), el);
            String::new()
        }
    };
    tracing::debug!(activity = %id, kind = %el.name, "parsing activity");
    if !pcx.seen_ids.insert(id.clone()) {
        doc.error(format!("duplicate activity id '{id}'"), el);
    }

    let mut node = ActivityNode::new(id, el.name.as_str(), scope);
    node.name = el.attr("name").map(str::to_string);
    node.documentation = parse_documentation(el);
    node.default_flow = el.attr("default").map(str::to_string);
    node.line = Some(el.line);
    node.exclusive = doc.config.default_exclusive;
    node.job_priority = parse_priority(el, "jobPriority", doc);
    node.is_for_compensation = is_compensation_handler(el);
    node.properties = parse_extension_properties(el);
    pcx.graph.add_activity(node)
}

/// Execution listeners of the element, then the activity hook. Every builder
/// ends with this once its node is complete.
pub(crate) fn finish_activity(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult {
    let listeners = listeners::parse_execution_listeners_on_scope(el, doc);
    pcx.graph.activity_mut(activity).listeners.extend(listeners);
    doc.fire(HookEvent::Activity {
        kind: &el.name,
        element: el,
        graph: &mut pcx.graph,
        activity,
    })
}

/// `camunda:properties` name/value pairs; later entries win.
pub(crate) fn parse_extension_properties(el: &XmlElement) -> BTreeMap<String, String> {
    el.extension("properties")
        .into_iter()
        .flat_map(|props| props.engine_children("property"))
        .filter_map(|p| Some((p.attr("name")?.to_string(), p.attr("value").unwrap_or_default().to_string())))
        .collect()
}

pub(crate) fn is_compensation_handler(el: &XmlElement) -> bool {
    el.attr("isForCompensation")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Every `documentation` child, trimmed, separated by a blank line.
pub(crate) fn parse_documentation(el: &XmlElement) -> Option<String> {
    let docs: Vec<&str> = el.children_named("documentation").map(|d| d.text()).collect();
    if docs.is_empty() {
        None
    } else {
        Some(docs.join("\n\n"))
    }
}

/// `camunda:<attribute>` as a priority: an expression, or an integer literal.
pub(crate) fn parse_priority(
    el: &XmlElement,
    attribute: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<PriorityProvider> {
    let raw = el.engine_attr(attribute)?;
    if is_expression(raw) {
        return Some(PriorityProvider::Expression(raw.to_string()));
    }
    match raw.trim().parse::<i32>() {
        Ok(value) => Some(PriorityProvider::Constant(i64::from(value))),
        Err(_) => {
            doc.error(
                format!("Value '{raw}' for attribute '{attribute}' is not a valid number"),
                el,
            );
            None
        }
    }
}

/// Loose boolean reading used by shell fields and similar flags.
pub(crate) fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "enabled" | "on" | "active" | "yes" => Some(true),
        "false" | "disabled" | "off" | "inactive" | "no" => Some(false),
        _ => None,
    }
}

/// Split on commas that are not inside `${...}` or `#{...}`; parts are trimmed.
pub(crate) fn split_comma_list(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut inside_expression = false;
    for c in text.chars() {
        match c {
            '{' | '$' => {
                inside_expression = true;
                current.push(c);
            }
            '}' => {
                inside_expression = false;
                current.push(c);
            }
            ',' if !inside_expression => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}
