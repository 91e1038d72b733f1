//! BPMN diagram interchange: plane, shape bounds and edge waypoints copied
//! onto the graphs that were built.

use super::parse_boolean;
use crate::context::DocumentContext;
use crate::model::{Bounds, ProcessGraph, Waypoint};
use crate::xml::{XmlElement, BPMNDI_NS, OMG_DC_NS, OMG_DI_NS};

pub(super) fn parse_diagrams(root: &XmlElement, doc: &mut DocumentContext<'_>, graphs: &mut [ProcessGraph]) {
    for diagram in root.children_ns(BPMNDI_NS, "BPMNDiagram") {
        if let Some(plane) = diagram.child_ns(BPMNDI_NS, "BPMNPlane") {
            parse_plane(plane, doc, graphs);
        }
    }
}

fn parse_plane(plane: &XmlElement, doc: &mut DocumentContext<'_>, graphs: &mut [ProcessGraph]) {
    let Some(bpmn_element) = plane.non_empty_attr("bpmnElement") else {
        doc.error("'bpmnElement' attribute is required on BPMNPlane ", plane);
        return;
    };
    if let Some(graph) = graphs.iter_mut().find(|g| g.key == bpmn_element) {
        graph.graphical_notation_defined = true;
    }
    for shape in plane.children_ns(BPMNDI_NS, "BPMNShape") {
        parse_shape(shape, doc, graphs);
    }
    for edge in plane.children_ns(BPMNDI_NS, "BPMNEdge") {
        parse_edge(edge, doc, graphs);
    }
}

// ─── Shapes ───────────────────────────────────────────────────

enum ShapeTarget {
    Participant(usize),
    Activity(usize, usize),
    Lane(usize, usize, usize),
}

fn shape_target(graphs: &[ProcessGraph], bpmn_element: &str) -> Option<ShapeTarget> {
    if let Some(g) = graphs
        .iter()
        .position(|g| g.participant.as_ref().is_some_and(|p| p.id == bpmn_element))
    {
        return Some(ShapeTarget::Participant(g));
    }
    for (g, graph) in graphs.iter().enumerate() {
        if let Some(activity) = graph.find_activity(bpmn_element) {
            return Some(ShapeTarget::Activity(g, activity.0 as usize));
        }
        for (s, lane_set) in graph.lane_sets.iter().enumerate() {
            if let Some(l) = lane_set.lanes.iter().position(|l| l.id == bpmn_element) {
                return Some(ShapeTarget::Lane(g, s, l));
            }
        }
    }
    None
}

fn parse_shape(shape: &XmlElement, doc: &mut DocumentContext<'_>, graphs: &mut [ProcessGraph]) {
    let Some(bpmn_element) = shape.non_empty_attr("bpmnElement") else {
        doc.error("'bpmnElement' attribute is required on BPMNShape", shape);
        return;
    };
    match shape_target(graphs, bpmn_element) {
        Some(ShapeTarget::Participant(g)) => {
            let bounds = parse_bounds(shape, doc);
            let graph = &mut graphs[g];
            graph.graphical_notation_defined = true;
            if let Some(participant) = graph.participant.as_mut() {
                participant.bounds = bounds;
            }
        }
        Some(ShapeTarget::Activity(g, a)) => {
            let bounds = parse_bounds(shape, doc);
            let activity = &mut graphs[g].activities[a];
            activity.bounds = bounds;
            if let Some(expanded) = shape.attr("isExpanded") {
                activity.is_expanded = Some(parse_boolean(expanded).unwrap_or(false));
            }
        }
        Some(ShapeTarget::Lane(g, s, l)) => {
            let bounds = parse_bounds(shape, doc);
            graphs[g].lane_sets[s].lanes[l].bounds = bounds;
        }
        None if doc.definitions.contains_element(bpmn_element) => {}
        None => doc.error(
            format!("Invalid reference in 'bpmnElement' attribute, activity {bpmn_element} not found"),
            shape,
        ),
    }
}

fn parse_bounds(shape: &XmlElement, doc: &mut DocumentContext<'_>) -> Option<Bounds> {
    let Some(bounds) = shape.child_ns(OMG_DC_NS, "Bounds") else {
        doc.error("'Bounds' element is required", shape);
        return None;
    };
    Some(Bounds {
        x: parse_coordinate(shape, "x", bounds.attr("x"), doc),
        y: parse_coordinate(shape, "y", bounds.attr("y"), doc),
        width: parse_coordinate(shape, "width", bounds.attr("width"), doc),
        height: parse_coordinate(shape, "height", bounds.attr("height"), doc),
    })
}

/// Decimal coordinate truncated to an integer; `-1` when missing or malformed.
fn parse_coordinate(el: &XmlElement, name: &str, value: Option<&str>, doc: &mut DocumentContext<'_>) -> i64 {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        doc.error(format!("{name} is required"), el);
        return -1;
    };
    match value.trim().parse::<f64>() {
        Ok(v) => v as i64,
        Err(err) => {
            doc.error(format!("Cannot parse {name}: {err}"), el);
            -1
        }
    }
}

// ─── Edges ────────────────────────────────────────────────────

fn parse_edge(edge: &XmlElement, doc: &mut DocumentContext<'_>, graphs: &mut [ProcessGraph]) {
    let Some(flow_id) = edge.non_empty_attr("bpmnElement") else {
        doc.error("'bpmnElement' attribute is required on BPMNEdge", edge);
        return;
    };
    let found = graphs.iter().enumerate().find_map(|(g, graph)| {
        graph
            .transitions
            .iter()
            .position(|t| t.id.as_deref() == Some(flow_id))
            .map(|t| (g, t))
    });
    let Some((g, t)) = found else {
        if !doc.definitions.contains_element(flow_id) {
            doc.error(
                format!("Invalid reference in 'bpmnElement' attribute, sequenceFlow {flow_id} not found"),
                edge,
            );
        }
        return;
    };

    let waypoint_els: Vec<_> = edge.children_ns(OMG_DI_NS, "waypoint").collect();
    if waypoint_els.len() < 2 {
        doc.error("Minimum 2 waypoint elements must be definted for a 'BPMNEdge'", edge);
        return;
    }
    let waypoints = waypoint_els
        .into_iter()
        .map(|w| Waypoint {
            x: parse_coordinate(w, "x", w.attr("x"), doc),
            y: parse_coordinate(w, "y", w.attr("y"), doc),
        })
        .collect();
    graphs[g].transitions[t].waypoints = waypoints;
}
