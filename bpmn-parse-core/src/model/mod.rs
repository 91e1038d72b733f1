pub mod activity_types;
pub mod behavior;
pub mod declarations;

pub use behavior::*;
pub use declarations::*;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ─── Handles ──────────────────────────────────────────────────

/// Index into [`ProcessGraph::activities`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub u32);

/// Index into [`ProcessGraph::transitions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub u32);

/// A scope a node can belong to: the process itself or a scope activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeRef {
    Process,
    Activity(ActivityId),
}

/// How starting an activity affects its siblings and scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStartBehavior {
    #[default]
    Default,
    ConcurrentInFlowScope,
    InterruptEventScope,
    InterruptFlowScope,
    CancelEventScope,
}

// ─── Diagram data ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lanes: Vec<Lane>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub type_name: String,
}

// ─── Nodes ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Activity type, e.g. `userTask`, `boundaryTimer`, `multiInstanceBody`.
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub behavior: ActivityBehavior,

    /// Structural parent.
    pub flow_scope: ScopeRef,
    /// Scope that owns this activity's subscriptions; differs from the flow
    /// scope for boundary events and event subprocess starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_scope: Option<ScopeRef>,
    pub start_behavior: ActivityStartBehavior,

    pub is_scope: bool,
    pub is_subprocess_scope: bool,
    pub triggered_by_event: bool,
    pub is_for_compensation: bool,
    pub is_multi_instance: bool,
    /// Start event of an embedded subprocess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<ActivityId>,
    /// Id of the activity that compensates this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation_handler_id: Option<String>,

    pub async_before: bool,
    pub async_after: bool,
    pub exclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<PriorityProvider>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_declarations: Vec<JobDeclaration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_mapping: Option<IoMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ExecutionListener>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_declarations: Vec<VariableDeclaration>,

    /// Declarations registered on this activity as an event scope.
    #[serde(default, skip_serializing_if = "ScopeDeclarations::is_empty")]
    pub declarations: ScopeDeclarations,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActivityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outgoing: Vec<TransitionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incoming: Vec<TransitionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

impl ActivityNode {
    pub fn new(id: impl Into<String>, activity_type: impl Into<String>, flow_scope: ScopeRef) -> Self {
        Self {
            id: id.into(),
            name: None,
            documentation: None,
            activity_type: activity_type.into(),
            line: None,
            behavior: ActivityBehavior::Unresolved,
            flow_scope,
            event_scope: None,
            start_behavior: ActivityStartBehavior::Default,
            is_scope: false,
            is_subprocess_scope: false,
            triggered_by_event: false,
            is_for_compensation: false,
            is_multi_instance: false,
            initial: None,
            compensation_handler_id: None,
            async_before: false,
            async_after: false,
            exclusive: true,
            job_priority: None,
            job_declarations: Vec::new(),
            default_flow: None,
            io_mapping: None,
            listeners: Vec::new(),
            properties: BTreeMap::new(),
            variable_declarations: Vec::new(),
            declarations: ScopeDeclarations::default(),
            children: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            bounds: None,
            is_expanded: None,
        }
    }

    pub fn is_boundary_event(&self) -> bool {
        matches!(self.behavior, ActivityBehavior::BoundaryEvent { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Expression(String),
    Script(ScriptSource),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: i64,
    pub y: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionNode {
    /// Sequence flow ids are optional in the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: ActivityId,
    pub destination: ActivityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ExecutionListener>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<Waypoint>,
}

// ─── Process graph ────────────────────────────────────────────

/// One compiled executable `<process>`. Activities live in an arena; scopes
/// own their children by id and back-references are ids too.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGraph {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_time_to_live: Option<String>,
    pub startable_in_tasklist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<PriorityProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<PriorityProvider>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<ActivityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_variable: Option<String>,
    #[serde(default, skip_serializing_if = "FormDefinition::is_empty")]
    pub start_form: FormDefinition,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_definitions: BTreeMap<String, TaskDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_starter_users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_starter_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lane_sets: Vec<LaneSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    pub graphical_notation_defined: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ExecutionListener>,
    /// Declarations whose event scope is the process.
    #[serde(default, skip_serializing_if = "ScopeDeclarations::is_empty")]
    pub declarations: ScopeDeclarations,

    /// Top-level activities.
    pub children: Vec<ActivityId>,
    pub activities: Vec<ActivityNode>,
    pub transitions: Vec<TransitionNode>,
}

impl ProcessGraph {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            category: None,
            documentation: None,
            version_tag: None,
            history_time_to_live: None,
            startable_in_tasklist: true,
            job_priority: None,
            task_priority: None,
            initial: None,
            initiator_variable: None,
            start_form: FormDefinition::default(),
            task_definitions: BTreeMap::new(),
            candidate_starter_users: Vec::new(),
            candidate_starter_groups: Vec::new(),
            lane_sets: Vec::new(),
            participant: None,
            graphical_notation_defined: false,
            listeners: Vec::new(),
            declarations: ScopeDeclarations::default(),
            children: Vec::new(),
            activities: Vec::new(),
            transitions: Vec::new(),
        }
    }

    // ── Arena access ──

    pub fn activity(&self, id: ActivityId) -> &ActivityNode {
        &self.activities[id.0 as usize]
    }

    pub fn activity_mut(&mut self, id: ActivityId) -> &mut ActivityNode {
        &mut self.activities[id.0 as usize]
    }

    pub fn transition(&self, id: TransitionId) -> &TransitionNode {
        &self.transitions[id.0 as usize]
    }

    /// Activity ids are unique within a process, so a linear scan is exact.
    pub fn find_activity(&self, id: &str) -> Option<ActivityId> {
        self.activities
            .iter()
            .position(|a| a.id == id)
            .map(|i| ActivityId(i as u32))
    }

    pub fn activity_by_id(&self, id: &str) -> Option<&ActivityNode> {
        self.find_activity(id).map(|a| self.activity(a))
    }

    pub fn find_transition(&self, id: &str) -> Option<&TransitionNode> {
        self.transitions.iter().find(|t| t.id.as_deref() == Some(id))
    }

    pub fn initial_activity(&self) -> Option<&ActivityNode> {
        self.initial.map(|a| self.activity(a))
    }

    /// Create a node under `scope` and return its handle.
    pub fn add_activity(&mut self, node: ActivityNode) -> ActivityId {
        let id = ActivityId(self.activities.len() as u32);
        let scope = node.flow_scope;
        self.activities.push(node);
        self.children_of_mut(scope).push(id);
        id
    }

    pub fn add_transition(&mut self, transition: TransitionNode) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        let (source, destination) = (transition.source, transition.destination);
        self.transitions.push(transition);
        self.activity_mut(source).outgoing.push(id);
        self.activity_mut(destination).incoming.push(id);
        id
    }

    pub fn children_of(&self, scope: ScopeRef) -> &[ActivityId] {
        match scope {
            ScopeRef::Process => &self.children,
            ScopeRef::Activity(a) => &self.activity(a).children,
        }
    }

    fn children_of_mut(&mut self, scope: ScopeRef) -> &mut Vec<ActivityId> {
        match scope {
            ScopeRef::Process => &mut self.children,
            ScopeRef::Activity(a) => &mut self.activity_mut(a).children,
        }
    }

    pub fn declarations_of(&self, scope: ScopeRef) -> &ScopeDeclarations {
        match scope {
            ScopeRef::Process => &self.declarations,
            ScopeRef::Activity(a) => &self.activity(a).declarations,
        }
    }

    pub fn declarations_of_mut(&mut self, scope: ScopeRef) -> &mut ScopeDeclarations {
        match scope {
            ScopeRef::Process => &mut self.declarations,
            ScopeRef::Activity(a) => &mut self.activity_mut(a).declarations,
        }
    }

    /// Id of the scope, `None` for the process.
    pub fn scope_id(&self, scope: ScopeRef) -> Option<&str> {
        match scope {
            ScopeRef::Process => None,
            ScopeRef::Activity(a) => Some(self.activity(a).id.as_str()),
        }
    }

    /// Display name of the scope: its activity id or the process key.
    pub fn scope_name(&self, scope: ScopeRef) -> &str {
        self.scope_id(scope).unwrap_or(&self.key)
    }

    /// Find `id` among the direct and nested children of `scope`.
    pub fn find_in_scope(&self, scope: ScopeRef, id: &str) -> Option<ActivityId> {
        for child in self.children_of(scope) {
            if self.activity(*child).id == id {
                return Some(*child);
            }
            if let Some(nested) = self.find_in_scope(ScopeRef::Activity(*child), id) {
                return Some(nested);
            }
        }
        None
    }

    /// Find `id` at the same subprocess level as `scope`: direct children and
    /// children of non-subprocess scopes (multi-instance bodies, scoped tasks),
    /// without descending into embedded subprocesses.
    pub fn find_at_subprocess_level(&self, scope: ScopeRef, id: &str) -> Option<ActivityId> {
        for child in self.children_of(scope) {
            let node = self.activity(*child);
            if node.id == id {
                return Some(*child);
            }
            if !node.is_subprocess_scope {
                if let Some(nested) = self.find_at_subprocess_level(ScopeRef::Activity(*child), id) {
                    return Some(nested);
                }
            }
        }
        None
    }

    /// The enclosing multi-instance body, when `activity` is its inner activity.
    pub fn multi_instance_body_of(&self, activity: ActivityId) -> Option<ActivityId> {
        match self.activity(activity).flow_scope {
            ScopeRef::Activity(parent) if self.activity(parent).behavior.is_multi_instance_body() => {
                Some(parent)
            }
            _ => None,
        }
    }

    // ── Stable output ──

    /// JSON with activities sorted by id and transitions sorted by id, arena
    /// handles replaced with element ids. Equal for structurally identical
    /// graphs.
    pub fn deterministic_json(&self) -> serde_json::Value {
        let id_of = |a: ActivityId| self.activity(a).id.clone();
        let scope_json = |s: ScopeRef| match s {
            ScopeRef::Process => serde_json::Value::Null,
            ScopeRef::Activity(a) => serde_json::Value::String(id_of(a)),
        };

        let mut activities: Vec<&ActivityNode> = self.activities.iter().collect();
        activities.sort_by(|a, b| a.id.cmp(&b.id));
        let activities: Vec<serde_json::Value> = activities
            .into_iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "type": a.activity_type,
                    "behavior": a.behavior,
                    "flow_scope": scope_json(a.flow_scope),
                    "event_scope": a.event_scope.map(scope_json),
                    "start_behavior": a.start_behavior,
                    "is_scope": a.is_scope,
                    "async_before": a.async_before,
                    "async_after": a.async_after,
                    "is_for_compensation": a.is_for_compensation,
                    "compensation_handler": a.compensation_handler_id,
                    "initial": a.initial.map(id_of),
                    "children": a.children.iter().map(|c| id_of(*c)).collect::<Vec<_>>(),
                    "outgoing": a.outgoing.iter().map(|t| self.transition(*t).id.clone()).collect::<Vec<_>>(),
                    "declarations": a.declarations,
                    "jobs": a.job_declarations,
                })
            })
            .collect();

        let mut transitions: Vec<&TransitionNode> = self.transitions.iter().collect();
        transitions.sort_by(|a, b| {
            (&a.id, &self.activity(a.source).id, &self.activity(a.destination).id).cmp(&(
                &b.id,
                &self.activity(b.source).id,
                &self.activity(b.destination).id,
            ))
        });
        let transitions: Vec<serde_json::Value> = transitions
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "source": id_of(t.source),
                    "destination": id_of(t.destination),
                    "condition": t.condition,
                })
            })
            .collect();

        serde_json::json!({
            "key": self.key,
            "name": self.name,
            "initial": self.initial.map(id_of),
            "declarations": self.declarations,
            "task_definitions": self.task_definitions,
            "activities": activities,
            "transitions": transitions,
        })
    }

    /// SHA-256 of [`Self::deterministic_json`].
    pub fn fingerprint(&self) -> [u8; 32] {
        let canonical = self.deterministic_json().to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_chain() -> ProcessGraph {
        let mut g = ProcessGraph::new("p");
        let a = g.add_activity(ActivityNode::new("a", "startEvent", ScopeRef::Process));
        let sub = g.add_activity(ActivityNode::new("sub", "subProcess", ScopeRef::Process));
        let inner = g.add_activity(ActivityNode::new("inner", "task", ScopeRef::Activity(sub)));
        g.add_transition(TransitionNode {
            id: Some("f1".to_string()),
            source: a,
            destination: sub,
            name: None,
            documentation: None,
            condition: None,
            listeners: vec![],
            waypoints: vec![],
        });
        let _ = inner;
        g
    }

    /// Transitions link both ends; scope search descends into children.
    #[test]
    fn t_graph_1_arena_links() {
        let g = graph_with_chain();
        let a = g.find_activity("a").unwrap();
        let sub = g.find_activity("sub").unwrap();
        assert_eq!(g.activity(a).outgoing.len(), 1);
        assert_eq!(g.activity(sub).incoming.len(), 1);
        assert_eq!(g.children, vec![a, sub]);
        assert_eq!(g.find_in_scope(ScopeRef::Process, "inner"), g.find_activity("inner"));
    }

    /// Insertion order does not change the fingerprint.
    #[test]
    fn t_graph_2_fingerprint_ignores_arena_order() {
        let g1 = graph_with_chain();
        let mut g2 = ProcessGraph::new("p");
        let sub = g2.add_activity(ActivityNode::new("sub", "subProcess", ScopeRef::Process));
        g2.add_activity(ActivityNode::new("inner", "task", ScopeRef::Activity(sub)));
        let a = g2.add_activity(ActivityNode::new("a", "startEvent", ScopeRef::Process));
        g2.add_transition(TransitionNode {
            id: Some("f1".to_string()),
            source: a,
            destination: sub,
            name: None,
            documentation: None,
            condition: None,
            listeners: vec![],
            waypoints: vec![],
        });
        assert_eq!(g1.fingerprint(), g2.fingerprint());
    }
}
