use crate::config::CompilerConfig;
use crate::definitions::Definitions;
use crate::diagnostics::Diagnostics;
use crate::error::BuildResult;
use crate::hooks::{HookEvent, ParseHooks};
use crate::model::{
    ActivityId, AsyncPosition, JobDeclaration, JobDeclarationIndex, ProcessGraph, ScopeRef,
    TransitionId,
};
use crate::xml::XmlElement;
use std::collections::{HashMap, HashSet};

// ─── Document context ─────────────────────────────────────────

/// State that lives for the whole document: symbol tables, diagnostics, the
/// hook list and the job declaration index.
pub struct DocumentContext<'a> {
    pub resource: &'a str,
    pub config: &'a CompilerConfig,
    pub definitions: Definitions,
    pub diagnostics: Diagnostics,
    pub hooks: &'a mut ParseHooks,
    pub job_declarations: JobDeclarationIndex,
}

impl<'a> DocumentContext<'a> {
    pub fn new(
        resource: &'a str,
        config: &'a CompilerConfig,
        root: &XmlElement,
        hooks: &'a mut ParseHooks,
    ) -> Self {
        let mut diagnostics = Diagnostics::new(resource);
        let definitions = Definitions::collect(root, &mut diagnostics);
        Self {
            resource,
            config,
            definitions,
            diagnostics,
            hooks,
            job_declarations: JobDeclarationIndex::new(),
        }
    }

    pub fn fire(&mut self, event: HookEvent<'_>) -> BuildResult {
        if self.hooks.is_empty() {
            return Ok(());
        }
        self.hooks.fire(self.resource, event)
    }

    pub fn error(&mut self, message: impl Into<String>, element: &XmlElement) {
        self.diagnostics.error(message, Some(element));
    }

    pub fn error_with(&mut self, message: impl Into<String>, element: &XmlElement, related: &[&str]) {
        self.diagnostics.error_with(message, Some(element), related);
    }

    pub fn warning(&mut self, message: impl Into<String>, element: &XmlElement) {
        self.diagnostics.warning(message, Some(element));
    }

    pub fn warning_with(&mut self, message: impl Into<String>, element: &XmlElement, related: &[&str]) {
        self.diagnostics.warning_with(message, Some(element), related);
    }

    /// Record a job under its process key.
    pub fn index_job(&mut self, process_key: &str, job: JobDeclaration) {
        self.job_declarations
            .entry(process_key.to_string())
            .or_default()
            .push(job);
    }

    /// Drop a message job from the index; the activity's own list is handled by the caller.
    pub fn remove_message_job(&mut self, process_key: &str, activity_id: &str, position: AsyncPosition) {
        if let Some(jobs) = self.job_declarations.get_mut(process_key) {
            jobs.retain(|job| {
                !matches!(job, JobDeclaration::Message(m) if m.activity_id == activity_id && m.position == position)
            });
        }
    }

    /// A message job already exists for this activity and position.
    pub fn has_message_job(&self, process_key: &str, activity_id: &str, position: AsyncPosition) -> bool {
        self.job_declarations.get(process_key).is_some_and(|jobs| {
            jobs.iter().any(|job| match job {
                JobDeclaration::Message(m) => m.activity_id == activity_id && m.position == position,
                _ => false,
            })
        })
    }
}

// ─── Process context ──────────────────────────────────────────

/// A compensation throw whose `activityRef` is checked once its scope is built.
#[derive(Clone, Debug)]
pub struct PendingActivityRef<'x> {
    pub element: &'x XmlElement,
    pub throwing_activity: String,
    pub activity_ref: String,
    pub scope: ScopeRef,
}

/// Scratch state for one `<process>`; dropped when the process is done.
pub struct ProcessContext<'x> {
    pub graph: ProcessGraph,
    pub element: &'x XmlElement,
    /// Transitions built so far, by sequence flow id.
    pub sequence_flows: HashMap<String, TransitionId>,
    /// Activity ids seen so far; a repeat is reported once per duplicate.
    pub seen_ids: HashSet<String>,
    /// Link name to the id of its catching event.
    pub link_targets: HashMap<String, String>,
    /// Throwing link event id to its link name. Throws build no node.
    pub link_sources: HashMap<String, String>,
    pub pending_activity_refs: Vec<PendingActivityRef<'x>>,
}

impl<'x> ProcessContext<'x> {
    pub fn new(element: &'x XmlElement, graph: ProcessGraph) -> Self {
        Self {
            graph,
            element,
            sequence_flows: HashMap::new(),
            seen_ids: HashSet::new(),
            link_targets: HashMap::new(),
            link_sources: HashMap::new(),
            pending_activity_refs: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.graph.key
    }

    /// Find an activity by element id anywhere in the process.
    pub fn find(&self, id: &str) -> Option<ActivityId> {
        self.graph.find_activity(id)
    }
}

/// The element a scope was built from, paired with its graph handle.
#[derive(Clone, Copy, Debug)]
pub struct Scope<'x> {
    pub element: &'x XmlElement,
    pub scope: ScopeRef,
}

impl<'x> Scope<'x> {
    pub fn new(element: &'x XmlElement, scope: ScopeRef) -> Self {
        Self { element, scope }
    }

    pub fn is_process(&self) -> bool {
        self.scope == ScopeRef::Process
    }
}
