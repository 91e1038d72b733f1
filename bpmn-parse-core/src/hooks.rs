use crate::error::{BuildResult, CompileError};
use crate::model::{ActivityId, ProcessGraph, TransitionId};
use crate::xml::XmlElement;

/// One constructed grammar element, handed to every hook with mutable access
/// to the node that was just built.
pub enum HookEvent<'a> {
    /// Whole document, after every process and the diagram pass.
    Root {
        element: &'a XmlElement,
        processes: &'a mut [ProcessGraph],
    },
    /// A process, after its scope pass and lane sets.
    Process {
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
    },
    /// Any activity; `kind` is the element's local name (`userTask`,
    /// `boundaryEvent`, `subProcess`, ...).
    Activity {
        kind: &'a str,
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
        activity: ActivityId,
    },
    /// An event definition (`timerEventDefinition`, ...) on `activity`.
    EventDefinition {
        kind: &'a str,
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
        activity: ActivityId,
    },
    SequenceFlow {
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
        transition: TransitionId,
    },
    /// A `property` child creating a variable declaration on `activity`.
    Property {
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
        activity: ActivityId,
    },
    /// A synthesized multi-instance body.
    MultiInstance {
        element: &'a XmlElement,
        graph: &'a mut ProcessGraph,
        body: ActivityId,
    },
}

impl HookEvent<'_> {
    /// Short description used in error context.
    pub fn describe(&self) -> String {
        match self {
            HookEvent::Root { .. } => "definitions".to_string(),
            HookEvent::Process { graph, .. } => format!("process '{}'", graph.key),
            HookEvent::Activity { kind, graph, activity, .. } => {
                format!("{kind} '{}'", graph.activity(*activity).id)
            }
            HookEvent::EventDefinition { kind, graph, activity, .. } => {
                format!("{kind} of '{}'", graph.activity(*activity).id)
            }
            HookEvent::SequenceFlow { graph, transition, .. } => format!(
                "sequenceFlow '{}'",
                graph.transition(*transition).id.as_deref().unwrap_or("<anonymous>")
            ),
            HookEvent::Property { graph, activity, .. } => {
                format!("property of '{}'", graph.activity(*activity).id)
            }
            HookEvent::MultiInstance { graph, body, .. } => {
                format!("multiInstanceBody '{}'", graph.activity(*body).id)
            }
        }
    }
}

type HookFn = Box<dyn FnMut(&mut HookEvent<'_>) -> anyhow::Result<()>>;

/// Ordered list of named callbacks. Each hook sees every event in
/// registration order; the first failure aborts the compile.
#[derive(Default)]
pub struct ParseHooks {
    hooks: Vec<(String, HookFn)>,
}

impl std::fmt::Debug for ParseHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|(name, _)| name))
            .finish()
    }
}

impl ParseHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        hook: impl FnMut(&mut HookEvent<'_>) -> anyhow::Result<()> + 'static,
    ) {
        self.hooks.push((name.into(), Box::new(hook)));
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn fire(&mut self, resource: &str, mut event: HookEvent<'_>) -> BuildResult {
        for (name, hook) in self.hooks.iter_mut() {
            if let Err(source) = hook(&mut event) {
                let context = format!("running hook '{name}' on {}", event.describe());
                tracing::error!(resource, %context, error = %source, "extension hook failed");
                return Err(CompileError::Unexpected {
                    resource: resource.to_string(),
                    context,
                    source: source.into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityNode, ScopeRef};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn element() -> XmlElement {
        XmlElement {
            namespace: None,
            name: "task".to_string(),
            attributes: vec![],
            namespace_declarations: vec![],
            children: vec![],
            text: String::new(),
            line: 1,
        }
    }

    /// Hooks run in registration order and may mutate the graph.
    #[test]
    fn t_hooks_1_run_in_order_and_mutate() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = ParseHooks::new();
        let first = Rc::clone(&seen);
        hooks.push("first", move |_| {
            first.borrow_mut().push("first");
            Ok(())
        });
        let second = Rc::clone(&seen);
        hooks.push("second", move |event| {
            second.borrow_mut().push("second");
            if let HookEvent::Activity { graph, activity, .. } = event {
                graph.activity_mut(*activity).name = Some("renamed".to_string());
            }
            Ok(())
        });

        let mut graph = ProcessGraph::new("p");
        let a = graph.add_activity(ActivityNode::new("a", "task", ScopeRef::Process));
        let el = element();
        hooks
            .fire(
                "r.bpmn",
                HookEvent::Activity {
                    kind: "task",
                    element: &el,
                    graph: &mut graph,
                    activity: a,
                },
            )
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["first", "second"]);
        assert_eq!(graph.activity(a).name.as_deref(), Some("renamed"));
    }

    /// A hook error becomes an unexpected compile error naming the hook.
    #[test]
    fn t_hooks_2_failing_hook_is_unexpected() {
        let mut hooks = ParseHooks::new();
        hooks.push("boom", |_| anyhow::bail!("refused"));
        let mut graph = ProcessGraph::new("p");
        let el = element();
        let err = hooks
            .fire(
                "r.bpmn",
                HookEvent::Process {
                    element: &el,
                    graph: &mut graph,
                },
            )
            .unwrap_err();
        match err {
            CompileError::Unexpected { context, .. } => {
                assert_eq!(context, "running hook 'boom' on process 'p'")
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }
}
