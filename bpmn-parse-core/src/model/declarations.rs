use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Value providers ──────────────────────────────────────────

/// Job or task priority: a literal parsed at compile time, or an expression
/// evaluated by the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityProvider {
    Constant(i64),
    Expression(String),
}

/// `${...}` or `#{...}` anywhere in the text.
pub fn is_expression(text: &str) -> bool {
    text.contains("${") || text.contains("#{")
}

// ─── Event subscriptions ──────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    Message,
    Signal,
    Conditional,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Message => f.write_str("message"),
            EventType::Signal => f.write_str("signal"),
            EventType::Conditional => f.write_str("conditional"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalEventDefinition {
    pub condition: String,
    /// Script language, when the condition is a script rather than an expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_events: Vec<String>,
    pub interrupting: bool,
}

/// A catch that the runtime must subscribe before the owning activity can be
/// triggered. Stored on the event scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscriptionDeclaration {
    pub event_type: EventType,
    /// Unresolved name text; may contain an expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub activity_id: String,
    /// `None` when the event scope is the process itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_scope_id: Option<String>,
    pub start_event: bool,
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionalEventDefinition>,
}

// ─── Error / escalation catches ───────────────────────────────

/// Catch-all handlers leave `error_code` empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEventDefinition {
    pub handler_activity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message_variable: Option<String>,
    /// Base precedence: event subprocess starts outrank boundary events.
    pub base_precedence: i32,
}

impl ErrorEventDefinition {
    pub const BOUNDARY_PRECEDENCE: i32 = 0;
    pub const EVENT_SUBPROCESS_PRECEDENCE: i32 = 10;

    /// An explicit code always outranks any catch-all.
    pub fn precedence(&self) -> i32 {
        self.base_precedence + if self.error_code.is_some() { 20_000 } else { 0 }
    }

    pub fn is_from_event_subprocess(&self) -> bool {
        self.base_precedence == Self::EVENT_SUBPROCESS_PRECEDENCE
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEventDefinition {
    pub handler_activity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_code_variable: Option<String>,
    pub cancel_activity: bool,
    /// Handler is an event subprocess start rather than a boundary event.
    pub from_event_subprocess: bool,
}

impl EscalationEventDefinition {
    pub fn precedence(&self) -> i32 {
        if self.escalation_code.is_some() {
            1
        } else {
            0
        }
    }
}

/// `camunda:errorEventDefinition` on an external task: routes a reported
/// failure by expression instead of by thrown code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalErrorEventDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

// ─── Timers ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    Date,
    Cycle,
    Duration,
}

impl TimerKind {
    pub fn element_name(self) -> &'static str {
        match self {
            TimerKind::Date => "timeDate",
            TimerKind::Cycle => "timeCycle",
            TimerKind::Duration => "timeDuration",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Date => f.write_str("DATE"),
            TimerKind::Cycle => f.write_str("CYCLE"),
            TimerKind::Duration => f.write_str("DURATION"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefinition {
    pub kind: TimerKind,
    pub expression: String,
}

pub mod job_handlers {
    pub const ASYNC_CONTINUATION: &str = "async-continuation";
    pub const TIMER_START_EVENT: &str = "timer-start-event";
    pub const TIMER_START_EVENT_SUBPROCESS: &str = "timer-start-event-subprocess";
    pub const TIMER_INTERMEDIATE_TRANSITION: &str = "timer-intermediate-transition";
    pub const TIMER_TRANSITION: &str = "timer-transition";
    pub const TIMER_TASK_LISTENER: &str = "timer-task-listener";
    pub const EVENT: &str = "event";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDeclaration {
    pub activity_id: String,
    pub timer: TimerDefinition,
    pub job_handler_type: String,
    /// Handler configuration. Process key for start timers, activity id otherwise.
    pub job_configuration: String,
    pub exclusive: bool,
    pub interrupting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<PriorityProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_scope_id: Option<String>,
    /// Set on timeout task listeners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_id: Option<String>,
}

impl TimerDeclaration {
    /// Raw `<KIND>: <expression>` string handed to the scheduler.
    pub fn raw_configuration(&self) -> String {
        format!("{}: {}", self.timer.kind, self.timer.expression)
    }
}

// ─── Deferred jobs ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncPosition {
    Before,
    After,
}

impl AsyncPosition {
    pub fn configuration(self) -> &'static str {
        match self {
            AsyncPosition::Before => "async-before",
            AsyncPosition::After => "async-after",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageJobDeclaration {
    pub activity_id: String,
    pub position: AsyncPosition,
    pub exclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<PriorityProvider>,
}

/// Job that delivers an event to a subscription asynchronously (signal starts
/// with `camunda:async`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscriptionJobDeclaration {
    pub activity_id: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub exclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_priority: Option<PriorityProvider>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum JobDeclaration {
    Message(MessageJobDeclaration),
    Timer(TimerDeclaration),
    EventSubscription(EventSubscriptionJobDeclaration),
}

impl JobDeclaration {
    pub fn activity_id(&self) -> &str {
        match self {
            JobDeclaration::Message(j) => &j.activity_id,
            JobDeclaration::Timer(j) => &j.activity_id,
            JobDeclaration::EventSubscription(j) => &j.activity_id,
        }
    }

    pub fn job_handler_type(&self) -> &str {
        match self {
            JobDeclaration::Message(_) => job_handlers::ASYNC_CONTINUATION,
            JobDeclaration::Timer(j) => &j.job_handler_type,
            JobDeclaration::EventSubscription(_) => job_handlers::EVENT,
        }
    }

    pub fn exclusive(&self) -> bool {
        match self {
            JobDeclaration::Message(j) => j.exclusive,
            JobDeclaration::Timer(j) => j.exclusive,
            JobDeclaration::EventSubscription(j) => j.exclusive,
        }
    }

    pub fn job_priority(&self) -> Option<&PriorityProvider> {
        match self {
            JobDeclaration::Message(j) => j.job_priority.as_ref(),
            JobDeclaration::Timer(j) => j.job_priority.as_ref(),
            JobDeclaration::EventSubscription(j) => j.job_priority.as_ref(),
        }
    }
}

/// Every job declaration of a document, keyed by process key.
pub type JobDeclarationIndex = BTreeMap<String, Vec<JobDeclaration>>;

// ─── Per-scope declaration sets ───────────────────────────────

/// Declarations registered on a scope (a process or a scope activity) by the
/// activities whose event scope it is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDeclarations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_subscriptions: Vec<EventSubscriptionDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timers: Vec<TimerDeclaration>,
    /// Sorted by descending precedence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_event_definitions: Vec<ErrorEventDefinition>,
    /// Sorted by descending precedence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_event_definitions: Vec<EscalationEventDefinition>,
}

impl ScopeDeclarations {
    pub fn is_empty(&self) -> bool {
        self.event_subscriptions.is_empty()
            && self.timers.is_empty()
            && self.error_event_definitions.is_empty()
            && self.escalation_event_definitions.is_empty()
    }

    pub fn subscriptions_for<'a>(
        &'a self,
        activity_id: &'a str,
    ) -> impl Iterator<Item = &'a EventSubscriptionDeclaration> + 'a {
        self.event_subscriptions
            .iter()
            .filter(move |s| s.activity_id == activity_id)
    }

    pub fn timers_for<'a>(&'a self, activity_id: &'a str) -> impl Iterator<Item = &'a TimerDeclaration> + 'a {
        self.timers.iter().filter(move |t| t.activity_id == activity_id)
    }

    pub(crate) fn insert_error_definition(&mut self, definition: ErrorEventDefinition) {
        self.error_event_definitions.push(definition);
        // stable: equal precedence keeps declaration order
        self.error_event_definitions
            .sort_by_key(|d| std::cmp::Reverse(d.precedence()));
    }

    pub(crate) fn insert_escalation_definition(&mut self, definition: EscalationEventDefinition) {
        self.escalation_event_definitions.push(definition);
        self.escalation_event_definitions
            .sort_by_key(|d| std::cmp::Reverse(d.precedence()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_def(handler: &str, code: Option<&str>, base: i32) -> ErrorEventDefinition {
        ErrorEventDefinition {
            handler_activity_id: handler.to_string(),
            error_code: code.map(str::to_string),
            error_code_variable: None,
            error_message_variable: None,
            base_precedence: base,
        }
    }

    /// An explicit code sorts ahead of any catch-all.
    #[test]
    fn t_decl_1_error_precedence_code_beats_catch_all() {
        let mut decls = ScopeDeclarations::default();
        decls.insert_error_definition(error_def(
            "esp_start",
            None,
            ErrorEventDefinition::EVENT_SUBPROCESS_PRECEDENCE,
        ));
        decls.insert_error_definition(error_def("boundary", Some("E1"), 0));
        decls.insert_error_definition(error_def("boundary_all", None, 0));

        let order: Vec<&str> = decls
            .error_event_definitions
            .iter()
            .map(|d| d.handler_activity_id.as_str())
            .collect();
        assert_eq!(order, vec!["boundary", "esp_start", "boundary_all"]);
    }

    /// Timer configuration is the type prefix plus the raw expression.
    #[test]
    fn t_decl_2_timer_raw_configuration() {
        let decl = TimerDeclaration {
            activity_id: "t".to_string(),
            timer: TimerDefinition {
                kind: TimerKind::Cycle,
                expression: "R3/PT10M".to_string(),
            },
            job_handler_type: job_handlers::TIMER_TRANSITION.to_string(),
            job_configuration: "t".to_string(),
            exclusive: true,
            interrupting: false,
            job_priority: None,
            event_scope_id: None,
            listener_id: None,
        };
        assert_eq!(decl.raw_configuration(), "CYCLE: R3/PT10M");
    }

    /// Only `${..}` and `#{..}` count as expressions.
    #[test]
    fn t_decl_3_expression_detection() {
        assert!(is_expression("${priority}"));
        assert!(is_expression("#{x}"));
        assert!(!is_expression("42"));
    }
}
