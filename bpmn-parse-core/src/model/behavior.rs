use super::declarations::{
    ConditionalEventDefinition, ExternalErrorEventDefinition, PriorityProvider, TimerDefinition,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Shared building blocks ───────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptBody {
    Inline(String),
    Resource(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub language: String,
    pub body: ScriptBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Expression(String),
}

/// `camunda:field` injection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    pub value: FieldValue,
}

impl FieldDeclaration {
    pub fn text(&self) -> &str {
        match &self.value {
            FieldValue::String(s) | FieldValue::Expression(s) => s,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegateImplementation {
    Class(String),
    Expression(String),
    DelegateExpression(String),
    Script(ScriptSource),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerEvent {
    Start,
    End,
    Take,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionListener {
    pub event: ListenerEvent,
    pub implementation: DelegateImplementation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDeclaration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListener {
    /// create, assignment, complete, update, delete or timeout.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub implementation: DelegateImplementation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimerDefinition>,
}

// ─── Input / output mapping ───────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    Null,
    /// Constant or expression text, kept unevaluated.
    Text(String),
    Script(ScriptSource),
    List(Vec<ParameterValue>),
    Map(Vec<(String, ParameterValue)>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoParameter {
    pub name: String,
    pub value: ParameterValue,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoMapping {
    pub inputs: Vec<IoParameter>,
    pub outputs: Vec<IoParameter>,
}

// ─── Forms / user tasks ───────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ref_binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ref_version: Option<String>,
}

impl FormDefinition {
    pub fn is_empty(&self) -> bool {
        self.form_key.is_none() && self.form_ref.is_none()
    }
}

/// Everything the runtime needs to create a human task, keyed by task
/// definition key (the activity id) on the process graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_user_expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_group_expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_date_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_expression: Option<String>,
    #[serde(default, skip_serializing_if = "FormDefinition::is_empty")]
    pub form: FormDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_listeners: Vec<TaskListener>,
}

// ─── Service-task-like implementations ────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTaskDefinition {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<PriorityProvider>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_event_definitions: Vec<ExternalErrorEventDefinition>,
}

/// How a service task, send task, rule task or message throw does its work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceImplementation {
    Class {
        class_name: String,
        fields: Vec<FieldDeclaration>,
    },
    DelegateExpression {
        expression: String,
        fields: Vec<FieldDeclaration>,
    },
    Expression {
        expression: String,
        result_variable: Option<String>,
    },
    External(ExternalTaskDefinition),
    Mail {
        fields: Vec<FieldDeclaration>,
    },
    Shell {
        fields: Vec<FieldDeclaration>,
    },
    Connector {
        connector_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionResultMapper {
    SingleEntry,
    SingleResult,
    CollectEntries,
    ResultList,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallableBinding {
    Latest,
    Deployment,
    Version(String),
    VersionTag(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTaskDefinition {
    pub decision_ref: String,
    pub binding: CallableBinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_variable: Option<String>,
    pub result_mapper: DecisionResultMapper,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalledElement {
    Process(String),
    Case(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSource {
    AllVariables,
    Variable(String),
    Expression(String),
    Null,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableParameter {
    pub source: ParameterSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub local: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallActivityDefinition {
    pub called_element: CalledElement,
    pub binding: CallableBinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<CallableParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<CallableParameter>,
    /// `camunda:variableMappingClass` or `camunda:variableMappingDelegateExpression`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_mapping: Option<DelegateImplementation>,
}

// ─── Multi-instance ───────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopCollection {
    Expression(String),
    Variable(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiInstanceLoop {
    pub sequential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_cardinality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<LoopCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_variable: Option<String>,
}

// ─── Events ───────────────────────────────────────────────────

/// What a catching event (start, intermediate, boundary) waits for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger")]
pub enum EventTrigger {
    None,
    Timer(TimerDefinition),
    Message { message_name: Option<String> },
    Signal { signal_name: Option<String> },
    Conditional(ConditionalEventDefinition),
    Error { error_code: Option<String> },
    Escalation { escalation_code: Option<String> },
    Compensation,
    Cancel,
    Link { link_name: String },
}

/// What a throwing event (intermediate throw, end) produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "throws")]
pub enum EventThrow {
    None,
    /// Service-task-like message throw; `None` behaves as a none event.
    Message {
        implementation: Option<ServiceImplementation>,
    },
    Signal {
        signal_name: Option<String>,
        is_async: bool,
    },
    Compensation {
        activity_ref: Option<String>,
        wait_for_completion: bool,
    },
    Escalation {
        escalation_code: Option<String>,
    },
    Error {
        error_code: Option<String>,
        error_message: Option<String>,
    },
    /// `boundary_event_id` is filled once the transaction's cancel boundary is built.
    Cancel {
        boundary_event_id: Option<String>,
    },
    Terminate,
}

// ─── Activity behaviors ───────────────────────────────────────

/// Closed set of runtime behaviors. One variant per construct; all
/// configuration lives in typed fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "behavior")]
pub enum ActivityBehavior {
    /// Start event of a process or embedded subprocess.
    StartEvent { trigger: EventTrigger },
    EventSubProcessStartEvent { trigger: EventTrigger, interrupting: bool },
    IntermediateCatchEvent { trigger: EventTrigger },
    IntermediateThrowEvent { throws: EventThrow },
    EndEvent { throws: EventThrow },
    BoundaryEvent { trigger: EventTrigger, cancel_activity: bool },

    ExclusiveGateway,
    InclusiveGateway,
    ParallelGateway,
    EventBasedGateway,

    Task,
    ManualTask,
    UserTask { task_definition_key: String },
    ScriptTask {
        script: ScriptSource,
        result_variable: Option<String>,
    },
    ServiceTask { implementation: ServiceImplementation },
    DecisionTask(DecisionTaskDefinition),
    ReceiveTask { message_name: Option<String> },

    SubProcess,
    EventSubProcess,
    Transaction,
    CallActivity(CallActivityDefinition),

    MultiInstanceBody(MultiInstanceLoop),

    /// Placeholder while a node is being built; never survives a successful compile.
    Unresolved,
}

impl ActivityBehavior {
    pub fn is_multi_instance_body(&self) -> bool {
        matches!(self, ActivityBehavior::MultiInstanceBody(_))
    }

    pub fn is_event_based_gateway(&self) -> bool {
        matches!(self, ActivityBehavior::EventBasedGateway)
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, ActivityBehavior::Transaction)
    }

    pub fn is_sub_process(&self) -> bool {
        matches!(
            self,
            ActivityBehavior::SubProcess
                | ActivityBehavior::EventSubProcess
                | ActivityBehavior::Transaction
        )
    }

    /// Short tag used in summaries and deterministic output.
    pub fn tag(&self) -> &'static str {
        match self {
            ActivityBehavior::StartEvent { .. } => "start-event",
            ActivityBehavior::EventSubProcessStartEvent { .. } => "event-subprocess-start-event",
            ActivityBehavior::IntermediateCatchEvent { .. } => "intermediate-catch-event",
            ActivityBehavior::IntermediateThrowEvent { .. } => "intermediate-throw-event",
            ActivityBehavior::EndEvent { .. } => "end-event",
            ActivityBehavior::BoundaryEvent { .. } => "boundary-event",
            ActivityBehavior::ExclusiveGateway => "exclusive-gateway",
            ActivityBehavior::InclusiveGateway => "inclusive-gateway",
            ActivityBehavior::ParallelGateway => "parallel-gateway",
            ActivityBehavior::EventBasedGateway => "event-based-gateway",
            ActivityBehavior::Task => "task",
            ActivityBehavior::ManualTask => "manual-task",
            ActivityBehavior::UserTask { .. } => "user-task",
            ActivityBehavior::ScriptTask { .. } => "script-task",
            ActivityBehavior::ServiceTask { .. } => "service-task",
            ActivityBehavior::DecisionTask(_) => "decision-task",
            ActivityBehavior::ReceiveTask { .. } => "receive-task",
            ActivityBehavior::SubProcess => "subprocess",
            ActivityBehavior::EventSubProcess => "event-subprocess",
            ActivityBehavior::Transaction => "transaction",
            ActivityBehavior::CallActivity(_) => "call-activity",
            ActivityBehavior::MultiInstanceBody(mi) if mi.sequential => "sequential-multi-instance",
            ActivityBehavior::MultiInstanceBody(_) => "parallel-multi-instance",
            ActivityBehavior::Unresolved => "unresolved",
        }
    }
}
