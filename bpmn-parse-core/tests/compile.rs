//! Whole-document compiles: graph shape, determinism and the structural rules
//! that span several passes.

use bpmn_parse_core::model::{ActivityBehavior, EventTrigger, ScopeRef};
use bpmn_parse_core::{compile_str, BpmnCompiler, CompileError, CompileOutput, CompilerConfig, DiagnosticReport};
use pretty_assertions::assert_eq;

fn definitions(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL"
    xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
    targetNamespace="urn:test">
{body}
</definitions>"#
    )
}

fn compile(body: &str) -> CompileOutput {
    match compile_str("test.bpmn", &definitions(body)) {
        Ok(output) => output,
        Err(err) => panic!("compile failed: {err}"),
    }
}

fn semantic_errors(body: &str) -> DiagnosticReport {
    match compile_str("test.bpmn", &definitions(body)) {
        Err(CompileError::Semantic(report)) => report,
        Err(other) => panic!("expected semantic errors, got {other}"),
        Ok(_) => panic!("expected semantic errors, compile succeeded"),
    }
}

const LINEAR: &str = r#"
<process id="linear" isExecutable="true">
  <startEvent id="start"/>
  <userTask id="approve" name="Approve"/>
  <endEvent id="end"/>
  <sequenceFlow id="f1" sourceRef="start" targetRef="approve"/>
  <sequenceFlow id="f2" sourceRef="approve" targetRef="end"/>
</process>"#;

// ─── Document level ───────────────────────────────────────────

/// One graph per executable process; non-executable processes are skipped.
#[test]
fn t_compile_1_graph_per_executable_process() {
    let output = compile(&format!(
        r#"{LINEAR}
        <process id="implicit">
          <startEvent id="s2"/>
        </process>
        <process id="draft" isExecutable="false">
          <startEvent id="s3"/>
        </process>"#
    ));
    let keys: Vec<_> = output.processes.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["linear", "implicit"]);
}

/// A process without isExecutable is skipped when the config says so.
#[test]
fn t_compile_2_missing_executable_flag_respects_config() {
    let config = CompilerConfig {
        missing_executable_is_executable: false,
        ..CompilerConfig::default()
    };
    let xml = definitions(r#"<process id="implicit"><startEvent id="s"/></process>"#);
    let output = BpmnCompiler::new(config).compile("t.bpmn", &xml).unwrap();
    assert!(output.processes.is_empty());
}

/// Two fresh compiles of the same document give identical graphs.
#[test]
fn t_compile_3_idempotent() {
    let first = compile(LINEAR);
    let second = compile(LINEAR);
    assert_eq!(
        first.processes[0].deterministic_json(),
        second.processes[0].deterministic_json()
    );
    assert_eq!(first.processes[0].fingerprint(), second.processes[0].fingerprint());
}

/// The linear process wires start, task and end in order.
#[test]
fn t_compile_4_linear_process_shape() {
    let output = compile(LINEAR);
    let graph = output.process("linear").unwrap();
    assert_eq!(graph.initial_activity().map(|a| a.id.as_str()), Some("start"));
    let approve = graph.activity_by_id("approve").unwrap();
    assert!(matches!(approve.behavior, ActivityBehavior::UserTask { .. }));
    assert_eq!(approve.incoming.len(), 1);
    assert_eq!(approve.outgoing.len(), 1);
    let f2 = graph.find_transition("f2").unwrap();
    assert_eq!(graph.activity(f2.destination).id, "end");
    assert!(graph.task_definitions.contains_key("approve"));
}

/// Every semantic error of the document is reported at once.
#[test]
fn t_compile_5_errors_accumulate() {
    let report = semantic_errors(
        r#"<process id="p" isExecutable="true">
          <startEvent id="start"/>
          <sequenceFlow id="f1" sourceRef="start" targetRef="nowhere"/>
          <sequenceFlow id="f2" sourceRef="ghost" targetRef="start"/>
        </process>"#,
    );
    let messages: Vec<_> = report.errors.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Invalid destination 'nowhere' of sequence flow 'f1'",
            "Invalid source 'ghost' of sequence flow 'f2'",
        ]
    );
}

/// A failing hook aborts with an unexpected error.
#[test]
fn t_compile_6_failing_hook_aborts() {
    let err = BpmnCompiler::new(CompilerConfig::default())
        .with_hook("reject-users", |event| match event {
            bpmn_parse_core::HookEvent::Activity { kind: "userTask", .. } => {
                anyhow::bail!("user tasks are not allowed")
            }
            _ => Ok(()),
        })
        .compile("t.bpmn", &definitions(LINEAR))
        .unwrap_err();
    match err {
        CompileError::Unexpected { context, .. } => assert!(context.contains("reject-users"), "{context}"),
        other => panic!("unexpected {other}"),
    }
}

// ─── Subscriptions ────────────────────────────────────────────

/// Two message start events for one message conflict on the process scope.
#[test]
fn t_compile_7_duplicate_message_start() {
    let report = semantic_errors(
        r#"<message id="m1" name="order"/>
        <process id="p" isExecutable="true">
          <startEvent id="a"><messageEventDefinition messageRef="m1"/></startEvent>
          <startEvent id="b"><messageEventDefinition messageRef="m1"/></startEvent>
        </process>"#,
    );
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(
        error.message,
        "Cannot have more than one message event subscription with name 'order' for scope 'p'"
    );
    assert!(error.mentions("a") && error.mentions("b"));
}

// ─── Exclusive gateways ───────────────────────────────────────

fn gateway_process(flows: &str) -> String {
    format!(
        r#"<process id="p" isExecutable="true">
          <startEvent id="start"/>
          <exclusiveGateway id="g"/>
          <endEvent id="e1"/>
          <endEvent id="e2"/>
          <sequenceFlow id="f0" sourceRef="start" targetRef="g"/>
          {flows}
        </process>"#
    )
}

/// A single unconditioned flow next to a conditioned one is only a warning.
#[test]
fn t_compile_8_gateway_single_unconditioned_flow_warns() {
    let output = compile(&gateway_process(
        r#"<sequenceFlow id="yes" sourceRef="g" targetRef="e1">
             <conditionExpression>${ok}</conditionExpression>
           </sequenceFlow>
           <sequenceFlow id="other" sourceRef="g" targetRef="e2"/>"#,
    ));
    assert_eq!(output.warnings.len(), 1);
    assert!(output.warnings[0].mentions("other"));
}

/// Two unconditioned flows without a default are errors.
#[test]
fn t_compile_9_gateway_two_unconditioned_flows_fail() {
    let report = semantic_errors(&gateway_process(
        r#"<sequenceFlow id="a" sourceRef="g" targetRef="e1"/>
           <sequenceFlow id="b" sourceRef="g" targetRef="e2"/>"#,
    ));
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().all(|d| d.mentions("g")));
}

// ─── Multi-instance ───────────────────────────────────────────

const MULTI_INSTANCE: &str = r#"
<process id="p" isExecutable="true">
  <startEvent id="start"/>
  <userTask id="review">
    <multiInstanceLoopCharacteristics isSequential="true">
      <loopCardinality>3</loopCardinality>
    </multiInstanceLoopCharacteristics>
  </userTask>
  <boundaryEvent id="remind" attachedToRef="review" cancelActivity="false">
    <timerEventDefinition><timeDuration>PT1H</timeDuration></timerEventDefinition>
  </boundaryEvent>
  <endEvent id="end"/>
  <endEvent id="reminded"/>
  <sequenceFlow id="f1" sourceRef="start" targetRef="review"/>
  <sequenceFlow id="f2" sourceRef="review" targetRef="end"/>
  <sequenceFlow id="f3" sourceRef="remind" targetRef="reminded"/>
</process>"#;

/// The inner activity sits in a body named after it; flows attach to the body.
#[test]
fn t_compile_10_multi_instance_body() {
    let output = compile(MULTI_INSTANCE);
    let graph = &output.processes[0];
    let body_id = graph.find_activity("review#multiInstanceBody").unwrap();
    let inner_id = graph.find_activity("review").unwrap();

    let body = graph.activity(body_id);
    assert_eq!(body.activity_type, "multiInstanceBody");
    assert_eq!(body.children, vec![inner_id]);
    assert!(graph.activity(inner_id).is_multi_instance);
    assert_eq!(graph.activity(inner_id).flow_scope, ScopeRef::Activity(body_id));

    let f1 = graph.find_transition("f1").unwrap();
    let f2 = graph.find_transition("f2").unwrap();
    assert_eq!(f1.destination, body_id);
    assert_eq!(f2.source, body_id);
}

/// A boundary timer on a multi-instance activity is registered on the body.
#[test]
fn t_compile_11_boundary_timer_on_multi_instance_body() {
    let output = compile(MULTI_INSTANCE);
    let graph = &output.processes[0];
    let body_id = graph.find_activity("review#multiInstanceBody").unwrap();
    let remind = graph.activity_by_id("remind").unwrap();
    assert_eq!(remind.event_scope, Some(ScopeRef::Activity(body_id)));
    assert!(matches!(
        remind.behavior,
        ActivityBehavior::BoundaryEvent {
            trigger: EventTrigger::Timer(_),
            cancel_activity: false,
        }
    ));

    let timers = &graph.activity(body_id).declarations.timers;
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].activity_id, "remind");
    assert_eq!(timers[0].event_scope_id.as_deref(), Some("review#multiInstanceBody"));
    assert!(!timers[0].interrupting);
    assert!(graph.activity_by_id("review").unwrap().declarations.timers.is_empty());

    let jobs = &output.job_declarations["p"];
    assert_eq!(jobs.iter().filter(|j| j.activity_id() == "remind").count(), 1);
}

// ─── Compensation and escalation ──────────────────────────────

/// A sequence flow into a compensation handler is rejected; the handler is
/// still wired to its host.
#[test]
fn t_compile_12_flow_into_compensation_handler() {
    let body = r#"<process id="p" isExecutable="true">
      <startEvent id="start"/>
      <task id="book"/>
      <boundaryEvent id="comp" attachedToRef="book"><compensateEventDefinition/></boundaryEvent>
      <task id="undo" isForCompensation="true"/>
      <endEvent id="end"/>
      <sequenceFlow id="f1" sourceRef="start" targetRef="book"/>
      <sequenceFlow id="f2" sourceRef="book" targetRef="end"/>
      <sequenceFlow id="bad" sourceRef="book" targetRef="undo"/>
      <association id="link" sourceRef="comp" targetRef="undo"/>
    </process>"#;
    let report = semantic_errors(body);
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert!(
        error.message.starts_with("Invalid incoming sequence flow of compensation activity 'undo'"),
        "{}",
        error.message
    );
    assert!(error.mentions("bad"));

    // the root hook still sees the graphs before the errors reject them
    let result = BpmnCompiler::new(CompilerConfig::default())
        .with_hook("inspect", |event| {
            if let bpmn_parse_core::HookEvent::Root { processes, .. } = event {
                let graph = &processes[0];
                assert!(graph.find_transition("bad").is_none());
                assert_eq!(
                    graph.activity_by_id("book").unwrap().compensation_handler_id.as_deref(),
                    Some("undo")
                );
            }
            Ok(())
        })
        .compile("t.bpmn", &definitions(body));
    assert!(result.is_err());
}

/// A catch-all escalation boundary on a subprocess conflicts with a catch-all
/// escalation event subprocess inside it.
#[test]
fn t_compile_13_escalation_boundary_and_event_subprocess() {
    let report = semantic_errors(
        r#"<process id="p" isExecutable="true">
          <startEvent id="start"/>
          <subProcess id="work">
            <startEvent id="work_start"/>
            <endEvent id="work_end"/>
            <sequenceFlow id="w1" sourceRef="work_start" targetRef="work_end"/>
            <subProcess id="on_escalation" triggeredByEvent="true">
              <startEvent id="esc_start"><escalationEventDefinition/></startEvent>
              <endEvent id="esc_end"/>
              <sequenceFlow id="e1" sourceRef="esc_start" targetRef="esc_end"/>
            </subProcess>
          </subProcess>
          <boundaryEvent id="escalated" attachedToRef="work"><escalationEventDefinition/></boundaryEvent>
          <endEvent id="end"/>
          <endEvent id="end_escalated"/>
          <sequenceFlow id="f1" sourceRef="start" targetRef="work"/>
          <sequenceFlow id="f2" sourceRef="work" targetRef="end"/>
          <sequenceFlow id="f3" sourceRef="escalated" targetRef="end_escalated"/>
        </process>"#,
    );
    assert_eq!(report.errors.len(), 1, "{report}");
    assert_eq!(
        report.errors[0].message,
        "The same scope can not contains an escalation boundary event and an escalation event subprocess \
         without escalation code. Both catch all escalation events."
    );
    assert!(report.errors[0].mentions("escalated"));
    assert!(report.errors[0].mentions("on_escalation"));
}
