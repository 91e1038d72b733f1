use crate::context::{DocumentContext, ProcessContext};
use crate::model::{
    ActivityId, AsyncPosition, EventSubscriptionJobDeclaration, EventType,
    JobDeclaration, MessageJobDeclaration, ScopeRef, TimerDeclaration, TimerDefinition, TimerKind,
};
use crate::xml::XmlElement;

// ─── Async continuations ──────────────────────────────────────

struct AsyncFlags {
    before: bool,
    after: bool,
    exclusive: bool,
}

fn async_flags(el: &XmlElement, default_exclusive: bool) -> AsyncFlags {
    let is_true = |name: &str| el.engine_attr(name) == Some("true");
    AsyncFlags {
        before: is_true("async") || is_true("asyncBefore"),
        after: is_true("asyncAfter"),
        exclusive: el
            .engine_attr("exclusive")
            .map_or(default_exclusive, |v| v == "true"),
    }
}

/// Apply `camunda:asyncBefore`/`asyncAfter`. For the inner activity of a
/// multi-instance body the element's flags go to the body and the loop
/// characteristics' flags go to the inner activity.
pub(super) fn parse_async_for_activity(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let body = pcx.graph.multi_instance_body_of(activity);
    match body {
        Some(body) if !pcx.graph.activity(activity).is_for_compensation => {
            parse_async(el, body, doc, pcx);
            if let Some(loop_el) = el.child("multiInstanceLoopCharacteristics") {
                parse_async(loop_el, activity, doc, pcx);
            }
        }
        _ => parse_async(el, activity, doc, pcx),
    }
}

/// Apply the element's own flags to `activity`, no multi-instance redirection.
pub(super) fn parse_async(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let flags = async_flags(el, doc.config.default_exclusive);
    set_async(activity, flags, doc, pcx);
}

fn set_async(
    activity: ActivityId,
    flags: AsyncFlags,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    {
        let node = pcx.graph.activity_mut(activity);
        node.async_before = flags.before;
        node.async_after = flags.after;
        node.exclusive = flags.exclusive;
    }
    for (position, enabled) in [
        (AsyncPosition::Before, flags.before),
        (AsyncPosition::After, flags.after),
    ] {
        if enabled {
            add_message_job(activity, position, flags.exclusive, doc, pcx);
        } else {
            remove_message_job(activity, position, doc, pcx);
        }
    }
}

fn add_message_job(
    activity: ActivityId,
    position: AsyncPosition,
    exclusive: bool,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let key = pcx.graph.key.clone();
    let node = pcx.graph.activity_mut(activity);
    if doc.has_message_job(&key, &node.id, position) {
        return;
    }
    let job = JobDeclaration::Message(MessageJobDeclaration {
        activity_id: node.id.clone(),
        position,
        exclusive,
        job_priority: node.job_priority.clone(),
    });
    node.job_declarations.push(job.clone());
    doc.index_job(&key, job);
}

fn remove_message_job(
    activity: ActivityId,
    position: AsyncPosition,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let key = pcx.graph.key.clone();
    let node = pcx.graph.activity_mut(activity);
    node.job_declarations.retain(
        |job| !matches!(job, JobDeclaration::Message(m) if m.position == position),
    );
    doc.remove_message_job(&key, &node.id, position);
}

// ─── Timers ───────────────────────────────────────────────────

/// Where a parsed timer is registered and which handler fires it.
pub(super) struct TimerTarget<'a> {
    pub handler: &'a str,
    /// Handler configuration; the activity id when `None`.
    pub configuration: Option<String>,
    pub event_scope: ScopeRef,
    pub interrupting: bool,
    pub listener_id: Option<String>,
}

/// First of `timeDate`, `timeCycle`, `timeDuration` with its trimmed text.
pub(super) fn parse_timer_definition(
    timer_el: &XmlElement,
    doc: &mut DocumentContext<'_>,
    activity_id: &str,
) -> Option<TimerDefinition> {
    let found = [TimerKind::Date, TimerKind::Cycle, TimerKind::Duration]
        .into_iter()
        .find_map(|kind| {
            timer_el.child(kind.element_name()).map(|c| TimerDefinition {
                kind,
                expression: c.text().to_string(),
            })
        });
    if found.is_none() {
        doc.error_with(
            "Timer needs configuration (either timeDate, timeCycle or timeDuration is needed).",
            timer_el,
            &[activity_id],
        );
    }
    found
}

/// Build a timer declaration for `activity`, index it and register it on the
/// target's event scope (replacing an earlier one for the same activity).
pub(super) fn add_timer(
    timer_el: &XmlElement,
    activity: ActivityId,
    target: TimerTarget<'_>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> Option<TimerDefinition> {
    let activity_id = pcx.graph.activity(activity).id.clone();
    let timer = parse_timer_definition(timer_el, doc, &activity_id)?;
    let declaration = TimerDeclaration {
        activity_id: activity_id.clone(),
        timer: timer.clone(),
        job_handler_type: target.handler.to_string(),
        job_configuration: target.configuration.unwrap_or_else(|| activity_id.clone()),
        exclusive: timer_el
            .engine_attr("exclusive")
            .map_or(doc.config.default_exclusive, |v| v == "true"),
        interrupting: target.interrupting,
        job_priority: pcx.graph.activity(activity).job_priority.clone(),
        event_scope_id: pcx.graph.scope_id(target.event_scope).map(str::to_string),
        listener_id: target.listener_id,
    };
    doc.index_job(&pcx.graph.key, JobDeclaration::Timer(declaration.clone()));

    let timers = &mut pcx.graph.declarations_of_mut(target.event_scope).timers;
    let same = |t: &TimerDeclaration| {
        t.activity_id == declaration.activity_id && t.listener_id == declaration.listener_id
    };
    match timers.iter_mut().find(|t| same(t)) {
        Some(existing) => *existing = declaration,
        None => timers.push(declaration),
    }
    Some(timer)
}

// ─── Event subscription jobs ──────────────────────────────────

/// Job that delivers a signal to `activity` asynchronously.
pub(super) fn add_event_subscription_job(
    definition_el: &XmlElement,
    activity: ActivityId,
    event_type: EventType,
    event_name: Option<String>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let key = pcx.graph.key.clone();
    let node = pcx.graph.activity_mut(activity);
    let duplicate = node.job_declarations.iter().any(|job| {
        matches!(job, JobDeclaration::EventSubscription(j) if j.event_type == event_type)
    });
    if duplicate {
        let id = node.id.clone();
        doc.error_with(
            format!("Activity contains already job declaration with type {event_type}"),
            definition_el,
            &[&id],
        );
        return;
    }
    let job = JobDeclaration::EventSubscription(EventSubscriptionJobDeclaration {
        activity_id: node.id.clone(),
        event_type,
        event_name,
        exclusive: node.exclusive,
        job_priority: node.job_priority.clone(),
    });
    node.job_declarations.push(job.clone());
    doc.index_job(&key, job);
}


#[cfg(test)]
mod tests {
    use super::super::testing::{compile, graph, messages, node, process, semantic_errors};
    use crate::model::{
        AsyncPosition, EventSubscriptionJobDeclaration, EventType, JobDeclaration, MessageJobDeclaration,
        PriorityProvider,
    };

    /// The element's async flags go to the multi-instance body, the loop
    /// characteristics' flags to the inner activity.
    #[test]
    fn t_jobs_1_multi_instance_async_split() {
        let output = compile(&process(
            r#"<startEvent id="s"/>
            <userTask id="review" camunda:asyncBefore="true" camunda:jobPriority="5">
              <multiInstanceLoopCharacteristics camunda:asyncAfter="true">
                <loopCardinality>3</loopCardinality>
              </multiInstanceLoopCharacteristics>
            </userTask>"#,
        ));
        let g = graph(&output);

        let body = node(g, "review#multiInstanceBody");
        assert!(body.async_before);
        assert!(!body.async_after);
        let body_job = JobDeclaration::Message(MessageJobDeclaration {
            activity_id: "review#multiInstanceBody".into(),
            position: AsyncPosition::Before,
            exclusive: true,
            job_priority: None,
        });
        assert_eq!(body.job_declarations, vec![body_job.clone()]);

        let inner = node(g, "review");
        assert!(!inner.async_before);
        assert!(inner.async_after);
        let inner_job = JobDeclaration::Message(MessageJobDeclaration {
            activity_id: "review".into(),
            position: AsyncPosition::After,
            exclusive: true,
            job_priority: Some(PriorityProvider::Constant(5)),
        });
        assert_eq!(inner.job_declarations, vec![inner_job.clone()]);

        assert_eq!(output.job_declarations["p"], vec![body_job, inner_job]);
    }

    /// A jobPriority that is neither a number nor an expression is rejected.
    #[test]
    fn t_jobs_2_job_priority_not_a_number() {
        let report = semantic_errors(&process(
            r#"<startEvent id="s"/>
            <userTask id="t" camunda:jobPriority="high"/>"#,
        ));
        assert_eq!(
            messages(&report.errors),
            vec!["Value 'high' for attribute 'jobPriority' is not a valid number"]
        );
        assert!(report.errors[0].mentions("t"));
    }

    /// Process priorities may be expressions.
    #[test]
    fn t_jobs_3_process_priority_expression() {
        let output = compile(
            r#"<process id="p" isExecutable="true" camunda:jobPriority="${priority}" camunda:taskPriority="7">
                 <startEvent id="s"/>
               </process>"#,
        );
        let g = graph(&output);
        assert_eq!(g.job_priority, Some(PriorityProvider::Expression("${priority}".into())));
        assert_eq!(g.task_priority, Some(PriorityProvider::Constant(7)));
    }

    /// A signal catch carries an event subscription job with its own priority.
    #[test]
    fn t_jobs_4_signal_catch_subscription_job() {
        let output = compile(&format!(
            r#"<signal id="sig" name="alert"/>{}"#,
            process(
                r#"<startEvent id="s"/>
                <intermediateCatchEvent id="wait" camunda:jobPriority="${p}">
                  <signalEventDefinition signalRef="sig"/>
                </intermediateCatchEvent>
                <sequenceFlow id="f1" sourceRef="s" targetRef="wait"/>"#
            )
        ));
        assert_eq!(
            node(graph(&output), "wait").job_declarations,
            vec![JobDeclaration::EventSubscription(EventSubscriptionJobDeclaration {
                activity_id: "wait".into(),
                event_type: EventType::Signal,
                event_name: Some("alert".into()),
                exclusive: true,
                job_priority: Some(PriorityProvider::Expression("${p}".into())),
            })]
        );
    }
}
