//! Multi-instance lowering: an activity with loop characteristics is built
//! inside a synthesized `<id>#multiInstanceBody` scope.

use super::parse_boolean;
use crate::context::{DocumentContext, ProcessContext};
use crate::error::BuildResult;
use crate::hooks::HookEvent;
use crate::model::activity_types::{multi_instance_body_id, MULTI_INSTANCE_BODY};
use crate::model::{ActivityBehavior, ActivityId, ActivityNode, LoopCollection, MultiInstanceLoop, ScopeRef};
use crate::xml::XmlElement;

/// Create the body for `el` under `scope`. The inner activity is built by the
/// caller with the body as its flow scope.
pub(super) fn parse_multi_instance_body(
    el: &XmlElement,
    loop_el: &XmlElement,
    scope: ScopeRef,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) -> BuildResult<ActivityId> {
    let body_id = multi_instance_body_id(el.id().unwrap_or_default());
    tracing::debug!(activity = %body_id, "synthesizing multi-instance body");

    let definition = parse_loop_characteristics(loop_el, &body_id, doc);

    let mut node = ActivityNode::new(body_id, MULTI_INSTANCE_BODY, scope);
    node.line = Some(loop_el.line);
    node.is_scope = true;
    node.exclusive = doc.config.default_exclusive;
    node.behavior = ActivityBehavior::MultiInstanceBody(definition);
    let body = pcx.graph.add_activity(node);

    doc.fire(HookEvent::MultiInstance {
        element: el,
        graph: &mut pcx.graph,
        body,
    })?;
    Ok(body)
}

fn parse_loop_characteristics(
    loop_el: &XmlElement,
    body_id: &str,
    doc: &mut DocumentContext<'_>,
) -> MultiInstanceLoop {
    let mut definition = MultiInstanceLoop {
        sequential: loop_el
            .attr("isSequential")
            .and_then(parse_boolean)
            .unwrap_or(false),
        ..MultiInstanceLoop::default()
    };

    let cardinality_el = loop_el.child("loopCardinality");
    if let Some(cardinality) = cardinality_el {
        if cardinality.text().is_empty() {
            doc.error_with(
                "loopCardinality must be defined for a multiInstanceLoopCharacteristics definition ",
                loop_el,
                &[body_id],
            );
        }
        definition.loop_cardinality = Some(cardinality.text().to_string());
    }

    definition.completion_condition = loop_el
        .child_text("completionCondition")
        .map(str::to_string);

    definition.collection = loop_el.engine_attr("collection").map(loop_collection);
    // loopDataInputRef overrides camunda:collection, even when empty
    if let Some(input_ref) = loop_el.child("loopDataInputRef") {
        definition.collection = Some(loop_collection(input_ref.text()));
    }

    let element_variable = loop_el.engine_attr("elementVariable");
    definition.element_variable = element_variable.map(str::to_string);
    if let Some(item) = loop_el.child("inputDataItem") {
        definition.element_variable = item.attr("name").map(str::to_string);
    }

    if cardinality_el.is_none() && definition.collection.is_none() {
        doc.error_with(
            "Either loopCardinality or loopDataInputRef/camunda:collection must been set",
            loop_el,
            &[body_id],
        );
    }
    if definition.collection.is_none() && definition.element_variable.is_some() {
        doc.error_with(
            "LoopDataInputRef/camunda:collection must be set when using inputDataItem or camunda:elementVariable",
            loop_el,
            &[body_id],
        );
    }
    definition
}

/// Text with a brace is an expression, anything else names a variable.
fn loop_collection(text: &str) -> LoopCollection {
    if text.contains('{') {
        LoopCollection::Expression(text.to_string())
    } else {
        LoopCollection::Variable(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::hooks::ParseHooks;
    use crate::xml::{parse_document, ENGINE_NS};

    fn element(xml: &str) -> XmlElement {
        parse_document(xml, &[ENGINE_NS.to_string()]).unwrap()
    }

    /// A collection expression and an element variable make a valid loop.
    #[test]
    fn t_multi_1_collection_and_element_variable() {
        let config = CompilerConfig::default();
        let mut hooks = ParseHooks::new();
        let root = element("<definitions/>");
        let mut doc = DocumentContext::new("t.bpmn", &config, &root, &mut hooks);
        let loop_el = element(
            r#"<multiInstanceLoopCharacteristics xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
                 isSequential="true" camunda:collection="${users}" camunda:elementVariable="user"/>"#,
        );
        let definition = parse_loop_characteristics(&loop_el, "a#multiInstanceBody", &mut doc);
        assert!(definition.sequential);
        assert_eq!(definition.collection, Some(LoopCollection::Expression("${users}".into())));
        assert_eq!(definition.element_variable.as_deref(), Some("user"));
        assert!(!doc.diagnostics.has_errors());
    }

    /// An element variable with no collection and no cardinality gives two errors.
    #[test]
    fn t_multi_2_element_variable_needs_collection() {
        let config = CompilerConfig::default();
        let mut hooks = ParseHooks::new();
        let root = element("<definitions/>");
        let mut doc = DocumentContext::new("t.bpmn", &config, &root, &mut hooks);
        let loop_el = element(
            r#"<multiInstanceLoopCharacteristics xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
                 camunda:elementVariable="user"/>"#,
        );
        parse_loop_characteristics(&loop_el, "a#multiInstanceBody", &mut doc);
        assert_eq!(doc.diagnostics.errors().count(), 2);
        assert!(doc
            .diagnostics
            .errors()
            .all(|d| d.element_ids == vec!["a#multiInstanceBody".to_string()]));
    }

    /// `loopDataInputRef` replaces `camunda:collection`, and an empty one still counts.
    #[test]
    fn t_multi_3_loop_data_input_ref_overrides_collection() {
        let config = CompilerConfig::default();
        let mut hooks = ParseHooks::new();
        let root = element("<definitions/>");
        let mut doc = DocumentContext::new("t.bpmn", &config, &root, &mut hooks);
        let loop_el = element(
            r#"<multiInstanceLoopCharacteristics xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
                 camunda:collection="${users}">
                 <loopDataInputRef>assignees</loopDataInputRef>
               </multiInstanceLoopCharacteristics>"#,
        );
        let definition = parse_loop_characteristics(&loop_el, "a#multiInstanceBody", &mut doc);
        assert_eq!(definition.collection, Some(LoopCollection::Variable("assignees".into())));

        let empty_ref = element(
            r#"<multiInstanceLoopCharacteristics xmlns:camunda="http://camunda.org/schema/1.0/bpmn"
                 camunda:collection="${users}"><loopDataInputRef/></multiInstanceLoopCharacteristics>"#,
        );
        let definition = parse_loop_characteristics(&empty_ref, "b#multiInstanceBody", &mut doc);
        assert_eq!(definition.collection, Some(LoopCollection::Variable(String::new())));
        assert!(!doc.diagnostics.has_errors());
    }
}
