use super::listeners::parse_engine_script;
use crate::context::{DocumentContext, ProcessContext};
use crate::model::{ActivityId, IoMapping, IoParameter, ParameterValue};
use crate::xml::XmlElement;

// ─── Parameters ───────────────────────────────────────────────

fn parse_io_mapping(
    io_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<IoMapping> {
    let mut mapping = IoMapping::default();
    let mut valid = true;
    for (tag, target) in [
        ("inputParameter", &mut mapping.inputs),
        ("outputParameter", &mut mapping.outputs),
    ] {
        for param_el in io_el.engine_children(tag) {
            let Some(name) = param_el.non_empty_attr("name") else {
                doc.error_with(
                    format!("Missing attribute 'name' for {tag}"),
                    param_el,
                    &[activity_id],
                );
                valid = false;
                continue;
            };
            match parse_parameter_value(param_el, activity_id, doc) {
                Some(value) => target.push(IoParameter {
                    name: name.to_string(),
                    value,
                }),
                None => valid = false,
            }
        }
    }
    valid.then_some(mapping)
}

/// A nested `camunda:list`, `camunda:map` or `camunda:script`, else the text.
fn parse_parameter_value(
    el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<ParameterValue> {
    let nested = el
        .children
        .iter()
        .find(|c| c.is_engine("list") || c.is_engine("map") || c.is_engine("script"));
    match nested {
        Some(child) => parse_nested_value(child, activity_id, doc),
        None if el.text().is_empty() => Some(ParameterValue::Null),
        None => Some(ParameterValue::Text(el.text().to_string())),
    }
}

fn parse_nested_value(
    el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> Option<ParameterValue> {
    match el.name.as_str() {
        "list" => {
            let mut items = Vec::new();
            for item in el.children.iter().filter(|c| c.namespace.is_some()) {
                let value = if item.is_engine("value") {
                    parse_parameter_value(item, activity_id, doc)?
                } else {
                    parse_nested_value(item, activity_id, doc)?
                };
                items.push(value);
            }
            Some(ParameterValue::List(items))
        }
        "map" => {
            let mut entries = Vec::new();
            for entry in el.engine_children("entry") {
                let Some(key) = entry.attr("key") else {
                    doc.error_with("Missing attribute 'key' for 'entry' element", entry, &[activity_id]);
                    return None;
                };
                entries.push((key.to_string(), parse_parameter_value(entry, activity_id, doc)?));
            }
            Some(ParameterValue::Map(entries))
        }
        "script" => parse_engine_script(el, activity_id, doc).map(ParameterValue::Script),
        _ => Some(ParameterValue::Text(el.text().to_string())),
    }
}

// ─── Activity mapping ─────────────────────────────────────────

/// `camunda:inputOutput` of an activity. A mapped activity becomes a scope
/// unless it is the inner activity of a multi-instance body.
pub(super) fn parse_activity_io(
    el: &XmlElement,
    activity: ActivityId,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'_>,
) {
    let Some(io_el) = el.extension("inputOutput") else {
        return;
    };
    let activity_id = pcx.graph.activity(activity).id.clone();
    let Some(mapping) = parse_io_mapping(io_el, &activity_id, doc) else {
        return;
    };
    let multi_instance = pcx.graph.multi_instance_body_of(activity).is_some();
    if !io_supported(el, &mapping, multi_instance, doc) {
        return;
    }
    let node = pcx.graph.activity_mut(activity);
    node.io_mapping = Some(mapping);
    if !multi_instance {
        node.is_scope = true;
    }
}

fn io_supported(
    el: &XmlElement,
    mapping: &IoMapping,
    multi_instance: bool,
    doc: &mut DocumentContext<'_>,
) -> bool {
    let tag = el.name.as_str();
    let supported_tag = tag.to_lowercase().contains("task")
        || tag.contains("Event")
        || matches!(tag, "transaction" | "subProcess" | "callActivity");
    if !supported_tag {
        doc.error(format!("camunda:inputOutput mapping unsupported for element type '{tag}'."), el);
        return false;
    }
    if tag == "subProcess" && el.attr("triggeredByEvent") == Some("true") {
        doc.error(
            format!(
                "camunda:inputOutput mapping unsupported for element type '{tag}' with attribute 'triggeredByEvent = true'."
            ),
            el,
        );
        return false;
    }
    if mapping.outputs.is_empty() {
        return true;
    }
    if tag == "endEvent" {
        // reported, mapping kept
        doc.error(format!("camunda:outputParameter not allowed for element type '{tag}'."), el);
        true
    } else if multi_instance {
        doc.error("camunda:outputParameter not allowed for multi-instance constructs", el);
        false
    } else {
        true
    }
}

/// Start and boundary events take no mapping.
pub(super) fn ensure_no_io_mapping(el: &XmlElement, doc: &mut DocumentContext<'_>) {
    if el.extension("inputOutput").is_some() {
        doc.error(
            format!("camunda:inputOutput mapping unsupported for element type '{}'.", el.name),
            el,
        );
    }
}
