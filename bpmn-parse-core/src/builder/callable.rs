//! Call activities and the binding attributes they share with decision tasks.

use super::jobs::parse_async_for_activity;
use super::{create_activity, finish_activity};
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::model::{
    ActivityBehavior, ActivityId, CallActivityDefinition, CallableBinding, CallableParameter,
    CalledElement, DelegateImplementation, ParameterSource,
};
use crate::xml::XmlElement;

// ─── Binding ──────────────────────────────────────────────────

/// `latest` when absent or unknown. The version attribute is required for the
/// `version` binding, the tag attribute for `versionTag`.
pub(super) fn parse_binding(
    el: &XmlElement,
    binding_attr: &str,
    version_attr: &str,
    version_tag_attr: &str,
    doc: &mut DocumentContext<'_>,
) -> CallableBinding {
    let required = |attr: &str, binding: &str, doc: &mut DocumentContext<'_>| {
        let value = el.engine_attr(attr);
        if value.is_none() {
            doc.error(
                format!("Missing attribute '{attr}' when '{binding_attr}' has value '{binding}'"),
                el,
            );
        }
        value.unwrap_or_default().to_string()
    };
    match el.engine_attr(binding_attr) {
        Some("deployment") => CallableBinding::Deployment,
        Some("version") => CallableBinding::Version(required(version_attr, "version", doc)),
        Some("versionTag") => CallableBinding::VersionTag(required(version_tag_attr, "versionTag", doc)),
        _ => CallableBinding::Latest,
    }
}

// ─── Call activity ────────────────────────────────────────────

pub(super) fn build_call_activity<'x>(
    el: &'x XmlElement,
    scope: Scope<'x>,
    doc: &mut DocumentContext<'_>,
    pcx: &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>> {
    let id = create_activity(el, scope.scope, doc, pcx);
    parse_async_for_activity(el, id, doc, pcx);
    let activity_id = pcx.graph.activity(id).id.clone();

    let called_element = el.attr("calledElement");
    let case_ref = el.engine_attr("caseRef");
    match (called_element, case_ref) {
        (None, None) => doc.error("Missing attribute 'calledElement' or 'caseRef'", el),
        (Some(_), Some(_)) => doc.error(
            "The attributes 'calledElement' or 'caseRef' cannot be used together: Use either 'calledElement' or 'caseRef'",
            el,
        ),
        _ => {}
    }

    let (called, binding, tenant_attr) = match (called_element, case_ref) {
        (None, Some(case)) => (
            CalledElement::Case(case.to_string()),
            parse_binding(el, "caseBinding", "caseVersion", "caseVersionTag", doc),
            "caseTenantId",
        ),
        (process, _) => (
            CalledElement::Process(process.unwrap_or_default().to_string()),
            parse_binding(
                el,
                "calledElementBinding",
                "calledElementVersion",
                "calledElementVersionTag",
                doc,
            ),
            "calledElementTenantId",
        ),
    };

    let variable_mapping = match called {
        CalledElement::Process(_) => el
            .engine_attr("variableMappingClass")
            .map(|c| DelegateImplementation::Class(c.to_string()))
            .or_else(|| {
                el.engine_attr("variableMappingDelegateExpression")
                    .map(|e| DelegateImplementation::DelegateExpression(e.to_string()))
            }),
        CalledElement::Case(_) => None,
    };

    let mut definition = CallActivityDefinition {
        called_element: called,
        binding,
        tenant_id: el.non_empty_engine_attr(tenant_attr).map(str::to_string),
        business_key: None,
        inputs: Vec::new(),
        outputs: Vec::new(),
        variable_mapping,
    };
    for in_el in el.extensions("in") {
        match in_el.attr("businessKey").filter(|k| !k.is_empty()) {
            Some(key) => definition.business_key = Some(key.to_string()),
            None => definition
                .inputs
                .push(parse_parameter(in_el, &activity_id, doc)),
        }
    }
    for out_el in el.extensions("out") {
        definition.outputs.push(parse_parameter(out_el, &activity_id, doc));
    }

    let multi_instance = pcx.graph.multi_instance_body_of(id).is_some();
    let node = pcx.graph.activity_mut(id);
    // a multi-instance body already provides the scope
    if !multi_instance {
        node.is_scope = true;
    }
    node.behavior = ActivityBehavior::CallActivity(definition);
    finish_activity(el, id, doc, pcx)?;
    Ok(Some(id))
}

/// `camunda:in` / `camunda:out`: all variables, or one source with a target.
fn parse_parameter(
    param_el: &XmlElement,
    activity_id: &str,
    doc: &mut DocumentContext<'_>,
) -> CallableParameter {
    let local = param_el.attr("local") == Some("true");
    if param_el.attr("variables") == Some("all") {
        return CallableParameter {
            source: ParameterSource::AllVariables,
            target: None,
            local,
        };
    }

    let strict = doc.config.strict_call_activity_validation;
    let mut source = ParameterSource::Null;
    let mut source_given = false;
    let mut source_text: Option<&str> = None;

    match param_el.attr("source") {
        Some(s) if !s.is_empty() => {
            source = ParameterSource::Variable(s.to_string());
            source_given = true;
            source_text = Some(s);
        }
        Some(s) if strict => {
            doc.error_with("Empty attribute 'source' when passing variables", param_el, &[activity_id]);
            source_given = true;
            source_text = Some(s);
        }
        _ => {}
    }
    if !source_given {
        match param_el.attr("sourceExpression") {
            Some(e) if !e.is_empty() => {
                source = ParameterSource::Expression(e.to_string());
                source_given = true;
                source_text = Some(e);
            }
            Some(e) => {
                if strict {
                    doc.error_with(
                        "Empty attribute 'sourceExpression' when passing variables",
                        param_el,
                        &[activity_id],
                    );
                }
                source_given = true;
                source_text = Some(e);
            }
            None => {}
        }
    }
    if strict && !source_given {
        doc.error_with(
            "Missing parameter 'source' or 'sourceExpression' when passing variables",
            param_el,
            &[activity_id],
        );
    }

    let target = param_el.attr("target");
    let has_source_text = source_text.is_some_and(|s| !s.is_empty());
    match target {
        None if strict || has_source_text => doc.error_with(
            "Missing attribute 'target' when attribute 'source' or 'sourceExpression' is set",
            param_el,
            &[activity_id],
        ),
        Some("") if strict => doc.error_with(
            "Empty attribute 'target' when attribute 'source' or 'sourceExpression' is set",
            param_el,
            &[activity_id],
        ),
        _ => {}
    }

    CallableParameter {
        source,
        target: target.map(str::to_string),
        local,
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

    /// A version binding without a version is reported and still recorded.
    #[test]
    fn t_callable_1_version_binding_requires_version() {
        let config = CompilerConfig::default();
        let mut hooks = ParseHooks::new();
        let root = element("<definitions/>");
        let mut doc = DocumentContext::new("t.bpmn", &config, &root, &mut hooks);
        let el = element(
            r#"<callActivity xmlns:camunda="http://camunda.org/schema/1.0/bpmn" id="c"
                 calledElement="sub" camunda:calledElementBinding="version"/>"#,
        );
        let binding = parse_binding(
            &el,
            "calledElementBinding",
            "calledElementVersion",
            "calledElementVersionTag",
            &mut doc,
        );
        assert_eq!(binding, CallableBinding::Version(String::new()));
        assert_eq!(
            doc.diagnostics.errors().next().map(|d| d.message.as_str()),
            Some("Missing attribute 'calledElementVersion' when 'calledElementBinding' has value 'version'")
        );
    }

    /// Lenient validation accepts a parameter without source or target.
    #[test]
    fn t_callable_2_lenient_parameters() {
        let config = CompilerConfig {
            strict_call_activity_validation: false,
            ..CompilerConfig::default()
        };
        let mut hooks = ParseHooks::new();
        let root = element("<definitions/>");
        let mut doc = DocumentContext::new("t.bpmn", &config, &root, &mut hooks);
        let param = element(r#"<in source=""/>"#);
        let parsed = parse_parameter(&param, "c", &mut doc);
        assert_eq!(parsed.source, ParameterSource::Null);
        assert!(!doc.diagnostics.has_errors());
    }
}
