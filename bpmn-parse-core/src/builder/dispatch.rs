//! Element tag to builder. Start, end, boundary and intermediate catch events
//! are built by their own scope passes and never go through this table.

use super::{callable, events, gateways, scope, tasks};
use crate::context::{DocumentContext, ProcessContext, Scope};
use crate::error::BuildResult;
use crate::model::ActivityId;
use crate::xml::XmlElement;

pub(super) type BuilderFn = for<'x> fn(
    &'x XmlElement,
    Scope<'x>,
    &mut DocumentContext<'_>,
    &mut ProcessContext<'x>,
) -> BuildResult<Option<ActivityId>>;

/// Activity elements the compiler recognizes but cannot execute.
pub(super) const UNSUPPORTED: [&str; 2] = ["adHocSubProcess", "complexGateway"];

pub(super) fn builder_for(tag: &str) -> Option<BuilderFn> {
    let builder: BuilderFn = match tag {
        "exclusiveGateway" => gateways::build_exclusive_gateway,
        "inclusiveGateway" => gateways::build_inclusive_gateway,
        "parallelGateway" => gateways::build_parallel_gateway,
        "eventBasedGateway" => gateways::build_event_based_gateway,
        "scriptTask" => tasks::build_script_task,
        "serviceTask" => tasks::build_service_task,
        "businessRuleTask" => tasks::build_business_rule_task,
        "task" => tasks::build_task,
        "manualTask" => tasks::build_manual_task,
        "userTask" => tasks::build_user_task,
        "sendTask" => tasks::build_send_task,
        "receiveTask" => tasks::build_receive_task,
        "subProcess" => scope::build_sub_process,
        "callActivity" => callable::build_call_activity,
        "transaction" => scope::build_transaction,
        "intermediateThrowEvent" => events::build_intermediate_throw,
        _ => return None,
    };
    Some(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Events with their own pass have no dispatch entry.
    #[test]
    fn t_dispatch_1_known_tags() {
        for tag in ["userTask", "subProcess", "eventBasedGateway", "intermediateThrowEvent"] {
            assert!(builder_for(tag).is_some(), "{tag}");
        }
        for tag in ["startEvent", "boundaryEvent", "sequenceFlow", "complexGateway"] {
            assert!(builder_for(tag).is_none(), "{tag}");
        }
    }
}
