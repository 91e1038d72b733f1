//! Values of [`ActivityNode::activity_type`](super::ActivityNode::activity_type).
//!
//! Most activities keep their element's local name (`userTask`,
//! `exclusiveGateway`, ...). Events are refined by their event definition so a
//! reader of the graph can tell a timer boundary from a message boundary
//! without looking at the behavior.

pub const START_EVENT: &str = "startEvent";
pub const START_EVENT_MESSAGE: &str = "messageStartEvent";
pub const START_EVENT_TIMER: &str = "startTimerEvent";
pub const START_EVENT_SIGNAL: &str = "signalStartEvent";
pub const START_EVENT_CONDITIONAL: &str = "conditionalStartEvent";
pub const START_EVENT_ERROR: &str = "errorStartEvent";
pub const START_EVENT_COMPENSATION: &str = "compensationStartEvent";
pub const START_EVENT_ESCALATION: &str = "escalationStartEvent";

pub const INTERMEDIATE_EVENT_TIMER: &str = "intermediateTimer";
pub const INTERMEDIATE_EVENT_MESSAGE: &str = "intermediateMessageCatch";
pub const INTERMEDIATE_EVENT_SIGNAL: &str = "intermediateSignalCatch";
pub const INTERMEDIATE_EVENT_CONDITIONAL: &str = "intermediateConditional";
pub const INTERMEDIATE_EVENT_LINK: &str = "intermediateLinkCatch";
pub const INTERMEDIATE_EVENT_SIGNAL_THROW: &str = "intermediateSignalThrow";
pub const INTERMEDIATE_EVENT_COMPENSATION_THROW: &str = "intermediateCompensationThrowEvent";
pub const INTERMEDIATE_EVENT_MESSAGE_THROW: &str = "intermediateMessageThrowEvent";
pub const INTERMEDIATE_EVENT_NONE_THROW: &str = "intermediateNoneThrowEvent";
pub const INTERMEDIATE_EVENT_ESCALATION_THROW: &str = "intermediateEscalationThrowEvent";

pub const END_EVENT_ERROR: &str = "errorEndEvent";
pub const END_EVENT_CANCEL: &str = "cancelEndEvent";
pub const END_EVENT_TERMINATE: &str = "terminateEndEvent";
pub const END_EVENT_MESSAGE: &str = "messageEndEvent";
pub const END_EVENT_SIGNAL: &str = "signalEndEvent";
pub const END_EVENT_COMPENSATION: &str = "compensationEndEvent";
pub const END_EVENT_ESCALATION: &str = "escalationEndEvent";
pub const END_EVENT_NONE: &str = "noneEndEvent";

pub const BOUNDARY_TIMER: &str = "boundaryTimer";
pub const BOUNDARY_MESSAGE: &str = "boundaryMessage";
pub const BOUNDARY_SIGNAL: &str = "boundarySignal";
pub const BOUNDARY_COMPENSATION: &str = "compensationBoundaryCatch";
pub const BOUNDARY_ERROR: &str = "boundaryError";
pub const BOUNDARY_ESCALATION: &str = "boundaryEscalation";
pub const BOUNDARY_CANCEL: &str = "cancelBoundaryCatch";
pub const BOUNDARY_CONDITIONAL: &str = "boundaryConditional";

pub const MULTI_INSTANCE_BODY: &str = "multiInstanceBody";

/// Suffix of a synthesized multi-instance body id.
pub const MULTI_INSTANCE_BODY_ID_SUFFIX: &str = "#multiInstanceBody";

pub fn multi_instance_body_id(activity_id: &str) -> String {
    format!("{activity_id}{MULTI_INSTANCE_BODY_ID_SUFFIX}")
}
