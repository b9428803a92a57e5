//! Core type definitions for the workflow exporter
//!
//! Record kinds, intents, element types and the lifecycle states carried
//! by projected documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant assigned to records that do not carry one
pub const DEFAULT_TENANT_ID: &str = "<default>";

/// Kind of payload carried by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    ProcessInstance,
    Incident,
    Job,
    Variable,
    DecisionEvaluation,
    UserTask,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::ProcessInstance,
        ValueType::Incident,
        ValueType::Job,
        ValueType::Variable,
        ValueType::DecisionEvaluation,
        ValueType::UserTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::ProcessInstance => "PROCESS_INSTANCE",
            ValueType::Incident => "INCIDENT",
            ValueType::Job => "JOB",
            ValueType::Variable => "VARIABLE",
            ValueType::DecisionEvaluation => "DECISION_EVALUATION",
            ValueType::UserTask => "USER_TASK",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record intent
///
/// Intents are shared across kinds (`CREATED` is emitted by incidents,
/// jobs, variables and user tasks alike) so handlers always interpret an
/// intent together with the record's [`ValueType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    // Element lifecycle
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ElementTerminated,
    ElementMigrated,

    // Shared entity lifecycle
    Creating,
    Created,
    Updating,
    Updated,
    Migrated,
    Resolved,
    Completing,
    Completed,
    Canceling,
    Canceled,
    Failed,

    // Jobs
    TimedOut,
    RetriesUpdated,
    ErrorThrown,

    // Decisions
    Evaluated,

    // User tasks
    Assigning,
    Claiming,
    Assigned,
    AssignmentDenied,
    UpdateDenied,
    CompletionDenied,
    Corrected,

    #[serde(other)]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ElementActivating => "ELEMENT_ACTIVATING",
            Intent::ElementActivated => "ELEMENT_ACTIVATED",
            Intent::ElementCompleting => "ELEMENT_COMPLETING",
            Intent::ElementCompleted => "ELEMENT_COMPLETED",
            Intent::ElementTerminating => "ELEMENT_TERMINATING",
            Intent::ElementTerminated => "ELEMENT_TERMINATED",
            Intent::ElementMigrated => "ELEMENT_MIGRATED",
            Intent::Creating => "CREATING",
            Intent::Created => "CREATED",
            Intent::Updating => "UPDATING",
            Intent::Updated => "UPDATED",
            Intent::Migrated => "MIGRATED",
            Intent::Resolved => "RESOLVED",
            Intent::Completing => "COMPLETING",
            Intent::Completed => "COMPLETED",
            Intent::Canceling => "CANCELING",
            Intent::Canceled => "CANCELED",
            Intent::Failed => "FAILED",
            Intent::TimedOut => "TIMED_OUT",
            Intent::RetriesUpdated => "RETRIES_UPDATED",
            Intent::ErrorThrown => "ERROR_THROWN",
            Intent::Evaluated => "EVALUATED",
            Intent::Assigning => "ASSIGNING",
            Intent::Claiming => "CLAIMING",
            Intent::Assigned => "ASSIGNED",
            Intent::AssignmentDenied => "ASSIGNMENT_DENIED",
            Intent::UpdateDenied => "UPDATE_DENIED",
            Intent::CompletionDenied => "COMPLETION_DENIED",
            Intent::Corrected => "CORRECTED",
            Intent::Unknown => "UNKNOWN",
        }
    }

    /// Whether this intent is an element lifecycle transition
    pub fn is_element_lifecycle(&self) -> bool {
        matches!(
            self,
            Intent::ElementActivating
                | Intent::ElementActivated
                | Intent::ElementCompleting
                | Intent::ElementCompleted
                | Intent::ElementTerminating
                | Intent::ElementTerminated
                | Intent::ElementMigrated
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BPMN element type of a process-instance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BpmnElementType {
    Process,
    SubProcess,
    EventSubProcess,
    AdHocSubProcess,
    StartEvent,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    BoundaryEvent,
    EndEvent,
    ServiceTask,
    ReceiveTask,
    UserTask,
    ManualTask,
    Task,
    ScriptTask,
    SendTask,
    BusinessRuleTask,
    ExclusiveGateway,
    ParallelGateway,
    EventBasedGateway,
    InclusiveGateway,
    CallActivity,
    MultiInstanceBody,
    SequenceFlow,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Process instance state on the list view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessInstanceState {
    Active,
    Completed,
    Canceled,
}

/// Flow node instance state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowNodeState {
    Active,
    Completed,
    Terminated,
}

/// Incident state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentState {
    Active,
    Resolved,
}

/// Decision instance state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionInstanceState {
    Evaluated,
    Failed,
}

/// User task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Creating,
    Created,
    Assigning,
    Updating,
    Completing,
    Completed,
    Canceling,
    Canceled,
}

impl TaskState {
    /// State a user task moves into for an intent, `None` when the intent
    /// leaves the state untouched.
    pub fn for_intent(intent: Intent) -> Option<TaskState> {
        match intent {
            Intent::Creating => Some(TaskState::Creating),
            Intent::Created
            | Intent::Assigned
            | Intent::AssignmentDenied
            | Intent::Updated
            | Intent::UpdateDenied
            | Intent::CompletionDenied => Some(TaskState::Created),
            Intent::Assigning | Intent::Claiming => Some(TaskState::Assigning),
            Intent::Updating => Some(TaskState::Updating),
            Intent::Completing => Some(TaskState::Completing),
            Intent::Completed => Some(TaskState::Completed),
            Intent::Canceling => Some(TaskState::Canceling),
            Intent::Canceled => Some(TaskState::Canceled),
            _ => None,
        }
    }
}

/// Source kind of an audit event row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSourceType {
    ProcessInstance,
    Incident,
    Job,
}

/// Operation that a projected write can complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    CancelProcessInstance,
    ResolveIncident,
    UpdateVariable,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::CancelProcessInstance => "CANCEL_PROCESS_INSTANCE",
            OperationType::ResolveIncident => "RESOLVE_INCIDENT",
            OperationType::UpdateVariable => "UPDATE_VARIABLE",
        };
        f.write_str(name)
    }
}

/// Parent/child relation used by joined documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRelation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<i64>,
}

impl JoinRelation {
    pub const PROCESS_INSTANCE: &'static str = "processInstance";
    pub const ACTIVITY: &'static str = "activity";
    pub const VARIABLE: &'static str = "variable";
    pub const TASK: &'static str = "task";

    pub fn root(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
        }
    }

    pub fn child(name: &str, parent: i64) -> Self {
        Self {
            name: name.to_string(),
            parent: Some(parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_names() {
        let intent: Intent = serde_json::from_str("\"ELEMENT_ACTIVATING\"").unwrap();
        assert_eq!(intent, Intent::ElementActivating);
        assert_eq!(intent.as_str(), "ELEMENT_ACTIVATING");

        let unknown: Intent = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(unknown, Intent::Unknown);
    }

    #[test]
    fn test_user_task_state_mapping() {
        assert_eq!(TaskState::for_intent(Intent::Creating), Some(TaskState::Creating));
        assert_eq!(TaskState::for_intent(Intent::Assigned), Some(TaskState::Created));
        assert_eq!(TaskState::for_intent(Intent::CompletionDenied), Some(TaskState::Created));
        assert_eq!(TaskState::for_intent(Intent::Claiming), Some(TaskState::Assigning));
        assert_eq!(TaskState::for_intent(Intent::Canceled), Some(TaskState::Canceled));
        assert_eq!(TaskState::for_intent(Intent::Migrated), None);
        assert_eq!(TaskState::for_intent(Intent::Corrected), None);
    }

    #[test]
    fn test_join_relation_serialization() {
        let root = serde_json::to_value(JoinRelation::root(JoinRelation::PROCESS_INSTANCE)).unwrap();
        assert_eq!(root, serde_json::json!({"name": "processInstance"}));

        let child = serde_json::to_value(JoinRelation::child(JoinRelation::ACTIVITY, 7)).unwrap();
        assert_eq!(child, serde_json::json!({"name": "activity", "parent": 7}));
    }

    #[test]
    fn test_unknown_element_type_falls_back() {
        let t: BpmnElementType = serde_json::from_str("\"COMPENSATION_TASK\"").unwrap();
        assert_eq!(t, BpmnElementType::Unspecified);
    }
}
