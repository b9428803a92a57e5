//! Workflow engine records
//!
//! A [`Record`] is the immutable unit delivered by the engine's exporter
//! stream. Its `position` is the only ordering token used for conflict
//! resolution; `timestamp` is informational.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{BpmnElementType, Intent, ValueType, DEFAULT_TENANT_ID};

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

/// A single engine record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Key of the entity the record is about
    pub key: i64,
    /// Log position; strictly increasing within a partition
    pub position: i64,
    pub partition_id: i32,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub intent: Intent,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    pub value: RecordValue,
}

impl Record {
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Record timestamp as a UTC date
    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Owning process instance, if the payload belongs to one
    pub fn process_instance_key(&self) -> Option<i64> {
        let key = match &self.value {
            RecordValue::ProcessInstance(v) => v.process_instance_key,
            RecordValue::Incident(v) => v.process_instance_key,
            RecordValue::Job(v) => v.process_instance_key,
            RecordValue::Variable(v) => v.process_instance_key,
            RecordValue::DecisionEvaluation(v) => v.process_instance_key,
            RecordValue::UserTask(v) => v.process_instance_key,
        };
        (key > 0).then_some(key)
    }
}

/// Typed record payload, tagged by `valueType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordValue {
    ProcessInstance(ProcessInstanceRecordValue),
    Incident(IncidentRecordValue),
    Job(JobRecordValue),
    Variable(VariableRecordValue),
    DecisionEvaluation(DecisionEvaluationRecordValue),
    UserTask(UserTaskRecordValue),
}

impl RecordValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RecordValue::ProcessInstance(_) => ValueType::ProcessInstance,
            RecordValue::Incident(_) => ValueType::Incident,
            RecordValue::Job(_) => ValueType::Job,
            RecordValue::Variable(_) => ValueType::Variable,
            RecordValue::DecisionEvaluation(_) => ValueType::DecisionEvaluation,
            RecordValue::UserTask(_) => ValueType::UserTask,
        }
    }
}

/// Element lifecycle payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessInstanceRecordValue {
    pub bpmn_process_id: String,
    pub version: i32,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub flow_scope_key: i64,
    pub bpmn_element_type: BpmnElementType,
    /// Calling process instance for call activities, `-1` when absent
    pub parent_process_instance_key: i64,
    pub parent_element_instance_key: i64,
}

impl ProcessInstanceRecordValue {
    pub fn is_process(&self) -> bool {
        self.bpmn_element_type == BpmnElementType::Process
    }
}

/// Incident payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentRecordValue {
    pub error_type: String,
    pub error_message: String,
    pub bpmn_process_id: String,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub element_instance_key: i64,
    pub job_key: i64,
    pub variable_scope_key: i64,
}

/// Job payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRecordValue {
    #[serde(rename = "type")]
    pub job_type: String,
    pub worker: String,
    pub retries: i32,
    pub deadline: i64,
    pub error_message: String,
    pub custom_headers: BTreeMap<String, String>,
    pub bpmn_process_id: String,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub element_instance_key: i64,
}

/// Variable payload; `value` is the JSON text of the variable
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableRecordValue {
    pub name: String,
    pub value: String,
    pub scope_key: i64,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
}

/// Decision evaluation payload
///
/// `evaluated_decisions` lists every decision of the requirements chain in
/// evaluation order; on failure the failed decision is the last entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionEvaluationRecordValue {
    pub decision_key: i64,
    pub decision_id: String,
    pub decision_name: String,
    pub decision_version: i32,
    pub decision_requirements_key: i64,
    pub decision_requirements_id: String,
    pub decision_output: String,
    pub bpmn_process_id: String,
    pub process_definition_key: i64,
    pub process_instance_key: i64,
    pub element_id: String,
    pub element_instance_key: i64,
    pub evaluated_decisions: Vec<EvaluatedDecisionValue>,
    pub evaluation_failure_message: String,
    pub failed_decision_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatedDecisionValue {
    pub decision_id: String,
    pub decision_name: String,
    pub decision_key: i64,
    pub decision_version: i32,
    pub decision_type: String,
    pub decision_output: String,
    pub evaluated_inputs: Vec<EvaluatedInputValue>,
    pub matched_rules: Vec<MatchedRuleValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatedInputValue {
    pub input_id: String,
    pub input_name: String,
    pub input_value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchedRuleValue {
    pub rule_id: String,
    pub rule_index: i32,
    pub evaluated_outputs: Vec<EvaluatedOutputValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatedOutputValue {
    pub output_id: String,
    pub output_name: String,
    pub output_value: String,
}

/// User task payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserTaskRecordValue {
    pub user_task_key: i64,
    pub assignee: String,
    pub candidate_groups_list: Vec<String>,
    pub candidate_users_list: Vec<String>,
    pub due_date: String,
    pub follow_up_date: String,
    pub form_key: i64,
    pub external_form_reference: String,
    pub custom_headers: BTreeMap<String, String>,
    pub priority: i32,
    pub action: String,
    /// Attributes touched by an update/completion, by wire name
    pub changed_attributes: Vec<String>,
    pub element_id: String,
    pub element_instance_key: i64,
    pub bpmn_process_id: String,
    pub process_definition_key: i64,
    pub process_definition_version: i32,
    pub process_instance_key: i64,
}
