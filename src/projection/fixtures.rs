//! Record builders shared by the projection unit tests

use crate::domain::{
    BpmnElementType, DecisionEvaluationRecordValue, EvaluatedDecisionValue, EvaluatedInputValue,
    EvaluatedOutputValue, IncidentRecordValue, Intent, JobRecordValue, MatchedRuleValue,
    ProcessInstanceRecordValue, Record, RecordValue, UserTaskRecordValue, VariableRecordValue,
};

pub const PROCESS_INSTANCE_KEY: i64 = 2251799813685249;
pub const PROCESS_DEFINITION_KEY: i64 = 2251799813685100;
pub const TIMESTAMP: i64 = 1_700_000_000_000;

pub fn record(key: i64, position: i64, intent: Intent, value: RecordValue) -> Record {
    Record {
        key,
        position,
        partition_id: 1,
        timestamp: TIMESTAMP + position,
        intent,
        tenant_id: "tenant-a".to_string(),
        value,
    }
}

pub fn element(
    key: i64,
    position: i64,
    intent: Intent,
    element_type: BpmnElementType,
    element_id: &str,
) -> Record {
    record(
        key,
        position,
        intent,
        RecordValue::ProcessInstance(ProcessInstanceRecordValue {
            bpmn_process_id: "order-process".to_string(),
            version: 3,
            process_definition_key: PROCESS_DEFINITION_KEY,
            process_instance_key: PROCESS_INSTANCE_KEY,
            element_id: element_id.to_string(),
            flow_scope_key: PROCESS_INSTANCE_KEY,
            bpmn_element_type: element_type,
            parent_process_instance_key: -1,
            parent_element_instance_key: -1,
        }),
    )
}

pub fn process(position: i64, intent: Intent) -> Record {
    element(
        PROCESS_INSTANCE_KEY,
        position,
        intent,
        BpmnElementType::Process,
        "order-process",
    )
}

pub fn task(key: i64, position: i64, intent: Intent) -> Record {
    element(key, position, intent, BpmnElementType::ServiceTask, "ship")
}

pub fn incident(key: i64, element_instance_key: i64, position: i64, intent: Intent) -> Record {
    record(
        key,
        position,
        intent,
        RecordValue::Incident(IncidentRecordValue {
            error_type: "JOB_NO_RETRIES".to_string(),
            error_message: "No more retries left.".to_string(),
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: PROCESS_DEFINITION_KEY,
            process_instance_key: PROCESS_INSTANCE_KEY,
            element_id: "ship".to_string(),
            element_instance_key,
            job_key: 77,
            variable_scope_key: element_instance_key,
        }),
    )
}

pub fn job(key: i64, element_instance_key: i64, position: i64, intent: Intent, retries: i32) -> Record {
    record(
        key,
        position,
        intent,
        RecordValue::Job(JobRecordValue {
            job_type: "shipping".to_string(),
            worker: "worker-1".to_string(),
            retries,
            deadline: TIMESTAMP + 60_000,
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: PROCESS_DEFINITION_KEY,
            process_instance_key: PROCESS_INSTANCE_KEY,
            element_id: "ship".to_string(),
            element_instance_key,
            ..Default::default()
        }),
    )
}

pub fn variable(scope_key: i64, name: &str, value: &str, position: i64, intent: Intent) -> Record {
    record(
        position * 10,
        position,
        intent,
        RecordValue::Variable(VariableRecordValue {
            name: name.to_string(),
            value: value.to_string(),
            scope_key,
            process_instance_key: PROCESS_INSTANCE_KEY,
            process_definition_key: PROCESS_DEFINITION_KEY,
            bpmn_process_id: "order-process".to_string(),
        }),
    )
}

pub fn evaluated_decision(decision_id: &str, output: &str) -> EvaluatedDecisionValue {
    EvaluatedDecisionValue {
        decision_id: decision_id.to_string(),
        decision_name: format!("{} name", decision_id),
        decision_key: 500,
        decision_version: 1,
        decision_type: "DECISION_TABLE".to_string(),
        decision_output: output.to_string(),
        evaluated_inputs: vec![EvaluatedInputValue {
            input_id: format!("{}-in", decision_id),
            input_name: "amount".to_string(),
            input_value: "100".to_string(),
        }],
        matched_rules: vec![MatchedRuleValue {
            rule_id: format!("{}-rule", decision_id),
            rule_index: 1,
            evaluated_outputs: vec![EvaluatedOutputValue {
                output_id: format!("{}-out", decision_id),
                output_name: "result".to_string(),
                output_value: output.to_string(),
            }],
        }],
    }
}

pub fn decision_evaluation(
    key: i64,
    position: i64,
    intent: Intent,
    decisions: Vec<EvaluatedDecisionValue>,
) -> Record {
    let failed = intent == Intent::Failed;
    let failed_decision_id = if failed {
        decisions.last().map(|d| d.decision_id.clone()).unwrap_or_default()
    } else {
        String::new()
    };

    record(
        key,
        position,
        intent,
        RecordValue::DecisionEvaluation(DecisionEvaluationRecordValue {
            decision_key: 500,
            decision_id: "approve".to_string(),
            decision_name: "Approve".to_string(),
            decision_version: 1,
            decision_requirements_key: 400,
            decision_requirements_id: "approvals".to_string(),
            decision_output: "\"ok\"".to_string(),
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: PROCESS_DEFINITION_KEY,
            process_instance_key: PROCESS_INSTANCE_KEY,
            element_id: "decide".to_string(),
            element_instance_key: 900,
            evaluated_decisions: decisions,
            evaluation_failure_message: if failed {
                "no rule matched".to_string()
            } else {
                String::new()
            },
            failed_decision_id,
        }),
    )
}

pub fn user_task(element_instance_key: i64, position: i64, intent: Intent, value: UserTaskRecordValue) -> Record {
    record(
        element_instance_key + 1,
        position,
        intent,
        RecordValue::UserTask(UserTaskRecordValue {
            element_instance_key,
            process_instance_key: PROCESS_INSTANCE_KEY,
            process_definition_key: PROCESS_DEFINITION_KEY,
            bpmn_process_id: "order-process".to_string(),
            element_id: "review".to_string(),
            ..value
        }),
    )
}
