//! Common test utilities and fixtures for integration tests
//!
//! Records are built from JSON so the tests also exercise the wire format.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use workflow_exporter::projection::{NoHierarchy, ProjectionRunner, RecordingOperationSink};
use workflow_exporter::{ExporterConfig, InMemoryDocumentStore, Record};

pub const PROCESS_INSTANCE_KEY: i64 = 2251799813685249;
pub const PROCESS_DEFINITION_KEY: i64 = 2251799813685100;
pub const TIMESTAMP: i64 = 1_700_000_000_000;

pub const LIST_VIEW: &str = "operate-list-view";
pub const FLOW_NODE_INSTANCE: &str = "operate-flownode-instance";
pub const INCIDENT: &str = "operate-incident";
pub const EVENT: &str = "operate-event";
pub const DECISION_INSTANCE: &str = "operate-decision-instance";
pub const TASK: &str = "operate-task";
pub const METRIC: &str = "operate-metric";

/// Runner over a fresh in-memory store
pub struct Harness {
    pub store: Arc<InMemoryDocumentStore>,
    pub operations: Arc<RecordingOperationSink>,
    pub runner: ProjectionRunner,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ExporterConfig::default())
    }

    pub fn with_config(config: ExporterConfig) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let operations = Arc::new(RecordingOperationSink::new());
        let runner = ProjectionRunner::standard(
            config,
            store.clone(),
            Arc::new(NoHierarchy),
            operations.clone(),
        )
        .unwrap();
        Self {
            store,
            operations,
            runner,
        }
    }

    /// Export one batch and assert it completed without failures
    pub async fn export(&self, records: &[Record]) {
        let outcome = self.runner.export_batch(records).await.unwrap();
        assert!(
            outcome.is_complete(),
            "batch had failures: {:?} {:?}",
            outcome.mapping_failures,
            outcome.persistence_failures
        );
    }

    pub async fn doc(&self, index: &str, id: &str) -> Value {
        self.store
            .get(index, id)
            .await
            .unwrap_or_else(|| panic!("no document {index}/{id}"))
    }
}

/// Build a record from its JSON payload fields
pub fn record(key: i64, position: i64, intent: &str, value_type: &str, mut value: Value) -> Record {
    value["valueType"] = json!(value_type);
    serde_json::from_value(json!({
        "key": key,
        "position": position,
        "partitionId": 1,
        "timestamp": TIMESTAMP + position,
        "intent": intent,
        "tenantId": "tenant-a",
        "value": value,
    }))
    .unwrap()
}

pub fn element(key: i64, position: i64, intent: &str, element_type: &str, element_id: &str) -> Record {
    record(
        key,
        position,
        intent,
        "PROCESS_INSTANCE",
        json!({
            "bpmnProcessId": "order-process",
            "version": 3,
            "processDefinitionKey": PROCESS_DEFINITION_KEY,
            "processInstanceKey": PROCESS_INSTANCE_KEY,
            "elementId": element_id,
            "flowScopeKey": PROCESS_INSTANCE_KEY,
            "bpmnElementType": element_type,
            "parentProcessInstanceKey": -1,
            "parentElementInstanceKey": -1,
        }),
    )
}

pub fn process(position: i64, intent: &str) -> Record {
    element(PROCESS_INSTANCE_KEY, position, intent, "PROCESS", "order-process")
}

pub fn task(key: i64, position: i64, intent: &str) -> Record {
    element(key, position, intent, "SERVICE_TASK", "ship")
}

pub fn incident(key: i64, element_instance_key: i64, position: i64, intent: &str) -> Record {
    record(
        key,
        position,
        intent,
        "INCIDENT",
        json!({
            "errorType": "JOB_NO_RETRIES",
            "errorMessage": "No more retries left.",
            "bpmnProcessId": "order-process",
            "processDefinitionKey": PROCESS_DEFINITION_KEY,
            "processInstanceKey": PROCESS_INSTANCE_KEY,
            "elementId": "ship",
            "elementInstanceKey": element_instance_key,
            "jobKey": 77,
        }),
    )
}

pub fn job(key: i64, element_instance_key: i64, position: i64, intent: &str, retries: i32) -> Record {
    record(
        key,
        position,
        intent,
        "JOB",
        json!({
            "type": "shipping",
            "worker": "worker-1",
            "retries": retries,
            "deadline": TIMESTAMP + 60_000,
            "bpmnProcessId": "order-process",
            "processDefinitionKey": PROCESS_DEFINITION_KEY,
            "processInstanceKey": PROCESS_INSTANCE_KEY,
            "elementId": "ship",
            "elementInstanceKey": element_instance_key,
        }),
    )
}

pub fn variable(scope_key: i64, name: &str, value: &str, position: i64, intent: &str) -> Record {
    record(
        position * 10,
        position,
        intent,
        "VARIABLE",
        json!({
            "name": name,
            "value": value,
            "scopeKey": scope_key,
            "processInstanceKey": PROCESS_INSTANCE_KEY,
            "processDefinitionKey": PROCESS_DEFINITION_KEY,
            "bpmnProcessId": "order-process",
        }),
    )
}

pub fn evaluated_decision(decision_id: &str, output: &str) -> Value {
    json!({
        "decisionId": decision_id,
        "decisionName": format!("{decision_id} name"),
        "decisionKey": 500,
        "decisionVersion": 1,
        "decisionType": "DECISION_TABLE",
        "decisionOutput": output,
        "evaluatedInputs": [
            {"inputId": format!("{decision_id}-in"), "inputName": "amount", "inputValue": "100"}
        ],
        "matchedRules": [
            {
                "ruleId": format!("{decision_id}-rule"),
                "ruleIndex": 1,
                "evaluatedOutputs": [
                    {"outputId": format!("{decision_id}-out"), "outputName": "result", "outputValue": output}
                ]
            }
        ],
    })
}

pub fn decision_evaluation(key: i64, position: i64, intent: &str, decisions: Vec<Value>) -> Record {
    let failed = intent == "FAILED";
    record(
        key,
        position,
        intent,
        "DECISION_EVALUATION",
        json!({
            "decisionKey": 500,
            "decisionId": "approve",
            "decisionRequirementsKey": 400,
            "decisionRequirementsId": "approvals",
            "bpmnProcessId": "order-process",
            "processDefinitionKey": PROCESS_DEFINITION_KEY,
            "processInstanceKey": PROCESS_INSTANCE_KEY,
            "elementId": "decide",
            "elementInstanceKey": 900,
            "evaluatedDecisions": decisions,
            "evaluationFailureMessage": if failed { "no rule matched" } else { "" },
        }),
    )
}

pub fn user_task(element_instance_key: i64, position: i64, intent: &str, mut fields: Value) -> Record {
    fields["elementInstanceKey"] = json!(element_instance_key);
    fields["processInstanceKey"] = json!(PROCESS_INSTANCE_KEY);
    fields["processDefinitionKey"] = json!(PROCESS_DEFINITION_KEY);
    fields["bpmnProcessId"] = json!("order-process");
    fields["elementId"] = json!("review");
    record(element_instance_key + 1, position, intent, "USER_TASK", fields)
}
