//! End-to-end projection scenarios against the in-memory document store.

mod common;

use serde_json::{json, Value};

use common::*;
use workflow_exporter::domain::OperationType;
use workflow_exporter::{ExporterConfig, ExporterError};

// ============================================================================
// Element lifecycle
// ============================================================================

#[tokio::test]
async fn element_activation_creates_summary_and_detail_rows() {
    let harness = Harness::new();

    harness.export(&[task(5, 1, "ELEMENT_ACTIVATING")]).await;

    let summary = harness.doc(LIST_VIEW, "5").await;
    assert_eq!(summary["activityState"], "ACTIVE");
    assert_eq!(summary["activityType"], "SERVICE_TASK");
    assert_eq!(summary["processInstanceKey"], PROCESS_INSTANCE_KEY);
    assert_eq!(summary["joinRelation"]["parent"], PROCESS_INSTANCE_KEY);

    let detail = harness.doc(FLOW_NODE_INSTANCE, "5").await;
    assert_eq!(detail["state"], "ACTIVE");
    assert!(detail["startDate"].is_string());
    assert_eq!(detail["endDate"], Value::Null);
    assert_eq!(detail["treePath"], Value::Null);
    assert_eq!(detail["level"], Value::Null);

    let event_id = format!("{PROCESS_INSTANCE_KEY}_5");
    let event = harness.doc(EVENT, &event_id).await;
    assert_eq!(event["processInstanceEvent"]["eventType"], "ELEMENT_ACTIVATING");
}

#[tokio::test]
async fn completion_in_later_batch_keeps_start_date() {
    let harness = Harness::new();

    harness.export(&[task(5, 1, "ELEMENT_ACTIVATING")]).await;
    let started = harness.doc(FLOW_NODE_INSTANCE, "5").await["startDate"].clone();
    harness.export(&[task(5, 4, "ELEMENT_COMPLETED")]).await;

    let detail = harness.doc(FLOW_NODE_INSTANCE, "5").await;
    assert_eq!(detail["state"], "COMPLETED");
    assert_eq!(detail["startDate"], started);
    assert!(detail["endDate"].is_string());
    assert_eq!(detail["position"], 4);
}

#[tokio::test]
async fn stale_lifecycle_record_does_not_regress_state() {
    let harness = Harness::new();

    harness.export(&[task(5, 4, "ELEMENT_COMPLETED")]).await;
    harness.export(&[task(5, 2, "ELEMENT_ACTIVATED")]).await;

    assert_eq!(harness.doc(LIST_VIEW, "5").await["activityState"], "COMPLETED");
    assert_eq!(harness.doc(FLOW_NODE_INSTANCE, "5").await["state"], "COMPLETED");
    assert_eq!(harness.doc(FLOW_NODE_INSTANCE, "5").await["position"], 4);
}

#[tokio::test]
async fn root_activation_counts_one_started_instance() {
    let harness = Harness::new();

    harness
        .export(&[process(1, "ELEMENT_ACTIVATING"), process(2, "ELEMENT_ACTIVATED")])
        .await;

    let metrics = harness.store.documents(METRIC).await;
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].1["value"], PROCESS_INSTANCE_KEY.to_string());

    let summary = harness.doc(LIST_VIEW, &PROCESS_INSTANCE_KEY.to_string()).await;
    assert_eq!(summary["state"], "ACTIVE");
    assert_eq!(summary["position"], 2);
    assert!(summary["startDate"].is_string());
}

#[tokio::test]
async fn terminated_process_completes_cancel_operation() {
    let harness = Harness::new();

    harness
        .export(&[process(1, "ELEMENT_ACTIVATING"), process(9, "ELEMENT_TERMINATED")])
        .await;

    let summary = harness.doc(LIST_VIEW, &PROCESS_INSTANCE_KEY.to_string()).await;
    assert_eq!(summary["state"], "CANCELED");
    assert!(summary["endDate"].is_string());

    let completions = harness.operations.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].operation, OperationType::CancelProcessInstance);
    assert_eq!(completions[0].process_instance_key, PROCESS_INSTANCE_KEY);
}

// ============================================================================
// Incidents
// ============================================================================

#[tokio::test]
async fn resolved_incident_is_not_resurrected_by_redelivery() {
    let harness = Harness::new();
    let created = incident(30, 5, 10, "CREATED");

    harness.export(&[task(5, 1, "ELEMENT_ACTIVATING"), created.clone()]).await;
    let summary = harness.doc(LIST_VIEW, "5").await;
    assert_eq!(summary["incidentKey"], 30);
    assert_eq!(summary["errorMessage"], "No more retries left.");

    harness.export(&[incident(30, 5, 20, "RESOLVED")]).await;
    harness.export(&[created]).await;

    let summary = harness.doc(LIST_VIEW, "5").await;
    assert_eq!(summary["incidentKey"], Value::Null);
    assert_eq!(summary["errorMessage"], Value::Null);
    assert_eq!(summary["positionIncident"], 20);
    assert_eq!(summary["activityState"], "ACTIVE");

    let detail = harness.doc(FLOW_NODE_INSTANCE, "5").await;
    assert_eq!(detail["incident"], false);
    assert_eq!(detail["incidentKey"], Value::Null);

    let document = harness.doc(INCIDENT, "30").await;
    assert_eq!(document["state"], "RESOLVED");
    assert!(document["creationTime"].is_string());
    assert_eq!(
        document["treePath"],
        format!("PI_{PROCESS_INSTANCE_KEY}/FN_ship/FNI_5")
    );

    let completions = harness.operations.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].operation, OperationType::ResolveIncident);
    assert_eq!(completions[0].target_key, 30);
}

#[tokio::test]
async fn incident_before_lifecycle_converges() {
    let in_order = Harness::new();
    let reversed = Harness::new();
    let lifecycle = task(5, 1, "ELEMENT_ACTIVATING");
    let created = incident(30, 5, 3, "CREATED");

    in_order.export(&[lifecycle.clone()]).await;
    in_order.export(&[created.clone()]).await;
    reversed.export(&[created]).await;
    reversed.export(&[lifecycle]).await;

    assert_eq!(in_order.store.snapshot().await, reversed.store.snapshot().await);
}

// ============================================================================
// Jobs, variables, decisions and user tasks
// ============================================================================

#[tokio::test]
async fn failed_job_with_retries_is_flagged() {
    let harness = Harness::new();

    harness
        .export(&[task(5, 1, "ELEMENT_ACTIVATED"), job(40, 5, 2, "FAILED", 2)])
        .await;
    assert_eq!(harness.doc(LIST_VIEW, "5").await["jobFailedWithRetriesLeft"], true);

    harness.export(&[job(40, 5, 3, "RETRIES_UPDATED", 0)]).await;
    let summary = harness.doc(LIST_VIEW, "5").await;
    assert_eq!(summary["jobFailedWithRetriesLeft"], false);
    assert_eq!(summary["positionJob"], 3);

    let event = harness.doc(EVENT, &format!("{PROCESS_INSTANCE_KEY}_5")).await;
    assert_eq!(event["jobEvent"]["eventType"], "RETRIES_UPDATED");
    assert_eq!(event["processInstanceEvent"]["eventType"], "ELEMENT_ACTIVATED");
}

#[tokio::test]
async fn variable_rows_are_keyed_by_scope_and_name() {
    let harness = Harness::new();

    harness
        .export(&[
            variable(5, "orderId", "\"A-1\"", 1, "CREATED"),
            variable(5, "total", "100", 2, "CREATED"),
        ])
        .await;
    harness
        .export(&[variable(5, "total", "120", 3, "UPDATED")])
        .await;

    let total = harness.doc(LIST_VIEW, "5_total").await;
    assert_eq!(total["value"], "120");
    assert_eq!(total["scopeKey"], 5);
    assert_eq!(
        harness.store.routing(LIST_VIEW, "5_total").await,
        Some(PROCESS_INSTANCE_KEY.to_string())
    );
    assert_eq!(harness.doc(LIST_VIEW, "5_orderId").await["value"], "\"A-1\"");

    let completions = harness.operations.completions();
    assert!(completions
        .iter()
        .any(|c| c.operation == OperationType::UpdateVariable && c.target_key == 5));
}

#[tokio::test]
async fn failed_decision_chain_fans_out_with_failure_on_last_row() {
    let harness = Harness::new();

    harness
        .export(&[decision_evaluation(
            70,
            5,
            "FAILED",
            vec![
                evaluated_decision("risk", "\"low\""),
                evaluated_decision("approve", ""),
            ],
        )])
        .await;

    let rows = harness.store.documents(DECISION_INSTANCE).await;
    let ids: Vec<&str> = rows.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["70_1", "70_2"]);

    assert_eq!(rows[0].1["state"], "EVALUATED");
    assert_eq!(rows[0].1["evaluationFailure"], Value::Null);
    assert_eq!(rows[0].1["decisionId"], "risk");
    assert_eq!(rows[1].1["state"], "FAILED");
    assert_eq!(rows[1].1["evaluationFailure"], "no rule matched");
    assert_eq!(rows[1].1["executionIndex"], 2);
    assert_eq!(harness.store.routing(DECISION_INSTANCE, "70_1").await, None);
}

#[tokio::test]
async fn user_task_assignment_in_later_batch_updates_only_assignee() {
    let harness = Harness::new();
    let created = json!({
        "userTaskKey": 212,
        "candidateGroupsList": ["reviewers"],
        "priority": 50,
        "formKey": 12,
    });

    harness
        .export(&[
            user_task(211, 1, "CREATING", created.clone()),
            user_task(211, 2, "CREATED", created),
        ])
        .await;
    harness
        .export(&[user_task(211, 3, "ASSIGNED", json!({"assignee": "demo"}))])
        .await;

    let task = harness.doc(TASK, "211").await;
    assert_eq!(task["state"], "CREATED");
    assert_eq!(task["assignee"], "demo");
    assert_eq!(task["candidateGroups"], json!(["reviewers"]));
    assert_eq!(task["priority"], 50);
    assert_eq!(task["changedAttributes"], json!(["assignee"]));
    assert_eq!(
        harness.store.routing(TASK, "211").await,
        Some(PROCESS_INSTANCE_KEY.to_string())
    );
}

#[tokio::test]
async fn user_task_migration_in_later_batch_keeps_routing() {
    let harness = Harness::new();
    harness
        .export(&[user_task(211, 1, "CREATED", json!({"userTaskKey": 212}))])
        .await;
    harness
        .export(&[user_task(211, 4, "MIGRATED", json!({"processDefinitionVersion": 2}))])
        .await;

    let task = harness.doc(TASK, "211").await;
    assert_eq!(task["processDefinitionVersion"], 2);
    assert_eq!(task["state"], "CREATED");
    assert_eq!(
        harness.store.routing(TASK, "211").await,
        Some(PROCESS_INSTANCE_KEY.to_string())
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn record_without_process_instance_is_not_mapped_to_key_zero() {
    let harness = Harness::new();
    let orphan = record(
        6,
        2,
        "ELEMENT_ACTIVATING",
        "PROCESS_INSTANCE",
        json!({
            "bpmnProcessId": "order-process",
            "elementId": "ship",
            "bpmnElementType": "SERVICE_TASK",
        }),
    );

    let outcome = harness.runner.export_batch(&[orphan]).await.unwrap();

    assert!(!outcome.mapping_failures.is_empty());
    for failure in &outcome.mapping_failures {
        assert_eq!(failure.key, 6);
        assert!(failure.message.contains("process instance key"), "{failure}");
    }
    assert!(harness.store.is_empty().await);
    assert_eq!(harness.store.routing(FLOW_NODE_INSTANCE, "6").await, None);
    assert!(harness.store.documents(EVENT).await.is_empty());
}

#[tokio::test]
async fn rejected_document_does_not_block_the_batch() {
    let harness = Harness::new();
    harness.store.reject_writes_to(FLOW_NODE_INSTANCE, "6").await;

    let outcome = harness
        .runner
        .export_batch(&[task(5, 1, "ELEMENT_ACTIVATING"), task(6, 2, "ELEMENT_ACTIVATING")])
        .await
        .unwrap();

    assert_eq!(outcome.persistence_failures.len(), 1);
    assert_eq!(outcome.persistence_failures[0].index, FLOW_NODE_INSTANCE);
    assert_eq!(outcome.persistence_failures[0].id, "6");
    assert_eq!(outcome.documents_written, 5);
    assert!(harness.store.get(LIST_VIEW, "6").await.is_some());
    assert!(harness.store.get(FLOW_NODE_INSTANCE, "6").await.is_none());
}

#[tokio::test]
async fn unmappable_record_is_reported_with_context() {
    let harness = Harness::new();
    let mut broken = task(6, 2, "ELEMENT_ACTIVATING");
    broken.timestamp = i64::MAX;

    let outcome = harness
        .runner
        .export_batch(&[task(5, 1, "ELEMENT_ACTIVATING"), broken])
        .await
        .unwrap();

    assert!(!outcome.mapping_failures.is_empty());
    for failure in &outcome.mapping_failures {
        assert_eq!(failure.key, 6);
        assert_eq!(failure.position, 2);
    }
    assert!(harness.store.get(FLOW_NODE_INSTANCE, "5").await.is_some());
    assert!(harness.store.get(FLOW_NODE_INSTANCE, "6").await.is_none());
    assert!(matches!(
        outcome.into_result(),
        Err(ExporterError::BatchIncomplete { .. })
    ));
}

#[tokio::test]
async fn strict_mode_writes_nothing_on_mapping_failure() {
    let harness = Harness::with_config(ExporterConfig::default().with_continue_on_mapping_error(false));
    let mut broken = task(6, 2, "ELEMENT_ACTIVATING");
    broken.timestamp = i64::MAX;

    let result = harness
        .runner
        .export_batch(&[task(5, 1, "ELEMENT_ACTIVATING"), broken])
        .await;

    assert!(matches!(result, Err(ExporterError::Mapping(_))));
    assert!(harness.store.is_empty().await);
}
