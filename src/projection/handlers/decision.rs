//! Decision instance rows
//!
//! A decision-evaluation record evaluates a chain of decisions; each one
//! becomes its own row `"{key}_{index}"`, index counted from 1 in evaluation
//! order. When the evaluation failed, the last row is the failed decision
//! and is the only one carrying the failure message.

use super::{non_empty, record_date, unexpected_payload};
use crate::domain::{
    DecisionInstance, DecisionInstanceInput, DecisionInstanceOutput, DecisionInstanceState, Intent,
    Record, RecordValue, ValueType,
};
use crate::infra::{BatchRequest, ExporterError, Result};
use crate::projection::{fan_out_ids, fan_out_index, ProjectionHandler, UpsertPlan};

pub struct DecisionInstanceHandler {
    index: String,
}

impl DecisionInstanceHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for DecisionInstanceHandler {
    type Entity = DecisionInstance;

    fn name(&self) -> &'static str {
        "decision-instance"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::DecisionEvaluation
    }

    fn handles_event(&self, record: &Record) -> bool {
        matches!(record.value, RecordValue::DecisionEvaluation(_))
            && matches!(record.intent, Intent::Evaluated | Intent::Failed)
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::DecisionEvaluation(v) => fan_out_ids(record.key, v.evaluated_decisions.len()),
            _ => vec![],
        }
    }

    fn create_new_entity(&self, id: &str) -> DecisionInstance {
        DecisionInstance::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut DecisionInstance) -> Result<()> {
        let RecordValue::DecisionEvaluation(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        let index = fan_out_index(&entity.id).ok_or_else(|| {
            ExporterError::InvalidRecord(format!("{} is not a decision instance id", entity.id))
        })?;
        let decision = value.evaluated_decisions.get(index - 1).ok_or_else(|| {
            ExporterError::InvalidRecord(format!(
                "decision {} of {} requested for record {}",
                index,
                value.evaluated_decisions.len(),
                record.key
            ))
        })?;

        let failed = record.intent == Intent::Failed && index == value.evaluated_decisions.len();

        entity.key = record.key;
        entity.partition_id = record.partition_id;
        entity.position = record.position;
        entity.execution_index = index as i32;
        entity.evaluation_date = Some(record_date(record)?);
        entity.decision_id = decision.decision_id.clone();
        entity.decision_definition_id = decision.decision_key.to_string();
        entity.decision_name = decision.decision_name.clone();
        entity.decision_version = decision.decision_version;
        entity.decision_type = decision.decision_type.clone();
        entity.result = decision.decision_output.clone();
        entity.decision_requirements_key = value.decision_requirements_key;
        entity.decision_requirements_id = value.decision_requirements_id.clone();
        entity.root_decision_id = value.decision_id.clone();
        entity.process_definition_key = value.process_definition_key;
        entity.process_instance_key = value.process_instance_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.element_id = value.element_id.clone();
        entity.element_instance_key = value.element_instance_key;
        entity.tenant_id = record.tenant_id.clone();

        entity.evaluated_inputs = decision
            .evaluated_inputs
            .iter()
            .map(|input| DecisionInstanceInput {
                id: input.input_id.clone(),
                name: input.input_name.clone(),
                value: input.input_value.clone(),
            })
            .collect();
        entity.evaluated_outputs = decision
            .matched_rules
            .iter()
            .flat_map(|rule| {
                rule.evaluated_outputs.iter().map(move |output| DecisionInstanceOutput {
                    id: output.output_id.clone(),
                    name: output.output_name.clone(),
                    value: output.output_value.clone(),
                    rule_id: rule.rule_id.clone(),
                    rule_index: rule.rule_index,
                })
            })
            .collect();

        if failed {
            entity.state = Some(DecisionInstanceState::Failed);
            entity.evaluation_failure = non_empty(&value.evaluation_failure_message);
        } else {
            entity.state = Some(DecisionInstanceState::Evaluated);
            entity.evaluation_failure = None;
        }
        Ok(())
    }

    fn flush(&self, entity: &DecisionInstance, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .set_all()
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}
