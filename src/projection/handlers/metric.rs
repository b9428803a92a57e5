//! Usage metric rows for started root process instances

use super::{owning_process_instance, record_date, unexpected_payload};
use crate::domain::{Intent, Record, RecordValue, UsageMetric, ValueType};
use crate::infra::{BatchRequest, Result};
use crate::projection::{ProjectionHandler, UpsertPlan};

pub struct MetricFromProcessInstanceHandler {
    index: String,
}

impl MetricFromProcessInstanceHandler {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl ProjectionHandler for MetricFromProcessInstanceHandler {
    type Entity = UsageMetric;

    fn name(&self) -> &'static str {
        "metric-from-process-instance"
    }

    fn handled_kind(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn handles_event(&self, record: &Record) -> bool {
        record.intent == Intent::ElementActivating
            && matches!(&record.value, RecordValue::ProcessInstance(v) if v.is_process())
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: &str) -> UsageMetric {
        UsageMetric::new(id)
    }

    fn update_entity(&self, record: &Record, entity: &mut UsageMetric) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Err(unexpected_payload(self.name(), record));
        };
        owning_process_instance(self.name(), record)?;

        entity.value = value.process_instance_key.to_string();
        entity.event_time = Some(record_date(record)?);
        entity.partition_id = record.partition_id;
        entity.tenant_id = record.tenant_id.clone();
        Ok(())
    }

    fn flush(&self, entity: &UsageMetric, batch: &mut BatchRequest) -> Result<()> {
        UpsertPlan::new(&self.index, &entity.id, entity)?
            .set_all()
            .submit(batch)
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::fixtures::*;

    #[test]
    fn test_only_root_activation_counts() {
        let handler = MetricFromProcessInstanceHandler::new("metric");
        assert!(handler.handles_event(&process(1, Intent::ElementActivating)));
        assert!(!handler.handles_event(&process(2, Intent::ElementActivated)));
        assert!(!handler.handles_event(&task(5, 3, Intent::ElementActivating)));
    }

    #[test]
    fn test_metric_row() {
        let handler = MetricFromProcessInstanceHandler::new("metric");
        let record = process(1, Intent::ElementActivating);
        let mut entity = handler.create_new_entity(&record.key.to_string());
        handler.update_entity(&record, &mut entity).unwrap();

        assert_eq!(entity.event, UsageMetric::PROCESS_INSTANCE_STARTED);
        assert_eq!(entity.value, PROCESS_INSTANCE_KEY.to_string());
        assert_eq!(entity.tenant_id, "tenant-a");
        assert_eq!(entity.event_time, record.date_time());
    }
}
