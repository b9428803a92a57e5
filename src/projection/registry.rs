//! Handler registry
//!
//! The handler set is closed: every handler is a [`Handler`] variant and
//! every accumulated document an [`Accumulator`] variant. The registry
//! indexes handlers by record kind so that routing a record costs one map
//! lookup plus the `handles_event` filters of that kind's handlers.

use std::collections::HashMap;
use std::sync::Arc;

use super::handlers::*;
use super::{HierarchyLookup, OperationCompletionSink, ProjectionHandler};
use crate::config::ExporterConfig;
use crate::domain::{
    DecisionInstance, Event, FlowNodeInstance, Incident, ListViewFlowNode, ListViewProcessInstance,
    ListViewVariable, Record, UsageMetric, UserTask, ValueType,
};
use crate::infra::{BatchRequest, ExporterError, Result};

/// Document types that can live in an [`Accumulator`]
pub trait AccumulatorEntity: Sized {
    fn into_accumulator(self) -> Accumulator;
    fn from_accumulator(accumulator: &Accumulator) -> Option<&Self>;
    fn from_accumulator_mut(accumulator: &mut Accumulator) -> Option<&mut Self>;
}

macro_rules! accumulators {
    ($($entity:ident),* $(,)?) => {
        /// In-batch state of one document
        #[derive(Debug, Clone, PartialEq)]
        pub enum Accumulator {
            $($entity($entity)),*
        }

        $(
            impl AccumulatorEntity for $entity {
                fn into_accumulator(self) -> Accumulator {
                    Accumulator::$entity(self)
                }

                fn from_accumulator(accumulator: &Accumulator) -> Option<&Self> {
                    match accumulator {
                        Accumulator::$entity(entity) => Some(entity),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_accumulator_mut(accumulator: &mut Accumulator) -> Option<&mut Self> {
                    match accumulator {
                        Accumulator::$entity(entity) => Some(entity),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

accumulators!(
    ListViewProcessInstance,
    ListViewFlowNode,
    ListViewVariable,
    FlowNodeInstance,
    Incident,
    Event,
    DecisionInstance,
    UserTask,
    UsageMetric,
);

fn foreign_accumulator(handler: &str) -> ExporterError {
    ExporterError::Internal(format!("{} received an accumulator of another document type", handler))
}

fn update_with<H>(handler: &H, record: &Record, accumulator: &mut Accumulator) -> Result<()>
where
    H: ProjectionHandler,
    H::Entity: AccumulatorEntity,
{
    let entity = H::Entity::from_accumulator_mut(accumulator)
        .ok_or_else(|| foreign_accumulator(handler.name()))?;
    handler.update_entity(record, entity)
}

fn flush_with<H>(handler: &H, accumulator: &Accumulator, batch: &mut BatchRequest) -> Result<()>
where
    H: ProjectionHandler,
    H::Entity: AccumulatorEntity,
{
    let entity = H::Entity::from_accumulator(accumulator)
        .ok_or_else(|| foreign_accumulator(handler.name()))?;
    handler.flush(entity, batch)
}

macro_rules! handlers {
    ($($variant:ident($handler:ty)),* $(,)?) => {
        /// Every handler the exporter knows
        pub enum Handler {
            $($variant($handler)),*
        }

        $(
            impl From<$handler> for Handler {
                fn from(handler: $handler) -> Self {
                    Handler::$variant(handler)
                }
            }
        )*

        impl Handler {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Handler::$variant(h) => h.name()),*
                }
            }

            pub fn handled_kind(&self) -> ValueType {
                match self {
                    $(Handler::$variant(h) => h.handled_kind()),*
                }
            }

            pub fn handles_event(&self, record: &Record) -> bool {
                match self {
                    $(Handler::$variant(h) => h.handles_event(record)),*
                }
            }

            pub fn generate_ids(&self, record: &Record) -> Vec<String> {
                match self {
                    $(Handler::$variant(h) => h.generate_ids(record)),*
                }
            }

            pub fn create(&self, id: &str) -> Accumulator {
                match self {
                    $(Handler::$variant(h) => h.create_new_entity(id).into_accumulator()),*
                }
            }

            pub fn update(&self, record: &Record, accumulator: &mut Accumulator) -> Result<()> {
                match self {
                    $(Handler::$variant(h) => update_with(h, record, accumulator)),*
                }
            }

            pub fn flush(&self, accumulator: &Accumulator, batch: &mut BatchRequest) -> Result<()> {
                match self {
                    $(Handler::$variant(h) => flush_with(h, accumulator, batch)),*
                }
            }

            pub fn index_name(&self) -> &str {
                match self {
                    $(Handler::$variant(h) => h.index_name()),*
                }
            }
        }
    };
}

handlers!(
    ListViewProcessInstance(ListViewProcessInstanceHandler),
    ListViewFlowNode(ListViewFlowNodeHandler),
    ListViewFlowNodeFromIncident(ListViewFlowNodeFromIncidentHandler),
    ListViewFlowNodeFromJob(ListViewFlowNodeFromJobHandler),
    ListViewVariable(ListViewVariableHandler),
    FlowNodeInstance(FlowNodeInstanceHandler),
    FlowNodeInstanceFromIncident(FlowNodeInstanceFromIncidentHandler),
    Incident(IncidentHandler),
    EventFromProcessInstance(EventFromProcessInstanceHandler),
    EventFromIncident(EventFromIncidentHandler),
    EventFromJob(EventFromJobHandler),
    DecisionInstance(DecisionInstanceHandler),
    UserTask(UserTaskHandler),
    MetricFromProcessInstance(MetricFromProcessInstanceHandler),
);

/// Maps record kinds to the handlers interested in them
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
    by_kind: HashMap<ValueType, Vec<usize>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler, writing to the configured indices
    pub fn standard(
        config: &ExporterConfig,
        hierarchy: Arc<dyn HierarchyLookup>,
        operations: Arc<dyn OperationCompletionSink>,
    ) -> Self {
        let list_view = config.index_name("list-view");
        let flow_node_instance = config.index_name("flownode-instance");
        let event = config.index_name("event");

        let mut registry = Self::new();
        registry
            .register(ListViewProcessInstanceHandler::new(&list_view, operations.clone()))
            .register(ListViewFlowNodeHandler::new(&list_view))
            .register(ListViewFlowNodeFromIncidentHandler::new(&list_view))
            .register(ListViewFlowNodeFromJobHandler::new(&list_view))
            .register(ListViewVariableHandler::new(&list_view, operations.clone()))
            .register(FlowNodeInstanceHandler::new(&flow_node_instance, hierarchy.clone()))
            .register(FlowNodeInstanceFromIncidentHandler::new(&flow_node_instance))
            .register(IncidentHandler::new(config.index_name("incident"), hierarchy, operations))
            .register(EventFromProcessInstanceHandler::new(&event))
            .register(EventFromIncidentHandler::new(&event))
            .register(EventFromJobHandler::new(&event))
            .register(DecisionInstanceHandler::new(config.index_name("decision-instance")))
            .register(UserTaskHandler::new(config.index_name("task")))
            .register(MetricFromProcessInstanceHandler::new(config.index_name("metric")));
        registry
    }

    pub fn register(&mut self, handler: impl Into<Handler>) -> &mut Self {
        let handler = handler.into();
        self.by_kind
            .entry(handler.handled_kind())
            .or_default()
            .push(self.handlers.len());
        self.handlers.push(handler);
        self
    }

    /// Handlers (with their registry index) that accept `record`
    pub fn handlers_for<'a>(
        &'a self,
        record: &'a Record,
    ) -> impl Iterator<Item = (usize, &'a Handler)> + 'a {
        self.by_kind
            .get(&record.value_type())
            .into_iter()
            .flatten()
            .filter_map(move |&index| {
                self.handlers
                    .get(index)
                    .filter(|handler| handler.handles_event(record))
                    .map(|handler| (index, handler))
            })
    }

    pub fn get(&self, index: usize) -> Option<&Handler> {
        self.handlers.get(index)
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Intent;
    use crate::projection::fixtures::*;
    use crate::projection::{NoHierarchy, NoopOperationSink};

    fn registry() -> HandlerRegistry {
        HandlerRegistry::standard(
            &ExporterConfig::default(),
            Arc::new(NoHierarchy),
            Arc::new(NoopOperationSink),
        )
    }

    fn names(registry: &HandlerRegistry, record: &Record) -> Vec<&'static str> {
        registry.handlers_for(record).map(|(_, h)| h.name()).collect()
    }

    #[test]
    fn test_root_activation_fans_out_to_summary_and_metric() {
        let registry = registry();
        assert_eq!(
            names(&registry, &process(1, Intent::ElementActivating)),
            vec!["list-view-process-instance", "metric-from-process-instance"]
        );
    }

    #[test]
    fn test_element_activation_fans_out() {
        let registry = registry();
        assert_eq!(
            names(&registry, &task(5, 1, Intent::ElementActivating)),
            vec!["list-view-flow-node", "flow-node-instance", "event-from-process-instance"]
        );
    }

    #[test]
    fn test_incident_fans_out() {
        let registry = registry();
        assert_eq!(
            names(&registry, &incident(30, 5, 1, Intent::Created)),
            vec![
                "list-view-flow-node-from-incident",
                "flow-node-instance-from-incident",
                "incident",
                "event-from-incident"
            ]
        );
    }

    #[test]
    fn test_index_names_use_prefix() {
        let registry = registry();
        let indices: Vec<&str> = registry.handlers().iter().map(|h| h.index_name()).collect();
        assert!(indices.iter().all(|i| i.starts_with("operate-")));
        assert!(indices.contains(&"operate-list-view"));
    }

    #[test]
    fn test_foreign_accumulator_is_rejected() {
        let registry = registry();
        let handler = registry.get(0).unwrap();
        let mut foreign = UsageMetric::new("1").into_accumulator();
        let result = handler.update(&process(1, Intent::ElementActivating), &mut foreign);
        assert!(matches!(result, Err(ExporterError::Internal(_))));
    }

    #[test]
    fn test_unknown_intent_reaches_no_handler() {
        let registry = registry();
        assert!(names(&registry, &task(5, 1, Intent::Unknown)).is_empty());
    }
}
