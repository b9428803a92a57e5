//! Per-batch entity accumulation
//!
//! Every (handler, document id) pair owns exactly one accumulator per batch.
//! The first record addressed to the pair creates it; every record updates
//! it in arrival order. A mapping failure poisons only its own pair: later
//! records for that pair are ignored and nothing is flushed for it.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Accumulator, HandlerRegistry};
use crate::domain::{Record, ValueType};
use crate::infra::{BatchRequest, ExporterError, MappingFailure};

#[derive(Debug, Clone, Copy)]
struct Origin {
    kind: ValueType,
    key: i64,
    position: i64,
}

impl From<&Record> for Origin {
    fn from(record: &Record) -> Self {
        Self {
            kind: record.value_type(),
            key: record.key,
            position: record.position,
        }
    }
}

struct Slot {
    handler: usize,
    id: String,
    accumulator: Accumulator,
    /// Last record applied (or attempted) on this slot
    origin: Origin,
    failure: Option<MappingFailure>,
}

/// Counters for one materialized batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeStats {
    /// Records that reached at least one handler
    pub records_mapped: usize,
    /// Records no handler was interested in
    pub records_skipped: usize,
    /// (handler, record, document) updates applied
    pub updates: usize,
}

/// Accumulates the documents touched by one batch of records
pub struct EntityMaterializer<'r> {
    registry: &'r HandlerRegistry,
    slots: Vec<Slot>,
    by_target: HashMap<(usize, String), usize>,
    stats: MaterializeStats,
}

impl<'r> EntityMaterializer<'r> {
    pub fn new(registry: &'r HandlerRegistry) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            by_target: HashMap::new(),
            stats: MaterializeStats::default(),
        }
    }

    /// Route one record through every interested handler
    ///
    /// Returns the number of handlers that accepted the record.
    pub fn apply(&mut self, record: &Record) -> usize {
        let registry = self.registry;
        let mut accepted = 0;

        for (handler_index, handler) in registry.handlers_for(record) {
            accepted += 1;
            for id in handler.generate_ids(record) {
                let slot_index = match self.by_target.get(&(handler_index, id.clone())) {
                    Some(&existing) => existing,
                    None => {
                        let slot_index = self.slots.len();
                        self.slots.push(Slot {
                            handler: handler_index,
                            accumulator: handler.create(&id),
                            id: id.clone(),
                            origin: Origin::from(record),
                            failure: None,
                        });
                        self.by_target.insert((handler_index, id), slot_index);
                        slot_index
                    }
                };

                let Some(slot) = self.slots.get_mut(slot_index) else {
                    continue;
                };
                if slot.failure.is_some() {
                    continue;
                }

                slot.origin = Origin::from(record);
                match handler.update(record, &mut slot.accumulator) {
                    Ok(()) => self.stats.updates += 1,
                    Err(error) => {
                        let failure = mapping_failure(handler.name(), &slot.id, slot.origin, &error);
                        warn!(
                            kind = %failure.kind,
                            key = failure.key,
                            position = failure.position,
                            handler = %failure.handler,
                            id = %failure.id,
                            error = %failure.message,
                            "Failed to map record"
                        );
                        slot.failure = Some(failure);
                    }
                }
            }
        }

        if accepted == 0 {
            self.stats.records_skipped += 1;
        } else {
            self.stats.records_mapped += 1;
        }
        accepted
    }

    pub fn apply_all<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            self.apply(record);
        }
    }

    /// Number of distinct (handler, id) documents accumulated
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> MaterializeStats {
        self.stats
    }

    /// Current accumulator of (handler name, id)
    pub fn get(&self, handler: &str, id: &str) -> Option<&Accumulator> {
        self.slots
            .iter()
            .find(|slot| {
                slot.id == id
                    && self
                        .registry
                        .get(slot.handler)
                        .is_some_and(|h| h.name() == handler)
            })
            .map(|slot| &slot.accumulator)
    }

    /// Emit one write per healthy accumulator, in first-touch order
    ///
    /// Returns every mapping failure of the batch, including failures raised
    /// while planning a write.
    pub fn flush(self, batch: &mut BatchRequest) -> Vec<MappingFailure> {
        let mut failures = Vec::new();

        for slot in self.slots {
            if let Some(failure) = slot.failure {
                failures.push(failure);
                continue;
            }
            let Some(handler) = self.registry.get(slot.handler) else {
                continue;
            };
            if let Err(error) = handler.flush(&slot.accumulator, batch) {
                let failure = mapping_failure(handler.name(), &slot.id, slot.origin, &error);
                warn!(
                    kind = %failure.kind,
                    key = failure.key,
                    position = failure.position,
                    handler = %failure.handler,
                    id = %failure.id,
                    error = %failure.message,
                    "Failed to plan write"
                );
                failures.push(failure);
            }
        }

        debug!(
            writes = batch.len(),
            failures = failures.len(),
            "Flushed accumulated documents"
        );
        failures
    }
}

fn mapping_failure(handler: &str, id: &str, origin: Origin, error: &ExporterError) -> MappingFailure {
    MappingFailure {
        handler: handler.to_string(),
        id: id.to_string(),
        kind: origin.kind,
        key: origin.key,
        position: origin.position,
        message: error.to_string(),
    }
}
