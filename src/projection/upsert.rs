//! Upsert planning
//!
//! Turns an accumulated entity into one idempotent write:
//! - **Plain upsert**: the selected fields replace the stored ones
//! - **Guarded upsert**: the selected fields and the kind's position field
//!   are applied atomically only when the stored position is absent or
//!   lower than the incoming one; otherwise the store turns the write into
//!   a no-op
//!
//! All handlers share [`guarded_merge_script`]; none carries its own script.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::infra::{BatchRequest, ExporterError, Result, UpdateScript};

/// Build the conditional merge script for `guard_field` over `params`
///
/// `params` must contain the incoming value of `guard_field`.
pub fn guarded_merge_script(guard_field: &str, params: Map<String, Value>) -> UpdateScript {
    let assignments: String = params
        .keys()
        .map(|field| format!("ctx._source.{field} = params.{field}; "))
        .collect();
    let source = format!(
        "if (ctx._source.{g} == null || ctx._source.{g} < params.{g}) {{ {assignments}}} else {{ ctx.op = 'noop'; }}",
        g = guard_field,
        assignments = assignments,
    );

    UpdateScript {
        source,
        guard_field: guard_field.to_string(),
        params,
    }
}

/// Write plan for one (index, id) document
#[derive(Debug)]
pub struct UpsertPlan<'a, T: Serialize> {
    index: &'a str,
    id: &'a str,
    entity: &'a T,
    document: Map<String, Value>,
    fields: Map<String, Value>,
    routing: Option<String>,
    guard: Option<&'static str>,
}

impl<'a, T: Serialize> UpsertPlan<'a, T> {
    pub fn new(index: &'a str, id: &'a str, entity: &'a T) -> Result<Self> {
        let document = match serde_json::to_value(entity)? {
            Value::Object(map) => map,
            other => {
                return Err(ExporterError::Internal(format!(
                    "entity for {}/{} is not an object: {}",
                    index, id, other
                )))
            }
        };

        Ok(Self {
            index,
            id,
            entity,
            document,
            fields: Map::new(),
            routing: None,
            guard: None,
        })
    }

    /// Store the document next to `routing`
    pub fn routed(mut self, routing: String) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Make the update conditional on the kind-owned `field`
    pub fn guarded_by(mut self, field: &'static str) -> Self {
        self.guard = Some(field);
        self
    }

    /// Update these fields, writing `null` where the entity has none
    pub fn set(mut self, names: &[&str]) -> Self {
        for name in names {
            let value = self.document.get(*name).cloned().unwrap_or(Value::Null);
            self.fields.insert((*name).to_string(), value);
        }
        self
    }

    /// Update these fields only where the entity carries a value
    pub fn set_if_present(mut self, names: &[&str]) -> Self {
        for name in names {
            match self.document.get(*name) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    self.fields.insert((*name).to_string(), value.clone());
                }
            }
        }
        self
    }

    /// Update every field except the id
    pub fn set_all(mut self) -> Self {
        for (name, value) in &self.document {
            if name != "id" {
                self.fields.insert(name.clone(), value.clone());
            }
        }
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Add the planned write to the batch
    pub fn submit(self, batch: &mut BatchRequest) -> Result<()> {
        let Some(guard) = self.guard else {
            return match &self.routing {
                Some(routing) => {
                    batch.upsert_with_routing(self.index, self.id, self.entity, self.fields, routing)
                }
                None => batch.upsert(self.index, self.id, self.entity, self.fields),
            };
        };

        let position = match self.document.get(guard) {
            Some(value) if value.is_i64() => value.clone(),
            _ => {
                return Err(ExporterError::Internal(format!(
                    "{}/{} has no {} to guard the update with",
                    self.index, self.id, guard
                )))
            }
        };

        let mut params = self.fields;
        params.insert(guard.to_string(), position);
        let script = guarded_merge_script(guard, params);

        match &self.routing {
            Some(routing) => batch.upsert_with_script_and_routing(
                self.index,
                self.id,
                self.entity,
                script,
                routing,
            ),
            None => batch.upsert_with_script(self.index, self.id, self.entity, script),
        }
    }
}
