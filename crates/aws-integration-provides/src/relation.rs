//! Relation transport abstraction
//!
//! The relation-data bus is owned by the host framework. This module only
//! describes the view the interface needs of it: the units that joined or
//! departed, what each of them sent, and the per-relation outgoing payload.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Snapshot of one remote unit on the relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUnit {
    /// Relation the unit belongs to (e.g. "aws:3")
    pub relation_id: String,

    /// Unit name (e.g. "kubernetes-worker/0")
    pub unit_name: String,

    /// Application name (e.g. "kubernetes-worker")
    pub application_name: String,

    /// Data the unit published to us
    pub received: Map<String, Value>,
}

impl RemoteUnit {
    /// Creates a unit, deriving the application name from the unit name.
    pub fn new(
        relation_id: impl Into<String>,
        unit_name: impl Into<String>,
        received: Map<String, Value>,
    ) -> Self {
        let unit_name = unit_name.into();
        let application_name = unit_name
            .split_once('/')
            .map(|(app, _)| app.to_string())
            .unwrap_or_else(|| unit_name.clone());
        Self {
            relation_id: relation_id.into(),
            unit_name,
            application_name,
            received,
        }
    }

    pub fn with_application(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = application_name.into();
        self
    }
}

/// Access to the relation data bus.
///
/// `joined_units` must return units in a stable order; requests are
/// produced in that order.
pub trait RelationTransport {
    /// Units currently joined across all relations of the endpoint
    fn joined_units(&self) -> Result<Vec<RemoteUnit>>;

    /// Units that left since the departed set was last cleared
    fn departed_units(&self) -> Result<Vec<RemoteUnit>>;

    /// Forget the departed units
    fn clear_departed_units(&mut self) -> Result<()>;

    /// Read a key from the outgoing payload of a relation
    fn published(&self, relation_id: &str, key: &str) -> Result<Option<Value>>;

    /// Write a key into the outgoing payload of a relation
    fn publish(&mut self, relation_id: &str, key: &str, value: Value) -> Result<()>;
}

/// In-process transport, used by tests and by hosts that assemble the
/// relation view themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    joined: Vec<RemoteUnit>,
    departed: Vec<RemoteUnit>,
    to_publish: HashMap<String, Map<String, Value>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, or replace the received data of an already joined one
    pub fn join(&mut self, unit: RemoteUnit) {
        match self
            .joined
            .iter_mut()
            .find(|u| u.unit_name == unit.unit_name && u.relation_id == unit.relation_id)
        {
            Some(existing) => *existing = unit,
            None => self.joined.push(unit),
        }
    }

    /// Move a unit from the joined set to the departed set
    pub fn depart(&mut self, relation_id: &str, unit_name: &str) -> Option<RemoteUnit> {
        let pos = self
            .joined
            .iter()
            .position(|u| u.unit_name == unit_name && u.relation_id == relation_id)?;
        let unit = self.joined.remove(pos);
        self.departed.push(unit.clone());
        Some(unit)
    }

    /// Replace the data received from a joined unit
    pub fn update(
        &mut self,
        relation_id: &str,
        unit_name: &str,
        received: Map<String, Value>,
    ) -> bool {
        match self
            .joined
            .iter_mut()
            .find(|u| u.unit_name == unit_name && u.relation_id == relation_id)
        {
            Some(unit) => {
                unit.received = received;
                true
            }
            None => false,
        }
    }

    /// Full outgoing payload of a relation
    pub fn published_data(&self, relation_id: &str) -> Option<&Map<String, Value>> {
        self.to_publish.get(relation_id)
    }

    /// Drop a key from the outgoing payload
    pub fn unpublish(&mut self, relation_id: &str, key: &str) -> Option<Value> {
        self.to_publish.get_mut(relation_id)?.remove(key)
    }
}

impl RelationTransport for MemoryTransport {
    fn joined_units(&self) -> Result<Vec<RemoteUnit>> {
        Ok(self.joined.clone())
    }

    fn departed_units(&self) -> Result<Vec<RemoteUnit>> {
        Ok(self.departed.clone())
    }

    fn clear_departed_units(&mut self) -> Result<()> {
        self.departed.clear();
        Ok(())
    }

    fn published(&self, relation_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .to_publish
            .get(relation_id)
            .and_then(|data| data.get(key))
            .cloned())
    }

    fn publish(&mut self, relation_id: &str, key: &str, value: Value) -> Result<()> {
        self.to_publish
            .entry(relation_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_application_name_from_unit_name() {
        let unit = RemoteUnit::new("aws:1", "kubernetes-worker/3", Map::new());
        assert_eq!(unit.application_name, "kubernetes-worker");

        let unit = RemoteUnit::new("aws:1", "odd-name", Map::new());
        assert_eq!(unit.application_name, "odd-name");

        let unit = unit.with_application("explicit");
        assert_eq!(unit.application_name, "explicit");
    }

    #[test]
    fn test_join_replaces_existing_unit() {
        let mut transport = MemoryTransport::new();
        transport.join(RemoteUnit::new("aws:1", "app/0", data(json!({"a": 1}))));
        transport.join(RemoteUnit::new("aws:1", "app/1", Map::new()));
        transport.join(RemoteUnit::new("aws:1", "app/0", data(json!({"a": 2}))));

        let joined = transport.joined_units().unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].unit_name, "app/0");
        assert_eq!(joined[0].received["a"], json!(2));
    }

    #[test]
    fn test_depart_and_clear() {
        let mut transport = MemoryTransport::new();
        transport.join(RemoteUnit::new("aws:1", "app/0", Map::new()));

        assert!(transport.depart("aws:2", "app/0").is_none());
        assert!(transport.depart("aws:1", "app/0").is_some());
        assert!(transport.depart("aws:1", "app/0").is_none());
        assert!(transport.joined_units().unwrap().is_empty());
        assert_eq!(transport.departed_units().unwrap().len(), 1);

        transport.clear_departed_units().unwrap();
        assert!(transport.departed_units().unwrap().is_empty());
    }

    #[test]
    fn test_same_unit_on_two_relations() {
        let mut transport = MemoryTransport::new();
        transport.join(RemoteUnit::new("aws:1", "app/0", data(json!({"a": 1}))));
        transport.join(RemoteUnit::new("aws:2", "app/0", data(json!({"a": 2}))));

        assert!(transport.update("aws:2", "app/0", data(json!({"a": 3}))));
        assert!(!transport.update("aws:3", "app/0", Map::new()));
        let joined = transport.joined_units().unwrap();
        assert_eq!(joined[0].received["a"], json!(1));
        assert_eq!(joined[1].received["a"], json!(3));

        let departed = transport.depart("aws:2", "app/0").unwrap();
        assert_eq!(departed.relation_id, "aws:2");
        let joined = transport.joined_units().unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].relation_id, "aws:1");
    }

    #[test]
    fn test_publish_is_per_relation() {
        let mut transport = MemoryTransport::new();
        transport.publish("aws:1", "completed", json!({"i-1": "abc"})).unwrap();

        assert_eq!(
            transport.published("aws:1", "completed").unwrap(),
            Some(json!({"i-1": "abc"}))
        );
        assert_eq!(transport.published("aws:2", "completed").unwrap(), None);

        transport.unpublish("aws:1", "completed");
        assert_eq!(transport.published("aws:1", "completed").unwrap(), None);
    }
}
