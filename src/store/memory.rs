// In-memory entity store
//
// Holds every entity in insertion order and counts fetch calls per entity
// type, so batch behaviour can be asserted in tests.

use super::{EntityFilter, RegistryStore};
use crate::model::{EntityType, Identification};
use crate::temporal::Entity;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

pub struct MemoryStore {
    entities: RwLock<Vec<Entity>>,
    fetches: RwLock<HashMap<EntityType, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entities: RwLock::new(Vec::new()),
            fetches: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let store = MemoryStore::new();
        if let Ok(mut guard) = store.entities.write() {
            *guard = entities;
        }
        store
    }

    /// Add a full entity history. An entity already present under the same
    /// identification is replaced in place, keeping its position.
    pub fn insert(&self, entity: Entity) -> Result<()> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        match entities
            .iter_mut()
            .find(|e| e.kind == entity.kind && e.id == entity.id)
        {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
        Ok(())
    }

    pub fn insert_all(&self, entities: impl IntoIterator<Item = Entity>) -> Result<usize> {
        let mut count = 0;
        for entity in entities {
            self.insert(entity)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetch calls issued for `kind` so far.
    pub fn fetch_count(&self, kind: EntityType) -> usize {
        self.fetches
            .read()
            .map(|f| f.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn reset_fetch_counts(&self) {
        if let Ok(mut fetches) = self.fetches.write() {
            fetches.clear();
        }
    }

    fn scan<F>(&self, kind: EntityType, keep: F) -> Result<Vec<Entity>>
    where
        F: Fn(&Entity) -> bool,
    {
        if let Ok(mut fetches) = self.fetches.write() {
            *fetches.entry(kind).or_insert(0) += 1;
        }

        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(entities
            .iter()
            .filter(|e| e.kind == kind && keep(e))
            .cloned()
            .collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore for MemoryStore {
    fn fetch_all(&self, kind: EntityType) -> Result<Vec<Entity>> {
        self.scan(kind, |_| true)
    }

    fn fetch_by_ids(&self, kind: EntityType, ids: &HashSet<Identification>) -> Result<Vec<Entity>> {
        self.scan(kind, |e| ids.contains(&e.id))
    }

    fn fetch_matching(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        self.scan(filter.kind, |e| filter.matches(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataItem, Field, LocalityData};
    use crate::temporal::{Effect, Interval, Registration, TimeWindow};
    use chrono::Utc;

    fn locality(uuid: &str, municipality: Identification, name: &str) -> Entity {
        Entity::new(
            EntityType::Locality,
            uuid.parse().unwrap(),
            vec![Registration::new(
                Interval::default(),
                vec![Effect::new(
                    Interval::default(),
                    vec![DataItem::Locality(LocalityData {
                        name: Some(name.to_string()),
                        municipality: Some(municipality),
                        ..Default::default()
                    })],
                )],
            )],
        )
    }

    fn municipality() -> Identification {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let store = MemoryStore::new();
        store
            .insert_all(vec![
                locality("00000000-0000-0000-0000-000000000003", municipality(), "C"),
                locality("00000000-0000-0000-0000-000000000001", municipality(), "A"),
                locality("00000000-0000-0000-0000-000000000002", municipality(), "B"),
            ])
            .unwrap();

        let filter = EntityFilter::new(EntityType::Locality, TimeWindow::at(Utc::now()))
            .with_reference(Field::Municipality, municipality());
        let found = store.fetch_matching(&filter).unwrap();

        let order: Vec<String> = found.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "00000000-0000-0000-0000-000000000003",
                "00000000-0000-0000-0000-000000000001",
                "00000000-0000-0000-0000-000000000002",
            ]
        );
    }

    #[test]
    fn test_insert_replaces_same_identity() {
        let store = MemoryStore::new();
        let id = "00000000-0000-0000-0000-000000000001";
        store.insert(locality(id, municipality(), "Old")).unwrap();
        store.insert(locality(id, municipality(), "New")).unwrap();

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fetch_by_ids_skips_unknown() {
        let store = MemoryStore::new();
        let known = locality("00000000-0000-0000-0000-000000000001", municipality(), "A");
        let known_id = known.id;
        store.insert(known).unwrap();

        let ids: HashSet<Identification> = [
            known_id,
            "00000000-0000-0000-0000-0000000000ff".parse().unwrap(),
        ]
        .into_iter()
        .collect();

        let found = store.fetch_by_ids(EntityType::Locality, &ids).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, known_id);
        assert_eq!(store.fetch_count(EntityType::Locality), 1);
        assert_eq!(store.fetch_count(EntityType::Road), 0);
    }
}
