// 🗄️ Entity Stores
//
// The query engine never touches storage directly. It needs three
// capabilities: fetch everything of a type, fetch by identification, and
// fetch by field filter inside a time window.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::model::{DataItem, EntityType, Field, Identification};
use crate::temporal::{resolve_current, Entity, TimeWindow};
use anyhow::Result;
use std::collections::HashSet;

// ============================================================================
// FILTER
// ============================================================================

/// `field IN values`
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub field: Field,
    pub values: Vec<String>,
}

/// Conjunction of criteria over one entity type, restricted to a time window.
///
/// An entity matches when one of its effects inside the window carries data
/// items that together satisfy every criterion. For a single-instant window
/// only the effect `resolve_current` would pick is considered, so a match is
/// always judged on the data that gets projected.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFilter {
    pub kind: EntityType,
    pub criteria: Vec<Criterion>,
    pub window: TimeWindow,
}

impl EntityFilter {
    pub fn new(kind: EntityType, window: TimeWindow) -> Self {
        EntityFilter {
            kind,
            criteria: Vec::new(),
            window,
        }
    }

    pub fn with(mut self, field: Field, values: Vec<String>) -> Self {
        self.criteria.push(Criterion { field, values });
        self
    }

    pub fn with_reference(self, field: Field, id: Identification) -> Self {
        self.with(field, vec![id.to_string()])
    }

    pub fn with_references<'a>(
        self,
        field: Field,
        ids: impl IntoIterator<Item = &'a Identification>,
    ) -> Self {
        self.with(field, ids.into_iter().map(|id| id.to_string()).collect())
    }

    /// A criterion with no accepted values can never match.
    pub fn is_unsatisfiable(&self) -> bool {
        self.criteria.iter().any(|c| c.values.is_empty())
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if entity.kind != self.kind || self.is_unsatisfiable() {
            return false;
        }
        let holds = |items: &[DataItem]| self.criteria.iter().all(|c| criterion_holds(c, items));

        if self.window.is_instant() {
            let current = resolve_current(entity, self.window.from);
            return !current.is_empty() && holds(current);
        }
        entity.effects_in(&self.window).any(|effect| holds(&effect.data))
    }
}

fn criterion_holds(criterion: &Criterion, items: &[DataItem]) -> bool {
    items.iter().any(|item| {
        item.field_value(criterion.field)
            .map_or(false, |value| criterion.values.contains(&value))
    })
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Read-only access to loaded entity histories.
///
/// Results are returned in the store's natural enumeration order.
/// Identifications unknown to the store are skipped, not errors.
pub trait RegistryStore: Send + Sync {
    fn fetch_all(&self, kind: EntityType) -> Result<Vec<Entity>>;

    fn fetch_by_ids(&self, kind: EntityType, ids: &HashSet<Identification>) -> Result<Vec<Entity>>;

    fn fetch_matching(&self, filter: &EntityFilter) -> Result<Vec<Entity>>;
}

impl<S: RegistryStore + ?Sized> RegistryStore for std::sync::Arc<S> {
    fn fetch_all(&self, kind: EntityType) -> Result<Vec<Entity>> {
        (**self).fetch_all(kind)
    }

    fn fetch_by_ids(&self, kind: EntityType, ids: &HashSet<Identification>) -> Result<Vec<Entity>> {
        (**self).fetch_by_ids(kind, ids)
    }

    fn fetch_matching(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        (**self).fetch_matching(filter)
    }
}
