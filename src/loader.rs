// 🔗 Reference Batch Loader
//
// An address points at a road and a building number by identification only.
// Resolving those one at a time turns N results into N+1 store round trips,
// so references are collected across the whole result set first and
// resolved with one bulk fetch per target type.

use crate::model::{EntityType, Identification};
use crate::store::RegistryStore;
use crate::temporal::Entity;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Identification → entity, for one target type.
///
/// A missing key means "reference unresolved"; callers omit dependent fields.
pub type ReferenceMap = HashMap<Identification, Entity>;

pub struct ReferenceBatchLoader<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> ReferenceBatchLoader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ReferenceBatchLoader { store }
    }

    /// One bulk fetch for every identification in `ids`. An empty set issues
    /// no fetch at all.
    pub fn load_many(&self, ids: &HashSet<Identification>, kind: EntityType) -> Result<ReferenceMap> {
        if ids.is_empty() {
            return Ok(ReferenceMap::new());
        }

        let entities = self.store.fetch_by_ids(kind, ids)?;
        let map: ReferenceMap = entities
            .into_iter()
            .filter(|e| ids.contains(&e.id))
            .map(|e| (e.id, e))
            .collect();

        if map.len() < ids.len() {
            warn!(
                kind = %kind,
                requested = ids.len(),
                resolved = map.len(),
                "unresolved references in batch"
            );
        } else {
            debug!(kind = %kind, resolved = map.len(), "batch loaded references");
        }

        Ok(map)
    }
}

/// Distinct non-empty references picked out of a set of resolved values.
pub fn collect_references<T, F>(values: &[T], reference: F) -> HashSet<Identification>
where
    F: Fn(&T) -> Option<Identification>,
{
    values.iter().filter_map(reference).collect()
}
