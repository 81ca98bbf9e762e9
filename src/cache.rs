// 🏛️ Municipality Cache - code → identification
//
// Built once at startup by scanning every municipality and reading its
// current, non-zero code. A rebuild constructs a complete new map off to the
// side and swaps it in; readers always see one whole generation.

use crate::model::{non_zero, DataItem, EntityType, Identification};
use crate::store::RegistryStore;
use crate::temporal::{resolve_current, Entity};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// First non-zero code among the data items current at `as_of`.
fn current_code(municipality: &Entity, as_of: DateTime<Utc>) -> Option<i32> {
    resolve_current(municipality, as_of).iter().find_map(|item| match item {
        DataItem::Municipality(data) => non_zero(data.code),
        _ => None,
    })
}

#[derive(Debug, Default)]
struct Generation {
    number: u64,
    codes: HashMap<i32, Identification>,
}

/// Process-wide municipality lookup. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MunicipalityCache {
    current: RwLock<Arc<Generation>>,
}

impl MunicipalityCache {
    /// Empty cache (generation 0). Call `rebuild` before serving queries.
    pub fn empty() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Generation> {
        // The lock only guards a pointer swap, so a poisoned lock still holds
        // a complete generation.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, code: i32) -> Option<Identification> {
        self.snapshot().codes.get(&code).copied()
    }

    /// Reverse lookup by scanning the current generation.
    pub fn code_of(&self, id: Identification) -> Option<i32> {
        self.snapshot()
            .codes
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(code, _)| *code)
    }

    pub fn len(&self) -> usize {
        self.snapshot().codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().number
    }

    /// Full rebuild from the store. On error the previous generation stays.
    pub fn rebuild<S: RegistryStore + ?Sized>(&self, store: &S, as_of: DateTime<Utc>) -> Result<usize> {
        let municipalities = store.fetch_all(EntityType::Municipality)?;

        let mut codes = HashMap::new();
        for municipality in &municipalities {
            if let Some(code) = current_code(municipality, as_of) {
                codes.insert(code, municipality.id);
            }
        }
        let size = codes.len();

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let number = current.number + 1;
        *current = Arc::new(Generation { number, codes });
        drop(current);

        info!(generation = number, municipalities = size, "municipality cache rebuilt");
        Ok(size)
    }
}
