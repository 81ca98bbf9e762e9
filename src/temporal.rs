// ⏰ Temporal Model - Bitemporal version histories
//
// Two distinct times:
// 1. Registration time: when a fact was recorded (or corrected) in the registry
// 2. Effect time: when the fact was true in the real world
//
// An entity is a stable identity plus an append-only list of registrations.
// Each registration nests the effects it knows about, and each effect carries
// the data items that were true during it.

use crate::model::{
    AddressData, BNumberData, DataItem, EntityType, Identification, LocalityData, RoadData,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// INTERVAL
// ============================================================================

/// Half-open interval `[from, to)`. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Interval { from, to }
    }

    /// Interval starting at `from` that is still open.
    pub fn since(from: DateTime<Utc>) -> Self {
        Interval { from: Some(from), to: None }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Interval { from: Some(from), to: Some(to) }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| from <= t) && self.to.map_or(true, |to| to > t)
    }

    /// True when some instant of `window` lies inside this interval.
    pub fn overlaps(&self, window: &TimeWindow) -> bool {
        self.from.map_or(true, |from| from <= window.to)
            && self.to.map_or(true, |to| to > window.from)
    }
}

// ============================================================================
// TIME WINDOW
// ============================================================================

/// Closed range of instants a store query is restricted to.
///
/// `TimeWindow::at(t)` is the single instant `t`; that is what every
/// "current data" query uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn at(t: DateTime<Utc>) -> Self {
        TimeWindow { from: t, to: t }
    }

    pub fn is_instant(&self) -> bool {
        self.from == self.to
    }
}

// ============================================================================
// EFFECT / REGISTRATION / ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(flatten)]
    pub interval: Interval,
    #[serde(default)]
    pub data: Vec<DataItem>,
}

impl Effect {
    pub fn new(interval: Interval, data: Vec<DataItem>) -> Self {
        Effect { interval, data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(flatten)]
    pub interval: Interval,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Registration {
    pub fn new(interval: Interval, effects: Vec<Effect>) -> Self {
        Registration { interval, effects }
    }

    /// The effect in force at `t`. Overlapping effects should not exist,
    /// but if they do the latest start wins; ties go to the last listed.
    pub fn effect_at(&self, t: DateTime<Utc>) -> Option<&Effect> {
        latest_containing(&self.effects, t, |e| &e.interval)
    }
}

/// Stable identity plus its full version history. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityType,
    #[serde(rename = "uuid")]
    pub id: Identification,
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

impl Entity {
    pub fn new(kind: EntityType, id: Identification, registrations: Vec<Registration>) -> Self {
        Entity { kind, id, registrations }
    }

    /// The registration known at `t`, latest `from` winning ties.
    pub fn registration_at(&self, t: DateTime<Utc>) -> Option<&Registration> {
        latest_containing(&self.registrations, t, |r| &r.interval)
    }

    /// Every effect that may hold data inside `window`.
    pub fn effects_in<'a>(&'a self, window: &'a TimeWindow) -> impl Iterator<Item = &'a Effect> {
        self.registrations
            .iter()
            .filter(move |r| r.interval.overlaps(window))
            .flat_map(|r| r.effects.iter())
            .filter(move |e| e.interval.overlaps(window))
    }
}

fn latest_containing<T>(
    items: &[T],
    t: DateTime<Utc>,
    interval: impl Fn(&T) -> &Interval,
) -> Option<&T> {
    // `None` start sorts before any concrete start.
    items
        .iter()
        .filter(|item| interval(item).contains(t))
        .max_by_key(|item| interval(item).from)
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Data items of `entity` valid at `as_of` on both axes.
///
/// Empty when no registration or no effect covers `as_of`; that is "not known
/// at this instant", not an error.
pub fn resolve_current(entity: &Entity, as_of: DateTime<Utc>) -> &[DataItem] {
    entity
        .registration_at(as_of)
        .and_then(|registration| registration.effect_at(as_of))
        .map(|effect| effect.data.as_slice())
        .unwrap_or(&[])
}

/// Resolved view of one entity at one instant.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub id: Identification,
    pub items: &'a [DataItem],
}

impl<'a> Snapshot<'a> {
    pub fn of(entity: &'a Entity, as_of: DateTime<Utc>) -> Self {
        Snapshot {
            id: entity.id,
            items: resolve_current(entity, as_of),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn locality(&self) -> LocalityData {
        let mut out = LocalityData::default();
        for item in self.items {
            if let DataItem::Locality(d) = item {
                out.absorb(d);
            }
        }
        out
    }

    pub fn road(&self) -> RoadData {
        let mut out = RoadData::default();
        for item in self.items {
            if let DataItem::Road(d) = item {
                out.absorb(d);
            }
        }
        out
    }

    pub fn bnumber(&self) -> BNumberData {
        let mut out = BNumberData::default();
        for item in self.items {
            if let DataItem::BNumber(d) = item {
                out.absorb(d);
            }
        }
        out
    }

    pub fn address(&self) -> AddressData {
        let mut out = AddressData::default();
        for item in self.items {
            if let DataItem::Address(d) = item {
                out.absorb(d);
            }
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
