// 🏠 Registry Model - Identity + typed field payloads
//
// Municipality → locality → road → building number → address.
// Identity (UUID) never changes; the fields below are the values an entity
// carries inside one Effect of one Registration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// IDENTIFICATION
// ============================================================================

/// Stable identity of one real-world registry object.
///
/// Equality and hashing are by UUID alone, across all versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identification(Uuid);

impl Identification {
    pub fn new(uuid: Uuid) -> Self {
        Identification(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for Identification {
    fn from(uuid: Uuid) -> Self {
        Identification(uuid)
    }
}

impl FromStr for Identification {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Identification)
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ============================================================================
// ENTITY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Municipality,
    Locality,
    Road,
    BNumber,
    Address,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Municipality,
        EntityType::Locality,
        EntityType::Road,
        EntityType::BNumber,
        EntityType::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Municipality => "municipality",
            EntityType::Locality => "locality",
            EntityType::Road => "road",
            EntityType::BNumber => "bnumber",
            EntityType::Address => "address",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FIELD PAYLOADS
// ============================================================================

/// Treat `None` and `""` alike: neither contributes a value.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Code 0 is the "no code" sentinel.
pub fn non_zero(code: i32) -> Option<i32> {
    (code != 0).then_some(code)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MunicipalityData {
    pub code: i32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalityData {
    pub code: Option<String>,
    pub name: Option<String>,
    pub abbrev: Option<String>,
    pub municipality: Option<Identification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadData {
    pub code: i32,
    pub name: Option<String>,
    pub alternate_name: Option<String>,
    pub cpr_name: Option<String>,
    pub short_name: Option<String>,
    pub locality: Option<Identification>,
    pub municipality: Option<Identification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BNumberData {
    pub code: Option<String>,
    pub callname: Option<String>,
    pub locality: Option<Identification>,
    pub municipality: Option<Identification>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressData {
    pub house_number: Option<String>,
    pub floor: Option<String>,
    pub door: Option<String>,
    pub residential: Option<bool>,
    pub road: Option<Identification>,
    pub b_number: Option<Identification>,
    pub municipality: Option<Identification>,
}

// ----------------------------------------------------------------------------
// Folding: later non-empty values win over earlier ones
// ----------------------------------------------------------------------------

fn take_text(into: &mut Option<String>, from: &Option<String>) {
    if let Some(v) = non_empty(from) {
        *into = Some(v.to_string());
    }
}

fn take<T: Copy>(into: &mut Option<T>, from: &Option<T>) {
    if from.is_some() {
        *into = *from;
    }
}

impl LocalityData {
    pub fn absorb(&mut self, other: &LocalityData) {
        take_text(&mut self.code, &other.code);
        take_text(&mut self.name, &other.name);
        take_text(&mut self.abbrev, &other.abbrev);
        take(&mut self.municipality, &other.municipality);
    }
}

impl RoadData {
    pub fn absorb(&mut self, other: &RoadData) {
        if let Some(code) = non_zero(other.code) {
            self.code = code;
        }
        take_text(&mut self.name, &other.name);
        take_text(&mut self.alternate_name, &other.alternate_name);
        take_text(&mut self.cpr_name, &other.cpr_name);
        take_text(&mut self.short_name, &other.short_name);
        take(&mut self.locality, &other.locality);
        take(&mut self.municipality, &other.municipality);
    }
}

impl BNumberData {
    pub fn absorb(&mut self, other: &BNumberData) {
        take_text(&mut self.code, &other.code);
        take_text(&mut self.callname, &other.callname);
        take(&mut self.locality, &other.locality);
        take(&mut self.municipality, &other.municipality);
    }
}

impl AddressData {
    pub fn absorb(&mut self, other: &AddressData) {
        take_text(&mut self.house_number, &other.house_number);
        take_text(&mut self.floor, &other.floor);
        take_text(&mut self.door, &other.door);
        take(&mut self.residential, &other.residential);
        take(&mut self.road, &other.road);
        take(&mut self.b_number, &other.b_number);
        take(&mut self.municipality, &other.municipality);
    }
}

// ============================================================================
// DATA ITEM
// ============================================================================

/// Filterable fields. Each DataItem exposes its values for these as text so
/// stores can index them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Code,
    HouseNumber,
    Municipality,
    Locality,
    Road,
    BNumber,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Code,
        Field::HouseNumber,
        Field::Municipality,
        Field::Locality,
        Field::Road,
        Field::BNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Code => "code",
            Field::HouseNumber => "house_number",
            Field::Municipality => "municipality",
            Field::Locality => "locality",
            Field::Road => "road",
            Field::BNumber => "bnumber",
        }
    }
}

/// The field payload of one Effect, one variant per entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataItem {
    Municipality(MunicipalityData),
    Locality(LocalityData),
    Road(RoadData),
    #[serde(rename = "bnumber")]
    BNumber(BNumberData),
    Address(AddressData),
}

impl DataItem {
    pub fn entity_type(&self) -> EntityType {
        match self {
            DataItem::Municipality(_) => EntityType::Municipality,
            DataItem::Locality(_) => EntityType::Locality,
            DataItem::Road(_) => EntityType::Road,
            DataItem::BNumber(_) => EntityType::BNumber,
            DataItem::Address(_) => EntityType::Address,
        }
    }

    /// Non-empty value of `field` in this item, rendered as text.
    pub fn field_value(&self, field: Field) -> Option<String> {
        let reference = |id: &Option<Identification>| id.map(|id| id.to_string());
        match (self, field) {
            (DataItem::Municipality(d), Field::Code) => non_zero(d.code).map(|c| c.to_string()),
            (DataItem::Locality(d), Field::Code) => non_empty(&d.code).map(str::to_string),
            (DataItem::Locality(d), Field::Municipality) => reference(&d.municipality),
            (DataItem::Road(d), Field::Code) => non_zero(d.code).map(|c| c.to_string()),
            (DataItem::Road(d), Field::Locality) => reference(&d.locality),
            (DataItem::Road(d), Field::Municipality) => reference(&d.municipality),
            (DataItem::BNumber(d), Field::Code) => non_empty(&d.code).map(str::to_string),
            (DataItem::BNumber(d), Field::Locality) => reference(&d.locality),
            (DataItem::BNumber(d), Field::Municipality) => reference(&d.municipality),
            (DataItem::Address(d), Field::HouseNumber) => {
                non_empty(&d.house_number).map(str::to_string)
            }
            (DataItem::Address(d), Field::Road) => reference(&d.road),
            (DataItem::Address(d), Field::BNumber) => reference(&d.b_number),
            (DataItem::Address(d), Field::Municipality) => reference(&d.municipality),
            _ => None,
        }
    }

    /// All (field, value) pairs this item can be filtered on.
    pub fn indexed_values(&self) -> Vec<(Field, String)> {
        Field::ALL
            .into_iter()
            .filter_map(|field| self.field_value(field).map(|value| (field, value)))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
