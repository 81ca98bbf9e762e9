// 📤 Result Projector - resolved data → output records
//
// Two presentation modes, fixed per record type:
// - omit-if-absent: `skip_serializing_if`, the key disappears when unresolved
// - explicit-null: the key is always present, `null` when unresolved
//
// Localities and roads omit. Buildings always carry all three keys. The
// filtered address list keeps `husnummer` stable and omits the rest. Address
// detail is explicit-null throughout, or `{}` when the address does not
// resolve.

use crate::model::{
    non_empty, non_zero, AddressData, BNumberData, Identification, LocalityData, RoadData,
};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

fn text(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityRecord {
    pub uuid: Identification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forkortelse: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadRecord {
    pub uuid: Identification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vejkode: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub andet_navn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpr_navn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forkortet_navn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingRecord {
    pub husnummer: Option<String>,
    pub b_nummer: Option<String>,
    pub b_kaldenavn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressRecord {
    pub uuid: Identification,
    pub husnummer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_nummer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolig: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressDetail {
    pub uuid: Identification,
    pub husnummer: Option<String>,
    pub etage: Option<String>,
    pub doer: Option<String>,
    pub b_nummer: Option<String>,
    pub vej_uuid: Option<Identification>,
    pub vejkode: Option<i32>,
    pub vejnavn: Option<String>,
    pub lokalitet: Option<Identification>,
    pub lokalitetsnavn: Option<String>,
    pub kommunekode: Option<i32>,
    pub bolig: Option<bool>,
}

/// Address detail, serialized as `{}` when the address did not resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressDetailResponse(pub Option<AddressDetail>);

impl AddressDetailResponse {
    pub fn empty() -> Self {
        AddressDetailResponse(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl Serialize for AddressDetailResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(detail) => detail.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

// ============================================================================
// PROJECTIONS
// ============================================================================

pub fn project_locality(uuid: Identification, data: &LocalityData) -> LocalityRecord {
    LocalityRecord {
        uuid,
        navn: text(&data.name),
        forkortelse: text(&data.abbrev),
    }
}

pub fn project_road(uuid: Identification, data: &RoadData) -> RoadRecord {
    RoadRecord {
        uuid,
        vejkode: non_zero(data.code),
        navn: text(&data.name),
        andet_navn: text(&data.alternate_name),
        cpr_navn: text(&data.cpr_name),
        forkortet_navn: text(&data.short_name),
    }
}

pub fn project_building(address: &AddressData, bnumber: Option<&BNumberData>) -> BuildingRecord {
    BuildingRecord {
        husnummer: text(&address.house_number),
        b_nummer: bnumber.and_then(|b| text(&b.code)),
        b_kaldenavn: bnumber.and_then(|b| text(&b.callname)),
    }
}

pub fn project_address(
    uuid: Identification,
    address: &AddressData,
    bnumber: Option<&BNumberData>,
) -> AddressRecord {
    AddressRecord {
        uuid,
        husnummer: text(&address.house_number),
        etage: text(&address.floor),
        doer: text(&address.door),
        b_nummer: bnumber.and_then(|b| text(&b.code)),
        bolig: address.residential,
    }
}

/// Everything joined onto one address for the detail view.
#[derive(Debug, Clone, Copy)]
pub struct DetailSources<'a> {
    pub uuid: Identification,
    pub address: &'a AddressData,
    pub bnumber: Option<&'a BNumberData>,
    pub road: Option<&'a RoadData>,
    pub locality: Option<&'a LocalityData>,
    pub municipality_code: Option<i32>,
}

pub fn project_detail(sources: DetailSources<'_>) -> AddressDetail {
    let DetailSources {
        uuid,
        address,
        bnumber,
        road,
        locality,
        municipality_code,
    } = sources;

    AddressDetail {
        uuid,
        husnummer: text(&address.house_number),
        etage: text(&address.floor),
        doer: text(&address.door),
        b_nummer: bnumber.and_then(|b| text(&b.code)),
        vej_uuid: address.road,
        vejkode: road.and_then(|r| non_zero(r.code)),
        vejnavn: road.and_then(|r| text(&r.name)),
        lokalitet: road.and_then(|r| r.locality),
        lokalitetsnavn: locality.and_then(|l| text(&l.name)),
        kommunekode: municipality_code,
        bolig: address.residential,
    }
}
