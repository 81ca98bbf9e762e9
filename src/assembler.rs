// 🧩 Hierarchy Assembler - end-to-end address views
//
// Each query shape runs the same pipeline:
//   validate → normalize → fetch roots → resolve roots → batch-load
//   references → resolve references → project
//
// Every resolution in one call uses the same `as_of` instant, so a response
// is a consistent view of the registry at one moment.

use crate::cache::MunicipalityCache;
use crate::error::{Result, ServiceError};
use crate::loader::{collect_references, ReferenceBatchLoader, ReferenceMap};
use crate::model::{AddressData, EntityType, Field, Identification};
use crate::normalizer::{
    AddressDetailQuery, AddressQuery, BNumberFilter, BuildingQuery, LocalityQuery, QueryParams,
    RoadQuery,
};
use crate::projector::{
    project_address, project_building, project_detail, project_locality, project_road,
    AddressDetailResponse, AddressRecord, BuildingRecord, DetailSources, LocalityRecord, RoadRecord,
};
use crate::store::{EntityFilter, RegistryStore};
use crate::temporal::{Entity, Snapshot, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolve every loaded reference at `as_of` and fold it with `fold`.
fn resolve_all<T>(
    map: &ReferenceMap,
    as_of: DateTime<Utc>,
    fold: impl Fn(&Snapshot<'_>) -> T,
) -> HashMap<Identification, T> {
    map.iter()
        .map(|(id, entity)| (*id, fold(&Snapshot::of(entity, as_of))))
        .collect()
}

/// Roots resolved at `as_of`, dropping those with no valid snapshot.
fn resolve_addresses(entities: &[Entity], as_of: DateTime<Utc>) -> Vec<(Identification, AddressData)> {
    entities
        .iter()
        .map(|entity| Snapshot::of(entity, as_of))
        .filter(|snapshot| !snapshot.is_empty())
        .map(|snapshot| (snapshot.id, snapshot.address()))
        .collect()
}

pub struct AddressService<S: RegistryStore> {
    store: S,
    municipalities: Arc<MunicipalityCache>,
}

impl<S: RegistryStore> AddressService<S> {
    pub fn new(store: S, municipalities: Arc<MunicipalityCache>) -> Self {
        AddressService { store, municipalities }
    }

    /// Service with a fresh cache, built from the store at `as_of`.
    pub fn initialize(store: S, as_of: DateTime<Utc>) -> Result<Self> {
        let service = AddressService::new(store, Arc::new(MunicipalityCache::empty()));
        service.reload_municipalities(as_of)?;
        Ok(service)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn municipalities(&self) -> &MunicipalityCache {
        &self.municipalities
    }

    /// Full rebuild of the municipality code cache.
    pub fn reload_municipalities(&self, as_of: DateTime<Utc>) -> Result<usize> {
        Ok(self.municipalities.rebuild(&self.store, as_of)?)
    }

    fn loader(&self) -> ReferenceBatchLoader<'_, S> {
        ReferenceBatchLoader::new(&self.store)
    }

    // ========================================================================
    // LOCALITIES OF A MUNICIPALITY
    // ========================================================================

    pub fn localities(&self, params: &QueryParams, as_of: DateTime<Utc>) -> Result<Vec<LocalityRecord>> {
        info!(kommune = ?params.kommune, "locality query");
        let query = LocalityQuery::from_params(params)?;
        self.find_localities(&query, as_of)
    }

    pub fn find_localities(&self, query: &LocalityQuery, as_of: DateTime<Utc>) -> Result<Vec<LocalityRecord>> {
        let municipality = self.municipalities.get(query.municipality_code).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Municipality with code {} not found",
                query.municipality_code
            ))
        })?;

        let filter = EntityFilter::new(EntityType::Locality, TimeWindow::at(as_of))
            .with_reference(Field::Municipality, municipality);

        Ok(self
            .store
            .fetch_matching(&filter)?
            .iter()
            .map(|entity| Snapshot::of(entity, as_of))
            .filter(|snapshot| !snapshot.is_empty())
            .map(|snapshot| project_locality(snapshot.id, &snapshot.locality()))
            .collect())
    }

    // ========================================================================
    // ROADS OF A LOCALITY
    // ========================================================================

    pub fn roads(&self, params: &QueryParams, as_of: DateTime<Utc>) -> Result<Vec<RoadRecord>> {
        info!(lokalitet = ?params.lokalitet, "road query");
        let query = RoadQuery::from_params(params)?;
        self.find_roads(&query, as_of)
    }

    pub fn find_roads(&self, query: &RoadQuery, as_of: DateTime<Utc>) -> Result<Vec<RoadRecord>> {
        let filter = EntityFilter::new(EntityType::Road, TimeWindow::at(as_of))
            .with_reference(Field::Locality, query.locality);

        Ok(self
            .store
            .fetch_matching(&filter)?
            .iter()
            .map(|entity| Snapshot::of(entity, as_of))
            .filter(|snapshot| !snapshot.is_empty())
            .map(|snapshot| project_road(snapshot.id, &snapshot.road()))
            .collect())
    }

    // ========================================================================
    // BUILDINGS ON A ROAD (one row per house number)
    // ========================================================================

    pub fn buildings(&self, params: &QueryParams, as_of: DateTime<Utc>) -> Result<Vec<BuildingRecord>> {
        info!(vej = ?params.vej, "building query");
        let query = BuildingQuery::from_params(params)?;
        self.find_buildings(&query, as_of)
    }

    /// Floors and doors split one house into many addresses; only the first
    /// address seen per house number is kept, in store order.
    pub fn find_buildings(&self, query: &BuildingQuery, as_of: DateTime<Utc>) -> Result<Vec<BuildingRecord>> {
        let filter = EntityFilter::new(EntityType::Address, TimeWindow::at(as_of))
            .with_reference(Field::Road, query.road);
        let addresses = resolve_addresses(&self.store.fetch_matching(&filter)?, as_of);

        let mut seen = HashSet::new();
        let kept: Vec<AddressData> = addresses
            .into_iter()
            .map(|(_, data)| data)
            .filter(|data| seen.insert(data.house_number.clone().filter(|h| !h.is_empty())))
            .collect();

        let refs = collect_references(&kept, |a| a.b_number);
        let bnumbers = resolve_all(
            &self.loader().load_many(&refs, EntityType::BNumber)?,
            as_of,
            |s| s.bnumber(),
        );

        Ok(kept
            .iter()
            .map(|address| {
                let bnumber = address.b_number.and_then(|id| bnumbers.get(&id));
                project_building(address, bnumber)
            })
            .collect())
    }

    // ========================================================================
    // ADDRESSES ON A ROAD
    // ========================================================================

    pub fn addresses(&self, params: &QueryParams, as_of: DateTime<Utc>) -> Result<Vec<AddressRecord>> {
        info!(
            vej = ?params.vej,
            husnr = ?params.husnr,
            bnr = ?params.bnr,
            "address query"
        );
        let query = AddressQuery::from_params(params)?;
        self.find_addresses(&query, as_of)
    }

    pub fn find_addresses(&self, query: &AddressQuery, as_of: DateTime<Utc>) -> Result<Vec<AddressRecord>> {
        let window = TimeWindow::at(as_of);
        let mut filter =
            EntityFilter::new(EntityType::Address, window).with_reference(Field::Road, query.road);

        if let Some(variants) = &query.house_numbers {
            filter = filter.with(Field::HouseNumber, variants.clone());
        }

        // A code lookup already holds every building number the matches can
        // reference, so the batch load is skipped in that case.
        let mut preloaded = None;
        match &query.b_number {
            Some(BNumberFilter::Id(id)) => {
                filter = filter.with_reference(Field::BNumber, *id);
            }
            Some(BNumberFilter::Code(code)) => {
                let found = self.bnumbers_with_code(code, window)?;
                if found.is_empty() {
                    debug!(code = %code, "no building number with code");
                    return Ok(Vec::new());
                }
                filter = filter.with_references(Field::BNumber, found.keys());
                preloaded = Some(found);
            }
            None => {}
        }

        let addresses = resolve_addresses(&self.store.fetch_matching(&filter)?, as_of);

        let loaded = match preloaded {
            Some(found) => found,
            None => {
                let refs = collect_references(&addresses, |(_, a)| a.b_number);
                self.loader().load_many(&refs, EntityType::BNumber)?
            }
        };
        let bnumbers = resolve_all(&loaded, as_of, |s| s.bnumber());

        Ok(addresses
            .iter()
            .map(|(uuid, address)| {
                let bnumber = address.b_number.and_then(|id| bnumbers.get(&id));
                project_address(*uuid, address, bnumber)
            })
            .collect())
    }

    /// Building numbers currently carrying `code`, keyed for reuse as the
    /// reference map of the address query.
    fn bnumbers_with_code(&self, code: &str, window: TimeWindow) -> Result<ReferenceMap> {
        let filter = EntityFilter::new(EntityType::BNumber, window)
            .with(Field::Code, vec![code.to_string()]);
        Ok(self
            .store
            .fetch_matching(&filter)?
            .into_iter()
            .map(|entity| (entity.id, entity))
            .collect())
    }

    // ========================================================================
    // ADDRESS DETAIL
    // ========================================================================

    pub fn address_detail(&self, params: &QueryParams, as_of: DateTime<Utc>) -> Result<AddressDetailResponse> {
        info!(adresse = ?params.adresse, "address detail query");
        let query = AddressDetailQuery::from_params(params)?;
        self.find_address_detail(&query, as_of)
    }

    /// Joins in dependency order: building number and road, then the road's
    /// locality. The municipality code comes from the cache only.
    pub fn find_address_detail(
        &self,
        query: &AddressDetailQuery,
        as_of: DateTime<Utc>,
    ) -> Result<AddressDetailResponse> {
        let roots: HashSet<Identification> = [query.address].into_iter().collect();
        let found = self.loader().load_many(&roots, EntityType::Address)?;

        let Some(entity) = found.get(&query.address) else {
            return Ok(AddressDetailResponse::empty());
        };
        let snapshot = Snapshot::of(entity, as_of);
        if snapshot.is_empty() {
            return Ok(AddressDetailResponse::empty());
        }
        let address = snapshot.address();

        let loader = self.loader();
        let bnumbers = resolve_all(
            &loader.load_many(&address.b_number.into_iter().collect(), EntityType::BNumber)?,
            as_of,
            |s| s.bnumber(),
        );
        let roads = resolve_all(
            &loader.load_many(&address.road.into_iter().collect(), EntityType::Road)?,
            as_of,
            |s| s.road(),
        );
        let road = address.road.and_then(|id| roads.get(&id));

        let locality_ref = road.and_then(|r| r.locality);
        let localities = resolve_all(
            &loader.load_many(&locality_ref.into_iter().collect(), EntityType::Locality)?,
            as_of,
            |s| s.locality(),
        );

        let municipality_code = address
            .municipality
            .or_else(|| road.and_then(|r| r.municipality))
            .and_then(|id| self.municipalities.code_of(id));

        let detail = project_detail(DetailSources {
            uuid: entity.id,
            address: &address,
            bnumber: address.b_number.and_then(|id| bnumbers.get(&id)),
            road,
            locality: locality_ref.and_then(|id| localities.get(&id)),
            municipality_code,
        });

        Ok(AddressDetailResponse(Some(detail)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BNumberData, DataItem, LocalityData, MunicipalityData, RoadData};
    use crate::store::MemoryStore;
    use crate::temporal::{Effect, Interval, Registration};
    use chrono::TimeZone;
    use serde_json::json;

    const MUNICIPALITY: &str = "11111111-0000-0000-0000-000000000955";
    const LOCALITY: &str = "4d9cd2a0-89f1-4acc-a259-4fd139006d87";
    const ROAD: &str = "e4dc6c09-baae-40b1-8696-57771b2f7a81";

    fn t(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn id(s: &str) -> Identification {
        s.parse().unwrap()
    }

    fn entity(kind: EntityType, uuid: &str, item: DataItem) -> Entity {
        Entity::new(
            kind,
            id(uuid),
            vec![Registration::new(
                Interval::since(t(2017)),
                vec![Effect::new(Interval::since(t(2017)), vec![item])],
            )],
        )
    }

    fn address(uuid: &str, house_number: &str, floor: Option<&str>, bnumber: Option<&str>) -> Entity {
        entity(
            EntityType::Address,
            uuid,
            DataItem::Address(AddressData {
                house_number: Some(house_number.to_string()),
                floor: floor.map(str::to_string),
                road: Some(id(ROAD)),
                b_number: bnumber.map(id),
                municipality: Some(id(MUNICIPALITY)),
                ..Default::default()
            }),
        )
    }

    fn bnumber(uuid: &str, code: &str, callname: Option<&str>) -> Entity {
        entity(
            EntityType::BNumber,
            uuid,
            DataItem::BNumber(BNumberData {
                code: Some(code.to_string()),
                callname: callname.map(str::to_string),
                ..Default::default()
            }),
        )
    }

    fn registry() -> MemoryStore {
        MemoryStore::with_entities(vec![
            entity(
                EntityType::Municipality,
                MUNICIPALITY,
                DataItem::Municipality(MunicipalityData {
                    code: 955,
                    name: Some("Kommuneqarfik Sermersooq".to_string()),
                }),
            ),
            entity(
                EntityType::Locality,
                LOCALITY,
                DataItem::Locality(LocalityData {
                    name: Some("Paamiut".to_string()),
                    abbrev: Some("PAA".to_string()),
                    municipality: Some(id(MUNICIPALITY)),
                    ..Default::default()
                }),
            ),
            entity(
                EntityType::Road,
                ROAD,
                DataItem::Road(RoadData {
                    code: 1,
                    name: Some("Aadarujuup Aqquserna".to_string()),
                    short_name: Some("Aadarujuup Aqq.".to_string()),
                    locality: Some(id(LOCALITY)),
                    municipality: Some(id(MUNICIPALITY)),
                    ..Default::default()
                }),
            ),
            bnumber("00000000-0000-0000-0000-00000000b001", "293", Some("testhus")),
            bnumber("00000000-0000-0000-0000-00000000b002", "294", None),
            address("00000000-0000-0000-0000-00000000a001", "5", None, Some("00000000-0000-0000-0000-00000000b001")),
            address("00000000-0000-0000-0000-00000000a002", "5", Some("1"), Some("00000000-0000-0000-0000-00000000b002")),
            address("00000000-0000-0000-0000-00000000a003", "05", None, None),
            address("00000000-0000-0000-0000-00000000a004", "15", None, Some("00000000-0000-0000-0000-00000000b002")),
        ])
    }

    fn service() -> AddressService<MemoryStore> {
        AddressService::initialize(registry(), t(2020)).unwrap()
    }

    fn params() -> QueryParams {
        QueryParams::default()
    }

    #[test]
    fn test_localities_unknown_code_is_not_found() {
        let result = service().localities(
            &QueryParams { kommune: Some("1234".into()), ..params() },
            t(2020),
        );
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_localities_of_municipality() {
        let records = service()
            .localities(&QueryParams { kommune: Some("955".into()), ..params() }, t(2020))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([{"uuid": LOCALITY, "navn": "Paamiut", "forkortelse": "PAA"}])
        );
    }

    #[test]
    fn test_nothing_current_before_registration() {
        let records = service()
            .roads(&QueryParams { lokalitet: Some(LOCALITY.into()), ..params() }, t(2010))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_buildings_keep_first_address_per_house_number() {
        let records = service()
            .buildings(&QueryParams { vej: Some(ROAD.into()), ..params() }, t(2020))
            .unwrap();

        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([
                {"husnummer": "5", "b_nummer": "293", "b_kaldenavn": "testhus"},
                {"husnummer": "05", "b_nummer": null, "b_kaldenavn": null},
                {"husnummer": "15", "b_nummer": "294", "b_kaldenavn": null},
            ])
        );
    }

    #[test]
    fn test_addresses_house_number_matches_padded_variants_only() {
        let records = service()
            .addresses(
                &QueryParams { vej: Some(ROAD.into()), husnr: Some("5".into()), ..params() },
                t(2020),
            )
            .unwrap();

        let numbers: Vec<Option<String>> = records.iter().map(|r| r.husnummer.clone()).collect();
        assert_eq!(
            numbers,
            vec![Some("5".to_string()), Some("5".to_string()), Some("05".to_string())]
        );
    }

    #[test]
    fn test_addresses_batch_load_building_numbers_once() {
        let service = service();
        service.store().reset_fetch_counts();

        let records = service
            .addresses(&QueryParams { vej: Some(ROAD.into()), ..params() }, t(2020))
            .unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].b_nummer.as_deref(), Some("293"));
        assert_eq!(records[1].etage.as_deref(), Some("1"));
        assert_eq!(records[2].b_nummer, None);
        assert_eq!(service.store().fetch_count(EntityType::BNumber), 1);
        assert_eq!(service.store().fetch_count(EntityType::Address), 1);
    }

    #[test]
    fn test_addresses_by_bnumber_code() {
        let service = service();

        let records = service
            .addresses(
                &QueryParams { vej: Some(ROAD.into()), bnr: Some("294".into()), ..params() },
                t(2020),
            )
            .unwrap();
        let uuids: Vec<String> = records.iter().map(|r| r.uuid.to_string()).collect();
        assert_eq!(
            uuids,
            vec!["00000000-0000-0000-0000-00000000a002", "00000000-0000-0000-0000-00000000a004"]
        );

        assert_eq!(records[1].b_nummer.as_deref(), Some("294"));

        let none = service
            .addresses(
                &QueryParams { vej: Some(ROAD.into()), bnr: Some("999".into()), ..params() },
                t(2020),
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_addresses_by_bnumber_code_fetch_building_numbers_once() {
        let service = service();
        service.store().reset_fetch_counts();

        let records = service
            .addresses(
                &QueryParams { vej: Some(ROAD.into()), bnr: Some("293".into()), ..params() },
                t(2020),
            )
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].b_nummer.as_deref(), Some("293"));
        assert_eq!(service.store().fetch_count(EntityType::BNumber), 1);
        assert_eq!(service.store().fetch_count(EntityType::Address), 1);
    }

    #[test]
    fn test_roads_skip_entities_without_current_effect() {
        let store = registry();
        store
            .insert(Entity::new(
                EntityType::Road,
                id("00000000-0000-0000-0000-0000000000c2"),
                vec![
                    Registration::new(
                        Interval::since(t(2017)),
                        vec![Effect::new(
                            Interval::since(t(2017)),
                            vec![DataItem::Road(RoadData {
                                code: 2,
                                locality: Some(id(LOCALITY)),
                                ..Default::default()
                            })],
                        )],
                    ),
                    // Correction retiring the road in 2019
                    Registration::new(
                        Interval::since(t(2019)),
                        vec![Effect::new(
                            Interval::between(t(2017), t(2019)),
                            vec![DataItem::Road(RoadData {
                                code: 2,
                                locality: Some(id(LOCALITY)),
                                ..Default::default()
                            })],
                        )],
                    ),
                ],
            ))
            .unwrap();
        let service = AddressService::initialize(store, t(2020)).unwrap();

        let records = service
            .roads(&QueryParams { lokalitet: Some(LOCALITY.into()), ..params() }, t(2020))
            .unwrap();
        let uuids: Vec<String> = records.iter().map(|r| r.uuid.to_string()).collect();
        assert_eq!(uuids, vec![ROAD]);
    }

    #[test]
    fn test_address_detail_joins_hierarchy() {
        let service = service();
        service.store().reset_fetch_counts();

        let detail = service
            .address_detail(
                &QueryParams { adresse: Some("00000000-0000-0000-0000-00000000a001".into()), ..params() },
                t(2020),
            )
            .unwrap();

        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({
                "uuid": "00000000-0000-0000-0000-00000000a001",
                "husnummer": "5",
                "etage": null,
                "doer": null,
                "b_nummer": "293",
                "vej_uuid": ROAD,
                "vejkode": 1,
                "vejnavn": "Aadarujuup Aqquserna",
                "lokalitet": LOCALITY,
                "lokalitetsnavn": "Paamiut",
                "kommunekode": 955,
                "bolig": null
            })
        );
        assert_eq!(service.store().fetch_count(EntityType::Municipality), 0);
    }

    #[test]
    fn test_address_detail_unknown_or_not_current_is_empty() {
        let service = service();

        let unknown = service
            .address_detail(
                &QueryParams { adresse: Some("01234567-89ab-cdef-0123-456789abcdef".into()), ..params() },
                t(2020),
            )
            .unwrap();
        assert!(unknown.is_empty());

        let too_early = service
            .address_detail(
                &QueryParams { adresse: Some("00000000-0000-0000-0000-00000000a001".into()), ..params() },
                t(2010),
            )
            .unwrap();
        assert!(too_early.is_empty());
    }

    #[test]
    fn test_validation_happens_before_store_access() {
        let service = service();
        service.store().reset_fetch_counts();

        let result = service.addresses(&QueryParams { vej: Some("not-a-uuid".into()), ..params() }, t(2020));
        assert!(matches!(result, Err(ServiceError::InvalidInput { .. })));

        let result = service.address_detail(&params(), t(2020));
        assert!(matches!(result, Err(ServiceError::MissingParameter { .. })));

        assert_eq!(service.store().fetch_count(EntityType::Address), 0);
    }
}
