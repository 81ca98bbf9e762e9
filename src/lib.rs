// Address Service - Core Library
// Bitemporal resolution and batched reference joins over the address registry
// (municipality -> locality -> road -> bnumber -> address). Exposes all
// modules for use in the CLI, the API server, and tests.

pub mod model;
pub mod temporal;
pub mod error;
pub mod store;
pub mod loader;
pub mod cache;
pub mod normalizer;
pub mod projector;
pub mod assembler;
pub mod seed;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use model::{
    DataItem, EntityType, Field, Identification,
    MunicipalityData, LocalityData, RoadData, BNumberData, AddressData,
};
pub use temporal::{
    Interval, TimeWindow, Effect, Registration, Entity, Snapshot,
    resolve_current,
};
pub use error::ServiceError;
pub use store::{
    Criterion, EntityFilter, RegistryStore, MemoryStore, SqliteStore,
};
pub use loader::{ReferenceBatchLoader, ReferenceMap};
pub use cache::MunicipalityCache;
pub use normalizer::{
    QueryParams, BNumberFilter,
    LocalityQuery, RoadQuery, BuildingQuery, AddressQuery, AddressDetailQuery,
};
pub use projector::{
    LocalityRecord, RoadRecord, BuildingRecord, AddressRecord,
    AddressDetail, AddressDetailResponse,
};
pub use assembler::AddressService;
pub use seed::SeedDocument;
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
