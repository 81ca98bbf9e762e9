// 🧹 Query Normalizer - raw request parameters → typed queries
//
// Pure validation and expansion, no I/O. Every failure here aborts the query
// before the store is touched.

use crate::error::{Result, ServiceError};
use crate::model::Identification;
use serde::Deserialize;

pub const PARAM_MUNICIPALITY: &str = "kommune";
pub const PARAM_LOCALITY: &str = "lokalitet";
pub const PARAM_ROAD: &str = "vej";
pub const PARAM_HOUSE: &str = "husnr";
pub const PARAM_BNR: &str = "bnr";
pub const PARAM_ADDRESS: &str = "adresse";

/// Request parameters as the caller supplied them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    pub kommune: Option<String>,
    pub lokalitet: Option<String>,
    pub vej: Option<String>,
    pub husnr: Option<String>,
    pub bnr: Option<String>,
    pub adresse: Option<String>,
}

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Trimmed value, or `MissingParameter` when absent or blank.
pub fn require<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    optional(value).ok_or_else(|| ServiceError::missing(name))
}

/// Trimmed value, `None` when absent or blank.
pub fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Base-10 integer.
pub fn parse_int(name: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| ServiceError::invalid(name, "a number"))
}

/// Canonical hyphenated UUID (8-4-4-4-12). Braced, URN and unhyphenated
/// forms are rejected.
pub fn parse_uuid(name: &str, value: &str) -> Result<Identification> {
    let value = value.trim();
    if value.len() != 36 {
        return Err(ServiceError::invalid(name, "a uuid"));
    }
    value
        .parse::<Identification>()
        .map_err(|_| ServiceError::invalid(name, "a uuid"))
}

/// `"5"` → `["5", "05", "005"]`. Matching is exact against each variant.
pub fn house_number_variants(house_number: &str) -> Vec<String> {
    let house_number = house_number.trim();
    vec![
        house_number.to_string(),
        format!("0{}", house_number),
        format!("00{}", house_number),
    ]
}

/// A building number is addressed either by identification or by its code.
#[derive(Debug, Clone, PartialEq)]
pub enum BNumberFilter {
    Id(Identification),
    Code(String),
}

impl BNumberFilter {
    pub fn parse(value: &str) -> BNumberFilter {
        let value = value.trim();
        match parse_uuid(PARAM_BNR, value) {
            Ok(id) => BNumberFilter::Id(id),
            Err(_) => BNumberFilter::Code(value.to_string()),
        }
    }
}

// ============================================================================
// TYPED QUERIES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LocalityQuery {
    pub municipality_code: i32,
}

impl LocalityQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let raw = require(PARAM_MUNICIPALITY, params.kommune.as_deref())?;
        Ok(LocalityQuery {
            municipality_code: parse_int(PARAM_MUNICIPALITY, raw)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadQuery {
    pub locality: Identification,
}

impl RoadQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let raw = require(PARAM_LOCALITY, params.lokalitet.as_deref())?;
        Ok(RoadQuery {
            locality: parse_uuid(PARAM_LOCALITY, raw)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingQuery {
    pub road: Identification,
}

impl BuildingQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let raw = require(PARAM_ROAD, params.vej.as_deref())?;
        Ok(BuildingQuery {
            road: parse_uuid(PARAM_ROAD, raw)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressQuery {
    pub road: Identification,
    /// Zero-padded variants of the requested house number.
    pub house_numbers: Option<Vec<String>>,
    pub b_number: Option<BNumberFilter>,
}

impl AddressQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let raw = require(PARAM_ROAD, params.vej.as_deref())?;
        Ok(AddressQuery {
            road: parse_uuid(PARAM_ROAD, raw)?,
            house_numbers: optional(params.husnr.as_deref()).map(house_number_variants),
            b_number: optional(params.bnr.as_deref()).map(BNumberFilter::parse),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressDetailQuery {
    pub address: Identification,
}

impl AddressDetailQuery {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let raw = require(PARAM_ADDRESS, params.adresse.as_deref())?;
        Ok(AddressDetailQuery {
            address: parse_uuid(PARAM_ADDRESS, raw)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QueryParams {
        QueryParams::default()
    }

    #[test]
    fn test_require_rejects_missing_and_blank() {
        assert!(matches!(
            require("kommune", None),
            Err(ServiceError::MissingParameter { .. })
        ));
        assert!(matches!(
            require("kommune", Some("   ")),
            Err(ServiceError::MissingParameter { .. })
        ));
        assert_eq!(require("kommune", Some(" 955 ")).unwrap(), "955");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("kommune", "955").unwrap(), 955);
        assert!(matches!(
            parse_int("kommune", "95x"),
            Err(ServiceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_parse_uuid_is_strict() {
        let id = parse_uuid("vej", "e4dc6c09-baae-40b1-8696-57771b2f7a81").unwrap();
        assert_eq!(id.to_string(), "e4dc6c09-baae-40b1-8696-57771b2f7a81");

        for bad in [
            "invalid-uuid",
            "e4dc6c09baae40b1869657771b2f7a81",
            "{e4dc6c09-baae-40b1-8696-57771b2f7a81}",
            "e4dc6c09-baae-40b1-8696-57771b2f7a8z",
        ] {
            assert!(
                matches!(parse_uuid("vej", bad), Err(ServiceError::InvalidInput { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_house_number_variants() {
        assert_eq!(house_number_variants(" 5 "), vec!["5", "05", "005"]);
        assert!(!house_number_variants("5").contains(&"15".to_string()));
    }

    #[test]
    fn test_bnumber_filter_id_or_code() {
        assert_eq!(
            BNumberFilter::parse("53191b3a-ba25-44d0-8381-4d1b86d4c38d"),
            BNumberFilter::Id("53191b3a-ba25-44d0-8381-4d1b86d4c38d".parse().unwrap())
        );
        assert_eq!(
            BNumberFilter::parse(" 293 "),
            BNumberFilter::Code("293".to_string())
        );
    }

    #[test]
    fn test_locality_query() {
        assert!(matches!(
            LocalityQuery::from_params(&params()),
            Err(ServiceError::MissingParameter { .. })
        ));

        let query = LocalityQuery::from_params(&QueryParams {
            kommune: Some("955".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(query.municipality_code, 955);
    }

    #[test]
    fn test_address_query_optional_filters() {
        let road = "e4dc6c09-baae-40b1-8696-57771b2f7a81".to_string();

        let plain = AddressQuery::from_params(&QueryParams {
            vej: Some(road.clone()),
            husnr: Some("  ".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(plain.house_numbers, None);
        assert_eq!(plain.b_number, None);

        let filtered = AddressQuery::from_params(&QueryParams {
            vej: Some(road),
            husnr: Some("5".to_string()),
            bnr: Some("293".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(
            filtered.house_numbers,
            Some(vec!["5".to_string(), "05".to_string(), "005".to_string()])
        );
        assert_eq!(filtered.b_number, Some(BNumberFilter::Code("293".to_string())));
    }

    #[test]
    fn test_address_query_requires_road() {
        let result = AddressQuery::from_params(&QueryParams {
            husnr: Some("5".to_string()),
            ..params()
        });
        assert!(matches!(result, Err(ServiceError::MissingParameter { .. })));
    }
}
