// 🌱 Seed Documents - JSON entity histories for fixtures and local databases
//
// A seed document is a list of complete entity histories:
//
// {"entities": [{"type": "road", "uuid": "...", "registrations": [...]}]}
//
// Loading checks that every data item belongs to its entity's type.

use crate::model::EntityType;
use crate::temporal::Entity;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedDocument {
    pub entities: Vec<Entity>,
}

impl SeedDocument {
    pub fn parse(json: &str) -> Result<Self> {
        let document: SeedDocument =
            serde_json::from_str(json).context("Failed to parse seed document")?;
        document.validate()?;
        Ok(document)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed document {}", path.display()))?;
        Self::parse(&json)
    }

    pub fn validate(&self) -> Result<()> {
        for entity in &self.entities {
            for registration in &entity.registrations {
                for effect in &registration.effects {
                    for item in &effect.data {
                        if item.entity_type() != entity.kind {
                            bail!(
                                "{} {} carries {} data",
                                entity.kind,
                                entity.id,
                                item.entity_type()
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Entity counts per type, for import summaries.
    pub fn counts(&self) -> HashMap<EntityType, usize> {
        let mut counts = HashMap::new();
        for entity in &self.entities {
            *counts.entry(entity.kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_count() {
        let document = SeedDocument::parse(
            r#"{"entities": [
                {"type": "municipality", "uuid": "11111111-0000-0000-0000-000000000955",
                 "registrations": [{"effects": [{"data": [{"type": "municipality", "code": 955}]}]}]},
                {"type": "road", "uuid": "e4dc6c09-baae-40b1-8696-57771b2f7a81", "registrations": []}
            ]}"#,
        )
        .unwrap();

        let counts = document.counts();
        assert_eq!(counts[&EntityType::Municipality], 1);
        assert_eq!(counts[&EntityType::Road], 1);
        assert_eq!(counts.get(&EntityType::Address), None);
    }

    #[test]
    fn test_rejects_foreign_data_item() {
        let result = SeedDocument::parse(
            r#"{"entities": [
                {"type": "road", "uuid": "e4dc6c09-baae-40b1-8696-57771b2f7a81",
                 "registrations": [{"effects": [{"data": [{"type": "locality", "name": "Paamiut"}]}]}]}
            ]}"#,
        );

        let err = result.unwrap_err().to_string();
        assert!(err.contains("carries locality data"), "{}", err);
    }

    #[test]
    fn test_rejects_malformed_uuid() {
        assert!(SeedDocument::parse(r#"{"entities": [{"type": "road", "uuid": "nope"}]}"#).is_err());
    }
}
