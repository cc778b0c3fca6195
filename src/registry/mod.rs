// src/registry/mod.rs
//! Aligns table labels with the external entity registry: a name mapping
//! (table name -> narrative name) and a list of UN entities with their
//! abbreviations.

use crate::budget::BudgetRow;
use crate::utils::error::RegistryError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct NameMappingRecord {
    table6_name: String,
    doc_name: String,
}

/// One record of the entity registry. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntity {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub entity_long: Option<String>,
}

/// (abbreviation, long name) attached to a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityInfo {
    pub abbreviation: Option<String>,
    pub entity_long: Option<String>,
}

/// Registry-derived fields for one output row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub chapter_title: Option<String>,
    pub info: EntityInfo,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    name_map: HashMap<String, String>,
    by_long_name: HashMap<String, (String, String)>,
    by_abbreviation: HashMap<String, (String, String)>,
}

impl EntityRegistry {
    /// Loads the CSV name mapping and the JSON entity list.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(name_map: P, entities: Q) -> Result<Self, RegistryError> {
        let name_map = name_map.as_ref();
        let entities = entities.as_ref();
        tracing::info!("Loading name mapping from {}", name_map.display());
        let mapping = read_name_map(File::open(name_map)?)?;

        tracing::info!("Loading entity registry from {}", entities.display());
        let records: Vec<RegistryEntity> = serde_json::from_reader(File::open(entities)?)?;

        Ok(Self::from_parts(mapping, records))
    }

    pub fn from_parts(name_map: HashMap<String, String>, records: Vec<RegistryEntity>) -> Self {
        let mut registry = Self {
            name_map,
            ..Self::default()
        };
        for record in records {
            // Records need both fields to be usable; later duplicates win
            let (Some(abbr), Some(long)) = (record.entity, record.entity_long) else {
                continue;
            };
            if abbr.is_empty() || long.is_empty() {
                continue;
            }
            registry.by_long_name.insert(long.clone(), (abbr.clone(), long.clone()));
            registry.by_abbreviation.insert(abbr.clone(), (abbr, long));
        }
        tracing::debug!(
            "Registry: {} name mappings, {} entities",
            registry.name_map.len(),
            registry.by_long_name.len()
        );
        registry
    }

    /// Narrative title for a row: the mapped entity name when the row names
    /// an entity, otherwise the mapped section name. Unmapped names pass through.
    pub fn chapter_title(&self, row: &BudgetRow) -> Option<String> {
        let name = row.entity_name.as_ref().or(row.section_name.as_ref())?;
        Some(self.name_map.get(name).unwrap_or(name).clone())
    }

    /// Looks a title up by long name, then by abbreviation. No match is
    /// an empty `EntityInfo`, not an error.
    pub fn entity_info(&self, title: Option<&str>) -> EntityInfo {
        let Some(title) = title.filter(|t| !t.is_empty()) else {
            return EntityInfo::default();
        };
        match self
            .by_long_name
            .get(title)
            .or_else(|| self.by_abbreviation.get(title))
        {
            Some((abbr, long)) => EntityInfo {
                abbreviation: Some(abbr.clone()),
                entity_long: Some(long.clone()),
            },
            None => EntityInfo::default(),
        }
    }

    pub fn enrich(&self, row: &BudgetRow) -> Enrichment {
        let chapter_title = self.chapter_title(row);
        let info = self.entity_info(chapter_title.as_deref());
        Enrichment { chapter_title, info }
    }
}

fn read_name_map<R: Read>(reader: R) -> Result<HashMap<String, String>, RegistryError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut map = HashMap::new();
    for record in csv_reader.deserialize() {
        let record: NameMappingRecord = record?;
        map.insert(record.table6_name, record.doc_name);
    }
    Ok(map)
}
