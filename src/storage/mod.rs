// src/storage/mod.rs
use crate::budget::{fields, BudgetRow, BudgetTable};
use crate::docx::RawGrid;
use crate::extractors::narrative::EntityDetails;
use crate::registry::Enrichment;
use crate::utils::error::StorageError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

const RAW_TABLE_FILE: &str = "table6_raw.csv";
const TABLE_FILE: &str = "table6.csv";
const BUDGET_FILE: &str = "budget.json";
const NARRATIVES_FILE: &str = "entity_narratives.json";
const DETAILS_FILE: &str = "details.json";

/// Writes intermediate artifacts (CSV, raw narratives) and public JSON.
pub struct StorageManager {
    intermediate_dir: PathBuf,
    public_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating both directories if needed
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(intermediate_dir: P, public_dir: Q) -> Result<Self, StorageError> {
        let intermediate_dir = intermediate_dir.as_ref().to_path_buf();
        let public_dir = public_dir.as_ref().to_path_buf();

        for dir in [&intermediate_dir, &public_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(StorageError::IoError)?;
            }
        }

        Ok(Self {
            intermediate_dir,
            public_dir,
        })
    }

    pub fn raw_grid_path(&self) -> PathBuf {
        self.intermediate_dir.join(RAW_TABLE_FILE)
    }

    /// Saves the raw grid as header-less CSV, one record per table row
    pub fn save_raw_grid(&self, grid: &RawGrid) -> Result<PathBuf, StorageError> {
        let file_path = self.raw_grid_path();
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&file_path)?;
        for row in &grid.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        tracing::info!("Saved raw table ({} rows) to {}", grid.len(), file_path.display());
        Ok(file_path)
    }

    /// Loads the raw grid written by `save_raw_grid`
    pub fn load_raw_grid(&self) -> Result<RawGrid, StorageError> {
        let file_path = self.raw_grid_path();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&file_path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }
        tracing::debug!("Loaded raw table ({} rows) from {}", rows.len(), file_path.display());
        Ok(RawGrid::new(rows))
    }

    /// Saves the corrected table, grand total first, missing values as empty cells
    pub fn save_table_csv(&self, table: &BudgetTable) -> Result<PathBuf, StorageError> {
        let file_path = self.intermediate_dir.join(TABLE_FILE);
        let mut writer = csv::Writer::from_path(&file_path)?;
        writer.write_record(table.header())?;

        for row in &table.rows {
            let mut record: Vec<String> = vec![row.row_type.to_string()];
            record.extend(identifiers(row).iter().map(|v| v.cloned().unwrap_or_default()));
            record.extend(
                (0..table.columns.len()).map(|col| row.value(col).map(|v| v.to_string()).unwrap_or_default()),
            );
            record.push(row.footnotes.clone().unwrap_or_default());
            writer.write_record(&record)?;
        }
        writer.flush()?;

        tracing::info!("Saved table ({} rows) to {}", table.rows.len(), file_path.display());
        Ok(file_path)
    }

    /// Saves the enriched table as a JSON array of records, one per row
    pub fn save_budget_json(&self, table: &BudgetTable, enrichments: &[Enrichment]) -> Result<PathBuf, StorageError> {
        if enrichments.len() != table.rows.len() {
            return Err(StorageError::SerializationError(format!(
                "{} enrichments for {} rows",
                enrichments.len(),
                table.rows.len()
            )));
        }
        let records: Vec<BudgetRecord> = table
            .rows
            .iter()
            .zip(enrichments)
            .map(|(row, enrichment)| BudgetRecord { table, row, enrichment })
            .collect();

        let file_path = self.public_dir.join(BUDGET_FILE);
        write_json(&file_path, &records)?;
        tracing::info!("Saved {} budget records to {}", records.len(), file_path.display());
        Ok(file_path)
    }

    /// Saves entity narratives to both the intermediate and public directories
    pub fn save_details(&self, details: &[EntityDetails]) -> Result<(PathBuf, PathBuf), StorageError> {
        let intermediate = self.intermediate_dir.join(NARRATIVES_FILE);
        let public = self.public_dir.join(DETAILS_FILE);
        write_json(&intermediate, details)?;
        write_json(&public, details)?;

        tracing::info!("Saved details for {} entities to {}", details.len(), public.display());
        Ok((intermediate, public))
    }
}

fn identifiers(row: &BudgetRow) -> [Option<&String>; 5] {
    [
        row.part.as_ref(),
        row.part_name.as_ref(),
        row.section.as_ref(),
        row.section_name.as_ref(),
        row.entity_name.as_ref(),
    ]
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    fs::write(path, json).map_err(StorageError::IoError)
}

/// One `budget.json` record: the table fields in header order followed by
/// the registry fields.
struct BudgetRecord<'a> {
    table: &'a BudgetTable,
    row: &'a BudgetRow,
    enrichment: &'a Enrichment,
}

impl Serialize for BudgetRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row = self.row;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(fields::ROW_TYPE, &row.row_type)?;
        for (name, value) in fields::LEADING[1..].iter().zip(identifiers(row)) {
            map.serialize_entry(name, &value)?;
        }
        for (col, column) in self.table.columns.iter().enumerate() {
            map.serialize_entry(&column.name, &row.value(col))?;
        }
        map.serialize_entry(fields::FOOTNOTES, &row.footnotes)?;
        map.serialize_entry("chapter_title", &self.enrichment.chapter_title)?;
        map.serialize_entry("abbreviation", &self.enrichment.info.abbreviation)?;
        map.serialize_entry("entity_name", &self.enrichment.info.entity_long)?;
        map.end()
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetTable, MeasureColumn, RowType};
    use crate::registry::EntityInfo;
    use tempfile::TempDir;

    fn manager(tmp: &TempDir) -> StorageManager {
        StorageManager::new(tmp.path().join("intermediate"), tmp.path().join("public")).unwrap()
    }

    fn table() -> BudgetTable {
        BudgetTable {
            columns: vec![MeasureColumn::new("2025 approved"), MeasureColumn::new("Change (percentage)")],
            rows: vec![
                BudgetRow {
                    row_type: RowType::GrandTotal,
                    part: None,
                    part_name: None,
                    section: None,
                    section_name: None,
                    entity_name: None,
                    values: vec![Some(1_380_000.0), None],
                    footnotes: None,
                },
                BudgetRow {
                    row_type: RowType::EntityTotal,
                    part: Some("Part II".into()),
                    part_name: Some("Political affairs".into()),
                    section: Some("3".into()),
                    section_name: Some("Political affairs".into()),
                    entity_name: Some("Special envoys, \"field\"".into()),
                    values: vec![Some(20_000.0), Some(-1.5)],
                    footnotes: Some("a,b".into()),
                },
            ],
        }
    }

    #[test]
    fn test_raw_grid_round_trip_keeps_ragged_rows() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        let grid = RawGrid::new(vec![
            vec!["Budget part/section/entity".into(), "2025 approved".into()],
            vec!["–\tGeneral Assembly".into(), "1,300.0".into(), "extra".into()],
            vec!["".into(), "".into()],
        ]);

        storage.save_raw_grid(&grid).unwrap();
        assert_eq!(storage.load_raw_grid().unwrap(), grid);
    }

    #[test]
    fn test_table_csv_layout() {
        let tmp = TempDir::new().unwrap();
        let path = manager(&tmp).save_table_csv(&table()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines[0],
            "row_type,Part,Part name,Section,Section name,Entity name,2025 approved,Change (percentage),footnotes"
        );
        assert_eq!(lines[1], "grand_total,,,,,,1380000,,");
        assert_eq!(
            lines[2],
            "entity_total,Part II,Political affairs,3,Political affairs,\"Special envoys, \"\"field\"\"\",20000,-1.5,\"a,b\""
        );
    }

    #[test]
    fn test_budget_json_records_are_ordered_with_nulls() {
        let tmp = TempDir::new().unwrap();
        let enrichments = vec![
            Enrichment::default(),
            Enrichment {
                chapter_title: Some("Special envoys".into()),
                info: EntityInfo {
                    abbreviation: Some("SE".into()),
                    entity_long: Some("Special envoys of the Secretary-General".into()),
                },
            },
        ];
        let path = manager(&tmp).save_budget_json(&table(), &enrichments).unwrap();
        let content = fs::read_to_string(path).unwrap();

        let records: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["row_type"], "grand_total");
        assert!(records[0]["Part"].is_null());
        assert!(records[0]["Change (percentage)"].is_null());
        assert_eq!(records[1]["2025 approved"], 20000.0);
        assert_eq!(records[1]["abbreviation"], "SE");
        assert_eq!(records[1]["entity_name"], "Special envoys of the Secretary-General");

        // Keys follow header order, registry fields last
        let row_type_at = content.find("\"row_type\"").unwrap();
        let footnotes_at = content.find("\"footnotes\"").unwrap();
        let chapter_at = content.find("\"chapter_title\"").unwrap();
        assert!(row_type_at < footnotes_at && footnotes_at < chapter_at);
    }

    #[test]
    fn test_budget_json_rejects_misaligned_enrichments() {
        let tmp = TempDir::new().unwrap();
        let err = manager(&tmp).save_budget_json(&table(), &[]).unwrap_err();
        assert!(matches!(err, StorageError::SerializationError(_)));
    }
}
