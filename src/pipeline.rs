// src/pipeline.rs
use crate::budget::columns;
use crate::docx::DocxDocument;
use crate::extractors::table::REDUNDANT_OTHER_ROLLUP;
use crate::extractors::{extract_entity_details, TableClassifier, TableConfig};
use crate::reconcile::{integrity, KnownDefectCorrector};
use crate::registry::{EntityRegistry, Enrichment};
use crate::storage::StorageManager;
use crate::utils::error::ReconcileError;
use crate::utils::AppError;
use std::path::PathBuf;

/// Everything one run needs; built from the command line in `main`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub table_index: usize,
    pub intermediate_dir: PathBuf,
    pub public_dir: PathBuf,
    pub name_map: PathBuf,
    pub entities: PathBuf,
    pub keep_other_rollup: bool,
    pub expected_defects: usize,
    pub strict: bool,
    pub skip_details: bool,
    /// Reuse `table6_raw.csv` from a previous run instead of reading the table from the document.
    pub from_raw: bool,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub resolved_defects: usize,
    pub integrity_findings: usize,
    pub entity_chapters: Option<usize>,
}

/// Runs every stage in order. Any failure stops the run before later
/// outputs are written.
pub fn run(config: &PipelineConfig) -> Result<RunSummary, AppError> {
    let storage = StorageManager::new(&config.intermediate_dir, &config.public_dir)?;
    let mut document = None;

    // 1. Raw table
    if config.from_raw {
        tracing::info!("Reusing raw table at {}", storage.raw_grid_path().display());
    } else {
        tracing::info!("Reading {}", config.input.display());
        let doc = DocxDocument::open(&config.input)?;
        storage.save_raw_grid(doc.table(config.table_index)?)?;
        document = Some(doc);
    }
    let grid = storage.load_raw_grid()?;

    // 2. Classification
    let mut table_config = TableConfig::default();
    if config.keep_other_rollup {
        tracing::info!("Keeping rows matched by '{}'", REDUNDANT_OTHER_ROLLUP);
        table_config = table_config.without_exclusion(REDUNDANT_OTHER_ROLLUP);
    }
    let classified = TableClassifier::new(table_config).classify(&grid)?;
    let (mut table, grand_total) = (classified.table, classified.grand_total);

    // 3. Verification and correction
    let corrector = KnownDefectCorrector::new(columns::TRANSITIONAL, config.expected_defects);
    let resolved = corrector.reconcile(&mut table, &grand_total)?;
    table.rows.insert(0, grand_total);

    // 4. Integrity
    let findings = integrity::check_integrity(&table);
    for finding in &findings {
        tracing::warn!("Integrity: {}", finding);
    }
    if !findings.is_empty() && config.strict {
        tracing::error!("{} integrity findings in strict mode", findings.len());
        return Err(ReconcileError::IntegrityFailed(findings).into());
    }
    if let Some(balance) = integrity::consolidation_balance(&table) {
        tracing::info!("Net consolidation across sections and entities: {:.0}", balance);
    }
    storage.save_table_csv(&table)?;

    // 5. Registry enrichment
    let registry = EntityRegistry::load(&config.name_map, &config.entities)?;
    let enrichments: Vec<Enrichment> = table.rows.iter().map(|row| registry.enrich(row)).collect();
    let matched = enrichments.iter().filter(|e| e.info.abbreviation.is_some()).count();
    tracing::info!("Matched {} of {} rows to registry entities", matched, enrichments.len());
    storage.save_budget_json(&table, &enrichments)?;

    // 6. Narratives
    let entity_chapters = if config.skip_details {
        tracing::info!("Skipping narrative extraction");
        None
    } else {
        let doc = match document {
            Some(doc) => doc,
            None => DocxDocument::open(&config.input)?,
        };
        let details = extract_entity_details(&doc);
        storage.save_details(&details)?;
        Some(details.len())
    };

    Ok(RunSummary {
        rows: table.rows.len(),
        resolved_defects: resolved.len(),
        integrity_findings: findings.len(),
        entity_chapters,
    })
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::fixtures::sample_grid;
    use crate::docx::reader::tests::{build_docx, para_xml, styled_para_xml, table_xml};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const STYLES: &str = r#"<w:style w:type="paragraph" w:styleId="SingleTxt"><w:name w:val="__Single Txt"/></w:style>"#;
    const OUTPUTS: [&str; 5] = [
        "intermediate/table6_raw.csv",
        "intermediate/table6.csv",
        "intermediate/entity_narratives.json",
        "public/budget.json",
        "public/details.json",
    ];

    /// A document whose second table is the budget table, followed by one
    /// entity chapter.
    fn write_inputs(dir: &Path) -> PipelineConfig {
        let body = [
            para_xml("Contents"),
            table_xml(&[vec!["Unrelated".into(), "table".into()]]),
            para_xml("Table 6"),
            table_xml(&sample_grid().rows),
            para_xml("1. Section 3, Political affairs"),
            styled_para_xml(
                "1.\tThe Department will continue to support the peaceful settlement of disputes.",
                "SingleTxt",
            ),
        ]
        .concat();
        let input = dir.join("budget.docx");
        fs::write(&input, build_docx(&body, Some(STYLES))).unwrap();

        let name_map = dir.join("names.csv");
        fs::write(&name_map, "table6_name,doc_name\nSpecial envoys,Special Envoys\n").unwrap();
        let entities = dir.join("entities.json");
        fs::write(
            &entities,
            r#"[{"entity": "DPPA", "entity_long": "Department of Political and Peacebuilding Affairs"}]"#,
        )
        .unwrap();

        PipelineConfig {
            input,
            table_index: 1,
            intermediate_dir: dir.join("intermediate"),
            public_dir: dir.join("public"),
            name_map,
            entities,
            keep_other_rollup: false,
            expected_defects: 2,
            strict: true,
            skip_details: false,
            from_raw: false,
        }
    }

    fn read_outputs(dir: &Path) -> Vec<Vec<u8>> {
        OUTPUTS.iter().map(|f| fs::read(dir.join(f)).unwrap()).collect()
    }

    #[test]
    fn test_end_to_end_outputs() {
        let tmp = TempDir::new().unwrap();
        let config = write_inputs(tmp.path());

        let summary = run(&config).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                rows: 11,
                resolved_defects: 2,
                integrity_findings: 0,
                entity_chapters: Some(1),
            }
        );

        let csv = fs::read_to_string(tmp.path().join("intermediate/table6.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 12);
        assert!(lines[0].starts_with("row_type,Part,Part name,Section,Section name,Entity name,2025 approved,"));
        assert!(lines[1].starts_with("grand_total,,Total,,,,1380000,1400000,"));
        assert!(!csv.contains("\tOther"));

        let json = fs::read_to_string(tmp.path().join("public/budget.json")).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 11);
        let dppa = records
            .iter()
            .find(|r| r["Entity name"] == "Department of Political and Peacebuilding Affairs")
            .unwrap();
        assert_eq!(dppa["abbreviation"], "DPPA");
        let envoys = records.iter().find(|r| r["Entity name"] == "Special envoys").unwrap();
        assert_eq!(envoys["chapter_title"], "Special Envoys");
        assert!(envoys["abbreviation"].is_null());

        let details = fs::read_to_string(tmp.path().join("public/details.json")).unwrap();
        assert!(details.contains("\"section\": \"3\""));
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let config = write_inputs(tmp.path());

        run(&config).unwrap();
        let first = read_outputs(tmp.path());
        run(&config).unwrap();
        assert_eq!(read_outputs(tmp.path()), first);

        // Re-running from the saved raw table gives the same outputs
        run(&PipelineConfig { from_raw: true, ..config }).unwrap();
        assert_eq!(read_outputs(tmp.path()), first);
    }

    #[test]
    fn test_keep_other_rollup_changes_baseline() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig {
            keep_other_rollup: true,
            ..write_inputs(tmp.path())
        };

        // The restated rollup double counts section 3
        let err = run(&config).unwrap_err();
        assert!(matches!(
            err,
            AppError::Reconcile(ReconcileError::UnexpectedDiscrepancyCount { expected: 2, .. })
        ));
        assert!(!tmp.path().join("intermediate/table6.csv").exists());
    }

    #[test]
    fn test_missing_table_index_fails() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig {
            table_index: 9,
            ..write_inputs(tmp.path())
        };
        let err = run(&config).unwrap_err();
        assert!(matches!(err, AppError::Docx(_)));
    }
}
