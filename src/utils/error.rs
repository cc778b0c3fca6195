// src/utils/error.rs
#![allow(dead_code)]
use thiserror::Error;

use crate::reconcile::Discrepancy;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid DOCX container: {0}")]
    Container(#[from] zip::result::ZipError),

    #[error("Failed to parse {part}: {message}")]
    Xml { part: String, message: String },

    #[error("Document part not found: {0}")]
    MissingPart(String),

    #[error("Table index {index} out of range (document has {count} tables)")]
    TableNotFound { index: usize, count: usize },
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Raw grid has {0} rows; need two header rows, a label row and data")]
    TooShort(usize),

    #[error("Label column '{0}' not found in header")]
    MissingLabelColumn(String),

    #[error("Required measure column '{0}' not found in header")]
    MissingColumn(String),

    #[error("Grand total row '{label}' found {count} times, expected exactly once")]
    GrandTotal { label: String, count: usize },
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Expected {expected} known discrepancies, verifier found {found}:\n{}", join_lines(.discrepancies))]
    UnexpectedDiscrepancyCount {
        expected: usize,
        found: usize,
        discrepancies: Vec<Discrepancy>,
    },

    #[error("Baseline discrepancies not all attributable to '{column}':\n{}", join_lines(.discrepancies))]
    UnattributedDiscrepancies {
        column: String,
        discrepancies: Vec<Discrepancy>,
    },

    #[error("Correction left {} discrepancies unresolved:\n{}", .0.len(), join_lines(.0))]
    UnresolvedDiscrepancies(Vec<Discrepancy>),

    #[error("Corrected column '{0}' not present in table")]
    MissingColumn(String),

    #[error("Integrity checks failed with {} findings:\n{}", .0.len(), .0.join("\n"))]
    IntegrityFailed(Vec<String>),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Name mapping error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Entity registry error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Document read failed: {0}")]
    Docx(#[from] DocxError),

    #[error("Table reconstruction failed: {0}")]
    Table(#[from] TableError),

    #[error("Hierarchy reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Registry lookup failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn join_lines(discrepancies: &[Discrepancy]) -> String {
    discrepancies
        .iter()
        .map(|d| format!("  - {}", d))
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::verifier::{ColumnDiff, Finding, Scope};

    #[test]
    fn test_reconcile_error_lists_each_scope_on_its_own_line() {
        let discrepancies = vec![
            Discrepancy {
                scope: Scope::Part("Part I".into()),
                finding: Finding::Mismatch(vec![ColumnDiff {
                    column: "Transitional capacities".into(),
                    difference: 5000.0,
                }]),
            },
            Discrepancy {
                scope: Scope::Part("Part II".into()),
                finding: Finding::MissingTotal,
            },
        ];
        let err = AppError::from(ReconcileError::UnexpectedDiscrepancyCount {
            expected: 2,
            found: 3,
            discrepancies,
        });

        let rendered = err.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Hierarchy reconciliation failed: Expected 2 known discrepancies, verifier found 3:",
                "  - Part I: part_total != sum(section_totals), diff={'Transitional capacities': 5000}",
                "  - Part II: part_total != sum(section_totals) (aggregate row missing)",
            ]
        );
    }
}
