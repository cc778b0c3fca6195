// src/reconcile/corrector.rs
use crate::budget::{columns, BudgetRow, BudgetTable, RowType};
use crate::reconcile::{verify_hierarchy, Discrepancy};
use crate::utils::error::ReconcileError;
use std::collections::HashMap;

/// Number of hierarchy discrepancies the source document is known to carry,
/// all caused by transitional capacities not being rolled up.
pub const EXPECTED_KNOWN_DEFECTS: usize = 2;

/// Re-derives one under-aggregated column bottom-up, guarded by the verifier
/// before and after.
#[derive(Debug, Clone)]
pub struct KnownDefectCorrector {
    column: String,
    expected_defects: usize,
}

impl Default for KnownDefectCorrector {
    fn default() -> Self {
        Self::new(columns::TRANSITIONAL, EXPECTED_KNOWN_DEFECTS)
    }
}

impl KnownDefectCorrector {
    pub fn new(column: impl Into<String>, expected_defects: usize) -> Self {
        Self {
            column: column.into(),
            expected_defects,
        }
    }

    /// Verifies, corrects and re-verifies. Fails when the verifier's baseline
    /// does not match the expected defect count, when a baseline discrepancy
    /// does not involve the corrected column, or when anything is left
    /// unresolved afterwards. Returns the discrepancies that were resolved.
    pub fn reconcile(
        &self,
        table: &mut BudgetTable,
        grand_total: &BudgetRow,
    ) -> Result<Vec<Discrepancy>, ReconcileError> {
        let found = verify_hierarchy(table, Some(grand_total));
        if found.len() != self.expected_defects {
            tracing::error!(
                "Verifier found {} discrepancies, expected {}; source structure changed",
                found.len(),
                self.expected_defects
            );
            return Err(ReconcileError::UnexpectedDiscrepancyCount {
                expected: self.expected_defects,
                found: found.len(),
                discrepancies: found,
            });
        }
        if !found.iter().all(|d| d.names_column(&self.column)) {
            tracing::error!("Baseline discrepancies are not all in '{}'", self.column);
            return Err(ReconcileError::UnattributedDiscrepancies {
                column: self.column.clone(),
                discrepancies: found,
            });
        }
        for d in &found {
            tracing::info!("Known defect: {}", d);
        }

        let changed = self.correct(table)?;
        tracing::info!("Rolled up '{}': {} aggregate values rewritten", self.column, changed);

        let remaining = verify_hierarchy(table, Some(grand_total));
        if !remaining.is_empty() {
            tracing::error!("{} discrepancies remain after correction", remaining.len());
            return Err(ReconcileError::UnresolvedDiscrepancies(remaining));
        }
        Ok(found)
    }

    /// Recomputes section totals from their entities (only where the entity
    /// sum is strictly positive), then part totals from their sections (only
    /// where the part has section rows). The grand total is left untouched.
    /// Returns how many values changed.
    pub fn correct(&self, table: &mut BudgetTable) -> Result<usize, ReconcileError> {
        let col = table
            .column_index(&self.column)
            .ok_or_else(|| ReconcileError::MissingColumn(self.column.clone()))?;
        let mut changed = 0;

        // Sections from entities
        let mut entity_sums: HashMap<(String, String), f64> = HashMap::new();
        for row in table.rows_of(RowType::EntityTotal) {
            if let Some(key) = section_key(row) {
                *entity_sums.entry(key).or_default() += row.value(col).unwrap_or(0.0);
            }
        }
        for row in table.rows.iter_mut().filter(|r| r.row_type == RowType::SectionTotal) {
            let Some(sum) = section_key(row).and_then(|key| entity_sums.get(&key).copied()) else {
                continue;
            };
            if sum > 0.0 {
                changed += set_value(row, col, sum, &self.column);
            }
        }

        // Parts from the corrected sections
        let mut section_sums: HashMap<String, f64> = HashMap::new();
        for row in table.rows_of(RowType::SectionTotal) {
            if let Some(part) = &row.part {
                *section_sums.entry(part.clone()).or_default() += row.value(col).unwrap_or(0.0);
            }
        }
        for row in table.rows.iter_mut().filter(|r| r.row_type == RowType::PartTotal) {
            let Some(sum) = row.part.as_ref().and_then(|p| section_sums.get(p).copied()) else {
                continue;
            };
            changed += set_value(row, col, sum, &self.column);
        }

        Ok(changed)
    }
}

fn section_key(row: &BudgetRow) -> Option<(String, String)> {
    Some((row.part.clone()?, row.section.clone()?))
}

fn set_value(row: &mut BudgetRow, col: usize, value: f64, column: &str) -> usize {
    if row.value(col) == Some(value) {
        return 0;
    }
    tracing::debug!("{} '{}': {:?} -> {}", column, row.label(), row.value(col), value);
    row.values[col] = Some(value);
    1
}
