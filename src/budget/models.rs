// src/budget/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header names the pipeline depends on. Everything else in the table header
/// is carried through as an opaque measure column.
pub mod columns {
    /// Label column holding part, section and entity names.
    pub const LABEL: &str = "Budget part/section/entity";
    pub const APPROVED: &str = "2025 approved";
    pub const PROPOSED: &str = "2026 proposed programme budget";
    pub const RELOCATION: &str = "UN80 changes (excluding transitional capacities) – Relocation";
    pub const CONSOLIDATION: &str = "UN80 changes (excluding transitional capacities) – Consolidation";
    pub const OTHER: &str = "UN80 changes (excluding transitional capacities) – Other";
    pub const UN80_TOTAL: &str = "UN80 changes (excluding transitional capacities) – Total";
    pub const REVISED: &str = "2026 revised estimate";
    /// Under-aggregated in the source; rolled up by the corrector.
    pub const TRANSITIONAL: &str = "Transitional capacities";
    pub const VARIANCE_VS_APPROVED: &str =
        "Variance (excluding resources redeployed for consolidation) – Compared with 2025 approved (percentage)";
    pub const VARIANCE_VS_PROPOSED: &str =
        "Variance (excluding resources redeployed for consolidation) – Compared with 2026 proposed programme budget (percentage)";

    /// Substring (case-insensitive) marking a percentage-point column.
    pub const PERCENTAGE_MARKER: &str = "percentage";
}

/// Output field names for the identifying columns, in output order.
pub mod fields {
    pub const ROW_TYPE: &str = "row_type";
    pub const PART: &str = "Part";
    pub const PART_NAME: &str = "Part name";
    pub const SECTION: &str = "Section";
    pub const SECTION_NAME: &str = "Section name";
    pub const ENTITY_NAME: &str = "Entity name";
    pub const FOOTNOTES: &str = "footnotes";

    pub const LEADING: [&str; 6] = [ROW_TYPE, PART, PART_NAME, SECTION, SECTION_NAME, ENTITY_NAME];
}

/// Level of a row in the grand total → part → section → entity rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    GrandTotal,
    PartTotal,
    SectionTotal,
    EntityTotal,
}

impl RowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowType::GrandTotal => "grand_total",
            RowType::PartTotal => "part_total",
            RowType::SectionTotal => "section_total",
            RowType::EntityTotal => "entity_total",
        }
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric column of the table, named from the two-level header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureColumn {
    pub name: String,
    /// Percentage-point columns are neither scaled nor summed into the grand total.
    pub is_percentage: bool,
}

impl MeasureColumn {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let is_percentage = name.to_lowercase().contains(columns::PERCENTAGE_MARKER);
        Self { name, is_percentage }
    }
}

/// One reconstructed row of the budget hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub row_type: RowType,
    pub part: Option<String>,
    pub part_name: Option<String>,
    pub section: Option<String>,
    pub section_name: Option<String>,
    pub entity_name: Option<String>,
    /// Cleaned values, aligned with `BudgetTable::columns`.
    pub values: Vec<Option<f64>>,
    /// Sorted, deduplicated footnote letters; `None` when the row has none.
    pub footnotes: Option<String>,
}

impl BudgetRow {
    pub fn value(&self, col: usize) -> Option<f64> {
        self.values.get(col).copied().flatten()
    }

    /// Most specific name available, for log and diagnostic output.
    pub fn label(&self) -> String {
        if let Some(entity) = &self.entity_name {
            return entity.clone();
        }
        if let Some(section_name) = &self.section_name {
            return format!(
                "Section {}: {}",
                self.section.as_deref().unwrap_or("?"),
                section_name
            );
        }
        self.part_name
            .clone()
            .or_else(|| self.part.clone())
            .unwrap_or_else(|| self.row_type.to_string())
    }
}

/// Measure columns plus rows in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetTable {
    pub columns: Vec<MeasureColumn>,
    pub rows: Vec<BudgetRow>,
}

impl BudgetTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Indices of every measure column.
    pub fn all_columns(&self) -> Vec<usize> {
        (0..self.columns.len()).collect()
    }

    /// Indices of the additive columns (everything except percentages).
    pub fn summable_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_percentage)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn rows_of(&self, row_type: RowType) -> impl Iterator<Item = &BudgetRow> {
        self.rows.iter().filter(move |r| r.row_type == row_type)
    }

    /// Part identifiers in order of first appearance.
    pub fn parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = Vec::new();
        for part in self.rows.iter().filter_map(|r| r.part.as_ref()) {
            if !parts.contains(part) {
                parts.push(part.clone());
            }
        }
        parts
    }

    /// Output header: identifying fields, measure columns, footnotes.
    pub fn header(&self) -> Vec<String> {
        fields::LEADING
            .iter()
            .map(|s| s.to_string())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .chain(std::iter::once(fields::FOOTNOTES.to_string()))
            .collect()
    }

    pub fn count(&self, row_type: RowType) -> usize {
        self.rows_of(row_type).count()
    }
}

/// Column sum treating missing values as zero.
pub fn sum_column<'a, I>(rows: I, col: usize) -> f64
where
    I: IntoIterator<Item = &'a BudgetRow>,
{
    rows.into_iter().filter_map(|r| r.value(col)).sum()
}
