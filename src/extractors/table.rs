// src/extractors/table.rs

// --- Imports ---
use crate::budget::models::columns;
use crate::budget::{BudgetRow, BudgetTable, MeasureColumn, RowType};
use crate::docx::RawGrid;
use crate::utils::error::TableError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

// --- Constants ---
/// Grid rows consumed by the two-level header plus the label row beneath it.
const HEADER_ROWS: usize = 2;
const SKIPPED_LABEL_ROWS: usize = 1;

/// Amounts are published in thousands.
const THOUSANDS: f64 = 1000.0;

/// Source convention for a zero amount.
const EN_DASH: &str = "–";
const ENTITY_PREFIX: &str = "–\t";
const HEADER_SEPARATOR: &str = " – ";

/// Name of the rule that drops the restated "– Other" subtotal.
pub const REDUNDANT_OTHER_ROLLUP: &str = "redundant-other-rollup";

/// Entity labels where a footnote letter was typeset without a separator:
/// (label as extracted, canonical name, footnote letter).
const MALFORMED_ENTITY_LABELS: &[(&str, &str, char)] =
    &[("Resident coordinator systema", "Resident coordinator system", 'a')];

// --- Regex Patterns (Lazy Static) ---
/// Ordered label patterns; the first match wins. Part totals are positional
/// (the row after a part header) and are resolved before section matching.
static LABEL_PATTERNS: Lazy<Vec<(Regex, LabelPattern)>> = Lazy::new(|| {
    [
        (r"^Part ", LabelPattern::PartHeader),
        (r"^(\d+[A-Z]?)\.\t(.+)", LabelPattern::Section),
    ]
    .iter()
    .filter_map(|(pat, kind)| Regex::new(pat).ok().map(|re| (re, *kind)))
    .collect()
});

static FOOTNOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z]+)$").expect("Failed to compile FOOTNOTE_RE"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]").expect("Failed to compile SEPARATOR_RE"));
static PARENTHESES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.+)\)[a-z]*").expect("Failed to compile PARENTHESES_RE"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelPattern {
    PartHeader,
    Section,
}

/// What a single label line is, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    /// Label-only row introducing a part; dropped after parsing.
    PartHeader,
    PartTotal,
    SectionTotal { id: String, name: String },
    EntityTotal,
}

/// A label that, when matched exactly, removes the row from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    pub name: String,
    pub label: String,
}

/// Layout of the budget table being reconstructed.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub label_column: String,
    /// Rows without a value here are spacer rows.
    pub approved_column: String,
    pub grand_total_label: String,
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            label_column: columns::LABEL.to_string(),
            approved_column: columns::APPROVED.to_string(),
            grand_total_label: "Total".to_string(),
            exclusions: vec![ExclusionRule {
                name: REDUNDANT_OTHER_ROLLUP.to_string(),
                // Restates the sum of the rows that follow it in its section
                label: "–\tOther".to_string(),
            }],
        }
    }
}

impl TableConfig {
    /// Drops a named exclusion rule, keeping the rows it would remove.
    pub fn without_exclusion(mut self, name: &str) -> Self {
        self.exclusions.retain(|rule| rule.name != name);
        self
    }

    fn is_excluded(&self, label: &str) -> bool {
        self.exclusions.iter().any(|rule| rule.label == label)
    }
}

/// Classifier output: the body rows plus the captured grand total.
#[derive(Debug, Clone)]
pub struct ClassifiedTable {
    pub table: BudgetTable,
    pub grand_total: BudgetRow,
}

/// Turns the raw grid into typed rows with part/section linkage.
pub struct TableClassifier {
    config: TableConfig,
}

impl TableClassifier {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, grid: &RawGrid) -> Result<ClassifiedTable, TableError> {
        let first_data_row = HEADER_ROWS + SKIPPED_LABEL_ROWS;
        if grid.len() < first_data_row {
            return Err(TableError::TooShort(grid.len()));
        }

        // 1. Name the columns from the two header rows
        let names = column_names(grid);
        let label_idx = names
            .iter()
            .position(|n| *n == self.config.label_column)
            .ok_or_else(|| TableError::MissingLabelColumn(self.config.label_column.clone()))?;
        let measure_idx: Vec<usize> = (0..names.len()).filter(|&i| i != label_idx).collect();
        let measures: Vec<MeasureColumn> = measure_idx
            .iter()
            .map(|&i| MeasureColumn::new(names[i].clone()))
            .collect();
        let approved = measures
            .iter()
            .position(|c| c.name == self.config.approved_column)
            .ok_or_else(|| TableError::MissingColumn(self.config.approved_column.clone()))?;
        tracing::debug!("Table columns: label '{}' + {} measures", names[label_idx], measures.len());

        // 2. Single pass with carried part/section state
        let mut part: Option<String> = None;
        let mut part_name: Option<String> = None;
        let mut section: Option<(String, String)> = None;
        let mut after_part_header = false;

        let mut rows = Vec::new();
        let mut grand_totals = Vec::new();

        for row_idx in first_data_row..grid.len() {
            let label = grid.cell(row_idx, label_idx);
            let kind = classify_label(label, after_part_header);
            after_part_header = kind == LineKind::PartHeader;

            match &kind {
                LineKind::PartHeader => {
                    part = Some(label.to_string());
                    section = None;
                }
                LineKind::PartTotal => part_name = Some(label.to_string()),
                LineKind::SectionTotal { id, name } if part.is_some() => {
                    section = Some((id.clone(), name.clone()));
                }
                _ => {}
            }

            let cells: Vec<&str> = measure_idx.iter().map(|&i| grid.cell(row_idx, i)).collect();
            let values: Vec<Option<f64>> = cells
                .iter()
                .zip(&measures)
                .map(|(raw, col)| clean_numeric(raw).map(|v| if col.is_percentage { v } else { v * THOUSANDS }))
                .collect();

            if label == self.config.grand_total_label {
                grand_totals.push(values.clone());
            }
            if kind == LineKind::PartHeader
                || label == self.config.grand_total_label
                || self.config.is_excluded(label)
            {
                tracing::debug!("Row {}: dropping structural/excluded label '{}'", row_idx, label);
                continue;
            }
            if values[approved].is_none() {
                tracing::trace!("Row {}: no {} value, skipping spacer row", row_idx, self.config.approved_column);
                continue;
            }

            let (row_type, section_fields, entity_name, name_marker) = match &kind {
                LineKind::PartTotal => (RowType::PartTotal, None, None, None),
                LineKind::SectionTotal { id, name } => (
                    RowType::SectionTotal,
                    Some((id.clone(), name.clone())),
                    None,
                    None,
                ),
                _ => {
                    let (name, marker) = split_entity_label(label);
                    (RowType::EntityTotal, section.clone(), name, marker)
                }
            };

            let footnotes = collect_footnotes(&cells, name_marker);
            let (section_id, section_name) = match section_fields {
                Some((id, name)) => (Some(id), Some(name)),
                None => (None, None),
            };
            tracing::debug!("Row {}: {} '{}'", row_idx, row_type, label);

            rows.push(BudgetRow {
                row_type,
                part: part.clone(),
                part_name: part_name.clone(),
                section: section_id,
                section_name,
                entity_name,
                values,
                footnotes,
            });
        }

        // 3. The grand total row becomes its own record
        if grand_totals.len() != 1 {
            return Err(TableError::GrandTotal {
                label: self.config.grand_total_label.clone(),
                count: grand_totals.len(),
            });
        }
        let grand_total = BudgetRow {
            row_type: RowType::GrandTotal,
            part: None,
            part_name: Some(self.config.grand_total_label.clone()),
            section: None,
            section_name: None,
            entity_name: None,
            values: grand_totals.remove(0),
            footnotes: None,
        };

        let table = BudgetTable { columns: measures, rows };
        tracing::info!(
            "Classified table: {} part totals, {} section totals, {} entity totals",
            table.count(RowType::PartTotal),
            table.count(RowType::SectionTotal),
            table.count(RowType::EntityTotal)
        );
        Ok(ClassifiedTable { table, grand_total })
    }
}

/// Joins the two header levels: the first level alone when the levels agree
/// or the second is blank, otherwise "first – second".
fn column_names(grid: &RawGrid) -> Vec<String> {
    (0..grid.width())
        .map(|col| {
            let top = grid.cell(0, col);
            let sub = grid.cell(1, col);
            if top == sub || sub.is_empty() {
                top.to_string()
            } else {
                format!("{}{}{}", top, HEADER_SEPARATOR, sub)
            }
        })
        .collect()
}

fn classify_label(label: &str, after_part_header: bool) -> LineKind {
    let matched = LABEL_PATTERNS
        .iter()
        .find_map(|(re, kind)| re.captures(label).map(|caps| (caps, *kind)));

    match matched {
        Some((_, LabelPattern::PartHeader)) => LineKind::PartHeader,
        _ if after_part_header => LineKind::PartTotal,
        Some((caps, LabelPattern::Section)) => LineKind::SectionTotal {
            id: caps[1].to_string(),
            name: caps[2].to_string(),
        },
        None => LineKind::EntityTotal,
    }
}

/// Entity name from an entity label, plus a footnote letter split off a
/// known malformed label.
fn split_entity_label(label: &str) -> (Option<String>, Option<char>) {
    let name = label.strip_prefix(ENTITY_PREFIX).unwrap_or(label);
    if name.is_empty() {
        return (None, None);
    }
    match MALFORMED_ENTITY_LABELS.iter().find(|(raw, _, _)| *raw == name) {
        Some((_, canonical, marker)) => (Some(canonical.to_string()), Some(*marker)),
        None => (Some(name.to_string()), None),
    }
}

/// Union of the trailing lowercase markers of every measure cell, sorted and
/// deduplicated. `None` when the row carries no markers.
fn collect_footnotes(cells: &[&str], extra: Option<char>) -> Option<String> {
    let mut markers: BTreeSet<char> = extra.into_iter().collect();
    for cell in cells {
        if let Some(caps) = FOOTNOTE_RE.captures(cell) {
            markers.extend(caps[1].chars());
        }
    }
    if markers.is_empty() {
        None
    } else {
        Some(markers.into_iter().collect())
    }
}

/// Parses a cell in the source typographic convention, unscaled.
/// "–" is zero, "(x)" is negative, separators and trailing footnote letters
/// are dropped. Blank or unparseable text is missing.
pub fn clean_numeric(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let text = if raw == EN_DASH { "0" } else { raw };
    let text = SEPARATOR_RE.replace_all(text, "");
    let text = PARENTHESES_RE.replace_all(&text, "-${1}");
    let text = FOOTNOTE_RE.replace(&text, "");
    text.parse::<f64>().ok().filter(|v| !v.is_nan())
}
