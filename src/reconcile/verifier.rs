// src/reconcile/verifier.rs
use crate::budget::{sum_column, BudgetRow, BudgetTable, RowType};
use std::collections::BTreeMap;
use std::fmt;

/// Absolute difference at or below which a rollup is considered consistent.
pub const TOLERANCE: f64 = 0.1;

/// Which aggregate a discrepancy was found at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    GrandTotal,
    Part(String),
    Section { part: String, section: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDiff {
    pub column: String,
    /// Absolute difference between the aggregate and the sum of its children.
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// Aggregate differs from the sum of its children in these columns.
    Mismatch(Vec<ColumnDiff>),
    /// Children exist but the aggregate row itself is absent.
    MissingTotal,
}

/// One inconsistent scope, rendered as a human-readable line via `Display`.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub scope: Scope,
    pub finding: Finding,
}

impl Discrepancy {
    /// Whether the mismatch involves the named column.
    pub fn names_column(&self, column: &str) -> bool {
        match &self.finding {
            Finding::Mismatch(diffs) => diffs.iter().any(|d| d.column == column),
            Finding::MissingTotal => false,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relation = match &self.scope {
            Scope::GrandTotal => "Grand total != sum(part_totals)".to_string(),
            Scope::Part(part) => format!("{}: part_total != sum(section_totals)", part),
            Scope::Section { part, section } => {
                format!("{} Section {}: section_total != sum(entity_totals)", part, section)
            }
        };
        match &self.finding {
            Finding::MissingTotal => write!(f, "{} (aggregate row missing)", relation),
            Finding::Mismatch(diffs) => {
                let rendered = diffs
                    .iter()
                    .map(|d| format!("'{}': {}", d.column, d.difference))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}, diff={{{}}}", relation, rendered)
            }
        }
    }
}

/// Recomputes every aggregate level from its children and reports the scopes
/// whose difference exceeds [`TOLERANCE`] in any column. An empty result
/// means the hierarchy is consistent.
///
/// The grand total is compared over summable columns only; part and section
/// totals are compared over every measure column, percentages included.
pub fn verify_hierarchy(table: &BudgetTable, grand_total: Option<&BudgetRow>) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();
    let all_columns = table.all_columns();

    // 1. Grand total vs. part totals
    if let Some(grand) = grand_total {
        let parts: Vec<&BudgetRow> = table.rows_of(RowType::PartTotal).collect();
        let diffs = compare(table, grand, &parts, &table.summable_columns());
        if !diffs.is_empty() {
            discrepancies.push(Discrepancy {
                scope: Scope::GrandTotal,
                finding: Finding::Mismatch(diffs),
            });
        }
    }

    // 2. Part totals vs. section totals, parts in order of appearance
    for part in table.parts() {
        let in_part = |r: &&BudgetRow| r.part.as_deref() == Some(part.as_str());
        let sections: Vec<&BudgetRow> = table.rows_of(RowType::SectionTotal).filter(in_part).collect();
        if sections.is_empty() {
            continue;
        }
        let finding = match table.rows_of(RowType::PartTotal).find(in_part) {
            Some(total) => {
                let diffs = compare(table, total, &sections, &all_columns);
                if diffs.is_empty() {
                    continue;
                }
                Finding::Mismatch(diffs)
            }
            None => Finding::MissingTotal,
        };
        discrepancies.push(Discrepancy {
            scope: Scope::Part(part.clone()),
            finding,
        });
    }

    // 3. Section totals vs. entity totals, grouped by (part, section) in sorted order
    let mut groups: BTreeMap<(&str, &str), (Vec<&BudgetRow>, Vec<&BudgetRow>)> = BTreeMap::new();
    for row in &table.rows {
        let (Some(part), Some(section)) = (row.part.as_deref(), row.section.as_deref()) else {
            continue;
        };
        let group = groups.entry((part, section)).or_default();
        match row.row_type {
            RowType::SectionTotal => group.0.push(row),
            RowType::EntityTotal => group.1.push(row),
            _ => {}
        }
    }
    for ((part, section), (totals, entities)) in groups {
        let Some(total) = totals.first() else { continue };
        if entities.is_empty() {
            continue;
        }
        let diffs = compare(table, total, &entities, &all_columns);
        if !diffs.is_empty() {
            discrepancies.push(Discrepancy {
                scope: Scope::Section {
                    part: part.to_string(),
                    section: section.to_string(),
                },
                finding: Finding::Mismatch(diffs),
            });
        }
    }

    for d in &discrepancies {
        tracing::debug!("Hierarchy discrepancy: {}", d);
    }
    discrepancies
}

/// Columns where `total` differs from the sum of `children` beyond tolerance.
/// A missing aggregate value is never a mismatch; missing child values count as zero.
fn compare(table: &BudgetTable, total: &BudgetRow, children: &[&BudgetRow], cols: &[usize]) -> Vec<ColumnDiff> {
    cols.iter()
        .filter_map(|&col| {
            let expected = total.value(col)?;
            let actual = sum_column(children.iter().copied(), col);
            let difference = (expected - actual).abs();
            (difference > TOLERANCE).then(|| ColumnDiff {
                column: table.columns[col].name.clone(),
                difference,
            })
        })
        .collect()
}
