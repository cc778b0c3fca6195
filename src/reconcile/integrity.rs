// src/reconcile/integrity.rs
//! Row-level consistency checks on the corrected table (grand total included).
//! Each check returns human-readable findings; an empty list means it passed.

use crate::budget::{columns, BudgetTable, RowType};
use std::collections::{BTreeMap, HashSet};

/// A formula finding needs both an absolute difference above this amount...
pub const ABS_TOL: f64 = 100.0;
/// ...and a relative difference above this fraction.
pub const REL_TOL: f64 = 0.0001;
/// Percentage points a reported variance may differ from the recomputed one.
pub const PCT_TOL: f64 = 0.2;
/// A variance below this removes more than the whole base.
pub const MIN_VARIANCE_PCT: f64 = -100.0;
/// Variances above this are logged but tolerated (new programmes).
const HIGH_VARIANCE_PCT: f64 = 200.0;

fn exceeds_tolerance(expected: f64, actual: f64) -> bool {
    let diff = (expected - actual).abs();
    diff > ABS_TOL && diff / expected.abs().max(1.0) > REL_TOL
}

fn require(table: &BudgetTable, names: &[&str]) -> Result<Vec<usize>, String> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| format!("column '{}' missing, check skipped", name))
        })
        .collect()
}

/// Runs every check and concatenates the findings.
pub fn check_integrity(table: &BudgetTable) -> Vec<String> {
    let mut findings = Vec::new();
    findings.extend(un80_total_formula(table));
    findings.extend(revised_estimate_formula(table));
    findings.extend(sign_constraints(table));
    findings.extend(variance_percentage_formula(table));
    findings.extend(percentage_bounds(table));
    findings.extend(completeness(table));
    findings.extend(row_type_coverage(table));
    findings.extend(unique_entity_names(table));
    findings.extend(part_sequence(table));
    findings
}

/// UN80 total == relocation + consolidation + other, missing components as zero.
pub fn un80_total_formula(table: &BudgetTable) -> Vec<String> {
    let cols = match require(
        table,
        &[columns::RELOCATION, columns::CONSOLIDATION, columns::OTHER, columns::UN80_TOTAL],
    ) {
        Ok(cols) => cols,
        Err(finding) => return vec![finding],
    };
    let (relocation, consolidation, other, total) = (cols[0], cols[1], cols[2], cols[3]);

    table
        .rows
        .iter()
        .filter_map(|row| {
            let expected = row.value(total)?;
            let actual = [relocation, consolidation, other]
                .iter()
                .map(|&c| row.value(c).unwrap_or(0.0))
                .sum::<f64>();
            exceeds_tolerance(expected, actual).then(|| {
                format!(
                    "{}: UN80 total={:.0}, relocation+consolidation+other={:.0}",
                    row.label(),
                    expected,
                    actual
                )
            })
        })
        .collect()
}

/// Revised estimate == proposed + UN80 total. Transitional capacities are
/// not part of the revised estimate.
pub fn revised_estimate_formula(table: &BudgetTable) -> Vec<String> {
    let cols = match require(table, &[columns::PROPOSED, columns::UN80_TOTAL, columns::REVISED]) {
        Ok(cols) => cols,
        Err(finding) => return vec![finding],
    };
    let (proposed, total, revised) = (cols[0], cols[1], cols[2]);

    table
        .rows
        .iter()
        .filter_map(|row| {
            let expected = row.value(revised)?;
            let actual = row.value(proposed).unwrap_or(0.0) + row.value(total).unwrap_or(0.0);
            exceeds_tolerance(expected, actual).then(|| {
                format!(
                    "{}: revised={:.0}, proposed+UN80 total={:.0}",
                    row.label(),
                    expected,
                    actual
                )
            })
        })
        .collect()
}

/// Approved, proposed, revised and transitional capacities are never negative.
pub fn sign_constraints(table: &BudgetTable) -> Vec<String> {
    let names = [columns::APPROVED, columns::PROPOSED, columns::REVISED, columns::TRANSITIONAL];
    let cols = match require(table, &names) {
        Ok(cols) => cols,
        Err(finding) => return vec![finding],
    };

    let mut findings = Vec::new();
    for (name, col) in names.iter().zip(cols) {
        for row in &table.rows {
            if let Some(v) = row.value(col).filter(|v| *v < 0.0) {
                findings.push(format!("{}: {} = {:.0} is negative", row.label(), name, v));
            }
        }
    }
    findings
}

/// Reported variance == (revised - consolidation - base) / base * 100, once
/// against 2025 approved and once against 2026 proposed. Rows without a
/// reported variance, base or revised estimate, or with a zero base, are skipped.
pub fn variance_percentage_formula(table: &BudgetTable) -> Vec<String> {
    let cols = match require(
        table,
        &[
            columns::REVISED,
            columns::CONSOLIDATION,
            columns::APPROVED,
            columns::VARIANCE_VS_APPROVED,
            columns::PROPOSED,
            columns::VARIANCE_VS_PROPOSED,
        ],
    ) {
        Ok(cols) => cols,
        Err(finding) => return vec![finding],
    };
    let (revised, consolidation) = (cols[0], cols[1]);
    let comparisons = [
        (cols[2], cols[3], columns::VARIANCE_VS_APPROVED),
        (cols[4], cols[5], columns::VARIANCE_VS_PROPOSED),
    ];

    let mut findings = Vec::new();
    for (base_col, pct_col, pct_name) in comparisons {
        for row in &table.rows {
            let (Some(reported), Some(base), Some(estimate)) =
                (row.value(pct_col), row.value(base_col), row.value(revised))
            else {
                continue;
            };
            if base == 0.0 {
                continue;
            }
            let excl_consolidation = estimate - row.value(consolidation).unwrap_or(0.0);
            let calculated = (excl_consolidation - base) / base * 100.0;
            let diff = (reported - calculated).abs();
            if diff > PCT_TOL {
                findings.push(format!(
                    "{}: {} reported={:.1}%, calculated={:.1}%, diff={:.1}pp",
                    row.label(),
                    pct_name,
                    reported,
                    calculated,
                    diff
                ));
            }
        }
    }
    findings
}

/// Variance percentages are never below -100%. Values above 200% are only logged.
pub fn percentage_bounds(table: &BudgetTable) -> Vec<String> {
    let names = [columns::VARIANCE_VS_APPROVED, columns::VARIANCE_VS_PROPOSED];
    let cols = match require(table, &names) {
        Ok(cols) => cols,
        Err(finding) => return vec![finding],
    };

    let mut findings = Vec::new();
    for (name, col) in names.iter().zip(cols) {
        for row in &table.rows {
            let Some(v) = row.value(col) else { continue };
            if v < MIN_VARIANCE_PCT {
                findings.push(format!("{}: {} = {:.1}% is below -100%", row.label(), name, v));
            } else if v > HIGH_VARIANCE_PCT {
                tracing::info!("{}: {} = {:.1}%", row.label(), name, v);
            }
        }
    }
    findings
}

/// Every non-grand-total row has a part; section and entity rows have a
/// section; entity rows have a name.
pub fn completeness(table: &BudgetTable) -> Vec<String> {
    let mut findings = Vec::new();
    let missing_part = table
        .rows
        .iter()
        .filter(|r| r.row_type != RowType::GrandTotal && r.part.is_none())
        .count();
    let missing_section = table
        .rows
        .iter()
        .filter(|r| matches!(r.row_type, RowType::SectionTotal | RowType::EntityTotal) && r.section.is_none())
        .count();
    let missing_entity = table
        .rows_of(RowType::EntityTotal)
        .filter(|r| r.entity_name.is_none())
        .count();

    if missing_part > 0 {
        findings.push(format!("{} rows missing Part", missing_part));
    }
    if missing_section > 0 {
        findings.push(format!("{} section/entity rows missing Section", missing_section));
    }
    if missing_entity > 0 {
        findings.push(format!("{} entity rows missing Entity name", missing_entity));
    }
    findings
}

/// Exactly one grand total row.
pub fn row_type_coverage(table: &BudgetTable) -> Vec<String> {
    match table.count(RowType::GrandTotal) {
        1 => Vec::new(),
        n => vec![format!("expected exactly 1 grand_total row, found {}", n)],
    }
}

/// Entity names are unique within each (part, section).
pub fn unique_entity_names(table: &BudgetTable) -> Vec<String> {
    let mut seen: BTreeMap<(&str, &str), HashSet<&str>> = BTreeMap::new();
    let mut findings = Vec::new();

    for row in table.rows_of(RowType::EntityTotal) {
        let (Some(part), Some(section), Some(name)) =
            (row.part.as_deref(), row.section.as_deref(), row.entity_name.as_deref())
        else {
            continue;
        };
        if !seen.entry((part, section)).or_default().insert(name) {
            findings.push(format!("{} Section {}: duplicate entity '{}'", part, section, name));
        }
    }
    findings
}

/// Parts appear as "Part I", "Part II", ... in order, without gaps.
pub fn part_sequence(table: &BudgetTable) -> Vec<String> {
    table
        .parts()
        .iter()
        .enumerate()
        .filter_map(|(i, part)| {
            let expected = format!("Part {}", roman(i + 1));
            (*part != expected).then(|| format!("part #{} is '{}', expected '{}'", i + 1, part, expected))
        })
        .collect()
}

fn roman(mut n: usize) -> String {
    const NUMERALS: [(usize, &str); 9] = [
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Net consolidation over section and entity rows. Consolidation moves
/// resources between entities, so this should be close to zero.
pub fn consolidation_balance(table: &BudgetTable) -> Option<f64> {
    let col = table.column_index(columns::CONSOLIDATION)?;
    Some(
        table
            .rows
            .iter()
            .filter(|r| matches!(r.row_type, RowType::SectionTotal | RowType::EntityTotal))
            .filter_map(|r| r.value(col))
            .sum(),
    )
}
