// src/budget/fixtures.rs
//! A small two-part budget table in the source layout, shared by the
//! classifier, reconciliation and pipeline tests.
//!
//! It carries the same known defect as the real document: Part I's
//! transitional capacities are recorded on the part total but not on
//! section 1, whose entities do carry them.

use crate::docx::RawGrid;

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub fn header_rows() -> Vec<Vec<String>> {
    let un80 = "UN80 changes (excluding transitional capacities)";
    let variance = "Variance (excluding resources redeployed for consolidation)";
    vec![
        row(&[
            "Budget part/section/entity",
            "2025 approved",
            "2026 proposed programme budget",
            un80,
            un80,
            un80,
            un80,
            "2026 revised estimate",
            "Transitional capacities",
            variance,
            variance,
        ]),
        row(&[
            "Budget part/section/entity",
            "2025 approved",
            "2026 proposed programme budget",
            "Relocation",
            "Consolidation",
            "Other",
            "Total",
            "2026 revised estimate",
            "Transitional capacities",
            "Compared with 2025 approved (percentage)",
            "Compared with 2026 proposed programme budget (percentage)",
        ]),
        row(&[
            "", "(1)", "(2)", "(3)", "(4)", "(5)", "(6)=(3)+(4)+(5)", "(7)=(2)+(6)", "(8)", "", "",
        ]),
    ]
}

pub fn sample_grid() -> RawGrid {
    let mut rows = header_rows();
    rows.extend(vec![
        row(&["Part I", "", "", "", "", "", "", "", "", "", ""]),
        row(&[
            "Overall policymaking, direction and coordination",
            "1,300.0", "1,310.0", "–", "–", "(10.0)", "(10.0)", "1,300.0", "5.0", "", "",
        ]),
        row(&[
            "1.\tOverall policymaking, direction and coordination",
            "100.0", "110.0", "–", "–", "(10.0)", "(10.0)", "100.0", "–", "", "",
        ]),
        row(&[
            "–\tGeneral Assembly",
            "60.0", "65.0", "–", "–", "(6.0)", "(6.0)", "59.0", "3.0", "(1.7)", "(9.2)",
        ]),
        row(&[
            "–\tResident coordinator systema",
            "40.0", "45.0", "–", "–", "(4.0)", "(4.0)", "41.0", "2.0", "2.5", "(8.9)",
        ]),
        row(&[
            "2.\tGeneral Assembly and Economic and Social Council affairs",
            "1 200.0", "1 200.0", "–", "–", "–", "–", "1 200.0", "–", "", "",
        ]),
        row(&["", "", "", "", "", "", "", "", "", "", ""]),
        row(&["Part II", "", "", "", "", "", "", "", "", "", ""]),
        row(&[
            "Political affairs",
            "80.0", "90.0", "–", "–", "(14.0)", "(14.0)", "76.0", "–", "", "",
        ]),
        row(&[
            "3.\tPolitical affairs",
            "80.0", "90.0", "–", "–", "(14.0)", "(14.0)", "76.0", "–", "", "",
        ]),
        row(&[
            "–\tDepartment of Political and Peacebuilding Affairs",
            "50.0", "55.0", "–", "(5.0)", "(10.0)", "(15.0)", "40.0", "–", "(10.0)b", "(18.2)",
        ]),
        row(&[
            "–\tOther",
            "30.0", "35.0", "–", "5.0", "(4.0)", "1.0", "36.0", "–", "", "",
        ]),
        row(&[
            "–\tSpecial envoys",
            "20.0", "25.0", "–", "–", "(4.0)", "(4.0)", "21.0", "–", "5.0", "(16.0)",
        ]),
        row(&[
            "–\tUnited Nations Truce Supervision Organization",
            "10.0c", "10.0", "–", "5.0", "–", "5.0", "15.0", "–", "", "",
        ]),
        row(&[
            "Total",
            "1,380.0", "1,400.0", "–", "–", "(24.0)", "(24.0)", "1,376.0", "5.0", "", "",
        ]),
    ]);
    RawGrid::new(rows)
}
