// src/budget/mod.rs
pub mod models;

#[cfg(test)]
pub mod fixtures;

pub use models::{columns, fields, sum_column, BudgetRow, BudgetTable, MeasureColumn, RowType};
