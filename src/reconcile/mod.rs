// src/reconcile/mod.rs
pub mod corrector;
pub mod integrity;
pub mod verifier;

pub use corrector::{KnownDefectCorrector, EXPECTED_KNOWN_DEFECTS};
pub use verifier::{verify_hierarchy, Discrepancy};
