// src/extractors/mod.rs
pub mod narrative;
pub mod table;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use narrative::{extract_entity_details, EntityDetails, NarrativeParagraph, ResourceTable};
#[allow(unused_imports)]
pub use table::{ClassifiedTable, ExclusionRule, TableClassifier, TableConfig};
