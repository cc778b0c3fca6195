// src/docx/mod.rs
pub mod models;
pub mod reader;

pub use models::{BodyElement, Paragraph, RawGrid};
pub use reader::DocxDocument;
