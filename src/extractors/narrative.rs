// src/extractors/narrative.rs

// --- Imports ---
use crate::docx::{BodyElement, DocxDocument, RawGrid};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// --- Constants ---
const NARRATIVE_STYLE: &str = "__Single Txt";
/// Paragraphs this short are headings or captions, not narrative.
const MIN_NARRATIVE_CHARS: usize = 50;
const RESOURCE_TABLE_CAPTION: &str = "Regular budget: proposed resource changes by object of expenditure";
const RESOURCE_TABLE_FIRST_CELL: &str = "Object of expenditure";
/// How many body elements after the caption may hold the resource table.
const RESOURCE_TABLE_LOOKAHEAD: usize = 4;
const TRANSITIONAL_PREFIX: &str = "Transitional: ";

// --- Regex Patterns (Lazy Static) ---
static ENTITY_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.\s+Section\s+(\d+[A-Z]?),\s+(.+)$").expect("Failed to compile ENTITY_START_RE")
});

/// Numbering patterns with their nesting level. Roman numerals are tried
/// before letters so "(i)" is level 2.
static PARAGRAPH_PATTERNS: Lazy<Vec<(Regex, u8)>> = Lazy::new(|| {
    [
        (r"(?s)^(\d+)\.\t(.+)$", 0),
        (r"(?s)^\(([ivx]+)\)\t(.+)$", 2),
        (r"(?s)^\(([a-z])\)\t(.+)$", 1),
    ]
    .iter()
    .filter_map(|(pat, level)| Regex::new(pat).ok().map(|re| (re, *level)))
    .collect()
});

static PARENTHESES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.+)\)").expect("Failed to compile PARENTHESES_RE"));

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeParagraph {
    pub prefix: Option<String>,
    pub level: Option<u8>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Narrative and resource table of one entity chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDetails {
    pub num: u32,
    pub section: String,
    pub entity: String,
    pub narratives: Vec<NarrativeParagraph>,
    pub resource_table: Option<ResourceTable>,
}

/// Splits a paragraph's numbering prefix from its text.
pub fn parse_paragraph(text: &str) -> NarrativeParagraph {
    for (re, level) in PARAGRAPH_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            return NarrativeParagraph {
                prefix: Some(caps[1].to_string()),
                level: Some(*level),
                text: caps[2].to_string(),
            };
        }
    }
    NarrativeParagraph {
        prefix: None,
        level: None,
        text: text.to_string(),
    }
}

/// Reads a "proposed resource changes by object of expenditure" table.
/// Headers are on the second row; data starts on the fourth.
pub fn extract_resource_table(grid: &RawGrid) -> Option<ResourceTable> {
    if grid.len() < 4 {
        return None;
    }
    let headers = grid.rows[1].clone();
    let mut rows = Vec::new();
    let mut in_transitional = false;

    for cells in &grid.rows[3..] {
        let Some((first, values)) = cells.split_first() else {
            continue;
        };
        let label = first.to_lowercase();
        if first.is_empty() || label.contains("variance") || label.contains("subtotal") || label == "total" {
            continue;
        }
        // A transitional heading has no amounts of its own
        if label.contains("transitional") && values.iter().all(|c| matches!(c.as_str(), "" | "–" | "0")) {
            in_transitional = true;
            continue;
        }

        let mut clean = Vec::with_capacity(cells.len());
        clean.push(if in_transitional {
            format!("{}{}", TRANSITIONAL_PREFIX, first)
        } else {
            first.clone()
        });
        clean.extend(values.iter().map(|v| clean_amount(v)));
        rows.push(clean);
    }

    if rows.is_empty() {
        None
    } else {
        Some(ResourceTable { headers, rows })
    }
}

/// Amounts stay text: separators removed, "–" as zero, "(x)" as "-x".
fn clean_amount(raw: &str) -> String {
    let text = raw
        .replace('\u{a0}', "")
        .replace(' ', "")
        .replace(',', "")
        .replace('–', "0");
    PARENTHESES_RE.replace_all(&text, "-${1}").into_owned()
}

/// Walks the body for entity chapters ("12. Section 3, Political affairs")
/// and collects each chapter's narrative and resource table.
pub fn extract_entity_details(document: &DocxDocument) -> Vec<EntityDetails> {
    let elements = document.body();

    let starts: Vec<(usize, u32, String, String)> = elements
        .iter()
        .enumerate()
        .filter_map(|(i, element)| {
            let BodyElement::Paragraph(p) = element else {
                return None;
            };
            let caps = ENTITY_START_RE.captures(&p.text)?;
            let num = caps[1].parse::<u32>().ok()?;
            Some((i, num, caps[2].to_string(), caps[3].trim().to_string()))
        })
        .collect();
    tracing::info!("Found {} entity chapters", starts.len());

    let mut sections = Vec::with_capacity(starts.len());
    for (j, (start, num, section, entity)) in starts.iter().enumerate() {
        let end = starts.get(j + 1).map(|s| s.0).unwrap_or(elements.len());
        let mut details = EntityDetails {
            num: *num,
            section: section.clone(),
            entity: entity.clone(),
            narratives: Vec::new(),
            resource_table: None,
        };

        for i in *start..end {
            let BodyElement::Paragraph(p) = &elements[i] else {
                continue;
            };
            if p.style == NARRATIVE_STYLE && p.text.chars().count() > MIN_NARRATIVE_CHARS {
                details.narratives.push(parse_paragraph(&p.text));
            }
            if p.text.contains(RESOURCE_TABLE_CAPTION) {
                let window_end = (i + 1 + RESOURCE_TABLE_LOOKAHEAD).min(end);
                // Only the first table after the caption is considered
                let next_table = elements[i + 1..window_end.max(i + 1)].iter().find_map(|e| match e {
                    BodyElement::Table(idx) => Some(*idx),
                    _ => None,
                });
                if let Some(grid) = next_table.and_then(|idx| document.tables().get(idx)) {
                    let first_cell = grid.cell(0, 0);
                    if first_cell.contains(RESOURCE_TABLE_FIRST_CELL) || first_cell.is_empty() {
                        details.resource_table = extract_resource_table(grid);
                    }
                }
            }
        }

        tracing::debug!(
            "Section {} ({}): {} narrative paragraphs, resource table: {}",
            details.section,
            details.entity,
            details.narratives.len(),
            details.resource_table.is_some()
        );
        sections.push(details);
    }
    sections
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::reader::tests::{build_docx, para_xml, styled_para_xml, table_xml};

    const STYLES: &str = r#"<w:style w:type="paragraph" w:styleId="SingleTxt"><w:name w:val="__Single Txt"/></w:style>"#;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn resource_rows() -> Vec<Vec<String>> {
        vec![
            cells(&["Object of expenditure", "", ""]),
            cells(&["", "2025 approved", "Changes"]),
            cells(&["", "(1)", "(2)"]),
            cells(&["Posts", "1 234.5", "(12.0)"]),
            cells(&["Travel", "–", "3.0"]),
            cells(&["Subtotal", "1 234.5", "(9.0)"]),
            cells(&["Transitional capacities", "–", ""]),
            cells(&["Posts", "20.0", "20,000.0"]),
            cells(&["Variance (percentage)", "", "1.0"]),
            cells(&["Total", "1 254.5", "11.0"]),
        ]
    }

    #[test]
    fn test_parse_paragraph_levels() {
        let p = parse_paragraph("92.\tThe Department will continue");
        assert_eq!((p.prefix.as_deref(), p.level), (Some("92"), Some(0)));
        assert_eq!(p.text, "The Department will continue");

        let p = parse_paragraph("(iv)\tA roman item");
        assert_eq!((p.prefix.as_deref(), p.level), (Some("iv"), Some(2)));

        let p = parse_paragraph("(i)\tAmbiguous, treated as roman");
        assert_eq!(p.level, Some(2));

        let p = parse_paragraph("(b)\tA lettered item\nspanning lines");
        assert_eq!((p.prefix.as_deref(), p.level), (Some("b"), Some(1)));
        assert_eq!(p.text, "A lettered item\nspanning lines");

        let p = parse_paragraph("Plain text");
        assert_eq!(p, NarrativeParagraph { prefix: None, level: None, text: "Plain text".into() });
    }

    #[test]
    fn test_resource_table_rows() {
        let table = extract_resource_table(&RawGrid::new(resource_rows())).unwrap();
        assert_eq!(table.headers, cells(&["", "2025 approved", "Changes"]));
        assert_eq!(
            table.rows,
            vec![
                cells(&["Posts", "1234.5", "-12.0"]),
                cells(&["Travel", "0", "3.0"]),
                cells(&["Transitional: Posts", "20.0", "20000.0"]),
            ]
        );
    }

    #[test]
    fn test_short_resource_table_is_none() {
        assert_eq!(extract_resource_table(&RawGrid::new(resource_rows()[..3].to_vec())), None);
    }

    #[test]
    fn test_entity_details_from_document() {
        let long = "1.\tThe Office will strengthen coordination across the system and report on progress.";
        let body = [
            para_xml("Introduction"),
            para_xml("12. Section 3, Political affairs"),
            styled_para_xml(long, "SingleTxt"),
            styled_para_xml("Too short", "SingleTxt"),
            para_xml(RESOURCE_TABLE_CAPTION),
            para_xml("(Thousands of United States dollars)"),
            table_xml(&resource_rows()),
            para_xml("13. Section 29B, Department of Operational Support"),
            styled_para_xml(long, "Normal"),
        ]
        .concat();
        let doc = DocxDocument::from_bytes(&build_docx(&body, Some(STYLES))).unwrap();

        let details = extract_entity_details(&doc);
        assert_eq!(details.len(), 2);

        assert_eq!(details[0].num, 12);
        assert_eq!(details[0].section, "3");
        assert_eq!(details[0].entity, "Political affairs");
        assert_eq!(details[0].narratives.len(), 1);
        assert_eq!(details[0].narratives[0].prefix.as_deref(), Some("1"));
        assert_eq!(details[0].resource_table.as_ref().map(|t| t.rows.len()), Some(3));

        assert_eq!(details[1].section, "29B");
        assert!(details[1].narratives.is_empty());
        assert_eq!(details[1].resource_table, None);
    }
}
