// src/docx/reader.rs
use crate::docx::{BodyElement, Paragraph, RawGrid};
use crate::utils::error::DocxError;
use roxmltree::Node;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

// --- Constants ---
/// WordprocessingML main namespace.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const FALLBACK_STYLE: &str = "Normal";

/// The parts of a DOCX body this pipeline consumes: top-level paragraphs
/// (with style names) and top-level tables, in document order.
#[derive(Debug, Clone, Default)]
pub struct DocxDocument {
    body: Vec<BodyElement>,
    tables: Vec<RawGrid>,
}

impl DocxDocument {
    /// Reads and parses a DOCX file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DocxError> {
        let path = path.as_ref();
        tracing::info!("Reading document: {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses an in-memory DOCX container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let document_xml = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT_PART.to_string()))?;

        // styles.xml is optional; without it every paragraph resolves to the fallback style
        let styles = match read_part(&mut archive, STYLES_PART)? {
            Some(xml) => StyleMap::parse(&xml)?,
            None => {
                tracing::debug!("No {} in container, using fallback style names", STYLES_PART);
                StyleMap::default()
            }
        };

        let document = parse_body(&document_xml, &styles)?;
        tracing::info!(
            "Parsed document body: {} elements, {} tables",
            document.body.len(),
            document.tables.len()
        );
        Ok(document)
    }

    pub fn body(&self) -> &[BodyElement] {
        &self.body
    }

    pub fn tables(&self) -> &[RawGrid] {
        &self.tables
    }

    /// Raw Table Extractor: the grid of the table at a zero-based index.
    pub fn table(&self, index: usize) -> Result<&RawGrid, DocxError> {
        self.tables.get(index).ok_or(DocxError::TableNotFound {
            index,
            count: self.tables.len(),
        })
    }
}

/// Reads a named part from the container, `None` if it is absent.
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, DocxError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn xml_error(part: &str, err: roxmltree::Error) -> DocxError {
    DocxError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

// --- Node helpers ---
fn is_w(node: &Node, name: &str) -> bool {
    node.is_element() && node.has_tag_name((W_NS, name))
}

fn w_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_w(n, name))
}

fn w_val<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((W_NS, "val"))
}

/// styleId -> display name, plus the document's default paragraph style.
#[derive(Debug, Default)]
struct StyleMap {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleMap {
    fn parse(xml: &str) -> Result<Self, DocxError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| xml_error(STYLES_PART, e))?;
        let mut map = StyleMap::default();

        for style in doc.descendants().filter(|n| is_w(n, "style")) {
            let Some(id) = style.attribute((W_NS, "styleId")) else {
                continue;
            };
            let name = w_child(style, "name").and_then(w_val).unwrap_or(id);

            let is_paragraph = style.attribute((W_NS, "type")) == Some("paragraph");
            let is_default = matches!(style.attribute((W_NS, "default")), Some("1") | Some("true"));
            if is_paragraph && is_default {
                map.default_paragraph = Some(name.to_string());
            }
            map.names.insert(id.to_string(), name.to_string());
        }

        tracing::debug!("Loaded {} style definitions", map.names.len());
        Ok(map)
    }

    fn resolve(&self, style_id: Option<&str>) -> String {
        match style_id {
            Some(id) => self.names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            None => self
                .default_paragraph
                .clone()
                .unwrap_or_else(|| FALLBACK_STYLE.to_string()),
        }
    }
}

fn parse_body(xml: &str, styles: &StyleMap) -> Result<DocxDocument, DocxError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| xml_error(DOCUMENT_PART, e))?;
    let body = doc
        .descendants()
        .find(|n| is_w(n, "body"))
        .ok_or_else(|| DocxError::MissingPart(format!("{} (w:body)", DOCUMENT_PART)))?;

    let mut document = DocxDocument::default();
    for child in body.children() {
        if is_w(&child, "p") {
            let style_id = w_child(child, "pPr")
                .and_then(|p| w_child(p, "pStyle"))
                .and_then(w_val);
            document.body.push(BodyElement::Paragraph(Paragraph {
                text: paragraph_text(child).trim().to_string(),
                style: styles.resolve(style_id),
            }));
        } else if is_w(&child, "tbl") {
            document.body.push(BodyElement::Table(document.tables.len()));
            document.tables.push(read_table(child));
        }
    }
    Ok(document)
}

/// Builds the grid for one `w:tbl`. Horizontally merged cells (`gridSpan`)
/// repeat their text once per covered grid column; vertical merge
/// continuations take the text of the cell above. Rows are padded with empty
/// cells to the declared `w:tblGrid` width or the widest row.
fn read_table(tbl: Node) -> RawGrid {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let grid_cols = w_child(tbl, "tblGrid")
        .map(|g| g.children().filter(|n| is_w(n, "gridCol")).count())
        .unwrap_or(0);

    for tr in tbl.children().filter(|n| is_w(n, "tr")) {
        let mut cells: Vec<String> = Vec::new();

        let grid_before = w_child(tr, "trPr")
            .and_then(|p| w_child(p, "gridBefore"))
            .and_then(w_val)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        cells.extend(std::iter::repeat(String::new()).take(grid_before));

        for tc in tr.children().filter(|n| is_w(n, "tc")) {
            let props = w_child(tc, "tcPr");
            let span = props
                .and_then(|p| w_child(p, "gridSpan"))
                .and_then(w_val)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let continues_merge = props
                .and_then(|p| w_child(p, "vMerge"))
                .map(|m| w_val(m) != Some("restart"))
                .unwrap_or(false);

            let text = if continues_merge {
                let col = cells.len();
                rows.last()
                    .and_then(|above| above.get(col))
                    .cloned()
                    .unwrap_or_default()
            } else {
                cell_text(tc)
            };

            for _ in 0..span {
                cells.push(text.clone());
            }
        }
        rows.push(cells);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(grid_cols);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    RawGrid::new(rows)
}

/// Cell text: its direct paragraphs joined by newlines, trimmed.
fn cell_text(tc: Node) -> String {
    tc.children()
        .filter(|n| is_w(n, "p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Paragraph text from the runs that belong to this paragraph (including runs
/// nested in hyperlinks or insertions), skipping deleted runs.
fn paragraph_text(p: Node) -> String {
    let mut text = String::new();

    for run in p.descendants().filter(|n| is_w(n, "r")) {
        let owner = run.ancestors().skip(1).find(|a| is_w(a, "p"));
        if owner != Some(p) || run.ancestors().any(|a| is_w(&a, "del")) {
            continue;
        }
        for piece in run.children().filter(Node::is_element) {
            match piece.tag_name().name() {
                "t" => text.push_str(piece.text().unwrap_or("")),
                "tab" => text.push('\t'),
                "br" | "cr" => text.push('\n'),
                "noBreakHyphen" => text.push('-'),
                _ => {}
            }
        }
    }
    text
}
