//! Multi-format text normalization for uploaded documents.
//!
//! Uploads arrive as bytes plus a declared content type; this module turns
//! them into flat UTF-8 text. Structure (headings, styles) is not
//! preserved. Tables (xlsx, csv) keep their rows: the first row is the
//! column header and is dropped, every other row becomes its non-empty
//! cells joined with [`CELL_SEPARATOR`].

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::models::UploadedBlob;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XML: &str = "text/xml";
pub const MIME_XML_APP: &str = "application/xml";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_UNKNOWN: &str = "application/octet-stream";

/// Separator between the cells of one spreadsheet row.
pub const CELL_SEPARATOR: &str = " | ";

/// Maximum cells to read from a table (avoids unbounded memory).
const TABLE_MAX_CELLS: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("XML extraction failed: {0}")]
    Xml(String),
    #[error("CSV extraction failed: {0}")]
    Csv(String),
}

/// Flattens an upload to plain text, or returns an empty string.
///
/// Infallible wrapper over [`extract_text`]: unsupported or unreadable
/// input is logged at debug level and yields `""`. Callers that need to
/// say why an upload produced nothing (such as [`Session::upload`]) call
/// [`extract_text`] or [`table_rows`] directly.
///
/// [`Session::upload`]: crate::session::Session::upload
pub fn normalize(blob: &UploadedBlob) -> String {
    match extract_text(&blob.bytes, &blob.content_type) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(name = %blob.name, error = %e, "upload yielded no text");
            String::new()
        }
    }
}

/// Extracts plain text from `bytes` according to `content_type`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match base_mime(content_type) {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_XLSX | MIME_CSV => {
            let rows = table_rows(bytes, content_type)?;
            Ok(rows
                .iter()
                .map(|cells| cells.join(CELL_SEPARATOR))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        MIME_XML | MIME_XML_APP => extract_xml(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8_lossy(bytes).trim().to_string()),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

/// Declared content type for a file path, by extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "doc" => MIME_DOC,
        "xlsx" => MIME_XLSX,
        "xml" => MIME_XML,
        "csv" => MIME_CSV,
        "txt" => MIME_TEXT,
        "md" | "markdown" => MIME_MARKDOWN,
        _ => MIME_UNKNOWN,
    }
}

/// Whether `content_type` is a table whose rows can become separate entries.
pub fn is_tabular(content_type: &str) -> bool {
    matches!(base_mime(content_type), MIME_XLSX | MIME_CSV)
}

/// Data rows of a table upload, header excluded, one `Vec` per non-empty row.
pub fn table_rows(bytes: &[u8], content_type: &str) -> Result<Vec<Vec<String>>, ExtractError> {
    match base_mime(content_type) {
        MIME_XLSX => spreadsheet_rows(bytes),
        MIME_CSV => csv_rows(bytes),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

/// Strips parameters such as `; charset=utf-8`.
fn base_mime(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let text = pages
        .iter()
        .map(|page| page.trim())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(text.trim().to_string())
}

fn extract_xml(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut parts: Vec<String> = Vec::new();
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(te)) => {
                let text = te.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                if !text.trim().is_empty() {
                    parts.push(text.trim().to_string());
                }
            }
            Ok(Event::CData(cdata)) => {
                let text = String::from_utf8_lossy(&cdata).trim().to_string();
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(parts.join(" "))
}

type ZipCursor<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_zip(bytes: &[u8]) -> Result<ZipCursor<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut ZipCursor<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = docx_paragraphs(&doc_xml)?;
    Ok(paragraphs.join(" "))
}

/// Text of each `w:p`, runs concatenated, in document order.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

/// Cell values of the first worksheet, one `Vec` per non-empty data row.
///
/// The first non-empty row is the header and is not returned. Empty cells
/// are skipped, so a row's values are the non-null cells in column order.
pub fn spreadsheet_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet = first_worksheet_name(&mut archive)?;
    let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
    let mut rows = read_sheet_rows(&sheet_xml, &shared_strings)?;
    if !rows.is_empty() {
        rows.remove(0);
    }
    Ok(rows)
}

/// Data rows of a comma-separated file, one `Vec` per non-empty row.
///
/// The header row names the columns. Columns whose header is blank or
/// starts with `Unnamed` (index columns left by spreadsheet exports) are
/// dropped, as are empty cells.
pub fn csv_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let kept: Vec<usize> = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .enumerate()
        .filter(|(_, name)| is_named_column(name))
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    let mut cell_count = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let cells: Vec<String> = kept
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();
        if cells.is_empty() {
            continue;
        }
        cell_count += cells.len();
        rows.push(cells);
        if cell_count >= TABLE_MAX_CELLS {
            break;
        }
    }
    Ok(rows)
}

fn is_named_column(header: &str) -> bool {
    let header = header.trim();
    !header.is_empty() && !header.starts_with("Unnamed")
}

fn read_shared_strings(archive: &mut ZipCursor<'_>) -> Result<Vec<String>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_t = false;
    // Phonetic runs (`rPh`) repeat the text in another script; skip them.
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_t = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t && !in_phonetic => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Resolves the first `<sheet>` of `xl/workbook.xml` through the workbook
/// relationships, falling back to the lowest-numbered `sheetN.xml`.
fn first_worksheet_name(archive: &mut ZipCursor<'_>) -> Result<String, ExtractError> {
    if let Some(name) = first_sheet_from_workbook(archive) {
        if archive.file_names().any(|n| n == name) {
            return Ok(name);
        }
    }
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))
}

fn first_sheet_from_workbook(archive: &mut ZipCursor<'_>) -> Option<String> {
    let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES).ok()?;
    let rel_id = first_attr_of(&workbook, b"sheet", b"id")?;
    let rels = read_zip_entry_bounded(
        archive,
        "xl/_rels/workbook.xml.rels",
        MAX_XML_ENTRY_BYTES,
    )
    .ok()?;

    let mut reader = Reader::from_reader(rels.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rel_id.as_str()) {
                    let target = target?;
                    return Some(match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    });
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn first_attr_of(xml: &[u8], element: &[u8], attr_local: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == element => {
                return e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == attr_local)
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Number,
    Shared,
    Inline,
    Bool,
    Other,
}

fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_kind = CellKind::Number;
    let mut cell_value = String::new();
    let mut in_value = false;
    let mut cell_count = 0usize;

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        if cell_count >= TABLE_MAX_CELLS {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_value.clear();
                    cell_kind = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"t")
                        .map(|a| match a.value.as_ref() {
                            b"s" => CellKind::Shared,
                            b"inlineStr" => CellKind::Inline,
                            b"b" => CellKind::Bool,
                            b"n" => CellKind::Number,
                            _ => CellKind::Other,
                        })
                        .unwrap_or(CellKind::Number);
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                cell_value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(value) = resolve_cell(cell_kind, &cell_value, shared_strings) {
                        row.push(value);
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row);
    }
    Ok(rows)
}

fn resolve_cell(kind: CellKind, raw: &str, shared_strings: &[String]) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value = match kind {
        CellKind::Shared => shared_strings.get(raw.parse::<usize>().ok()?)?.trim().to_string(),
        CellKind::Bool => match raw {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        CellKind::Number | CellKind::Inline | CellKind::Other => raw.to_string(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in files {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn xlsx(sheet_rows: &str, shared: &[&str]) -> Vec<u8> {
        let si: String = shared
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", s))
            .collect();
        let shared_xml = format!(
            "<?xml version=\"1.0\"?><sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">{}</sst>",
            si
        );
        let sheet_xml = format!(
            "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
            sheet_rows
        );
        zip_with(&[
            ("xl/sharedStrings.xml", &shared_xml),
            ("xl/worksheets/sheet1.xml", &sheet_xml),
        ])
    }

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn unsupported_type_normalizes_to_empty() {
        let blob = UploadedBlob::new("legacy.doc", MIME_DOC, b"\xd0\xcf\x11\xe0".to_vec());
        assert_eq!(normalize(&blob), "");
    }

    #[test]
    fn invalid_pdf_normalizes_to_empty() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
        assert_eq!(normalize(&UploadedBlob::new("bad.pdf", MIME_PDF, b"not a pdf".to_vec())), "");
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn spreadsheet_row_joins_cells_with_pipes() {
        let bytes = xlsx(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c></row>"#,
            &["a", "b", "x", "y"],
        );
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "x | y");
        assert_eq!(spreadsheet_rows(&bytes).unwrap(), vec![vec!["x", "y"]]);
    }

    #[test]
    fn header_only_spreadsheet_has_no_rows() {
        let bytes = xlsx(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#,
            &["a", "b"],
        );
        assert!(spreadsheet_rows(&bytes).unwrap().is_empty());
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "");
    }

    #[test]
    fn spreadsheet_skips_empty_cells_and_keeps_numbers() {
        let bytes = xlsx(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Key</t></is></c><c r="C1" t="inlineStr"><is><t>Value</t></is></c></row>
               <row r="2"><c r="A2" t="s"><v>0</v></c><c r="B2"/><c r="C2"><v>42</v></c></row>
               <row r="3"><c r="A3" t="inlineStr"><is><t>inline</t></is></c><c r="B3" t="b"><v>1</v></c></row>"#,
            &["name"],
        );
        let rows = spreadsheet_rows(&bytes).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["name".to_string(), "42".to_string()],
                vec!["inline".to_string(), "TRUE".to_string()],
            ]
        );
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "name | 42\ninline | TRUE");
    }

    #[test]
    fn spreadsheet_reads_only_first_sheet() {
        let sheet = |v: &str| {
            format!(
                "<worksheet><sheetData><row><c t=\"inlineStr\"><is><t>Tab</t></is></c></row><row><c t=\"inlineStr\"><is><t>{}</t></is></c></row></sheetData></worksheet>",
                v
            )
        };
        let bytes = zip_with(&[
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Main" sheetId="1" r:id="rId2"/><sheet name="Other" sheetId="2" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Target="worksheets/sheet2.xml"/></Relationships>"#,
            ),
            ("xl/worksheets/sheet1.xml", &sheet("second tab")),
            ("xl/worksheets/sheet2.xml", &sheet("first tab")),
        ]);
        assert_eq!(extract_text(&bytes, MIME_XLSX).unwrap(), "first tab");
    }

    #[test]
    fn csv_rows_drop_header_and_unnamed_columns() {
        let csv = b"Unnamed: 0,Name,,City\n0,Ada,x,London\n1,,,\n2,Grace,,New York\n";
        let rows = csv_rows(csv).unwrap();
        assert_eq!(rows, vec![vec!["Ada", "London"], vec!["Grace", "New York"]]);
        assert_eq!(
            extract_text(csv, "text/csv; charset=utf-8").unwrap(),
            "Ada | London\nGrace | New York"
        );
    }

    #[test]
    fn csv_quoted_fields_keep_commas() {
        let csv = b"title,notes\n\"Report, Q3\",\"late, but done\"\n";
        assert_eq!(extract_text(csv, MIME_CSV).unwrap(), "Report, Q3 | late, but done");
    }

    #[test]
    fn csv_and_xlsx_are_tabular() {
        assert!(is_tabular(MIME_CSV));
        assert!(is_tabular(MIME_XLSX));
        assert!(!is_tabular(MIME_TEXT));
        assert!(matches!(
            table_rows(b"x", MIME_PDF),
            Err(ExtractError::UnsupportedContentType(_))
        ));
    }

    /// Hand-built PDF with one Helvetica text line per page; `None` pages
    /// have an empty content stream.
    fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
        let n = pages.len();
        // Objects: 1 catalog, 2 pages, 3 font, then (page, content) pairs.
        let page_id = |i: usize| 4 + 2 * i;
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();

        let mut objects: Vec<String> = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = match text {
                Some(t) => format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", t),
                None => String::new(),
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
                page_id(i) + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn pdf_pages_are_joined_in_order() {
        let bytes = pdf_with_pages(&[Some("alpha page"), Some("omega page")]);
        let text = extract_text(&bytes, MIME_PDF).unwrap();
        let alpha = text.find("alpha").unwrap();
        let omega = text.find("omega").unwrap();
        assert!(alpha < omega, "pages out of order: {:?}", text);
    }

    #[test]
    fn blank_pdf_page_does_not_fail_extraction() {
        let bytes = pdf_with_pages(&[Some("first"), None, Some("third")]);
        let text = extract_text(&bytes, MIME_PDF).unwrap();
        assert!(text.starts_with("first"), "got {:?}", text);
        assert!(text.ends_with("third"), "got {:?}", text);
        let blob = UploadedBlob::new("scan.pdf", MIME_PDF, bytes);
        assert_eq!(normalize(&blob), text);
    }

    #[test]
    fn docx_paragraphs_join_in_order() {
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>World</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = zip_with(&[("word/document.xml", xml)]);
        assert_eq!(extract_text(&bytes, MIME_DOCX).unwrap(), "Hello World Second");
    }

    #[test]
    fn xml_collects_text_nodes_in_order() {
        let xml = br#"<?xml version="1.0"?><root><a>first</a><b>second <c>third</c></b><![CDATA[fourth]]></root>"#;
        assert_eq!(
            extract_text(xml, "text/xml").unwrap(),
            "first second third fourth"
        );
        assert_eq!(
            extract_text(xml, "application/xml; charset=utf-8").unwrap(),
            "first second third fourth"
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = extract_text(b"<root><a></b></root>", MIME_XML).unwrap_err();
        assert!(matches!(err, ExtractError::Xml(_)));
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/Report.PDF")), MIME_PDF);
        assert_eq!(content_type_for_path(Path::new("sheet.xlsx")), MIME_XLSX);
        assert_eq!(content_type_for_path(Path::new("old.doc")), MIME_DOC);
        assert_eq!(content_type_for_path(Path::new("export.CSV")), MIME_CSV);
        assert_eq!(content_type_for_path(Path::new("noext")), MIME_UNKNOWN);
    }
}
