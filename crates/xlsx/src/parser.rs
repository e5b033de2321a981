//! XLSX file parser implementation.

use dash_core::{Error, FieldValue, RawRecord, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Zero-based index of the last worksheet column, `XFD`.
const MAX_COLUMN: usize = 16_383;

/// Header used for columns whose header cell is blank.
const EMPTY_HEADER: &str = "__EMPTY";

/// Parser for XLSX (Office Open XML) workbooks.
pub struct XlsxParser;

impl XlsxParser {
    /// Create a new XLSX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse the first worksheet of a workbook into rows.
    ///
    /// The first row supplies the field names. Blank rows are skipped and
    /// blank cells are left out of their row.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Vec<RawRecord>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let sheet_path = self.first_sheet_path(&mut archive)?;
        log::debug!("Reading worksheet {}", sheet_path);

        let shared_strings = if archive.by_name(SHARED_STRINGS_PATH).is_ok() {
            let content = self.read_file_from_archive(&mut archive, SHARED_STRINGS_PATH)?;
            parse_shared_strings(&content)?
        } else {
            Vec::new()
        };

        let content = self.read_file_from_archive(&mut archive, &sheet_path)?;
        let rows = parse_sheet_rows(&content, &shared_strings)?;
        let records = rows_to_records(rows);

        log::debug!("Read {} rows from {}", records.len(), sheet_path);
        Ok(records)
    }

    /// Resolve the archive path of the first sheet listed in the workbook.
    fn first_sheet_path<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let workbook = self
            .read_file_from_archive(archive, WORKBOOK_PATH)
            .map_err(|_| Error::XlsxParseError("Missing xl/workbook.xml; not a workbook".to_string()))?;

        let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
            log::debug!("Workbook lists no sheets, using {}", DEFAULT_SHEET_PATH);
            return Ok(DEFAULT_SHEET_PATH.to_string());
        };

        let rels = match self.read_file_from_archive(archive, WORKBOOK_RELS_PATH) {
            Ok(rels) => rels,
            Err(_) => return Ok(DEFAULT_SHEET_PATH.to_string()),
        };

        let target = relationship_target(&rels, &rel_id)?;
        Ok(match target {
            Some(target) if target.starts_with('/') => target[1..].to_string(),
            Some(target) => format!("xl/{}", target),
            None => DEFAULT_SHEET_PATH.to_string(),
        })
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for XlsxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A cell read from sheet XML, before header mapping.
#[derive(Debug, Default)]
struct CellInfo {
    column: usize,
    kind: String,
    text: String,
}

/// Find the relationship id of the first `<sheet>` in workbook.xml.
fn first_sheet_rel_id(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"sheet" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref().ends_with(b":id") || attr.key.as_ref() == b"id" {
                        return Ok(Some(String::from_utf8_lossy(&attr.value).to_string()));
                    }
                }
                return Ok(None);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing workbook: {}", e)));
            }
            _ => {}
        }
    }
}

/// Find the target of a relationship by id.
fn relationship_target(xml: &str, rel_id: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"Relationship" => {
                let mut id = String::new();
                let mut target = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                if id == rel_id {
                    return Ok(Some(target));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }
}

/// Parse sharedStrings.xml into its string table.
///
/// Rich text runs are concatenated; phonetic (`rPh`) runs are skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let (true, false, Some(s)) = (in_text, in_phonetic, current.as_mut()) {
                    s.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing shared strings: {}", e)));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Parse worksheet XML into rows of (column, value), in sheet order.
fn parse_sheet_rows(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<(usize, FieldValue)>>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut rows = Vec::new();
    let mut current_row: Option<Vec<(usize, FieldValue)>> = None;
    let mut current_cell: Option<CellInfo> = None;
    let mut next_column = 0;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"row" => {
                    current_row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => {
                    let cell = start_cell(e, next_column)?;
                    next_column = cell.column + 1;
                    current_cell = Some(cell);
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                // Styled but empty cell: only advances the column.
                b"c" => next_column = start_cell(e, next_column)?.column + 1,
                b"row" => rows.push(Vec::new()),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if let Some(cell) = current_cell.as_mut() {
                    if in_value || (in_inline_text && !in_phonetic) {
                        cell.text.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(cell) = current_cell.as_mut() {
                    if in_value || in_inline_text {
                        cell.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"c" => {
                    if let (Some(cell), Some(row)) = (current_cell.take(), current_row.as_mut()) {
                        if let Some(value) = cell_value(&cell, shared_strings) {
                            row.push((cell.column, value));
                        }
                    }
                }
                b"row" => {
                    if let Some(row) = current_row.take() {
                        rows.push(row);
                    }
                }
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing worksheet: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rows)
}

/// Read the reference and type attributes of a `<c>` element.
///
/// Columns past `XFD` are rejected.
fn start_cell(e: &BytesStart, fallback_column: usize) -> Result<CellInfo> {
    let mut cell = CellInfo {
        column: fallback_column,
        ..CellInfo::default()
    };

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                let reference = String::from_utf8_lossy(&attr.value);
                if let Some(column) = column_index(&reference) {
                    cell.column = column;
                }
                if cell.column > MAX_COLUMN {
                    return Err(Error::XlsxParseError(format!(
                        "Cell reference '{}' is beyond the last column",
                        reference
                    )));
                }
            }
            b"t" => cell.kind = String::from_utf8_lossy(&attr.value).to_string(),
            _ => {}
        }
    }

    if cell.column > MAX_COLUMN {
        return Err(Error::XlsxParseError(format!(
            "Row has more than {} columns",
            MAX_COLUMN + 1
        )));
    }

    Ok(cell)
}

/// Convert a cell's raw text according to its type.
fn cell_value(cell: &CellInfo, shared_strings: &[String]) -> Option<FieldValue> {
    match cell.kind.as_str() {
        "s" => {
            let index = cell.text.trim().parse::<usize>().ok()?;
            shared_strings.get(index).cloned().map(FieldValue::Text)
        }
        "str" | "inlineStr" => Some(FieldValue::Text(cell.text.clone())),
        "b" => Some(FieldValue::text(if cell.text.trim() == "1" { "true" } else { "false" })),
        "e" => Some(FieldValue::Text(cell.text.clone())),
        _ => {
            let text = cell.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(match text.parse::<f64>() {
                Ok(n) => FieldValue::Number(n),
                Err(_) => FieldValue::Text(text.to_string()),
            })
        }
    }
}

/// Map rows to records using the first row as field names.
///
/// Blank header cells become `__EMPTY`; repeated names get `_1`, `_2`, ...
fn rows_to_records(rows: Vec<Vec<(usize, FieldValue)>>) -> Vec<RawRecord> {
    let mut rows = rows.into_iter().filter(|row| !row.is_empty());

    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let data_rows: Vec<_> = rows.collect();

    let max_column = header_row
        .iter()
        .chain(data_rows.iter().flatten())
        .map(|(column, _)| *column)
        .max()
        .unwrap_or(0);

    let mut seen: HashMap<String, usize> = HashMap::new();
    let headers: Vec<String> = (0..=max_column)
        .map(|column| {
            let name = header_row
                .iter()
                .find(|(c, _)| *c == column)
                .map(|(_, v)| v.to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| EMPTY_HEADER.to_string());
            unique_header(name, &mut seen)
        })
        .collect();

    data_rows
        .into_iter()
        .map(|row| {
            let mut record = RawRecord::new();
            for (column, value) in row {
                record.insert(headers[column].clone(), value);
            }
            record
        })
        .collect()
}

fn unique_header(name: String, seen: &mut HashMap<String, usize>) -> String {
    let Some(&count) = seen.get(&name) else {
        seen.insert(name.clone(), 1);
        return name;
    };

    let mut counter = count;
    let mut candidate = format!("{}_{}", name, counter);
    while seen.contains_key(&candidate) {
        counter += 1;
        candidate = format!("{}_{}", name, counter);
    }
    seen.insert(name, counter + 1);
    seen.insert(candidate.clone(), 1);
    candidate
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Zero-based column index from a cell reference like "AB12".
///
/// Saturates at `usize::MAX` for absurdly long letter runs.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }

    let number = letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
        })
        .unwrap_or(usize::MAX);
    Some(number - 1)
}
