//! Projection of extracted case rows into Markdown and an in-memory xlsx
//! workbook.
//!
//! The workbook is a minimal single-worksheet package written straight through
//! the `zip` crate, with inline-string cells so no sharedStrings table is
//! needed. Cell placement reproduces the upstream writer exactly, including
//! the header off-by-one compensation that downstream spreadsheet consumers
//! depend on.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::{CaseError, Result};

/// Rows containing this marker are markdown separator rows and produce no
/// cells.
pub const SEPARATOR_MARKER: &str = "--------";

pub const MARKDOWN_MIME: &str = "text/markdown";
pub const WORKBOOK_MIME: &str = "application/vnd.ms-excel";

/// Both export artifacts for one generation request.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Rows joined with newline, unchanged.
    pub markdown: String,
    /// Single-worksheet xlsx package bytes.
    pub workbook: Vec<u8>,
}

/// Map ordered case rows into the two download artifacts.
pub fn project(rows: &[String]) -> Result<Projection> {
    Ok(Projection {
        markdown: rows.join("\n"),
        workbook: write_workbook(&cells(rows))?,
    })
}

/// Positional cell layout.
///
/// Per row (0-indexed): separator rows are skipped entirely; the segment
/// before the first bar is discarded; remaining segments land at column
/// `col - 1`, trimmed. Rows past index 1 are written one row higher to close
/// the gap a markdown `|---|---|` separator row leaves at index 1. Ragged
/// rows simply populate fewer or more cells.
fn cells(rows: &[String]) -> BTreeMap<(usize, usize), String> {
    let mut cells = BTreeMap::new();
    for (row, case) in rows.iter().enumerate() {
        if case.contains(SEPARATOR_MARKER) {
            continue;
        }
        for (col, segment) in case.split('|').enumerate() {
            if col == 0 {
                continue;
            }
            let target_row = if row > 1 { row - 1 } else { row };
            cells.insert((target_row, col - 1), segment.trim().to_owned());
        }
    }
    cells
}

fn write_workbook(cells: &BTreeMap<(usize, usize), String>) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_owned()),
        ("_rels/.rels", ROOT_RELS.to_owned()),
        ("xl/workbook.xml", WORKBOOK_XML.to_owned()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_owned()),
        ("xl/worksheets/sheet1.xml", sheet_xml(cells)),
    ];

    for (name, body) in parts {
        zip.start_file(name, options)
            .map_err(|e| CaseError::workbook(format!("failed to start {name}: {e}")))?;
        zip.write_all(body.as_bytes())?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| CaseError::workbook(format!("failed to finish package: {e}")))?;
    Ok(cursor.into_inner())
}

fn sheet_xml(cells: &BTreeMap<(usize, usize), String>) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );

    let mut current_row: Option<usize> = None;
    for (&(row, col), value) in cells {
        if current_row != Some(row) {
            if current_row.is_some() {
                xml.push_str("</row>");
            }
            xml.push_str(&format!("<row r=\"{}\">", row + 1));
            current_row = Some(row);
        }
        xml.push_str(&format!(
            "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            cell_ref(row, col),
            xml_escape(value),
        ));
    }
    if current_row.is_some() {
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// A1-style reference for a zero-based (row, col) pair.
fn cell_ref(row: usize, col: usize) -> String {
    let mut letters = String::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    format!("{}{}", letters, row + 1)
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
</Types>";

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
<sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets>\
</workbook>";

const WORKBOOK_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
</Relationships>";

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn rows(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    fn sheet_of(workbook: &[u8]) -> String {
        let mut archive = ZipArchive::new(Cursor::new(workbook.to_vec())).unwrap();
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        sheet
    }

    #[test]
    fn test_markdown_is_rows_joined_unchanged() {
        let projection = project(&rows(&["| a | b |", "| c | d |"])).unwrap();
        assert_eq!(projection.markdown, "| a | b |\n| c | d |");
    }

    #[test]
    fn test_header_alignment_round_trip() {
        let projection = project(&rows(&[
            "| Name | Priority |",
            "|---|---|",
            "| Login | High |",
        ]))
        .unwrap();
        let sheet = sheet_of(&projection.workbook);

        // Header at sheet row 1, data directly beneath: the separator row is
        // dropped and leaves no gap.
        assert!(sheet.contains("<c r=\"A1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Name</t></is></c>"));
        assert!(sheet.contains("<c r=\"B1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Priority</t></is></c>"));
        assert!(sheet.contains("<c r=\"A2\" t=\"inlineStr\"><is><t xml:space=\"preserve\">Login</t></is></c>"));
        assert!(sheet.contains("<c r=\"B2\" t=\"inlineStr\"><is><t xml:space=\"preserve\">High</t></is></c>"));
        assert!(!sheet.contains("---"));
    }

    #[test]
    fn test_ragged_rows_populate_what_they_have() {
        let projection = project(&rows(&["| a | b | c |", "|--------|", "| only |"])).unwrap();
        let sheet = sheet_of(&projection.workbook);

        assert!(sheet.contains("r=\"C1\""));
        // Separator row dropped; third row compensated upward to sheet row 2.
        assert!(sheet.contains("<c r=\"A2\" t=\"inlineStr\"><is><t xml:space=\"preserve\">only</t></is></c>"));
    }

    #[test]
    fn test_values_are_trimmed_and_escaped() {
        let projection = project(&rows(&["|  a & b  | <tag> |"])).unwrap();
        let sheet = sheet_of(&projection.workbook);

        assert!(sheet.contains(">a &amp; b</t>"));
        assert!(sheet.contains(">&lt;tag&gt;</t>"));
    }

    #[test]
    fn test_package_has_expected_parts() {
        let projection = project(&rows(&["| a |"])).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(projection.workbook)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_empty_rows_give_empty_sheet() {
        let projection = project(&[]).unwrap();
        assert!(projection.markdown.is_empty());
        let sheet = sheet_of(&projection.workbook);
        assert!(sheet.contains("<sheetData></sheetData>"));
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(2, 25), "Z3");
        assert_eq!(cell_ref(0, 26), "AA1");
    }
}
