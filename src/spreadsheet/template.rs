//! Blank component workbooks.
//!
//! A template holds one worksheet whose first row carries the ten column
//! headers in bold, centered, 12pt text, with every column 20 characters wide.
//! Optional seed rows are written below the header as inline strings.

use crate::error::ScraperError;
use crate::helpers::zip::write_package;
use crate::record::{Column, ComponentRecord, HEADER_ROWS};
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::escape::escape;
use std::fs;
use std::path::Path;

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<bookViews><workbookView activeTab="0"/></bookViews>"#,
    r#"<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>"#,
    r#"</workbook>"#,
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#,
);

// cellXfs index 1 is the header style: font 1 (bold, 12pt), centered both ways
const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="2">"#,
    r#"<font><sz val="11"/><name val="Calibri"/><family val="2"/></font>"#,
    r#"<font><b/><sz val="12"/><name val="Calibri"/><family val="2"/></font>"#,
    r#"</fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>"#,
    r#"</cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

/// Header cell style index in `cellXfs`
const HEADER_STYLE: usize = 1;

/// Column width applied to the ten known columns
const COLUMN_WIDTH: u32 = 20;

/// Creates an empty component workbook at `path`
///
/// # Arguments
/// * `path` - Target file
/// * `force` - Replace an existing file instead of failing
pub fn create<P: AsRef<Path>>(path: P, force: bool) -> Result<(), ScraperError> {
    write(path, &[], force)
}

/// Creates a component workbook at `path` with `records` below the header
///
/// # Arguments
/// * `path` - Target file
/// * `records` - Rows to seed the table with; empty values leave cells out
/// * `force` - Replace an existing file instead of failing
pub fn write<P: AsRef<Path>>(path: P, records: &[ComponentRecord], force: bool) -> Result<(), ScraperError> {
    let path = path.as_ref();
    if !force && path.exists() {
        Err(SpreadsheetError::FileExists(path.display().to_string()))?
    }

    let sheet = worksheet(records);
    let package = write_package(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/styles.xml", STYLES.as_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
    ])?;
    fs::write(path, package)?;
    tracing::info!("Template created: {}", path.display());
    Ok(())
}

fn worksheet(records: &[ComponentRecord]) -> String {
    let last = index_to_reference(records.len() + HEADER_ROWS - 1, Column::ALL.len() - 1);
    let mut xml = String::with_capacity(1024 + records.len() * 512);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    xml.push_str(&format!(r#"<dimension ref="A1:{last}"/>"#));
    xml.push_str(&format!(
        r#"<cols><col min="1" max="{}" width="{COLUMN_WIDTH}" customWidth="1"/></cols>"#,
        Column::ALL.len()
    ));
    xml.push_str("<sheetData>");

    xml.push_str(r#"<row r="1">"#);
    for column in Column::ALL {
        xml.push_str(&inline_cell(0, column.index(), column.header(), Some(HEADER_STYLE)));
    }
    xml.push_str("</row>");

    for (index, record) in records.iter().enumerate() {
        let row = index + HEADER_ROWS;
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (column, value) in record.cells().filter(|(_, value)| !value.is_empty()) {
            xml.push_str(&inline_cell(row, column.index(), value, None));
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn inline_cell(row: usize, col: usize, value: &str, style: Option<usize>) -> String {
    let style = style.map(|style| format!(r#" s="{style}""#)).unwrap_or_default();
    format!(
        r#"<c r="{}"{style} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        index_to_reference(row, col),
        escape(value)
    )
}
