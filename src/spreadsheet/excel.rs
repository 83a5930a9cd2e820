//! Workbook-level helpers: relationships and worksheet discovery
use crate::error::ScraperError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_SHEET: QName = QName(b"sheet");
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView");

/// Worksheets of a workbook in tab order, with the active tab if declared
pub(crate) struct WorkbookLayout {
    /// (sheet name, zip path) pairs
    pub(crate) sheets: Vec<(String, String)>,
    pub(crate) active_tab: Option<usize>,
}

impl WorkbookLayout {
    /// The sheet a user sees on opening the file: the active tab, or the
    /// first sheet when the workbook does not say
    pub(crate) fn active_sheet(&self) -> Option<&(String, String)> {
        self.active_tab
            .and_then(|tab| self.sheets.get(tab))
            .or_else(|| self.sheets.first())
    }
}

/// Loads worksheet relationships from a relationships part
///
/// # Arguments
/// * `zip` - Zip archive handle
/// * `path` - Path to the relationships XML file within the archive
///
/// # Returns
/// Mapping of relationship IDs to worksheet paths
pub(crate) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, ScraperError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships matter here
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Reads `xl/workbook.xml` for the sheet list and the active tab
pub(crate) fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<WorkbookLayout, ScraperError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut active_tab = None;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<String>;
            let mut id = None::<String>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?.into_owned());
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?.into_owned());
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id) {
                    sheets.push((name, path.to_owned()));
                }
            }
        }
        Event::Start(event) if active_tab.is_none() && event.name() == TAG_WORKBOOK_VIEW => {
            active_tab = event.get_attribute_value("activeTab")?
                .and_then(|tab| tab.parse::<usize>().ok());
        }
    });
    Ok(WorkbookLayout { sheets, active_tab })
}

/// Normalizes a relationship target to a path inside the package
///
/// # Arguments
/// * `path` - Target as written in the relationships part
///
/// # Returns
/// Normalized path suitable for accessing files within the zip archive
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip::write_package;
    use std::io::Cursor;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    fn workbook(views: &str) -> String {
        format!(
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{views}<sheets><sheet name="Notes" sheetId="1" r:id="rId1"/><sheet name="Parts" sheetId="2" r:id="rId2"/></sheets></workbook>"#
        )
    }

    fn open(workbook: &str) -> ZipArchive<Cursor<Vec<u8>>> {
        let bytes = write_package(&[
            ("xl/workbook.xml", workbook.as_bytes()),
            ("xl/_rels/workbook.xml.rels", RELS.as_bytes()),
        ]).unwrap();
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn to_zip_path_variants() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn relationships_skip_non_worksheets() {
        let mut zip = open(&workbook(""));
        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels").unwrap();
        assert_eq!(relationships.len(), 2);
        assert_eq!(relationships["rId2"], "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn first_sheet_without_active_tab() {
        let mut zip = open(&workbook(""));
        let layout = load_workbook(&mut zip).unwrap();
        assert_eq!(layout.sheets.len(), 2);
        assert_eq!(layout.active_sheet().unwrap().0, "Notes");
    }

    #[test]
    fn active_tab_wins() {
        let mut zip = open(&workbook(r#"<bookViews><workbookView activeTab="1"/></bookViews>"#));
        let layout = load_workbook(&mut zip).unwrap();
        assert_eq!(layout.active_sheet().unwrap(), &("Parts".to_owned(), "xl/worksheets/sheet2.xml".to_owned()));
    }
}
