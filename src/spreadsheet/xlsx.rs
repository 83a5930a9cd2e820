use crate::error::ResultMessage;
use crate::error::ScraperError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::record::{Column, ComponentRecord, HEADER_ROWS};
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::load_workbook;
use crate::spreadsheet::reference::expand_dimension;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::TableStore;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use zip::ZipArchive;

// XML tag names used by the worksheet reader and patcher
const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");     // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                // Text content within strings
const TAG_DIMENSION: QName = QName(b"dimension");   // Used range of the worksheet
const TAG_SHEET_DATA: QName = QName(b"sheetData");  // Container of all rows
const TAG_ROW: QName = QName(b"row");               // Row in worksheet
const TAG_CELL: QName = QName(b"c");                // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");      // Inline string value
const TAG_VALUE: QName = QName(b"v");               // Cell value content

/// Cell values staged for writing: sheet row -> sheet column -> text
type StagedCells = BTreeMap<usize, BTreeMap<usize, String>>;

/// A component table stored in the active worksheet of an `.xlsx` file.
///
/// The whole package is held in memory. Saving rewrites only the worksheet
/// part, and inside it only the cells whose value changed; every other part
/// is copied through as raw compressed bytes.
pub struct XlsxTable {
    path: PathBuf,
    file_name: String,
    zip: ZipArchive<Cursor<Vec<u8>>>,
    sheet_name: String,
    /// Entry name of the worksheet part, as stored in the package
    sheet_path: String,
    records: Vec<ComponentRecord>,
    staged: StagedCells,
}

impl XlsxTable {
    /// Opens an xlsx file and reads the component rows of its active sheet
    ///
    /// # Arguments
    /// * `path` - Path to the xlsx file
    ///
    /// # Returns
    /// The opened table, or an error if the file is not a readable xlsx
    /// package or its header row does not name the ten known columns
    pub fn open<P: AsRef<Path>>(path: P) -> Result<XlsxTable, ScraperError> {
        let path = path.as_ref().to_path_buf();
        let file_name = path.display().to_string();
        let bytes = fs::read(&path)
            .map_err(ScraperError::from)
            .with_prefix(&format!("Open '{file_name}' failed"))?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| SpreadsheetError::InvalidFileFormat(file_name.to_owned()))?;

        let layout = load_workbook(&mut zip)?;
        let (sheet_name, part) = layout
            .active_sheet()
            .cloned()
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?;
        let sheet_path = zip
            .file(&part)?
            .map(|file| file.name().to_owned())
            .ok_or_else(|| SpreadsheetError::FileError(part.to_owned()))?;

        let shared_strings = load_shared_strings(&mut zip)?;
        let sheet = read_sheet(&mut zip, &sheet_path, &file_name, &sheet_name)?;
        sheet.check_header(&shared_strings)?;
        let records = sheet.records(&shared_strings);
        tracing::debug!("Opened {} [{}] with {} component rows", file_name, sheet_name, records.len());

        Ok(XlsxTable {
            path,
            file_name,
            zip,
            sheet_name,
            sheet_path,
            records,
            staged: StagedCells::new(),
        })
    }

    /// Name of the worksheet the table lives in
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of cells whose value differs from the file
    pub fn pending_changes(&self) -> usize {
        self.staged.values().map(BTreeMap::len).sum()
    }

    /// Moves staged values into the in-memory records once they are on disk
    fn apply_staged(&mut self) {
        for (sheet_row, cells) in std::mem::take(&mut self.staged) {
            let Some(record) = self.records.get_mut(sheet_row - HEADER_ROWS) else {
                continue;
            };
            for (col, value) in cells {
                if let Some(column) = Column::from_index(col) {
                    record.set(column, value);
                }
            }
        }
    }
}

impl TableStore for XlsxTable {
    fn read_records(&mut self) -> Result<Vec<ComponentRecord>, ScraperError> {
        Ok(self.records.clone())
    }

    fn write_cell(&mut self, row: usize, column: Column, value: &str) -> Result<(), ScraperError> {
        let rows = self.records.len();
        let record = self.records
            .get(row)
            .ok_or(SpreadsheetError::RowOutOfRange { row, rows })?;
        let (sheet_row, sheet_col) = (row + HEADER_ROWS, column.index());
        if record.get(column) == value {
            // Writing back the stored value cancels an earlier change
            if let Some(cells) = self.staged.get_mut(&sheet_row) {
                cells.remove(&sheet_col);
                if cells.is_empty() {
                    self.staged.remove(&sheet_row);
                }
            }
        } else {
            self.staged
                .entry(sheet_row)
                .or_default()
                .insert(sheet_col, value.to_owned());
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), ScraperError> {
        if self.staged.is_empty() {
            tracing::debug!("No changes for {}, file left untouched", self.file_name);
            return Ok(());
        }

        let xml = self.zip
            .read_bytes(&self.sheet_path)?
            .ok_or_else(|| SpreadsheetError::FileError(self.sheet_path.to_owned()))?;
        let patched = patch_worksheet(&xml, &self.staged)?;
        let replacements = HashMap::from([(self.sheet_path.to_owned(), patched)]);
        let package = self.zip.repackage(&replacements)?;
        let saved = ZipArchive::new(Cursor::new(package.clone()))?;

        // Write next to the target and rename, so a failed write never
        // leaves a truncated workbook behind
        let name = self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temporary = self.path.with_file_name(format!(".{name}.partial"));
        if let Err(error) = fs::write(&temporary, &package).and_then(|_| fs::rename(&temporary, &self.path)) {
            let _ = fs::remove_file(&temporary);
            return Err(ScraperError::from(error)).with_prefix(&format!("Save '{}' failed", self.file_name));
        }
        tracing::debug!("Saved {} changed cells to {}", self.pending_changes(), self.file_name);

        self.zip = saved;
        self.apply_staged();
        Ok(())
    }

    fn location(&self) -> String {
        format!("{} [{}]", self.file_name, self.sheet_name)
    }
}

/// Loads the shared string table; a package without one has no shared strings
fn load_shared_strings(zip: &mut ZipArchive<Cursor<Vec<u8>>>) -> Result<Vec<String>, ScraperError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Streams a worksheet part into a [`Sheet`], keeping every cell with a value
fn read_sheet(
    zip: &mut ZipArchive<Cursor<Vec<u8>>>,
    sheet_path: &str,
    file_name: &str,
    sheet_name: &str,
) -> Result<Sheet, ScraperError> {
    let mut sheet = Sheet::new(file_name, sheet_name);
    let mut reader = zip.xml_reader(sheet_path)?
        .ok_or_else(|| SpreadsheetError::FileError(sheet_path.to_owned()))?;

    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellType::default();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            row = event.get_attribute_value("r")?
                .and_then(|number| row_to_index(&number))
                .unwrap_or(next_row);
            next_row = row + 1;
            next_col = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = event.get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row, next_col));
            next_col = col + 1;
            kind = CellType::from_attribute(event.get_attribute_value("t")?.as_deref());
            value.clear();
        }
        Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            if kind != CellType::Empty && !value.is_empty() {
                sheet.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                });
            }
            kind = CellType::Empty;
        }
    });
    Ok(sheet)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Phonetic annotations (`rPh`) are skipped.
///
/// # Arguments
/// * `reader` - XML reader positioned just after the opening tag
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether the element holds text directly rather than in `<t>` children
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, ScraperError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Piece of a buffered `<row>`: a whole cell, or anything between cells
enum RowPart {
    Cell { col: usize, events: Vec<Event<'static>> },
    Other(Event<'static>),
}

/// A row that receives new values, held until its end tag is seen
struct RowPatch {
    row: usize,
    start: BytesStart<'static>,
    parts: Vec<RowPart>,
    next_col: usize,
    in_cell: bool,
}

impl RowPatch {
    fn new(row: usize, start: BytesStart<'static>) -> Self {
        Self { row, start, parts: Vec::new(), next_col: 0, in_cell: false }
    }

    /// Buffers one event of the row body; returns `false` at the row end tag
    fn push(&mut self, event: Event<'static>) -> Result<bool, ScraperError> {
        match event {
            Event::End(end) if end.name() == TAG_ROW => return Ok(false),
            Event::Start(start) if !self.in_cell && start.name() == TAG_CELL => {
                let col = start.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .map(|(_, col)| col)
                    .unwrap_or(self.next_col);
                self.next_col = col + 1;
                self.in_cell = true;
                self.parts.push(RowPart::Cell { col, events: vec![Event::Start(start)] });
            }
            event => {
                let closes_cell = matches!(&event, Event::End(end) if end.name() == TAG_CELL);
                match self.parts.last_mut() {
                    Some(RowPart::Cell { events, .. }) if self.in_cell => events.push(event),
                    _ => self.parts.push(RowPart::Other(event)),
                }
                if closes_cell {
                    self.in_cell = false;
                }
            }
        }
        Ok(true)
    }

    /// Writes the row with `updates` merged in column order
    fn write<W: Write>(self, writer: &mut Writer<W>, updates: &BTreeMap<usize, String>) -> Result<(), ScraperError> {
        let number = (self.row + 1).to_string();
        let start = self.start.rewrite(&[("r", number.as_str())], &["spans"])?;
        writer.write_event(Event::Start(start))?;

        let mut pending = updates.iter().peekable();
        for part in self.parts {
            match part {
                RowPart::Cell { col, events } => {
                    while let Some((new_col, value)) = pending.next_if(|(new_col, _)| **new_col < col) {
                        write_new_cell(writer, self.row, *new_col, value)?;
                    }
                    let replaced = pending.next_if(|(new_col, _)| **new_col == col);
                    match (replaced, events.first()) {
                        (Some((_, value)), Some(Event::Start(original))) => {
                            write_replaced_cell(writer, self.row, col, original, value)?;
                        }
                        _ => {
                            for event in events {
                                writer.write_event(event)?;
                            }
                        }
                    }
                }
                RowPart::Other(event) => writer.write_event(event)?,
            }
        }
        for (new_col, value) in pending {
            write_new_cell(writer, self.row, *new_col, value)?;
        }

        writer.write_event(Event::End(BytesEnd::new("row")))?;
        Ok(())
    }
}

/// Applies staged cell values to a worksheet part.
///
/// Cells that receive a value keep their original attributes (style
/// included) and become inline strings; an empty value clears the cell.
/// Missing cells and rows are inserted in sheet order, and the `<dimension>`
/// grows to cover what was written. Everything else is copied as read.
///
/// # Arguments
/// * `xml` - Original worksheet XML
/// * `staged` - Values keyed by 0-based sheet row, then 0-based column
///
/// # Returns
/// The patched worksheet XML
pub(crate) fn patch_worksheet(xml: &[u8], staged: &StagedCells) -> Result<Vec<u8>, ScraperError> {
    let mut reader = XmlReader::new(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
    let bounds = written_bounds(staged);

    let mut pending = staged.iter().peekable();
    let mut patch: Option<RowPatch> = None;
    let mut in_sheet_data = false;
    let mut next_row = 0usize;
    while let Some(event) = reader.next_owned()? {
        if let Some(row) = patch.as_mut() {
            if !row.push(event)? {
                if let (Some(row), Some((_, updates))) = (patch.take(), pending.next()) {
                    row.write(&mut writer, updates)?;
                }
            }
            continue;
        }

        match event {
            Event::Start(start) if !in_sheet_data && start.name() == TAG_DIMENSION => {
                let expanded = match (start.get_attribute_value("ref")?, bounds) {
                    (Some(reference), Some((lower, upper))) => expand_dimension(&reference, lower, upper),
                    _ => None,
                };
                let start = match expanded {
                    Some(reference) => start.rewrite(&[("ref", reference.as_str())], &[])?,
                    None => start,
                };
                writer.write_event(Event::Start(start))?;
            }
            Event::Start(start) if start.name() == TAG_SHEET_DATA => {
                in_sheet_data = true;
                writer.write_event(Event::Start(start))?;
            }
            Event::End(end) if in_sheet_data && end.name() == TAG_SHEET_DATA => {
                for (row, updates) in pending.by_ref() {
                    write_new_row(&mut writer, *row, updates)?;
                }
                in_sheet_data = false;
                writer.write_event(Event::End(end))?;
            }
            Event::Start(start) if in_sheet_data && start.name() == TAG_ROW => {
                let row = start.get_attribute_value("r")?
                    .and_then(|number| row_to_index(&number))
                    .unwrap_or(next_row);
                next_row = row + 1;
                while let Some((new_row, updates)) = pending.next_if(|(new_row, _)| **new_row < row) {
                    write_new_row(&mut writer, *new_row, updates)?;
                }
                if pending.peek().map(|(new_row, _)| **new_row == row).unwrap_or(false) {
                    patch = Some(RowPatch::new(row, start));
                } else {
                    writer.write_event(Event::Start(start))?;
                }
            }
            event => writer.write_event(event)?,
        }
    }

    Ok(writer.into_inner())
}

/// Smallest (row, col) and largest (row, col) receiving a non-empty value
fn written_bounds(staged: &StagedCells) -> Option<((usize, usize), (usize, usize))> {
    staged
        .iter()
        .flat_map(|(row, cells)| {
            cells
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(move |(col, _)| (*row, *col))
        })
        .fold(None, |bounds, (row, col)| match bounds {
            None => Some(((row, col), (row, col))),
            Some((lower, upper)) => Some((
                (row.min(lower.0), col.min(lower.1)),
                (row.max(upper.0), col.max(upper.1)),
            )),
        })
}

fn write_new_row<W: Write>(writer: &mut Writer<W>, row: usize, updates: &BTreeMap<usize, String>) -> Result<(), ScraperError> {
    if updates.values().all(String::is_empty) {
        return Ok(());
    }
    let number = (row + 1).to_string();
    let start = BytesStart::new("row").with_attributes([("r", number.as_str())]);
    writer.write_event(Event::Start(start))?;
    for (col, value) in updates {
        write_new_cell(writer, row, *col, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_new_cell<W: Write>(writer: &mut Writer<W>, row: usize, col: usize, value: &str) -> Result<(), ScraperError> {
    if value.is_empty() {
        return Ok(());
    }
    let reference = index_to_reference(row, col);
    let start = BytesStart::new("c").with_attributes([("r", reference.as_str()), ("t", "inlineStr")]);
    write_cell_content(writer, start, value)
}

fn write_replaced_cell<W: Write>(
    writer: &mut Writer<W>,
    row: usize,
    col: usize,
    original: &BytesStart<'_>,
    value: &str,
) -> Result<(), ScraperError> {
    let reference = index_to_reference(row, col);
    let start = if value.is_empty() {
        original.rewrite(&[("r", reference.as_str())], &["t", "cm", "vm"])?
    } else {
        original.rewrite(&[("r", reference.as_str()), ("t", "inlineStr")], &["cm", "vm"])?
    };
    write_cell_content(writer, start, value)
}

/// Writes `<c ...><is><t>value</t></is></c>`, or an empty cell for ""
fn write_cell_content<W: Write>(writer: &mut Writer<W>, start: BytesStart<'_>, value: &str) -> Result<(), ScraperError> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    if !value.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("is")))?;
        writer.write_event(Event::Start(BytesStart::new("t").with_attributes([("xml:space", "preserve")])))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new("t")))?;
        writer.write_event(Event::End(BytesEnd::new("is")))?;
    }
    writer.write_event(Event::End(end))?;
    Ok(())
}
