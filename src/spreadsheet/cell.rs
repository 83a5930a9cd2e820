/// Types of cell data in a worksheet, from the `t` attribute of `<c>`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as 0/1
    Boolean,
    /// Numeric values (also dates, which stay in their serial form)
    Number,
    /// Inline string values
    InlineString,
    /// Cached string result of a formula
    FormulaString,
    /// Shared string table references
    SharedString,
    /// Error values such as #N/A
    Error,
}

impl CellType {
    /// Maps the `t` attribute of a cell; a missing attribute means number
    pub(crate) fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("inlineStr") => Self::InlineString,
            Some("str") => Self::FormulaString,
            Some("s") => Self::SharedString,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// Represents a single cell read from a worksheet.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Raw cell value: the shared string index for shared strings, the text
    /// itself otherwise
    pub(crate) value: String,
}

impl Cell {
    /// Cell content as text, the way a string-typed table reader sees it.
    /// Unknown shared string indexes read as empty.
    pub(crate) fn text(&self, shared_strings: &[String]) -> String {
        match self.kind {
            CellType::Empty => String::new(),
            CellType::SharedString => self.value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .cloned()
                .unwrap_or_default(),
            CellType::Boolean => match self.value.trim() {
                "1" => "TRUE".to_owned(),
                "0" => "FALSE".to_owned(),
                other => other.to_owned(),
            },
            CellType::Number | CellType::InlineString | CellType::FormulaString | CellType::Error => self.value.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 1, col: 2, kind, value: value.to_owned() }
    }

    #[test]
    fn cell_type_from_attribute() {
        assert_eq!(CellType::from_attribute(None), CellType::Number);
        assert_eq!(CellType::from_attribute(Some("n")), CellType::Number);
        assert_eq!(CellType::from_attribute(Some("s")), CellType::SharedString);
        assert_eq!(CellType::from_attribute(Some("inlineStr")), CellType::InlineString);
        assert_eq!(CellType::from_attribute(Some("str")), CellType::FormulaString);
        assert_eq!(CellType::from_attribute(Some("b")), CellType::Boolean);
        assert_eq!(CellType::from_attribute(Some("e")), CellType::Error);
    }

    #[test]
    fn cell_text() {
        let shared = vec!["C1234".to_owned(), "LCSC".to_owned()];
        assert_eq!(cell(CellType::SharedString, "1").text(&shared), "LCSC");
        assert_eq!(cell(CellType::SharedString, "7").text(&shared), "");
        assert_eq!(cell(CellType::Number, "42").text(&shared), "42");
        assert_eq!(cell(CellType::Boolean, "1").text(&shared), "TRUE");
        assert_eq!(cell(CellType::InlineString, " padded ").text(&shared), " padded ");
        assert_eq!(cell(CellType::Empty, "ignored").text(&shared), "");
    }
}
