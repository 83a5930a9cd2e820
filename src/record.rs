//! The component table's row model and its fixed column layout.

use std::fmt::Display;

/// Number of header rows above the first component row.
pub const HEADER_ROWS: usize = 1;

/// The ten known columns, in sheet order (A through J).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    PartNumber,
    Link,
    SiteTag,
    InStock,
    UnitPrice,
    BulkPrices,
    Manufacturer,
    Description,
    MinOrder,
    Datasheet,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::PartNumber,
        Column::Link,
        Column::SiteTag,
        Column::InStock,
        Column::UnitPrice,
        Column::BulkPrices,
        Column::Manufacturer,
        Column::Description,
        Column::MinOrder,
        Column::Datasheet,
    ];

    /// Header text as it appears in row 1
    pub const fn header(&self) -> &'static str {
        match self {
            Self::PartNumber => "Part Number",
            Self::Link => "Component Link",
            Self::SiteTag => "Site Tag",
            Self::InStock => "In Stock",
            Self::UnitPrice => "Unit Price",
            Self::BulkPrices => "Bulk Prices",
            Self::Manufacturer => "Manufacturer",
            Self::Description => "Description",
            Self::MinOrder => "Min Order",
            Self::Datasheet => "Datasheet",
        }
    }

    /// 0-based sheet column index
    pub const fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Column> {
        Self::ALL.get(index).copied()
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header())
    }
}

/// One row of the component table.
///
/// Values are kept as the cell text read from the sheet so that a row the
/// run does not touch is written back exactly as it was.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentRecord {
    pub part_number: String,
    pub link: String,
    pub site_tag: String,
    pub in_stock: String,
    pub unit_price: String,
    pub bulk_prices: String,
    pub manufacturer: String,
    pub description: String,
    pub min_order: String,
    pub datasheet: String,
}

impl ComponentRecord {
    /// Builds a record from cell values in column order; missing trailing
    /// values are empty
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut record = Self::default();
        for (column, value) in Column::ALL.iter().zip(cells) {
            record.set(*column, value.into());
        }
        record
    }

    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::PartNumber => &self.part_number,
            Column::Link => &self.link,
            Column::SiteTag => &self.site_tag,
            Column::InStock => &self.in_stock,
            Column::UnitPrice => &self.unit_price,
            Column::BulkPrices => &self.bulk_prices,
            Column::Manufacturer => &self.manufacturer,
            Column::Description => &self.description,
            Column::MinOrder => &self.min_order,
            Column::Datasheet => &self.datasheet,
        }
    }

    pub fn set(&mut self, column: Column, value: String) {
        let slot = match column {
            Column::PartNumber => &mut self.part_number,
            Column::Link => &mut self.link,
            Column::SiteTag => &mut self.site_tag,
            Column::InStock => &mut self.in_stock,
            Column::UnitPrice => &mut self.unit_price,
            Column::BulkPrices => &mut self.bulk_prices,
            Column::Manufacturer => &mut self.manufacturer,
            Column::Description => &mut self.description,
            Column::MinOrder => &mut self.min_order,
            Column::Datasheet => &mut self.datasheet,
        };
        *slot = value;
    }

    /// Values in column order
    pub fn cells(&self) -> impl Iterator<Item = (Column, &str)> + '_ {
        Column::ALL.iter().map(move |column| (*column, self.get(*column)))
    }

    /// True when the row carries neither a link nor a part number
    pub fn is_unidentified(&self) -> bool {
        self.link.trim().is_empty() && self.part_number.trim().is_empty()
    }
}
