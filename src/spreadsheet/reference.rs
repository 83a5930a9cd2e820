//! A1-style cell references.
//! Rows and columns are 0-based indexes everywhere in this crate; only the
//! reference strings written into the workbook are 1-based.

/// Converts a column name ("A", "J", "AA") to a 0-based index
pub(crate) fn col_to_index(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|byte| byte.is_ascii_alphabetic()) {
        return None;
    }
    name.bytes()
        .map(|byte| (byte.to_ascii_uppercase() - b'A') as usize + 1)
        .try_fold(0usize, |acc, digit| acc.checked_mul(26)?.checked_add(digit))
        .map(|number| number - 1)
}

/// Converts a 1-based row number string to a 0-based index
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number.parse::<usize>().ok().filter(|row| *row > 0).map(|row| row - 1)
}

/// Splits a reference like "B12" into 0-based (row, col)
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Converts a 0-based column index to its column name
pub(crate) fn index_to_col(col: usize) -> String {
    let mut column = col + 1;
    let mut name = String::new();
    while column > 0 {
        column -= 1;
        name.insert(0, (b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    name
}

/// Converts 0-based (row, col) to a reference like "B12"
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

/// Grows a dimension reference ("A1:J1", "A1") so that it also covers the
/// 0-based (row, col) rectangle `lower..=upper`; returns `None` if the
/// reference cannot be parsed
pub(crate) fn expand_dimension(reference: &str, lower: (usize, usize), upper: (usize, usize)) -> Option<String> {
    let (first, last) = match reference.split_once(':') {
        Some((first, last)) => (reference_to_index(first)?, reference_to_index(last)?),
        None => {
            let cell = reference_to_index(reference)?;
            (cell, cell)
        }
    };
    Some(format!(
        "{}:{}",
        index_to_reference(first.0.min(lower.0), first.1.min(lower.1)),
        index_to_reference(last.0.max(upper.0), last.1.max(upper.1))
    ))
}
