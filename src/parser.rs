use crate::error::{BsaError, BsaResult};
use crate::types::{CellAnchor, Layout, MAX_COL, MAX_ROW};
use std::path::Path;

/// Load a layout file, falling back to the built-in value for every missing key
pub fn parse_layout(path: &Path) -> BsaResult<Layout> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BsaError::Configuration(format!(
            "Failed to read layout file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_layout_str(&content)
}

/// Parse layout YAML from a string
pub fn parse_layout_str(content: &str) -> BsaResult<Layout> {
    // An empty document means "all defaults"
    if content.trim().is_empty() {
        return Ok(Layout::default());
    }
    let layout: Layout = serde_yaml::from_str(content)?;
    layout.validate()?;
    Ok(layout)
}

/// Parse an A1 reference (`C35`, `$AA$10`) into a zero-based anchor
pub fn parse_a1(reference: &str) -> BsaResult<CellAnchor> {
    let invalid = || BsaError::Configuration(format!("Invalid cell reference '{reference}'"));

    let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        let value = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        col = col
            .checked_mul(26)
            .and_then(|v| v.checked_add(value))
            .ok_or_else(invalid)?;
    }
    let col = col - 1;

    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 || row - 1 > MAX_ROW || col > u32::from(MAX_COL) {
        return Err(invalid());
    }

    Ok(CellAnchor::new(row - 1, col as u16))
}

/// Convert a zero-based column index to Excel letters (0 -> A, 26 -> AA)
pub fn column_index_to_letter(index: u16) -> String {
    let mut result = String::new();
    let mut idx = usize::from(index);

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}
