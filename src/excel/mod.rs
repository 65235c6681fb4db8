//! Output workbook access
//!
//! The extractor only needs "set a number at (row, col)"; everything else
//! about the workbook (loading the template, picking a sheet, saving) lives
//! in [`TemplateWorkbook`]. Saving rewrites only the written cells of the
//! template package.

mod package;
mod template;

pub use template::{CellContent, TemplateSheet, TemplateWorkbook};

use std::collections::BTreeMap;

/// Destination for placed values, addressed zero-based
pub trait CellSink {
    /// Overwrite the cell with a number; no merge with prior content
    fn set_number(&mut self, row: u32, col: u16, value: f64);
}

impl CellSink for BTreeMap<(u32, u16), f64> {
    fn set_number(&mut self, row: u32, col: u16, value: f64) {
        self.insert((row, col), value);
    }
}
