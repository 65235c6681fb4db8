//! Template workbook: calamine reads the cells, saving patches the package

use crate::error::{BsaError, BsaResult};
use crate::excel::package::{patch_package, SheetEdits};
use crate::excel::CellSink;
use crate::types::SheetSelector;
use calamine::{Data, Range, Reader, Xlsx, XlsxError};
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Content of a single template cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Formula text without the leading `=`
    Formula(String),
}

/// One worksheet, stored sparsely by zero-based (row, col)
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSheet {
    name: String,
    cells: BTreeMap<(u32, u16), CellContent>,
    /// Numbers written since load, the only cells a save touches
    edits: SheetEdits,
}

impl TemplateSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            edits: SheetEdits::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, row: u32, col: u16) -> Option<&CellContent> {
        self.cells.get(&(row, col))
    }

    /// Numeric value at a cell, if it holds one
    pub fn number(&self, row: u32, col: u16) -> Option<f64> {
        match self.get(row, col) {
            Some(CellContent::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn set(&mut self, row: u32, col: u16, content: CellContent) {
        self.cells.insert((row, col), content);
    }

    /// Non-empty cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (&(u32, u16), &CellContent)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellSink for TemplateSheet {
    fn set_number(&mut self, row: u32, col: u16, value: f64) {
        self.set(row, col, CellContent::Number(value));
        self.edits.insert((row, col), value);
    }
}

/// A template workbook held in memory between load and save.
///
/// The package bytes are kept as loaded, so a save reproduces the template
/// exactly apart from the numbers written into it.
#[derive(Debug, Clone)]
pub struct TemplateWorkbook {
    path: PathBuf,
    package: Vec<u8>,
    sheets: Vec<TemplateSheet>,
}

impl TemplateWorkbook {
    /// Load every sheet of an .xlsx template.
    ///
    /// A missing or unreadable file is `TemplateNotFound`.
    pub fn load<P: AsRef<Path>>(path: P) -> BsaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let not_found = |reason: String| BsaError::TemplateNotFound {
            path: path.clone(),
            reason,
        };

        let package = fs::read(&path).map_err(|e| not_found(e.to_string()))?;
        let mut workbook = Xlsx::new(Cursor::new(package.as_slice()))
            .map_err(|e: XlsxError| not_found(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let values = workbook
                .worksheet_range(&name)
                .map_err(|e: XlsxError| not_found(format!("sheet '{name}': {e}")))?;
            // Formula lookup is best effort; values alone still make a usable template
            let formulas = workbook.worksheet_formula(&name).ok();

            let mut sheet = TemplateSheet::new(name);
            load_values(&mut sheet, &values);
            if let Some(formulas) = formulas {
                load_formulas(&mut sheet, &formulas);
            }
            debug!(sheet = sheet.name(), cells = sheet.len(), "loaded template sheet");
            sheets.push(sheet);
        }
        drop(workbook);

        Ok(Self {
            path,
            package,
            sheets,
        })
    }

    pub fn sheets(&self) -> &[TemplateSheet] {
        &self.sheets
    }

    pub fn sheet(&self, selector: &SheetSelector) -> BsaResult<&TemplateSheet> {
        let index = self.sheet_index(selector)?;
        Ok(&self.sheets[index])
    }

    pub fn sheet_mut(&mut self, selector: &SheetSelector) -> BsaResult<&mut TemplateSheet> {
        let index = self.sheet_index(selector)?;
        Ok(&mut self.sheets[index])
    }

    fn sheet_index(&self, selector: &SheetSelector) -> BsaResult<usize> {
        let found = match selector {
            SheetSelector::Index(i) => (*i < self.sheets.len()).then_some(*i),
            SheetSelector::Name(name) => self.sheets.iter().position(|s| s.name == *name),
        };
        found.ok_or_else(|| BsaError::SheetNotFound {
            sheet: selector.to_string(),
        })
    }

    /// Save back under the name it was loaded from
    pub fn save(&self) -> BsaResult<()> {
        self.save_as(&self.path)
    }

    /// Write the template, with every number set since load, to `path`
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> BsaResult<()> {
        let path = path.as_ref();
        let edits: Vec<(&str, &SheetEdits)> = self
            .sheets
            .iter()
            .filter(|sheet| !sheet.edits.is_empty())
            .map(|sheet| (sheet.name(), &sheet.edits))
            .collect();

        let patched = patch_package(&self.package, &edits)?;
        fs::write(path, patched)
            .map_err(|e| BsaError::Save(format!("{}: {}", path.display(), e)))?;

        debug!(
            path = %path.display(),
            sheets = edits.len(),
            cells = edits.iter().map(|(_, cells)| cells.len()).sum::<usize>(),
            "saved workbook"
        );
        Ok(())
    }
}

/// Absolute (row, col) of a cell given a range's start and relative position
fn absolute(start: (u32, u32), row: usize, col: usize) -> Option<(u32, u16)> {
    let row = start.0.checked_add(u32::try_from(row).ok()?)?;
    let col = u16::try_from(start.1 as usize + col).ok()?;
    Some((row, col))
}

fn load_values(sheet: &mut TemplateSheet, range: &Range<Data>) {
    let Some(start) = range.start() else {
        return;
    };

    for (r, c, data) in range.used_cells() {
        let Some((row, col)) = absolute(start, r, c) else {
            continue;
        };
        let content = match data {
            Data::Int(i) => CellContent::Number(*i as f64),
            Data::Float(f) => CellContent::Number(*f),
            Data::String(s) => CellContent::Text(s.clone()),
            Data::Bool(b) => CellContent::Boolean(*b),
            Data::DateTime(dt) => CellContent::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellContent::Text(s.clone()),
            Data::Error(e) => CellContent::Text(e.to_string()),
            Data::Empty => continue,
        };
        sheet.set(row, col, content);
    }
}

fn load_formulas(sheet: &mut TemplateSheet, range: &Range<String>) {
    let Some(start) = range.start() else {
        return;
    };

    for (r, c, formula) in range.used_cells() {
        if formula.is_empty() {
            continue;
        }
        if let Some((row, col)) = absolute(start, r, c) {
            let formula = formula.strip_prefix('=').unwrap_or(formula);
            sheet.set(row, col, CellContent::Formula(formula.to_string()));
        }
    }
}
