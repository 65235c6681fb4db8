use crate::error::{BsaError, BsaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Workbook name the instrument template ships under
pub const DEFAULT_TEMPLATE: &str = "TemplateBSA.xlsx";

/// Last addressable row of an .xlsx worksheet (zero-based)
pub const MAX_ROW: u32 = 1_048_575;

/// Last addressable column of an .xlsx worksheet (zero-based, XFD)
pub const MAX_COL: u16 = 16_383;

//==============================================================================
// Report Format
//==============================================================================

/// Fixed byte layout of the plate-reader text report.
///
/// Every value line is assumed to serialize to the same number of bytes
/// (`X.XXX` plus a CRLF terminator). Offsets into the report are derived from
/// these widths alone, nothing in the report itself marks where a block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConstants {
    /// Bytes per value line, terminator included
    pub value_line_width: u64,
    /// Standards per replicate column (8 standards plus a blank)
    pub standards_per_replicate: u32,
    /// Bytes of the "Second set:" marker line
    pub second_set_marker_width: u64,
    /// Bytes per empty separator line
    pub blank_line_width: u64,
}

impl Default for FormatConstants {
    fn default() -> Self {
        Self {
            value_line_width: 7,
            standards_per_replicate: 9,
            second_set_marker_width: 13,
            blank_line_width: 2,
        }
    }
}

impl FormatConstants {
    /// On-disk size of one full standards replicate
    pub fn standard_block_width(&self) -> BsaResult<u64> {
        u64::from(self.standards_per_replicate)
            .checked_mul(self.value_line_width)
            .ok_or_else(|| format_overflow("standards block width"))
    }

    /// Wells taken by the standards across both replicate columns
    pub fn standards_well_count(&self) -> u32 {
        self.standards_per_replicate.saturating_mul(2)
    }

    /// Marker line plus the two blank lines that follow it
    pub fn separator_width(&self) -> BsaResult<u64> {
        self.blank_line_width
            .checked_mul(2)
            .and_then(|blanks| blanks.checked_add(self.second_set_marker_width))
            .ok_or_else(|| format_overflow("separator width"))
    }
}

/// Report format widths too large to address a file with
pub(crate) fn format_overflow(what: &str) -> BsaError {
    BsaError::Configuration(format!("{what} overflows the report byte range"))
}

//==============================================================================
// Grid Addressing
//==============================================================================

/// Zero-based cell coordinate in the output sheet.
///
/// Serialized in A1 notation, so `C35` is row 34, column 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellAnchor {
    pub row: u32,
    pub col: u16,
}

impl CellAnchor {
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// A1-style reference for display
    pub fn to_a1(&self) -> String {
        format!(
            "{}{}",
            crate::parser::column_index_to_letter(self.col),
            u64::from(self.row) + 1
        )
    }
}

impl TryFrom<String> for CellAnchor {
    type Error = BsaError;

    fn try_from(value: String) -> BsaResult<Self> {
        crate::parser::parse_a1(&value)
    }
}

impl From<CellAnchor> for String {
    fn from(anchor: CellAnchor) -> Self {
        anchor.to_a1()
    }
}

impl fmt::Display for CellAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

//==============================================================================
// Sections
//==============================================================================

/// The two semantic blocks of a report, each present as two replicate columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Calibration standards, listed high-to-low in the report
    Standards,
    /// Unknown samples
    Experimental,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Standards, Section::Experimental];

    /// Row increment applied after each placed value.
    ///
    /// Standards are written bottom-up so the sheet reads low-to-high.
    pub fn row_step(&self) -> i64 {
        match self {
            Section::Standards => -1,
            Section::Experimental => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::Standards => "standards",
            Section::Experimental => "experimentals",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//==============================================================================
// Layout Configuration
//==============================================================================

/// Which sheet of the template receives the values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "#{i}"),
            SheetSelector::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// How report values are located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractionMode {
    /// Seek to byte offsets computed from the fixed line widths
    #[default]
    ByteOffset,
    /// Tokenize the whole report and slice it by block counts
    Structural,
}

/// Everything that ties a report to a template: widths, anchors and target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    pub template: PathBuf,
    pub sheet: SheetSelector,
    pub format: FormatConstants,
    pub standards_anchor: CellAnchor,
    pub experimental_anchor: CellAnchor,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            sheet: SheetSelector::default(),
            format: FormatConstants::default(),
            // C35 and D68 in the template
            standards_anchor: CellAnchor::new(35 - 1, 3 - 1),
            experimental_anchor: CellAnchor::new(68 - 1, 4 - 1),
        }
    }
}

impl Layout {
    pub fn anchor(&self, section: Section) -> CellAnchor {
        match section {
            Section::Standards => self.standards_anchor,
            Section::Experimental => self.experimental_anchor,
        }
    }

    /// Reject layouts the offset arithmetic cannot work with
    pub fn validate(&self) -> BsaResult<()> {
        let format = &self.format;
        if format.value_line_width == 0 {
            return Err(BsaError::Configuration(
                "value_line_width must be greater than zero".to_string(),
            ));
        }
        if format.standards_per_replicate == 0 {
            return Err(BsaError::Configuration(
                "standards_per_replicate must be greater than zero".to_string(),
            ));
        }
        format.standard_block_width()?;
        format.separator_width()?;
        for section in Section::ALL {
            let anchor = self.anchor(section);
            // Replicate columns sit at anchor and anchor + 1
            if anchor.col >= MAX_COL {
                return Err(BsaError::Configuration(format!(
                    "{section} anchor {anchor} leaves no room for the second replicate column"
                )));
            }
        }
        Ok(())
    }
}
