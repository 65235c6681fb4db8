//! Offset calculator: where each of the four report blocks begins
//!
//! Byte layout of a conforming report:
//!
//! ```text
//! [standards, replicate 1]      standards_per_replicate lines
//! [experimentals, replicate 1]  N lines
//! Second set:                   marker line
//!                               blank line
//!                               blank line
//! [standards, replicate 2]      standards_per_replicate lines
//! [experimentals, replicate 2]  N lines
//! ```
//!
//! where `N = (wells - 2 * standards_per_replicate) / 2`.

use crate::error::{BsaError, BsaResult};
use crate::types::{format_overflow, FormatConstants, Section};

/// Number of experimental values per replicate column.
///
/// The well count must cover both standards replicates and split evenly
/// across the two experimental columns; anything else is a usage error.
pub fn experimental_per_column(well_count: u32, format: &FormatConstants) -> BsaResult<u32> {
    let standards = format.standards_well_count();
    if well_count < standards {
        return Err(BsaError::Configuration(format!(
            "total wells used ({well_count}) must be at least {standards} to cover both standards replicates"
        )));
    }

    let experimental = well_count - standards;
    if experimental % 2 != 0 {
        return Err(BsaError::Configuration(format!(
            "total wells used ({well_count}) leaves {experimental} experimental wells, which cannot be split across two replicate columns"
        )));
    }

    Ok(experimental / 2)
}

/// Absolute byte offsets of the four report blocks, computed once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOffsets {
    pub experimental_per_column: u32,
    pub standards: [u64; 2],
    pub experimental: [u64; 2],
}

impl ReportOffsets {
    pub fn compute(well_count: u32, format: &FormatConstants) -> BsaResult<Self> {
        let per_column = experimental_per_column(well_count, format)?;
        let block = format.standard_block_width()?;
        let experimental_block = u64::from(per_column)
            .checked_mul(format.value_line_width)
            .ok_or_else(|| format_overflow("experimental block width"))?;
        let separator = format.separator_width()?;

        // Second standards replicate follows the first full set and the separator
        let second_standards = block
            .checked_add(experimental_block)
            .and_then(|n| n.checked_add(separator))
            .ok_or_else(|| format_overflow("second standards offset"))?;
        let second_experimental = second_standards
            .checked_add(block)
            .ok_or_else(|| format_overflow("second experimental offset"))?;

        Ok(Self {
            experimental_per_column: per_column,
            standards: [0, second_standards],
            experimental: [block, second_experimental],
        })
    }

    /// Offsets of both replicate columns of a section
    pub fn section(&self, section: Section) -> [u64; 2] {
        match section {
            Section::Standards => self.standards,
            Section::Experimental => self.experimental,
        }
    }

    /// Values to read per replicate column of a section
    pub fn count(&self, section: Section, format: &FormatConstants) -> u32 {
        match section {
            Section::Standards => format.standards_per_replicate,
            Section::Experimental => self.experimental_per_column,
        }
    }
}
