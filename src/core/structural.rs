//! Structural column source
//!
//! Instead of seeking to byte offsets, tokenize the whole report once and
//! slice the numeric tokens by block counts. Token width no longer matters,
//! so values like `10.250` or `1.2e-3` cannot misalign later blocks.

use crate::core::extractor::{ColumnSource, REPLICATES};
use crate::error::BsaResult;
use crate::types::{FormatConstants, Section};
use std::io::BufRead;
use tracing::debug;

/// Report values grouped into the four blocks, in report order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralSource {
    standards: [Vec<f64>; REPLICATES],
    experimental: [Vec<f64>; REPLICATES],
    current: Vec<f64>,
    cursor: usize,
}

impl StructuralSource {
    /// Read every token of the report and split the numeric ones into blocks.
    ///
    /// Non-numeric tokens (the "Second set:" marker) are skipped. A short
    /// report leaves the trailing blocks short or empty.
    pub fn parse<R: BufRead>(
        reader: R,
        format: &FormatConstants,
        experimental_per_column: u32,
    ) -> BsaResult<Self> {
        let mut values = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            for token in line?.split_whitespace() {
                match parse_decimal(token) {
                    Some(value) => values.push(value),
                    None => skipped += 1,
                }
            }
        }
        debug!(values = values.len(), skipped, "tokenized report");

        let standards = format.standards_per_replicate as usize;
        let experimental = experimental_per_column as usize;
        let mut rest = values.as_slice();
        let mut take = |n: usize| {
            let (head, tail) = rest.split_at(n.min(rest.len()));
            rest = tail;
            head.to_vec()
        };

        let standards_1 = take(standards);
        let experimental_1 = take(experimental);
        let standards_2 = take(standards);
        let experimental_2 = take(experimental);

        Ok(Self {
            standards: [standards_1, standards_2],
            experimental: [experimental_1, experimental_2],
            current: Vec::new(),
            cursor: 0,
        })
    }

    /// Values found for one replicate column
    pub fn column(&self, section: Section, replicate: usize) -> &[f64] {
        let columns = match section {
            Section::Standards => &self.standards,
            Section::Experimental => &self.experimental,
        };
        columns.get(replicate).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ColumnSource for StructuralSource {
    fn start_column(&mut self, section: Section, replicate: usize) -> BsaResult<()> {
        self.current = self.column(section, replicate).to_vec();
        self.cursor = 0;
        Ok(())
    }

    fn next_value(&mut self) -> BsaResult<Option<f64>> {
        let value = self.current.get(self.cursor).copied();
        if value.is_some() {
            self.cursor += 1;
        }
        Ok(value)
    }
}

/// A whole token that reads as a plain decimal; words like `inf` do not count
fn parse_decimal(token: &str) -> Option<f64> {
    let first = token.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    token.parse().ok()
}
