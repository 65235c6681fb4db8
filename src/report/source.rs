//! Byte-offset column source

use crate::core::extractor::ColumnSource;
use crate::core::offsets::ReportOffsets;
use crate::error::BsaResult;
use crate::report::NumericStream;
use crate::types::Section;
use std::io::{BufRead, Seek};
use tracing::debug;

/// Reads each replicate column by seeking to its precomputed byte offset
pub struct OffsetSource<R> {
    stream: NumericStream<R>,
    offsets: ReportOffsets,
}

impl<R: BufRead + Seek> OffsetSource<R> {
    pub fn new(stream: NumericStream<R>, offsets: ReportOffsets) -> Self {
        Self { stream, offsets }
    }
}

impl<R: BufRead + Seek> ColumnSource for OffsetSource<R> {
    fn start_column(&mut self, section: Section, replicate: usize) -> BsaResult<()> {
        let offset = self.offsets.section(section)[replicate];
        debug!(%section, replicate, offset, "seek");
        self.stream.seek_to(offset)
    }

    fn next_value(&mut self) -> BsaResult<Option<f64>> {
        self.stream.next_value()
    }
}
