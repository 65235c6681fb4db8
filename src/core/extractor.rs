//! Positional extractor-placer
//!
//! One parameterized operation serves both sections: read up to `count`
//! values for each replicate column and write them down (or up) a sheet
//! column starting at the section anchor.

use crate::core::offsets::ReportOffsets;
use crate::error::{BsaError, BsaResult};
use crate::excel::CellSink;
use crate::types::{CellAnchor, Layout, Section, MAX_COL, MAX_ROW};
use tracing::{debug, trace, warn};

/// Replicate columns per section
pub const REPLICATES: usize = 2;

/// Supplier of report values, one replicate column at a time
pub trait ColumnSource {
    /// Position the source at the first value of a replicate column
    fn start_column(&mut self, section: Section, replicate: usize) -> BsaResult<()>;

    /// Next value of the current column, `None` once the column has no more data
    fn next_value(&mut self) -> BsaResult<Option<f64>>;
}

/// Where and how many values a section places
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPlan {
    pub section: Section,
    pub count: u32,
    pub anchor: CellAnchor,
    pub row_step: i64,
}

impl SectionPlan {
    pub fn new(section: Section, count: u32, anchor: CellAnchor) -> BsaResult<Self> {
        let plan = Self {
            section,
            count,
            anchor,
            row_step: section.row_step(),
        };

        if anchor.col >= MAX_COL {
            return Err(BsaError::Configuration(format!(
                "{section} anchor {anchor} leaves no room for the second replicate column"
            )));
        }

        // Every row the plan can touch must exist on the sheet
        if count > 0 {
            plan.row_for(count as usize - 1).ok_or_else(|| {
                BsaError::Configuration(format!(
                    "{count} {section} starting at {anchor} run off the sheet"
                ))
            })?;
        }

        Ok(plan)
    }

    /// Plan for a section using the run's offsets and layout
    pub fn for_section(section: Section, offsets: &ReportOffsets, layout: &Layout) -> BsaResult<Self> {
        Self::new(
            section,
            offsets.count(section, &layout.format),
            layout.anchor(section),
        )
    }

    /// Sheet row of the `index`-th value
    pub fn row_for(&self, index: usize) -> Option<u32> {
        let delta = i64::try_from(index).ok()?.checked_mul(self.row_step)?;
        let row = i64::from(self.anchor.row).checked_add(delta)?;
        u32::try_from(row).ok().filter(|r| *r <= MAX_ROW)
    }

    /// Sheet column of a replicate
    pub fn col_for(&self, replicate: usize) -> u16 {
        self.anchor.col + replicate as u16
    }
}

/// Outcome of one section: how many values landed in each replicate column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionReport {
    pub section: Section,
    pub expected: u32,
    pub written: [usize; REPLICATES],
}

impl SectionReport {
    /// True when either column received fewer values than expected
    pub fn is_partial(&self) -> bool {
        self.written.iter().any(|w| *w < self.expected as usize)
    }

    /// Values expected but not found, per column
    pub fn shortfall(&self) -> [usize; REPLICATES] {
        self.written
            .map(|w| (self.expected as usize).saturating_sub(w))
    }
}

/// Read and place one section, both replicate columns.
///
/// A column that runs out of data stops early without error; whatever was
/// read stays written. Cells past the last value keep their prior content.
pub fn extract_section<S, G>(source: &mut S, plan: &SectionPlan, grid: &mut G) -> BsaResult<SectionReport>
where
    S: ColumnSource + ?Sized,
    G: CellSink + ?Sized,
{
    let mut written = [0usize; REPLICATES];

    for (replicate, count) in written.iter_mut().enumerate() {
        source.start_column(plan.section, replicate)?;
        let col = plan.col_for(replicate);

        while *count < plan.count as usize {
            let Some(value) = source.next_value()? else {
                break;
            };
            let row = plan.row_for(*count).ok_or_else(|| {
                BsaError::Configuration(format!(
                    "{} value {} from {} falls off the sheet",
                    plan.section,
                    *count + 1,
                    plan.anchor
                ))
            })?;
            trace!(section = %plan.section, replicate, row, col, value, "write cell");
            grid.set_number(row, col, value);
            *count += 1;
        }
    }

    let report = SectionReport {
        section: plan.section,
        expected: plan.count,
        written,
    };

    if report.is_partial() {
        warn!(
            section = %plan.section,
            expected = plan.count,
            written = ?report.written,
            "report ended before the section was complete"
        );
    } else {
        debug!(section = %plan.section, written = ?report.written, "section placed");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory source: one value list per (section, replicate)
    struct VecSource {
        columns: BTreeMap<(u8, usize), Vec<f64>>,
        current: std::vec::IntoIter<f64>,
    }

    impl VecSource {
        fn new(standards: [Vec<f64>; 2], experimental: [Vec<f64>; 2]) -> Self {
            let mut columns = BTreeMap::new();
            for (i, col) in standards.into_iter().enumerate() {
                columns.insert((0, i), col);
            }
            for (i, col) in experimental.into_iter().enumerate() {
                columns.insert((1, i), col);
            }
            Self {
                columns,
                current: Vec::new().into_iter(),
            }
        }
    }

    impl ColumnSource for VecSource {
        fn start_column(&mut self, section: Section, replicate: usize) -> BsaResult<()> {
            let key = (u8::from(section == Section::Experimental), replicate);
            self.current = self.columns.get(&key).cloned().unwrap_or_default().into_iter();
            Ok(())
        }

        fn next_value(&mut self) -> BsaResult<Option<f64>> {
            Ok(self.current.next())
        }
    }

    type Grid = BTreeMap<(u32, u16), f64>;

    #[test]
    fn test_standards_fill_upward() {
        let mut source = VecSource::new([vec![3.0, 2.0, 1.0], vec![6.0, 5.0, 4.0]], Default::default());
        let plan = SectionPlan::new(Section::Standards, 3, CellAnchor::new(10, 2)).unwrap();
        let mut grid = Grid::new();

        let report = extract_section(&mut source, &plan, &mut grid).unwrap();

        assert_eq!(report.written, [3, 3]);
        assert!(!report.is_partial());
        assert_eq!(grid[&(10, 2)], 3.0);
        assert_eq!(grid[&(9, 2)], 2.0);
        assert_eq!(grid[&(8, 2)], 1.0);
        assert_eq!(grid[&(10, 3)], 6.0);
        assert_eq!(grid[&(8, 3)], 4.0);
        assert_eq!(grid.len(), 6);
    }

    #[test]
    fn test_experimental_fill_downward() {
        let mut source = VecSource::new(Default::default(), [vec![1.5, 2.5], vec![3.5, 4.5]]);
        let plan = SectionPlan::new(Section::Experimental, 2, CellAnchor::new(67, 3)).unwrap();
        let mut grid = Grid::new();

        extract_section(&mut source, &plan, &mut grid).unwrap();

        assert_eq!(grid[&(67, 3)], 1.5);
        assert_eq!(grid[&(68, 3)], 2.5);
        assert_eq!(grid[&(67, 4)], 3.5);
        assert_eq!(grid[&(68, 4)], 4.5);
    }

    #[test]
    fn test_stops_at_count_even_with_more_data() {
        let mut source = VecSource::new(Default::default(), [vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let plan = SectionPlan::new(Section::Experimental, 2, CellAnchor::new(0, 0)).unwrap();
        let mut grid = Grid::new();

        let report = extract_section(&mut source, &plan, &mut grid).unwrap();
        assert_eq!(report.written, [2, 2]);
        assert!(!grid.contains_key(&(2, 0)));
    }

    #[test]
    fn test_short_column_is_partial_not_error() {
        let mut source = VecSource::new([vec![9.0, 8.0], vec![]], Default::default());
        let plan = SectionPlan::new(Section::Standards, 9, CellAnchor::new(34, 2)).unwrap();
        let mut grid = Grid::new();
        grid.insert((30, 2), -1.0);

        let report = extract_section(&mut source, &plan, &mut grid).unwrap();

        assert_eq!(report.written, [2, 0]);
        assert!(report.is_partial());
        assert_eq!(report.shortfall(), [7, 9]);
        // Untouched cell keeps the template value
        assert_eq!(grid[&(30, 2)], -1.0);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_zero_count_writes_nothing() {
        let mut source = VecSource::new(Default::default(), [vec![1.0], vec![2.0]]);
        let plan = SectionPlan::new(Section::Experimental, 0, CellAnchor::new(67, 3)).unwrap();
        let mut grid = Grid::new();

        let report = extract_section(&mut source, &plan, &mut grid).unwrap();
        assert_eq!(report.written, [0, 0]);
        assert!(!report.is_partial());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_plan_rejects_rows_above_sheet() {
        let err = SectionPlan::new(Section::Standards, 9, CellAnchor::new(4, 2)).unwrap_err();
        assert!(matches!(err, BsaError::Configuration(_)));
    }

    #[test]
    fn test_plan_rejects_rows_below_sheet() {
        assert!(SectionPlan::new(Section::Experimental, 3, CellAnchor::new(MAX_ROW - 1, 0)).is_err());
        assert!(SectionPlan::new(Section::Experimental, 2, CellAnchor::new(MAX_ROW - 1, 0)).is_ok());
    }

    #[test]
    fn test_off_sheet_row_is_error_not_partial() {
        let plan = SectionPlan {
            section: Section::Standards,
            count: 3,
            anchor: CellAnchor::new(0, 2),
            row_step: -1,
        };
        let mut source = VecSource::new([vec![1.0, 2.0, 3.0], vec![]], Default::default());
        let mut grid = Grid::new();

        let err = extract_section(&mut source, &plan, &mut grid).unwrap_err();
        assert!(matches!(err, BsaError::Configuration(_)));
        assert_eq!(grid[&(0, 2)], 1.0);
    }

    #[test]
    fn test_plan_rejects_last_column_anchor() {
        assert!(SectionPlan::new(Section::Experimental, 1, CellAnchor::new(0, MAX_COL)).is_err());
    }

    #[test]
    fn test_row_for_follows_direction() {
        let up = SectionPlan::new(Section::Standards, 9, CellAnchor::new(34, 2)).unwrap();
        assert_eq!(up.row_for(0), Some(34));
        assert_eq!(up.row_for(8), Some(26));
        let down = SectionPlan::new(Section::Experimental, 3, CellAnchor::new(67, 3)).unwrap();
        assert_eq!(down.row_for(2), Some(69));
        assert_eq!(down.col_for(1), 4);
    }
}
