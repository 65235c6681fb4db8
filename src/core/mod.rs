//! Offset calculation and positional extraction

pub mod extractor;
pub mod offsets;
pub mod structural;

pub use extractor::{extract_section, ColumnSource, SectionPlan, SectionReport, REPLICATES};
pub use offsets::{experimental_per_column, ReportOffsets};
pub use structural::StructuralSource;
