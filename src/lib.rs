//! AutoBSA - plate-reader report to BSA template workbook
//!
//! The plate reader exports a flat text report with no headers: which
//! numbers are standards and which are samples is known only from their
//! position. This library locates the four value blocks in that report and
//! places each value at a fixed cell of the `TemplateBSA.xlsx` layout.
//!
//! # Features
//!
//! - Byte-offset extraction that matches the instrument's fixed-width output
//! - Structural extraction that tolerates values of any width
//! - Layout (widths, anchors, template, sheet) overridable from YAML
//! - Template read through calamine and saved by patching only the written cells
//!
//! # Example
//!
//! ```no_run
//! use royalbit_autobsa::cli::{fill, FillOptions};
//!
//! let options = FillOptions::new("plate_7.txt", 24);
//! let summary = fill(&options)?;
//!
//! println!("Standards written: {:?}", summary.standards.written);
//! println!("Saved to: {}", summary.saved_to.display());
//! # Ok::<(), royalbit_autobsa::error::BsaError>(())
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod parser;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use error::{BsaError, BsaResult};
pub use types::{CellAnchor, ExtractionMode, FormatConstants, Layout, Section, SheetSelector};
