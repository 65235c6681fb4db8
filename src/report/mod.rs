//! Plain-text plate-reader report access

mod source;
mod stream;

pub use source::OffsetSource;
pub use stream::NumericStream;

use crate::error::{BsaError, BsaResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open a report for buffered reading; any failure is `InputNotFound`
pub fn open_report(path: &Path) -> BsaResult<BufReader<File>> {
    let file = File::open(path).map_err(|source| BsaError::InputNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}
