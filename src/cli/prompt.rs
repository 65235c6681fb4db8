//! Console prompts for the two run inputs

use crate::error::{BsaError, BsaResult};
use std::io::{BufRead, Write};

/// Print a prompt and read one trimmed line of answer
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> BsaResult<String> {
    write!(output, "{label}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(BsaError::Configuration(format!(
            "no answer given for \"{}\"",
            label.trim_end_matches([' ', ':'])
        )));
    }
    Ok(line.trim().to_string())
}

/// Parse the "total wells used" answer
pub fn parse_well_count(text: &str) -> BsaResult<u32> {
    let text = text.trim();
    text.parse::<u32>()
        .ok()
        .filter(|wells| *wells > 0)
        .ok_or_else(|| {
            BsaError::Configuration(format!(
                "total wells used must be a positive integer, got '{text}'"
            ))
        })
}
