use crate::core::{
    extract_section, ColumnSource, ReportOffsets, SectionPlan, SectionReport, StructuralSource,
};
use crate::error::BsaResult;
use crate::excel::TemplateWorkbook;
use crate::report::{open_report, NumericStream, OffsetSource};
use crate::types::{ExtractionMode, Layout, Section};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Inputs of one conversion run
#[derive(Debug, Clone)]
pub struct FillOptions {
    pub report: PathBuf,
    pub wells: u32,
    pub layout: Layout,
    /// Save somewhere other than the template itself
    pub output: Option<PathBuf>,
    pub mode: ExtractionMode,
    pub verbose: bool,
}

impl FillOptions {
    pub fn new(report: impl Into<PathBuf>, wells: u32) -> Self {
        Self {
            report: report.into(),
            wells,
            layout: Layout::default(),
            output: None,
            mode: ExtractionMode::default(),
            verbose: false,
        }
    }

    /// Where the filled workbook is written
    pub fn destination(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.layout.template.clone())
    }
}

/// What a run wrote and where
#[derive(Debug, Clone, PartialEq)]
pub struct FillSummary {
    pub standards: SectionReport,
    pub experimental: SectionReport,
    pub saved_to: PathBuf,
}

impl FillSummary {
    pub fn is_partial(&self) -> bool {
        self.standards.is_partial() || self.experimental.is_partial()
    }
}

/// Execute a conversion: report values into the template sheet.
///
/// Fatal problems (missing report, bad well count, missing template or sheet)
/// abort before anything is written or saved.
pub fn fill(options: &FillOptions) -> BsaResult<FillSummary> {
    let layout = &options.layout;
    layout.validate()?;

    let reader = open_report(&options.report)?;
    let offsets = ReportOffsets::compute(options.wells, &layout.format)?;
    let plans = [
        SectionPlan::for_section(Section::Standards, &offsets, layout)?,
        SectionPlan::for_section(Section::Experimental, &offsets, layout)?,
    ];
    debug!(?offsets, ?plans, "run plan");

    let mut template = TemplateWorkbook::load(&layout.template)?;
    let sheet = template.sheet_mut(&layout.sheet)?;

    if options.verbose {
        print_plan(options, &offsets);
    }

    let mut source: Box<dyn ColumnSource> = match options.mode {
        ExtractionMode::ByteOffset => {
            Box::new(OffsetSource::new(NumericStream::new(reader), offsets))
        }
        ExtractionMode::Structural => Box::new(StructuralSource::parse(
            reader,
            &layout.format,
            offsets.experimental_per_column,
        )?),
    };

    let mut reports = Vec::with_capacity(plans.len());
    for plan in &plans {
        println!("{}", format!("Writing {} to file...", plan.section).cyan());
        let report = extract_section(source.as_mut(), plan, &mut *sheet)?;
        if report.is_partial() {
            print_shortfall(&report);
        }
        reports.push(report);
    }

    let destination = options.destination();
    template.save_as(&destination)?;
    info!(path = %destination.display(), "workbook saved");
    println!("{}", "Done!".bold().green());

    Ok(FillSummary {
        standards: reports[0],
        experimental: reports[1],
        saved_to: destination,
    })
}

fn print_plan(options: &FillOptions, offsets: &ReportOffsets) {
    let layout = &options.layout;
    println!("   Report:   {}", options.report.display());
    println!("   Template: {} (sheet {})", layout.template.display(), layout.sheet);
    println!(
        "   Wells:    {} ({} experimental per column)",
        options.wells, offsets.experimental_per_column
    );
    if options.mode == ExtractionMode::ByteOffset {
        println!(
            "   Offsets:  standards {:?}, experimentals {:?}",
            offsets.standards, offsets.experimental
        );
    }
    println!(
        "   Anchors:  standards {}, experimentals {}\n",
        layout.standards_anchor.to_string().bright_blue(),
        layout.experimental_anchor.to_string().bright_blue()
    );
}

fn print_shortfall(report: &SectionReport) {
    for (replicate, missing) in report.shortfall().iter().enumerate() {
        if *missing > 0 {
            println!(
                "   {} {} column {}: expected {}, found {}",
                "⚠️".yellow(),
                report.section,
                replicate + 1,
                report.expected,
                report.written[replicate]
            );
        }
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
