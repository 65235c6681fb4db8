use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use royalbit_autobsa::cli::{self, FillOptions};
use royalbit_autobsa::parser;
use royalbit_autobsa::types::{ExtractionMode, Layout};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "autobsa")]
#[command(about = "Place BSA plate-reader report values into the TemplateBSA.xlsx layout")]
#[command(long_about = "AutoBSA - plate-reader report to BSA template

Reads the plain-text report exported by the plate reader and writes each
value into the calibration template:

  standards     2 replicate columns of 9, written upward from C35 / D35
  experimentals 2 replicate columns of (wells - 18) / 2, downward from D68 / E68

The report carries no headers, so values are located by position alone.
Anything not given on the command line is asked for interactively:

  Enter a text file: plate_7.txt
  Enter total wells used: 24

LAYOUT FILE (--layout):
  template: TemplateBSA.xlsx
  sheet: 0
  standards_anchor: C35
  experimental_anchor: D68
  format:
    value_line_width: 7
    standards_per_replicate: 9
    second_set_marker_width: 13
    blank_line_width: 2

EXAMPLES:
  autobsa                                   # Prompt for report and wells
  autobsa plate_7.txt --wells 24            # Fill TemplateBSA.xlsx in place
  autobsa plate_7.txt -w 24 -o plate_7.xlsx # Keep the template pristine
  autobsa plate_7.txt -w 24 --mode structural")]
#[command(version)]
struct Cli {
    /// Path to the plate-reader text report
    report: Option<PathBuf>,

    /// Total wells used (standards included)
    #[arg(short, long)]
    wells: Option<u32>,

    /// Template workbook to fill (overrides the layout file)
    #[arg(short, long, env = "AUTOBSA_TEMPLATE")]
    template: Option<PathBuf>,

    /// Save the filled workbook here instead of over the template
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// YAML layout file with widths, anchors, template and sheet
    #[arg(short, long)]
    layout: Option<PathBuf>,

    /// How values are located in the report
    #[arg(short, long, value_enum, default_value_t = ExtractionMode::ByteOffset)]
    mode: ExtractionMode,

    /// Show the computed offsets and debug diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "❌".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "royalbit_autobsa=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("AUTOBSA_LOG")
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut layout = match &cli.layout {
        Some(path) => parser::parse_layout(path)
            .with_context(|| format!("layout file {}", path.display()))?,
        None => Layout::default(),
    };
    if let Some(template) = cli.template {
        layout.template = template;
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    let report = match cli.report {
        Some(path) => path,
        None => PathBuf::from(cli::prompt(&mut input, &mut stdout, "Enter a text file: ")?),
    };
    let wells = match cli.wells {
        Some(wells) => wells,
        None => {
            let answer = cli::prompt(&mut input, &mut stdout, "Enter total wells used: ")?;
            cli::parse_well_count(&answer)?
        }
    };
    stdout.flush()?;

    let options = FillOptions {
        report,
        wells,
        layout,
        output: cli.output,
        mode: cli.mode,
        verbose: cli.verbose,
    };
    cli::fill(&options)?;

    Ok(())
}
