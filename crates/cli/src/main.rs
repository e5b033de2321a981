//! CLI tool for summarizing booking workbooks and exporting client reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dash_core::export::DEFAULT_TEMPLATE;
use dash_core::format::{format_count, format_money};
use dash_core::presentation::slide_title;
use dash_core::{
    records_from_json_bytes, select_slides, Aggregator, AudienceMode, DashboardSummary,
    ExportOutcome, FieldMap, FieldNormalizer, NullSurface, RawRecord, Session, SourceFormat,
};
use std::fs::File;
use std::io::{self, BufRead, Cursor, Write};
use std::path::{Path, PathBuf};

/// Summarize booking workbooks and export secure client reports.
#[derive(Parser, Debug)]
#[command(name = "dash-report")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file mapping canonical fields to column names
    #[arg(long, global = true)]
    fields: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print KPIs, top regions and recent bookings
    Summary {
        /// Input workbook (.xlsx) or JSON rows
        #[arg(required_unless_present = "sample")]
        input: Option<PathBuf>,

        /// Use the built-in sample bookings
        #[arg(long)]
        sample: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List presentation slides for an audience
    Slides {
        /// Audience: internal or client
        #[arg(short, long, default_value = "internal")]
        mode: AudienceMode,
    },

    /// Export a client report with financial fields removed
    Export {
        /// Input workbook (.xlsx) or JSON rows
        #[arg(required_unless_present = "sample")]
        input: Option<PathBuf>,

        /// Use the built-in sample bookings
        #[arg(long)]
        sample: bool,

        /// Dashboard page to embed the report in
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Summarize the data embedded in an exported client report
    OpenReport {
        /// Exported report (.html)
        report: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let fields = match &args.fields {
        Some(path) => load_field_map(path)?,
        None => FieldMap::default(),
    };

    match &args.command {
        Command::Summary {
            input,
            sample,
            json,
        } => {
            let session = load_session(input.as_deref(), *sample, &fields, args.verbose)?;
            print_summary(session.summary(), *json)?;
        }
        Command::Slides { mode } => {
            for (index, id) in select_slides(*mode).iter().enumerate() {
                println!("{:>2}. {:<24} {}", index + 1, id, slide_title(id));
            }
        }
        Command::Export {
            input,
            sample,
            template,
            output,
            yes,
        } => {
            let session = load_session(input.as_deref(), *sample, &fields, args.verbose)?;
            let markup = match template {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read template {}", path.display()))?,
                None => DEFAULT_TEMPLATE.to_string(),
            };

            let outcome = session
                .export_client_report(&markup, |prompt| *yes || confirm_on_stdin(prompt))
                .context("Failed to export client report")?;

            match outcome {
                ExportOutcome::Exported(document) => {
                    let output_path = get_output_path(&document.filename, output.as_ref())?;
                    write_output(&output_path, &document.html)?;
                    eprintln!(
                        "Exported {} records to {}",
                        document.record_count,
                        output_path.display()
                    );
                }
                ExportOutcome::Cancelled => eprintln!("Export cancelled"),
            }
        }
        Command::OpenReport { report, json } => {
            let html = std::fs::read_to_string(report)
                .with_context(|| format!("Failed to read {}", report.display()))?;
            let session = new_session(&fields)
                .open_report(&html)
                .with_context(|| format!("Failed to open report {}", report.display()))?;

            if args.verbose {
                eprintln!("Opened read-only report with {} records", session.dataset().len());
            }
            print_summary(session.summary(), *json)?;
        }
    }

    Ok(())
}

/// Load a field map from a JSON file. Missing keys keep their defaults.
fn load_field_map(path: &Path) -> Result<FieldMap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read field map {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid field map {}", path.display()))
}

/// An empty headless session reading columns named by `fields`.
fn new_session(fields: &FieldMap) -> Session<NullSurface> {
    Session::new(NullSurface)
        .with_normalizer(FieldNormalizer::new().with_fields(fields.clone()))
        .with_aggregator(Aggregator::new().with_fields(fields.clone()))
}

/// Build a session over an input file or the sample bookings.
fn load_session(
    input: Option<&Path>,
    sample: bool,
    fields: &FieldMap,
    verbose: bool,
) -> Result<Session<NullSurface>> {
    let mut session = new_session(fields);

    let status = match input {
        Some(path) if !sample => {
            if verbose {
                eprintln!("Processing: {}", path.display());
            }
            let rows = read_rows(path)?;
            session.load_records(rows)
        }
        _ => session.load_sample(),
    }
    .context("Failed to load bookings")?;

    if verbose {
        eprintln!("  Loaded {:?}", status);
    }

    Ok(session)
}

/// Read rows from a workbook or a JSON file.
fn read_rows(input_path: &Path) -> Result<Vec<RawRecord>> {
    let bytes = std::fs::read(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;

    let format = SourceFormat::from_magic(&bytes)
        .or_else(|| {
            input_path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension)
        })
        .ok_or_else(|| anyhow::anyhow!("Could not detect file format"))?;

    let rows = match format {
        SourceFormat::Xlsx => {
            log::debug!("Parsing as XLSX");
            let parser = dash_xlsx::XlsxParser::new();
            parser
                .parse(Cursor::new(bytes))
                .with_context(|| format!("Failed to parse {}", input_path.display()))?
        }
        SourceFormat::Json => {
            log::debug!("Parsing as JSON rows");
            records_from_json_bytes(&bytes)
                .with_context(|| format!("Failed to parse {}", input_path.display()))?
        }
    };

    Ok(rows)
}

fn print_summary(summary: &DashboardSummary, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{}", text);
        return Ok(());
    }

    let kpis = &summary.kpis;
    println!("Bookings:        {}", format_count(kpis.total_count));
    println!("Total revenue:   {}", format_money(kpis.total_revenue));
    println!("Average revenue: {}", format_money(kpis.average_revenue));
    println!("Locations:       {}", format_count(kpis.unique_region_count));
    println!("Corporate:       {}", format_count(kpis.corporate_count));
    println!("Self pay:        {}", format_count(kpis.self_pay_count));
    println!("Corporate flex:  {}", format_count(kpis.corporate_flex_count));

    if !summary.top_regions_by_count.is_empty() {
        println!();
        println!("Top regions:");
        for point in &summary.top_regions_by_count.points {
            let revenue = summary
                .top_regions_by_revenue
                .value_of(&point.category)
                .unwrap_or_default();
            println!(
                "  {:<24} {:>6} {:>14}",
                point.category,
                format_count(point.value as usize),
                format_money(revenue)
            );
        }
    }

    if !summary.recent_rows.is_empty() {
        println!();
        println!("Recent bookings:");
        for row in &summary.recent_rows {
            println!(
                "  {:<12} {:<24} {:<12} {:<16} {:>12}",
                row.date, row.name, row.status, row.payment_type, row.revenue
            );
        }
    }

    Ok(())
}

/// Ask a yes/no question on stderr and read the answer from stdin.
fn confirm_on_stdin(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Determine the output path for an exported report.
fn get_output_path(filename: &str, output_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let output_path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(filename)
        }
        None => PathBuf::from(filename),
    };

    Ok(output_path)
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
