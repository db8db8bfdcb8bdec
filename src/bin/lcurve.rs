//! lcurve - Command-line interface for the learning-curve engine
//!
//! Commands:
//! - aggregate: Smooth and average run tables into combined curves
//! - validate: Check run tables against the configured columns and positions
//! - schema: Describe the output payload

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use learning_curve::pipeline::CurveProcessor;
use learning_curve::schema::{ColumnSpec, RunTable, RunTableAdapter, TableSpec};
use learning_curve::types::{CurvePayload, Group, MemberStatus};
use learning_curve::{
    aggregate_group, CurveConfig, CurveError, JoinPolicy, PositionMode, CURVE_VERSION,
};

/// lcurve - Smoothed, run-averaged learning curves
#[derive(Parser)]
#[command(name = "lcurve")]
#[command(version = CURVE_VERSION)]
#[command(about = "Smooth and average learning curves from score tables", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Smooth and average run tables into combined curves
    Aggregate {
        /// Files plotted on their own (use - for stdin)
        files: Vec<PathBuf>,

        /// Comma-separated files averaged together; repeat for more groups
        #[arg(short = 'a', long = "avg", value_name = "FILE,FILE...")]
        avg: Vec<String>,

        /// Names for the groups, in order (individual files first)
        #[arg(short = 'g', long = "groupnames", num_args = 1..)]
        group_names: Vec<String>,

        #[command(flatten)]
        table: TableArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Check run tables against the configured columns and positions
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        table: TableArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe the output payload
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

/// How run tables are read
#[derive(Args)]
struct TableArgs {
    /// Data columns (1-based); each column yields its own set of curves
    #[arg(short = 'c', long = "column", num_args = 1.., default_values_t = [1])]
    columns: Vec<usize>,

    /// Denominator column per data column (0 for none)
    #[arg(short = 'd', long = "denoms", num_args = 1..)]
    denoms: Vec<usize>,

    /// Column with per-episode step counts; positions become cumulative steps
    #[arg(short = 't', long = "timesteps", value_name = "COLUMN")]
    timesteps: Option<usize>,

    /// Skip NUMROWS rows for every row read
    #[arg(short = 'k', long = "skiprows", value_name = "NUMROWS", default_value_t = 0)]
    skip_rows: usize,

    /// Ignore the first line of each file
    #[arg(short = 'i', long = "ignoreheadings")]
    ignore_headings: bool,
}

/// Engine settings; flags override values from --config
#[derive(Args)]
struct EngineArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Smoothing window in samples (1 = no smoothing)
    #[arg(short = 's', long = "smooth")]
    smooth: Option<usize>,

    /// Report the standard error of averages
    #[arg(short = 'e', long = "error")]
    error: bool,

    /// Which runs contribute to a point when positions do not line up
    #[arg(long, value_enum)]
    join: Option<JoinArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum JoinArg {
    /// Every unfinished run contributes its next sample (default)
    Pending,
    /// Only runs with a sample at exactly that position
    Coincident,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one payload per line)
    Ndjson,
    /// JSON array of payloads
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), LcurveCliError> {
    match cli.command {
        Commands::Aggregate {
            files,
            avg,
            group_names,
            table,
            engine,
            output,
            output_format,
        } => cmd_aggregate(
            &files,
            &avg,
            &group_names,
            &table,
            &engine,
            &output,
            output_format,
        ),

        Commands::Validate {
            files,
            table,
            engine,
            json,
        } => cmd_validate(&files, &table, &engine, json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_aggregate(
    files: &[PathBuf],
    avg: &[String],
    group_names: &[String],
    table_args: &TableArgs,
    engine_args: &EngineArgs,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), LcurveCliError> {
    // Individual files first, then the averaging groups
    let mut plan: Vec<Vec<PathBuf>> = files.iter().map(|f| vec![f.clone()]).collect();
    for group in avg {
        let members: Vec<PathBuf> = group
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        plan.push(members);
    }
    if plan.is_empty() {
        return Err(LcurveCliError::NoFiles);
    }

    let spec = table_spec(table_args);
    let config = engine_config(engine_args, &spec)?;
    let sizes: Vec<usize> = plan.iter().map(Vec::len).collect();
    let names = RunTableAdapter::group_names(&sizes, group_names);

    // Read the files
    let mut loaded: Vec<Vec<(String, RunTable)>> = Vec::with_capacity(plan.len());
    for (name, paths) in names.iter().zip(&plan) {
        info!(group = %name, files = paths.len(), "reading group");
        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let label = path.display().to_string();
            match load_table(path, &spec) {
                Ok(table) => {
                    info!(
                        file = %label,
                        episodes = table.rows(),
                        steps = ?table.total_steps(),
                        "loaded run"
                    );
                    tables.push((label, table));
                }
                Err(e) => error!(file = %label, error = %e, "error reading run"),
            }
        }
        loaded.push(tables);
    }

    let processor = CurveProcessor::new(config);
    let mut payloads: Vec<CurvePayload> = Vec::new();
    let mut failed = 0;

    for (c, column) in spec.columns.iter().enumerate() {
        let panel = column.label();
        let groups: Vec<Group> = names
            .iter()
            .zip(&loaded)
            .map(|(name, tables)| RunTableAdapter::to_group(name, tables, c))
            .collect();

        for result in processor.process(&groups, Some(panel.as_str())) {
            match result {
                Ok(payload) => payloads.push(payload),
                Err(e) => {
                    error!(panel = %panel, error = %e, "group failed");
                    failed += 1;
                }
            }
        }
    }

    let output_data = format_output(&payloads, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if failed > 0 {
        Err(LcurveCliError::GroupsFailed(failed))
    } else {
        Ok(())
    }
}

fn cmd_validate(
    files: &[PathBuf],
    table_args: &TableArgs,
    engine_args: &EngineArgs,
    json: bool,
) -> Result<(), LcurveCliError> {
    let spec = table_spec(table_args);
    let config = engine_config(engine_args, &spec)?;

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let label = path.display().to_string();
        let table = match load_table(path, &spec) {
            Ok(table) => table,
            Err(e) => {
                entries.push(FileReport {
                    file: label,
                    rows: None,
                    total_steps: None,
                    columns: Vec::new(),
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let columns = spec
            .columns
            .iter()
            .enumerate()
            .map(|(c, column)| column_report(&table, c, column, &label, &config))
            .collect();

        entries.push(FileReport {
            file: label,
            rows: Some(table.rows()),
            total_steps: table.total_steps(),
            columns,
            error: None,
        });
    }

    let invalid = entries
        .iter()
        .filter(|e| e.error.is_some() || e.columns.iter().any(|c| c.error.is_some()))
        .count();
    let report = ValidationReport {
        total_files: entries.len(),
        valid_files: entries.len() - invalid,
        invalid_files: invalid,
        files: entries,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total files:   {}", report.total_files);
        println!("Valid files:   {}", report.valid_files);
        println!("Invalid files: {}", report.invalid_files);
        println!();

        for file in &report.files {
            match &file.error {
                Some(err) => println!("  [ERR] {}: {}", file.file, err),
                None => {
                    let steps = file
                        .total_steps
                        .map(|s| format!(", {} steps", s))
                        .unwrap_or_default();
                    println!(
                        "  {}: {} eps{}",
                        file.file,
                        file.rows.unwrap_or(0),
                        steps
                    );
                    for column in &file.columns {
                        let status = match (&column.error, column.status) {
                            (Some(err), _) => format!("[ERR] {}", err),
                            (None, Some(MemberStatus::InsufficientData)) => {
                                "[WARN] too short for smoothing window".to_string()
                            }
                            (None, _) => "[OK]".to_string(),
                        };
                        println!(
                            "    {}: {} samples, {} smoothed {}",
                            column.column, column.samples, column.smoothed_len, status
                        );
                    }
                }
            }
        }
    }

    if report.invalid_files > 0 {
        Err(LcurveCliError::ValidationFailed(report.invalid_files))
    } else {
        Ok(())
    }
}

fn column_report(
    table: &RunTable,
    index: usize,
    column: &ColumnSpec,
    label: &str,
    config: &CurveConfig,
) -> ColumnReport {
    let samples = table.samples(index).map_or(0, <[f64]>::len);
    let group = Group::new(label, table.run(index, label).into_iter().collect());

    match aggregate_group(&group, config) {
        Ok(result) => {
            let member = result.members.first();
            ColumnReport {
                column: column.label(),
                samples,
                smoothed_len: member.map_or(0, |m| m.smoothed_len),
                status: member.map(|m| m.status),
                error: None,
            }
        }
        Err(e) => ColumnReport {
            column: column.label(),
            samples,
            smoothed_len: 0,
            status: None,
            error: Some(e.to_string()),
        },
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), LcurveCliError> {
    if json_schema {
        println!("{}", get_output_json_schema());
    } else {
        println!("Output Schema: learning_curve.payload.v1");
        println!();
        println!("Each payload describes one group of runs for one data column:");
        println!();
        println!("- format_version, producer: {{ name, version, instance_id }}, computed_at_utc");
        println!("- group: group name; panel: data column label");
        println!("- config: {{ window, position_mode, dispersion, join }}");
        println!("- total_members: runs in the group, including ones too short to smooth");
        println!("- curve: [{{ x, y, support }}] with strictly increasing x");
        println!("- band: [{{ x, low, high }}] standard error band (only with --error)");
        println!("- segments: [{{ start, end, support, fraction }}] runs of constant support");
        println!("- members: [{{ label, samples, final_position, smoothed_len, status }}]");
    }

    Ok(())
}

// Helper functions

fn table_spec(args: &TableArgs) -> TableSpec {
    let columns = args
        .columns
        .iter()
        .enumerate()
        .map(|(c, &value)| ColumnSpec {
            value,
            denominator: args.denoms.get(c).copied().filter(|&d| d != 0),
        })
        .collect();

    TableSpec {
        columns,
        step_column: args.timesteps.filter(|&t| t != 0),
        skip_rows: args.skip_rows,
        has_header: args.ignore_headings,
    }
}

fn engine_config(args: &EngineArgs, spec: &TableSpec) -> Result<CurveConfig, LcurveCliError> {
    let mut config = match &args.config {
        Some(path) => CurveConfig::from_json(&fs::read_to_string(path)?)?,
        None => CurveConfig::default(),
    };

    if let Some(smooth) = args.smooth {
        config.window = smooth.saturating_sub(1);
    }
    if spec.step_column.is_some() {
        config.position_mode = PositionMode::Cumulative;
    }
    if args.error {
        config.dispersion = true;
    }
    if let Some(join) = args.join {
        config.join = match join {
            JoinArg::Pending => JoinPolicy::Pending,
            JoinArg::Coincident => JoinPolicy::Coincident,
        };
    }

    Ok(config)
}

fn load_table(path: &Path, spec: &TableSpec) -> Result<RunTable, LcurveCliError> {
    let text = if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path)?
    };
    Ok(RunTable::parse(&text, spec)?)
}

fn format_output(
    payloads: &[CurvePayload],
    format: &OutputFormat,
) -> Result<String, LcurveCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for payload in payloads {
                lines.push(serde_json::to_string(payload)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(payloads)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(payloads)?),
    }
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "learning_curve.payload.v1",
        "description": "Combined learning curve for one group of runs",
        "type": "object",
        "required": [
            "format_version", "producer", "computed_at_utc", "group", "config",
            "total_members", "curve", "segments", "members"
        ],
        "properties": {
            "format_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "group": { "type": "string" },
            "panel": { "type": "string" },
            "config": {
                "type": "object",
                "properties": {
                    "window": { "type": "integer", "minimum": 0 },
                    "position_mode": { "enum": ["index", "cumulative"] },
                    "dispersion": { "type": "boolean" },
                    "join": { "enum": ["pending", "coincident"] }
                }
            },
            "total_members": { "type": "integer", "minimum": 1 },
            "curve": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["x", "y", "support"],
                    "properties": {
                        "x": { "type": "number" },
                        "y": { "type": "number" },
                        "support": { "type": "integer", "minimum": 1 }
                    }
                }
            },
            "band": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["x", "low", "high"],
                    "properties": {
                        "x": { "type": "number" },
                        "low": { "type": "number" },
                        "high": { "type": "number" }
                    }
                }
            },
            "segments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["start", "end", "support", "fraction"],
                    "properties": {
                        "start": { "type": "integer" },
                        "end": { "type": "integer" },
                        "support": { "type": "integer" },
                        "fraction": { "type": "number" }
                    }
                }
            },
            "members": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" },
                        "samples": { "type": "integer" },
                        "final_position": { "type": ["number", "null"] },
                        "smoothed_len": { "type": "integer" },
                        "status": { "enum": ["contributing", "insufficient_data"] }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum LcurveCliError {
    Io(io::Error),
    Curve(CurveError),
    Json(serde_json::Error),
    NoFiles,
    GroupsFailed(usize),
    ValidationFailed(usize),
}

impl From<io::Error> for LcurveCliError {
    fn from(e: io::Error) -> Self {
        LcurveCliError::Io(e)
    }
}

impl From<CurveError> for LcurveCliError {
    fn from(e: CurveError) -> Self {
        LcurveCliError::Curve(e)
    }
}

impl From<serde_json::Error> for LcurveCliError {
    fn from(e: serde_json::Error) -> Self {
        LcurveCliError::Json(e)
    }
}

impl std::fmt::Display for LcurveCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LcurveCliError::Io(e) => write!(f, "{}", e),
            LcurveCliError::Curve(e) => write!(f, "{}", e),
            LcurveCliError::Json(e) => write!(f, "{}", e),
            LcurveCliError::NoFiles => write!(f, "No files given"),
            LcurveCliError::GroupsFailed(count) => write!(f, "{} groups failed", count),
            LcurveCliError::ValidationFailed(count) => {
                write!(f, "{} files failed validation", count)
            }
        }
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LcurveCliError> for CliError {
    fn from(e: LcurveCliError) -> Self {
        let message = e.to_string();
        match e {
            LcurveCliError::Io(_) => CliError {
                code: "IO_ERROR".to_string(),
                message,
                hint: Some("Check file paths and permissions".to_string()),
            },
            LcurveCliError::Curve(CurveError::ParseError(_)) => CliError {
                code: "PARSE_ERROR".to_string(),
                message,
                hint: Some("Check the --column, --denoms and --timesteps settings".to_string()),
            },
            LcurveCliError::Curve(CurveError::InvalidConfig(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message,
                hint: Some("Run 'lcurve schema' to see the config fields".to_string()),
            },
            LcurveCliError::Curve(_) => CliError {
                code: "CURVE_ERROR".to_string(),
                message,
                hint: None,
            },
            LcurveCliError::Json(_) => CliError {
                code: "JSON_ERROR".to_string(),
                message,
                hint: Some("Check JSON syntax".to_string()),
            },
            LcurveCliError::NoFiles => CliError {
                code: "NO_FILES".to_string(),
                message,
                hint: Some("Pass files directly or with -a".to_string()),
            },
            LcurveCliError::GroupsFailed(_) => CliError {
                code: "GROUPS_FAILED".to_string(),
                message,
                hint: Some("Run 'lcurve validate' on the group's files".to_string()),
            },
            LcurveCliError::ValidationFailed(_) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message,
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_files: usize,
    valid_files: usize,
    invalid_files: usize,
    files: Vec<FileReport>,
}

#[derive(serde::Serialize)]
struct FileReport {
    file: String,
    rows: Option<usize>,
    total_steps: Option<f64>,
    columns: Vec<ColumnReport>,
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct ColumnReport {
    column: String,
    samples: usize,
    smoothed_len: usize,
    status: Option<MemberStatus>,
    error: Option<String>,
}
