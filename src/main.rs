use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parcelmap::config::StyleConfig;
use parcelmap::fetch::{self, FeatureQuery, FetchState};
use parcelmap::graph::{self, MapPoint};
use parcelmap::palette::Rgb;
use parcelmap::{csv_reader, logging, parser, preprocessor, runtime, OutputFormat, RenderOptions};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const MARKER_COLOR: Rgb = Rgb(0xd6, 0x27, 0x28);
const MARKER_SIZE: u32 = 4;

#[derive(Parser, Debug)]
#[command(name = "parcelmap")]
#[command(about = "Clean, summarize and map parcel data with a small pipe DSL", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a pipeline over a CSV or GeoJSON table
    Run(RunArgs),
    /// Fetch point features from an open-data endpoint and map them
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Image width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Image format
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl RenderArgs {
    fn options(&self) -> RenderOptions {
        RenderOptions { width: self.width, height: self.height, format: self.format }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline, e.g. 'remap(field: land_use) | summarize(by: land_use, sum: lot_area) | bar(y: lot_area_sum)'
    dsl: String,

    /// Input table (.csv, .json, .geojson); CSV on stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Style configuration merged over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pipeline variable, referenced as $name or ${name}
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Dataset endpoint URL
    #[arg(long)]
    endpoint: String,

    /// Row filter passed as the $where parameter
    #[arg(long = "where")]
    filter: Option<String>,

    /// Maximum number of rows ($limit)
    #[arg(long, default_value_t = 1000)]
    limit: usize,

    /// Attribute used as the marker label
    #[arg(long)]
    label: Option<String>,

    #[command(flatten)]
    render: RenderArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Fetch(args) => fetch_and_map(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let variables = preprocessor::parse_assignments(&args.vars)?;
    let dsl = preprocessor::expand_variables(&args.dsl, &variables)?;
    let pipeline = parser::parse_pipeline(&dsl)?;

    let config = StyleConfig::load(args.config.as_deref())?;
    let table = match &args.input {
        Some(path) => csv_reader::read_table_from_path(path)?,
        None => csv_reader::read_table_from_stdin().context("Failed to read CSV from stdin")?,
    };

    let stage = runtime::run_pipeline(&pipeline, table, &config, &args.render.options())?;
    let writer = open_output(args.render.output.as_ref())?;
    stage.write_output(writer)?;
    Ok(ExitCode::SUCCESS)
}

fn fetch_and_map(args: FetchArgs) -> Result<ExitCode> {
    let query = FeatureQuery {
        endpoint: args.endpoint,
        filter: args.filter,
        limit: args.limit,
    };

    eprintln!("{}", FetchState::Pending.status_line());
    let client = reqwest::blocking::Client::new();
    let state = fetch::run_fetch(&client, &query, args.label.as_deref());
    eprintln!("{}", state.status_line());

    if let FetchState::Failed(_) = state {
        return Ok(ExitCode::FAILURE);
    }

    let points: Vec<MapPoint> = state
        .markers()
        .iter()
        .map(|m| MapPoint { x: m.lon, y: m.lat, color: MARKER_COLOR.opaque(), size: MARKER_SIZE })
        .collect();
    let title = state.status_line();
    let bytes = graph::render_point_map(&points, Some(&title), &args.render.options())?;

    let mut writer = open_output(args.render.output.as_ref())?;
    writer.write_all(&bytes).context("Failed to write image")?;
    writer.flush().context("Failed to flush output")?;
    Ok(ExitCode::SUCCESS)
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}
