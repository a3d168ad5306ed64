// Runtime executor for the parcel pipeline DSL
//
// Steps move data through a small stage machine:
//
//   Table ──summarize──► Summary ──bar──► Rendered
//     │
//     └──color/fill──► Encoded ──map──► Rendered
//
// Table steps (remap, fill_null, bucket, drop_null) keep the Table stage;
// sort keeps the Summary stage. Anything else is a stage error.

use crate::aggregate::{self, SummaryTable};
use crate::config::StyleConfig;
use crate::data::Table;
use crate::encode::{self, ContinuousEncoder, VisualEncoding};
use crate::graph::{self, MapPoint};
use crate::palette::{ColorMap, Rgb};
use crate::parser::ast::{BarStep, ColorStep, FillStep, MapStep, Pipeline, Step};
use crate::transform;
use crate::RenderOptions;
use anyhow::{bail, Context, Result};
use std::io::Write;
use tracing::{debug, info, warn};

const DEFAULT_RAMP: &str = "viridis";
const DEFAULT_POINT_SIZE: f64 = 3.0;
const POINT_COLOR: Rgb = Rgb(0x1f, 0x77, 0xb4);
const LON_FIELDS: [&str; 4] = ["longitude", "lon", "lng", "x"];
const LAT_FIELDS: [&str; 3] = ["latitude", "lat", "y"];

/// Intermediate value flowing between steps
#[derive(Debug, Clone)]
pub enum Stage {
    Table(Table),
    Summary(SummaryTable),
    Encoded {
        table: Table,
        encodings: Vec<VisualEncoding>,
    },
    Rendered(Vec<u8>),
}

impl Stage {
    fn kind(&self) -> &'static str {
        match self {
            Stage::Table(_) => "a table",
            Stage::Summary(_) => "a summary",
            Stage::Encoded { .. } => "an encoded table",
            Stage::Rendered(_) => "a rendered image",
        }
    }

    /// Write the final stage: tables as CSV, images as raw bytes
    pub fn write_output<W: Write>(&self, mut writer: W) -> Result<()> {
        match self {
            Stage::Table(table) => table.write_csv(writer),
            Stage::Summary(summary) => summary.write_csv(writer),
            Stage::Encoded { table, encodings } => encode::attach_encodings(table, encodings).write_csv(writer),
            Stage::Rendered(bytes) => {
                writer.write_all(bytes).context("Failed to write image")?;
                writer.flush().context("Failed to flush output")?;
                Ok(())
            }
        }
    }
}

/// Execute every step in order against `table`
pub fn run_pipeline(pipeline: &Pipeline, table: Table, config: &StyleConfig, options: &RenderOptions) -> Result<Stage> {
    info!(steps = pipeline.steps.len(), records = table.len(), "running pipeline");

    let mut stage = Stage::Table(table);
    for (i, step) in pipeline.steps.iter().enumerate() {
        debug!(step = step.name(), input = stage.kind(), "applying step");
        stage = apply_step(step, stage, config, options)
            .with_context(|| format!("Step {} ({}) failed", i + 1, step.name()))?;
    }
    Ok(stage)
}

fn apply_step(step: &Step, stage: Stage, config: &StyleConfig, options: &RenderOptions) -> Result<Stage> {
    match (step, stage) {
        (Step::Remap { field, map }, Stage::Table(table)) => {
            let category_map = config.category_map(map.as_deref().unwrap_or(field))?;
            Ok(Stage::Table(transform::remap_categories(&table, field, category_map)?))
        }
        (Step::FillNull { field, value }, Stage::Table(mut table)) => {
            transform::fill_nulls(&mut table, field, value)?;
            Ok(Stage::Table(table))
        }
        (Step::Bucket { field, into, rules }, Stage::Table(table)) => {
            let rules = config.bucket_rules(rules.as_deref().unwrap_or(into))?;
            Ok(Stage::Table(transform::bucket(&table, field, into, rules)?))
        }
        (Step::DropNull { field }, Stage::Table(table)) => Ok(Stage::Table(transform::drop_nulls(&table, field)?)),
        (Step::Summarize { by, reductions }, Stage::Table(table)) => {
            let summary = aggregate::summarize(&table, by, reductions)?;
            debug!(groups = summary.rows.len(), "summarized");
            Ok(Stage::Summary(summary))
        }
        (Step::Sort { by, order }, Stage::Summary(mut summary)) => {
            summary.sort_by(by, *order)?;
            Ok(Stage::Summary(summary))
        }
        (Step::Color(color), Stage::Table(table)) => apply_color(color, table, config),
        (Step::Fill(fill), Stage::Table(table)) => apply_fill(fill, table, config),
        (Step::Bar(bar), Stage::Summary(summary)) => apply_bar(bar, &summary, config, options),
        (Step::Map(map), Stage::Encoded { table, encodings }) => apply_map(map, &table, Some(encodings.as_slice()), options),
        (Step::Map(map), Stage::Table(table)) => apply_map(map, &table, None, options),
        (step, stage) => bail!("'{}' cannot be applied to {}", step.name(), stage.kind()),
    }
}

fn apply_color(step: &ColorStep, table: Table, config: &StyleConfig) -> Result<Stage> {
    let auto;
    let colors: &ColorMap = match &step.palette {
        Some(name) => config
            .color_map(name)
            .with_context(|| format!("No color map named '{}' in style configuration", name))?,
        None => match config.color_map(&step.field) {
            Some(map) => map,
            None => {
                debug!(field = %step.field, "no configured color map; assigning palette");
                auto = encode::auto_color_map(&table, &step.field)?;
                &auto
            }
        },
    };

    let encodings = encode::encode_categorical(&table, &step.field, colors)?;
    Ok(Stage::Encoded { table, encodings })
}

fn apply_fill(step: &FillStep, table: Table, config: &StyleConfig) -> Result<Stage> {
    let ramp = config.ramp(step.ramp.as_deref().unwrap_or(DEFAULT_RAMP))?;
    let mut encoder = ContinuousEncoder::new(ramp).with_normalization(step.norm);
    if let Some(per_unit) = step.elevation {
        encoder = encoder.with_elevation(per_unit);
    }
    let encodings = encoder.encode(&table, &step.field)?;
    Ok(Stage::Encoded { table, encodings })
}

fn apply_bar(step: &BarStep, summary: &SummaryTable, config: &StyleConfig, options: &RenderOptions) -> Result<Stage> {
    let colors = match &step.palette {
        Some(name) => Some(
            config
                .color_map(name)
                .with_context(|| format!("No color map named '{}' in style configuration", name))?,
        ),
        None => config.color_map(&summary.group_field),
    };
    let bytes = graph::render_summary_bars(summary, &step.y, colors, step.title.as_deref(), options)?;
    Ok(Stage::Rendered(bytes))
}

fn apply_map(
    step: &MapStep,
    table: &Table,
    encodings: Option<&[VisualEncoding]>,
    options: &RenderOptions,
) -> Result<Stage> {
    let locate = Locator::new(table, step.lon.as_deref(), step.lat.as_deref())?;
    let size = step.size.unwrap_or(DEFAULT_POINT_SIZE).max(1.0).round() as u32;

    let mut points = Vec::with_capacity(table.len());
    let mut unlocated = 0usize;
    for row in 0..table.len() {
        let Some((x, y)) = locate.position(table, row)? else {
            unlocated += 1;
            continue;
        };
        let color = encodings
            .and_then(|e| e.get(row))
            .map(|e| e.color)
            .unwrap_or_else(|| POINT_COLOR.opaque());
        points.push(MapPoint { x, y, color, size });
    }

    if unlocated > 0 {
        warn!(unlocated, "records without a location were not drawn");
    }
    let bytes = graph::render_point_map(&points, step.title.as_deref(), options)?;
    Ok(Stage::Rendered(bytes))
}

/// Where a record's position comes from
enum Locator {
    Fields { lon: usize, lat: usize, lon_name: String, lat_name: String },
    Geometry,
}

impl Locator {
    /// Explicit lon/lat fields win; then point geometry; then well-known coordinate columns
    fn new(table: &Table, lon: Option<&str>, lat: Option<&str>) -> Result<Self> {
        match (lon, lat) {
            (Some(lon), Some(lat)) => return Self::fields(table, lon, lat),
            (None, None) => {}
            _ => bail!("map needs both lon: and lat: when either is given"),
        }

        if table.records.iter().any(|r| r.geometry.as_ref().and_then(|g| g.as_point()).is_some()) {
            return Ok(Locator::Geometry);
        }

        match (find_column(table, &LON_FIELDS), find_column(table, &LAT_FIELDS)) {
            (Some(lon), Some(lat)) => Self::fields(table, lon, lat),
            // Nothing to locate by; every record is skipped
            _ => Ok(Locator::Geometry),
        }
    }

    fn fields(table: &Table, lon: &str, lat: &str) -> Result<Self> {
        Ok(Locator::Fields {
            lon: table.column_index(lon)?,
            lat: table.column_index(lat)?,
            lon_name: lon.to_string(),
            lat_name: lat.to_string(),
        })
    }

    fn position(&self, table: &Table, row: usize) -> Result<Option<(f64, f64)>> {
        let record = &table.records[row];
        match self {
            Locator::Geometry => Ok(record.geometry.as_ref().and_then(|g| g.as_point())),
            Locator::Fields { lon, lat, lon_name, lat_name } => {
                let x = record.values[*lon].numeric(lon_name, row)?;
                let y = record.values[*lat].numeric(lat_name, row)?;
                Ok(x.zip(y))
            }
        }
    }
}

/// First of `names` present in the table
fn find_column<'a>(table: &Table, names: &[&'a str]) -> Option<&'a str> {
    names.iter().copied().find(|n| table.has_column(n))
}
