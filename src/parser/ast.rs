// Abstract syntax tree for the parcel pipeline DSL

use crate::aggregate::{Reduction, SortOrder};
use crate::scale::Normalization;

/// A parsed `step | step | ...` program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace codes by labels using a named category map (defaults to the field name)
    Remap { field: String, map: Option<String> },
    FillNull { field: String, value: String },
    /// Classify `field` into a new `into` column with named rules (defaults to `into`)
    Bucket {
        field: String,
        into: String,
        rules: Option<String>,
    },
    DropNull { field: String },
    Summarize {
        by: String,
        reductions: Vec<Reduction>,
    },
    Sort { by: String, order: SortOrder },
    Color(ColorStep),
    Fill(FillStep),
    Bar(BarStep),
    Map(MapStep),
}

impl Step {
    /// DSL keyword, used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Step::Remap { .. } => "remap",
            Step::FillNull { .. } => "fill_null",
            Step::Bucket { .. } => "bucket",
            Step::DropNull { .. } => "drop_null",
            Step::Summarize { .. } => "summarize",
            Step::Sort { .. } => "sort",
            Step::Color(_) => "color",
            Step::Fill(_) => "fill",
            Step::Bar(_) => "bar",
            Step::Map(_) => "map",
        }
    }
}

/// Categorical encoding
#[derive(Debug, Clone, PartialEq)]
pub struct ColorStep {
    pub field: String,
    /// Named color map; the field name is tried first, then an automatic palette
    pub palette: Option<String>,
}

/// Continuous encoding
#[derive(Debug, Clone, PartialEq)]
pub struct FillStep {
    pub field: String,
    pub norm: Normalization,
    pub ramp: Option<String>,
    /// Height per unit of the field value
    pub elevation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarStep {
    pub y: String,
    pub palette: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapStep {
    pub lon: Option<String>,
    pub lat: Option<String>,
    pub size: Option<f64>,
    pub title: Option<String>,
}
