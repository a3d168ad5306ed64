use tracing::debug;

use crate::data::{Table, Value};
use crate::error::Result;
use crate::palette::{CategoryPalette, ColorMap, ColorRamp, Rgba};
use crate::scale::{Domain, Normalization};

/// Visual encoding derived for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualEncoding {
    pub color: Rgba,
    /// Extrusion height (continuous mode with an elevation scale only)
    pub elevation: Option<f64>,
    /// Position on the ramp (continuous mode only)
    pub normalized: Option<f64>,
}

impl VisualEncoding {
    fn categorical(color: Rgba) -> Self {
        Self { color, elevation: None, normalized: None }
    }
}

/// One color per record from a label lookup. Nulls and unmapped labels get the Unknown color.
pub fn encode_categorical(table: &Table, field: &str, colors: &ColorMap) -> Result<Vec<VisualEncoding>> {
    let idx = table.column_index(field)?;
    Ok(table
        .records
        .iter()
        .map(|r| {
            let label = r.values[idx].label();
            VisualEncoding::categorical(colors.lookup(label.as_deref()).opaque())
        })
        .collect())
}

/// Color map built from the distinct labels of `field` when none is configured
pub fn auto_color_map(table: &Table, field: &str) -> Result<ColorMap> {
    let labels: Vec<String> = table
        .column(field)?
        .into_iter()
        .filter_map(|v| v.label())
        .collect();
    Ok(CategoryPalette::category10().assign(&labels))
}

/// Continuous numeric field → normalized ramp color (+ optional elevation)
#[derive(Debug, Clone)]
pub struct ContinuousEncoder<'a> {
    pub normalization: Normalization,
    pub ramp: &'a ColorRamp,
    /// Height per unit of the raw value, e.g. meters per floor
    pub elevation_scale: Option<f64>,
    /// Color given to records with no value
    pub null_color: Rgba,
}

impl<'a> ContinuousEncoder<'a> {
    pub fn new(ramp: &'a ColorRamp) -> Self {
        Self {
            normalization: Normalization::Linear,
            ramp,
            elevation_scale: None,
            null_color: Rgba::TRANSPARENT,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_elevation(mut self, per_unit: f64) -> Self {
        self.elevation_scale = Some(per_unit);
        self
    }

    pub fn with_null_color(mut self, color: Rgba) -> Self {
        self.null_color = color;
        self
    }

    /// Encode every record of `field`. Nulls are excluded from the domain and get `null_color`.
    pub fn encode(&self, table: &Table, field: &str) -> Result<Vec<VisualEncoding>> {
        let idx = table.column_index(field)?;
        let raw = table
            .records
            .iter()
            .enumerate()
            .map(|(row, r)| r.values[idx].numeric(field, row))
            .collect::<Result<Vec<Option<f64>>>>()?;

        let domain = Domain::from_values(raw.iter().flatten().copied(), self.normalization);
        let nulls = raw.iter().filter(|v| v.is_none()).count();
        debug!(field, ?domain, nulls, "continuous encoding domain");

        Ok(raw
            .into_iter()
            .map(|value| match (value, domain) {
                (Some(v), Some(domain)) => {
                    let t = domain.normalize(v);
                    VisualEncoding {
                        color: self.ramp.interpolate(t).opaque(),
                        elevation: self.elevation_scale.map(|k| v * k),
                        normalized: Some(t),
                    }
                }
                _ => VisualEncoding {
                    color: self.null_color,
                    elevation: None,
                    normalized: None,
                },
            })
            .collect())
    }
}

/// Table with `color`, `alpha`, `normalized` and `elevation` columns appended
pub fn attach_encodings(table: &Table, encodings: &[VisualEncoding]) -> Table {
    let optional = |v: Option<f64>| v.map(Value::Float).unwrap_or(Value::Null);
    table
        .with_column("color", encodings.iter().map(|e| Value::Text(e.color.rgb().to_string())).collect())
        .with_column("alpha", encodings.iter().map(|e| Value::Int(e.color.3 as i64)).collect())
        .with_column("normalized", encodings.iter().map(|e| optional(e.normalized)).collect())
        .with_column("elevation", encodings.iter().map(|e| optional(e.elevation)).collect())
}
