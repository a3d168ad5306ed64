use anyhow::{anyhow, Context};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::io::Write;

use crate::error::{ParcelError, Result};

/// A single nullable cell of a parcel table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Type a raw CSV cell: empty → Null, then integer, float, text
    pub fn parse_cell(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Text(trimmed.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Category label for lookups. None for Null.
    pub fn label(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    /// Numeric view of the cell. `Ok(None)` for Null (and NaN), error for non-numeric text.
    pub fn numeric(&self, field: &str, row: usize) -> Result<Option<f64>> {
        match self {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i as f64)),
            Value::Float(f) if f.is_nan() => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ParcelError::NotNumeric {
                    field: field.to_string(),
                    row: row + 1,
                    value: s.clone(),
                }),
        }
    }

    fn from_json(value: &Json) -> Value {
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Text(b.to_string()),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Record geometry. Only points are understood; everything else is carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Other(String),
}

impl Geometry {
    /// Parse WKT text, recognising `POINT (x y)` with an optional Z, M or ZM tag.
    /// Ordinates past x and y are ignored.
    pub fn from_wkt(text: &str) -> Option<Geometry> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let upper = trimmed.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("POINT") {
            let rest = rest.trim_start();
            let rest = ["ZM", "Z", "M"]
                .iter()
                .find_map(|tag| rest.strip_prefix(tag))
                .unwrap_or(rest);
            let inner = rest.trim().trim_start_matches('(').trim_end_matches(')');
            let coords: Option<Vec<f64>> = inner.split_whitespace().map(|c| c.parse::<f64>().ok()).collect();
            if let Some(&[x, y, ..]) = coords.as_deref() {
                return Some(Geometry::Point { x, y });
            }
        }
        Some(Geometry::Other(trimmed.to_string()))
    }

    /// Convert a GeoJSON geometry object
    pub fn from_geojson(value: &Json) -> Option<Geometry> {
        if value.is_null() {
            return None;
        }
        let is_point = value.get("type").and_then(|t| t.as_str()) == Some("Point");
        if is_point {
            let coords = value.get("coordinates").and_then(|c| c.as_array());
            if let Some(coords) = coords {
                let x = coords.first().and_then(|v| v.as_f64());
                let y = coords.get(1).and_then(|v| v.as_f64());
                if let (Some(x), Some(y)) = (x, y) {
                    return Some(Geometry::Point { x, y });
                }
            }
        }
        Some(Geometry::Other(value.to_string()))
    }

    pub fn as_point(&self) -> Option<(f64, f64)> {
        match self {
            Geometry::Point { x, y } => Some((*x, *y)),
            Geometry::Other(_) => None,
        }
    }

    fn to_wkt(&self) -> String {
        match self {
            Geometry::Point { x, y } => format!("POINT ({} {})", x, y),
            Geometry::Other(text) => text.clone(),
        }
    }
}

/// One parcel: optional geometry plus one value per table header
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub geometry: Option<Geometry>,
    pub values: Vec<Value>,
}

/// Ordered records sharing one schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(headers: Vec<String>, records: Vec<Record>) -> Self {
        Self { headers, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| ParcelError::ColumnNotFound(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_ok()
    }

    /// Values of one column in record order
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.records.iter().map(|r| &r.values[idx]).collect())
    }

    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.into_iter().filter(|v| v.is_null()).count())
    }

    /// New table with `name` replaced (or appended) by `values`
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Table {
        let mut table = self.clone();
        match self.column_index(name) {
            Ok(idx) => {
                for (record, value) in table.records.iter_mut().zip(values) {
                    record.values[idx] = value;
                }
            }
            Err(_) => {
                table.headers.push(name.to_string());
                for (record, value) in table.records.iter_mut().zip(values) {
                    record.values.push(value);
                }
            }
        }
        table
    }

    /// Build a table from a GeoJSON FeatureCollection or a JSON array of objects
    pub fn from_json(value: &Json) -> anyhow::Result<Self> {
        let rows: Vec<(Option<Geometry>, Option<&Map<String, Json>>)> =
            if let Some(features) = value.get("features").and_then(|f| f.as_array()) {
                features
                    .iter()
                    .enumerate()
                    .map(|(i, feature)| {
                        let geometry = feature.get("geometry").and_then(Geometry::from_geojson);
                        // Null or absent properties leave every field null
                        let props = match feature.get("properties") {
                            None | Some(Json::Null) => None,
                            Some(Json::Object(map)) => Some(map),
                            Some(_) => return Err(anyhow!("Feature {} properties must be an object", i + 1)),
                        };
                        Ok((geometry, props))
                    })
                    .collect::<anyhow::Result<_>>()?
            } else {
                let array = value
                    .as_array()
                    .ok_or_else(|| anyhow!("Input must be a FeatureCollection or a JSON array of objects"))?;
                array
                    .iter()
                    .map(|item| {
                        item.as_object()
                            .map(|obj| (None, Some(obj)))
                            .ok_or_else(|| anyhow!("Items in array must be objects"))
                    })
                    .collect::<anyhow::Result<_>>()?
            };

        let mut headers: Vec<String> = Vec::new();
        for props in rows.iter().filter_map(|(_, props)| *props) {
            for key in props.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let records = rows
            .into_iter()
            .map(|(geometry, props)| Record {
                geometry,
                values: headers
                    .iter()
                    .map(|h| props.and_then(|p| p.get(h)).map(Value::from_json).unwrap_or(Value::Null))
                    .collect(),
            })
            .collect();

        Ok(Self { headers, records })
    }

    /// Write as CSV; geometry goes to a trailing `geometry` column as WKT when any record has one
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let with_geometry = self.records.iter().any(|r| r.geometry.is_some());
        let mut out = csv::Writer::from_writer(writer);

        let mut header_row = self.headers.clone();
        if with_geometry {
            header_row.push("geometry".to_string());
        }
        out.write_record(&header_row).context("Failed to write CSV header")?;

        for record in &self.records {
            let mut row: Vec<String> = record.values.iter().map(|v| v.to_string()).collect();
            if with_geometry {
                row.push(record.geometry.as_ref().map(Geometry::to_wkt).unwrap_or_default());
            }
            out.write_record(&row).context("Failed to write CSV row")?;
        }
        out.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}
