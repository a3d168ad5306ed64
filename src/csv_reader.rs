use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use crate::data::{Geometry, Record, Table, Value};

/// Header names treated as the geometry column
const GEOMETRY_HEADERS: [&str; 3] = ["geometry", "the_geom", "wkt"];

/// Read a parcel table from stdin (CSV)
pub fn read_table_from_stdin() -> Result<Table> {
    read_table(io::stdin().lock())
}

/// Read a parcel table from a file, choosing the format by extension
pub fn read_table_from_path(path: &Path) -> Result<Table> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("geojson"))
        .unwrap_or(false);

    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;

    let table = if is_json {
        let value: serde_json::Value = serde_json::from_reader(io::BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON from '{}'", path.display()))?;
        Table::from_json(&value)?
    } else {
        read_table(file)?
    };

    debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "loaded parcel table"
    );
    Ok(table)
}

/// Read CSV with a header row. A geometry column (WKT) is lifted out of the scalar fields.
pub fn read_table<R: Read>(reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let raw_headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.is_empty()) {
        anyhow::bail!("CSV must have a header row");
    }

    let geometry_idx = raw_headers
        .iter()
        .position(|h| GEOMETRY_HEADERS.iter().any(|g| h.eq_ignore_ascii_case(g)));

    let headers: Vec<String> = raw_headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != geometry_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut records = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read CSV row {}", row_idx + 1))?;

        let mut geometry = None;
        let mut values = Vec::with_capacity(headers.len());
        for (i, cell) in row.iter().enumerate() {
            if Some(i) == geometry_idx {
                geometry = Geometry::from_wkt(cell);
            } else {
                values.push(Value::parse_cell(cell));
            }
        }
        records.push(Record { geometry, values });
    }

    Ok(Table::new(headers, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_table_basic() {
        let csv = "pid,land_use,lot_area\nA1,1,10.5\nA2,,20\n";
        let table = read_table(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["pid", "land_use", "lot_area"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].values[1], Value::Int(1));
        assert_eq!(table.records[1].values[1], Value::Null);
        assert_eq!(table.records[1].values[2], Value::Int(20));
    }

    #[test]
    fn test_read_table_lifts_geometry() {
        let csv = "pid,geometry\nA1,POINT (3 4)\nA2,\n";
        let table = read_table(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["pid"]);
        assert_eq!(table.records[0].geometry, Some(Geometry::Point { x: 3.0, y: 4.0 }));
        assert_eq!(table.records[1].geometry, None);
    }

    #[test]
    fn test_read_table_headers_only() {
        let table = read_table("pid,lot_area\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn test_read_table_ragged_rows_fail() {
        let result = read_table("a,b\n1,2,3\n".as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_read_table_from_geojson_path() {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","geometry":null,"properties":{{"pid":"A1"}}}}]}}"#
        )
        .unwrap();
        let table = read_table_from_path(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.headers, vec!["pid"]);
    }

    #[test]
    fn test_read_table_missing_file() {
        let err = read_table_from_path(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
