use anyhow::Context;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::data::Table;
use crate::error::{ParcelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Count,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Count => "count",
        })
    }
}

/// One (field, reducer) pair; sum and mean need numeric values
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub field: String,
    pub reducer: Reducer,
}

impl Reduction {
    pub fn new(field: impl Into<String>, reducer: Reducer) -> Self {
        Self { field: field.into(), reducer }
    }

    /// Summary column name, e.g. `lot_area_sum`
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.field, self.reducer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("Unknown sort order '{}' (expected \"asc\" or \"desc\")", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key: String,
    pub values: Vec<f64>,
}

/// One row per distinct group value, one column per reduction
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub group_field: String,
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

/// Group `table` by `group_field` and reduce each requested field per group.
///
/// Records with a null group value are skipped. Row order follows first
/// appearance and is not a contract; use [`SummaryTable::sort_by`].
pub fn summarize(table: &Table, group_field: &str, reductions: &[Reduction]) -> Result<SummaryTable> {
    let group_idx = table.column_index(group_field)?;
    let field_idx = reductions
        .iter()
        .map(|r| table.column_index(&r.field))
        .collect::<Result<Vec<usize>>>()?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Accumulator>> = HashMap::new();

    for (row, record) in table.records.iter().enumerate() {
        let Some(key) = record.values[group_idx].label() else {
            continue;
        };

        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        let accs = groups
            .entry(key)
            .or_insert_with(|| reductions.iter().map(|_| Accumulator::default()).collect());

        for (acc, (reduction, &idx)) in accs.iter_mut().zip(reductions.iter().zip(&field_idx)) {
            let value = &record.values[idx];
            match reduction.reducer {
                // Any non-null value counts, numeric or not
                Reducer::Count => {
                    if !value.is_null() {
                        acc.count += 1;
                    }
                }
                Reducer::Sum | Reducer::Mean => {
                    if let Some(v) = value.numeric(&reduction.field, row)? {
                        acc.sum += v;
                        acc.count += 1;
                    }
                }
            }
        }
    }

    let rows = order
        .into_iter()
        .map(|key| {
            let accs = groups.remove(&key).unwrap_or_default();
            let values = accs
                .iter()
                .zip(reductions)
                .map(|(acc, reduction)| match reduction.reducer {
                    Reducer::Sum => acc.sum,
                    Reducer::Mean if acc.count == 0 => f64::NAN,
                    Reducer::Mean => acc.sum / acc.count as f64,
                    Reducer::Count => acc.count as f64,
                })
                .collect();
            SummaryRow { key, values }
        })
        .collect();

    Ok(SummaryTable {
        group_field: group_field.to_string(),
        columns: reductions.iter().map(Reduction::output_name).collect(),
        rows,
    })
}

impl SummaryTable {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| ParcelError::ColumnNotFound(name.to_string()))
    }

    pub fn row(&self, key: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn value(&self, key: &str, column: &str) -> Option<f64> {
        let idx = self.column_index(column).ok()?;
        self.row(key).map(|r| r.values[idx])
    }

    pub fn keys(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.key.as_str()).collect()
    }

    /// Sort rows by a reduced column. NaN sorts last in either order.
    pub fn sort_by(&mut self, column: &str, order: SortOrder) -> Result<()> {
        let idx = self.column_index(column)?;
        self.rows.sort_by(|a, b| {
            let (x, y) = (a.values[idx], b.values[idx]);
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                    match order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    }
                }
            }
        });
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec![self.group_field.clone()];
        header.extend(self.columns.iter().cloned());
        out.write_record(&header).context("Failed to write CSV header")?;

        for row in &self.rows {
            let mut cells = vec![row.key.clone()];
            cells.extend(row.values.iter().map(|v| v.to_string()));
            out.write_record(&cells).context("Failed to write CSV row")?;
        }
        out.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}
