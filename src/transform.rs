use tracing::debug;

use crate::config::{BucketRules, CategoryMap};
use crate::data::{Table, Value};
use crate::error::Result;

/// Replace raw codes in `field` by their labels. Unmapped codes and nulls pass through.
pub fn remap_categories(table: &Table, field: &str, map: &CategoryMap) -> Result<Table> {
    let idx = table.column_index(field)?;
    let mut remapped = 0usize;

    let values: Vec<Value> = table
        .records
        .iter()
        .map(|record| {
            let value = &record.values[idx];
            match value.label().as_deref().and_then(|code| map.get(code)) {
                Some(label) => {
                    remapped += 1;
                    Value::Text(label.to_string())
                }
                None => value.clone(),
            }
        })
        .collect();

    debug!(field, remapped, total = table.len(), "remapped category codes");
    Ok(table.with_column(field, values))
}

/// Fill nulls in `field` with `default`, in place. Returns how many cells were filled.
pub fn fill_nulls(table: &mut Table, field: &str, default: &str) -> Result<usize> {
    let idx = table.column_index(field)?;
    let mut filled = 0usize;

    for record in &mut table.records {
        if record.values[idx].is_null() {
            record.values[idx] = Value::Text(default.to_string());
            filled += 1;
        }
    }

    debug!(field, filled, "filled null values");
    Ok(filled)
}

/// Derive `target` from numeric `source` by evaluating ordered rules per record
pub fn bucket(table: &Table, source: &str, target: &str, rules: &BucketRules) -> Result<Table> {
    let idx = table.column_index(source)?;

    let values = table
        .records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let raw = record.values[idx].numeric(source, row)?;
            Ok(Value::Text(rules.classify(raw).to_string()))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(table.with_column(target, values))
}

/// Drop records whose `field` is null
pub fn drop_nulls(table: &Table, field: &str) -> Result<Table> {
    let idx = table.column_index(field)?;
    let records = table
        .records
        .iter()
        .filter(|r| !r.values[idx].is_null())
        .cloned()
        .collect();
    Ok(Table::new(table.headers.clone(), records))
}
