//! Library-level checks of the cleaning, summary and encoding stages

use parcelmap::aggregate::{summarize, Reducer, Reduction};
use parcelmap::config::StyleConfig;
use parcelmap::data::{Record, Table, Value};
use parcelmap::encode::{encode_categorical, ContinuousEncoder};
use parcelmap::palette::UNKNOWN_LABEL;
use parcelmap::scale::Normalization;
use parcelmap::transform::{bucket, fill_nulls, remap_categories};

fn table(headers: &[&str], rows: Vec<Vec<Value>>) -> Table {
    Table::new(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.into_iter().map(|values| Record { geometry: None, values }).collect(),
    )
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// A few tables with mixed codes, nulls and values
fn sample_tables() -> Vec<Table> {
    vec![
        table(
            &["land_use", "lot_area"],
            vec![
                vec![Value::Int(1), Value::Int(10)],
                vec![Value::Int(2), Value::Null],
                vec![Value::Null, Value::Int(4)],
                vec![Value::Int(42), Value::Float(2.5)],
            ],
        ),
        table(&["land_use", "lot_area"], vec![]),
        table(
            &["land_use", "lot_area"],
            vec![
                vec![text("7"), Value::Int(-3)],
                vec![text("Residential"), Value::Int(8)],
                vec![Value::Null, Value::Null],
            ],
        ),
    ]
}

#[test]
fn test_remap_yields_label_or_passthrough() {
    let config = StyleConfig::builtin().unwrap();
    let map = config.category_map("land_use").unwrap();

    for t in sample_tables() {
        let before = t.column("land_use").unwrap().into_iter().cloned().collect::<Vec<_>>();
        let after = remap_categories(&t, "land_use", map).unwrap();
        for (old, new) in before.iter().zip(after.column("land_use").unwrap()) {
            match new.label() {
                None => assert!(old.is_null()),
                Some(label) => assert!(
                    map.contains_label(&label) || Some(label.clone()) == old.label(),
                    "'{}' is neither a mapped label nor the original code",
                    label
                ),
            }
        }
    }
}

#[test]
fn test_fill_leaves_no_nulls_and_keeps_values() {
    for mut t in sample_tables() {
        let before: Vec<Value> = t.column("land_use").unwrap().into_iter().cloned().collect();
        let non_null_before = before.iter().filter(|v| !v.is_null()).count();

        fill_nulls(&mut t, "land_use", UNKNOWN_LABEL).unwrap();

        assert_eq!(t.null_count("land_use").unwrap(), 0);
        let unchanged = before
            .iter()
            .zip(t.column("land_use").unwrap())
            .filter(|(b, a)| b == a)
            .count();
        assert_eq!(unchanged, non_null_before);
    }
}

#[test]
fn test_sum_is_preserved_by_grouping() {
    for t in sample_tables() {
        let summary = summarize(&t, "land_use", &[Reduction::new("lot_area", Reducer::Sum)]).unwrap();
        let grouped: f64 = summary.rows.iter().map(|r| r.values[0]).sum();

        let expected: f64 = t
            .records
            .iter()
            .filter(|r| !r.values[0].is_null())
            .filter_map(|r| r.values[1].numeric("lot_area", 0).unwrap())
            .sum();
        assert!((grouped - expected).abs() < 1e-9, "{} != {}", grouped, expected);
    }
}

#[test]
fn test_bucketing_partitions_records() {
    let config = StyleConfig::builtin().unwrap();
    let rules = config.bucket_rules("era").unwrap();
    let labels = rules.labels();

    let years = vec![
        Value::Null,
        Value::Int(1066),
        Value::Int(1899),
        Value::Int(1900),
        Value::Int(1949),
        Value::Int(1950),
        Value::Float(1999.5),
        Value::Int(2000),
        Value::Int(2001),
        Value::Int(2024),
    ];
    let t = table(&["year_built"], years.into_iter().map(|v| vec![v]).collect());
    let out = bucket(&t, "year_built", "era", rules).unwrap();

    for value in out.column("era").unwrap() {
        let label = value.label().unwrap();
        assert_eq!(labels.iter().filter(|l| **l == label).count(), 1);
    }
}

#[test]
fn test_unmapped_labels_get_unknown_color() {
    let config = StyleConfig::builtin().unwrap();
    let colors = config.color_map("land_use").unwrap();
    let t = table(
        &["land_use"],
        vec![vec![text("Spaceport")], vec![Value::Null], vec![text("Commercial")]],
    );

    let enc = encode_categorical(&t, "land_use", colors).unwrap();
    assert_eq!(enc.len(), t.len());
    assert_eq!(enc[0].color, colors.unknown.opaque());
    assert_eq!(enc[1].color, colors.unknown.opaque());
    assert_ne!(enc[2].color, colors.unknown.opaque());
}

#[test]
fn test_continuous_normalized_in_unit_range() {
    let config = StyleConfig::builtin().unwrap();
    let ramp = config.ramp("viridis").unwrap();
    let t = table(
        &["floors"],
        vec![
            vec![Value::Int(3)],
            vec![Value::Int(1)],
            vec![Value::Null],
            vec![Value::Int(12)],
            vec![Value::Float(6.5)],
        ],
    );

    for norm in [Normalization::Linear, Normalization::Log] {
        let enc = ContinuousEncoder::new(ramp).with_normalization(norm).encode(&t, "floors").unwrap();
        for e in enc.iter().filter_map(|e| e.normalized) {
            assert!((0.0..=1.0).contains(&e));
        }
        assert_eq!(enc[1].normalized, Some(0.0));
        assert_eq!(enc[3].normalized, Some(1.0));
        assert_eq!(enc[2].normalized, None);
    }
}

#[test]
fn test_scenario_group_sums_independent_of_order() {
    let mut rows = vec![
        vec![text("A"), Value::Int(10)],
        vec![text("A"), Value::Int(20)],
        vec![text("A"), Value::Int(30)],
        vec![text("B"), Value::Int(5)],
        vec![text("C"), Value::Int(100)],
    ];

    for _ in 0..rows.len() {
        let t = table(&["category", "lot_area"], rows.clone());
        let summary = summarize(&t, "category", &[Reduction::new("lot_area", Reducer::Sum)]).unwrap();
        assert_eq!(summary.rows.len(), 3);
        assert_eq!(summary.value("A", "lot_area_sum"), Some(60.0));
        assert_eq!(summary.value("B", "lot_area_sum"), Some(5.0));
        assert_eq!(summary.value("C", "lot_area_sum"), Some(100.0));
        rows.rotate_left(1);
    }
}

#[test]
fn test_scenario_year_built_eras() {
    let config = StyleConfig::builtin().unwrap();
    let t = table(
        &["year_built"],
        vec![vec![Value::Int(1899)], vec![Value::Int(1950)], vec![Value::Int(2001)]],
    );
    let out = bucket(&t, "year_built", "era", config.bucket_rules("era").unwrap()).unwrap();
    let eras: Vec<String> = out.column("era").unwrap().iter().filter_map(|v| v.label()).collect();
    assert_eq!(eras, vec!["Pre-1900", "1950-2000", "Post-2000"]);
}
