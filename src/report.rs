// src/report.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    util::pretty::pretty_format_batches,
};
use std::sync::Arc;

use crate::ratio::{JoinedTable, LogLogFit, NationalSummary, StateSummary};

fn ratio_fields() -> Vec<Field> {
    vec![
        Field::new("white_on_black", DataType::UInt64, false),
        Field::new("black_on_white", DataType::UInt64, false),
        Field::new("white_pop", DataType::UInt64, true),
        Field::new("black_pop", DataType::UInt64, true),
        Field::new("incidents_ratio", DataType::Float64, true),
        Field::new("pop_ratio", DataType::Float64, true),
    ]
}

/// The per-county joined table as one Arrow batch; "not available" becomes null.
pub fn county_batch(table: &JoinedTable) -> Result<RecordBatch> {
    let mut fields = vec![
        Field::new("state", DataType::Utf8, false),
        Field::new("county", DataType::Utf8, false),
        Field::new("county_name", DataType::Utf8, true),
    ];
    fields.extend(ratio_fields());

    let rows = &table.rows;
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.key.state()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.key.county()))),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.county_name.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.counts.white_on_black))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.counts.black_on_white))),
        Arc::new(UInt64Array::from(
            rows.iter().map(|r| r.population.map(|p| p.white)).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            rows.iter().map(|r| r.population.map(|p| p.black)).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.ratios.incidents).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.ratios.population).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building county batch")
}

pub fn state_batch(states: &[StateSummary]) -> Result<RecordBatch> {
    let mut fields = vec![
        Field::new("state", DataType::Utf8, false),
        Field::new("state_name", DataType::Utf8, true),
    ];
    fields.extend(ratio_fields());

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(states.iter().map(|s| s.state_fips.as_str()))),
        Arc::new(StringArray::from(
            states.iter().map(|s| s.name.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from_iter_values(states.iter().map(|s| s.counts.white_on_black))),
        Arc::new(UInt64Array::from_iter_values(states.iter().map(|s| s.counts.black_on_white))),
        Arc::new(UInt64Array::from(
            states.iter().map(|s| s.population.map(|p| p.white)).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            states.iter().map(|s| s.population.map(|p| p.black)).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            states.iter().map(|s| s.ratios.incidents).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            states.iter().map(|s| s.ratios.population).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building state batch")
}

pub fn format_batch(batch: &RecordBatch) -> Result<String> {
    Ok(pretty_format_batches(std::slice::from_ref(batch))
        .context("formatting batch")?
        .to_string())
}

fn fmt_ratio(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "n/a".to_string(), |r| format!("{:.4}", r))
}

pub fn national_line(national: &NationalSummary) -> String {
    format!(
        "USA: white on black {}, black on white {}, incidents ratio {}, pop ratio {}",
        national.counts.white_on_black,
        national.counts.black_on_white,
        fmt_ratio(national.ratios.incidents),
        fmt_ratio(national.ratios.population),
    )
}

pub fn fit_line(fit: Option<&LogLogFit>) -> String {
    match fit {
        Some(f) => format!(
            "log10(y) = {:.3} log10(x) + {:.3} over {} counties",
            f.slope, f.intercept, f.points
        ),
        None => "log10 fit: not enough plottable counties".to_string(),
    }
}
