//! Export per-unit weights and simulated tables to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts: one row per unit per weighting method, ids and categorical levels
//! quoted by the `csv` writer when needed.

use std::fs::File;
use std::path::Path;

use crate::domain::{CovariateValue, UnitTable, WeightSet};
use crate::error::AppError;

pub const WEIGHTS_HEADER: [&str; 9] = [
    "id",
    "method",
    "exposure",
    "outcome",
    "bin",
    "numerator",
    "denominator",
    "weight",
    "positivity_violation",
];

fn create_writer(path: &Path, what: &str) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create {what} '{}': {e}", path.display())))
}

/// Write every weight set to one long-format CSV file.
pub fn write_weights_csv(path: &Path, table: &UnitTable, sets: &[WeightSet]) -> Result<(), AppError> {
    let mut writer = create_writer(path, "weights CSV")?;
    write_weights(&mut writer, table, sets)?;
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to write weights CSV: {e}")))
}

fn write_weights<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    table: &UnitTable,
    sets: &[WeightSet],
) -> Result<(), AppError> {
    writer
        .write_record(WEIGHTS_HEADER)
        .map_err(|e| AppError::input(format!("Failed to write weights CSV header: {e}")))?;

    for set in sets {
        if set.weights.len() != table.len() {
            return Err(AppError::fit(format!(
                "{} has {} weights for {} units.",
                set.method.display_name(),
                set.weights.len(),
                table.len()
            )));
        }
        let method = method_label(set);
        for (i, (unit, w)) in table.units().iter().zip(&set.weights).enumerate() {
            let bin = set
                .bins
                .as_ref()
                .map(|b| b[i].to_string())
                .unwrap_or_default();
            writer
                .write_record([
                    unit.id.clone(),
                    method.clone(),
                    format!("{:.6}", unit.exposure),
                    unit.outcome.to_string(),
                    bin,
                    format!("{:.10e}", w.numerator),
                    format!("{:.10e}", w.denominator),
                    fmt_weight(w.value),
                    u8::from(w.is_positivity_violation()).to_string(),
                ])
                .map_err(|e| AppError::input(format!("Failed to write weights CSV row: {e}")))?;
        }
    }
    Ok(())
}

/// Write a unit table with the given exposure/outcome column names.
pub fn write_units_csv(
    path: &Path,
    table: &UnitTable,
    exposure_column: &str,
    outcome_column: &str,
) -> Result<(), AppError> {
    let mut writer = create_writer(path, "units CSV")?;

    let mut header = vec![
        "id".to_string(),
        exposure_column.to_string(),
        outcome_column.to_string(),
    ];
    header.extend(table.schema().iter().map(|s| s.name.clone()));
    writer
        .write_record(&header)
        .map_err(|e| AppError::input(format!("Failed to write units CSV header: {e}")))?;

    for unit in table.units() {
        let mut row = vec![
            unit.id.clone(),
            format!("{:.6}", unit.exposure),
            unit.outcome.to_string(),
        ];
        row.extend(unit.covariates.iter().map(|v| match v {
            CovariateValue::Continuous(x) => format!("{x:.6}"),
            CovariateValue::Categorical(level) => level.clone(),
        }));
        writer
            .write_record(&row)
            .map_err(|e| AppError::input(format!("Failed to write units CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to write units CSV: {e}")))
}

fn method_label(set: &WeightSet) -> String {
    match set.method {
        crate::domain::WeightMethod::Normal => "normal".to_string(),
        crate::domain::WeightMethod::QuantileBin => "quantile-bin".to_string(),
    }
}

fn fmt_weight(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.10}")
    } else {
        "inf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CovariateSpec, StabilizedWeight, Unit, WeightMethod};

    fn table() -> UnitTable {
        let units = vec![
            Unit {
                id: "a,1".into(),
                exposure: 120.0,
                outcome: 0,
                covariates: vec![CovariateValue::Categorical("f".into())],
            },
            Unit {
                id: "b".into(),
                exposure: 135.5,
                outcome: 1,
                covariates: vec![CovariateValue::Categorical("m".into())],
            },
        ];
        UnitTable::new(vec![CovariateSpec::categorical("sex")], units).unwrap()
    }

    #[test]
    fn weights_rows_are_long_format() {
        let t = table();
        let normal = WeightSet::new(
            WeightMethod::Normal,
            vec![StabilizedWeight::from_ratio(0.02, 0.04), StabilizedWeight::from_ratio(0.02, 0.0)],
            None,
        );
        let binned = WeightSet::new(
            WeightMethod::QuantileBin,
            vec![StabilizedWeight::from_ratio(0.5, 0.5), StabilizedWeight::from_ratio(0.5, 0.25)],
            Some(vec![1, 2]),
        );

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_weights(&mut writer, &t, &[normal, binned]).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], WEIGHTS_HEADER.join(","));
        assert!(lines[1].starts_with("\"a,1\",normal,120.000000,0,,"));
        assert!(lines[1].ends_with(",0.5000000000,0"));
        assert!(lines[2].ends_with(",inf,1"));
        assert!(lines[4].starts_with("b,quantile-bin,135.500000,1,2,"));
        assert!(lines[4].ends_with(",2.0000000000,0"));
    }

    #[test]
    fn mismatched_weight_count_is_rejected() {
        let t = table();
        let short = WeightSet::new(WeightMethod::Normal, vec![StabilizedWeight::from_ratio(1.0, 1.0)], None);
        let mut writer = csv::Writer::from_writer(Vec::new());
        assert!(write_weights(&mut writer, &t, &[short]).is_err());
    }

    #[test]
    fn units_csv_round_trips_through_ingest() {
        let t = table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.csv");
        write_units_csv(&path, &t, "sbp", "death").unwrap();

        let columns = crate::io::ColumnSpec {
            id: Some("id".into()),
            exposure: "sbp".into(),
            outcome: "death".into(),
            covariates: t.schema().to_vec(),
        };
        let back = crate::io::read_units(File::open(&path).unwrap(), &columns).unwrap();
        assert_eq!(back.table.units(), t.units());
    }
}
