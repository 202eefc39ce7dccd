//! CSV ingest and complete-case filtering.
//!
//! This module is responsible for turning an analysis CSV into a clean
//! [`UnitTable`] that is safe to weight.
//!
//! Design goals:
//! - **Strict schema** for the named columns (clear errors + exit code 2)
//! - **Complete cases only**: a row missing the exposure, the outcome, or any
//!   covariate is excluded, never imputed, and reported
//! - **Deterministic behavior**: units keep file order

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use csv::StringRecord;

use crate::domain::{CovariateKind, CovariateSpec, CovariateValue, Unit, UnitTable, WeightConfig};
use crate::error::AppError;

/// Tokens read as a missing value (compared case-insensitively after trimming).
const MISSING_TOKENS: [&str; 6] = ["", "na", "nan", "null", ".", "n/a"];

/// Which CSV columns hold the id, exposure, outcome and covariates.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Optional id column; row numbers are used when absent.
    pub id: Option<String>,
    pub exposure: String,
    pub outcome: String,
    pub covariates: Vec<CovariateSpec>,
}

impl ColumnSpec {
    pub fn from_config(config: &WeightConfig) -> Self {
        Self {
            id: config.id_column.clone(),
            exposure: config.exposure_column.clone(),
            outcome: config.outcome_column.clone(),
            covariates: config.covariates.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIssue {
    /// A required field was empty or a missing-value token.
    Missing,
    /// A required field could not be parsed.
    Invalid,
}

/// A row excluded during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub issue: RowIssue,
    pub message: String,
}

/// Ingest output: complete-case table + excluded rows.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub table: UnitTable,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedData {
    pub fn rows_missing(&self) -> usize {
        self.row_errors.iter().filter(|e| e.issue == RowIssue::Missing).count()
    }

    pub fn rows_invalid(&self) -> usize {
        self.row_errors.iter().filter(|e| e.issue == RowIssue::Invalid).count()
    }
}

/// Load the CSV named in `config`.
pub fn load_units(config: &WeightConfig) -> Result<IngestedData, AppError> {
    let file = File::open(&config.csv_path).map_err(|e| {
        AppError::input(format!(
            "Failed to open CSV '{}': {e}",
            config.csv_path.display()
        ))
    })?;
    read_units(file, &ColumnSpec::from_config(config))
}

/// Read units from any CSV source.
pub fn read_units<R: Read>(source: R, columns: &ColumnSpec) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    ensure_columns_exist(columns, &header_map)?;

    let mut units = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    issue: RowIssue::Invalid,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = match &columns.id {
            Some(col) => get_field(&record, &header_map, col)
                .filter(|s| !is_missing(s))
                .map(str::to_string)
                .unwrap_or_else(|| format!("row-{line}")),
            None => format!("row-{line}"),
        };

        match parse_unit(&record, &header_map, columns, id.clone()) {
            Ok(unit) => units.push(unit),
            Err((issue, message)) => row_errors.push(RowError {
                line,
                id: Some(id),
                issue,
                message,
            }),
        }
    }

    let rows_used = units.len();
    if rows_used == 0 {
        return Err(AppError::insufficient(
            "No complete rows remain after excluding missing/invalid values.",
        ));
    }
    if !row_errors.is_empty() {
        log::warn!(
            "Excluded {} of {rows_read} rows (missing or invalid values)",
            row_errors.len()
        );
    }

    let table = UnitTable::new(columns.covariates.clone(), units)?;
    Ok(IngestedData {
        table,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_columns_exist(columns: &ColumnSpec, header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let mut required: Vec<&str> = vec![columns.exposure.as_str(), columns.outcome.as_str()];
    if let Some(id) = &columns.id {
        required.push(id.as_str());
    }
    required.extend(columns.covariates.iter().map(|c| c.name.as_str()));

    let missing: Vec<&str> = required
        .into_iter()
        .filter(|name| !header_map.contains_key(&normalize_header_name(name)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::input(format!(
            "Missing required column(s): {}",
            missing
                .iter()
                .map(|m| format!("`{m}`"))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

fn get_field<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    header_map
        .get(&normalize_header_name(name))
        .and_then(|&idx| record.get(idx))
}

fn is_missing(raw: &str) -> bool {
    let t = raw.trim();
    MISSING_TOKENS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

fn required_field<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, (RowIssue, String)> {
    match get_field(record, header_map, name) {
        Some(v) if !is_missing(v) => Ok(v),
        _ => Err((RowIssue::Missing, format!("Missing `{name}` value."))),
    }
}

fn parse_number(raw: &str, name: &str) -> Result<f64, (RowIssue, String)> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| (RowIssue::Invalid, format!("Invalid `{name}` value '{raw}'.")))
}

fn parse_outcome(raw: &str, name: &str) -> Result<u8, (RowIssue, String)> {
    match raw.to_ascii_lowercase().as_str() {
        "0" | "0.0" | "false" | "no" => Ok(0),
        "1" | "1.0" | "true" | "yes" => Ok(1),
        _ => Err((
            RowIssue::Invalid,
            format!("Invalid `{name}` value '{raw}' (expected 0/1)."),
        )),
    }
}

fn parse_unit(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    columns: &ColumnSpec,
    id: String,
) -> Result<Unit, (RowIssue, String)> {
    // Check completeness across every required field first, so a row with both
    // a missing and a malformed field is classified as missing.
    let exposure_raw = required_field(record, header_map, &columns.exposure)?;
    let outcome_raw = required_field(record, header_map, &columns.outcome)?;
    let covariate_raw = columns
        .covariates
        .iter()
        .map(|spec| required_field(record, header_map, &spec.name))
        .collect::<Result<Vec<_>, _>>()?;

    let exposure = parse_number(exposure_raw, &columns.exposure)?;
    let outcome = parse_outcome(outcome_raw, &columns.outcome)?;

    let mut covariates = Vec::with_capacity(columns.covariates.len());
    for (spec, raw) in columns.covariates.iter().zip(covariate_raw) {
        let value = match spec.kind {
            CovariateKind::Continuous => CovariateValue::Continuous(parse_number(raw, &spec.name)?),
            CovariateKind::Categorical => CovariateValue::Categorical(raw.to_string()),
        };
        covariates.push(value);
    }

    Ok(Unit {
        id,
        exposure,
        outcome,
        covariates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnSpec {
        ColumnSpec {
            id: Some("id".into()),
            exposure: "sbp".into(),
            outcome: "death".into(),
            covariates: vec![CovariateSpec::continuous("age"), CovariateSpec::categorical("sex")],
        }
    }

    #[test]
    fn incomplete_rows_are_excluded_not_imputed() {
        let csv = "\u{feff}ID,SBP,death,age,sex\n\
                   a,120,0,60,f\n\
                   b,,1,70,m\n\
                   c,130,1,NA,m\n\
                   d,110,0,55,\n\
                   e,abc,0,50,f\n\
                   f,140,1,80,m\n";
        let data = read_units(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(data.rows_read, 6);
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.rows_missing(), 3);
        assert_eq!(data.rows_invalid(), 1);
        let ids: Vec<&str> = data.table.units().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "f"]);
        assert_eq!(data.table.units()[1].covariates[1], CovariateValue::Categorical("m".into()));
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let csv = "id,sbp,death,age\n1,120,0,60\n";
        let err = read_units(csv.as_bytes(), &columns()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("`sex`"));
    }

    #[test]
    fn outcome_must_be_binary() {
        let csv = "id,sbp,death,age,sex\n1,120,2,60,f\n2,125,1,61,m\n";
        let data = read_units(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(data.rows_used, 1);
        assert_eq!(data.row_errors[0].issue, RowIssue::Invalid);
        assert_eq!(data.row_errors[0].line, 2);
    }

    #[test]
    fn all_rows_missing_is_insufficient() {
        let csv = "id,sbp,death,age,sex\n1,,0,60,f\n";
        let err = read_units(csv.as_bytes(), &columns()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INSUFFICIENT);
    }
}
