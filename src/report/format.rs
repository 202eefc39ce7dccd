//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the weighting/estimation code stays clean and testable
//! - output changes are localized

use crate::domain::{CovariateKind, Estimate, UnitTable, WeightConfig, WeightSet};
use crate::io::IngestedData;

use super::{RankedWeight, WeightSummary};

/// Dataset header: source, roles, and the complete-case filter outcome.
pub fn format_run_summary(ingest: &IngestedData, config: &WeightConfig) -> String {
    let mut out = String::new();

    out.push_str("=== ipw - Stabilized weights for a continuous exposure ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Exposure: {} | Outcome: {}\n",
        config.exposure_column, config.outcome_column
    ));
    out.push_str(&format!("Covariates: {}\n", fmt_covariates(ingest.table.schema())));
    out.push_str(&format!(
        "Rows: read={} used={} excluded={} (missing={}, invalid={})\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.rows_missing(),
        ingest.rows_invalid(),
    ));
    out.push_str(&format_table_stats(&ingest.table));

    if !ingest.row_errors.is_empty() {
        out.push_str("\nExcluded rows (first 5):\n");
        for err in ingest.row_errors.iter().take(5) {
            out.push_str(&format!(
                "- line {} (id={}): {}\n",
                err.line,
                err.id.as_deref().unwrap_or("?"),
                err.message
            ));
        }
    }
    out.push('\n');

    out
}

/// Exposure range and event rate of a unit table.
pub fn format_table_stats(table: &UnitTable) -> String {
    let a = table.exposures();
    let (lo, hi) = a
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let events = table.units().iter().filter(|u| u.outcome == 1).count();
    format!(
        "Units: n={} | exposure=[{:.2}, {:.2}] | events={} ({:.1}%)\n",
        table.len(),
        lo,
        hi,
        events,
        100.0 * events as f64 / table.len().max(1) as f64
    )
}

/// One block per weight set: distribution, ESS, positivity, bin counts.
pub fn format_weight_summary(set: &WeightSet, summary: &WeightSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}:\n", set.method.display_name()));
    out.push_str(&format!(
        "  n={} mean={:.4} sd={:.4} min={:.4} max={:.4}\n",
        summary.n, summary.mean, summary.sd, summary.min, summary.max
    ));
    out.push_str(&format!(
        "  ESS={:.1} ({:.1}% of n)\n",
        summary.effective_sample_size,
        100.0 * summary.effective_sample_size / summary.n.max(1) as f64
    ));
    if summary.violations > 0 {
        out.push_str(&format!(
            "  positivity violations: {} (weight = inf)\n",
            summary.violations
        ));
    }
    if let Some(counts) = &summary.bin_counts {
        out.push_str(&format!("  units per bin: {}\n", fmt_counts(counts)));
    }

    out
}

/// Largest weights table.
pub fn format_extreme_weights(rows: &[RankedWeight]) -> String {
    let mut out = String::new();
    out.push_str("Largest weights:\n");
    out.push_str(
        format!("{:<24} {:>12} {:>5} {:>14}\n", "id", "exposure", "bin", "weight").trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<12} {:-<5} {:-<14}\n", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:<24} {:>12.3} {:>5} {:>14}\n",
                truncate(&r.id, 24),
                r.exposure,
                r.bin.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
                fmt_weight(r.weight),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Estimate table: log odds ratio, SE, 95% CI, and odds ratio.
pub fn format_estimates(estimates: &[Estimate]) -> String {
    let mut out = String::new();
    out.push_str("Effect estimates (log odds ratio per unit exposure):\n");
    out.push_str(
        format!(
            "{:<18} {:>12} {:>12} {:>26} {:>10} {:>8}\n",
            "method", "estimate", "std_error", "95% CI", "OR", "n"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<18} {:-<12} {:-<12} {:-<26} {:-<10} {:-<8}\n", "", "", "", "", "", "").trim_end(),
    );
    out.push('\n');

    for e in estimates {
        let ci = format!("[{:.6}, {:.6}]", e.ci_lower, e.ci_upper);
        out.push_str(
            format!(
                "{:<18} {:>12.6} {:>12.6} {:>26} {:>10.4} {:>8}\n",
                e.method.display_name(),
                e.estimate,
                e.std_error,
                ci,
                e.odds_ratio(),
                e.n
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_covariates(schema: &[crate::domain::CovariateSpec]) -> String {
    if schema.is_empty() {
        return "(none)".to_string();
    }
    let parts: Vec<String> = schema
        .iter()
        .map(|s| match s.kind {
            CovariateKind::Continuous => s.name.clone(),
            CovariateKind::Categorical => format!("{} (categorical)", s.name),
        })
        .collect();
    parts.join(", ")
}

fn fmt_counts(v: &[usize]) -> String {
    let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_weight(v: f64) -> String {
    if v.is_finite() { format!("{v:.6}") } else { "inf".to_string() }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
