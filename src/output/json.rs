//! JSON output formatting
//!
//! One report per run. Big integers are written as decimal strings so
//! consumers never lose precision to floating point.

use crate::config::Mode;
use crate::weight::Weight;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// What the value in a report is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    KroneckerCoefficient,
    WeightMultiplicity,
}

/// Distributed run details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDistribution {
    pub total_items: usize,
    pub per_node_completed: BTreeMap<String, usize>,
}

/// Complete run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub mode: Mode,
    pub partitions: Vec<String>,
    pub quantity: Quantity,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<JsonDistribution>,
    pub elapsed: JsonDuration,
    pub generated_at: String,
}

impl JsonReport {
    pub fn new(mode: Mode, partitions: &[Weight], quantity: Quantity, value: &impl Display, elapsed: Duration) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode,
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            quantity,
            value: value.to_string(),
            evaluator: None,
            distribution: None,
            elapsed: JsonDuration::from_duration(elapsed),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_evaluator(mut self, name: impl Into<String>) -> Self {
        self.evaluator = Some(name.into());
        self
    }

    pub fn with_distribution(mut self, total_items: usize, per_node_completed: BTreeMap<String, usize>) -> Self {
        self.distribution = Some(JsonDistribution {
            total_items,
            per_node_completed,
        });
        self
    }
}

/// Write JSON report to file
pub fn write_json_report(output_path: &Path, report: &JsonReport) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report: {}", output_path.display()))?;

    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to write JSON report: {}", output_path.display()))?;

    Ok(())
}

/// Format duration in human-readable format
fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros();

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn partitions() -> Vec<Weight> {
        vec![Weight::from_iter([2, 1]), Weight::from_iter([2, 1]), Weight::from_iter([3])]
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(Duration::ZERO), "0µs");
        assert_eq!(format_duration_human(Duration::from_micros(250)), "250µs");
        assert_eq!(format_duration_human(Duration::from_millis(12)), "12.000ms");
        assert_eq!(format_duration_human(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration_human(Duration::from_secs(90)), "1.50m");
        assert_eq!(format_duration_human(Duration::from_secs(5400)), "1.50h");
    }

    #[test]
    fn test_report_keeps_big_values_exact() {
        let value: BigInt = "-123456789012345678901234567890".parse().unwrap();
        let report = JsonReport::new(
            Mode::Serial,
            &partitions(),
            Quantity::KroneckerCoefficient,
            &value,
            Duration::from_millis(5),
        )
        .with_evaluator("enumerate");

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["value"], "-123456789012345678901234567890");
        assert_eq!(json["mode"], "serial");
        assert_eq!(json["quantity"], "kronecker_coefficient");
        assert_eq!(json["evaluator"], "enumerate");
        assert_eq!(json["partitions"].as_array().unwrap().len(), 3);
        assert!(json.get("distribution").is_none());
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut per_node = BTreeMap::new();
        per_node.insert("host-1@127.0.0.1:5000".to_string(), 4);
        let report = JsonReport::new(
            Mode::Master,
            &partitions(),
            Quantity::KroneckerCoefficient,
            &1,
            Duration::from_secs(2),
        )
        .with_distribution(4, per_node);

        write_json_report(&path, &report).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: JsonReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.distribution.unwrap().total_items, 4);
    }

    #[test]
    fn test_write_json_report_bad_path() {
        let report = JsonReport::new(
            Mode::Serial,
            &partitions(),
            Quantity::WeightMultiplicity,
            &0,
            Duration::ZERO,
        );
        assert!(write_json_report(Path::new("/nonexistent/dir/report.json"), &report).is_err());
    }
}
