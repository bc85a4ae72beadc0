// Report views: the tree summary and the comparison report
//
// Both views are plain serde structs so the CLI can render them as text or
// JSON. Every collection inside is ordered (tree order, then axis depth,
// then metric name), so rendering the same input twice is byte-identical;
// the fingerprint hashes the compact JSON of the comparison view.

use crate::error::{AggregateError, FailureKind};
use crate::record::Label;
use crate::scalability::ScalabilityFit;
use crate::stats::{ComparisonResult, Outcome};
use crate::tree::Dimension;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A log, record or group that produced no result, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub unit: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl SkippedUnit {
    pub fn new(unit: impl Into<String>, error: &AggregateError) -> Self {
        Self {
            unit: unit.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Count and mean of one metric over a leaf's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
}

/// One tree node in depth-first order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryNode {
    pub depth: usize,
    pub label: Label,
    /// Records at or below this node
    pub records: usize,
    /// Per-metric means (leaves only)
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metrics: BTreeMap<String, MetricSummary>,
}

/// Tree view of an aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub name: String,
    pub schema: Vec<Dimension>,
    pub record_count: usize,
    pub nodes: Vec<SummaryNode>,
}

impl TreeSummary {
    /// Indented tree, one node per line
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        let schema: Vec<String> = self
            .schema
            .iter()
            .map(|d| format!("{}:{}", d.name, d.kind))
            .collect();
        report.push_str(&format!(
            "📊 {} ({} records)\n",
            self.name, self.record_count
        ));
        if !schema.is_empty() {
            report.push_str(&format!("Schema: {}\n", schema.join(", ")));
        }
        report.push('\n');

        for node in &self.nodes {
            let indent = "  ".repeat(node.depth);
            report.push_str(&format!("{}{} ({})\n", indent, node.label, node.records));
            for (name, metric) in &node.metrics {
                report.push_str(&format!(
                    "{}    {} = {:.3} (n={})\n",
                    indent, name, metric.mean, metric.count
                ));
            }
        }

        report
    }
}

/// Everything `compare()` produced for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub benchmark: String,
    pub results: Vec<ComparisonResult>,
    pub fits: Vec<ScalabilityFit>,
    pub skipped: Vec<SkippedUnit>,
}

impl ComparisonReport {
    pub fn flagged(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results.iter().filter(|r| r.is_flagged())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Hex SHA-256 of the compact JSON form
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Human-readable report: flagged differences, outliers, scalability
    /// and skipped units
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "📊 {}: {} comparisons, {} scalability fits, {} skipped\n\n",
            self.benchmark,
            self.results.len(),
            self.fits.len(),
            self.skipped.len()
        ));

        let flagged: Vec<&ComparisonResult> = self.flagged().collect();
        if flagged.is_empty() {
            report.push_str("✅ NO DIFFERENCES ABOVE THRESHOLD\n");
        } else {
            report.push_str(&format!(
                "❌ DIFFERENCES ABOVE THRESHOLD ({})\n",
                flagged.len()
            ));
            for result in flagged {
                if let (Outcome::PairwiseDiff(diff), [base, cand]) =
                    (&result.outcome, result.members.as_slice())
                {
                    let pct = diff.pct.map_or_else(String::new, |p| {
                        format!(" ({:+.2}%)", p * 100.0)
                    });
                    let significance = diff.significance.as_ref().map_or_else(String::new, |t| {
                        format!(" p={:.4}{}", t.pvalue, if t.significant { " *" } else { "" })
                    });
                    report.push_str(&format!(
                        "  {}: {}={:.3} -> {}={:.3}{}{}\n",
                        result.unit,
                        base.label,
                        diff.baseline,
                        cand.label,
                        diff.candidate,
                        pct,
                        significance
                    ));
                }
            }
        }

        let outliers: Vec<_> = self
            .results
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::SummaryStatsWithOutliers(o) if !o.outliers.is_empty() => Some((r, o)),
                _ => None,
            })
            .collect();
        if !outliers.is_empty() {
            report.push_str(&format!("\n⚠️  OUTLIERS ({})\n", outliers.len()));
            for (result, summary) in outliers {
                let labels: Vec<String> = summary.outliers.iter().map(|l| l.to_string()).collect();
                report.push_str(&format!(
                    "  {}: {} (mean={:.3}, stdev={:.3}, n={})\n",
                    result.unit,
                    labels.join(", "),
                    summary.summary.mean,
                    summary.summary.stdev,
                    summary.summary.n
                ));
            }
        }

        if !self.fits.is_empty() {
            report.push_str(&format!("\n📈 SCALABILITY ({})\n", self.fits.len()));
            for fit in &self.fits {
                let scales: Vec<String> = fit
                    .curve
                    .points
                    .iter()
                    .map(|p| p.scale.to_string())
                    .collect();
                report.push_str(&format!(
                    "  {} ({:?}, scales {}): r={:.4}, distance={:.4}\n",
                    fit.unit,
                    fit.curve.model,
                    scales.join(","),
                    fit.curve.correlation,
                    fit.curve.distance
                ));
            }
        }

        if !self.skipped.is_empty() {
            report.push_str(&format!("\n🔇 Skipped units ({}):\n", self.skipped.len()));
            for unit in &self.skipped {
                report.push_str(&format!("  - {}: {}\n", unit.unit, unit.reason));
            }
        }

        report
    }
}
