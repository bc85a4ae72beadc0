//! Statistics engine for comparison groups
//!
//! Dispatch by group cardinality:
//! - 1 member: pass-through observation
//! - 2 members: difference, percentage difference, threshold flag
//! - 3-4 members: mean / sample standard deviation
//! - 5+ members: mean / sample standard deviation and outliers
//!
//! Descriptive statistics run on trueno vectors; quantiles and the Welch
//! t-test come from aprender.

use crate::config::AggregateConfig;
use crate::error::{AggregateError, Result};
use crate::group::{ComparisonGroup, GroupMember};
use crate::record::{DimValue, Label};
use aprender::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Relative slack on the outlier boundary, absorbing f32 rounding in the
/// SIMD reductions
const OUTLIER_TOLERANCE: f64 = 1e-6;

/// Deviations from `origin`, narrowed to f32 for the SIMD reductions
///
/// Perf counters sit around 1e10 while their repeats differ by a few
/// thousand; f32 only keeps the spread when it sees the deviations.
fn to_vector(values: &[f64], origin: f64) -> Vector<f32> {
    let data: Vec<f32> = values.iter().map(|v| (*v - origin) as f32).collect();
    Vector::from_slice(&data)
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    match values {
        [] => None,
        [single] => Some(*single),
        [first, ..] => {
            let offset = to_vector(values, *first).mean().ok()?;
            Some(*first + f64::from(offset))
        }
    }
}

/// Population variance (n denominator)
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let center = mean(values)?;
    to_vector(values, center)
        .variance()
        .ok()
        .map(|var| f64::from(var).max(0.0))
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    // trueno reports population variance
    population_variance(values).map(|var| (var * n as f64 / (n - 1) as f64).sqrt())
}

/// Coefficient of variation (population stddev / |mean|)
///
/// - CV near 0: very stable repeats
/// - CV near 1: stddev as large as the mean
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let std = population_variance(values)?.sqrt();
    if mean.abs() < 1e-12 {
        return Some(0.0);
    }
    Some(std / mean.abs())
}

/// Quantile via aprender's R-7 estimator
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let center = mean(values)?;
    let vector = to_vector(values, center);
    DescriptiveStats::new(&vector)
        .quantile(q)
        .ok()
        .map(|offset| center + f64::from(offset))
}

/// Rule used to label outliers in groups of 5+ members
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum OutlierRule {
    /// `|v - mean| >= k * sigma_pop`
    ZScore { k: f64 },
    /// Tukey fences: `v < Q1 - factor*IQR` or `v > Q3 + factor*IQR`
    Iqr { factor: f64 },
}

impl Default for OutlierRule {
    fn default() -> Self {
        OutlierRule::ZScore { k: 2.0 }
    }
}

impl OutlierRule {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            OutlierRule::ZScore { k } if !(k.is_finite() && k > 0.0) => {
                Err(format!("outlier k must be positive, got {}", k))
            }
            OutlierRule::Iqr { factor } if !(factor.is_finite() && factor >= 0.0) => Err(format!(
                "outlier IQR factor must be non-negative, got {}",
                factor
            )),
            _ => Ok(()),
        }
    }

    /// Indices of the values this rule labels as outliers
    pub fn outliers(&self, values: &[f64]) -> Vec<usize> {
        match *self {
            OutlierRule::ZScore { k } => {
                let (Some(mean), Some(var)) = (mean(values), population_variance(values)) else {
                    return Vec::new();
                };
                let sigma = var.sqrt();
                if sigma <= 0.0 {
                    return Vec::new();
                }
                let bound = k * sigma * (1.0 - OUTLIER_TOLERANCE);
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| (**v - mean).abs() >= bound)
                    .map(|(i, _)| i)
                    .collect()
            }
            OutlierRule::Iqr { factor } => {
                let (Some(q1), Some(q3)) = (quantile(values, 0.25), quantile(values, 0.75)) else {
                    return Vec::new();
                };
                let iqr = q3 - q1;
                let (low, high) = (q1 - factor * iqr, q3 + factor * iqr);
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v < low || **v > high)
                    .map(|(i, _)| i)
                    .collect()
            }
        }
    }
}

/// Welch's two-sample t-test over the repeats of two members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceTest {
    pub statistic: f64,
    pub pvalue: f64,
    pub df: f64,
    /// p < significance level
    pub significant: bool,
}

/// Run Welch's t-test (unequal variances) on two repeat distributions
///
/// Returns `None` when the test cannot be computed (too few samples, zero
/// variance in both distributions).
pub fn welch_test(baseline: &[f64], candidate: &[f64], alpha: f64) -> Option<SignificanceTest> {
    if baseline.len() < 2 || candidate.len() < 2 {
        return None;
    }
    // t is shift-invariant; a shared origin keeps f32 on the spread
    let origin = mean(baseline)?;
    let a: Vec<f32> = baseline.iter().map(|v| (*v - origin) as f32).collect();
    let b: Vec<f32> = candidate.iter().map(|v| (*v - origin) as f32).collect();

    match aprender::stats::hypothesis::ttest_ind(&a, &b, false) {
        Ok(test) if test.pvalue.is_finite() && test.statistic.is_finite() => {
            let pvalue = f64::from(test.pvalue);
            Some(SignificanceTest {
                statistic: f64::from(test.statistic),
                pvalue,
                df: f64::from(test.df),
                significant: pvalue < alpha,
            })
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("t-test not computable: {}", e);
            None
        }
    }
}

/// Two-member comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseDiff {
    pub baseline: f64,
    pub candidate: f64,
    /// candidate - baseline
    pub diff: f64,
    /// diff / baseline; absent when the baseline is zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct: Option<f64>,
    /// |pct| > threshold
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significance: Option<SignificanceTest>,
}

impl PairwiseDiff {
    /// Percentage difference, or `DivisionUndefined` for a zero baseline
    pub fn percent(&self) -> Result<f64> {
        self.pct.ok_or_else(|| AggregateError::DivisionUndefined {
            what: "baseline".to_string(),
        })
    }
}

/// Difference between two values with a significance threshold
pub fn pairwise_diff(baseline: f64, candidate: f64, threshold: f64) -> PairwiseDiff {
    let diff = candidate - baseline;
    let pct = if baseline == 0.0 {
        None
    } else {
        Some(diff / baseline)
    };
    PairwiseDiff {
        baseline,
        candidate,
        diff,
        pct,
        flagged: pct.is_some_and(|p| p.abs() > threshold),
        significance: None,
    }
}

/// Mean and sample standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    pub stdev: f64,
}

pub fn summarize(values: &[f64]) -> Result<Summary> {
    let insufficient = || AggregateError::InsufficientSamples {
        required: 2,
        actual: values.len(),
    };
    let mean = mean(values).ok_or_else(insufficient)?;
    let stdev = sample_stdev(values).ok_or_else(insufficient)?;
    Ok(Summary {
        n: values.len(),
        mean,
        stdev,
    })
}

/// One member singled out by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    pub label: DimValue,
    pub value: f64,
}

/// Summary statistics plus outliers, for groups of 5+ members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    #[serde(flatten)]
    pub summary: Summary,
    pub outliers: Vec<DimValue>,
    pub highest: Extreme,
    pub lowest: Extreme,
}

/// Outcome of one comparison, tagged by group cardinality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    Observation { value: f64 },
    PairwiseDiff(PairwiseDiff),
    SummaryStats(Summary),
    SummaryStatsWithOutliers(OutlierSummary),
}

/// Result for one group and one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Context path with the axis slot marked, e.g. `lulesh/toolchain=*/O2/4 [fom]`
    pub unit: String,
    /// Varying dimension
    pub axis: String,
    /// Labels shared by every member
    pub context: Vec<Label>,
    pub metric: String,
    pub members: Vec<GroupMember>,
    pub outcome: Outcome,
}

impl ComparisonResult {
    pub fn is_flagged(&self) -> bool {
        matches!(&self.outcome, Outcome::PairwiseDiff(d) if d.flagged)
    }
}

/// A comparison result plus the errors hit while producing it
#[derive(Debug, Clone)]
pub struct GroupEvaluation {
    pub result: ComparisonResult,
    pub issues: Vec<AggregateError>,
}

fn extreme<'a>(
    members: &'a [GroupMember],
    pick: impl Fn(&'a GroupMember, &'a GroupMember) -> &'a GroupMember,
) -> Option<Extreme> {
    members.iter().reduce(pick).map(|m| Extreme {
        label: m.label.clone(),
        value: m.value,
    })
}

/// Run the cardinality-appropriate statistic over a group
pub fn evaluate(group: &ComparisonGroup, config: &AggregateConfig) -> Result<GroupEvaluation> {
    let values = group.values();
    let mut issues = Vec::new();

    let outcome = match group.members.as_slice() {
        [] => {
            return Err(AggregateError::InsufficientSamples {
                required: 1,
                actual: 0,
            })
        }
        [only] => Outcome::Observation { value: only.value },
        [base, cand] => {
            let mut diff = pairwise_diff(base.value, cand.value, config.threshold);
            if let Err(e) = diff.percent() {
                issues.push(e);
            }
            if base.repeats >= config.min_repeats_for_test
                && cand.repeats >= config.min_repeats_for_test
            {
                diff.significance =
                    welch_test(&base.samples, &cand.samples, config.significance_level);
            }
            Outcome::PairwiseDiff(diff)
        }
        members if members.len() <= 4 => Outcome::SummaryStats(summarize(&values)?),
        members => {
            let summary = summarize(&values)?;
            let outliers = config
                .outlier_rule
                .outliers(&values)
                .into_iter()
                .map(|i| members[i].label.clone())
                .collect();
            let highest = extreme(members, |a, b| if b.value > a.value { b } else { a });
            let lowest = extreme(members, |a, b| if b.value < a.value { b } else { a });
            let (Some(highest), Some(lowest)) = (highest, lowest) else {
                return Err(AggregateError::InsufficientSamples {
                    required: 5,
                    actual: members.len(),
                });
            };
            Outcome::SummaryStatsWithOutliers(OutlierSummary {
                summary,
                outliers,
                highest,
                lowest,
            })
        }
    };

    Ok(GroupEvaluation {
        result: ComparisonResult {
            unit: group.describe(),
            axis: group.axis.name.clone(),
            context: group.context.clone(),
            metric: group.metric.clone(),
            members: group.members.clone(),
            outcome,
        },
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DimensionKind;
    use crate::tree::Dimension;

    fn group(values: &[f64]) -> ComparisonGroup {
        ComparisonGroup {
            axis: Dimension {
                name: "toolchain".to_string(),
                kind: DimensionKind::Categorical,
            },
            axis_depth: 1,
            context: vec![Label::new("benchmark", "lulesh")],
            metric: "fom".to_string(),
            members: values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let label = DimValue::Categorical(format!("tc{}", i));
                    GroupMember::from_samples(label, vec![*v], 0.5).unwrap()
                })
                .collect(),
        }
    }

    #[test]
    fn test_pairwise_flagged() {
        let diff = pairwise_diff(100.0, 110.0, 0.05);
        assert_eq!(diff.diff, 10.0);
        assert!((diff.pct.unwrap() - 0.10).abs() < 1e-12);
        assert!(diff.flagged);
    }

    #[test]
    fn test_pairwise_not_flagged() {
        let diff = pairwise_diff(100.0, 102.0, 0.05);
        assert!(!diff.flagged);
        assert!((diff.percent().unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_pairwise_negative_change_flagged() {
        let diff = pairwise_diff(100.0, 80.0, 0.05);
        assert_eq!(diff.diff, -20.0);
        assert!(diff.flagged);
    }

    #[test]
    fn test_pairwise_zero_baseline() {
        let diff = pairwise_diff(0.0, 5.0, 0.05);
        assert_eq!(diff.diff, 5.0);
        assert!(diff.pct.is_none());
        assert!(!diff.flagged);
        assert!(matches!(
            diff.percent(),
            Err(AggregateError::DivisionUndefined { .. })
        ));
    }

    #[test]
    fn test_sample_stdev() {
        // mean=5, sum of squares=20, n-1=3
        let sd = sample_stdev(&[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!((sd - (20.0f64 / 3.0).sqrt()).abs() < 1e-4);
        assert!(sample_stdev(&[1.0]).is_none());
    }

    #[test]
    fn test_large_counter_values() {
        // cycles of three perf stat repeats
        let cycles = [86_136_969_771.0, 86_136_970_771.0, 86_136_971_771.0];
        assert_eq!(mean(&cycles), Some(86_136_970_771.0));
        let sd = sample_stdev(&cycles).unwrap();
        assert!((sd - 1000.0).abs() < 1e-3, "stdev {}", sd);

        assert_eq!(mean(&[16_777_217.0, 16_777_217.0]), Some(16_777_217.0));

        let six: Vec<f64> = (0..6).map(|i| 86_136_969_771.0 + 1000.0 * i as f64).collect();
        let var = population_variance(&six).unwrap();
        assert!((var - 2_916_666.666_666_7).abs() < 1.0, "variance {}", var);

        let cv = coefficient_of_variation(&cycles).unwrap();
        assert!(cv.is_finite() && cv > 0.0 && cv < 1e-6);
    }

    #[test]
    fn test_large_counter_outlier_and_summary() {
        let values: Vec<f64> = [0.0, 1000.0, 2000.0, 0.0, 1000.0, 100_000.0]
            .iter()
            .map(|d| 86_136_969_771.0 + d)
            .collect();
        assert_eq!(OutlierRule::default().outliers(&values), vec![5]);

        let eval = evaluate(
            &group(&[86_136_969_771.0, 86_136_970_771.0, 86_136_971_771.0]),
            &AggregateConfig::default(),
        )
        .unwrap();
        match eval.result.outcome {
            Outcome::SummaryStats(s) => {
                assert_eq!(s.mean, 86_136_970_771.0);
                assert!((s.stdev - 1000.0).abs() < 1e-3);
            }
            other => panic!("Expected SummaryStats, got {:?}", other),
        }
    }

    #[test]
    fn test_quantile_large_values() {
        let values = [1e10, 1e10 + 10.0, 1e10 + 20.0, 1e10 + 30.0, 1e10 + 40.0];
        let median = quantile(&values, 0.5).unwrap();
        assert!((median - (1e10 + 20.0)).abs() < 1e-3);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let stable = coefficient_of_variation(&[10.0, 11.0, 10.0, 12.0, 10.0]).unwrap();
        assert!(stable < 0.2);

        let noisy = coefficient_of_variation(&[5.0, 50.0, 3.0, 45.0, 2.0]).unwrap();
        assert!(noisy > 0.5);

        assert_eq!(coefficient_of_variation(&[100.0, 100.0, 100.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[100.0]), None);
    }

    #[test]
    fn test_quantile_median() {
        assert_eq!(quantile(&[1.0, 3.0, 5.0, 7.0, 9.0], 0.5), Some(5.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_zscore_single_outlier() {
        let values = [10.0, 10.0, 10.0, 10.0, 100.0];
        let outliers = OutlierRule::ZScore { k: 2.0 }.outliers(&values);
        assert_eq!(outliers, vec![4]);
    }

    #[test]
    fn test_zscore_no_spread() {
        let outliers = OutlierRule::ZScore { k: 2.0 }.outliers(&[5.0; 6]);
        assert!(outliers.is_empty());
    }

    #[test]
    fn test_iqr_outlier() {
        let values = [10.0, 11.0, 10.0, 12.0, 11.0, 90.0];
        let outliers = OutlierRule::Iqr { factor: 1.5 }.outliers(&values);
        assert_eq!(outliers, vec![5]);
    }

    #[test]
    fn test_outlier_rule_validate() {
        assert!(OutlierRule::ZScore { k: 0.0 }.validate().is_err());
        assert!(OutlierRule::Iqr { factor: -1.0 }.validate().is_err());
        assert!(OutlierRule::default().validate().is_ok());
    }

    #[test]
    fn test_evaluate_singleton_is_observation() {
        let eval = evaluate(&group(&[42.0]), &AggregateConfig::default()).unwrap();
        assert_eq!(eval.result.outcome, Outcome::Observation { value: 42.0 });
        assert!(eval.issues.is_empty());
    }

    #[test]
    fn test_evaluate_pair() {
        let eval = evaluate(&group(&[100.0, 110.0]), &AggregateConfig::default()).unwrap();
        assert!(eval.result.is_flagged());
        match eval.result.outcome {
            Outcome::PairwiseDiff(d) => {
                assert_eq!(d.diff, 10.0);
                assert!(d.significance.is_none());
            }
            other => panic!("Expected PairwiseDiff, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_pair_zero_baseline_reports_issue() {
        let eval = evaluate(&group(&[0.0, 3.0]), &AggregateConfig::default()).unwrap();
        assert_eq!(eval.issues.len(), 1);
        assert!(matches!(
            eval.issues[0],
            AggregateError::DivisionUndefined { .. }
        ));
        match eval.result.outcome {
            Outcome::PairwiseDiff(d) => assert_eq!(d.diff, 3.0),
            other => panic!("Expected PairwiseDiff, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_three_and_four_members() {
        for values in [&[1.0, 2.0, 3.0][..], &[1.0, 2.0, 3.0, 4.0][..]] {
            let eval = evaluate(&group(values), &AggregateConfig::default()).unwrap();
            match eval.result.outcome {
                Outcome::SummaryStats(s) => {
                    assert_eq!(s.n, values.len());
                    assert!(s.stdev > 0.0);
                }
                other => panic!("Expected SummaryStats, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_evaluate_five_members_with_outlier() {
        let eval = evaluate(
            &group(&[10.0, 10.0, 10.0, 10.0, 100.0]),
            &AggregateConfig::default(),
        )
        .unwrap();
        match eval.result.outcome {
            Outcome::SummaryStatsWithOutliers(s) => {
                assert!((s.summary.mean - 28.0).abs() < 1e-4);
                assert!((s.summary.stdev - 1620.0f64.sqrt()).abs() < 1e-3);
                assert_eq!(s.outliers, vec![DimValue::from("tc4")]);
                assert_eq!(s.highest.label, DimValue::from("tc4"));
                assert_eq!(s.highest.value, 100.0);
                assert_eq!(s.lowest.value, 10.0);
                assert_eq!(s.lowest.label, DimValue::from("tc0"));
            }
            other => panic!("Expected SummaryStatsWithOutliers, got {:?}", other),
        }
    }

    #[test]
    fn test_welch_test_detects_shift() {
        let baseline = [10.0, 12.0, 11.0, 13.0, 10.0];
        let current = [25.0, 27.0, 26.0, 28.0, 25.0];
        let test = welch_test(&baseline, &current, 0.05).unwrap();
        assert!(test.pvalue < 0.05, "p-value {} should be < 0.05", test.pvalue);
        assert!(test.significant);
    }

    #[test]
    fn test_welch_test_needs_repeats() {
        assert!(welch_test(&[1.0], &[2.0, 3.0], 0.05).is_none());
    }

    #[test]
    fn test_outcome_serializes_kind_tag() {
        let outcome = Outcome::PairwiseDiff(pairwise_diff(100.0, 110.0, 0.05));
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"kind\":\"pairwise-diff\""));
        assert!(json.contains("\"flagged\":true"));
    }
}
