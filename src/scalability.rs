//! Scalability fitting for ordinal (core/thread count) axes
//!
//! The ideal curve starts at the value observed at the smallest scale and
//! follows the chosen scaling model. Observed values are regressed on the
//! ideal curve by least squares; the Pearson correlation says how closely
//! the shape follows the ideal, and the normalized RMS deviation says how
//! far it sits from it ("distance to perfect scalability").
//!
//! Only observed scales are evaluated; nothing is extrapolated.

use crate::error::{AggregateError, Result};
use crate::group::ComparisonGroup;
use crate::record::Label;
use serde::{Deserialize, Serialize};

/// How a metric is expected to change with scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingModel {
    /// Throughput-like metric: ideal = v0 * s / s0
    #[default]
    Proportional,
    /// Time-like metric under strong scaling: ideal = v0 * s0 / s
    Inverse,
    /// Weak scaling: ideal = v0
    Constant,
}

impl ScalingModel {
    fn ideal(&self, base_value: f64, base_scale: f64, scale: f64) -> f64 {
        match self {
            ScalingModel::Proportional => base_value * scale / base_scale,
            ScalingModel::Inverse => base_value * base_scale / scale,
            ScalingModel::Constant => base_value,
        }
    }

    /// Fraction of ideal achieved (1.0 = ideal), oriented so higher is better
    fn efficiency(&self, observed: f64, ideal: f64) -> Option<f64> {
        let ratio = match self {
            ScalingModel::Proportional => observed / ideal,
            ScalingModel::Inverse | ScalingModel::Constant => ideal / observed,
        };
        ratio.is_finite().then_some(ratio)
    }
}

/// One observed scale with its ideal reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalePoint {
    pub scale: u64,
    pub observed: f64,
    pub ideal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
}

/// Least-squares fit of an observed series against its ideal curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitCurve {
    pub model: ScalingModel,
    pub points: Vec<ScalePoint>,
    /// observed ≈ intercept + slope * ideal
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation between observed and ideal
    pub correlation: f64,
    /// RMS(observed - ideal) / mean(ideal)
    pub distance: f64,
}

/// Scalability fit for one context and metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalabilityFit {
    pub unit: String,
    pub axis: String,
    pub context: Vec<Label>,
    pub metric: String,
    #[serde(flatten)]
    pub curve: FitCurve,
}

/// Fit `(scale, value)` pairs against the ideal curve of `model`
///
/// # Errors
/// - `InsufficientSamples` with fewer than 2 distinct scales
/// - `DivisionUndefined` for a zero smallest scale or a zero ideal curve
pub fn fit_scaling(series: &[(u64, f64)], model: ScalingModel) -> Result<FitCurve> {
    let mut series = series.to_vec();
    series.sort_by_key(|(scale, _)| *scale);

    let mut distinct = series.iter().map(|(s, _)| *s).collect::<Vec<_>>();
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(AggregateError::InsufficientSamples {
            required: 2,
            actual: distinct.len(),
        });
    }

    let (base_scale, base_value) = series[0];
    if base_scale == 0 {
        return Err(AggregateError::DivisionUndefined {
            what: "base scale".to_string(),
        });
    }

    let ideal: Vec<f64> = series
        .iter()
        .map(|(s, _)| model.ideal(base_value, base_scale as f64, *s as f64))
        .collect();
    let observed: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

    let n = series.len() as f64;
    let mean_ideal = ideal.iter().sum::<f64>() / n;
    if mean_ideal == 0.0 || !mean_ideal.is_finite() {
        return Err(AggregateError::DivisionUndefined {
            what: "ideal curve".to_string(),
        });
    }
    let mean_observed = observed.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    let mut squared_error = 0.0;
    for (x, y) in ideal.iter().zip(&observed) {
        let dx = x - mean_ideal;
        let dy = y - mean_observed;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
        squared_error += (y - x) * (y - x);
    }

    let ideal_flat = ideal.iter().all(|x| *x == ideal[0]);
    let observed_flat = observed.iter().all(|y| *y == observed[0]);

    let (slope, intercept, correlation) = if ideal_flat {
        // Weak scaling reference has no spread to regress on
        let correlation = if observed_flat { 1.0 } else { 0.0 };
        (0.0, mean_observed, correlation)
    } else {
        let slope = sxy / sxx;
        let correlation = if observed_flat {
            0.0
        } else {
            (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
        };
        (slope, mean_observed - slope * mean_ideal, correlation)
    };

    let distance = (squared_error / n).sqrt() / mean_ideal.abs();

    let points = series
        .iter()
        .zip(&ideal)
        .map(|((scale, observed), ideal)| ScalePoint {
            scale: *scale,
            observed: *observed,
            ideal: *ideal,
            efficiency: model.efficiency(*observed, *ideal),
        })
        .collect();

    Ok(FitCurve {
        model,
        points,
        slope,
        intercept,
        correlation,
        distance,
    })
}

/// Fit an ordinal comparison group
pub fn fit_group(group: &ComparisonGroup, model: ScalingModel) -> Result<ScalabilityFit> {
    let curve = fit_scaling(&group.scale_series(), model)?;
    Ok(ScalabilityFit {
        unit: group.describe(),
        axis: group.axis.name.clone(),
        context: group.context.clone(),
        metric: group.metric.clone(),
        curve,
    })
}
