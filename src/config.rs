// Aggregation configuration
//
// Loaded from an optional TOML file; every field has a default so an empty
// file (or no file) is a valid configuration. Command-line flags are applied
// on top of the loaded values before validation.

use crate::parser::{IdentityTemplate, ParserKind};
use crate::scalability::ScalingModel;
use crate::stats::OutlierRule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Configuration for one aggregation run
///
/// # Example TOML
/// ```toml
/// threshold = 0.05
/// noise_threshold = 0.5
/// ordinal_stats = false
/// parser = "lulesh"
///
/// [outlier_rule]
/// method = "z-score"
/// k = 2.0
///
/// [scaling]
/// elapsed_time = "inverse"
/// fom = "proportional"
/// ```
///
/// ```
/// use aggregate::config::AggregateConfig;
///
/// let config = AggregateConfig::default();
/// assert_eq!(config.threshold, 0.05); // 5% relative change
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Relative change above which a pairwise difference is flagged
    ///
    /// Compared against `|diff| / |baseline|`. Default: 0.05 (5%)
    pub threshold: f64,

    /// Outlier rule for groups with 5 or more members
    ///
    /// Default: z-score with k = 2 (population sigma, inclusive boundary)
    pub outlier_rule: OutlierRule,

    /// Coefficient of variation above which a member's repeats are noisy
    ///
    /// Noisy members are still compared but marked unreliable.
    /// Default: 0.5 (50% CV)
    pub noise_threshold: f64,

    /// Significance level (alpha) for the Welch t-test on repeats
    ///
    /// Default: 0.05 (95% confidence)
    pub significance_level: f64,

    /// Repeats both pair members need before a t-test is attached
    ///
    /// Default: 3
    pub min_repeats_for_test: usize,

    /// Also run summary statistics over ordinal axes
    ///
    /// Ordinal axes always get a scalability fit. Default: false
    pub ordinal_stats: bool,

    /// Scaling model for metrics without an entry in `scaling`
    pub default_scaling: ScalingModel,

    /// Per-metric scaling model overrides
    pub scaling: BTreeMap<String, ScalingModel>,

    /// Log format extractor
    pub parser: ParserKind,

    /// How identities are derived from run name, directory and file name
    pub identity: IdentityTemplate,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            outlier_rule: OutlierRule::default(),
            noise_threshold: 0.5,
            significance_level: 0.05,
            min_repeats_for_test: 3,
            ordinal_stats: false,
            default_scaling: ScalingModel::Proportional,
            scaling: BTreeMap::new(),
            parser: ParserKind::PerfStat,
            identity: IdentityTemplate::default(),
        }
    }
}

impl AggregateConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file can't be read or has invalid TOML syntax.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Scaling model used for `metric`
    pub fn scaling_for(&self, metric: &str) -> ScalingModel {
        self.scaling
            .get(metric)
            .copied()
            .unwrap_or(self.default_scaling)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(format!(
                "threshold must be a non-negative fraction, got {}",
                self.threshold
            ));
        }

        if !(0.0..=1.0).contains(&self.significance_level) {
            return Err(format!(
                "significance_level must be in [0, 1], got {}",
                self.significance_level
            ));
        }

        if self.min_repeats_for_test < 2 {
            return Err(format!(
                "min_repeats_for_test must be >= 2 for t-test, got {}",
                self.min_repeats_for_test
            ));
        }

        if !(self.noise_threshold.is_finite() && self.noise_threshold >= 0.0) {
            return Err(format!(
                "noise_threshold must be non-negative, got {}",
                self.noise_threshold
            ));
        }

        self.outlier_rule.validate()?;
        self.identity.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AggregateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.outlier_rule, OutlierRule::ZScore { k: 2.0 });
        assert_eq!(config.parser, ParserKind::PerfStat);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AggregateConfig::from_toml_str("").unwrap();
        assert_eq!(config, AggregateConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = AggregateConfig::from_toml_str(
            r#"
threshold = 0.1
parser = "lulesh"

[outlier_rule]
method = "iqr"
factor = 1.5

[scaling]
elapsed_time = "inverse"
"#,
        )
        .unwrap();

        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.parser, ParserKind::Lulesh);
        assert_eq!(config.outlier_rule, OutlierRule::Iqr { factor: 1.5 });
        assert_eq!(config.scaling_for("elapsed_time"), ScalingModel::Inverse);
        assert_eq!(config.scaling_for("fom"), ScalingModel::Proportional);
        assert_eq!(config.noise_threshold, 0.5);
    }

    #[test]
    fn test_identity_table() {
        let config = AggregateConfig::from_toml_str(
            r#"
[identity]
separator = "_"
dimensions = [{ name = "compiler" }, { name = "threads", kind = "ordinal" }]
"#,
        )
        .unwrap();
        assert_eq!(config.identity.separator, "_");
        assert_eq!(config.identity.source_dimension.as_deref(), Some("machine"));
        assert_eq!(config.identity.dimensions.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AggregateConfig::from_toml_str("threshold = [").is_err());
        assert!(AggregateConfig::from_toml_str("parser = \"csv\"").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AggregateConfig {
            threshold: -0.1,
            ..AggregateConfig::default()
        };
        assert!(config.validate().is_err());

        config = AggregateConfig {
            significance_level: 1.5,
            ..AggregateConfig::default()
        };
        assert!(config.validate().is_err());

        config = AggregateConfig {
            min_repeats_for_test: 1,
            ..AggregateConfig::default()
        };
        assert!(config.validate().is_err());

        config = AggregateConfig {
            outlier_rule: OutlierRule::ZScore { k: 0.0 },
            ..AggregateConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ordinal_stats = true").unwrap();
        let config = AggregateConfig::from_file(file.path()).unwrap();
        assert!(config.ordinal_stats);
    }

    #[test]
    fn test_from_missing_file() {
        let err = AggregateConfig::from_file("/nonexistent/aggregate.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
