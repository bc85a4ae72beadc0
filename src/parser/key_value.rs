use super::MetricExtractor;
use crate::error::ParseError;
use crate::record::{MetricValue, Metrics};

/// Generic `name = value` or `name: value` lines
///
/// Blank lines, `#` comments and non-numeric values are skipped. A later
/// line overrides an earlier one with the same name.
pub struct KeyValueExtractor;

impl MetricExtractor for KeyValueExtractor {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn extract(&self, raw: &str) -> Result<Metrics, ParseError> {
        let mut metrics = Metrics::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=').or_else(|| line.split_once(':'))
            else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(value) = MetricValue::parse(value.trim()) {
                metrics.insert(name.to_string(), value);
            }
        }

        if metrics.is_empty() {
            return Err(ParseError::NoMetrics);
        }
        Ok(metrics)
    }
}
