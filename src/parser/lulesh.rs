use super::{normalize_key, perf_stat, MetricExtractor};
use crate::error::ParseError;
use crate::record::{MetricValue, Metrics};
use regex::Regex;
use std::sync::OnceLock;

const RUN_COMPLETED: &str = "Run completed";

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<key>[A-Za-z][^=]*?)\s*=\s*(?P<value>[-+]?[0-9][0-9.eE+\-]*)")
            .expect("lulesh field regex")
    })
}

/// LULESH proxy-app output
///
/// Reads the `Key = value` summary that follows "Run completed", e.g.
///
/// ```text
/// Run completed:
///    Problem size        =  30
///    Iteration count     =  932
/// Elapsed time         =      28.69 (s)
/// Grind time (us/z/c)  = 1.1403334 (per dom)  ( 28.690 overall)
/// FOM                  =  876.93284 (z/s)
/// ```
///
/// `perf stat` counters in the same log are merged in when their banner is
/// present.
pub struct LuleshExtractor;

impl MetricExtractor for LuleshExtractor {
    fn name(&self) -> &'static str {
        "lulesh"
    }

    fn extract(&self, raw: &str) -> Result<Metrics, ParseError> {
        let start = raw
            .find(RUN_COMPLETED)
            .ok_or_else(|| ParseError::MissingSection(RUN_COMPLETED.to_string()))?;

        let mut metrics = if raw.contains(perf_stat::PERF_HEADER) {
            perf_stat::extract_counters(raw).unwrap_or_default()
        } else {
            Metrics::new()
        };

        for line in raw[start..].lines() {
            let Some(caps) = field_regex().captures(line) else {
                continue;
            };
            let key = normalize_key(&caps["key"]);
            if key.is_empty() {
                continue;
            }
            let value =
                MetricValue::parse(&caps["value"]).ok_or_else(|| ParseError::InvalidValue {
                    metric: key.clone(),
                    value: caps["value"].to_string(),
                })?;
            metrics.insert(key, value);
        }

        if metrics.is_empty() {
            return Err(ParseError::NoMetrics);
        }
        Ok(metrics)
    }
}
