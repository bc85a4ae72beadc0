use super::MetricExtractor;
use crate::error::ParseError;
use crate::record::{MetricValue, Metrics};
use regex::Regex;
use std::sync::OnceLock;

pub(super) const PERF_HEADER: &str = "Performance counter stats";

fn counter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<value>[0-9][0-9,]*(?:\.[0-9]+)?)(?:\s+\+-\s+[0-9][0-9.,]*%?)?\s+(?:(?P<unit>msec|seconds)\s+)?(?P<event>[A-Za-z][A-Za-z0-9_./:\-]*(?: elapsed)?)",
        )
        .expect("perf counter regex")
    })
}

/// Extract `perf stat` counters from raw text
///
/// Only lines after the "Performance counter stats" banner are read when the
/// banner is present. Repeated runs (`perf stat -r N`) report the mean, and
/// the `+- spread` that may follow it is dropped. `<not counted>` and
/// `<not supported>` lines never match.
pub fn extract_counters(raw: &str) -> Result<Metrics, ParseError> {
    let body = raw
        .find(PERF_HEADER)
        .map_or(raw, |pos| &raw[pos + PERF_HEADER.len()..]);

    let mut metrics = Metrics::new();
    for line in body.lines() {
        let Some(caps) = counter_regex().captures(line) else {
            continue;
        };
        let text = caps["value"].replace(',', "");
        let event = caps["event"].replace(' ', "-");
        let value = MetricValue::parse(&text).ok_or_else(|| ParseError::InvalidValue {
            metric: event.clone(),
            value: text.clone(),
        })?;
        metrics.insert(event, value);
    }

    if metrics.is_empty() {
        return Err(ParseError::NoMetrics);
    }
    Ok(metrics)
}

/// Linux `perf stat` output
pub struct PerfStatExtractor;

impl MetricExtractor for PerfStatExtractor {
    fn name(&self) -> &'static str {
        "perf-stat"
    }

    fn extract(&self, raw: &str) -> Result<Metrics, ParseError> {
        extract_counters(raw)
    }
}
