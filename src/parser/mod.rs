// Log parser plugins
//
// A parser turns one log source into one metric record. It is split in two
// halves selected independently by configuration:
// - a MetricExtractor that reads metric name/value pairs out of the raw text
//   (perf stat counters, LULESH summary, generic key/value lines)
// - an IdentityTemplate that derives the identity labels from the run name,
//   the log directory and the file name
//
// Extractors never see paths and the tree never sees log text.

mod identity;
mod key_value;
mod lulesh;
mod perf_stat;

pub use identity::{DimensionSpec, IdentityTemplate};
pub use key_value::KeyValueExtractor;
pub use lulesh::LuleshExtractor;
pub use perf_stat::{extract_counters, PerfStatExtractor};

use crate::config::AggregateConfig;
use crate::error::ParseError;
use crate::record::{MetricRecord, Metrics};
use crate::source::LogSource;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Capability interface for benchmark-specific log formats
pub trait MetricExtractor: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Extract metric name → value pairs from raw log text
    fn extract(&self, raw: &str) -> Result<Metrics, ParseError>;
}

/// Extractor variants selectable from configuration or the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    /// Linux `perf stat` counter output
    #[default]
    PerfStat,
    /// LULESH "Run completed" summary plus perf stat counters
    Lulesh,
    /// Generic `name = value` / `name: value` lines
    KeyValue,
}

impl ParserKind {
    pub fn extractor(self) -> Box<dyn MetricExtractor> {
        match self {
            ParserKind::PerfStat => Box::new(PerfStatExtractor),
            ParserKind::Lulesh => Box::new(LuleshExtractor),
            ParserKind::KeyValue => Box::new(KeyValueExtractor),
        }
    }
}

/// Extractor plus identity template: log source → metric record
pub struct LogParser {
    extractor: Box<dyn MetricExtractor>,
    identity: IdentityTemplate,
}

impl LogParser {
    pub fn new(extractor: Box<dyn MetricExtractor>, identity: IdentityTemplate) -> Self {
        Self {
            extractor,
            identity,
        }
    }

    pub fn from_config(config: &AggregateConfig) -> Self {
        Self::new(config.parser.extractor(), config.identity.clone())
    }

    pub fn name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Parse one log of the run named `benchmark`
    pub fn parse(&self, benchmark: &str, source: &LogSource) -> Result<MetricRecord, ParseError> {
        let identity = self.identity.identity(benchmark, source)?;
        let metrics = self.extractor.extract(&source.text)?;
        Ok(MetricRecord::new(identity, metrics).with_source(source.unit()))
    }
}

/// Lowercase snake_case metric name: `Grind time (us/z/c)` → `grind_time_us_z_c`
pub(crate) fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
