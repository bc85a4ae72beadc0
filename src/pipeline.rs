//! Batch aggregation pipeline
//!
//! ```text
//! log sources --(parallel parse)--> records --(single writer, source order)--> tree
//! tree --(resolver)--> groups --(parallel evaluate, order-preserving)--> report
//! ```
//!
//! Failures are isolated: a log that doesn't parse, a record that doesn't
//! fit the schema, or a group that can't be evaluated becomes a skipped unit
//! and the run carries on.

use crate::config::AggregateConfig;
use crate::error::{AggregateError, Result};
use crate::group::{ComparisonGroup, GroupingResolver};
use crate::parser::LogParser;
use crate::record::{DimensionKind, MetricRecord};
use crate::report::{ComparisonReport, SkippedUnit, TreeSummary};
use crate::scalability::{fit_group, ScalabilityFit};
use crate::source::LogSource;
use crate::stats::{evaluate, ComparisonResult};
use crate::tree::CategoryTree;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Benchmark name plus configuration for one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub benchmark: String,
    pub config: AggregateConfig,
}

impl RunContext {
    pub fn new(benchmark: impl Into<String>, config: AggregateConfig) -> Self {
        Self {
            benchmark: benchmark.into(),
            config,
        }
    }
}

/// Everything one group produced
#[derive(Default)]
struct GroupOutput {
    results: Vec<ComparisonResult>,
    fits: Vec<ScalabilityFit>,
    skipped: Vec<SkippedUnit>,
}

impl GroupOutput {
    fn skip(&mut self, group: &ComparisonGroup, error: &AggregateError) {
        debug!("Skipping {}: {}", group.describe(), error);
        self.skipped.push(SkippedUnit::new(group.describe(), error));
    }
}

/// One aggregation run: the tree under construction and what was skipped
#[derive(Debug)]
pub struct Aggregation {
    context: RunContext,
    tree: CategoryTree,
    skipped: Vec<SkippedUnit>,
}

impl Aggregation {
    /// Start a run from an empty tree
    pub fn new(context: RunContext) -> Self {
        let tree = CategoryTree::new(context.benchmark.clone());
        Self {
            context,
            tree,
            skipped: Vec::new(),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    /// Units skipped so far during ingestion
    pub fn skipped(&self) -> &[SkippedUnit] {
        &self.skipped
    }

    /// Record units skipped before ingestion (e.g. unreadable files)
    pub fn extend_skipped(&mut self, units: impl IntoIterator<Item = SkippedUnit>) {
        self.skipped.extend(units);
    }

    /// Insert one record; a schema mismatch is recorded and returned
    pub fn add_record(&mut self, record: MetricRecord) -> Result<()> {
        let unit = record.source().map(str::to_string).unwrap_or_else(|| {
            record
                .identity()
                .iter()
                .map(|l| l.value.to_string())
                .collect::<Vec<_>>()
                .join("/")
        });

        if let Err(e) = self.tree.insert_record(record) {
            warn!("Skipping {}: {}", unit, e);
            self.skipped.push(SkippedUnit::new(unit, &e));
            return Err(e);
        }
        Ok(())
    }

    /// Parse `sources` in parallel and merge them in source order
    ///
    /// Returns the number of records inserted.
    pub fn ingest(&mut self, sources: &[LogSource], parser: &LogParser) -> usize {
        let benchmark = self.context.benchmark.as_str();
        let parsed: Vec<(String, std::result::Result<MetricRecord, AggregateError>)> = sources
            .par_iter()
            .map(|source| {
                let record = parser.parse(benchmark, source).map_err(AggregateError::from);
                (source.unit(), record)
            })
            .collect();

        let mut inserted = 0;
        for (unit, record) in parsed {
            match record {
                Ok(record) => {
                    if self.add_record(record).is_ok() {
                        inserted += 1;
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", unit, e);
                    self.skipped.push(SkippedUnit::new(unit, &e));
                }
            }
        }

        info!(
            "Ingested {} of {} logs with the {} parser",
            inserted,
            sources.len(),
            parser.name()
        );
        inserted
    }

    /// Tree view with counts and leaf means
    pub fn summary(&self) -> TreeSummary {
        self.tree.summary()
    }

    /// Run every comparison over the finished tree
    pub fn compare(&self) -> ComparisonReport {
        let config = &self.context.config;
        let groups = GroupingResolver::new(&self.tree, config.noise_threshold).groups();
        info!("Evaluating {} comparison groups", groups.len());

        let outputs: Vec<GroupOutput> = groups
            .par_iter()
            .map(|group| self.compare_group(group))
            .collect();

        let mut report = ComparisonReport {
            benchmark: self.context.benchmark.clone(),
            results: Vec::new(),
            fits: Vec::new(),
            skipped: self.skipped.clone(),
        };
        for output in outputs {
            report.results.extend(output.results);
            report.fits.extend(output.fits);
            report.skipped.extend(output.skipped);
        }

        info!(
            "{} comparisons ({} flagged), {} scalability fits, {} skipped units",
            report.results.len(),
            report.flagged().count(),
            report.fits.len(),
            report.skipped.len()
        );
        report
    }

    fn compare_group(&self, group: &ComparisonGroup) -> GroupOutput {
        let config = &self.context.config;
        let mut output = GroupOutput::default();

        let run_stats = match group.axis.kind {
            DimensionKind::Categorical => true,
            DimensionKind::Ordinal => {
                match fit_group(group, config.scaling_for(&group.metric)) {
                    Ok(fit) => output.fits.push(fit),
                    Err(e) => output.skip(group, &e),
                }
                config.ordinal_stats
            }
        };

        if run_stats {
            match evaluate(group, config) {
                Ok(evaluation) => {
                    for issue in &evaluation.issues {
                        output.skip(group, issue);
                    }
                    output.results.push(evaluation.result);
                }
                Err(e) => output.skip(group, &e),
            }
        }

        output
    }
}
