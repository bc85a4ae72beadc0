//! Aggregate - hierarchical aggregation and comparison of benchmark run logs
//!
//! Benchmark logs collected across configurations (machine, toolchain,
//! optimization level, core count) are parsed into metric records, stored
//! in a category tree keyed by an inferred schema, and compared along every
//! dimension: pairwise differences, summary statistics with outliers, and
//! scalability fits against an ideal curve.
//!
//! ```
//! use aggregate::config::AggregateConfig;
//! use aggregate::pipeline::{Aggregation, RunContext};
//! use aggregate::record::{Label, MetricRecord, MetricValue};
//!
//! let mut run = Aggregation::new(RunContext::new("lulesh", AggregateConfig::default()));
//! for (toolchain, fom) in [("gcc", 100.0), ("llvm", 110.0)] {
//!     let identity = vec![Label::new("benchmark", "lulesh"), Label::new("toolchain", toolchain)];
//!     let metrics = [("fom".to_string(), MetricValue::Float(fom))].into_iter().collect();
//!     run.add_record(MetricRecord::new(identity, metrics)).unwrap();
//! }
//! let report = run.compare();
//! assert_eq!(report.flagged().count(), 1);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod group;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scalability;
pub mod source;
pub mod stats;
pub mod tree;

pub use error::{AggregateError, ParseError, Result};
