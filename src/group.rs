//! Grouping resolver: enumerate comparable sibling configurations
//!
//! For an axis depth `d`, every leaf path with element `d` removed names a
//! context. All leaves sharing a context form one comparison group per
//! metric, e.g. with axis `toolchain`:
//!
//! ```text
//! lulesh / arch1 / * / O2 / 4  ->  gcc vs llvm
//! ```
//!
//! Repeats inside a leaf are reduced to their mean before grouping. Their
//! spread is kept as an intra-run coefficient of variation and only used to
//! flag unreliable members.

use crate::record::{DimValue, Label};
use crate::stats;
use crate::tree::{CategoryTree, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One configuration inside a comparison group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Value of the varying axis for this member
    pub label: DimValue,
    /// Representative value (mean of repeats)
    pub value: f64,
    pub repeats: usize,
    /// Coefficient of variation across repeats (2+ repeats only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intra_cv: Option<f64>,
    /// Repeats too noisy to trust this member
    pub unreliable: bool,
    #[serde(skip)]
    pub samples: Vec<f64>,
}

impl GroupMember {
    /// Reduce repeat samples to one member; `None` without samples
    pub fn from_samples(label: DimValue, samples: Vec<f64>, noise_threshold: f64) -> Option<Self> {
        let value = stats::mean(&samples)?;
        let intra_cv = stats::coefficient_of_variation(&samples);
        Some(Self {
            label,
            value,
            repeats: samples.len(),
            intra_cv,
            unreliable: intra_cv.is_some_and(|cv| cv > noise_threshold),
            samples,
        })
    }
}

/// Sibling configurations differing only along one axis, for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonGroup {
    pub axis: Dimension,
    pub axis_depth: usize,
    /// Labels shared by all members (the axis excluded)
    pub context: Vec<Label>,
    pub metric: String,
    /// Members ordered by axis value
    pub members: Vec<GroupMember>,
}

impl ComparisonGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.value).collect()
    }

    /// `(scale, value)` pairs for ordinal axes
    pub fn scale_series(&self) -> Vec<(u64, f64)> {
        self.members
            .iter()
            .filter_map(|m| m.label.as_scale().map(|s| (s, m.value)))
            .collect()
    }

    /// Human-readable unit name, e.g. `lulesh/arch1/toolchain=*/O2/4 [fom]`
    pub fn describe(&self) -> String {
        describe_unit(&self.context, self.axis_depth, &self.axis.name, &self.metric)
    }
}

/// Render a context with the axis slot marked as `name=*`
pub fn describe_unit(context: &[Label], axis_depth: usize, axis: &str, metric: &str) -> String {
    let mut parts: Vec<String> = context.iter().map(|l| l.value.to_string()).collect();
    let slot = axis_depth.min(parts.len());
    parts.insert(slot, format!("{}=*", axis));
    format!("{} [{}]", parts.join("/"), metric)
}

/// Enumerates comparison groups over a finished tree
pub struct GroupingResolver<'a> {
    tree: &'a CategoryTree,
    noise_threshold: f64,
}

impl<'a> GroupingResolver<'a> {
    pub fn new(tree: &'a CategoryTree, noise_threshold: f64) -> Self {
        Self {
            tree,
            noise_threshold,
        }
    }

    /// Every group at every axis depth, shallowest axis first
    pub fn groups(&self) -> Vec<ComparisonGroup> {
        let depth = self.tree.schema().map_or(0, |s| s.len());
        (0..depth).flat_map(|d| self.groups_along(d)).collect()
    }

    /// Groups varying along the dimension at `axis_depth`
    ///
    /// One group per (context, metric) where at least one member reports the
    /// metric. Contexts come out in leaf order, metrics in name order.
    pub fn groups_along(&self, axis_depth: usize) -> Vec<ComparisonGroup> {
        let Some(schema) = self.tree.schema() else {
            return Vec::new();
        };
        let Some(axis) = schema.dimension(axis_depth) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut groups = Vec::new();

        for (path, _) in self.tree.leaves() {
            let mut key = path.clone();
            key.remove(axis_depth);
            if !seen.insert(key) {
                continue;
            }

            let context: Vec<Label> = schema
                .dimensions()
                .iter()
                .zip(&path)
                .enumerate()
                .filter(|(i, _)| *i != axis_depth)
                .map(|(_, (dim, value))| Label {
                    dimension: dim.name.clone(),
                    value: value.clone(),
                })
                .collect();

            let siblings = self.tree.siblings_of(&path, axis_depth);
            let metrics: BTreeSet<&String> = siblings
                .iter()
                .flat_map(|(_, node)| node.records().iter().flat_map(|r| r.metrics().keys()))
                .collect();

            for metric in metrics {
                let members: Vec<GroupMember> = siblings
                    .iter()
                    .filter_map(|(sibling_path, node)| {
                        let samples: Vec<f64> =
                            node.records().iter().filter_map(|r| r.metric(metric)).collect();
                        GroupMember::from_samples(
                            sibling_path[axis_depth].clone(),
                            samples,
                            self.noise_threshold,
                        )
                    })
                    .collect();

                if members.is_empty() {
                    continue;
                }

                groups.push(ComparisonGroup {
                    axis: axis.clone(),
                    axis_depth,
                    context: context.clone(),
                    metric: metric.clone(),
                    members,
                });
            }
        }

        groups
    }
}
