//! Category tree: records organized by a fixed, ordered dimension schema
//!
//! ```text
//! lulesh -- arch1 -- gcc  -- O2 -- 1
//!                 |             '- 2
//!                 |       '- O3 -- 1
//!                 '- llvm -- O2 -- 1
//!                               '- 2
//! ```
//!
//! The schema is inferred from the first inserted identity and enforced for
//! every later insert. Children are kept in ordered maps so every traversal
//! is deterministic.

use crate::error::{AggregateError, Result};
use crate::record::{DimValue, DimensionKind, Identity, Label, MetricRecord, Metrics};
use crate::report::{MetricSummary, SummaryNode, TreeSummary};
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One level of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
}

/// Ordered dimension sequence shared by every identity in a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    dimensions: Vec<Dimension>,
}

impl Schema {
    /// Infer the schema from an identity
    pub fn infer(identity: &[Label]) -> Self {
        Self {
            dimensions: identity
                .iter()
                .map(|label| Dimension {
                    name: label.dimension.clone(),
                    kind: label.value.kind(),
                })
                .collect(),
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, depth: usize) -> Option<&Dimension> {
        self.dimensions.get(depth)
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Verify that an identity has this schema's shape
    pub fn check(&self, identity: &[Label]) -> Result<()> {
        let matches = identity.len() == self.dimensions.len()
            && identity
                .iter()
                .zip(&self.dimensions)
                .all(|(label, dim)| label.dimension == dim.name && label.value.kind() == dim.kind);

        if matches {
            Ok(())
        } else {
            Err(AggregateError::SchemaMismatch {
                expected: self.describe(),
                found: Schema::infer(identity).describe(),
            })
        }
    }

    fn describe(&self) -> String {
        self.dimensions
            .iter()
            .map(|d| format!("{}:{}", d.name, d.kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One dimension value at one depth
#[derive(Debug, Clone)]
pub struct CategoryNode {
    value: DimValue,
    children: BTreeMap<DimValue, CategoryNode>,
    /// Repeats of one configuration; only populated at leaf depth
    records: Vec<MetricRecord>,
}

impl CategoryNode {
    fn new(value: DimValue) -> Self {
        Self {
            value,
            children: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    pub fn value(&self) -> &DimValue {
        &self.value
    }

    pub fn child(&self, value: &DimValue) -> Option<&CategoryNode> {
        self.children.get(value)
    }

    /// Children in dimension-value order
    pub fn children(&self) -> impl Iterator<Item = &CategoryNode> {
        self.children.values()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Number of records stored in this subtree
    pub fn record_count(&self) -> usize {
        self.records.len()
            + self
                .children
                .values()
                .map(CategoryNode::record_count)
                .sum::<usize>()
    }
}

/// Hierarchical container of metric records for one aggregation run
#[derive(Debug, Clone)]
pub struct CategoryTree {
    schema: Option<Schema>,
    root: CategoryNode,
}

impl CategoryTree {
    /// Create an empty tree named after the run's benchmark
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            root: CategoryNode::new(DimValue::Categorical(name.into())),
        }
    }

    pub fn name(&self) -> String {
        self.root.value.to_string()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn root(&self) -> &CategoryNode {
        &self.root
    }

    pub fn record_count(&self) -> usize {
        self.root.record_count()
    }

    /// Insert one observation under its identity path
    pub fn insert(&mut self, identity: Identity, metrics: Metrics) -> Result<()> {
        self.insert_record(MetricRecord::new(identity, metrics))
    }

    /// Insert a record, creating intermediate nodes as needed
    ///
    /// Fails with `SchemaMismatch` when the identity's shape differs from the
    /// schema inferred on the first insert. The tree is untouched on failure.
    pub fn insert_record(&mut self, record: MetricRecord) -> Result<()> {
        let identity = record.identity();
        if identity.is_empty() {
            return Err(AggregateError::SchemaMismatch {
                expected: self
                    .schema
                    .as_ref()
                    .map(Schema::describe)
                    .unwrap_or_else(|| "at least one dimension".to_string()),
                found: String::new(),
            });
        }

        if self.schema.is_none() {
            debug!(schema = %Schema::infer(identity).describe(), "inferred schema");
        }
        self.schema
            .get_or_insert_with(|| Schema::infer(identity))
            .check(identity)?;

        let mut node = &mut self.root;
        for label in identity {
            node = node
                .children
                .entry(label.value.clone())
                .or_insert_with(|| CategoryNode::new(label.value.clone()));
        }
        node.records.push(record);
        Ok(())
    }

    /// Depth-first leaves in dimension-value order
    ///
    /// Lazy; call again to restart.
    pub fn leaves(&self) -> Leaves<'_> {
        let depth = self.schema.as_ref().map_or(0, Schema::len);
        let mut stack = Vec::new();
        if depth > 0 {
            for child in self.root.children.values().rev() {
                stack.push((vec![child.value.clone()], child));
            }
        }
        Leaves { stack, depth }
    }

    /// Nodes sharing every element of `path` except the one at `axis_depth`
    ///
    /// Returned nodes sit at depth `path.len()` and come with their own
    /// paths, ordered by the axis value. Empty when `axis_depth` is outside
    /// `path`.
    pub fn siblings_of(
        &self,
        path: &[DimValue],
        axis_depth: usize,
    ) -> Vec<(Vec<DimValue>, &CategoryNode)> {
        let depth = self.schema.as_ref().map_or(0, Schema::len);
        let mut out = Vec::new();
        if axis_depth >= path.len() || path.len() > depth {
            return out;
        }

        let mut prefix = Vec::with_capacity(path.len());
        collect_siblings(&self.root, 0, path, axis_depth, &mut prefix, &mut out);
        out
    }

    /// Tree view with record counts, and per-metric means at the leaves
    pub fn summary(&self) -> TreeSummary {
        let mut nodes = Vec::new();
        let dimensions = self
            .schema
            .as_ref()
            .map(|s| s.dimensions().to_vec())
            .unwrap_or_default();

        for child in self.root.children.values() {
            summarize_node(child, 0, &dimensions, &mut nodes);
        }

        TreeSummary {
            name: self.name(),
            schema: dimensions,
            record_count: self.record_count(),
            nodes,
        }
    }
}

fn collect_siblings<'a>(
    node: &'a CategoryNode,
    depth: usize,
    path: &[DimValue],
    axis_depth: usize,
    prefix: &mut Vec<DimValue>,
    out: &mut Vec<(Vec<DimValue>, &'a CategoryNode)>,
) {
    if depth == path.len() {
        out.push((prefix.clone(), node));
        return;
    }

    if depth == axis_depth {
        for child in node.children.values() {
            prefix.push(child.value.clone());
            collect_siblings(child, depth + 1, path, axis_depth, prefix, out);
            prefix.pop();
        }
    } else if let Some(child) = node.children.get(&path[depth]) {
        prefix.push(child.value.clone());
        collect_siblings(child, depth + 1, path, axis_depth, prefix, out);
        prefix.pop();
    }
}

fn summarize_node(
    node: &CategoryNode,
    depth: usize,
    dimensions: &[Dimension],
    out: &mut Vec<SummaryNode>,
) {
    let dimension = dimensions
        .get(depth)
        .map(|d| d.name.clone())
        .unwrap_or_default();

    let mut metrics = BTreeMap::new();
    if !node.records.is_empty() {
        let names: BTreeSet<&String> = node
            .records
            .iter()
            .flat_map(|r| r.metrics().keys())
            .collect();
        for name in names {
            let values: Vec<f64> = node.records.iter().filter_map(|r| r.metric(name)).collect();
            metrics.insert(
                name.clone(),
                MetricSummary {
                    count: values.len(),
                    mean: stats::mean(&values).unwrap_or(0.0),
                },
            );
        }
    }

    out.push(SummaryNode {
        depth,
        label: Label {
            dimension,
            value: node.value.clone(),
        },
        records: node.record_count(),
        metrics,
    });

    for child in node.children.values() {
        summarize_node(child, depth + 1, dimensions, out);
    }
}

/// Lazy depth-first iterator over `(path, records)` leaf pairs
pub struct Leaves<'a> {
    stack: Vec<(Vec<DimValue>, &'a CategoryNode)>,
    depth: usize,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (Vec<DimValue>, &'a [MetricRecord]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            if path.len() == self.depth {
                return Some((path, node.records.as_slice()));
            }
            for child in node.children.values().rev() {
                let mut child_path = path.clone();
                child_path.push(child.value.clone());
                self.stack.push((child_path, child));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetricValue;

    fn identity(toolchain: &str, opt: &str, cores: u64) -> Identity {
        vec![
            Label::new("benchmark", "lulesh"),
            Label::new("toolchain", toolchain),
            Label::new("opt", opt),
            Label::new("cores", cores),
        ]
    }

    fn metrics(value: f64) -> Metrics {
        let mut m = Metrics::new();
        m.insert("fom".to_string(), MetricValue::Float(value));
        m
    }

    fn sample_tree() -> CategoryTree {
        let mut tree = CategoryTree::new("lulesh");
        for (tc, opt) in [("gcc", "O2"), ("gcc", "O3"), ("llvm", "O2")] {
            for cores in [4, 1, 2] {
                tree.insert(identity(tc, opt, cores), metrics(cores as f64 * 100.0))
                    .unwrap();
            }
        }
        tree
    }

    #[test]
    fn test_insert_infers_schema() {
        let tree = sample_tree();
        let schema = tree.schema().unwrap();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.dimension(3).unwrap().name, "cores");
        assert_eq!(schema.dimension(3).unwrap().kind, DimensionKind::Ordinal);
        assert_eq!(schema.dimension(1).unwrap().kind, DimensionKind::Categorical);
        assert_eq!(tree.record_count(), 9);
    }

    #[test]
    fn test_leaves_ordered_by_value() {
        let tree = sample_tree();
        let paths: Vec<Vec<DimValue>> = tree.leaves().map(|(p, _)| p).collect();
        assert_eq!(paths.len(), 9);
        assert_eq!(
            paths[0],
            vec!["lulesh".into(), "gcc".into(), "O2".into(), DimValue::Ordinal(1)]
        );
        assert_eq!(paths[2][3], DimValue::Ordinal(4));
        assert_eq!(paths[8][1], DimValue::from("llvm"));
    }

    #[test]
    fn test_leaves_restartable() {
        let tree = sample_tree();
        let first: Vec<_> = tree.leaves().map(|(p, _)| p).collect();
        let second: Vec<_> = tree.leaves().map(|(p, _)| p).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeats_share_a_leaf() {
        let mut tree = CategoryTree::new("lulesh");
        tree.insert(identity("gcc", "O2", 1), metrics(1.0)).unwrap();
        tree.insert(identity("gcc", "O2", 1), metrics(2.0)).unwrap();

        let leaves: Vec<_> = tree.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].1.len(), 2);
    }

    #[test]
    fn test_schema_mismatch_length() {
        let mut tree = sample_tree();
        let short = vec![Label::new("benchmark", "lulesh")];
        let err = tree.insert(short, metrics(1.0)).unwrap_err();
        assert!(matches!(err, AggregateError::SchemaMismatch { .. }));
        assert_eq!(tree.record_count(), 9);
    }

    #[test]
    fn test_schema_mismatch_kind() {
        let mut tree = sample_tree();
        let mut id = identity("gcc", "O2", 1);
        id[3] = Label::new("cores", "four");
        let err = tree.insert(id, metrics(1.0)).unwrap_err();
        assert!(matches!(err, AggregateError::SchemaMismatch { .. }));
        assert_eq!(tree.leaves().count(), 9);
    }

    #[test]
    fn test_schema_mismatch_dimension_name() {
        let mut tree = sample_tree();
        let mut id = identity("gcc", "O2", 1);
        id[2] = Label::new("flags", "O2");
        assert!(tree.insert(id, metrics(1.0)).is_err());
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut tree = CategoryTree::new("lulesh");
        assert!(tree.insert(Vec::new(), metrics(1.0)).is_err());
        assert!(tree.schema().is_none());
    }

    #[test]
    fn test_siblings_of_axis() {
        let tree = sample_tree();
        let path = vec!["lulesh".into(), "gcc".into(), "O2".into(), DimValue::Ordinal(2)];

        // Vary toolchain, keep O2 and 2 cores
        let siblings = tree.siblings_of(&path, 1);
        let values: Vec<_> = siblings.iter().map(|(p, _)| p[1].clone()).collect();
        assert_eq!(values, vec![DimValue::from("gcc"), DimValue::from("llvm")]);

        // Vary cores
        let siblings = tree.siblings_of(&path, 3);
        assert_eq!(siblings.len(), 3);
        assert!(siblings.iter().all(|(_, n)| n.records().len() == 1));
    }

    #[test]
    fn test_siblings_of_interior_path() {
        let tree = sample_tree();
        let path = vec![DimValue::from("lulesh"), DimValue::from("gcc"), DimValue::from("O2")];
        let siblings = tree.siblings_of(&path, 2);
        assert_eq!(siblings.len(), 2);
        assert_eq!(siblings[1].1.value(), &DimValue::from("O3"));
    }

    #[test]
    fn test_siblings_of_out_of_range() {
        let tree = sample_tree();
        let path = vec![DimValue::from("lulesh")];
        assert!(tree.siblings_of(&path, 3).is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let tree = sample_tree();
        let summary = tree.summary();
        assert_eq!(summary.record_count, 9);
        assert_eq!(summary.nodes[0].records, 9);
        assert_eq!(summary.nodes[0].label.dimension, "benchmark");

        let leaf = summary.nodes.iter().find(|n| n.depth == 3).unwrap();
        assert_eq!(leaf.metrics["fom"].count, 1);
        assert!((leaf.metrics["fom"].mean - 100.0).abs() < 1e-3);
    }
}
