use crate::error::ParseError;
use crate::record::{DimValue, DimensionKind, Identity, Label};
use crate::source::LogSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// One file-name-derived dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(default)]
    pub kind: DimensionKind,
}

impl DimensionSpec {
    pub fn categorical(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DimensionKind::Categorical,
        }
    }

    pub fn ordinal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DimensionKind::Ordinal,
        }
    }
}

/// Derives identity labels for a log source
///
/// Identity = `benchmark=<run>`, then `<source_dimension>=<log dir name>`
/// when configured, then the file stem split on `separator` and mapped onto
/// `dimensions`. Trailing extra parts are repeat tags (`gcc-O2-4-r2.log`).
///
/// # Example TOML
/// ```toml
/// [identity]
/// separator = "-"
/// source_dimension = "machine"
/// dimensions = [
///     { name = "toolchain" },
///     { name = "opt" },
///     { name = "cores", kind = "ordinal" },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityTemplate {
    pub separator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dimension: Option<String>,
    pub dimensions: Vec<DimensionSpec>,
}

impl Default for IdentityTemplate {
    fn default() -> Self {
        Self {
            separator: "-".to_string(),
            source_dimension: Some("machine".to_string()),
            dimensions: vec![
                DimensionSpec::categorical("toolchain"),
                DimensionSpec::categorical("opt"),
                DimensionSpec::ordinal("cores"),
            ],
        }
    }
}

impl IdentityTemplate {
    pub fn validate(&self) -> Result<(), String> {
        if self.separator.is_empty() {
            return Err("identity separator must not be empty".to_string());
        }
        if self.dimensions.is_empty() {
            return Err("identity needs at least one file name dimension".to_string());
        }

        let mut names = BTreeSet::new();
        names.insert("benchmark");
        let source = self.source_dimension.iter().map(String::as_str);
        for name in source.chain(self.dimensions.iter().map(|d| d.name.as_str())) {
            if name.is_empty() {
                return Err("identity dimension names must not be empty".to_string());
            }
            if !names.insert(name) {
                return Err(format!("duplicate identity dimension '{}'", name));
            }
        }
        Ok(())
    }

    /// Derive the identity of `source` within the run named `benchmark`
    pub fn identity(&self, benchmark: &str, source: &LogSource) -> Result<Identity, ParseError> {
        let fail = |reason: String| ParseError::Identity {
            filename: source.filename.clone(),
            reason,
        };

        let name = Path::new(&source.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.split('.').next().unwrap_or_default();
        let parts: Vec<&str> = stem
            .split(self.separator.as_str())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < self.dimensions.len() {
            return Err(fail(format!(
                "expected {} '{}'-separated parts, found {}",
                self.dimensions.len(),
                self.separator,
                parts.len()
            )));
        }

        let mut identity = vec![Label::new("benchmark", benchmark)];
        if let Some(name) = &self.source_dimension {
            let dir = Path::new(&source.directory)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.directory.clone());
            identity.push(Label::new(name.as_str(), dir.as_str()));
        }

        for (spec, part) in self.dimensions.iter().zip(&parts) {
            let value = match spec.kind {
                DimensionKind::Categorical => DimValue::Categorical(part.to_string()),
                DimensionKind::Ordinal => {
                    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                    let scale = digits.parse::<u64>().map_err(|_| {
                        fail(format!("'{}' is not numeric for '{}'", part, spec.name))
                    })?;
                    DimValue::Ordinal(scale)
                }
            };
            identity.push(Label {
                dimension: spec.name.clone(),
                value,
            });
        }

        Ok(identity)
    }
}
