//! Step-chain descriptions.
//!
//! A pipeline names a source and the transformations applied to it, in
//! order. It is the file format the `sqlweave` binary reads:
//!
//! ```json
//! {
//!   "source": {"table": "iris"},
//!   "steps": [
//!     {"where": "SepalLengthCm > 5"},
//!     {"derive": {"name": "ratio", "expression": "SepalLengthCm / SepalWidthCm"}},
//!     {"summarise": {"keys": ["Species"], "aggregates": [["AVG", "ratio", "mean_ratio"]]}}
//!   ]
//! }
//! ```
//!
//! Formulas are either text (parsed with [`ExpressionParser`]) or serialized
//! expression trees.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, ExprTree};
use crate::error::{WeaveError, WeaveResult};
use crate::parser::ExpressionParser;
use crate::query::{Aggregate, ColumnAlias, JoinCriterion, Query};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub source: Source,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Table(String),
    Join {
        left: Box<Pipeline>,
        right: Box<Pipeline>,
        on: Vec<JoinSpec>,
    },
}

/// A join key: a shared column name, or an explicit `[left, op, right]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinSpec {
    Shared(String),
    Criterion(String, String, String),
}

/// A projected column: kept as is, or `[column, alias]` where a null alias
/// also keeps the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasSpec {
    Keep(String),
    Pair(String, Option<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Formula {
    Text(String),
    Tree(ExprTree),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SelectColumns(Vec<String>),
    Aliases(Vec<AliasSpec>),
    Where(Formula),
    Derive {
        name: String,
        expression: Formula,
    },
    Sample(u64),
    Summarise {
        keys: Vec<String>,
        #[serde(default)]
        aggregates: Vec<(String, String, String)>,
    },
}

impl Formula {
    /// `None` for blank text, which the transformations treat as a no-op.
    pub fn to_expr(&self, parser: &ExpressionParser) -> WeaveResult<Option<Expr>> {
        match self {
            Formula::Text(text) if text.trim().is_empty() => Ok(None),
            Formula::Text(text) => parser.parse_expr(text).map(Some),
            Formula::Tree(tree) => tree.to_expr().map(Some),
        }
    }
}

impl From<&JoinSpec> for JoinCriterion {
    fn from(spec: &JoinSpec) -> Self {
        match spec {
            JoinSpec::Shared(column) => JoinCriterion::on(column.as_str()),
            JoinSpec::Criterion(left, op, right) => {
                JoinCriterion::new(left.as_str(), op.as_str(), right.as_str())
            }
        }
    }
}

impl From<&AliasSpec> for ColumnAlias {
    fn from(spec: &AliasSpec) -> Self {
        match spec {
            AliasSpec::Keep(column) | AliasSpec::Pair(column, None) => {
                ColumnAlias::keep(column.as_str())
            }
            AliasSpec::Pair(column, Some(alias)) => {
                ColumnAlias::renamed(column.as_str(), alias.as_str())
            }
        }
    }
}

impl Source {
    pub fn build(&self, parser: &ExpressionParser) -> WeaveResult<Query> {
        match self {
            Source::Table(name) if name.trim().is_empty() => {
                Err(WeaveError::Pipeline("table name is empty".to_string()))
            }
            Source::Table(name) => Ok(Query::table(name.as_str())),
            Source::Join { on, .. } if on.is_empty() => Err(WeaveError::Pipeline(
                "a join needs at least one column to join on".to_string(),
            )),
            Source::Join { left, right, on } => {
                let left = left.build(parser)?;
                let right = right.build(parser)?;
                Ok(left.join(&right, on.iter().map(JoinCriterion::from).collect()))
            }
        }
    }
}

impl Step {
    pub fn apply(&self, query: &Query, parser: &ExpressionParser) -> WeaveResult<Query> {
        match self {
            Step::SelectColumns(names) => Ok(query.select_columns(names)),
            Step::Aliases(specs) => Ok(query.with_aliases(specs.iter().map(ColumnAlias::from).collect())),
            Step::Where(formula) => query.add_where_clause(formula.to_expr(parser)?),
            Step::Derive { name, .. } if name.trim().is_empty() => Ok(query.clone()),
            Step::Derive { name, expression } => {
                query.add_derived_column(name, expression.to_expr(parser)?)
            }
            Step::Sample(rows) => Ok(query.add_sample_rows(*rows)),
            Step::Summarise { keys, aggregates } => {
                let aggregates: Vec<Aggregate> = aggregates
                    .iter()
                    .map(|(function, column, output)| {
                        Aggregate::new(function.as_str(), column.as_str(), output.as_str())
                    })
                    .collect();
                Ok(query.summarise(keys, &aggregates))
            }
        }
    }
}

impl Pipeline {
    pub fn from_json(content: &str) -> WeaveResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> WeaveResult<Self> {
        toml::from_str(content).map_err(|e| WeaveError::Pipeline(e.to_string()))
    }

    /// Load a `.toml` or JSON pipeline file.
    pub fn from_file(path: &Path) -> WeaveResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Fold the steps over the source.
    pub fn build(&self, parser: &ExpressionParser) -> WeaveResult<Query> {
        let source = self.source.build(parser)?;
        self.steps
            .iter()
            .try_fold(source, |query, step| step.apply(&query, parser))
    }
}
