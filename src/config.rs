//! Configuration loaded from `sqlweave.toml`.
//!
//! ```toml
//! database_url = "sqlite://iris.db"
//! format = "json"
//! convert_datetimes = true
//!
//! [operators]
//! binary = { "^" = 6, "ILIKE" = 3 }
//! unary = ["~"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{WeaveError, WeaveResult};
use crate::parser::{ExpressionParser, OperatorTable};

const FILE_NAME: &str = "sqlweave.toml";

/// How result rows are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Operators added on top of the default formula operator table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Binary operator to precedence (higher binds tighter)
    pub binary: BTreeMap<String, u8>,
    pub unary: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub database_url: Option<String>,
    pub format: OutputFormat,
    pub convert_datetimes: bool,
    pub operators: OperatorConfig,
}

impl WeaveConfig {
    pub fn from_toml(content: &str) -> WeaveResult<Self> {
        toml::from_str(content).map_err(|e| WeaveError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> WeaveResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WeaveError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Candidate locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlweave").join("config.toml"));
        }
        paths
    }

    /// Load `explicit` if given (it must exist), else the first file found on
    /// [`search_paths`](Self::search_paths), else defaults.
    pub fn load(explicit: Option<&Path>) -> WeaveResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn operator_table(&self) -> OperatorTable {
        let mut table = OperatorTable::default();
        for (op, precedence) in &self.operators.binary {
            table.add_binary(op, *precedence);
        }
        for op in &self.operators.unary {
            table.add_unary(op);
        }
        table
    }

    pub fn expression_parser(&self) -> ExpressionParser {
        ExpressionParser::new(self.operator_table())
    }
}
