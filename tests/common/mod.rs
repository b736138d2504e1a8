#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use sqlweave::prelude::*;

/// In-memory backend. Schemas are keyed by the exact SQL they answer, and
/// every call is recorded.
#[derive(Default)]
pub struct MockDatabase {
    schemas: HashMap<String, Vec<ColumnInfo>>,
    results: HashMap<String, ResultSet>,
    pub calls: RefCell<Vec<String>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `check_schema(sql)` with these `(name, type)` columns.
    pub fn with_schema(mut self, sql: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns.iter().map(|(n, t)| ColumnInfo::new(*n, *t)).collect();
        self.schemas.insert(sql.to_string(), columns);
        self
    }

    /// Shorthand for the schema of `SELECT * FROM table`.
    pub fn with_table(self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.with_schema(&format!("SELECT * FROM {}", table), columns)
    }

    pub fn with_result(mut self, sql: &str, rs: ResultSet) -> Self {
        self.results.insert(sql.to_string(), rs);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Database for MockDatabase {
    fn check_schema(&self, sql: &str) -> WeaveResult<Vec<ColumnInfo>> {
        self.calls.borrow_mut().push(sql.to_string());
        self.schemas
            .get(sql)
            .cloned()
            .ok_or_else(|| WeaveError::Database(format!("no such table in: {}", sql)))
    }

    fn run_query(&self, sql: &str, convert_datetimes: bool) -> WeaveResult<ResultSet> {
        self.calls.borrow_mut().push(sql.to_string());
        let mut rs = self
            .results
            .get(sql)
            .cloned()
            .ok_or_else(|| WeaveError::Execution(format!("unexpected query: {}", sql)))?;
        if convert_datetimes {
            sqlweave::database::convert_temporal_columns(&mut rs);
        }
        Ok(rs)
    }
}

pub fn gt(column: &str, n: i64) -> Expr {
    Expr::binary(Expr::column(column), ">", Expr::literal(n))
}
