use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::database::Database;
use crate::error::WeaveResult;
use crate::query::{INDENT, Query, subquery};
use crate::transpiler::{ToSql, quote_ident};

const LEFT_ALIAS: &str = "T1";
const RIGHT_ALIAS: &str = "T2";

/// `left op right`, comparing a column of the first query with one of the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCriterion {
    pub left: String,
    pub op: String,
    pub right: String,
}

impl JoinCriterion {
    pub fn new(left: impl Into<String>, op: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            op: op.into(),
            right: right.into(),
        }
    }

    /// Equality on a column both sides share.
    pub fn on(column: impl Into<String>) -> Self {
        let column = column.into();
        Self::new(column.clone(), "=", column)
    }

    /// True when the right column would duplicate the left one in the output.
    fn is_shared_key(&self) -> bool {
        self.op == "=" && self.left == self.right
    }
}

/// Inner join of two queries, aliased `T1` and `T2`.
///
/// Right-side columns that are equated with an identically named left-side
/// column are left out of the projection.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTable {
    left: Box<Query>,
    right: Box<Query>,
    criteria: Vec<JoinCriterion>,
    conditions: Vec<Expr>,
    dropped: BTreeSet<String>,
}

impl JoinTable {
    pub fn new(left: Query, right: Query, criteria: Vec<JoinCriterion>) -> Self {
        let conditions = criteria
            .iter()
            .map(|c| {
                Expr::conditional(
                    Expr::qualified(LEFT_ALIAS, quote_ident(&c.left)),
                    &c.op,
                    Expr::qualified(RIGHT_ALIAS, quote_ident(&c.right)),
                )
            })
            .collect();
        let dropped = criteria
            .iter()
            .filter(|c| c.is_shared_key())
            .map(|c| c.right.clone())
            .collect();

        Self {
            left: Box::new(left),
            right: Box::new(right),
            criteria,
            conditions,
            dropped,
        }
    }

    pub fn left(&self) -> &Query {
        &self.left
    }

    pub fn right(&self) -> &Query {
        &self.right
    }

    pub fn criteria(&self) -> &[JoinCriterion] {
        &self.criteria
    }

    /// Right-side columns omitted from the projection.
    pub fn dropped_columns(&self) -> &BTreeSet<String> {
        &self.dropped
    }

    /// Compile the join. Resolves both sides' schemas through `db`.
    pub fn compile(&self, db: &dyn Database, outer: bool, depth: usize) -> WeaveResult<String> {
        let left_cols = self.left.get_schema(db)?;
        let right_cols = self.right.get_schema(db)?;

        let projection: Vec<String> = left_cols
            .iter()
            .map(|c| format!("{}.{}", LEFT_ALIAS, quote_ident(&c.name)))
            .chain(
                right_cols
                    .iter()
                    .filter(|c| !self.dropped.contains(&c.name))
                    .map(|c| format!("{}.{}", RIGHT_ALIAS, quote_ident(&c.name))),
            )
            .collect();

        let indent = INDENT.repeat(depth);
        let mut lines = vec![
            format!("{}SELECT {}", indent, projection.join(", ")),
            format!(
                "{}FROM {} {}, {} {}",
                indent,
                self.left.compile(db, false, depth + 1)?,
                LEFT_ALIAS,
                self.right.compile(db, false, depth + 1)?,
                RIGHT_ALIAS
            ),
        ];

        if !self.conditions.is_empty() {
            let conditions: Vec<String> = self.conditions.iter().map(|c| c.to_sql()).collect();
            lines.push(format!("{}WHERE {}", indent, conditions.join(" AND ")));
        }

        let body = lines.join("\n");
        if outer {
            Ok(body)
        } else {
            Ok(subquery(&body, depth))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_reference_positional_aliases() {
        let jt = JoinTable::new(
            Query::table("a"),
            Query::table("b"),
            vec![JoinCriterion::new("id", "=", "a_id"), JoinCriterion::new("ts", "<", "ts")],
        );
        let sql: Vec<String> = jt.conditions.iter().map(|c| c.to_sql()).collect();
        assert_eq!(
            sql,
            vec!["( T1.\"id\" = T2.\"a_id\" )", "( T1.\"ts\" < T2.\"ts\" )"]
        );
    }

    #[test]
    fn test_only_shared_equality_keys_are_dropped() {
        let jt = JoinTable::new(
            Query::table("a"),
            Query::table("b"),
            vec![
                JoinCriterion::on("id"),
                JoinCriterion::new("x", "=", "y"),
                JoinCriterion::new("ts", ">=", "ts"),
            ],
        );
        assert_eq!(
            jt.dropped_columns().iter().collect::<Vec<_>>(),
            vec!["id"]
        );
    }
}
