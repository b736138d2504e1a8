use crate::ast::Expr;
use crate::database::Database;
use crate::error::WeaveResult;
use crate::query::{Aggregate, ColumnAlias, INDENT, Query, subquery};
use crate::transpiler::{ToSql, quote_ident};

/// One SELECT level over a source query.
///
/// Each transformation either extends this level (a copy with the same
/// source) or nests it (a fresh level whose source is this one), so that a
/// compiled level never carries two clauses that would conflict:
///
/// | Transformation | Nests when |
/// |---|---|
/// | `with_aliases` | derived columns are present |
/// | `add_derived_column` | never |
/// | `add_where_clause` | a sample or aggregation is present |
/// | `add_sample_rows` | a sample is present |
/// | `summarise` | always, unless called on a bare table |
#[derive(Debug, Clone, PartialEq)]
pub struct BaseQuery {
    source: Box<Query>,
    where_clauses: Vec<Expr>,
    columns: Vec<ColumnAlias>,
    derived_columns: Vec<(String, Expr)>,
    group_by: Vec<String>,
    include_all_columns: bool,
    sample_rows: Option<u64>,
    summarised: bool,
}

impl BaseQuery {
    /// A fresh level selecting every column of `source`.
    pub fn wrap(source: Query) -> Self {
        Self {
            source: Box::new(source),
            where_clauses: Vec::new(),
            columns: Vec::new(),
            derived_columns: Vec::new(),
            group_by: Vec::new(),
            include_all_columns: true,
            sample_rows: None,
            summarised: false,
        }
    }

    pub fn source(&self) -> &Query {
        &self.source
    }

    pub fn where_clauses(&self) -> &[Expr] {
        &self.where_clauses
    }

    pub fn columns(&self) -> &[ColumnAlias] {
        &self.columns
    }

    pub fn derived_columns(&self) -> &[(String, Expr)] {
        &self.derived_columns
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn includes_all_columns(&self) -> bool {
        self.include_all_columns
    }

    pub fn sample_rows(&self) -> Option<u64> {
        self.sample_rows
    }

    pub fn is_summarised(&self) -> bool {
        self.summarised
    }

    fn nest(&self) -> Self {
        Self::wrap(Query::Base(self.clone()))
    }

    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let aliases = names.iter().map(|n| ColumnAlias::keep(n.as_ref())).collect();
        self.with_aliases(aliases)
    }

    pub fn with_aliases(&self, aliases: Vec<ColumnAlias>) -> Self {
        if aliases.is_empty() {
            return self.clone();
        }
        let mut bq = if self.derived_columns.is_empty() {
            self.clone()
        } else {
            tracing::trace!("nesting aliases over derived columns");
            self.nest()
        };
        bq.include_all_columns = false;
        bq.columns = aliases;
        bq
    }

    pub fn add_derived_column(&self, name: &str, expr: Expr) -> Self {
        let mut bq = self.clone();
        bq.derived_columns.push((name.to_string(), expr));
        bq
    }

    pub fn add_where_clause(&self, expr: Expr) -> Self {
        let mut bq = if self.sample_rows.is_some() || self.summarised {
            tracing::trace!("nesting where clause below sample or aggregation");
            self.nest()
        } else {
            self.clone()
        };
        bq.where_clauses.push(expr);
        bq
    }

    pub fn add_sample_rows(&self, rows: u64) -> Self {
        let mut bq = if self.sample_rows.is_some() {
            tracing::trace!("nesting sample over sample");
            self.nest()
        } else {
            self.clone()
        };
        bq.sample_rows = Some(rows);
        bq
    }

    /// Group by `keys` and append one derived column per aggregate. Keys stay
    /// in the projection under their own names.
    pub fn summarise<S: AsRef<str>>(&self, keys: &[S], aggregates: &[Aggregate], nest: bool) -> Self {
        let mut bq = if nest { self.nest() } else { self.clone() };
        bq.group_by = keys.iter().map(|k| k.as_ref().to_string()).collect();
        for agg in aggregates {
            bq.derived_columns.push((agg.output.clone(), agg.to_expr()));
        }
        bq.columns = bq
            .group_by
            .iter()
            .map(|k| ColumnAlias::renamed(k.as_str(), k.as_str()))
            .collect();
        bq.include_all_columns = false;
        bq.summarised = true;
        bq
    }

    fn projection(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if self.include_all_columns {
            columns.push("*".to_string());
        }
        for c in &self.columns {
            match &c.alias {
                Some(alias) => columns.push(format!("{} AS {}", c.expr.to_sql(), quote_ident(alias))),
                None => columns.push(c.expr.to_sql()),
            }
        }
        for (name, expr) in &self.derived_columns {
            columns.push(format!("{} AS {}", expr.to_sql(), quote_ident(name)));
        }
        if columns.is_empty() {
            columns.push("*".to_string());
        }
        columns
    }

    pub fn compile(&self, db: &dyn Database, outer: bool, depth: usize) -> WeaveResult<String> {
        let indent = INDENT.repeat(depth);
        let mut lines = vec![
            format!("{}SELECT {}", indent, self.projection().join(", ")),
            format!("{}FROM {}", indent, self.source.compile(db, false, depth + 1)?),
        ];

        if !self.where_clauses.is_empty() {
            let conditions: Vec<String> = self.where_clauses.iter().map(|w| w.to_sql()).collect();
            lines.push(format!("{}WHERE {}", indent, conditions.join(" AND ")));
        }

        if !self.group_by.is_empty() {
            let keys: Vec<String> = self.group_by.iter().map(|k| quote_ident(k)).collect();
            lines.push(format!("{}GROUP BY {}", indent, keys.join(", ")));
        }

        if let Some(n) = self.sample_rows {
            lines.push(format!("{}USING SAMPLE {} ROWS", indent, n));
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
    use crate::query::tests::NoBackend;
    use pretty_assertions::assert_eq;

    fn iris() -> BaseQuery {
        BaseQuery::wrap(Query::table("iris"))
    }

    fn gt(col: &str, n: i64) -> Expr {
        Expr::binary(Expr::column(col), ">", Expr::literal(n))
    }

    #[test]
    fn test_wrap_selects_everything() {
        let bq = iris();
        assert!(bq.includes_all_columns());
        assert_eq!(bq.compile(&NoBackend, true, 0).unwrap(), "SELECT *\nFROM iris");
    }

    #[test]
    fn test_where_clauses_accumulate_at_same_level() {
        let bq = iris().add_where_clause(gt("a", 1)).add_where_clause(gt("b", 2));
        assert_eq!(bq.where_clauses().len(), 2);
        assert_eq!(bq.source(), &Query::table("iris"));
        assert_eq!(
            bq.compile(&NoBackend, true, 0).unwrap(),
            "SELECT *\nFROM iris\nWHERE ( a > 1 ) AND ( b > 2 )"
        );
    }

    #[test]
    fn test_where_after_sample_nests() {
        let sampled = iris().add_sample_rows(10);
        let filtered = sampled.add_where_clause(gt("a", 1));
        assert_eq!(filtered.source(), &Query::Base(sampled.clone()));
        assert!(filtered.sample_rows().is_none());
        assert_eq!(filtered.where_clauses().len(), 1);
    }

    #[test]
    fn test_where_after_summarise_nests() {
        let summary = iris().summarise(&["Species"], &[Aggregate::new("COUNT", "*", "n")], false);
        let filtered = summary.add_where_clause(gt("n", 10));
        assert_eq!(filtered.source(), &Query::Base(summary));
        assert!(!filtered.is_summarised());
    }

    #[test]
    fn test_derived_column_never_nests() {
        let bq = iris()
            .add_sample_rows(5)
            .add_derived_column("double", Expr::binary(Expr::column("a"), "*", Expr::literal(2)));
        assert_eq!(bq.source(), &Query::table("iris"));
        assert_eq!(bq.derived_columns().len(), 1);
        assert_eq!(bq.sample_rows(), Some(5));
    }

    #[test]
    fn test_aliases_after_derived_column_nest() {
        let derived = iris().add_derived_column("x2", Expr::binary(Expr::column("x"), "*", Expr::literal(2)));
        let aliased = derived.with_aliases(vec![ColumnAlias::renamed("x2", "doubled")]);
        assert_eq!(aliased.source(), &Query::Base(derived));
        assert!(aliased.derived_columns().is_empty());
        assert!(!aliased.includes_all_columns());
    }

    #[test]
    fn test_aliases_without_derived_columns_replace_projection() {
        let bq = iris()
            .select_columns(&["a", "b"])
            .with_aliases(vec![ColumnAlias::renamed("a", "A")]);
        assert_eq!(bq.source(), &Query::table("iris"));
        assert_eq!(bq.columns(), &[ColumnAlias::renamed("a", "A")]);
    }

    #[test]
    fn test_sample_twice_nests() {
        let bq = iris().add_sample_rows(10).add_sample_rows(5);
        assert_eq!(bq.sample_rows(), Some(5));
        assert_eq!(
            bq.compile(&NoBackend, true, 0).unwrap(),
            "SELECT *\n\
             FROM (\n\
             \x20   SELECT *\n\
             \x20   FROM iris\n\
             \x20   USING SAMPLE 10 ROWS\n\
             )\n\
             USING SAMPLE 5 ROWS"
        );
    }

    #[test]
    fn test_summarise_nests_by_default_flag() {
        let bq = iris().add_where_clause(gt("a", 1));
        let nested = bq.summarise(&["k"], &[], true);
        assert_eq!(nested.source(), &Query::Base(bq.clone()));
        let flat = bq.summarise(&["k"], &[], false);
        assert_eq!(flat.source(), &Query::table("iris"));
        assert_eq!(flat.where_clauses().len(), 1);
    }

    #[test]
    fn test_summarise_state() {
        let bq = iris().summarise(
            &["Species"],
            &[Aggregate::new("MEAN", "SepalLengthCm", "MeanSepalLengthCm")],
            true,
        );
        assert_eq!(bq.group_by(), &["Species".to_string()]);
        assert_eq!(bq.columns(), &[ColumnAlias::renamed("Species", "Species")]);
        assert_eq!(
            bq.derived_columns(),
            &[(
                "MeanSepalLengthCm".to_string(),
                Expr::aggregate("MEAN", "SepalLengthCm")
            )]
        );
        assert!(bq.is_summarised());
        assert!(!bq.includes_all_columns());
    }

    #[test]
    fn test_empty_projection_falls_back_to_star() {
        let bq = iris().summarise::<&str>(&[], &[], false);
        assert_eq!(
            bq.compile(&NoBackend, true, 0).unwrap(),
            "SELECT *\nFROM iris"
        );
    }

    #[test]
    fn test_nested_group_by_stays_inside_subquery() {
        let bq = iris()
            .summarise(&["Species"], &[Aggregate::new("COUNT", "*", "n")], false)
            .add_where_clause(gt("n", 10));
        assert_eq!(
            bq.compile(&NoBackend, true, 0).unwrap(),
            "SELECT *\n\
             FROM (\n\
             \x20   SELECT Species AS \"Species\", COUNT(*) AS \"n\"\n\
             \x20   FROM iris\n\
             \x20   GROUP BY \"Species\"\n\
             )\n\
             WHERE ( n > 10 )"
        );
    }

    #[test]
    fn test_receiver_is_untouched() {
        let bq = iris().add_where_clause(gt("a", 1));
        let before = bq.compile(&NoBackend, true, 0).unwrap();
        let _ = bq.add_where_clause(gt("b", 2));
        let _ = bq.add_sample_rows(3);
        let _ = bq.add_derived_column("c", Expr::literal(1));
        let _ = bq.select_columns(&["a"]);
        let _ = bq.summarise(&["a"], &[], true);
        assert_eq!(bq.compile(&NoBackend, true, 0).unwrap(), before);
    }
}
