//! SQL transpiler for expressions.
//!
//! Converts [`Expr`] nodes into SQL fragments. Query-level compilation lives in
//! [`crate::query`] because it needs a [`Database`](crate::database::Database)
//! to resolve join schemas.

use crate::ast::*;

/// Trait for converting AST nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

/// Quote an output identifier (`"name"`).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

impl ToSql for Value {
    fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl ToSql for Expr {
    fn to_sql(&self) -> String {
        match self {
            Expr::Column { name, .. } if name == "*" => "*".to_string(),
            Expr::Column {
                name,
                table: Some(table),
            } => format!("{}.{}", table, name),
            Expr::Column { name, table: None } => name.clone(),
            Expr::Literal(value) => value.to_sql(),
            Expr::Binary { left, op, right } => {
                format!("( {} {} {} )", left.to_sql(), op, right.to_sql())
            }
            Expr::Unary { op, expr } => format!("( {} {} )", op, expr.to_sql()),
            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_sql()).collect();
                format!("{}({})", name, args.join(", "))
            }
            Expr::Cast { expr, type_name } => {
                format!("TRY_CAST( {} AS {} )", expr.to_sql(), type_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column() {
        assert_eq!(Expr::column("id").to_sql(), "id");
        assert_eq!(Expr::qualified("T1", "id").to_sql(), "T1.id");
        assert_eq!(Expr::column("*").to_sql(), "*");
        assert_eq!(Expr::qualified("T1", "*").to_sql(), "*");
    }

    #[test]
    fn test_literals() {
        assert_eq!(Expr::literal("abc").to_sql(), "'abc'");
        assert_eq!(Expr::literal(42).to_sql(), "42");
        assert_eq!(Expr::literal(0.5).to_sql(), "0.5");
    }

    #[test]
    fn test_binary_and_conditional_match() {
        let b = Expr::binary(Expr::column("id"), "+", Expr::literal(100));
        let c = Expr::conditional(Expr::column("id"), "+", Expr::literal(100));
        assert_eq!(b.to_sql(), "( id + 100 )");
        assert_eq!(b.to_sql(), c.to_sql());
    }

    #[test]
    fn test_unary() {
        let e = Expr::unary("-", Expr::column("delta"));
        assert_eq!(e.to_sql(), "( - delta )");
    }

    #[test]
    fn test_function() {
        let e = Expr::function(
            "COALESCE",
            vec![Expr::column("a"), Expr::column("b"), Expr::literal(0)],
        );
        assert_eq!(e.to_sql(), "COALESCE(a, b, 0)");
        assert_eq!(Expr::function("now", vec![]).to_sql(), "now()");
        assert_eq!(Expr::aggregate("COUNT", "*").to_sql(), "COUNT(*)");
    }

    #[test]
    fn test_cast_yields_null_on_failure() {
        let e = Expr::cast(Expr::column("raw"), "INTEGER");
        assert_eq!(e.to_sql(), "TRY_CAST( raw AS INTEGER )");
    }

    #[test]
    fn test_compile_is_stable() {
        let e = Expr::binary(
            Expr::function("LOWER", vec![Expr::column("Species")]),
            "=",
            Expr::literal("setosa"),
        );
        assert_eq!(e.to_sql(), e.to_sql());
        assert_eq!(e.to_string(), "( LOWER(Species) = 'setosa' )");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Total"), "\"Total\"");
    }
}
