use crate::ast::Value;
use serde::{Deserialize, Serialize};

/// A node of the expression AST.
///
/// Expressions are immutable and compile to the same SQL fragment every time
/// (see [`ToSql`](crate::transpiler::ToSql)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference, optionally qualified by a table alias. `*` is the wildcard.
    Column { name: String, table: Option<String> },
    /// Literal value (string, number, bool, null)
    Literal(Value),
    /// Binary or conditional expression (left op right)
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    /// Prefix operator (op expr)
    Unary { op: String, expr: Box<Expr> },
    /// Function call with zero or more arguments
    Function { name: String, args: Vec<Expr> },
    /// Conversion that yields NULL instead of failing
    Cast { expr: Box<Expr>, type_name: String },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column {
            name: name.into(),
            table: None,
        }
    }

    /// Column qualified by a table alias (`T1.id`).
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            name: name.into(),
            table: Some(table.into()),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: impl Into<String>, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op: op.into(),
            right: Box::new(right),
        }
    }

    /// Comparison used in WHERE clauses. Compiles exactly like [`Expr::binary`].
    pub fn conditional(left: Expr, op: impl Into<String>, right: Expr) -> Self {
        Self::binary(left, op, right)
    }

    pub fn unary(op: impl Into<String>, expr: Expr) -> Self {
        Expr::Unary {
            op: op.into(),
            expr: Box::new(expr),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn cast(expr: Expr, type_name: impl Into<String>) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            type_name: type_name.into(),
        }
    }

    /// Aggregate call such as `SUM(SepalLengthCm)` or `COUNT(*)`.
    pub fn aggregate(func: impl Into<String>, column: impl Into<String>) -> Self {
        Self::function(func, vec![Self::column(column)])
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Expr::Column { name, .. } if name == "*")
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::transpiler::ToSql;
        write!(f, "{}", self.to_sql())
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}
