//! Serialized expression trees.
//!
//! Hosts that cannot build [`Expr`] values directly exchange expressions as a
//! tagged tree of JSON records:
//!
//! ```text
//! {"operator": ">", "args": [{"name": "SepalLengthCm"}, {"literal": 5}]}
//! {"function": "ROUND", "args": [{"name": "PetalWidthCm"}]}
//! {"literal": "setosa"}
//! {"name": "Species"}
//! ```

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Value};
use crate::error::{WeaveError, WeaveResult};

/// One node of a serialized expression tree.
///
/// Extra keys (such as the `pos` offsets some editors attach) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprTree {
    Operator {
        operator: String,
        args: Vec<ExprTree>,
    },
    Function {
        function: String,
        #[serde(default)]
        args: Vec<ExprTree>,
    },
    Literal {
        literal: Value,
    },
    Name {
        name: String,
    },
}

impl ExprTree {
    pub fn name(name: impl Into<String>) -> Self {
        ExprTree::Name { name: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ExprTree::Literal {
            literal: value.into(),
        }
    }

    pub fn operator(operator: impl Into<String>, args: Vec<ExprTree>) -> Self {
        ExprTree::Operator {
            operator: operator.into(),
            args,
        }
    }

    pub fn function(function: impl Into<String>, args: Vec<ExprTree>) -> Self {
        ExprTree::Function {
            function: function.into(),
            args,
        }
    }

    /// Deserialize a tree from its JSON text.
    pub fn from_json(json: &str) -> WeaveResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| WeaveError::expression(format!("unrecognised expression tree: {}", e)))
    }

    pub fn to_json(&self) -> WeaveResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build the expression AST, converting arguments depth-first.
    pub fn to_expr(&self) -> WeaveResult<Expr> {
        match self {
            ExprTree::Operator { operator, args } => {
                let args = convert_args(args)?;
                let arity = args.len();
                let mut args = args.into_iter();
                match (args.next(), args.next()) {
                    (Some(operand), None) => Ok(Expr::unary(operator, operand)),
                    (Some(left), Some(right)) if arity == 2 => {
                        Ok(Expr::binary(left, operator, right))
                    }
                    _ => Err(WeaveError::expression(format!(
                        "operator '{}' takes 1 or 2 arguments, got {}",
                        operator, arity
                    ))),
                }
            }
            ExprTree::Function { function, args } => {
                Ok(Expr::function(function, convert_args(args)?))
            }
            ExprTree::Literal { literal } => Ok(Expr::Literal(literal.clone())),
            ExprTree::Name { name } => Ok(Expr::column(name)),
        }
    }
}

fn convert_args(args: &[ExprTree]) -> WeaveResult<Vec<Expr>> {
    args.iter().map(ExprTree::to_expr).collect()
}

impl TryFrom<&ExprTree> for Expr {
    type Error = WeaveError;

    fn try_from(tree: &ExprTree) -> WeaveResult<Expr> {
        tree.to_expr()
    }
}

/// Anything a transformation accepts in place of an expression.
///
/// `Ok(None)` marks an empty input; transformations treat it as a no-op and
/// hand back the receiving query unchanged. Serialized trees are parsed here,
/// at the point of use.
pub trait IntoExpr {
    fn into_expr(self) -> WeaveResult<Option<Expr>>;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        Ok(Some(self))
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        Ok(Some(self.clone()))
    }
}

impl IntoExpr for Option<Expr> {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        Ok(self)
    }
}

impl IntoExpr for ExprTree {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        self.to_expr().map(Some)
    }
}

impl IntoExpr for &ExprTree {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        self.to_expr().map(Some)
    }
}

/// JSON text of a serialized tree.
impl IntoExpr for &str {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        if self.trim().is_empty() {
            return Ok(None);
        }
        ExprTree::from_json(self)?.to_expr().map(Some)
    }
}

impl IntoExpr for &String {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        self.as_str().into_expr()
    }
}

impl IntoExpr for String {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        self.as_str().into_expr()
    }
}

impl IntoExpr for serde_json::Value {
    fn into_expr(self) -> WeaveResult<Option<Expr>> {
        match self {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => s.into_expr(),
            other => {
                let tree: ExprTree = serde_json::from_value(other).map_err(|e| {
                    WeaveError::expression(format!("unrecognised expression tree: {}", e))
                })?;
                tree.to_expr().map(Some)
            }
        }
    }
}
