//! Expression AST.
//!
//! - [`Expr`]: the compiled-to-SQL expression nodes
//! - [`Value`]: scalar literals
//! - [`ExprTree`]: the serialized tagged-tree form exchanged with hosts

pub mod expr;
pub mod tree;
pub mod values;

pub use expr::*;
pub use tree::*;
pub use values::*;
