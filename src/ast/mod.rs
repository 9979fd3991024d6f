//! The typed AST consumed by code generation.
//!
//! Parsing is not part of this crate; a front end builds these nodes with
//! [`AstBuilder`], which also performs the construction-time type checks.

pub mod builder;
pub mod nodes;
pub mod types;

pub use builder::AstBuilder;
pub use nodes::{
    block_contains_calls, Accessor, Call, Expr, ExprKind, FnDef, FnSignature, Literal, Param,
    Stmt, SVC_CALLEE,
};
pub use types::{BinaryOp, Type, UnaryOp, WORD_SIZE};
