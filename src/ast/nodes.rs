// This module defines the typed AST consumed by the code generator. Nodes are allocated in a
// bumpalo arena owned by the caller: child expressions are arena boxes, statement blocks and
// argument lists are arena vectors, and identifiers are arena strings. Every node has exactly
// one parent, so there are no cross-links between nodes; a call names its callee and the code
// generator looks the signature up in the function table. Every expression carries its resolved
// Type. Function signatures are owned values because they outlive the arena borrow inside the
// compile state's function table. The module also provides contains_calls, the recursive
// predicate that decides whether a function needs a frame record and whether a sub-expression
// must be shielded from clobbering by evaluating it into a temporary first.

//! Arena-allocated, fully typed AST.

use bumpalo::boxed::Box as BumpBox;
use bumpalo::collections::Vec as BumpVec;

use super::types::{BinaryOp, Type, UnaryOp};

/// Name of the system-trap pseudo function.
pub const SVC_CALLEE: &str = "svc";

/// Constant value of a literal expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Char(u8),
}

impl Literal {
    /// Raw 64-bit pattern materialized for this literal.
    pub fn bits(self) -> u64 {
        match self {
            Literal::Int(value) => value as u64,
            Literal::Char(value) => u64::from(value),
        }
    }

    pub fn ty(self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Char(_) => Type::Char,
        }
    }
}

/// An lvalue: either a named variable or a location reached through a pointer.
#[derive(Debug)]
pub enum Accessor<'a> {
    Identifier(&'a str),
    Dereference(BumpBox<'a, Expr<'a>>),
}

/// A call to a named function, or to the `svc` pseudo function.
#[derive(Debug)]
pub struct Call<'a> {
    pub callee: &'a str,
    pub args: BumpVec<'a, Expr<'a>>,
}

impl Call<'_> {
    pub fn is_svc(&self) -> bool {
        self.callee == SVC_CALLEE
    }
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    Literal(Literal),
    Accessor(Accessor<'a>),
    Call(Call<'a>),
    Binary {
        op: BinaryOp,
        lhs: BumpBox<'a, Expr<'a>>,
        rhs: BumpBox<'a, Expr<'a>>,
    },
    Unary {
        op: UnaryOp,
        operand: BumpBox<'a, Expr<'a>>,
    },
    ArrayLiteral(BumpVec<'a, Expr<'a>>),
    /// Reference to interned constant data; lowers to the data's address.
    StaticData(&'a str),
    /// No value; used by `return;`.
    Empty,
}

/// An expression together with its resolved type.
#[derive(Debug)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub ty: Type,
}

impl<'a> Expr<'a> {
    /// A literal expression; needs no arena.
    pub fn literal(literal: Literal) -> Self {
        Self { ty: literal.ty(), kind: ExprKind::Literal(literal) }
    }

    pub fn empty() -> Self {
        Self { kind: ExprKind::Empty, ty: Type::Void }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ExprKind::Empty)
    }

    /// Whether evaluating this expression performs a call or a system trap.
    pub fn contains_calls(&self) -> bool {
        match &self.kind {
            ExprKind::Call(_) => true,
            ExprKind::Accessor(Accessor::Dereference(inner)) => inner.contains_calls(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.contains_calls() || rhs.contains_calls(),
            ExprKind::Unary { operand, .. } => operand.contains_calls(),
            ExprKind::ArrayLiteral(elements) => elements.iter().any(Expr::contains_calls),
            ExprKind::Literal(_)
            | ExprKind::Accessor(Accessor::Identifier(_))
            | ExprKind::StaticData(_)
            | ExprKind::Empty => false,
        }
    }
}

#[derive(Debug)]
pub enum Stmt<'a> {
    Declaration {
        ty: Type,
        name: &'a str,
    },
    Initialization {
        ty: Type,
        name: &'a str,
        value: Expr<'a>,
    },
    Assignment {
        target: Accessor<'a>,
        value: Expr<'a>,
    },
    Return(Expr<'a>),
    Call(Call<'a>),
    If {
        cond: Expr<'a>,
        then_block: BumpVec<'a, Stmt<'a>>,
        else_block: BumpVec<'a, Stmt<'a>>,
    },
    While {
        cond: Expr<'a>,
        body: BumpVec<'a, Stmt<'a>>,
    },
    Break,
    Continue,
}

impl Stmt<'_> {
    pub fn contains_calls(&self) -> bool {
        match self {
            Stmt::Call(_) => true,
            Stmt::Initialization { value, .. } | Stmt::Return(value) => value.contains_calls(),
            Stmt::Assignment { target, value } => {
                let target_calls = match target {
                    Accessor::Dereference(pointer) => pointer.contains_calls(),
                    Accessor::Identifier(_) => false,
                };
                target_calls || value.contains_calls()
            }
            Stmt::If { cond, then_block, else_block } => {
                cond.contains_calls()
                    || block_contains_calls(then_block)
                    || block_contains_calls(else_block)
            }
            Stmt::While { cond, body } => cond.contains_calls() || block_contains_calls(body),
            Stmt::Declaration { .. } | Stmt::Break | Stmt::Continue => false,
        }
    }
}

pub fn block_contains_calls(block: &[Stmt<'_>]) -> bool {
    block.iter().any(Stmt::contains_calls)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
}

impl Param {
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Self { ty, name: name.into() }
    }
}

/// A function's return type, name and parameter list.
#[derive(Debug, Clone)]
pub struct FnSignature {
    pub return_type: Type,
    pub name: String,
    pub params: Vec<Param>,
}

impl FnSignature {
    pub fn new(return_type: Type, name: impl Into<String>, params: Vec<Param>) -> Self {
        Self { return_type, name: name.into(), params }
    }

    /// Two signatures agree when name, return type and parameter types match.
    /// Parameter names do not matter.
    pub fn same_types(&self, other: &FnSignature) -> bool {
        self.name == other.name
            && self.return_type == other.return_type
            && self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.ty == b.ty)
    }
}

/// A function definition: signature plus body.
#[derive(Debug)]
pub struct FnDef<'a> {
    pub signature: FnSignature,
    pub body: BumpVec<'a, Stmt<'a>>,
}

impl FnDef<'_> {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn contains_calls(&self) -> bool {
        block_contains_calls(&self.body)
    }
}
