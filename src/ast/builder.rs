//! Typed construction of AST nodes.
//!
//! [`AstBuilder`] is what a front end (or a test) uses to build the tree the code
//! generator consumes. Type checks that belong to node construction happen here:
//! operator legality, void operands, dereferencing non-pointers, array literals bound
//! to non-pointer declarations. Pointer arithmetic is normalized here too: when a `+`
//! or `-` has exactly one pointer operand, the integer operand is wrapped in a multiply
//! by the pointee size, so lowering never has to know about scaling.

use bumpalo::boxed::Box as BumpBox;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use super::nodes::{Accessor, Call, Expr, ExprKind, FnDef, FnSignature, Literal, Stmt, SVC_CALLEE};
use super::types::{BinaryOp, Type, UnaryOp};
use crate::core::error::{CompileError, CompileResult};

/// Builds arena-allocated AST nodes with construction-time type checking.
#[derive(Clone, Copy)]
pub struct AstBuilder<'a> {
    arena: &'a Bump,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    fn boxed(&self, expr: Expr<'a>) -> BumpBox<'a, Expr<'a>> {
        BumpBox::new_in(expr, self.arena)
    }

    fn name(&self, name: &str) -> &'a str {
        self.arena.alloc_str(name)
    }

    pub fn block(&self, stmts: impl IntoIterator<Item = Stmt<'a>>) -> BumpVec<'a, Stmt<'a>> {
        BumpVec::from_iter_in(stmts, self.arena)
    }

    // ---- expressions ----

    pub fn int(&self, value: i64) -> Expr<'a> {
        Expr::literal(Literal::Int(value))
    }

    pub fn char(&self, value: u8) -> Expr<'a> {
        Expr::literal(Literal::Char(value))
    }

    pub fn empty(&self) -> Expr<'a> {
        Expr::empty()
    }

    /// A named variable of the given (already resolved) type.
    pub fn var(&self, name: &str, ty: Type) -> Expr<'a> {
        Expr {
            kind: ExprKind::Accessor(Accessor::Identifier(self.name(name))),
            ty,
        }
    }

    /// `*pointer` as an accessor.
    pub fn deref(&self, pointer: Expr<'a>) -> CompileResult<Expr<'a>> {
        let ty = dereferenced_type(&pointer.ty)?;
        Ok(Expr {
            kind: ExprKind::Accessor(Accessor::Dereference(self.boxed(pointer))),
            ty,
        })
    }

    /// Call to `callee`, whose declared return type the front end resolved.
    pub fn call(
        &self,
        callee: &str,
        return_type: Type,
        args: impl IntoIterator<Item = Expr<'a>>,
    ) -> Expr<'a> {
        Expr {
            kind: ExprKind::Call(self.call_node(callee, args)),
            ty: return_type,
        }
    }

    /// System trap: the first argument is the trap number, the rest are passed in
    /// argument registers.
    pub fn svc(&self, args: impl IntoIterator<Item = Expr<'a>>) -> Expr<'a> {
        self.call(SVC_CALLEE, Type::Int, args)
    }

    fn call_node(&self, callee: &str, args: impl IntoIterator<Item = Expr<'a>>) -> Call<'a> {
        Call {
            callee: self.name(callee),
            args: BumpVec::from_iter_in(args, self.arena),
        }
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr<'a>, rhs: Expr<'a>) -> CompileResult<Expr<'a>> {
        if !lhs.ty.valid_binary_op(op, &rhs.ty) {
            return Err(CompileError::type_violation(format!(
                "Can't apply binary operator {op} to ({}) and ({})",
                lhs.ty, rhs.ty
            )));
        }
        let ty = lhs.ty.binary_result(op, &rhs.ty);

        let lhs_pointee = lhs.ty.pointee().map(Type::size);
        let rhs_pointee = rhs.ty.pointee().map(Type::size);
        let (lhs, rhs) = match (lhs_pointee, rhs_pointee) {
            _ if op.is_comparison() => (lhs, rhs),
            (Some(scale), None) => (lhs, self.scaled(rhs, scale)),
            (None, Some(scale)) => (self.scaled(lhs, scale), rhs),
            _ => (lhs, rhs),
        };

        Ok(Expr {
            kind: ExprKind::Binary { op, lhs: self.boxed(lhs), rhs: self.boxed(rhs) },
            ty,
        })
    }

    /// Synthetic `offset * scale` used for pointer arithmetic.
    fn scaled(&self, offset: Expr<'a>, scale: u64) -> Expr<'a> {
        if scale == 1 {
            return offset;
        }
        let ty = offset.ty.binary_result(BinaryOp::Mul, &Type::Int);
        let scale = self.int(scale as i64);
        Expr {
            kind: ExprKind::Binary {
                op: BinaryOp::Mul,
                lhs: self.boxed(offset),
                rhs: self.boxed(scale),
            },
            ty,
        }
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr<'a>) -> CompileResult<Expr<'a>> {
        if !operand.ty.valid_unary_op(op) {
            return Err(CompileError::type_violation(format!(
                "Can't apply unary operator {op} to ({})",
                operand.ty
            )));
        }
        if op == UnaryOp::AddrOf
            && !matches!(operand.kind, ExprKind::Accessor(Accessor::Identifier(_)))
        {
            return Err(CompileError::type_violation(
                "Can only take the address of a named variable",
            ));
        }

        let ty = operand.ty.unary_result(op);
        Ok(Expr {
            kind: ExprKind::Unary { op, operand: self.boxed(operand) },
            ty,
        })
    }

    /// Array literal whose value is a pointer to its first element.
    pub fn array(
        &self,
        element_type: Type,
        elements: impl IntoIterator<Item = Expr<'a>>,
    ) -> CompileResult<Expr<'a>> {
        if !element_type.is_storable() {
            return Err(CompileError::type_violation(format!(
                "Can't build an array of ({element_type})"
            )));
        }
        let elements = BumpVec::from_iter_in(elements, self.arena);
        if let Some(bad) = elements.iter().find(|e| e.ty.is_void()) {
            return Err(CompileError::type_violation(format!(
                "Array element of type ({}) has no value",
                bad.ty
            )));
        }
        Ok(Expr {
            kind: ExprKind::ArrayLiteral(elements),
            ty: Type::pointer_to(element_type),
        })
    }

    /// Reference to a constant string; its value is a `char*`.
    pub fn string(&self, text: &str) -> Expr<'a> {
        Expr {
            kind: ExprKind::StaticData(self.name(text)),
            ty: Type::pointer_to(Type::Char),
        }
    }

    // ---- statements ----

    pub fn declare(&self, ty: Type, name: &str) -> CompileResult<Stmt<'a>> {
        check_variable_type(&ty)?;
        Ok(Stmt::Declaration { ty, name: self.name(name) })
    }

    pub fn initialize(&self, ty: Type, name: &str, value: Expr<'a>) -> CompileResult<Stmt<'a>> {
        check_variable_type(&ty)?;
        if matches!(value.kind, ExprKind::ArrayLiteral(_)) && !ty.is_pointer() {
            return Err(CompileError::type_violation(format!(
                "Can't assign array to variable of type ({ty})"
            )));
        }
        check_has_value(&value)?;
        Ok(Stmt::Initialization { ty, name: self.name(name), value })
    }

    pub fn assign(&self, name: &str, value: Expr<'a>) -> CompileResult<Stmt<'a>> {
        check_has_value(&value)?;
        Ok(Stmt::Assignment { target: Accessor::Identifier(self.name(name)), value })
    }

    /// `*pointer = value`.
    pub fn assign_through(&self, pointer: Expr<'a>, value: Expr<'a>) -> CompileResult<Stmt<'a>> {
        dereferenced_type(&pointer.ty)?;
        check_has_value(&value)?;
        if matches!(value.kind, ExprKind::ArrayLiteral(_)) {
            return Err(CompileError::type_violation(
                "an array literal cannot be stored through a pointer",
            ));
        }
        Ok(Stmt::Assignment {
            target: Accessor::Dereference(self.boxed(pointer)),
            value,
        })
    }

    pub fn ret(&self, value: Expr<'a>) -> Stmt<'a> {
        Stmt::Return(value)
    }

    pub fn call_stmt(&self, callee: &str, args: impl IntoIterator<Item = Expr<'a>>) -> Stmt<'a> {
        Stmt::Call(self.call_node(callee, args))
    }

    pub fn svc_stmt(&self, args: impl IntoIterator<Item = Expr<'a>>) -> Stmt<'a> {
        self.call_stmt(SVC_CALLEE, args)
    }

    pub fn if_else(
        &self,
        cond: Expr<'a>,
        then_block: impl IntoIterator<Item = Stmt<'a>>,
        else_block: impl IntoIterator<Item = Stmt<'a>>,
    ) -> CompileResult<Stmt<'a>> {
        check_has_value(&cond)?;
        Ok(Stmt::If {
            cond,
            then_block: self.block(then_block),
            else_block: self.block(else_block),
        })
    }

    pub fn while_loop(
        &self,
        cond: Expr<'a>,
        body: impl IntoIterator<Item = Stmt<'a>>,
    ) -> CompileResult<Stmt<'a>> {
        check_has_value(&cond)?;
        Ok(Stmt::While { cond, body: self.block(body) })
    }

    pub fn brk(&self) -> Stmt<'a> {
        Stmt::Break
    }

    pub fn cont(&self) -> Stmt<'a> {
        Stmt::Continue
    }

    pub fn function(
        &self,
        signature: FnSignature,
        body: impl IntoIterator<Item = Stmt<'a>>,
    ) -> FnDef<'a> {
        FnDef { signature, body: self.block(body) }
    }
}

fn dereferenced_type(pointer: &Type) -> CompileResult<Type> {
    if !pointer.valid_unary_op(UnaryOp::Deref) {
        return Err(CompileError::type_violation(format!(
            "Can't dereference non-pointer type ({pointer})"
        )));
    }
    Ok(pointer.unary_result(UnaryOp::Deref))
}

fn check_variable_type(ty: &Type) -> CompileResult<()> {
    if ty.is_void() {
        return Err(CompileError::type_violation("Can't declare variable with void type"));
    }
    Ok(())
}

fn check_has_value(expr: &Expr<'_>) -> CompileResult<()> {
    if expr.ty.is_void() {
        return Err(CompileError::type_violation("Expression of type (void) used as a value"));
    }
    Ok(())
}
