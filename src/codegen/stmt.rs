// Statement and control-flow emission. Each statement is lowered once, left to right, using
// the frame allocator and expression lowering. Conditions of if and while are evaluated into
// x16 and compared against zero. If and while labels carry the value of their own global
// counter on the compile state, so nested and sibling constructs never share a label. While
// loops push their id on the frame's loop stack for the duration of the body, which is what
// break and continue resolve against.

//! Statement and control-flow emission.

use crate::aarch64::encoder::{SCRATCH0, SCRATCH1};
use crate::aarch64::function_codegen::FunctionCodegen;
use crate::ast::{Accessor, Expr, ExprKind, Stmt, Type};
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::RETURN_REG;
use crate::core::reservation::Reservation;

impl FunctionCodegen<'_> {
    pub fn emit_block(&mut self, block: &[Stmt<'_>]) -> CompileResult<()> {
        block.iter().try_for_each(|stmt| self.emit_stmt(stmt))
    }

    pub fn emit_stmt(&mut self, stmt: &Stmt<'_>) -> CompileResult<()> {
        match stmt {
            Stmt::Declaration { ty, name } => {
                self.frame()?.add_variable(ty.clone(), name)?;
                Ok(())
            }
            Stmt::Initialization { ty, name, value } => {
                if matches!(value.kind, ExprKind::ArrayLiteral(_)) && !ty.is_pointer() {
                    return Err(CompileError::type_violation(format!(
                        "Can't assign array to variable of type ({ty})"
                    )));
                }
                let var = self.frame()?.add_variable(ty.clone(), name)?;
                self.emit_value(&var, value)
            }
            Stmt::Assignment { target: Accessor::Identifier(name), value } => {
                let var = self.frame()?.get_variable(name)?;
                let tmp = self.frame()?.reserve_expr(var.ty.clone())?;
                self.emit_value(&tmp, value)?;
                self.body.copy(&tmp, &var)?;
                self.frame()?.unreserve_expr()
            }
            Stmt::Assignment { target: Accessor::Dereference(pointer), value } => {
                self.emit_store_through(pointer, value)
            }
            Stmt::Return(value) => self.emit_return(value),
            Stmt::Call(call) => self.emit_call(call, None),
            Stmt::If { cond, then_block, else_block } => {
                let id = self.cs.next_if_id();
                self.emit_condition(cond)?;
                self.body.b_cond("eq", format_args!("IF_FALSE_{id}"));
                self.body.label(format_args!("IF_TRUE_{id}"));
                self.emit_block(then_block)?;
                self.body.b(format_args!("IF_EXIT_{id}"));
                self.body.label(format_args!("IF_FALSE_{id}"));
                self.emit_block(else_block)?;
                self.body.label(format_args!("IF_EXIT_{id}"));
                Ok(())
            }
            Stmt::While { cond, body } => {
                let id = self.cs.next_while_id();
                self.body.label(format_args!("WHILE_COND_{id}"));
                self.emit_condition(cond)?;
                self.body.b_cond("eq", format_args!("WHILE_EXIT_{id}"));
                self.body.label(format_args!("WHILE_BODY_{id}"));

                self.frame()?.push_loop(id);
                let lowered = self.emit_block(body);
                self.frame()?.pop_loop();
                lowered?;

                self.body.b(format_args!("WHILE_COND_{id}"));
                self.body.label(format_args!("WHILE_EXIT_{id}"));
                Ok(())
            }
            Stmt::Break => {
                let id = self.innermost_loop("break")?;
                self.body.b(format_args!("WHILE_EXIT_{id}"));
                Ok(())
            }
            Stmt::Continue => {
                let id = self.innermost_loop("continue")?;
                self.body.b(format_args!("WHILE_COND_{id}"));
                Ok(())
            }
        }
    }

    /// Lower the value of a `return` into x0 and branch to the return label.
    pub fn emit_return(&mut self, value: &Expr<'_>) -> CompileResult<()> {
        let return_type = self.signature.return_type.clone();
        match (value.is_empty(), return_type.is_void()) {
            (true, true) => {}
            (true, false) => {
                return Err(CompileError::type_violation(format!(
                    "{} must return a value of type ({return_type})",
                    self.signature.name
                )))
            }
            (false, true) => {
                return Err(CompileError::type_violation(format!(
                    "{} returns void but a value was given",
                    self.signature.name
                )))
            }
            (false, false) => {
                let ret = Reservation::register(return_type.clone(), RETURN_REG);
                if value.contains_calls() {
                    let tmp = self.frame()?.reserve_expr(return_type)?;
                    self.emit_expr(&tmp, value)?;
                    self.body.copy(&tmp, &ret)?;
                    self.frame()?.unreserve_expr()?;
                } else {
                    self.emit_expr(&ret, value)?;
                }
            }
        }

        let label = self.return_label();
        self.body.b(label);
        Ok(())
    }

    /// `*pointer = value`. Both operands are kept in variable slots while the other is
    /// evaluated, then staged in x16/x17 for the indirect store.
    fn emit_store_through(&mut self, pointer: &Expr<'_>, value: &Expr<'_>) -> CompileResult<()> {
        let pointee = match pointer.ty.pointee() {
            Some(pointee) if pointee.is_storable() => pointee.clone(),
            _ => {
                return Err(CompileError::type_violation(format!(
                    "Tried to dereference non-pointer type ({})",
                    pointer.ty
                )))
            }
        };
        if matches!(value.kind, ExprKind::ArrayLiteral(_)) {
            return Err(CompileError::type_violation(
                "an array literal cannot be stored through a pointer",
            ));
        }

        let ptr_res = self.frame()?.reserve_variable(pointer.ty.clone())?;
        self.emit_value(&ptr_res, pointer)?;
        let val_res = self.frame()?.reserve_variable(pointee.clone())?;
        self.emit_value(&val_res, value)?;

        self.body.copy(&ptr_res, &ptr_res.in_register(SCRATCH0))?;
        self.body.copy(&val_res, &val_res.in_register(SCRATCH1))?;
        self.body.store_indirect(SCRATCH1, SCRATCH0, &pointee);

        self.frame()?.unreserve_variable()?;
        self.frame()?.unreserve_variable()
    }

    /// Evaluate a condition into x16 and compare it against zero.
    fn emit_condition(&mut self, cond: &Expr<'_>) -> CompileResult<()> {
        let res = Reservation::register(cond.ty.clone(), SCRATCH0);
        self.emit_value(&res, cond)?;
        self.body.cmp_zero(SCRATCH0);
        Ok(())
    }

    /// Lower an expression that must produce a value.
    fn emit_value(&mut self, target: &Reservation, value: &Expr<'_>) -> CompileResult<()> {
        if value.ty == Type::Void {
            return Err(CompileError::type_violation("Expression of type (void) used as a value"));
        }
        self.emit_expr(target, value)
    }

    fn innermost_loop(&mut self, keyword: &str) -> CompileResult<u32> {
        self.frame()?
            .current_loop()
            .ok_or_else(|| CompileError::type_violation(format!("{keyword} outside of a loop")))
    }
}
