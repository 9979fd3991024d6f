// Expression lowering. emit_expr lowers an expression tree so that its value ends up in a
// target reservation, recursing through operands with expression reservations for the
// intermediate values. Pointer scaling has already been made explicit by the AST builder,
// so arithmetic here is plain integer arithmetic. Calls place their arguments in x0..x7:
// arguments that themselves contain calls are evaluated into expression reservations
// before any argument register is written, the remaining arguments are lowered straight
// into their registers, and the shielded values are copied in last. The live expression
// registers are saved around the branch and restored before the result is copied out of
// x0. The svc pseudo-call passes its trap number in x16 and traps directly.

//! Expression lowering.

use crate::aarch64::calling_convention::{emit_load_caller, emit_save_caller, CCAssigner};
use crate::aarch64::encoder::SCRATCH0;
use crate::aarch64::function_codegen::FunctionCodegen;
use crate::ast::{Accessor, Call, Expr, ExprKind, FnSignature, Type, UnaryOp};
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::{Register, SYSCALL_REG};
use crate::core::reservation::Reservation;
use crate::core::session::CompileState;

/// Trap immediate of the platform system-call instruction.
pub const SVC_IMMEDIATE: u16 = 0x80;

impl FunctionCodegen<'_> {
    /// Lower `expr` so that its value ends up in `target`.
    pub fn emit_expr(&mut self, target: &Reservation, expr: &Expr<'_>) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Literal(literal) => self.body.put_value(target, literal.bits()),
            ExprKind::Accessor(Accessor::Identifier(name)) => {
                let var = self.frame()?.get_variable(name)?;
                self.body.copy(&var, target)
            }
            ExprKind::Accessor(Accessor::Dereference(pointer)) => {
                self.emit_unary_expr(UnaryOp::Deref, target, pointer)
            }
            ExprKind::Call(call) => self.emit_call(call, Some(target)),
            ExprKind::Binary { op, lhs, rhs } => {
                if !lhs.ty.valid_binary_op(*op, &rhs.ty) {
                    return Err(CompileError::type_violation(format!(
                        "Can't apply binary operator {op} to ({}) and ({})",
                        lhs.ty, rhs.ty
                    )));
                }

                let lhs_res = self.frame()?.reserve_expr(expr.ty.clone())?;
                self.emit_expr(&lhs_res, lhs)?;
                let rhs_res = self.frame()?.reserve_expr(rhs.ty.clone())?;
                self.emit_expr(&rhs_res, rhs)?;
                self.emit_binary_op(*op, target, &lhs_res, &rhs_res)?;
                self.frame()?.unreserve_expr()?;
                self.frame()?.unreserve_expr()
            }
            ExprKind::Unary { op: UnaryOp::AddrOf, operand } => {
                self.emit_address_of(target, operand)
            }
            ExprKind::Unary { op, operand } => self.emit_unary_expr(*op, target, operand),
            ExprKind::ArrayLiteral(elements) => self.emit_array(target, &expr.ty, elements),
            ExprKind::StaticData(text) => {
                let label = self.cs.intern_string(text);
                let reg = target.as_register().unwrap_or(SCRATCH0);
                self.body.page_address(reg, &label);
                self.body.copy(&target.in_register(reg), target)
            }
            ExprKind::Empty => Ok(()),
        }
    }

    /// Evaluate `operand`, then apply `op` to it. A register target holds the operand in
    /// place; a frame target would be too narrow for a pointer, so the operand goes to an
    /// expression reservation instead.
    fn emit_unary_expr(
        &mut self,
        op: UnaryOp,
        target: &Reservation,
        operand: &Expr<'_>,
    ) -> CompileResult<()> {
        if !operand.ty.valid_unary_op(op) {
            return Err(CompileError::type_violation(format!(
                "Can't apply unary operator {op} to ({})",
                operand.ty
            )));
        }

        match target.as_register() {
            Some(reg) => {
                let operand_res = Reservation::register(operand.ty.clone(), reg);
                self.emit_expr(&operand_res, operand)?;
                self.emit_unary_op(op, target, &operand_res)
            }
            None => {
                let operand_res = self.frame()?.reserve_expr(operand.ty.clone())?;
                self.emit_expr(&operand_res, operand)?;
                self.emit_unary_op(op, target, &operand_res)?;
                self.frame()?.unreserve_expr()
            }
        }
    }

    /// `target = fp - offset(variable)`, without reading the variable.
    fn emit_address_of(&mut self, target: &Reservation, operand: &Expr<'_>) -> CompileResult<()> {
        let ExprKind::Accessor(Accessor::Identifier(name)) = &operand.kind else {
            return Err(CompileError::type_violation(
                "Can only take the address of a named variable",
            ));
        };
        let var = self.frame()?.get_variable(name)?;
        let offset = var
            .stack_offset()
            .ok_or_else(|| CompileError::internal(format!("variable {name} is not in the frame")))?;

        let reg = target.as_register().unwrap_or(SCRATCH0);
        self.body.frame_address(reg, offset);
        self.body.copy(&target.in_register(reg), target)
    }

    /// Lay out the elements in fresh variable slots, last element first so the array ends
    /// up at ascending addresses, and yield the address of the first element.
    fn emit_array(
        &mut self,
        target: &Reservation,
        pointer_type: &Type,
        elements: &[Expr<'_>],
    ) -> CompileResult<()> {
        let element_type = pointer_type
            .pointee()
            .cloned()
            .ok_or_else(|| CompileError::internal("array literal without a pointer type"))?;
        if elements.is_empty() {
            return Err(CompileError::type_violation("Array literal has no elements"));
        }

        let mut slots = Vec::with_capacity(elements.len());
        for _ in elements {
            slots.push(self.frame()?.reserve_variable(element_type.clone())?);
        }
        slots.reverse();

        for (slot, element) in slots.iter().zip(elements) {
            self.emit_expr(slot, element)?;
        }

        let base = slots[0]
            .stack_offset()
            .ok_or_else(|| CompileError::internal("array element outside the frame"))?;
        let reg = target.as_register().unwrap_or(SCRATCH0);
        self.body.frame_address(reg, base);
        self.body.copy(&target.in_register(reg), target)
    }

    /// Emit a call. With a target the result is copied out of x0, without one it is
    /// discarded.
    pub fn emit_call(&mut self, call: &Call<'_>, target: Option<&Reservation>) -> CompileResult<()> {
        if call.is_svc() {
            return self.emit_svc(call, target);
        }

        let signature = self.cs.get_fn_decl(call.callee)?.clone();
        if signature.params.len() != call.args.len() {
            return Err(CompileError::type_violation(format!(
                "{} expects {} argument(s), got {}",
                signature.name,
                signature.params.len(),
                call.args.len()
            )));
        }
        for (param, arg) in signature.params.iter().zip(call.args.iter()) {
            if !is_assignable(&param.ty, &arg.ty) {
                return Err(CompileError::type_violation(format!(
                    "Argument {} of {} expects ({}), got ({})",
                    param.name, signature.name, param.ty, arg.ty
                )));
            }
        }
        if target.is_some() && signature.return_type.is_void() {
            return Err(CompileError::type_violation(format!(
                "{} returns void and has no value",
                signature.name
            )));
        }

        self.cs.mark_builtin_used(call.callee);
        let regs = self.cc.assign_args(call.args.len())?;
        self.place_args(&call.args, &regs)?;

        let live = self.frame()?.live_expr_registers();
        emit_save_caller(&mut self.body, &live);
        let label = self.cs.fn_label(call.callee);
        self.body.bl(label);
        emit_load_caller(&mut self.body, &live);
        self.cs.record_call();
        self.cs.record_caller_saves(live.len());

        if let Some(target) = target {
            let ret = Reservation::register(signature.return_type, self.cc.assign_ret());
            self.body.copy(&ret, target)?;
        }
        Ok(())
    }

    /// `svc(number, args...)`: arguments in x0.., trap number in x16, result in x0.
    fn emit_svc(&mut self, call: &Call<'_>, target: Option<&Reservation>) -> CompileResult<()> {
        let Some((number, args)) = call.args.split_first() else {
            return Err(CompileError::type_violation("svc needs a trap number"));
        };
        let regs = self.cc.assign_args(args.len())?;

        // x16 is clobbered while placing arguments, so the number goes in last.
        let shielded = if number.contains_calls() {
            let tmp = self.frame()?.reserve_expr(Type::Int)?;
            self.emit_expr(&tmp, number)?;
            Some(tmp)
        } else {
            None
        };

        self.place_args(args, &regs)?;

        let syscall = Reservation::register(Type::Int, SYSCALL_REG);
        match shielded {
            Some(tmp) => {
                self.body.copy(&tmp, &syscall)?;
                self.frame()?.unreserve_expr()?;
            }
            None => self.emit_expr(&syscall, number)?,
        }

        self.body.svc(SVC_IMMEDIATE);
        self.cs.record_call();

        if let Some(target) = target {
            let ret = Reservation::register(Type::Int, self.cc.assign_ret());
            self.body.copy(&ret, target)?;
        }
        Ok(())
    }

    /// Put `args[i]` into `regs[i]` so that no nested call clobbers a register that has
    /// already been written.
    fn place_args(&mut self, args: &[Expr<'_>], regs: &[Register]) -> CompileResult<()> {
        let mut shielded = Vec::new();
        for (arg, &reg) in args.iter().zip(regs) {
            if arg.contains_calls() {
                let tmp = self.frame()?.reserve_expr(arg.ty.clone())?;
                self.emit_expr(&tmp, arg)?;
                shielded.push((tmp, reg));
            }
        }

        for (arg, &reg) in args.iter().zip(regs) {
            if !arg.contains_calls() {
                self.emit_expr(&Reservation::register(arg.ty.clone(), reg), arg)?;
            }
        }

        for (tmp, reg) in &shielded {
            self.body.copy(tmp, &tmp.in_register(*reg))?;
        }
        for _ in &shielded {
            self.frame()?.unreserve_expr()?;
        }
        Ok(())
    }
}

/// Whether a value of type `value` may be passed where `slot` is expected. Integer types
/// convert freely; pointers must match exactly.
fn is_assignable(slot: &Type, value: &Type) -> bool {
    let integer = |ty: &Type| matches!(ty, Type::Int | Type::Char);
    slot == value || (integer(slot) && integer(value))
}

/// Lower a single expression into `target` inside a scratch function context and return
/// the emitted text. Variables referenced by `expr` are bound first from `locals`.
pub fn emit_into(
    cs: &mut CompileState,
    locals: &[(Type, &str)],
    target: &Reservation,
    expr: &Expr<'_>,
) -> CompileResult<String> {
    cs.push_frame();
    let result = emit_into_frame(cs, locals, target, expr);
    cs.pop_frame()?;
    result
}

fn emit_into_frame(
    cs: &mut CompileState,
    locals: &[(Type, &str)],
    target: &Reservation,
    expr: &Expr<'_>,
) -> CompileResult<String> {
    for (ty, name) in locals {
        cs.frame()?.add_variable(ty.clone(), name)?;
    }
    let signature = FnSignature::new(expr.ty.clone(), "expr", vec![]);
    let mut cg = FunctionCodegen::new(cs, signature);
    cg.emit_expr(target, expr)?;
    if cg.frame()?.expr_depth() != 0 {
        return Err(CompileError::internal("expression reservations leaked"));
    }
    Ok(cg.body.into_string())
}
