// Operator emission. Both emitters work on reservations that already hold their operands:
// the destination is used directly when it is a register and staged through x16 otherwise,
// a right-hand operand living in the frame is loaded into x17 first. A one-byte result is
// truncated in the register, so it reads the same whether it stays there or goes through a
// byte store. The result is copied back to a frame destination at the end.

//! Binary and unary operator emission.

use crate::aarch64::encoder::{SCRATCH0, SCRATCH1};
use crate::aarch64::function_codegen::FunctionCodegen;
use crate::ast::{BinaryOp, Type, UnaryOp};
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::Register;
use crate::core::reservation::Reservation;

impl FunctionCodegen<'_> {
    /// `dst = lhs <op> rhs`. Division and comparisons are signed.
    pub fn emit_binary_op(
        &mut self,
        op: BinaryOp,
        dst: &Reservation,
        lhs: &Reservation,
        rhs: &Reservation,
    ) -> CompileResult<()> {
        let dst_reg = dst.as_register().unwrap_or(SCRATCH0);
        let staged = dst.in_register(dst_reg);
        self.body.copy(lhs, &staged)?;
        let src = self.register_operand(rhs)?;

        if let Some(cond) = op.condition_code() {
            self.body.inst(format_args!("cmp {dst_reg}, {src}"));
            self.body.inst(format_args!("cset {dst_reg}, {cond}"));
        } else if let Some(mnemonic) = op.mnemonic() {
            self.body.inst(format_args!("{mnemonic} {dst_reg}, {dst_reg}, {src}"));
        } else {
            return Err(CompileError::internal(format!("no instruction for operator {op}")));
        }
        self.truncate_to(&lhs.ty.binary_result(op, &rhs.ty), dst_reg);

        self.body.copy(&staged, dst)
    }

    /// `dst = <op> operand`. Address-of never reaches here; it needs the operand's storage,
    /// not its value.
    pub fn emit_unary_op(
        &mut self,
        op: UnaryOp,
        dst: &Reservation,
        operand: &Reservation,
    ) -> CompileResult<()> {
        let dst_reg = dst.as_register().unwrap_or(SCRATCH0);
        let staged = dst.in_register(dst_reg);
        let src = self.register_operand(operand)?;

        match op {
            UnaryOp::Neg => {
                self.body.inst(format_args!("neg {dst_reg}, {src}"));
                self.truncate_to(&operand.ty, dst_reg);
            }
            UnaryOp::Not => {
                self.body.cmp_zero(src);
                self.body.inst(format_args!("cset {dst_reg}, eq"));
            }
            UnaryOp::BitNot => {
                self.body.inst(format_args!("mvn {dst_reg}, {src}"));
                self.truncate_to(&operand.ty, dst_reg);
            }
            UnaryOp::Deref => {
                let pointee = operand.ty.pointee().cloned().ok_or_else(|| {
                    CompileError::type_violation(format!(
                        "Can't dereference non-pointer type ({})",
                        operand.ty
                    ))
                })?;
                self.body.load_indirect(dst_reg, src, &pointee);
            }
            UnaryOp::AddrOf => {
                return Err(CompileError::internal("address-of lowered as a value operation"))
            }
        }

        self.body.copy(&staged, dst)
    }

    /// Zero-extend the low byte of `reg` when the result has type `ty` of one byte.
    fn truncate_to(&mut self, ty: &Type, reg: Register) {
        if ty.size() == 1 {
            self.body.inst(format_args!("and {reg}, {reg}, #0xff"));
        }
    }

    /// Register holding `res`, loading frame values into x17.
    fn register_operand(&mut self, res: &Reservation) -> CompileResult<Register> {
        match res.as_register() {
            Some(reg) => Ok(reg),
            None => {
                self.body.copy(res, &res.in_register(SCRATCH1))?;
                Ok(SCRATCH1)
            }
        }
    }
}
