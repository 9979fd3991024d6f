// This module implements StackFrame, the compile-time allocator for one function body. It
// hands out storage for two nested scopes. Variable reservations back named locals and
// parameters and always live in the frame, below the saved frame record. Expression
// reservations back intermediate values of a single expression: the first eight go to the
// caller-saved expression register bank, later ones spill to frame slots. Every stack slot is
// allocated with an aligned bump of a running position counter; the padding each bump consumed
// is pushed so the matching pop restores the counter exactly. The running position's maximum is
// tracked as the high-water mark and later becomes the frame size. Pushing or popping a variable
// reservation while expression reservations are outstanding breaks the LIFO discipline the
// whole allocator rests on and is reported as an internal error. The frame also carries the
// symbol table (identifier to reservation) and the stack of active loop ids used to resolve
// break and continue.

//! Per-function storage allocation.

use hashbrown::HashMap;

use super::error::{CompileError, CompileResult};
use super::register_file::{RegSet, Register, EXPR_REGS};
use super::reservation::Reservation;
use crate::ast::Type;

/// Compile-time bookkeeping for one function body.
#[derive(Debug, Default)]
pub struct StackFrame {
    /// Named locals and parameters, in allocation order.
    variable_reservations: Vec<Reservation>,
    /// Temporaries of the expression currently being lowered.
    expr_reservations: Vec<Reservation>,
    /// Expression-bank registers currently handed out.
    live_regs: RegSet,
    symbols: HashMap<String, Reservation>,
    /// Bytes currently allocated below the frame pointer.
    stack_pos: u64,
    /// High-water mark of `stack_pos`.
    max_stack_pos: u64,
    /// Padding consumed by each live stack slot, innermost last.
    paddings: Vec<u64>,
    /// Ids of the enclosing `while` loops, innermost last.
    loop_ids: Vec<u32>,
    /// Expression reservations that did not fit in the register bank.
    expr_spills: usize,
}

impl StackFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a stack slot for `ty` aligned to its own size. Returns the slot's offset
    /// below the frame pointer.
    fn bump(&mut self, ty: &Type) -> CompileResult<i64> {
        let size = ty.size();
        if size == 0 {
            return Err(CompileError::type_violation(format!(
                "cannot allocate storage for a value of type {ty}"
            )));
        }

        let padding = (size - self.stack_pos % size) % size;
        self.stack_pos += padding + size;
        self.max_stack_pos = self.max_stack_pos.max(self.stack_pos);
        self.paddings.push(padding);
        Ok(self.stack_pos as i64)
    }

    /// Release the most recent stack slot of type `ty`.
    fn release(&mut self, ty: &Type) -> CompileResult<()> {
        let padding = self
            .paddings
            .pop()
            .ok_or_else(|| CompileError::internal("stack slot released twice"))?;
        let consumed = padding + ty.size();
        self.stack_pos = self
            .stack_pos
            .checked_sub(consumed)
            .ok_or_else(|| CompileError::internal("stack position underflow"))?;
        Ok(())
    }

    fn check_no_expr_reservations(&self, action: &str) -> CompileResult<()> {
        if self.expr_reservations.is_empty() {
            Ok(())
        } else {
            Err(CompileError::internal(format!(
                "cannot {action} a variable while {} expression reservation(s) are outstanding",
                self.expr_reservations.len()
            )))
        }
    }

    pub fn reserve_variable(&mut self, ty: Type) -> CompileResult<Reservation> {
        self.check_no_expr_reservations("reserve")?;
        let offset = self.bump(&ty)?;
        let res = Reservation::stack(ty, offset);
        log::trace!("reserve variable {res}");
        self.variable_reservations.push(res.clone());
        Ok(res)
    }

    pub fn unreserve_variable(&mut self) -> CompileResult<()> {
        self.check_no_expr_reservations("unreserve")?;
        let res = self
            .variable_reservations
            .pop()
            .ok_or_else(|| CompileError::internal("no variable reservation to release"))?;
        log::trace!("unreserve variable {res}");
        self.release(&res.ty)
    }

    /// Reserve storage for an intermediate value. Registers from the expression bank are
    /// used first; once all are live, values spill to the frame.
    pub fn reserve_expr(&mut self, ty: Type) -> CompileResult<Reservation> {
        if !ty.is_storable() {
            return Err(CompileError::type_violation(format!(
                "an expression of type {ty} has no value to hold"
            )));
        }

        let depth = self.expr_reservations.len();
        let res = match self.live_regs.first_free(&EXPR_REGS) {
            Some(reg) => {
                self.live_regs.insert(reg);
                Reservation::register(ty, reg)
            }
            None => {
                let offset = self.bump(&ty)?;
                self.expr_spills += 1;
                Reservation::stack(ty, offset)
            }
        };
        log::trace!("reserve expression #{depth} {res}");
        self.expr_reservations.push(res.clone());
        Ok(res)
    }

    pub fn unreserve_expr(&mut self) -> CompileResult<()> {
        let res = self
            .expr_reservations
            .pop()
            .ok_or_else(|| CompileError::internal("no expression reservation to release"))?;
        log::trace!("unreserve expression {res}");
        match res.as_register() {
            Some(reg) => self.live_regs.remove(reg),
            None => self.release(&res.ty)?,
        }
        Ok(())
    }

    /// Bind `name` to a fresh variable reservation. A later declaration of the same name
    /// rebinds it.
    pub fn add_variable(&mut self, ty: Type, name: &str) -> CompileResult<Reservation> {
        let res = self.reserve_variable(ty)?;
        self.symbols.insert(name.to_owned(), res.clone());
        Ok(res)
    }

    pub fn get_variable(&self, name: &str) -> CompileResult<Reservation> {
        self.symbols
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedVariable { name: name.to_owned() })
    }

    /// Registers currently holding live expression values, in allocation order.
    pub fn live_expr_registers(&self) -> Vec<Register> {
        EXPR_REGS.iter().copied().filter(|&reg| self.live_regs.contains(reg)).collect()
    }

    pub fn expr_depth(&self) -> usize {
        self.expr_reservations.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variable_reservations.len()
    }

    pub fn push_loop(&mut self, id: u32) {
        self.loop_ids.push(id);
    }

    pub fn pop_loop(&mut self) -> Option<u32> {
        self.loop_ids.pop()
    }

    /// Id of the innermost enclosing loop.
    pub fn current_loop(&self) -> Option<u32> {
        self.loop_ids.last().copied()
    }

    pub fn stack_pos(&self) -> u64 {
        self.stack_pos
    }

    pub fn high_water(&self) -> u64 {
        self.max_stack_pos
    }

    pub fn expr_spills(&self) -> usize {
        self.expr_spills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_variables_are_aligned_and_popped_exactly() {
        let mut frame = StackFrame::new();
        let c = frame.reserve_variable(Type::Char).unwrap();
        assert_eq!(c.stack_offset(), Some(1));

        let i = frame.reserve_variable(Type::Int).unwrap();
        assert_eq!(i.stack_offset(), Some(16));
        assert_eq!(frame.stack_pos(), 16);

        frame.unreserve_variable().unwrap();
        assert_eq!(frame.stack_pos(), 1);
        frame.unreserve_variable().unwrap();
        assert_eq!(frame.stack_pos(), 0);
        assert_eq!(frame.high_water(), 16);
    }

    #[test]
    fn test_expr_reservations_use_register_bank_then_spill() {
        let mut frame = StackFrame::new();
        let mut reservations = Vec::new();
        for _ in 0..10 {
            reservations.push(frame.reserve_expr(Type::Int).unwrap());
        }

        for (res, reg) in reservations.iter().zip(EXPR_REGS) {
            assert_eq!(res.as_register(), Some(reg));
        }
        assert_eq!(reservations[8].stack_offset(), Some(8));
        assert_eq!(reservations[9].stack_offset(), Some(16));
        assert_eq!(frame.live_expr_registers().len(), 8);
        assert_eq!(frame.expr_spills(), 2);

        for _ in 0..10 {
            frame.unreserve_expr().unwrap();
        }
        assert_eq!(frame.stack_pos(), 0);
        assert_eq!(frame.high_water(), 16);
        assert!(frame.live_expr_registers().is_empty());
    }

    #[test]
    fn test_released_register_is_reused() {
        let mut frame = StackFrame::new();
        frame.reserve_expr(Type::Int).unwrap();
        frame.reserve_expr(Type::Char).unwrap();
        assert_eq!(
            frame.live_expr_registers(),
            vec![Register::IndirectResult, Register::Temp0]
        );

        frame.unreserve_expr().unwrap();
        let again = frame.reserve_expr(Type::Int).unwrap();
        assert_eq!(again.as_register(), Some(Register::Temp0));
        assert_eq!(frame.live_expr_registers().len(), 2);
    }

    #[test]
    fn test_interleaving_scopes_is_internal_error() {
        let mut frame = StackFrame::new();
        frame.reserve_variable(Type::Int).unwrap();
        frame.reserve_expr(Type::Int).unwrap();

        let err = frame.reserve_variable(Type::Int).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err = frame.unreserve_variable().unwrap_err();
        assert!(err.is_internal());

        frame.unreserve_expr().unwrap();
        frame.unreserve_variable().unwrap();
        assert!(frame.unreserve_expr().unwrap_err().is_internal());
    }

    #[test]
    fn test_void_storage_rejected() {
        let mut frame = StackFrame::new();
        let err = frame.reserve_variable(Type::Void).unwrap_err();
        assert!(matches!(err, CompileError::TypeViolation { .. }));
        assert!(frame.reserve_expr(Type::Custom("node".into())).is_err());
        assert_eq!(frame.stack_pos(), 0);
        assert_eq!(frame.variable_count(), 0);
    }

    #[test]
    fn test_symbol_table() {
        let mut frame = StackFrame::new();
        let x = frame.add_variable(Type::Int, "x").unwrap();
        assert_eq!(frame.get_variable("x").unwrap(), x);

        let err = frame.get_variable("y").unwrap_err();
        assert_eq!(err, CompileError::UndefinedVariable { name: "y".into() });
        assert_eq!(err.to_string(), "Undefined variable: y");

        let shadow = frame.add_variable(Type::Char, "x").unwrap();
        assert_eq!(frame.get_variable("x").unwrap(), shadow);
    }

    #[test]
    fn test_loop_stack() {
        let mut frame = StackFrame::new();
        assert_eq!(frame.current_loop(), None);
        frame.push_loop(0);
        frame.push_loop(3);
        assert_eq!(frame.current_loop(), Some(3));
        assert_eq!(frame.pop_loop(), Some(3));
        assert_eq!(frame.current_loop(), Some(0));
    }
}
