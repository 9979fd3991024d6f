// This module implements FunctionCodegen, the per-function driver that ties the calling
// convention (Aapcs64Assigner), the text encoder (AsmWriter) and the compile-time stack frame
// together. Compiling a function opens a StackFrame on the compile state, binds each
// parameter to a variable reservation and copies it in from its argument register, lowers
// the body through the statement and expression emitters in the codegen module, appends
// the implicit `return 0` of the entry point, and closes the frame. Only then is the frame
// layout known: the high-water mark of the frame and whether the body calls out decide the
// prologue and epilogue via FrameLayout. The function text is the optional .globl/.p2align
// header, the symbol label, the prologue, the body, the single return label every return
// statement branches to, and the epilogue. The expression-reservation depth must be back to
// zero at the end of the body; anything else is an allocator defect.

//! Function code generation with calling conventions.
//!
//! Lowering methods for statements, expressions and operators are implemented on
//! [`FunctionCodegen`] in the `codegen` module; this module owns the orchestration.

use crate::{
    aarch64::{
        calling_convention::{Aapcs64Assigner, CCAssigner, FrameLayout},
        encoder::AsmWriter,
    },
    ast::{Expr, FnDef, FnSignature, Literal, Type},
    core::{
        error::{CompileError, CompileResult},
        reservation::Reservation,
        session::CompileState,
        stack_frame::StackFrame,
    },
};

/// Emits one function body.
pub struct FunctionCodegen<'cs> {
    /// Compile state; its innermost frame belongs to this function.
    pub(crate) cs: &'cs mut CompileState,
    /// Signature of the function being emitted.
    pub(crate) signature: FnSignature,
    /// Argument register assigner, reused for every call site.
    pub(crate) cc: Aapcs64Assigner,
    /// Body instructions, between prologue and return label.
    pub(crate) body: AsmWriter,
}

impl<'cs> FunctionCodegen<'cs> {
    pub fn new(cs: &'cs mut CompileState, signature: FnSignature) -> Self {
        let body = AsmWriter::new(cs.options().indent);
        Self { cs, signature, cc: Aapcs64Assigner::new(), body }
    }

    /// Compile a function definition to its complete text.
    pub fn compile(cs: &mut CompileState, def: &FnDef<'_>) -> CompileResult<String> {
        log::debug!("compiling function {}", def.name());

        cs.push_frame();
        let body = FunctionCodegen::new(cs, def.signature.clone()).emit_body(def);
        let frame = cs.pop_frame()?;
        let body = body?;

        let layout = FrameLayout::new(frame.high_water(), def.contains_calls());
        log::debug!(
            "{}: locals {} bytes, frame record {}",
            def.name(),
            layout.locals_size,
            layout.saves_frame_record
        );

        let mut w = body.fork();
        let label = cs.fn_label(def.name());
        if cs.options().emit_globals {
            w.inst(format_args!(".globl {label}"));
            w.inst(".p2align 2");
        }
        w.label(&label);
        layout.emit_prologue(&mut w);
        w.append(body);
        w.label(return_label(def.name()));
        layout.emit_epilogue(&mut w);

        cs.record_function_compiled(def.name(), &frame, layout.total_size());
        Ok(w.into_string())
    }

    fn emit_body(mut self, def: &FnDef<'_>) -> CompileResult<AsmWriter> {
        self.bind_params()?;
        self.emit_block(&def.body)?;

        if self.has_implicit_return() {
            self.emit_return(&Expr::literal(Literal::Int(0)))?;
        }

        let depth = self.frame()?.expr_depth();
        if depth != 0 {
            return Err(CompileError::internal(format!(
                "{depth} expression reservation(s) outstanding after {}",
                self.signature.name
            )));
        }
        Ok(self.body)
    }

    /// Copy every parameter from its argument register into a frame slot.
    fn bind_params(&mut self) -> CompileResult<()> {
        self.cc.reset();
        let params = self.signature.params.clone();
        for param in params {
            let reg = self.cc.assign_arg()?;
            let var = self.frame()?.add_variable(param.ty.clone(), &param.name)?;
            self.body.copy(&Reservation::register(param.ty, reg), &var)?;
        }
        Ok(())
    }

    /// The entry point returns 0 when its body falls off the end.
    fn has_implicit_return(&self) -> bool {
        self.signature.name == self.cs.options().entry_point
            && self.signature.return_type == Type::Int
    }

    /// The innermost frame, i.e. this function's.
    pub fn frame(&mut self) -> CompileResult<&mut StackFrame> {
        self.cs.frame()
    }

    pub fn return_label(&self) -> String {
        return_label(&self.signature.name)
    }
}

/// Label every return statement of `name` branches to.
pub fn return_label(name: &str) -> String {
    format!("return_{name}")
}
