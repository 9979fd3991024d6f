// This module provides CompileState, the single explicitly-passed context of one compilation
// run. It owns the function table (declarations and definitions keyed by identifier, with the
// signature-consistency checks between them), the stack of active StackFrames, the static data
// table, the set of builtin helpers the unit actually references, and the two monotonic
// counters that make if/while labels unique across the unit. CompileState::new pre-declares
// every builtin helper so calls to them type-check like any other declared function.
// CodegenOptions carries the few target conventions that vary (symbol prefix, entry point,
// indentation, global directives). CompileStats records what the run did: functions compiled,
// calls emitted, expression spills, caller-save spills and labels allocated, plus the largest
// frame. Statistics are read-only for callers and are mainly used by tests and debug logging.

//! Compile state shared across one compilation unit.

use std::fmt;

use hashbrown::{HashMap, HashSet};

use super::error::{CompileError, CompileResult};
use super::stack_frame::StackFrame;
use super::static_data::StaticDataTable;
use crate::ast::FnSignature;
use crate::codegen::builtins::Builtin;

/// Target conventions for the emitted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Prefix of every global symbol (`_` on Mach-O).
    pub symbol_prefix: String,
    /// Function that receives an implicit `return 0`.
    pub entry_point: String,
    /// Spaces before each instruction and directive.
    pub indent: usize,
    /// Emit `.globl` and `.p2align` before every function.
    pub emit_globals: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            symbol_prefix: "_".to_owned(),
            entry_point: "main".to_owned(),
            indent: 8,
            emit_globals: true,
        }
    }
}

/// Compilation statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompileStats {
    pub functions_compiled: usize,

    /// Calls and system traps emitted.
    pub calls_emitted: usize,

    /// Expression reservations that had to live in the frame.
    pub expr_spills: usize,

    /// Registers saved around calls.
    pub caller_saves: usize,

    /// Control-flow labels allocated.
    pub labels_allocated: usize,

    /// Largest frame (bytes, after alignment).
    pub largest_frame_size: u64,

    /// Name of the function with the largest frame.
    pub largest_frame_function: String,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Calls emitted: {}", self.calls_emitted)?;
        writeln!(f, "  Expression spills: {}", self.expr_spills)?;
        writeln!(f, "  Caller-save spills: {}", self.caller_saves)?;
        writeln!(f, "  Labels allocated: {}", self.labels_allocated)?;
        if !self.largest_frame_function.is_empty() {
            writeln!(
                f,
                "  Largest frame: {} ({} bytes)",
                self.largest_frame_function, self.largest_frame_size
            )?;
        }
        Ok(())
    }
}

/// State of one compilation run.
pub struct CompileState {
    options: CodegenOptions,

    /// Declared signatures, builtins included.
    fn_decls: HashMap<String, FnSignature>,

    /// Signatures of functions with a body in this unit.
    fn_defs: HashMap<String, FnSignature>,

    /// Frames of the functions being emitted, innermost last.
    frames: Vec<StackFrame>,

    static_data: StaticDataTable,

    used_builtins: HashSet<Builtin>,

    if_counter: u32,
    while_counter: u32,

    stats: CompileStats,
}

impl CompileState {
    pub fn new(options: CodegenOptions) -> Self {
        let mut fn_decls = HashMap::new();
        for builtin in Builtin::ALL {
            let signature = builtin.signature();
            fn_decls.insert(signature.name.clone(), signature);
        }

        Self {
            options,
            fn_decls,
            fn_defs: HashMap::new(),
            frames: Vec::new(),
            static_data: StaticDataTable::new(),
            used_builtins: HashSet::new(),
            if_counter: 0,
            while_counter: 0,
            stats: CompileStats::default(),
        }
    }

    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// Global label of a function.
    pub fn fn_label(&self, name: &str) -> String {
        format!("{}{}", self.options.symbol_prefix, name)
    }

    /// Record a declaration. It must agree with any earlier declaration or definition.
    pub fn add_fn_decl(&mut self, signature: FnSignature) -> CompileResult<()> {
        let conflicts = |table: &HashMap<String, FnSignature>| {
            table.get(&signature.name).is_some_and(|prior| !prior.same_types(&signature))
        };
        if conflicts(&self.fn_decls) || conflicts(&self.fn_defs) {
            return Err(CompileError::SignatureConflict { name: signature.name });
        }

        log::trace!("declared function {}", signature.name);
        self.fn_decls.insert(signature.name.clone(), signature);
        Ok(())
    }

    /// Record a definition. A function may be defined once, consistently with its
    /// declaration.
    pub fn add_fn_def(&mut self, signature: FnSignature) -> CompileResult<()> {
        if let Some(decl) = self.fn_decls.get(&signature.name) {
            if !decl.same_types(&signature) {
                return Err(CompileError::SignatureConflict { name: signature.name });
            }
        }
        if self.fn_defs.contains_key(&signature.name) {
            return Err(CompileError::Redefinition { name: signature.name });
        }

        log::trace!("defined function {}", signature.name);
        self.fn_defs.insert(signature.name.clone(), signature);
        Ok(())
    }

    /// Signature of a declared or defined function.
    pub fn get_fn_decl(&self, name: &str) -> CompileResult<&FnSignature> {
        self.fn_decls
            .get(name)
            .or_else(|| self.fn_defs.get(name))
            .ok_or_else(|| CompileError::UndefinedFunction { name: name.to_owned() })
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.fn_defs.contains_key(name)
    }

    pub fn push_frame(&mut self) {
        self.frames.push(StackFrame::new());
    }

    pub fn pop_frame(&mut self) -> CompileResult<StackFrame> {
        self.frames.pop().ok_or_else(|| CompileError::internal("no active stack frame"))
    }

    /// The innermost active frame.
    pub fn frame(&mut self) -> CompileResult<&mut StackFrame> {
        self.frames.last_mut().ok_or_else(|| CompileError::internal("no active stack frame"))
    }

    pub fn static_data(&self) -> &StaticDataTable {
        &self.static_data
    }

    pub fn intern_string(&mut self, text: &str) -> String {
        self.static_data.intern_string(text)
    }

    /// Mark `name` as used if it names a builtin helper not defined by the unit itself.
    pub fn mark_builtin_used(&mut self, name: &str) {
        if self.is_defined(name) {
            return;
        }
        if let Some(builtin) = Builtin::from_name(name) {
            if self.used_builtins.insert(builtin) {
                log::debug!("builtin {name} referenced");
            }
        }
    }

    /// Builtin helpers to emit, in a stable order.
    pub fn used_builtins(&self) -> Vec<Builtin> {
        Builtin::ALL
            .into_iter()
            .filter(|builtin| self.used_builtins.contains(builtin))
            .collect()
    }

    pub fn next_if_id(&mut self) -> u32 {
        let id = self.if_counter;
        self.if_counter += 1;
        self.stats.labels_allocated += 3;
        log::trace!("if id {id}");
        id
    }

    pub fn next_while_id(&mut self) -> u32 {
        let id = self.while_counter;
        self.while_counter += 1;
        self.stats.labels_allocated += 3;
        log::trace!("while id {id}");
        id
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    pub fn record_call(&mut self) {
        self.stats.calls_emitted += 1;
    }

    pub fn record_caller_saves(&mut self, count: usize) {
        self.stats.caller_saves += count;
    }

    /// Record a finished function and its aligned frame size.
    pub fn record_function_compiled(&mut self, name: &str, frame: &StackFrame, frame_size: u64) {
        self.stats.functions_compiled += 1;
        self.stats.expr_spills += frame.expr_spills();
        if self.stats.largest_frame_function.is_empty() || frame_size > self.stats.largest_frame_size
        {
            self.stats.largest_frame_size = frame_size;
            self.stats.largest_frame_function = name.to_owned();
        }
    }
}

impl Default for CompileState {
    fn default() -> Self {
        Self::new(CodegenOptions::default())
    }
}
