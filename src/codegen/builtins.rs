// Builtin helper routines. A builtin is a small fixed routine the compiled program may call
// like any declared function. Its signature is pre-declared on every CompileState, and its
// text is appended to the .text section once, and only when some call site referenced it
// while the unit itself did not define a function of the same name.

//! Builtin helper registry and helper text.

use crate::aarch64::encoder::AsmWriter;
use crate::ast::{FnSignature, Param, Type};
use crate::core::session::CodegenOptions;

/// Darwin `write` system call number.
const SYS_WRITE: u64 = 4;
/// File descriptor of standard output.
const STDOUT: u64 = 1;
/// Scratch buffer for one formatted integer: sign, 20 digits and a newline.
const PRINT_BUFFER: u64 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `void printi(int i)`: write `i` in decimal followed by a newline to stdout.
    PrintInt,
}

impl Builtin {
    pub const ALL: [Builtin; 1] = [Builtin::PrintInt];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::PrintInt => "printi",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn signature(self) -> FnSignature {
        match self {
            Builtin::PrintInt => {
                FnSignature::new(Type::Void, self.name(), vec![Param::new(Type::Int, "i")])
            }
        }
    }

    /// Append the helper's definition to `w`.
    pub fn emit(self, w: &mut AsmWriter, options: &CodegenOptions) {
        let label = format!("{}{}", options.symbol_prefix, self.name());
        if options.emit_globals {
            w.inst(format_args!(".globl {label}"));
            w.inst(".p2align 2");
        }
        w.label(&label);
        match self {
            Builtin::PrintInt => emit_print_int(w),
        }
    }
}

/// Digits are produced from the end of a stack buffer towards its start; x1 walks down and
/// ends up pointing at the first byte to write. Only x0..x5 and x16 are touched.
fn emit_print_int(w: &mut AsmWriter) {
    w.inst(format_args!("sub sp, sp, #{PRINT_BUFFER}"));
    w.inst(format_args!("add x1, sp, #{PRINT_BUFFER}"));
    w.inst("mov x2, #10");
    w.inst("sub x1, x1, #1");
    w.inst("strb w2, [x1]");
    w.inst("cmp x0, #0");
    w.inst("cneg x3, x0, lt");

    w.label("L_printi_digit");
    w.inst("udiv x4, x3, x2");
    w.inst("msub x5, x4, x2, x3");
    w.inst("add x5, x5, #48");
    w.inst("sub x1, x1, #1");
    w.inst("strb w5, [x1]");
    w.inst("mov x3, x4");
    w.inst("cbnz x3, L_printi_digit");

    w.inst("cmp x0, #0");
    w.b_cond("ge", "L_printi_write");
    w.inst("mov x5, #45");
    w.inst("sub x1, x1, #1");
    w.inst("strb w5, [x1]");

    w.label("L_printi_write");
    w.inst(format_args!("add x2, sp, #{PRINT_BUFFER}"));
    w.inst("sub x2, x2, x1");
    w.inst(format_args!("mov x0, #{STDOUT}"));
    w.inst(format_args!("mov x16, #{SYS_WRITE}"));
    w.inst("svc #0x80");
    w.inst(format_args!("add sp, sp, #{PRINT_BUFFER}"));
    w.ret();
}
