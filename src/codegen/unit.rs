// Whole-unit driver. Every declaration and every definition is entered in the function table
// before any function is lowered, so calls may refer to functions defined later in the unit
// and signature conflicts are reported before a single line of text exists. The output is
// the .text section with the functions in definition order, the referenced builtin helpers,
// then the .data section with the interned static data.

//! Compilation of a whole unit to assembly text.

use crate::aarch64::encoder::AsmWriter;
use crate::aarch64::function_codegen::FunctionCodegen;
use crate::ast::{FnDef, FnSignature};
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::{CodegenOptions, CompileState};

/// Compile `defs` (with the extra prototypes in `decls`) to one assembly text.
pub fn compile_unit(
    decls: &[FnSignature],
    defs: &[FnDef<'_>],
    options: CodegenOptions,
) -> CompileResult<String> {
    let mut cs = CompileState::new(options);
    compile_unit_with(&mut cs, decls, defs)
}

/// Like [`compile_unit`], on a caller-provided state whose statistics remain readable
/// afterwards.
pub fn compile_unit_with(
    cs: &mut CompileState,
    decls: &[FnSignature],
    defs: &[FnDef<'_>],
) -> CompileResult<String> {
    for decl in decls {
        cs.add_fn_decl(decl.clone())?;
    }
    for def in defs {
        cs.add_fn_def(def.signature.clone())?;
    }
    log::debug!("unit: {} declaration(s), {} definition(s)", decls.len(), defs.len());

    let mut out = AsmWriter::new(cs.options().indent);
    out.inst(".text");
    for def in defs {
        let text = FunctionCodegen::compile(cs, def)?;
        out.push_str(&text);
    }
    for builtin in cs.used_builtins() {
        log::debug!("emitting builtin {}", builtin.name());
        builtin.emit(&mut out, cs.options());
    }

    let mut text = out.into_string();
    cs.static_data()
        .emit(&mut text, cs.options().indent)
        .map_err(|_| CompileError::internal("failed to format the static data section"))?;

    log::debug!("{}", cs.stats());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, Param, Type};
    use bumpalo::Bump;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_sections_in_order() {
        init();
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let main = b.function(
            FnSignature::new(Type::Int, "main", vec![]),
            [b.call_stmt("printi", [b.int(3)]), b.call_stmt("show", [b.string("hi")])],
        );
        let show = b.function(
            FnSignature::new(
                Type::Void,
                "show",
                vec![Param::new(Type::pointer_to(Type::Char), "s")],
            ),
            [],
        );

        let text = compile_unit(&[], &[main, show], CodegenOptions::default()).unwrap();
        let at = |needle: &str| text.find(needle).unwrap();
        assert!(text.starts_with("        .text\n"));
        assert!(at("_main:") < at("_show:"));
        assert!(at("_show:") < at("_printi:"));
        assert!(at("_printi:") < at(".data"));
        assert!(text.contains("static.String.0:\n        .asciz \"hi\"\n"));
    }

    #[test]
    fn test_unused_builtin_is_not_emitted() {
        init();
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let main = b.function(FnSignature::new(Type::Int, "main", vec![]), []);
        let text = compile_unit(&[], &[main], CodegenOptions::default()).unwrap();
        assert!(!text.contains("printi"));
    }

    #[test]
    fn test_user_definition_shadows_builtin() {
        init();
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let printi = b.function(
            FnSignature::new(Type::Void, "printi", vec![Param::new(Type::Int, "x")]),
            [],
        );
        let main = b.function(
            FnSignature::new(Type::Int, "main", vec![]),
            [b.call_stmt("printi", [b.int(1)])],
        );
        let text = compile_unit(&[], &[printi, main], CodegenOptions::default()).unwrap();
        assert_eq!(text.matches("\n_printi:\n").count(), 1);
        assert!(!text.contains("L_printi_digit"));
    }

    #[test]
    fn test_conflicts_reported_before_emission() {
        init();
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let decl = FnSignature::new(Type::Int, "f", vec![Param::new(Type::Char, "c")]);
        let def = b.function(
            FnSignature::new(Type::Int, "f", vec![Param::new(Type::Int, "c")]),
            [b.ret(b.int(0))],
        );

        let mut cs = CompileState::default();
        let err = compile_unit_with(&mut cs, &[decl], &[def]).unwrap_err();
        assert!(matches!(err, CompileError::SignatureConflict { .. }));
        assert_eq!(cs.stats().functions_compiled, 0);
    }
}
