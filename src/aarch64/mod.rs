//! AArch64 architecture-specific components.
//!
//! This module contains all AArch64 specific code:
//! - Assembly text encoding (`encoder`)
//! - AAPCS64 argument assignment, frame layout and caller-saved spills
//!   (`calling_convention`)
//! - Per-function code generation driver (`function_codegen`)

pub mod calling_convention;
pub mod encoder;
pub mod function_codegen;

pub use calling_convention::{
    emit_load_caller, emit_save_caller, Aapcs64Assigner, CCAssigner, FrameLayout,
};
pub use encoder::{AsmWriter, SCRATCH0, SCRATCH1};
pub use function_codegen::{return_label, FunctionCodegen};
