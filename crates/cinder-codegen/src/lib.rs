#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

pub mod context;
mod error;
mod generator;
pub mod labels;

use cinder_ast::ast::Program;

pub use context::{Context, Location, LoopLabels};
pub use error::{CodegenError, CodegenResult};
pub use generator::{Generator, ARG_REGISTERS};
pub use labels::{LabelAllocator, LabelKind};

/// Where incoming parameters live inside the callee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamBinding {
    /// Copied into the first stack slots by the prologue.
    #[default]
    Spill,
    /// Read straight from `%rdi`/`%rsi`/`%rdx`. Any call inside the body
    /// overwrites them while its arguments are being loaded.
    Register,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenOptions {
    pub param_binding: ParamBinding,
}

/// Generate assembly for `program` with a fresh label allocator.
pub fn generate(program: &Program) -> CodegenResult<String> {
    generate_with(program, &mut LabelAllocator::new(), GenOptions::default())
}

/// Generate assembly drawing labels from `labels`. Nothing is returned
/// unless the whole program was generated.
pub fn generate_with(
    program: &Program,
    labels: &mut LabelAllocator,
    options: GenOptions,
) -> CodegenResult<String> {
    let mut generator = Generator::new(labels, options);
    generator.program(program)?;
    Ok(generator.finish())
}
