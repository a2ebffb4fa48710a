#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

//! Driver glue shared by the `cinder` binary and its tests: source to
//! assembly in one call, plus the rules for where the output goes.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cinder_codegen::{generate_with, CodegenError, GenOptions, LabelAllocator};
use cinder_parse::{parse_str, ParseError};
use thiserror::Error;

/// Maximum source file size in bytes (1MB)
pub const MAX_SOURCE_SIZE: usize = 1_000_000;

/// Coarse classification used when reporting a failed compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    UnresolvedSymbol,
    UnsupportedConstruct,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::UnresolvedSymbol => "name error",
            ErrorKind::UnsupportedConstruct => "unsupported",
        })
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Parse(e) if e.is_lexical() => ErrorKind::Lexical,
            CompileError::Parse(_) => ErrorKind::Syntax,
            CompileError::Codegen(CodegenError::UnresolvedSymbol { .. }) => {
                ErrorKind::UnresolvedSymbol
            }
            CompileError::Codegen(CodegenError::Unsupported { .. }) => {
                ErrorKind::UnsupportedConstruct
            }
        }
    }
}

/// Lex, parse and generate `src`. `file` only labels diagnostics.
pub fn compile_source(file: &str, src: &str, options: GenOptions) -> Result<String, CompileError> {
    let program = parse_str(file, src)?;
    let mut labels = LabelAllocator::new();
    let asm = generate_with(&program, &mut labels, options)?;
    tracing::debug!(file, bytes = asm.len(), "generated assembly");
    Ok(asm)
}

/// `prog.c` becomes `prog.asm` next to it.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension("asm")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Add to the end of an existing file.
    #[default]
    Append,
    Overwrite,
}

/// Write the finished assembly in a single call; the file is created if
/// it does not exist.
pub fn write_assembly(path: &Path, asm: &str, mode: WriteMode) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        WriteMode::Append => options.append(true),
        WriteMode::Overwrite => options.write(true).truncate(true),
    };
    let mut file = options.open(path)?;
    file.write_all(asm.as_bytes())?;
    file.flush()
}
