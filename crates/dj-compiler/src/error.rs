//! Compiler-level error types (spec §7: the `Static` and `Backend` error
//! kinds; `Argument`/`I/O` live in `dj-cli` since only the driver touches the
//! filesystem and `std::env`).

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// A parse, name-resolution, typecheck, or symbol-table error. Carries every
/// diagnostic a phase collected before giving up; the pipeline never runs a
/// later phase once one of these is produced.
#[derive(Debug, Error)]
#[error("{}", self.diagnostics.printer(false))]
pub struct StaticError {
    pub diagnostics: Diagnostics,
}

impl StaticError {
    pub fn new(diagnostics: Diagnostics) -> Self {
        debug_assert!(diagnostics.has_errors());
        Self { diagnostics }
    }
}

/// A code-generation failure: module verification, target-machine setup, or
/// object emission. Unlike `StaticError` these come from LLVM itself, so the
/// message is whatever LLVM reported rather than a line-keyed diagnostic.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("module failed verification:\n{0}")]
    Verification(String),
    #[error("no target machine for the host triple: {0}")]
    NoTargetMachine(String),
    #[error("failed to write object file: {0}")]
    ObjectEmit(String),
    #[error("failed to initialize LLVM target: {0}")]
    TargetInit(String),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Static(#[from] StaticError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type CompileResult<T> = Result<T, CompileError>;
