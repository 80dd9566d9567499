//! Driver-level error types (spec §7: the `Argument` and `I/O` kinds;
//! `Static`/`Backend` are `dj_compiler::error::CompileError`, only touched
//! here to convert into the process exit code).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("source file must end in `.dj`, got `{0}`")]
    WrongExtension(PathBuf),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] dj_compiler::error::CompileError),

    #[error("linker invocation failed: {0}")]
    Linker(String),
}

pub type CliResult<T> = Result<T, CliError>;
