//! The compilation pipeline `main` drives: validate the source path, run the
//! front end and (unless `--skip-codegen`) the backend, then invoke an
//! external C compiler to link the emitted object file into an executable
//! (spec §6's file contract: `<stem>.dj` -> `<stem>.o` -> `<stem>`).

use std::path::{Path, PathBuf};
use std::process::Command;

use dj_compiler::codegen;
use dj_compiler::error::CompileError;

use crate::cli::Cli;
use crate::error::{ArgumentError, CliError, CliResult};

pub fn run(cli: &Cli) -> CliResult<()> {
    let stem = require_dj_extension(&cli.source)?;
    let object_path = stem.with_extension("o");

    let src = std::fs::read_to_string(&cli.source).map_err(|e| CliError::Io {
        path: cli.source.clone(),
        source: e,
    })?;

    let color = cli.color.should_colorize();
    let compilation = dj_compiler::front_end(&src).map_err(|e| report_compile_error(e, color))?;

    if cli.verbose {
        println!("{:#?}", compilation.program);
    }

    if cli.skip_codegen {
        return Ok(());
    }

    codegen::generate(
        &compilation.program,
        &compilation.table,
        &object_path,
        cli.run_optis,
        cli.emit_llvm,
    )
    .map_err(|e| report_compile_error(e, color))?;

    link(&object_path, &stem)
}

/// Strips the required `.dj` extension, returning the bare stem used for
/// both the object file and the final executable's names.
fn require_dj_extension(source: &Path) -> CliResult<PathBuf> {
    if source.extension().and_then(|e| e.to_str()) != Some("dj") {
        return Err(ArgumentError::WrongExtension(source.to_path_buf()).into());
    }
    Ok(source.with_extension(""))
}

/// Prints a `StaticError`'s diagnostics with the resolved color setting
/// (its `Display` impl always renders uncolored) and passes a `BackendError`
/// through unchanged, then converts either into the process-level error.
fn report_compile_error(err: CompileError, color: bool) -> CliError {
    if let CompileError::Static(ref e) = err {
        eprintln!("{}", e.diagnostics.printer(color));
    } else {
        eprintln!("{err}");
    }
    err.into()
}

/// Invokes the `$CC` (default `cc`) external compiler to link the emitted
/// object file into `exe_path`, the same two-step split the original
/// driver performs instead of linking in-process (spec §4.4.10 / §6).
fn link(object_path: &Path, exe_path: &Path) -> CliResult<()> {
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let status = Command::new(&cc)
        .arg(object_path)
        .arg("-o")
        .arg(exe_path)
        .status()
        .map_err(|e| CliError::Linker(format!("failed to spawn `{cc}`: {e}")))?;

    if !status.success() {
        return Err(CliError::Linker(format!(
            "`{cc}` exited with {status}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dj_extension_and_strips_it() {
        let stem = require_dj_extension(Path::new("prog.dj")).unwrap();
        assert_eq!(stem, PathBuf::from("prog"));
    }

    #[test]
    fn accepts_dj_extension_with_directory_component() {
        let stem = require_dj_extension(Path::new("examples/fib.dj")).unwrap();
        assert_eq!(stem, PathBuf::from("examples/fib"));
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = require_dj_extension(Path::new("prog.txt")).unwrap_err();
        assert!(matches!(err, CliError::Argument(ArgumentError::WrongExtension(_))));
    }

    #[test]
    fn rejects_missing_extension() {
        let err = require_dj_extension(Path::new("prog")).unwrap_err();
        assert!(matches!(err, CliError::Argument(ArgumentError::WrongExtension(_))));
    }

    #[test]
    fn object_path_and_exe_path_match_spec_naming() {
        let stem = require_dj_extension(Path::new("fib.dj")).unwrap();
        assert_eq!(stem.with_extension("o"), PathBuf::from("fib.o"));
        assert_eq!(stem, PathBuf::from("fib"));
    }
}
