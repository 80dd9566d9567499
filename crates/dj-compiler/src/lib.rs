//! The DJ compiler: parses, typechecks, and lowers a source file, then
//! optionally hands the result to the LLVM backend to produce a native
//! object file. `dj-cli` is the only caller - this crate knows nothing
//! about argument parsing or linking.

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod parser;

use std::path::Path;

use error::CompileResult;

/// One compilation run's front-end output: the symbol table and typed IR
/// that both `codegen::generate` and any future front-end-only tooling
/// (e.g. a `--skip-codegen` dry run) need.
pub struct Compilation {
    pub table: analyze::SymbolTable,
    pub program: ir::TypedProgram,
}

/// Runs the parser, symbol-table builder, typechecker, and IR lowering
/// pass over `src`. Fails fast on the first phase that reports a
/// diagnostic - each later phase assumes the previous one fully succeeded.
pub fn front_end(src: &str) -> CompileResult<Compilation> {
    let mut program = parser::parse(src)?;
    let table = analyze::symbol_table::build(&program)?;
    analyze::type_check::check(&mut program, &table)?;
    let typed = ir::lower(&program, &table);
    Ok(Compilation { table, program: typed })
}

/// Runs the front end and, unless `skip_codegen` is set, the LLVM backend,
/// writing a relocatable object file at `output_path` (spec §6's
/// `--skip-codegen`/`--run-optis`/`--emit-llvm` flags).
pub fn compile(
    src: &str,
    output_path: &Path,
    skip_codegen: bool,
    run_optimizations: bool,
    emit_llvm: bool,
) -> CompileResult<()> {
    let compilation = front_end(src)?;
    if skip_codegen {
        return Ok(());
    }
    codegen::generate(&compilation.program, &compilation.table, output_path, run_optimizations, emit_llvm)
}
