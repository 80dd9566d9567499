//! Argument parsing for `dj2ll`.
//!
//! A single positional source file plus a handful of flat flags - no
//! subcommands.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dj2ll", bin_name = "dj2ll")]
#[command(about = "Compiles a DJ source file to a native object file and links it")]
pub struct Cli {
    /// DJ source file (must end in `.dj`)
    pub source: PathBuf,

    /// Stop after typechecking; do not run the code generator
    #[arg(long)]
    pub skip_codegen: bool,

    /// Run the optimization pipeline on `main` before emitting the object file
    #[arg(long)]
    pub run_optis: bool,

    /// Print the generated LLVM module to stderr before emission
    #[arg(long)]
    pub emit_llvm: bool,

    /// Dump the typed IR tree to stdout
    #[arg(long)]
    pub verbose: bool,

    /// Colorize diagnostics (auto-detected by default)
    #[arg(long, default_value = "auto", value_name = "WHEN")]
    pub color: ColorChoice,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn should_colorize(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_source() {
        let cli = Cli::try_parse_from(["dj2ll", "fib.dj"]).unwrap();
        assert_eq!(cli.source, PathBuf::from("fib.dj"));
        assert!(!cli.skip_codegen);
        assert!(!cli.run_optis);
        assert!(!cli.emit_llvm);
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "dj2ll",
            "fib.dj",
            "--skip-codegen",
            "--run-optis",
            "--emit-llvm",
            "--verbose",
            "--color",
            "always",
        ])
        .unwrap();
        assert!(cli.skip_codegen);
        assert!(cli.run_optis);
        assert!(cli.emit_llvm);
        assert!(cli.verbose);
        assert!(matches!(cli.color, ColorChoice::Always));
    }

    #[test]
    fn rejects_missing_source() {
        assert!(Cli::try_parse_from(["dj2ll"]).is_err());
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["dj2ll", "fib.dj", "--bogus"]).is_err());
    }
}
