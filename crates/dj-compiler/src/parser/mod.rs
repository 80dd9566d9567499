//! Recursive-descent parser producing the `ast::Program` tree.
//!
//! DJ's grammar needs no backtracking (every production is chosen by its
//! first token), so a hand-written descent over a flat token vector is
//! simpler and cheaper than a CST layer - there is nothing here that benefits
//! from a lossless tree since the compiler never needs to print source back
//! out verbatim.

mod grammar;
pub mod lexer;

use crate::diagnostics::Diagnostics;
use crate::error::StaticError;

/// Parse a complete DJ source file into its AST.
///
/// Parsing stops at the first error: DJ's grammar has no natural
/// synchronization points (a missing `;` desyncs everything after it), so
/// attempting multi-error recovery would mostly manufacture cascades.
pub fn parse(src: &str) -> Result<crate::ast::Program, StaticError> {
    let tokens = lexer::lex(src).map_err(|(msg, line)| {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(line, msg);
        StaticError::new(diagnostics)
    })?;
    grammar::Parser::new(&tokens).parse_program().map_err(|e| {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(e.line, e.message);
        StaticError::new(diagnostics)
    })
}
