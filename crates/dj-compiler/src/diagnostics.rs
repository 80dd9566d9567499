//! Line-keyed diagnostics collection and rendering.
//!
//! DJ programs carry no source ranges past the lexer - every AST node only
//! remembers the 1-based line it started on (spec §7: "Static errors print
//! `<line>: <message>` with the offending source line"). This plays the same
//! role as a `rowan::TextRange`-keyed `Diagnostics`/`DiagnosticsPrinter`
//! would, just addressed by line number instead of a syntax tree range.
//!
//! Each compiler phase (parsing, symbol-table construction, typechecking)
//! collects every error it finds into one `Diagnostics` before the pipeline
//! gives up - so a program with three duplicate class names is reported as
//! three errors, not one - but no phase runs once an earlier phase produced
//! any.

use std::fmt;

use crate::ast::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub line: Line,
    pub text: String,
}

impl DiagnosticMessage {
    fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Collection of diagnostics produced by one compiler phase.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, line: Line, msg: impl Into<String>) {
        self.messages.push(DiagnosticMessage {
            severity: Severity::Error,
            line,
            text: msg.into(),
        });
    }

    pub fn warning(&mut self, line: Line, msg: impl Into<String>) {
        self.messages.push(DiagnosticMessage {
            severity: Severity::Warning,
            line,
            text: msg.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.messages.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    /// Sort by line number, for stable output regardless of which part of a
    /// class declaration a phase happened to validate first.
    pub fn sort_by_line(&mut self) {
        self.messages.sort_by_key(|d| d.line);
    }

    pub fn printer(&self, color: bool) -> DiagnosticsPrinter<'_> {
        DiagnosticsPrinter {
            messages: &self.messages,
            color,
        }
    }
}

/// Renders a `Diagnostics` as `<line>: <message>` lines, one per message,
/// errors before warnings are not reordered - callers sort beforehand if
/// they want that.
pub struct DiagnosticsPrinter<'a> {
    messages: &'a [DiagnosticMessage],
    color: bool,
}

impl fmt::Display for DiagnosticsPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, msg) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if self.color {
                let tag = match msg.severity {
                    Severity::Error => "\x1b[31merror\x1b[0m",
                    Severity::Warning => "\x1b[33mwarning\x1b[0m",
                };
                write!(f, "{tag}: {}: {}", msg.line, msg.text)?;
            } else {
                let tag = match msg.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                write!(f, "{tag}: {}: {}", msg.line, msg.text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_counts_errors() {
        let mut diags = Diagnostics::new();
        diags.error(3, "unknown class `Foo`");
        diags.warning(5, "unused local `x`");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.error_count(), 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn printer_renders_line_prefix() {
        let mut diags = Diagnostics::new();
        diags.error(10, "not a subtype of `nat`");
        let rendered = diags.printer(false).to_string();
        assert_eq!(rendered, "error: 10: not a subtype of `nat`");
    }

    #[test]
    fn sort_by_line_orders_across_phases() {
        let mut diags = Diagnostics::new();
        diags.error(9, "second");
        diags.error(2, "first");
        diags.sort_by_line();
        let lines: Vec<Line> = diags.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 9]);
    }
}
