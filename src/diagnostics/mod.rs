use crate::span::{LineIndex, Span};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    #[error("{} semantic error(s)", count_errors(.diagnostics))]
    Semantic { diagnostics: Vec<Diagnostic> },

    #[error("IL parse error (line {line}): {msg}")]
    IlParse { msg: String, line: usize },

    #[error("Verification failed: {msg}")]
    Verify { msg: String },

    #[error("Pass error: {msg}")]
    Pass { msg: String },

    #[error("Lowering error: {msg}")]
    Lower { msg: String, span: Span },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },

    #[error("I/O error: {msg}")]
    Io { msg: String, path: PathBuf },
}

fn count_errors(diags: &[Diagnostic]) -> usize {
    diags.iter().filter(|d| d.severity == Severity::Error).count()
}

impl CompileError {
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    pub fn il_parse(msg: impl Into<String>, line: usize) -> Self {
        Self::IlParse { msg: msg.into(), line }
    }

    pub fn verify(msg: impl Into<String>) -> Self {
        Self::Verify { msg: msg.into() }
    }

    pub fn pass(msg: impl Into<String>) -> Self {
        Self::Pass { msg: msg.into() }
    }

    pub fn lower(msg: impl Into<String>, span: Span) -> Self {
        Self::Lower { msg: msg.into(), span }
    }

    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    pub fn io(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Io { msg: msg.into(), path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single frontend diagnostic with a stable code such as `B1001`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    /// One-line form: `file:line:col: error[B1001]: message`.
    pub fn to_line(&self, filename: &str, index: &LineIndex) -> String {
        let (line, col) = index.line_col(self.span.start);
        format!(
            "{filename}:{line}:{col}: {}[{}]: {}",
            self.severity, self.code, self.message
        )
    }
}

/// Collects diagnostics in emission order.
#[derive(Debug, Default)]
pub struct DiagnosticEmitter {
    diags: Vec<Diagnostic>,
}

impl DiagnosticEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, severity: Severity, code: &'static str, span: Span, message: impl Into<String>) {
        self.diags.push(Diagnostic { severity, code, span, message: message.into() });
    }

    pub fn error(&mut self, code: &'static str, span: Span, message: impl Into<String>) {
        self.emit(Severity::Error, code, span, message);
    }

    pub fn warning(&mut self, code: &'static str, span: Span, message: impl Into<String>) {
        self.emit(Severity::Warning, code, span, message);
    }

    pub fn error_count(&self) -> usize {
        count_errors(&self.diags)
    }

    pub fn warning_count(&self) -> usize {
        self.diags.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Diagnostics sorted by source position, stable for equal offsets.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.diags.sort_by_key(|d| d.span.start);
        self.diags
    }
}

/// Render diagnostics with ariadne into a string (colour disabled).
pub fn render_diagnostics(source: &str, filename: &str, diags: &[Diagnostic]) -> String {
    use ariadne::{Config, Label, Report, ReportKind, Source};

    let mut out = Vec::new();
    for d in diags {
        let kind = match d.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let end = d.span.end.max(d.span.start + 1).min(source.len().max(1));
        let start = d.span.start.min(end.saturating_sub(1));
        let report = Report::build(kind, (), start)
            .with_config(Config::default().with_color(false))
            .with_code(d.code)
            .with_message(&d.message)
            .with_label(Label::new(start..end).with_message(&d.message))
            .with_note(format!("in {filename}"))
            .finish();
        if report.write(Source::from(source), &mut out).is_err() {
            out.extend_from_slice(format!("{}[{}]: {}\n", d.severity, d.code, d.message).as_bytes());
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, filename: &str, err: &CompileError) -> String {
    use ariadne::{Config, Label, Report, ReportKind, Source};

    match err {
        CompileError::Syntax { msg, span } | CompileError::Lower { msg, span } => {
            let kind_str = match err {
                CompileError::Syntax { .. } => "syntax",
                _ => "lowering",
            };
            let end = span.end.max(span.start + 1).min(source.len().max(1));
            let start = span.start.min(end.saturating_sub(1));
            let mut out = Vec::new();
            let written = Report::build(ReportKind::Error, (), start)
                .with_config(Config::default().with_color(false))
                .with_message(format!("{kind_str} error"))
                .with_label(Label::new(start..end).with_message(msg))
                .finish()
                .write(Source::from(source), &mut out);
            match written {
                Ok(()) => String::from_utf8_lossy(&out).into_owned(),
                Err(_) => format!("error: {msg}\n"),
            }
        }
        CompileError::Semantic { diagnostics } => render_diagnostics(source, filename, diagnostics),
        CompileError::Config { msg, path } | CompileError::Io { msg, path } => {
            format!("error: {msg}\n  --> {}\n", path.display())
        }
        other => format!("error: {other}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitter_counts_by_severity() {
        let mut de = DiagnosticEmitter::new();
        de.error("B1001", Span::new(0, 1), "unknown variable 'X'");
        de.warning("B3001", Span::new(2, 3), "index out of bounds");
        de.error("B2001", Span::new(4, 5), "operand type mismatch");
        assert_eq!(de.error_count(), 2);
        assert_eq!(de.warning_count(), 1);
    }

    #[test]
    fn into_sorted_orders_by_position() {
        let mut de = DiagnosticEmitter::new();
        de.error("B2", Span::new(10, 11), "second");
        de.error("B1", Span::new(3, 4), "first");
        let sorted = de.into_sorted();
        assert_eq!(sorted[0].code, "B1");
        assert_eq!(sorted[1].code, "B2");
    }

    #[test]
    fn to_line_uses_line_and_column() {
        let src = "10 PRINT 1\n20 PRINT Y\n";
        let idx = LineIndex::new(src);
        let d = Diagnostic {
            severity: Severity::Error,
            code: "B1001",
            span: Span::new(20, 21),
            message: "unknown variable 'Y'".into(),
        };
        assert_eq!(d.to_line("t.bas", &idx), "t.bas:2:10: error[B1001]: unknown variable 'Y'");
    }

    #[test]
    fn rendered_report_mentions_code() {
        let src = "PRINT X\n";
        let d = Diagnostic {
            severity: Severity::Error,
            code: "B1001",
            span: Span::new(6, 7),
            message: "unknown variable 'X'".into(),
        };
        let text = render_diagnostics(src, "t.bas", &[d]);
        assert!(text.contains("B1001"));
        assert!(text.contains("unknown variable 'X'"));
    }

    #[test]
    fn semantic_error_display_counts_errors_only() {
        let err = CompileError::Semantic {
            diagnostics: vec![
                Diagnostic { severity: Severity::Warning, code: "B3001", span: Span::dummy(), message: "w".into() },
                Diagnostic { severity: Severity::Error, code: "B1007", span: Span::dummy(), message: "e".into() },
            ],
        };
        assert_eq!(err.to_string(), "1 semantic error(s)");
    }
}
