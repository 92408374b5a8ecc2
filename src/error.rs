use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    RuntimeError,
}

/// A diagnostic carrying the 1-based source line it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct SprigError {
    pub kind: ErrorKind,
    pub line: u32,
    pub message: String,
    pub help: Option<String>,
}

impl SprigError {
    pub fn new(kind: ErrorKind, line: u32, message: String) -> Self {
        Self {
            kind,
            line,
            message,
            help: None,
        }
    }

    pub fn new_with_help(kind: ErrorKind, line: u32, message: String, help: String) -> Self {
        Self {
            kind,
            line,
            message,
            help: Some(help),
        }
    }

    pub fn lex_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::LexError, line, message)
    }

    pub fn parse_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::ParseError, line, message)
    }

    pub fn parse_error_with_help(line: u32, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::ParseError, line, message, help)
    }

    pub fn runtime_error(line: u32, message: String) -> Self {
        Self::new(ErrorKind::RuntimeError, line, message)
    }

    pub fn runtime_error_with_help(line: u32, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::RuntimeError, line, message, help)
    }

    /// Character range of `self.line` inside `source`, without its line
    /// break. ariadne counts spans in chars, not bytes.
    fn line_range(&self, source: &str) -> Range<usize> {
        let mut start = 0;
        for (index, text) in source.split_inclusive('\n').enumerate() {
            let width = text.chars().count();
            if index + 1 == self.line as usize {
                let trimmed = text.trim_end_matches(['\n', '\r']).chars().count();
                let len = if trimmed == 0 { width.min(1) } else { trimmed };
                return start..start + len;
            }
            start += width;
        }
        // Past the end (e.g. an unterminated block): point at the last char.
        let end = source.chars().count();
        end.saturating_sub(1)..end
    }

    pub fn report(&self, source: &str, filename: Option<&str>) {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.kind {
            ErrorKind::LexError => Color::Red,
            ErrorKind::ParseError => Color::Yellow,
            ErrorKind::RuntimeError => Color::Magenta,
        };

        let kind_str = match self.kind {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::ParseError => "Parse Error",
            ErrorKind::RuntimeError => "Runtime Error",
        };

        let range = self.line_range(source);
        let mut report_builder = Report::build(ReportKind::Error, filename, range.start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.message))
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        // Diagnostics go to stderr; a closed stderr leaves nothing to report to.
        let _ = report_builder
            .finish()
            .eprint((filename, Source::from(source)));
    }
}

impl fmt::Display for SprigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SprigError {}
