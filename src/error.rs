//! Assembler diagnostics.
//!
//! Parse functions never print: they push [Diagnostic] values into a
//! [Diagnostics] accumulator and the driver renders the whole batch at a
//! phase boundary. Each diagnostic points at a line and a byte range of it
//! and is rendered with the previous and next source lines for context.

use std::fmt;
use std::io::{self, Write};

use crate::parsing::{Source, Span};

/// Error codes of the assembler. Errors make the assembly fail at the end
/// of the phase that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    HexSuffixExpected,
    ClosingParenExpected,
    RegisterExpected,
    InvalidCharLiteral,
    SingleQuoteExpected,
    DoubleQuoteExpected,
    ExpressionExpected,
    UndefinedLabel,
    ZeroDivision,
    UnknownInstruction,
    InvalidRegister,
    CommaExpected,
    IndexRegisterExpected,
    InvalidIndexRegister,
    InvalidImmediate,
    InvalidOperand,
    InvalidLabel,
    DuplicatedLabel,
    InvalidOrg,
}

impl ErrorCode {
    fn message(self) -> &'static str {
        match self {
            ErrorCode::HexSuffixExpected => "hex literals need a trailing 'H'",
            ErrorCode::ClosingParenExpected => "')' (closing parenthesis) expected",
            ErrorCode::RegisterExpected => "a register name is required",
            ErrorCode::InvalidCharLiteral => "invalid character literal",
            ErrorCode::SingleQuoteExpected => "'\\'' (single quotation) expected",
            ErrorCode::DoubleQuoteExpected => "'\"' (double quotation) expected",
            ErrorCode::ExpressionExpected => "an expression is required",
            ErrorCode::UndefinedLabel => "the label is not defined",
            ErrorCode::ZeroDivision => "division by zero detected",
            ErrorCode::UnknownInstruction => "invalid opcode",
            ErrorCode::InvalidRegister => "invalid register name",
            ErrorCode::CommaExpected => "',' (comma) expected",
            ErrorCode::IndexRegisterExpected => "an index register is required",
            ErrorCode::InvalidIndexRegister => "invalid index register name",
            ErrorCode::InvalidImmediate => "an immediate value cannot be used here",
            ErrorCode::InvalidOperand => "invalid operand",
            ErrorCode::InvalidLabel => "invalid label",
            ErrorCode::DuplicatedLabel => "duplicated label",
            ErrorCode::InvalidOrg => "ORG cannot move the current address backwards",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Warning codes. Warnings are rendered but never fail the assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCode {
    AddressOutOfRange,
    ValueOutOfRange,
    IoAddressOutOfRange,
    WritingToRomArea,
    BinaryTooLarge,
    NumberTooBig,
}

impl WarningCode {
    fn message(self) -> &'static str {
        match self {
            WarningCode::AddressOutOfRange => "address out of range",
            WarningCode::ValueOutOfRange => "value out of range",
            WarningCode::IoAddressOutOfRange => "I/O address out of range",
            WarningCode::WritingToRomArea => "cannot write to the ROM area",
            WarningCode::BinaryTooLarge => "the binary is too large",
            WarningCode::NumberTooBig => "number too big",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Error(ErrorCode),
    Warning(WarningCode),
}

/// Extra information attached below the source context of a diagnostic.
#[derive(Debug, Clone)]
pub enum Note {
    /// Free-form text; may span several lines.
    Text(String),

    /// Points at an earlier definition site, rendered with its own
    /// three-line source context.
    DefinedAt { line: usize, span: Span },
}

/// A single diagnostic: a code, an anchor in the source and notes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Code,

    /// 1-based source line, or `None` for a file-level diagnostic.
    pub line: Option<usize>,

    /// Start column of the highlighted range.
    pub start: usize,

    /// Length of the highlighted range; `None` highlights to end of line.
    pub len: Option<usize>,

    pub notes: Vec<Note>,
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Accumulator for [Diagnostic]s, flushed between phases.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Default::default()
    }

    pub fn error(&mut self, line: usize, start: usize, len: Option<usize>, code: ErrorCode) {
        self.error_with_notes(line, start, len, code, Vec::new());
    }

    pub fn error_with_notes(
        &mut self,
        line: usize,
        start: usize,
        len: Option<usize>,
        code: ErrorCode,
        notes: Vec<Note>,
    ) {
        self.error_count += 1;
        self.items.push(Diagnostic {
            code: Code::Error(code),
            line: Some(line),
            start,
            len,
            notes,
        });
    }

    pub fn warning(
        &mut self,
        line: usize,
        start: usize,
        len: Option<usize>,
        code: WarningCode,
        notes: Vec<Note>,
    ) {
        self.items.push(Diagnostic {
            code: Code::Warning(code),
            line: Some(line),
            start,
            len,
            notes,
        });
    }

    /// A warning that relates to the whole file and gets no source context.
    pub fn file_warning(&mut self, code: WarningCode, note: String) {
        self.items.push(Diagnostic {
            code: Code::Warning(code),
            line: None,
            start: 0,
            len: Some(0),
            notes: vec![Note::Text(note)],
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.items.iter().any(|d| d.code == Code::Error(code))
    }

    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.items.iter().any(|d| d.code == Code::Warning(code))
    }

    /// Renders every accumulated diagnostic against `src`, separating
    /// consecutive diagnostics with a blank line.
    pub fn render(&self, src: &Source, w: &mut dyn Write) -> io::Result<()> {
        for (i, diagnostic) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            render_one(diagnostic, src, w)?;
        }

        Ok(())
    }
}

fn render_one(diagnostic: &Diagnostic, src: &Source, w: &mut dyn Write) -> io::Result<()> {
    let (color, severity, message) = match diagnostic.code {
        Code::Error(code) => (RED, "error", code.message()),
        Code::Warning(code) => (YELLOW, "warning", code.message()),
    };

    match diagnostic.line {
        Some(line) => {
            writeln!(w, "line {}: {}{}{}: {}", line, color, severity, RESET, message)?;
            render_context(src, line, diagnostic.start, diagnostic.len, RED, w)?;
        }
        None => writeln!(w, "{}{}{}: {}", color, severity, RESET, message)?,
    }

    for note in &diagnostic.notes {
        match note {
            Note::Text(text) => writeln!(w, "{}", text)?,
            Note::DefinedAt { line, span } => {
                writeln!(w, "previous definition")?;
                render_context(src, *line, span.start, Some(span.len()), YELLOW, w)?;
            }
        }
    }

    Ok(())
}

/// Writes the previous, offending (with the highlighted range) and next
/// source line, each prefixed with its right-aligned line number.
fn render_context(
    src: &Source,
    line: usize,
    start: usize,
    len: Option<usize>,
    color: &str,
    w: &mut dyn Write,
) -> io::Result<()> {
    if let Some(prev) = src.line(line.wrapping_sub(1)) {
        writeln!(w, "{:>3}| {}", line - 1, prev)?;
    }

    let text = src.line(line).unwrap_or("");
    let start = start.min(text.len());
    let end = match len {
        Some(len) => (start + len).min(text.len()),
        None => text.len(),
    };

    writeln!(
        w,
        "{:>3}| {}{}{}{}{}",
        line,
        &text[..start],
        color,
        &text[start..end],
        RESET,
        &text[end..],
    )?;

    if let Some(next) = src.line(line + 1) {
        writeln!(w, "{:>3}| {}", line + 1, next)?;
    }

    Ok(())
}
