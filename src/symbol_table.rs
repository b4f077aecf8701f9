//! Label tables and the name-table artifact.
//!
//! The assembler's first pass builds a [LabelTable] mapping upper-case
//! label names to their 8-bit values and definition lines. The table is
//! written out as the `.nt` name-table artifact, one `NAME:    0XXH` line
//! per label, which the emulator reads back with [NameTable::parse] so the
//! stimulus script can refer to program addresses by name.

use logos::Logos;

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

/// A defined label: its resolved value and the line that defined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub value: u8,
    pub line: usize,
}

/// Label store of the assembler. Keeps definition order so the name-table
/// artifact is deterministic.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    inner: HashMap<String, Label>,
    order: Vec<String>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        Default::default()
    }

    /// Defines a label. If the name is already taken the table is left
    /// unchanged and the previous definition is returned.
    pub fn define(&mut self, name: String, value: u8, line: usize) -> Result<(), Label> {
        if let Some(previous) = self.inner.get(&name) {
            return Err(*previous);
        }

        self.inner.insert(name.clone(), Label { value, line });
        self.order.push(name);

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Label> {
        self.inner.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over the labels in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Label)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.inner[name]))
    }

    /// Writes the name-table artifact: `NAME:` padded to eight columns,
    /// then the value as three hex digits with an `H` suffix.
    pub fn write_name_table(&self, w: &mut dyn Write) -> io::Result<()> {
        for (name, label) in self.iter() {
            writeln!(w, "{:<8} 0{:02X}H", format!("{}:", name), label.value)?;
        }

        Ok(())
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
enum Token<'t> {
    #[error]
    #[regex(r"[ \t\f\r]+", logos::skip)]
    Error,

    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Symbol(&'t str),

    #[token(":")]
    Colon,

    #[regex("[0-9][0-9A-Fa-f]*[Hh]?", Lexer::slice)]
    Number(&'t str),
}

/// An error in one line of a name-table file. Reading continues past bad
/// lines so that every problem is reported in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NameTableError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for NameTableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

/// The name table as the emulator sees it: label name to address.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    inner: HashMap<String, u8>,
}

impl NameTable {
    pub fn new() -> NameTable {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        self.inner.get(name).copied()
    }

    pub fn insert(&mut self, name: String, value: u8) {
        self.inner.insert(name, value);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Parses a `.nt` file. Every line must be empty or `LABEL: VALUE`
    /// where `VALUE` is decimal or hex with a trailing `H`. Bad lines are
    /// collected and reported together once the whole file has been read.
    pub fn parse(input: &str) -> Result<NameTable, Vec<NameTableError>> {
        let mut table = NameTable::new();
        let mut errors = Vec::new();

        for (idx, line) in input.lines().enumerate() {
            let number = idx + 1;
            let tokens: Vec<Token> = Token::lexer(line).collect();

            match tokens.as_slice() {
                [] => continue,
                [Token::Symbol(name), Token::Colon, Token::Number(digits)] => {
                    match parse_value(digits) {
                        Ok(value) => table.insert(name.to_ascii_uppercase(), value),
                        Err(message) => errors.push(NameTableError {
                            line: number,
                            message,
                        }),
                    }
                }
                [Token::Symbol(_), Token::Colon, Token::Number(_), ..] => {
                    errors.push(NameTableError {
                        line: number,
                        message: format!("malformed name table line (line: \"{}\")", line),
                    });
                }
                [Token::Symbol(_), Token::Colon, ..] => errors.push(NameTableError {
                    line: number,
                    message: "a value is required".to_string(),
                }),
                [Token::Symbol(_), ..] => errors.push(NameTableError {
                    line: number,
                    message: "':' is required".to_string(),
                }),
                _ => errors.push(NameTableError {
                    line: number,
                    message: "a label is required".to_string(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }
}

fn parse_value(digits: &str) -> Result<u8, String> {
    let (digits, hex) = match digits.strip_suffix(|c| c == 'H' || c == 'h') {
        Some(rest) => (rest, true),
        None => (digits, false),
    };

    if !hex && digits.bytes().any(|b| !b.is_ascii_digit()) {
        return Err("'H' is required".to_string());
    }

    let radix = if hex { 16 } else { 10 };
    match i32::from_str_radix(digits, radix) {
        Ok(value) => Ok(value as u8),
        Err(_) => Err(format!("the value is too large (value: {})", digits)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_rejects_duplicates() {
        let mut table = LabelTable::new();

        assert!(table.define("FOO".to_string(), 5, 1).is_ok());
        assert_eq!(
            table.define("FOO".to_string(), 9, 3),
            Err(Label { value: 5, line: 1 })
        );
        assert_eq!(table.get("FOO"), Some(Label { value: 5, line: 1 }));
    }

    #[test]
    fn name_table_format() {
        let mut table = LabelTable::new();
        table.define("FOO".to_string(), 5, 1).unwrap();
        table.define("LONGNAME".to_string(), 0xE0, 2).unwrap();

        let mut out = Vec::new();
        table.write_name_table(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "FOO:     005H\nLONGNAME: 0E0H\n"
        );
    }

    #[test]
    fn parse_round_trip() {
        let table = NameTable::parse("FOO:     005H\nBAR:     123\n").unwrap();

        assert_eq!(table.get("FOO"), Some(5));
        assert_eq!(table.get("BAR"), Some(123));
    }

    #[test]
    fn parse_is_case_insensitive_and_space_tolerant() {
        let table = NameTable::parse("  loop :  0ffH\n").unwrap();

        assert_eq!(table.get("LOOP"), Some(0xFF));
    }

    #[test]
    fn parse_reports_every_bad_line() {
        let errors = NameTable::parse("FOO 5\nBAR:\n12: 3\nBAZ: 0FF\n").unwrap_err();

        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].line, 1);
        assert!(errors[0].message.contains("':'"));
        assert!(errors[1].message.contains("value is required"));
        assert!(errors[2].message.contains("label is required"));
        assert!(errors[3].message.contains("'H'"));
    }

    #[test]
    fn parse_wraps_values_like_the_loader() {
        let table = NameTable::parse("BIG: 300\n").unwrap();

        assert_eq!(table.get("BIG"), Some(44));
    }
}
