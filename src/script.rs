//! The stimulus-script reader.
//!
//! The judge script arrives on standard input, one command per line:
//! `$`-commands (`$RUN`, `$WAIT STATES 100`, `$SERIAL "AB"`, ...),
//! register, flag and memory assignments (`G0 = 5`, `C = 1`,
//! `[10H] = 0FFH`) and `;` comments. Expressions evaluate over wrapping
//! 8-bit arithmetic and may use labels from the name table.
//!
//! Errors are collected per line and reported together; a script with any
//! bad line never starts the machine.

use std::fmt;

use crate::emulator::{Flag, Reg, STATES_PER_SEC};
use crate::event::Event;
use crate::parsing::{is_printable, LineCursor};
use crate::printer::OutputMode;
use crate::symbol_table::NameTable;

/// An error in one line of the stimulus script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parses a stimulus script into its event list.
///
/// `$END` stops reading early. A final [WaitStop](Event::WaitStop) is
/// always appended so the run only finishes once the program does.
pub fn parse_script(input: &str, names: &NameTable) -> Result<Vec<Event>, Vec<ScriptError>> {
    let mut events = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let mut reader = Reader {
            cur: LineCursor::new(line),
            text: line,
            names,
            line: idx + 1,
            errors: &mut errors,
        };

        if !reader.read_line(&mut events) {
            break;
        }
    }

    events.push(Event::WaitStop);

    if errors.is_empty() {
        Ok(events)
    } else {
        Err(errors)
    }
}

struct Reader<'a> {
    cur: LineCursor<'a>,
    text: &'a str,
    names: &'a NameTable,
    line: usize,
    errors: &'a mut Vec<ScriptError>,
}

impl<'a> Reader<'a> {
    fn error(&mut self, message: String) {
        self.errors.push(ScriptError {
            line: self.line,
            message,
        });
    }

    /// Resolves a label against the name table.
    fn label(&mut self) -> Option<u8> {
        debug_assert!(self.cur.at_name_start());
        let name = self.cur.take_name();

        match self.names.get(&name) {
            Some(value) => Some(value),
            None => {
                self.error(format!("the label cannot be found (label: \"{}\")", name));
                None
            }
        }
    }

    /// Reads a numeric literal as a wrapping byte.
    fn num(&mut self) -> Option<u8> {
        debug_assert!(self.cur.at_digit());

        let mut digits = String::new();
        let mut is_hex = false;
        loop {
            let b = self.cur.peek().unwrap();
            if !b.is_ascii_digit() {
                is_hex = true;
            }
            digits.push(b as char);
            self.cur.advance();

            if !self.cur.at_xdigit() {
                break;
            }
        }

        if self.cur.eat(b'H') || self.cur.eat(b'h') {
            is_hex = true;
        } else if is_hex {
            self.error("invalid hex literal ('H' is required)".to_string());
            return None;
        }

        let radix = if is_hex { 16 } else { 10 };
        match i32::from_str_radix(&digits, radix) {
            Ok(value) => Some(value as u8),
            Err(_) => {
                self.error(format!("the value is too large (value: \"{}\")", digits));
                None
            }
        }
    }

    fn value(&mut self) -> Option<u8> {
        self.cur.skip_space_or_comment();
        let mut positive = true;
        if self.cur.eat(b'+') {
            self.cur.skip_space_or_comment();
        } else if self.cur.eat(b'-') {
            self.cur.skip_space_or_comment();
            positive = false;
        }

        let mut value;
        if self.cur.at_name_start() {
            value = self.label()?;
        } else if self.cur.at_digit() {
            value = self.num()?;
        } else if self.cur.eat(b'(') {
            value = self.add()?;
            self.cur.skip_space_or_comment();
            if !self.cur.eat(b')') {
                self.error("')' is required".to_string());
                return None;
            }
        } else if self.cur.eat(b'\'') {
            match self.cur.peek() {
                Some(b) if is_printable(b) => {
                    value = b;
                    self.cur.advance();
                }
                _ => {
                    self.error("invalid character literal".to_string());
                    return None;
                }
            }
            if !self.cur.eat(b'\'') {
                self.error("'\\'' (quotation) is required".to_string());
                return None;
            }
        } else {
            self.error("a value is required".to_string());
            return None;
        }

        if !positive {
            value = value.wrapping_neg();
        }

        Some(value)
    }

    fn mul(&mut self) -> Option<u8> {
        let mut value = self.value()?;

        loop {
            self.cur.skip_space_or_comment();
            if self.cur.eat(b'*') {
                let rhs = self.value()?;
                value = value.wrapping_mul(rhs);
            } else if self.cur.eat(b'/') {
                let rhs = self.value()?;
                if rhs == 0 {
                    self.error("division by zero detected".to_string());
                    return None;
                }
                value /= rhs;
            } else {
                break;
            }
        }

        Some(value)
    }

    fn add(&mut self) -> Option<u8> {
        let mut value = self.mul()?;

        loop {
            self.cur.skip_space_or_comment();
            if self.cur.eat(b'+') {
                let rhs = self.mul()?;
                value = value.wrapping_add(rhs);
            } else if self.cur.eat(b'-') {
                let rhs = self.mul()?;
                value = value.wrapping_sub(rhs);
            } else {
                break;
            }
        }

        Some(value)
    }

    /// Takes a command word or argument: letters, digits, `-` and `_`,
    /// folded to upper case. Returns `None` without an error when the
    /// cursor is not on a word.
    fn word(&mut self) -> Option<String> {
        self.cur.skip_space_or_comment();

        match self.cur.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
            _ => return None,
        }

        let mut word = String::new();
        loop {
            word.push(self.cur.advance().unwrap().to_ascii_uppercase() as char);

            match self.cur.peek() {
                Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => {}
                _ => break,
            }
        }

        Some(word)
    }

    fn float(&mut self) -> Option<f32> {
        self.cur.skip_space_or_comment();
        if !self.cur.at_digit() {
            self.error("a real number is required".to_string());
            return None;
        }

        let mut digits = String::new();
        while self.cur.at_digit() {
            digits.push(self.cur.advance().unwrap() as char);
        }
        if self.cur.eat(b'.') {
            if !self.cur.at_digit() {
                self.error("no fraction digits after '.'".to_string());
                return None;
            }
            digits.push('.');
            while self.cur.at_digit() {
                digits.push(self.cur.advance().unwrap() as char);
            }
        }

        let value: f32 = digits.parse().unwrap_or(f32::INFINITY);
        if !value.is_finite() {
            self.error(format!("the real number is too large (real: \"{}\")", digits));
            return None;
        }

        Some(value)
    }

    fn check_eq(&mut self) -> bool {
        self.cur.skip_space_or_comment();
        if !self.cur.eat(b'=') {
            self.error("'=' is required".to_string());
            return false;
        }
        true
    }

    fn check_rbracket(&mut self) -> bool {
        self.cur.skip_space_or_comment();
        if !self.cur.eat(b']') {
            self.error("']' is required".to_string());
            return false;
        }
        true
    }

    /// Reads one line, appending its events. Returns `false` on `$END`.
    fn read_line(&mut self, events: &mut Vec<Event>) -> bool {
        if self.cur.eat(b'$') {
            let cmd = match self.word() {
                Some(cmd) => cmd,
                None => {
                    self.error("a command is required".to_string());
                    return true;
                }
            };

            match cmd.as_str() {
                "RUN" => events.push(Event::Run),
                "STOP" => events.push(Event::Stop),
                "RESET" => events.push(Event::Reset),
                "WRITE" => events.push(Event::ConsoleInterrupt),
                "END" => return false,
                "WAIT" => {
                    let arg = match self.word() {
                        Some(arg) => arg,
                        None => {
                            self.error("an argument is required".to_string());
                            return true;
                        }
                    };

                    match arg.as_str() {
                        "STOP" => events.push(Event::WaitStop),
                        "SERIAL" => events.push(Event::WaitSerial),
                        "STATES" | "MS" | "SEC" => {
                            self.cur.skip_space_or_comment();
                            if !self.cur.at_digit() {
                                self.error("an integer is required".to_string());
                                return true;
                            }
                            let mut digits = String::new();
                            while self.cur.at_digit() {
                                digits.push(self.cur.advance().unwrap() as char);
                            }
                            let states: u64 = match digits.parse() {
                                Ok(states) => states,
                                Err(_) => {
                                    self.error(format!(
                                        "the integer is too large (integer: {})",
                                        digits
                                    ));
                                    return true;
                                }
                            };
                            let states = match arg.as_str() {
                                "MS" => states.wrapping_mul(STATES_PER_SEC) / 1000,
                                "SEC" => states.wrapping_mul(STATES_PER_SEC),
                                _ => states,
                            };
                            events.push(Event::WaitStates(states));
                        }
                        _ => {
                            self.error(format!("invalid WAIT target (target: {})", arg));
                            return true;
                        }
                    }
                }
                "DATA-SW" => match self.add() {
                    Some(value) => events.push(Event::SetDataSwitch(value)),
                    None => return true,
                },
                "SERIAL-MODE" | "PRINT-MODE" => {
                    let arg = match self.word() {
                        Some(arg) => arg,
                        None => {
                            self.error("an argument is required".to_string());
                            return true;
                        }
                    };

                    match OutputMode::from_name(&arg) {
                        Some(mode) if cmd == "SERIAL-MODE" => {
                            events.push(Event::SetSerialMode(mode))
                        }
                        Some(mode) => events.push(Event::SetPrintMode(mode)),
                        None => {
                            self.error(
                                "an output mode is required \
                                 (available modes: (RAW|HEX|TEC|SDEC|UDEC))"
                                    .to_string(),
                            );
                            return true;
                        }
                    }
                }
                "PRINT" => {
                    self.cur.skip_space_or_comment();
                    if self.cur.eat(b'[') {
                        let addr = match self.add() {
                            Some(addr) => addr,
                            None => return true,
                        };
                        if !self.check_rbracket() {
                            return true;
                        }
                        events.push(Event::PrintMemory(addr));
                    } else if matches!(self.cur.peek(), Some(b) if b.is_ascii_alphabetic()) {
                        let mut target = String::new();
                        loop {
                            target.push(self.cur.advance().unwrap().to_ascii_uppercase() as char);
                            match self.cur.peek() {
                                Some(b) if b.is_ascii_alphanumeric() || b == b'-' => {}
                                _ => break,
                            }
                        }

                        if let Some(reg) = Reg::from_name(&target) {
                            events.push(Event::PrintRegister(reg));
                        } else if let Some(flag) = Flag::from_name(&target) {
                            events.push(Event::PrintFlag(flag));
                        } else {
                            match target.as_str() {
                                "PARALLEL" => events.push(Event::PrintParallel),
                                "EXT-PARALLEL" => events.push(Event::PrintExtParallel),
                                "BUZ" => events.push(Event::PrintBuzzer),
                                "SPK" => events.push(Event::PrintSpeaker),
                                "RUN" => events.push(Event::PrintRun),
                                _ => {
                                    self.error(format!(
                                        "invalid register or flag name (start of name: \"{}\")",
                                        target
                                    ));
                                    return true;
                                }
                            }
                        }
                    } else {
                        self.error("invalid print target".to_string());
                        return true;
                    }
                }
                "SERIAL" => {
                    let mut data = Vec::new();
                    loop {
                        self.cur.skip_space_or_comment();
                        if self.cur.eat(b'"') {
                            while matches!(self.cur.peek(), Some(b) if is_printable(b) && b != b'"')
                            {
                                data.push(self.cur.advance().unwrap());
                            }
                            if !self.cur.eat(b'"') {
                                self.error("'\"' is required".to_string());
                                return true;
                            }
                        } else {
                            match self.add() {
                                Some(value) => data.push(value),
                                None => return true,
                            }
                        }

                        if !self.cur.eat(b',') {
                            break;
                        }
                    }
                    events.push(Event::SerialIn(data));
                }
                "ANALOG" => {
                    let channel = match self.word() {
                        Some(word) => {
                            let bytes = word.as_bytes();
                            if word.len() != 3
                                || !word.starts_with("CH")
                                || !(b'0'..=b'3').contains(&bytes[2])
                            {
                                self.error("an ADC channel is required".to_string());
                                return true;
                            }
                            bytes[2] - b'0'
                        }
                        None => {
                            self.error("an ADC channel is required".to_string());
                            return true;
                        }
                    };

                    let volts = match self.float() {
                        Some(volts) => volts,
                        None => return true,
                    };

                    self.cur.skip_space_or_comment();
                    let value = if self.cur.eat(b'V') {
                        (255.0 * volts / 3.3) as u32
                    } else if self.cur.eat(b'm') && self.cur.eat(b'V') {
                        (255.0 * volts / 3300.0) as u32
                    } else {
                        self.error("'V' or \"mV\" is required".to_string());
                        return true;
                    };

                    events.push(Event::AnalogIn {
                        channel,
                        value: value.min(255) as u8,
                    });
                }
                "PARALLEL" => match self.add() {
                    Some(value) => events.push(Event::ParallelIn(value)),
                    None => return true,
                },
                _ => {
                    self.error(format!("unknown command (command: \"{}\")", cmd));
                    return true;
                }
            }
        } else if self.cur.eat(b'[') {
            let addr = match self.add() {
                Some(addr) => addr,
                None => return true,
            };
            if !self.check_rbracket() {
                return true;
            }
            if !self.check_eq() {
                return true;
            }
            let value = match self.add() {
                Some(value) => value,
                None => return true,
            };
            events.push(Event::SetMemory(addr, value));
        } else if matches!(self.cur.peek(), Some(b) if b.is_ascii_alphabetic()) {
            let mut target = String::new();
            loop {
                target.push(self.cur.advance().unwrap().to_ascii_uppercase() as char);
                match self.cur.peek() {
                    Some(b) if b.is_ascii_alphanumeric() => {}
                    _ => break,
                }
            }

            if let Some(reg) = Reg::from_name(&target) {
                if !self.check_eq() {
                    return true;
                }
                let value = match self.add() {
                    Some(value) => value,
                    None => return true,
                };
                events.push(Event::SetRegister(reg, value));
            } else if let Some(flag) = Flag::from_name(&target) {
                if !self.check_eq() {
                    return true;
                }
                self.cur.skip_space_or_comment();
                let mut value = false;
                if let Some(b) = self.cur.peek() {
                    match b {
                        b'0' => {
                            self.cur.advance();
                        }
                        b'1' => {
                            self.cur.advance();
                            value = true;
                        }
                        _ => {
                            self.error("'0' or '1' is required".to_string());
                            return true;
                        }
                    }
                }
                events.push(Event::SetFlag(flag, value));
            } else {
                self.error(format!(
                    "invalid register or flag name (start of name: \"{}\")",
                    target
                ));
                return true;
            }
        }

        self.cur.skip_space_or_comment();
        if !self.cur.at_end() {
            let message = format!(
                "could not parse the rest of the input (line: {})",
                self.text
            );
            self.error(message);
            return true;
        }

        true
    }
}
