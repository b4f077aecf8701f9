//! Formatting of observable output.
//!
//! Serial traffic and `$PRINT` samples go into two separate buffers, each
//! flushed in its own output mode. Switching the active category flushes
//! the other one first so the observable byte order follows the script.

use std::io::{self, Write};

/// How a flushed byte buffer is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Bytes verbatim.
    Raw,

    /// Two hex digits per byte, space separated, a newline every eight
    /// bytes and one at the end.
    Hex,

    /// `0XXH`, one byte per line.
    Tec,

    /// Signed decimal, one byte per line.
    SignedDecimal,

    /// Unsigned decimal, one byte per line.
    UnsignedDecimal,
}

impl OutputMode {
    pub fn from_name(name: &str) -> Option<OutputMode> {
        match name {
            "RAW" => Some(OutputMode::Raw),
            "HEX" => Some(OutputMode::Hex),
            "TEC" => Some(OutputMode::Tec),
            "SDEC" => Some(OutputMode::SignedDecimal),
            "UDEC" => Some(OutputMode::UnsignedDecimal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    None,
    Serial,
    Print,
}

/// Buffers and formats the two output categories.
pub struct Printer<W> {
    out: W,
    serial_mode: OutputMode,
    print_mode: OutputMode,
    buffer: Vec<u8>,
    current: Category,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W) -> Printer<W> {
        Printer {
            out,
            serial_mode: OutputMode::Raw,
            print_mode: OutputMode::UnsignedDecimal,
            buffer: Vec::new(),
            current: Category::None,
        }
    }

    /// Changes the serial mode, flushing buffered serial bytes in the old
    /// mode first.
    pub fn set_serial_mode(&mut self, mode: OutputMode) -> io::Result<()> {
        if self.current == Category::Serial {
            let old = self.serial_mode;
            self.flush_as(old)?;
        }
        self.serial_mode = mode;
        Ok(())
    }

    /// Changes the print mode, flushing buffered print bytes in the old
    /// mode first.
    pub fn set_print_mode(&mut self, mode: OutputMode) -> io::Result<()> {
        if self.current == Category::Print {
            let old = self.print_mode;
            self.flush_as(old)?;
        }
        self.print_mode = mode;
        Ok(())
    }

    /// Buffers a byte observed on the serial line.
    pub fn serial(&mut self, byte: u8) -> io::Result<()> {
        if self.current != Category::Serial {
            self.flush()?;
            self.current = Category::Serial;
        }
        self.buffer.push(byte);
        Ok(())
    }

    /// Buffers a sampled byte.
    pub fn print(&mut self, byte: u8) -> io::Result<()> {
        if self.current != Category::Print {
            self.flush()?;
            self.current = Category::Print;
        }
        self.buffer.push(byte);
        Ok(())
    }

    /// Flushes whatever category is buffered, in its mode.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.current {
            Category::None => {
                debug_assert!(self.buffer.is_empty());
                Ok(())
            }
            Category::Serial => {
                let mode = self.serial_mode;
                self.flush_as(mode)
            }
            Category::Print => {
                let mode = self.print_mode;
                self.flush_as(mode)
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_as(&mut self, mode: OutputMode) -> io::Result<()> {
        match mode {
            OutputMode::Raw => {
                self.out.write_all(&self.buffer)?;
            }
            OutputMode::Hex => {
                for (idx, byte) in self.buffer.iter().enumerate() {
                    write!(self.out, "{:02X}", byte)?;
                    if idx + 1 < self.buffer.len() {
                        let sep = if (idx + 1) % 8 == 0 { '\n' } else { ' ' };
                        write!(self.out, "{}", sep)?;
                    }
                }
                writeln!(self.out)?;
            }
            OutputMode::Tec => {
                for byte in &self.buffer {
                    writeln!(self.out, "{:03X}H", byte)?;
                }
            }
            OutputMode::SignedDecimal => {
                for byte in &self.buffer {
                    writeln!(self.out, "{}", *byte as i8)?;
                }
            }
            OutputMode::UnsignedDecimal => {
                for byte in &self.buffer {
                    writeln!(self.out, "{}", byte)?;
                }
            }
        }

        self.buffer.clear();
        Ok(())
    }
}
