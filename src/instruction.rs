//! Types for representing instructions and their encodings.
//!
//! A machine instruction is one or two bytes. The first byte packs three
//! fields:
//!
//! ```text
//! bits 7-4  opcode
//! bits 3-2  GR   general register (G0, G1, G2, SP)
//! bits 1-0  XR   addressing mode (direct, G1-indexed, G2-indexed, immediate)
//! ```
//!
//! Mnemonics fall into six families that differ only in which operands they
//! take; [Encoding] carries the family and the base byte the operand fields
//! are OR'd into.

use std::fmt;

/// The general-register field of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gr {
    G0,
    G1,
    G2,
    Sp,
}

impl Gr {
    /// The field value shifted into bits 3-2.
    pub fn field(self) -> u8 {
        match self {
            Gr::G0 => 0x00,
            Gr::G1 => 0x04,
            Gr::G2 => 0x08,
            Gr::Sp => 0x0C,
        }
    }

    pub fn from_name(name: &str) -> Option<Gr> {
        match name {
            "G0" => Some(Gr::G0),
            "G1" => Some(Gr::G1),
            "G2" => Some(Gr::G2),
            "SP" => Some(Gr::Sp),
            _ => None,
        }
    }
}

impl fmt::Display for Gr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Gr::G0 => "G0",
            Gr::G1 => "G1",
            Gr::G2 => "G2",
            Gr::Sp => "SP",
        })
    }
}

/// The addressing-mode field of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xr {
    Direct,
    G1Indexed,
    G2Indexed,
    Immediate,
}

impl Xr {
    /// The field value in bits 1-0.
    pub fn field(self) -> u8 {
        match self {
            Xr::Direct => 0x00,
            Xr::G1Indexed => 0x01,
            Xr::G2Indexed => 0x02,
            Xr::Immediate => 0x03,
        }
    }
}

/// An instruction family together with the base byte of a mnemonic.
///
/// The families group mnemonics by operand shape:
///
/// - [Plain](Encoding::Plain): no operands (`NO EI DI RET RETI HALT`)
/// - [Register](Encoding::Register): `GR` (`SHLA SHLL SHRA SHRL PUSH POP`)
/// - [Port](Encoding::Port): `GR, ioaddr` (`IN OUT`)
/// - [Memory](Encoding::Memory): `GR, addr[, idx]` or `GR, #imm`
///   (`LD ADD SUB CMP AND OR XOR`)
/// - [Store](Encoding::Store): like `Memory` but immediates are invalid (`ST`)
/// - [Branch](Encoding::Branch): `addr[, idx]` (`JMP JZ JC JM CALL JNZ JNC JNM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain { base: u8 },
    Register { base: u8 },
    Port { base: u8 },
    Memory { base: u8 },
    Store { base: u8 },
    Branch { base: u8 },
}

impl Encoding {
    /// Size of an encoded instruction of this family in bytes.
    pub fn size(self) -> u8 {
        match self {
            Encoding::Plain { .. } | Encoding::Register { .. } => 1,
            Encoding::Port { .. }
            | Encoding::Memory { .. }
            | Encoding::Store { .. }
            | Encoding::Branch { .. } => 2,
        }
    }

    /// The byte the operand fields are OR'd into.
    pub fn base(self) -> u8 {
        match self {
            Encoding::Plain { base }
            | Encoding::Register { base }
            | Encoding::Port { base }
            | Encoding::Memory { base }
            | Encoding::Store { base }
            | Encoding::Branch { base } => base,
        }
    }
}

/// Looks up the encoding of an upper-case mnemonic.
pub fn lookup(mnemonic: &str) -> Option<Encoding> {
    use Encoding::*;

    let encoding = match mnemonic {
        "NO" => Plain { base: 0x00 },
        "EI" => Plain { base: 0xE0 },
        "DI" => Plain { base: 0xE3 },
        "RET" => Plain { base: 0xEC },
        "RETI" => Plain { base: 0xEF },
        "HALT" => Plain { base: 0xFF },

        "SHLA" => Register { base: 0x90 },
        "SHLL" => Register { base: 0x91 },
        "SHRA" => Register { base: 0x92 },
        "SHRL" => Register { base: 0x93 },
        "PUSH" => Register { base: 0xD0 },
        "POP" => Register { base: 0xD2 },

        "IN" => Port { base: 0xC0 },
        "OUT" => Port { base: 0xC3 },

        "LD" => Memory { base: 0x10 },
        "ADD" => Memory { base: 0x30 },
        "SUB" => Memory { base: 0x40 },
        "CMP" => Memory { base: 0x50 },
        "AND" => Memory { base: 0x60 },
        "OR" => Memory { base: 0x70 },
        "XOR" => Memory { base: 0x80 },

        "ST" => Store { base: 0x20 },

        "JMP" => Branch { base: 0xA0 },
        "JZ" => Branch { base: 0xA4 },
        "JC" => Branch { base: 0xA8 },
        "JM" => Branch { base: 0xAC },
        "CALL" => Branch { base: 0xB0 },
        "JNZ" => Branch { base: 0xB4 },
        "JNC" => Branch { base: 0xB8 },
        "JNM" => Branch { base: 0xBC },

        _ => return None,
    };

    Some(encoding)
}
