//! A crate for working with the TeC educational 8-bit computer used in
//! introductory hardware courses.
//!
//! Currently this crate provides the functionality to:
//! - Assemble `.t7` symbolic assembly into `.bin` machine code and `.nt`
//!   name tables.
//! - Read and write both artifact formats.
//! - Emulate the machine cycle-accurately, including its timer, serial
//!   port, parallel port, ADC and interrupt priority logic.
//! - Replay a judge's stimulus script against the emulator and collect
//!   the observable output.
//!
//! # Example
//!
//! ```
//! use tec7::{
//!     assembler,
//!     emulator::Machine,
//!     harness::Harness,
//!     parsing::Source,
//!     script,
//!     symbol_table::NameTable,
//! };
//!
//! // A program that loads 5 into G0 and halts.
//! let source = Source::from_str("START: LD G0,#5\n       HALT\n");
//! let assembly = assembler::assemble(&source).expect("assembly failed");
//!
//! let mut machine = Machine::new();
//! machine.load(&assembly.binary);
//!
//! // The judge script: run to completion, then sample G0.
//! let events = script::parse_script("$RUN\n$WAIT STOP\n$PRINT G0\n", &NameTable::new())
//!     .expect("script failed to parse");
//!
//! let mut harness = Harness::new(machine, Vec::new());
//! harness.run(&events).expect("the program faulted");
//!
//! assert_eq!(harness.into_output(), b"5\n");
//! ```
//!
//! # Executables
//!
//! ## `tasm`
//!
//! `tasm <program>.t7` assembles a source file into `<program>.bin` and
//! `<program>.nt` next to it.
//!
//! ## `tec`
//!
//! `tec <program>.bin [<program>.nt]` loads a binary, reads a stimulus
//! script from standard input and prints the observable machine output on
//! standard output.

pub mod assembler;
pub mod binary;
mod devices;
pub mod emulator;
pub mod error;
pub mod event;
pub mod harness;
pub mod instruction;
pub mod parsing;
pub mod printer;
pub mod script;
pub mod symbol_table;
