//! Stimulus events.
//!
//! A judge run is a list of [Event]s parsed from the stimulus script and
//! consumed in order by the harness. Every script command maps to exactly
//! one variant; the harness matches all of them exhaustively.

use crate::emulator::{Flag, Reg};
use crate::printer::OutputMode;

/// One scripted stimulus or observation action.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetRegister(Reg, u8),
    SetFlag(Flag, bool),
    SetMemory(u8, u8),
    SetDataSwitch(u8),
    SetSerialMode(OutputMode),
    SetPrintMode(OutputMode),

    Run,
    Stop,
    Reset,

    /// Bytes queued for the SIO receiver, delivered one per serial unit.
    SerialIn(Vec<u8>),

    /// Execute until this many virtual states elapsed or the machine
    /// stops.
    WaitStates(u64),

    /// Execute until the receive queue and the receive buffer drained.
    WaitSerial,

    /// Execute until the run flag clears.
    WaitStop,

    /// Raise the console interrupt.
    ConsoleInterrupt,

    PrintRegister(Reg),
    PrintFlag(Flag),
    PrintMemory(u8),
    PrintParallel,
    PrintExtParallel,
    PrintBuzzer,
    PrintSpeaker,
    PrintRun,

    AnalogIn { channel: u8, value: u8 },
    ParallelIn(u8),
}
