//! The event-driven test harness.
//!
//! [Harness] owns the machine, the printer and the pending serial input
//! and replays a parsed event list against them. The wait events drive a
//! cooperative loop: the machine executes one serial unit's worth of
//! states at a time, and at every quantum boundary the harness drains one
//! transmitted byte to the printer and moves one queued byte into the SIO
//! receiver. A machine fault aborts the run with a register and stack
//! snapshot.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};

use slog::{o, trace, Discard, Logger};

use crate::emulator::{Machine, Reg, SERIAL_UNIT_STATES};
use crate::event::Event;
use crate::printer::Printer;

/// Machine state captured when an invalid instruction aborts a run.
///
/// Shows the program counter and stack pointer with a five-byte memory
/// window around each, plus the registers and flags.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pc: u8,
    pub sp: u8,
    pub g0: u8,
    pub g1: u8,
    pub g2: u8,
    pub c: bool,
    pub s: bool,
    pub z: bool,
    pub pc_window: [(u8, u8); 5],
    pub sp_window: [(u8, u8); 5],
}

impl Snapshot {
    pub fn capture(machine: &Machine) -> Snapshot {
        let pc = machine.register(Reg::Pc);
        let sp = machine.register(Reg::Sp);

        let window = |base: u8| {
            let mut window = [(0, 0); 5];
            for (i, slot) in window.iter_mut().enumerate() {
                let addr = base.wrapping_sub(4).wrapping_add(i as u8);
                *slot = (addr, machine.memory(addr));
            }
            window
        };

        Snapshot {
            pc,
            sp,
            g0: machine.register(Reg::G0),
            g1: machine.register(Reg::G1),
            g2: machine.register(Reg::G2),
            c: machine.flag(crate::emulator::Flag::C),
            s: machine.flag(crate::emulator::Flag::S),
            z: machine.flag(crate::emulator::Flag::Z),
            pc_window: window(pc),
            sp_window: window(sp),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "INVALID INSTRUCTION.")?;

        writeln!(f, "PC: {:03X}H", self.pc)?;
        for (addr, value) in &self.pc_window {
            writeln!(f, "[{:03X}H]: {:03X}H", addr, value)?;
        }

        writeln!(f, "SP: {:03X}H", self.sp)?;
        for (addr, value) in &self.sp_window {
            writeln!(f, "[{:03X}H]: {:03X}H", addr, value)?;
        }

        writeln!(
            f,
            "G0: {:03X}H, G1: {:03X}H, G2: {:03X}H, SP: {:03X}H",
            self.g0, self.g1, self.g2, self.sp
        )?;
        write!(
            f,
            "C: {}, S: {}, Z: {}",
            self.c as u8, self.s as u8, self.z as u8
        )
    }
}

/// Reasons a harness run aborts.
#[derive(Debug)]
pub enum RunError {
    /// The machine decoded an invalid instruction.
    InvalidInstruction(Box<Snapshot>),

    /// A console interrupt was requested while the machine was stopped.
    NotRunning,

    Io(io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunError::InvalidInstruction(snapshot) => snapshot.fmt(f),
            RunError::NotRunning => f.write_str("the machine is not running"),
            RunError::Io(err) => write!(f, "output error: {}", err),
        }
    }
}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> RunError {
        RunError::Io(err)
    }
}

impl std::error::Error for RunError {}

/// Replays stimulus events against a [Machine].
pub struct Harness<W> {
    machine: Machine,
    printer: Printer<W>,
    serial_in: VecDeque<u8>,
    logger: Logger,
}

impl<W: Write> Harness<W> {
    pub fn new(machine: Machine, out: W) -> Harness<W> {
        Harness::with_logger(machine, out, Logger::root(Discard, o!()))
    }

    pub fn with_logger(machine: Machine, out: W, logger: Logger) -> Harness<W> {
        Harness {
            machine,
            printer: Printer::new(out),
            serial_in: VecDeque::new(),
            logger,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Consumes the harness and hands back the output sink.
    pub fn into_output(self) -> W {
        self.printer.into_inner()
    }

    /// Replays the events in order and flushes the printer.
    pub fn run(&mut self, events: &[Event]) -> Result<(), RunError> {
        for event in events {
            self.handle(event)?;
        }

        self.printer.flush()?;
        Ok(())
    }

    fn handle(&mut self, event: &Event) -> Result<(), RunError> {
        trace!(self.logger, "event"; "event" => ?event);

        match event {
            Event::SetRegister(reg, value) => self.machine.set_register(*reg, *value),
            Event::SetFlag(flag, value) => self.machine.set_flag(*flag, *value),
            Event::SetMemory(addr, value) => self.machine.set_memory(*addr, *value),
            Event::SetDataSwitch(value) => self.machine.set_data_switch(*value),
            Event::SetSerialMode(mode) => self.printer.set_serial_mode(*mode)?,
            Event::SetPrintMode(mode) => self.printer.set_print_mode(*mode)?,

            Event::Run => self.machine.run(),
            Event::Stop => self.machine.stop(),
            Event::Reset => self.machine.reset(),

            Event::SerialIn(bytes) => self.serial_in.extend(bytes.iter().copied()),

            Event::WaitStates(total) => {
                let mut states = 0;
                while states < *total && self.machine.is_running() {
                    let quantum = SERIAL_UNIT_STATES.min(total - states);
                    states += self.pump(quantum)?;
                }
            }
            Event::WaitSerial => {
                while self.machine.is_running()
                    && (self.machine.serial_in_full() || !self.serial_in.is_empty())
                {
                    self.pump(SERIAL_UNIT_STATES)?;
                }
            }
            Event::WaitStop => {
                while self.machine.is_running() {
                    self.pump(SERIAL_UNIT_STATES)?;
                }
            }

            Event::ConsoleInterrupt => {
                if !self.machine.is_running() {
                    return Err(RunError::NotRunning);
                }
                self.machine.raise_console_interrupt();
            }

            Event::PrintRegister(reg) => {
                let value = self.machine.register(*reg);
                self.printer.print(value)?;
            }
            Event::PrintFlag(flag) => {
                let value = self.machine.flag(*flag) as u8;
                self.printer.print(value)?;
            }
            Event::PrintMemory(addr) => {
                let value = self.machine.memory(*addr);
                self.printer.print(value)?;
            }
            Event::PrintParallel => {
                let value = self.machine.parallel_out();
                self.printer.print(value)?;
            }
            Event::PrintExtParallel => {
                let value = self.machine.ext_parallel_out();
                self.printer.print(value)?;
            }
            Event::PrintBuzzer => {
                let value = self.machine.buzzer() as u8;
                self.printer.print(value)?;
            }
            Event::PrintSpeaker => {
                let value = self.machine.speaker() as u8;
                self.printer.print(value)?;
            }
            Event::PrintRun => {
                let value = self.machine.is_running() as u8;
                self.printer.print(value)?;
            }

            Event::AnalogIn { channel, value } => self.machine.write_analog(*channel, *value),
            Event::ParallelIn(value) => self.machine.write_parallel(*value),
        }

        Ok(())
    }

    /// Runs one quantum of execution and exchanges at most one serial byte
    /// in each direction. Faults surface here with a fresh snapshot.
    fn pump(&mut self, quantum: u64) -> Result<u64, RunError> {
        let states = self.machine.clock(quantum);

        if let Some(byte) = self.machine.try_read_serial_out() {
            self.printer.serial(byte)?;
        }

        if let Some(&byte) = self.serial_in.front() {
            if self.machine.try_write_serial_in(byte) {
                self.serial_in.pop_front();
            }
        }

        if self.machine.is_error() {
            return Err(RunError::InvalidInstruction(Box::new(Snapshot::capture(
                &self.machine,
            ))));
        }

        Ok(states)
    }
}
