//! The machine: CPU, main memory and peripherals.
//!
//! [Machine] owns the whole execution environment: the four general
//! registers, the program counter, the three condition flags, 256 bytes of
//! main memory with the ROM-resident IPL, and the peripheral block. One
//! instruction executes per [step](Machine::step); [clock](Machine::clock)
//! batches steps up to a budget of virtual states so a driver can
//! interleave execution with serial traffic at byte granularity.
//!
//! # Example
//!
//! ```
//! use tec7::binary::Binary;
//! use tec7::emulator::{Machine, Reg};
//!
//! // LD G0,#5 / HALT
//! let mut machine = Machine::new();
//! machine.load(&Binary { start: 0, data: vec![0x13, 0x05, 0xFF] });
//!
//! machine.run();
//! while machine.is_running() {
//!     machine.clock(tec7::emulator::SERIAL_UNIT_STATES);
//! }
//!
//! assert_eq!(machine.register(Reg::G0), 5);
//! ```

use slog::{debug, o, trace, Discard, Logger};

use crate::binary::{Binary, MEMORY_SIZE, ROM_START};
use crate::devices::Devices;

/// Clock frequency in states per second (2.4576 MHz).
pub const STATES_PER_SEC: u64 = 2_457_600;

/// Serial line speed in bits per second.
pub const SIO_BIT_PER_SEC: u64 = 9_600;

/// States needed to move one byte over the serial line. This is the
/// fundamental quantum at which a driver interleaves with the CPU.
pub const SERIAL_UNIT_STATES: u64 = STATES_PER_SEC / (SIO_BIT_PER_SEC * 8);

/// Interrupt vectors, in priority order.
const VEC_TIMER: u8 = 0xDC;
const VEC_RX: u8 = 0xDD;
const VEC_TX: u8 = 0xDE;
const VEC_CONSOLE: u8 = 0xDF;

/// The initial program loader, resident in ROM at `0xE0..0x100`.
pub const IPL: [u8; 32] = [
    0x1F, 0xDC, 0xB0, 0xF6, 0xD0, 0xD6, 0xB0, 0xF6, // 0xE0
    0xD0, 0xDA, 0xA4, 0xFF, 0xB0, 0xF6, 0x21, 0x00, // 0xE8
    0x37, 0x01, 0x4B, 0x01, 0xA0, 0xEA, 0xC0, 0x03, // 0xF0
    0x63, 0x40, 0xA4, 0xF6, 0xC0, 0x02, 0xEC, 0xFF, // 0xF8
];

/// The named registers a driver can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    G0,
    G1,
    G2,
    Sp,
    Pc,
}

impl Reg {
    pub fn from_name(name: &str) -> Option<Reg> {
        match name {
            "G0" => Some(Reg::G0),
            "G1" => Some(Reg::G1),
            "G2" => Some(Reg::G2),
            "SP" => Some(Reg::Sp),
            "PC" => Some(Reg::Pc),
            _ => None,
        }
    }
}

/// The condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    C,
    S,
    Z,
}

impl Flag {
    pub fn from_name(name: &str) -> Option<Flag> {
        match name {
            "C" => Some(Flag::C),
            "S" => Some(Flag::S),
            "Z" => Some(Flag::Z),
            _ => None,
        }
    }
}

/// Main memory with the write gate for the ROM region.
struct Memory {
    bytes: [u8; MEMORY_SIZE],
}

impl Memory {
    fn new() -> Memory {
        let mut bytes = [0; MEMORY_SIZE];
        bytes[ROM_START as usize..].copy_from_slice(&IPL);
        Memory { bytes }
    }

    fn read(&self, addr: u8) -> u8 {
        self.bytes[addr as usize]
    }

    /// Stores silently drop when the address is in ROM.
    fn write(&mut self, addr: u8, value: u8) {
        if addr < ROM_START {
            self.bytes[addr as usize] = value;
        }
    }
}

/// The complete machine state.
pub struct Machine {
    g0: u8,
    g1: u8,
    g2: u8,
    sp: u8,
    pc: u8,

    c: bool,
    s: bool,
    z: bool,

    /// Interrupt enable.
    ie: bool,
    run: bool,
    err: bool,

    mem: Memory,
    dev: Devices,

    logger: Logger,
}

impl Machine {
    pub fn new() -> Machine {
        Machine::with_logger(Logger::root(Discard, o!()))
    }

    pub fn with_logger(logger: Logger) -> Machine {
        Machine {
            g0: 0,
            g1: 0,
            g2: 0,
            sp: 0,
            pc: 0,
            c: false,
            s: false,
            z: false,
            ie: false,
            run: false,
            err: false,
            mem: Memory::new(),
            dev: Devices::new(),
            logger,
        }
    }

    /// Loads a program into main memory. Bytes that fall into the ROM
    /// region are dropped by the write gate.
    pub fn load(&mut self, binary: &Binary) {
        debug!(self.logger, "loading program";
               "start" => binary.start, "size" => binary.data.len());

        for (i, &byte) in binary.data.iter().enumerate() {
            self.mem.write(binary.start.wrapping_add(i as u8), byte);
        }
    }

    pub fn run(&mut self) {
        debug!(self.logger, "run");
        self.run = true;
    }

    pub fn stop(&mut self) {
        debug!(self.logger, "stop");
        self.run = false;
    }

    /// Resets the CPU: registers, flags and the SIO handshake state.
    /// Memory, the timer and the console interrupt enable keep their
    /// values.
    pub fn reset(&mut self) {
        debug!(self.logger, "reset");
        self.run = false;
        self.err = false;
        self.g0 = 0;
        self.g1 = 0;
        self.g2 = 0;
        self.sp = 0;
        self.pc = 0;
        self.dev.tx_empty = true;
        self.dev.rx_full = false;
        self.dev.tx_int_enable = false;
        self.dev.rx_int_enable = false;
    }

    pub fn register(&self, reg: Reg) -> u8 {
        match reg {
            Reg::G0 => self.g0,
            Reg::G1 => self.g1,
            Reg::G2 => self.g2,
            Reg::Sp => self.sp,
            Reg::Pc => self.pc,
        }
    }

    pub fn set_register(&mut self, reg: Reg, value: u8) {
        match reg {
            Reg::G0 => self.g0 = value,
            Reg::G1 => self.g1 = value,
            Reg::G2 => self.g2 = value,
            Reg::Sp => self.sp = value,
            Reg::Pc => self.pc = value,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::C => self.c,
            Flag::S => self.s,
            Flag::Z => self.z,
        }
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::C => self.c = value,
            Flag::S => self.s = value,
            Flag::Z => self.z = value,
        }
    }

    pub fn memory(&self, addr: u8) -> u8 {
        self.mem.read(addr)
    }

    /// Writes main memory through the ROM gate.
    pub fn set_memory(&mut self, addr: u8, value: u8) {
        self.mem.write(addr, value);
    }

    pub fn set_data_switch(&mut self, value: u8) {
        self.dev.data_switch = value;
    }

    pub fn buzzer(&self) -> bool {
        self.dev.buzzer
    }

    pub fn speaker(&self) -> bool {
        self.dev.speaker
    }

    pub fn parallel_out(&self) -> u8 {
        self.dev.parallel_out
    }

    pub fn ext_parallel_out(&self) -> u8 {
        self.dev.ext_parallel_out
    }

    pub fn write_parallel(&mut self, value: u8) {
        self.dev.write_parallel(value);
    }

    pub fn write_analog(&mut self, channel: u8, value: u8) {
        self.dev.write_analog(channel, value);
    }

    /// Raises the console interrupt.
    pub fn raise_console_interrupt(&mut self) {
        self.dev.console_pending = true;
    }

    pub fn is_running(&self) -> bool {
        self.run
    }

    pub fn is_error(&self) -> bool {
        self.err
    }

    pub fn serial_in_full(&self) -> bool {
        self.dev.rx_full
    }

    /// Hands one byte to the SIO receiver. Fails while the receive buffer
    /// still holds an unread byte.
    pub fn try_write_serial_in(&mut self, value: u8) -> bool {
        if self.dev.rx_full {
            return false;
        }

        self.dev.rx_data = value;
        self.dev.rx_full = true;
        true
    }

    /// Takes one byte out of the SIO transmitter if it holds one.
    pub fn try_read_serial_out(&mut self) -> Option<u8> {
        if self.dev.tx_empty {
            return None;
        }

        self.dev.tx_empty = true;
        Some(self.dev.tx_data)
    }

    /// Executes instructions until at least `max_states` virtual states
    /// elapsed or the run flag cleared. Returns the states consumed; an
    /// instruction in flight when the budget runs out finishes, so the
    /// result can exceed `max_states`.
    pub fn clock(&mut self, max_states: u64) -> u64 {
        let mut states = 0;
        self.run = true;
        loop {
            states += self.step() as u64;
            if states >= max_states || !self.run {
                break;
            }
        }

        states
    }

    fn fetch(&mut self) -> u8 {
        let byte = self.mem.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn read_gr(&self, gr: u8) -> u8 {
        match gr {
            0b00 => self.g0,
            0b01 => self.g1,
            0b10 => self.g2,
            _ => self.sp,
        }
    }

    fn write_gr(&mut self, gr: u8, value: u8) {
        match gr {
            0b00 => self.g0 = value,
            0b01 => self.g1 = value,
            0b10 => self.g2 = value,
            _ => self.sp = value,
        }
    }

    /// Effective address for the non-immediate modes.
    fn effective_addr(&self, xr: u8, operand: u8) -> u8 {
        match xr {
            0b00 => operand,
            0b01 => operand.wrapping_add(self.g1),
            _ => operand.wrapping_add(self.g2),
        }
    }

    /// Operand value under `xr`: a memory read, or the operand byte itself
    /// in immediate mode.
    fn read_operand(&self, xr: u8, operand: u8) -> u8 {
        match xr {
            0b11 => operand,
            _ => self.mem.read(self.effective_addr(xr, operand)),
        }
    }

    /// Sets the error flag and drops out of the run state.
    fn fault(&mut self) {
        debug!(self.logger, "invalid instruction"; "pc" => self.pc);
        self.err = true;
        self.run = false;
    }

    /// Pushes the return context and enters the handler at `M[vec]`.
    fn dispatch_interrupt(&mut self, vec: u8) {
        trace!(self.logger, "interrupt"; "vector" => vec);

        self.sp = self.sp.wrapping_sub(1);
        self.mem.write(self.sp, self.pc);

        let flags = (if self.ie { 0x80 } else { 0x00 })
            | (if self.c { 0x04 } else { 0x00 })
            | (if self.s { 0x02 } else { 0x00 })
            | (if self.z { 0x01 } else { 0x00 });
        self.sp = self.sp.wrapping_sub(1);
        self.mem.write(self.sp, flags);

        self.pc = self.mem.read(vec);
        self.ie = false;
    }

    /// Executes one instruction and returns the states it consumed (zero
    /// on a fault or `HALT`).
    ///
    /// The timer advances and at most one pending interrupt dispatches at
    /// the instruction boundary, in priority order: timer, serial receive,
    /// serial transmit, console. Timer and console requests are cleared by
    /// the dispatch; the serial conditions are level-driven and re-fire
    /// until the handler drains them.
    fn step(&mut self) -> u8 {
        self.dev.advance_timer();

        if self.ie {
            if self.dev.timer_int_enable && self.dev.timer_pending {
                self.dev.timer_pending = false;
                self.dispatch_interrupt(VEC_TIMER);
            } else if self.dev.rx_int_enable && self.dev.rx_full {
                self.dispatch_interrupt(VEC_RX);
            } else if self.dev.tx_int_enable && self.dev.tx_empty {
                self.dispatch_interrupt(VEC_TX);
            } else if self.dev.console_int_enable && self.dev.console_pending {
                self.dev.console_pending = false;
                self.dispatch_interrupt(VEC_CONSOLE);
            }
        }

        let inst = self.fetch();
        let op = (inst >> 4) & 0x0F;
        let gr = (inst >> 2) & 0x03;
        let xr = inst & 0x03;

        let mut states: u8 = 0;
        match op {
            // NO
            0x0 => {
                if gr != 0b00 || xr != 0b00 {
                    self.fault();
                } else {
                    states += 2;
                }
            }
            // LD
            0x1 => {
                let operand = self.fetch();
                let value = self.read_operand(xr, operand);
                self.write_gr(gr, value);
                states += 4;
            }
            // ST
            0x2 => {
                if xr == 0b11 {
                    self.fault();
                } else {
                    let operand = self.fetch();
                    let addr = self.effective_addr(xr, operand);
                    let value = self.read_gr(gr);
                    self.mem.write(addr, value);
                    states += 3;
                }
            }
            // ADD
            0x3 => {
                let operand = self.fetch();
                let value =
                    (self.read_gr(gr) as u16).wrapping_add(self.read_operand(xr, operand) as u16);
                self.c = value & 0x100 != 0;
                self.s = value & 0x080 != 0;
                self.z = value & 0x0FF == 0;
                self.write_gr(gr, (value & 0xFF) as u8);
                states += 4;
            }
            // SUB
            0x4 => {
                let operand = self.fetch();
                let value =
                    (self.read_gr(gr) as u16).wrapping_sub(self.read_operand(xr, operand) as u16);
                self.c = value & 0x100 != 0;
                self.s = value & 0x080 != 0;
                self.z = value & 0x0FF == 0;
                self.write_gr(gr, (value & 0xFF) as u8);
                states += 4;
            }
            // CMP: SUB with the result discarded
            0x5 => {
                let operand = self.fetch();
                let value =
                    (self.read_gr(gr) as u16).wrapping_sub(self.read_operand(xr, operand) as u16);
                self.c = value & 0x100 != 0;
                self.s = value & 0x080 != 0;
                self.z = value & 0x0FF == 0;
                states += 4;
            }
            // AND / OR / XOR
            0x6 | 0x7 | 0x8 => {
                let operand = self.fetch();
                let rhs = self.read_operand(xr, operand);
                let value = match op {
                    0x6 => self.read_gr(gr) & rhs,
                    0x7 => self.read_gr(gr) | rhs,
                    _ => self.read_gr(gr) ^ rhs,
                };
                self.c = false;
                self.s = value & 0x80 != 0;
                self.z = value == 0;
                self.write_gr(gr, value);
                states += 4;
            }
            // SHLA / SHLL / SHRA / SHRL, selected by XR
            0x9 => {
                let mut value = self.read_gr(gr);
                match xr {
                    0b00 | 0b01 => {
                        self.c = value & 0x80 != 0;
                        value <<= 1;
                    }
                    0b10 => {
                        self.c = value & 0x01 != 0;
                        value = (value & 0x80) | (value >> 1);
                    }
                    _ => {
                        self.c = value & 0x01 != 0;
                        value = (value >> 1) & 0x7F;
                    }
                }
                self.s = value & 0x80 != 0;
                self.z = value == 0;
                self.write_gr(gr, value);
                states += 3;
            }
            // JMP / JZ / JC / JM, selected by GR
            0xA => {
                if xr == 0b11 {
                    self.fault();
                } else {
                    let jump = match gr {
                        0b00 => true,
                        0b01 => self.z,
                        0b10 => self.c,
                        _ => self.s,
                    };
                    let operand = self.fetch();
                    let addr = self.effective_addr(xr, operand);
                    if jump {
                        self.pc = addr;
                    }
                    states += 3;
                }
            }
            // CALL / JNZ / JNC / JNM, selected by GR
            0xB => {
                if xr == 0b11 {
                    self.fault();
                } else {
                    let operand = self.fetch();
                    let addr = self.effective_addr(xr, operand);
                    let jump = match gr {
                        0b00 => {
                            self.sp = self.sp.wrapping_sub(1);
                            self.mem.write(self.sp, self.pc);
                            states += 1;
                            true
                        }
                        0b01 => !self.z,
                        0b10 => !self.c,
                        _ => !self.s,
                    };
                    if jump {
                        self.pc = addr;
                    }
                    states += 3;
                }
            }
            // IN (XR=00) / OUT (XR=11)
            0xC => match xr {
                0b00 => {
                    let port = self.fetch();
                    if port < 0x10 {
                        let value = self.dev.read_port(port);
                        self.write_gr(gr, value);
                        states += 4;
                    } else {
                        self.fault();
                    }
                }
                0b11 => {
                    let port = self.fetch();
                    if port < 0x10 {
                        let value = self.read_gr(gr);
                        self.dev.write_port(port, value);
                        states += 3;
                    } else {
                        self.fault();
                    }
                }
                _ => self.fault(),
            },
            // PUSH (XR=00) / POP (XR=10)
            0xD => match xr {
                0b00 => {
                    let value = self.read_gr(gr);
                    self.sp = self.sp.wrapping_sub(1);
                    self.mem.write(self.sp, value);
                    states += 3;
                }
                0b10 => {
                    let value = self.mem.read(self.sp);
                    self.sp = self.sp.wrapping_add(1);
                    self.write_gr(gr, value);
                    states += 4;
                }
                _ => self.fault(),
            },
            // EI / DI / RET / RETI
            0xE => match (gr, xr) {
                (0b00, 0b00) => {
                    self.ie = true;
                    states += 3;
                }
                (0b00, 0b11) => {
                    self.ie = false;
                    states += 3;
                }
                (0b11, 0b00) => {
                    self.pc = self.mem.read(self.sp);
                    self.sp = self.sp.wrapping_add(1);
                    states += 3;
                }
                (0b11, 0b11) => {
                    let flags = self.mem.read(self.sp);
                    self.sp = self.sp.wrapping_add(1);
                    self.ie = flags & 0x80 != 0;
                    self.c = flags & 0x04 != 0;
                    self.s = flags & 0x02 != 0;
                    self.z = flags & 0x01 != 0;
                    self.pc = self.mem.read(self.sp);
                    self.sp = self.sp.wrapping_add(1);
                    states += 4;
                }
                _ => self.fault(),
            },
            // HALT
            _ => {
                if gr == 0b11 && xr == 0b11 {
                    self.run = false;
                } else {
                    self.fault();
                }
            }
        }

        self.dev.note_states(states);
        states
    }
}

impl Default for Machine {
    fn default() -> Machine {
        Machine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(program: &[u8]) -> Machine {
        let mut machine = Machine::new();
        machine.load(&Binary {
            start: 0,
            data: program.to_vec(),
        });
        machine
    }

    /// Runs exactly one instruction.
    fn step_one(machine: &mut Machine) {
        machine.clock(1);
    }

    #[test]
    fn rom_holds_the_ipl() {
        let machine = Machine::new();

        assert_eq!(machine.memory(0xE0), 0x1F);
        assert_eq!(machine.memory(0xFF), 0xFF);
    }

    #[test]
    fn load_respects_the_rom_gate() {
        let mut machine = Machine::new();
        machine.load(&Binary {
            start: 0xDE,
            data: vec![1, 2, 3, 4],
        });

        assert_eq!(machine.memory(0xDE), 1);
        assert_eq!(machine.memory(0xDF), 2);
        assert_eq!(machine.memory(0xE0), 0x1F);
        assert_eq!(machine.memory(0xE1), 0xDC);
    }

    #[test]
    fn store_to_rom_is_dropped() {
        // ST G0,0E0H / HALT
        let mut machine = machine_with(&[0x20, 0xE0, 0xFF]);
        machine.set_register(Reg::G0, 0xAA);

        machine.clock(100);

        assert!(!machine.is_running());
        assert!(!machine.is_error());
        assert_eq!(machine.memory(0xE0), 0x1F);
    }

    #[test]
    fn add_sets_carry_sign_and_zero() {
        // ADD G0,#100
        let mut machine = machine_with(&[0x33, 100]);
        machine.set_register(Reg::G0, 200);

        step_one(&mut machine);

        assert_eq!(machine.register(Reg::G0), 44);
        assert!(machine.flag(Flag::C));
        assert!(!machine.flag(Flag::S));
        assert!(!machine.flag(Flag::Z));
    }

    #[test]
    fn add_to_exactly_zero_sets_carry_and_zero() {
        // ADD G0,#1
        let mut machine = machine_with(&[0x33, 1]);
        machine.set_register(Reg::G0, 255);

        step_one(&mut machine);

        assert_eq!(machine.register(Reg::G0), 0);
        assert!(machine.flag(Flag::C));
        assert!(machine.flag(Flag::Z));
    }

    #[test]
    fn sub_borrow_sets_carry_and_sign() {
        // CMP G0,#7
        let mut machine = machine_with(&[0x53, 7]);
        machine.set_register(Reg::G0, 5);

        step_one(&mut machine);

        // CMP never writes the register back.
        assert_eq!(machine.register(Reg::G0), 5);
        assert!(machine.flag(Flag::C));
        assert!(machine.flag(Flag::S));
        assert!(!machine.flag(Flag::Z));
    }

    #[test]
    fn logic_ops_clear_carry() {
        // AND G0,#0x0F
        let mut machine = machine_with(&[0x63, 0x0F]);
        machine.set_register(Reg::G0, 0xF0);
        machine.set_flag(Flag::C, true);

        step_one(&mut machine);

        assert_eq!(machine.register(Reg::G0), 0);
        assert!(!machine.flag(Flag::C));
        assert!(machine.flag(Flag::Z));
    }

    #[test]
    fn shifts() {
        // SHLA G0
        let mut machine = machine_with(&[0x90]);
        machine.set_register(Reg::G0, 0x81);
        step_one(&mut machine);
        assert_eq!(machine.register(Reg::G0), 0x02);
        assert!(machine.flag(Flag::C));

        // SHRA G0: the sign bit is kept
        let mut machine = machine_with(&[0x92]);
        machine.set_register(Reg::G0, 0x81);
        step_one(&mut machine);
        assert_eq!(machine.register(Reg::G0), 0xC0);
        assert!(machine.flag(Flag::C));
        assert!(machine.flag(Flag::S));

        // SHRL G0: the sign bit is cleared
        let mut machine = machine_with(&[0x93]);
        machine.set_register(Reg::G0, 0x81);
        step_one(&mut machine);
        assert_eq!(machine.register(Reg::G0), 0x40);
        assert!(machine.flag(Flag::C));
        assert!(!machine.flag(Flag::S));
    }

    #[test]
    fn indexed_addressing() {
        // LD G0,10H,G1  with G1=2 reads M[0x12]
        let mut machine = machine_with(&[0x11, 0x10]);
        machine.set_register(Reg::G1, 2);
        machine.set_memory(0x12, 0x99);

        step_one(&mut machine);

        assert_eq!(machine.register(Reg::G0), 0x99);
    }

    #[test]
    fn push_and_pop() {
        // PUSH G0 / POP G1  (0xD0, 0xD6)
        let mut machine = machine_with(&[0xD0, 0xD6]);
        machine.set_register(Reg::Sp, 0x80);
        machine.set_register(Reg::G0, 5);

        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Sp), 0x7F);
        assert_eq!(machine.memory(0x7F), 5);

        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Sp), 0x80);
        assert_eq!(machine.register(Reg::G1), 5);
    }

    #[test]
    fn call_and_ret() {
        // 0x00: CALL 10H ... 0x10: RET
        let mut machine = machine_with(&[0xB0, 0x10]);
        machine.set_memory(0x10, 0xEC);
        machine.set_register(Reg::Sp, 0x80);

        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Pc), 0x10);
        assert_eq!(machine.register(Reg::Sp), 0x7F);
        assert_eq!(machine.memory(0x7F), 0x02);

        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Pc), 0x02);
        assert_eq!(machine.register(Reg::Sp), 0x80);
    }

    #[test]
    fn conditional_jumps() {
        // JZ 10H taken when Z is set
        let mut machine = machine_with(&[0xA4, 0x10]);
        machine.set_flag(Flag::Z, true);
        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Pc), 0x10);

        // JNZ 10H falls through when Z is set
        let mut machine = machine_with(&[0xB4, 0x10]);
        machine.set_flag(Flag::Z, true);
        step_one(&mut machine);
        assert_eq!(machine.register(Reg::Pc), 0x02);
    }

    #[test]
    fn jump_with_immediate_mode_faults() {
        let mut machine = machine_with(&[0xA3]);

        step_one(&mut machine);

        assert!(machine.is_error());
        assert!(!machine.is_running());
        // The fault hits before the operand byte is fetched.
        assert_eq!(machine.register(Reg::Pc), 1);
    }

    #[test]
    fn no_with_operand_fields_faults() {
        let mut machine = machine_with(&[0x04]);

        step_one(&mut machine);

        assert!(machine.is_error());
    }

    #[test]
    fn halt_pattern_must_be_exact() {
        let mut machine = machine_with(&[0xF0]);

        step_one(&mut machine);

        assert!(machine.is_error());
    }

    #[test]
    fn io_port_out_of_range_faults() {
        // IN G0,10H
        let mut machine = machine_with(&[0xC0, 0x10]);

        step_one(&mut machine);

        assert!(machine.is_error());
    }

    #[test]
    fn data_switch_reads_on_ports_0_and_1() {
        // IN G0,0 / IN G1,1
        let mut machine = machine_with(&[0xC0, 0x00, 0xC4, 0x01]);
        machine.set_data_switch(0x5A);

        step_one(&mut machine);
        step_one(&mut machine);

        assert_eq!(machine.register(Reg::G0), 0x5A);
        assert_eq!(machine.register(Reg::G1), 0x5A);
    }

    #[test]
    fn interrupt_dispatch_and_reti_restore() {
        // 0x00: EI / ADD G0,#0  (the ADD rewrites the flags)
        // 0x40: ADD G0,#1 / RETI
        let mut machine = machine_with(&[0xE0, 0x33, 0x00]);
        machine.set_memory(0x40, 0x33);
        machine.set_memory(0x41, 0x01);
        machine.set_memory(0x42, 0xEF);
        machine.set_memory(0xDF, 0x40); // console vector
        machine.set_register(Reg::Sp, 0x80);
        machine.set_flag(Flag::C, true);
        machine.set_flag(Flag::Z, true);

        step_one(&mut machine); // EI
        machine.raise_console_interrupt();
        machine.dev.console_int_enable = true;

        // Dispatch happens at the next boundary; the handler's ADD and
        // RETI run, restoring C and Z.
        step_one(&mut machine); // dispatch + ADD G0,#1
        assert_eq!(machine.register(Reg::G0), 1);
        assert!(!machine.flag(Flag::C));

        step_one(&mut machine); // RETI
        assert!(machine.flag(Flag::C));
        assert!(machine.flag(Flag::Z));
        assert_eq!(machine.register(Reg::Pc), 0x01);
        assert_eq!(machine.register(Reg::Sp), 0x80);
    }

    #[test]
    fn interrupt_priority_timer_first() {
        let mut machine = machine_with(&[0xE0, 0x00, 0x00, 0x00]);
        machine.set_memory(0xDC, 0x40);
        machine.set_memory(0xDF, 0x50);
        machine.set_memory(0x40, 0xFF); // timer handler halts
        machine.set_register(Reg::Sp, 0x80);

        machine.dev.timer_int_enable = true;
        machine.dev.timer_pending = true;
        machine.dev.console_int_enable = true;
        machine.dev.console_pending = true;

        step_one(&mut machine); // EI
        machine.clock(1); // dispatch + HALT in the handler

        assert!(!machine.is_running());
        // The timer won the arbitration; the console request is still
        // pending for later.
        assert!(machine.dev.console_pending);
        assert!(!machine.dev.timer_pending);
    }

    #[test]
    fn clock_runs_at_least_one_instruction() {
        let mut machine = machine_with(&[0x00, 0x00, 0xFF]);

        let states = machine.clock(1);

        assert_eq!(states, 2);
        assert_eq!(machine.register(Reg::Pc), 1);
    }

    #[test]
    fn reset_clears_cpu_but_not_memory() {
        let mut machine = machine_with(&[0xFF]);
        machine.set_register(Reg::G0, 9);
        machine.set_register(Reg::Pc, 9);
        machine.set_memory(0x20, 7);
        machine.dev.rx_full = true;
        machine.dev.tx_empty = false;

        machine.reset();

        assert_eq!(machine.register(Reg::G0), 0);
        assert_eq!(machine.register(Reg::Pc), 0);
        assert_eq!(machine.memory(0x20), 7);
        assert!(!machine.serial_in_full());
        assert!(machine.try_read_serial_out().is_none());
    }

    #[test]
    fn serial_handshake() {
        let mut machine = Machine::new();

        assert!(machine.try_write_serial_in(0x41));
        assert!(!machine.try_write_serial_in(0x42));
        assert!(machine.serial_in_full());

        // OUT G0,2 moves a byte into the transmitter.
        machine.load(&Binary {
            start: 0,
            data: vec![0xC3, 0x02],
        });
        machine.set_register(Reg::G0, 0x58);
        machine.clock(1);

        assert_eq!(machine.try_read_serial_out(), Some(0x58));
        assert_eq!(machine.try_read_serial_out(), None);
    }
}
