//! The memory-mapped peripherals.
//!
//! Input and output ports are separate 16-entry spaces:
//!
//! ```text
//! IN  0,1  data switches          OUT 0  buzzer (bit 0)
//! IN  2    SIO data (clears full) OUT 1  speaker (bit 0)
//! IN  3    SIO status             OUT 2  SIO data (clears empty)
//! IN  4    timer count            OUT 3  SIO control (b7 TX-INT, b6 RX-INT)
//! IN  5    timer status           OUT 4  timer period
//! IN  7    parallel input         OUT 5  timer control (b7 INT, b0 enable)
//! IN  8-B  ADC channels 0-3       OUT 6  console interrupt enable (bit 0)
//! IN  6,C-F read as zero          OUT 7  parallel output
//!                                 OUT C  PIO control (b7 enables ext out)
//!                                 OUT 8-B,D-F ignored
//! ```
//!
//! SIO status is `b7` = transmit buffer empty, `b6` = receive buffer full.
//! Timer status is `b7` = period elapsed, cleared by the read.

use crate::emulator::STATES_PER_SEC;

/// States per timer-counter tick (75 ticks per second).
const TIMER_TICK_STATES: u16 = (STATES_PER_SEC / 75) as u16;

/// Analog level driven onto an ADC channel by a high parallel-input bit
/// (3.0 V against the 3.3 V reference).
const PARALLEL_HIGH_LEVEL: u8 = (255.0 * 3.0 / 3.3) as u8;

/// Analog threshold above which an input reads as a high digital bit
/// (1.6 V against the 3.3 V reference).
const DIGITAL_THRESHOLD: u8 = (255.0 * 1.6 / 3.3) as u8;

#[derive(Debug, Clone)]
pub(crate) struct Devices {
    pub(crate) data_switch: u8,

    pub(crate) rx_data: u8,
    pub(crate) rx_full: bool,
    pub(crate) tx_data: u8,
    pub(crate) tx_empty: bool,
    pub(crate) tx_int_enable: bool,
    pub(crate) rx_int_enable: bool,

    pub(crate) timer_count: u8,
    pub(crate) timer_period: u8,
    pub(crate) timer_enable: bool,
    pub(crate) timer_int_enable: bool,
    pub(crate) timer_elapsed: bool,
    pub(crate) timer_pending: bool,
    /// Sub-tick state accumulator; advances with every executed
    /// instruction whether or not the timer runs.
    pub(crate) timer_states: u16,

    pub(crate) console_int_enable: bool,
    pub(crate) console_pending: bool,

    pub(crate) parallel_in: u8,
    pub(crate) parallel_out: u8,
    pub(crate) ext_parallel_out: u8,
    pub(crate) ext_parallel_enable: bool,

    pub(crate) adc: [u8; 4],

    pub(crate) buzzer: bool,
    pub(crate) speaker: bool,
}

impl Devices {
    pub(crate) fn new() -> Devices {
        Devices {
            data_switch: 0,
            rx_data: 0,
            rx_full: false,
            tx_data: 0,
            tx_empty: true,
            tx_int_enable: false,
            rx_int_enable: false,
            timer_count: 0,
            timer_period: 74,
            timer_enable: false,
            timer_int_enable: false,
            timer_elapsed: false,
            timer_pending: false,
            timer_states: 0,
            console_int_enable: false,
            console_pending: false,
            parallel_in: 0,
            parallel_out: 0,
            ext_parallel_out: 0,
            ext_parallel_enable: false,
            adc: [0; 4],
            buzzer: false,
            speaker: false,
        }
    }

    /// Advances the timer if a full tick's worth of states accumulated.
    /// When the counter reaches the period it wraps, latches the elapsed
    /// flag and raises the pending interrupt if enabled.
    pub(crate) fn advance_timer(&mut self) {
        if !self.timer_enable {
            return;
        }

        if self.timer_states >= TIMER_TICK_STATES {
            self.timer_states = 0;
            if self.timer_count == self.timer_period {
                self.timer_count = 0;
                self.timer_elapsed = true;
                if self.timer_int_enable {
                    self.timer_pending = true;
                }
            } else {
                self.timer_count += 1;
            }
        }
    }

    pub(crate) fn note_states(&mut self, states: u8) {
        self.timer_states = self.timer_states.wrapping_add(states as u16);
    }

    /// Reads an input port. The port must be below 0x10.
    pub(crate) fn read_port(&mut self, port: u8) -> u8 {
        match port {
            0x0 | 0x1 => self.data_switch,
            0x2 => {
                self.rx_full = false;
                self.rx_data
            }
            0x3 => {
                let mut status = 0;
                if self.tx_empty {
                    status |= 0x80;
                }
                if self.rx_full {
                    status |= 0x40;
                }
                status
            }
            0x4 => self.timer_count,
            0x5 => {
                let status = if self.timer_elapsed { 0x80 } else { 0x00 };
                self.timer_elapsed = false;
                status
            }
            0x7 => self.parallel_in,
            0x8..=0xB => self.adc[(port - 0x8) as usize],
            _ => 0x00,
        }
    }

    /// Writes an output port. The port must be below 0x10.
    pub(crate) fn write_port(&mut self, port: u8, value: u8) {
        match port {
            0x0 => self.buzzer = value & 0x01 != 0,
            0x1 => self.speaker = value & 0x01 != 0,
            0x2 => {
                self.tx_data = value;
                self.tx_empty = false;
            }
            0x3 => {
                self.tx_int_enable = value & 0x80 != 0;
                self.rx_int_enable = value & 0x40 != 0;
            }
            0x4 => self.timer_period = value,
            0x5 => {
                self.timer_int_enable = value & 0x80 != 0;
                self.timer_enable = value & 0x01 != 0;
                if self.timer_enable {
                    // Starting the timer clears the latch and the counter.
                    self.timer_elapsed = false;
                    self.timer_count = 0;
                }
            }
            0x6 => self.console_int_enable = value & 0x01 != 0,
            0x7 => self.parallel_out = value,
            0xC => {
                self.ext_parallel_enable = value & 0x80 != 0;
                if self.ext_parallel_enable {
                    self.ext_parallel_out = value & 0x0F;
                }
            }
            _ => {}
        }
    }

    /// Drives the parallel input pins. Each of the low four bits also
    /// drives the matching ADC channel to its digital voltage level.
    pub(crate) fn write_parallel(&mut self, value: u8) {
        self.parallel_in = value;
        for channel in 0..4 {
            self.adc[channel] = if value & (1 << channel) != 0 {
                PARALLEL_HIGH_LEVEL
            } else {
                0
            };
        }
    }

    /// Drives one ADC channel and recomputes the digital reading of the
    /// matching parallel-input bit.
    pub(crate) fn write_analog(&mut self, channel: u8, value: u8) {
        debug_assert!(channel < 4);
        self.adc[channel as usize] = value;

        let bit = if value > DIGITAL_THRESHOLD { 1 } else { 0 };
        self.parallel_in = (self.parallel_in & !(1 << channel)) | (bit << channel);
    }
}
