//! Machine-level scenarios driven through assembled programs.

use tec7::assembler;
use tec7::binary::Binary;
use tec7::emulator::{Flag, Machine, Reg, SERIAL_UNIT_STATES};
use tec7::parsing::Source;

fn load(source: &str) -> Machine {
    let assembly = assembler::assemble(&Source::from_str(source)).expect("assembly failed");

    let mut machine = Machine::new();
    machine.load(&assembly.binary);
    machine
}

fn run_to_halt(machine: &mut Machine, max_states: u64) {
    let mut states = 0;
    machine.run();
    while machine.is_running() && states < max_states {
        states += machine.clock(SERIAL_UNIT_STATES);
        assert!(!machine.is_error(), "the program faulted");
    }
    assert!(!machine.is_running(), "the program did not halt in time");
}

#[test]
fn rom_write_is_suppressed_at_runtime() {
    let mut machine = load("       ST G0,0E0H\n       HALT\n");
    machine.set_register(Reg::G0, 0xAA);

    run_to_halt(&mut machine, 1000);

    // The IPL byte is untouched.
    assert_eq!(machine.memory(0xE0), 0x1F);
}

#[test]
fn cmp_drives_a_loop_counter() {
    // Sum 1..=5 into G1 through a scratch cell.
    let source = "\
LOOP:  ST  G0,CNT
       ADD G1,CNT
       ADD G0,#1
       CMP G0,#6
       JNZ LOOP
       HALT
CNT:   DS 1
";
    let mut machine = load(source);
    machine.set_register(Reg::G0, 1);

    run_to_halt(&mut machine, 10_000);

    assert_eq!(machine.register(Reg::G1), 15);
}

#[test]
fn subroutine_call_and_return() {
    let source = "       LD  SP,#80H
       CALL SUB_
       HALT
SUB_:  LD  G0,#7
       RET
";
    let mut machine = load(source);

    run_to_halt(&mut machine, 1000);

    assert_eq!(machine.register(Reg::G0), 7);
    assert_eq!(machine.register(Reg::Sp), 0x80);
}

#[test]
fn timer_interrupt_redirects_through_the_vector() {
    // Enable the timer with period 0 and its interrupt, then spin. The
    // handler halts so reaching it is observable.
    let source = "       LD  G0,#0
       OUT G0,4
       LD  G0,#81H
       OUT G0,5
       EI
LOOP:  JMP LOOP
";
    let mut machine = load(source);
    machine.set_register(Reg::Sp, 0x80);
    machine.set_memory(0xDC, 0x40);
    machine.set_memory(0x40, 0xFF); // HALT

    machine.run();
    let mut states = 0;
    while machine.is_running() && states < 100_000 {
        states += machine.clock(SERIAL_UNIT_STATES);
        assert!(!machine.is_error());
    }

    assert!(!machine.is_running(), "the timer interrupt never fired");
    // One tick plus the dispatch happen shortly after 32768 states.
    assert!(states >= 32_768);
    assert!(states < 40_000);
}

#[test]
fn interrupt_priority_timer_beats_console() {
    // Both requests are pending when EI finally opens the gate; the
    // timer handler must run first, the console handler second.
    let source = "       LD  G0,#1
       OUT G0,6
       LD  G0,#0
       OUT G0,4
       LD  G0,#81H
       OUT G0,5
POLL:  IN  G0,5
       AND G0,#80H
       JZ  POLL
       EI
LOOP:  JMP LOOP
";
    let mut machine = load(source);
    machine.set_register(Reg::Sp, 0x80);
    machine.set_memory(0xDC, 0x40);
    machine.set_memory(0xDF, 0x50);
    // Timer handler: LD G1,#1 / RETI
    machine.set_memory(0x40, 0x17);
    machine.set_memory(0x41, 0x01);
    machine.set_memory(0x42, 0xEF);
    // Console handler: LD G2,#2 / HALT
    machine.set_memory(0x50, 0x1B);
    machine.set_memory(0x51, 0x02);
    machine.set_memory(0x52, 0xFF);

    machine.run();
    machine.clock(100);
    machine.raise_console_interrupt();

    let mut states = 0;
    while machine.is_running() && states < 100_000 {
        states += machine.clock(SERIAL_UNIT_STATES);
        assert!(!machine.is_error());
    }

    assert!(!machine.is_running());
    assert_eq!(machine.register(Reg::G1), 1);
    assert_eq!(machine.register(Reg::G2), 2);
}

#[test]
fn sio_status_polling_reads_a_byte() {
    let source = "\
POLL:  IN  G0,3
       AND G0,#40H
       JZ  POLL
       IN  G0,2
       HALT
";
    let mut machine = load(source);

    machine.run();
    machine.clock(100);
    assert!(machine.is_running());

    assert!(machine.try_write_serial_in(0x58));
    run_to_halt(&mut machine, 10_000);

    assert_eq!(machine.register(Reg::G0), 0x58);
    assert!(!machine.serial_in_full());
}

#[test]
fn raw_binary_programs_execute_with_exact_flags() {
    // ADD G0,#200 with G0=100: carry one out, result 44.
    let binary = Binary {
        start: 0,
        data: vec![0x33, 200, 0xFF],
    };
    let mut machine = Machine::new();
    machine.load(&binary);
    machine.set_register(Reg::G0, 100);

    run_to_halt(&mut machine, 100);

    assert_eq!(machine.register(Reg::G0), 44);
    assert!(machine.flag(Flag::C));
    assert!(!machine.flag(Flag::Z));
    assert!(!machine.flag(Flag::S));
}
