use std::env::args;
use std::io::{self, Read};
use std::process::exit;

use slog::{o, Drain, Logger};
use slog_term::{CompactFormat, TermDecorator};

use tec7::binary::Binary;
use tec7::emulator::Machine;
use tec7::harness::{Harness, RunError};
use tec7::script;
use tec7::symbol_table::NameTable;

fn print_usage(cmd: &str) {
    eprintln!("usage: {} <program>.bin [<program>.nt]", cmd);
}

fn main() {
    let args: Vec<_> = args().collect();

    if args.len() < 2 || args.len() > 3 {
        print_usage(args.get(0).map(String::as_str).unwrap_or("tec"));
        exit(1);
    }

    let binary = match std::fs::read(&args[1]) {
        Ok(bytes) => match Binary::parse(&bytes) {
            Ok(binary) => binary,
            Err(err) => {
                eprintln!("binary: {}", err);
                exit(1);
            }
        },
        Err(_) => {
            eprintln!("binary: could not open the file (path: \"{}\")", args[1]);
            exit(1);
        }
    };

    let names = match args.get(2) {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match NameTable::parse(&text) {
                Ok(names) => names,
                Err(errors) => {
                    for err in errors {
                        eprintln!("name table: {}:{}", path, err);
                    }
                    exit(1);
                }
            },
            Err(_) => {
                eprintln!("name table: could not open the file (path: \"{}\")", path);
                exit(1);
            }
        },
        None => NameTable::new(),
    };

    let mut input = String::new();
    if io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("input: could not read standard input");
        exit(1);
    }

    let events = match script::parse_script(&input, &names) {
        Ok(events) => events,
        Err(errors) => {
            for err in errors {
                eprintln!("input: {}", err);
            }
            exit(1);
        }
    };

    let decorator = TermDecorator::new().stderr().build();
    let drain = CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let mut machine = Machine::with_logger(logger.new(o!("component" => "machine")));
    machine.load(&binary);

    let mut harness = Harness::with_logger(machine, io::stdout(), logger.new(o!()));
    match harness.run(&events) {
        Ok(()) => {}
        Err(RunError::NotRunning) => {
            eprintln!("error: the machine is not running.");
            exit(1);
        }
        Err(RunError::InvalidInstruction(snapshot)) => {
            eprintln!("error: {}", snapshot);
            exit(1);
        }
        Err(RunError::Io(err)) => {
            eprintln!("error: {}", err);
            exit(1);
        }
    }
}
