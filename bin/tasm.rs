use std::env::args;
use std::fs::File;
use std::io::{self, Write};
use std::process::exit;

use tec7::assembler::{self, Assembly};
use tec7::parsing::Source;

fn print_usage(cmd: &str) {
    eprintln!("usage: {} <program>.t7", cmd);
}

fn main() {
    let args: Vec<_> = args().collect();

    if args.len() != 2 {
        print_usage(args.get(0).map(String::as_str).unwrap_or("tasm"));
        exit(1);
    }

    let path = &args[1];
    let progname = match path.strip_suffix(".t7") {
        Some(progname) => progname,
        None => {
            eprintln!("error: the file extension must be \"t7\"");
            exit(1);
        }
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            eprintln!("error: could not open the file (path: \"{}\")", path);
            exit(1);
        }
    };

    let src = Source::from_str(&text);
    let assembly = match assembler::assemble(&src) {
        Ok(assembly) => assembly,
        Err(diagnostics) => {
            let _ = diagnostics.render(&src, &mut io::stderr());
            exit(1);
        }
    };

    // Warnings alone do not fail the assembly.
    let _ = assembly.diagnostics.render(&src, &mut io::stderr());

    if let Err(err) = write_artifacts(&assembly, progname) {
        eprintln!("error: {}", err);
        exit(1);
    }
}

fn write_artifacts(assembly: &Assembly, progname: &str) -> io::Result<()> {
    let binary_path = format!("{}.bin", progname);
    File::create(&binary_path)?.write_all(&assembly.binary.to_bytes())?;

    let name_table_path = format!("{}.nt", progname);
    let mut name_table = File::create(&name_table_path)?;
    assembly.labels.write_name_table(&mut name_table)?;

    Ok(())
}
