#[macro_use]
extern crate clap;

use clap::Arg;
use sicxe_repl::opcodes::load_opcode_table;
use sicxe_repl::Shell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("OPCODES")
                .help("Path to the opcode dictionary config file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("script")
                .short("s")
                .long("script")
                .takes_value(true)
                .value_name("SCRIPT")
                .help("Runs commands from a file instead of standard input"),
        )
        .get_matches();

    let opcode_path = Path::new(matches.value_of("OPCODES").unwrap());
    let opcodes = match load_opcode_table(opcode_path) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut shell = Shell::new(opcodes);

    let result = match matches.value_of("script") {
        Some(script_path) => match File::open(script_path) {
            Ok(file) => run_lines(&mut shell, BufReader::new(file).lines()),
            Err(source) => {
                eprintln!("\"{}\": {}", script_path, source);
                return ExitCode::FAILURE;
            }
        },
        None => run_lines(&mut shell, io::stdin().lock().lines()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(source) => {
            eprintln!("{}", source);
            ExitCode::FAILURE
        }
    }
}

/// Runs commands one per line until EOF, printing each command's output and
/// reporting errors as text without terminating the process (spec.md 6,
/// "errors are reported as text and do not terminate the process").
fn run_lines(shell: &mut Shell, lines: impl Iterator<Item = io::Result<String>>) -> io::Result<()> {
    for line in lines {
        let line = line?;
        match shell.handle_line(&line) {
            Ok(output) => {
                for row in output {
                    println!("{}", row);
                }
            }
            Err(err) => eprintln!("{}", err),
        }
        io::stdout().flush()?;
    }
    Ok(())
}
