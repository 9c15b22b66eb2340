//! Command tokenizer and dispatcher for the six commands of spec.md 6
//! (`assemble`, `symbol`, `progaddr`, `loader`, `bp`, `run`).

use crate::error::ReplError;
use crate::log::CommandLog;
use sicxe::constants::MAX_ADDRESS;
use sicxe::opcode::OpcodeTable;
use sicxe::register::RegisterId;
use sicxe::vm::{StopReason, Vm};
use sicxe_asm::SymbolTable;
use sicxe_link::ExternalSymbolTable;
use std::fs;
use std::path::Path;

enum Command<'a> {
    Assemble(&'a str),
    Symbol,
    ProgAddr(&'a str),
    Loader(Vec<&'a str>),
    Breakpoint(BpArg<'a>),
    Run,
}

enum BpArg<'a> {
    Show,
    Clear,
    At(&'a str),
}

fn parse(tokens: &[&str]) -> Result<Command<'_>, ReplError> {
    match tokens {
        [] => Err(ReplError::UnknownCommand(String::new())),
        ["assemble", rest @ ..] => match rest {
            [file] => Ok(Command::Assemble(file)),
            _ => Err(ReplError::MissingArgument { command: "assemble", expected: "a source file path" }),
        },
        ["symbol"] => Ok(Command::Symbol),
        ["progaddr", rest @ ..] => match rest {
            [addr] => Ok(Command::ProgAddr(addr)),
            _ => Err(ReplError::MissingArgument { command: "progaddr", expected: "one hex address" }),
        },
        ["loader", rest @ ..] if !rest.is_empty() && rest.len() <= 3 => {
            Ok(Command::Loader(rest.to_vec()))
        }
        ["loader", ..] => {
            Err(ReplError::MissingArgument { command: "loader", expected: "1 to 3 object files" })
        }
        ["bp"] => Ok(Command::Breakpoint(BpArg::Show)),
        ["bp", "clear"] => Ok(Command::Breakpoint(BpArg::Clear)),
        ["bp", addr] => Ok(Command::Breakpoint(BpArg::At(addr))),
        ["run"] => Ok(Command::Run),
        [word, ..] => Err(ReplError::UnknownCommand(word.to_string())),
    }
}

fn parse_address(token: &str) -> Result<u32, ReplError> {
    let addr = u32::from_str_radix(token, 16).map_err(|_| ReplError::BadAddress(token.to_string()))?;
    if addr > MAX_ADDRESS {
        return Err(ReplError::BadAddress(token.to_string()));
    }
    Ok(addr)
}

/// Process-wide state a single shell session owns: the VM (memory, registers,
/// breakpoints, the read-only opcode table), the assembler's symbol table,
/// the loader's external-symbol table, the next `progaddr`, and the command
/// log (spec.md 5, "Shared resources").
pub struct Shell {
    pub vm: Vm,
    pub symbols: SymbolTable,
    pub extern_symbols: ExternalSymbolTable,
    pub program_address: u32,
    pub log: CommandLog,
}

impl Shell {
    pub fn new(opcodes: OpcodeTable) -> Shell {
        Shell {
            vm: Vm::new(opcodes),
            symbols: SymbolTable::new(),
            extern_symbols: ExternalSymbolTable::new(),
            program_address: 0,
            log: CommandLog::new(),
        }
    }

    /// Tokenizes and dispatches one line, logging it regardless of outcome.
    /// Returns the lines to print to the user on success.
    pub fn handle_line(&mut self, line: &str) -> Result<Vec<String>, ReplError> {
        self.log.push(line);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match parse(&tokens)? {
            Command::Assemble(file) => self.assemble(file),
            Command::Symbol => Ok(self.symbols.show().into_iter().map(|(name, addr)| format!("{:<6} {:06X}", name, addr)).collect()),
            Command::ProgAddr(addr) => {
                self.program_address = parse_address(addr)?;
                Ok(vec![format!("program address set to {:06X}", self.program_address)])
            }
            Command::Loader(files) => self.loader(&files),
            Command::Breakpoint(arg) => self.breakpoint(arg),
            Command::Run => self.run(),
        }
    }

    fn assemble(&mut self, path: &str) -> Result<Vec<String>, ReplError> {
        let source = fs::read_to_string(path)
            .map_err(|source| ReplError::Io { path: path.into(), source })?;

        match sicxe_asm::assemble(&source, self.vm.opcodes(), &self.symbols) {
            Ok(output) => {
                let obj_path = Path::new(path).with_extension("obj");
                let obj_text = output.object_lines.join("\n");
                fs::write(&obj_path, obj_text)
                    .map_err(|source| ReplError::Io { path: obj_path.clone(), source })?;

                let lst_path = Path::new(path).with_extension("lst");
                let lst_text: String = output
                    .listing
                    .iter()
                    .map(|line| line.render())
                    .collect::<Vec<_>>()
                    .join("\n");
                fs::write(&lst_path, lst_text)
                    .map_err(|source| ReplError::Io { path: lst_path.clone(), source })?;

                self.symbols = output.symbols;
                Ok(vec![format!(
                    "assembled {} -> {} ({} object records, {} listing lines)",
                    path,
                    obj_path.display(),
                    output.object_lines.len(),
                    output.listing.len()
                )])
            }
            Err(err) => {
                self.symbols.record_error(err.clone());
                Err(ReplError::Assemble(err))
            }
        }
    }

    fn loader(&mut self, files: &[&str]) -> Result<Vec<String>, ReplError> {
        let paths: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        let table = sicxe_link::load(&paths, self.program_address, &mut self.vm)?;
        self.extern_symbols = table;
        Ok(self.extern_symbols.show())
    }

    fn breakpoint(&mut self, arg: BpArg) -> Result<Vec<String>, ReplError> {
        match arg {
            BpArg::Show => Ok(self.vm.breakpoints.list().iter().map(|a| format!("{:06X}", a)).collect()),
            BpArg::Clear => {
                self.vm.breakpoints.clear();
                Ok(vec!["breakpoints cleared".to_string()])
            }
            BpArg::At(token) => {
                let addr = parse_address(token)?;
                self.vm.breakpoints.insert(addr);
                Ok(vec![format!("breakpoint set at {:06X}", addr)])
            }
        }
    }

    fn run(&mut self) -> Result<Vec<String>, ReplError> {
        let reason = self.vm.run()?;
        let mut lines = match reason {
            StopReason::ProgramFinished => vec!["Program finished".to_string()],
            StopReason::Breakpoint(addr) => vec![format!("Breakpoint at {:06X}", addr)],
        };
        for reg in RegisterId::ALL.iter().copied() {
            lines.push(format!("{:<2} {:06X}", reg.name(), self.vm.registers.get(reg)));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sicxe::opcode::OpcodeTable;

    #[test]
    fn unknown_command_is_rejected() {
        let mut shell = Shell::new(OpcodeTable::standard());
        assert!(matches!(shell.handle_line("frobnicate"), Err(ReplError::UnknownCommand(_))));
    }

    #[test]
    fn bp_then_clear_round_trips() {
        let mut shell = Shell::new(OpcodeTable::standard());
        shell.handle_line("bp 4000").unwrap();
        assert!(shell.vm.breakpoints.contains(0x4000));
        shell.handle_line("bp clear").unwrap();
        assert!(!shell.vm.breakpoints.contains(0x4000));
    }

    #[test]
    fn progaddr_parses_hex() {
        let mut shell = Shell::new(OpcodeTable::standard());
        shell.handle_line("progaddr 4000").unwrap();
        assert_eq!(shell.program_address, 0x4000);
    }

    #[test]
    fn run_without_a_loaded_program_reports_the_error() {
        let mut shell = Shell::new(OpcodeTable::standard());
        assert!(matches!(shell.handle_line("run"), Err(ReplError::Run(_))));
    }

    #[test]
    fn bp_rejects_an_address_out_of_range() {
        let mut shell = Shell::new(OpcodeTable::standard());
        assert!(matches!(shell.handle_line("bp 100000"), Err(ReplError::BadAddress(_))));
    }

    #[test]
    fn progaddr_rejects_an_address_out_of_range() {
        let mut shell = Shell::new(OpcodeTable::standard());
        assert!(matches!(shell.handle_line("progaddr 100000"), Err(ReplError::BadAddress(_))));
    }

    #[test]
    fn every_handled_line_is_logged() {
        let mut shell = Shell::new(OpcodeTable::standard());
        let _ = shell.handle_line("symbol");
        let _ = shell.handle_line("bp");
        assert_eq!(shell.log.entries(), &["symbol".to_string(), "bp".to_string()]);
    }
}
