//! Errors the shell can report, chaining the three core crates' error types
//! into one the command loop can print with `Display` (spec.md 7).

use sicxe::vm::RunError;
use sicxe_asm::AssemblerError;
use sicxe_link::LoadError;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ReplError {
    Io { path: PathBuf, source: std::io::Error },
    /// An opcode-table line was not `<hex-opcode> <MNEMONIC> <formats>`.
    BadOpcodeLine { line: usize, text: String },
    Assemble(AssemblerError),
    Load(LoadError),
    Run(RunError),
    /// A `bp`/`progaddr` argument was not parseable hex, or named an
    /// address outside `[0, 0xFFFFF]`.
    BadAddress(String),
    /// No command word, or a word not among the six recognized commands.
    UnknownCommand(String),
    /// A command was given too few arguments.
    MissingArgument { command: &'static str, expected: &'static str },
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReplError::Io { path, source } => {
                write!(f, "\"{}\": {}", path.display(), source)
            }
            ReplError::BadOpcodeLine { line, text } => {
                write!(f, "opcode table line {}: malformed entry {:?}", line, text)
            }
            ReplError::Assemble(err) => write!(f, "{}", err),
            ReplError::Load(err) => write!(f, "{}", err),
            ReplError::Run(err) => write!(f, "{}", err),
            ReplError::BadAddress(token) => write!(f, "not a valid hex address: {:?}", token),
            ReplError::UnknownCommand(word) => write!(f, "unknown command: {:?}", word),
            ReplError::MissingArgument { command, expected } => {
                write!(f, "{} requires {}", command, expected)
            }
        }
    }
}

impl std::error::Error for ReplError {}

impl From<AssemblerError> for ReplError {
    fn from(err: AssemblerError) -> ReplError {
        ReplError::Assemble(err)
    }
}

impl From<LoadError> for ReplError {
    fn from(err: LoadError) -> ReplError {
        ReplError::Load(err)
    }
}

impl From<RunError> for ReplError {
    fn from(err: RunError) -> ReplError {
        ReplError::Run(err)
    }
}
