//! Assembly error reporting: one sum type carrying the offending line and
//! token, per the design note in spec.md 9 ("Error carrying").

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateSymbol,
    InvalidOpcode,
    InvalidOperand,
    RequiredOneOperand,
    RequiredTwoOperands,
    MissingEnd,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::DuplicateSymbol => "DUPLICATE_SYMBOL",
            ErrorKind::InvalidOpcode => "INVALID_OPCODE",
            ErrorKind::InvalidOperand => "INVALID_OPERAND",
            ErrorKind::RequiredOneOperand => "REQUIRED_ONE_OPERAND",
            ErrorKind::RequiredTwoOperands => "REQUIRED_TWO_OPERANDS",
            ErrorKind::MissingEnd => "MISSING_END",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerError {
    pub kind: ErrorKind,
    pub line: usize,
    pub token: String,
}

impl AssemblerError {
    pub fn new(kind: ErrorKind, line: usize, token: impl Into<String>) -> AssemblerError {
        AssemblerError { kind, line, token: token.into() }
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}: {}", self.kind, self.line, self.token)
    }
}

impl std::error::Error for AssemblerError {}
