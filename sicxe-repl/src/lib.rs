//! The outer shell: opcode-table loading, the command tokenizer/dispatcher,
//! and the append-only command log (spec.md 1, "Out of scope (external
//! collaborators)" — this crate exists so `sicxe`/`sicxe-asm`/`sicxe-obj`/
//! `sicxe-link` are reachable as a runnable tool).

pub mod commands;
pub mod error;
pub mod log;
pub mod opcodes;

pub use commands::Shell;
pub use error::ReplError;
