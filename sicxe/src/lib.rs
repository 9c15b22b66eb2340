//! Address space, register file, opcode dictionary and execution engine for
//! the SIC/XE architecture.
//!
//! This crate is the machine model shared by the rest of the toolchain: the
//! assembler targets its [`opcode::OpcodeTable`] when assembling, the
//! linking loader writes into its [`memory::Memory`] when loading object
//! programs, and [`vm::Vm`] executes the result.

pub mod constants;
pub mod memory;
pub mod opcode;
pub mod register;
pub mod vm;

pub use memory::{Memory, MemoryError};
pub use opcode::{Format, Mnemonic, OpcodeTable};
pub use register::{ConditionCode, RegisterFile, RegisterId};
pub use vm::{RunError, StopReason, Vm};
