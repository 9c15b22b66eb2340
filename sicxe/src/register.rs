//! The SIC/XE register file.
//!
//! Register ids follow the architecture's own (non-contiguous) numbering:
//! `A, X, L, B, S, T, F, PC, SW` are `0, 1, 2, 3, 4, 5, 6, 8, 9` — there is no
//! register `7`. [`num_derive::FromPrimitive`] respects the explicit
//! discriminants below, so `RegisterId::from_u32` round-trips the numbers a
//! `RSUB`/format-2 instruction actually encodes.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, FromPrimitive, ToPrimitive)]
pub enum RegisterId {
    A = 0,
    X = 1,
    L = 2,
    B = 3,
    S = 4,
    T = 5,
    F = 6,
    PC = 8,
    SW = 9,
}

impl RegisterId {
    pub const ALL: [RegisterId; 9] = [
        RegisterId::A,
        RegisterId::X,
        RegisterId::L,
        RegisterId::B,
        RegisterId::S,
        RegisterId::T,
        RegisterId::F,
        RegisterId::PC,
        RegisterId::SW,
    ];

    pub fn id(self) -> u32 {
        self.to_u32().unwrap()
    }

    pub fn from_id(id: u32) -> Option<RegisterId> {
        FromPrimitive::from_u32(id)
    }

    /// Looks up a register by its assembler-visible name (`A`, `X`, ..., `SW`).
    /// Case-sensitive, matching the rest of the symbol table (spec.md 4.3).
    pub fn from_name(name: &str) -> Option<RegisterId> {
        Some(match name {
            "A" => RegisterId::A,
            "X" => RegisterId::X,
            "L" => RegisterId::L,
            "B" => RegisterId::B,
            "S" => RegisterId::S,
            "T" => RegisterId::T,
            "F" => RegisterId::F,
            "PC" => RegisterId::PC,
            "SW" => RegisterId::SW,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterId::A => "A",
            RegisterId::X => "X",
            RegisterId::L => "L",
            RegisterId::B => "B",
            RegisterId::S => "S",
            RegisterId::T => "T",
            RegisterId::F => "F",
            RegisterId::PC => "PC",
            RegisterId::SW => "SW",
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the three condition-code states `SW` can hold.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConditionCode {
    Less,
    Equal,
    Greater,
}

impl ConditionCode {
    /// The low byte stored into `SW` for each condition, using the
    /// conventional SIC/XE encoding (0 = `<`, 1 = `=`, 2 = `>`).
    pub fn value(self) -> u32 {
        match self {
            ConditionCode::Less => 0,
            ConditionCode::Equal => 1,
            ConditionCode::Greater => 2,
        }
    }

    pub fn from_value(value: u32) -> ConditionCode {
        match value {
            0 => ConditionCode::Less,
            2 => ConditionCode::Greater,
            _ => ConditionCode::Equal,
        }
    }

    pub fn from_ordering(ord: std::cmp::Ordering) -> ConditionCode {
        match ord {
            std::cmp::Ordering::Less => ConditionCode::Less,
            std::cmp::Ordering::Equal => ConditionCode::Equal,
            std::cmp::Ordering::Greater => ConditionCode::Greater,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            ConditionCode::Less => '<',
            ConditionCode::Equal => '=',
            ConditionCode::Greater => '>',
        }
    }
}

/// A, X, L, B, S, T hold 24 bits. `F` is the 48-bit floating accumulator,
/// unused by this implementation (float execution is a non-goal) but still
/// addressable as a pseudo-symbol and register operand. `SW` stores a
/// [`ConditionCode`] in its low byte with the high bytes explicitly zeroed,
/// matching spec.md's design note rather than relying on register width.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    values: [u32; 9],
    f: u64,
}

fn slot(id: RegisterId) -> usize {
    match id {
        RegisterId::A => 0,
        RegisterId::X => 1,
        RegisterId::L => 2,
        RegisterId::B => 3,
        RegisterId::S => 4,
        RegisterId::T => 5,
        RegisterId::F => 6,
        RegisterId::PC => 7,
        RegisterId::SW => 8,
    }
}

impl RegisterFile {
    pub fn new() -> RegisterFile {
        RegisterFile {
            values: [0; 9],
            f: 0,
        }
    }

    pub fn get(&self, id: RegisterId) -> u32 {
        if id == RegisterId::F {
            return self.f as u32;
        }
        self.values[slot(id)]
    }

    pub fn set(&mut self, id: RegisterId, value: u32) {
        if id == RegisterId::SW {
            self.values[slot(id)] = value & 0xFF;
            return;
        }
        if id == RegisterId::F {
            self.f = value as u64;
            return;
        }
        self.values[slot(id)] = value & 0x00FF_FFFF;
    }

    pub fn get_f(&self) -> u64 {
        self.f
    }

    pub fn set_f(&mut self, value: u64) {
        self.f = value;
    }

    pub fn condition_code(&self) -> ConditionCode {
        ConditionCode::from_value(self.get(RegisterId::SW))
    }

    pub fn set_condition_code(&mut self, code: ConditionCode) {
        self.set(RegisterId::SW, code.value());
    }

    pub fn reset(&mut self) {
        *self = RegisterFile::new();
    }
}

impl Default for RegisterFile {
    fn default() -> RegisterFile {
        RegisterFile::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_architecture_numbering() {
        assert_eq!(RegisterId::A.id(), 0);
        assert_eq!(RegisterId::SW.id(), 9);
        assert_eq!(RegisterId::from_id(7), None);
        assert_eq!(RegisterId::from_id(9), Some(RegisterId::SW));
    }

    #[test]
    fn sw_keeps_only_low_byte() {
        let mut regs = RegisterFile::new();
        regs.set(RegisterId::SW, 0xFFFF_FF02);
        assert_eq!(regs.get(RegisterId::SW), 2);
    }

    #[test]
    fn condition_code_round_trips() {
        let mut regs = RegisterFile::new();
        regs.set_condition_code(ConditionCode::Less);
        assert_eq!(regs.condition_code(), ConditionCode::Less);
        regs.set_condition_code(ConditionCode::Greater);
        assert_eq!(regs.condition_code(), ConditionCode::Greater);
    }

    #[test]
    fn general_registers_mask_to_24_bits() {
        let mut regs = RegisterFile::new();
        regs.set(RegisterId::A, 0xFFFF_FFFF);
        assert_eq!(regs.get(RegisterId::A), 0x00FF_FFFF);
    }
}
