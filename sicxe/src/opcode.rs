//! The opcode dictionary shared read-only by the assembler and the VM
//! (spec.md 4.1, design note "Shared opcode/format interpretation").
//!
//! [`Mnemonic`] is the fixed set of instructions this machine knows how to
//! execute. [`OpcodeTable`] is the *configurable* mapping from mnemonic to
//! opcode byte and permitted formats, built once from a configuration
//! source (spec.md 6) and shared read-only afterwards. The VM never matches
//! on opcode bytes directly; it asks the table's reverse index for the
//! [`Mnemonic`] a byte decodes to, keeping one definition of "what an
//! opcode means" for both consumers.

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    One,
    Two,
    ThreeOrFour,
}

impl Format {
    pub fn from_digit(d: u8) -> Option<Format> {
        match d {
            1 => Some(Format::One),
            2 => Some(Format::Two),
            3 | 4 => Some(Format::ThreeOrFour),
            _ => None,
        }
    }
}

/// The complete set of mnemonics this toolchain recognizes. Opcode *bytes*
/// are configuration, but which formats a mnemonic supports and what it
/// does when executed are fixed properties of the instruction itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Mnemonic {
    // Format 1
    FIX,
    FLOAT,
    HIO,
    NORM,
    SIO,
    TIO,
    // Format 2
    ADDR,
    CLEAR,
    COMPR,
    DIVR,
    MULR,
    RMO,
    SHIFTL,
    SHIFTR,
    SUBR,
    SVC,
    TIXR,
    // Format 3/4
    ADD,
    ADDF,
    AND,
    COMP,
    COMPF,
    DIV,
    DIVF,
    J,
    JEQ,
    JGT,
    JLT,
    JSUB,
    LDA,
    LDB,
    LDCH,
    LDF,
    LDL,
    LDS,
    LDT,
    LDX,
    LPS,
    MUL,
    MULF,
    OR,
    RD,
    RSUB,
    SSK,
    STA,
    STB,
    STCH,
    STF,
    STI,
    STL,
    STS,
    STSW,
    STT,
    STX,
    SUB,
    SUBF,
    TD,
    TIX,
    WD,
}

impl Mnemonic {
    pub const ALL: &'static [Mnemonic] = &[
        Mnemonic::FIX,
        Mnemonic::FLOAT,
        Mnemonic::HIO,
        Mnemonic::NORM,
        Mnemonic::SIO,
        Mnemonic::TIO,
        Mnemonic::ADDR,
        Mnemonic::CLEAR,
        Mnemonic::COMPR,
        Mnemonic::DIVR,
        Mnemonic::MULR,
        Mnemonic::RMO,
        Mnemonic::SHIFTL,
        Mnemonic::SHIFTR,
        Mnemonic::SUBR,
        Mnemonic::SVC,
        Mnemonic::TIXR,
        Mnemonic::ADD,
        Mnemonic::ADDF,
        Mnemonic::AND,
        Mnemonic::COMP,
        Mnemonic::COMPF,
        Mnemonic::DIV,
        Mnemonic::DIVF,
        Mnemonic::J,
        Mnemonic::JEQ,
        Mnemonic::JGT,
        Mnemonic::JLT,
        Mnemonic::JSUB,
        Mnemonic::LDA,
        Mnemonic::LDB,
        Mnemonic::LDCH,
        Mnemonic::LDF,
        Mnemonic::LDL,
        Mnemonic::LDS,
        Mnemonic::LDT,
        Mnemonic::LDX,
        Mnemonic::LPS,
        Mnemonic::MUL,
        Mnemonic::MULF,
        Mnemonic::OR,
        Mnemonic::RD,
        Mnemonic::RSUB,
        Mnemonic::SSK,
        Mnemonic::STA,
        Mnemonic::STB,
        Mnemonic::STCH,
        Mnemonic::STF,
        Mnemonic::STI,
        Mnemonic::STL,
        Mnemonic::STS,
        Mnemonic::STSW,
        Mnemonic::STT,
        Mnemonic::STX,
        Mnemonic::SUB,
        Mnemonic::SUBF,
        Mnemonic::TD,
        Mnemonic::TIX,
        Mnemonic::WD,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mnemonic::FIX => "FIX",
            Mnemonic::FLOAT => "FLOAT",
            Mnemonic::HIO => "HIO",
            Mnemonic::NORM => "NORM",
            Mnemonic::SIO => "SIO",
            Mnemonic::TIO => "TIO",
            Mnemonic::ADDR => "ADDR",
            Mnemonic::CLEAR => "CLEAR",
            Mnemonic::COMPR => "COMPR",
            Mnemonic::DIVR => "DIVR",
            Mnemonic::MULR => "MULR",
            Mnemonic::RMO => "RMO",
            Mnemonic::SHIFTL => "SHIFTL",
            Mnemonic::SHIFTR => "SHIFTR",
            Mnemonic::SUBR => "SUBR",
            Mnemonic::SVC => "SVC",
            Mnemonic::TIXR => "TIXR",
            Mnemonic::ADD => "ADD",
            Mnemonic::ADDF => "ADDF",
            Mnemonic::AND => "AND",
            Mnemonic::COMP => "COMP",
            Mnemonic::COMPF => "COMPF",
            Mnemonic::DIV => "DIV",
            Mnemonic::DIVF => "DIVF",
            Mnemonic::J => "J",
            Mnemonic::JEQ => "JEQ",
            Mnemonic::JGT => "JGT",
            Mnemonic::JLT => "JLT",
            Mnemonic::JSUB => "JSUB",
            Mnemonic::LDA => "LDA",
            Mnemonic::LDB => "LDB",
            Mnemonic::LDCH => "LDCH",
            Mnemonic::LDF => "LDF",
            Mnemonic::LDL => "LDL",
            Mnemonic::LDS => "LDS",
            Mnemonic::LDT => "LDT",
            Mnemonic::LDX => "LDX",
            Mnemonic::LPS => "LPS",
            Mnemonic::MUL => "MUL",
            Mnemonic::MULF => "MULF",
            Mnemonic::OR => "OR",
            Mnemonic::RD => "RD",
            Mnemonic::RSUB => "RSUB",
            Mnemonic::SSK => "SSK",
            Mnemonic::STA => "STA",
            Mnemonic::STB => "STB",
            Mnemonic::STCH => "STCH",
            Mnemonic::STF => "STF",
            Mnemonic::STI => "STI",
            Mnemonic::STL => "STL",
            Mnemonic::STS => "STS",
            Mnemonic::STSW => "STSW",
            Mnemonic::STT => "STT",
            Mnemonic::STX => "STX",
            Mnemonic::SUB => "SUB",
            Mnemonic::SUBF => "SUBF",
            Mnemonic::TD => "TD",
            Mnemonic::TIX => "TIX",
            Mnemonic::WD => "WD",
        }
    }

    pub fn from_str(s: &str) -> Option<Mnemonic> {
        Mnemonic::ALL.iter().copied().find(|m| m.as_str() == s)
    }

    /// The formats this mnemonic is natively permitted in. The actual
    /// opcode byte and any further format restriction come from the
    /// [`OpcodeTable`] entry, which is configuration, not architecture.
    pub fn native_format(self) -> Format {
        use Mnemonic::*;
        match self {
            FIX | FLOAT | HIO | NORM | SIO | TIO => Format::One,
            ADDR | CLEAR | COMPR | DIVR | MULR | RMO | SHIFTL | SHIFTR | SUBR | SVC | TIXR => {
                Format::Two
            }
            _ => Format::ThreeOrFour,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OpcodeEntry {
    pub mnemonic: Mnemonic,
    pub opcode: u8,
    pub format: Format,
}

/// Looked up by mnemonic for assembling, and inverted by opcode byte for
/// decoding at run time. Built once (spec.md 6, "Loaded once at startup")
/// and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct OpcodeTable {
    by_mnemonic: HashMap<&'static str, OpcodeEntry>,
    by_opcode: HashMap<u8, OpcodeEntry>,
}

impl OpcodeTable {
    pub fn new() -> OpcodeTable {
        OpcodeTable::default()
    }

    /// Registers one dictionary entry. The low 2 bits of `opcode` are
    /// cleared, matching the invariant that opcode bytes are always
    /// recorded with their low 2 bits zero (spec.md 3).
    pub fn insert(&mut self, mnemonic: Mnemonic, opcode: u8, format: Format) {
        let entry = OpcodeEntry {
            mnemonic,
            opcode: opcode & 0xFC,
            format,
        };
        self.by_mnemonic.insert(mnemonic.as_str(), entry);
        self.by_opcode.insert(entry.opcode, entry);
    }

    pub fn format_of(&self, mnemonic: &str) -> Option<Format> {
        self.by_mnemonic.get(mnemonic).map(|e| e.format)
    }

    pub fn opcode_of(&self, mnemonic: &str) -> Option<u8> {
        self.by_mnemonic.get(mnemonic).map(|e| e.opcode)
    }

    pub fn entry_by_mnemonic(&self, mnemonic: &str) -> Option<OpcodeEntry> {
        self.by_mnemonic.get(mnemonic).copied()
    }

    /// Used by the VM to decode a fetched opcode byte (already masked to
    /// its low-2-bits-zero form) back into the mnemonic it names.
    pub fn entry_by_opcode(&self, opcode: u8) -> Option<OpcodeEntry> {
        self.by_opcode.get(&(opcode & 0xFC)).copied()
    }

    /// The standard textbook SIC/XE opcode assignment, useful for tests and
    /// as the default dictionary before a configuration file is loaded.
    pub fn standard() -> OpcodeTable {
        use Format::*;
        use Mnemonic::*;
        let mut table = OpcodeTable::new();
        let entries: &[(Mnemonic, u8, Format)] = &[
            (ADD, 0x18, ThreeOrFour),
            (ADDF, 0x58, ThreeOrFour),
            (ADDR, 0x90, Two),
            (AND, 0x40, ThreeOrFour),
            (CLEAR, 0xB4, Two),
            (COMP, 0x28, ThreeOrFour),
            (COMPF, 0x88, ThreeOrFour),
            (COMPR, 0xA0, Two),
            (DIV, 0x24, ThreeOrFour),
            (DIVF, 0x64, ThreeOrFour),
            (DIVR, 0x9C, Two),
            (FIX, 0xC4, One),
            (FLOAT, 0xC0, One),
            (HIO, 0xF4, One),
            (J, 0x3C, ThreeOrFour),
            (JEQ, 0x30, ThreeOrFour),
            (JGT, 0x34, ThreeOrFour),
            (JLT, 0x38, ThreeOrFour),
            (JSUB, 0x48, ThreeOrFour),
            (LDA, 0x00, ThreeOrFour),
            (LDB, 0x68, ThreeOrFour),
            (LDCH, 0x50, ThreeOrFour),
            (LDF, 0x70, ThreeOrFour),
            (LDL, 0x08, ThreeOrFour),
            (LDS, 0x6C, ThreeOrFour),
            (LDT, 0x74, ThreeOrFour),
            (LDX, 0x04, ThreeOrFour),
            (LPS, 0xD0, ThreeOrFour),
            (MUL, 0x20, ThreeOrFour),
            (MULF, 0x60, ThreeOrFour),
            (MULR, 0x98, Two),
            (NORM, 0xC8, One),
            (OR, 0x44, ThreeOrFour),
            (RD, 0xD8, ThreeOrFour),
            (RMO, 0xAC, Two),
            (RSUB, 0x4C, ThreeOrFour),
            (SHIFTL, 0xA4, Two),
            (SHIFTR, 0xA8, Two),
            (SIO, 0xF0, One),
            (SSK, 0xEC, ThreeOrFour),
            (STA, 0x0C, ThreeOrFour),
            (STB, 0x78, ThreeOrFour),
            (STCH, 0x54, ThreeOrFour),
            (STF, 0x80, ThreeOrFour),
            (STI, 0xD4, ThreeOrFour),
            (STL, 0x14, ThreeOrFour),
            (STS, 0x7C, ThreeOrFour),
            (STSW, 0xE8, ThreeOrFour),
            (STT, 0x84, ThreeOrFour),
            (STX, 0x10, ThreeOrFour),
            (SUB, 0x1C, ThreeOrFour),
            (SUBF, 0x5C, ThreeOrFour),
            (SUBR, 0x94, Two),
            (SVC, 0xB0, Two),
            (TD, 0xE0, ThreeOrFour),
            (TIO, 0xF8, One),
            (TIX, 0x2C, ThreeOrFour),
            (TIXR, 0xB8, Two),
            (WD, 0xDC, ThreeOrFour),
        ];
        for &(mnemonic, opcode, format) in entries {
            table.insert(mnemonic, opcode, format);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mnemonic_reports_invalid_without_panicking() {
        let table = OpcodeTable::standard();
        assert_eq!(table.format_of("NOTANOPCODE"), None);
        assert_eq!(table.opcode_of("NOTANOPCODE"), None);
    }

    #[test]
    fn opcode_low_bits_are_cleared() {
        let mut table = OpcodeTable::new();
        table.insert(Mnemonic::LDA, 0x03, Format::ThreeOrFour);
        assert_eq!(table.opcode_of("LDA"), Some(0x00));
    }

    #[test]
    fn reverse_lookup_matches_forward_lookup() {
        let table = OpcodeTable::standard();
        let entry = table.entry_by_mnemonic("STA").unwrap();
        let reverse = table.entry_by_opcode(entry.opcode).unwrap();
        assert_eq!(reverse.mnemonic, Mnemonic::STA);
    }

    #[test]
    fn format_3_and_4_share_one_opcode() {
        let table = OpcodeTable::standard();
        assert_eq!(table.format_of("LDA"), Some(Format::ThreeOrFour));
    }
}
