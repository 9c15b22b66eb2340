//! The instruction-level execution engine: fetch/decode/execute for
//! formats 1-4, breakpoints, and halt handling (spec.md 4.7).

use crate::constants::{ADDR20_MASK, DISP12_MASK, DISP12_SIGN_BIT};
use crate::memory::{Memory, MemoryError};
use crate::opcode::{Format, Mnemonic, OpcodeTable};
use crate::register::{ConditionCode, RegisterFile, RegisterId};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunError {
    Memory(MemoryError),
    /// The fetched opcode byte does not name any instruction in the table.
    UnknownOpcode(u8),
    /// The x/b/p/e combination (`b=1, p=1`) has no defined addressing mode.
    InvalidAddressingMode,
    /// `run` was called before a loader successfully set the program extent.
    NoProgramLoaded,
    DivisionByZero,
}

impl From<MemoryError> for RunError {
    fn from(err: MemoryError) -> RunError {
        RunError::Memory(err)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunError::Memory(err) => write!(f, "{}", err),
            RunError::UnknownOpcode(byte) => write!(f, "unknown opcode byte {:02X}", byte),
            RunError::InvalidAddressingMode => {
                f.write_str("addressing mode combination b=1,p=1 is undefined")
            }
            RunError::NoProgramLoaded => f.write_str("no program is loaded"),
            RunError::DivisionByZero => f.write_str("division by zero"),
        }
    }
}

impl std::error::Error for RunError {}

/// Why a `run` call returned control to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `PC` reached or passed `program_end`; the run state was reset.
    ProgramFinished,
    /// `PC` landed on a breakpoint; the next `run` resumes from here.
    Breakpoint(u32),
}

/// The set of addresses `run` should pause at, kept sorted for deterministic
/// display (spec.md 3, 4.7).
#[derive(Clone, Debug, Default)]
pub struct Breakpoints {
    addresses: Vec<u32>,
}

impl Breakpoints {
    pub fn new() -> Breakpoints {
        Breakpoints::default()
    }

    /// Inserts `address`, keeping the list sorted. Duplicate addresses
    /// silently coalesce.
    pub fn insert(&mut self, address: u32) {
        if let Err(index) = self.addresses.binary_search(&address) {
            self.addresses.insert(index, address);
        }
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    pub fn contains(&self, address: u32) -> bool {
        self.addresses.binary_search(&address).is_ok()
    }

    /// Ascending address order, matching spec.md's display requirement.
    pub fn list(&self) -> &[u32] {
        &self.addresses
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// 24-bit two's-complement interpretation of a word (spec.md 3).
pub fn word_to_signed(value: u32) -> i32 {
    sign_extend(value & 0x00FF_FFFF, 24)
}

pub fn signed_to_word(value: i32) -> u32 {
    (value as u32) & 0x00FF_FFFF
}

struct DecodedInstruction {
    mnemonic: Mnemonic,
    format: Format,
    // Format 1/2 fields
    r1: Option<RegisterId>,
    r2: Option<RegisterId>,
    // Format 3/4 fields
    n: bool,
    i: bool,
    x: bool,
    b: bool,
    p: bool,
    e: bool,
    disp_or_addr: u32,
    next_pc: u32,
}

/// Owns the register file, the shared memory, the opcode dictionary and the
/// breakpoint set; this is the "VM" of spec.md 4.7.
pub struct Vm {
    pub registers: RegisterFile,
    pub memory: Memory,
    pub breakpoints: Breakpoints,
    opcodes: OpcodeTable,
    program_start: u32,
    program_end: u32,
    running: bool,
}

impl Vm {
    pub fn new(opcodes: OpcodeTable) -> Vm {
        Vm {
            registers: RegisterFile::new(),
            memory: Memory::new(),
            breakpoints: Breakpoints::new(),
            opcodes,
            program_start: 0,
            program_end: 0,
            running: false,
        }
    }

    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }

    /// Configures the loaded program's extent. `L` and `PC` are initialized
    /// here, at load time — not at each `run` call (spec.md 4.7).
    pub fn configure_program(&mut self, program_start: u32, program_end: u32) {
        self.program_start = program_start;
        self.program_end = program_end;
        self.registers.set(RegisterId::PC, program_start);
        self.registers
            .set(RegisterId::L, program_end.wrapping_sub(program_start));
        self.running = true;
    }

    pub fn program_start(&self) -> u32 {
        self.program_start
    }

    pub fn program_end(&self) -> u32 {
        self.program_end
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn fetch(&self, pc: u32) -> Result<[u8; 4], RunError> {
        let mut buf = [0u8; 4];
        let available = self.memory.len().saturating_sub(pc).min(4);
        if available > 0 {
            buf[..available as usize].copy_from_slice(self.memory.read(pc, available)?);
        }
        Ok(buf)
    }

    fn decode(&self, pc: u32) -> Result<DecodedInstruction, RunError> {
        let bytes = self.fetch(pc)?;
        let opcode_byte = bytes[0] & 0xFC;
        let entry = self
            .opcodes
            .entry_by_opcode(opcode_byte)
            .ok_or(RunError::UnknownOpcode(opcode_byte))?;

        match entry.format {
            Format::One => Ok(DecodedInstruction {
                mnemonic: entry.mnemonic,
                format: Format::One,
                r1: None,
                r2: None,
                n: false,
                i: false,
                x: false,
                b: false,
                p: false,
                e: false,
                disp_or_addr: 0,
                next_pc: pc + 1,
            }),
            Format::Two => Ok(DecodedInstruction {
                mnemonic: entry.mnemonic,
                format: Format::Two,
                r1: RegisterId::from_id(u32::from(bytes[1] >> 4)),
                r2: RegisterId::from_id(u32::from(bytes[1] & 0x0F)),
                n: false,
                i: false,
                x: false,
                b: false,
                p: false,
                e: false,
                disp_or_addr: 0,
                next_pc: pc + 2,
            }),
            Format::ThreeOrFour => {
                let n = (bytes[0] & 0x02) != 0;
                let i = (bytes[0] & 0x01) != 0;
                let flags = bytes[1] >> 4;
                let x = (flags & 0x08) != 0;
                let b = (flags & 0x04) != 0;
                let p = (flags & 0x02) != 0;
                let e = (flags & 0x01) != 0;

                if e {
                    let addr = ((u32::from(bytes[1] & 0x0F)) << 16)
                        | (u32::from(bytes[2]) << 8)
                        | u32::from(bytes[3]);
                    Ok(DecodedInstruction {
                        mnemonic: entry.mnemonic,
                        format: Format::ThreeOrFour,
                        r1: None,
                        r2: None,
                        n,
                        i,
                        x,
                        b,
                        p,
                        e,
                        disp_or_addr: addr & ADDR20_MASK,
                        next_pc: pc + 4,
                    })
                } else {
                    let disp =
                        ((u32::from(bytes[1] & 0x0F)) << 8) | u32::from(bytes[2]);
                    Ok(DecodedInstruction {
                        mnemonic: entry.mnemonic,
                        format: Format::ThreeOrFour,
                        r1: None,
                        r2: None,
                        n,
                        i,
                        x,
                        b,
                        p,
                        e,
                        disp_or_addr: disp & DISP12_MASK,
                        next_pc: pc + 3,
                    })
                }
            }
        }
    }

    /// Computes the target address per spec.md 4.7's addressing rules,
    /// before indexing and indirection. Returns `Err` for the undefined
    /// `b=1,p=1` combination.
    fn target_address(&self, d: &DecodedInstruction) -> Result<u32, RunError> {
        let target = if !d.n && !d.i {
            // SIC-compatibility mode: no sign extension, b/p/e fold directly
            // into a 15-bit displacement.
            (u32::from(d.b) << 14) | (u32::from(d.p) << 13) | (u32::from(d.e) << 12)
                | d.disp_or_addr
        } else if d.b && !d.p {
            self.registers.get(RegisterId::B).wrapping_add(d.disp_or_addr)
        } else if !d.b && d.p {
            let signed_disp = if d.disp_or_addr & DISP12_SIGN_BIT != 0 {
                sign_extend(d.disp_or_addr, 12)
            } else {
                d.disp_or_addr as i32
            };
            (d.next_pc as i32).wrapping_add(signed_disp) as u32
        } else if !d.b && !d.p {
            d.disp_or_addr
        } else {
            return Err(RunError::InvalidAddressingMode);
        };

        let indexed = if d.x {
            target.wrapping_add(self.registers.get(RegisterId::X))
        } else {
            target
        };

        Ok(indexed & 0x000F_FFFF)
    }

    /// One level of indirection is resolved here: for `n=1,i=0` this is the
    /// address a pointer word names; for every other combination it is
    /// `target` itself. Jump/store instructions use this directly; data
    /// loads additionally read the word this address contains.
    fn effective_address(&self, d: &DecodedInstruction) -> Result<u32, RunError> {
        let target = self.target_address(d)?;
        if d.n && !d.i {
            Ok(self.memory.read_word(target)?)
        } else {
            Ok(target)
        }
    }

    /// Resolves the operand's *value* for data instructions: immediate
    /// operands are the target itself, everything else reads the word at
    /// the effective address.
    fn resolve_word(&self, d: &DecodedInstruction) -> Result<u32, RunError> {
        if !d.n && d.i {
            Ok(self.target_address(d)?)
        } else {
            let ea = self.effective_address(d)?;
            Ok(self.memory.read_word(ea)?)
        }
    }

    fn resolve_byte(&self, d: &DecodedInstruction) -> Result<u8, RunError> {
        if !d.n && d.i {
            Ok((self.target_address(d)? & 0xFF) as u8)
        } else {
            let ea = self.effective_address(d)?;
            Ok(*self.memory.read(ea, 1)?.first().unwrap())
        }
    }

    /// Executes instructions until the program finishes or a breakpoint is
    /// reached, starting from the current `PC` (runs resume, they do not
    /// restart from `program_start`).
    pub fn run(&mut self) -> Result<StopReason, RunError> {
        if self.program_end <= self.program_start {
            return Err(RunError::NoProgramLoaded);
        }

        loop {
            let pc = self.registers.get(RegisterId::PC);
            if pc >= self.program_end {
                self.running = false;
                return Ok(StopReason::ProgramFinished);
            }

            self.step()?;

            let pc = self.registers.get(RegisterId::PC);
            if pc >= self.program_end {
                self.running = false;
                return Ok(StopReason::ProgramFinished);
            }
            if self.breakpoints.contains(pc) {
                return Ok(StopReason::Breakpoint(pc));
            }
        }
    }

    /// Fetches, decodes and executes exactly one instruction at the current
    /// `PC`, advancing it (or branching) as a side effect.
    pub fn step(&mut self) -> Result<(), RunError> {
        let pc = self.registers.get(RegisterId::PC);
        let decoded = self.decode(pc)?;
        self.registers.set(RegisterId::PC, decoded.next_pc);
        self.execute(&decoded)
    }

    fn execute(&mut self, d: &DecodedInstruction) -> Result<(), RunError> {
        match d.format {
            Format::One => self.execute_format1(d.mnemonic),
            Format::Two => self.execute_format2(d.mnemonic, d.r1, d.r2),
            Format::ThreeOrFour => self.execute_format34(d),
        }
    }

    fn execute_format1(&mut self, mnemonic: Mnemonic) -> Result<(), RunError> {
        // I/O and floating-point instructions are out of scope; treated as
        // no-ops (spec.md 4.7).
        let _ = mnemonic;
        Ok(())
    }

    fn execute_format2(
        &mut self,
        mnemonic: Mnemonic,
        r1: Option<RegisterId>,
        r2: Option<RegisterId>,
    ) -> Result<(), RunError> {
        use Mnemonic::*;
        let r1 = match r1 {
            Some(r) => r,
            None => return Ok(()),
        };
        match mnemonic {
            ADDR => {
                let r2 = r2.unwrap_or(r1);
                let sum = word_to_signed(self.registers.get(r2)) + word_to_signed(self.registers.get(r1));
                self.registers.set(r2, signed_to_word(sum));
            }
            SUBR => {
                let r2 = r2.unwrap_or(r1);
                let diff = word_to_signed(self.registers.get(r2)) - word_to_signed(self.registers.get(r1));
                self.registers.set(r2, signed_to_word(diff));
            }
            MULR => {
                let r2 = r2.unwrap_or(r1);
                let prod = word_to_signed(self.registers.get(r2)) as i64
                    * word_to_signed(self.registers.get(r1)) as i64;
                self.registers.set(r2, signed_to_word(prod as i32));
            }
            DIVR => {
                let r2 = r2.unwrap_or(r1);
                let divisor = word_to_signed(self.registers.get(r1));
                if divisor == 0 {
                    return Err(RunError::DivisionByZero);
                }
                let quotient = word_to_signed(self.registers.get(r2)) / divisor;
                self.registers.set(r2, signed_to_word(quotient));
            }
            COMPR => {
                let r2 = r2.unwrap_or(r1);
                let a = word_to_signed(self.registers.get(r1));
                let b = word_to_signed(self.registers.get(r2));
                self.registers
                    .set_condition_code(ConditionCode::from_ordering(a.cmp(&b)));
            }
            RMO => {
                if let Some(r2) = r2 {
                    self.registers.set(r2, self.registers.get(r1));
                }
            }
            CLEAR => {
                self.registers.set(r1, 0);
            }
            TIXR => {
                let x = word_to_signed(self.registers.get(RegisterId::X)) + 1;
                self.registers.set(RegisterId::X, signed_to_word(x));
                let cmp = self.registers.get(r1);
                self.registers.set_condition_code(ConditionCode::from_ordering(
                    x.cmp(&word_to_signed(cmp)),
                ));
            }
            // SHIFTL/SHIFTR/SVC are no-ops (spec.md 4.7).
            _ => {}
        }
        Ok(())
    }

    fn execute_format34(&mut self, d: &DecodedInstruction) -> Result<(), RunError> {
        use Mnemonic::*;
        match d.mnemonic {
            LDA => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::A, v);
            }
            LDX => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::X, v);
            }
            LDL => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::L, v);
            }
            LDB => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::B, v);
            }
            LDS => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::S, v);
            }
            LDT => {
                let v = self.resolve_word(d)?;
                self.registers.set(RegisterId::T, v);
            }
            LDCH => {
                let byte = self.resolve_byte(d)?;
                let a = self.registers.get(RegisterId::A);
                self.registers.set(RegisterId::A, (a & 0xFFFF_FF00) | u32::from(byte));
            }
            STA => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::A);
                self.memory.write_word(ea, v)?;
            }
            STX => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::X);
                self.memory.write_word(ea, v)?;
            }
            STL => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::L);
                self.memory.write_word(ea, v)?;
            }
            STB => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::B);
                self.memory.write_word(ea, v)?;
            }
            STS => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::S);
                self.memory.write_word(ea, v)?;
            }
            STT => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::T);
                self.memory.write_word(ea, v)?;
            }
            STSW => {
                let ea = self.effective_address(d)?;
                let v = self.registers.get(RegisterId::SW);
                self.memory.write_word(ea, v)?;
            }
            STCH => {
                let ea = self.effective_address(d)?;
                let a = self.registers.get(RegisterId::A);
                self.memory.write(ea, &[(a & 0xFF) as u8])?;
            }
            ADD => {
                let v = word_to_signed(self.resolve_word(d)?);
                let a = word_to_signed(self.registers.get(RegisterId::A));
                self.registers.set(RegisterId::A, signed_to_word(a + v));
            }
            SUB => {
                let v = word_to_signed(self.resolve_word(d)?);
                let a = word_to_signed(self.registers.get(RegisterId::A));
                self.registers.set(RegisterId::A, signed_to_word(a - v));
            }
            MUL => {
                let v = word_to_signed(self.resolve_word(d)?) as i64;
                let a = word_to_signed(self.registers.get(RegisterId::A)) as i64;
                self.registers.set(RegisterId::A, signed_to_word((a * v) as i32));
            }
            DIV => {
                let v = word_to_signed(self.resolve_word(d)?);
                if v == 0 {
                    return Err(RunError::DivisionByZero);
                }
                let a = word_to_signed(self.registers.get(RegisterId::A));
                self.registers.set(RegisterId::A, signed_to_word(a / v));
            }
            AND => {
                let v = self.resolve_word(d)?;
                let a = self.registers.get(RegisterId::A);
                self.registers.set(RegisterId::A, a & v);
            }
            OR => {
                let v = self.resolve_word(d)?;
                let a = self.registers.get(RegisterId::A);
                self.registers.set(RegisterId::A, a | v);
            }
            COMP => {
                let v = word_to_signed(self.resolve_word(d)?);
                let a = word_to_signed(self.registers.get(RegisterId::A));
                self.registers
                    .set_condition_code(ConditionCode::from_ordering(a.cmp(&v)));
            }
            J => {
                let ea = self.effective_address(d)?;
                self.registers.set(RegisterId::PC, ea);
            }
            JEQ => {
                let ea = self.effective_address(d)?;
                if self.registers.condition_code() == ConditionCode::Equal {
                    self.registers.set(RegisterId::PC, ea);
                }
            }
            JGT => {
                let ea = self.effective_address(d)?;
                if self.registers.condition_code() == ConditionCode::Greater {
                    self.registers.set(RegisterId::PC, ea);
                }
            }
            JLT => {
                let ea = self.effective_address(d)?;
                if self.registers.condition_code() == ConditionCode::Less {
                    self.registers.set(RegisterId::PC, ea);
                }
            }
            JSUB => {
                let ea = self.effective_address(d)?;
                let ret = self.registers.get(RegisterId::PC);
                self.registers.set(RegisterId::L, ret);
                self.registers.set(RegisterId::PC, ea);
            }
            RSUB => {
                let ret = self.registers.get(RegisterId::L);
                self.registers.set(RegisterId::PC, ret);
            }
            TIX => {
                let v = word_to_signed(self.resolve_word(d)?);
                let x = word_to_signed(self.registers.get(RegisterId::X)) + 1;
                self.registers.set(RegisterId::X, signed_to_word(x));
                self.registers
                    .set_condition_code(ConditionCode::from_ordering(x.cmp(&v)));
            }
            RD => {
                let _ = self.effective_address(d)?;
                self.registers.set(RegisterId::A, 0);
            }
            TD => {
                let _ = self.effective_address(d)?;
                self.registers.set_condition_code(ConditionCode::Less);
            }
            WD => {
                let _ = self.effective_address(d)?;
            }
            // Floating point, SIO/LPS/STI/STF/SSK: non-goals, treated as
            // no-ops after validating the addressing mode (spec.md 4.7).
            _ => {
                let _ = self.effective_address(d)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpcodeTable;

    fn vm_with(program: &[u8], start: u32) -> Vm {
        let mut vm = Vm::new(OpcodeTable::standard());
        vm.memory.write(start, program).unwrap();
        vm.configure_program(start, start + program.len() as u32);
        vm
    }

    #[test]
    fn minimal_program_halts_at_program_end() {
        // LDA #5 (immediate); no terminator needed, PC reaches program_end directly.
        let mut vm = vm_with(&[0x01, 0x00, 0x05], 0x1000);
        let result = vm.run().unwrap();
        assert_eq!(result, StopReason::ProgramFinished);
        assert_eq!(vm.registers.get(RegisterId::A), 5);
    }

    #[test]
    fn comp_sets_condition_code() {
        // LDA #5; COMP #7
        let mut vm = vm_with(&[0x01, 0x00, 0x05, 0x29, 0x00, 0x07], 0x2000);
        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.registers.condition_code(), ConditionCode::Less);
    }

    #[test]
    fn breakpoint_pauses_and_resume_continues() {
        let mut vm = vm_with(
            &[
                0x01, 0x00, 0x01, // LDA #1
                0x01, 0x00, 0x02, // LDA #2
                0x4C, 0x00, 0x00, // RSUB
            ],
            0x4000,
        );
        vm.breakpoints.insert(0x4003);
        let first = vm.run().unwrap();
        assert_eq!(first, StopReason::Breakpoint(0x4003));
        assert_eq!(vm.registers.get(RegisterId::A), 1);

        let second = vm.run().unwrap();
        assert_eq!(second, StopReason::ProgramFinished);
        assert_eq!(vm.registers.get(RegisterId::A), 2);
    }

    #[test]
    fn indirect_addressing_double_dereferences() {
        // LDA @0x100 (n=1,i=0; disp=0x100, b=p=0 so disp is an absolute target)
        let mut vm = vm_with(&[0x02, 0x01, 0x00], 0x5000);
        vm.memory.write_word(0x100, 0x006000).unwrap();
        vm.memory.write_word(0x6000, 0x000042).unwrap();
        vm.step().unwrap();
        assert_eq!(vm.registers.get(RegisterId::A), 0x42);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut vm = vm_with(&[0xFF, 0xFF, 0xFF], 0x7000);
        assert!(matches!(vm.step(), Err(RunError::UnknownOpcode(0xFC))));
    }

    #[test]
    fn breakpoints_are_sorted_and_deduplicated() {
        let mut bp = Breakpoints::new();
        bp.insert(0x2000);
        bp.insert(0x1000);
        bp.insert(0x2000);
        assert_eq!(bp.list(), &[0x1000, 0x2000]);
    }
}
