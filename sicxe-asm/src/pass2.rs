//! Pass 2: object code emission (spec.md 4.5).
//!
//! Walks the pass-1 trace in lock-step with the source, resolving each
//! statement's addressing mode and emitting H/T/M/E records through
//! [`sicxe_obj::Record`], plus a listing line per statement.

use crate::error::{AssemblerError, ErrorKind};
use crate::listing::ListingLine;
use crate::literal::byte_literal_bytes;
use crate::pass1::{Pass1Output, TraceEntry};
use crate::symbol::SymbolTable;
use sicxe::constants::{BASE_DISP_MAX, BASE_DISP_MIN, DISP12_MAX, DISP12_MIN};
use sicxe::opcode::{Format, Mnemonic, OpcodeTable};
use sicxe::register::RegisterId;
use sicxe_obj::{ModifySign, Record};

/// Largest payload of one text record before it must be flushed (spec.md
/// 4.5): 0x1E bytes, 60 hex characters.
const MAX_TEXT_BYTES: usize = sicxe_obj::MAX_TEXT_BYTES;

pub struct Pass2Output {
    pub object_lines: Vec<String>,
    pub listing: Vec<ListingLine>,
}

struct TextAccumulator {
    start: u32,
    bytes: Vec<u8>,
}

impl TextAccumulator {
    fn new(start: u32) -> TextAccumulator {
        TextAccumulator { start, bytes: Vec::new() }
    }

    fn flush(&mut self, out: &mut Vec<String>) {
        if !self.bytes.is_empty() {
            out.push(
                Record::Text { addr: self.start, bytes: std::mem::take(&mut self.bytes) }
                    .to_line(),
            );
        }
    }

    fn append(&mut self, locctr_before: u32, bytes: &[u8], out: &mut Vec<String>) {
        if self.bytes.is_empty() {
            self.start = locctr_before;
        } else if self.bytes.len() + bytes.len() > MAX_TEXT_BYTES {
            self.flush(out);
            self.start = locctr_before;
        }
        self.bytes.extend_from_slice(bytes);
    }
}

fn strip_operand_prefix(op: &str) -> (bool, bool, &str) {
    if let Some(rest) = op.strip_prefix('#') {
        (false, true, rest) // n=0, i=1
    } else if let Some(rest) = op.strip_prefix('@') {
        (true, false, rest) // n=1, i=0
    } else {
        (true, true, op) // n=1, i=1 (simple)
    }
}

fn is_numeric_literal(s: &str) -> bool {
    s.parse::<i64>().is_ok()
}

struct Format34Fields {
    n: bool,
    i: bool,
    x: bool,
    b: bool,
    p: bool,
    e: bool,
    disp_or_addr: u32,
    modification: Option<u32>,
}

#[allow(clippy::too_many_arguments)]
fn resolve_format34(
    mnemonic: &str,
    operands: &[String],
    extended: bool,
    locctr_before: u32,
    instruction_length: u32,
    base: Option<u32>,
    symbols: &SymbolTable,
    line: usize,
) -> Result<Format34Fields, AssemblerError> {
    if mnemonic == "RSUB" {
        if !operands.is_empty() {
            return Err(AssemblerError::new(ErrorKind::InvalidOperand, line, operands[0].clone()));
        }
        return Ok(Format34Fields {
            n: true,
            i: true,
            x: false,
            b: false,
            p: false,
            e: extended,
            disp_or_addr: 0,
            modification: None,
        });
    }

    let operand = operands
        .first()
        .ok_or_else(|| AssemblerError::new(ErrorKind::RequiredOneOperand, line, mnemonic))?;

    let x = match operands.get(1) {
        None => false,
        Some(second) if second == "X" => true,
        Some(other) => {
            return Err(AssemblerError::new(ErrorKind::InvalidOperand, line, other.clone()))
        }
    };

    let (n, i, operand) = strip_operand_prefix(operand);

    if !n && i && is_numeric_literal(operand) {
        let value: i64 = operand.parse().unwrap();
        return Ok(Format34Fields {
            n,
            i,
            x,
            b: false,
            p: false,
            e: extended,
            disp_or_addr: (value as u32) & if extended { 0x000F_FFFF } else { 0x0FFF },
            modification: None,
        });
    }

    let target = symbols
        .lookup(operand)
        .ok_or_else(|| AssemblerError::new(ErrorKind::InvalidOperand, line, operand.to_string()))?;

    let pc_after = locctr_before + instruction_length;
    let pc_disp = target as i64 - pc_after as i64;
    if pc_disp >= DISP12_MIN as i64 && pc_disp <= DISP12_MAX as i64 && !extended {
        let disp = (pc_disp as u32) & 0x0FFF;
        return Ok(Format34Fields {
            n,
            i,
            x,
            b: false,
            p: true,
            e: false,
            disp_or_addr: disp,
            modification: None,
        });
    }

    if let Some(base) = base {
        let base_disp = target as i64 - base as i64;
        if (BASE_DISP_MIN as i64..=BASE_DISP_MAX as i64).contains(&base_disp) && !extended {
            return Ok(Format34Fields {
                n,
                i,
                x,
                b: true,
                p: false,
                e: false,
                disp_or_addr: base_disp as u32,
                modification: None,
            });
        }
    }

    if extended {
        return Ok(Format34Fields {
            n,
            i,
            x,
            b: false,
            p: false,
            e: true,
            disp_or_addr: target & 0x000F_FFFF,
            modification: Some(locctr_before + 1),
        });
    }

    Err(AssemblerError::new(ErrorKind::InvalidOperand, line, operand.to_string()))
}

fn encode_format34(opcode: u8, fields: &Format34Fields) -> Vec<u8> {
    let byte0 = opcode | (u8::from(fields.n) << 1) | u8::from(fields.i);
    let flags = (u8::from(fields.x) << 3)
        | (u8::from(fields.b) << 2)
        | (u8::from(fields.p) << 1)
        | u8::from(fields.e);
    if fields.e {
        let addr = fields.disp_or_addr;
        vec![
            byte0,
            (flags << 4) | (((addr >> 16) & 0x0F) as u8),
            ((addr >> 8) & 0xFF) as u8,
            (addr & 0xFF) as u8,
        ]
    } else {
        let disp = fields.disp_or_addr;
        vec![byte0, (flags << 4) | (((disp >> 8) & 0x0F) as u8), (disp & 0xFF) as u8]
    }
}

fn encode_format2(
    opcode: u8,
    operands: &[String],
    requires_two: bool,
    line: usize,
    mnemonic: &str,
) -> Result<Vec<u8>, AssemblerError> {
    let r1_name = operands
        .first()
        .ok_or_else(|| AssemblerError::new(ErrorKind::RequiredOneOperand, line, mnemonic))?;
    let r1 = RegisterId::from_name(r1_name)
        .ok_or_else(|| AssemblerError::new(ErrorKind::InvalidOperand, line, r1_name.clone()))?;

    let r2 = match operands.get(1) {
        Some(name) => RegisterId::from_name(name)
            .ok_or_else(|| AssemblerError::new(ErrorKind::InvalidOperand, line, name.clone()))?
            .id(),
        None => {
            if requires_two {
                return Err(AssemblerError::new(ErrorKind::RequiredTwoOperands, line, mnemonic));
            }
            0
        }
    };

    Ok(vec![opcode, (r1.id() as u8) << 4 | (r2 as u8)])
}

/// Format 2 mnemonics whose encoding needs both registers to be meaningful;
/// `CLEAR`/`TIXR`/`SVC`/shift mnemonics operate on a single register operand.
fn format2_requires_two(mnemonic: Mnemonic) -> bool {
    !matches!(
        mnemonic,
        Mnemonic::CLEAR | Mnemonic::TIXR | Mnemonic::SVC | Mnemonic::SHIFTL | Mnemonic::SHIFTR
    )
}

fn word_operand_bytes(operand: &str, line: usize) -> Result<[u8; 3], AssemblerError> {
    let value: i64 = operand
        .parse()
        .map_err(|_| AssemblerError::new(ErrorKind::InvalidOperand, line, operand.to_string()))?;
    let word = (value as u32) & 0x00FF_FFFF;
    Ok([(word >> 16) as u8, (word >> 8) as u8, word as u8])
}

/// Runs pass 2 over `source`, consuming the pass-1 trace and symbol table.
/// Any error discards the partially produced object program and listing
/// (spec.md 4.5, "Failure semantics").
pub fn run_pass2(
    pass1: &Pass1Output,
    opcodes: &OpcodeTable,
) -> Result<Pass2Output, AssemblerError> {
    let mut object_lines = Vec::new();
    let mut listing = Vec::new();
    let mut modifications: Vec<String> = Vec::new();
    let mut base: Option<u32> = None;
    let mut text = TextAccumulator::new(pass1.start_addr);

    object_lines.push(
        Record::Header {
            name: pass1.program_name.clone(),
            start: pass1.start_addr,
            length: pass1.program_length,
        }
        .to_line(),
    );

    for entry in &pass1.trace {
        let TraceEntry { line, locctr_before, instruction_length, parsed } = entry;
        let mnemonic = parsed.mnemonic.as_str();
        let label = parsed.label.clone().unwrap_or_default();

        let (object_code, listing_locctr): (String, Option<u32>) = match mnemonic {
            "START" => (String::new(), Some(*locctr_before)),
            "END" => {
                text.flush(&mut object_lines);
                (String::new(), None)
            }
            "BASE" => {
                let operand = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, *line, "BASE")
                })?;
                let addr = pass1.symbols.lookup(operand).ok_or_else(|| {
                    AssemblerError::new(ErrorKind::InvalidOperand, *line, operand.clone())
                })?;
                base = Some(addr);
                (String::new(), None)
            }
            "NOBASE" => {
                base = None;
                (String::new(), None)
            }
            "BYTE" => {
                let operand = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, *line, "BYTE")
                })?;
                let bytes = byte_literal_bytes(operand)
                    .map_err(|kind| AssemblerError::new(kind, *line, operand.clone()))?;
                text.append(*locctr_before, &bytes, &mut object_lines);
                (hex(&bytes), Some(*locctr_before))
            }
            "WORD" => {
                let operand = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, *line, "WORD")
                })?;
                let bytes = word_operand_bytes(operand, *line)?;
                text.append(*locctr_before, &bytes, &mut object_lines);
                (hex(&bytes), Some(*locctr_before))
            }
            "RESB" | "RESW" => {
                text.flush(&mut object_lines);
                (String::new(), Some(*locctr_before))
            }
            _ => {
                let entry = opcodes.entry_by_mnemonic(mnemonic).ok_or_else(|| {
                    AssemblerError::new(ErrorKind::InvalidOpcode, *line, mnemonic.to_string())
                })?;
                let bytes = match entry.format {
                    Format::One => {
                        if parsed.extended {
                            return Err(AssemblerError::new(
                                ErrorKind::InvalidOperand,
                                *line,
                                mnemonic.to_string(),
                            ));
                        }
                        vec![entry.opcode]
                    }
                    Format::Two => encode_format2(
                        entry.opcode,
                        &parsed.operands,
                        format2_requires_two(entry.mnemonic),
                        *line,
                        mnemonic,
                    )?,
                    Format::ThreeOrFour => {
                        let fields = resolve_format34(
                            mnemonic,
                            &parsed.operands,
                            parsed.extended,
                            *locctr_before,
                            *instruction_length,
                            base,
                            &pass1.symbols,
                            *line,
                        )?;
                        if let Some(mod_addr) = fields.modification {
                            modifications.push(
                                Record::Modification {
                                    addr: mod_addr,
                                    length: 5,
                                    sign: ModifySign::Plus,
                                    reference: 1,
                                }
                                .to_line(),
                            );
                        }
                        encode_format34(entry.opcode, &fields)
                    }
                };
                text.append(*locctr_before, &bytes, &mut object_lines);
                (hex(&bytes), Some(*locctr_before))
            }
        };

        let (operand1, operand2) = match parsed.operands.as_slice() {
            [] => (String::new(), None),
            [one] => (one.clone(), None),
            [one, two, ..] => (one.clone(), Some(two.clone())),
        };

        listing.push(ListingLine {
            line: *line,
            locctr: listing_locctr,
            label,
            mnemonic: if parsed.extended { format!("+{}", mnemonic) } else { mnemonic.to_string() },
            operand1,
            operand2,
            object_code,
        });
    }

    object_lines.extend(modifications);
    object_lines.push(Record::End { start: pass1.start_addr }.to_line());

    Ok(Pass2Output { object_lines, listing })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1::run_pass1;

    fn assemble(source: &str) -> Pass2Output {
        let opcodes = OpcodeTable::standard();
        let pass1 = run_pass1(source, &opcodes, &SymbolTable::new()).unwrap();
        run_pass2(&pass1, &opcodes).unwrap()
    }

    #[test]
    fn minimal_program_matches_spec_example() {
        let out = assemble("COPY START 1000\nLDA #5\nRSUB\nEND COPY");
        assert_eq!(out.object_lines[0], "HCOPY  001000000006");
        assert_eq!(out.object_lines[1], "T00100006010005" .to_string() + "4F0000");
        assert_eq!(out.object_lines[2], "E001000");
    }

    #[test]
    fn pc_relative_boundary_requires_base_or_fails() {
        let far = "PROG START 0\nLDA TARGET\nRESW 2048\nTARGET WORD 0\nEND PROG";
        let opcodes = OpcodeTable::standard();
        let pass1 = run_pass1(far, &opcodes, &SymbolTable::new()).unwrap();
        assert!(run_pass2(&pass1, &opcodes).is_err());
    }

    #[test]
    fn base_relative_succeeds_when_base_set_to_target() {
        let source = "PROG START 0\nBASE TARGET\nLDA TARGET\nTARGET WORD 0\nEND PROG";
        let out = assemble(source);
        // disp should be 0 since BASE == TARGET
        assert!(out.object_lines.iter().any(|l| l.starts_with('T')));
    }

    #[test]
    fn extended_format_emits_modification_record() {
        let source = "PROG START 0\n+JSUB TARGET\nTARGET WORD 0\nEND PROG";
        let out = assemble(source);
        assert!(out.object_lines.iter().any(|l| l.starts_with('M') && l.ends_with("05+01")));
    }

    #[test]
    fn format2_clear_takes_single_register() {
        let source = "PROG START 0\nCLEAR A\nEND PROG";
        let out = assemble(source);
        assert!(out.object_lines[1].contains("B400"));
    }

    #[test]
    fn byte_and_word_directives_emit_their_bytes() {
        let source = "PROG START 0\nSTR BYTE C'A'\nVAL WORD 5\nEND PROG";
        let out = assemble(source);
        assert!(out.object_lines[1].contains("41000005"));
    }
}
