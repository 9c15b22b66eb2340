//! Pass 1: locctr assignment and symbol-table construction (spec.md 4.5).

use crate::error::{AssemblerError, ErrorKind};
use crate::lexer::{classify_line, is_directive, LineKind, ParsedLine};
use crate::literal::byte_literal_length;
use crate::symbol::SymbolTable;
use sicxe::opcode::{Format, OpcodeTable};

/// One statement's pass-1 result: the `line` counter it was assigned, the
/// locctr it started at, its declared length, and its tokens — this is the
/// "intermediate trace" pass 2 consumes (spec.md 9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub line: usize,
    pub locctr_before: u32,
    pub instruction_length: u32,
    pub parsed: ParsedLine,
}

pub struct Pass1Output {
    pub trace: Vec<TraceEntry>,
    pub symbols: SymbolTable,
    pub program_name: String,
    pub start_addr: u32,
    pub program_length: u32,
}

fn instruction_length(
    parsed: &ParsedLine,
    locctr: u32,
    opcodes: &OpcodeTable,
    line_no: usize,
) -> Result<u32, AssemblerError> {
    let mnemonic = parsed.mnemonic.as_str();
    if is_directive(mnemonic) {
        return match mnemonic {
            "END" | "BASE" | "NOBASE" => Ok(0),
            "BYTE" => {
                let op = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, line_no, mnemonic)
                })?;
                byte_literal_length(op)
                    .map_err(|kind| AssemblerError::new(kind, line_no, op.clone()))
            }
            "WORD" => Ok(3),
            "RESB" => {
                let op = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, line_no, mnemonic)
                })?;
                op.parse::<u32>()
                    .map_err(|_| AssemblerError::new(ErrorKind::InvalidOperand, line_no, op.clone()))
            }
            "RESW" => {
                let op = parsed.operands.first().ok_or_else(|| {
                    AssemblerError::new(ErrorKind::RequiredOneOperand, line_no, mnemonic)
                })?;
                let n: u32 = op
                    .parse()
                    .map_err(|_| AssemblerError::new(ErrorKind::InvalidOperand, line_no, op.clone()))?;
                Ok(n * 3)
            }
            // A second START is not a legal directive position.
            _ => Err(AssemblerError::new(ErrorKind::InvalidOpcode, line_no, mnemonic)),
        };
    }

    match opcodes.format_of(mnemonic) {
        Some(Format::One) => Ok(1),
        Some(Format::Two) => Ok(2),
        Some(Format::ThreeOrFour) => Ok(if parsed.extended { 4 } else { 3 }),
        None => {
            let _ = locctr;
            Err(AssemblerError::new(ErrorKind::InvalidOpcode, line_no, mnemonic))
        }
    }
}

/// Runs pass 1 over `source`, returning the intermediate trace, the working
/// symbol table and the program's extent. `previous` supplies the caller's
/// last *saved* table, which is carried forward untouched; any error aborts
/// without the caller ever seeing a mutated copy, since `previous` is only
/// borrowed (spec.md 4.3, "Any pass-1 error aborts ... without modifying
/// saved tables").
pub fn run_pass1(
    source: &str,
    opcodes: &OpcodeTable,
    previous: &SymbolTable,
) -> Result<Pass1Output, AssemblerError> {
    let mut symbols = previous.clone();
    symbols.new_table();

    let mut lines = source.lines().enumerate();
    let mut line_counter = 0usize;

    // Skip empty/comment lines until the first meaningful line.
    let (first_idx, first_parsed) = loop {
        match lines.next() {
            None => return Err(AssemblerError::new(ErrorKind::MissingEnd, line_counter, "")),
            Some((idx, text)) => {
                line_counter += 5;
                match classify_line(text, opcodes) {
                    LineKind::Blank | LineKind::Comment => continue,
                    LineKind::Meaningful(parsed) => break (idx, parsed),
                }
            }
        }
    };

    let program_name = first_parsed.label.clone().unwrap_or_default();
    let mut locctr: u32 = if first_parsed.mnemonic == "START" {
        let operand = first_parsed.operands.first().ok_or_else(|| {
            AssemblerError::new(ErrorKind::RequiredOneOperand, line_counter, "START")
        })?;
        u32::from_str_radix(operand, 16)
            .map_err(|_| AssemblerError::new(ErrorKind::InvalidOperand, line_counter, operand.clone()))?
    } else {
        0
    };
    let start_addr = locctr;

    let mut trace = Vec::new();
    if first_parsed.mnemonic != "START" {
        // The first meaningful line was an ordinary statement, not START;
        // process it like any other below by re-threading it into the loop.
        let entry = record_statement(&first_parsed, line_counter, &mut locctr, opcodes, &mut symbols, first_idx)?;
        trace.push(entry);
    } else {
        if let Some(label) = &first_parsed.label {
            symbols
                .insert(label, start_addr)
                .map_err(|kind| AssemblerError::new(kind, line_counter, label.clone()))?;
        }
        trace.push(TraceEntry {
            line: line_counter,
            locctr_before: start_addr,
            instruction_length: 0,
            parsed: first_parsed,
        });
    }

    loop {
        let (idx, text) = match lines.next() {
            None => return Err(AssemblerError::new(ErrorKind::MissingEnd, line_counter, "")),
            Some(pair) => pair,
        };
        line_counter += 5;
        let parsed = match classify_line(text, opcodes) {
            LineKind::Blank | LineKind::Comment => continue,
            LineKind::Meaningful(parsed) => parsed,
        };

        let is_end = parsed.mnemonic == "END";
        let entry = record_statement(&parsed, line_counter, &mut locctr, opcodes, &mut symbols, idx)?;
        trace.push(entry);
        if is_end {
            break;
        }
    }

    let program_length = locctr - start_addr;
    Ok(Pass1Output { trace, symbols, program_name, start_addr, program_length })
}

fn record_statement(
    parsed: &ParsedLine,
    line_counter: usize,
    locctr: &mut u32,
    opcodes: &OpcodeTable,
    symbols: &mut SymbolTable,
    idx: usize,
) -> Result<TraceEntry, AssemblerError> {
    let _ = idx;
    if let Some(label) = &parsed.label {
        symbols
            .insert(label, *locctr)
            .map_err(|kind| AssemblerError::new(kind, line_counter, label.clone()))?;
    }

    let length = instruction_length(parsed, *locctr, opcodes, line_counter)?;
    let locctr_before = *locctr;
    *locctr += length;

    Ok(TraceEntry {
        line: line_counter,
        locctr_before,
        instruction_length: length,
        parsed: parsed.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_program_assigns_locctr() {
        let source = "COPY START 1000\nLDA #5\nRSUB\nEND COPY";
        let output = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap();
        assert_eq!(output.symbols.lookup("COPY"), Some(0x1000));
        assert_eq!(output.start_addr, 0x1000);
        assert_eq!(output.program_length, 6);
        assert_eq!(output.trace.len(), 4); // START, LDA, RSUB, END
    }

    #[test]
    fn duplicate_label_is_fatal() {
        let source = "COPY START 0\nFOO BYTE C'A'\nFOO BYTE C'B'\nEND COPY";
        let err = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateSymbol);
    }

    #[test]
    fn unknown_mnemonic_is_fatal() {
        let source = "COPY START 0\nFROB #1\nEND COPY";
        let err = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOpcode);
    }

    #[test]
    fn missing_end_is_fatal() {
        let source = "COPY START 0\nLDA #5";
        let err = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingEnd);
    }

    #[test]
    fn resw_and_resb_scale_locctr() {
        let source = "COPY START 0\nBUF RESB 4\nVALS RESW 2\nEND COPY";
        let output = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap();
        assert_eq!(output.symbols.lookup("BUF"), Some(0));
        assert_eq!(output.symbols.lookup("VALS"), Some(4));
        assert_eq!(output.program_length, 10);
    }

    #[test]
    fn extended_format_uses_four_bytes() {
        let source = "COPY START 0\n+JSUB PROGB\nEND COPY";
        let output = run_pass1(source, &OpcodeTable::standard(), &SymbolTable::new()).unwrap();
        assert_eq!(output.trace[1].instruction_length, 4);
    }
}
