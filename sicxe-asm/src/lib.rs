//! Two-pass SIC/XE assembler (spec.md 4.5).
//!
//! [`assemble`] drives pass 1 ([`pass1::run_pass1`]) and pass 2
//! ([`pass2::run_pass2`]) in strict sequence and publishes the resulting
//! symbol table only once both passes succeed, matching the ordering
//! guarantee in spec.md 5 ("within one assemble, pass-1 strictly precedes
//! pass-2").

pub mod error;
pub mod lexer;
pub mod listing;
pub mod literal;
pub mod pass1;
pub mod pass2;
pub mod symbol;

pub use error::{AssemblerError, ErrorKind};
pub use listing::ListingLine;
pub use symbol::SymbolTable;

use sicxe::opcode::OpcodeTable;

/// Everything a successful assembly produces: the object program as a
/// sequence of record lines (ready to be written to a `.obj` file or fed
/// straight to the loader), the listing, and the symbol table with the new
/// assembly published into `saved`.
pub struct AssembleOutput {
    pub object_lines: Vec<String>,
    pub listing: Vec<ListingLine>,
    pub symbols: SymbolTable,
}

/// Assembles `source` against `opcodes`, carrying forward `previous`'s last
/// saved symbol table. On success the returned table has the new assembly's
/// symbols in `saved` (and its error slot cleared); on failure the caller's
/// own copy of `previous` is untouched, since this function only borrows it.
pub fn assemble(
    source: &str,
    opcodes: &OpcodeTable,
    previous: &SymbolTable,
) -> Result<AssembleOutput, AssemblerError> {
    let pass1_output = pass1::run_pass1(source, opcodes, previous)?;
    let pass2_output = pass2::run_pass2(&pass1_output, opcodes)?;

    let mut symbols = pass1_output.symbols;
    symbols.save();

    Ok(AssembleOutput {
        object_lines: pass2_output.object_lines,
        listing: pass2_output.listing,
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_assembly_publishes_saved_symbols() {
        let opcodes = OpcodeTable::standard();
        let previous = SymbolTable::new();
        let output = assemble("COPY START 1000\nLDA #5\nRSUB\nEND COPY", &opcodes, &previous)
            .unwrap();
        assert_eq!(output.symbols.lookup_saved("COPY"), Some(0x1000));
        assert_eq!(output.object_lines[0], "HCOPY  001000000006");
    }

    #[test]
    fn failed_assembly_does_not_touch_callers_table() {
        let opcodes = OpcodeTable::standard();
        let mut previous = SymbolTable::new();
        previous.insert("OLD", 0x2000).unwrap();
        previous.save();

        let err = assemble("COPY START 0\nFROB #1\nEND COPY", &opcodes, &previous).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOpcode);
        assert_eq!(previous.lookup_saved("OLD"), Some(0x2000));
    }
}
