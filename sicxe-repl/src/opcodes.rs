//! Opcode dictionary config-file parsing (spec.md 6, "Opcode configuration
//! file"): ASCII, whitespace-separated, one `<hex-opcode> <MNEMONIC>
//! <formats>` entry per line, loaded once at startup.

use crate::error::ReplError;
use sicxe::opcode::{Format, Mnemonic, OpcodeTable};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// `formats` is digits 1-4 joined by `/` (e.g. `3/4`); a mnemonic that is
/// natively format 3/4 registers under [`Format::ThreeOrFour`] regardless of
/// which of `3`/`4` appears, since the table only distinguishes formats 1/2/
/// (3 or 4) — spec.md 3.
fn parse_formats(field: &str) -> Option<Format> {
    field.split('/').find_map(|digit| {
        digit.trim().parse::<u8>().ok().and_then(Format::from_digit)
    })
}

/// Reads `path` the way `vasm::main` and `vexfile::read_file` read their
/// inputs: open, wrap in a `BufReader`, walk lines.
pub fn load_opcode_table(path: &Path) -> Result<OpcodeTable, ReplError> {
    let file = File::open(path).map_err(|source| ReplError::Io { path: path.to_path_buf(), source })?;
    let reader = BufReader::new(file);
    let mut table = OpcodeTable::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReplError::Io { path: path.to_path_buf(), source })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let malformed = || ReplError::BadOpcodeLine { line: index + 1, text: line.clone() };

        if fields.len() != 3 {
            return Err(malformed());
        }
        let opcode = u8::from_str_radix(fields[0], 16).map_err(|_| malformed())?;
        let mnemonic = Mnemonic::from_str(fields[1]).ok_or_else(malformed)?;
        let format = parse_formats(fields[2]).ok_or_else(malformed)?;

        table.insert(mnemonic, opcode, format);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sicxe-repl-opcodes-{}.cfg", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_a_minimal_table() {
        let path = write_temp("00 LDA 3/4\n90 ADDR 2\nC4 FIX 1\n");
        let table = load_opcode_table(&path).unwrap();
        assert_eq!(table.opcode_of("LDA"), Some(0x00));
        assert_eq!(table.format_of("ADDR"), Some(Format::Two));
        assert_eq!(table.format_of("FIX"), Some(Format::One));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let path = write_temp("00 LDA 3/4\n\n\n90 ADDR 2\n");
        let table = load_opcode_table(&path).unwrap();
        assert_eq!(table.opcode_of("ADDR"), Some(0x90));
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        let path = write_temp("00 NOTREAL 3/4\n");
        assert!(matches!(load_opcode_table(&path), Err(ReplError::BadOpcodeLine { .. })));
    }
}
