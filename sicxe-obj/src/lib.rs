//! Reading and writing of SIC/XE object-program records (spec.md 6).
//!
//! Every record is a fixed-field ASCII line; [`Record::parse`] and
//! [`Record::to_line`] are exact inverses for well-formed input. The
//! assembler writes these with [`Record::to_line`]; the linking loader reads
//! them back with [`Record::parse`].

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifySign {
    Plus,
    Minus,
}

impl ModifySign {
    fn from_char(c: char) -> Option<ModifySign> {
        match c {
            '+' => Some(ModifySign::Plus),
            '-' => Some(ModifySign::Minus),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            ModifySign::Plus => '+',
            ModifySign::Minus => '-',
        }
    }
}

impl From<ModifySign> for sicxe::memory::ModifySign {
    fn from(sign: ModifySign) -> sicxe::memory::ModifySign {
        match sign {
            ModifySign::Plus => sicxe::memory::ModifySign::Plus,
            ModifySign::Minus => sicxe::memory::ModifySign::Minus,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjError {
    /// The line is too short for its record type, or a fixed-width field
    /// could not be parsed as hex/decimal where one was expected.
    Malformed(String),
    /// The first character does not name any of H/D/R/T/M/E.
    UnknownRecordType(char),
    /// The line has zero characters.
    EmptyLine,
}

impl fmt::Display for ObjError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjError::Malformed(line) => write!(f, "malformed object record: {:?}", line),
            ObjError::UnknownRecordType(c) => write!(f, "unknown record type '{}'", c),
            ObjError::EmptyLine => f.write_str("empty object record line"),
        }
    }
}

impl std::error::Error for ObjError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefineEntry {
    pub name: String,
    pub address: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferEntry {
    pub index: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    Header { name: String, start: u32, length: u32 },
    Define(Vec<DefineEntry>),
    Refer(Vec<ReferEntry>),
    Text { addr: u32, bytes: Vec<u8> },
    Modification { addr: u32, length: u32, sign: ModifySign, reference: u32 },
    End { start: u32 },
}

fn pad_name(name: &str) -> String {
    format!("{:<6}", name)
}

fn hex_field(s: &str) -> Result<u32, ObjError> {
    u32::from_str_radix(s, 16).map_err(|_| ObjError::Malformed(s.to_string()))
}

fn dec_field(s: &str) -> Result<u32, ObjError> {
    s.parse().map_err(|_| ObjError::Malformed(s.to_string()))
}

fn slice(line: &str, start: usize, len: usize) -> Result<&str, ObjError> {
    line.get(start..start + len)
        .ok_or_else(|| ObjError::Malformed(line.to_string()))
}

impl Record {
    /// Parses one object-record line. Leading/trailing whitespace around the
    /// line is not trimmed by this function; callers passing raw file lines
    /// should strip the line terminator first.
    pub fn parse(line: &str) -> Result<Record, ObjError> {
        let mut chars = line.chars();
        let kind = chars.next().ok_or(ObjError::EmptyLine)?;
        match kind {
            'H' => {
                let name = slice(line, 1, 6)?.trim_end().to_string();
                let start = hex_field(slice(line, 7, 6)?)?;
                let length = hex_field(slice(line, 13, 6)?)?;
                Ok(Record::Header { name, start, length })
            }
            'D' => {
                let body = &line[1..];
                let mut entries = Vec::new();
                let mut offset = 0;
                while offset < body.len() {
                    let name = slice(body, offset, 6)?.trim_end().to_string();
                    let address = hex_field(slice(body, offset + 6, 6)?)?;
                    entries.push(DefineEntry { name, address });
                    offset += 12;
                }
                Ok(Record::Define(entries))
            }
            'R' => {
                let body = &line[1..];
                let mut entries = Vec::new();
                let mut offset = 0;
                while offset < body.len() {
                    let index = dec_field(slice(body, offset, 2)?)?;
                    let name = slice(body, offset + 2, 6)?.trim_end().to_string();
                    entries.push(ReferEntry { index, name });
                    offset += 8;
                }
                Ok(Record::Refer(entries))
            }
            'T' => {
                let addr = hex_field(slice(line, 1, 6)?)?;
                let n = hex_field(slice(line, 7, 2)?)? as usize;
                let hex_digits = slice(line, 9, n * 2)?;
                let mut bytes = Vec::with_capacity(n);
                for i in 0..n {
                    bytes.push(u8::from_str_radix(&hex_digits[i * 2..i * 2 + 2], 16)
                        .map_err(|_| ObjError::Malformed(line.to_string()))?);
                }
                Ok(Record::Text { addr, bytes })
            }
            'M' => {
                let addr = hex_field(slice(line, 1, 6)?)?;
                let length = hex_field(slice(line, 7, 2)?)?;
                let sign_char = slice(line, 9, 1)?.chars().next().unwrap();
                let sign = ModifySign::from_char(sign_char)
                    .ok_or_else(|| ObjError::Malformed(line.to_string()))?;
                let reference = dec_field(slice(line, 10, 2)?)?;
                Ok(Record::Modification { addr, length, sign, reference })
            }
            'E' => {
                let start = hex_field(slice(line, 1, 6)?)?;
                Ok(Record::End { start })
            }
            other => Err(ObjError::UnknownRecordType(other)),
        }
    }

    /// Renders this record back into its fixed-field text form.
    pub fn to_line(&self) -> String {
        match self {
            Record::Header { name, start, length } => {
                format!("H{}{:06X}{:06X}", pad_name(name), start, length)
            }
            Record::Define(entries) => {
                let mut line = String::from("D");
                for entry in entries {
                    line.push_str(&pad_name(&entry.name));
                    line.push_str(&format!("{:06X}", entry.address));
                }
                line
            }
            Record::Refer(entries) => {
                let mut line = String::from("R");
                for entry in entries {
                    line.push_str(&format!("{:02}", entry.index));
                    line.push_str(&pad_name(&entry.name));
                }
                line
            }
            Record::Text { addr, bytes } => {
                let mut line = format!("T{:06X}{:02X}", addr, bytes.len());
                for byte in bytes {
                    line.push_str(&format!("{:02X}", byte));
                }
                line
            }
            Record::Modification { addr, length, sign, reference } => {
                format!("M{:06X}{:02X}{}{:02}", addr, length, sign.as_char(), reference)
            }
            Record::End { start } => format!("E{:06X}", start),
        }
    }
}

/// Maximum payload of one text record: 0x1E bytes, per the assembler's
/// flush policy (spec.md 4.5).
pub const MAX_TEXT_BYTES: usize = 0x1E;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let record = Record::Header { name: "COPY".to_string(), start: 0x1000, length: 0x06 };
        let line = record.to_line();
        assert_eq!(line, "HCOPY  001000000006");
        assert_eq!(Record::parse(&line).unwrap(), record);
    }

    #[test]
    fn text_round_trips() {
        let record = Record::Text { addr: 0x1000, bytes: vec![0x01, 0x00, 0x05, 0x4C, 0x00, 0x00] };
        let line = record.to_line();
        assert_eq!(line, "T00100006010005" .to_string() + "4C0000");
        assert_eq!(Record::parse(&line).unwrap(), record);
    }

    #[test]
    fn modification_round_trips() {
        let record = Record::Modification { addr: 0x1003, length: 5, sign: ModifySign::Plus, reference: 1 };
        let line = record.to_line();
        assert_eq!(line, "M00100305+01");
        assert_eq!(Record::parse(&line).unwrap(), record);
    }

    #[test]
    fn refer_entries_are_space_padded_and_fixed_width() {
        let record = Record::Refer(vec![
            ReferEntry { index: 1, name: "PROGB".to_string() },
            ReferEntry { index: 2, name: "X".to_string() },
        ]);
        let line = record.to_line();
        assert_eq!(line, "R01PROGB 02X     ");
        assert_eq!(Record::parse(&line).unwrap(), record);
    }

    #[test]
    fn define_entries_parse_back_into_pairs() {
        let record = Record::Define(vec![
            DefineEntry { name: "PROGB".to_string(), address: 0x0000 },
        ]);
        let line = record.to_line();
        assert_eq!(Record::parse(&line).unwrap(), record);
    }

    #[test]
    fn unknown_record_type_is_reported() {
        assert_eq!(Record::parse("Z000000"), Err(ObjError::UnknownRecordType('Z')));
    }

    #[test]
    fn empty_line_is_reported() {
        assert_eq!(Record::parse(""), Err(ObjError::EmptyLine));
    }
}
