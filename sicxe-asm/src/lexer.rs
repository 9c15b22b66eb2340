//! Line-oriented tokenizing of SIC/XE source (spec.md 4.5, 6).
//!
//! The grammar is flat — one statement per physical line, no nested blocks —
//! so a hand-written tokenizer is the idiomatic fit here; the richer
//! multi-section grammars elsewhere in this ecosystem reach for `pest`
//! because they need it, this one does not.

use sicxe::opcode::OpcodeTable;

pub const DIRECTIVES: &[&str] = &["START", "END", "BYTE", "WORD", "RESB", "RESW", "BASE", "NOBASE"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub mnemonic: String,
    pub extended: bool,
    pub operands: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Meaningful(ParsedLine),
}

pub fn is_directive(mnemonic: &str) -> bool {
    DIRECTIVES.contains(&mnemonic)
}

fn split_first_token(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_whitespace()) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

/// Splits on top-level commas, treating text between a pair of `'` as
/// opaque so `BYTE C'A, B'` is one operand, not two.
fn split_operands(s: &str) -> Vec<String> {
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in s.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            ',' if !in_quote => {
                operands.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || !operands.is_empty() {
        operands.push(current.trim().to_string());
    }
    operands.into_iter().filter(|o| !o.is_empty()).collect()
}

fn is_mnemonic_token(token: &str, opcodes: &OpcodeTable) -> bool {
    let bare = token.strip_prefix('+').unwrap_or(token);
    is_directive(bare) || opcodes.entry_by_mnemonic(bare).is_some()
}

/// Classifies one line: blank, a `.`-comment, or a meaningful statement with
/// its label, mnemonic, `+` flag and comma-separated operands split out.
pub fn classify_line(line: &str, opcodes: &OpcodeTable) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('.') {
        return LineKind::Comment;
    }

    let (first, rest) = split_first_token(trimmed);
    let (label, mnemonic_token, operand_str) = if is_mnemonic_token(first, opcodes) {
        (None, first, rest)
    } else {
        let (second, rest2) = split_first_token(rest);
        (Some(first.to_string()), second, rest2)
    };

    let extended = mnemonic_token.starts_with('+');
    let mnemonic = mnemonic_token.strip_prefix('+').unwrap_or(mnemonic_token).to_string();
    let operands = split_operands(operand_str);

    LineKind::Meaningful(ParsedLine { label, mnemonic, extended, operands })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_lines_are_recognized() {
        let opcodes = OpcodeTable::standard();
        assert_eq!(classify_line("   . this is a comment", &opcodes), LineKind::Comment);
    }

    #[test]
    fn blank_lines_are_recognized() {
        let opcodes = OpcodeTable::standard();
        assert_eq!(classify_line("   ", &opcodes), LineKind::Blank);
    }

    #[test]
    fn label_is_inferred_from_non_mnemonic_first_token() {
        let opcodes = OpcodeTable::standard();
        let parsed = match classify_line("COPY START 1000", &opcodes) {
            LineKind::Meaningful(p) => p,
            other => panic!("expected meaningful line, got {:?}", other),
        };
        assert_eq!(parsed.label.as_deref(), Some("COPY"));
        assert_eq!(parsed.mnemonic, "START");
        assert_eq!(parsed.operands, vec!["1000"]);
    }

    #[test]
    fn first_token_matching_an_opcode_is_not_a_label() {
        let opcodes = OpcodeTable::standard();
        let parsed = match classify_line("LDA #5", &opcodes) {
            LineKind::Meaningful(p) => p,
            other => panic!("expected meaningful line, got {:?}", other),
        };
        assert_eq!(parsed.label, None);
        assert_eq!(parsed.mnemonic, "LDA");
        assert_eq!(parsed.operands, vec!["#5"]);
    }

    #[test]
    fn extended_format_prefix_is_split_off() {
        let opcodes = OpcodeTable::standard();
        let parsed = match classify_line("+JSUB PROGB", &opcodes) {
            LineKind::Meaningful(p) => p,
            other => panic!("expected meaningful line, got {:?}", other),
        };
        assert!(parsed.extended);
        assert_eq!(parsed.mnemonic, "JSUB");
    }

    #[test]
    fn quoted_commas_do_not_split_the_operand() {
        let opcodes = OpcodeTable::standard();
        let parsed = match classify_line("STR BYTE C'A, B'", &opcodes) {
            LineKind::Meaningful(p) => p,
            other => panic!("expected meaningful line, got {:?}", other),
        };
        assert_eq!(parsed.operands, vec!["C'A, B'"]);
    }

    #[test]
    fn second_operand_register_is_separate() {
        let opcodes = OpcodeTable::standard();
        let parsed = match classify_line("LDA BUFFER, X", &opcodes) {
            LineKind::Meaningful(p) => p,
            other => panic!("expected meaningful line, got {:?}", other),
        };
        assert_eq!(parsed.operands, vec!["BUFFER", "X"]);
    }
}
