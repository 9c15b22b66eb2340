//! Listing (`.lst`) line formatting (spec.md 6).

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingLine {
    pub line: usize,
    pub locctr: Option<u32>,
    pub label: String,
    pub mnemonic: String,
    pub operand1: String,
    pub operand2: Option<String>,
    pub object_code: String,
}

impl ListingLine {
    /// Renders one fixed-width listing row: 3-digit line number, 4-digit
    /// locctr (blank for directives that carry none), 6-char label, 6-char
    /// mnemonic, operands, then the object code in its own column.
    pub fn render(&self) -> String {
        let locctr = match self.locctr {
            Some(addr) => format!("{:04X}", addr),
            None => "    ".to_string(),
        };
        let mut operand = self.operand1.clone();
        if let Some(op2) = &self.operand2 {
            operand.push(',');
            operand.push_str(op2);
        }
        format!(
            "{:03} {} {:<6} {:<6} {:<20}{}",
            self.line, locctr, self.label, self.mnemonic, operand, self.object_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_lines_blank_the_locctr_column() {
        let line = ListingLine {
            line: 10,
            locctr: None,
            label: String::new(),
            mnemonic: "END".to_string(),
            operand1: "COPY".to_string(),
            operand2: None,
            object_code: String::new(),
        };
        assert!(line.render().starts_with("010      "));
    }

    #[test]
    fn two_operands_are_comma_joined() {
        let line = ListingLine {
            line: 15,
            locctr: Some(0x1000),
            label: String::new(),
            mnemonic: "LDA".to_string(),
            operand1: "BUFFER".to_string(),
            operand2: Some("X".to_string()),
            object_code: "032010".to_string(),
        };
        assert!(line.render().contains("BUFFER,X"));
    }
}
