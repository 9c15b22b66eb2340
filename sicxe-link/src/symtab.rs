//! The external-symbol table: one per loader invocation, mapping each
//! control section to its load address, length, and exported symbols
//! (spec.md 4.4).

use std::collections::HashMap;

pub struct Section {
    pub name: String,
    pub load_address: u32,
    pub length: u32,
    exports: HashMap<String, u32>,
    export_order: Vec<String>,
}

/// Ordered list of control sections and their exported symbols, rebuilt
/// from scratch at each `loader` invocation (spec.md 3, "Lifecycles").
#[derive(Default)]
pub struct ExternalSymbolTable {
    sections: Vec<Section>,
}

/// Returned by `address_of` when no section or exported symbol matches.
pub const NOT_FOUND: u32 = u32::MAX;

impl ExternalSymbolTable {
    pub fn new() -> ExternalSymbolTable {
        ExternalSymbolTable::default()
    }

    /// Appends a new control section. Sections are laid out contiguously in
    /// the order they are inserted (spec.md 3).
    pub fn insert_section(&mut self, name: &str, load_address: u32, length: u32) {
        self.sections.push(Section {
            name: name.to_string(),
            load_address,
            length,
            exports: HashMap::new(),
            export_order: Vec::new(),
        });
    }

    /// Attaches `symbol_name -> address` to the named section. Returns
    /// `false` if no section with that name has been inserted yet.
    pub fn insert_symbol(&mut self, section_name: &str, symbol_name: &str, address: u32) -> bool {
        match self.sections.iter_mut().find(|s| s.name == section_name) {
            Some(section) => {
                if !section.exports.contains_key(symbol_name) {
                    section.export_order.push(symbol_name.to_string());
                }
                section.exports.insert(symbol_name.to_string(), address);
                true
            }
            None => false,
        }
    }

    /// Searches section names first, then every section's exported symbols,
    /// in declaration order. Returns [`NOT_FOUND`] on a miss (spec.md 4.4).
    pub fn address_of(&self, name: &str) -> u32 {
        for section in &self.sections {
            if section.name == name {
                return section.load_address;
            }
        }
        for section in &self.sections {
            if let Some(&addr) = section.exports.get(name) {
                return addr;
            }
        }
        NOT_FOUND
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section listing followed by their exported symbols and a grand total
    /// length, in declaration order (spec.md 4.4, "show").
    pub fn show(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut total = 0u32;
        for section in &self.sections {
            lines.push(format!(
                "{:<6} {:06X} {:06X}",
                section.name, section.load_address, section.length
            ));
            for name in &section.export_order {
                lines.push(format!("  {:<6} {:06X}", name, section.exports[name]));
            }
            total += section.length;
        }
        lines.push(format!("total length {:06X}", total));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_name_resolves_to_its_load_address() {
        let mut table = ExternalSymbolTable::new();
        table.insert_section("PROGA", 0x4000, 0x20);
        assert_eq!(table.address_of("PROGA"), 0x4000);
    }

    #[test]
    fn exported_symbol_resolves_across_sections() {
        let mut table = ExternalSymbolTable::new();
        table.insert_section("PROGA", 0x4000, 0x20);
        table.insert_section("PROGB", 0x4020, 0x10);
        table.insert_symbol("PROGB", "LISTA", 0x4025);
        assert_eq!(table.address_of("LISTA"), 0x4025);
    }

    #[test]
    fn unknown_symbol_is_not_found() {
        let table = ExternalSymbolTable::new();
        assert_eq!(table.address_of("NOPE"), NOT_FOUND);
    }

    #[test]
    fn insert_symbol_into_missing_section_fails() {
        let mut table = ExternalSymbolTable::new();
        assert!(!table.insert_symbol("NOSUCH", "X", 0));
    }

    #[test]
    fn show_lists_sections_then_symbols_then_total() {
        let mut table = ExternalSymbolTable::new();
        table.insert_section("PROGA", 0x4000, 0x10);
        table.insert_symbol("PROGA", "LISTA", 0x4002);
        let lines = table.show();
        assert!(lines[0].starts_with("PROGA"));
        assert!(lines[1].trim_start().starts_with("LISTA"));
        assert_eq!(lines.last().unwrap(), "total length 000010");
    }
}
