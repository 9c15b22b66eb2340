//! The per-assembly symbol table: *working* (under construction by the
//! current pass) versus *saved* (the last successful assembly), plus the
//! single-slot assembly error record (spec.md 4.3).

use crate::error::{AssemblerError, ErrorKind};
use sicxe::register::RegisterId;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    working: HashMap<String, u32>,
    working_order: Vec<String>,
    saved: HashMap<String, u32>,
    saved_order: Vec<String>,
    last_error: Option<AssemblerError>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Clears the working table; called when an assembly begins.
    pub fn new_table(&mut self) {
        self.working.clear();
        self.working_order.clear();
    }

    /// Inserts `(name, locctr)` into the working table. Fails if the name
    /// already exists in the working table or names a register.
    pub fn insert(&mut self, name: &str, locctr: u32) -> Result<(), ErrorKind> {
        if RegisterId::from_name(name).is_some() || self.working.contains_key(name) {
            return Err(ErrorKind::DuplicateSymbol);
        }
        self.working.insert(name.to_string(), locctr);
        self.working_order.push(name.to_string());
        Ok(())
    }

    /// Looks up `name`, consulting register pseudo-symbols first, then the
    /// working table.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        if let Some(reg) = RegisterId::from_name(name) {
            return Some(reg.id());
        }
        self.working.get(name).copied()
    }

    /// Looks up `name` in the saved table only, as the loader-facing
    /// address resolution path would after a successful assembly.
    pub fn lookup_saved(&self, name: &str) -> Option<u32> {
        if let Some(reg) = RegisterId::from_name(name) {
            return Some(reg.id());
        }
        self.saved.get(name).copied()
    }

    /// Atomically replaces `saved` with `working` and clears `working`.
    pub fn save(&mut self) {
        self.saved = self.working.clone();
        self.saved_order = self.working_order.clone();
        self.working.clear();
        self.working_order.clear();
    }

    /// The saved table, bucketed by each name's first character and
    /// otherwise in insertion order, for reproducible display.
    pub fn show(&self) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> = self
            .saved_order
            .iter()
            .map(|name| (name.clone(), self.saved[name]))
            .collect();
        entries.sort_by_key(|(name, _)| name.chars().next().unwrap_or('\0'));
        entries
    }

    pub fn record_error(&mut self, error: AssemblerError) {
        self.last_error = Some(error);
    }

    pub fn show_error(&self) -> Option<&AssemblerError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_fails() {
        let mut table = SymbolTable::new();
        table.insert("COPY", 0).unwrap();
        assert_eq!(table.insert("COPY", 10), Err(ErrorKind::DuplicateSymbol));
    }

    #[test]
    fn register_names_are_reserved() {
        let mut table = SymbolTable::new();
        assert_eq!(table.insert("A", 0), Err(ErrorKind::DuplicateSymbol));
    }

    #[test]
    fn lookup_prefers_registers_over_working_symbols() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("PC"), Some(RegisterId::PC.id()));
    }

    #[test]
    fn save_publishes_working_and_clears_it() {
        let mut table = SymbolTable::new();
        table.insert("COPY", 0x1000).unwrap();
        table.save();
        assert_eq!(table.lookup("COPY"), None);
        assert_eq!(table.lookup_saved("COPY"), Some(0x1000));
    }

    #[test]
    fn show_is_bucketed_by_first_character() {
        let mut table = SymbolTable::new();
        table.insert("BETA", 1).unwrap();
        table.insert("ALPHA", 2).unwrap();
        table.insert("ALSO", 3).unwrap();
        table.save();
        let names: Vec<&str> = table.show().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ALPHA", "ALSO", "BETA"]);
    }

    #[test]
    fn last_error_overwrites() {
        let mut table = SymbolTable::new();
        table.record_error(AssemblerError::new(ErrorKind::InvalidOpcode, 1, "FOO"));
        table.record_error(AssemblerError::new(ErrorKind::InvalidOperand, 2, "BAR"));
        assert_eq!(table.show_error().unwrap().kind, ErrorKind::InvalidOperand);
    }
}
