//! The two-pass linking loader (spec.md 4.6).
//!
//! Pass 1 lays out control sections and builds the external-symbol table;
//! pass 2 writes text-record bytes into memory and applies modification
//! records using the reference vectors pass 2 builds from `R` records.

use crate::error::LoadError;
use crate::symtab::ExternalSymbolTable;
use sicxe::vm::Vm;
use sicxe_obj::Record;
use std::fs;

fn read_records(path: &str) -> Result<Vec<Record>, LoadError> {
    let text = fs::read_to_string(path)
        .map_err(|source| LoadError::FileNotFound { path: path.to_string(), source })?;
    text.lines().map(|line| Record::parse(line).map_err(LoadError::from)).collect()
}

struct FileLayout {
    length: u32,
    records: Vec<Record>,
}

/// Loads 1 to 3 object programs at `program_address`, writing bytes into
/// `vm`'s memory and configuring its program extent. Returns the
/// external-symbol table built along the way so the `symbol`/loader-facing
/// commands can display it.
pub fn load(paths: &[String], program_address: u32, vm: &mut Vm) -> Result<ExternalSymbolTable, LoadError> {
    if paths.is_empty() || paths.len() > 3 {
        return Err(LoadError::WrongFileCount(paths.len()));
    }

    let mut symtab = ExternalSymbolTable::new();
    let mut layouts = Vec::with_capacity(paths.len());
    let mut load_address = program_address;

    // Pass 1: layout and global symbols.
    for path in paths {
        let records = read_records(path)?;
        let mut iter = records.iter();
        let (name, length) = match iter.next() {
            Some(Record::Header { name, length, .. }) => (name.clone(), *length),
            _ => return Err(LoadError::MissingHeader),
        };

        symtab.insert_section(&name, load_address, length);

        for record in iter.by_ref() {
            match record {
                Record::Define(entries) => {
                    for entry in entries {
                        symtab.insert_symbol(&name, &entry.name, load_address + entry.address);
                    }
                }
                Record::End { .. } => break,
                _ => {}
            }
        }

        layouts.push(FileLayout { length, records });
        load_address += length;
    }

    let program_end = load_address;
    vm.configure_program(program_address, program_end);

    // Pass 2: byte loading and relocation.
    let mut load_address = program_address;
    for layout in &layouts {
        let this_section_address = load_address;
        // Slot 1 is the section itself (spec.md 4.3); slot 0 is never
        // addressed by a reference index and stays a placeholder. An R
        // record whose own index is 1 overrides this default, same as any
        // other slot.
        let mut reference_vector = vec![0u32, this_section_address];

        for record in &layout.records {
            match record {
                Record::Header { .. } | Record::Define(_) => {}
                Record::Refer(entries) => {
                    for entry in entries {
                        let index = entry.index as usize;
                        if reference_vector.len() <= index {
                            reference_vector.resize(index + 1, 0);
                        }
                        let addr = symtab.address_of(&entry.name);
                        if addr == crate::symtab::NOT_FOUND {
                            return Err(LoadError::UnresolvedExternal(entry.name.clone()));
                        }
                        reference_vector[index] = addr;
                    }
                }
                Record::Text { addr, bytes } => {
                    vm.memory.write(load_address + addr, bytes)?;
                }
                Record::Modification { addr, length, sign, reference } => {
                    let value = *reference_vector
                        .get(*reference as usize)
                        .ok_or_else(|| LoadError::UnresolvedExternal(format!("#{}", reference)))?;
                    vm.memory.modify(load_address + addr, *length, (*sign).into(), i64::from(value))?;
                }
                Record::End { .. } => break,
            }
        }

        load_address += layout.length;
    }

    Ok(symtab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sicxe::opcode::OpcodeTable;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("sicxe-link-test-{}-{}.obj", std::process::id(), name));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn single_section_loads_text_records() {
        let obj = "HCOPY  001000000006\n\
                    T00100006010005" .to_string() + "4C0000\nE001000";
        let path = write_temp("single", &obj);

        let mut vm = Vm::new(OpcodeTable::standard());
        let symtab = load(&[path], 0x1000, &mut vm).unwrap();

        assert_eq!(vm.memory.read(0x1000, 6).unwrap(), &[0x01, 0x00, 0x05, 0x4C, 0x00, 0x00]);
        assert_eq!(vm.program_start(), 0x1000);
        assert_eq!(vm.program_end(), 0x1006);
        assert_eq!(symtab.address_of("COPY"), 0x1000);
    }

    #[test]
    fn external_reference_is_relocated_by_modification_record() {
        let prog_a = "HPROGA 000000000007\n\
                       R01PROGB \n\
                       T00000004" .to_string() + "48000000" + "\nM00000105+01\nE000000";
        let prog_b = "HPROGB 000000000003\n\
                       DPROGB 000000\n\
                       T00000003" + "000000\nE000000";

        let path_a = write_temp("a", &prog_a);
        let path_b = write_temp("b", &prog_b);

        let mut vm = Vm::new(OpcodeTable::standard());
        load(&[path_a, path_b], 0x4000, &mut vm).unwrap();

        // JSUB's 20-bit address field should equal PROGB's load address 0x4007.
        let instr = vm.memory.read(0x4000, 4).unwrap();
        let addr = ((instr[1] as u32 & 0x0F) << 16) | ((instr[2] as u32) << 8) | instr[3] as u32;
        assert_eq!(addr, 0x4007);
    }

    #[test]
    fn wrong_file_count_is_rejected() {
        let mut vm = Vm::new(OpcodeTable::standard());
        assert!(matches!(load(&[], 0, &mut vm), Err(LoadError::WrongFileCount(0))));
    }

    #[test]
    fn missing_file_is_fatal() {
        let mut vm = Vm::new(OpcodeTable::standard());
        let result = load(&["/nonexistent/path.obj".to_string()], 0, &mut vm);
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    /// A format-4 instruction addressing a label in its own section, with no
    /// `R` record at all, still needs its `M` record (reference 1) to
    /// resolve: slot 1 of the reference vector defaults to the section's own
    /// load address (spec.md 4.3), not only to values an `R` record supplies.
    #[test]
    fn extended_instruction_to_a_local_label_relocates_without_a_refer_record() {
        let opcodes = OpcodeTable::standard();
        let source = "PROG START 0\n+JSUB TARGET\nTARGET WORD 0\nEND PROG";
        let previous = sicxe_asm::SymbolTable::new();
        let assembled = sicxe_asm::assemble(source, &opcodes, &previous).unwrap();
        let obj = assembled.object_lines.join("\n");
        let path = write_temp("local-extended", &obj);

        let mut vm = Vm::new(opcodes);
        load(&[path], 0x4000, &mut vm).unwrap();

        let instr = vm.memory.read(0x4000, 4).unwrap();
        let addr = ((instr[1] as u32 & 0x0F) << 16) | ((instr[2] as u32) << 8) | instr[3] as u32;
        assert_eq!(addr, 0x4000 + 0x0004);
    }
}
