//! The linking loader: turns one to three assembled object programs into a
//! laid-out, relocated image in a [`sicxe::vm::Vm`]'s memory (spec.md 4.6).

pub mod error;
pub mod loader;
pub mod symtab;

pub use error::LoadError;
pub use loader::load;
pub use symtab::{ExternalSymbolTable, Section, NOT_FOUND};
