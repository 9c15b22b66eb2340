//! Errors the linking loader can report (spec.md 7, "Load").

use sicxe::memory::MemoryError;
use sicxe_obj::ObjError;
use std::fmt;

#[derive(Debug)]
pub enum LoadError {
    /// Fewer than one or more than three object files were given.
    WrongFileCount(usize),
    FileNotFound { path: String, source: std::io::Error },
    MalformedRecord(ObjError),
    /// A `T`/`M` record wrote or modified outside `[0, 0xFFFFF]`.
    OutOfRange(MemoryError),
    /// An `R` record named a symbol no control section exports.
    UnresolvedExternal(String),
    /// A file's first record was not `H`.
    MissingHeader,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::WrongFileCount(n) => {
                write!(f, "loader accepts 1 to 3 object files, got {}", n)
            }
            LoadError::FileNotFound { path, source } => {
                write!(f, "could not read \"{}\": {}", path, source)
            }
            LoadError::MalformedRecord(err) => write!(f, "{}", err),
            LoadError::OutOfRange(err) => write!(f, "{}", err),
            LoadError::UnresolvedExternal(name) => {
                write!(f, "unresolved external reference \"{}\"", name)
            }
            LoadError::MissingHeader => f.write_str("object program does not start with a header record"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<ObjError> for LoadError {
    fn from(err: ObjError) -> LoadError {
        LoadError::MalformedRecord(err)
    }
}

impl From<MemoryError> for LoadError {
    fn from(err: MemoryError) -> LoadError {
        LoadError::OutOfRange(err)
    }
}
