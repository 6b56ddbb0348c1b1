use std::fmt;

use crate::pager;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// File access or database header fault.
    Pager(pager::Error),
    /// A b-tree page carried an unknown or out-of-place page-type byte.
    UnsupportedPageType(u8),
    /// A record header carried a reserved serial type (10 or 11).
    UnsupportedSerialType(u64),
    /// Structural invariant violated while walking pages or records.
    Corrupted(&'static str),
    PayloadTooLarge(usize),
    /// The payload spills onto an overflow chain, which this engine does not
    /// follow.
    OverflowNotSupported,
    /// The statement did not parse at all.
    SqlParse(String),
    /// The statement parsed but is outside the supported subset.
    SqlUnsupported(String),
    TableNotFound(String),
    ColumnNotFound(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pager(err) => write!(f, "{err}"),
            Self::UnsupportedPageType(kind) => write!(f, "Unsupported page type: 0x{kind:02X}"),
            Self::UnsupportedSerialType(serial) => {
                write!(f, "Unsupported record serial type: {serial}")
            }
            Self::Corrupted(msg) => write!(f, "Corrupted database page: {msg}"),
            Self::PayloadTooLarge(size) => write!(f, "Payload too large: {size} bytes"),
            Self::OverflowNotSupported => {
                f.write_str("Payload uses an overflow chain, which is not supported")
            }
            Self::SqlParse(sql) => write!(f, "Failed to parse SQL: {sql}"),
            Self::SqlUnsupported(sql) => write!(f, "Unsupported SQL: {sql}"),
            Self::TableNotFound(name) => write!(f, "Table '{name}' not found"),
            Self::ColumnNotFound(name) => write!(f, "Column '{name}' not found"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pager(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<pager::Error> for Error {
    fn from(err: pager::Error) -> Self {
        Self::Pager(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
