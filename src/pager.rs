use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::num::NonZero;

use memmap2::Mmap;

type Result<T> = std::result::Result<T, Error>;

const MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Fields parsed out of the 100-byte database header on page 1.
#[derive(Debug, Clone)]
pub struct DbHeader {
    pub page_size: usize,
    pub reserved: u8,
    pub usable_size: usize,
}

impl DbHeader {
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < 100 {
            return Err(Error::FileTooSmall);
        }

        if &header[..16] != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let page_size_raw = u16::from_be_bytes([header[16], header[17]]);
        let page_size = match page_size_raw {
            1 => 65536usize,
            size => size as usize,
        };

        if !is_valid_page_size(page_size) {
            return Err(Error::UnsupportedPageSize(page_size_raw));
        }

        let reserved = header[20];
        let usable_size = page_size
            .checked_sub(reserved as usize)
            .filter(|usable| *usable >= 480)
            .ok_or(Error::UnsupportedReservedSpace(reserved))?;

        Ok(DbHeader { page_size, reserved, usable_size })
    }
}

/// Read-only page access over a memory-mapped database file.
pub struct Pager {
    header: DbHeader,
    mmap: Mmap,
    page_count: u32,
    reads: Cell<u64>,
}

impl fmt::Debug for Pager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("header", &self.header)
            .field("page_count", &self.page_count)
            .field("reads", &self.reads)
            .finish()
    }
}

impl Pager {
    pub fn new(file: File) -> Result<Self> {
        let mmap = unsafe { Mmap::map(&file) }.map_err(Error::Io)?;
        if mmap.len() < 100 {
            return Err(Error::FileTooSmall);
        }

        let header = DbHeader::parse(&mmap[..100])?;

        let file_len = mmap.len();
        if file_len < header.page_size {
            return Err(Error::FileTooSmall);
        }

        if file_len % header.page_size != 0 {
            return Err(Error::TruncatedFile);
        }

        let page_count =
            (file_len / header.page_size).try_into().map_err(|_| Error::TooManyPages)?;

        Ok(Pager { header, mmap, page_count, reads: Cell::new(0) })
    }

    #[inline]
    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of pages handed out since the pager was created.
    pub fn pages_read(&self) -> u64 {
        self.reads.get()
    }

    pub fn page_bytes(&self, page_id: PageId) -> Result<&[u8]> {
        let index = (page_id.into_inner() - 1) as usize;
        if index >= self.page_count as usize {
            return Err(Error::PageOutOfRange);
        }

        self.reads.set(self.reads.get() + 1);

        let start = index * self.header.page_size;
        Ok(&self.mmap[start..start + self.header.page_size])
    }

    pub fn page(&self, page_id: PageId) -> Result<PageRef<'_>> {
        let bytes = self.page_bytes(page_id)?;
        Ok(PageRef { bytes, page_id, header: &self.header })
    }
}

pub struct PageRef<'a> {
    bytes: &'a [u8],
    page_id: PageId,
    header: &'a DbHeader,
}

impl<'a> PageRef<'a> {
    /// Byte offset of the b-tree header: 100 on page 1, 0 elsewhere.
    pub fn offset(&self) -> usize {
        if self.page_id.into_inner() == 1 { 100 } else { 0 }
    }

    pub fn usable_size(&self) -> usize {
        self.header.usable_size
    }

    pub fn usable_bytes(&self) -> &'a [u8] {
        let end = self.header.usable_size.min(self.bytes.len());
        &self.bytes[..end]
    }
}

/// 1-based page number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageId(NonZero<u32>);

impl PageId {
    /// Page 1, which holds the database header and the schema table root.
    pub const ROOT: PageId = PageId(NonZero::new(1).unwrap());

    pub fn new(id: u32) -> Self {
        Self(NonZero::new(id).expect("page id must be non-zero"))
    }

    pub fn try_new(id: u32) -> Option<Self> {
        NonZero::new(id).map(Self)
    }

    pub fn into_inner(self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    FileTooSmall,
    InvalidMagic,
    UnsupportedPageSize(u16),
    UnsupportedReservedSpace(u8),
    TruncatedFile,
    TooManyPages,
    PageOutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::FileTooSmall => f.write_str("Database file is too small"),
            Self::InvalidMagic => f.write_str("Invalid database header magic"),
            Self::UnsupportedPageSize(size) => {
                write!(f, "Unsupported page size: {size}")
            }
            Self::UnsupportedReservedSpace(reserved) => {
                write!(f, "Unsupported reserved space: {reserved}")
            }
            Self::TruncatedFile => f.write_str("Database file is truncated"),
            Self::TooManyPages => f.write_str("Database contains more pages than supported"),
            Self::PageOutOfRange => f.write_str("Requested page is out of range"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

fn is_valid_page_size(page_size: usize) -> bool {
    match page_size {
        512..=32768 => page_size.is_power_of_two(),
        65536 => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{DbHeader, MAGIC};

    fn header_bytes(page_size: u16, reserved: u8) -> [u8; 100] {
        let mut bytes = [0u8; 100];
        bytes[..16].copy_from_slice(MAGIC);
        bytes[16..18].copy_from_slice(&page_size.to_be_bytes());
        bytes[20] = reserved;
        bytes
    }

    #[test]
    fn parses_page_size() {
        let header = DbHeader::parse(&header_bytes(4096, 0)).expect("valid header");
        assert_eq!(header.page_size, 4096);
        assert_eq!(header.usable_size, 4096);
    }

    #[test]
    fn page_size_one_means_64k() {
        let header = DbHeader::parse(&header_bytes(1, 0)).expect("valid header");
        assert_eq!(header.page_size, 65536);
    }

    #[test]
    fn reserved_bytes_shrink_usable_size() {
        let header = DbHeader::parse(&header_bytes(4096, 32)).expect("valid header");
        assert_eq!(header.usable_size, 4064);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes(4096, 0);
        bytes[0] = b'X';
        assert!(matches!(DbHeader::parse(&bytes), Err(super::Error::InvalidMagic)));
    }

    #[test]
    fn rejects_non_power_of_two_page_size() {
        let bytes = header_bytes(1000, 0);
        assert!(matches!(DbHeader::parse(&bytes), Err(super::Error::UnsupportedPageSize(1000))));
    }

    #[test]
    fn rejects_short_header() {
        assert!(matches!(DbHeader::parse(&[0u8; 50]), Err(super::Error::FileTooSmall)));
    }
}
