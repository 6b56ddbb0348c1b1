use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::pager::PageRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BTreeKind {
    TableLeaf,
    TableInterior,
    IndexLeaf,
    IndexInterior,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BTreeHeader {
    pub(crate) kind: BTreeKind,
    pub(crate) cell_count: u16,
    pub(crate) cell_ptrs_start: usize,
    pub(crate) right_most_child: Option<u32>,
}

/// Parse the 8 or 12 byte b-tree header at the page's header offset.
pub(crate) fn parse_header(page: &PageRef<'_>) -> Result<BTreeHeader> {
    if page.offset() >= page.usable_size() {
        return Err(Error::Corrupted("page header offset out of bounds"));
    }

    let mut decoder = Decoder::new(page.usable_bytes()).split_at(page.offset());
    let page_type = read_u8_checked(&mut decoder, "page header truncated")?;
    let _first_freeblock = read_u16_checked(&mut decoder, "page header truncated")?;
    let cell_count = read_u16_checked(&mut decoder, "page header truncated")?;
    let _start_of_cell_content = read_u16_checked(&mut decoder, "page header truncated")?;
    let _fragmented_free_bytes = read_u8_checked(&mut decoder, "page header truncated")?;

    let kind = match page_type {
        0x0D => BTreeKind::TableLeaf,
        0x05 => BTreeKind::TableInterior,
        0x0A => BTreeKind::IndexLeaf,
        0x02 => BTreeKind::IndexInterior,
        other => return Err(Error::UnsupportedPageType(other)),
    };

    let right_most_child = match kind {
        BTreeKind::TableInterior | BTreeKind::IndexInterior => {
            Some(read_u32_checked(&mut decoder, "page header truncated")?)
        }
        BTreeKind::TableLeaf | BTreeKind::IndexLeaf => None,
    };

    let header_size = match kind {
        BTreeKind::TableLeaf | BTreeKind::IndexLeaf => 8,
        BTreeKind::TableInterior | BTreeKind::IndexInterior => 12,
    };

    let cell_ptrs_start = page.offset() + header_size;
    Ok(BTreeHeader { kind, cell_count, cell_ptrs_start, right_most_child })
}

/// The cell-pointer array: `cell_count` big-endian u16 offsets.
pub(crate) fn cell_ptrs<'a>(page: &PageRef<'a>, header: &BTreeHeader) -> Result<&'a [u8]> {
    let cell_ptrs_len = header.cell_count as usize * 2;
    let cell_ptrs_end = header.cell_ptrs_start + cell_ptrs_len;
    let bytes = page.usable_bytes();
    if cell_ptrs_end > bytes.len() {
        return Err(Error::Corrupted("cell pointer array out of bounds"));
    }
    Ok(&bytes[header.cell_ptrs_start..cell_ptrs_end])
}

#[inline]
pub(crate) fn cell_ptr_at(cell_ptrs: &[u8], idx: usize) -> Result<u16> {
    let offset = idx * 2;
    if offset + 1 >= cell_ptrs.len() {
        return Err(Error::Corrupted("cell pointer index out of bounds"));
    }
    Ok(u16::from_be_bytes([cell_ptrs[offset], cell_ptrs[offset + 1]]))
}

fn read_u8_checked(decoder: &mut Decoder<'_>, msg: &'static str) -> Result<u8> {
    decoder.try_read_u8().ok_or(Error::Corrupted(msg))
}

fn read_u16_checked(decoder: &mut Decoder<'_>, msg: &'static str) -> Result<u16> {
    decoder.try_read_u16().ok_or(Error::Corrupted(msg))
}

fn read_u32_checked(decoder: &mut Decoder<'_>, msg: &'static str) -> Result<u32> {
    decoder.try_read_u32().ok_or(Error::Corrupted(msg))
}
