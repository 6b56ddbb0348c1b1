//! Table b-tree traversal: full scans in ascending row-id order, row-id point
//! lookups, and leaf-cell counting.

use crate::btree::{self, BTreeKind};
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::pager::{PageId, PageRef, Pager};
use crate::record::{self, RowView, ValueRef};

const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Visit every row of a table b-tree in ascending row-id order.
pub fn scan_table<F>(pager: &Pager, root: PageId, mut f: F) -> Result<()>
where
    F: FnMut(i64, RowView<'_>) -> Result<()>,
{
    scan_table_until::<_, ()>(pager, root, |rowid, row| {
        f(rowid, row)?;
        Ok(None)
    })
    .map(|_| ())
}

/// Like [`scan_table`], but stops early when the callback returns `Some`.
fn scan_table_until<F, T>(pager: &Pager, root: PageId, mut f: F) -> Result<Option<T>>
where
    F: FnMut(i64, RowView<'_>) -> Result<Option<T>>,
{
    let mut values = Vec::new();
    scan_table_cells_until(pager, root, |rowid, payload| {
        record::decode_record_into(payload, &mut values)?;
        f(rowid, RowView::new(&values))
    })
}

/// Visit every leaf cell as `(row_id, payload)` in ascending row-id order,
/// stopping early when the callback returns `Some`.
pub fn scan_table_cells_until<'p, F, T>(
    pager: &'p Pager,
    root: PageId,
    mut f: F,
) -> Result<Option<T>>
where
    F: FnMut(i64, &'p [u8]) -> Result<Option<T>>,
{
    let mut stack = vec![root];
    let max_pages = pager.page_count().max(1);
    let mut seen_pages = 0u32;

    while let Some(page_id) = stack.pop() {
        seen_pages += 1;
        if seen_pages > max_pages {
            return Err(Error::Corrupted("btree page cycle detected"));
        }

        let page = pager.page(page_id)?;
        let header = btree::parse_header(&page)?;
        let cell_ptrs = btree::cell_ptrs(&page, &header)?;

        match header.kind {
            BTreeKind::TableLeaf => {
                for idx in 0..header.cell_count as usize {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let (rowid, payload) = read_leaf_cell(&page, offset)?;
                    if let Some(value) = f(rowid, payload)? {
                        return Ok(Some(value));
                    }
                }
            }
            BTreeKind::TableInterior => {
                let right_most = header
                    .right_most_child
                    .ok_or(Error::Corrupted("missing right-most child pointer"))?;
                stack.push(child_page_id(right_most)?);

                // Pushed in reverse so children pop in ascending key order.
                for idx in (0..header.cell_count as usize).rev() {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let (child, _key) = read_interior_cell(&page, offset)?;
                    stack.push(child);
                }
            }
            BTreeKind::IndexLeaf | BTreeKind::IndexInterior => {
                return Err(Error::Corrupted("index page in table b-tree"));
            }
        }
    }

    Ok(None)
}

/// Count the rows of a table b-tree without decoding any cell.
pub fn count_rows(pager: &Pager, root: PageId) -> Result<u64> {
    let mut stack = vec![root];
    let max_pages = pager.page_count().max(1);
    let mut seen_pages = 0u32;
    let mut count = 0u64;

    while let Some(page_id) = stack.pop() {
        seen_pages += 1;
        if seen_pages > max_pages {
            return Err(Error::Corrupted("btree page cycle detected"));
        }

        let page = pager.page(page_id)?;
        let header = btree::parse_header(&page)?;

        match header.kind {
            BTreeKind::TableLeaf => count += u64::from(header.cell_count),
            BTreeKind::TableInterior => {
                let right_most = header
                    .right_most_child
                    .ok_or(Error::Corrupted("missing right-most child pointer"))?;
                stack.push(child_page_id(right_most)?);

                let cell_ptrs = btree::cell_ptrs(&page, &header)?;
                for idx in 0..header.cell_count as usize {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let (child, _key) = read_interior_cell(&page, offset)?;
                    stack.push(child);
                }
            }
            BTreeKind::IndexLeaf | BTreeKind::IndexInterior => {
                return Err(Error::Corrupted("index page in table b-tree"));
            }
        }
    }

    Ok(count)
}

/// Point lookup: the leaf-cell payload for `target`, or `None` if the table
/// has no such row-id.
pub fn find_cell_payload<'p>(
    pager: &'p Pager,
    root: PageId,
    target: i64,
) -> Result<Option<&'p [u8]>> {
    let mut page_id = root;
    let max_pages = pager.page_count().max(1);
    let mut seen_pages = 0u32;

    loop {
        seen_pages += 1;
        if seen_pages > max_pages {
            return Err(Error::Corrupted("btree page cycle detected"));
        }

        let page = pager.page(page_id)?;
        let header = btree::parse_header(&page)?;
        let cell_ptrs = btree::cell_ptrs(&page, &header)?;

        match header.kind {
            BTreeKind::TableLeaf => {
                for idx in 0..header.cell_count as usize {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let (rowid, payload) = read_leaf_cell(&page, offset)?;
                    if rowid == target {
                        return Ok(Some(payload));
                    }
                    if rowid > target {
                        return Ok(None);
                    }
                }
                return Ok(None);
            }
            BTreeKind::TableInterior => {
                let cell_count = header.cell_count as usize;
                page_id = match lower_bound_child(&page, cell_ptrs, cell_count, target)? {
                    Some(child) => child,
                    None => {
                        let right_most = header
                            .right_most_child
                            .ok_or(Error::Corrupted("missing right-most child pointer"))?;
                        child_page_id(right_most)?
                    }
                };
            }
            BTreeKind::IndexLeaf | BTreeKind::IndexInterior => {
                return Err(Error::Corrupted("index page in table b-tree"));
            }
        }
    }
}

/// Like [`find_cell_payload`], but decodes the record.
pub fn find_row<F, T>(pager: &Pager, root: PageId, target: i64, f: F) -> Result<Option<T>>
where
    F: FnOnce(RowView<'_>) -> Result<T>,
{
    let Some(payload) = find_cell_payload(pager, root, target)? else {
        return Ok(None);
    };
    let mut values = Vec::new();
    record::decode_record_into(payload, &mut values)?;
    f(RowView::new(&values)).map(Some)
}

/// Left child of the first interior cell whose key is >= `target`, or `None`
/// when every key is smaller (the right-most child covers the rest).
fn lower_bound_child(
    page: &PageRef<'_>,
    cell_ptrs: &[u8],
    cell_count: usize,
    target: i64,
) -> Result<Option<PageId>> {
    let mut lo = 0usize;
    let mut hi = cell_count;
    let mut candidate = None;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = btree::cell_ptr_at(cell_ptrs, mid)?;
        let (child, key) = read_interior_cell(page, offset)?;
        if key >= target {
            hi = mid;
            candidate = Some(child);
        } else {
            lo = mid + 1;
        }
    }

    Ok(candidate)
}

fn read_leaf_cell<'p>(page: &PageRef<'p>, offset: u16) -> Result<(i64, &'p [u8])> {
    let usable = page.usable_bytes();
    if offset as usize >= usable.len() {
        return Err(Error::Corrupted("cell offset out of bounds"));
    }

    let mut decoder = Decoder::new(usable).split_at(offset as usize);
    let before = decoder.remaining();
    let payload_length = read_varint_checked(&mut decoder, "cell payload length truncated")?;
    let rowid = read_varint_checked(&mut decoder, "cell rowid truncated")? as i64;
    let header_len = before - decoder.remaining();

    let payload_length =
        usize::try_from(payload_length).map_err(|_| Error::Corrupted("payload is too large"))?;
    if payload_length > MAX_PAYLOAD_BYTES {
        return Err(Error::PayloadTooLarge(payload_length));
    }
    if payload_length > table_max_local_payload(page.usable_size())? {
        return Err(Error::OverflowNotSupported);
    }

    let start = offset as usize + header_len;
    let end = start
        .checked_add(payload_length)
        .ok_or(Error::Corrupted("payload length overflow"))?;
    if end > usable.len() {
        return Err(Error::Corrupted("payload extends past page boundary"));
    }

    Ok((rowid, &usable[start..end]))
}

fn read_interior_cell(page: &PageRef<'_>, offset: u16) -> Result<(PageId, i64)> {
    let usable = page.usable_bytes();
    if offset as usize >= usable.len() {
        return Err(Error::Corrupted("cell offset out of bounds"));
    }

    let mut decoder = Decoder::new(usable).split_at(offset as usize);
    let child = decoder.try_read_u32().ok_or(Error::Corrupted("cell child pointer truncated"))?;
    let key = read_varint_checked(&mut decoder, "cell key truncated")? as i64;
    Ok((child_page_id(child)?, key))
}

/// Largest table-leaf payload stored fully in-page; anything larger spills
/// onto an overflow chain.
fn table_max_local_payload(usable_size: usize) -> Result<usize> {
    usable_size.checked_sub(35).ok_or(Error::Corrupted("usable size underflow"))
}

pub(crate) fn child_page_id(id: u32) -> Result<PageId> {
    PageId::try_new(id).ok_or(Error::Corrupted("child page id is zero"))
}

pub(crate) fn read_varint_checked(decoder: &mut Decoder<'_>, msg: &'static str) -> Result<u64> {
    decoder.try_read_varint().ok_or(Error::Corrupted(msg))
}

/// Full scan decoding only the columns in `needed` (ascending, no
/// duplicates); `row.get(i)` yields the value of column `needed[i]`.
pub(crate) fn scan_table_project_until<'p, F, T>(
    pager: &'p Pager,
    root: PageId,
    needed: &[u16],
    mut f: F,
) -> Result<Option<T>>
where
    F: FnMut(i64, RowView<'_>) -> Result<Option<T>>,
{
    let mut values: Vec<ValueRef<'p>> = Vec::new();
    scan_table_cells_until(pager, root, |rowid, payload| {
        record::decode_record_project_into(payload, needed, &mut values)?;
        f(rowid, RowView::new(&values))
    })
}
