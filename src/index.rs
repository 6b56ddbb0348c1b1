//! Index b-tree traversal: collect the row-ids of every entry whose key
//! equals a probe value.
//!
//! Index records hold the indexed column(s) followed by the target row-id.
//! Entries sort by (key, row-id), but equal keys are not assumed to sit in a
//! single subtree: an interior separator equal to the probe requires both
//! descending into its left child and continuing across the remaining cells.

use std::cmp::Ordering;

use crate::btree::{self, BTreeKind};
use crate::compare::compare_value_refs;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::pager::{PageId, PageRef, Pager};
use crate::record::{self, ValueRef};
use crate::table::{child_page_id, read_varint_checked};

const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;
const MAX_TREE_DEPTH: usize = 64;

/// Append to `out` the row-ids of all index entries whose key column equals
/// `probe`, in ascending (key, row-id) tree order.
pub fn scan_index(
    pager: &Pager,
    root: PageId,
    probe: ValueRef<'_>,
    out: &mut Vec<i64>,
) -> Result<()> {
    let mut walk =
        IndexWalk { pager, probe, pages_left: pager.page_count().max(1), values: Vec::new() };
    walk.visit(root, 0, out)
}

struct IndexWalk<'p, 'probe> {
    pager: &'p Pager,
    probe: ValueRef<'probe>,
    pages_left: u32,
    values: Vec<ValueRef<'p>>,
}

impl<'p> IndexWalk<'p, '_> {
    fn visit(&mut self, page_id: PageId, depth: usize, out: &mut Vec<i64>) -> Result<()> {
        if self.pages_left == 0 {
            return Err(Error::Corrupted("btree page cycle detected"));
        }
        self.pages_left -= 1;
        if depth >= MAX_TREE_DEPTH {
            return Err(Error::Corrupted("index tree too deep"));
        }

        let page = self.pager.page(page_id)?;
        let header = btree::parse_header(&page)?;
        let cell_ptrs = btree::cell_ptrs(&page, &header)?;

        match header.kind {
            BTreeKind::IndexLeaf => {
                for idx in 0..header.cell_count as usize {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let payload = read_leaf_cell(&page, offset)?;
                    record::decode_record_into(payload, &mut self.values)?;
                    let key = entry_key(&self.values)?;
                    if compare_value_refs(self.probe, key) == Ordering::Equal {
                        out.push(entry_rowid(&self.values)?);
                    }
                }
                Ok(())
            }
            BTreeKind::IndexInterior => {
                let right_most = header
                    .right_most_child
                    .ok_or(Error::Corrupted("missing right-most child pointer"))?;

                for idx in 0..header.cell_count as usize {
                    let offset = btree::cell_ptr_at(cell_ptrs, idx)?;
                    let (child, payload) = read_interior_cell(&page, offset)?;
                    record::decode_record_into(payload, &mut self.values)?;
                    let cmp = compare_value_refs(self.probe, entry_key(&self.values)?);
                    match cmp {
                        // Everything at or past this cell is larger.
                        Ordering::Less => return self.visit(child, depth + 1, out),
                        Ordering::Equal => {
                            let rowid = entry_rowid(&self.values)?;
                            // Smaller row-ids with this key live to the left.
                            self.visit(child, depth + 1, out)?;
                            out.push(rowid);
                        }
                        Ordering::Greater => {}
                    }
                }

                self.visit(child_page_id(right_most)?, depth + 1, out)
            }
            BTreeKind::TableLeaf | BTreeKind::TableInterior => {
                Err(Error::Corrupted("table page in index b-tree"))
            }
        }
    }
}

fn entry_key<'v>(values: &[ValueRef<'v>]) -> Result<ValueRef<'v>> {
    values.first().copied().ok_or(Error::Corrupted("index record has no columns"))
}

fn entry_rowid(values: &[ValueRef<'_>]) -> Result<i64> {
    match values.last() {
        Some(ValueRef::Integer(rowid)) => Ok(*rowid),
        _ => Err(Error::Corrupted("index record does not end with a rowid")),
    }
}

fn read_leaf_cell<'p>(page: &PageRef<'p>, offset: u16) -> Result<&'p [u8]> {
    read_cell_payload(page, offset as usize)
}

fn read_interior_cell<'p>(page: &PageRef<'p>, offset: u16) -> Result<(PageId, &'p [u8])> {
    let usable = page.usable_bytes();
    let pos = offset as usize;
    if pos + 4 > usable.len() {
        return Err(Error::Corrupted("cell child pointer truncated"));
    }
    let child =
        u32::from_be_bytes([usable[pos], usable[pos + 1], usable[pos + 2], usable[pos + 3]]);
    let payload = read_cell_payload(page, pos + 4)?;
    Ok((child_page_id(child)?, payload))
}

fn read_cell_payload<'p>(page: &PageRef<'p>, pos: usize) -> Result<&'p [u8]> {
    let usable = page.usable_bytes();
    if pos >= usable.len() {
        return Err(Error::Corrupted("cell offset out of bounds"));
    }

    let mut decoder = Decoder::new(usable).split_at(pos);
    let before = decoder.remaining();
    let payload_length = read_varint_checked(&mut decoder, "cell payload length truncated")?;
    let length_len = before - decoder.remaining();

    let payload_length =
        usize::try_from(payload_length).map_err(|_| Error::Corrupted("payload is too large"))?;
    if payload_length > MAX_PAYLOAD_BYTES {
        return Err(Error::PayloadTooLarge(payload_length));
    }
    if payload_length > index_max_local_payload(page.usable_size())? {
        return Err(Error::OverflowNotSupported);
    }

    let start = pos + length_len;
    let end = start
        .checked_add(payload_length)
        .ok_or(Error::Corrupted("payload length overflow"))?;
    if end > usable.len() {
        return Err(Error::Corrupted("payload extends past page boundary"));
    }

    Ok(&usable[start..end])
}

/// Largest index payload stored fully in-page; index pages spill much earlier
/// than table leaves.
fn index_max_local_payload(usable_size: usize) -> Result<usize> {
    let base = usable_size.checked_sub(12).ok_or(Error::Corrupted("usable size underflow"))?;
    (base * 64 / 255).checked_sub(23).ok_or(Error::Corrupted("usable size underflow"))
}
