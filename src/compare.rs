use core::cmp::Ordering;

use crate::record::ValueRef;

/// Total order over values: NULL, then numerics, then text, then blobs.
/// Text and blobs compare byte-wise; no collation is applied.
#[inline]
pub(crate) fn compare_value_refs(left: ValueRef<'_>, right: ValueRef<'_>) -> Ordering {
    let rank = |value: ValueRef<'_>| match value {
        ValueRef::Null => 0u8,
        ValueRef::Integer(_) | ValueRef::Real(_) => 1u8,
        ValueRef::Text(_) => 2u8,
        ValueRef::Blob(_) => 3u8,
    };

    let left_rank = rank(left);
    let right_rank = rank(right);
    if left_rank != right_rank {
        return left_rank.cmp(&right_rank);
    }

    match (left, right) {
        (ValueRef::Null, ValueRef::Null) => Ordering::Equal,
        (ValueRef::Integer(l), ValueRef::Integer(r)) => l.cmp(&r),
        (ValueRef::Integer(l), ValueRef::Real(r)) => cmp_f64_total(l as f64, r),
        (ValueRef::Real(l), ValueRef::Integer(r)) => cmp_f64_total(l, r as f64),
        (ValueRef::Real(l), ValueRef::Real(r)) => cmp_f64_total(l, r),
        (ValueRef::Text(l), ValueRef::Text(r)) => l.cmp(r),
        (ValueRef::Blob(l), ValueRef::Blob(r)) => l.cmp(r),
        _ => Ordering::Equal,
    }
}

#[inline]
fn cmp_f64_total(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}
