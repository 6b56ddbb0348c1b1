//! Record (cell payload) decoding.
//!
//! A record is a varint `header_size`, a sequence of varint serial types, and
//! the column data in the same order. Serial types map to NULL, signed
//! big-endian integers of 1/2/3/4/6/8 bytes, an 8-byte IEEE-754 float, the
//! literals 0 and 1, and length-prefixed BLOB/TEXT payloads.

use std::{fmt, str};

use crate::decoder::Decoder;
use crate::error::{Error, Result};

/// A column value borrowing the page it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'row> {
    Null,
    Integer(i64),
    Real(f64),
    Text(&'row [u8]),
    Blob(&'row [u8]),
}

impl<'row> ValueRef<'row> {
    pub fn as_text(&self) -> Option<&'row str> {
        match self {
            Self::Text(bytes) => str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(bytes) | Self::Blob(bytes) => {
                match str::from_utf8(bytes) {
                    Ok(text) => f.write_str(text),
                    Err(_) => f.write_str(&String::from_utf8_lossy(bytes)),
                }
            }
        }
    }
}

/// Borrowed view of one decoded row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'row> {
    values: &'row [ValueRef<'row>],
}

impl<'row> RowView<'row> {
    pub(crate) fn new(values: &'row [ValueRef<'row>]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<ValueRef<'row>> {
        self.values.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueRef<'row>> + '_ {
        self.values.iter().copied()
    }
}

struct RecordHeader<'row> {
    serials: Decoder<'row>,
    data: Decoder<'row>,
}

fn split_record(payload: &[u8]) -> Result<RecordHeader<'_>> {
    let mut decoder = Decoder::new(payload);
    let before = decoder.remaining();
    let header_len =
        decoder.try_read_varint().ok_or(Error::Corrupted("record header truncated"))? as usize;
    let header_len_len = before - decoder.remaining();

    if header_len < header_len_len || header_len > payload.len() {
        return Err(Error::Corrupted("invalid record header length"));
    }

    Ok(RecordHeader {
        serials: Decoder::new(&payload[header_len_len..header_len]),
        data: Decoder::new(&payload[header_len..]),
    })
}

/// Decode every column of a record into `out`.
pub fn decode_record_into<'row>(
    payload: &'row [u8],
    out: &mut Vec<ValueRef<'row>>,
) -> Result<()> {
    out.clear();
    let mut record = split_record(payload)?;
    while record.serials.remaining() > 0 {
        let serial =
            record.serials.try_read_varint().ok_or(Error::Corrupted("record header truncated"))?;
        out.push(decode_value_ref(serial, &mut record.data)?);
    }
    Ok(())
}

/// Decode only the columns listed in `needed` (ascending, no duplicates),
/// skipping the rest. `out[i]` holds the value of column `needed[i]`; a
/// requested column beyond the record's width decodes as NULL. Returns the
/// record's column count.
pub fn decode_record_project_into<'row>(
    payload: &'row [u8],
    needed: &[u16],
    out: &mut Vec<ValueRef<'row>>,
) -> Result<usize> {
    out.clear();
    let mut record = split_record(payload)?;

    let mut needed_iter = needed.iter().copied();
    let mut next_needed = needed_iter.next();
    let mut column_count = 0usize;
    while record.serials.remaining() > 0 {
        let serial =
            record.serials.try_read_varint().ok_or(Error::Corrupted("record header truncated"))?;
        let col_idx = column_count as u16;
        if Some(col_idx) == next_needed {
            out.push(decode_value_ref(serial, &mut record.data)?);
            next_needed = needed_iter.next();
        } else {
            skip_value(serial, &mut record.data)?;
        }
        column_count += 1;
    }

    // Columns the schema declares but this record predates.
    while next_needed.is_some() {
        out.push(ValueRef::Null);
        next_needed = needed_iter.next();
    }

    Ok(column_count)
}

fn decode_value_ref<'row>(serial_type: u64, decoder: &mut Decoder<'row>) -> Result<ValueRef<'row>> {
    let value = match serial_type {
        0 => ValueRef::Null,
        1 => ValueRef::Integer(read_signed_be(decoder, 1)?),
        2 => ValueRef::Integer(read_signed_be(decoder, 2)?),
        3 => ValueRef::Integer(read_signed_be(decoder, 3)?),
        4 => ValueRef::Integer(read_signed_be(decoder, 4)?),
        5 => ValueRef::Integer(read_signed_be(decoder, 6)?),
        6 => ValueRef::Integer(read_signed_be(decoder, 8)?),
        7 => ValueRef::Real(f64::from_bits(read_u64_be(decoder)?)),
        8 => ValueRef::Integer(0),
        9 => ValueRef::Integer(1),
        serial if serial >= 12 && serial % 2 == 0 => {
            let len = ((serial - 12) / 2) as usize;
            ValueRef::Blob(read_exact_bytes(decoder, len)?)
        }
        serial if serial >= 13 => {
            let len = ((serial - 13) / 2) as usize;
            ValueRef::Text(read_exact_bytes(decoder, len)?)
        }
        other => return Err(Error::UnsupportedSerialType(other)),
    };

    Ok(value)
}

fn skip_value(serial_type: u64, decoder: &mut Decoder<'_>) -> Result<()> {
    let len = serial_type_len(serial_type)?;
    if len > 0 {
        let _ = read_exact_bytes(decoder, len)?;
    }
    Ok(())
}

fn serial_type_len(serial_type: u64) -> Result<usize> {
    match serial_type {
        0 | 8 | 9 => Ok(0),
        1 => Ok(1),
        2 => Ok(2),
        3 => Ok(3),
        4 => Ok(4),
        5 => Ok(6),
        6 | 7 => Ok(8),
        serial if serial >= 12 && serial % 2 == 0 => Ok(((serial - 12) / 2) as usize),
        serial if serial >= 13 => Ok(((serial - 13) / 2) as usize),
        other => Err(Error::UnsupportedSerialType(other)),
    }
}

fn read_signed_be(decoder: &mut Decoder<'_>, bytes: usize) -> Result<i64> {
    debug_assert!(bytes <= 8);

    let mut buf = [0u8; 8];
    buf[8 - bytes..].copy_from_slice(read_exact_bytes(decoder, bytes)?);

    let value = u64::from_be_bytes(buf);
    let shift = (8 - bytes) * 8;
    Ok(((value << shift) as i64) >> shift)
}

fn read_u64_be(decoder: &mut Decoder<'_>) -> Result<u64> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(read_exact_bytes(decoder, 8)?);
    Ok(u64::from_be_bytes(buf))
}

fn read_exact_bytes<'row>(decoder: &mut Decoder<'row>, len: usize) -> Result<&'row [u8]> {
    decoder.try_read_bytes(len).ok_or(Error::Corrupted("record payload shorter than declared"))
}

#[cfg(test)]
mod tests {
    use super::{ValueRef, decode_record_into, decode_record_project_into};
    use crate::error::Error;

    /// `(NULL, -2, 1.5, 'hi', x'0102', 1)` as a raw record payload.
    fn sample_record() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(7); // header: itself plus six serial types
        payload.push(0); // NULL
        payload.push(1); // i8
        payload.push(7); // f64
        payload.push(17); // text, 2 bytes
        payload.push(16); // blob, 2 bytes
        payload.push(9); // literal 1
        payload.push((-2i8) as u8);
        payload.extend_from_slice(&1.5f64.to_be_bytes());
        payload.extend_from_slice(b"hi");
        payload.extend_from_slice(&[0x01, 0x02]);
        payload
    }

    #[test]
    fn decodes_every_serial_type_in_sample() {
        let payload = sample_record();
        let mut values = Vec::new();
        decode_record_into(&payload, &mut values).expect("decode record");
        assert_eq!(
            values,
            vec![
                ValueRef::Null,
                ValueRef::Integer(-2),
                ValueRef::Real(1.5),
                ValueRef::Text(b"hi"),
                ValueRef::Blob(&[0x01, 0x02]),
                ValueRef::Integer(1),
            ]
        );
    }

    #[test]
    fn projection_skips_unrequested_columns() {
        let payload = sample_record();
        let mut values = Vec::new();
        let count =
            decode_record_project_into(&payload, &[1, 3, 5], &mut values).expect("decode record");
        assert_eq!(count, 6);
        assert_eq!(
            values,
            vec![ValueRef::Integer(-2), ValueRef::Text(b"hi"), ValueRef::Integer(1)]
        );
    }

    #[test]
    fn projection_pads_missing_columns_with_null() {
        let payload = sample_record();
        let mut values = Vec::new();
        decode_record_project_into(&payload, &[5, 9], &mut values).expect("decode record");
        assert_eq!(values, vec![ValueRef::Integer(1), ValueRef::Null]);
    }

    #[test]
    fn sign_extension_covers_multi_byte_integers() {
        // header + serial 2 (i16) + serial 3 (i24), both negative.
        let mut payload = vec![3u8, 2, 3];
        payload.extend_from_slice(&(-300i16).to_be_bytes());
        payload.extend_from_slice(&[0xFF, 0xFE, 0x00]);
        let mut values = Vec::new();
        decode_record_into(&payload, &mut values).expect("decode record");
        assert_eq!(values, vec![ValueRef::Integer(-300), ValueRef::Integer(-512)]);
    }

    #[test]
    fn rejects_reserved_serial_types() {
        let payload = vec![2u8, 10];
        let mut values = Vec::new();
        let err = decode_record_into(&payload, &mut values).expect_err("reserved serial");
        assert!(matches!(err, Error::UnsupportedSerialType(10)));
    }

    #[test]
    fn rejects_header_past_payload_end() {
        let payload = vec![9u8, 0];
        let mut values = Vec::new();
        let err = decode_record_into(&payload, &mut values).expect_err("bad header length");
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[test]
    fn rejects_data_shorter_than_declared() {
        // Declares 4-byte text but provides one byte.
        let payload = vec![2u8, 21, b'a'];
        let mut values = Vec::new();
        let err = decode_record_into(&payload, &mut values).expect_err("short data");
        assert!(matches!(err, Error::Corrupted(_)));
    }
}
