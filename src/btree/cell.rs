//! cell decodes the four btree cell variants.  The format of a cell
//! depends on which kind of btree page it appears on.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use super::RowId;
use crate::dbheader::TextEncoding;
use crate::error::{read_error, Error};
use crate::pager::PageNum;
use crate::record::Record;
use crate::varint;

// Cell formats from https://www.sqlite.org/fileformat.html#b_tree_pages
//
// Table B-Tree Leaf Cell (header 0x0d):
// A varint which is the total number of bytes of payload
// A varint which is the integer key, a.k.a. "rowid"
// The payload
//
// Table B-Tree Interior Cell (header 0x05):
// A 4-byte big-endian page number which is the left child pointer.
// A varint which is the integer key
//
// Index B-Tree Leaf Cell (header 0x0a):
// A varint which is the total number of bytes of key payload
// The payload
//
// Index B-Tree Interior Cell (header 0x02):
// A 4-byte big-endian page number which is the left child pointer.
// A varint which is the total number of bytes of key payload
// The payload
//
// The trailing overflow page number never appears here: payloads are
// required to fit inside their cell.

#[derive(Debug, Clone)]
pub struct TableLeafCell {
    pub row_id: RowId,
    pub payload_size: u64,
    pub record: Record,
}

#[derive(Debug, Clone)]
pub struct TableInteriorCell {
    pub child_page: PageNum,
    pub key: RowId,
}

#[derive(Debug, Clone)]
pub struct IndexLeafCell {
    pub payload_size: u64,
    pub record: Record,
}

#[derive(Debug, Clone)]
pub struct IndexInteriorCell {
    pub child_page: PageNum,
    pub payload_size: u64,
    pub record: Record,
}

fn payload<'a>(buf: &'a [u8], start: usize, size: u64) -> Result<&'a [u8], Error> {
    let end = start.checked_add(size as usize).ok_or(Error::ShortRead)?;
    buf.get(start..end).ok_or(Error::ShortRead)
}

impl TableLeafCell {
    pub fn parse(buf: &[u8], encoding: TextEncoding) -> Result<TableLeafCell, Error> {
        let (payload_size, n) = varint::read_varint(buf)?;
        let (row_id, m) = varint::read_varint(&buf[n..])?;
        let record = Record::parse(payload(buf, n + m, payload_size)?, encoding)?;
        Ok(TableLeafCell {
            row_id,
            payload_size,
            record,
        })
    }
}

impl TableInteriorCell {
    pub fn parse(buf: &[u8]) -> Result<TableInteriorCell, Error> {
        let mut c = Cursor::new(buf);
        let child_page = c.read_u32::<BigEndian>().map_err(read_error)? as PageNum;
        let (key, _) = varint::read_varint(&buf[4..])?;
        Ok(TableInteriorCell { child_page, key })
    }
}

impl IndexLeafCell {
    pub fn parse(buf: &[u8], encoding: TextEncoding) -> Result<IndexLeafCell, Error> {
        let (payload_size, n) = varint::read_varint(buf)?;
        let record = Record::parse(payload(buf, n, payload_size)?, encoding)?;
        Ok(IndexLeafCell {
            payload_size,
            record,
        })
    }
}

impl IndexInteriorCell {
    pub fn parse(buf: &[u8], encoding: TextEncoding) -> Result<IndexInteriorCell, Error> {
        let mut c = Cursor::new(buf);
        let child_page = c.read_u32::<BigEndian>().map_err(read_error)? as PageNum;
        let (payload_size, n) = varint::read_varint(&buf[4..])?;
        let record = Record::parse(payload(buf, 4 + n, payload_size)?, encoding)?;
        Ok(IndexInteriorCell {
            child_page,
            payload_size,
            record,
        })
    }
}

#[cfg(test)]
use crate::sql_value::SqlValue;

#[cfg(test)]
const UTF8: TextEncoding = TextEncoding::Utf8;

#[test]
fn test_table_leaf_cell() {
    use hex::FromHex;
    // payload size 3, rowid 1, record: one text column "A".
    let cell = Vec::from_hex("0301020f41").unwrap();
    let c = TableLeafCell::parse(&cell, UTF8).unwrap();
    assert_eq!(c.row_id, 1);
    assert_eq!(c.payload_size, 3);
    assert_eq!(c.record.values, vec![SqlValue::Text("A".to_string())]);
}

#[test]
fn test_table_leaf_cell_truncated_payload() {
    use hex::FromHex;
    // Payload size claims 9 bytes; only 3 present.
    let cell = Vec::from_hex("0901020f41").unwrap();
    assert!(matches!(
        TableLeafCell::parse(&cell, UTF8),
        Err(Error::ShortRead)
    ));
}

#[test]
fn test_table_interior_cell() {
    use hex::FromHex;
    // child page 2, key 450 (varint 83 42).
    let cell = Vec::from_hex("000000028342").unwrap();
    let c = TableInteriorCell::parse(&cell).unwrap();
    assert_eq!(c.child_page, 2);
    assert_eq!(c.key, 450);
}

#[test]
fn test_table_interior_cell_short() {
    assert!(matches!(
        TableInteriorCell::parse(&[0x00, 0x00, 0x01]),
        Err(Error::ShortRead)
    ));
}

#[test]
fn test_index_leaf_cell() {
    use hex::FromHex;
    // payload size 6, record: text "AB" + rowid 7.
    let cell = Vec::from_hex("06031101414207").unwrap();
    let c = IndexLeafCell::parse(&cell, UTF8).unwrap();
    assert_eq!(c.payload_size, 6);
    assert_eq!(
        c.record.values,
        vec![SqlValue::Text("AB".to_string()), SqlValue::Int(7)]
    );
}

#[test]
fn test_index_interior_cell() {
    use hex::FromHex;
    // child page 9, then the same payload as the leaf case.
    let cell = Vec::from_hex("0000000906031101414207").unwrap();
    let c = IndexInteriorCell::parse(&cell, UTF8).unwrap();
    assert_eq!(c.child_page, 9);
    assert_eq!(
        c.record.values,
        vec![SqlValue::Text("AB".to_string()), SqlValue::Int(7)]
    );
}
