//! Btree cells hold records: a type-code header followed by the column
//! values it describes.

use crate::dbheader::TextEncoding;
use crate::error::Error;
use crate::serial_type;
use crate::sql_value::SqlValue;
use crate::varint;

/// One decoded record.  Cells own their records; records own their
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<SqlValue>,
}

impl Record {
    /// Parses a record payload.
    ///
    /// "A record contains a header and a body, in that order.  The header
    /// begins with a single varint which determines the total number of
    /// bytes in the header"
    /// - https://www.sqlite.org/fileformat.html#record_format
    pub fn parse(payload: &[u8], encoding: TextEncoding) -> Result<Record, Error> {
        let (hdr_len, hdr_len_len) = varint::read_varint(payload)?;
        let hdr_len = hdr_len as usize;
        if hdr_len > payload.len() || hdr_len < hdr_len_len {
            return Err(Error::TruncatedRecord);
        }

        // The rest of the header is one serial type code per column.
        let mut serial_types = Vec::new();
        let mut hdr_offset = hdr_len_len;
        while hdr_offset < hdr_len {
            let (serial_type, bytes_read) = varint::read_varint(&payload[hdr_offset..hdr_len])?;
            hdr_offset += bytes_read;
            serial_types.push(serial_type);
        }

        // The body holds the column values back to back, at the widths
        // the type codes imply.
        let mut values = Vec::with_capacity(serial_types.len());
        let mut body_offset = hdr_len;
        for serial_type in serial_types {
            let len = serial_type::content_size(serial_type)?;
            let data = payload
                .get(body_offset..body_offset + len)
                .ok_or(Error::TruncatedRecord)?;
            values.push(serial_type::to_sql_value(serial_type, data, encoding)?);
            body_offset += len;
        }
        Ok(Record { values })
    }
}

#[cfg(test)]
const UTF8: TextEncoding = TextEncoding::Utf8;

#[test]
fn test_record_literal_one() {
    // 2 byte record header, record type is literal 1, record body has zero bytes.
    let test_record: &[u8] = &[0x02, 0x09];
    let r = Record::parse(test_record, UTF8).unwrap();
    assert_eq!(r.values, vec![SqlValue::Int(1)]);
}

#[test]
fn test_record_five_one_byte_ints() {
    // 06 0101 0101 010a 0b0c 0d0e
    let test_record: &[u8] = &[0x06, 0x01, 0x01, 0x01, 0x01, 0x01, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e];
    let r = Record::parse(test_record, UTF8).unwrap();
    assert_eq!(
        r.values,
        (10..=14).map(SqlValue::Int).collect::<Vec<SqlValue>>()
    );
}

#[test]
fn test_record_various_types() {
    // literal 0 | literal 1 | float 3.1415 | "Ten" | NULL
    let test_record: &[u8] = &[
        0x06, 0x08, 0x09, 0x07, 0x13, 0x00, 0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f, 0x54,
        0x65, 0x6e,
    ];
    let r = Record::parse(test_record, UTF8).unwrap();
    assert_eq!(
        r.values,
        vec![
            SqlValue::Int(0),
            SqlValue::Int(1),
            SqlValue::Real(3.1415),
            SqlValue::Text("Ten".to_string()),
            SqlValue::Null,
        ]
    );
}

#[test]
fn test_record_header_longer_than_payload() {
    // Header claims 3 bytes but the payload ends after 2.
    assert!(matches!(
        Record::parse(&[0x03, 0x01], UTF8),
        Err(Error::TruncatedRecord)
    ));
}

#[test]
fn test_record_body_shorter_than_declared() {
    // One i16 column declared, one body byte present.
    assert!(matches!(
        Record::parse(&[0x02, 0x02, 0x0a], UTF8),
        Err(Error::TruncatedRecord)
    ));
}

#[test]
fn test_record_reserved_type_code() {
    assert!(matches!(
        Record::parse(&[0x02, 0x0a], UTF8),
        Err(Error::UnknownTypeCode(10))
    ));
}

#[test]
fn test_record_empty() {
    // A header of just its own length varint describes zero columns.
    let r = Record::parse(&[0x01], UTF8).unwrap();
    assert!(r.values.is_empty());
}
