//! Serial types are how SQLite stores values: each column of a record
//! has a type code in the record header that selects the width and
//! meaning of the column's body bytes.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::dbheader::TextEncoding;
use crate::error::{read_error, Error};
use crate::sql_value::SqlValue;

/// Number of body bytes a serial type code occupies.
///
/// From: https://www.sqlite.org/fileformat.html#record_format
pub fn content_size(serial_type: u64) -> Result<usize, Error> {
    match serial_type {
        // Serial Type	Content Size	Meaning
        // 0	        0	            Value is a NULL.
        0 => Ok(0),
        // 1	        1	            Value is an 8-bit twos-complement integer.
        1 => Ok(1),
        // 2	        2	            Value is a big-endian 16-bit twos-complement integer.
        2 => Ok(2),
        // 3	        3	            Value is a big-endian 24-bit twos-complement integer.
        3 => Ok(3),
        // 4	        4	            Value is a big-endian 32-bit twos-complement integer.
        4 => Ok(4),
        // 5	        6	            Value is a big-endian 48-bit twos-complement integer.
        5 => Ok(6),
        // 6	        8	            Value is a big-endian 64-bit twos-complement integer.
        // 7	        8	            Value is a big-endian IEEE 754-2008 64-bit float.
        6 | 7 => Ok(8),
        // 8, 9	        0	            Value is the integer 0 / the integer 1.
        8 | 9 => Ok(0),
        // 10, 11 are reserved for internal use and never appear in a
        // well-formed database file.
        10 | 11 => Err(Error::UnknownTypeCode(serial_type)),
        // N≥12 & even	(N-12)/2	    Value is a BLOB that is (N-12)/2 bytes long.
        // N≥13 & odd	(N-13)/2	    Value is text in the file encoding.
        x if x % 2 == 0 => Ok((x as usize - 12) / 2),
        x => Ok((x as usize - 13) / 2),
    }
}

/// Decodes one value from `data`, which must hold exactly the bytes that
/// `content_size` reports for this type code.
pub fn to_sql_value(
    serial_type: u64,
    data: &[u8],
    encoding: TextEncoding,
) -> Result<SqlValue, Error> {
    use SqlValue::*;
    let mut c = Cursor::new(data);
    match serial_type {
        0 => Ok(Null),
        1 => Ok(Int(c.read_i8().map_err(read_error)? as i64)),
        2 => Ok(Int(c.read_i16::<BigEndian>().map_err(read_error)? as i64)),
        3 => Ok(Int(read_int_be(&mut c, 3)?)),
        4 => Ok(Int(c.read_i32::<BigEndian>().map_err(read_error)? as i64)),
        5 => Ok(Int(read_int_be(&mut c, 6)?)),
        6 => Ok(Int(c.read_i64::<BigEndian>().map_err(read_error)?)),
        7 => Ok(Real(c.read_f64::<BigEndian>().map_err(read_error)?)),
        8 => Ok(Int(0)),
        9 => Ok(Int(1)),
        10 | 11 => Err(Error::UnknownTypeCode(serial_type)),
        x if x % 2 == 0 => Ok(Blob(data.to_vec())),
        _ => Ok(Text(encoding.decode(data)?)),
    }
}

// Sign-extending big-endian read for the 24- and 48-bit widths, which
// have no native Rust type.
fn read_int_be(c: &mut Cursor<&[u8]>, nbytes: usize) -> Result<i64, Error> {
    let mut bytes = [0_u8; 8];
    c.read_exact(&mut bytes[8 - nbytes..]).map_err(read_error)?;
    let fill = match bytes[8 - nbytes] & 0b1000_0000 {
        0 => 0x00,
        _ => 0xff,
    };
    for b in bytes[..8 - nbytes].iter_mut() {
        *b = fill;
    }
    Ok(i64::from_be_bytes(bytes))
}

#[cfg(test)]
const UTF8: TextEncoding = TextEncoding::Utf8;

#[test]
fn test_content_sizes() {
    let cases: Vec<(u64, usize)> = vec![
        (0, 0),
        (1, 1),
        (2, 2),
        (3, 3),
        (4, 4),
        (5, 6),
        (6, 8),
        (7, 8),
        (8, 0),
        (9, 0),
        (12, 0),
        (13, 0),
        (18, 3),
        (19, 3),
        (1000, 494),
    ];
    for (code, size) in cases {
        assert_eq!(content_size(code).unwrap(), size, "code {}", code);
    }
    assert!(matches!(content_size(10), Err(Error::UnknownTypeCode(10))));
    assert!(matches!(content_size(11), Err(Error::UnknownTypeCode(11))));
}

#[test]
fn test_integer_decoding() {
    use SqlValue::*;
    let cases: Vec<(u64, &[u8], SqlValue)> = vec![
        (1, &[0x7f], Int(127)),
        (1, &[0xff], Int(-1)),
        (2, &[0x01, 0x00], Int(256)),
        (2, &[0xff, 0xff], Int(-1)),
        (3, &[0x01, 0x00, 0x00], Int(65536)),
        (3, &[0xff, 0xff, 0xff], Int(-1)),
        (3, &[0x80, 0x00, 0x00], Int(-8388608)),
        (4, &[0x7f, 0xff, 0xff, 0xff], Int(2147483647)),
        (4, &[0xff, 0xff, 0xff, 0xfe], Int(-2)),
        (5, &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00], Int(65536)),
        (5, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff], Int(-1)),
        (5, &[0x80, 0x00, 0x00, 0x00, 0x00, 0x00], Int(-140737488355328)),
        (6, &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00], Int(256)),
        (6, &[0xff; 8], Int(-1)),
        (8, &[], Int(0)),
        (9, &[], Int(1)),
    ];
    for (i, (code, data, expected)) in cases.iter().enumerate() {
        println!("case {}: serial type {}", i, code);
        assert_eq!(to_sql_value(*code, data, UTF8).unwrap(), *expected);
    }
}

#[test]
fn test_real_null_text_blob_decoding() {
    use SqlValue::*;
    // 3.1415 as a big-endian IEEE 754 double.
    let pi: &[u8] = &[0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f];
    assert_eq!(to_sql_value(7, pi, UTF8).unwrap(), Real(3.1415));
    assert_eq!(to_sql_value(0, &[], UTF8).unwrap(), Null);
    assert_eq!(to_sql_value(13, &[], UTF8).unwrap(), Text(String::new()));
    assert_eq!(to_sql_value(19, b"Ten", UTF8).unwrap(), Text("Ten".to_string()));
    assert_eq!(
        to_sql_value(18, &[0x00, 0x01, 0xff], UTF8).unwrap(),
        Blob(vec![0, 1, 255])
    );
    assert_eq!(to_sql_value(12, &[], UTF8).unwrap(), Blob(vec![]));
}

#[test]
fn test_text_in_utf16() {
    assert_eq!(
        to_sql_value(17, &[0x48, 0x00, 0x69, 0x00], TextEncoding::Utf16Le).unwrap(),
        SqlValue::Text("Hi".to_string())
    );
    assert_eq!(
        to_sql_value(17, &[0x00, 0x48, 0x00, 0x69], TextEncoding::Utf16Be).unwrap(),
        SqlValue::Text("Hi".to_string())
    );
}

#[test]
fn test_reserved_codes_rejected() {
    assert!(matches!(to_sql_value(10, &[], UTF8), Err(Error::UnknownTypeCode(10))));
    assert!(matches!(to_sql_value(11, &[], UTF8), Err(Error::UnknownTypeCode(11))));
}
