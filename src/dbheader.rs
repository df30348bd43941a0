//! dbheader reads the 100-byte header at the start of a database file.
//! Only the page size and text encoding drive traversal; the remaining
//! fields are parsed and kept for callers that want them.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{read_error, Error};

pub const SQLITE_DB_HEADER_BYTES: usize = 100;
const SQLITE3_MAGIC_STRING: &[u8; 16] = b"SQLite format 3\0";

/// The database text encoding, applying to every text value in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    fn from_code(code: u32) -> Result<TextEncoding, Error> {
        match code {
            1 => Ok(TextEncoding::Utf8),
            2 => Ok(TextEncoding::Utf16Le),
            3 => Ok(TextEncoding::Utf16Be),
            _ => Err(Error::BadEncoding(code)),
        }
    }

    /// Decodes the bytes of a stored text value into a string.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, Error> {
        match self {
            TextEncoding::Utf8 => {
                String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidStringEncoding)
            }
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(Error::InvalidStringEncoding);
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match self {
                        TextEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                        _ => u16::from_be_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| Error::InvalidStringEncoding)
            }
        }
    }
}

// The database file header.
#[derive(Debug, Clone)]
pub struct DbfileHeader {
    pub pagesize: u32,
    pub write_version: u8,
    pub read_version: u8,
    pub reserved_bytes: u8,
    pub max_payload_frac: u8,
    pub min_payload_frac: u8,
    pub leaf_payload_frac: u8,
    pub changecnt: u32,
    pub numpages: u32,
    pub freelist_trunk_page: u32,
    pub freelist_pages: u32,
    pub schema_cookie: u32,
    pub schema_format: u32,
    pub default_cache_size: u32,
    pub autovacuum_top_root: u32,
    pub text_encoding: TextEncoding,
    pub user_version: u32,
    pub incremental_vacuum: u32,
    pub application_id: u32,
    pub version_valid_for: u32,
    pub sqlite_version: u32,
}

/// Reads the file header from the start of `f`.
pub fn get_header<R: Read + Seek>(f: &mut R) -> Result<DbfileHeader, Error> {
    f.seek(SeekFrom::Start(0)).map_err(read_error)?;
    let mut v = [0_u8; SQLITE_DB_HEADER_BYTES];
    f.read_exact(&mut v).map_err(read_error)?;
    let mut c = Cursor::new(&v[..]);

    // Offset	Size	Description
    // 0        16      The header string: "SQLite format 3\000"
    let mut magic = [0_u8; 16];
    c.read_exact(&mut magic).map_err(read_error)?;
    if magic != *SQLITE3_MAGIC_STRING {
        return Err(Error::BadMagic);
    }

    // 16       2       The database page size in bytes. Must be a power of
    //                  two between 512 and 32768 inclusive, or the value 1
    //                  representing a page size of 65536.
    let pagesize: u32 = match c.read_u16::<BigEndian>().map_err(read_error)? {
        1 => 65536,
        x if (512..=32768).contains(&x) && x.is_power_of_two() => x as u32,
        x => return Err(Error::BadPageSize(x)),
    };

    // 18       1       File format write version. 1 for legacy; 2 for WAL.
    // 19       1       File format read version. 1 for legacy; 2 for WAL.
    // 20       1       Bytes of unused "reserved" space at the end of each page.
    // 21       1       Maximum embedded payload fraction. Must be 64.
    // 22       1       Minimum embedded payload fraction. Must be 32.
    // 23       1       Leaf payload fraction. Must be 32.
    let write_version = c.read_u8().map_err(read_error)?;
    let read_version = c.read_u8().map_err(read_error)?;
    let reserved_bytes = c.read_u8().map_err(read_error)?;
    let max_payload_frac = c.read_u8().map_err(read_error)?;
    let min_payload_frac = c.read_u8().map_err(read_error)?;
    let leaf_payload_frac = c.read_u8().map_err(read_error)?;

    // 24       4       File change counter.
    // 28       4       Size of the database file in pages.
    // 32       4       Page number of the first freelist trunk page.
    // 36       4       Total number of freelist pages.
    // 40       4       The schema cookie.
    // 44       4       The schema format number.
    // 48       4       Default page cache size.
    // 52       4       The page number of the largest root b-tree page when
    //                  in auto-vacuum or incremental-vacuum modes.
    let changecnt = c.read_u32::<BigEndian>().map_err(read_error)?;
    let numpages = c.read_u32::<BigEndian>().map_err(read_error)?;
    let freelist_trunk_page = c.read_u32::<BigEndian>().map_err(read_error)?;
    let freelist_pages = c.read_u32::<BigEndian>().map_err(read_error)?;
    let schema_cookie = c.read_u32::<BigEndian>().map_err(read_error)?;
    let schema_format = c.read_u32::<BigEndian>().map_err(read_error)?;
    let default_cache_size = c.read_u32::<BigEndian>().map_err(read_error)?;
    let autovacuum_top_root = c.read_u32::<BigEndian>().map_err(read_error)?;

    // 56       4       The database text encoding. 1 means UTF-8, 2 means
    //                  UTF-16le, 3 means UTF-16be.
    let text_encoding = TextEncoding::from_code(c.read_u32::<BigEndian>().map_err(read_error)?)?;

    // 60       4       The "user version".
    // 64       4       Non-zero for incremental-vacuum mode.
    // 68       4       The "Application ID".
    // 72       20      Reserved for expansion.
    // 92       4       The version-valid-for number.
    // 96       4       SQLITE_VERSION_NUMBER
    let user_version = c.read_u32::<BigEndian>().map_err(read_error)?;
    let incremental_vacuum = c.read_u32::<BigEndian>().map_err(read_error)?;
    let application_id = c.read_u32::<BigEndian>().map_err(read_error)?;
    c.seek(SeekFrom::Current(20)).map_err(read_error)?;
    let version_valid_for = c.read_u32::<BigEndian>().map_err(read_error)?;
    let sqlite_version = c.read_u32::<BigEndian>().map_err(read_error)?;

    Ok(DbfileHeader {
        pagesize,
        write_version,
        read_version,
        reserved_bytes,
        max_payload_frac,
        min_payload_frac,
        leaf_payload_frac,
        changecnt,
        numpages,
        freelist_trunk_page,
        freelist_pages,
        schema_cookie,
        schema_format,
        default_cache_size,
        autovacuum_top_root,
        text_encoding,
        user_version,
        incremental_vacuum,
        application_id,
        version_valid_for,
        sqlite_version,
    })
}

#[cfg(test)]
fn make_header_bytes(pagesize_field: u16, encoding_code: u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(SQLITE_DB_HEADER_BYTES);
    v.extend_from_slice(SQLITE3_MAGIC_STRING);
    v.extend_from_slice(&pagesize_field.to_be_bytes());
    v.extend_from_slice(&[1, 1, 0, 64, 32, 32]); // versions, reserved, payload fractions
    v.extend_from_slice(&7_u32.to_be_bytes()); // change counter
    v.extend_from_slice(&3_u32.to_be_bytes()); // pages in file
    v.extend_from_slice(&0_u32.to_be_bytes()); // freelist trunk
    v.extend_from_slice(&0_u32.to_be_bytes()); // freelist pages
    v.extend_from_slice(&1_u32.to_be_bytes()); // schema cookie
    v.extend_from_slice(&4_u32.to_be_bytes()); // schema format
    v.extend_from_slice(&0_u32.to_be_bytes()); // default cache size
    v.extend_from_slice(&0_u32.to_be_bytes()); // autovacuum root
    v.extend_from_slice(&encoding_code.to_be_bytes());
    v.extend_from_slice(&0_u32.to_be_bytes()); // user version
    v.extend_from_slice(&0_u32.to_be_bytes()); // incremental vacuum
    v.extend_from_slice(&0_u32.to_be_bytes()); // application id
    v.extend_from_slice(&[0_u8; 20]);
    v.extend_from_slice(&7_u32.to_be_bytes()); // version valid for
    v.extend_from_slice(&3037000_u32.to_be_bytes()); // sqlite version
    assert_eq!(v.len(), SQLITE_DB_HEADER_BYTES);
    v
}

#[test]
fn test_get_header_retains_fields() {
    let mut c = Cursor::new(make_header_bytes(4096, 1));
    let h = get_header(&mut c).unwrap();
    assert_eq!(h.pagesize, 4096);
    assert_eq!(h.text_encoding, TextEncoding::Utf8);
    assert_eq!(h.write_version, 1);
    assert_eq!(h.max_payload_frac, 64);
    assert_eq!(h.changecnt, 7);
    assert_eq!(h.numpages, 3);
    assert_eq!(h.schema_format, 4);
    assert_eq!(h.version_valid_for, 7);
    assert_eq!(h.sqlite_version, 3037000);
}

#[test]
fn test_pagesize_one_means_64k() {
    let mut c = Cursor::new(make_header_bytes(1, 1));
    assert_eq!(get_header(&mut c).unwrap().pagesize, 65536);
}

#[test]
fn test_all_legal_pagesizes() {
    for ps in [512_u16, 1024, 2048, 4096, 8192, 16384, 32768] {
        let mut c = Cursor::new(make_header_bytes(ps, 1));
        assert_eq!(get_header(&mut c).unwrap().pagesize, ps as u32);
    }
}

#[test]
fn test_bad_pagesize() {
    for ps in [0_u16, 2, 256, 1000, 4095] {
        let mut c = Cursor::new(make_header_bytes(ps, 1));
        assert!(matches!(get_header(&mut c), Err(Error::BadPageSize(x)) if x == ps));
    }
}

#[test]
fn test_bad_magic() {
    let mut bytes = make_header_bytes(4096, 1);
    bytes[0] = b'X';
    let mut c = Cursor::new(bytes);
    assert!(matches!(get_header(&mut c), Err(Error::BadMagic)));
}

#[test]
fn test_encodings() {
    for (code, enc) in [
        (1_u32, TextEncoding::Utf8),
        (2, TextEncoding::Utf16Le),
        (3, TextEncoding::Utf16Be),
    ] {
        let mut c = Cursor::new(make_header_bytes(512, code));
        assert_eq!(get_header(&mut c).unwrap().text_encoding, enc);
    }
    let mut c = Cursor::new(make_header_bytes(512, 4));
    assert!(matches!(get_header(&mut c), Err(Error::BadEncoding(4))));
}

#[test]
fn test_short_header() {
    let bytes = make_header_bytes(4096, 1);
    let mut c = Cursor::new(&bytes[..40]);
    assert!(matches!(get_header(&mut c), Err(Error::ShortRead)));
}

#[test]
fn test_text_decoding() {
    let enc = TextEncoding::Utf8;
    assert_eq!(enc.decode(b"Ten").unwrap(), "Ten");
    assert!(matches!(enc.decode(&[0xff, 0xfe, 0xfd]), Err(Error::InvalidStringEncoding)));

    // "Hi" in both UTF-16 byte orders.
    assert_eq!(TextEncoding::Utf16Le.decode(&[0x48, 0x00, 0x69, 0x00]).unwrap(), "Hi");
    assert_eq!(TextEncoding::Utf16Be.decode(&[0x00, 0x48, 0x00, 0x69]).unwrap(), "Hi");
    assert!(matches!(
        TextEncoding::Utf16Le.decode(&[0x48]),
        Err(Error::InvalidStringEncoding)
    ));
}
