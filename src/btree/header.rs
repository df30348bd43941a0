//! header reads the header of a btree page.
//! A b-tree page is divided into regions in the following order
//! 1. The 100-byte database file header (found on page 1 only)
//! 2. The 8 or 12 byte b-tree page header
//! 3. The cell pointer array
//! 4. Unallocated space
//! 5. The cell content area

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

use super::PageType;
use crate::error::{read_error, Error};

#[derive(Debug, Clone)]
pub struct PageHeader {
    pub page_type: PageType,
    pub freeblock_start: u32,
    pub num_cells: u32,
    pub cell_content_start: u32,
    pub fragmented_free_bytes: u8,
    pub rightmost_pointer: Option<u32>,
}

impl PageHeader {
    /// Bytes the header occupies: 8 on leaves, 12 on interior pages.
    pub fn size(&self) -> usize {
        match self.rightmost_pointer {
            Some(_) => 12,
            None => 8,
        }
    }
}

/// Reads the btree page header found at `hdr_offset` into `page`: 100 on
/// page 1, where the file header comes first, and 0 everywhere else.
pub fn parse_header(page: &[u8], hdr_offset: usize) -> Result<PageHeader, Error> {
    let mut c = Cursor::new(page);
    c.seek(SeekFrom::Start(hdr_offset as u64)).map_err(read_error)?;

    // Offset	Size	Description
    // 0	1	The one-byte flag at offset 0 indicating the b-tree page type.
    let page_type = PageType::from_type_byte(c.read_u8().map_err(read_error)?)?;
    // 1	2	The start of the first freeblock on the page, or zero if none.
    let freeblock_start = c.read_u16::<BigEndian>().map_err(read_error)? as u32;
    // 3	2	The number of cells on the page.
    let num_cells = c.read_u16::<BigEndian>().map_err(read_error)? as u32;
    // 5	2	The start of the cell content area. A zero value is
    //              interpreted as 65536.
    let cell_content_start = match c.read_u16::<BigEndian>().map_err(read_error)? {
        0 => 65536,
        x => x as u32,
    };
    // 7	1	The number of fragmented free bytes within the cell
    //              content area.
    let fragmented_free_bytes = c.read_u8().map_err(read_error)?;
    // 8	4	The right-most pointer. This value appears in the header
    //              of interior b-tree pages only.
    let rightmost_pointer = match page_type {
        PageType::IndexInterior | PageType::TableInterior => {
            Some(c.read_u32::<BigEndian>().map_err(read_error)?)
        }
        PageType::IndexLeaf | PageType::TableLeaf => None,
    };

    Ok(PageHeader {
        page_type,
        freeblock_start,
        num_cells,
        cell_content_start,
        fragmented_free_bytes,
        rightmost_pointer,
    })
}

#[test]
fn test_parse_leaf_header() {
    use hex::FromHex;
    let bytes = Vec::from_hex("0d0000000a01ce00").unwrap();
    let h = parse_header(&bytes, 0).unwrap();
    assert_eq!(h.page_type, PageType::TableLeaf);
    assert_eq!(h.freeblock_start, 0);
    assert_eq!(h.num_cells, 10);
    assert_eq!(h.cell_content_start, 0x1ce);
    assert_eq!(h.fragmented_free_bytes, 0);
    assert_eq!(h.rightmost_pointer, None);
    assert_eq!(h.size(), 8);
}

#[test]
fn test_parse_interior_header() {
    use hex::FromHex;
    let bytes = Vec::from_hex("05000000030123000000002a").unwrap();
    let h = parse_header(&bytes, 0).unwrap();
    assert_eq!(h.page_type, PageType::TableInterior);
    assert_eq!(h.num_cells, 3);
    assert_eq!(h.cell_content_start, 0x123);
    assert_eq!(h.rightmost_pointer, Some(42));
    assert_eq!(h.size(), 12);
}

#[test]
fn test_zero_content_start_means_64k() {
    use hex::FromHex;
    let bytes = Vec::from_hex("0a00000000000000").unwrap();
    let h = parse_header(&bytes, 0).unwrap();
    assert_eq!(h.page_type, PageType::IndexLeaf);
    assert_eq!(h.cell_content_start, 65536);
}

#[test]
fn test_header_at_offset() {
    // The same leaf header, preceded by 100 junk bytes as on page 1.
    let mut bytes = vec![0xee_u8; 100];
    bytes.extend_from_slice(&[0x0d, 0, 0, 0, 2, 0x01, 0xce, 0]);
    let h = parse_header(&bytes, 100).unwrap();
    assert_eq!(h.page_type, PageType::TableLeaf);
    assert_eq!(h.num_cells, 2);
}

#[test]
fn test_bad_type_byte() {
    assert!(matches!(
        parse_header(&[0x42, 0, 0, 0, 0, 0, 0, 0], 0),
        Err(Error::UnknownPageType(0x42))
    ));
}

#[test]
fn test_truncated_header() {
    assert!(matches!(parse_header(&[0x0d, 0, 0], 0), Err(Error::ShortRead)));
    assert!(matches!(
        // Interior header cut off before the right-most pointer.
        parse_header(&[0x05, 0, 0, 0, 1, 0, 16, 0], 0),
        Err(Error::ShortRead)
    ));
}
