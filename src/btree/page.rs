//! page assembles a whole btree page from its header, its cell pointer
//! array, and the cells the pointers land on.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

use super::cell::{IndexInteriorCell, IndexLeafCell, TableInteriorCell, TableLeafCell};
use super::header::{self, PageHeader};
use super::PageType;
use crate::dbheader::TextEncoding;
use crate::error::{read_error, Error};
use crate::pager::PageNum;

/// A parsed btree page.  Cells are kept in cell-pointer order, which the
/// file format defines to be key order.
#[derive(Debug, Clone)]
pub enum Page {
    TableLeaf(TableLeafPage),
    TableInterior(TableInteriorPage),
    IndexLeaf(IndexLeafPage),
    IndexInterior(IndexInteriorPage),
}

#[derive(Debug, Clone)]
pub struct TableLeafPage {
    pub header: PageHeader,
    pub cells: Vec<TableLeafCell>,
}

#[derive(Debug, Clone)]
pub struct TableInteriorPage {
    pub header: PageHeader,
    pub right_child: PageNum,
    pub cells: Vec<TableInteriorCell>,
}

#[derive(Debug, Clone)]
pub struct IndexLeafPage {
    pub header: PageHeader,
    pub cells: Vec<IndexLeafCell>,
}

#[derive(Debug, Clone)]
pub struct IndexInteriorPage {
    pub header: PageHeader,
    pub right_child: PageNum,
    pub cells: Vec<IndexInteriorCell>,
}

/// Parses the page held in `buf`.
///
/// `hdr_offset` is where the btree header starts: 100 on page 1, where
/// the file header comes first, and 0 everywhere else.  Cell pointers
/// are relative to the start of `buf` on every page; page 1's pointers
/// are file-relative, and its buffer starts at file offset 0, so the
/// same arithmetic covers it.
pub fn parse_page(buf: &[u8], hdr_offset: usize, encoding: TextEncoding) -> Result<Page, Error> {
    let hdr = header::parse_header(buf, hdr_offset)?;

    // The cell pointer array of a b-tree page immediately follows the
    // b-tree page header: K 2-byte integer offsets to the cell contents,
    // arranged in key order with the smallest key first.
    let mut c = Cursor::new(buf);
    c.seek(SeekFrom::Start((hdr_offset + hdr.size()) as u64))
        .map_err(read_error)?;
    let mut cell_offsets = Vec::with_capacity(hdr.num_cells as usize);
    for _ in 0..hdr.num_cells {
        let off = c.read_u16::<BigEndian>().map_err(read_error)? as usize;
        if off >= buf.len() {
            return Err(Error::ShortRead);
        }
        cell_offsets.push(off);
    }

    // parse_header fills this in for interior page types.
    let right_child = hdr.rightmost_pointer.map(|p| p as PageNum);

    match hdr.page_type {
        PageType::TableLeaf => {
            let cells = cell_offsets
                .iter()
                .map(|off| TableLeafCell::parse(&buf[*off..], encoding))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::TableLeaf(TableLeafPage { header: hdr, cells }))
        }
        PageType::TableInterior => {
            let right_child = right_child.ok_or(Error::ShortRead)?;
            let cells = cell_offsets
                .iter()
                .map(|off| TableInteriorCell::parse(&buf[*off..]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::TableInterior(TableInteriorPage {
                header: hdr,
                right_child,
                cells,
            }))
        }
        PageType::IndexLeaf => {
            let cells = cell_offsets
                .iter()
                .map(|off| IndexLeafCell::parse(&buf[*off..], encoding))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::IndexLeaf(IndexLeafPage { header: hdr, cells }))
        }
        PageType::IndexInterior => {
            let right_child = right_child.ok_or(Error::ShortRead)?;
            let cells = cell_offsets
                .iter()
                .map(|off| IndexInteriorCell::parse(&buf[*off..], encoding))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::IndexInterior(IndexInteriorPage {
                header: hdr,
                right_child,
                cells,
            }))
        }
    }
}

// From command: xxd resources/test/multipage-512B-page.db
#[cfg(test)]
const TEST_PAGE: &str = "0d00 0000 0a01 ce00 01fb 01f6 01f1 01ec
01e7 01e2 01dd 01d8 01d3 01ce 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 030a
020f 4a03 0902 0f49 0308 020f 4803 0702
0f47 0306 020f 4603 0502 0f45 0304 020f
4403 0302 0f43 0302 020f 4203 0102 0f41";

#[cfg(test)]
use crate::sql_value::SqlValue;

#[test]
fn test_parse_table_leaf_page() {
    use hex::FromHex;
    let p: Vec<u8> =
        Vec::from_hex(TEST_PAGE.replace(&[' ', '\n'][..], "")).expect("Invalid Hex String");
    assert_eq!(p.len(), 512);
    let page = parse_page(&p, 0, TextEncoding::Utf8).unwrap();
    let leaf = match page {
        Page::TableLeaf(l) => l,
        _ => panic!("expected a table leaf"),
    };
    assert_eq!(leaf.header.num_cells, 10);
    // Cells come back in pointer order, which is key order.
    let row_ids: Vec<u64> = leaf.cells.iter().map(|c| c.row_id).collect();
    assert_eq!(row_ids, (1..=10).collect::<Vec<u64>>());
    assert_eq!(leaf.cells[0].record.values, vec![SqlValue::Text("A".to_string())]);
    assert_eq!(leaf.cells[9].record.values, vec![SqlValue::Text("J".to_string())]);
}

#[test]
fn test_parse_table_interior_page() {
    // Hand-assembled 64-byte interior page: two cells and a right child.
    let mut p = vec![0_u8; 64];
    p[0] = 0x05;
    p[3..5].copy_from_slice(&2_u16.to_be_bytes()); // num cells
    p[5..7].copy_from_slice(&52_u16.to_be_bytes()); // content start
    p[8..12].copy_from_slice(&9_u32.to_be_bytes()); // right-most pointer
    p[12..14].copy_from_slice(&52_u16.to_be_bytes()); // cell 0: key 10
    p[14..16].copy_from_slice(&58_u16.to_be_bytes()); // cell 1: key 20
    p[52..56].copy_from_slice(&7_u32.to_be_bytes());
    p[56] = 10;
    p[58..62].copy_from_slice(&8_u32.to_be_bytes());
    p[62] = 20;
    let page = parse_page(&p, 0, TextEncoding::Utf8).unwrap();
    let interior = match page {
        Page::TableInterior(i) => i,
        _ => panic!("expected a table interior"),
    };
    assert_eq!(interior.right_child, 9);
    assert_eq!(interior.cells.len(), 2);
    assert_eq!(interior.cells[0].child_page, 7);
    assert_eq!(interior.cells[0].key, 10);
    assert_eq!(interior.cells[1].child_page, 8);
    assert_eq!(interior.cells[1].key, 20);
}

#[test]
fn test_cell_pointer_out_of_page() {
    let mut p = vec![0_u8; 32];
    p[0] = 0x0d;
    p[3..5].copy_from_slice(&1_u16.to_be_bytes());
    p[8..10].copy_from_slice(&500_u16.to_be_bytes()); // beyond the 32-byte page
    assert!(matches!(
        parse_page(&p, 0, TextEncoding::Utf8),
        Err(Error::ShortRead)
    ));
}

#[test]
fn test_unknown_page_type() {
    let p = vec![0x10_u8; 32];
    assert!(matches!(
        parse_page(&p, 0, TextEncoding::Utf8),
        Err(Error::UnknownPageType(0x10))
    ));
}
