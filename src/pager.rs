//! pager produces parsed btree pages from a sqlite3 file as defined at
//! https://www.sqlite.org/fileformat.html, one seek and read per
//! request.
//!
//! Only b-tree pages are handled.  Pages are handed to the caller by
//! value and re-read from the file on every request; the file is the
//! only store.  The pager owns the byte source, and its seek position
//! is reset on every call, so one pager serves one thread.

use log::debug;
use std::io::{Read, Seek, SeekFrom};

use crate::btree::page::{self, Page};
use crate::dbheader::{self, DbfileHeader};
use crate::error::{read_error, Error};

/// Page numbers are 1-based, to match how SQLite numbers pages.
pub type PageNum = usize;

/// A pager wraps one open database file and its parsed file header.
pub struct Pager<R> {
    file: R,
    header: DbfileHeader,
}

impl<R: Read + Seek> Pager<R> {
    /// Reads the file header and readies the pager.
    pub fn new(mut file: R) -> Result<Pager<R>, Error> {
        let header = dbheader::get_header(&mut file)?;
        Ok(Pager { file, header })
    }

    pub fn header(&self) -> &DbfileHeader {
        &self.header
    }

    pub fn page_size(&self) -> u32 {
        self.header.pagesize
    }

    /// Reads and parses page `pgnum`.
    ///
    /// Page 1's btree header starts at byte 100, after the file header;
    /// its cell pointers are relative to the start of the file, which is
    /// also the start of the buffer read here, so cell offsets need no
    /// per-page adjustment anywhere.
    pub fn get_page(&mut self, pgnum: PageNum) -> Result<Page, Error> {
        if pgnum == 0 {
            // Page numbers are 1-based; 0 appears only in corrupt files.
            return Err(Error::ShortRead);
        }
        let page_start = (pgnum as u64 - 1) * self.header.pagesize as u64;
        let hdr_offset = match pgnum {
            1 => dbheader::SQLITE_DB_HEADER_BYTES,
            _ => 0,
        };
        debug!("reading page {} at file offset {}", pgnum, page_start);
        let mut buf = vec![0_u8; self.header.pagesize as usize];
        self.file
            .seek(SeekFrom::Start(page_start))
            .map_err(read_error)?;
        self.file.read_exact(&mut buf).map_err(read_error)?;
        page::parse_page(&buf, hdr_offset, self.header.text_encoding)
    }
}
