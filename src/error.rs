//! Failures surfaced while decoding a database file.  Every error aborts
//! the lookup that hit it; nothing is retried, and the file is never
//! modified.

use crate::btree::RowId;
use crate::pager::PageNum;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("The file ended inside a header, cell, or record.")]
    ShortRead,
    #[error("Error reading file.")]
    ReadFailed,
    #[error("The magic bytes for this file are wrong.")]
    BadMagic,
    #[error("The page size {0} is not 1 or a power of two between 512 and 32768.")]
    BadPageSize(u16),
    #[error("The text encoding code {0} is not 1, 2, or 3.")]
    BadEncoding(u32),
    #[error("Invalid btree page type: {0:#04x}.")]
    UnknownPageType(u8),
    #[error("A varint did not terminate within nine bytes.")]
    MalformedVarint,
    #[error("Invalid record serial type code: {0}.")]
    UnknownTypeCode(u64),
    #[error("A record's declared sizes do not match its payload.")]
    TruncatedRecord,
    #[error("Bytes were not valid text in the file encoding.")]
    InvalidStringEncoding,
    #[error("Page {0} is not the btree page type this tree requires.")]
    UnexpectedPageType(PageNum),
    #[error("Row id {0} appears in the index but not in the base table.")]
    DanglingIndex(RowId),
}

pub(crate) fn read_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::ShortRead,
        _ => Error::ReadFailed,
    }
}
