//! peekdb reads rows out of SQLite format-3 database files without a SQL
//! layer: callers address btrees by root page number and look rows up by
//! integer row-id or by an index key tuple.
//!
//! The file is treated as immutable.  Nothing is written, locked, or
//! cached, and one `Database` serves one thread at a time.

pub mod btree;
pub mod dbheader;
mod error;
pub mod pager;
pub mod record;
pub mod serial_type;
pub mod sql_value;
pub mod varint;

pub use crate::btree::RowId;
pub use crate::error::Error;

use log::debug;
use std::fs::File;
use std::io::{Read, Seek};

use crate::btree::page::Page;
use crate::btree::search;
use crate::pager::{PageNum, Pager};
use crate::record::Record;
use crate::sql_value::SqlValue;

// Page 1 (the first page) is always a btree page, and it is the root page
// of the schema table.  It has references to the root pages of other
// btrees.
const SCHEMA_BTREE_ROOT_PAGENUM: PageNum = 1;
const SCHEMA_TABLE_TYPE_COLIDX: usize = 0;
const SCHEMA_TABLE_NAME_COLIDX: usize = 1;
const SCHEMA_TABLE_ROOTPAGE_COLIDX: usize = 3;

/// An open database file: the pager plus the schema rows from page 1.
pub struct Database<R = File> {
    pager: Pager<R>,
    schema: Vec<Record>,
}

impl Database<File> {
    /// Opens the database file at `path`.
    pub fn open(path: &str) -> Result<Database<File>, Error> {
        let f = File::open(path).map_err(|_| Error::ReadFailed)?;
        Database::new(f)
    }
}

impl<R: Read + Seek> Database<R> {
    /// Reads the file header and eagerly parses page 1, the root of the
    /// `sqlite_schema` table.
    pub fn new(file: R) -> Result<Database<R>, Error> {
        let mut pager = Pager::new(file)?;
        let schema: Vec<Record> = match pager.get_page(SCHEMA_BTREE_ROOT_PAGENUM)? {
            Page::TableLeaf(leaf) => leaf.cells.into_iter().map(|c| c.record).collect(),
            _ => return Err(Error::UnexpectedPageType(SCHEMA_BTREE_ROOT_PAGENUM)),
        };
        debug!(
            "opened database: page_size={} schema_rows={}",
            pager.page_size(),
            schema.len()
        );
        Ok(Database { pager, schema })
    }

    pub fn header(&self) -> &dbheader::DbfileHeader {
        self.pager.header()
    }

    /// The rows of the `sqlite_schema` table, in row-id order.  Each has
    /// five columns: type, name, tbl_name, rootpage, sql.
    pub fn schema_records(&self) -> &[Record] {
        &self.schema
    }

    /// Finds the root page of a named schema object by scanning the
    /// schema rows.  `kind` is the schema `type` column, "table" or
    /// "index"; the autoindex enforcing the N-th unique constraint of
    /// table T is named `sqlite_autoindex_T_N`.
    pub fn root_pagenum(&self, kind: &str, name: &str) -> Option<PageNum> {
        for record in &self.schema {
            match (
                record
                    .values
                    .get(SCHEMA_TABLE_TYPE_COLIDX)
                    .and_then(SqlValue::as_text),
                record
                    .values
                    .get(SCHEMA_TABLE_NAME_COLIDX)
                    .and_then(SqlValue::as_text),
            ) {
                (Some(t), Some(n)) if t.as_str() == kind && n.as_str() == name => {}
                _ => continue,
            }
            let rootpage = record
                .values
                .get(SCHEMA_TABLE_ROOTPAGE_COLIDX)
                .and_then(SqlValue::as_int)?;
            return Some(*rootpage as PageNum);
        }
        None
    }

    /// Looks up one row by its integer primary key in the table btree
    /// rooted at `root_page`.
    pub fn find_in_table(
        &mut self,
        root_page: PageNum,
        row_id: RowId,
    ) -> Result<Option<Record>, Error> {
        search::find_in_table(&mut self.pager, root_page, row_id)
    }

    /// Looks up `key` in the index btree rooted at `index_root_page`,
    /// then returns the base-table row the matching entry points to.
    ///
    /// The caller names the base table's root page: the core keeps no
    /// mapping from index to table, that is schema knowledge.
    pub fn find_in_index(
        &mut self,
        index_root_page: PageNum,
        table_root_page: PageNum,
        key: &[SqlValue],
    ) -> Result<Option<Record>, Error> {
        search::find_in_index(&mut self.pager, index_root_page, table_root_page, key)
    }
}
