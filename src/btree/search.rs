//! search walks a btree from its root page down to the cell holding a
//! key, if any.  Table trees are keyed on row-ids; index trees on tuples
//! of column values, stored with the target row-id appended as the
//! record's last value.

use log::debug;
use std::cmp::Ordering;
use std::io::{Read, Seek};

use super::page::Page;
use super::RowId;
use crate::error::Error;
use crate::pager::{PageNum, Pager};
use crate::record::Record;
use crate::sql_value::SqlValue;

/// Looks up `row_id` in the table tree rooted at page `root`.
pub fn find_in_table<R: Read + Seek>(
    pager: &mut Pager<R>,
    root: PageNum,
    row_id: RowId,
) -> Result<Option<Record>, Error> {
    let mut pgnum = root;
    loop {
        match pager.get_page(pgnum)? {
            Page::TableLeaf(mut leaf) => {
                let idx = leaf.cells.partition_point(|cell| cell.row_id < row_id);
                if idx < leaf.cells.len() && leaf.cells[idx].row_id == row_id {
                    return Ok(Some(leaf.cells.swap_remove(idx).record));
                }
                return Ok(None);
            }
            Page::TableInterior(interior) => {
                // Interior keys are upper bounds on their subtrees: the
                // smallest key >= the target owns the child that can hold
                // it.  Equal keys descend into the cell, not the right
                // child.
                let idx = interior.cells.partition_point(|cell| cell.key < row_id);
                pgnum = match interior.cells.get(idx) {
                    Some(cell) => cell.child_page,
                    None => interior.right_child,
                };
                debug!("table search for row {} descends to page {}", row_id, pgnum);
            }
            Page::IndexLeaf(_) | Page::IndexInterior(_) => {
                return Err(Error::UnexpectedPageType(pgnum));
            }
        }
    }
}

/// Looks up `key` in the index tree rooted at `index_root`, then follows
/// the matching entry's row-id into the table tree rooted at
/// `table_root` and returns the base-table row.
pub fn find_in_index<R: Read + Seek>(
    pager: &mut Pager<R>,
    index_root: PageNum,
    table_root: PageNum,
    key: &[SqlValue],
) -> Result<Option<Record>, Error> {
    let mut pgnum = index_root;
    loop {
        match pager.get_page(pgnum)? {
            Page::IndexLeaf(mut leaf) => {
                let idx = leaf
                    .cells
                    .partition_point(|cell| cmp_stored_key(&cell.record, key) == Ordering::Less);
                if idx >= leaf.cells.len()
                    || cmp_stored_key(&leaf.cells[idx].record, key) != Ordering::Equal
                {
                    return Ok(None);
                }
                let row_id = trailing_row_id(&leaf.cells.swap_remove(idx).record)?;
                debug!(
                    "index hit for key of {} values joins to row {} in table page {}",
                    key.len(),
                    row_id,
                    table_root
                );
                return match find_in_table(pager, table_root, row_id)? {
                    Some(record) => Ok(Some(record)),
                    None => Err(Error::DanglingIndex(row_id)),
                };
            }
            Page::IndexInterior(interior) => {
                let idx = interior
                    .cells
                    .partition_point(|cell| cmp_stored_key(&cell.record, key) == Ordering::Less);
                pgnum = match interior.cells.get(idx) {
                    Some(cell) => cell.child_page,
                    None => interior.right_child,
                };
                debug!("index search descends to page {}", pgnum);
            }
            Page::TableLeaf(_) | Page::TableInterior(_) => {
                return Err(Error::UnexpectedPageType(pgnum));
            }
        }
    }
}

/// Compares a stored index key against the caller's search tuple.
///
/// Stored keys are longer than the tuple: they carry the row-id as their
/// last value.  Comparison is lexicographic over the prefix of the
/// tuple's length, so a stored key whose indexed columns equal the tuple
/// compares Equal regardless of its row-id.
fn cmp_stored_key(stored: &Record, key: &[SqlValue]) -> Ordering {
    for (s, k) in stored.values.iter().zip(key) {
        match s.storage_cmp(k) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    if stored.values.len() < key.len() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

// The last value of an index record is the row-id of the indexed row.
// Anything else there means the record cannot name a base-table row.
fn trailing_row_id(record: &Record) -> Result<RowId, Error> {
    match record.values.last() {
        Some(SqlValue::Int(id)) => Ok(*id as RowId),
        _ => Err(Error::TruncatedRecord),
    }
}

#[cfg(test)]
fn text_record(words: &[&str], row_id: i64) -> Record {
    let mut values: Vec<SqlValue> = words
        .iter()
        .map(|w| SqlValue::Text(w.to_string()))
        .collect();
    values.push(SqlValue::Int(row_id));
    Record { values }
}

#[test]
fn test_cmp_stored_key_ignores_trailing_row_id() {
    let stored = text_record(&["user_9@example.com"], 9);
    let key = vec![SqlValue::Text("user_9@example.com".to_string())];
    assert_eq!(cmp_stored_key(&stored, &key), Ordering::Equal);
}

#[test]
fn test_cmp_stored_key_orders_by_prefix() {
    let stored = text_record(&["b"], 1);
    let less = vec![SqlValue::Text("c".to_string())];
    let greater = vec![SqlValue::Text("a".to_string())];
    assert_eq!(cmp_stored_key(&stored, &less), Ordering::Less);
    assert_eq!(cmp_stored_key(&stored, &greater), Ordering::Greater);
}

#[test]
fn test_cmp_stored_key_multi_column() {
    let stored = text_record(&["smith", "alice"], 3);
    let exact = vec![
        SqlValue::Text("smith".to_string()),
        SqlValue::Text("alice".to_string()),
    ];
    let first_col_only = vec![SqlValue::Text("smith".to_string())];
    let later = vec![
        SqlValue::Text("smith".to_string()),
        SqlValue::Text("bob".to_string()),
    ];
    assert_eq!(cmp_stored_key(&stored, &exact), Ordering::Equal);
    assert_eq!(cmp_stored_key(&stored, &first_col_only), Ordering::Equal);
    assert_eq!(cmp_stored_key(&stored, &later), Ordering::Less);
}

#[test]
fn test_trailing_row_id() {
    assert_eq!(trailing_row_id(&text_record(&["x"], 450)).unwrap(), 450);
    let no_int = Record {
        values: vec![SqlValue::Text("x".to_string())],
    };
    assert!(matches!(trailing_row_id(&no_int), Err(Error::TruncatedRecord)));
}
