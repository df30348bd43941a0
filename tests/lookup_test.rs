//! End-to-end lookups against synthesized database images.
//!
//! The builders below encode varints, records, cells, and pages on their
//! own, so the reader is exercised against bytes it did not produce.
//! Images follow the patterns sqlite3 itself emits: page 1 carries the
//! file header plus the schema table, interior keys are upper bounds on
//! their child subtrees, and index entries end with the row-id of the
//! row they index.

use std::io::Cursor;

use peekdb::dbheader::TextEncoding;
use peekdb::sql_value::SqlValue;
use peekdb::{Database, Error};

const PAGE_SIZE: usize = 1024;

const USERS_SQL: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, \
     username TEXT UNIQUE, email TEXT UNIQUE, password_hash TEXT, \
     created_at DATETIME DEFAULT CURRENT_TIMESTAMP)";
const CREATED_AT: &str = "2024-05-01 12:00:00";

// ------------------------- image builders -------------------------- //

fn encode_varint(x: u64) -> Vec<u8> {
    if x >> 56 != 0 {
        let mut out = Vec::with_capacity(9);
        for i in (0..8).rev() {
            out.push(0x80 | ((x >> (8 + 7 * i)) & 0x7f) as u8);
        }
        out.push((x & 0xff) as u8);
        return out;
    }
    let mut out = vec![(x & 0x7f) as u8];
    let mut rest = x >> 7;
    while rest != 0 {
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.reverse();
    out
}

/// Serial type code and body bytes for one value, UTF-8 text.
fn serial(v: &SqlValue) -> (u64, Vec<u8>) {
    match v {
        SqlValue::Null => (0, vec![]),
        SqlValue::Int(i) => {
            let (code, width) = match *i {
                -128..=127 => (1, 1),
                -32768..=32767 => (2, 2),
                -8388608..=8388607 => (3, 3),
                -2147483648..=2147483647 => (4, 4),
                -140737488355328..=140737488355327 => (5, 6),
                _ => (6, 8),
            };
            (code, i.to_be_bytes()[8 - width..].to_vec())
        }
        SqlValue::Real(f) => (7, f.to_be_bytes().to_vec()),
        SqlValue::Text(s) => (13 + 2 * s.len() as u64, s.as_bytes().to_vec()),
        SqlValue::Blob(b) => (12 + 2 * b.len() as u64, b.clone()),
    }
}

fn encode_record_raw(fields: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut codes = Vec::new();
    let mut body = Vec::new();
    for (code, bytes) in fields {
        codes.extend(encode_varint(*code));
        body.extend_from_slice(bytes);
    }
    // The header length varint counts itself; iterate until stable.
    let mut hdr_len = codes.len() + 1;
    loop {
        let l = encode_varint(hdr_len as u64).len() + codes.len();
        if l == hdr_len {
            break;
        }
        hdr_len = l;
    }
    let mut out = encode_varint(hdr_len as u64);
    out.extend(codes);
    out.extend(body);
    out
}

fn encode_record(values: &[SqlValue]) -> Vec<u8> {
    let fields: Vec<(u64, Vec<u8>)> = values.iter().map(serial).collect();
    encode_record_raw(&fields)
}

fn table_leaf_cell(row_id: u64, record: &[u8]) -> Vec<u8> {
    let mut c = encode_varint(record.len() as u64);
    c.extend(encode_varint(row_id));
    c.extend_from_slice(record);
    c
}

fn table_interior_cell(child: u32, key: u64) -> Vec<u8> {
    let mut c = child.to_be_bytes().to_vec();
    c.extend(encode_varint(key));
    c
}

fn index_leaf_cell(record: &[u8]) -> Vec<u8> {
    let mut c = encode_varint(record.len() as u64);
    c.extend_from_slice(record);
    c
}

fn index_interior_cell(child: u32, record: &[u8]) -> Vec<u8> {
    let mut c = child.to_be_bytes().to_vec();
    c.extend(encode_varint(record.len() as u64));
    c.extend_from_slice(record);
    c
}

/// Lays cells out from the back of the page, pointer array in key order.
fn build_page(type_byte: u8, right_child: Option<u32>, cells: &[Vec<u8>], page_one: bool) -> Vec<u8> {
    let base = if page_one { 100 } else { 0 };
    let hdr_size = if right_child.is_some() { 12 } else { 8 };
    let mut page = vec![0_u8; PAGE_SIZE];
    let mut content_end = PAGE_SIZE;
    let mut ptrs: Vec<u16> = Vec::new();
    for cell in cells.iter().rev() {
        content_end -= cell.len();
        page[content_end..content_end + cell.len()].copy_from_slice(cell);
        ptrs.push(content_end as u16);
    }
    ptrs.reverse();
    assert!(
        base + hdr_size + 2 * cells.len() <= content_end,
        "fixture page overflow: {} cells",
        cells.len()
    );
    page[base] = type_byte;
    page[base + 3..base + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());
    page[base + 5..base + 7].copy_from_slice(&(content_end as u16).to_be_bytes());
    if let Some(rc) = right_child {
        page[base + 8..base + 12].copy_from_slice(&rc.to_be_bytes());
    }
    for (i, p) in ptrs.iter().enumerate() {
        let at = base + hdr_size + 2 * i;
        page[at..at + 2].copy_from_slice(&p.to_be_bytes());
    }
    page
}

fn file_header(numpages: u32, encoding_code: u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(100);
    v.extend_from_slice(b"SQLite format 3\0");
    v.extend_from_slice(&(PAGE_SIZE as u16).to_be_bytes());
    v.extend_from_slice(&[1, 1, 0, 64, 32, 32]);
    v.extend_from_slice(&1_u32.to_be_bytes()); // change counter
    v.extend_from_slice(&numpages.to_be_bytes());
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
    v.extend_from_slice(&1_u32.to_be_bytes()); // version valid for
    v.extend_from_slice(&3037000_u32.to_be_bytes());
    v
}

/// Stamps the file header over the front of page 1 and concatenates.
fn build_db(mut pages: Vec<Vec<u8>>, encoding_code: u32) -> Cursor<Vec<u8>> {
    let hdr = file_header(pages.len() as u32, encoding_code);
    pages[0][..100].copy_from_slice(&hdr);
    Cursor::new(pages.concat())
}

// --------------------------- users fixture ------------------------- //

const NROWS: u64 = 200;
const ROWS_PER_LEAF: usize = 10;
const ENTRIES_PER_INDEX_LEAF: usize = 25;
const USERS_ROOT: usize = 2;
const EMAIL_INDEX_ROOT: usize = 23;

fn user_email(i: u64) -> String {
    format!("user_{}@example.com", i)
}

fn user_row(i: u64) -> Vec<SqlValue> {
    vec![
        SqlValue::Int(i as i64),
        SqlValue::Text(format!("user_{}", i)),
        SqlValue::Text(user_email(i)),
        SqlValue::Text(format!("password_{}", i)),
        SqlValue::Text(CREATED_AT.to_string()),
    ]
}

/// A 31-page database: page 1 schema, a two-level users table on pages
/// 2..=22, and a two-level unique-email index on pages 23..=31.
fn users_db() -> Database<Cursor<Vec<u8>>> {
    let rows: Vec<(u64, Vec<u8>)> = (1..=NROWS).map(|i| (i, encode_record(&user_row(i)))).collect();

    // Table leaves, ten rows apiece, then the interior root above them.
    let mut table_leaves = Vec::new();
    let mut table_root_cells = Vec::new();
    let first_leaf_page = USERS_ROOT + 1;
    for (li, chunk) in rows.chunks(ROWS_PER_LEAF).enumerate() {
        let cells: Vec<Vec<u8>> = chunk
            .iter()
            .map(|(row_id, rec)| table_leaf_cell(*row_id, rec))
            .collect();
        table_leaves.push(build_page(0x0d, None, &cells, false));
        let pgnum = (first_leaf_page + li) as u32;
        let max_row_id = chunk.last().unwrap().0;
        table_root_cells.push(table_interior_cell(pgnum, max_row_id));
    }
    // The last leaf hangs off the right-child pointer instead of a cell.
    table_root_cells.pop();
    let right_leaf = (first_leaf_page + table_leaves.len() - 1) as u32;
    let table_root = build_page(0x05, Some(right_leaf), &table_root_cells, false);

    // Index entries sorted by email, then the same two-level shape.
    let mut entries: Vec<(String, u64)> = (1..=NROWS).map(|i| (user_email(i), i)).collect();
    entries.sort();
    let mut index_leaves = Vec::new();
    let mut index_root_cells = Vec::new();
    let first_index_leaf_page = EMAIL_INDEX_ROOT + 1;
    for (li, chunk) in entries.chunks(ENTRIES_PER_INDEX_LEAF).enumerate() {
        let cells: Vec<Vec<u8>> = chunk
            .iter()
            .map(|(email, row_id)| {
                index_leaf_cell(&encode_record(&[
                    SqlValue::Text(email.clone()),
                    SqlValue::Int(*row_id as i64),
                ]))
            })
            .collect();
        index_leaves.push(build_page(0x0a, None, &cells, false));
        let pgnum = (first_index_leaf_page + li) as u32;
        let (max_email, max_row_id) = chunk.last().unwrap().clone();
        index_root_cells.push(index_interior_cell(
            pgnum,
            &encode_record(&[SqlValue::Text(max_email), SqlValue::Int(max_row_id as i64)]),
        ));
    }
    index_root_cells.pop();
    let right_index_leaf = (first_index_leaf_page + index_leaves.len() - 1) as u32;
    let index_root = build_page(0x02, Some(right_index_leaf), &index_root_cells, false);

    let schema = build_page(
        0x0d,
        None,
        &[
            table_leaf_cell(
                1,
                &encode_record(&[
                    SqlValue::Text("table".to_string()),
                    SqlValue::Text("users".to_string()),
                    SqlValue::Text("users".to_string()),
                    SqlValue::Int(USERS_ROOT as i64),
                    SqlValue::Text(USERS_SQL.to_string()),
                ]),
            ),
            table_leaf_cell(
                2,
                &encode_record(&[
                    SqlValue::Text("index".to_string()),
                    SqlValue::Text("sqlite_autoindex_users_2".to_string()),
                    SqlValue::Text("users".to_string()),
                    SqlValue::Int(EMAIL_INDEX_ROOT as i64),
                    SqlValue::Null,
                ]),
            ),
        ],
        true,
    );

    let mut pages = vec![schema, table_root];
    pages.extend(table_leaves);
    pages.push(index_root);
    pages.extend(index_leaves);
    assert_eq!(pages.len(), 31);

    Database::new(build_db(pages, 1)).expect("users fixture should open")
}

// ------------------------------ tests ------------------------------ //

#[test]
fn test_open_reads_header_and_schema() {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = users_db();
    assert_eq!(db.header().pagesize, PAGE_SIZE as u32);
    assert_eq!(db.header().text_encoding, TextEncoding::Utf8);
    assert_eq!(db.header().numpages, 31);

    let schema = db.schema_records();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema[0].values[0], SqlValue::Text("table".to_string()));
    assert_eq!(schema[0].values[1], SqlValue::Text("users".to_string()));
    assert_eq!(schema[0].values[4], SqlValue::Text(USERS_SQL.to_string()));
    assert_eq!(schema[1].values[1], SqlValue::Text("sqlite_autoindex_users_2".to_string()));

    assert_eq!(db.root_pagenum("table", "users"), Some(USERS_ROOT));
    assert_eq!(
        db.root_pagenum("index", "sqlite_autoindex_users_2"),
        Some(EMAIL_INDEX_ROOT)
    );
    // Matching is on both the type and name columns.
    assert_eq!(db.root_pagenum("index", "users"), None);
    assert_eq!(db.root_pagenum("table", "absent"), None);
}

#[test]
fn test_find_by_rowid_first_row() -> anyhow::Result<()> {
    let mut db = users_db();
    let rec = db.find_in_table(USERS_ROOT, 1)?.expect("row 1 should exist");
    assert_eq!(rec.values, user_row(1));
    Ok(())
}

#[test]
fn test_find_by_rowid_middle_row() -> anyhow::Result<()> {
    let mut db = users_db();
    let rec = db.find_in_table(USERS_ROOT, 150)?.expect("row 150 should exist");
    assert_eq!(rec.values[0], SqlValue::Int(150));
    assert_eq!(rec.values[1], SqlValue::Text("user_150".to_string()));
    Ok(())
}

#[test]
fn test_find_by_rowid_absent() -> anyhow::Result<()> {
    let mut db = users_db();
    assert!(db.find_in_table(USERS_ROOT, 0)?.is_none());
    assert!(db.find_in_table(USERS_ROOT, NROWS + 1)?.is_none());
    assert!(db.find_in_table(USERS_ROOT, 10_000)?.is_none());
    Ok(())
}

#[test]
fn test_find_by_rowid_agrees_with_full_scan() -> anyhow::Result<()> {
    // Every present row-id resolves to exactly the record stored for it.
    let mut db = users_db();
    for i in 1..=NROWS {
        let rec = db.find_in_table(USERS_ROOT, i)?.expect("present row");
        assert_eq!(rec.values, user_row(i), "row {}", i);
    }
    Ok(())
}

#[test]
fn test_find_by_email() -> anyhow::Result<()> {
    let mut db = users_db();
    let key = vec![SqlValue::Text(user_email(150))];
    let by_email = db
        .find_in_index(EMAIL_INDEX_ROOT, USERS_ROOT, &key)?
        .expect("email of row 150 is indexed");
    let by_rowid = db.find_in_table(USERS_ROOT, 150)?.expect("row 150 should exist");
    assert_eq!(by_email, by_rowid);
    Ok(())
}

#[test]
fn test_find_by_email_for_every_row() -> anyhow::Result<()> {
    let mut db = users_db();
    for i in 1..=NROWS {
        let key = vec![SqlValue::Text(user_email(i))];
        let rec = db
            .find_in_index(EMAIL_INDEX_ROOT, USERS_ROOT, &key)?
            .expect("indexed email");
        assert_eq!(rec.values[0], SqlValue::Int(i as i64), "email of row {}", i);
    }
    Ok(())
}

#[test]
fn test_find_by_email_absent() -> anyhow::Result<()> {
    let mut db = users_db();
    for missing in [
        "missing@example.com",
        "user_0@example.com",
        "user_201@example.com",
        "user_1@example.co",
        "user_1@example.comm",
        "",
        "zzz",
    ] {
        let key = vec![SqlValue::Text(missing.to_string())];
        assert!(
            db.find_in_index(EMAIL_INDEX_ROOT, USERS_ROOT, &key)?.is_none(),
            "{:?} should not be indexed",
            missing
        );
    }
    Ok(())
}

// ------------------------ three-level fixture ----------------------- //

/// Rows 1..=24 in a three-level table tree: root (page 2) over three
/// interior pages (3..=5) over twelve two-row leaves (6..=17).
fn three_level_db() -> Database<Cursor<Vec<u8>>> {
    let mut leaves = Vec::new();
    let mut leaf_maxes = Vec::new();
    for chunk in (1..=24_u64).collect::<Vec<u64>>().chunks(2) {
        let cells: Vec<Vec<u8>> = chunk
            .iter()
            .map(|i| table_leaf_cell(*i, &encode_record(&[SqlValue::Int(*i as i64)])))
            .collect();
        leaves.push(build_page(0x0d, None, &cells, false));
        leaf_maxes.push(*chunk.last().unwrap());
    }

    // Three mid-level interiors, four leaves each; leaves live on pages
    // 6..=17.
    let mut mids = Vec::new();
    let mut mid_maxes = Vec::new();
    for (mi, leaf_group) in leaf_maxes.chunks(4).enumerate() {
        let first_leaf_page = 6 + 4 * mi as u32;
        let mut cells: Vec<Vec<u8>> = leaf_group
            .iter()
            .enumerate()
            .map(|(li, max)| table_interior_cell(first_leaf_page + li as u32, *max))
            .collect();
        cells.pop();
        mids.push(build_page(0x05, Some(first_leaf_page + 3), &cells, false));
        mid_maxes.push(*leaf_group.last().unwrap());
    }

    let root_cells = vec![
        table_interior_cell(3, mid_maxes[0]),
        table_interior_cell(4, mid_maxes[1]),
    ];
    let root = build_page(0x05, Some(5), &root_cells, false);

    let schema = build_page(
        0x0d,
        None,
        &[table_leaf_cell(
            1,
            &encode_record(&[
                SqlValue::Text("table".to_string()),
                SqlValue::Text("t".to_string()),
                SqlValue::Text("t".to_string()),
                SqlValue::Int(2),
                SqlValue::Text("CREATE TABLE t (a int)".to_string()),
            ]),
        )],
        true,
    );

    let mut pages = vec![schema, root];
    pages.extend(mids);
    pages.extend(leaves);
    assert_eq!(pages.len(), 17);
    Database::new(build_db(pages, 1)).expect("three-level fixture should open")
}

#[test]
fn test_three_level_descent() -> anyhow::Result<()> {
    let mut db = three_level_db();
    assert_eq!(db.root_pagenum("table", "t"), Some(2));
    for i in 1..=24_u64 {
        let rec = db.find_in_table(2, i)?.expect("present row");
        assert_eq!(rec.values, vec![SqlValue::Int(i as i64)], "row {}", i);
    }
    for absent in [0_u64, 25, 100] {
        assert!(db.find_in_table(2, absent)?.is_none());
    }
    Ok(())
}

// ------------------------- corruption fixture ----------------------- //

/// Page 2: a one-row table.  Page 3: an index over it with one entry
/// that names a row the table does not have.
fn dangling_index_db() -> Database<Cursor<Vec<u8>>> {
    let table = build_page(
        0x0d,
        None,
        &[table_leaf_cell(
            1,
            &encode_record(&[SqlValue::Text("a@x".to_string())]),
        )],
        false,
    );
    let index = build_page(
        0x0a,
        None,
        &[
            index_leaf_cell(&encode_record(&[
                SqlValue::Text("a@x".to_string()),
                SqlValue::Int(1),
            ])),
            index_leaf_cell(&encode_record(&[
                SqlValue::Text("ghost@x".to_string()),
                SqlValue::Int(99),
            ])),
        ],
        false,
    );
    let schema = build_page(0x0d, None, &[], true);
    Database::new(build_db(vec![schema, table, index], 1)).expect("fixture should open")
}

#[test]
fn test_index_hit_joins_to_table() -> anyhow::Result<()> {
    let mut db = dangling_index_db();
    let rec = db
        .find_in_index(3, 2, &[SqlValue::Text("a@x".to_string())])?
        .expect("entry exists");
    assert_eq!(rec.values, vec![SqlValue::Text("a@x".to_string())]);
    Ok(())
}

#[test]
fn test_dangling_index_entry() {
    let mut db = dangling_index_db();
    let got = db.find_in_index(3, 2, &[SqlValue::Text("ghost@x".to_string())]);
    assert!(matches!(got, Err(Error::DanglingIndex(99))));
}

#[test]
fn test_wrong_tree_family() {
    let mut db = dangling_index_db();
    // Page 3 is an index leaf; a table search must refuse it.
    assert!(matches!(
        db.find_in_table(3, 1),
        Err(Error::UnexpectedPageType(3))
    ));
    // And the reverse.
    assert!(matches!(
        db.find_in_index(2, 2, &[SqlValue::Text("a@x".to_string())]),
        Err(Error::UnexpectedPageType(2))
    ));
}

// --------------------------- UTF-16 fixture ------------------------- //

fn utf16le_text(s: &str) -> (u64, Vec<u8>) {
    let bytes: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    (13 + 2 * bytes.len() as u64, bytes)
}

#[test]
fn test_utf16le_database() -> anyhow::Result<()> {
    // Every text value in the file, schema included, uses the file
    // encoding.
    let schema_rec = encode_record_raw(&[
        utf16le_text("table"),
        utf16le_text("t"),
        utf16le_text("t"),
        serial(&SqlValue::Int(2)),
        (0, vec![]),
    ]);
    let row_rec = encode_record_raw(&[utf16le_text("héllo")]);
    let schema = build_page(0x0d, None, &[table_leaf_cell(1, &schema_rec)], true);
    let table = build_page(0x0d, None, &[table_leaf_cell(1, &row_rec)], false);

    let mut db = Database::new(build_db(vec![schema, table], 2))?;
    assert_eq!(db.header().text_encoding, TextEncoding::Utf16Le);
    assert_eq!(db.root_pagenum("table", "t"), Some(2));
    let rec = db.find_in_table(2, 1)?.expect("row 1 should exist");
    assert_eq!(rec.values, vec![SqlValue::Text("héllo".to_string())]);
    Ok(())
}
