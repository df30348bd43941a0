//! Defines an enum of all the values a stored column can hold.

use enum_as_inner::EnumAsInner;
use std::cmp::Ordering;

/// One decoded column value.  The variants match SQLite's storage
/// classes; the integer-literal serial types 0 and 1 decode as `Int`.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(x) => write!(f, "{}", x),
            SqlValue::Real(x) => write!(f, "{}", x),
            SqlValue::Text(x) => write!(f, "{}", x),
            SqlValue::Blob(_) => write!(f, "<BLOB>"),
        }
    }
}

impl SqlValue {
    fn storage_class_rank(&self) -> u8 {
        match self {
            SqlValue::Null => 0,
            SqlValue::Int(_) | SqlValue::Real(_) => 1,
            SqlValue::Text(_) => 2,
            SqlValue::Blob(_) => 3,
        }
    }

    /// SQLite's sort order across storage classes: NULL before numbers,
    /// numbers before text, text before blobs.  Ints and reals compare
    /// numerically with each other; text and blobs compare bytewise.
    pub fn storage_cmp(&self, other: &SqlValue) -> Ordering {
        use SqlValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Real(a), Real(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Int(a), Real(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
            (Real(a), Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
            (Text(a), Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Blob(a), Blob(b)) => a.cmp(b),
            _ => self.storage_class_rank().cmp(&other.storage_class_rank()),
        }
    }
}

#[test]
fn test_storage_cmp_within_classes() {
    use SqlValue::*;
    assert_eq!(Int(1).storage_cmp(&Int(2)), Ordering::Less);
    assert_eq!(Int(-5).storage_cmp(&Int(-5)), Ordering::Equal);
    assert_eq!(Real(2.5).storage_cmp(&Real(2.0)), Ordering::Greater);
    assert_eq!(Int(2).storage_cmp(&Real(2.5)), Ordering::Less);
    assert_eq!(Real(3.0).storage_cmp(&Int(3)), Ordering::Equal);
    assert_eq!(
        Text("user_1".into()).storage_cmp(&Text("user_10".into())),
        Ordering::Less
    );
    assert_eq!(Blob(vec![1, 2]).storage_cmp(&Blob(vec![1, 2, 0])), Ordering::Less);
}

#[test]
fn test_storage_cmp_across_classes() {
    use SqlValue::*;
    assert_eq!(Null.storage_cmp(&Int(i64::MIN)), Ordering::Less);
    assert_eq!(Null.storage_cmp(&Null), Ordering::Equal);
    assert_eq!(Int(i64::MAX).storage_cmp(&Text("".into())), Ordering::Less);
    assert_eq!(Text("zzz".into()).storage_cmp(&Blob(vec![])), Ordering::Less);
    assert_eq!(Blob(vec![]).storage_cmp(&Null), Ordering::Greater);
}
