//! Field introspection for native record types.
//!
//! A type opts in by implementing [`Record`], listing its persisted fields
//! one level deep. Each field's kind is derived from its Rust type through
//! [`NativeType`]:
//!
//! ```
//! use streamql_query::schema::{native_struct_representation, NativeField, Record};
//!
//! struct Order {
//!     id: i64,
//!     item: String,
//!     tags: Vec<String>,
//! }
//!
//! impl Record for Order {
//!     fn fields() -> Vec<NativeField> {
//!         vec![
//!             NativeField::of::<i64>("ID").primary(),
//!             NativeField::of::<String>("ITEM"),
//!             NativeField::of::<Vec<String>>("TAGS"),
//!         ]
//!     }
//! }
//!
//! let schema = native_struct_representation::<Order>("ORDERS").unwrap();
//! assert_eq!(schema.len(), 3);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;

use tracing::debug;

use super::field::{RelationSchema, SearchField};
use crate::error::SchemaResult;
use crate::kind::Kind;

/// Kind of a native field as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeKind {
    /// A kind the engine understands.
    Mapped(Kind),
    /// A kind with no engine equivalent, named for diagnostics.
    Unmapped(&'static str),
}

/// Maps a Rust type onto an engine kind.
pub trait NativeType {
    /// The engine kind of this type.
    fn native_kind() -> NativeKind;

    /// True if values of this type may be absent.
    const NULLABLE: bool = false;

    /// True only for `u8`, so that `Vec<u8>` maps to BYTES.
    #[doc(hidden)]
    const IS_BYTE: bool = false;
}

macro_rules! impl_native {
    ($kind:expr => $($t:ty),*) => {
        $(
            impl NativeType for $t {
                fn native_kind() -> NativeKind {
                    NativeKind::Mapped($kind)
                }
            }
        )*
    };
}

impl_native!(Kind::Boolean => bool);
impl_native!(Kind::Int => i8, i16, i32, u16);
impl_native!(Kind::BigInt => i64, u32, u64, isize, usize);
impl_native!(Kind::Double => f32, f64);
impl_native!(Kind::String => String, &'static str, char);

impl NativeType for u8 {
    fn native_kind() -> NativeKind {
        NativeKind::Mapped(Kind::Int)
    }

    const IS_BYTE: bool = true;
}

impl<T: NativeType> NativeType for Vec<T> {
    fn native_kind() -> NativeKind {
        if T::IS_BYTE {
            return NativeKind::Mapped(Kind::Bytes);
        }
        match T::native_kind() {
            NativeKind::Mapped(kind) => NativeKind::Mapped(Kind::array(kind)),
            unmapped => unmapped,
        }
    }
}

impl<T: NativeType> NativeType for HashMap<String, T> {
    fn native_kind() -> NativeKind {
        map_kind::<T>()
    }
}

impl<T: NativeType> NativeType for BTreeMap<String, T> {
    fn native_kind() -> NativeKind {
        map_kind::<T>()
    }
}

fn map_kind<T: NativeType>() -> NativeKind {
    match T::native_kind() {
        NativeKind::Mapped(kind) => NativeKind::Mapped(Kind::map(kind)),
        unmapped => unmapped,
    }
}

impl<T: NativeType> NativeType for Option<T> {
    fn native_kind() -> NativeKind {
        T::native_kind()
    }

    const NULLABLE: bool = true;
}

impl<T> NativeType for *const T {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("pointer")
    }
}

impl<T> NativeType for *mut T {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("pointer")
    }
}

impl<R> NativeType for fn() -> R {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("function")
    }
}

impl<A, R> NativeType for fn(A) -> R {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("function")
    }
}

impl<T> NativeType for mpsc::Sender<T> {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("channel")
    }
}

impl<T> NativeType for mpsc::Receiver<T> {
    fn native_kind() -> NativeKind {
        NativeKind::Unmapped("channel")
    }
}

/// One declared field of a native record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeField {
    name: String,
    kind: NativeKind,
    primary: bool,
    tag: Option<String>,
    nullable: bool,
}

impl NativeField {
    /// Declares a field whose kind follows from `T`.
    pub fn of<T: NativeType>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: T::native_kind(),
            primary: false,
            tag: None,
            nullable: T::NULLABLE,
        }
    }

    /// Declares a field with an explicit kind.
    pub fn with_kind(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind: NativeKind::Mapped(kind),
            primary: false,
            tag: None,
            nullable: false,
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Attaches a declarative tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Field name as known by the engine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derived kind.
    pub fn kind(&self) -> &NativeKind {
        &self.kind
    }

    /// True if marked primary.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// True if the field may be absent.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// A native type bound to a relation.
pub trait Record {
    /// Lists the persisted fields, one level deep.
    fn fields() -> Vec<NativeField>;
}

/// Extracts the schema of `T` for `relation`.
///
/// Fields with an unmapped kind are skipped; two fields marked primary fail
/// with [`SchemaError::AmbiguousPrimaryKey`](crate::error::SchemaError).
pub fn native_struct_representation<T: Record>(relation: &str) -> SchemaResult<RelationSchema> {
    let mut schema = RelationSchema::new(relation);
    for field in T::fields() {
        let kind = match field.kind {
            NativeKind::Mapped(kind) => kind,
            NativeKind::Unmapped(what) => {
                debug!(relation, field = %field.name, kind = what, "skipping unmapped native field");
                continue;
            }
        };
        let mut search = SearchField::new(field.name, kind);
        if field.primary {
            search = search.primary();
        }
        if let Some(tag) = field.tag {
            search = search.tag(tag);
        }
        schema.insert(search)?;
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    struct Order;

    impl Record for Order {
        fn fields() -> Vec<NativeField> {
            vec![
                NativeField::of::<i64>("ID").primary(),
                NativeField::of::<i32>("QTY"),
                NativeField::of::<Option<String>>("NOTE"),
                NativeField::of::<Vec<u8>>("PAYLOAD"),
                NativeField::of::<Vec<f64>>("PRICES"),
                NativeField::of::<HashMap<String, bool>>("FLAGS"),
                NativeField::of::<mpsc::Sender<u8>>("NOTIFY"),
                NativeField::of::<fn(i32) -> i32>("HOOK"),
                NativeField::of::<*const u8>("RAW"),
            ]
        }
    }

    struct TwoKeys;

    impl Record for TwoKeys {
        fn fields() -> Vec<NativeField> {
            vec![
                NativeField::of::<i64>("A").primary(),
                NativeField::of::<i64>("B").primary(),
            ]
        }
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(u8::native_kind(), NativeKind::Mapped(Kind::Int));
        assert_eq!(u64::native_kind(), NativeKind::Mapped(Kind::BigInt));
        assert_eq!(Vec::<u8>::native_kind(), NativeKind::Mapped(Kind::Bytes));
        assert_eq!(
            Vec::<Vec<u8>>::native_kind(),
            NativeKind::Mapped(Kind::array(Kind::Bytes))
        );
        assert_eq!(
            BTreeMap::<String, Vec<i32>>::native_kind(),
            NativeKind::Mapped(Kind::map(Kind::array(Kind::Int)))
        );
        assert!(Option::<i32>::NULLABLE);
        assert!(!i32::NULLABLE);
        assert_eq!(
            Vec::<*const u8>::native_kind(),
            NativeKind::Unmapped("pointer")
        );
    }

    #[test]
    fn test_unmapped_fields_are_skipped() {
        let schema = native_struct_representation::<Order>("ORDERS").unwrap();
        assert_eq!(schema.len(), 6);
        assert!(schema.get("NOTIFY").is_none());
        assert!(schema.get("HOOK").is_none());
        assert!(schema.get("RAW").is_none());
        assert_eq!(schema.get("note").unwrap().kind(), &Kind::String);
        assert_eq!(schema.primary().unwrap().name(), "ID");
    }

    #[test]
    fn test_ambiguous_primary_key() {
        assert_eq!(
            native_struct_representation::<TwoKeys>("T"),
            Err(SchemaError::AmbiguousPrimaryKey {
                relation: "T".into(),
                first: "A".into(),
                second: "B".into(),
            })
        );
    }
}
