use serde::Serialize;
use serde::de::DeserializeOwned;

/// How the mapper treats one field
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Copied verbatim
    Scalar,
    /// Copied by variant name
    Enum,
    /// A structure mapped recursively with the given schema
    Nested(fn() -> &'static Schema),
    /// An ordered list of structures, each mapped with the given schema
    List(fn() -> &'static Schema),
}

/// One field of a mappable type
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// The field list of a mappable type
#[derive(Debug)]
pub struct Schema {
    pub type_name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A type the object mapper can produce
///
/// Implementations are normally generated with [`schema!`](crate::schema).
/// Target types should carry `#[serde(default)]` so that fields the
/// source does not provide fall back to their declared default.
pub trait Mappable: Serialize + DeserializeOwned + 'static {
    fn schema() -> &'static Schema;
}

/// Declare the mapping schema of a struct
///
/// Each field is listed with its kind: `scalar`, `enumeration`,
/// `nested(Type)` or `list(Type)`. Naming a field the struct does not
/// have is a compile error.
///
/// # Example
/// ```
/// use brandmatch::schema;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// pub struct Address {
///     pub city: String,
/// }
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// pub struct Venue {
///     pub name: String,
///     pub address: Address,
/// }
///
/// schema!(Address { city: scalar });
/// schema!(Venue { name: scalar, address: nested(Address) });
/// ```
#[macro_export]
macro_rules! schema {
    ($ty:ident { $( $field:ident : $kind:ident $( ( $inner:ty ) )? ),* $(,)? }) => {
        impl $crate::mapper::Mappable for $ty {
            fn schema() -> &'static $crate::mapper::Schema {
                #[allow(dead_code)]
                fn assert_fields(value: &$ty) {
                    $( let _ = &value.$field; )*
                }

                static SCHEMA: $crate::mapper::Schema = $crate::mapper::Schema {
                    type_name: stringify!($ty),
                    fields: &[
                        $(
                            $crate::mapper::FieldDescriptor {
                                name: stringify!($field),
                                kind: $crate::field_kind!($kind $( $inner )?),
                            },
                        )*
                    ],
                };
                &SCHEMA
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! field_kind {
    (scalar) => {
        $crate::mapper::FieldKind::Scalar
    };
    (enumeration) => {
        $crate::mapper::FieldKind::Enum
    };
    (nested $inner:ty) => {
        $crate::mapper::FieldKind::Nested(<$inner as $crate::mapper::Mappable>::schema)
    };
    (list $inner:ty) => {
        $crate::mapper::FieldKind::List(<$inner as $crate::mapper::Mappable>::schema)
    };
}
