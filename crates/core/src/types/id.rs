//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. A product id and a
//! cell id are both plain integers on the wire, and swapping the two is the
//! easiest way to corrupt a distribution.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
/// - `FromStr` for parsing CLI arguments and path segments
///
/// # Example
///
/// ```rust
/// # use stowage_core::define_id;
/// define_id!(PalletId);
/// define_id!(DockId);
///
/// let pallet = PalletId::new(1);
/// let dock = DockId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: PalletId = dock;
/// assert_eq!(pallet.as_i32(), dock.as_i32());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Backend entities
define_id!(ProductId);
define_id!(CellId);
define_id!(WarehouseId);
define_id!(DocumentId);

// Physical grouping keys. Zero and negative values are ordinary keys.
define_id!(RackId);
define_id!(RowId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id: CellId = " 42 ".parse().unwrap();
        assert_eq!(id, CellId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<CellId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&ProductId::new(7)).unwrap();
        assert_eq!(json, "7");

        let parsed: RackId = serde_json::from_str("-3").unwrap();
        assert_eq!(parsed.as_i32(), -3);
    }
}
