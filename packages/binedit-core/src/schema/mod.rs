//! Schema model: declarative descriptions of binary layouts.

pub mod path;
pub mod types;
mod validate;

use std::sync::Arc;

use crate::error::SchemaError;

pub use path::{FieldPath, Segment};
pub use types::{
    Endian, FieldDef, FieldKind, FieldMeta, FlagDef, IntWidth, Orient, SizeSpec, VariantDef,
    Visibility,
};

/// A validated, rooted tree of field definitions.
///
/// Construction validates the whole tree: struct extents must balance, bit
/// ranges must fit their backing integer, and every SIZE path must resolve
/// to an integer field that serializes earlier. A schema that builds is one
/// the codec can walk without structural surprises.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    root: Arc<FieldDef>,
}

impl Schema {
    pub fn build(name: &str, root: FieldDef) -> Result<Schema, SchemaError> {
        validate::validate(&root)?;
        Ok(Schema {
            name: name.to_string(),
            root: Arc::new(root),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Arc<FieldDef> {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_field_struct() -> FieldDef {
        FieldDef::struct_(
            "header",
            8,
            vec![FieldDef::uint32("a"), FieldDef::uint32("b")],
        )
    }

    #[test]
    fn builds_balanced_struct() {
        assert!(Schema::build("t", two_field_struct()).is_ok());
    }

    #[test]
    fn rejects_unbalanced_struct() {
        let def = FieldDef::struct_("header", 16, vec![FieldDef::uint32("a")]);
        assert_eq!(
            Schema::build("t", def),
            Err(SchemaError::SizeMismatch {
                name: "header".into(),
                declared: 16,
                covered: 4,
            })
        );
    }

    #[test]
    fn rejects_forward_size_path() {
        // The count field serializes after the array it would govern.
        let def = FieldDef::container(
            "root",
            vec![
                FieldDef::array("items", FieldDef::uint8("item"), "count"),
                FieldDef::uint32("count"),
            ],
        );
        assert!(matches!(
            Schema::build("t", def),
            Err(SchemaError::UnresolvableSizePath { .. })
        ));
    }

    #[test]
    fn accepts_backward_size_path() {
        let def = FieldDef::container(
            "root",
            vec![
                FieldDef::uint32("count"),
                FieldDef::array("items", FieldDef::uint8("item"), "count"),
            ],
        );
        assert!(Schema::build("t", def).is_ok());
    }

    #[test]
    fn rejects_size_path_to_non_integer() {
        let def = FieldDef::container(
            "root",
            vec![
                FieldDef::float32("count"),
                FieldDef::array("items", FieldDef::uint8("item"), "count"),
            ],
        );
        assert_eq!(
            Schema::build("t", def),
            Err(SchemaError::SizePathNotInteger {
                field: "items".into(),
                path: "count".into(),
            })
        );
    }

    #[test]
    fn rejects_bit_range_overflow() {
        let def = FieldDef::bit_struct(
            "flags",
            IntWidth::W8,
            vec![FieldDef::bit_field("low", 4), FieldDef::bit_field("high", 5)],
        );
        assert!(matches!(
            Schema::build("t", def),
            Err(SchemaError::BitRangeOverflow { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let def = FieldDef::container(
            "root",
            vec![FieldDef::uint8("x"), FieldDef::uint8("x")],
        );
        assert!(matches!(
            Schema::build("t", def),
            Err(SchemaError::DuplicateName { .. })
        ));
    }

    #[test]
    fn resolves_size_path_into_sibling_struct() {
        let def = FieldDef::container(
            "root",
            vec![
                FieldDef::struct_("header", 4, vec![FieldDef::uint16("len"), FieldDef::pad(2)]),
                FieldDef::str_sized("name", ".header.len"),
            ],
        );
        assert!(Schema::build("t", def).is_ok());
    }
}
