//! Built-in schemas for the application's own persisted state: the config
//! file (`.cfg`) and appearance style file (`.sty`), current and legacy
//! versions.
//!
//! Schemas are built once on first use. A failure to build is a defect in
//! the definitions below, caught by the test suite, so the accessors panic
//! rather than propagate.

mod config;
mod style;

use std::sync::OnceLock;

use crate::schema::{FieldDef, FlagDef, Schema, VariantDef};

pub use config::{CONFIG_MAGIC, CONFIG_VERSION};
pub use style::{STYLE_MAGIC, STYLE_VERSION};

macro_rules! cached_schema {
    ($fn_name:ident, $builder:path, $label:expr) => {
        /// # Panics
        /// Panics if the built-in definition fails validation; this is a
        /// startup-fatal defect, not a runtime condition.
        pub fn $fn_name() -> &'static Schema {
            static CELL: OnceLock<Schema> = OnceLock::new();
            CELL.get_or_init(|| {
                $builder().unwrap_or_else(|e| panic!("{} schema invalid: {}", $label, e))
            })
        }
    };
}

cached_schema!(config_v2, config::build_v2, "config v2");
cached_schema!(config_v1, config::build_v1, "config v1");
cached_schema!(style_v2, style::build_v2, "style v2");
cached_schema!(style_v1, style::build_v1, "style v1");

/// Builds sequential flag definitions, bit index by position.
fn flag_set(names: &[&str]) -> Vec<FlagDef> {
    names
        .iter()
        .enumerate()
        .map(|(bit, name)| FlagDef::new(name, bit as u32))
        .collect()
}

/// Builds sequential enum variants, value by position.
fn variant_set(names: &[&str]) -> Vec<VariantDef> {
    names
        .iter()
        .enumerate()
        .map(|(value, name)| VariantDef::new(name, value as u64))
        .collect()
}

/// A `2-byte length + utf8 path` entry, shared by the recent-tag and
/// directory-path tails.
fn sized_path_entry(name: &str) -> FieldDef {
    FieldDef::container(
        name,
        vec![
            FieldDef::uint16("length").metadata_only().uneditable(),
            FieldDef::str_sized("path", ".length"),
        ],
    )
}
