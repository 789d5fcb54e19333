//! Style file (`.sty`) schemas and the shared appearance block.

use crate::error::SchemaError;
use crate::schema::{FieldDef, IntWidth, Schema};

use super::flag_set;

pub const STYLE_MAGIC: [u8; 4] = *b"lytS";
pub const STYLE_VERSION: u32 = 2;

const COLOR_SLOTS: &[&str] = &[
    "default_bg",
    "comment_bg",
    "frame_bg",
    "button",
    "text_normal",
    "text_disabled",
    "text_highlighted",
    "enum_normal",
    "enum_disabled",
    "entry_normal",
    "entry_disabled",
    "invalid_path",
    "tooltip_bg",
];

const FONT_SLOTS: &[&str] = &[
    "default",
    "fixed",
    "fixed_small",
    "heading",
    "heading_small",
    "frame_title",
    "treeview",
    "console",
];

const DEPTH_SLOTS: &[&str] = &["frame", "button", "entry", "listbox", "comment"];

fn color_entry() -> FieldDef {
    FieldDef::struct_(
        "color",
        3,
        vec![
            FieldDef::uint8("r"),
            FieldDef::uint8("g"),
            FieldDef::uint8("b"),
        ],
    )
    .horizontal()
}

fn font_entry() -> FieldDef {
    FieldDef::struct_(
        "font",
        36,
        vec![
            FieldDef::str_fixed("family", 32).default_value("Courier"),
            FieldDef::uint16("size").default_value(10u64).min(1.0).max(72.0),
            FieldDef::bool_(
                "flags",
                IntWidth::W16,
                flag_set(&["bold", "italic", "underline"]),
            ),
        ],
    )
}

/// The appearance block shared by config and style files: theme name,
/// widget sizing, color table, font table. The widgets sub-block arrived
/// in version 2, so legacy style files build without it.
pub(super) fn appearance_block(with_widgets: bool) -> FieldDef {
    let mut fields = vec![FieldDef::str_fixed("theme_name", 64).default_value("default")];
    if with_widgets {
        fields.push(FieldDef::container(
            "widgets",
            vec![
                FieldDef::struct_(
                    "widget_metrics",
                    32,
                    vec![
                        FieldDef::uint16("title_width").default_value(35u64),
                        FieldDef::uint16("scroll_menu_max_width").default_value(35u64),
                        FieldDef::uint16("scroll_menu_max_height").default_value(15u64),
                        FieldDef::uint16("min_entry_width").default_value(4u64),
                        FieldDef::uint16("textbox_max_width").default_value(100u64),
                        FieldDef::uint16("textbox_max_height").default_value(30u64),
                        FieldDef::uint16("bool_frame_max_width").default_value(270u64),
                        FieldDef::uint16("bool_frame_max_height").default_value(255u64),
                        FieldDef::pad(16),
                    ],
                ),
                FieldDef::array(
                    "depths",
                    FieldDef::uint16("depth").max(32.0),
                    "array_counts.widget_depth_count",
                )
                .name_map(DEPTH_SLOTS),
            ],
        ));
    }
    fields.push(
        FieldDef::array("colors", color_entry(), "array_counts.color_count")
            .name_map(COLOR_SLOTS),
    );
    fields.push(
        FieldDef::array("fonts", font_entry(), "array_counts.font_count").name_map(FONT_SLOTS),
    );
    FieldDef::container("appearance", fields)
}

fn style_version(version: u32) -> FieldDef {
    FieldDef::struct_(
        "style_version",
        8,
        vec![
            FieldDef::str_fixed("magic", 4)
                .default_value("lytS")
                .hidden()
                .uneditable(),
            FieldDef::uint32("version")
                .default_value(version as u64)
                .metadata_only()
                .uneditable(),
        ],
    )
}

fn count(name: &str) -> FieldDef {
    FieldDef::uint32(name).metadata_only().uneditable()
}

pub(super) fn build_v2() -> Result<Schema, SchemaError> {
    let root = FieldDef::container(
        "style",
        vec![
            style_version(STYLE_VERSION),
            FieldDef::struct_(
                "header",
                120,
                vec![
                    FieldDef::timestamp("date_created").uneditable(),
                    FieldDef::timestamp("date_modified").uneditable(),
                    FieldDef::pad(112),
                ],
            ),
            FieldDef::struct_(
                "array_counts",
                128,
                vec![
                    count("widget_depth_count"),
                    count("color_count"),
                    count("font_count"),
                    FieldDef::pad(116),
                ],
            )
            .metadata_only(),
            appearance_block(true),
        ],
    );
    Schema::build("style", root)
}

pub(super) fn build_v1() -> Result<Schema, SchemaError> {
    let root = FieldDef::container(
        "style_v1",
        vec![
            style_version(1),
            FieldDef::struct_(
                "header",
                24,
                vec![
                    FieldDef::timestamp("date_created").uneditable(),
                    FieldDef::timestamp("date_modified").uneditable(),
                    FieldDef::pad(16),
                ],
            ),
            FieldDef::struct_(
                "array_counts",
                16,
                vec![count("color_count"), count("font_count"), FieldDef::pad(8)],
            )
            .metadata_only(),
            appearance_block(false),
        ],
    );
    Schema::build("style_v1", root)
}
