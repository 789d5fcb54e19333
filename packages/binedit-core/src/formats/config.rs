//! Config file (`.cfg`) schemas.
//!
//! The current layout is version 2. Version 1 packed most scalar settings
//! into a single `general` block and kept hotkeys in one list; it is
//! retained only so the upgrade pipeline can read it.

use crate::error::SchemaError;
use crate::schema::{FieldDef, Schema};

use super::style::appearance_block;
use super::{flag_set, sized_path_entry, variant_set};

pub const CONFIG_MAGIC: [u8; 4] = *b"alnB";
pub const CONFIG_VERSION: u32 = 2;

/// Hotkey modifier nibble. Values are combination codes, not a bitmask.
const MODIFIERS: &[&str] = &[
    "none",
    "ctrl",
    "alt",
    "shift",
    "ctrl_alt",
    "ctrl_shift",
    "alt_shift",
    "ctrl_alt_shift",
];

const KEYS: &[&str] = &[
    "none", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6",
    "7", "8", "9", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11",
    "f12", "space", "enter", "escape", "tab", "backspace", "delete", "insert", "home",
    "end", "page_up", "page_down", "up", "down", "left", "right",
];

const METHODS: &[&str] = &[
    "noop",
    "load_tags",
    "new_tag",
    "save_tag",
    "save_tag_as",
    "save_all",
    "close_tag",
    "close_all_tags",
    "print_tag",
    "undo_edit",
    "redo_edit",
    "copy_node",
    "cut_node",
    "paste_node",
    "delete_node",
    "show_defs",
    "show_window_manager",
    "apply_config_changes",
    "cascade",
    "tile_vertical",
    "tile_horizontal",
    "minimize_all",
    "restore_all",
    "clear_console",
    "exit_program",
];

/// One hotkey: a packed key combination and the method it invokes. The
/// list label comes from the bound method's variant name.
pub(super) fn hotkey_entry() -> FieldDef {
    FieldDef::struct_(
        "hotkey",
        8,
        vec![
            FieldDef::bit_struct(
                "combo",
                crate::schema::IntWidth::W32,
                vec![
                    FieldDef::bit_enum("modifier", 4, variant_set(MODIFIERS)),
                    FieldDef::bit_enum("key", 28, variant_set(KEYS)),
                ],
            )
            .horizontal(),
            FieldDef::enum32("method", variant_set(METHODS)),
        ],
    )
}

fn version_info(version: u32, magic: &str) -> FieldDef {
    FieldDef::struct_(
        "version_info",
        16,
        vec![
            FieldDef::str_fixed("magic", 4)
                .default_value(magic)
                .hidden()
                .uneditable(),
            FieldDef::uint32("version")
                .default_value(version as u64)
                .metadata_only()
                .uneditable(),
            FieldDef::timestamp("date_created").uneditable(),
            FieldDef::timestamp("date_modified").uneditable(),
        ],
    )
}

fn count(name: &str) -> FieldDef {
    FieldDef::uint32(name).metadata_only().uneditable()
}

fn open_tag_entry() -> FieldDef {
    FieldDef::container(
        "open_tag",
        vec![
            FieldDef::struct_(
                "header",
                64,
                vec![
                    FieldDef::bool32("flags", flag_set(&["minimized"])),
                    FieldDef::int16("offset_x"),
                    FieldDef::int16("offset_y"),
                    FieldDef::uint16("width"),
                    FieldDef::uint16("height"),
                    FieldDef::uint16("def_id_len").metadata_only().uneditable(),
                    FieldDef::uint16("path_len").metadata_only().uneditable(),
                    FieldDef::pad(48),
                ],
            ),
            FieldDef::str_sized("def_id", ".header.def_id_len"),
            FieldDef::str_sized("path", ".header.path_len"),
        ],
    )
    .dyn_name(".path")
}

pub(super) fn build_v2() -> Result<Schema, SchemaError> {
    let root = FieldDef::container(
        "config",
        vec![
            version_info(CONFIG_VERSION, "alnB"),
            FieldDef::struct_(
                "array_counts",
                128,
                vec![
                    count("open_tag_count"),
                    count("recent_tag_count"),
                    count("directory_path_count"),
                    count("widget_depth_count"),
                    count("color_count"),
                    count("hotkey_count"),
                    count("tag_window_hotkey_count"),
                    count("font_count"),
                    FieldDef::pad(96),
                ],
            )
            .metadata_only(),
            FieldDef::struct_(
                "app_window",
                64,
                vec![
                    FieldDef::bool32(
                        "flags",
                        flag_set(&[
                            "load_last_workspace",
                            "log_output",
                            "log_tag_print",
                            "debug_mode",
                            "disable_io_redirect",
                        ]),
                    ),
                    FieldDef::uint32("recent_tag_max")
                        .default_value(20u64)
                        .max(50.0)
                        .tooltip("How many entries the recent-tags menu keeps"),
                    FieldDef::uint32("window_menu_max_len").default_value(15u64),
                    FieldDef::uint16("app_width").default_value(640u64),
                    FieldDef::uint16("app_height").default_value(450u64),
                    FieldDef::int16("app_offset_x"),
                    FieldDef::int16("app_offset_y"),
                    FieldDef::uint16("cascade_stride").default_value(60u64),
                    FieldDef::uint16("tile_stride_x").default_value(120u64),
                    FieldDef::uint16("tile_stride_y").default_value(30u64),
                    FieldDef::pad(38),
                ],
            )
            .gui_name("Main window"),
            FieldDef::struct_(
                "tag_windows",
                64,
                vec![
                    FieldDef::bool32(
                        "file_handling_flags",
                        vec![
                            crate::schema::FlagDef::new("allow_corrupt", 0).tooltip(
                                "Keep nonconforming bytes instead of refusing the file",
                            ),
                            crate::schema::FlagDef::new("integrity_test", 1).tooltip(
                                "Verify every save by re-reading it before replacing the original",
                            ),
                            crate::schema::FlagDef::new("write_as_temp", 2),
                            crate::schema::FlagDef::new("backup_tags", 3),
                        ],
                    ),
                    FieldDef::bool32(
                        "window_flags",
                        flag_set(&[
                            "sync_window_movement",
                            "cap_window_size",
                            "dont_shrink_width",
                            "dont_shrink_height",
                            "auto_resize_width",
                            "auto_resize_height",
                        ]),
                    ),
                    FieldDef::bool32(
                        "widget_flags",
                        flag_set(&[
                            "show_invisible",
                            "show_structure_meta",
                            "edit_uneditable",
                            "show_comments",
                            "show_tooltips",
                            "show_sidetips",
                            "evaluate_entry_fields",
                            "enforce_min",
                            "enforce_max",
                            "use_gui_names",
                            "show_all_bools",
                        ]),
                    ),
                    FieldDef::uint32("max_undos")
                        .default_value(1000u64)
                        .tooltip("Edits kept per document before the oldest are evicted"),
                    FieldDef::uint16("default_window_width").default_value(480u64),
                    FieldDef::uint16("default_window_height").default_value(640u64),
                    FieldDef::uint16("scroll_increment_x").default_value(50u64),
                    FieldDef::uint16("scroll_increment_y").default_value(50u64),
                    FieldDef::pad(40),
                ],
            )
            .gui_name("Tag windows"),
            FieldDef::struct_(
                "tag_printing",
                16,
                vec![
                    FieldDef::bool32(
                        "print_flags",
                        vec![
                            crate::schema::FlagDef::new("show_names", 0),
                            crate::schema::FlagDef::new("show_types", 1),
                            crate::schema::FlagDef::new("show_offsets", 2),
                            crate::schema::FlagDef::new("show_sizes", 3),
                            crate::schema::FlagDef::new("show_indexes", 4),
                            crate::schema::FlagDef::new("show_values", 5),
                            crate::schema::FlagDef::new("show_trueonly", 6),
                            crate::schema::FlagDef::new("show_unique", 7)
                                .tooltip("Advisory; kept for layout compatibility"),
                            crate::schema::FlagDef::new("show_binsize", 8)
                                .tooltip("Advisory; kept for layout compatibility"),
                        ],
                    ),
                    FieldDef::uint32("print_precision").default_value(10u64),
                    FieldDef::uint32("print_indent").default_value(4u64),
                    FieldDef::pad(4),
                ],
            ),
            FieldDef::struct_(
                "tag_backup",
                64,
                vec![
                    FieldDef::bool32("flags", flag_set(&["notify_when_created"])),
                    FieldDef::uint32("max_count")
                        .default_value(3u64)
                        .tooltip("Rolling backups kept per file; zero disables backups"),
                    FieldDef::float32("interval")
                        .default_value(300.0)
                        .min(0.0)
                        .tooltip("Minimum seconds between backups of one file"),
                    FieldDef::str_fixed("folder_basename", 48).default_value("backup"),
                    FieldDef::pad(4),
                ],
            ),
            FieldDef::array("open_tags", open_tag_entry(), "array_counts.open_tag_count")
                .metadata_only(),
            FieldDef::array(
                "recent_tags",
                sized_path_entry("recent_tag"),
                "array_counts.recent_tag_count",
            )
            .dyn_name(".path")
            .metadata_only(),
            FieldDef::array(
                "directory_paths",
                sized_path_entry("directory_path"),
                "array_counts.directory_path_count",
            )
            .name_map(&[
                "last_load_dir",
                "last_defs_dir",
                "last_imp_dir",
                "curr_dir",
                "tags_dir",
                "debug_log_path",
                "styles_dir",
            ])
            .metadata_only(),
            appearance_block(true),
            FieldDef::container(
                "all_hotkeys",
                vec![
                    FieldDef::array("hotkeys", hotkey_entry(), "array_counts.hotkey_count")
                        .dyn_name(".method.enum_name"),
                    FieldDef::array(
                        "tag_window_hotkeys",
                        hotkey_entry(),
                        "array_counts.tag_window_hotkey_count",
                    )
                    .dyn_name(".method.enum_name"),
                ],
            ),
        ],
    );
    Schema::build("config", root)
}

pub(super) fn build_v1() -> Result<Schema, SchemaError> {
    let root = FieldDef::container(
        "config_v1",
        vec![
            version_info(1, "alnB"),
            FieldDef::struct_(
                "general",
                64,
                vec![
                    FieldDef::bool32(
                        "general_flags",
                        flag_set(&[
                            "load_last_workspace",
                            "log_output",
                            "debug_mode",
                            "sync_window_movement",
                        ]),
                    ),
                    FieldDef::uint32("backup_count").default_value(1u64),
                    FieldDef::float32("backup_interval").default_value(300.0),
                    FieldDef::uint32("undo_level").default_value(1000u64),
                    FieldDef::uint32("recent_max").default_value(20u64),
                    FieldDef::uint32("print_precision").default_value(10u64),
                    FieldDef::uint32("print_indent").default_value(4u64),
                    FieldDef::pad(36),
                ],
            ),
            FieldDef::struct_(
                "array_counts",
                64,
                vec![
                    count("open_tag_count"),
                    count("recent_tag_count"),
                    count("directory_path_count"),
                    count("hotkey_count"),
                    FieldDef::pad(48),
                ],
            )
            .metadata_only(),
            FieldDef::array("open_tags", open_tag_entry(), "array_counts.open_tag_count")
                .metadata_only(),
            FieldDef::array(
                "recent_tags",
                sized_path_entry("recent_tag"),
                "array_counts.recent_tag_count",
            )
            .metadata_only(),
            FieldDef::array(
                "directory_paths",
                sized_path_entry("directory_path"),
                "array_counts.directory_path_count",
            )
            .name_map(&["last_load_dir", "last_defs_dir", "curr_dir", "tags_dir"])
            .metadata_only(),
            FieldDef::array("hotkeys", hotkey_entry(), "array_counts.hotkey_count")
                .dyn_name(".method.enum_name"),
        ],
    );
    Schema::build("config_v1", root)
}
