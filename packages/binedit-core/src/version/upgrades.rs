//! Ordered upgrade steps between format versions.
//!
//! Each step is total over the source tree: every leaf must be consumed by
//! a mapping or appear under an explicitly droppable prefix, enforced by
//! enumerating the source's leaves before the step runs. Fields new in the
//! target version start from their defaults.

use crate::defaults;
use crate::error::UpgradeError;
use crate::node::Node;
use crate::schema::FieldKind;
use crate::value::Value;
use crate::version::{current_version, schema_for, FormatKind, FormatVersion};

struct UpgradeStep {
    kind: FormatKind,
    from: u32,
    to: u32,
    /// Source paths (leaves or whole subtrees) this step carries over.
    mapped: &'static [&'static str],
    /// Source paths this step intentionally discards.
    droppable: &'static [&'static str],
    apply: fn(&Node, &mut Node) -> Result<(), UpgradeError>,
}

const STEPS: &[UpgradeStep] = &[
    UpgradeStep {
        kind: FormatKind::Config,
        from: 1,
        to: 2,
        mapped: &[
            "version_info",
            "general.general_flags",
            "general.backup_count",
            "general.backup_interval",
            "general.undo_level",
            "general.recent_max",
            "general.print_precision",
            "general.print_indent",
            "open_tags",
            "recent_tags",
            "directory_paths",
            "hotkeys",
        ],
        // Counts are rederived from the arrays at the next save.
        droppable: &["array_counts"],
        apply: config_v1_to_v2,
    },
    UpgradeStep {
        kind: FormatKind::Style,
        from: 1,
        to: 2,
        mapped: &[
            "style_version",
            "header.date_created",
            "header.date_modified",
            "appearance.theme_name",
            "appearance.colors",
            "appearance.fonts",
        ],
        droppable: &["array_counts"],
        apply: style_v1_to_v2,
    },
];

/// Runs the upgrade chain from the file's version to the current one.
pub fn upgrade(tree: Node, fv: &FormatVersion) -> Result<Node, UpgradeError> {
    let target = current_version(fv.kind);
    let mut version = fv.version;
    let mut tree = tree;
    while version < target {
        let step = STEPS
            .iter()
            .find(|s| s.kind == fv.kind && s.from == version)
            .ok_or(UpgradeError::UnsupportedVersion(version))?;
        tree = run_step(step, &tree, fv.kind)?;
        version = step.to;
    }
    Ok(tree)
}

fn run_step(
    step: &UpgradeStep,
    src: &Node,
    kind: FormatKind,
) -> Result<Node, UpgradeError> {
    check_totality(src, step)?;
    let schema = schema_for(kind, step.to).ok_or(UpgradeError::UnsupportedVersion(step.to))?;
    let mut dst = defaults::build_defaults(schema);
    (step.apply)(src, &mut dst)?;
    // The header must claim the new version regardless of what the
    // mapping copied.
    set_uint(&mut dst, version_field(kind), step.to as u64);
    Ok(dst)
}

fn version_field(kind: FormatKind) -> &'static str {
    match kind {
        FormatKind::Config => "version_info.version",
        FormatKind::Style => "style_version.version",
    }
}

/// Never drop a field silently: every source leaf must sit under a mapped
/// or droppable prefix.
fn check_totality(src: &Node, step: &UpgradeStep) -> Result<(), UpgradeError> {
    let mut leaves = Vec::new();
    collect_leaf_paths(src, String::new(), &mut leaves);
    for leaf in leaves {
        let covered = step
            .mapped
            .iter()
            .chain(step.droppable)
            .any(|prefix| covers(prefix, &leaf));
        if !covered {
            return Err(UpgradeError::FieldLost(leaf));
        }
    }
    Ok(())
}

fn covers(prefix: &str, path: &str) -> bool {
    path == prefix
        || (path.starts_with(prefix)
            && matches!(path.as_bytes().get(prefix.len()), Some(b'.') | Some(b'[')))
}

fn collect_leaf_paths(node: &Node, prefix: String, out: &mut Vec<String>) {
    match &node.def().kind {
        // Dead bytes carry no information worth protecting.
        FieldKind::Pad { .. } => {}
        FieldKind::Array { .. } => {
            for (i, child) in node.children().iter().enumerate() {
                collect_leaf_paths(child, format!("{}[{}]", prefix, i), out);
            }
        }
        kind if kind.is_composite() || !node.children().is_empty() => {
            for child in node.children() {
                let path = if prefix.is_empty() {
                    child.name().to_string()
                } else {
                    format!("{}.{}", prefix, child.name())
                };
                collect_leaf_paths(child, path, out);
            }
        }
        _ => out.push(prefix),
    }
}

// Mapping helpers. Lookups that fail leave the target's default in place;
// totality has already guaranteed the source side exists for mapped paths.

fn copy_value(src: &Node, dst: &mut Node, from: &str, to: &str) {
    if let (Ok(s), Ok(d)) = (src.get(from), dst.get_mut(to)) {
        if let Some(v) = s.value() {
            let _ = d.set_value(v.clone());
        }
    }
}

fn copy_flag(src: &Node, dst: &mut Node, from: (&str, &str), to: (&str, &str)) {
    let on = src.get(from.0).ok().and_then(|n| n.flag(from.1));
    if let (Some(on), Ok(d)) = (on, dst.get_mut(to.0)) {
        let _ = d.set_flag(to.1, on);
    }
}

fn copy_elements(src: &Node, dst: &mut Node, from: &str, to: &str) {
    if let (Ok(s), Ok(d)) = (src.get(from), dst.get_mut(to)) {
        if d.def().kind.is_composite() {
            let elements: Vec<Node> = s.children().to_vec();
            *d.children_mut() = elements;
        }
    }
}

fn config_v1_to_v2(src: &Node, dst: &mut Node) -> Result<(), UpgradeError> {
    copy_value(src, dst, "version_info.date_created", "version_info.date_created");
    copy_value(src, dst, "version_info.date_modified", "version_info.date_modified");

    copy_value(src, dst, "general.backup_count", "tag_backup.max_count");
    copy_value(src, dst, "general.backup_interval", "tag_backup.interval");
    copy_value(src, dst, "general.undo_level", "tag_windows.max_undos");
    copy_value(src, dst, "general.recent_max", "app_window.recent_tag_max");
    copy_value(src, dst, "general.print_precision", "tag_printing.print_precision");
    copy_value(src, dst, "general.print_indent", "tag_printing.print_indent");

    let flags = "general.general_flags";
    copy_flag(src, dst, (flags, "load_last_workspace"), ("app_window.flags", "load_last_workspace"));
    copy_flag(src, dst, (flags, "log_output"), ("app_window.flags", "log_output"));
    copy_flag(src, dst, (flags, "debug_mode"), ("app_window.flags", "debug_mode"));
    // Bit 0 of the v2 window flags.
    copy_flag(
        src,
        dst,
        (flags, "sync_window_movement"),
        ("tag_windows.window_flags", "sync_window_movement"),
    );

    copy_elements(src, dst, "open_tags", "open_tags");
    copy_elements(src, dst, "recent_tags", "recent_tags");
    copy_elements(src, dst, "directory_paths", "directory_paths");
    copy_elements(src, dst, "hotkeys", "all_hotkeys.hotkeys");
    Ok(())
}

fn style_v1_to_v2(src: &Node, dst: &mut Node) -> Result<(), UpgradeError> {
    copy_value(src, dst, "header.date_created", "header.date_created");
    copy_value(src, dst, "header.date_modified", "header.date_modified");
    copy_value(src, dst, "appearance.theme_name", "appearance.theme_name");
    copy_elements(src, dst, "appearance.colors", "appearance.colors");
    copy_elements(src, dst, "appearance.fonts", "appearance.fonts");
    Ok(())
}

fn set_uint(tree: &mut Node, path: &str, value: u64) {
    if let Ok(node) = tree.get_mut(path) {
        let _ = node.set_value(Value::UInt(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{serialize, CodecOptions};
    use crate::defaults::build_defaults;
    use crate::formats;
    use crate::version::load;
    use pretty_assertions::assert_eq;

    fn v1_config_bytes(mutate: impl FnOnce(&mut Node)) -> Vec<u8> {
        let mut tree = build_defaults(formats::config_v1());
        mutate(&mut tree);
        serialize(&mut tree, &CodecOptions::default()).unwrap()
    }

    #[test]
    fn upgrades_v1_settings_into_v2_blocks() {
        let bytes = v1_config_bytes(|tree| {
            tree.get_mut("general.backup_count")
                .unwrap()
                .set_value(Value::UInt(3))
                .unwrap();
            tree.get_mut("general.general_flags")
                .unwrap()
                .set_flag("sync_window_movement", true)
                .unwrap();
            tree.get_mut("version_info.date_created")
                .unwrap()
                .set_value(Value::UInt(12345))
                .unwrap();
        });

        let (tree, fv) = load(&bytes, &CodecOptions::default()).unwrap();
        assert_eq!(fv.version, 1);
        assert_eq!(
            tree.get("tag_backup.max_count").unwrap().value(),
            Some(&Value::UInt(3))
        );
        assert_eq!(
            tree.get("tag_windows.window_flags").unwrap().flag("sync_window_movement"),
            Some(true)
        );
        assert_eq!(
            tree.get("version_info.date_created").unwrap().value(),
            Some(&Value::UInt(12345))
        );
        // The upgraded tree claims the current version.
        assert_eq!(
            tree.get("version_info.version").unwrap().value(),
            Some(&Value::UInt(2))
        );
    }

    #[test]
    fn upgraded_tree_is_v2_conformant() {
        let bytes = v1_config_bytes(|_| {});
        let (mut tree, _) = load(&bytes, &CodecOptions::default()).unwrap();
        let opts = CodecOptions::default();
        let reserialized = serialize(&mut tree, &opts).unwrap();
        let reopened = crate::codec::parse(&reserialized, formats::config_v2(), &opts).unwrap();
        assert_eq!(reopened, tree);
    }

    #[test]
    fn hotkeys_move_to_the_split_lists() {
        let bytes = v1_config_bytes(|tree| {
            let hotkeys = tree.get_mut("hotkeys").unwrap();
            crate::defaults::append_element(hotkeys);
            tree.get_mut("hotkeys[0].method")
                .unwrap()
                .set_value(Value::UInt(9))
                .unwrap();
        });
        let (tree, _) = load(&bytes, &CodecOptions::default()).unwrap();
        assert_eq!(tree.get("all_hotkeys.hotkeys").unwrap().children().len(), 1);
        assert_eq!(
            tree.get("all_hotkeys.hotkeys[0].method").unwrap().value(),
            Some(&Value::UInt(9))
        );
        assert_eq!(
            tree.get("all_hotkeys.tag_window_hotkeys").unwrap().children().len(),
            0
        );
    }

    #[test]
    fn style_v1_upgrade_keeps_appearance() {
        let mut tree = build_defaults(formats::style_v1());
        tree.get_mut("appearance.theme_name")
            .unwrap()
            .set_value(Value::Str("midnight".into()))
            .unwrap();
        let colors = tree.get_mut("appearance.colors").unwrap();
        crate::defaults::append_element(colors);
        tree.get_mut("appearance.colors[0].r")
            .unwrap()
            .set_value(Value::UInt(32))
            .unwrap();
        let bytes = serialize(&mut tree, &CodecOptions::default()).unwrap();

        let (upgraded, fv) = load(&bytes, &CodecOptions::default()).unwrap();
        assert_eq!(fv.kind, FormatKind::Style);
        assert_eq!(
            upgraded.get("appearance.theme_name").unwrap().value(),
            Some(&Value::Str("midnight".into()))
        );
        assert_eq!(
            upgraded.get("appearance.colors[0].r").unwrap().value(),
            Some(&Value::UInt(32))
        );
        // The widgets block is new in v2 and comes from defaults.
        assert_eq!(
            upgraded
                .get("appearance.widgets.widget_metrics.title_width")
                .unwrap()
                .value(),
            Some(&Value::UInt(35))
        );
    }
}
