//! The GUI-agnostic widget-binding contract.
//!
//! The frontend never inspects field kinds directly: it asks this layer
//! what control a node needs, whether it is visible and editable under the
//! current application flags, what label an array element carries, and it
//! writes user input back through here so every edit lands in the
//! document's history.

pub mod eval;

use tracing::warn;

use crate::codec::CodecOptions;
use crate::defaults;
use crate::document::Document;
use crate::error::{Error, EvalError, PathError};
use crate::node::Node;
use crate::schema::path::{FieldPath, Segment};
use crate::schema::{FieldDef, FieldKind, Orient, Visibility};
use crate::value::Value;

/// Which input control a field maps to. Derived solely from the schema
/// kind and metadata, never from the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// Bounded numeric entry, optionally expression-evaluating.
    NumericEntry,
    /// One checkbox per named flag.
    CheckboxGrid,
    /// Named-variant dropdown.
    Dropdown,
    TextEntry,
    /// Expandable list with per-element labels.
    ExpandableList,
    /// Grouping frame with an orientation hint.
    Frame,
    /// Dead bytes; nothing to render.
    Spacer,
}

/// Application flags that shape rendering and editability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingFlags {
    pub show_invisible: bool,
    pub show_structure_meta: bool,
    pub edit_uneditable: bool,
    pub evaluate_entry_fields: bool,
    pub debug_mode: bool,
}

pub fn widget_kind(def: &FieldDef) -> WidgetKind {
    match &def.kind {
        FieldKind::Int { .. } | FieldKind::Float { .. } | FieldKind::Timestamp32 => {
            WidgetKind::NumericEntry
        }
        FieldKind::Bool { .. } => WidgetKind::CheckboxGrid,
        FieldKind::Enum { .. } => WidgetKind::Dropdown,
        FieldKind::BitField { variants, .. } => {
            if variants.is_empty() {
                WidgetKind::NumericEntry
            } else {
                WidgetKind::Dropdown
            }
        }
        FieldKind::Str { .. } => WidgetKind::TextEntry,
        FieldKind::Array { .. } => WidgetKind::ExpandableList,
        FieldKind::Container { .. } | FieldKind::Struct { .. } | FieldKind::BitStruct { .. } => {
            WidgetKind::Frame
        }
        FieldKind::Pad { .. } => WidgetKind::Spacer,
    }
}

pub fn is_visible(def: &FieldDef, flags: &BindingFlags) -> bool {
    match def.meta.visible {
        Visibility::Shown => true,
        Visibility::Hidden => flags.show_invisible,
        Visibility::Metadata => flags.show_structure_meta,
        Visibility::DebugOnly => flags.debug_mode,
    }
}

pub fn is_editable(def: &FieldDef, flags: &BindingFlags) -> bool {
    def.meta.editable || flags.edit_uneditable
}

pub fn display_name(def: &FieldDef) -> &str {
    def.meta.gui_name.as_deref().unwrap_or(&def.name)
}

pub fn orientation(def: &FieldDef) -> Orient {
    def.meta.orient
}

/// Children to render, in declaration order, filtered by the visibility
/// rules. Padding never renders.
pub fn visible_children<'a>(node: &'a Node, flags: &BindingFlags) -> Vec<&'a Node> {
    node.children()
        .iter()
        .filter(|child| !matches!(child.def().kind, FieldKind::Pad { .. }))
        .filter(|child| is_visible(child.def(), flags))
        .collect()
}

/// Label for one array element: the NAME_MAP alias when the slot has one,
/// else the DYN_NAME_PATH evaluated inside the element, else `name[i]`.
pub fn element_label(array: &Node, index: usize) -> String {
    let def = array.def();
    if let Some(alias) = def.meta.name_map.get(index) {
        return alias.clone();
    }
    if let Some(label) = dyn_label(array, index) {
        return label;
    }
    format!("{}[{}]", display_name(def), index)
}

fn dyn_label(array: &Node, index: usize) -> Option<String> {
    let path = array.def().meta.dyn_name_path.as_deref()?;
    let parsed = FieldPath::parse(path).ok()?;
    let element = array.children().get(index)?;

    // A trailing `enum_name` segment asks for the variant name of the
    // enum the rest of the path points at.
    let (segments, want_variant) = match parsed.segments.split_last() {
        Some((Segment::Name(last), rest)) if last == "enum_name" => (rest, true),
        _ => (&parsed.segments[..], false),
    };
    let target = element.at_segments(segments)?;
    let value = target.value()?;
    if want_variant {
        let raw = value.as_u64()?;
        return match target.def().variant_name(raw) {
            Some(name) => Some(name.to_string()),
            // Unknown enum integers display numerically.
            None => Some(raw.to_string()),
        };
    }
    match value {
        Value::Str(s) if !s.is_empty() => Some(s.clone()),
        Value::Str(_) => None,
        other => Some(other.to_string()),
    }
}

/// Current value of an enum-like node as its display string.
pub fn enum_display(node: &Node) -> Option<String> {
    let raw = node.value()?.as_u64()?;
    Some(match node.def().variant_name(raw) {
        Some(name) => name.to_string(),
        None => raw.to_string(),
    })
}

fn number_error(raw: &str) -> Error {
    EvalError::UnexpectedToken {
        expected: "number",
        found: raw.trim().to_string(),
    }
    .into()
}

/// Coerces raw entry text to the field's value type, running it through
/// the expression evaluator when the application asks for that.
pub fn parse_input(def: &FieldDef, raw: &str, flags: &BindingFlags) -> Result<Value, Error> {
    let numeric = |raw: &str| -> Result<f64, Error> {
        if flags.evaluate_entry_fields {
            Ok(eval::evaluate(raw)?)
        } else {
            raw.trim().parse::<f64>().map_err(|_| number_error(raw))
        }
    };
    match &def.kind {
        FieldKind::Int { signed: true, .. } => {
            Ok(Value::Int(numeric(raw)?.round() as i64))
        }
        FieldKind::Int { signed: false, .. }
        | FieldKind::Bool { .. }
        | FieldKind::Timestamp32 => {
            let v = numeric(raw)?.round();
            if v < 0.0 {
                return Err(number_error(raw));
            }
            Ok(Value::UInt(v as u64))
        }
        FieldKind::Enum { .. } | FieldKind::BitField { .. } => {
            // Variant names are accepted alongside raw integers.
            if let Some(value) = def.variant_value(raw.trim()) {
                return Ok(Value::UInt(value));
            }
            let v = numeric(raw)?.round();
            if v < 0.0 {
                return Err(number_error(raw));
            }
            Ok(Value::UInt(v as u64))
        }
        FieldKind::Float { .. } => Ok(Value::Float(numeric(raw)?)),
        FieldKind::Str { .. } => Ok(Value::Str(raw.to_string())),
        other => Err(PathError::TypeMismatch {
            path: def.name.clone(),
            expected: "editable leaf",
            got: other.kind_name(),
        }
        .into()),
    }
}

/// Writes user input to a node through the document's edit history.
///
/// Returns `Ok(false)` without touching the document when the path is
/// stale or the field refuses edits; path errors are programmer errors at
/// this layer, logged and ignored. Input and constraint errors propagate
/// so the frontend can surface them at the entry widget.
pub fn write_value(
    doc: &mut Document,
    path: &str,
    raw: &str,
    flags: &BindingFlags,
    opts: &CodecOptions,
) -> Result<bool, Error> {
    let def = match doc.get(path) {
        Ok(node) => node.def().clone(),
        Err(err) => {
            warn!(path, %err, "binding refers to a missing node");
            return Ok(false);
        }
    };
    if !is_editable(&def, flags) {
        return Ok(false);
    }
    let value = parse_input(&def, raw, flags)?;
    let value = defaults::apply_bounds(&def, value, opts)?;
    match doc.set(path, value) {
        Ok(()) => Ok(true),
        Err(Error::Path(err)) => {
            warn!(path, %err, "binding write raced a structural change");
            Ok(false)
        }
        Err(other) => Err(other),
    }
}

/// Flips one named flag of a `Bool` field through the edit history.
pub fn toggle_flag(
    doc: &mut Document,
    path: &str,
    flag: &str,
    on: bool,
    flags: &BindingFlags,
) -> Result<bool, Error> {
    let (def, mask) = match doc.get(path) {
        Ok(node) => match (node.def().clone(), node.value().and_then(Value::as_u64)) {
            (def, Some(mask)) => (def, mask),
            (def, None) => {
                warn!(path, field = %def.name, "flag toggle on a non-mask node");
                return Ok(false);
            }
        },
        Err(err) => {
            warn!(path, %err, "binding refers to a missing node");
            return Ok(false);
        }
    };
    if !is_editable(&def, flags) {
        return Ok(false);
    }
    let bit = match def.flag_bit(flag) {
        Some(bit) => bit,
        None => {
            warn!(path, flag, "unknown flag name");
            return Ok(false);
        }
    };
    let new = if on { mask | (1 << bit) } else { mask & !(1 << bit) };
    match doc.set(path, Value::UInt(new)) {
        Ok(()) => Ok(true),
        Err(Error::Path(err)) => {
            warn!(path, %err, "binding write raced a structural change");
            Ok(false)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, VariantDef};

    #[test]
    fn widget_kinds_follow_schema_kinds() {
        assert_eq!(widget_kind(&FieldDef::uint32("x")), WidgetKind::NumericEntry);
        assert_eq!(widget_kind(&FieldDef::float32("x")), WidgetKind::NumericEntry);
        assert_eq!(
            widget_kind(&FieldDef::bool32("x", vec![])),
            WidgetKind::CheckboxGrid
        );
        assert_eq!(
            widget_kind(&FieldDef::enum32("x", vec![])),
            WidgetKind::Dropdown
        );
        assert_eq!(widget_kind(&FieldDef::str_fixed("x", 4)), WidgetKind::TextEntry);
        assert_eq!(widget_kind(&FieldDef::pad(4)), WidgetKind::Spacer);
    }

    #[test]
    fn visibility_combines_field_and_flags() {
        let hidden = FieldDef::uint8("x").hidden();
        let meta = FieldDef::uint8("x").metadata_only();
        let none = BindingFlags::default();
        assert!(!is_visible(&hidden, &none));
        assert!(!is_visible(&meta, &none));
        assert!(is_visible(
            &hidden,
            &BindingFlags {
                show_invisible: true,
                ..BindingFlags::default()
            }
        ));
        assert!(is_visible(
            &meta,
            &BindingFlags {
                show_structure_meta: true,
                ..BindingFlags::default()
            }
        ));
    }

    #[test]
    fn uneditable_yields_to_override_flag() {
        let def = FieldDef::uint8("x").uneditable();
        assert!(!is_editable(&def, &BindingFlags::default()));
        assert!(is_editable(
            &def,
            &BindingFlags {
                edit_uneditable: true,
                ..BindingFlags::default()
            }
        ));
    }

    #[test]
    fn input_parses_enum_names_and_numbers() {
        let def = FieldDef::enum32(
            "method",
            vec![VariantDef::new("noop", 0), VariantDef::new("save_tag", 3)],
        );
        let flags = BindingFlags::default();
        assert_eq!(parse_input(&def, "save_tag", &flags).unwrap(), Value::UInt(3));
        assert_eq!(parse_input(&def, "9999", &flags).unwrap(), Value::UInt(9999));
    }

    #[test]
    fn expression_entry_feeds_float_fields() {
        let def = FieldDef::float32("ratio");
        let flags = BindingFlags {
            evaluate_entry_fields: true,
            ..BindingFlags::default()
        };
        let v = parse_input(&def, "(log10(50)+1)/2", &flags).unwrap();
        match v {
            Value::Float(f) => assert!((f - 1.349_485).abs() < 1e-5),
            other => panic!("expected float, got {:?}", other),
        }
        // Without the flag the same text is rejected.
        assert!(parse_input(&def, "(log10(50)+1)/2", &BindingFlags::default()).is_err());
    }
}
