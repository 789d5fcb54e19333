//! Schema-directed projection of a node tree to JSON.
//!
//! Used by the inspection tool and debug dumps. The projection is lossy by
//! design: padding is omitted, enums render their mapped name when one
//! exists and the raw integer otherwise, and flag masks render as a map of
//! named booleans.

use serde_json::{json, Map, Value as JsonValue};

use crate::node::Node;
use crate::schema::FieldKind;
use crate::value::Value;

pub fn node_to_json(node: &Node) -> JsonValue {
    match &node.def().kind {
        FieldKind::Container { .. } | FieldKind::Struct { .. } => {
            let mut obj = Map::new();
            for child in node.children() {
                if matches!(child.def().kind, FieldKind::Pad { .. }) {
                    continue;
                }
                obj.insert(child.name().to_string(), node_to_json(child));
            }
            JsonValue::Object(obj)
        }
        FieldKind::BitStruct { .. } => {
            let mut obj = Map::new();
            for child in node.children() {
                obj.insert(child.name().to_string(), node_to_json(child));
            }
            if node.bits_residual() != 0 {
                obj.insert("unknown_bits".to_string(), json!(node.bits_residual()));
            }
            JsonValue::Object(obj)
        }
        FieldKind::Array { .. } => JsonValue::Array(
            node.children().iter().map(node_to_json).collect(),
        ),
        FieldKind::Bool { flags, .. } => {
            let mask = node.value().and_then(Value::as_u64).unwrap_or(0);
            let mut obj = Map::new();
            let mut named = 0u64;
            for flag in flags {
                obj.insert(flag.name.clone(), json!(mask & (1 << flag.bit) != 0));
                named |= 1 << flag.bit;
            }
            if mask & !named != 0 {
                obj.insert("raw".to_string(), json!(mask));
            }
            JsonValue::Object(obj)
        }
        FieldKind::Enum { .. } | FieldKind::BitField { .. } => {
            match node.value().and_then(Value::as_u64) {
                Some(raw) => match node.def().variant_name(raw) {
                    Some(name) => json!(name),
                    None => json!(raw),
                },
                None => JsonValue::Null,
            }
        }
        FieldKind::Pad { .. } => JsonValue::Null,
        _ => match node.value() {
            Some(Value::Int(v)) => json!(v),
            Some(Value::UInt(v)) => json!(v),
            Some(Value::Float(v)) => json!(v),
            Some(Value::Str(s)) => json!(s),
            Some(Value::Bytes(b)) => {
                // Tainted payloads dump as hex so they stay inspectable.
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                json!(format!("0x{}", hex))
            }
            None => JsonValue::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse, CodecOptions};
    use crate::schema::{FieldDef, FlagDef, Schema, VariantDef};

    #[test]
    fn projects_flags_enums_and_values() {
        let root = FieldDef::container(
            "root",
            vec![
                FieldDef::bool32("flags", vec![FlagDef::new("a", 0), FlagDef::new("b", 1)]),
                FieldDef::enum32("mode", vec![VariantDef::new("auto", 0), VariantDef::new("manual", 1)]),
                FieldDef::uint16("n"),
                FieldDef::pad(2),
            ],
        );
        let schema = Schema::build("t", root).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes()); // flags: a
        bytes.extend_from_slice(&1u32.to_le_bytes()); // mode: manual
        bytes.extend_from_slice(&7u16.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);

        let tree = parse(&bytes, &schema, &CodecOptions::default()).unwrap();
        let js = node_to_json(&tree);
        assert_eq!(js["flags"]["a"], json!(true));
        assert_eq!(js["flags"]["b"], json!(false));
        assert_eq!(js["mode"], json!("manual"));
        assert_eq!(js["n"], json!(7));
        assert!(js.get("pad").is_none());
    }

    #[test]
    fn unknown_enum_values_render_numerically() {
        let root = FieldDef::container(
            "root",
            vec![FieldDef::enum32("mode", vec![VariantDef::new("auto", 0)])],
        );
        let schema = Schema::build("t", root).unwrap();
        let tree = parse(&9999u32.to_le_bytes(), &schema, &CodecOptions::default()).unwrap();
        assert_eq!(node_to_json(&tree)["mode"], json!(9999));
    }
}
