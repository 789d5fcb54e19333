//! Default tree construction and MIN/MAX constraint enforcement.

use std::sync::Arc;

use crate::codec::{CodecOptions, ConstraintMode};
use crate::error::SerializeError;
use crate::node::Node;
use crate::schema::{FieldDef, FieldKind, Schema, SizeSpec};
use crate::value::Value;

/// Builds a complete node tree from DEFAULT attributes alone: zero where
/// absent, empty strings, zero-length arrays unless MIN demands elements.
/// Used when no file exists, after a schema upgrade introduces fields, and
/// to materialize missing optional subtrees.
pub fn build_defaults(schema: &Schema) -> Node {
    instantiate(schema.root())
}

/// Instantiates one definition with its default value.
pub fn instantiate(def: &Arc<FieldDef>) -> Node {
    let mut node = match &def.kind {
        FieldKind::Container { fields } | FieldKind::Struct { fields, .. } => {
            Node::composite(def.clone(), fields.iter().map(instantiate).collect())
        }
        FieldKind::BitStruct { fields, .. } => {
            Node::bits(def.clone(), 0, fields.iter().map(instantiate).collect())
        }
        FieldKind::Array { elem, count } => {
            let n = match count {
                SizeSpec::Fixed(n) => *n,
                SizeSpec::Path(_) => def.meta.min.map_or(0, |m| m as usize),
            };
            Node::composite(def.clone(), (0..n).map(|_| instantiate(elem)).collect())
        }
        FieldKind::Int { signed: true, .. } => Node::leaf(def.clone(), Value::Int(0)),
        FieldKind::Int { signed: false, .. }
        | FieldKind::Bool { .. }
        | FieldKind::Enum { .. }
        | FieldKind::BitField { .. }
        | FieldKind::Timestamp32 => Node::leaf(def.clone(), Value::UInt(0)),
        FieldKind::Float { .. } => Node::leaf(def.clone(), Value::Float(0.0)),
        FieldKind::Str { .. } => Node::leaf(def.clone(), Value::Str(String::new())),
        FieldKind::Pad { size } => Node::leaf(def.clone(), Value::Bytes(vec![0; *size])),
    };
    if let Some(default) = &def.meta.default {
        // A default that fails the width check is a defect in the format
        // definition; the zero value stands in.
        let _ = node.set_value(default.clone());
    }
    node
}

/// Appends one default-constructed element to an array node. Returns
/// false when the node is not an array.
pub fn append_element(array: &mut Node) -> bool {
    let elem = match &array.def().kind {
        FieldKind::Array { elem, .. } => elem.clone(),
        _ => return false,
    };
    array.children_mut().push(instantiate(&elem));
    true
}

/// Applies MIN/MAX to a value about to be committed. Under clipping mode
/// violations are pulled into range; under strict mode they surface as
/// `ConstraintViolated`. No-op when enforcement flags are off.
pub fn apply_bounds(
    def: &FieldDef,
    value: Value,
    opts: &CodecOptions,
) -> Result<Value, SerializeError> {
    let v = match value.as_f64() {
        Some(v) => v,
        None => return Ok(value),
    };
    let mut clipped = v;
    if opts.enforce_min {
        if let Some(min) = def.meta.min {
            if v < min {
                if opts.constraint_mode == ConstraintMode::Strict {
                    return Err(SerializeError::ConstraintViolated {
                        field: def.name.clone(),
                        detail: format!("{} is below minimum {}", v, min),
                    });
                }
                clipped = min;
            }
        }
    }
    if opts.enforce_max {
        if let Some(max) = def.meta.max {
            if clipped > max {
                if opts.constraint_mode == ConstraintMode::Strict {
                    return Err(SerializeError::ConstraintViolated {
                        field: def.name.clone(),
                        detail: format!("{} is above maximum {}", v, max),
                    });
                }
                clipped = max;
            }
        }
    }
    if clipped == v {
        return Ok(value);
    }
    Ok(match value {
        Value::Int(_) => Value::Int(clipped as i64),
        Value::UInt(_) => Value::UInt(clipped as u64),
        Value::Float(_) => Value::Float(clipped),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    #[test]
    fn defaults_fill_every_field() {
        let root = FieldDef::container(
            "root",
            vec![
                FieldDef::uint32("count"),
                FieldDef::str_fixed("name", 8).default_value("default"),
                FieldDef::uint32("limit").default_value(20u64),
                FieldDef::array("items", FieldDef::uint8("item"), "count"),
            ],
        );
        let schema = Schema::build("t", root).unwrap();
        let tree = build_defaults(&schema);
        assert_eq!(tree.get("name").unwrap().value(), Some(&Value::Str("default".into())));
        assert_eq!(tree.get("limit").unwrap().value(), Some(&Value::UInt(20)));
        assert_eq!(tree.get("items").unwrap().children().len(), 0);
    }

    #[test]
    fn min_forces_array_population() {
        let root = FieldDef::container(
            "root",
            vec![
                FieldDef::uint32("count"),
                FieldDef::array("items", FieldDef::uint8("item"), "count").min(2.0),
            ],
        );
        let schema = Schema::build("t", root).unwrap();
        let tree = build_defaults(&schema);
        assert_eq!(tree.get("items").unwrap().children().len(), 2);
    }

    #[test]
    fn clip_mode_pulls_into_range() {
        let def = FieldDef::uint32("v").min(5.0).max(10.0);
        let opts = CodecOptions {
            enforce_min: true,
            enforce_max: true,
            ..CodecOptions::default()
        };
        assert_eq!(apply_bounds(&def, Value::UInt(2), &opts).unwrap(), Value::UInt(5));
        assert_eq!(apply_bounds(&def, Value::UInt(50), &opts).unwrap(), Value::UInt(10));
        assert_eq!(apply_bounds(&def, Value::UInt(7), &opts).unwrap(), Value::UInt(7));
    }

    #[test]
    fn strict_mode_surfaces_violation() {
        let def = FieldDef::uint32("v").max(10.0);
        let opts = CodecOptions {
            enforce_max: true,
            constraint_mode: ConstraintMode::Strict,
            ..CodecOptions::default()
        };
        assert!(apply_bounds(&def, Value::UInt(50), &opts).is_err());
    }
}
