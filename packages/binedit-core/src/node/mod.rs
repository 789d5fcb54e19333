//! The parsed document tree.
//!
//! A `Node` instantiates a `FieldDef` with a concrete value (leaves) or
//! children (composites). Nodes never point back at their parents;
//! relative-path machinery (SIZE expressions, dynamic labels) resolves
//! through explicit ancestor scopes during codec walks instead, so a node
//! removed from its parent cannot dangle.

use std::sync::Arc;

use crate::error::PathError;
use crate::schema::path::{FieldPath, Segment};
use crate::schema::{FieldDef, FieldKind, IntWidth};
use crate::value::Value;

/// Node contents: a leaf value, composite children, or bit-range children
/// over one backing integer. `residual` keeps backing-integer bits not
/// covered by any declared bit range so unknown flag bits survive a
/// round-trip, the same way unknown enum values do.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Leaf(Value),
    Composite(Vec<Node>),
    Bits { residual: u64, children: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    def: Arc<FieldDef>,
    payload: Payload,
    /// Byte offset within the parent; bit offset for bit-range children.
    offset: usize,
    /// Resolved byte size; zero for bit-range children.
    size: usize,
    /// Set when the field's bytes did not fully conform and were retained
    /// under `allow_corrupt`.
    tainted: bool,
}

impl Node {
    pub(crate) fn leaf(def: Arc<FieldDef>, value: Value) -> Node {
        Node {
            def,
            payload: Payload::Leaf(value),
            offset: 0,
            size: 0,
            tainted: false,
        }
    }

    pub(crate) fn composite(def: Arc<FieldDef>, children: Vec<Node>) -> Node {
        Node {
            def,
            payload: Payload::Composite(children),
            offset: 0,
            size: 0,
            tainted: false,
        }
    }

    pub(crate) fn bits(def: Arc<FieldDef>, residual: u64, children: Vec<Node>) -> Node {
        Node {
            def,
            payload: Payload::Bits { residual, children },
            offset: 0,
            size: 0,
            tainted: false,
        }
    }

    pub fn def(&self) -> &Arc<FieldDef> {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn set_extent(&mut self, offset: usize, size: usize) {
        self.offset = offset;
        self.size = size;
    }

    pub fn tainted(&self) -> bool {
        self.tainted
    }

    /// True if this node or any descendant is tainted.
    pub fn subtree_tainted(&self) -> bool {
        self.tainted || self.children().iter().any(Node::subtree_tainted)
    }

    pub(crate) fn mark_tainted(&mut self) {
        self.tainted = true;
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self.payload, Payload::Leaf(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Leaf(v) => Some(v),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.payload {
            Payload::Leaf(_) => &[],
            Payload::Composite(children) => children,
            Payload::Bits { children, .. } => children,
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
        match &mut self.payload {
            Payload::Composite(children) => children,
            Payload::Bits { children, .. } => children,
            Payload::Leaf(_) => unreachable!("children_mut on leaf"),
        }
    }

    pub(crate) fn bits_residual(&self) -> u64 {
        match &self.payload {
            Payload::Bits { residual, .. } => *residual,
            _ => 0,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.name() == name)
    }

    fn child_position(&self, name: &str) -> Option<usize> {
        if let Some(pos) = self.children().iter().position(|c| c.name() == name) {
            return Some(pos);
        }
        // Array slots are addressable by their NAME_MAP alias.
        if matches!(self.def.kind, FieldKind::Array { .. }) {
            return self.def.meta.name_map.iter().position(|n| n == name);
        }
        None
    }

    /// Dot-delimited lookup starting at this node. A leading dot is
    /// accepted and treated the same; parent-relative resolution only
    /// exists inside codec walks, which carry ancestor scopes.
    pub fn get(&self, path: &str) -> Result<&Node, PathError> {
        let parsed = FieldPath::parse(path)?;
        self.at_segments(&parsed.segments)
            .ok_or_else(|| PathError::NotFound(path.to_string()))
    }

    pub(crate) fn at_segments(&self, segments: &[Segment]) -> Option<&Node> {
        let mut cur = self;
        for seg in segments {
            cur = match seg {
                Segment::Name(name) => {
                    let pos = cur.child_position(name)?;
                    cur.children().get(pos)?
                }
                Segment::Index(i) => cur.children().get(*i)?,
            };
        }
        Some(cur)
    }

    pub(crate) fn at_segments_mut(&mut self, segments: &[Segment]) -> Option<&mut Node> {
        let mut cur = self;
        for seg in segments {
            let pos = match seg {
                Segment::Name(name) => cur.child_position(name)?,
                Segment::Index(i) => *i,
            };
            if !cur.is_composite() {
                return None;
            }
            cur = cur.children_mut().get_mut(pos)?;
        }
        Some(cur)
    }

    pub fn get_mut(&mut self, path: &str) -> Result<&mut Node, PathError> {
        let parsed = FieldPath::parse(path)?;
        match self.at_segments_mut(&parsed.segments) {
            Some(node) => Ok(node),
            None => Err(PathError::NotFound(path.to_string())),
        }
    }

    /// Replaces this leaf's value after checking it against the field
    /// definition: integer widths are range-checked, floats accept any
    /// numeric, strings must be strings. Returns the previous value.
    pub fn set_value(&mut self, value: Value) -> Result<Value, PathError> {
        let checked = check_value(&self.def, value).map_err(|(expected, got)| {
            PathError::TypeMismatch {
                path: self.def.name.clone(),
                expected,
                got,
            }
        })?;
        match &mut self.payload {
            Payload::Leaf(slot) => Ok(std::mem::replace(slot, checked)),
            _ => Err(PathError::TypeMismatch {
                path: self.def.name.clone(),
                expected: "leaf",
                got: self.def.kind.kind_name(),
            }),
        }
    }

    /// Reads a named flag out of a `Bool` field.
    pub fn flag(&self, flag: &str) -> Option<bool> {
        let bit = self.def.flag_bit(flag)?;
        let mask = self.value()?.as_u64()?;
        Some(mask & (1 << bit) != 0)
    }

    /// Sets a named flag on a `Bool` field, returning the previous mask.
    pub fn set_flag(&mut self, flag: &str, on: bool) -> Result<Value, PathError> {
        let bit = self
            .def
            .flag_bit(flag)
            .ok_or_else(|| PathError::NotFound(format!("{}.{}", self.name(), flag)))?;
        let mask = self
            .value()
            .and_then(Value::as_u64)
            .ok_or_else(|| PathError::TypeMismatch {
                path: self.def.name.clone(),
                expected: "bool mask",
                got: self.def.kind.kind_name(),
            })?;
        let new = if on { mask | (1 << bit) } else { mask & !(1 << bit) };
        self.set_value(Value::UInt(new))
    }

    /// Moves an array element, preserving element identities.
    pub fn move_child(&mut self, from: usize, to: usize) -> Result<(), PathError> {
        if !matches!(self.def.kind, FieldKind::Array { .. }) {
            return Err(PathError::TypeMismatch {
                path: self.def.name.clone(),
                expected: "array",
                got: self.def.kind.kind_name(),
            });
        }
        let children = self.children_mut();
        if from >= children.len() || to >= children.len() {
            return Err(PathError::NotFound(format!(
                "index {} out of {}",
                from.max(to),
                children.len()
            )));
        }
        let node = children.remove(from);
        children.insert(to, node);
        Ok(())
    }
}

fn int_bounds(width: IntWidth, signed: bool) -> (i128, i128) {
    let bits = width.bits();
    if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn unsigned_in_width(v: &Value, bits: u32) -> Option<u64> {
    let raw = match *v {
        Value::UInt(x) => x,
        Value::Int(x) if x >= 0 => x as u64,
        _ => return None,
    };
    let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    (raw <= max).then_some(raw)
}

/// Type- and range-checks a candidate value against a definition,
/// normalizing the representation (unsigned fields store `UInt`, signed
/// store `Int`). Errors carry (expected, got) type names.
fn check_value(
    def: &FieldDef,
    value: Value,
) -> Result<Value, (&'static str, &'static str)> {
    match &def.kind {
        FieldKind::Int { width, signed } => {
            let raw = match value {
                Value::Int(v) => v as i128,
                Value::UInt(v) => v as i128,
                other => return Err(("int", other.type_name())),
            };
            let (min, max) = int_bounds(*width, *signed);
            if raw < min || raw > max {
                return Err(("int in range", "int"));
            }
            Ok(if *signed {
                Value::Int(raw as i64)
            } else {
                Value::UInt(raw as u64)
            })
        }
        FieldKind::Float { .. } => match value {
            Value::Float(v) => Ok(Value::Float(v)),
            Value::Int(v) => Ok(Value::Float(v as f64)),
            Value::UInt(v) => Ok(Value::Float(v as f64)),
            other => Err(("float", other.type_name())),
        },
        FieldKind::Bool { width, .. } | FieldKind::Enum { width, .. } => {
            match unsigned_in_width(&value, width.bits()) {
                Some(v) => Ok(Value::UInt(v)),
                None => Err(("uint", value.type_name())),
            }
        }
        FieldKind::BitField { bits, .. } => match unsigned_in_width(&value, *bits) {
            Some(v) => Ok(Value::UInt(v)),
            None => Err(("uint", value.type_name())),
        },
        FieldKind::Timestamp32 => match unsigned_in_width(&value, 32) {
            Some(v) => Ok(Value::UInt(v)),
            None => Err(("timestamp", value.type_name())),
        },
        FieldKind::Str { .. } => match value {
            Value::Str(s) => Ok(Value::Str(s)),
            other => Err(("string", other.type_name())),
        },
        FieldKind::Pad { size } => match value {
            Value::Bytes(b) if b.len() == *size => Ok(Value::Bytes(b)),
            other => Err(("padding bytes", other.type_name())),
        },
        _ => Err(("leaf", def.kind.kind_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn leaf(def: FieldDef, v: Value) -> Node {
        Node::leaf(Arc::new(def), v)
    }

    #[test]
    fn set_value_checks_width() {
        let mut n = leaf(FieldDef::uint8("x"), Value::UInt(0));
        assert!(n.set_value(Value::UInt(255)).is_ok());
        assert!(n.set_value(Value::UInt(256)).is_err());
        assert!(n.set_value(Value::Int(-1)).is_err());
    }

    #[test]
    fn set_value_returns_previous() {
        let mut n = leaf(FieldDef::uint32("x"), Value::UInt(7));
        let old = n.set_value(Value::UInt(9)).unwrap();
        assert_eq!(old, Value::UInt(7));
        assert_eq!(n.value(), Some(&Value::UInt(9)));
    }

    #[test]
    fn signed_width_bounds() {
        let mut n = leaf(FieldDef::int16("x"), Value::Int(0));
        assert!(n.set_value(Value::Int(-32768)).is_ok());
        assert!(n.set_value(Value::Int(32767)).is_ok());
        assert!(n.set_value(Value::Int(32768)).is_err());
    }

    #[test]
    fn indexing_into_a_leaf_is_not_found() {
        let def = FieldDef::container("root", vec![FieldDef::uint32("x")]);
        let mut root = Node::composite(
            Arc::new(def),
            vec![leaf(FieldDef::uint32("x"), Value::UInt(0))],
        );
        assert!(matches!(root.get("x[0]"), Err(PathError::NotFound(_))));
        assert!(matches!(root.get_mut("x[0]"), Err(PathError::NotFound(_))));
    }

    #[test]
    fn flags_round_trip() {
        use crate::schema::FlagDef;

        let def = FieldDef::bool32("flags", vec![FlagDef::new("a", 0), FlagDef::new("b", 3)]);
        let mut n = leaf(def, Value::UInt(0));
        n.set_flag("b", true).unwrap();
        assert_eq!(n.flag("b"), Some(true));
        assert_eq!(n.flag("a"), Some(false));
        assert_eq!(n.value(), Some(&Value::UInt(8)));
        n.set_flag("b", false).unwrap();
        assert_eq!(n.value(), Some(&Value::UInt(0)));
    }
}
