//! Schema-driven parse and serialize.
//!
//! The codec walks a schema in declaration order and consumes or produces
//! exactly the bytes the schema declares. It owns its buffers: parsing
//! copies values out, serializing builds a fresh buffer. It returns errors
//! and never logs.

pub(crate) mod reader;
mod reconcile;
pub(crate) mod writer;

use std::sync::Arc;

use crate::error::{ParseError, SerializeError};
use crate::node::Node;
use crate::schema::path::FieldPath;
use crate::schema::{Endian, FieldDef, FieldKind, Schema, SizeSpec};
use crate::value::Value;

use reader::ByteReader;
use writer::ByteWriter;

/// Behavior switches threaded through parse and serialize. These project
/// the application's file-handling flags; the codec itself is stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Retain nonconforming bytes (bad UTF-8, out-of-range values) and
    /// mark the affected nodes tainted instead of failing the parse.
    pub allow_corrupt: bool,
    /// Enforce declared MIN bounds.
    pub enforce_min: bool,
    /// Enforce declared MAX bounds.
    pub enforce_max: bool,
    /// Whether bound violations clip at commit time or fail the save.
    pub constraint_mode: ConstraintMode,
    /// Byte order assumed where the schema does not override; flipped to
    /// big-endian by the version pipeline for byte-swapped files.
    pub default_endian: Endian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintMode {
    /// Violations are clipped into range when the value is committed.
    Clip,
    /// Violations fail serialization with `ConstraintViolated`.
    Strict,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            allow_corrupt: false,
            enforce_min: false,
            enforce_max: false,
            constraint_mode: ConstraintMode::Clip,
            default_endian: Endian::Little,
        }
    }
}

/// Parses a byte buffer into a node tree conforming to `schema`.
pub fn parse(bytes: &[u8], schema: &Schema, opts: &CodecOptions) -> Result<Node, ParseError> {
    let mut r = ByteReader::new(bytes);
    let mut root = parse_field(schema.root(), &mut r, &[], opts.default_endian, opts)?;
    root.set_extent(0, r.pos());
    if r.remaining() > 0 {
        if opts.allow_corrupt {
            root.mark_tainted();
        } else {
            return Err(ParseError::SizeMismatch {
                field: schema.root().name.clone(),
                declared: bytes.len(),
                consumed: r.pos(),
            });
        }
    }
    Ok(root)
}

/// Serializes a node tree back to bytes.
///
/// Derived sizes are reconciled first: every count field referenced by an
/// array or string SIZE path is overwritten from the live element count or
/// byte length, which is why user edits to count fields never survive a
/// save. Node offsets and sizes are refreshed as a side effect.
pub fn serialize(root: &mut Node, opts: &CodecOptions) -> Result<Vec<u8>, SerializeError> {
    reconcile::reconcile(root);
    let mut w = ByteWriter::new();
    write_field(root, &mut w, opts.default_endian, opts)?;
    let total = w.len();
    root.set_extent(0, total);
    Ok(w.into_inner())
}

/// Resolves a path against already-materialized nodes: the head segment is
/// searched innermost-scope-first through the ancestors, then the rest of
/// the path descends normally.
pub(crate) fn resolve_in_scopes<'a>(
    scopes: &[&'a [Node]],
    path: &FieldPath,
) -> Option<&'a Node> {
    let head = path.head()?;
    for level in scopes.iter().rev() {
        if let Some(n) = level.iter().find(|n| n.name() == head) {
            return n.at_segments(&path.segments[1..]);
        }
    }
    None
}

fn resolve_scalar(
    path_str: &str,
    scopes: &[&[Node]],
    field: &str,
) -> Result<u64, ParseError> {
    let bad = || ParseError::BadSizePath {
        field: field.to_string(),
        path: path_str.to_string(),
    };
    let path = FieldPath::parse(path_str).map_err(|_| bad())?;
    let node = resolve_in_scopes(scopes, &path).ok_or_else(bad)?;
    node.value().and_then(Value::as_u64).ok_or_else(bad)
}

fn bit_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Checks a parsed numeric against its declared bounds. Returns whether
/// the node should be tainted; errors unless corruption is allowed.
fn enforce_parse_bounds(
    def: &FieldDef,
    value: &Value,
    opts: &CodecOptions,
) -> Result<bool, ParseError> {
    let v = match value.as_f64() {
        Some(v) => v,
        None => return Ok(false),
    };
    let below = opts.enforce_min && def.meta.min.is_some_and(|min| v < min);
    let above = opts.enforce_max && def.meta.max.is_some_and(|max| v > max);
    if !(below || above) {
        return Ok(false);
    }
    if opts.allow_corrupt {
        return Ok(true);
    }
    Err(ParseError::OutOfRange {
        field: def.name.clone(),
        value: value.as_i64().unwrap_or(v as i64),
        min: def.meta.min.map_or(i64::MIN, |m| m as i64),
        max: def.meta.max.map_or(i64::MAX, |m| m as i64),
    })
}

fn parse_field(
    def: &Arc<FieldDef>,
    r: &mut ByteReader<'_>,
    scopes: &[&[Node]],
    inherited: Endian,
    opts: &CodecOptions,
) -> Result<Node, ParseError> {
    let endian = def.meta.endian.unwrap_or(inherited);
    let start = r.pos();
    let mut node = match &def.kind {
        FieldKind::Container { fields } | FieldKind::Struct { fields, .. } => {
            let mut children: Vec<Node> = Vec::with_capacity(fields.len());
            for child_def in fields {
                let child_start = r.pos();
                let mut child = {
                    let mut inner: Vec<&[Node]> = scopes.to_vec();
                    inner.push(&children);
                    parse_field(child_def, r, &inner, endian, opts)?
                };
                child.set_extent(child_start - start, r.pos() - child_start);
                children.push(child);
            }
            if let FieldKind::Struct { size, .. } = &def.kind {
                let consumed = r.pos() - start;
                if consumed != *size {
                    return Err(ParseError::SizeMismatch {
                        field: def.name.clone(),
                        declared: *size,
                        consumed,
                    });
                }
            }
            Node::composite(def.clone(), children)
        }
        FieldKind::BitStruct { width, fields } => {
            let backing = r.read_uint(*width, endian, &def.name)?;
            let mut children = Vec::with_capacity(fields.len());
            let mut covered = 0u64;
            let mut bit_off = 0u32;
            for child_def in fields {
                let bits = match &child_def.kind {
                    FieldKind::BitField { bits, .. } => *bits,
                    // Unreachable for validated schemas.
                    _ => 0,
                };
                let mask = bit_mask(bits);
                let raw = (backing >> bit_off) & mask;
                let mut child = Node::leaf(child_def.clone(), Value::UInt(raw));
                child.set_extent(bit_off as usize, 0);
                if enforce_parse_bounds(child_def, &Value::UInt(raw), opts)? {
                    child.mark_tainted();
                }
                covered |= mask << bit_off;
                bit_off += bits;
                children.push(child);
            }
            let residual = backing & !covered & bit_mask(width.bits());
            Node::bits(def.clone(), residual, children)
        }
        FieldKind::Array { elem, count } => {
            let count = match count {
                SizeSpec::Fixed(n) => *n as u64,
                SizeSpec::Path(p) => resolve_scalar(p, scopes, &def.name)?,
            } as usize;
            // Reject absurd counts before allocating.
            let lower_bound = elem.kind.fixed_size().unwrap_or(1).max(1);
            if count.saturating_mul(lower_bound) > r.remaining() {
                return Err(ParseError::ShortBuffer {
                    field: def.name.clone(),
                    needed: count.saturating_mul(lower_bound),
                    remaining: r.remaining(),
                });
            }
            let mut children = Vec::with_capacity(count);
            for _ in 0..count {
                let child_start = r.pos();
                let mut child = parse_field(elem, r, scopes, endian, opts)?;
                child.set_extent(child_start - start, r.pos() - child_start);
                children.push(child);
            }
            Node::composite(def.clone(), children)
        }
        FieldKind::Int { width, signed } => {
            let value = if *signed {
                Value::Int(r.read_int(*width, endian, &def.name)?)
            } else {
                Value::UInt(r.read_uint(*width, endian, &def.name)?)
            };
            let tainted = enforce_parse_bounds(def, &value, opts)?;
            let mut node = Node::leaf(def.clone(), value);
            if tainted {
                node.mark_tainted();
            }
            node
        }
        FieldKind::Float { double } => {
            let v = if *double {
                r.read_f64(endian, &def.name)?
            } else {
                r.read_f32(endian, &def.name)? as f64
            };
            let value = Value::Float(v);
            let tainted = enforce_parse_bounds(def, &value, opts)?;
            let mut node = Node::leaf(def.clone(), value);
            if tainted {
                node.mark_tainted();
            }
            node
        }
        FieldKind::Bool { width, .. } => {
            let raw = r.read_uint(*width, endian, &def.name)?;
            Node::leaf(def.clone(), Value::UInt(raw))
        }
        FieldKind::Enum { width, .. } => {
            // Unknown variants are retained verbatim; MIN/MAX are the only
            // enforcement the schema can opt into.
            let raw = r.read_uint(*width, endian, &def.name)?;
            let value = Value::UInt(raw);
            let tainted = enforce_parse_bounds(def, &value, opts)?;
            let mut node = Node::leaf(def.clone(), value);
            if tainted {
                node.mark_tainted();
            }
            node
        }
        FieldKind::Str { size } => {
            let (n, fixed) = match size {
                SizeSpec::Fixed(n) => (*n, true),
                SizeSpec::Path(p) => (resolve_scalar(p, scopes, &def.name)? as usize, false),
            };
            let raw = r.take(n, &def.name)?;
            match std::str::from_utf8(raw) {
                Ok(text) => {
                    let text = if fixed {
                        text.trim_end_matches('\0')
                    } else {
                        text
                    };
                    Node::leaf(def.clone(), Value::Str(text.to_string()))
                }
                Err(_) if opts.allow_corrupt => {
                    let mut node = Node::leaf(def.clone(), Value::Bytes(raw.to_vec()));
                    node.mark_tainted();
                    node
                }
                Err(_) => {
                    return Err(ParseError::Encoding {
                        field: def.name.clone(),
                    })
                }
            }
        }
        FieldKind::Timestamp32 => {
            let raw = r.read_uint(crate::schema::IntWidth::W32, endian, &def.name)?;
            Node::leaf(def.clone(), Value::UInt(raw))
        }
        FieldKind::Pad { size } => {
            let raw = r.take(*size, &def.name)?;
            Node::leaf(def.clone(), Value::Bytes(raw.to_vec()))
        }
        FieldKind::BitField { .. } => {
            // Validated schemas only reach bit fields through BitStruct.
            Node::leaf(def.clone(), Value::UInt(0))
        }
    };
    node.set_extent(0, r.pos() - start);
    Ok(node)
}

/// Checks a value against its bounds under strict enforcement. Under
/// clipping mode violations were already clipped at commit time, and
/// values retained from corrupt files pass through so round-trips hold.
fn enforce_write_bounds(def: &FieldDef, node: &Node, opts: &CodecOptions) -> Result<(), SerializeError> {
    if opts.constraint_mode != ConstraintMode::Strict {
        return Ok(());
    }
    let v = match node.value().and_then(Value::as_f64) {
        Some(v) => v,
        None => return Ok(()),
    };
    if opts.enforce_min {
        if let Some(min) = def.meta.min {
            if v < min {
                return Err(SerializeError::ConstraintViolated {
                    field: def.name.clone(),
                    detail: format!("{} is below minimum {}", v, min),
                });
            }
        }
    }
    if opts.enforce_max {
        if let Some(max) = def.meta.max {
            if v > max {
                return Err(SerializeError::ConstraintViolated {
                    field: def.name.clone(),
                    detail: format!("{} is above maximum {}", v, max),
                });
            }
        }
    }
    Ok(())
}

fn write_field(
    node: &mut Node,
    w: &mut ByteWriter,
    inherited: Endian,
    opts: &CodecOptions,
) -> Result<(), SerializeError> {
    let def = node.def().clone();
    let endian = def.meta.endian.unwrap_or(inherited);
    match &def.kind {
        FieldKind::Container { .. } | FieldKind::Struct { .. } | FieldKind::Array { .. } => {
            let start = w.len();
            for child in node.children_mut() {
                let child_start = w.len();
                write_field(child, w, endian, opts)?;
                let written = w.len() - child_start;
                child.set_extent(child_start - start, written);
            }
        }
        FieldKind::BitStruct { width, fields } => {
            let mut backing = node.bits_residual();
            let mut bit_off = 0u32;
            let children = node.children_mut();
            for (child, child_def) in children.iter_mut().zip(fields.iter()) {
                let bits = match &child_def.kind {
                    FieldKind::BitField { bits, .. } => *bits,
                    _ => 0,
                };
                let raw = child.value().and_then(Value::as_u64).unwrap_or(0);
                backing |= (raw & bit_mask(bits)) << bit_off;
                child.set_extent(bit_off as usize, 0);
                bit_off += bits;
            }
            w.put_uint(backing, *width, endian);
        }
        FieldKind::Int { width, .. } => {
            enforce_write_bounds(&def, node, opts)?;
            match node.value() {
                Some(Value::Int(v)) => w.put_int(*v, *width, endian),
                Some(Value::UInt(v)) => w.put_uint(*v, *width, endian),
                _ => w.put_zeros(width.bytes()),
            }
        }
        FieldKind::Float { double } => {
            enforce_write_bounds(&def, node, opts)?;
            let v = node.value().and_then(Value::as_f64).unwrap_or(0.0);
            if *double {
                w.put_f64(v, endian);
            } else {
                w.put_f32(v as f32, endian);
            }
        }
        FieldKind::Bool { width, .. } | FieldKind::Enum { width, .. } => {
            enforce_write_bounds(&def, node, opts)?;
            let v = node.value().and_then(Value::as_u64).unwrap_or(0);
            w.put_uint(v, *width, endian);
        }
        FieldKind::Timestamp32 => {
            let v = node.value().and_then(Value::as_u64).unwrap_or(0);
            w.put_uint(v, crate::schema::IntWidth::W32, endian);
        }
        FieldKind::Str { size } => {
            let owned;
            let bytes: &[u8] = match node.value() {
                Some(Value::Str(s)) => s.as_bytes(),
                Some(Value::Bytes(b)) => b,
                _ => {
                    owned = Vec::new();
                    &owned
                }
            };
            match size {
                SizeSpec::Fixed(n) => {
                    if bytes.len() > *n {
                        return Err(SerializeError::ConstraintViolated {
                            field: def.name.clone(),
                            detail: format!(
                                "string is {} bytes, field holds {}",
                                bytes.len(),
                                n
                            ),
                        });
                    }
                    let padding = n - bytes.len();
                    w.put_bytes(bytes);
                    w.put_zeros(padding);
                }
                SizeSpec::Path(_) => w.put_bytes(bytes),
            }
        }
        FieldKind::Pad { size } => match node.value() {
            Some(Value::Bytes(b)) if b.len() == *size => w.put_bytes(b),
            _ => w.put_zeros(*size),
        },
        FieldKind::BitField { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, IntWidth};
    use pretty_assertions::assert_eq;

    fn counted_schema() -> Schema {
        let root = FieldDef::container(
            "root",
            vec![
                FieldDef::uint16("count"),
                FieldDef::array("items", FieldDef::uint8("item"), "count"),
                FieldDef::uint16("name_len"),
                FieldDef::str_sized("name", "name_len"),
            ],
        );
        Schema::build("counted", root).unwrap()
    }

    #[test]
    fn parses_count_prefixed_array_and_string() {
        let bytes = [
            3, 0, // count
            7, 8, 9, // items
            2, 0, // name_len
            b'h', b'i',
        ];
        let opts = CodecOptions::default();
        let root = parse(&bytes, &counted_schema(), &opts).unwrap();
        assert_eq!(root.get("items").unwrap().children().len(), 3);
        assert_eq!(
            root.get("items[1]").unwrap().value(),
            Some(&Value::UInt(8))
        );
        assert_eq!(root.get("name").unwrap().value(), Some(&Value::Str("hi".into())));
    }

    #[test]
    fn round_trips_bytes() {
        let bytes = [2u8, 0, 5, 6, 3, 0, b'a', b'b', b'c'];
        let opts = CodecOptions::default();
        let mut root = parse(&bytes, &counted_schema(), &opts).unwrap();
        let out = serialize(&mut root, &opts).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn reconciles_count_fields_from_content() {
        let bytes = [1u8, 0, 5, 1, 0, b'x'];
        let opts = CodecOptions::default();
        let mut root = parse(&bytes, &counted_schema(), &opts).unwrap();
        // Corrupt the count fields; reconciliation must win.
        root.get_mut("count").unwrap().set_value(Value::UInt(40)).unwrap();
        root.get_mut("name_len").unwrap().set_value(Value::UInt(9)).unwrap();
        let out = serialize(&mut root, &opts).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn short_buffer_is_reported() {
        let bytes = [5u8, 0, 1, 2]; // claims 5 items, has 2
        let opts = CodecOptions::default();
        let err = parse(&bytes, &counted_schema(), &opts).unwrap_err();
        assert!(matches!(err, ParseError::ShortBuffer { .. }));
    }

    #[test]
    fn bitstruct_preserves_uncovered_bits() {
        let root = FieldDef::bit_struct(
            "combo",
            IntWidth::W32,
            vec![FieldDef::bit_field("modifier", 4), FieldDef::bit_field("key", 20)],
        );
        let schema = Schema::build("combo", root).unwrap();
        let opts = CodecOptions::default();
        // Bits 24..32 are covered by no field.
        let bytes = 0xAB00_1234u32.to_le_bytes();
        let mut root = parse(&bytes, &schema, &opts).unwrap();
        assert_eq!(root.get("modifier").unwrap().value(), Some(&Value::UInt(4)));
        assert_eq!(root.get("key").unwrap().value(), Some(&Value::UInt(0x123)));
        let out = serialize(&mut root, &opts).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn big_endian_override() {
        let root = FieldDef::container(
            "root",
            vec![FieldDef::uint32("v").endian(Endian::Big)],
        );
        let schema = Schema::build("be", root).unwrap();
        let opts = CodecOptions::default();
        let root = parse(&[0, 0, 1, 0], &schema, &opts).unwrap();
        assert_eq!(root.get("v").unwrap().value(), Some(&Value::UInt(256)));
    }

    #[test]
    fn bad_utf8_errors_unless_corrupt_allowed() {
        let root = FieldDef::container("root", vec![FieldDef::str_fixed("s", 2)]);
        let schema = Schema::build("s", root).unwrap();
        let bytes = [0xFF, 0xFE];
        let strict = CodecOptions::default();
        assert!(matches!(
            parse(&bytes, &schema, &strict).unwrap_err(),
            ParseError::Encoding { .. }
        ));

        let lax = CodecOptions {
            allow_corrupt: true,
            ..CodecOptions::default()
        };
        let mut root = parse(&bytes, &schema, &lax).unwrap();
        assert!(root.get("s").unwrap().tainted());
        // Tainted bytes round-trip verbatim.
        assert_eq!(serialize(&mut root, &lax).unwrap(), bytes);
    }

    #[test]
    fn fixed_strings_are_nul_padded() {
        let root = FieldDef::container("root", vec![FieldDef::str_fixed("s", 6)]);
        let schema = Schema::build("s", root).unwrap();
        let opts = CodecOptions::default();
        let mut root = parse(b"ab\0\0\0\0", &schema, &opts).unwrap();
        assert_eq!(root.get("s").unwrap().value(), Some(&Value::Str("ab".into())));
        assert_eq!(serialize(&mut root, &opts).unwrap(), b"ab\0\0\0\0");
    }

    #[test]
    fn strict_mode_rejects_out_of_bounds_saves() {
        let root = FieldDef::container("root", vec![FieldDef::uint32("v").max(10.0)]);
        let schema = Schema::build("b", root).unwrap();
        let opts = CodecOptions {
            enforce_max: true,
            constraint_mode: ConstraintMode::Strict,
            ..CodecOptions::default()
        };
        let mut tree = parse(&20u32.to_le_bytes(), &schema, &CodecOptions::default()).unwrap();
        assert!(matches!(
            serialize(&mut tree, &opts).unwrap_err(),
            SerializeError::ConstraintViolated { .. }
        ));
    }
}
