//! Build-time schema validation.
//!
//! Runs once in `Schema::build`. Everything checked here is a property of
//! the format definition itself, so failures are fatal; the codec can then
//! assume size paths resolve and struct extents balance.

use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::path::{FieldPath, Segment};
use crate::schema::types::{FieldDef, FieldKind, IntWidth, SizeSpec};

type Scope<'a> = Vec<&'a Arc<FieldDef>>;

pub(crate) fn validate(root: &FieldDef) -> Result<(), SchemaError> {
    let mut scopes: Vec<Scope<'_>> = Vec::new();
    validate_field(root, &mut scopes)
}

fn validate_field<'a>(
    def: &'a FieldDef,
    scopes: &mut Vec<Scope<'a>>,
) -> Result<(), SchemaError> {
    if let Some((min, max)) = def.meta.min.zip(def.meta.max) {
        if min > max {
            return Err(SchemaError::InvalidAttribute {
                name: def.name.clone(),
                reason: format!("MIN {} exceeds MAX {}", min, max),
            });
        }
    }

    match &def.kind {
        FieldKind::Container { fields } => {
            check_duplicate_names(def, fields)?;
            validate_children(fields, scopes)?;
        }
        FieldKind::Struct { size, fields } => {
            check_duplicate_names(def, fields)?;
            let mut covered = 0usize;
            for child in fields.iter() {
                let child_size = child.kind.fixed_size().ok_or_else(|| {
                    SchemaError::InvalidAttribute {
                        name: child.name.clone(),
                        reason: format!(
                            "dynamically sized {} inside fixed-size struct '{}'",
                            child.kind.kind_name(),
                            def.name
                        ),
                    }
                })?;
                covered += child_size;
            }
            if covered != *size {
                return Err(SchemaError::SizeMismatch {
                    name: def.name.clone(),
                    declared: *size,
                    covered,
                });
            }
            validate_children(fields, scopes)?;
        }
        FieldKind::BitStruct { width, fields } => {
            check_duplicate_names(def, fields)?;
            validate_bit_children(def, *width, fields)?;
        }
        FieldKind::Array { elem, count } => {
            if let SizeSpec::Path(path) = count {
                check_size_path(def, path, scopes)?;
            }
            // Elements resolve outward through the array's own scopes;
            // sibling elements are never visible to each other.
            validate_field(elem, scopes)?;
        }
        FieldKind::Str { size } => {
            if let SizeSpec::Path(path) = size {
                check_size_path(def, path, scopes)?;
            }
        }
        FieldKind::BitField { .. } => {
            // Only reachable as a direct BitStruct child, which validates
            // its bit children itself.
            return Err(SchemaError::InvalidAttribute {
                name: def.name.clone(),
                reason: "bit field outside a bitstruct".to_string(),
            });
        }
        FieldKind::Int { .. }
        | FieldKind::Float { .. }
        | FieldKind::Bool { .. }
        | FieldKind::Enum { .. }
        | FieldKind::Timestamp32
        | FieldKind::Pad { .. } => {}
    }
    Ok(())
}

fn validate_children<'a>(
    fields: &'a [Arc<FieldDef>],
    scopes: &mut Vec<Scope<'a>>,
) -> Result<(), SchemaError> {
    scopes.push(Vec::new());
    let mut result = Ok(());
    for child in fields {
        result = validate_field(child, scopes);
        if result.is_err() {
            break;
        }
        if let Some(level) = scopes.last_mut() {
            level.push(child);
        }
    }
    scopes.pop();
    result
}

fn validate_bit_children(
    parent: &FieldDef,
    width: IntWidth,
    fields: &[Arc<FieldDef>],
) -> Result<(), SchemaError> {
    let mut end = 0u32;
    for child in fields {
        let bits = match &child.kind {
            FieldKind::BitField { bits, .. } => *bits,
            other => {
                return Err(SchemaError::InvalidAttribute {
                    name: child.name.clone(),
                    reason: format!(
                        "{} child of bitstruct '{}'; only bit fields are allowed",
                        other.kind_name(),
                        parent.name
                    ),
                })
            }
        };
        end += bits;
        if end > width.bits() {
            return Err(SchemaError::BitRangeOverflow {
                name: child.name.clone(),
                end,
                width: width.bits(),
            });
        }
    }
    Ok(())
}

fn check_duplicate_names(
    parent: &FieldDef,
    fields: &[Arc<FieldDef>],
) -> Result<(), SchemaError> {
    for (i, a) in fields.iter().enumerate() {
        if matches!(a.kind, FieldKind::Pad { .. }) {
            continue;
        }
        for b in fields.iter().skip(i + 1) {
            if a.name == b.name {
                return Err(SchemaError::DuplicateName {
                    parent: parent.name.clone(),
                    name: a.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_size_path(
    def: &FieldDef,
    path: &str,
    scopes: &[Scope<'_>],
) -> Result<(), SchemaError> {
    let parsed = FieldPath::parse(path).map_err(|_| SchemaError::UnresolvableSizePath {
        field: def.name.clone(),
        path: path.to_string(),
    })?;
    let target = resolve_static(scopes, &parsed).ok_or_else(|| {
        SchemaError::UnresolvableSizePath {
            field: def.name.clone(),
            path: path.to_string(),
        }
    })?;
    match target.kind {
        FieldKind::Int { .. } => Ok(()),
        _ => Err(SchemaError::SizePathNotInteger {
            field: def.name.clone(),
            path: path.to_string(),
        }),
    }
}

/// Resolves a path against the definitions that precede the current field,
/// innermost scope first. Mirrors the runtime resolution over nodes, which
/// is what makes "resolves at build time" equivalent to "resolves at parse
/// time".
fn resolve_static<'a>(
    scopes: &[Scope<'a>],
    path: &FieldPath,
) -> Option<&'a Arc<FieldDef>> {
    let head = path.head()?;
    for level in scopes.iter().rev() {
        if let Some(entry) = level.iter().find(|d| d.name == head) {
            return descend_def(entry, &path.segments[1..]);
        }
    }
    None
}

fn descend_def<'a>(def: &'a Arc<FieldDef>, segs: &[Segment]) -> Option<&'a Arc<FieldDef>> {
    let mut cur = def;
    for seg in segs {
        match seg {
            Segment::Name(name) => {
                cur = cur.kind.children().iter().find(|c| &c.name == name)?;
            }
            Segment::Index(_) => match &cur.kind {
                FieldKind::Array { elem, .. } => cur = elem,
                _ => return None,
            },
        }
    }
    Some(cur)
}
