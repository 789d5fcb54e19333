//! Derived-size reconciliation.
//!
//! Before any serialize, every count field referenced by an array or
//! string SIZE path is overwritten from the tree itself. Runs as two
//! passes because the targets serialize earlier than the fields that
//! reference them: a read-only walk collects absolute target paths and the
//! values they must hold, then the updates are applied from the root.

use crate::node::Node;
use crate::schema::path::{FieldPath, Segment};
use crate::schema::{FieldKind, SizeSpec};
use crate::value::Value;

struct ScopeLevel<'a> {
    /// Absolute path of the composite that owns `nodes`.
    prefix: Vec<Segment>,
    /// Siblings that precede the node currently being walked.
    nodes: &'a [Node],
}

pub(crate) fn reconcile(root: &mut Node) {
    let mut updates: Vec<(Vec<Segment>, u64)> = Vec::new();
    let mut scopes: Vec<ScopeLevel<'_>> = Vec::new();
    collect(root, &mut scopes, &[], &mut updates);
    for (segments, value) in updates {
        if let Some(target) = root.at_segments_mut(&segments) {
            // Width checks can only fail here for absurdly long content;
            // the count field then keeps its previous value and the
            // mismatch surfaces through the integrity test.
            let _ = target.set_value(Value::UInt(value));
        }
    }
}

fn collect<'a>(
    node: &'a Node,
    scopes: &mut Vec<ScopeLevel<'a>>,
    self_segs: &[Segment],
    updates: &mut Vec<(Vec<Segment>, u64)>,
) {
    match &node.def().kind {
        FieldKind::Array { count, .. } => {
            if let SizeSpec::Path(path) = count {
                push_update(path, node.children().len() as u64, scopes, updates);
            }
            for (i, child) in node.children().iter().enumerate() {
                let mut segs = self_segs.to_vec();
                segs.push(Segment::Index(i));
                collect(child, scopes, &segs, updates);
            }
        }
        FieldKind::Str {
            size: SizeSpec::Path(path),
        } => {
            let len = match node.value() {
                Some(Value::Str(s)) => s.len() as u64,
                Some(Value::Bytes(b)) => b.len() as u64,
                _ => 0,
            };
            push_update(path, len, scopes, updates);
        }
        FieldKind::Container { .. } | FieldKind::Struct { .. } => {
            let children = node.children();
            for (i, child) in children.iter().enumerate() {
                scopes.push(ScopeLevel {
                    prefix: self_segs.to_vec(),
                    nodes: &children[..i],
                });
                let mut segs = self_segs.to_vec();
                segs.push(Segment::Name(child.name().to_string()));
                collect(child, scopes, &segs, updates);
                scopes.pop();
            }
        }
        _ => {}
    }
}

fn push_update(
    path: &str,
    value: u64,
    scopes: &[ScopeLevel<'_>],
    updates: &mut Vec<(Vec<Segment>, u64)>,
) {
    let parsed = match FieldPath::parse(path) {
        Ok(p) => p,
        Err(_) => return,
    };
    let head = match parsed.head() {
        Some(h) => h,
        None => return,
    };
    for level in scopes.iter().rev() {
        if let Some(anchor) = level.nodes.iter().find(|n| n.name() == head) {
            if anchor.at_segments(&parsed.segments[1..]).is_none() {
                return;
            }
            let mut abs = level.prefix.clone();
            abs.extend(parsed.segments.iter().cloned());
            updates.push((abs, value));
            return;
        }
    }
}
