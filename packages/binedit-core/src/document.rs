//! An open document: node tree, schema, source path, dirty state, and
//! edit history.
//!
//! All mutation funnels through the document so every change lands in the
//! history ring and flips the dirty flag. The codec stays pure; this layer
//! owns the filesystem and decides what the user hears about.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::warn;

use crate::backup::BackupPolicy;
use crate::codec::{self, CodecOptions};
use crate::defaults;
use crate::error::{Error, PathError, SerializeError};
use crate::history::{EditHistory, EditPayload, EditRecord};
use crate::node::Node;
use crate::schema::{FieldKind, Schema};
use crate::value::Value;
use crate::version::{self, FormatVersion};

#[derive(Debug)]
pub struct Document {
    schema: Schema,
    root: Node,
    source: Option<PathBuf>,
    dirty: bool,
    history: EditHistory,
}

impl Document {
    /// A document built entirely from schema defaults, as used when no
    /// file exists yet.
    pub fn new_default(schema: &Schema) -> Document {
        Document {
            schema: schema.clone(),
            root: defaults::build_defaults(schema),
            source: None,
            dirty: false,
            history: EditHistory::default(),
        }
    }

    pub fn from_tree(schema: &Schema, root: Node, source: Option<PathBuf>) -> Document {
        Document {
            schema: schema.clone(),
            root,
            source,
            dirty: false,
            history: EditHistory::default(),
        }
    }

    /// Parses a buffer directly against a known schema.
    pub fn from_bytes(
        bytes: &[u8],
        schema: &Schema,
        opts: &CodecOptions,
    ) -> Result<Document, Error> {
        let root = codec::parse(bytes, schema, opts)?;
        Ok(Document::from_tree(schema, root, None))
    }

    /// Opens a config or style file through the version pipeline: the
    /// header picks the schema, legacy trees are upgraded, and the
    /// resulting document always conforms to the current layout.
    pub fn open_versioned(
        path: &Path,
        opts: &CodecOptions,
    ) -> Result<(Document, FormatVersion), Error> {
        let bytes = std::fs::read(path)?;
        let (root, fv) = version::load(&bytes, opts)?;
        let schema = version::current_schema(fv.kind);
        Ok((
            Document::from_tree(schema, root, Some(path.to_path_buf())),
            fv,
        ))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, path: PathBuf) {
        self.source = Some(path);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when any node was retained under `allow_corrupt`.
    pub fn tainted(&self) -> bool {
        self.root.subtree_tainted()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history.set_capacity(capacity);
    }

    pub fn get(&self, path: &str) -> Result<&Node, PathError> {
        self.root.get(path)
    }

    /// Sets a leaf value, recording the edit. Setting a field to its
    /// current value records nothing.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), Error> {
        self.set_at(path, value, Instant::now())
    }

    pub(crate) fn set_at(&mut self, path: &str, value: Value, at: Instant) -> Result<(), Error> {
        let node = self.root.get_mut(path)?;
        let before = node.set_value(value)?;
        let after = node.value().cloned().unwrap_or_else(|| before.clone());
        if before == after {
            return Ok(());
        }
        self.history.commit(EditRecord {
            path: path.to_string(),
            payload: EditPayload::Leaf { before, after },
            at,
        });
        self.dirty = true;
        Ok(())
    }

    /// Grows an array with default-constructed elements or truncates it.
    /// Count fields referenced by the array's SIZE path are rewritten at
    /// the next serialize, never here, so undo stays coherent.
    pub fn resize_array(&mut self, path: &str, new_len: usize) -> Result<(), Error> {
        let node = self.root.get_mut(path)?;
        if !matches!(node.def().kind, FieldKind::Array { .. }) {
            return Err(PathError::TypeMismatch {
                path: path.to_string(),
                expected: "array",
                got: node.def().kind.kind_name(),
            }
            .into());
        }
        let before: Vec<Node> = node.children().to_vec();
        if new_len == before.len() {
            return Ok(());
        }
        if new_len < before.len() {
            node.children_mut().truncate(new_len);
        } else {
            for _ in before.len()..new_len {
                defaults::append_element(node);
            }
        }
        let after: Vec<Node> = node.children().to_vec();
        self.history.commit(EditRecord {
            path: path.to_string(),
            payload: EditPayload::Array { before, after },
            at: Instant::now(),
        });
        self.dirty = true;
        Ok(())
    }

    /// Reorders one array element, preserving identities.
    pub fn move_element(&mut self, path: &str, from: usize, to: usize) -> Result<(), Error> {
        if from == to {
            return Ok(());
        }
        let node = self.root.get_mut(path)?;
        node.move_child(from, to)?;
        self.history.commit(EditRecord {
            path: path.to_string(),
            payload: EditPayload::Move { from, to },
            at: Instant::now(),
        });
        self.dirty = true;
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Reverts the newest applied edit. Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        let record = match self.history.undo() {
            Some(r) => r.clone(),
            None => return false,
        };
        self.apply_record(&record, true)
    }

    /// Reapplies the newest undone edit.
    pub fn redo(&mut self) -> bool {
        let record = match self.history.redo() {
            Some(r) => r.clone(),
            None => return false,
        };
        self.apply_record(&record, false)
    }

    fn apply_record(&mut self, record: &EditRecord, inverse: bool) -> bool {
        let applied = match &record.payload {
            EditPayload::Leaf { before, after } => {
                let value = if inverse { before } else { after };
                self.root
                    .get_mut(&record.path)
                    .and_then(|node| node.set_value(value.clone()))
                    .is_ok()
            }
            EditPayload::Array { before, after } => {
                let elements = if inverse { before } else { after };
                match self.root.get_mut(&record.path) {
                    Ok(node) if node.def().kind.is_composite() => {
                        *node.children_mut() = elements.clone();
                        true
                    }
                    _ => false,
                }
            }
            EditPayload::Move { from, to } => {
                let (from, to) = if inverse { (*to, *from) } else { (*from, *to) };
                self.root
                    .get_mut(&record.path)
                    .and_then(|node| node.move_child(from, to))
                    .is_ok()
            }
        };
        if applied {
            self.dirty = true;
        } else {
            // History referenced a path the tree no longer has; a defect
            // worth hearing about, not worth crashing over.
            warn!(path = %record.path, "history record no longer applies");
        }
        applied
    }

    /// Serializes the current tree. Reconciliation refreshes count fields
    /// and node extents as part of this.
    pub fn to_bytes(&mut self, opts: &CodecOptions) -> Result<Vec<u8>, SerializeError> {
        codec::serialize(&mut self.root, opts)
    }

    /// Saves to the document's source path.
    pub fn save(
        &mut self,
        opts: &CodecOptions,
        integrity_test: bool,
        backup: Option<&BackupPolicy>,
    ) -> Result<(), Error> {
        let path = match self.source.clone() {
            Some(path) => path,
            None => {
                return Err(SerializeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "document has no source path",
                ))
                .into())
            }
        };
        self.save_to(&path, opts, integrity_test, backup)
    }

    pub fn save_as(
        &mut self,
        path: &Path,
        opts: &CodecOptions,
        integrity_test: bool,
        backup: Option<&BackupPolicy>,
    ) -> Result<(), Error> {
        self.save_to(path, opts, integrity_test, backup)?;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    /// Writes atomically: serialize, write a temp sibling, optionally
    /// verify the bytes round-trip, then rename over the target. A failed
    /// integrity test leaves the original untouched and the temp file on
    /// disk for inspection.
    fn save_to(
        &mut self,
        path: &Path,
        opts: &CodecOptions,
        integrity_test: bool,
        backup: Option<&BackupPolicy>,
    ) -> Result<(), Error> {
        if let Some(policy) = backup {
            if let Err(err) = policy.maybe_back_up(path) {
                warn!(path = %path.display(), %err, "backup failed; continuing with save");
            }
        }

        let bytes = codec::serialize(&mut self.root, opts)?;

        let temp = temp_sibling(path);
        {
            let mut file = File::create(&temp).map_err(SerializeError::Io)?;
            file.write_all(&bytes).map_err(SerializeError::Io)?;
            file.sync_all().map_err(SerializeError::Io)?;
        }

        if integrity_test && !self.verify_round_trip(&bytes, opts) {
            warn!(
                path = %path.display(),
                temp = %temp.display(),
                "integrity test failed; original left untouched"
            );
            return Err(SerializeError::IntegrityFailed {
                path: path.display().to_string(),
            }
            .into());
        }

        std::fs::rename(&temp, path).map_err(SerializeError::Io)?;
        self.source = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    fn verify_round_trip(&self, bytes: &[u8], opts: &CodecOptions) -> bool {
        let mut reopened = match codec::parse(bytes, &self.schema, opts) {
            Ok(tree) => tree,
            Err(_) => return false,
        };
        match codec::serialize(&mut reopened, opts) {
            Ok(again) => again == bytes,
            Err(_) => false,
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    path.with_file_name(format!("{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn config_doc() -> Document {
        Document::new_default(formats::config_v2())
    }

    #[test]
    fn flag_flip_is_undoable_and_redoable() {
        let mut doc = config_doc();
        let path = "app_window.flags";
        let mask = doc.get(path).unwrap().value().unwrap().as_u64().unwrap();
        doc.set(path, Value::UInt(mask | (1 << 3))).unwrap();
        assert_eq!(doc.get(path).unwrap().flag("debug_mode"), Some(true));
        assert!(doc.is_dirty());

        assert!(doc.undo());
        assert_eq!(doc.get(path).unwrap().flag("debug_mode"), Some(false));
        assert!(doc.redo());
        assert_eq!(doc.get(path).unwrap().flag("debug_mode"), Some(true));
    }

    #[test]
    fn edit_sequence_fully_inverts() {
        let mut doc = config_doc();
        let original = doc.root().clone();
        let t = Instant::now();
        let edits = [
            ("app_window.recent_tag_max", Value::UInt(5)),
            ("tag_windows.max_undos", Value::UInt(50)),
            ("tag_backup.max_count", Value::UInt(9)),
        ];
        for (i, (path, value)) in edits.iter().enumerate() {
            doc.set_at(path, value.clone(), t + std::time::Duration::from_secs(i as u64 + 1))
                .unwrap();
        }
        let edited = doc.root().clone();

        for _ in 0..edits.len() {
            assert!(doc.undo());
        }
        assert!(!doc.undo());
        assert_eq!(doc.root(), &original);

        for _ in 0..edits.len() {
            assert!(doc.redo());
        }
        assert!(!doc.redo());
        assert_eq!(doc.root(), &edited);
    }

    #[test]
    fn noop_set_records_nothing() {
        let mut doc = config_doc();
        let current = doc
            .get("app_window.recent_tag_max")
            .unwrap()
            .value()
            .cloned()
            .unwrap();
        doc.set("app_window.recent_tag_max", current).unwrap();
        assert!(!doc.is_dirty());
        assert!(!doc.can_undo());
    }

    #[test]
    fn resize_array_round_trips_through_history() {
        let mut doc = config_doc();
        doc.resize_array("appearance.colors", 3).unwrap();
        assert_eq!(doc.get("appearance.colors").unwrap().children().len(), 3);
        doc.set("appearance.colors[1].g", Value::UInt(200)).unwrap();

        assert!(doc.undo()); // color edit
        assert!(doc.undo()); // resize
        assert_eq!(doc.get("appearance.colors").unwrap().children().len(), 0);
        assert!(doc.redo());
        assert_eq!(doc.get("appearance.colors").unwrap().children().len(), 3);
    }

    #[test]
    fn move_element_preserves_identity() {
        let mut doc = config_doc();
        doc.resize_array("all_hotkeys.hotkeys", 2).unwrap();
        doc.set("all_hotkeys.hotkeys[0].method", Value::UInt(3)).unwrap();
        doc.set("all_hotkeys.hotkeys[1].method", Value::UInt(7)).unwrap();
        doc.move_element("all_hotkeys.hotkeys", 0, 1).unwrap();
        assert_eq!(
            doc.get("all_hotkeys.hotkeys[0].method").unwrap().value(),
            Some(&Value::UInt(7))
        );
        assert!(doc.undo());
        assert_eq!(
            doc.get("all_hotkeys.hotkeys[0].method").unwrap().value(),
            Some(&Value::UInt(3))
        );
    }

    #[test]
    fn save_and_reopen_preserve_the_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.cfg");
        let opts = CodecOptions::default();

        let mut doc = config_doc();
        doc.set("app_window.recent_tag_max", Value::UInt(7)).unwrap();
        doc.save_as(&path, &opts, true, None).unwrap();
        assert!(!doc.is_dirty());
        assert!(path.exists());
        assert!(!temp_sibling(&path).exists());

        let (reopened, fv) = Document::open_versioned(&path, &opts).unwrap();
        assert_eq!(fv.version, 2);
        assert_eq!(
            reopened.get("app_window.recent_tag_max").unwrap().value(),
            Some(&Value::UInt(7))
        );
    }

    #[test]
    fn save_without_source_is_an_error() {
        let mut doc = config_doc();
        assert!(doc.save(&CodecOptions::default(), false, None).is_err());
    }
}
