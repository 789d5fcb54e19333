//! Process-wide application state: the config document and the style
//! document, loaded at startup and saved on clean shutdown.
//!
//! The application flags that shape codec and binding behavior live inside
//! the config tree itself; this module projects them into the option
//! structs the rest of the crate consumes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::backup::BackupPolicy;
use crate::binding::BindingFlags;
use crate::codec::CodecOptions;
use crate::document::Document;
use crate::error::Error;
use crate::value::Value;
use crate::version::{self, FormatKind};

#[derive(Debug)]
pub struct Session {
    config: Document,
    style: Document,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .min(u32::MAX as u64)
}

/// Loads a config or style file, falling back to defaults when the file is
/// missing or unreadable. Startup never fails over a bad preferences file;
/// it warns and starts clean.
fn load_or_default(path: &Path, kind: FormatKind) -> Document {
    // The flags that would govern parsing live inside the file being
    // parsed, so startup reads leniently.
    let bootstrap = CodecOptions {
        allow_corrupt: true,
        ..CodecOptions::default()
    };
    match std::fs::read(path) {
        Ok(bytes) => match version::load(&bytes, &bootstrap) {
            Ok((root, _)) => {
                return Document::from_tree(
                    version::current_schema(kind),
                    root,
                    Some(path.to_path_buf()),
                );
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable file; starting from defaults");
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read file; starting from defaults");
        }
    }

    let mut doc = Document::new_default(version::current_schema(kind));
    doc.set_source(path.to_path_buf());
    let created = match kind {
        FormatKind::Config => "version_info.date_created",
        FormatKind::Style => "header.date_created",
    };
    if let Ok(node) = doc.root_mut().get_mut(created) {
        let _ = node.set_value(Value::UInt(now_secs()));
    }
    doc
}

impl Session {
    pub fn startup(config_path: &Path, style_path: &Path) -> Session {
        let config = load_or_default(config_path, FormatKind::Config);
        let style = load_or_default(style_path, FormatKind::Style);
        let mut session = Session { config, style };
        let capacity = session.max_undos();
        session.config.set_history_capacity(capacity);
        session
    }

    pub fn config(&self) -> &Document {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Document {
        &mut self.config
    }

    pub fn style(&self) -> &Document {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut Document {
        &mut self.style
    }

    fn config_flag(&self, path: &str, flag: &str) -> bool {
        self.config
            .get(path)
            .ok()
            .and_then(|n| n.flag(flag))
            .unwrap_or(false)
    }

    fn config_uint(&self, path: &str) -> Option<u64> {
        self.config.get(path).ok()?.value()?.as_u64()
    }

    /// Codec behavior projected from the live config tree.
    pub fn codec_options(&self) -> CodecOptions {
        let fh = "tag_windows.file_handling_flags";
        let wf = "tag_windows.widget_flags";
        CodecOptions {
            allow_corrupt: self.config_flag(fh, "allow_corrupt"),
            enforce_min: self.config_flag(wf, "enforce_min"),
            enforce_max: self.config_flag(wf, "enforce_max"),
            ..CodecOptions::default()
        }
    }

    /// Rendering and editability flags projected from the live config tree.
    pub fn binding_flags(&self) -> BindingFlags {
        let wf = "tag_windows.widget_flags";
        BindingFlags {
            show_invisible: self.config_flag(wf, "show_invisible"),
            show_structure_meta: self.config_flag(wf, "show_structure_meta"),
            edit_uneditable: self.config_flag(wf, "edit_uneditable"),
            evaluate_entry_fields: self.config_flag(wf, "evaluate_entry_fields"),
            debug_mode: self.config_flag("app_window.flags", "debug_mode"),
        }
    }

    pub fn integrity_test(&self) -> bool {
        self.config_flag("tag_windows.file_handling_flags", "integrity_test")
    }

    pub fn max_undos(&self) -> usize {
        self.config_uint("tag_windows.max_undos")
            .unwrap_or(crate::history::DEFAULT_CAPACITY as u64) as usize
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        let folder = self
            .config
            .get("tag_backup.folder_basename")
            .ok()
            .and_then(|n| n.value())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("backup"));
        let interval = self
            .config
            .get("tag_backup.interval")
            .ok()
            .and_then(|n| n.value())
            .and_then(Value::as_f64)
            .filter(|v| *v >= 0.0)
            .unwrap_or(300.0);
        BackupPolicy {
            folder_basename: folder,
            max_count: self.config_uint("tag_backup.max_count").unwrap_or(3) as u32,
            interval: Duration::from_secs_f64(interval),
            notify: self.config_flag("tag_backup.flags", "notify_when_created"),
        }
    }

    /// Pushes a path to the front of the recent-tags list, dropping any
    /// duplicate and evicting past `recent_tag_max`.
    pub fn record_recent_tag(&mut self, path: &str) {
        let max = self
            .config_uint("app_window.recent_tag_max")
            .unwrap_or(20) as usize;
        let mut entries: Vec<String> = self
            .config
            .get("recent_tags")
            .map(|list| {
                list.children()
                    .iter()
                    .filter_map(|entry| {
                        entry.child("path").and_then(|p| p.value()).and_then(|v| {
                            v.as_str().map(|s| s.to_string())
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.retain(|existing| existing != path);
        entries.insert(0, path.to_string());
        entries.truncate(max);

        let count = entries.len();
        if self.config.resize_array("recent_tags", count).is_err() {
            return;
        }
        for (i, entry) in entries.into_iter().enumerate() {
            let _ = self
                .config
                .set(&format!("recent_tags[{}].path", i), Value::Str(entry));
        }
    }

    /// Stamps modification dates and saves both documents. Called on clean
    /// shutdown; both saves are attempted even if the first fails.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let stamp = Value::UInt(now_secs());
        if let Ok(node) = self.config.root_mut().get_mut("version_info.date_modified") {
            let _ = node.set_value(stamp.clone());
        }
        if let Ok(node) = self.style.root_mut().get_mut("header.date_modified") {
            let _ = node.set_value(stamp);
        }

        let opts = self.codec_options();
        let integrity = self.integrity_test();
        let config_result = self.config.save(&opts, integrity, None);
        let style_result = self.style.save(&opts, integrity, None);
        config_result.and(style_result)
    }
}
