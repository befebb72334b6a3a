//! Persisted hotkey assignments.
//!
//! A single JSON object maps lowercase process name to `{action: combo}`.
//! Persistence is best-effort: reads degrade to an empty mapping and write
//! failures are logged and swallowed, so in-memory state stays authoritative
//! for the current run.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Full persisted mapping: process name -> (action -> combo)
pub type SavedHotkeys = BTreeMap<String, BTreeMap<String, String>>;

/// Storage contract for hotkey assignments
#[cfg_attr(test, mockall::automock)]
pub trait HotkeyStore: Send + Sync {
    /// Return the full mapping; empty when the backing file is absent or corrupt
    fn load_all(&self) -> SavedHotkeys;

    /// Upsert one action combo, or delete the action when `combo` is `None`.
    /// A process entry whose action map becomes empty is removed entirely.
    fn save_hotkey<'a>(&self, process_name: &str, action: &str, combo: Option<&'a str>);

    /// Reset the store to an empty mapping
    fn clear_all(&self);
}

/// Flat-file JSON implementation of [`HotkeyStore`]
pub struct JsonHotkeyStore {
    path: PathBuf,
}

impl JsonHotkeyStore {
    /// Open a store at `path`, creating an empty file when absent
    pub fn new(path: PathBuf) -> Self {
        let store = Self { path };
        if !store.path.exists() {
            store.write(&SavedHotkeys::new());
        }
        store
    }

    fn read(&self) -> SavedHotkeys {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "hotkey file corrupt, treating as empty");
                SavedHotkeys::new()
            }),
            Err(_) => SavedHotkeys::new(),
        }
    }

    fn write(&self, data: &SavedHotkeys) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %e, "failed to create hotkey directory");
                return;
            }
        }
        let contents = match serde_json::to_string_pretty(data) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "failed to serialize hotkeys");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, contents) {
            warn!(path = %self.path.display(), error = %e, "failed to write hotkey file");
        }
    }
}

impl HotkeyStore for JsonHotkeyStore {
    fn load_all(&self) -> SavedHotkeys {
        self.read()
    }

    fn save_hotkey(&self, process_name: &str, action: &str, combo: Option<&str>) {
        let mut data = self.read();
        let key = process_name.to_lowercase();
        let entry = data.entry(key.clone()).or_default();
        match combo {
            Some(combo) => {
                entry.insert(action.to_owned(), combo.to_owned());
            }
            None => {
                entry.remove(action);
            }
        }
        // Empty entries must not survive a write
        if entry.is_empty() {
            data.remove(&key);
        }
        self.write(&data);
    }

    fn clear_all(&self) {
        self.write(&SavedHotkeys::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, JsonHotkeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHotkeyStore::new(dir.path().join("hotkeys.json"));
        (dir, store)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = temp_store();
        store.save_hotkey("chrome", "up", Some("ctrl+alt+up"));

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all["chrome"]["up"], "ctrl+alt+up");
    }

    #[test]
    fn test_delete_prunes_empty_entry() {
        let (_dir, store) = temp_store();
        store.save_hotkey("chrome", "up", Some("ctrl+alt+up"));
        store.save_hotkey("chrome", "up", None);

        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_delete_keeps_remaining_actions() {
        let (_dir, store) = temp_store();
        store.save_hotkey("chrome", "up", Some("ctrl+up"));
        store.save_hotkey("chrome", "mute", Some("ctrl+m"));
        store.save_hotkey("chrome", "up", None);

        let all = store.load_all();
        assert_eq!(all["chrome"].len(), 1);
        assert_eq!(all["chrome"]["mute"], "ctrl+m");
    }

    #[test]
    fn test_name_keys_are_lowercased() {
        let (_dir, store) = temp_store();
        store.save_hotkey("Game.EXE", "down", Some("ctrl+down"));

        let all = store.load_all();
        assert!(all.contains_key("game.exe"));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHotkeyStore {
            path: dir.path().join("never-created.json"),
        };
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let (dir, store) = temp_store();
        fs::write(dir.path().join("hotkeys.json"), "{not json").unwrap();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let (_dir, store) = temp_store();
        store.save_hotkey("chrome", "up", Some("ctrl+up"));
        store.save_hotkey("game.exe", "mute", Some("ctrl+m"));
        store.clear_all();

        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_file_created_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hotkeys.json");
        let _store = JsonHotkeyStore::new(path.clone());
        assert!(path.exists());
    }
}
