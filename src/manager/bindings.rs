//! Live hotkey binding bookkeeping.
//!
//! [`BindingTable`] owns the `(pid, action) -> handler` table and the
//! `pid -> process name` cache, and keeps both consistent with the hotkey
//! service and the persisted store. It is an explicitly constructed state
//! object with its lifecycle tied to application start, not a global.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::input::{HandlerId, HotkeyCallback, HotkeyError, HotkeyService};
use crate::store::HotkeyStore;

/// A hotkey-triggerable volume action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Raise volume by one step
    VolumeUp,
    /// Lower volume by one step
    VolumeDown,
    /// Invert the mute flag
    ToggleMute,
}

impl Action {
    /// Every action, in presentation order
    pub const ALL: [Self; 3] = [Self::VolumeUp, Self::VolumeDown, Self::ToggleMute];

    /// Stable name used in the persisted store
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VolumeUp => "up",
            Self::VolumeDown => "down",
            Self::ToggleMute => "mute",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action name outside the "up"/"down"/"mute" vocabulary.
///
/// This is a programming-contract violation (or a hand-edited store file),
/// never a user-facing condition.
#[derive(Debug, Error)]
#[error("invalid hotkey action {0:?}")]
pub struct InvalidAction(pub String);

impl FromStr for Action {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::VolumeUp),
            "down" => Ok(Self::VolumeDown),
            "mute" => Ok(Self::ToggleMute),
            other => Err(InvalidAction(other.to_owned())),
        }
    }
}

/// Live registrations and the pid -> name cache
pub struct BindingTable {
    hotkeys: Arc<dyn HotkeyService>,
    store: Box<dyn HotkeyStore>,
    live: HashMap<(u32, Action), HandlerId>,
    names: HashMap<u32, String>,
}

impl BindingTable {
    /// Build an empty table over the given capability providers
    pub fn new(hotkeys: Arc<dyn HotkeyService>, store: Box<dyn HotkeyStore>) -> Self {
        Self {
            hotkeys,
            store,
            live: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Remember the executable name last seen for `pid`
    pub fn record_process_name(&mut self, pid: u32, name: &str) {
        if !name.is_empty() {
            self.names.insert(pid, name.to_owned());
        }
    }

    /// Bind `combo` to `(pid, action)`, replacing any existing binding.
    ///
    /// The previous handler is deregistered before the new one is registered,
    /// so at most one handler is ever live per key and a combo never triggers
    /// twice. The assignment is persisted under the pid's cached name; with
    /// no cached name it stays in-memory only.
    pub fn assign(
        &mut self,
        pid: u32,
        action: Action,
        combo: &str,
        callback: HotkeyCallback,
    ) -> Result<(), HotkeyError> {
        let key = (pid, action);
        if let Some(previous) = self.live.remove(&key) {
            self.hotkeys.remove(previous);
        }
        let id = self.hotkeys.register(combo, callback)?;
        self.live.insert(key, id);
        debug!(pid, action = %action, combo, "hotkey bound");

        if let Some(name) = self.names.get(&pid) {
            self.store.save_hotkey(name, action.as_str(), Some(combo));
        }
        Ok(())
    }

    /// Re-materialize saved bindings for a (re)discovered process.
    ///
    /// Looks up the persisted config for `name` (case-insensitive) and
    /// assigns every saved combo not already live for this pid, building
    /// callbacks through `factory`. Idempotent: a second call with no
    /// intervening changes registers nothing.
    pub fn ensure_defaults_for_process(
        &mut self,
        pid: u32,
        name: &str,
        factory: impl Fn(Action, u32) -> HotkeyCallback,
    ) -> Result<()> {
        let saved = self
            .store
            .load_all()
            .remove(&name.to_lowercase())
            .unwrap_or_default();
        if saved.is_empty() {
            return Ok(());
        }
        self.record_process_name(pid, name);
        for (action_name, combo) in &saved {
            let action = Action::from_str(action_name)?;
            if self.live.contains_key(&(pid, action)) {
                continue;
            }
            self.assign(pid, action, combo, factory(action, pid))?;
        }
        Ok(())
    }

    /// Deregister every live handler and wipe the persisted store.
    ///
    /// Global and irreversible; not scoped to one process.
    pub fn clear_all(&mut self) {
        self.hotkeys.clear_all();
        self.live.clear();
        self.store.clear_all();
    }

    /// Deregister and drop every live handler bound to `pid`
    pub fn remove_for_pid(&mut self, pid: u32) {
        let keys: Vec<(u32, Action)> = self
            .live
            .keys()
            .filter(|(key_pid, _)| *key_pid == pid)
            .copied()
            .collect();
        for key in keys {
            if let Some(id) = self.live.remove(&key) {
                self.hotkeys.remove(id);
            }
        }
    }

    /// Saved action -> combo map for a process name (case-insensitive)
    pub fn saved_for_process(&self, name: &str) -> BTreeMap<String, String> {
        self.store
            .load_all()
            .remove(&name.to_lowercase())
            .unwrap_or_default()
    }

    /// Live handler for a key, if any
    pub fn handler_for(&self, pid: u32, action: Action) -> Option<HandlerId> {
        self.live.get(&(pid, action)).copied()
    }

    /// Number of live bindings
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MockHotkeyService;
    use crate::store::{HotkeyStore, JsonHotkeyStore};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn noop() -> HotkeyCallback {
        Box::new(|| {})
    }

    fn temp_store() -> (tempfile::TempDir, Box<JsonHotkeyStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Box::new(JsonHotkeyStore::new(dir.path().join("hotkeys.json")));
        (dir, store)
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_str(action.as_str()).unwrap(), action);
        }
        assert!(Action::from_str("louder").is_err());
    }

    #[test]
    fn test_assign_registers_and_persists_with_name() {
        let mut hotkeys = MockHotkeyService::new();
        hotkeys
            .expect_register()
            .withf(|combo, _| combo == "ctrl+up")
            .times(1)
            .returning(|_, _| Ok(HandlerId::from_raw(1)));

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.record_process_name(1234, "game.exe");
        table.assign(1234, Action::VolumeUp, "ctrl+up", noop()).unwrap();

        assert_eq!(table.live_count(), 1);
        assert_eq!(
            table.saved_for_process("game.exe").get("up"),
            Some(&"ctrl+up".to_owned())
        );
    }

    #[test]
    fn test_assign_without_cached_name_skips_persistence() {
        let mut hotkeys = MockHotkeyService::new();
        hotkeys
            .expect_register()
            .times(1)
            .returning(|_, _| Ok(HandlerId::from_raw(1)));

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.assign(1234, Action::VolumeUp, "ctrl+up", noop()).unwrap();

        // Bound in memory, nothing written
        assert_eq!(table.live_count(), 1);
        assert!(table.saved_for_process("game.exe").is_empty());
    }

    #[test]
    fn test_reassign_deregisters_previous_handler_first() {
        let mut hotkeys = MockHotkeyService::new();
        let mut seq = Sequence::new();
        hotkeys
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(HandlerId::from_raw(1)));
        hotkeys
            .expect_remove()
            .with(eq(HandlerId::from_raw(1)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        hotkeys
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(HandlerId::from_raw(2)));

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.record_process_name(1234, "game.exe");
        table.assign(1234, Action::VolumeUp, "ctrl+up", noop()).unwrap();
        table
            .assign(1234, Action::VolumeUp, "ctrl+alt+up", noop())
            .unwrap();

        assert_eq!(table.live_count(), 1);
        assert_eq!(
            table.handler_for(1234, Action::VolumeUp),
            Some(HandlerId::from_raw(2))
        );
    }

    #[test]
    fn test_failed_registration_keeps_key_free() {
        let mut hotkeys = MockHotkeyService::new();
        hotkeys.expect_register().times(1).returning(|combo, _| {
            Err(HotkeyError::Registration {
                combo: combo.to_owned(),
                reason: "already taken".to_owned(),
            })
        });

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.record_process_name(1234, "game.exe");
        let result = table.assign(1234, Action::VolumeUp, "ctrl+up", noop());

        assert!(result.is_err());
        assert_eq!(table.live_count(), 0);
        assert!(table.saved_for_process("game.exe").is_empty());
    }

    #[test]
    fn test_ensure_defaults_noop_without_saved_config() {
        // Default mock rejects any register call
        let hotkeys = MockHotkeyService::new();
        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);

        table
            .ensure_defaults_for_process(1234, "game.exe", |_, _| noop())
            .unwrap();
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_ensure_defaults_restores_saved_bindings_once() {
        let mut hotkeys = MockHotkeyService::new();
        hotkeys
            .expect_register()
            .withf(|combo, _| combo == "ctrl+up")
            .times(1)
            .returning(|_, _| Ok(HandlerId::from_raw(1)));

        let (_dir, store) = temp_store();
        store.save_hotkey("game.exe", "up", Some("ctrl+up"));
        let mut table = BindingTable::new(Arc::new(hotkeys), store);

        table
            .ensure_defaults_for_process(5678, "Game.exe", |_, _| noop())
            .unwrap();
        assert_eq!(table.live_count(), 1);

        // Second call with no intervening changes registers nothing
        table
            .ensure_defaults_for_process(5678, "Game.exe", |_, _| noop())
            .unwrap();
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_ensure_defaults_rejects_invalid_saved_action() {
        let hotkeys = MockHotkeyService::new();
        let (_dir, store) = temp_store();
        store.save_hotkey("game.exe", "louder", Some("ctrl+up"));
        let mut table = BindingTable::new(Arc::new(hotkeys), store);

        let result = table.ensure_defaults_for_process(1234, "game.exe", |_, _| noop());
        assert!(result.is_err());
    }

    #[test]
    fn test_clear_all_empties_live_table_and_store() {
        let mut hotkeys = MockHotkeyService::new();
        hotkeys
            .expect_register()
            .times(1)
            .returning(|_, _| Ok(HandlerId::from_raw(1)));
        hotkeys.expect_clear_all().times(1).return_const(());

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.record_process_name(1234, "game.exe");
        table.assign(1234, Action::VolumeUp, "ctrl+up", noop()).unwrap();

        table.clear_all();
        assert_eq!(table.live_count(), 0);
        assert!(table.saved_for_process("game.exe").is_empty());
    }

    #[test]
    fn test_remove_for_pid_is_scoped() {
        let mut hotkeys = MockHotkeyService::new();
        let mut next = 0u64;
        hotkeys.expect_register().times(3).returning(move |_, _| {
            next += 1;
            Ok(HandlerId::from_raw(next))
        });
        hotkeys.expect_remove().times(2).return_const(());

        let (_dir, store) = temp_store();
        let mut table = BindingTable::new(Arc::new(hotkeys), store);
        table.assign(1234, Action::VolumeUp, "ctrl+up", noop()).unwrap();
        table
            .assign(1234, Action::ToggleMute, "ctrl+m", noop())
            .unwrap();
        table
            .assign(5678, Action::VolumeDown, "ctrl+down", noop())
            .unwrap();

        table.remove_for_pid(1234);
        assert_eq!(table.live_count(), 1);
        assert!(table.handler_for(5678, Action::VolumeDown).is_some());
    }
}
