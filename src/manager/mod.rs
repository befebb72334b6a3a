//! Session polling and hotkey orchestration.
//!
//! [`AppManager`] ties the audio source, the binding table and the volume
//! command layer together: a background task refreshes the session list on a
//! fixed interval, re-applies saved hotkeys for every visible session, and
//! publishes the snapshot to subscribed listeners.

/// Live binding bookkeeping
pub mod bindings;
/// Action-to-mutation translation
pub mod volume;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioError, SessionSnapshot};
use crate::input::{HotkeyCallback, HotkeyError};
use bindings::{Action, BindingTable};
use volume::VolumeController;

type SessionListener = Box<dyn Fn(&[SessionSnapshot]) + Send + Sync>;

/// Poll loop plus the operations the presentation layer drives
#[derive(Clone)]
pub struct AppManager {
    inner: Arc<Inner>,
}

struct Inner {
    volume: VolumeController,
    bindings: Mutex<BindingTable>,
    listeners: Mutex<Vec<SessionListener>>,
    only_active: AtomicBool,
    running: AtomicBool,
    // Bumped on every stop so a task from a previous start never outlives it
    epoch: AtomicU64,
    interval: Duration,
    active_threshold: f32,
}

impl AppManager {
    /// Wire the manager; polling does not start until [`AppManager::start`]
    pub fn new(
        volume: VolumeController,
        bindings: BindingTable,
        interval: Duration,
        active_threshold: f32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                volume,
                bindings: Mutex::new(bindings),
                listeners: Mutex::new(Vec::new()),
                only_active: AtomicBool::new(false),
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                interval,
                active_threshold,
            }),
        }
    }

    /// Subscribe to every published session snapshot (synchronous callback)
    pub fn on_sessions_update(&self, callback: impl Fn(&[SessionSnapshot]) + Send + Sync + 'static) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(Box::new(callback));
        }
    }

    /// Toggle the active-sessions-only filter and refresh immediately
    pub fn set_only_active(&self, flag: bool) {
        self.inner.only_active.store(flag, Ordering::SeqCst);
        if let Err(e) = self.refresh() {
            warn!(error = %e, "refresh after filter change failed");
        }
    }

    /// Current state of the active-sessions-only filter
    pub fn only_active(&self) -> bool {
        self.inner.only_active.load(Ordering::SeqCst)
    }

    /// Start the background poll task; a no-op while already running
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("poll loop already running");
            return;
        }
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let this = self.clone();
        tokio::spawn(async move {
            info!(interval = ?this.inner.interval, "session poll loop started");
            // Stop is cooperative: the flag is checked between iterations and
            // an in-flight refresh always runs to completion. The epoch check
            // retires a task whose stop was followed by a fresh start while it
            // slept through its interval.
            while this.inner.running.load(Ordering::SeqCst)
                && this.inner.epoch.load(Ordering::SeqCst) == epoch
            {
                if let Err(e) = this.refresh() {
                    error!(error = %e, "session refresh failed");
                }
                tokio::time::sleep(this.inner.interval).await;
            }
            info!("session poll loop stopped");
        });
    }

    /// Request the poll task to stop after its current iteration
    pub fn stop(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Whether the poll task is running
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Refresh the session list once: filter, re-apply saved hotkeys, publish.
    ///
    /// # Errors
    /// Propagates audio source enumeration failures to the caller. Failures
    /// while re-applying one session's hotkeys are logged and never abort the
    /// remaining sessions.
    pub fn refresh(&self) -> Result<Vec<SessionSnapshot>, AudioError> {
        let mut sessions = self.inner.volume.list_sessions()?;
        if self.only_active() {
            let threshold = self.inner.active_threshold;
            sessions.retain(|session| session.peak >= threshold);
        }

        {
            let mut table = self
                .inner
                .bindings
                .lock()
                .map_err(|_| AudioError::Backend("binding table lock poisoned".to_owned()))?;
            for session in &sessions {
                table.record_process_name(session.pid, &session.process_name);
                if let Err(e) = table.ensure_defaults_for_process(
                    session.pid,
                    &session.process_name,
                    |action, pid| self.action_callback(action, pid),
                ) {
                    warn!(
                        pid = session.pid,
                        process = %session.process_name,
                        error = %e,
                        "failed to restore saved hotkeys"
                    );
                }
            }
        }

        if let Ok(listeners) = self.inner.listeners.lock() {
            for listener in listeners.iter() {
                listener(&sessions);
            }
        }
        Ok(sessions)
    }

    /// Bind a chord to `(pid, action)` and persist it under the pid's name
    pub fn assign_hotkey(&self, pid: u32, action: Action, combo: &str) -> Result<(), HotkeyError> {
        let mut table = self
            .inner
            .bindings
            .lock()
            .map_err(|_| HotkeyError::Backend("binding table lock poisoned".to_owned()))?;
        table.assign(pid, action, combo, self.action_callback(action, pid))
    }

    /// Saved action -> combo map for a process name
    pub fn saved_hotkeys(&self, process_name: &str) -> std::collections::BTreeMap<String, String> {
        self.inner
            .bindings
            .lock()
            .map(|table| table.saved_for_process(process_name))
            .unwrap_or_default()
    }

    /// Drop every live binding and wipe the persisted store
    pub fn clear_all_hotkeys(&self) {
        if let Ok(mut table) = self.inner.bindings.lock() {
            table.clear_all();
        }
    }

    /// Drop live bindings for one evicted process
    pub fn remove_hotkeys_for_pid(&self, pid: u32) {
        if let Ok(mut table) = self.inner.bindings.lock() {
            table.remove_for_pid(pid);
        }
    }

    fn action_callback(&self, action: Action, pid: u32) -> HotkeyCallback {
        let volume = self.inner.volume.clone();
        Box::new(move || {
            let result = match action {
                Action::VolumeUp => volume.volume_up(pid),
                Action::VolumeDown => volume.volume_down(pid),
                Action::ToggleMute => volume.toggle_mute(pid),
            };
            if let Err(e) = result {
                // A dead pid is a harmless no-op; anything else is worth a line
                warn!(pid, action = %action, error = %e, "hotkey action failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use crate::input::MockHotkeyService;
    use crate::store::JsonHotkeyStore;
    use std::sync::atomic::AtomicUsize;

    fn snapshot(pid: u32, name: &str, peak: f32) -> SessionSnapshot {
        SessionSnapshot {
            pid,
            process_name: name.to_owned(),
            device_name: "Speakers".to_owned(),
            peak,
            muted: false,
            volume: 0.5,
        }
    }

    fn manager_with_sessions(sessions: Vec<SessionSnapshot>) -> (AppManager, tempfile::TempDir) {
        let mut audio = MockAudioSource::new();
        audio
            .expect_list_sessions()
            .returning(move || Ok(sessions.clone()));
        let audio = Arc::new(audio);

        let dir = tempfile::tempdir().unwrap();
        let store = Box::new(JsonHotkeyStore::new(dir.path().join("hotkeys.json")));
        // No saved config: the default mock rejects unexpected register calls
        let table = BindingTable::new(Arc::new(MockHotkeyService::new()), store);
        let volume = VolumeController::new(audio, 0.05);
        let manager = AppManager::new(volume, table, Duration::from_millis(10), 0.02);
        (manager, dir)
    }

    #[test]
    fn test_refresh_publishes_all_sessions_by_default() {
        let (manager, _dir) =
            manager_with_sessions(vec![snapshot(1, "a.exe", 0.5), snapshot(2, "b.exe", 0.001)]);

        let sessions = manager.refresh().unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_only_active_filter_excludes_quiet_sessions() {
        let (manager, _dir) =
            manager_with_sessions(vec![snapshot(1, "a.exe", 0.5), snapshot(2, "b.exe", 0.001)]);

        manager.set_only_active(true);
        let sessions = manager.refresh().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].pid, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (manager, _dir) = manager_with_sessions(vec![snapshot(1, "a.exe", 0.02)]);

        manager.set_only_active(true);
        let sessions = manager.refresh().unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_listeners_receive_snapshots() {
        let (manager, _dir) = manager_with_sessions(vec![snapshot(1, "a.exe", 0.5)]);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_listener = Arc::clone(&seen);
        manager.on_sessions_update(move |sessions| {
            seen_by_listener.store(sessions.len(), Ordering::SeqCst);
        });

        manager.refresh().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_only_active_triggers_immediate_refresh() {
        let (manager, _dir) = manager_with_sessions(vec![snapshot(1, "a.exe", 0.5)]);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_by_listener = Arc::clone(&calls);
        manager.on_sessions_update(move |_| {
            calls_by_listener.fetch_add(1, Ordering::SeqCst);
        });

        manager.set_only_active(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_cooperative() {
        let (manager, _dir) = manager_with_sessions(vec![]);

        manager.start();
        assert!(manager.is_running());
        // Second start while running is a no-op
        manager.start();
        assert!(manager.is_running());

        manager.stop();
        assert!(!manager.is_running());
        // Give the spawned task a chance to observe the flag and exit
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_restart_does_not_leak_the_previous_poll_task() {
        let (manager, _dir) = manager_with_sessions(vec![]);

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_by_listener = Arc::clone(&calls);
        manager.on_sessions_update(move |_| {
            calls_by_listener.fetch_add(1, Ordering::SeqCst);
        });

        // The first task is asleep in its 10 ms interval when the restart
        // happens; it must retire instead of polling alongside the new one
        manager.start();
        manager.stop();
        manager.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.stop();
        let seen = calls.load(Ordering::SeqCst);

        // A single task at a 10 ms interval fits well under this bound; a
        // leaked second task would roughly double the count
        assert!(seen <= 15, "observed {seen} refreshes");
        assert!(seen >= 2, "poll task never ran");
    }

    #[test]
    fn test_refresh_propagates_audio_failure() {
        let mut audio = MockAudioSource::new();
        audio
            .expect_list_sessions()
            .returning(|| Err(AudioError::Backend("boom".to_owned())));

        let dir = tempfile::tempdir().unwrap();
        let store = Box::new(JsonHotkeyStore::new(dir.path().join("hotkeys.json")));
        let table = BindingTable::new(Arc::new(MockHotkeyService::new()), store);
        let manager = AppManager::new(
            VolumeController::new(Arc::new(audio), 0.05),
            table,
            Duration::from_millis(10),
            0.02,
        );

        assert!(manager.refresh().is_err());
    }
}
