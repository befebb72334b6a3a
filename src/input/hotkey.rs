//! Global hotkey registration over the `global-hotkey` crate.
//!
//! The OS-level manager must live on the thread that pumps its events, so it
//! is owned by a dedicated worker thread and driven through an op channel.
//! That keeps [`GlobalHotkeyService`] itself `Send + Sync` for callers on the
//! poll task and the main loop alike. Press events arrive on the crate's
//! global receiver and are routed through [`GlobalHotkeyService::dispatch`].

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{combo, HandlerId, HotkeyCallback, HotkeyError, HotkeyService};

enum Op {
    Register {
        hotkey: HotKey,
        reply: mpsc::Sender<Result<(), String>>,
    },
    Unregister {
        hotkey: HotKey,
    },
    Shutdown,
}

struct Registration {
    hotkey: HotKey,
    callback: HotkeyCallback,
}

/// System-wide hotkey provider backed by `global-hotkey`
pub struct GlobalHotkeyService {
    ops: mpsc::Sender<Op>,
    live: Mutex<HashMap<HandlerId, Registration>>,
    next_id: AtomicU64,
}

impl GlobalHotkeyService {
    /// Start the backend worker and verify the OS hook is usable.
    ///
    /// # Errors
    /// Returns [`HotkeyError::Unavailable`] when the OS refuses the hook
    /// (headless session, missing permissions).
    pub fn new() -> Result<Self, HotkeyError> {
        let (ops_tx, ops_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("hotkey-worker".to_owned())
            .spawn(move || worker(&ops_rx, &ready_tx))
            .map_err(|e| HotkeyError::Backend(format!("failed to spawn hotkey worker: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                warn!(reason, "global hotkey backend failed to start");
                return Err(HotkeyError::Unavailable);
            }
            Err(_) => return Err(HotkeyError::Backend("hotkey worker died".to_owned())),
        }

        info!("global hotkey backend ready");
        Ok(Self {
            ops: ops_tx,
            live: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Route one event from `GlobalHotKeyEvent::receiver()` to its callback
    pub fn dispatch(&self, event: &GlobalHotKeyEvent) {
        if event.state != HotKeyState::Pressed {
            return;
        }
        if let Ok(live) = self.live.lock() {
            for registration in live.values() {
                if registration.hotkey.id() == event.id {
                    (registration.callback)();
                }
            }
        }
    }
}

impl HotkeyService for GlobalHotkeyService {
    fn register(&self, combo: &str, callback: HotkeyCallback) -> Result<HandlerId, HotkeyError> {
        let hotkey = combo::parse(combo)?;

        let (reply_tx, reply_rx) = mpsc::channel();
        self.ops
            .send(Op::Register {
                hotkey,
                reply: reply_tx,
            })
            .map_err(|_| HotkeyError::Backend("hotkey worker gone".to_owned()))?;
        match reply_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return Err(HotkeyError::Registration {
                    combo: combo.to_owned(),
                    reason,
                })
            }
            Err(_) => return Err(HotkeyError::Backend("hotkey worker gone".to_owned())),
        }

        let id = HandlerId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live
            .lock()
            .map_err(|_| HotkeyError::Backend("handler table lock poisoned".to_owned()))?
            .insert(id, Registration { hotkey, callback });
        debug!(combo, id = id.as_raw(), "hotkey registered");
        Ok(id)
    }

    fn remove(&self, id: HandlerId) {
        let removed = match self.live.lock() {
            Ok(mut live) => live.remove(&id),
            Err(_) => None,
        };
        if let Some(registration) = removed {
            let _ = self.ops.send(Op::Unregister {
                hotkey: registration.hotkey,
            });
            debug!(id = id.as_raw(), "hotkey removed");
        }
    }

    fn clear_all(&self) {
        if let Ok(mut live) = self.live.lock() {
            for (_, registration) in live.drain() {
                let _ = self.ops.send(Op::Unregister {
                    hotkey: registration.hotkey,
                });
            }
        }
    }
}

impl Drop for GlobalHotkeyService {
    fn drop(&mut self) {
        self.clear_all();
        let _ = self.ops.send(Op::Shutdown);
    }
}

fn worker(ops: &mpsc::Receiver<Op>, ready: &mpsc::Sender<Result<(), String>>) {
    let manager = match GlobalHotKeyManager::new() {
        Ok(manager) => {
            let _ = ready.send(Ok(()));
            manager
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    loop {
        // On Windows hotkey events arrive as thread messages; pump them so
        // the global receiver keeps filling between ops
        pump_platform_events();

        match ops.recv_timeout(Duration::from_millis(10)) {
            Ok(Op::Register { hotkey, reply }) => {
                let _ = reply.send(manager.register(hotkey).map_err(|e| e.to_string()));
            }
            Ok(Op::Unregister { hotkey }) => {
                if let Err(e) = manager.unregister(hotkey) {
                    warn!(error = %e, "failed to unregister hotkey");
                }
            }
            Ok(Op::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    debug!("hotkey worker stopped");
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn pump_platform_events() {
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    // SAFETY: standard win32 message pump on this thread's queue only.
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_platform_events() {}
