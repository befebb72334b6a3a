//! One-shot chord capture for hotkey assignment.
//!
//! Installs a low-level keyboard hook, waits for the first complete chord
//! (a non-modifier key plus whatever modifiers are held), and returns it in
//! the same syntax [`super::combo::parse`] accepts. Escape cancels. Keys are
//! observed, never suppressed, so the foreground application still sees them.

#![allow(unsafe_code)]

use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use tracing::debug;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VIRTUAL_KEY, VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE,
    VK_HOME, VK_INSERT, VK_LCONTROL, VK_LEFT, VK_LMENU, VK_LSHIFT, VK_LWIN, VK_MENU, VK_NEXT,
    VK_OEM_1, VK_OEM_2, VK_OEM_COMMA, VK_OEM_MINUS, VK_OEM_PERIOD, VK_OEM_PLUS, VK_PRIOR,
    VK_RCONTROL, VK_RETURN, VK_RIGHT, VK_RMENU, VK_RSHIFT, VK_RWIN, VK_SHIFT, VK_SPACE, VK_TAB,
    VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN,
    WM_QUIT, WM_SYSKEYDOWN,
};

use super::HotkeyError;

// The hook procedure is a plain C callback, so the capture-in-progress
// channel has to live in a process-wide slot
static PENDING: OnceLock<Mutex<Option<mpsc::Sender<Option<String>>>>> = OnceLock::new();

fn pending() -> &'static Mutex<Option<mpsc::Sender<Option<String>>>> {
    PENDING.get_or_init(|| Mutex::new(None))
}

/// Capture the next chord pressed anywhere on the system.
///
/// Resolves to `Ok(None)` when the user cancels with Escape.
///
/// # Errors
/// Fails when the hook cannot be installed or a capture is already running.
pub async fn capture_chord() -> Result<Option<String>, HotkeyError> {
    tokio::task::spawn_blocking(run_capture)
        .await
        .map_err(|e| HotkeyError::Backend(format!("capture task failed: {e}")))?
}

fn run_capture() -> Result<Option<String>, HotkeyError> {
    let (result_tx, result_rx) = mpsc::channel();
    {
        let mut slot = pending()
            .lock()
            .map_err(|_| HotkeyError::Backend("capture slot lock poisoned".to_owned()))?;
        if slot.is_some() {
            return Err(HotkeyError::Backend(
                "chord capture already in progress".to_owned(),
            ));
        }
        *slot = Some(result_tx);
    }

    debug!("chord capture started");
    // SAFETY: hook is installed and removed on this thread; the message loop
    // ends when the hook procedure posts WM_QUIT.
    let outcome = unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), None, 0) {
            Ok(hook) => {
                let mut msg = MSG::default();
                while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                let _ = UnhookWindowsHookEx(hook);
                Ok(result_rx.try_recv().unwrap_or(None))
            }
            Err(e) => Err(HotkeyError::Backend(format!(
                "failed to install keyboard hook: {e}"
            ))),
        }
    };

    if let Ok(mut slot) = pending().lock() {
        *slot = None;
    }
    debug!(?outcome, "chord capture finished");
    outcome
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let message = wparam.0 as u32;
    if code >= 0 && (message == WM_KEYDOWN || message == WM_SYSKEYDOWN) {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let vk = info.vkCode;
        if vk == u32::from(VK_ESCAPE.0) {
            finish(None);
        } else if !is_modifier(vk) {
            if let Some(token) = key_token(vk) {
                finish(Some(build_combo(token)));
            }
        }
    }
    CallNextHookEx(None, code, wparam, lparam)
}

fn finish(result: Option<String>) {
    if let Ok(mut slot) = pending().lock() {
        if let Some(sender) = slot.take() {
            let _ = sender.send(result);
        }
    }
    // SAFETY: posting to our own thread's message queue.
    unsafe {
        let _ = PostThreadMessageW(GetCurrentThreadId(), WM_QUIT, WPARAM(0), LPARAM(0));
    }
}

fn build_combo(key: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if is_pressed(VK_CONTROL) {
        parts.push("ctrl");
    }
    if is_pressed(VK_MENU) {
        parts.push("alt");
    }
    if is_pressed(VK_SHIFT) {
        parts.push("shift");
    }
    if is_pressed(VK_LWIN) || is_pressed(VK_RWIN) {
        parts.push("win");
    }
    parts.push(key);
    parts.join("+")
}

fn is_pressed(vk: VIRTUAL_KEY) -> bool {
    // SAFETY: reading async key state has no preconditions.
    unsafe { GetAsyncKeyState(i32::from(vk.0)) < 0 }
}

fn is_modifier(vk: u32) -> bool {
    [
        VK_SHIFT, VK_LSHIFT, VK_RSHIFT, VK_CONTROL, VK_LCONTROL, VK_RCONTROL, VK_MENU, VK_LMENU,
        VK_RMENU, VK_LWIN, VK_RWIN,
    ]
    .iter()
    .any(|modifier| u32::from(modifier.0) == vk)
}

const LETTERS: [&str; 26] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
];
const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
const FUNCTION_KEYS: [&str; 12] = [
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
];

/// Token for a virtual key, matching the chord parser's vocabulary
fn key_token(vk: u32) -> Option<&'static str> {
    match vk {
        0x41..=0x5A => Some(LETTERS[(vk - 0x41) as usize]),
        0x30..=0x39 => Some(DIGITS[(vk - 0x30) as usize]),
        0x70..=0x7B => Some(FUNCTION_KEYS[(vk - 0x70) as usize]),
        _ => {
            let vk = VIRTUAL_KEY(u16::try_from(vk).ok()?);
            match vk {
                VK_UP => Some("up"),
                VK_DOWN => Some("down"),
                VK_LEFT => Some("left"),
                VK_RIGHT => Some("right"),
                VK_SPACE => Some("space"),
                VK_TAB => Some("tab"),
                VK_RETURN => Some("enter"),
                VK_BACK => Some("backspace"),
                VK_DELETE => Some("delete"),
                VK_INSERT => Some("insert"),
                VK_HOME => Some("home"),
                VK_END => Some("end"),
                VK_PRIOR => Some("pageup"),
                VK_NEXT => Some("pagedown"),
                VK_OEM_MINUS => Some("minus"),
                VK_OEM_PLUS => Some("equals"),
                VK_OEM_COMMA => Some("comma"),
                VK_OEM_PERIOD => Some("period"),
                VK_OEM_2 => Some("slash"),
                VK_OEM_1 => Some("semicolon"),
                _ => None,
            }
        }
    }
}
