//! Chord string syntax.
//!
//! A chord is lowercase tokens joined by `+`: zero or more modifiers
//! (`ctrl`, `alt`, `shift`, `win`) followed by exactly one key, e.g.
//! `ctrl+alt+up` or `f9`. Parsing is case-insensitive and whitespace around
//! tokens is ignored.

use global_hotkey::hotkey::{Code, HotKey, Modifiers};

use super::HotkeyError;

/// Parse a chord string into a registrable hotkey
pub fn parse(combo: &str) -> Result<HotKey, HotkeyError> {
    let invalid = |reason: &str| HotkeyError::InvalidCombo {
        combo: combo.to_owned(),
        reason: reason.to_owned(),
    };

    let mut modifiers = Modifiers::empty();
    let mut key: Option<Code> = None;

    for token in combo.split('+') {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return Err(invalid("empty token"));
        }
        if let Some(modifier) = parse_modifier(&token) {
            modifiers |= modifier;
        } else if let Some(code) = parse_key(&token) {
            if key.is_some() {
                return Err(invalid("more than one non-modifier key"));
            }
            key = Some(code);
        } else {
            return Err(invalid(&format!("unknown token {token:?}")));
        }
    }

    let code = key.ok_or_else(|| invalid("no non-modifier key"))?;
    let modifiers = if modifiers.is_empty() {
        None
    } else {
        Some(modifiers)
    };
    Ok(HotKey::new(modifiers, code))
}

fn parse_modifier(token: &str) -> Option<Modifiers> {
    match token {
        "ctrl" | "control" => Some(Modifiers::CONTROL),
        "alt" | "option" => Some(Modifiers::ALT),
        "shift" => Some(Modifiers::SHIFT),
        "win" | "super" | "cmd" => Some(Modifiers::SUPER),
        _ => None,
    }
}

#[allow(clippy::too_many_lines)] // flat token table
fn parse_key(token: &str) -> Option<Code> {
    let code = match token {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        "up" => Code::ArrowUp,
        "down" => Code::ArrowDown,
        "left" => Code::ArrowLeft,
        "right" => Code::ArrowRight,
        "space" => Code::Space,
        "tab" => Code::Tab,
        "enter" | "return" => Code::Enter,
        "esc" | "escape" => Code::Escape,
        "backspace" => Code::Backspace,
        "delete" => Code::Delete,
        "insert" => Code::Insert,
        "home" => Code::Home,
        "end" => Code::End,
        "pageup" => Code::PageUp,
        "pagedown" => Code::PageDown,
        "minus" => Code::Minus,
        "equals" => Code::Equal,
        "comma" => Code::Comma,
        "period" => Code::Period,
        "slash" => Code::Slash,
        "semicolon" => Code::Semicolon,
        _ => return None,
    };
    Some(code)
}
