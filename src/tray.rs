//! System tray presentation: session list, per-session hotkey assignment,
//! the active-audio filter toggle and clear/quit actions.
//!
//! The menu is rebuilt from each session snapshot. Menu items get generated
//! ids, so commands are resolved through an id table captured at build time
//! rather than by parsing labels.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::audio::SessionSnapshot;
use crate::i18n::Translator;
use crate::manager::bindings::Action;

/// A user gesture on the tray menu
#[derive(Debug, Clone)]
pub enum TrayCommand {
    /// Start chord capture for one session action
    Assign {
        /// Target session pid
        pid: u32,
        /// Target process name (for persistence and messages)
        process_name: String,
        /// Action the captured chord will trigger
        action: Action,
    },
    /// Flip the active-sessions-only filter
    ToggleOnlyActive(bool),
    /// Drop all bindings, live and persisted
    ClearAll,
    /// Exit the application
    Quit,
}

/// Tray icon plus the id table for the currently installed menu
pub struct TrayManager {
    tray: TrayIcon,
    translator: Translator,
    commands: Mutex<HashMap<MenuId, TrayCommand>>,
}

impl TrayManager {
    /// Build the tray with an empty session list
    pub fn new(translator: Translator) -> Result<Self> {
        let mut commands = HashMap::new();
        let menu = build_menu(&translator, &[], false, &HashMap::new(), &mut commands)?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(translator.t("app.title"))
            .with_icon(speaker_icon()?)
            .build()
            .context("failed to build tray icon")?;

        Ok(Self {
            tray,
            translator,
            commands: Mutex::new(commands),
        })
    }

    /// Rebuild the menu from a fresh session snapshot.
    ///
    /// `saved` maps each process name to its persisted action -> combo map,
    /// used to show the current assignment next to each action.
    pub fn update_sessions(
        &self,
        sessions: &[SessionSnapshot],
        only_active: bool,
        saved: &HashMap<String, std::collections::BTreeMap<String, String>>,
    ) -> Result<()> {
        let mut commands = HashMap::new();
        let menu = build_menu(&self.translator, sessions, only_active, saved, &mut commands)?;
        self.tray.set_menu(Some(Box::new(menu)));
        self.tray.set_tooltip(Some(self.translator.t_args(
            "tray.sessions",
            &[("count", &sessions.len().to_string())],
        )))?;
        if let Ok(mut table) = self.commands.lock() {
            *table = commands;
        }
        Ok(())
    }

    /// Resolve one received menu event to a command, if the id is known
    pub fn resolve(&self, event: &MenuEvent) -> Option<TrayCommand> {
        self.commands
            .lock()
            .ok()
            .and_then(|table| table.get(event.id()).cloned())
    }
}

fn build_menu(
    translator: &Translator,
    sessions: &[SessionSnapshot],
    only_active: bool,
    saved: &HashMap<String, std::collections::BTreeMap<String, String>>,
    commands: &mut HashMap<MenuId, TrayCommand>,
) -> Result<Menu> {
    let menu = Menu::new();

    let title = MenuItem::new(translator.t("app.title"), false, None);
    menu.append(&title).context("failed to append title")?;
    menu.append(&PredefinedMenuItem::separator())
        .context("failed to append separator")?;

    let filter = CheckMenuItem::new(translator.t("filter.active"), true, only_active, None);
    commands.insert(filter.id().clone(), TrayCommand::ToggleOnlyActive(!only_active));
    menu.append(&filter).context("failed to append filter")?;
    menu.append(&PredefinedMenuItem::separator())
        .context("failed to append separator")?;

    if sessions.is_empty() {
        let empty = MenuItem::new(translator.t("label.selection.none"), false, None);
        menu.append(&empty).context("failed to append placeholder")?;
    }
    for session in sessions {
        let submenu = Submenu::new(session_label(translator, session), true);
        let session_saved = saved.get(&session.process_name.to_lowercase());
        for action in Action::ALL {
            let action_label = translator.t(match action {
                Action::VolumeUp => "hotkey.up",
                Action::VolumeDown => "hotkey.down",
                Action::ToggleMute => "hotkey.mute",
            });
            let combo_label = session_saved
                .and_then(|actions| actions.get(action.as_str()).cloned())
                .unwrap_or_else(|| translator.t("hotkey.none"));
            let item = MenuItem::new(format!("{action_label}: {combo_label}"), true, None);
            commands.insert(
                item.id().clone(),
                TrayCommand::Assign {
                    pid: session.pid,
                    process_name: session.process_name.clone(),
                    action,
                },
            );
            submenu
                .append(&item)
                .context("failed to append assign item")?;
        }
        menu.append(&submenu).context("failed to append session")?;
    }

    menu.append(&PredefinedMenuItem::separator())
        .context("failed to append separator")?;

    let clear = MenuItem::new(translator.t("hotkey.clear"), true, None);
    commands.insert(clear.id().clone(), TrayCommand::ClearAll);
    menu.append(&clear).context("failed to append clear item")?;

    // Quit goes through the command table; PredefinedMenuItem::quit() would
    // bypass the event loop and skip hotkey deregistration
    let quit = MenuItem::new(translator.t("menu.quit"), true, None);
    commands.insert(quit.id().clone(), TrayCommand::Quit);
    menu.append(&quit).context("failed to append quit item")?;

    Ok(menu)
}

/// One line summarizing a session: name, pid, volume %, mute state, peak
/// level and output device
fn session_label(translator: &Translator, session: &SessionSnapshot) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let volume_pct = (session.volume * 100.0).round() as u32;
    let mute_marker = if session.muted { " [muted]" } else { "" };
    format!(
        "{} (PID {}) - {}%{} - {} {:.2} - {}",
        session.process_name,
        session.pid,
        volume_pct,
        mute_marker,
        translator.t("col.peak"),
        session.peak,
        session.device_name
    )
}

/// 32x32 speaker glyph rendered in code so no asset file ships alongside
/// the executable
fn speaker_icon() -> Result<Icon> {
    const SIZE: usize = 32;
    let mut rgba = vec![0u8; SIZE * SIZE * 4];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let on = speaker_pixel(x, y);
            if on {
                let i = (y * SIZE + x) * 4;
                rgba[i] = 0xE6;
                rgba[i + 1] = 0xE6;
                rgba[i + 2] = 0xE6;
                rgba[i + 3] = 0xFF;
            }
        }
    }
    Icon::from_rgba(rgba, SIZE as u32, SIZE as u32).context("failed to build icon from RGBA data")
}

fn speaker_pixel(x: usize, y: usize) -> bool {
    // Box at the left, cone opening to the right, one sound arc
    let body = (6..=12).contains(&x) && (12..=20).contains(&y);
    let cone = (12..=19).contains(&x) && y + x >= 24 && y <= x + 8;
    let arc = (22..=23).contains(&x) && (10..=22).contains(&y) && !(13..=19).contains(&y);
    body || cone || arc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_icon_builds() {
        assert!(speaker_icon().is_ok());
    }

    #[test]
    fn test_speaker_glyph_is_nonempty_and_bounded() {
        let lit = (0..32)
            .flat_map(|y| (0..32).map(move |x| (x, y)))
            .filter(|&(x, y)| speaker_pixel(x, y))
            .count();
        assert!(lit > 0);
        assert!(lit < 32 * 32);
    }

    #[test]
    fn test_session_label_shows_every_session_field() {
        let translator = Translator::new(Some("en"));
        let session = SessionSnapshot {
            pid: 1234,
            process_name: "game.exe".to_owned(),
            device_name: "Speakers".to_owned(),
            peak: 0.43,
            muted: true,
            volume: 0.5,
        };

        let label = session_label(&translator, &session);
        assert!(label.contains("game.exe (PID 1234)"));
        assert!(label.contains("50% [muted]"));
        assert!(label.contains("Peak 0.43"));
        assert!(label.contains("Speakers"));
    }

    #[test]
    fn test_session_label_without_mute_marker() {
        let translator = Translator::new(Some("en"));
        let session = SessionSnapshot {
            pid: 7,
            process_name: "music.exe".to_owned(),
            device_name: "Headphones".to_owned(),
            peak: 0.0,
            muted: false,
            volume: 1.0,
        };

        let label = session_label(&translator, &session);
        assert!(label.contains("100% -"));
        assert!(!label.contains("[muted]"));
    }

    #[test]
    fn test_tray_command_clone() {
        let cmd = TrayCommand::Assign {
            pid: 1234,
            process_name: "game.exe".to_owned(),
            action: Action::VolumeUp,
        };
        let cloned = cmd.clone();
        if let TrayCommand::Assign {
            pid, process_name, ..
        } = cloned
        {
            assert_eq!(pid, 1234);
            assert_eq!(process_name, "game.exe");
        }
    }
}
