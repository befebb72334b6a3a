//! Tray-resident per-application volume hotkey daemon.

use anyhow::Result;

use volume_hotkey::i18n::Translator;

/// `--lang es` or `--lang=es` on the command line
fn lang_arg() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--lang" {
            return args.next();
        }
        if let Some(value) = arg.strip_prefix("--lang=") {
            return Some(value.to_owned());
        }
    }
    None
}

#[cfg(windows)]
#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    let translator = Translator::new(lang_arg().as_deref());
    anyhow::bail!(translator.t("error.win.only"));
}

#[cfg(windows)]
mod app {
    use super::{lang_arg, Translator};
    use anyhow::{Context, Result};
    use global_hotkey::GlobalHotKeyEvent;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};
    use tray_icon::menu::MenuEvent;

    use volume_hotkey::audio::{self, SessionSnapshot};
    use volume_hotkey::config::Config;
    use volume_hotkey::input::capture;
    use volume_hotkey::input::hotkey::GlobalHotkeyService;
    use volume_hotkey::input::{HotkeyError, HotkeyService, UnavailableHotkeyService};
    use volume_hotkey::manager::bindings::{Action, BindingTable};
    use volume_hotkey::manager::volume::VolumeController;
    use volume_hotkey::manager::AppManager;
    use volume_hotkey::store::JsonHotkeyStore;
    use volume_hotkey::telemetry;
    use volume_hotkey::tray::{TrayCommand, TrayManager};

    struct CaptureOutcome {
        pid: u32,
        process_name: String,
        action: Action,
        result: Result<Option<String>, HotkeyError>,
    }

    #[allow(clippy::print_stdout, clippy::too_many_lines)]
    pub async fn run() -> Result<()> {
        let config = Config::load()?;
        telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
        info!("volume-hotkey starting");

        let translator = Translator::new(
            lang_arg()
                .or_else(|| config.ui.language.clone())
                .as_deref(),
        );

        // Capability providers degrade to typed stand-ins instead of aborting
        let audio_source = audio::create_source();
        let (hotkey_service, dispatcher): (
            Arc<dyn HotkeyService>,
            Option<Arc<GlobalHotkeyService>>,
        ) = match GlobalHotkeyService::new() {
            Ok(service) => {
                let service = Arc::new(service);
                (Arc::clone(&service) as Arc<dyn HotkeyService>, Some(service))
            }
            Err(e) => {
                warn!(error = %e, "{}", translator.t("error.hotkey.unavailable"));
                info!("{}", translator.t("hint.admin"));
                (Arc::new(UnavailableHotkeyService), None)
            }
        };

        let store_path = Config::expand_path(&config.hotkeys.path)?;
        let store = Box::new(JsonHotkeyStore::new(store_path));
        let table = BindingTable::new(Arc::clone(&hotkey_service), store);
        let volume = VolumeController::new(audio_source, config.volume.step);
        let manager = AppManager::new(
            volume,
            table,
            Duration::from_secs_f64(config.poll.interval_secs),
            config.poll.active_threshold,
        );

        let tray = TrayManager::new(translator.clone()).context("failed to start tray")?;

        // Snapshots cross from the poll task to the tray on this channel
        let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<Vec<SessionSnapshot>>();
        manager.on_sessions_update(move |sessions| {
            let _ = snapshot_tx.send(sessions.to_vec());
        });
        manager.start();

        let (capture_tx, mut capture_rx) = mpsc::unbounded_channel::<CaptureOutcome>();

        println!("Volume Hotkey is running. Press Ctrl+C to exit.");
        let hotkey_events = GlobalHotKeyEvent::receiver();
        let menu_events = MenuEvent::receiver();
        'main: loop {
            pump_messages();

            if let Some(dispatcher) = &dispatcher {
                while let Ok(event) = hotkey_events.try_recv() {
                    dispatcher.dispatch(&event);
                }
            }

            while let Ok(event) = menu_events.try_recv() {
                match tray.resolve(&event) {
                    Some(TrayCommand::Assign {
                        pid,
                        process_name,
                        action,
                    }) => {
                        info!(pid, %process_name, %action, "chord capture requested");
                        notify(
                            translator.t("dialog.assign.title"),
                            translator.t("dialog.assign.instr"),
                        );
                        let tx = capture_tx.clone();
                        tokio::spawn(async move {
                            let result = capture::capture_chord().await;
                            let _ = tx.send(CaptureOutcome {
                                pid,
                                process_name,
                                action,
                                result,
                            });
                        });
                    }
                    Some(TrayCommand::ToggleOnlyActive(flag)) => manager.set_only_active(flag),
                    Some(TrayCommand::ClearAll) => manager.clear_all_hotkeys(),
                    Some(TrayCommand::Quit) => break 'main,
                    None => {}
                }
            }

            while let Ok(sessions) = snapshot_rx.try_recv() {
                let saved: HashMap<_, _> = sessions
                    .iter()
                    .map(|session| {
                        (
                            session.process_name.to_lowercase(),
                            manager.saved_hotkeys(&session.process_name),
                        )
                    })
                    .collect();
                if let Err(e) = tray.update_sessions(&sessions, manager.only_active(), &saved) {
                    warn!(error = %e, "failed to refresh tray menu");
                }
            }

            while let Ok(outcome) = capture_rx.try_recv() {
                handle_capture(&manager, &translator, outcome);
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break 'main;
                }
                () = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }

        manager.stop();
        // Drop live OS registrations; persisted assignments survive restarts
        hotkey_service.clear_all();
        info!("volume-hotkey stopped");
        Ok(())
    }

    fn handle_capture(manager: &AppManager, translator: &Translator, outcome: CaptureOutcome) {
        match outcome.result {
            Ok(Some(combo)) => {
                info!(
                    pid = outcome.pid,
                    process = %outcome.process_name,
                    action = %outcome.action,
                    combo,
                    "chord captured"
                );
                if let Err(e) = manager.assign_hotkey(outcome.pid, outcome.action, &combo) {
                    let message = translator.t_args(
                        "error.hotkey.register",
                        &[("hotkey", &combo), ("error", &e.to_string())],
                    );
                    error!("{message}");
                    notify(translator.t("app.title"), message);
                }
            }
            Ok(None) => info!(pid = outcome.pid, "chord capture cancelled"),
            Err(e) => {
                error!(error = %e, "chord capture failed");
                notify(
                    translator.t("app.title"),
                    translator.t("error.hotkey.unavailable"),
                );
            }
        }
    }

    /// Modal message box on a throwaway thread so the event loop keeps running
    #[allow(unsafe_code)]
    fn notify(title: String, message: String) {
        use windows::core::PCWSTR;
        use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONWARNING, MB_OK};

        std::thread::spawn(move || {
            let title: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
            let message: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();
            // SAFETY: both buffers are NUL-terminated and outlive the call.
            unsafe {
                MessageBoxW(
                    None,
                    PCWSTR(message.as_ptr()),
                    PCWSTR(title.as_ptr()),
                    MB_OK | MB_ICONWARNING,
                );
            }
        });
    }

    /// The tray icon lives on this thread, so its win32 queue is drained here
    #[allow(unsafe_code)]
    fn pump_messages() {
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
}
