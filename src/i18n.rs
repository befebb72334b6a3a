//! Localized user-facing strings with `{placeholder}` interpolation.
//!
//! Lookup falls back to English, then to the key itself, so a missing
//! translation never surfaces as an error to the caller.

/// Languages with a full catalog
pub const SUPPORTED: &[&str] = &["en", "es"];

const DEFAULT_LANG: &str = "en";

/// (key, english, spanish)
const CATALOG: &[(&str, &str, &str)] = &[
    ("app.title", "Volume Hotkey", "Volume Hotkey"),
    (
        "filter.active",
        "Only apps with active audio",
        "Solo apps con audio activo",
    ),
    ("col.peak", "Peak", "Peak"),
    (
        "label.selection.none",
        "Select a program from the list",
        "Selecciona un programa de la lista",
    ),
    ("hotkey.up", "Volume Up", "Subir volumen"),
    ("hotkey.down", "Volume Down", "Bajar volumen"),
    ("hotkey.mute", "Mute/Unmute", "Mute/Unmute"),
    ("hotkey.clear", "Clear hotkeys", "Limpiar hotkeys"),
    ("hotkey.none", "Not assigned", "No asignado"),
    (
        "hint.admin",
        "Tip: Run as Administrator if hotkeys fail.",
        "Sugerencia: Ejecuta como Administrador si los hotkeys no funcionan.",
    ),
    ("dialog.assign.title", "Capture hotkey", "Capturar hotkey"),
    (
        "dialog.assign.instr",
        "Press the key combination... (ESC to cancel)",
        "Presiona la combinación de teclas... (ESC para cancelar)",
    ),
    (
        "error.hotkey.unavailable",
        "Global hotkeys are unavailable on this system.",
        "Los hotkeys globales no están disponibles en este sistema.",
    ),
    (
        "error.audio.unavailable",
        "Audio session control is unavailable on this system.",
        "El control de sesiones de audio no está disponible en este sistema.",
    ),
    (
        "error.win.only",
        "This application works only on Windows.",
        "Esta aplicación funciona solo en Windows.",
    ),
    (
        "error.hotkey.register",
        "Could not register hotkey {hotkey}: {error}",
        "No se pudo registrar hotkey {hotkey}: {error}",
    ),
    ("menu.quit", "Quit", "Salir"),
    (
        "tray.sessions",
        "{count} audio sessions",
        "{count} sesiones de audio",
    ),
];

/// Catalog lookup with language fallback
#[derive(Debug, Clone)]
pub struct Translator {
    lang: &'static str,
}

impl Translator {
    /// Build a translator for `language`, or from a system-locale heuristic
    /// when `None`. Unsupported codes fall back to English.
    pub fn new(language: Option<&str>) -> Self {
        let requested = match language {
            Some(lang) => lang.to_lowercase(),
            None => system_language(),
        };
        let lang = SUPPORTED
            .iter()
            .find(|supported| **supported == requested)
            .copied()
            .unwrap_or(DEFAULT_LANG);
        Self { lang }
    }

    /// Active language code
    pub fn language(&self) -> &str {
        self.lang
    }

    /// Translate `key`; unknown keys come back verbatim
    pub fn t(&self, key: &str) -> String {
        self.t_args(key, &[])
    }

    /// Translate `key` and substitute `{name}` placeholders from `args`
    pub fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        let text = CATALOG
            .iter()
            .find(|entry| entry.0 == key)
            .map_or(key, |entry| match self.lang {
                "es" => entry.2,
                _ => entry.1,
            });
        interpolate(text, args)
    }
}

fn interpolate(text: &str, args: &[(&str, &str)]) -> String {
    let mut out = text.to_owned();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Best-effort system language detection ("en"/"es")
fn system_language() -> String {
    let locale = raw_system_locale().unwrap_or_default();
    if locale.to_lowercase().starts_with("es") {
        "es".to_owned()
    } else {
        "en".to_owned()
    }
}

#[cfg(windows)]
fn raw_system_locale() -> Option<String> {
    use windows::Win32::Globalization::{GetUserDefaultLocaleName, LOCALE_NAME_MAX_LENGTH};

    let mut buffer = [0u16; LOCALE_NAME_MAX_LENGTH as usize];
    // SAFETY: buffer is a valid mutable slice for the duration of the call.
    let written = unsafe { GetUserDefaultLocaleName(&mut buffer) };
    if written <= 0 {
        return None;
    }
    Some(String::from_utf16_lossy(
        &buffer[..written.saturating_sub(1) as usize],
    ))
}

#[cfg(not(windows))]
fn raw_system_locale() -> Option<String> {
    std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LANG"))
        .ok()
}
