//! Volume Hotkey - per-application volume control with global hotkeys
//!
//! This library exports core modules for testing and potential future reuse.

/// Audio session enumeration and volume control
pub mod audio;
/// Configuration management
pub mod config;
/// Localized user-facing strings
pub mod i18n;
/// Input handling (global hotkeys, chord capture)
pub mod input;
/// Session polling and hotkey bookkeeping
pub mod manager;
/// Persisted hotkey assignments
pub mod store;
/// Telemetry and crash logging
pub mod telemetry;
/// Tray menu presentation
#[cfg(windows)]
pub mod tray;
