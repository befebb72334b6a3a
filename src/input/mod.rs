//! Input handling: global hotkey registration and chord capture.
//!
//! [`HotkeyService`] is the seam between the binding bookkeeping and the OS
//! hotkey hook. The real implementation wraps the `global-hotkey` crate; when
//! that backend cannot start, [`UnavailableHotkeyService`] is selected instead
//! and registration fails with a typed error at the point of use.

use thiserror::Error;

pub mod combo;
pub mod hotkey;

#[cfg(windows)]
pub mod capture;

/// Handler invoked when a registered chord fires
pub type HotkeyCallback = Box<dyn Fn() + Send + Sync>;

/// Opaque handle to one live hotkey registration.
///
/// Ids are unique per registration within a process run; re-registering the
/// same chord yields a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Build a handler id from a raw counter value (used by service
    /// implementations and test fakes)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value behind this id
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Hotkey backend failures
#[derive(Debug, Error)]
pub enum HotkeyError {
    /// No global hotkey backend on this host
    #[error("global hotkey backend unavailable")]
    Unavailable,
    /// Chord string did not parse
    #[error("invalid hotkey combo {combo:?}: {reason}")]
    InvalidCombo {
        /// Offending chord string
        combo: String,
        /// Parser diagnostic
        reason: String,
    },
    /// The OS rejected the registration (typically: already taken)
    #[error("failed to register hotkey {combo:?}: {reason}")]
    Registration {
        /// Chord that failed to register
        combo: String,
        /// Backend diagnostic
        reason: String,
    },
    /// Backend infrastructure failure
    #[error("hotkey backend error: {0}")]
    Backend(String),
}

/// Register and remove system-wide key-chord listeners.
///
/// Chord strings use lowercase `+`-joined tokens, e.g. `ctrl+alt+up`.
#[cfg_attr(test, mockall::automock)]
pub trait HotkeyService: Send + Sync {
    /// Register a chord; the callback fires on every press until removed
    fn register(&self, combo: &str, callback: HotkeyCallback) -> Result<HandlerId, HotkeyError>;

    /// Deregister one handler; unknown ids are ignored
    fn remove(&self, id: HandlerId);

    /// Deregister every live handler
    fn clear_all(&self);
}

/// No-op provider selected when no hotkey backend exists
pub struct UnavailableHotkeyService;

impl HotkeyService for UnavailableHotkeyService {
    fn register(&self, _combo: &str, _callback: HotkeyCallback) -> Result<HandlerId, HotkeyError> {
        Err(HotkeyError::Unavailable)
    }

    fn remove(&self, _id: HandlerId) {}

    fn clear_all(&self) {}
}
