//! Audio session enumeration and per-session volume control.
//!
//! The platform backend is selected once at startup; on hosts without a
//! supported audio API the [`UnavailableAudioSource`] stand-in is used so
//! absence is a typed outcome instead of a scattered runtime check.

use std::sync::Arc;
use thiserror::Error;

#[cfg(windows)]
pub mod windows;

/// One audio-producing process as seen during a single poll cycle.
///
/// Snapshots are ephemeral: the poll loop rebuilds the whole list every
/// refresh and nothing else holds on to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Process id owning the session
    pub pid: u32,
    /// Executable name, e.g. "chrome.exe"
    pub process_name: String,
    /// Friendly name of the output device the session plays on
    pub device_name: String,
    /// Current peak meter level in [0, 1]
    pub peak: f32,
    /// Session mute flag
    pub muted: bool,
    /// Session master volume in [0, 1]
    pub volume: f32,
}

/// Audio backend failures
#[derive(Debug, Error)]
pub enum AudioError {
    /// No audio session API on this host
    #[error("audio session backend unavailable")]
    Unavailable,
    /// Platform API call failed
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Read and mutate the live audio session mixer.
///
/// Implementations must skip missing or inaccessible sessions rather than
/// failing a whole call, and treat mutations on unknown pids as no-ops.
#[cfg_attr(test, mockall::automock)]
pub trait AudioSource: Send + Sync {
    /// Enumerate all current sessions across output devices
    fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, AudioError>;

    /// Change a session's volume by `delta`, clamped to [0, 1].
    ///
    /// Re-reads the current volume before applying the delta so concurrent
    /// external changes are not overwritten from a stale base.
    fn adjust_volume(&self, pid: u32, delta: f32) -> Result<(), AudioError>;

    /// Invert a session's mute flag
    fn toggle_mute(&self, pid: u32) -> Result<(), AudioError>;
}

/// Clamp a computed volume into the valid [0, 1] range
pub fn clamp_volume(volume: f32) -> f32 {
    volume.clamp(0.0, 1.0)
}

/// No-op provider selected when no platform backend exists
pub struct UnavailableAudioSource;

impl AudioSource for UnavailableAudioSource {
    fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, AudioError> {
        Ok(Vec::new())
    }

    fn adjust_volume(&self, _pid: u32, _delta: f32) -> Result<(), AudioError> {
        Err(AudioError::Unavailable)
    }

    fn toggle_mute(&self, _pid: u32) -> Result<(), AudioError> {
        Err(AudioError::Unavailable)
    }
}

/// Select the platform audio backend
pub fn create_source() -> Arc<dyn AudioSource> {
    #[cfg(windows)]
    {
        Arc::new(windows::WindowsAudioSource::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnavailableAudioSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_upper_bound() {
        assert!((clamp_volume(0.98 + 0.05) - 1.0).abs() < f32::EPSILON);
        assert!((clamp_volume(1.5) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_lower_bound() {
        assert!(clamp_volume(0.02 - 0.05).abs() < f32::EPSILON);
        assert!(clamp_volume(-1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clamp_passthrough_in_range() {
        assert!((clamp_volume(0.5) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unavailable_source_lists_empty() {
        let source = UnavailableAudioSource;
        assert!(source.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_source_mutations_fail_typed() {
        let source = UnavailableAudioSource;
        assert!(matches!(
            source.adjust_volume(1, 0.05),
            Err(AudioError::Unavailable)
        ));
        assert!(matches!(
            source.toggle_mute(1),
            Err(AudioError::Unavailable)
        ));
    }
}
