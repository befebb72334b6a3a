//! Stateless translation of hotkey actions into audio-source mutations.

use std::sync::Arc;

use crate::audio::{AudioError, AudioSource, SessionSnapshot};

/// Applies volume actions to sessions by pid.
///
/// Holds no per-session state: the audio source re-reads current volume on
/// every adjustment, so concurrent external changes never drift.
#[derive(Clone)]
pub struct VolumeController {
    audio: Arc<dyn AudioSource>,
    step: f32,
}

impl VolumeController {
    /// Build a controller applying `step` per volume press
    pub fn new(audio: Arc<dyn AudioSource>, step: f32) -> Self {
        Self { audio, step }
    }

    /// Enumerate current sessions
    pub fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, AudioError> {
        self.audio.list_sessions()
    }

    /// Raise a session's volume by one step
    pub fn volume_up(&self, pid: u32) -> Result<(), AudioError> {
        self.audio.adjust_volume(pid, self.step)
    }

    /// Lower a session's volume by one step
    pub fn volume_down(&self, pid: u32) -> Result<(), AudioError> {
        self.audio.adjust_volume(pid, -self.step)
    }

    /// Invert a session's mute flag
    pub fn toggle_mute(&self, pid: u32) -> Result<(), AudioError> {
        self.audio.toggle_mute(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use mockall::predicate::eq;

    #[test]
    fn test_volume_up_applies_positive_step() {
        let mut audio = MockAudioSource::new();
        audio
            .expect_adjust_volume()
            .with(eq(42), eq(0.05))
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = VolumeController::new(Arc::new(audio), 0.05);
        controller.volume_up(42).unwrap();
    }

    #[test]
    fn test_volume_down_applies_negative_step() {
        let mut audio = MockAudioSource::new();
        audio
            .expect_adjust_volume()
            .with(eq(42), eq(-0.05))
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = VolumeController::new(Arc::new(audio), 0.05);
        controller.volume_down(42).unwrap();
    }

    #[test]
    fn test_toggle_mute_passes_pid_through() {
        let mut audio = MockAudioSource::new();
        audio
            .expect_toggle_mute()
            .with(eq(7))
            .times(1)
            .returning(|_| Ok(()));

        let controller = VolumeController::new(Arc::new(audio), 0.05);
        controller.toggle_mute(7).unwrap();
    }
}
