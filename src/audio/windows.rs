//! WASAPI-backed [`AudioSource`].
//!
//! Sessions are enumerated fresh on every call; no COM interface outlives a
//! single operation. Inaccessible devices or sessions are skipped so one bad
//! session never fails the whole enumeration.

#![allow(unsafe_code)]

use std::cell::Cell;
use tracing::warn;
use windows::core::{Interface, PWSTR};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Foundation::{CloseHandle, MAX_PATH};
use windows::Win32::Media::Audio::Endpoints::IAudioMeterInformation;
use windows::Win32::Media::Audio::{
    eRender, IAudioSessionControl2, IAudioSessionManager2, IMMDevice, IMMDeviceEnumerator,
    ISimpleAudioVolume, MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_APARTMENTTHREADED, STGM_READ,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::System::Variant::VT_LPWSTR;

use super::{clamp_volume, AudioError, AudioSource, SessionSnapshot};

thread_local! {
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

// COM init is per-thread; both the poll task and hotkey callbacks call in here.
fn ensure_com() {
    COM_READY.with(|ready| {
        if !ready.get() {
            // SAFETY: plain COM runtime initialization, no aliased pointers.
            unsafe {
                let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
            }
            ready.set(true);
        }
    });
}

/// Session control over the default WASAPI render topology
pub struct WindowsAudioSource;

impl WindowsAudioSource {
    /// The source holds no state; all COM objects are per-call
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for WindowsAudioSource {
    fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, AudioError> {
        ensure_com();
        let mut sessions = Vec::new();
        // SAFETY: COM interface calls; every pointer comes straight from the API.
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                match CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) {
                    Ok(enumerator) => enumerator,
                    Err(e) => {
                        // Degrade to an empty list; next poll cycle retries
                        warn!(error = %e, "audio device enumerator unavailable");
                        return Ok(sessions);
                    }
                };
            let devices = match enumerator.EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE) {
                Ok(devices) => devices,
                Err(e) => {
                    warn!(error = %e, "failed to enumerate render endpoints");
                    return Ok(sessions);
                }
            };
            let count = devices.GetCount().unwrap_or(0);
            for index in 0..count {
                let Ok(device) = devices.Item(index) else {
                    continue;
                };
                let device_name = device_friendly_name(&device);
                let Ok(manager) = device.Activate::<IAudioSessionManager2>(CLSCTX_ALL, None)
                else {
                    continue;
                };
                collect_device_sessions(&manager, &device_name, &mut sessions);
            }
        }
        Ok(sessions)
    }

    fn adjust_volume(&self, pid: u32, delta: f32) -> Result<(), AudioError> {
        ensure_com();
        // SAFETY: see list_sessions
        unsafe {
            if let Some(volume) = find_session_volume(pid) {
                let current = match volume.GetMasterVolume() {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(pid, error = %e, "failed to read session volume");
                        return Ok(());
                    }
                };
                let target = clamp_volume(current + delta);
                if let Err(e) = volume.SetMasterVolume(target, std::ptr::null()) {
                    warn!(pid, target, error = %e, "failed to set session volume");
                }
            }
        }
        Ok(())
    }

    fn toggle_mute(&self, pid: u32) -> Result<(), AudioError> {
        ensure_com();
        // SAFETY: see list_sessions
        unsafe {
            if let Some(volume) = find_session_volume(pid) {
                let muted = volume.GetMute().map(|m| m.as_bool()).unwrap_or(false);
                if let Err(e) = volume.SetMute(!muted, std::ptr::null()) {
                    warn!(pid, error = %e, "failed to toggle session mute");
                }
            }
        }
        Ok(())
    }
}

unsafe fn collect_device_sessions(
    manager: &IAudioSessionManager2,
    device_name: &str,
    out: &mut Vec<SessionSnapshot>,
) {
    let Ok(enumerator) = manager.GetSessionEnumerator() else {
        return;
    };
    let count = enumerator.GetCount().unwrap_or(0);
    for index in 0..count {
        let Ok(control) = enumerator.GetSession(index) else {
            continue;
        };
        let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
            continue;
        };
        let pid = control2.GetProcessId().unwrap_or(0);
        if pid == 0 {
            continue;
        }
        // Sessions without a resolvable executable name are not addressable
        // by saved config, so they are skipped entirely
        let Some(process_name) = process_image_name(pid) else {
            continue;
        };
        let peak = control
            .cast::<IAudioMeterInformation>()
            .and_then(|meter| meter.GetPeakValue())
            .unwrap_or(0.0);
        let (volume, muted) = match control.cast::<ISimpleAudioVolume>() {
            Ok(simple) => (
                simple.GetMasterVolume().unwrap_or(0.0),
                simple.GetMute().map(|m| m.as_bool()).unwrap_or(false),
            ),
            Err(_) => (0.0, false),
        };
        out.push(SessionSnapshot {
            pid,
            process_name,
            device_name: device_name.to_owned(),
            peak,
            muted,
            volume,
        });
    }
}

/// Locate the simple-volume interface for the session owned by `pid`
unsafe fn find_session_volume(pid: u32) -> Option<ISimpleAudioVolume> {
    let enumerator: IMMDeviceEnumerator =
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).ok()?;
    let devices = enumerator.EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE).ok()?;
    let device_count = devices.GetCount().ok()?;
    for device_index in 0..device_count {
        let Ok(device) = devices.Item(device_index) else {
            continue;
        };
        let Ok(manager) = device.Activate::<IAudioSessionManager2>(CLSCTX_ALL, None) else {
            continue;
        };
        let Ok(session_enumerator) = manager.GetSessionEnumerator() else {
            continue;
        };
        let count = session_enumerator.GetCount().unwrap_or(0);
        for index in 0..count {
            let Ok(control) = session_enumerator.GetSession(index) else {
                continue;
            };
            let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
                continue;
            };
            if control2.GetProcessId().unwrap_or(0) != pid {
                continue;
            }
            if let Ok(simple) = control.cast::<ISimpleAudioVolume>() {
                return Some(simple);
            }
        }
    }
    None
}

unsafe fn process_image_name(pid: u32) -> Option<String> {
    let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
    let mut buffer = [0u16; MAX_PATH as usize];
    let mut size = buffer.len() as u32;
    let result =
        QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buffer.as_mut_ptr()), &mut size);
    let _ = CloseHandle(handle);
    result.ok()?;

    let full_path = String::from_utf16_lossy(&buffer[..size as usize]);
    full_path
        .rsplit(['\\', '/'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

unsafe fn device_friendly_name(device: &IMMDevice) -> String {
    let fallback = || "(device)".to_owned();
    let Ok(store) = device.OpenPropertyStore(STGM_READ) else {
        return fallback();
    };
    let Ok(value) = store.GetValue(&PKEY_Device_FriendlyName) else {
        return fallback();
    };
    let inner = &value.Anonymous.Anonymous;
    if inner.vt != VT_LPWSTR {
        return fallback();
    }
    inner.Anonymous.pwszVal.to_string().unwrap_or_else(|_| fallback())
}
