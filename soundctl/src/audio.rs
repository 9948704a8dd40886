/// Master volume, mute state and endpoint enumeration.
///
/// Uses Core Audio (`IMMDeviceEnumerator` + `IAudioEndpointVolume`) on the
/// default console render endpoint. Every call initialises COM for the
/// calling thread and releases it afterwards, so the controller can be used
/// from any thread.
///
/// On non-Windows platforms every operation returns [`AudioError::Unsupported`].
use std::fmt;

use log::warn;

use crate::error::AudioError;

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    /// Playback (render) endpoints.
    #[default]
    Output,
    /// Recording (capture) endpoints.
    Input,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Output => "output",
            DeviceKind::Input => "input",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub name: String,
    pub id: String,
}

pub trait AudioEndpoints: Send + Sync {
    /// Master volume of the default output, `0.0..=1.0`.
    fn volume(&self) -> Result<f32, AudioError>;

    fn set_volume(&self, level: f32) -> Result<(), AudioError>;

    fn is_muted(&self) -> Result<bool, AudioError>;

    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;

    /// Active endpoints of the given direction.
    fn list_devices(&self, kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError>;

    /// Default-device switching has no public API on Windows; this always fails.
    fn set_default_device(&self, id: &str, kind: DeviceKind) -> Result<(), AudioError> {
        warn!("Setting the default {kind} device to '{id}' is not supported.");
        Err(AudioError::DefaultDeviceUnsupported)
    }
}

/// Rejects levels outside `0.0..=1.0` (including NaN).
pub fn check_level(level: f32) -> Result<(), AudioError> {
    if (0.0..=1.0).contains(&level) {
        Ok(())
    } else {
        Err(AudioError::InvalidLevel(level))
    }
}

/// Controller backed by the Windows Core Audio API.
pub struct CoreAudioEndpoints {
    _private: (),
}

impl CoreAudioEndpoints {
    pub fn open() -> Result<Self, AudioError> {
        #[cfg(windows)]
        {
            Ok(Self { _private: () })
        }
        #[cfg(not(windows))]
        {
            Err(AudioError::Unsupported)
        }
    }
}

#[cfg(windows)]
impl AudioEndpoints for CoreAudioEndpoints {
    fn volume(&self) -> Result<f32, AudioError> {
        let _com = imp::ComGuard::init();
        imp::volume()
    }

    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        check_level(level)?;
        let _com = imp::ComGuard::init();
        imp::set_volume(level)?;
        log::info!("Set master volume to {:.0}%", level * 100.0);
        Ok(())
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        let _com = imp::ComGuard::init();
        imp::is_muted()
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        let _com = imp::ComGuard::init();
        imp::set_mute(muted)?;
        log::info!("Master volume {}", if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    fn list_devices(&self, kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError> {
        let _com = imp::ComGuard::init();
        imp::list_devices(kind)
    }
}

#[cfg(not(windows))]
impl AudioEndpoints for CoreAudioEndpoints {
    fn volume(&self) -> Result<f32, AudioError> {
        Err(AudioError::Unsupported)
    }

    fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        check_level(level)?;
        Err(AudioError::Unsupported)
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        Err(AudioError::Unsupported)
    }

    fn set_mute(&self, _muted: bool) -> Result<(), AudioError> {
        Err(AudioError::Unsupported)
    }

    fn list_devices(&self, _kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError> {
        Err(AudioError::Unsupported)
    }
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use log::{debug, info, warn};
    use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::{
        eCapture, eConsole, eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
        DEVICE_STATE_ACTIVE,
    };
    use windows::Win32::System::Com::StructuredStorage::PropVariantToStringAlloc;
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
        COINIT_MULTITHREADED, STGM_READ,
    };

    use super::{AudioDevice, DeviceKind};
    use crate::error::AudioError;

    fn api(call: &'static str) -> impl FnOnce(windows::core::Error) -> AudioError {
        move |e| AudioError::Api {
            call,
            message: e.message(),
        }
    }

    /// Balances a successful `CoInitializeEx` on drop.
    ///
    /// If the thread was already initialised in another apartment the call
    /// fails with `RPC_E_CHANGED_MODE`; COM is still usable then, but must not
    /// be uninitialised by us.
    pub struct ComGuard {
        owned: bool,
    }

    impl ComGuard {
        pub fn init() -> Self {
            let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
            Self { owned: hr.is_ok() }
        }
    }

    impl Drop for ComGuard {
        fn drop(&mut self) {
            if self.owned {
                unsafe { CoUninitialize() };
            }
        }
    }

    fn enumerator() -> Result<IMMDeviceEnumerator, AudioError> {
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(api("CoCreateInstance(MMDeviceEnumerator)"))
    }

    fn endpoint_volume() -> Result<IAudioEndpointVolume, AudioError> {
        unsafe {
            let device = enumerator()?
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(api("GetDefaultAudioEndpoint"))?;
            device
                .Activate(CLSCTX_ALL, None)
                .map_err(api("Activate(IAudioEndpointVolume)"))
        }
    }

    pub fn volume() -> Result<f32, AudioError> {
        unsafe { endpoint_volume()?.GetMasterVolumeLevelScalar() }
            .map_err(api("GetMasterVolumeLevelScalar"))
    }

    pub fn set_volume(level: f32) -> Result<(), AudioError> {
        unsafe { endpoint_volume()?.SetMasterVolumeLevelScalar(level, std::ptr::null()) }
            .map_err(api("SetMasterVolumeLevelScalar"))
    }

    pub fn is_muted() -> Result<bool, AudioError> {
        unsafe { endpoint_volume()?.GetMute() }
            .map(|muted| muted.as_bool())
            .map_err(api("GetMute"))
    }

    pub fn set_mute(muted: bool) -> Result<(), AudioError> {
        unsafe { endpoint_volume()?.SetMute(muted, std::ptr::null()) }.map_err(api("SetMute"))
    }

    fn device_id(device: &IMMDevice) -> Result<String, AudioError> {
        unsafe {
            let raw = device.GetId().map_err(api("IMMDevice::GetId"))?;
            let id = raw.to_string();
            CoTaskMemFree(Some(raw.0 as *const _));
            id.map_err(|e| AudioError::Api {
                call: "IMMDevice::GetId",
                message: e.to_string(),
            })
        }
    }

    fn friendly_name(device: &IMMDevice) -> Result<String, AudioError> {
        unsafe {
            let store = device
                .OpenPropertyStore(STGM_READ)
                .map_err(api("OpenPropertyStore"))?;
            let value = store
                .GetValue(&PKEY_Device_FriendlyName)
                .map_err(api("IPropertyStore::GetValue"))?;
            let raw = PropVariantToStringAlloc(&value).map_err(api("PropVariantToStringAlloc"))?;
            let name = raw.to_string();
            CoTaskMemFree(Some(raw.0 as *const _));
            name.map_err(|e| AudioError::Api {
                call: "PropVariantToStringAlloc",
                message: e.to_string(),
            })
        }
    }

    pub fn list_devices(kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError> {
        let flow = match kind {
            DeviceKind::Output => eRender,
            DeviceKind::Input => eCapture,
        };
        let collection = unsafe { enumerator()?.EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE) }
            .map_err(api("EnumAudioEndpoints"))?;
        let count = unsafe { collection.GetCount() }.map_err(api("IMMDeviceCollection::GetCount"))?;
        debug!("Found {count} {kind} devices.");

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = match unsafe { collection.Item(index) } {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping {kind} device {index}: {}", e.message());
                    continue;
                }
            };
            match (friendly_name(&device), device_id(&device)) {
                (Ok(name), Ok(id)) => {
                    debug!("  Device {index}: Name='{name}', ID='{id}'");
                    devices.push(AudioDevice { name, id });
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Skipping {kind} device {index}: {e}");
                }
            }
        }
        if devices.is_empty() {
            info!("No {kind} audio devices found.");
        }
        Ok(devices)
    }
}

// ── Test double ───────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    /// In-memory endpoint with a fixed device list.
    pub struct MemoryEndpoints {
        pub level: Mutex<f32>,
        pub muted: Mutex<bool>,
        pub outputs: Vec<AudioDevice>,
        pub inputs: Vec<AudioDevice>,
    }

    impl Default for MemoryEndpoints {
        fn default() -> Self {
            Self {
                level: Mutex::new(0.5),
                muted: Mutex::new(false),
                outputs: vec![device("Speakers", "{out-1}")],
                inputs: vec![device("Microphone", "{in-1}")],
            }
        }
    }

    pub fn device(name: &str, id: &str) -> AudioDevice {
        AudioDevice {
            name: name.to_string(),
            id: id.to_string(),
        }
    }

    impl AudioEndpoints for MemoryEndpoints {
        fn volume(&self) -> Result<f32, AudioError> {
            Ok(*self.level.lock().unwrap())
        }

        fn set_volume(&self, level: f32) -> Result<(), AudioError> {
            check_level(level)?;
            *self.level.lock().unwrap() = level;
            Ok(())
        }

        fn is_muted(&self) -> Result<bool, AudioError> {
            Ok(*self.muted.lock().unwrap())
        }

        fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
            *self.muted.lock().unwrap() = muted;
            Ok(())
        }

        fn list_devices(&self, kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError> {
            Ok(match kind {
                DeviceKind::Output => self.outputs.clone(),
                DeviceKind::Input => self.inputs.clone(),
            })
        }
    }
}
