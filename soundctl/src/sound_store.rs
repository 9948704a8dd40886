/// Sound event bindings stored in the per-user sound scheme registry.
///
/// A binding is addressed by `(category, sub_event)`, e.g.
/// `("SystemAsterisk", ".Current")`, and lives at
/// `AppEvents\Schemes\Apps\.Default\<category>\<sub_event>`. The key's default
/// value holds the `.wav` path; an absent key or empty value means "unset".
///
/// On non-Windows platforms [`RegistrySoundStore::open`] returns
/// [`SoundError::Unsupported`].
use std::collections::BTreeMap;
use std::path::Path;

use log::warn;

use crate::error::SoundError;

pub const SOUNDS_REG_PATH: &str = r"AppEvents\Schemes\Apps\.Default";
pub const DEFAULT_SUB_EVENT: &str = ".Current";

/// category -> sub-event -> path (None when unset).
pub type SoundMap = BTreeMap<String, BTreeMap<String, Option<String>>>;

/// Registry hive to read bindings from. Writes always target the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    CurrentUser,
    LocalMachine,
}

impl Scope {
    pub fn label(self) -> &'static str {
        match self {
            Scope::CurrentUser => "HKCU",
            Scope::LocalMachine => "HKLM",
        }
    }
}

pub trait SoundStore: Send + Sync {
    /// Enumerates every category and sub-event present in `scope`.
    fn list_events(&self, scope: Scope) -> Result<SoundMap, SoundError>;

    /// Reads one binding. Missing keys read as `Ok(None)`.
    fn get(&self, category: &str, sub_event: &str, scope: Scope)
        -> Result<Option<String>, SoundError>;

    /// Writes one binding in the current-user hive. An empty `path` unsets it.
    fn set(&self, category: &str, path: &str, sub_event: &str) -> Result<(), SoundError>;
}

/// Checks a path before it is written to the registry.
///
/// Empty paths are accepted (they unset the event). Non-empty paths must exist;
/// a missing `.wav` extension only warns.
pub fn check_sound_path(path: &str) -> Result<(), SoundError> {
    if path.is_empty() {
        return Ok(());
    }
    let p = Path::new(path);
    if !p.exists() {
        return Err(SoundError::FileNotFound(p.to_path_buf()));
    }
    if !has_wav_extension(p) {
        warn!("Sound file does not end with .wav: {path}. Windows might not play it.");
    }
    Ok(())
}

pub(crate) fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn binding_path(category: &str, sub_event: &str) -> String {
    format!(r"{SOUNDS_REG_PATH}\{category}\{sub_event}")
}

/// Sound store backed by the Windows registry.
pub struct RegistrySoundStore {
    _private: (),
}

impl RegistrySoundStore {
    /// Opens the registry-backed store, or reports that it is unavailable.
    pub fn open() -> Result<Self, SoundError> {
        #[cfg(windows)]
        {
            Ok(Self { _private: () })
        }
        #[cfg(not(windows))]
        {
            Err(SoundError::Unsupported)
        }
    }
}

impl SoundStore for RegistrySoundStore {
    fn list_events(&self, scope: Scope) -> Result<SoundMap, SoundError> {
        #[cfg(windows)]
        {
            imp::list_events(scope)
        }
        #[cfg(not(windows))]
        {
            let _ = scope;
            Err(SoundError::Unsupported)
        }
    }

    fn get(
        &self,
        category: &str,
        sub_event: &str,
        scope: Scope,
    ) -> Result<Option<String>, SoundError> {
        #[cfg(windows)]
        {
            imp::get(&binding_path(category, sub_event), scope)
        }
        #[cfg(not(windows))]
        {
            let _ = (binding_path(category, sub_event), scope);
            Err(SoundError::Unsupported)
        }
    }

    fn set(&self, category: &str, path: &str, sub_event: &str) -> Result<(), SoundError> {
        check_sound_path(path)?;
        #[cfg(windows)]
        {
            imp::set(&binding_path(category, sub_event), path)?;
            log::info!(
                "Set sound for '{category}\\{sub_event}' to '{}'",
                if path.is_empty() { "(None)" } else { path }
            );
            imp::broadcast_settings_change();
            Ok(())
        }
        #[cfg(not(windows))]
        {
            let _ = (category, sub_event);
            Err(SoundError::Unsupported)
        }
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::collections::BTreeMap;

    use log::{debug, warn};
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::{
        ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS, LPARAM,
        WIN32_ERROR, WPARAM,
    };
    use windows::Win32::System::Registry::{
        RegCloseKey, RegCreateKeyExW, RegEnumKeyExW, RegGetValueW, RegOpenKeyExW,
        RegSetValueExW, HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE,
        REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, RRF_RT_REG_SZ,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
    };

    use super::{binding_path, Scope, SoundMap, SOUNDS_REG_PATH};
    use crate::error::SoundError;

    /// Registry key names are limited to 255 characters.
    const MAX_KEY_NAME: usize = 256;
    const ERROR_UNSUPPORTED_TYPE: u32 = 1630;
    const SPI_SETCURSORS: usize = 0x0057;
    const BROADCAST_TIMEOUT_MS: u32 = 5000;

    /// Converts a Rust `&str` to a null-terminated UTF-16 `Vec<u16>`.
    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn root(scope: Scope) -> HKEY {
        match scope {
            Scope::CurrentUser => HKEY_CURRENT_USER,
            Scope::LocalMachine => HKEY_LOCAL_MACHINE,
        }
    }

    fn classify(err: WIN32_ERROR, path: String) -> SoundError {
        if err == ERROR_FILE_NOT_FOUND {
            SoundError::NotFound(path)
        } else if err == ERROR_ACCESS_DENIED {
            SoundError::PermissionDenied(path)
        } else if err.0 == ERROR_UNSUPPORTED_TYPE {
            SoundError::UnexpectedType(path)
        } else {
            SoundError::Registry { path, code: err.0 }
        }
    }

    /// Open registry key, closed on drop.
    struct OwnedKey(HKEY);

    impl OwnedKey {
        fn open(scope: Scope, path: &str) -> Result<Self, SoundError> {
            let path_w = to_wide(path);
            let mut hkey = HKEY::default();
            let err = unsafe {
                RegOpenKeyExW(
                    root(scope),
                    PCWSTR::from_raw(path_w.as_ptr()),
                    0,
                    KEY_READ,
                    &mut hkey,
                )
            };
            if err != ERROR_SUCCESS {
                return Err(classify(err, format!(r"{}\{path}", scope.label())));
            }
            Ok(Self(hkey))
        }

        fn create_for_write(path: &str) -> Result<Self, SoundError> {
            let path_w = to_wide(path);
            let mut hkey = HKEY::default();
            let err = unsafe {
                RegCreateKeyExW(
                    HKEY_CURRENT_USER,
                    PCWSTR::from_raw(path_w.as_ptr()),
                    0,
                    PCWSTR::null(),
                    REG_OPTION_NON_VOLATILE,
                    KEY_WRITE,
                    None,
                    &mut hkey,
                    None,
                )
            };
            if err != ERROR_SUCCESS {
                return Err(classify(err, format!(r"HKCU\{path}")));
            }
            Ok(Self(hkey))
        }

        /// Names of all direct subkeys, in registry order.
        fn subkeys(&self) -> Result<Vec<String>, SoundError> {
            let mut names = Vec::new();
            let mut index = 0u32;
            loop {
                let mut buf = [0u16; MAX_KEY_NAME];
                let mut len = buf.len() as u32;
                let err = unsafe {
                    RegEnumKeyExW(
                        self.0,
                        index,
                        PWSTR(buf.as_mut_ptr()),
                        &mut len,
                        None,
                        PWSTR::null(),
                        None,
                        None,
                    )
                };
                if err == ERROR_NO_MORE_ITEMS {
                    break;
                }
                if err != ERROR_SUCCESS {
                    return Err(SoundError::Registry {
                        path: "subkey enumeration".to_string(),
                        code: err.0,
                    });
                }
                names.push(String::from_utf16_lossy(&buf[..len as usize]));
                index += 1;
            }
            Ok(names)
        }
    }

    impl Drop for OwnedKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    pub fn list_events(scope: Scope) -> Result<SoundMap, SoundError> {
        let apps = OwnedKey::open(scope, SOUNDS_REG_PATH)?;
        let mut events = SoundMap::new();
        for category in apps.subkeys()? {
            let category_path = format!(r"{SOUNDS_REG_PATH}\{category}");
            let mut subs = BTreeMap::new();
            match OwnedKey::open(scope, &category_path).and_then(|k| k.subkeys()) {
                Ok(sub_events) => {
                    for sub_event in sub_events {
                        let value = get(&binding_path(&category, &sub_event), scope)
                            .unwrap_or_else(|e| {
                                warn!("Treating '{category}\\{sub_event}' as unset: {e}");
                                None
                            });
                        subs.insert(sub_event, value);
                    }
                }
                Err(e) => warn!("Skipping sub-events of '{category}': {e}"),
            }
            events.insert(category, subs);
        }
        Ok(events)
    }

    /// Reads the default value of `path`, expanding environment variables.
    pub fn get(path: &str, scope: Scope) -> Result<Option<String>, SoundError> {
        let path_w = to_wide(path);
        let mut size = 0u32;
        // RRF_RT_REG_SZ without RRF_NOEXPAND also accepts REG_EXPAND_SZ and expands it.
        let err = unsafe {
            RegGetValueW(
                root(scope),
                PCWSTR::from_raw(path_w.as_ptr()),
                PCWSTR::null(),
                RRF_RT_REG_SZ,
                None,
                None,
                Some(&mut size as *mut u32),
            )
        };
        if err == ERROR_FILE_NOT_FOUND {
            debug!(r"Registry key or default value not found for {}\{path}", scope.label());
            return Ok(None);
        }
        if err != ERROR_SUCCESS {
            return Err(classify(err, format!(r"{}\{path}", scope.label())));
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let mut size = (buf.len() * 2) as u32;
        let err = unsafe {
            RegGetValueW(
                root(scope),
                PCWSTR::from_raw(path_w.as_ptr()),
                PCWSTR::null(),
                RRF_RT_REG_SZ,
                None,
                Some(buf.as_mut_ptr().cast()),
                Some(&mut size as *mut u32),
            )
        };
        if err != ERROR_SUCCESS {
            return Err(classify(err, format!(r"{}\{path}", scope.label())));
        }

        let chars = (size as usize / 2).min(buf.len());
        let value = String::from_utf16_lossy(&buf[..chars]);
        let value = value.trim_end_matches('\0');
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    pub fn set(path: &str, sound_file: &str) -> Result<(), SoundError> {
        let key = OwnedKey::create_for_write(path)?;
        let data_w = to_wide(sound_file);
        let data_bytes: &[u8] = unsafe {
            std::slice::from_raw_parts(data_w.as_ptr() as *const u8, data_w.len() * 2)
        };
        let err = unsafe { RegSetValueExW(key.0, PCWSTR::null(), 0, REG_EXPAND_SZ, Some(data_bytes)) };
        if err != ERROR_SUCCESS {
            return Err(classify(err, format!(r"HKCU\{path}")));
        }
        Ok(())
    }

    /// Tells running applications that sound settings changed.
    pub fn broadcast_settings_change() {
        let area = to_wide("Window");
        let result = unsafe {
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                WPARAM(SPI_SETCURSORS),
                LPARAM(area.as_ptr() as isize),
                SMTO_ABORTIFHUNG,
                BROADCAST_TIMEOUT_MS,
                None,
            )
        };
        if result.0 == 0 {
            warn!("SendMessageTimeout failed to broadcast settings change");
        } else {
            debug!("Broadcast WM_SETTINGCHANGE");
        }
    }
}

// ── Test double ────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store. Bindings listed in `failing` reject writes.
    #[derive(Default)]
    pub struct MemorySoundStore {
        pub sounds: Mutex<SoundMap>,
        pub failing: Mutex<HashSet<(String, String)>>,
        pub writes: Mutex<Vec<(String, String, String)>>,
    }

    impl MemorySoundStore {
        pub fn with_sounds(sounds: SoundMap) -> Self {
            Self {
                sounds: Mutex::new(sounds),
                ..Self::default()
            }
        }

        pub fn fail_on(&self, category: &str, sub_event: &str) {
            self.failing
                .lock()
                .unwrap()
                .insert((category.to_string(), sub_event.to_string()));
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl SoundStore for MemorySoundStore {
        fn list_events(&self, _scope: Scope) -> Result<SoundMap, SoundError> {
            Ok(self.sounds.lock().unwrap().clone())
        }

        fn get(
            &self,
            category: &str,
            sub_event: &str,
            _scope: Scope,
        ) -> Result<Option<String>, SoundError> {
            Ok(self
                .sounds
                .lock()
                .unwrap()
                .get(category)
                .and_then(|subs| subs.get(sub_event))
                .cloned()
                .flatten())
        }

        fn set(&self, category: &str, path: &str, sub_event: &str) -> Result<(), SoundError> {
            self.writes.lock().unwrap().push((
                category.to_string(),
                sub_event.to_string(),
                path.to_string(),
            ));
            let key = (category.to_string(), sub_event.to_string());
            if self.failing.lock().unwrap().contains(&key) {
                return Err(SoundError::PermissionDenied(binding_path(category, sub_event)));
            }
            let value = (!path.is_empty()).then(|| path.to_string());
            self.sounds
                .lock()
                .unwrap()
                .entry(category.to_string())
                .or_default()
                .insert(sub_event.to_string(), value);
            Ok(())
        }
    }
}
