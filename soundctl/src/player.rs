/// `.wav` playback through `PlaySoundW`.
///
/// Asynchronous playback is fire-and-forget at the OS level: the call returns
/// once the sound has started and a later `PlaySound` replaces it.
use std::path::Path;

use log::warn;

use crate::error::PlaybackError;
use crate::sound_store::has_wav_extension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Async,
    /// Block until the sound finishes.
    Sync,
}

impl PlayMode {
    pub fn from_sync(sync: bool) -> Self {
        if sync {
            PlayMode::Sync
        } else {
            PlayMode::Async
        }
    }
}

pub trait SoundPlayer: Send + Sync {
    fn play_file(&self, path: &Path, mode: PlayMode) -> Result<(), PlaybackError>;
}

/// Checks that `path` exists before handing it to the OS.
pub fn check_playable(path: &Path) -> Result<(), PlaybackError> {
    if !path.exists() {
        return Err(PlaybackError::FileNotFound(path.to_path_buf()));
    }
    if !has_wav_extension(path) {
        warn!(
            "File does not end with .wav: {}. Playback might fail.",
            path.display()
        );
    }
    Ok(())
}

pub struct SystemSoundPlayer {
    _private: (),
}

impl SystemSoundPlayer {
    pub fn open() -> Result<Self, PlaybackError> {
        #[cfg(windows)]
        {
            Ok(Self { _private: () })
        }
        #[cfg(not(windows))]
        {
            Err(PlaybackError::Unsupported)
        }
    }
}

impl SoundPlayer for SystemSoundPlayer {
    fn play_file(&self, path: &Path, mode: PlayMode) -> Result<(), PlaybackError> {
        check_playable(path)?;
        #[cfg(windows)]
        {
            log::info!("Playing sound file: {} ({mode:?})", path.display());
            imp::play(path, mode)
        }
        #[cfg(not(windows))]
        {
            let _ = mode;
            Err(PlaybackError::Unsupported)
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HMODULE;
    use windows::Win32::Media::Audio::{PlaySoundW, SND_ASYNC, SND_FILENAME, SND_NODEFAULT, SND_SYNC};

    use super::PlayMode;
    use crate::error::PlaybackError;

    pub fn play(path: &Path, mode: PlayMode) -> Result<(), PlaybackError> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let timing = match mode {
            PlayMode::Async => SND_ASYNC,
            PlayMode::Sync => SND_SYNC,
        };
        // SND_NODEFAULT: never fall back to the default beep.
        let ok = unsafe {
            PlaySoundW(
                PCWSTR::from_raw(wide.as_ptr()),
                HMODULE::default(),
                SND_FILENAME | SND_NODEFAULT | timing,
            )
        };
        if ok.as_bool() {
            Ok(())
        } else {
            Err(PlaybackError::Failed(path.to_path_buf()))
        }
    }
}
