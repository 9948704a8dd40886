/// Single entry point over the sound store, profiles, audio endpoints and
/// player. The CLI talks only to this type.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;

use crate::audio::{AudioDevice, AudioEndpoints, CoreAudioEndpoints, DeviceKind};
use crate::config::ProfilesConfig;
use crate::error::{AudioError, PlaybackError, ProfileError, SoundError};
use crate::monitor::ContextMonitor;
use crate::player::{PlayMode, SoundPlayer, SystemSoundPlayer};
use crate::profile::{ApplyReport, Profile, ProfileStore};
use crate::sound_store::{RegistrySoundStore, Scope, SoundMap, SoundStore};
use crate::window::WindowInspector;

/// One category's bindings as selected for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryListing {
    pub category: String,
    pub sub_events: Vec<(String, Option<String>)>,
}

/// Filters `sounds` by a category regex; unset bindings are dropped unless
/// `show_unset`. Categories left with no sub-events are omitted.
pub fn select_sounds(
    sounds: &SoundMap,
    filter: Option<&Regex>,
    show_unset: bool,
) -> Vec<CategoryListing> {
    sounds
        .iter()
        .filter(|(category, _)| filter.map_or(true, |re| re.is_match(category)))
        .filter_map(|(category, subs)| {
            let sub_events: Vec<_> = subs
                .iter()
                .filter(|(_, path)| show_unset || path.is_some())
                .map(|(sub, path)| (sub.clone(), path.clone()))
                .collect();
            (!sub_events.is_empty()).then(|| CategoryListing {
                category: category.clone(),
                sub_events,
            })
        })
        .collect()
}

pub struct SoundManager {
    sounds: Arc<dyn SoundStore>,
    profiles: Arc<ProfileStore>,
    audio: Arc<dyn AudioEndpoints>,
    player: Arc<dyn SoundPlayer>,
}

impl SoundManager {
    pub fn new(
        sounds: Arc<dyn SoundStore>,
        audio: Arc<dyn AudioEndpoints>,
        player: Arc<dyn SoundPlayer>,
        profiles_dir: impl Into<PathBuf>,
    ) -> Self {
        let profiles = Arc::new(ProfileStore::new(profiles_dir, Arc::clone(&sounds)));
        Self {
            sounds,
            profiles,
            audio,
            player,
        }
    }

    /// Wires the OS-backed implementations. Fails where they are unavailable.
    pub fn system(profiles_dir: &Path) -> Result<Self> {
        let sounds = RegistrySoundStore::open().context("Failed to open the sound store")?;
        let audio = CoreAudioEndpoints::open().context("Failed to open audio endpoints")?;
        let player = SystemSoundPlayer::open().context("Failed to open the sound player")?;
        info!("SoundManager initialized (profiles in {}).", profiles_dir.display());
        Ok(Self::new(
            Arc::new(sounds),
            Arc::new(audio),
            Arc::new(player),
            profiles_dir,
        ))
    }

    // ── sound events ──────────────────────────────────────────────────────────

    pub fn list_sounds(&self, scope: Scope) -> Result<SoundMap, SoundError> {
        debug!("Listing system sounds from {}.", scope.label());
        self.sounds.list_events(scope)
    }

    pub fn sound_for_event(
        &self,
        category: &str,
        sub_event: &str,
        scope: Scope,
    ) -> Result<Option<String>, SoundError> {
        self.sounds.get(category, sub_event, scope)
    }

    pub fn set_sound_for_event(
        &self,
        category: &str,
        path: &str,
        sub_event: &str,
    ) -> Result<(), SoundError> {
        debug!("Setting sound file for event '{category}\\{sub_event}' to '{path}'");
        self.sounds.set(category, path, sub_event)
    }

    /// Plays whatever is bound to the event. Returns the file played.
    pub fn play_event(
        &self,
        category: &str,
        sub_event: &str,
        mode: PlayMode,
    ) -> Result<PathBuf, PlaybackError> {
        let Some(path) = self.sound_for_event(category, sub_event, Scope::CurrentUser)? else {
            return Err(PlaybackError::NotConfigured {
                category: category.to_string(),
                sub_event: sub_event.to_string(),
            });
        };
        let path = PathBuf::from(path);
        self.player.play_file(&path, mode)?;
        Ok(path)
    }

    pub fn play_file(&self, path: &Path, mode: PlayMode) -> Result<(), PlaybackError> {
        self.player.play_file(path, mode)
    }

    // ── profiles ──────────────────────────────────────────────────────────────

    pub fn profiles_dir(&self) -> &Path {
        self.profiles.dir()
    }

    pub fn save_profile(&self, name: &str) -> Result<PathBuf, ProfileError> {
        self.profiles.save(name)
    }

    pub fn load_profile(&self, name: &str) -> Result<Profile, ProfileError> {
        self.profiles.load(name)
    }

    pub fn apply_profile(&self, name: &str) -> Result<ApplyReport, ProfileError> {
        self.profiles.apply(name)
    }

    pub fn list_profiles(&self) -> Result<BTreeSet<String>, ProfileError> {
        self.profiles.list()
    }

    pub fn delete_profile(&self, name: &str) -> Result<(), ProfileError> {
        self.profiles.delete(name)
    }

    // ── audio endpoints ───────────────────────────────────────────────────────

    pub fn volume(&self) -> Result<f32, AudioError> {
        self.audio.volume()
    }

    pub fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        self.audio.set_volume(level)
    }

    pub fn is_muted(&self) -> Result<bool, AudioError> {
        self.audio.is_muted()
    }

    pub fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.audio.set_mute(muted)
    }

    pub fn list_devices(&self, kind: DeviceKind) -> Result<Vec<AudioDevice>, AudioError> {
        self.audio.list_devices(kind)
    }

    pub fn set_default_device(&self, id: &str, kind: DeviceKind) -> Result<(), AudioError> {
        self.audio.set_default_device(id, kind)
    }

    // ── context monitor ───────────────────────────────────────────────────────

    /// A stopped monitor that applies profiles from this manager's store.
    pub fn context_monitor(
        &self,
        config: ProfilesConfig,
        inspector: Arc<dyn WindowInspector>,
    ) -> ContextMonitor {
        ContextMonitor::new(config, inspector, self.profiles.clone())
    }
}
