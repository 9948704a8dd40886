/// Named snapshots of the whole sound scheme, one JSON file per profile.
///
/// A profile is written by snapshotting the live [`SoundStore`] and applied by
/// writing every binding back. Application is best-effort with no rollback:
/// bindings that fail are logged and counted, the rest stay applied.
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::sound_store::{Scope, SoundMap, SoundStore};

pub const PROFILE_EXT: &str = "json";

/// A persisted sound profile document.
///
/// Only the outer shape (`name` plus a `sounds` object) is enforced on load.
/// Categories and paths of the wrong type are kept so that `apply` can skip
/// them one by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// RFC 3339 timestamp of when the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub sounds: BTreeMap<String, CategoryEntry>,
}

/// The sub-events of one category, or whatever non-object value stood in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    SubEvents(BTreeMap<String, SoundValue>),
    Invalid(serde_json::Value),
}

/// A sound file path (`null` for none), or a value of any other JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SoundValue {
    Path(Option<String>),
    Invalid(serde_json::Value),
}

impl Profile {
    pub fn from_snapshot(name: &str, sounds: SoundMap) -> Self {
        let sounds = sounds
            .into_iter()
            .map(|(category, subs)| {
                let subs = subs
                    .into_iter()
                    .map(|(sub_event, path)| (sub_event, SoundValue::Path(path)))
                    .collect();
                (category, CategoryEntry::SubEvents(subs))
            })
            .collect();
        Self {
            name: name.to_string(),
            saved_at: Some(chrono::Local::now().to_rfc3339()),
            sounds,
        }
    }

    /// Sub-event entries across all well-formed categories, including ones
    /// whose path has the wrong type.
    pub fn binding_count(&self) -> usize {
        self.sounds
            .values()
            .map(|entry| match entry {
                CategoryEntry::SubEvents(subs) => subs.len(),
                CategoryEntry::Invalid(_) => 0,
            })
            .sum()
    }

    /// The well-typed bindings only.
    pub fn sound_map(&self) -> SoundMap {
        let mut map = SoundMap::new();
        for (category, entry) in &self.sounds {
            let CategoryEntry::SubEvents(subs) = entry else {
                continue;
            };
            let target = map.entry(category.clone()).or_default();
            for (sub_event, value) in subs {
                if let SoundValue::Path(path) = value {
                    target.insert(sub_event.clone(), path.clone());
                }
            }
        }
        map
    }
}

/// Outcome of writing a profile's bindings to the sound store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.applied + self.failed
    }

    /// True when every binding was written (vacuously true for an empty profile).
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Something that can switch the system to a named profile.
///
/// Implemented by [`ProfileStore`]; the context monitor depends only on this.
pub trait ProfileApplier: Send + Sync {
    /// Returns true only if the profile loaded and every binding was written.
    fn apply_profile(&self, name: &str) -> bool;
}

/// Letters, digits, spaces, underscores and hyphens; non-empty; no leading dot.
pub fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
}

pub struct ProfileStore {
    dir: PathBuf,
    sounds: Arc<dyn SoundStore>,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>, sounds: Arc<dyn SoundStore>) -> Self {
        Self {
            dir: dir.into(),
            sounds,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ProfileError> {
        if !is_valid_profile_name(name) {
            warn!(
                "Invalid profile name: '{name}'. Use letters, numbers, spaces, underscores, hyphens."
            );
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{PROFILE_EXT}")))
    }

    /// Snapshots the current-user sound scheme into `<dir>/<name>.json`,
    /// overwriting any existing profile of that name.
    pub fn save(&self, name: &str) -> Result<PathBuf, ProfileError> {
        let path = self.path_for(name)?;
        info!("Saving current sound settings to profile: '{name}'");

        let profile = Profile::from_snapshot(name, self.sounds.list_events(Scope::CurrentUser)?);
        let content = serde_json::to_string_pretty(&profile)?;

        fs::create_dir_all(&self.dir).map_err(|e| ProfileError::io(&self.dir, e))?;
        fs::write(&path, content).map_err(|e| ProfileError::io(&path, e))?;

        info!("Profile '{name}' saved to {}", path.display());
        Ok(path)
    }

    /// Reads and validates a profile document.
    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let path = self.path_for(name)?;
        debug!("Loading profile '{name}' from {}", path.display());

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ProfileError::NotFound(name.to_string()))
            }
            Err(e) => return Err(ProfileError::io(&path, e)),
        };

        let profile: Profile =
            serde_json::from_str(&content).map_err(|e| ProfileError::InvalidFormat {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if profile.name != name {
            warn!(
                "Profile name in file ('{}') does not match filename ('{name}').",
                profile.name
            );
        }
        Ok(profile)
    }

    /// Loads `name` and writes every binding to the sound store.
    ///
    /// Returns `Err` only if the profile could not be loaded. Individual
    /// binding failures are logged and counted in the report; bindings that
    /// were already written are not rolled back.
    pub fn apply(&self, name: &str) -> Result<ApplyReport, ProfileError> {
        let profile = self.load(name)?;
        info!("Applying profile: '{name}'");

        let mut report = ApplyReport::default();
        for (category, entry) in &profile.sounds {
            let CategoryEntry::SubEvents(sub_events) = entry else {
                warn!("Skipping invalid sub-event data for category '{category}' in profile '{name}'.");
                continue;
            };
            for (sub_event, value) in sub_events {
                // JSON null means "no sound"; the store expects an empty string.
                let path = match value {
                    SoundValue::Path(path) => path.as_deref().unwrap_or(""),
                    SoundValue::Invalid(other) => {
                        error!(
                            "Invalid sound file path ({other}) for '{category}\\{sub_event}' in profile '{name}'. Expected string or null."
                        );
                        report.failed += 1;
                        continue;
                    }
                };
                match self.sounds.set(category, path, sub_event) {
                    Ok(()) => report.applied += 1,
                    Err(e) => {
                        error!("Failed to apply '{category}\\{sub_event}' from profile '{name}': {e}");
                        report.failed += 1;
                    }
                }
            }
        }

        let total = report.total();
        info!(
            "Profile '{name}' applied: {}/{total}, failed: {}/{total}",
            report.applied, report.failed
        );
        if !report.is_complete() {
            warn!("Some sounds failed to apply for profile '{name}'.");
        } else if total == 0 {
            info!("Profile '{name}' contained no sounds to apply.");
        }
        Ok(report)
    }

    /// Names of all saved profiles, sorted.
    pub fn list(&self) -> Result<BTreeSet<String>, ProfileError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Profile directory '{}' does not exist.", self.dir.display());
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(ProfileError::io(&self.dir, e)),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let path = entry.map_err(|e| ProfileError::io(&self.dir, e))?.path();
            let is_profile = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(PROFILE_EXT))
                .unwrap_or(false);
            if !is_profile || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.insert(stem.to_string_lossy().into_owned());
            }
        }
        debug!("Found profiles: {names:?}");
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<(), ProfileError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        warn!("Deleting profile '{name}' at {}", path.display());
        fs::remove_file(&path).map_err(|e| ProfileError::io(&path, e))?;
        info!("Profile '{name}' deleted.");
        Ok(())
    }
}

impl ProfileApplier for ProfileStore {
    fn apply_profile(&self, name: &str) -> bool {
        match self.apply(name) {
            Ok(report) => report.is_complete(),
            Err(e) => {
                error!("Could not apply profile '{name}': {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::sound_store::fake::MemorySoundStore;

    fn sound_map(entries: &[(&str, &str, Option<&str>)]) -> SoundMap {
        let mut map = SoundMap::new();
        for (category, sub_event, path) in entries {
            map.entry(category.to_string())
                .or_default()
                .insert(sub_event.to_string(), path.map(str::to_string));
        }
        map
    }

    fn store_with(sounds: SoundMap) -> (tempfile::TempDir, Arc<MemorySoundStore>, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let backing = Arc::new(MemorySoundStore::with_sounds(sounds));
        let store = ProfileStore::new(dir.path().join("profiles"), backing.clone());
        (dir, backing, store)
    }

    // ── name validation ───────────────────────────────────────────────────────

    #[test]
    fn valid_profile_names() {
        for name in ["Work", "Quiet Hours", "game_mode-2", "A"] {
            assert!(is_valid_profile_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_profile_names() {
        for name in ["", ".hidden", "a/b", r"a\b", "..", "semi;colon", "tab\t", "ünï"] {
            assert!(!is_valid_profile_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn save_rejects_invalid_name_without_touching_disk() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        let err = store.save("../escape").unwrap_err();
        assert!(matches!(err, ProfileError::InvalidName(_)));
        assert!(!store.dir().exists());
    }

    #[test]
    fn delete_rejects_invalid_name() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        let victim = store.dir().join("x.json");
        fs::write(&victim, "{}").unwrap();
        assert!(matches!(store.delete("x/"), Err(ProfileError::InvalidName(_))));
        assert!(victim.exists());
    }

    // ── save / load ───────────────────────────────────────────────────────────

    #[test]
    fn save_then_load_returns_snapshot() {
        let sounds = sound_map(&[
            ("SystemAsterisk", ".Current", Some(r"C:\Windows\Media\ding.wav")),
            ("SystemAsterisk", ".Default", None),
            ("SystemExit", ".Current", None),
        ]);
        let (_dir, _backing, store) = store_with(sounds.clone());

        let path = store.save("Work").unwrap();
        assert_eq!(path, store.dir().join("Work.json"));

        let profile = store.load("Work").unwrap();
        assert_eq!(profile.name, "Work");
        assert_eq!(profile.sound_map(), sounds);
        assert!(profile.saved_at.is_some());
    }

    #[test]
    fn save_preserves_empty_categories() {
        let mut sounds = sound_map(&[("SystemExit", ".Current", None)]);
        sounds.insert("EmptyCategory".to_string(), BTreeMap::new());
        let (_dir, _backing, store) = store_with(sounds.clone());

        store.save("Snapshot").unwrap();
        assert_eq!(store.load("Snapshot").unwrap().sound_map(), sounds);
    }

    #[test]
    fn save_overwrites_existing_profile() {
        let (_dir, backing, store) = store_with(sound_map(&[("A", ".Current", None)]));
        store.save("P").unwrap();
        backing.set("B", "", ".Current").unwrap();
        store.save("P").unwrap();
        let sounds = store.load("P").unwrap().sound_map();
        assert!(sounds.contains_key("A"));
        assert!(sounds.contains_key("B"));
    }

    #[test]
    fn saved_document_uses_null_for_unset() {
        let (_dir, _backing, store) = store_with(sound_map(&[("SystemExit", ".Current", None)]));
        let path = store.save("Nulls").unwrap();
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["name"], "Nulls");
        assert!(raw["sounds"]["SystemExit"][".Current"].is_null());
    }

    #[test]
    fn load_missing_profile_is_not_found() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        assert!(matches!(store.load("Ghost"), Err(ProfileError::NotFound(_))));
    }

    #[test]
    fn load_document_without_sounds_is_invalid() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("Bad.json"), r#"{"name": "Bad"}"#).unwrap();
        assert!(matches!(store.load("Bad"), Err(ProfileError::InvalidFormat { .. })));
    }

    #[test]
    fn load_document_without_name_is_invalid() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("Bad.json"), r#"{"sounds": {}}"#).unwrap();
        assert!(matches!(store.load("Bad"), Err(ProfileError::InvalidFormat { .. })));
    }

    #[test]
    fn load_malformed_json_is_invalid() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("Bad.json"), "{{{{").unwrap();
        assert!(matches!(store.load("Bad"), Err(ProfileError::InvalidFormat { .. })));
    }

    #[test]
    fn load_accepts_document_without_timestamp_and_mismatched_name() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.dir().join("Renamed.json"),
            r#"{"name": "Legacy", "sounds": {"SystemExit": {".Current": null}}}"#,
        )
        .unwrap();
        let profile = store.load("Renamed").unwrap();
        assert_eq!(profile.name, "Legacy");
        assert!(profile.saved_at.is_none());
        assert_eq!(profile.binding_count(), 1);
    }

    // ── apply ─────────────────────────────────────────────────────────────────

    #[test]
    fn apply_writes_every_binding() {
        let sounds = sound_map(&[
            ("A", ".Current", Some(r"C:\a.wav")),
            ("B", ".Current", None),
        ]);
        let (_dir, backing, store) = store_with(sounds);
        store.save("Full").unwrap();
        backing.writes.lock().unwrap().clear();

        let report = store.apply("Full").unwrap();
        assert_eq!(report, ApplyReport { applied: 2, failed: 0 });
        assert!(report.is_complete());

        let writes = backing.writes.lock().unwrap();
        assert!(writes.contains(&("A".into(), ".Current".into(), r"C:\a.wav".into())));
        // Unset bindings are written as empty strings.
        assert!(writes.contains(&("B".into(), ".Current".into(), String::new())));
    }

    #[test]
    fn apply_partial_failure_reports_failure_without_rollback() {
        let sounds = sound_map(&[
            ("One", ".Current", Some("one.wav")),
            ("Two", ".Current", Some("two.wav")),
            ("Three", ".Current", Some("three.wav")),
        ]);
        let (_dir, backing, store) = store_with(sounds);
        store.save("Mixed").unwrap();

        // Wipe the live state, then make the second binding (in apply order) fail.
        *backing.sounds.lock().unwrap() = SoundMap::new();
        backing.fail_on("Three", ".Current");

        let report = store.apply("Mixed").unwrap();
        assert_eq!(report, ApplyReport { applied: 2, failed: 1 });
        assert!(!report.is_complete());
        assert!(!store.apply_profile("Mixed"));

        let live = backing.sounds.lock().unwrap();
        assert_eq!(live["One"][".Current"].as_deref(), Some("one.wav"));
        assert_eq!(live["Two"][".Current"].as_deref(), Some("two.wav"));
        assert!(!live.contains_key("Three"));
    }

    #[test]
    fn apply_skips_malformed_entries_and_applies_the_rest() {
        let (_dir, backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(
            store.dir().join("Loose.json"),
            r#"{"name": "Loose", "sounds": {
                "A": {".Current": "a.wav", ".Other": 5},
                "B": "junk",
                "C": {".Current": "c.wav"}
            }}"#,
        )
        .unwrap();

        let profile = store.load("Loose").unwrap();
        assert_eq!(profile.binding_count(), 3);
        assert_eq!(
            profile.sounds["A"],
            CategoryEntry::SubEvents(BTreeMap::from([
                (".Current".to_string(), SoundValue::Path(Some("a.wav".into()))),
                (".Other".to_string(), SoundValue::Invalid(serde_json::json!(5))),
            ]))
        );

        let report = store.apply("Loose").unwrap();
        assert_eq!(report, ApplyReport { applied: 2, failed: 1 });
        assert!(!store.apply_profile("Loose"));

        let live = backing.sounds.lock().unwrap();
        assert_eq!(live["A"][".Current"].as_deref(), Some("a.wav"));
        assert_eq!(live["C"][".Current"].as_deref(), Some("c.wav"));
        assert!(!live["A"].contains_key(".Other"));
        assert!(!live.contains_key("B"));
    }

    #[test]
    fn load_rejects_non_object_sounds() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join("Bad.json"), r#"{"name": "Bad", "sounds": []}"#).unwrap();
        assert!(matches!(store.load("Bad"), Err(ProfileError::InvalidFormat { .. })));
    }

    #[test]
    fn apply_empty_profile_succeeds() {
        let (_dir, backing, store) = store_with(SoundMap::new());
        store.save("Empty").unwrap();
        let report = store.apply("Empty").unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.is_complete());
        assert_eq!(backing.write_count(), 0);
    }

    #[test]
    fn apply_missing_profile_is_an_error() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        assert!(store.apply("Ghost").is_err());
        assert!(!store.apply_profile("Ghost"));
    }

    // ── list / delete ─────────────────────────────────────────────────────────

    #[test]
    fn list_missing_directory_is_empty() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn list_returns_sorted_json_stems_only() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        store.save("Work").unwrap();
        store.save("Alpha").unwrap();
        fs::write(store.dir().join("notes.txt"), "x").unwrap();
        fs::write(store.dir().join("Upper.JSON"), "{}").unwrap();
        fs::create_dir(store.dir().join("folder.json")).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().collect();
        assert_eq!(names, vec!["Alpha", "Upper", "Work"]);
    }

    #[test]
    fn delete_removes_profile() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        store.save("Gone").unwrap();
        store.delete("Gone").unwrap();
        assert!(!store.list().unwrap().contains("Gone"));
    }

    #[test]
    fn delete_missing_profile_is_not_found() {
        let (_dir, _backing, store) = store_with(SoundMap::new());
        assert!(matches!(store.delete("Ghost"), Err(ProfileError::NotFound(_))));
    }
}
