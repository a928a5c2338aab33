//! Persisted playback preferences
//!
//! Preferences are read once when a player is mounted and overwritten on
//! every user-driven change to volume, mute, rate or quality. Writes are
//! whole-record and idempotent, so no debouncing is done.

use crate::{
    error::Error,
    types::{clamp_rate, clamp_volume, QualityChoice, QualityLevel},
    Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Stored HLS quality: `auto`, a height label (`"720p"`) or a raw level index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HlsQualityPreference {
    #[default]
    Auto,
    Height(u32),
    Index(usize),
}

impl HlsQualityPreference {
    /// Record a user selection, preferring the portable height label
    pub fn from_choice(choice: QualityChoice, levels: &[QualityLevel]) -> Self {
        match choice {
            QualityChoice::Auto => HlsQualityPreference::Auto,
            QualityChoice::Level(index) => match levels.iter().find(|l| l.index == index) {
                Some(QualityLevel {
                    height: Some(height),
                    ..
                }) => HlsQualityPreference::Height(*height),
                _ => HlsQualityPreference::Index(index),
            },
        }
    }

    /// Match against enumerated levels: height label first, then raw index,
    /// otherwise automatic
    pub fn resolve(&self, levels: &[QualityLevel]) -> QualityChoice {
        match *self {
            HlsQualityPreference::Auto => QualityChoice::Auto,
            HlsQualityPreference::Height(height) => levels
                .iter()
                .find(|l| l.height == Some(height))
                .map(|l| QualityChoice::Level(l.index))
                .unwrap_or(QualityChoice::Auto),
            HlsQualityPreference::Index(index) => levels
                .iter()
                .find(|l| l.index == index)
                .map(|l| QualityChoice::Level(l.index))
                .unwrap_or(QualityChoice::Auto),
        }
    }
}

impl std::fmt::Display for HlsQualityPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HlsQualityPreference::Auto => write!(f, "auto"),
            HlsQualityPreference::Height(h) => write!(f, "{}p", h),
            HlsQualityPreference::Index(i) => write!(f, "{}", i),
        }
    }
}

impl std::str::FromStr for HlsQualityPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            return Ok(HlsQualityPreference::Auto);
        }
        if let Some(height) = s.strip_suffix('p').or_else(|| s.strip_suffix('P')) {
            return height
                .parse()
                .map(HlsQualityPreference::Height)
                .map_err(|_| Error::Preferences(format!("invalid quality label '{}'", s)));
        }
        s.parse()
            .map(HlsQualityPreference::Index)
            .map_err(|_| Error::Preferences(format!("invalid quality '{}'", s)))
    }
}

impl Serialize for HlsQualityPreference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HlsQualityPreference {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Index(i) => Ok(HlsQualityPreference::Index(i)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Persisted preferences blob
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub hls_quality: HlsQualityPreference,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            hls_quality: HlsQualityPreference::Auto,
        }
    }
}

impl Preferences {
    /// Clamp values read from untrusted storage
    pub fn sanitized(self) -> Self {
        Self {
            volume: clamp_volume(self.volume),
            playback_rate: clamp_rate(self.playback_rate),
            ..self
        }
    }

    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(volume) = patch.volume {
            self.volume = clamp_volume(volume);
        }
        if let Some(muted) = patch.muted {
            self.muted = muted;
        }
        if let Some(rate) = patch.playback_rate {
            self.playback_rate = clamp_rate(rate);
        }
        if let Some(quality) = patch.hls_quality {
            self.hls_quality = quality;
        }
    }
}

/// Partial update of [`Preferences`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PreferencesPatch {
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub playback_rate: Option<f64>,
    pub hls_quality: Option<HlsQualityPreference>,
}

impl PreferencesPatch {
    pub fn volume(volume: f64, muted: bool) -> Self {
        Self {
            volume: Some(volume),
            muted: Some(muted),
            ..Default::default()
        }
    }

    pub fn muted(muted: bool) -> Self {
        Self {
            muted: Some(muted),
            ..Default::default()
        }
    }

    pub fn playback_rate(rate: f64) -> Self {
        Self {
            playback_rate: Some(rate),
            ..Default::default()
        }
    }

    pub fn hls_quality(quality: HlsQualityPreference) -> Self {
        Self {
            hls_quality: Some(quality),
            ..Default::default()
        }
    }
}

/// Storage for [`Preferences`], shared by every player instance
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences, `None` when nothing (valid) has been saved
    fn load(&self) -> Option<Preferences>;

    /// Merge `patch` into the stored record and overwrite it
    fn save(&self, patch: PreferencesPatch) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Option<Preferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(preferences: Preferences) -> Self {
        Self {
            inner: Mutex::new(Some(preferences)),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Option<Preferences> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        (*guard).map(Preferences::sanitized)
    }

    fn save(&self, patch: PreferencesPatch) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prefs = (*guard).unwrap_or_default();
        prefs.apply(&patch);
        *guard = Some(prefs);
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn load(&self) -> Option<Preferences> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read preferences");
                return None;
            }
        };

        match serde_json::from_str::<Preferences>(&content) {
            Ok(prefs) => Some(prefs.sanitized()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt preferences");
                None
            }
        }
    }

    fn save(&self, patch: PreferencesPatch) -> Result<()> {
        let mut prefs = self.load().unwrap_or_default();
        prefs.apply(&patch);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&prefs)?)?;
        debug!(path = %self.path.display(), ?patch, "Preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<QualityLevel> {
        vec![
            QualityLevel::new(0, Some(360)),
            QualityLevel::new(1, Some(720)),
            QualityLevel::new(2, Some(1080)),
        ]
    }

    #[test]
    fn test_quality_resolution_by_height_then_index() {
        let levels = levels();
        assert_eq!(HlsQualityPreference::Height(720).resolve(&levels), QualityChoice::Level(1));
        assert_eq!(HlsQualityPreference::Height(480).resolve(&levels), QualityChoice::Auto);
        assert_eq!(HlsQualityPreference::Index(2).resolve(&levels), QualityChoice::Level(2));
        assert_eq!(HlsQualityPreference::Index(7).resolve(&levels), QualityChoice::Auto);
        assert_eq!(HlsQualityPreference::Auto.resolve(&levels), QualityChoice::Auto);
    }

    #[test]
    fn test_quality_from_choice_prefers_label() {
        let levels = levels();
        assert_eq!(
            HlsQualityPreference::from_choice(QualityChoice::Level(2), &levels),
            HlsQualityPreference::Height(1080)
        );
        let unlabeled = vec![QualityLevel::new(0, None)];
        assert_eq!(
            HlsQualityPreference::from_choice(QualityChoice::Level(0), &unlabeled),
            HlsQualityPreference::Index(0)
        );
    }

    #[test]
    fn test_blob_wire_format() {
        let json = r#"{"volume":0.4,"muted":false,"playbackRate":1.5,"hlsQuality":"720p"}"#;
        let prefs: Preferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.volume, 0.4);
        assert_eq!(prefs.playback_rate, 1.5);
        assert_eq!(prefs.hls_quality, HlsQualityPreference::Height(720));

        let out = serde_json::to_value(prefs).unwrap();
        assert_eq!(out["hlsQuality"], "720p");
        assert_eq!(out["playbackRate"], 1.5);
    }

    #[test]
    fn test_partial_blob_uses_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"volume":0.2}"#).unwrap();
        assert_eq!(prefs.volume, 0.2);
        assert_eq!(prefs.playback_rate, 1.0);
        assert_eq!(prefs.hls_quality, HlsQualityPreference::Auto);
    }

    #[test]
    fn test_memory_store_merges_patches() {
        let store = MemoryPreferenceStore::new();
        assert!(store.load().is_none());

        store.save(PreferencesPatch::volume(0.3, false)).unwrap();
        store.save(PreferencesPatch::playback_rate(9.0)).unwrap();

        let prefs = store.load().unwrap();
        assert_eq!(prefs.volume, 0.3);
        assert_eq!(prefs.playback_rate, 3.0);
    }

    #[test]
    fn test_file_store_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = JsonFilePreferenceStore::new(&path);

        assert!(store.load().is_none());
        store.save(PreferencesPatch::hls_quality(HlsQualityPreference::Height(480))).unwrap();
        store.save(PreferencesPatch::muted(true)).unwrap();

        let prefs = store.load().unwrap();
        assert!(prefs.muted);
        assert_eq!(prefs.hls_quality, HlsQualityPreference::Height(480));

        std::fs::write(&path, "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_loaded_values_are_clamped() {
        let store = MemoryPreferenceStore::with_preferences(Preferences {
            volume: 4.0,
            muted: false,
            playback_rate: 0.0,
            hls_quality: HlsQualityPreference::Auto,
        });
        let prefs = store.load().unwrap();
        assert_eq!(prefs.volume, 1.0);
        assert_eq!(prefs.playback_rate, 0.25);
    }
}
