//! Playlist driver
//!
//! The playlist blob is supplied by whoever opened the player. The driver
//! only moves `currentIndex`; the list itself is never modified. Entries are
//! re-classified from their raw URL every time they are selected.

use crate::{classify::classify, types::MediaReference};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A playlist entry: a previously classified reference or a bare URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaylistItem {
    Reference(MediaReference),
    Raw(String),
}

impl PlaylistItem {
    pub fn raw_url(&self) -> &str {
        match self {
            PlaylistItem::Reference(reference) => reference.raw_url(),
            PlaylistItem::Raw(url) => url,
        }
    }
}

/// `{list, currentIndex, poster?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistContext {
    pub list: Vec<PlaylistItem>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

impl PlaylistContext {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Advances through a [`PlaylistContext`]
#[derive(Debug)]
pub struct PlaylistDriver {
    context: PlaylistContext,
    /// Mount generation of the entry currently playing
    mounted: Option<u64>,
    /// Generation whose end has already advanced the playlist
    advanced_for: Option<u64>,
}

impl PlaylistDriver {
    pub fn new(mut context: PlaylistContext) -> Self {
        if context.current_index >= context.list.len() {
            context.current_index = 0;
        }
        Self {
            context,
            mounted: None,
            advanced_for: None,
        }
    }

    pub fn context(&self) -> &PlaylistContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.context.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.list.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.context.current_index
    }

    pub fn poster(&self) -> Option<&str> {
        self.context.poster.as_deref()
    }

    pub fn has_next(&self) -> bool {
        self.context.current_index + 1 < self.context.list.len()
    }

    pub fn has_previous(&self) -> bool {
        self.context.current_index > 0 && !self.is_empty()
    }

    /// Freshly classified reference for the current entry
    pub fn current(&self) -> Option<MediaReference> {
        self.context
            .list
            .get(self.context.current_index)
            .map(|item| classify(item.raw_url()))
    }

    /// Record that the current entry has been mounted under `generation`
    pub fn mark_mounted(&mut self, generation: u64) {
        self.mounted = Some(generation);
    }

    pub fn go_to(&mut self, index: usize) -> Option<MediaReference> {
        if index >= self.context.list.len() {
            return None;
        }
        self.context.current_index = index;
        debug!(index, "Playlist position changed");
        self.current()
    }

    pub fn next(&mut self) -> Option<MediaReference> {
        if !self.has_next() {
            return None;
        }
        self.go_to(self.context.current_index + 1)
    }

    pub fn previous(&mut self) -> Option<MediaReference> {
        if !self.has_previous() {
            return None;
        }
        self.go_to(self.context.current_index - 1)
    }

    /// Auto-advance after the surface mounted under `generation` ended.
    /// Fires at most once per generation, and never for a stale one.
    pub fn on_ended(&mut self, generation: u64) -> Option<MediaReference> {
        if self.mounted != Some(generation) || self.advanced_for == Some(generation) {
            debug!(generation, "Ignoring duplicate or stale end of playback");
            return None;
        }
        self.advanced_for = Some(generation);
        let next = self.next();
        match &next {
            Some(reference) => info!(
                index = self.context.current_index,
                kind = %reference.kind(),
                "Advancing playlist"
            ),
            None => info!("Playlist finished"),
        }
        next
    }
}
