//! The control surface shared by the native engine and embed adapters

use crate::types::PlaybackState;
use serde::Serialize;
use std::time::Instant;

/// Notifications raised by a mounted surface or by the player host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerSignal {
    /// Content finished; raised once per end of playback
    Ended,
    /// Unified error signal; the surface is unusable until retried
    Error { message: String },
    /// Autoplay did not start, a user gesture is required
    ManualPlayNeeded,
    /// A Streamtape link resolved to a direct media URL
    Resolved { url: String },
    /// Resolution failed or was skipped; the vendor embed is shown instead
    FallbackEmbed { embed_url: String, reason: String },
    /// The reference cannot be played by any surface
    NotPlayable { message: String },
}

/// One consistent control surface over every kind of mounted player
pub trait PlaybackSurface: Send {
    fn state(&self) -> &PlaybackState;

    fn toggle_play(&mut self, now: Instant);

    /// Relative seek; returns false when the surface cannot seek
    fn skip(&mut self, seconds: f64, now: Instant) -> bool;

    /// Returns the rate actually applied
    fn set_rate(&mut self, rate: f64) -> f64;

    /// Returns the new mute state, or `None` when audio belongs to the
    /// vendor page
    fn toggle_mute(&mut self) -> Option<bool>;

    /// Returns the new fullscreen state, or `None` when the host must
    /// fullscreen its own container
    fn toggle_fullscreen(&mut self) -> Option<bool> {
        None
    }

    /// Drain pending signals
    fn take_signals(&mut self) -> Vec<PlayerSignal>;

    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    fn tick(&mut self, _now: Instant) {}

    /// Release every resource; must be idempotent
    fn teardown(&mut self);
}
