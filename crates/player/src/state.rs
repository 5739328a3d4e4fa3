//! Session state machine types
//!
//! The phase enum replaces the original's bag of booleans: playing
//! while a page turn is in progress is unrepresentable because both are
//! variants of the same enum.

use readalong_core::TurnDirection;
use std::time::Duration;

/// Composite playback phase of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderPhase {
    /// No book open (initial and closed state).
    Idle,
    /// Current page's image and/or narration still loading.
    Loading,
    /// Assets ready, waiting for the user (autoplay off).
    Ready,
    Playing,
    Paused,
    /// Page-turn transition in flight; commits after a fixed delay.
    Turning(TurnDirection),
    /// Terminal: past the last page. Exits are restart and close only.
    Complete,
}

impl ReaderPhase {
    pub fn is_playing(self) -> bool {
        self == ReaderPhase::Playing
    }

    pub fn is_turning(self) -> bool {
        matches!(self, ReaderPhase::Turning(_))
    }
}

/// Tunables for the session. Defaults match the shipped reader.
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    /// Visual page-turn duration; the page index commits when it ends.
    pub page_turn_delay: Duration,
    /// Minimum horizontal displacement for a swipe to count, in pixels.
    pub swipe_threshold: f32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_turn_delay: Duration::from_millis(300),
            swipe_threshold: 50.0,
        }
    }
}

/// Mutable session state guarded by the session's lock.
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub current_page: usize,
    pub phase: ReaderPhase,
    pub image_ready: bool,
    pub audio_ready: bool,
    pub narration_loading: bool,
    pub load_progress: u8,
    /// Manual play requested while narration was still being generated;
    /// playback starts as soon as it resolves.
    pub pending_play: bool,
}

impl SessionState {
    pub fn new(start_page: usize) -> Self {
        Self {
            current_page: start_page,
            phase: ReaderPhase::Idle,
            image_ready: false,
            audio_ready: false,
            narration_loading: false,
            load_progress: 0,
            pending_play: false,
        }
    }
}

/// Read-only view of the session for the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_page: usize,
    pub page_count: usize,
    pub phase: ReaderPhase,
    pub image_ready: bool,
    pub audio_ready: bool,
    pub narration_loading: bool,
    pub load_progress: u8,
    pub autoplay_enabled: bool,
    pub resume_enabled: bool,
}
