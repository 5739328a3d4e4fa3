//! Reader session
//!
//! Orchestrates one open book: page entry, narration requests and
//! next-page prefetch, the readiness gate for autoplay, page-turn
//! transitions, completion, and persisted resume state. Every failure
//! path degrades (fallback pages, image-only playback, defaults) —
//! nothing at this layer is fatal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

use readalong_core::{Page, ReaderSettings, TurnDirection};
use readalong_persistence::{KeyValueStore, ProgressStore, SettingsStore};
use readalong_pipeline::{NarrationCache, NarrationStatus, PageStore, SynthesisService};

use crate::gestures::SwipeTracker;
use crate::state::{ReaderConfig, ReaderPhase, SessionSnapshot, SessionState};

/// Events the UI shell renders and reacts to.
///
/// The shell owns the actual audio element: it starts playback on
/// `PlayAudio`, stops it on `StopAudio`, and reports the element's end
/// of stream back via [`ReaderSession::notify_audio_ended`].
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    PageChanged { page: usize },
    PhaseChanged { old: ReaderPhase, new: ReaderPhase },
    PlayAudio { url: String },
    StopAudio,
    NarrationProgress { page: usize, percent: u8 },
    /// Narration failed for the page; it plays image-only.
    NarrationUnavailable { page: usize },
    Completed,
    Closed,
}

pub struct ReaderSession {
    book_id: String,
    pages: Vec<Page>,
    config: ReaderConfig,
    state: RwLock<SessionState>,
    settings: RwLock<ReaderSettings>,
    settings_store: SettingsStore,
    progress: Arc<ProgressStore>,
    cache: Arc<NarrationCache>,
    event_tx: broadcast::Sender<ReaderEvent>,
    /// In-flight prefetch tasks keyed by page index. Aborted when the
    /// reader moves past the page; current-page requests are never
    /// tracked here and never cancelled.
    prefetch: Mutex<HashMap<usize, JoinHandle<()>>>,
    swipe: Mutex<SwipeTracker>,
}

impl ReaderSession {
    /// Open a book and enter its start page.
    ///
    /// Pages come from the page store (with its fallback), settings from
    /// durable storage, and — when resume is enabled — the start page
    /// from the book's saved progress.
    pub async fn open(
        book_id: impl Into<String>,
        page_store: &PageStore,
        synthesis: Arc<dyn SynthesisService>,
        kv: Arc<dyn KeyValueStore>,
        config: ReaderConfig,
    ) -> Arc<Self> {
        let book_id = book_id.into();
        let pages = page_store.load(&book_id).await;

        let settings_store = SettingsStore::new(kv.clone());
        let progress = Arc::new(ProgressStore::new(kv));
        let settings = settings_store.load().await;

        let start_page = if settings.resume_enabled {
            progress
                .load(&book_id)
                .await
                .filter(|&page| page < pages.len())
                .unwrap_or(0)
        } else {
            0
        };

        let (event_tx, _) = broadcast::channel(100);

        let session = Arc::new(Self {
            swipe: Mutex::new(SwipeTracker::new(config.swipe_threshold)),
            state: RwLock::new(SessionState::new(start_page)),
            settings: RwLock::new(settings),
            settings_store,
            progress,
            cache: Arc::new(NarrationCache::new(synthesis)),
            event_tx,
            prefetch: Mutex::new(HashMap::new()),
            book_id,
            pages,
            config,
        });

        tracing::info!(
            book_id = %session.book_id,
            pages = session.pages.len(),
            start_page,
            "reader session opened"
        );
        session.enter_page(start_page).await;
        session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.event_tx.subscribe()
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        let settings = *self.settings.read().await;
        SessionSnapshot {
            current_page: state.current_page,
            page_count: self.pages.len(),
            phase: state.phase,
            image_ready: state.image_ready,
            audio_ready: state.audio_ready,
            narration_loading: state.narration_loading,
            load_progress: state.load_progress,
            autoplay_enabled: settings.autoplay_enabled,
            resume_enabled: settings.resume_enabled,
        }
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    pub async fn next(self: &Arc<Self>) {
        self.navigate(TurnDirection::Next).await;
    }

    pub async fn prev(self: &Arc<Self>) {
        self.navigate(TurnDirection::Prev).await;
    }

    /// Play/pause toggle. With no narration cached for the current page
    /// this requests generation on demand and starts playback once it
    /// resolves; on failure the session stays paused.
    pub async fn toggle_play(self: &Arc<Self>) {
        enum Action {
            Pause,
            Start,
            Load(usize),
            Unavailable(usize),
            Ignore,
        }

        let action = {
            let mut state = self.state.write().await;
            match state.phase {
                ReaderPhase::Playing => Action::Pause,
                ReaderPhase::Turning(_) | ReaderPhase::Complete | ReaderPhase::Idle => {
                    Action::Ignore
                }
                _ => match self.cache.peek(state.current_page) {
                    Some(NarrationStatus::Ready(_)) => {
                        state.audio_ready = true;
                        Action::Start
                    }
                    Some(NarrationStatus::Failed) => Action::Unavailable(state.current_page),
                    None => {
                        state.pending_play = true;
                        state.narration_loading = true;
                        Action::Load(state.current_page)
                    }
                },
            }
        };

        match action {
            Action::Pause => self.pause().await,
            Action::Start => self.start_playback().await,
            Action::Load(page) => self.spawn_narration(page),
            Action::Unavailable(page) => self.emit(ReaderEvent::NarrationUnavailable { page }),
            Action::Ignore => {}
        }
    }

    /// Restart from the completion screen: back to page 0, assets
    /// reloading. Ignored in any other phase.
    pub async fn restart(self: &Arc<Self>) {
        {
            let state = self.state.read().await;
            if state.phase != ReaderPhase::Complete {
                return;
            }
        }
        self.enter_page(0).await;
        self.save_progress(0).await;
    }

    /// Close the reader: stop audio, drop in-flight prefetches, and —
    /// when resume is enabled — erase this book's progress record. A
    /// closed session keeps no resumable place.
    pub async fn close(&self) {
        let old = {
            let mut state = self.state.write().await;
            let old = state.phase;
            state.phase = ReaderPhase::Idle;
            state.pending_play = false;
            old
        };

        for (_, handle) in self.prefetch.lock().drain() {
            handle.abort();
        }

        if old.is_playing() {
            self.emit(ReaderEvent::StopAudio);
        }
        if old != ReaderPhase::Idle {
            self.emit(ReaderEvent::PhaseChanged {
                old,
                new: ReaderPhase::Idle,
            });
        }

        if self.settings.read().await.resume_enabled {
            if let Err(e) = self.progress.clear(&self.book_id).await {
                tracing::warn!(book_id = %self.book_id, error = %e, "progress erase failed");
            }
        }

        tracing::info!(book_id = %self.book_id, "reader session closed");
        self.emit(ReaderEvent::Closed);
    }

    pub async fn set_autoplay(self: &Arc<Self>, enabled: bool) {
        let settings = {
            let mut settings = self.settings.write().await;
            settings.autoplay_enabled = enabled;
            *settings
        };
        if let Err(e) = self.settings_store.save(settings).await {
            tracing::warn!(error = %e, "settings write failed");
        }

        if enabled {
            // The current page may never have requested narration while
            // autoplay was off.
            let page = {
                let mut state = self.state.write().await;
                if matches!(state.phase, ReaderPhase::Loading | ReaderPhase::Ready) {
                    state.narration_loading = !state.audio_ready;
                }
                state.current_page
            };
            if !self.cache.is_requested(page) {
                self.spawn_narration(page);
            }
            self.maybe_autostart().await;
        }
    }

    pub async fn set_resume(&self, enabled: bool) {
        let settings = {
            let mut settings = self.settings.write().await;
            settings.resume_enabled = enabled;
            *settings
        };
        if let Err(e) = self.settings_store.save(settings).await {
            tracing::warn!(error = %e, "settings write failed");
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    pub fn gesture_start(&self, x: f32) {
        self.swipe.lock().begin(x);
    }

    pub async fn gesture_end(self: &Arc<Self>, x: f32) {
        let direction = self.swipe.lock().end(x);
        if let Some(direction) = direction {
            self.navigate(direction).await;
        }
    }

    // ------------------------------------------------------------------
    // Shell notifications
    // ------------------------------------------------------------------

    /// The current page's image finished decoding.
    pub async fn notify_image_ready(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if matches!(
                state.phase,
                ReaderPhase::Turning(_) | ReaderPhase::Complete | ReaderPhase::Idle
            ) {
                return;
            }
            state.image_ready = true;
        }
        self.maybe_autostart().await;
    }

    /// The current page's image failed to decode. A missing asset must
    /// not block playback, so the page counts as ready anyway.
    pub async fn notify_image_failed(self: &Arc<Self>) {
        tracing::warn!("page image failed to load, treating as ready");
        self.notify_image_ready().await;
    }

    /// The shell's audio element reached the end of the narration.
    pub async fn notify_audio_ended(self: &Arc<Self>) {
        let autoplay = self.settings.read().await.autoplay_enabled;
        let (phase, page) = {
            let state = self.state.read().await;
            (state.phase, state.current_page)
        };
        if !phase.is_playing() {
            return;
        }

        if !autoplay {
            self.pause().await;
        } else if page + 1 >= self.pages.len() {
            self.complete().await;
        } else {
            // The sole automatic-advance path.
            self.navigate(TurnDirection::Next).await;
        }
    }

    // ------------------------------------------------------------------
    // Page entry and narration
    // ------------------------------------------------------------------

    /// Enter a page: reset readiness, request narration when autoplay
    /// is on, and prefetch the next page's narration behind it.
    async fn enter_page(self: &Arc<Self>, page: usize) {
        let autoplay = self.settings.read().await.autoplay_enabled;
        let old = {
            let mut state = self.state.write().await;
            let old = state.phase;
            state.current_page = page;
            state.phase = ReaderPhase::Loading;
            state.image_ready = false;
            state.audio_ready = false;
            state.pending_play = false;
            state.narration_loading = autoplay;
            state.load_progress = 0;
            old
        };

        if old != ReaderPhase::Loading {
            self.emit(ReaderEvent::PhaseChanged {
                old,
                new: ReaderPhase::Loading,
            });
        }
        self.emit(ReaderEvent::PageChanged { page });

        self.prune_prefetch(page);

        if autoplay {
            self.spawn_narration(page);
        }

        let next = page + 1;
        if next < self.pages.len() && !self.cache.is_requested(next) {
            self.spawn_prefetch(next);
        }
    }

    /// Request narration for a page the reader is on (or asked to play).
    /// Deliberately not tracked for cancellation: a page change while
    /// this is in flight leaves a resolved-but-unused slot in the cache.
    fn spawn_narration(self: &Arc<Self>, page: usize) {
        let Some(text) = self.pages.get(page).map(|p| p.text.clone()) else {
            return;
        };
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let (progress_tx, mut progress_rx) = watch::channel(0u8);

            let forwarder = {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    while progress_rx.changed().await.is_ok() {
                        let percent = *progress_rx.borrow();
                        session.on_narration_progress(page, percent).await;
                    }
                })
            };

            let status = session.cache.get_or_create(page, &text, Some(progress_tx)).await;
            let _ = forwarder.await;
            session.on_narration_resolved(page, status).await;
        });
    }

    /// Prefetch narration for an upcoming page. Tracked so it can be
    /// aborted if the reader moves past the page before it resolves.
    fn spawn_prefetch(self: &Arc<Self>, page: usize) {
        let Some(text) = self.pages.get(page).map(|p| p.text.clone()) else {
            return;
        };
        let cache = Arc::clone(&self.cache);
        let handle = tokio::spawn(async move {
            cache.get_or_create(page, &text, None).await;
        });
        self.prefetch.lock().insert(page, handle);
    }

    /// Drop finished prefetch tasks and abort those for pages the
    /// reader has already moved past.
    fn prune_prefetch(&self, current: usize) {
        let mut tasks = self.prefetch.lock();
        tasks.retain(|&page, handle| {
            if handle.is_finished() {
                return false;
            }
            if page < current {
                tracing::debug!(page, "cancelling stale prefetch");
                handle.abort();
                return false;
            }
            true
        });
    }

    async fn on_narration_progress(&self, page: usize, percent: u8) {
        {
            let mut state = self.state.write().await;
            if state.current_page != page {
                return;
            }
            state.load_progress = percent;
        }
        self.emit(ReaderEvent::NarrationProgress { page, percent });
    }

    async fn on_narration_resolved(self: &Arc<Self>, page: usize, status: NarrationStatus) {
        enum Outcome {
            Stale,
            Ready,
            Failed { old: Option<ReaderPhase> },
        }

        let outcome = {
            let mut state = self.state.write().await;
            if state.current_page != page {
                // Stale resolution; the slot stays cached for a return visit.
                Outcome::Stale
            } else {
                state.narration_loading = false;
                match status {
                    NarrationStatus::Ready(_) => {
                        state.audio_ready = true;
                        Outcome::Ready
                    }
                    NarrationStatus::Failed => {
                        state.pending_play = false;
                        let old = if matches!(state.phase, ReaderPhase::Loading | ReaderPhase::Ready)
                        {
                            let old = state.phase;
                            state.phase = ReaderPhase::Paused;
                            Some(old)
                        } else {
                            None
                        };
                        Outcome::Failed { old }
                    }
                }
            }
        };

        match outcome {
            Outcome::Stale => {}
            Outcome::Ready => self.maybe_autostart().await,
            Outcome::Failed { old } => {
                if let Some(old) = old {
                    self.emit(ReaderEvent::PhaseChanged {
                        old,
                        new: ReaderPhase::Paused,
                    });
                }
                self.emit(ReaderEvent::NarrationUnavailable { page });
            }
        }
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Start playback when the gate allows it: narration resolved and
    /// either a pending manual play, or autoplay with the image also
    /// ready on a still-loading page.
    async fn maybe_autostart(self: &Arc<Self>) {
        enum Action {
            Start,
            MarkReady,
            None,
        }

        let autoplay = self.settings.read().await.autoplay_enabled;
        let action = {
            let mut state = self.state.write().await;
            if state.audio_ready
                && (state.pending_play
                    || (autoplay && state.image_ready && state.phase == ReaderPhase::Loading))
            {
                Action::Start
            } else if state.image_ready
                && state.audio_ready
                && !autoplay
                && state.phase == ReaderPhase::Loading
            {
                state.phase = ReaderPhase::Ready;
                Action::MarkReady
            } else {
                Action::None
            }
        };

        match action {
            Action::Start => self.start_playback().await,
            Action::MarkReady => self.emit(ReaderEvent::PhaseChanged {
                old: ReaderPhase::Loading,
                new: ReaderPhase::Ready,
            }),
            Action::None => {}
        }
    }

    async fn start_playback(self: &Arc<Self>) {
        let started = {
            let mut state = self.state.write().await;
            if state.phase.is_turning()
                || matches!(state.phase, ReaderPhase::Complete | ReaderPhase::Idle)
            {
                None
            } else {
                match self.cache.peek(state.current_page) {
                    Some(NarrationStatus::Ready(url)) => {
                        let old = state.phase;
                        state.phase = ReaderPhase::Playing;
                        state.pending_play = false;
                        Some((old, url))
                    }
                    _ => None,
                }
            }
        };

        if let Some((old, url)) = started {
            if old != ReaderPhase::Playing {
                self.emit(ReaderEvent::PhaseChanged {
                    old,
                    new: ReaderPhase::Playing,
                });
            }
            self.emit(ReaderEvent::PlayAudio { url });
        }
    }

    async fn pause(&self) {
        let old = {
            let mut state = self.state.write().await;
            if !state.phase.is_playing() {
                return;
            }
            state.phase = ReaderPhase::Paused;
            state.pending_play = false;
            ReaderPhase::Playing
        };
        self.emit(ReaderEvent::StopAudio);
        self.emit(ReaderEvent::PhaseChanged {
            old,
            new: ReaderPhase::Paused,
        });
    }

    // ------------------------------------------------------------------
    // Navigation and completion
    // ------------------------------------------------------------------

    async fn navigate(self: &Arc<Self>, direction: TurnDirection) {
        enum Nav {
            Ignore,
            Complete { stop_audio: bool },
            Turn,
        }

        let nav = {
            let state = self.state.read().await;
            match state.phase {
                ReaderPhase::Turning(_) | ReaderPhase::Complete | ReaderPhase::Idle => Nav::Ignore,
                _ => match direction {
                    // Backward before the first page is a no-op.
                    TurnDirection::Prev if state.current_page == 0 => Nav::Ignore,
                    TurnDirection::Next if state.current_page + 1 >= self.pages.len() => {
                        Nav::Complete {
                            stop_audio: state.phase.is_playing(),
                        }
                    }
                    _ => Nav::Turn,
                },
            }
        };

        match nav {
            Nav::Ignore => {}
            Nav::Complete { stop_audio } => {
                if stop_audio {
                    self.emit(ReaderEvent::StopAudio);
                }
                self.complete().await;
            }
            Nav::Turn => self.begin_turn(direction).await,
        }
    }

    /// Stop any playing audio, show the turn transition, and commit the
    /// page change after the fixed delay. Navigation input arriving
    /// while a turn is in flight is ignored.
    async fn begin_turn(self: &Arc<Self>, direction: TurnDirection) {
        let (old, stop_audio) = {
            let mut state = self.state.write().await;
            if state.phase.is_turning()
                || matches!(state.phase, ReaderPhase::Complete | ReaderPhase::Idle)
            {
                return;
            }
            let old = state.phase;
            state.phase = ReaderPhase::Turning(direction);
            state.pending_play = false;
            (old, old.is_playing())
        };

        if stop_audio {
            self.emit(ReaderEvent::StopAudio);
        }
        self.emit(ReaderEvent::PhaseChanged {
            old,
            new: ReaderPhase::Turning(direction),
        });

        let session = Arc::clone(self);
        let delay = self.config.page_turn_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.commit_turn(direction).await;
        });
    }

    async fn commit_turn(self: &Arc<Self>, direction: TurnDirection) {
        let new_page = {
            let state = self.state.read().await;
            // The session may have been closed mid-turn.
            if state.phase != ReaderPhase::Turning(direction) {
                return;
            }
            match direction {
                TurnDirection::Next => state.current_page + 1,
                TurnDirection::Prev => state.current_page.saturating_sub(1),
            }
        };

        self.enter_page(new_page).await;
        self.save_progress(new_page).await;
    }

    async fn complete(&self) {
        let old = {
            let mut state = self.state.write().await;
            if state.phase == ReaderPhase::Complete {
                return;
            }
            let old = state.phase;
            state.phase = ReaderPhase::Complete;
            state.pending_play = false;
            old
        };
        tracing::info!(book_id = %self.book_id, "book finished");
        self.emit(ReaderEvent::PhaseChanged {
            old,
            new: ReaderPhase::Complete,
        });
        self.emit(ReaderEvent::Completed);
    }

    /// Fire-and-forget progress write on a committed page change.
    async fn save_progress(self: &Arc<Self>, page: usize) {
        if !self.settings.read().await.resume_enabled {
            return;
        }
        let progress = Arc::clone(&self.progress);
        let book_id = self.book_id.clone();
        tokio::spawn(async move {
            if let Err(e) = progress.save(&book_id, page).await {
                tracing::warn!(book_id = %book_id, page, error = %e, "progress write failed");
            }
        });
    }

    fn emit(&self, event: ReaderEvent) {
        // No receivers is fine; the shell may not have subscribed yet.
        let _ = self.event_tx.send(event);
    }
}
