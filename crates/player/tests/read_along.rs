//! End-to-end reader session scenarios.
//!
//! The test body plays the role of the UI shell: it subscribes to the
//! event stream, answers `PageChanged` with an image-decoded
//! notification, and answers `PlayAudio` with an end-of-audio
//! notification, so a full book can play through unattended.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use readalong_core::{Page, ReaderSettings, TurnDirection};
use readalong_persistence::{MemoryStore, ProgressStore, SettingsStore};
use readalong_pipeline::{
    CatalogService, PageStore, PipelineError, SynthesisResponse, SynthesisService,
};
use readalong_player::{ReaderConfig, ReaderEvent, ReaderPhase, ReaderSession};

struct StaticCatalog(Vec<Page>);

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn pages(&self, _book_id: &str) -> Result<Vec<Page>, PipelineError> {
        Ok(self.0.clone())
    }
}

/// Synthesizes instantly, counting calls; fails for one configured text.
struct ScriptedSynthesis {
    calls: AtomicUsize,
    fail_text: Option<String>,
}

impl ScriptedSynthesis {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_text: None,
        }
    }

    fn failing_on(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_text: Some(text.to_string()),
        }
    }
}

#[async_trait]
impl SynthesisService for ScriptedSynthesis {
    async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_text.as_deref() == Some(text) {
            return Err(PipelineError::Synthesis("voice service unavailable".into()));
        }
        Ok(SynthesisResponse {
            audio_url: format!("https://cdn/audio/{}.mp3", text),
            voice_id: Some("nursery-voice".into()),
        })
    }
}

fn story(pages: usize) -> Vec<Page> {
    (0..pages)
        .map(|i| Page::new(i, format!("page-{}", i), format!("https://cdn/p{}.jpg", i)))
        .collect()
}

fn fast_config() -> ReaderConfig {
    ReaderConfig {
        page_turn_delay: Duration::from_millis(5),
        ..ReaderConfig::default()
    }
}

async fn open_reader(
    pages: usize,
    synthesis: Arc<ScriptedSynthesis>,
    settings: ReaderSettings,
    kv: Arc<MemoryStore>,
    config: ReaderConfig,
) -> Arc<ReaderSession> {
    SettingsStore::new(kv.clone()).save(settings).await.unwrap();
    let store = PageStore::new(Arc::new(StaticCatalog(story(pages))));
    ReaderSession::open("book-1", &store, synthesis, kv, config).await
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<ReaderEvent>) -> ReaderEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no event within 2s")
        .expect("event channel closed")
}

#[tokio::test]
async fn full_book_plays_through_unattended() {
    let synthesis = Arc::new(ScriptedSynthesis::new());
    let settings = ReaderSettings {
        autoplay_enabled: true,
        resume_enabled: false,
    };
    let session = open_reader(
        5,
        synthesis.clone(),
        settings,
        Arc::new(MemoryStore::new()),
        fast_config(),
    )
    .await;

    let mut rx = session.subscribe();
    session.notify_image_ready().await;

    let mut visited = Vec::new();
    loop {
        match next_event(&mut rx).await {
            ReaderEvent::PageChanged { page } => {
                visited.push(page);
                session.notify_image_ready().await;
            }
            ReaderEvent::PlayAudio { .. } => {
                session.notify_audio_ended().await;
            }
            ReaderEvent::Completed => break,
            _ => {}
        }
    }

    assert_eq!(visited, vec![1, 2, 3, 4]);
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.phase, ReaderPhase::Complete);
    assert_eq!(snapshot.current_page, 4);
    // One synthesis call per page, prefetch included.
    assert_eq!(synthesis.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn narration_failure_pauses_image_only_and_manual_turn_recovers() {
    let synthesis = Arc::new(ScriptedSynthesis::failing_on("page-2"));
    let settings = ReaderSettings {
        autoplay_enabled: true,
        resume_enabled: false,
    };
    let session = open_reader(
        4,
        synthesis.clone(),
        settings,
        Arc::new(MemoryStore::new()),
        fast_config(),
    )
    .await;

    let mut rx = session.subscribe();
    session.notify_image_ready().await;

    loop {
        match next_event(&mut rx).await {
            ReaderEvent::PageChanged { .. } => session.notify_image_ready().await,
            ReaderEvent::PlayAudio { .. } => session.notify_audio_ended().await,
            ReaderEvent::NarrationUnavailable { page } => {
                assert_eq!(page, 2);
                break;
            }
            ReaderEvent::Completed => panic!("book completed past the broken page"),
            _ => {}
        }
    }

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.current_page, 2);
    assert_eq!(snapshot.phase, ReaderPhase::Paused);
    assert!(!snapshot.audio_ready);
    assert!(!snapshot.narration_loading);

    // The stuck page is left manually; the next page narrates again.
    session.next().await;
    loop {
        match next_event(&mut rx).await {
            ReaderEvent::PageChanged { page } => {
                assert_eq!(page, 3);
                session.notify_image_ready().await;
            }
            ReaderEvent::PlayAudio { url } => {
                assert!(url.contains("page-3"));
                break;
            }
            _ => {}
        }
    }
    assert_eq!(session.snapshot().await.current_page, 3);
}

#[tokio::test]
async fn swipe_during_playback_stops_audio_then_commits_turn() {
    let synthesis = Arc::new(ScriptedSynthesis::new());
    let settings = ReaderSettings {
        autoplay_enabled: true,
        resume_enabled: false,
    };
    let config = ReaderConfig {
        page_turn_delay: Duration::from_millis(40),
        ..ReaderConfig::default()
    };
    let session = open_reader(
        3,
        synthesis,
        settings,
        Arc::new(MemoryStore::new()),
        config,
    )
    .await;

    let mut rx = session.subscribe();
    session.notify_image_ready().await;
    loop {
        if let ReaderEvent::PlayAudio { .. } = next_event(&mut rx).await {
            break;
        }
    }

    // Left swipe past the threshold while narration is playing.
    session.gesture_start(200.0);
    session.gesture_end(120.0).await;

    loop {
        if let ReaderEvent::StopAudio = next_event(&mut rx).await {
            break;
        }
    }
    assert_eq!(
        session.snapshot().await.phase,
        ReaderPhase::Turning(TurnDirection::Next)
    );

    loop {
        if let ReaderEvent::PageChanged { page } = next_event(&mut rx).await {
            assert_eq!(page, 1);
            break;
        }
    }
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.current_page, 1);
    assert!(!snapshot.phase.is_playing());
}

#[tokio::test]
async fn sub_threshold_swipe_does_not_turn() {
    let synthesis = Arc::new(ScriptedSynthesis::new());
    let settings = ReaderSettings {
        autoplay_enabled: false,
        resume_enabled: false,
    };
    let session = open_reader(
        3,
        synthesis,
        settings,
        Arc::new(MemoryStore::new()),
        fast_config(),
    )
    .await;

    session.gesture_start(200.0);
    session.gesture_end(180.0).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(session.snapshot().await.current_page, 0);
}

#[tokio::test]
async fn reopening_resumes_at_last_read_page() {
    let kv = Arc::new(MemoryStore::new());
    let settings = ReaderSettings {
        autoplay_enabled: false,
        resume_enabled: true,
    };
    let session = open_reader(
        5,
        Arc::new(ScriptedSynthesis::new()),
        settings,
        kv.clone(),
        fast_config(),
    )
    .await;

    session.next().await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(session.snapshot().await.current_page, 1);
    // Dropped without close: the progress record stays.
    drop(session);

    let reopened = open_reader(
        5,
        Arc::new(ScriptedSynthesis::new()),
        settings,
        kv.clone(),
        fast_config(),
    )
    .await;
    assert_eq!(reopened.snapshot().await.current_page, 1);
}

#[tokio::test]
async fn resume_disabled_always_starts_at_first_page() {
    let kv = Arc::new(MemoryStore::new());
    ProgressStore::new(kv.clone()).save("book-1", 3).await.unwrap();

    let settings = ReaderSettings {
        autoplay_enabled: false,
        resume_enabled: false,
    };
    let session = open_reader(
        5,
        Arc::new(ScriptedSynthesis::new()),
        settings,
        kv,
        fast_config(),
    )
    .await;
    assert_eq!(session.snapshot().await.current_page, 0);
}

#[tokio::test]
async fn out_of_range_progress_record_is_ignored() {
    let kv = Arc::new(MemoryStore::new());
    ProgressStore::new(kv.clone()).save("book-1", 10).await.unwrap();

    let settings = ReaderSettings {
        autoplay_enabled: false,
        resume_enabled: true,
    };
    let session = open_reader(
        3,
        Arc::new(ScriptedSynthesis::new()),
        settings,
        kv,
        fast_config(),
    )
    .await;
    assert_eq!(session.snapshot().await.current_page, 0);
}

#[tokio::test]
async fn autoplay_off_waits_for_manual_play() {
    let synthesis = Arc::new(ScriptedSynthesis::new());
    let settings = ReaderSettings {
        autoplay_enabled: false,
        resume_enabled: false,
    };
    let session = open_reader(
        3,
        synthesis.clone(),
        settings,
        Arc::new(MemoryStore::new()),
        fast_config(),
    )
    .await;

    // With autoplay off the current page requests nothing on entry;
    // the first press generates on demand and then plays.
    session.notify_image_ready().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.phase, ReaderPhase::Loading);
    assert!(!snapshot.audio_ready);

    let mut rx = session.subscribe();
    session.toggle_play().await;
    loop {
        if let ReaderEvent::PlayAudio { url } = next_event(&mut rx).await {
            assert!(url.contains("page-0"));
            break;
        }
    }
    assert_eq!(session.snapshot().await.phase, ReaderPhase::Playing);

    // Audio ending with autoplay off pauses instead of advancing.
    session.notify_audio_ended().await;
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.phase, ReaderPhase::Paused);
    assert_eq!(snapshot.current_page, 0);
}

#[tokio::test]
async fn completion_restart_returns_to_first_page() {
    let synthesis = Arc::new(ScriptedSynthesis::new());
    let settings = ReaderSettings {
        autoplay_enabled: true,
        resume_enabled: false,
    };
    let session = open_reader(
        2,
        synthesis,
        settings,
        Arc::new(MemoryStore::new()),
        fast_config(),
    )
    .await;

    let mut rx = session.subscribe();
    session.notify_image_ready().await;
    loop {
        match next_event(&mut rx).await {
            ReaderEvent::PageChanged { .. } => session.notify_image_ready().await,
            ReaderEvent::PlayAudio { .. } => session.notify_audio_ended().await,
            ReaderEvent::Completed => break,
            _ => {}
        }
    }

    // Input other than restart/close is ignored on the completion screen.
    session.next().await;
    session.toggle_play().await;
    assert_eq!(session.snapshot().await.phase, ReaderPhase::Complete);

    session.restart().await;
    loop {
        if let ReaderEvent::PageChanged { page } = next_event(&mut rx).await {
            assert_eq!(page, 0);
            break;
        }
    }
    assert_eq!(session.snapshot().await.current_page, 0);
}
