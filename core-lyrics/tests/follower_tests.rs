//! The lyrics follower reacting to playback events on a shared bus.

use core_lyrics::{spawn_lyrics_follower, LyricsSource, LyricsSynchronizer};
use core_runtime::events::{CoreEvent, EventBus, LyricsEvent, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const LRC: &str = "[ti:Demo]\n[00:01.00]First\n[00:03.00]Second\n[00:05.00]Third";

fn source() -> Arc<dyn LyricsSource> {
    Arc::new(|id: &str| match id {
        "timed" => Some(LRC.to_string()),
        "plain" => Some("no timestamps here".to_string()),
        _ => None,
    })
}

fn playback(bus: &EventBus, event: PlaybackEvent) {
    bus.emit(CoreEvent::Playback(event)).unwrap();
}

fn position(track_id: &str, position_ms: u64) -> PlaybackEvent {
    PlaybackEvent::PositionChanged {
        track_id: track_id.to_string(),
        position_ms,
        duration_ms: 10_000,
    }
}

async fn next_lyrics_event(rx: &mut broadcast::Receiver<CoreEvent>) -> LyricsEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for lyrics event")
            .unwrap();
        if let CoreEvent::Lyrics(event) = event {
            return event;
        }
    }
}

#[tokio::test]
async fn follows_started_and_position_events() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let sync = Arc::new(Mutex::new(LyricsSynchronizer::new()));
    let follower = spawn_lyrics_follower(&bus, sync.clone(), source());

    playback(
        &bus,
        PlaybackEvent::Started {
            track_id: "timed".into(),
            title: "Demo".into(),
        },
    );
    playback(&bus, position("timed", 500));
    playback(&bus, position("timed", 1_200));
    playback(&bus, position("timed", 1_900));
    playback(&bus, position("someone-else", 4_000));
    playback(&bus, position("timed", 3_000));

    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::Loaded {
            track_id: Some("timed".into()),
            line_count: 3,
            timed: true,
        }
    );
    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::ActiveLineChanged {
            track_id: Some("timed".into()),
            index: Some(0),
        }
    );
    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::ActiveLineChanged {
            track_id: Some("timed".into()),
            index: Some(1),
        }
    );
    assert_eq!(sync.lock().active(), Some(1));

    follower.abort();
}

#[tokio::test]
async fn untimed_and_missing_lyrics() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let sync = Arc::new(Mutex::new(LyricsSynchronizer::new()));
    let follower = spawn_lyrics_follower(&bus, sync.clone(), source());

    playback(
        &bus,
        PlaybackEvent::Started {
            track_id: "plain".into(),
            title: "Plain".into(),
        },
    );
    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::Loaded {
            track_id: Some("plain".into()),
            line_count: 1,
            timed: false,
        }
    );

    playback(
        &bus,
        PlaybackEvent::Started {
            track_id: "unknown".into(),
            title: "Unknown".into(),
        },
    );
    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::Loaded {
            track_id: Some("unknown".into()),
            line_count: 0,
            timed: false,
        }
    );

    playback(&bus, PlaybackEvent::Stopped { track_id: None });
    assert_eq!(
        next_lyrics_event(&mut rx).await,
        LyricsEvent::Loaded {
            track_id: None,
            line_count: 0,
            timed: false,
        }
    );
    assert!(sync.lock().track_id().is_none());

    follower.abort();
}
