// ==========================================
// AUDIO PLAYBACK ENGINE
// ==========================================
// This module wraps rodio in a small "media list player":
// - Holds the list of stream URLs the queue manager primed it with
// - Knows which item is loaded (by index)
// - Plays, pauses, resumes, jumps, steps next/previous
// - Tells the queue manager when an item finished, via EngineEvent
//
// The queue manager only ever sees the PlaybackEngine trait, so tests
// can swap in a fake engine without an audio device.

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::{EngineError, ValidationError};

// How often the monitor thread checks for a drained sink
const POLL_INTERVAL: Duration = Duration::from_millis(250);

// A sink can look empty for a moment while a source is being appended.
// Anything shorter than this is not treated as "finished".
const MIN_PLAY_TIME: Duration = Duration::from_secs(2);

// Upper bound on downloading one audio stream
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

// ==========================================
// VOLUME
// ==========================================
// 0 (mute) to 100 (max). Only constructible in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (0..=100).contains(&value) {
            Ok(Volume(value as u8))
        } else {
            Err(ValidationError::VolumeOutOfRange(value))
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    // rodio wants 0.0-1.0
    fn as_gain(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

// One entry in the engine's media list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub stream_url: String,
}

// Pushed from the engine to the queue manager, independent of any command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    TrackEnded { index: usize },
    LoadFailed { index: usize, reason: String },
}

// ==========================================
// PLAYBACK ENGINE TRAIT
// ==========================================
// The adapter boundary. Calls are synchronous and quick: anything slow
// (fetching and decoding) happens on the engine's own threads.
pub trait PlaybackEngine: Send + Sync {
    // Replace the media list. The loaded index is kept if still in range.
    fn set_media_list(&self, items: Vec<MediaItem>);

    // Resume if paused, reload the loaded item if stopped, else start at 0
    fn play(&self) -> Result<(), EngineError>;

    fn play_item_at_index(&self, index: usize) -> Result<(), EngineError>;

    fn pause(&self);

    fn resume(&self);

    fn stop(&self);

    // Err(NoNextItem) when the loaded item is the last one
    fn next(&self) -> Result<(), EngineError>;

    // Err(NoPreviousItem) when the loaded item is the first one
    fn previous(&self) -> Result<(), EngineError>;

    fn is_playing(&self) -> bool;

    // Position of the loaded item in the media list
    fn loaded_index(&self) -> Option<usize>;

    fn set_volume(&self, volume: Volume);

    fn volume(&self) -> Volume;
}

// ==========================================
// PLAYER STATE ENUM
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped, // Nothing loaded, or playback ended/stopped
    Loading, // Fetching and decoding the stream (transitional)
    Playing, // Audio is coming out of the speakers
    Paused,  // Loaded but held
}

// Everything behind the player's mutex
struct PlayerInner {
    sink: Option<Sink>,
    media: Vec<MediaItem>,
    loaded: Option<usize>,
    state: PlayerState,
    volume: Volume,
    start_time: Option<Instant>,
    // Bumped on every load/stop so a slow fetch can't clobber a newer one
    generation: u64,
}

impl PlayerInner {
    // Same guards as a plain "sink is empty" check, minus the false
    // positives while a track is loading or paused
    fn is_finished(&self) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        if !sink.empty() || self.state != PlayerState::Playing {
            return false;
        }
        self.start_time
            .map(|start| start.elapsed() >= MIN_PLAY_TIME)
            .unwrap_or(false)
    }
}

// ==========================================
// AUDIO PLAYER STRUCT
// ==========================================
pub struct AudioPlayer {
    inner: Arc<Mutex<PlayerInner>>,
    events: UnboundedSender<EngineEvent>,
}

impl AudioPlayer {
    // Opens the default output device and starts the end-of-track monitor.
    // On a headless host there is no sink: the player still works as a
    // media list, but every load fails with NoOutputDevice.
    pub fn new(volume: Volume, events: UnboundedSender<EngineEvent>) -> Self {
        let sink = match OutputStream::try_default() {
            Ok((stream, handle)) => match Sink::try_new(&handle) {
                Ok(sink) => {
                    // The stream must outlive every sink; leak it for the
                    // life of the process
                    std::mem::forget(stream);
                    sink.set_volume(volume.as_gain());
                    Some(sink)
                }
                Err(e) => {
                    warn!("Failed to create audio sink: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("No audio output device: {}", e);
                None
            }
        };

        let inner = Arc::new(Mutex::new(PlayerInner {
            sink,
            media: Vec::new(),
            loaded: None,
            state: PlayerState::Stopped,
            volume,
            start_time: None,
            generation: 0,
        }));

        Self::spawn_monitor(Arc::downgrade(&inner), events.clone());

        AudioPlayer { inner, events }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        lock_inner(&self.inner)
    }

    pub fn state(&self) -> PlayerState {
        self.lock().state
    }

    // Watches for a drained sink. Exits once the player is dropped or
    // nobody listens for events any more.
    fn spawn_monitor(inner: Weak<Mutex<PlayerInner>>, events: UnboundedSender<EngineEvent>) {
        thread::spawn(move || loop {
            thread::sleep(POLL_INTERVAL);
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let ended = {
                let mut guard = lock_inner(&inner);
                if guard.is_finished() {
                    guard.state = PlayerState::Stopped;
                    guard.start_time = None;
                    guard.loaded
                } else {
                    None
                }
            };
            if let Some(index) = ended {
                debug!("Media item {} reached its end", index);
                if events.send(EngineEvent::TrackEnded { index }).is_err() {
                    break;
                }
            }
        });
    }

    // Marks `index` as loaded and fetches it in the background
    fn load(&self, index: usize) -> Result<(), EngineError> {
        let mut guard = self.lock();
        let item = guard
            .media
            .get(index)
            .cloned()
            .ok_or(EngineError::IndexOutOfRange {
                index,
                len: guard.media.len(),
            })?;

        let Some(sink) = &guard.sink else {
            return Err(EngineError::NoOutputDevice);
        };
        sink.stop();

        guard.generation += 1;
        guard.loaded = Some(index);
        guard.state = PlayerState::Loading;
        guard.start_time = None;
        let generation = guard.generation;
        drop(guard);

        info!("Loading media item {} ({})", index, item.id);

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        thread::spawn(move || {
            let decoded = fetch_stream(&item.stream_url);

            let mut guard = lock_inner(&inner);
            if guard.generation != generation {
                debug!("Discarding superseded load of media item {}", index);
                return;
            }

            match decoded {
                Ok(decoder) => {
                    let player = &mut *guard;
                    if let Some(sink) = &player.sink {
                        sink.append(decoder);
                        // A pause issued while loading stays in effect
                        if player.state == PlayerState::Loading {
                            sink.play();
                            player.state = PlayerState::Playing;
                        }
                        player.start_time = Some(Instant::now());
                    }
                }
                Err(reason) => {
                    warn!("Failed to load media item {}: {}", index, reason);
                    guard.state = PlayerState::Stopped;
                    drop(guard);
                    let _ = events.send(EngineEvent::LoadFailed { index, reason });
                }
            }
        });

        Ok(())
    }
}

fn lock_inner(inner: &Mutex<PlayerInner>) -> MutexGuard<'_, PlayerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

// Downloads the whole stream and hands it to rodio's decoder.
// YouTube audio streams are a few MB, so buffering in memory is fine.
// Runs on a loader thread: the blocking client must never live on the
// async runtime.
fn fetch_stream(url: &str) -> Result<Decoder<Cursor<Vec<u8>>>, String> {
    if url.is_empty() {
        return Err("media item has no stream URL".to_string());
    }

    let http = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
    let bytes = http
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(|e| format!("Failed to fetch audio stream: {}", e))?;

    Decoder::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| format!("Audio decode failed: {}", e))
}

impl PlaybackEngine for AudioPlayer {
    fn set_media_list(&self, items: Vec<MediaItem>) {
        let mut guard = self.lock();
        guard.media = items;
        if guard.loaded.is_some_and(|index| index >= guard.media.len()) {
            guard.loaded = None;
        }
        debug!("Media list primed with {} items", guard.media.len());
    }

    fn play(&self) -> Result<(), EngineError> {
        let (state, loaded, empty) = {
            let guard = self.lock();
            (guard.state, guard.loaded, guard.media.is_empty())
        };
        if empty {
            return Err(EngineError::EmptyMediaList);
        }
        match (state, loaded) {
            (PlayerState::Paused, Some(_)) => {
                self.resume();
                Ok(())
            }
            (PlayerState::Playing | PlayerState::Loading, Some(_)) => Ok(()),
            (_, Some(index)) => self.load(index),
            (_, None) => self.load(0),
        }
    }

    fn play_item_at_index(&self, index: usize) -> Result<(), EngineError> {
        self.load(index)
    }

    fn pause(&self) {
        let mut guard = self.lock();
        if matches!(guard.state, PlayerState::Playing | PlayerState::Loading) {
            if let Some(sink) = &guard.sink {
                sink.pause();
            }
            guard.state = PlayerState::Paused;
        }
    }

    fn resume(&self) {
        let mut guard = self.lock();
        if guard.state == PlayerState::Paused {
            if let Some(sink) = &guard.sink {
                sink.play();
            }
            guard.state = PlayerState::Playing;
        }
    }

    fn stop(&self) {
        let mut guard = self.lock();
        if let Some(sink) = &guard.sink {
            sink.stop();
        }
        guard.generation += 1;
        guard.start_time = None;
        guard.state = PlayerState::Stopped;
    }

    fn next(&self) -> Result<(), EngineError> {
        let (next, len) = {
            let guard = self.lock();
            (guard.loaded.map_or(0, |index| index + 1), guard.media.len())
        };
        if next >= len {
            return Err(EngineError::NoNextItem);
        }
        self.load(next)
    }

    fn previous(&self) -> Result<(), EngineError> {
        let loaded = self.lock().loaded;
        match loaded {
            Some(index) if index > 0 => self.load(index - 1),
            _ => Err(EngineError::NoPreviousItem),
        }
    }

    fn is_playing(&self) -> bool {
        matches!(self.state(), PlayerState::Playing | PlayerState::Loading)
    }

    fn loaded_index(&self) -> Option<usize> {
        self.lock().loaded
    }

    fn set_volume(&self, volume: Volume) {
        let mut guard = self.lock();
        guard.volume = volume;
        if let Some(sink) = &guard.sink {
            sink.set_volume(volume.as_gain());
        }
    }

    fn volume(&self) -> Volume {
        self.lock().volume
    }
}

// Stop playback before dropping
impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if let Some(sink) = &self.lock().sink {
            sink.stop();
        }
    }
}
