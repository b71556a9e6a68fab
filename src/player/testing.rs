// In-memory stand-ins for the engine, resolver and recommendation source.
// No network, no audio device.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::error::{EngineError, RecommendError, ResolveError};
use crate::player::audio::{MediaItem, PlaybackEngine, Volume};
use crate::player::queue::Track;
use crate::youtube::extractor::{watch_url, TrackResolver};
use crate::youtube::recommendations::RecommendationSource;

pub fn resolved(id: &str, title: &str, artist: &str) -> Track {
    Track::resolved(
        id.to_string(),
        title.to_string(),
        artist.to_string(),
        format!("https://stream.example/{}", id),
    )
}

pub fn candidate(id: &str, title: &str) -> Track {
    Track::unresolved(id.to_string(), title.to_string(), "Someone".to_string())
}

// ==========================================
// ENGINE
// ==========================================
// Loads are instant: an item is "playing" as soon as it is loaded.

#[derive(Debug)]
struct FakeEngineState {
    media: Vec<MediaItem>,
    loaded: Option<usize>,
    playing: bool,
    volume: Volume,
    // No audio device: every load is refused
    headless: bool,
}

pub struct FakeEngine {
    state: Mutex<FakeEngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine {
            state: Mutex::new(FakeEngineState {
                media: Vec::new(),
                loaded: None,
                playing: false,
                volume: Volume::MAX,
                headless: false,
            }),
        }
    }

    pub fn without_output() -> Self {
        let engine = FakeEngine::new();
        engine.lock().headless = true;
        engine
    }

    fn lock(&self) -> MutexGuard<'_, FakeEngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, index: usize) -> Result<(), EngineError> {
        let mut state = self.lock();
        let len = state.media.len();
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        if state.headless {
            return Err(EngineError::NoOutputDevice);
        }
        state.loaded = Some(index);
        state.playing = true;
        Ok(())
    }

    pub fn media_len(&self) -> usize {
        self.lock().media.len()
    }

    pub fn loaded(&self) -> Option<usize> {
        self.lock().loaded
    }
}

impl PlaybackEngine for FakeEngine {
    fn set_media_list(&self, items: Vec<MediaItem>) {
        let mut state = self.lock();
        state.media = items;
        if state.loaded.is_some_and(|index| index >= state.media.len()) {
            state.loaded = None;
        }
    }

    fn play(&self) -> Result<(), EngineError> {
        let loaded = {
            let state = self.lock();
            if state.media.is_empty() {
                return Err(EngineError::EmptyMediaList);
            }
            state.loaded
        };
        self.load(loaded.unwrap_or(0))
    }

    fn play_item_at_index(&self, index: usize) -> Result<(), EngineError> {
        self.load(index)
    }

    fn pause(&self) {
        self.lock().playing = false;
    }

    fn resume(&self) {
        let mut state = self.lock();
        if state.loaded.is_some() {
            state.playing = true;
        }
    }

    fn stop(&self) {
        self.lock().playing = false;
    }

    fn next(&self) -> Result<(), EngineError> {
        let (next, len) = {
            let state = self.lock();
            (state.loaded.map_or(0, |index| index + 1), state.media.len())
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
        self.lock().playing
    }

    fn loaded_index(&self) -> Option<usize> {
        self.lock().loaded
    }

    fn set_volume(&self, volume: Volume) {
        self.lock().volume = volume;
    }

    fn volume(&self) -> Volume {
        self.lock().volume
    }
}

// ==========================================
// RESOLVER
// ==========================================

#[derive(Default)]
pub struct FakeResolver {
    tracks: HashMap<String, Track>,
}

impl FakeResolver {
    pub fn new() -> Self {
        FakeResolver::default()
    }

    // Resolvable by whatever the user types
    pub fn with_url(mut self, url: &str, track: Track) -> Self {
        self.tracks.insert(url.to_string(), track);
        self
    }

    // Resolvable by video id (what recommendations hand out)
    pub fn with_video(mut self, track: Track) -> Self {
        self.tracks.insert(watch_url(&track.id), track);
        self
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<Track, ResolveError> {
        self.tracks
            .get(url)
            .cloned()
            .ok_or_else(|| ResolveError::Failed(format!("unknown video {}", url)))
    }
}

// Holds every resolution until the test releases it
pub struct GatedResolver {
    track: Track,
    gate: Arc<Notify>,
}

impl GatedResolver {
    pub fn new(track: Track) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            GatedResolver {
                track,
                gate: Arc::clone(&gate),
            },
            gate,
        )
    }
}

#[async_trait]
impl TrackResolver for GatedResolver {
    async fn resolve(&self, _url: &str) -> Result<Track, ResolveError> {
        self.gate.notified().await;
        Ok(self.track.clone())
    }
}

// ==========================================
// RECOMMENDATIONS
// ==========================================

#[derive(Default)]
pub struct FakeRecommender {
    mixes: HashMap<String, Vec<Track>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRecommender {
    pub fn new() -> Self {
        FakeRecommender::default()
    }

    pub fn with(mut self, seed_id: &str, tracks: Vec<Track>) -> Self {
        self.mixes.insert(seed_id.to_string(), tracks);
        self
    }

    // Seeds asked for, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RecommendationSource for FakeRecommender {
    async fn recommendations(&self, seed_id: &str) -> Result<Vec<Track>, RecommendError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(seed_id.to_string());
        self.mixes
            .get(seed_id)
            .cloned()
            .ok_or_else(|| RecommendError::Empty(seed_id.to_string()))
    }
}
