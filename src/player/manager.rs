// ==========================================
// QUEUE MANAGER
// ==========================================
// The one place where the playlist, the recommendation buffer and the
// cursor change. It runs as a single task:
//
//   QueueHandle ──requests──┐
//                           ├──> QueueManager::run (one at a time)
//   AudioPlayer ──events────┘
//
// Because user commands and end-of-track events come through the same
// loop, a `next` and a track ending at the same moment can never both
// splice a recommendation.
//
// Reads (playlist rendering, current track) don't go through the loop:
// they take the shared read lock, so a slow yt-dlp call inside the loop
// never makes `/playlist` wait. The loop only takes the write lock for
// in-memory changes, never across a network call.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::error::{EngineError, QueueError, RecommendError, Result, ValidationError};
use crate::player::audio::{EngineEvent, PlaybackEngine, Volume};
use crate::player::queue::{QueueState, Track};
use crate::youtube::extractor::TrackResolver;
use crate::youtube::recommendations::RecommendationSource;

// A track together with where it sits in the playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub index: usize,
    pub track: Track,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Request {
    Append {
        track: Track,
        reply: Reply<usize>,
    },
    Play {
        index: Option<usize>,
        reply: Reply<QueuedTrack>,
    },
    // `expected` is the position the caller saw when it asked
    Next {
        expected: Option<usize>,
        reply: Reply<QueuedTrack>,
    },
    Previous {
        reply: Reply<QueuedTrack>,
    },
}

pub struct QueueManager {
    state: Arc<RwLock<QueueState>>,
    engine: Arc<dyn PlaybackEngine>,
    resolver: Arc<dyn TrackResolver>,
    recommender: Arc<dyn RecommendationSource>,
    requests: mpsc::UnboundedReceiver<Request>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl QueueManager {
    // Starts the manager task and returns the handle the chat layer uses.
    // `events` is the receiving end of the channel the engine reports on.
    pub fn spawn(
        engine: Arc<dyn PlaybackEngine>,
        resolver: Arc<dyn TrackResolver>,
        recommender: Arc<dyn RecommendationSource>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> QueueHandle {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(QueueState::new()));

        let manager = QueueManager {
            state: Arc::clone(&state),
            engine: Arc::clone(&engine),
            resolver: Arc::clone(&resolver),
            recommender,
            requests,
            events,
        };
        tokio::spawn(manager.run());

        QueueHandle {
            requests: requests_tx,
            state,
            engine,
            resolver,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                // End-of-track events first: they were caused by time
                // passing, which happened before whatever the user typed
                biased;
                Some(event) = self.events.recv() => self.on_engine_event(event).await,
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }
        debug!("Queue manager stopped");
    }

    async fn handle(&mut self, request: Request) {
        // A dropped reply receiver just means the caller went away
        match request {
            Request::Append { track, reply } => {
                let _ = reply.send(self.append(track).await);
            }
            Request::Play { index, reply } => {
                let _ = reply.send(self.play(index).await);
            }
            Request::Next { expected, reply } => {
                let _ = reply.send(self.next(expected).await);
            }
            Request::Previous { reply } => {
                let _ = reply.send(self.previous().await);
            }
        }
        let phase = self.state.read().await.phase(self.engine.is_playing());
        debug!("Queue phase: {:?}", phase);
    }

    // ==========================================
    // STATE HELPERS
    // ==========================================

    // Appends and re-primes the engine with the whole playlist.
    // The engine keeps a snapshot, so it is resubmitted on every append;
    // positions are by index so resubmitting is harmless.
    async fn append(&self, track: Track) -> Result<usize> {
        let mut state = self.state.write().await;
        let title = track.title.clone();
        let index = state.playlist.append(track)?;
        self.engine.set_media_list(state.playlist.media_items());
        info!("Queued \"{}\" at position {}", title, index);
        Ok(index)
    }

    // Pulls the cursor back in line with whatever the engine has loaded.
    // The engine is the authority: it may have moved on its own.
    async fn reconcile(&self) -> Option<usize> {
        let mut state = self.state.write().await;
        let len = state.playlist.len();
        if let Some(loaded) = self.engine.loaded_index().filter(|index| *index < len) {
            if state.cursor != Some(loaded) {
                debug!("Cursor {:?} reconciled to engine position {}", state.cursor, loaded);
                state.cursor = Some(loaded);
            }
        }
        state.cursor
    }

    async fn set_cursor(&self, index: usize) {
        self.state.write().await.cursor = Some(index);
    }

    async fn queued(&self, index: usize) -> Result<QueuedTrack> {
        let state = self.state.read().await;
        state
            .playlist
            .get(index)
            .cloned()
            .map(|track| QueuedTrack { index, track })
            .ok_or(QueueError::Empty)
    }

    // Moves the cursor to wherever the engine just went
    async fn follow_engine(&self) -> Result<QueuedTrack> {
        let index = self.reconcile().await.ok_or(QueueError::NoMoreTracks)?;
        self.queued(index).await
    }

    // ==========================================
    // COMMANDS
    // ==========================================

    async fn play(&self, index: Option<usize>) -> Result<QueuedTrack> {
        let len = self.state.read().await.playlist.len();

        if let Some(index) = index {
            if index >= len {
                return Err(ValidationError::IndexOutOfRange { index, len }.into());
            }
            self.engine.play_item_at_index(index)?;
            self.set_cursor(index).await;
            info!("Jumped to position {}", index);
            return self.queued(index).await;
        }

        if len == 0 {
            return Err(QueueError::Empty);
        }

        match self.reconcile().await {
            // Never played: start from the top
            None => {
                self.engine.play_item_at_index(0)?;
                self.set_cursor(0).await;
                info!("Started playback at position 0");
                self.queued(0).await
            }
            // Pick up where we left off, not from 0
            Some(cursor) => {
                if !self.engine.is_playing() {
                    if self.engine.loaded_index() == Some(cursor) {
                        self.engine.play()?;
                    } else {
                        self.engine.play_item_at_index(cursor)?;
                    }
                    info!("Resumed playback at position {}", cursor);
                }
                self.queued(cursor).await
            }
        }
    }

    async fn next(&self, expected: Option<usize>) -> Result<QueuedTrack> {
        let current = self.reconcile().await;

        // The queue already moved past what the caller saw (usually a track
        // ended and auto-advanced first). That advance is the one they asked for.
        if current != expected {
            debug!(
                "Next requested from {:?} but queue is at {:?}; not advancing again",
                expected, current
            );
            return match current {
                Some(index) => self.queued(index).await,
                None => Err(QueueError::NoMoreTracks),
            };
        }

        let empty = self.state.read().await.playlist.is_empty();
        match current {
            Some(cursor) => self.advance_from(cursor, false).await,
            None if empty => Err(QueueError::NoMoreTracks),
            None => self.play(None).await,
        }
    }

    async fn previous(&self) -> Result<QueuedTrack> {
        if self.reconcile().await.is_none() {
            return Err(QueueError::NoMoreTracks);
        }
        match self.engine.previous() {
            Ok(()) => self.follow_engine().await,
            Err(EngineError::NoPreviousItem) => Err(QueueError::NoMoreTracks),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // ADVANCING
    // ==========================================
    // Engine's own next item first; only at the true end of the playlist
    // does a recommendation get spliced in. `looked_up` means the buffer was
    // already rebuilt (or tried) for this advance, so no second lookup.
    async fn advance_from(&self, cursor: usize, looked_up: bool) -> Result<QueuedTrack> {
        match self.engine.next() {
            Ok(()) => {
                let now = self.follow_engine().await?;
                info!("Advanced from {} to {}", cursor, now.index);
                Ok(now)
            }
            Err(EngineError::NoNextItem) => self.splice_and_advance(cursor, looked_up).await,
            Err(e) => Err(e.into()),
        }
    }

    // On failure playback stops where it is: nothing appended, cursor unchanged
    async fn splice_and_advance(&self, cursor: usize, looked_up: bool) -> Result<QueuedTrack> {
        let spliced = match self.splice(looked_up).await {
            Ok(index) => index,
            Err(e) => {
                warn!("Cannot continue past position {}: {}", cursor, e);
                self.engine.stop();
                return Err(e);
            }
        };

        self.engine.next()?;
        let now = self.follow_engine().await?;
        if now.index != spliced {
            warn!("Engine landed on {} instead of spliced position {}", now.index, spliced);
        }
        info!("Advanced from {} to recommended track at {}", cursor, now.index);
        Ok(now)
    }

    // Takes one recommendation, resolves it and appends it.
    // Rebuilds the buffer from the last playlist entry first if it is empty,
    // unless that lookup already happened for this advance.
    async fn splice(&self, looked_up: bool) -> Result<usize> {
        let (seed, buffer_empty) = {
            let state = self.state.read().await;
            let seed = state.playlist.last().map(|track| track.id.clone());
            (seed, state.buffer.is_empty())
        };
        let seed = seed.ok_or(QueueError::Empty)?;

        if buffer_empty && !looked_up {
            self.rebuild_buffer(&seed).await?;
        }

        let (candidate, drained_from) = {
            let mut state = self.state.write().await;
            let candidate = state.buffer.pop_front();
            let drained_from = if state.buffer.is_empty() {
                state.buffer.seed().map(str::to_string)
            } else {
                None
            };
            (candidate, drained_from)
        };
        let candidate = candidate.ok_or_else(|| RecommendError::Empty(seed.clone()))?;
        if let Some(buffer_seed) = drained_from {
            debug!("Used the last buffered recommendation for {}", buffer_seed);
        }

        // Network call: no lock held
        let track = self.resolver.resolve_id(&candidate.id).await?;
        let index = self.append(track).await?;
        info!("Spliced recommendation {} in at position {}", candidate.id, index);
        Ok(index)
    }

    // Replaces the buffer with fresh recommendations for `seed_id`.
    // On failure the buffer is left empty.
    async fn rebuild_buffer(&self, seed_id: &str) -> Result<()> {
        let candidates = self.recommender.recommendations(seed_id).await?;

        let mut state = self.state.write().await;
        state.buffer.refill(seed_id, candidates);
        if state.buffer.is_empty() {
            return Err(RecommendError::Empty(seed_id.to_string()).into());
        }
        info!("Buffered {} recommendations after {}", state.buffer.len(), seed_id);
        Ok(())
    }

    // ==========================================
    // ENGINE EVENTS
    // ==========================================

    async fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::TrackEnded { index } => self.on_track_ended(index).await,
            EngineEvent::LoadFailed { index, reason } => {
                warn!("Engine could not load position {}: {}", index, reason);
            }
        }
    }

    async fn on_track_ended(&self, index: usize) {
        let cursor = self.reconcile().await;
        if cursor != Some(index) {
            debug!("Ignoring end of position {}; cursor is {:?}", index, cursor);
            return;
        }

        // Keep recommendations ready before we need them
        let (seed, buffer_empty) = {
            let state = self.state.read().await;
            let seed = state.playlist.last().map(|track| track.id.clone());
            (seed, state.buffer.is_empty())
        };
        let mut looked_up = false;
        if let (Some(seed), true) = (seed, buffer_empty) {
            looked_up = true;
            if let Err(e) = self.rebuild_buffer(&seed).await {
                warn!("Could not rebuild recommendations from {}: {}", seed, e);
            }
        }

        match self.advance_from(index, looked_up).await {
            Ok(now) => info!("Track {} ended; now playing \"{}\"", index, now.track.title),
            Err(e) => warn!("Track {} ended; playback stopped: {}", index, e),
        }
    }
}

// ==========================================
// QUEUE HANDLE
// ==========================================
// Cheap to clone. Mutations are sent to the manager task; reads look at
// the shared state and the engine directly.
#[derive(Clone)]
pub struct QueueHandle {
    requests: mpsc::UnboundedSender<Request>,
    state: Arc<RwLock<QueueState>>,
    engine: Arc<dyn PlaybackEngine>,
    resolver: Arc<dyn TrackResolver>,
}

impl QueueHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .map_err(|_| QueueError::Closed)?;
        response.await.map_err(|_| QueueError::Closed)?
    }

    // Resolves first, on the caller's task, then appends.
    // A failed resolution changes nothing.
    pub async fn add(&self, url: &str) -> Result<QueuedTrack> {
        let track = self.resolver.resolve(url).await?;
        let index = self
            .request(|reply| Request::Append {
                track: track.clone(),
                reply,
            })
            .await?;
        Ok(QueuedTrack { index, track })
    }

    pub async fn play(&self, index: Option<usize>) -> Result<QueuedTrack> {
        self.request(|reply| Request::Play { index, reply }).await
    }

    pub async fn next(&self) -> Result<QueuedTrack> {
        let expected = self.current_index().await;
        self.next_from(expected).await
    }

    pub(crate) async fn next_from(&self, expected: Option<usize>) -> Result<QueuedTrack> {
        self.request(|reply| Request::Next { expected, reply }).await
    }

    pub async fn previous(&self) -> Result<QueuedTrack> {
        self.request(|reply| Request::Previous { reply }).await
    }

    pub fn pause(&self) -> Result<()> {
        if !self.engine.is_playing() {
            return Err(QueueError::NothingPlaying);
        }
        self.engine.pause();
        Ok(())
    }

    pub fn resume(&self) {
        self.engine.resume();
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn set_volume(&self, volume: Volume) {
        self.engine.set_volume(volume);
    }

    // Where the engine is, as a playlist position
    pub async fn current_index(&self) -> Option<usize> {
        let state = self.state.read().await;
        self.engine
            .loaded_index()
            .filter(|index| *index < state.playlist.len())
    }

    pub async fn current_track(&self) -> Option<QueuedTrack> {
        let state = self.state.read().await;
        let index = self
            .engine
            .loaded_index()
            .filter(|index| *index < state.playlist.len())?;
        state
            .playlist
            .get(index)
            .cloned()
            .map(|track| QueuedTrack { index, track })
    }

    pub async fn render_playlist(&self) -> String {
        let state = self.state.read().await;
        let current = self
            .engine
            .loaded_index()
            .filter(|index| *index < state.playlist.len());
        state.render(current)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.playlist.len()
    }

    #[cfg(test)]
    pub async fn phase(&self) -> crate::player::queue::QueuePhase {
        self.state.read().await.phase(self.engine.is_playing())
    }
}
