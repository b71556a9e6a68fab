// ==========================================
// QUEUE STATE MODULE
// ==========================================
// Plain data behind the queue manager:
// - Track: one playable item
// - Playlist: append-only log of everything ever queued
// - RecommendationBuffer: candidates waiting to be spliced in
// - QueueState: the two above plus the cursor
//
// Nothing in here talks to the network or the audio engine.
// The manager (manager.rs) owns a QueueState and is the only writer.

use std::collections::VecDeque;

use crate::error::QueueError;
use crate::player::audio::MediaItem;

// ==========================================
// STREAM URL
// ==========================================
// Recommended tracks arrive without a stream URL. They get one right
// before they are appended to the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUrl {
    Unresolved,
    Resolved(String),
}

// ==========================================
// TRACK STRUCT
// ==========================================
// id: the YouTube video id ("dQw4w9WgXcQ"), stable across resolutions
// title / artist: display metadata
// stream: the direct audio URL (googlevideo.com/videoplayback?...)
//   Note: these URLs expire after a few hours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub stream: StreamUrl,
}

impl Track {
    pub fn resolved(id: String, title: String, artist: String, stream_url: String) -> Self {
        Track {
            id,
            title,
            artist,
            stream: StreamUrl::Resolved(stream_url),
        }
    }

    pub fn unresolved(id: String, title: String, artist: String) -> Self {
        Track {
            id,
            title,
            artist,
            stream: StreamUrl::Unresolved,
        }
    }

    pub fn stream_url(&self) -> Option<&str> {
        match &self.stream {
            StreamUrl::Resolved(url) => Some(url),
            StreamUrl::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.stream_url().is_some()
    }

    pub fn media_item(&self) -> MediaItem {
        MediaItem {
            id: self.id.clone(),
            stream_url: self.stream_url().unwrap_or_default().to_string(),
        }
    }
}

// ==========================================
// PLAYLIST
// ==========================================
// Append-only. Position in the Vec is play order, and a track never
// moves once appended, so indices handed out stay valid forever.
#[derive(Debug, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new() -> Self {
        Playlist { tracks: Vec::new() }
    }

    // Returns the index the track landed at.
    // Only resolved tracks can be played, so only those go in.
    pub fn append(&mut self, track: Track) -> Result<usize, QueueError> {
        if !track.is_resolved() {
            return Err(QueueError::Unresolved(track.id));
        }
        self.tracks.push(track);
        Ok(self.tracks.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn last(&self) -> Option<&Track> {
        self.tracks.last()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.tracks.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    // What the engine gets primed with: the whole list, in order
    pub fn media_items(&self) -> Vec<MediaItem> {
        self.tracks.iter().map(Track::media_item).collect()
    }
}

// ==========================================
// RECOMMENDATION BUFFER
// ==========================================
// Rebuilt wholesale from the last playlist entry whenever it runs dry.
// Never merged into: refill() always starts from empty.
#[derive(Debug, Default)]
pub struct RecommendationBuffer {
    seed: Option<String>,
    candidates: VecDeque<Track>,
}

impl RecommendationBuffer {
    pub fn new() -> Self {
        RecommendationBuffer::default()
    }

    // The recommendation service always lists the seed video first, so the
    // first candidate is dropped unconditionally. Any other copy of the seed
    // is filtered out too.
    pub fn refill(&mut self, seed_id: &str, candidates: Vec<Track>) {
        self.candidates.clear();
        self.seed = Some(seed_id.to_string());
        self.candidates.extend(
            candidates
                .into_iter()
                .skip(1)
                .filter(|track| track.id != seed_id),
        );
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.candidates.pop_front()
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.candidates.iter()
    }
}

// ==========================================
// QUEUE PHASE
// ==========================================
// Derived, never stored. Useful for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,          // nothing queued yet, only add makes sense
    LoadedStopped, // tracks queued, engine not playing
    Playing,       // engine streaming the track at the cursor
    Exhausting,    // at the last track with no recommendations buffered
}

// ==========================================
// QUEUE STATE
// ==========================================
// cursor: index of the track last advanced to, None until something plays
#[derive(Debug, Default)]
pub struct QueueState {
    pub playlist: Playlist,
    pub buffer: RecommendationBuffer,
    pub cursor: Option<usize>,
}

impl QueueState {
    pub fn new() -> Self {
        QueueState::default()
    }

    pub fn is_at_last(&self) -> bool {
        matches!((self.cursor, self.playlist.last_index()), (Some(c), Some(last)) if c >= last)
    }

    pub fn phase(&self, engine_playing: bool) -> QueuePhase {
        if self.playlist.is_empty() {
            QueuePhase::Idle
        } else if self.is_at_last() && self.buffer.is_empty() {
            QueuePhase::Exhausting
        } else if engine_playing {
            QueuePhase::Playing
        } else {
            QueuePhase::LoadedStopped
        }
    }

    // One line per entry: "<index>. <title>. Artist: <artist>".
    // `current` is the reconciled index; only that line gets the marker.
    pub fn render(&self, current: Option<usize>) -> String {
        let mut text = String::from("Playlist:\n");
        for (idx, track) in self.playlist.iter().enumerate() {
            text.push_str(&format!("{}. {}. Artist: {}", idx, track.title, track.artist));
            if current == Some(idx) {
                text.push_str(NOW_PLAYING_MARKER);
            }
            text.push('\n');
        }
        text
    }
}

pub const NOW_PLAYING_MARKER: &str = "  <<<< Now playing";
