// Error types for the queue bot
// One enum per collaborator boundary, plus QueueError which is what the
// queue manager hands back to the chat layer.

use std::time::Duration;
use thiserror::Error;

// A URL or video id could not be turned into a playable track
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp timed out after {0:?}")]
    Timeout(Duration),

    #[error("yt-dlp failed: {0}")]
    Failed(String),

    #[error("invalid yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no audio stream available for {0}")]
    NoAudioStream(String),
}

// The recommendation lookup failed or gave nothing usable
#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("recommendation lookup failed: {0}")]
    Lookup(#[from] ResolveError),

    #[error("no recommendations for {0}")]
    Empty(String),
}

// Non-success statuses reported by the playback engine.
// NoNextItem / NoPreviousItem are expected signals, not faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no next item in the media list")]
    NoNextItem,

    #[error("no previous item in the media list")]
    NoPreviousItem,

    #[error("media index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("media list is empty")]
    EmptyMediaList,

    #[error("no audio output device available")]
    NoOutputDevice,
}

// Malformed command arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("expected a number, got {0:?}")]
    NotANumber(String),

    #[error("volume {0} is outside 0..=100")]
    VolumeOutOfRange(i64),

    #[error("media index {index} out of range between 0 - {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Recommendation(#[from] RecommendError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("the playlist is empty")]
    Empty,

    #[error("no more tracks in the queue")]
    NoMoreTracks,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("cannot append a track without a stream URL: {0}")]
    Unresolved(String),

    #[error("queue manager has shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
