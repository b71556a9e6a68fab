// Recommended follow-up tracks
// Backed by YouTube's "radio mix" playlist (list=RD<video id>), which
// always starts with the seed video itself.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::RecommendError;
use crate::player::queue::Track;
use crate::youtube::extractor::{display_artist, YtDlp};

#[async_trait]
pub trait RecommendationSource: Send + Sync {
    // Ordered candidates for what should play after `seed_id`.
    // The first entry is the seed itself; callers drop it.
    async fn recommendations(&self, seed_id: &str) -> Result<Vec<Track>, RecommendError>;
}

pub fn mix_url(seed_id: &str) -> String {
    format!(
        "https://www.youtube.com/watch?v={}&list=RD{}",
        seed_id, seed_id
    )
}

#[derive(Debug, Deserialize)]
struct MixPlaylist {
    #[serde(default)]
    entries: Vec<MixEntry>,
}

#[derive(Debug, Deserialize)]
struct MixEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

// Entries come back without stream URLs; those are fetched at splice time
pub(crate) fn parse_mix(json: &[u8]) -> Result<Vec<Track>, serde_json::Error> {
    let playlist: MixPlaylist = serde_json::from_slice(json)?;
    Ok(playlist
        .entries
        .into_iter()
        .filter(|entry| !entry.id.is_empty())
        .map(|entry| {
            Track::unresolved(
                entry.id,
                entry.title.unwrap_or_else(|| "Unknown".to_string()),
                display_artist(None, entry.uploader, entry.channel),
            )
        })
        .collect())
}

pub struct YouTubeMix {
    ytdlp: YtDlp,
    limit: usize,
}

impl YouTubeMix {
    pub fn new(ytdlp: YtDlp, limit: usize) -> Self {
        YouTubeMix { ytdlp, limit }
    }
}

#[async_trait]
impl RecommendationSource for YouTubeMix {
    async fn recommendations(&self, seed_id: &str) -> Result<Vec<Track>, RecommendError> {
        let url = mix_url(seed_id);
        // +1 because the seed takes the first slot
        let end = (self.limit + 1).to_string();

        let output = self
            .ytdlp
            .run(&["-J", "--flat-playlist", "--no-warnings", "--playlist-end", &end, &url])
            .await?;
        let tracks = parse_mix(&output).map_err(|e| RecommendError::Lookup(e.into()))?;

        if tracks.is_empty() {
            return Err(RecommendError::Empty(seed_id.to_string()));
        }

        info!("Got {} mix entries for {}", tracks.len(), seed_id);
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_url() {
        assert_eq!(
            mix_url("abc"),
            "https://www.youtube.com/watch?v=abc&list=RDabc"
        );
    }

    #[test]
    fn test_parse_mix_keeps_order_and_seed() {
        let json = br#"{
            "id": "RDabc",
            "title": "Mix - Song A",
            "entries": [
                {"id": "abc", "title": "Song A", "uploader": "Band A"},
                {"id": "def", "title": "Song B", "channel": "Band B"},
                {"id": "ghi", "title": "Song C"}
            ]
        }"#;

        let tracks = parse_mix(json).unwrap();
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["abc", "def", "ghi"]);
        assert_eq!(tracks[1].artist, "Band B");
        assert_eq!(tracks[2].artist, "Unknown");
        assert!(tracks.iter().all(|t| !t.is_resolved()));
    }

    #[test]
    fn test_parse_mix_without_entries() {
        assert!(parse_mix(br#"{"id": "RDabc"}"#).unwrap().is_empty());
    }
}
