// YouTube track resolver
// Uses a yt-dlp subprocess to turn a URL or video id into a playable Track

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::player::queue::Track;

// Prefer m4a (decodable by rodio's symphonia backend), fall back to any audio
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

#[async_trait]
pub trait TrackResolver: Send + Sync {
    // Resolve whatever the user pasted: a watch URL, youtu.be link, etc.
    async fn resolve(&self, url: &str) -> Result<Track, ResolveError>;

    // Resolve a bare video id, e.g. one handed out by recommendations
    async fn resolve_id(&self, id: &str) -> Result<Track, ResolveError> {
        self.resolve(&watch_url(id)).await
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

// ==========================================
// yt-dlp RUNNER
// ==========================================
// Shared by the resolver and the recommendation source.
// Every call is bounded by `timeout`; the child is killed if it overruns.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    cookies: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(program: PathBuf, cookies: Option<PathBuf>, timeout: Duration) -> Self {
        YtDlp {
            program,
            cookies,
            timeout,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        YtDlp {
            timeout,
            ..self.clone()
        }
    }

    pub async fn run(&self, args: &[&str]) -> Result<Vec<u8>, ResolveError> {
        let mut cmd = Command::new(&self.program);
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} {:?}", self.program.display(), args);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))??;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Failed(error.trim().to_string()));
        }

        Ok(output.stdout)
    }
}

// The subset of `yt-dlp -j` output we care about
#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    // Direct URL of the selected format
    #[serde(default)]
    url: Option<String>,
}

// Music uploads carry an `artist`; everything else falls back to the channel
pub(crate) fn display_artist(
    artist: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
) -> String {
    artist
        .or(uploader)
        .or(channel)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub(crate) fn parse_video_info(json: &[u8]) -> Result<Track, ResolveError> {
    let info: VideoInfo = serde_json::from_slice(json)?;

    let stream_url = info
        .url
        .filter(|url| url.starts_with("http"))
        .ok_or_else(|| ResolveError::NoAudioStream(info.id.clone()))?;

    Ok(Track::resolved(
        info.id,
        info.title.unwrap_or_else(|| "Unknown".to_string()),
        display_artist(info.artist, info.uploader, info.channel),
        stream_url,
    ))
}

pub struct YouTubeExtractor {
    ytdlp: YtDlp,
}

impl YouTubeExtractor {
    pub fn new(ytdlp: YtDlp) -> Self {
        YouTubeExtractor { ytdlp }
    }
}

#[async_trait]
impl TrackResolver for YouTubeExtractor {
    async fn resolve(&self, url: &str) -> Result<Track, ResolveError> {
        let url = url.trim();
        if url.is_empty() || url.starts_with('-') {
            return Err(ResolveError::Failed(format!("not a URL: {:?}", url)));
        }

        let output = self
            .ytdlp
            .run(&["-j", "--no-playlist", "--no-warnings", "-f", AUDIO_FORMAT, url])
            .await?;
        let track = parse_video_info(&output)?;

        info!("Resolved {} to \"{}\" by {}", url, track.title, track.artist);
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_info() {
        let json = br#"{
            "id": "abc123",
            "title": "Song A",
            "uploader": "Band A",
            "channel": "Band A - Topic",
            "duration": 212,
            "url": "https://rr3.googlevideo.com/videoplayback?id=1"
        }"#;

        let track = parse_video_info(json).unwrap();
        assert_eq!(track.id, "abc123");
        assert_eq!(track.title, "Song A");
        assert_eq!(track.artist, "Band A");
        assert_eq!(
            track.stream_url(),
            Some("https://rr3.googlevideo.com/videoplayback?id=1")
        );
    }

    #[test]
    fn test_parse_prefers_artist_tag() {
        let json = br#"{"id": "x", "title": "T", "artist": "Real Artist",
                        "uploader": "Label VEVO", "url": "https://a/b"}"#;
        assert_eq!(parse_video_info(json).unwrap().artist, "Real Artist");
    }

    #[test]
    fn test_parse_without_stream_url() {
        let json = br#"{"id": "x", "title": "T", "uploader": "U"}"#;
        let err = parse_video_info(json).unwrap_err();
        assert!(matches!(err, ResolveError::NoAudioStream(id) if id == "x"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_video_info(b"ERROR: not json"),
            Err(ResolveError::Parse(_))
        ));
    }

    #[test]
    fn test_display_artist_fallbacks() {
        assert_eq!(display_artist(None, None, Some("Chan".into())), "Chan");
        assert_eq!(display_artist(None, Some(String::new()), None), "Unknown");
        assert_eq!(display_artist(None, None, None), "Unknown");
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(watch_url("abc"), "https://www.youtube.com/watch?v=abc");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let ytdlp = YtDlp::new(
            PathBuf::from("/nonexistent/yt-dlp"),
            None,
            Duration::from_secs(5),
        );
        let extractor = YouTubeExtractor::new(ytdlp);
        let err = extractor.resolve("https://youtu.be/abc").await.unwrap_err();
        assert!(matches!(err, ResolveError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_flag_like_input_is_rejected() {
        let ytdlp = YtDlp::new(PathBuf::from("yt-dlp"), None, Duration::from_secs(5));
        let extractor = YouTubeExtractor::new(ytdlp);
        assert!(matches!(
            extractor.resolve("--exec rm").await,
            Err(ResolveError::Failed(_))
        ));
    }
}
