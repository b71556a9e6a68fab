// Runtime configuration
// Every setting can come from a flag or an environment variable.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ValidationError;
use crate::player::audio::Volume;

const APP_DIR: &str = "tube-queue-bot";

#[derive(Parser, Debug, Clone)]
#[command(name = "tube-queue-bot")]
#[command(about = "Chat-driven YouTube audio queue with recommended follow-ups")]
#[command(version)]
pub struct Config {
    /// yt-dlp executable used to resolve tracks and recommendations
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    pub ytdlp: PathBuf,

    /// Cookies file passed to yt-dlp (defaults to cookies.txt in the config directory)
    #[arg(long, env = "YTDLP_COOKIES")]
    pub cookies: Option<PathBuf>,

    /// Seconds before a track resolution is abandoned
    #[arg(long, env = "RESOLVE_TIMEOUT_SECS", default_value_t = 30)]
    pub resolve_timeout: u64,

    /// Seconds before a recommendation lookup is abandoned
    #[arg(long, env = "RECOMMEND_TIMEOUT_SECS", default_value_t = 30)]
    pub recommend_timeout: u64,

    /// How many recommended tracks to buffer per lookup
    #[arg(long, env = "RECOMMENDATION_LIMIT", default_value_t = 25)]
    pub recommendation_limit: usize,

    /// Starting volume, 0-100
    #[arg(long, env = "INITIAL_VOLUME", default_value_t = 100)]
    pub volume: i64,
}

impl Config {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout)
    }

    pub fn recommend_timeout(&self) -> Duration {
        Duration::from_secs(self.recommend_timeout)
    }

    pub fn initial_volume(&self) -> Result<Volume, ValidationError> {
        Volume::new(self.volume)
    }

    // Explicit setting wins; otherwise use the default file only if it exists
    pub fn cookies_path(&self) -> Option<PathBuf> {
        self.cookies.clone().or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join(APP_DIR).join("cookies.txt"))
                .filter(|path| path.exists())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["tube-queue-bot"]).unwrap();
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
        assert_eq!(config.recommend_timeout(), Duration::from_secs(30));
        assert_eq!(config.recommendation_limit, 25);
        assert_eq!(config.initial_volume().unwrap(), Volume::MAX);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "tube-queue-bot",
            "--ytdlp",
            "/opt/yt-dlp",
            "--cookies",
            "/tmp/cookies.txt",
            "--resolve-timeout",
            "5",
            "--volume",
            "40",
        ])
        .unwrap();
        assert_eq!(config.ytdlp, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(config.cookies_path(), Some(PathBuf::from("/tmp/cookies.txt")));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(5));
        assert_eq!(config.initial_volume().unwrap().percent(), 40);
    }

    #[test]
    fn test_volume_out_of_range() {
        let config = Config::try_parse_from(["tube-queue-bot", "--volume", "101"]).unwrap();
        assert_eq!(
            config.initial_volume(),
            Err(ValidationError::VolumeOutOfRange(101))
        );
    }
}
