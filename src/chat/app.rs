// Chat front end
// Reads one message per line, runs it against the queue, writes the reply.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::chat::command::{Command, Message};
use crate::error::{QueueError, ValidationError};
use crate::player::manager::{QueueHandle, QueuedTrack};

const GREETING: &str = "I'm a bot, please talk to me!";
const UNKNOWN_COMMAND: &str = "Sorry, I didn't understand that command.";
const INVALID_URL: &str = "Invalid URL. Provide a valid audio stream URL.";
const EMPTY_QUEUE: &str = "Queue is empty. Add audio stream URLs using /add command.";
const NO_MORE_TRACKS: &str = "No more tracks in queue.";
const NOTHING_PLAYING: &str = "No current now playing.";
const WRONG_NUMBER: &str = "Wrong argument type number.";
const VOLUME_RANGE: &str = "Volume must be between 0 and 100";
const VOLUME_INPUT: &str = "Invalid input. Please provide a number between 0 and 100.";

pub struct ChatApp {
    queue: QueueHandle,
}

impl ChatApp {
    pub fn new(queue: QueueHandle) -> Self {
        ChatApp { queue }
    }

    // Until the reader hits EOF. Blank lines are skipped.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.handle_message(&line).await;
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        info!("Chat input closed");
        Ok(())
    }

    pub async fn handle_message(&self, line: &str) -> String {
        match Message::parse(line) {
            Message::Command(command) => {
                debug!("Command: {:?}", command);
                self.handle_command(command).await
            }
            Message::Invalid { name, error } => {
                debug!("Rejected /{}: {}", name, error);
                validation_reply(&name, &error)
            }
            Message::Unknown(name) => {
                debug!("Unknown command /{}", name);
                UNKNOWN_COMMAND.to_string()
            }
            Message::Text(text) => text,
        }
    }

    async fn handle_command(&self, command: Command) -> String {
        match command {
            Command::Start => GREETING.to_string(),
            Command::Add(url) => match self.queue.add(&url).await {
                Ok(added) => {
                    info!("Queue now holds {} tracks", self.queue.len().await);
                    format!("Added {} to queue.", added.track.title)
                }
                Err(e) => {
                    warn!("Could not add {}: {}", url, e);
                    INVALID_URL.to_string()
                }
            },
            Command::Play(index) => match self.queue.play(index).await {
                Ok(now) => now_playing(&now),
                Err(QueueError::Validation(ValidationError::IndexOutOfRange { len, .. })) => {
                    format!("Media index out of range between 0 - {}", len)
                }
                Err(QueueError::Empty) => EMPTY_QUEUE.to_string(),
                Err(QueueError::Engine(e)) => {
                    warn!("Engine refused to play: {}", e);
                    format!("Could not start playback: {}.", e)
                }
                Err(e) => {
                    warn!("Play failed: {}", e);
                    EMPTY_QUEUE.to_string()
                }
            },
            Command::Pause => match self.queue.pause() {
                Ok(()) => "Audio paused.".to_string(),
                Err(_) => NOTHING_PLAYING.to_string(),
            },
            Command::Resume => {
                self.queue.resume();
                "Audio resumed.".to_string()
            }
            Command::Next => self.step(self.queue.next().await),
            Command::Previous => self.step(self.queue.previous().await),
            Command::Playlist => self.queue.render_playlist().await,
            Command::Current => match self.queue.current_track().await {
                Some(now) if self.queue.is_playing() => {
                    format!("Current now playing: {}", now.track.title)
                }
                _ => NOTHING_PLAYING.to_string(),
            },
            Command::IsPlaying => {
                let playing = if self.queue.is_playing() { "True" } else { "False" };
                format!("Is playing: {}", playing)
            }
            Command::Volume(volume) => {
                self.queue.set_volume(volume);
                format!("Volume set to {}%.", volume.percent())
            }
        }
    }

    fn step(&self, result: Result<QueuedTrack, QueueError>) -> String {
        match result {
            Ok(now) => format!("Playing {}", now.track.title),
            Err(e) => {
                debug!("Cannot step: {}", e);
                NO_MORE_TRACKS.to_string()
            }
        }
    }
}

fn now_playing(now: &QueuedTrack) -> String {
    format!("Now playing: {}", now.track.title)
}

fn validation_reply(name: &str, error: &ValidationError) -> String {
    match (name, error) {
        ("add", _) => INVALID_URL.to_string(),
        (_, ValidationError::VolumeOutOfRange(_)) => VOLUME_RANGE.to_string(),
        ("volume", _) => VOLUME_INPUT.to_string(),
        (_, ValidationError::IndexOutOfRange { len, .. }) => {
            format!("Media index out of range between 0 - {}", len)
        }
        _ => WRONG_NUMBER.to_string(),
    }
}
