// Chat command parsing
// Turns one line of chat text into a typed command with validated arguments.

use crate::error::ValidationError;
use crate::player::audio::Volume;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Add(String),
    Play(Option<usize>),
    Pause,
    Resume,
    Next,
    Previous,
    Playlist,
    Current,
    IsPlaying,
    Volume(Volume),
}

// What a line of chat turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    // A known command with bad arguments
    Invalid {
        name: String,
        error: ValidationError,
    },
    Unknown(String),
    Text(String),
}

impl Message {
    // Commands start with '/'. "/play@my_bot 3" is the same as "/play 3".
    pub fn parse(line: &str) -> Message {
        let trimmed = line.trim();
        let Some(body) = trimmed.strip_prefix('/') else {
            return Message::Text(line.to_string());
        };

        let mut parts = body.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        match Command::from_parts(&name, &args) {
            Some(Ok(command)) => Message::Command(command),
            Some(Err(error)) => Message::Invalid { name, error },
            None => Message::Unknown(name),
        }
    }
}

impl Command {
    // None when the name isn't a command at all
    fn from_parts(name: &str, args: &[&str]) -> Option<Result<Command, ValidationError>> {
        let command = match name {
            "start" => Ok(Command::Start),
            "add" => parse_url(args).map(Command::Add),
            "play" => parse_index(args).map(Command::Play),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "next" => Ok(Command::Next),
            "prev" | "previous" => Ok(Command::Previous),
            "playlist" => Ok(Command::Playlist),
            "current" => Ok(Command::Current),
            "is_playing" => Ok(Command::IsPlaying),
            "volume" => parse_volume(args).map(Command::Volume),
            _ => return None,
        };
        Some(command)
    }
}

fn parse_url(args: &[&str]) -> Result<String, ValidationError> {
    match args {
        [url] => Ok(url.to_string()),
        _ => Err(ValidationError::MissingArgument("url")),
    }
}

// "/play" alone resumes; "/play 3" jumps. Range is checked against the
// playlist later, here it only has to be a non-negative integer.
fn parse_index(args: &[&str]) -> Result<Option<usize>, ValidationError> {
    match args {
        [] => Ok(None),
        [index] => index
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ValidationError::NotANumber(index.to_string())),
        _ => Err(ValidationError::NotANumber(args.join(" "))),
    }
}

fn parse_volume(args: &[&str]) -> Result<Volume, ValidationError> {
    match args {
        [value] => {
            let value = value
                .parse::<i64>()
                .map_err(|_| ValidationError::NotANumber(value.to_string()))?;
            Volume::new(value)
        }
        [] => Err(ValidationError::MissingArgument("volume")),
        _ => Err(ValidationError::NotANumber(args.join(" "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> Command {
        match Message::parse(line) {
            Message::Command(command) => command,
            other => panic!("expected a command from {:?}, got {:?}", line, other),
        }
    }

    fn invalid(line: &str) -> ValidationError {
        match Message::parse(line) {
            Message::Invalid { error, .. } => error,
            other => panic!("expected invalid from {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn test_plain_commands() {
        assert_eq!(command("/start"), Command::Start);
        assert_eq!(command("/pause"), Command::Pause);
        assert_eq!(command("/resume"), Command::Resume);
        assert_eq!(command("/next"), Command::Next);
        assert_eq!(command("/prev"), Command::Previous);
        assert_eq!(command("/previous"), Command::Previous);
        assert_eq!(command("/playlist"), Command::Playlist);
        assert_eq!(command("/current"), Command::Current);
        assert_eq!(command("/is_playing"), Command::IsPlaying);
    }

    #[test]
    fn test_bot_suffix_and_case() {
        assert_eq!(command("/Next@queue_bot"), Command::Next);
        assert_eq!(command("  /play@queue_bot 2  "), Command::Play(Some(2)));
    }

    #[test]
    fn test_add() {
        assert_eq!(
            command("/add https://youtu.be/abc"),
            Command::Add("https://youtu.be/abc".to_string())
        );
        assert_eq!(invalid("/add"), ValidationError::MissingArgument("url"));
    }

    #[test]
    fn test_play_arguments() {
        assert_eq!(command("/play"), Command::Play(None));
        assert_eq!(command("/play 0"), Command::Play(Some(0)));
        assert_eq!(invalid("/play two"), ValidationError::NotANumber("two".into()));
        assert_eq!(invalid("/play -1"), ValidationError::NotANumber("-1".into()));
    }

    #[test]
    fn test_volume_arguments() {
        assert_eq!(command("/volume 40"), Command::Volume(Volume::new(40).unwrap()));
        assert_eq!(invalid("/volume 150"), ValidationError::VolumeOutOfRange(150));
        assert_eq!(invalid("/volume -5"), ValidationError::VolumeOutOfRange(-5));
        assert_eq!(invalid("/volume loud"), ValidationError::NotANumber("loud".into()));
        assert_eq!(invalid("/volume"), ValidationError::MissingArgument("volume"));
        assert!(matches!(invalid("/volume 1 2"), ValidationError::NotANumber(_)));
    }

    #[test]
    fn test_unknown_and_text() {
        assert_eq!(Message::parse("/shuffle"), Message::Unknown("shuffle".into()));
        assert_eq!(Message::parse("hello there"), Message::Text("hello there".into()));
    }
}
