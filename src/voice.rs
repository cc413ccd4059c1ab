//! Spoken-utterance grammar and the transcription boundary.

use std::process::Command;

use anyhow::{Result, anyhow};
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    PlayTrack(String),
    PlayAlbum(String),
    Unrecognized,
}

/// Maps one transcribed utterance to a command.
///
/// Grammar is token-based and case-insensitive: `play song <title…>` and
/// `play album <title…>`; title tokens are rejoined with single spaces.
/// Everything else, including empty input, is `Unrecognized`; malformed
/// speech is a no-op, never an error.
pub fn parse_utterance(text: &str) -> VoiceCommand {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    match tokens.as_slice() {
        ["play", "song", title @ ..] if !title.is_empty() => {
            VoiceCommand::PlayTrack(title.join(" "))
        }
        ["play", "album", title @ ..] if !title.is_empty() => {
            VoiceCommand::PlayAlbum(title.join(" "))
        }
        _ => {
            debug!("utterance not recognized: {text:?}");
            VoiceCommand::Unrecognized
        }
    }
}

/// Captures one utterance and returns its transcript. Implementations may
/// block for the duration of the capture; callers run them off the
/// gesture thread.
pub trait Transcriber {
    fn transcribe(&mut self) -> Result<String>;
}

/// Runs a user-configured speech-to-text command and takes the first line
/// it prints. The command string comes from the profile and is gated by
/// `meta.allow_commands`.
pub struct CommandTranscriber {
    command: String,
}

impl CommandTranscriber {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&mut self) -> Result<String> {
        let output = Command::new("sh").arg("-c").arg(&self.command).output()?;
        if !output.status.success() {
            return Err(anyhow!("transcriber exited with {}", output.status));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().next().unwrap_or("").trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_song() {
        assert_eq!(
            parse_utterance("play song bohemian rhapsody"),
            VoiceCommand::PlayTrack("bohemian rhapsody".into())
        );
    }

    #[test]
    fn test_play_album() {
        assert_eq!(
            parse_utterance("play album dark side of the moon"),
            VoiceCommand::PlayAlbum("dark side of the moon".into())
        );
    }

    #[test]
    fn test_case_and_whitespace_folding() {
        assert_eq!(
            parse_utterance("  Play   SONG  Hey Jude "),
            VoiceCommand::PlayTrack("hey jude".into())
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(parse_utterance("pause now"), VoiceCommand::Unrecognized);
        assert_eq!(parse_utterance(""), VoiceCommand::Unrecognized);
        assert_eq!(parse_utterance("play"), VoiceCommand::Unrecognized);
        assert_eq!(parse_utterance("play song"), VoiceCommand::Unrecognized);
        assert_eq!(
            parse_utterance("play playlist workout"),
            VoiceCommand::Unrecognized
        );
    }

    #[test]
    fn test_command_transcriber_first_line() {
        let mut t = CommandTranscriber::new("printf 'play song yellow\\nextra noise\\n'");
        assert_eq!(t.transcribe().unwrap(), "play song yellow");
    }

    #[test]
    fn test_command_transcriber_failure() {
        let mut t = CommandTranscriber::new("exit 3");
        assert!(t.transcribe().is_err());
    }
}
