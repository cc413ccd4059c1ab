//! Resolves recognized events through the profile's bindings table and
//! issues the matching remote player calls.

use anyhow::{Result, anyhow};
use log::info;
use std::process::Command;

use crate::config::Profile;
use crate::gestures::{PlaybackMode, Swipe};
use crate::remote::{ItemKind, MediaControl, PlayTarget};
use crate::voice::VoiceCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TogglePlayback,
    SkipForward,
    SkipBack,
    PlayTrack(String),
    PlayAlbum(String),
}

impl From<Swipe> for PlayerEvent {
    fn from(swipe: Swipe) -> Self {
        match swipe {
            Swipe::Forward => PlayerEvent::SkipForward,
            Swipe::Back => PlayerEvent::SkipBack,
        }
    }
}

impl PlayerEvent {
    /// Unrecognized utterances map to no event at all; the caller logs
    /// and moves on.
    pub fn from_voice(cmd: VoiceCommand) -> Option<Self> {
        match cmd {
            VoiceCommand::PlayTrack(title) => Some(PlayerEvent::PlayTrack(title)),
            VoiceCommand::PlayAlbum(title) => Some(PlayerEvent::PlayAlbum(title)),
            VoiceCommand::Unrecognized => None,
        }
    }

    /// Gesture-derived events are rebindable; voice play commands are not.
    fn binding_key(&self) -> Option<&'static str> {
        match self {
            PlayerEvent::TogglePlayback => Some("toggle"),
            PlayerEvent::SkipForward => Some("swipe.right"),
            PlayerEvent::SkipBack => Some("swipe.left"),
            PlayerEvent::PlayTrack(_) | PlayerEvent::PlayAlbum(_) => None,
        }
    }
}

/// Returns the confirmed playback mode when the action was a toggle, so
/// the caller can refresh its advisory cache. Remote failures bubble up
/// without touching any recognition state.
pub fn dispatch_event(
    event: &PlayerEvent,
    profile: &Profile,
    remote: &dyn MediaControl,
) -> Result<Option<PlaybackMode>> {
    if let Some(key) = event.binding_key() {
        let action = profile.bindings.get(key).cloned().unwrap_or_default();
        if action.is_empty() {
            return Ok(None); // unbound gesture
        }
        return run_action(key, &action, profile, remote);
    }

    match event {
        PlayerEvent::PlayTrack(title) => play_by_name(title, ItemKind::Track, remote)?,
        PlayerEvent::PlayAlbum(title) => play_by_name(title, ItemKind::Album, remote)?,
        _ => unreachable!("gesture events resolve through bindings"),
    }
    Ok(None)
}

fn run_action(
    key: &str,
    action: &str,
    profile: &Profile,
    remote: &dyn MediaControl,
) -> Result<Option<PlaybackMode>> {
    if let Some(rest) = action.strip_prefix("player:") {
        return match rest.trim() {
            "toggle" => toggle_playback(remote).map(Some),
            "next" => {
                remote.next()?;
                Ok(None)
            }
            "previous" => {
                remote.previous()?;
                Ok(None)
            }
            other => Err(anyhow!("unknown player action for {key}: '{other}'")),
        };
    }
    if let Some(rest) = action.strip_prefix("cmd:") {
        if !profile.meta.allow_commands {
            return Err(anyhow!(
                "binding '{key}' uses cmd: but allow_commands=false"
            ));
        }
        Command::new("sh").arg("-c").arg(rest.trim()).spawn()?;
        return Ok(None);
    }
    Err(anyhow!("unknown action mapping for {key} -> '{action}'"))
}

/// Read-then-act: the remote player's actual state decides whether the
/// toggle pauses or resumes, because another client may have changed it
/// behind our back.
pub fn toggle_playback(remote: &dyn MediaControl) -> Result<PlaybackMode> {
    if remote.is_playing()? {
        remote.pause()?;
        Ok(PlaybackMode::Pause)
    } else {
        remote.resume(None)?;
        Ok(PlaybackMode::Play)
    }
}

/// Title resolution is the remote side's job; a miss is terminal and
/// reported, never retried here.
fn play_by_name(title: &str, kind: ItemKind, remote: &dyn MediaControl) -> Result<()> {
    match remote.search(title, kind)? {
        Some(item) => {
            let target = match kind {
                ItemKind::Track => PlayTarget::Track(item.uri),
                ItemKind::Album => PlayTarget::Context(item.uri),
            };
            info!("playing {kind} '{}'", item.name);
            remote.resume(Some(&target))?;
            Ok(())
        }
        None => Err(anyhow!("no {kind} found for '{title}'")),
    }
}
