//! Remote media-control service client (Spotify Web API).
//!
//! The pipeline talks to [`MediaControl`] only; this module also ships the
//! HTTP implementation plus a no-op fallback for running without
//! credentials.

use std::env;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::SpotifyAuth;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
// refresh slightly early so a token never expires mid-request
const TOKEN_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("missing credential: {0} (set it in the profile or the environment)")]
    MissingCredential(&'static str),
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected API response: {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Track,
    Album,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Track => "track",
            ItemKind::Album => "album",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub uri: String,
    pub name: String,
}

/// What a resume call should start playing. Tracks play as a one-item
/// queue, albums as a playback context.
#[derive(Debug, Clone)]
pub enum PlayTarget {
    Track(String),
    Context(String),
}

/// Narrow surface of the remote player consumed by the dispatcher. Every
/// call is a network round-trip that may fail; callers report failures and
/// keep their own state unchanged.
pub trait MediaControl {
    fn is_playing(&self) -> Result<bool, RemoteError>;
    fn resume(&self, target: Option<&PlayTarget>) -> Result<(), RemoteError>;
    fn pause(&self) -> Result<(), RemoteError>;
    fn next(&self) -> Result<(), RemoteError>;
    fn previous(&self) -> Result<(), RemoteError>;
    fn search(&self, name: &str, kind: ItemKind) -> Result<Option<Item>, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl Credentials {
    /// Profile values win; anything unset falls back to the environment
    /// (`SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`,
    /// `SPOTIFY_REFRESH_TOKEN`).
    pub fn resolve(auth: &SpotifyAuth) -> Result<Self, RemoteError> {
        let pick = |cfg: &Option<String>, var: &'static str| -> Result<String, RemoteError> {
            cfg.clone()
                .filter(|v| !v.is_empty())
                .or_else(|| env::var(var).ok().filter(|v| !v.is_empty()))
                .ok_or(RemoteError::MissingCredential(var))
        };
        Ok(Self {
            client_id: pick(&auth.client_id, "SPOTIFY_CLIENT_ID")?,
            client_secret: pick(&auth.client_secret, "SPOTIFY_CLIENT_SECRET")?,
            refresh_token: pick(&auth.refresh_token, "SPOTIFY_REFRESH_TOKEN")?,
        })
    }
}

#[derive(Debug)]
struct Token {
    access: String,
    expires_at: Instant,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

pub struct SpotifyRemote {
    http: Client,
    creds: Credentials,
    token: Mutex<Option<Token>>,
}

impl SpotifyRemote {
    pub fn new(creds: Credentials) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            creds,
            token: Mutex::new(None),
        })
    }

    /// Returns a cached access token, minting a fresh one from the refresh
    /// token when missing, stale, or when `force` is set (after a 401).
    fn access_token(&self, force: bool) -> Result<String, RemoteError> {
        let mut guard = self.token.lock().unwrap();
        if !force {
            if let Some(tok) = guard.as_ref() {
                if tok.expires_at > Instant::now() {
                    return Ok(tok.access.clone());
                }
            }
        }

        debug!("refreshing access token");
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &self.creds.refresh_token),
            ])
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(RemoteError::Auth(format!("{status}: {body}")));
        }
        let tr: TokenResponse = resp.json()?;
        let expires_at =
            Instant::now() + Duration::from_secs(tr.expires_in).saturating_sub(TOKEN_SLACK);
        let access = tr.access_token.clone();
        *guard = Some(Token {
            access: tr.access_token,
            expires_at,
        });
        Ok(access)
    }

    /// Sends a request with bearer auth, re-minting the token and retrying
    /// once if the API answers 401. Any other non-success status becomes
    /// `RemoteError::Api`.
    fn send(
        &self,
        build: impl Fn(&str) -> RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let token = self.access_token(false)?;
        let resp = build(&token).send()?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            let token = self.access_token(true)?;
            return check_status(build(&token).send()?);
        }
        check_status(resp)
    }
}

fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// Picks the single best match out of a search response, if any.
fn first_match(results: &serde_json::Value, kind: ItemKind) -> Option<Item> {
    let item = results
        .get(format!("{}s", kind.as_str()))?
        .get("items")?
        .as_array()?
        .first()?;
    Some(Item {
        uri: item.get("uri")?.as_str()?.to_string(),
        name: item.get("name")?.as_str()?.to_string(),
    })
}

impl MediaControl for SpotifyRemote {
    fn is_playing(&self) -> Result<bool, RemoteError> {
        let resp = self.send(|tok| self.http.get(format!("{API_BASE}/me/player")).bearer_auth(tok))?;
        // 204: no active playback session anywhere
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(false);
        }
        #[derive(Deserialize)]
        struct Playback {
            #[serde(default)]
            is_playing: bool,
        }
        let playback: Playback = resp.json()?;
        Ok(playback.is_playing)
    }

    fn resume(&self, target: Option<&PlayTarget>) -> Result<(), RemoteError> {
        let body = match target {
            None => json!({}),
            Some(PlayTarget::Track(uri)) => json!({ "uris": [uri] }),
            Some(PlayTarget::Context(uri)) => json!({ "context_uri": uri }),
        };
        self.send(|tok| {
            self.http
                .put(format!("{API_BASE}/me/player/play"))
                .bearer_auth(tok)
                .json(&body)
        })?;
        Ok(())
    }

    fn pause(&self) -> Result<(), RemoteError> {
        self.send(|tok| {
            self.http
                .put(format!("{API_BASE}/me/player/pause"))
                .bearer_auth(tok)
        })?;
        Ok(())
    }

    fn next(&self) -> Result<(), RemoteError> {
        self.send(|tok| {
            self.http
                .post(format!("{API_BASE}/me/player/next"))
                .bearer_auth(tok)
        })?;
        Ok(())
    }

    fn previous(&self) -> Result<(), RemoteError> {
        self.send(|tok| {
            self.http
                .post(format!("{API_BASE}/me/player/previous"))
                .bearer_auth(tok)
        })?;
        Ok(())
    }

    fn search(&self, name: &str, kind: ItemKind) -> Result<Option<Item>, RemoteError> {
        let resp = self.send(|tok| {
            self.http
                .get(format!("{API_BASE}/search"))
                .bearer_auth(tok)
                .query(&[
                    ("q", format!("{}:{name}", kind.as_str()).as_str()),
                    ("type", kind.as_str()),
                    ("limit", "1"),
                ])
        })?;
        let results: serde_json::Value = resp.json()?;
        Ok(first_match(&results, kind))
    }
}

/// Stand-in used when no credentials are configured: every command is a
/// logged no-op, so gesture and voice recognition stay exercisable.
pub struct NullRemote;

impl NullRemote {
    pub fn new() -> Self {
        warn!("remote control not configured; player commands are NO-OPs");
        Self
    }
}

impl MediaControl for NullRemote {
    fn is_playing(&self) -> Result<bool, RemoteError> {
        Ok(false)
    }
    fn resume(&self, _target: Option<&PlayTarget>) -> Result<(), RemoteError> {
        Ok(())
    }
    fn pause(&self) -> Result<(), RemoteError> {
        Ok(())
    }
    fn next(&self) -> Result<(), RemoteError> {
        Ok(())
    }
    fn previous(&self) -> Result<(), RemoteError> {
        Ok(())
    }
    fn search(&self, _name: &str, _kind: ItemKind) -> Result<Option<Item>, RemoteError> {
        Ok(None)
    }
}
