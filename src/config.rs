use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::PathBuf,
};

use crate::ipc::runtime;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// Horizontal fingertip displacement (pixels) that counts as a swipe.
    pub swipe_px: f32,
    /// How much farther than its middle joint a fingertip must sit from
    /// the hand centroid to count as extended.
    pub extend_ratio: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Speech-to-text command; stdout's first line is the transcript.
    /// Only honored when meta.allow_commands is set.
    pub transcriber_cmd: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpotifyAuth {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub spotify: SpotifyAuth,

    // accepts nested/dotted tables, flattened into "a.b" -> "value"
    #[serde(deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("wavectl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let landmarks = runtime::landmarks_path();
        let credentials_ok =
            crate::remote::Credentials::resolve(&self.profile.spotify).is_ok();
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "socket": runtime::socket_path(),
            "landmark_stream": landmarks,
            "landmark_stream_present": landmarks.exists(),
            "credentials_resolved": credentials_ok,
            "transcriber_configured": self.profile.voice.transcriber_cmd.is_some(),
            "hints": {
                "landmark_stream": "mkfifo the path above and point the hand tracker at it",
                "credentials": "set SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET / SPOTIFY_REFRESH_TOKEN or fill [spotify] in the profile"
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    if !(p.thresholds.swipe_px > 0.0) {
        return Err(anyhow!("thresholds.swipe_px must be positive pixels"));
    }
    if !(p.thresholds.extend_ratio > 1.0) {
        return Err(anyhow!("thresholds.extend_ratio must be greater than 1"));
    }

    for (k, v) in &p.bindings {
        if k.trim().is_empty() {
            return Err(anyhow!("empty binding key"));
        }
        if v.trim().is_empty() {
            return Err(anyhow!("binding '{}' has empty action", k));
        }

        let ok = v.starts_with("player:") || v.starts_with("cmd:");
        if !ok {
            return Err(anyhow!("binding '{}' has invalid action '{}'", k, v));
        }
        if v.starts_with("cmd:") && !p.meta.allow_commands {
            return Err(anyhow!(
                "binding '{}' uses cmd: but allow_commands=false",
                k
            ));
        }
    }

    if p.voice.transcriber_cmd.is_some() && !p.meta.allow_commands {
        return Err(anyhow!(
            "voice.transcriber_cmd is set but allow_commands=false"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Profile> {
        let profile: Profile = toml::from_str(text)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    #[test]
    fn test_default_profile_parses_and_validates() {
        let profile = parse(default_profile_text()).unwrap();
        assert_eq!(profile.thresholds.swipe_px, 50.0);
        assert_eq!(
            profile.bindings.get("toggle").map(String::as_str),
            Some("player:toggle")
        );
        assert_eq!(
            profile.bindings.get("swipe.right").map(String::as_str),
            Some("player:next")
        );
        assert_eq!(
            profile.bindings.get("swipe.left").map(String::as_str),
            Some("player:previous")
        );
    }

    #[test]
    fn test_unknown_action_prefix_rejected() {
        let err = parse(
            r#"
            [meta]
            name = "bad"
            [thresholds]
            swipe_px = 50.0
            extend_ratio = 1.15
            [bindings]
            toggle = "mouse:left"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid action"));
    }

    #[test]
    fn test_cmd_binding_requires_allow_commands() {
        let err = parse(
            r#"
            [meta]
            name = "bad"
            [thresholds]
            swipe_px = 50.0
            extend_ratio = 1.15
            [bindings]
            toggle = "cmd:playerctl play-pause"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("allow_commands"));
    }

    #[test]
    fn test_nonpositive_threshold_rejected() {
        let err = parse(
            r#"
            [meta]
            name = "bad"
            [thresholds]
            swipe_px = 0.0
            extend_ratio = 1.15
            [bindings]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("swipe_px"));
    }
}
