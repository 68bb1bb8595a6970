use std::{
    fs,
    path::{Path, PathBuf},
};

use reel_shared::domain::ShareData;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{engagement::DEFAULT_LIKE_SEED, share::ShareFallback};

pub const DEFAULT_CONFIG_FILE: &str = "reel.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_url: Option<String>,
    pub store_api_key: Option<String>,
    pub comments_table: String,
    pub video_path: String,
    pub audio_path: Option<String>,
    pub like_seed: u32,
    pub share_url: String,
    pub share_title: String,
    pub share_text: String,
    pub share_fallback: ShareFallback,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            store_api_key: None,
            comments_table: "comments".into(),
            video_path: "/wedding-invitation-video.mp4".into(),
            audio_path: None,
            like_seed: DEFAULT_LIKE_SEED,
            share_url: "http://localhost:8080/".into(),
            share_title: "Join Us On Our Wedding Day!".into(),
            share_text: "Join us as we celebrate our love and begin our journey together! 💍✨"
                .into(),
            share_fallback: ShareFallback::Messaging,
        }
    }
}

impl Settings {
    pub fn share_data(&self) -> ShareData {
        ShareData {
            title: self.share_title.clone(),
            text: self.share_text.clone(),
            url: self.share_url.clone(),
        }
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.store_url {
            self.store_url = Some(v);
        }
        if let Some(v) = file.store_api_key {
            self.store_api_key = Some(v);
        }
        if let Some(v) = file.comments_table {
            self.comments_table = v;
        }
        if let Some(v) = file.video_path {
            self.video_path = v;
        }
        if let Some(v) = file.audio_path {
            self.audio_path = Some(v);
        }
        if let Some(v) = file.like_seed {
            self.like_seed = v;
        }
        if let Some(v) = file.share_url {
            self.share_url = v;
        }
        if let Some(v) = file.share_title {
            self.share_title = v;
        }
        if let Some(v) = file.share_text {
            self.share_text = v;
        }
        if let Some(v) = file.share_fallback {
            self.share_fallback = v;
        }
    }

    /// Overlays environment values. `REEL_<NAME>` is read first, then
    /// `APP__<NAME>`, so the latter wins when both are set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("APP__{name}")).or_else(|| lookup(&format!("REEL_{name}")))
        };

        if let Some(v) = var("STORE_URL") {
            self.store_url = Some(v);
        }
        if let Some(v) = var("STORE_API_KEY") {
            self.store_api_key = Some(v);
        }
        if let Some(v) = var("COMMENTS_TABLE") {
            self.comments_table = v;
        }
        if let Some(v) = var("VIDEO_PATH") {
            self.video_path = v;
        }
        if let Some(v) = var("AUDIO_PATH") {
            self.audio_path = Some(v);
        }
        if let Some(v) = var("LIKE_SEED") {
            match v.parse::<u32>() {
                Ok(parsed) => self.like_seed = parsed,
                Err(err) => warn!(value = %v, %err, "config: ignoring invalid like seed"),
            }
        }
        if let Some(v) = var("SHARE_URL") {
            self.share_url = v;
        }
        if let Some(v) = var("SHARE_FALLBACK") {
            match v.parse::<ShareFallback>() {
                Ok(parsed) => self.share_fallback = parsed,
                Err(err) => warn!(%err, "config: ignoring share fallback"),
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    store_url: Option<String>,
    store_api_key: Option<String>,
    comments_table: Option<String>,
    video_path: Option<String>,
    audio_path: Option<String>,
    like_seed: Option<u32>,
    share_url: Option<String>,
    share_title: Option<String>,
    share_text: Option<String>,
    share_fallback: Option<ShareFallback>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Defaults, then the toml file at `path` if it exists, then the process
/// environment.
pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<FileSettings>(&raw) {
            Ok(file) => {
                debug!(path = %path.display(), "config: file loaded");
                settings.apply_file(file);
            }
            Err(err) => warn!(path = %path.display(), %err, "config: ignoring unreadable file"),
        },
        Err(_) => debug!(path = %path.display(), "config: no file, using defaults"),
    }

    settings.apply_env(|name| std::env::var(name).ok());
    settings
}

/// Location of the config file named by `REEL_CONFIG`, falling back to
/// `reel.toml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var("REEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}
