use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{Cli, DEFAULT_SKIP_KEYWORDS};
use crate::google::GoogleCredentials;
use crate::meural::MeuralCredentials;
use crate::types::{LogLevel, Orientation};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Application configuration resolved from flags and environment.
pub struct Config {
    pub state_dir: PathBuf,
    pub meural: Option<MeuralCredentials>,
    pub playlist: String,
    pub orientation: Orientation,
    pub album_title: String,
    pub generated_album: Option<String>,
    pub scrape_album: Option<String>,
    pub google: Option<GoogleCredentials>,
    pub holiday_calendar: String,
    pub openai_api_key: Option<String>,
    pub openai_prompt: String,
    pub openai_user: String,
    pub skip_keywords: Vec<String>,
    pub max_asset_bytes: u64,
    pub transform_command: Option<String>,
    pub preview_transform_command: Option<String>,
    pub http_timeout: Duration,
    #[allow(dead_code)] // read from cli.log_level before the config exists
    pub log_level: LogLevel,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("state_dir", &self.state_dir)
            .field("meural", &self.meural)
            .field("playlist", &self.playlist)
            .field("album_title", &self.album_title)
            .field("google", &self.google)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("skip_keywords", &self.skip_keywords)
            .field("max_asset_bytes", &self.max_asset_bytes)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Blank strings count as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let meural = match (
            non_blank(cli.meural_username.clone()),
            non_blank(cli.meural_password.clone()),
        ) {
            (Some(username), Some(password)) => Some(MeuralCredentials { username, password }),
            (None, None) => None,
            _ => anyhow::bail!("--meural-username and --meural-password must be given together"),
        };

        let google = match (
            non_blank(cli.google_client_id.clone()),
            non_blank(cli.google_client_secret.clone()),
            non_blank(cli.google_refresh_token.clone()),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(GoogleCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "--google-client-id, --google-client-secret and --google-refresh-token must be given together"
            ),
        };

        let skip_keywords = if cli.skip_keywords.is_empty() {
            DEFAULT_SKIP_KEYWORDS.iter().map(|k| k.to_string()).collect()
        } else {
            cli.skip_keywords.clone()
        };

        if cli.http_timeout == 0 {
            anyhow::bail!("--http-timeout must be at least 1 second");
        }

        Ok(Self {
            state_dir: expand_tilde(&cli.state_dir),
            meural,
            playlist: cli.meural_playlist.clone(),
            orientation: cli.meural_orientation,
            album_title: cli.album_title.clone(),
            generated_album: non_blank(cli.generated_album.clone()),
            scrape_album: non_blank(cli.scrape_album.clone()),
            google,
            holiday_calendar: cli.holiday_calendar.clone(),
            openai_api_key: non_blank(cli.openai_api_key.clone()),
            openai_prompt: cli.openai_prompt.clone(),
            openai_user: cli.openai_user.clone(),
            skip_keywords,
            max_asset_bytes: cli.max_asset_mb.saturating_mul(BYTES_PER_MB),
            transform_command: non_blank(cli.transform_command.clone()),
            preview_transform_command: non_blank(cli.preview_transform_command.clone()),
            http_timeout: Duration::from_secs(cli.http_timeout),
            log_level: cli.log_level,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("state.db")
    }

    /// Held while an action touches the display.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("display.lock")
    }

    /// Downloaded and transformed images live here until delivered.
    pub fn work_dir(&self) -> PathBuf {
        self.state_dir.join("tmp")
    }
}
