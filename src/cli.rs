use clap::{Parser, Subcommand};

use crate::types::{ImageQuality, ImageStyle, LogLevel, Orientation};

/// Keywords whose gallery captions are skipped by default.
pub const DEFAULT_SKIP_KEYWORDS: &[&str] = &["diagram", "spectrum", "chart", "comparison", "graphic"];

#[derive(Parser, Debug)]
#[command(
    name = "framefeed",
    version,
    about = "Rotate album photos, generated art and telescope imagery onto a picture frame"
)]
pub struct Cli {
    /// Directory holding the state database and temporary image files
    #[arg(long, env = "FRAMEFEED_STATE_DIR", default_value = "~/.framefeed", global = true)]
    pub state_dir: String,

    /// Display service account
    #[arg(long, env = "MEURAL_USERNAME", global = true)]
    pub meural_username: Option<String>,

    /// Display service password.
    /// WARNING: passing via --meural-password is visible in process listings.
    /// Prefer the MEURAL_PASSWORD environment variable instead.
    #[arg(long, env = "MEURAL_PASSWORD", hide_env_values = true, global = true)]
    pub meural_password: Option<String>,

    /// Playlist the frame shows
    #[arg(long, env = "MEURAL_PLAYLIST", default_value = "framefeed", global = true)]
    pub meural_playlist: String,

    /// Orientation used when the playlist has to be created
    #[arg(long, env = "MEURAL_ORIENTATION", value_enum, default_value = "portrait", global = true)]
    pub meural_orientation: Orientation,

    /// Photo album rotated by the album source
    #[arg(long, env = "FRAMEFEED_ALBUM_TITLE", default_value = "Frame", global = true)]
    pub album_title: String,

    /// Album generated images are archived to
    #[arg(long, env = "FRAMEFEED_GENERATED_ALBUM", global = true)]
    pub generated_album: Option<String>,

    /// Album scraped gallery images are archived to
    #[arg(long, env = "FRAMEFEED_SCRAPE_ALBUM", global = true)]
    pub scrape_album: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true)]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub google_client_secret: Option<String>,

    /// Long-lived OAuth refresh token for the photo library and calendar
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN", hide_env_values = true, global = true)]
    pub google_refresh_token: Option<String>,

    /// Calendar consulted for upcoming holidays
    #[arg(
        long,
        env = "FRAMEFEED_HOLIDAY_CALENDAR",
        default_value = crate::google::DEFAULT_HOLIDAY_CALENDAR,
        global = true
    )]
    pub holiday_calendar: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Baseline prompt for generated images
    #[arg(
        long,
        env = "OPENAI_PROMPT",
        default_value = "a painting of a quiet landscape",
        global = true
    )]
    pub openai_prompt: String,

    /// Account name the opaque end-user id is derived from
    #[arg(long, env = "OPENAI_USER", default_value = "framefeed", global = true)]
    pub openai_user: String,

    /// Skip gallery entries whose caption contains this keyword (repeatable)
    #[arg(long = "skip-keyword", global = true)]
    pub skip_keywords: Vec<String>,

    /// Largest full-resolution gallery asset to fetch, in megabytes
    #[arg(long, env = "FRAMEFEED_MAX_ASSET_MB", default_value_t = 100, global = true)]
    pub max_asset_mb: u64,

    /// External command applied before upload; `{input}` and `{output}` are substituted
    #[arg(long, env = "FRAMEFEED_TRANSFORM_COMMAND", global = true)]
    pub transform_command: Option<String>,

    /// External command applied before preview
    #[arg(long, env = "FRAMEFEED_PREVIEW_TRANSFORM_COMMAND", global = true)]
    pub preview_transform_command: Option<String>,

    /// HTTP timeout for service calls in seconds
    #[arg(long, env = "FRAMEFEED_HTTP_TIMEOUT", default_value_t = 120, global = true)]
    pub http_timeout: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the next item every interval until interrupted
    Run {
        /// Seconds between items
        #[arg(long, env = "FRAMEFEED_INTERVAL", default_value_t = 3600)]
        interval: u64,
    },
    /// Show the next item from the active source
    Next,
    /// Show the previous item from the active source
    Prev,
    /// Select the active source (0 album, 1-3 generated, 4 gallery) and show an item
    SetSource { ordinal: i64 },
    /// Print the active source ordinal
    GetSource,
    /// Rotate a different album and show its first item
    SetAlbum { title: String },
    /// Replace the generation prompt and show an item
    SetPrompt { prompt: String },
    /// Print the current generation prompt
    GetPrompt,
    SetStyle {
        #[arg(value_enum)]
        style: ImageStyle,
    },
    SetQuality {
        #[arg(value_enum)]
        quality: ImageQuality,
    },
    /// Print whether the frame is asleep
    Asleep,
    /// Put the frame to sleep
    Sleep,
    /// Wake the frame
    Wake,
    /// Overlay details about the current image
    ShowInfo,
    /// Hide the image details overlay
    HideInfo,
    /// Show an image from a URL or local path
    ShowUrl { url: String },
    /// Preview an image from a URL or local path without saving it
    PreviewUrl { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["framefeed", "next"]).unwrap();
        assert_eq!(cli.command, Command::Next);
        assert_eq!(cli.meural_playlist, "framefeed");
        assert_eq!(cli.meural_orientation, Orientation::Portrait);
        assert_eq!(cli.max_asset_mb, 100);
        assert!(cli.skip_keywords.is_empty());
    }

    #[test]
    fn test_parse_run_interval() {
        let cli = Cli::try_parse_from(["framefeed", "run", "--interval", "600"]).unwrap();
        assert_eq!(cli.command, Command::Run { interval: 600 });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "framefeed",
            "set-source",
            "4",
            "--skip-keyword",
            "diagram",
            "--skip-keyword",
            "chart",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::SetSource { ordinal: 4 });
        assert_eq!(cli.skip_keywords, vec!["diagram", "chart"]);
    }

    #[test]
    fn test_parse_style_and_quality() {
        let cli = Cli::try_parse_from(["framefeed", "set-style", "natural"]).unwrap();
        assert_eq!(
            cli.command,
            Command::SetStyle {
                style: ImageStyle::Natural
            }
        );
        let cli = Cli::try_parse_from(["framefeed", "set-quality", "standard"]).unwrap();
        assert_eq!(
            cli.command,
            Command::SetQuality {
                quality: ImageQuality::Standard
            }
        );
        assert!(Cli::try_parse_from(["framefeed", "set-style", "loud"]).is_err());
    }

    #[test]
    fn test_parse_info_commands() {
        let cli = Cli::try_parse_from(["framefeed", "show-info"]).unwrap();
        assert_eq!(cli.command, Command::ShowInfo);
        let cli = Cli::try_parse_from(["framefeed", "hide-info"]).unwrap();
        assert_eq!(cli.command, Command::HideInfo);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["framefeed"]).is_err());
    }
}
