//! framefeed: keeps a networked picture frame supplied with fresh images.
//!
//! Three sources feed the frame: a photo album walked with a durable cursor,
//! prompt-driven image generation, and a paginated telescope image gallery.
//! Every action is gated on the frame being awake, previews the image on the
//! device, then commits it to the frame's playlist.

#![warn(clippy::all)]

mod capability;
mod cli;
mod config;
mod delivery;
mod google;
mod meural;
mod openai;
mod retry;
mod scheduler;
mod shutdown;
mod source;
mod state;
#[cfg(test)]
mod testing;
mod types;
mod webb;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use capability::{
    AlbumProvider, CalendarProvider, DisplayDevice, GenerativeProvider, NoHolidays, Unconfigured,
};
use cli::Command;
use config::Config;
use delivery::{DeliveryConfig, DeliveryPipeline, ImageTransform};
use retry::retry_once;
use scheduler::{ActionResponse, Scheduler, Sources};
use source::album::AlbumCursorSource;
use source::generative::GenerativeSource;
use source::scraper::PaginatedScraperSource;
use source::SourceItem;
use state::{ActionLock, SqliteStateStore, StateStore};

/// Collaborators built from the configuration.
struct Services {
    device: Arc<dyn DisplayDevice>,
    albums: Arc<dyn AlbumProvider>,
    generator: Arc<dyn GenerativeProvider>,
    calendar: Arc<dyn CalendarProvider>,
    gallery: Arc<webb::WebbGallery>,
}

fn build_services(config: &Config) -> anyhow::Result<Services> {
    let device: Arc<dyn DisplayDevice> = match &config.meural {
        Some(credentials) => Arc::new(
            meural::MeuralClient::new(
                credentials.clone(),
                config.orientation,
                config.http_timeout,
            )
            .context("Failed to build display client")?,
        ),
        None => Arc::new(Unconfigured {
            setting: "--meural-username",
        }),
    };

    let http = Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let (albums, calendar): (Arc<dyn AlbumProvider>, Arc<dyn CalendarProvider>) =
        match &config.google {
            Some(credentials) => {
                let auth = Arc::new(google::GoogleAuth::new(http.clone(), credentials.clone()));
                (
                    Arc::new(google::GooglePhotos::new(http.clone(), auth.clone())),
                    Arc::new(google::GoogleCalendar::new(
                        http.clone(),
                        auth,
                        config.holiday_calendar.clone(),
                    )),
                )
            }
            None => (
                Arc::new(Unconfigured {
                    setting: "--google-refresh-token",
                }),
                Arc::new(NoHolidays),
            ),
        };

    let generator: Arc<dyn GenerativeProvider> = match &config.openai_api_key {
        Some(key) => Arc::new(
            openai::OpenAiClient::new(
                key.clone(),
                &config.openai_user,
                config.work_dir(),
                config.http_timeout,
            )
            .context("Failed to build image generation client")?,
        ),
        None => Arc::new(Unconfigured {
            setting: "--openai-api-key",
        }),
    };

    let gallery = Arc::new(webb::WebbGallery::new(http).context("Failed to build gallery client")?);

    Ok(Services {
        device,
        albums,
        generator,
        calendar,
        gallery,
    })
}

fn report(response: &ActionResponse) -> anyhow::Result<()> {
    match serde_json::to_string(response) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Cannot encode response: {}", e),
    }
    if response.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            response.reason.as_deref().unwrap_or("action failed")
        )
    }
}

/// An ad-hoc item: an existing local path or `file://` URL is used in place,
/// anything else is fetched.
fn adhoc_item(url: &str) -> SourceItem {
    let path = delivery::file::local_path(url).unwrap_or_else(|| PathBuf::from(url));
    if path.is_file() {
        SourceItem::from_local_file(path)
    } else {
        SourceItem::from_url(url)
    }
}

/// Run a power or overlay command directly against the display.
/// Returns `false` for commands that need the rotation machinery.
async fn device_command(device: &dyn DisplayDevice, command: &Command) -> anyhow::Result<bool> {
    let reset = || device.reset_session();
    match command {
        Command::Asleep => {
            let asleep = retry_once("sleep check", reset, || device.is_asleep()).await?;
            println!("{}", serde_json::json!({ "asleep": asleep }));
        }
        Command::Sleep => {
            retry_once("sleep", reset, || device.sleep()).await?;
            tracing::info!("Display put to sleep");
        }
        Command::Wake => {
            retry_once("wake", reset, || device.wake()).await?;
            tracing::info!("Display woken");
        }
        Command::ShowInfo => {
            retry_once("show info", reset, || device.show_info()).await?;
            tracing::info!("Display showing item info");
        }
        Command::HideInfo => {
            retry_once("hide info", reset, || device.hide_info()).await?;
            tracing::info!("Display info hidden");
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn run_loop(scheduler: &mut Scheduler, interval: u64) -> anyhow::Result<()> {
    if interval == 0 {
        anyhow::bail!("--interval must be at least 1 second");
    }
    let shutdown_token = shutdown::install_signal_handler()?;
    tracing::info!(interval, source = %scheduler.selector(), "Starting rotation");

    loop {
        if shutdown_token.is_cancelled() {
            break;
        }
        let response = scheduler.next_item().await;
        if !response.is_success() {
            tracing::warn!(
                reason = response.reason.as_deref().unwrap_or(""),
                "Rotation step failed"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = shutdown_token.cancelled() => {
                tracing::info!("Shutdown during wait, exiting...");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(&cli)?;
    tracing::debug!(?config, "Configuration resolved");

    tokio::fs::create_dir_all(config.work_dir())
        .await
        .with_context(|| format!("Failed to create {}", config.work_dir().display()))?;
    let sqlite = SqliteStateStore::open(&config.db_path())
        .await
        .context("Failed to open state database")?;
    tracing::debug!(path = %sqlite.path().display(), "State database ready");
    let store: Arc<dyn StateStore> = Arc::new(sqlite);

    let services = build_services(&config)?;

    if device_command(services.device.as_ref(), &cli.command).await? {
        return Ok(());
    }

    let mut album =
        AlbumCursorSource::new(services.albums.clone(), store.clone(), config.album_title.clone())
            .await;
    let mut generative = GenerativeSource::new(
        services.generator.clone(),
        services.calendar.clone(),
        store.clone(),
        config.openai_prompt.clone(),
        config.generated_album.clone(),
    )
    .await;
    let scraper = PaginatedScraperSource::new(
        services.gallery.clone(),
        store.clone(),
        &config.skip_keywords,
        config.max_asset_bytes,
        config.scrape_album.clone(),
    )
    .await;

    let lock = ActionLock::new(config.lock_path());
    tracing::debug!(path = %lock.path().display(), "Display actions serialised through lock file");

    // Settings that only touch one source are applied under the display lock,
    // before the sources are handed over.
    let settings_guard = match &cli.command {
        Command::SetStyle { .. }
        | Command::SetQuality { .. }
        | Command::SetAlbum { .. }
        | Command::SetPrompt { .. } => Some(lock.acquire().await?),
        _ => None,
    };
    match &cli.command {
        Command::GetPrompt => {
            println!("{}", generative.prompt());
            return Ok(());
        }
        Command::SetStyle { style } => {
            generative.set_style(*style).await;
            tracing::info!(style = style.as_str(), "Image style saved");
            return Ok(());
        }
        Command::SetQuality { quality } => {
            generative.set_quality(*quality).await;
            tracing::info!(quality = quality.as_str(), "Image quality saved");
            return Ok(());
        }
        Command::SetAlbum { title } => album.change_album(title).await,
        Command::SetPrompt { prompt } => generative.update_prompt(prompt).await,
        _ => {}
    }
    drop(settings_guard);

    let pipeline = DeliveryPipeline::new(
        services.device.clone(),
        services.albums.clone(),
        DeliveryConfig {
            playlist: config.playlist.clone(),
            work_dir: config.work_dir(),
            transform: ImageTransform::new(config.transform_command.clone()),
            preview_transform: ImageTransform::new(config.preview_transform_command.clone()),
        },
    )?;
    let sources = Sources {
        album: Box::new(album),
        generative: Box::new(generative),
        scraper: Box::new(scraper),
    };
    let mut scheduler = Scheduler::new(sources, store, services.device, pipeline, lock).await;

    match cli.command {
        Command::Run { interval } => run_loop(&mut scheduler, interval).await,
        Command::Next | Command::SetPrompt { .. } => report(&scheduler.next_item().await),
        Command::Prev => report(&scheduler.prev_item().await),
        Command::SetSource { ordinal } => {
            scheduler.change_source(ordinal).await;
            report(&scheduler.next_item().await)
        }
        Command::GetSource => {
            println!("{}", scheduler.get_source().await);
            Ok(())
        }
        Command::SetAlbum { .. } => {
            scheduler.change_source(0).await;
            report(&scheduler.next_item().await)
        }
        Command::ShowUrl { url } => report(&scheduler.show_item(adhoc_item(&url)).await),
        Command::PreviewUrl { url } => {
            let mut item = adhoc_item(&url);
            scheduler
                .pipeline()
                .preview(&mut item)
                .await
                .with_context(|| format!("Failed to preview {}", url))?;
            report(&ActionResponse::pass())
        }
        Command::GetPrompt
        | Command::SetStyle { .. }
        | Command::SetQuality { .. }
        | Command::Asleep
        | Command::Sleep
        | Command::Wake
        | Command::ShowInfo
        | Command::HideInfo => Ok(()),
    }
}
