//! Generated imagery from a persisted, optionally LLM-elaborated prompt.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ImageSource, PromptMode, SourceItem, SourceSelector};
use crate::capability::{CalendarProvider, GenerativeProvider, TextModel};
use crate::state::{keys, PersistedValue, StateStore};
use crate::types::{ImageQuality, ImageStyle};

pub const MAX_PROMPT_CHARS: usize = 1000;

/// Elaborations with fewer words than this are rejected as too plain.
const MIN_PROMPT_WORDS: usize = 6;

const ELABORATION_PREFIX: &str = "generate a random art prompt based on: ";

/// Trim, flatten newlines and bound the length of a prompt.
pub fn sanitize_prompt(raw: &str) -> String {
    let flattened = raw.trim().replace(['\r', '\n'], " ");
    flattened.chars().take(MAX_PROMPT_CHARS).collect()
}

pub struct GenerativeSource {
    provider: Arc<dyn GenerativeProvider>,
    calendar: Arc<dyn CalendarProvider>,
    baseline_prompt: String,
    prompt: PersistedValue,
    style: PersistedValue,
    quality: PersistedValue,
    mode: PromptMode,
    archive_album: Option<String>,
}

impl GenerativeSource {
    pub async fn new(
        provider: Arc<dyn GenerativeProvider>,
        calendar: Arc<dyn CalendarProvider>,
        store: Arc<dyn StateStore>,
        baseline_prompt: impl Into<String>,
        archive_album: Option<String>,
    ) -> Self {
        let prompt = PersistedValue::load(store.clone(), keys::LAST_PROMPT).await;
        if !prompt.is_blank() {
            tracing::info!(prompt = %prompt.get(), "Restored last prompt");
        }
        Self {
            provider,
            calendar,
            baseline_prompt: sanitize_prompt(&baseline_prompt.into()),
            prompt,
            style: PersistedValue::load(store.clone(), keys::IMAGE_STYLE).await,
            quality: PersistedValue::load(store, keys::IMAGE_QUALITY).await,
            mode: PromptMode::Verbatim,
            archive_album,
        }
    }

    /// The prompt the next generation starts from.
    pub fn prompt(&self) -> &str {
        if self.prompt.is_blank() {
            &self.baseline_prompt
        } else {
            self.prompt.get()
        }
    }

    pub async fn update_prompt(&mut self, prompt: &str) {
        let prompt = sanitize_prompt(prompt);
        tracing::info!(prompt = %prompt, "Prompt updated");
        self.prompt.set(&prompt).await;
    }

    pub fn style(&self) -> ImageStyle {
        ImageStyle::parse_or_default(self.style.get())
    }

    pub async fn set_style(&mut self, style: ImageStyle) {
        self.style.set(style.as_str()).await;
    }

    pub fn quality(&self) -> ImageQuality {
        ImageQuality::parse_or_default(self.quality.get())
    }

    pub async fn set_quality(&mut self, quality: ImageQuality) {
        self.quality.set(quality.as_str()).await;
    }

    fn is_acceptable(candidate: &str, current: &str) -> bool {
        candidate != current && candidate.split_whitespace().count() >= MIN_PROMPT_WORDS
    }

    /// Single-shot completion, retried once when the result is unusable.
    async fn elaborate_by_completion(&self, current: &str) -> Option<String> {
        let request = format!("{}{}", ELABORATION_PREFIX, current);
        for attempt in 1..=2 {
            match self.provider.complete_text(&request, TextModel::Instruct).await {
                Ok(text) => {
                    let candidate = sanitize_prompt(&text);
                    if Self::is_acceptable(&candidate, current) {
                        tracing::info!(prompt = %candidate, "New prompt generated");
                        return Some(candidate);
                    }
                    tracing::warn!(attempt, candidate = %candidate, "Generated prompt is not complex enough");
                }
                Err(e) => tracing::warn!(attempt, "Prompt completion failed: {:#}", e),
            }
        }
        tracing::warn!("No usable elaboration, keeping the current prompt");
        None
    }

    async fn elaborate_by_chat(&self, current: &str, model: TextModel) -> Option<String> {
        let request = format!("{}{}", ELABORATION_PREFIX, current);
        match self.provider.complete_text(&request, model).await {
            Ok(text) => {
                let candidate = sanitize_prompt(&text);
                if candidate.is_empty() {
                    tracing::warn!("Chat elaboration returned nothing, keeping the current prompt");
                    None
                } else {
                    tracing::info!(prompt = %candidate, "New prompt generated");
                    Some(candidate)
                }
            }
            Err(e) => {
                tracing::warn!("Chat elaboration failed: {:#}", e);
                None
            }
        }
    }

    async fn holiday_suffix(&self) -> String {
        match self.calendar.upcoming_holiday_text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read holiday calendar: {:#}", e);
                String::new()
            }
        }
    }

    /// Adopt prompt and image settings saved by another process since the last call.
    async fn refresh(&mut self) {
        self.prompt.reload().await;
        self.style.reload().await;
        self.quality.reload().await;
    }

    async fn generate_item(&mut self) -> Option<SourceItem> {
        self.refresh().await;
        let current = self.prompt().to_string();
        let elaborated = match self.mode {
            PromptMode::Verbatim => None,
            PromptMode::Completion => self.elaborate_by_completion(&current).await,
            PromptMode::Chat => self.elaborate_by_chat(&current, TextModel::Chat).await,
            PromptMode::ChatAdvanced => {
                self.elaborate_by_chat(&current, TextModel::ChatAdvanced)
                    .await
            }
        };
        let prompt = elaborated.unwrap_or(current);
        let full_prompt = format!("{}{}", prompt, self.holiday_suffix().await);

        tracing::info!(prompt = %full_prompt, style = self.style().as_str(), quality = self.quality().as_str(), "Requesting generated image");
        match self
            .provider
            .generate_image(&full_prompt, self.style(), self.quality())
            .await
        {
            Ok(url) => {
                self.update_prompt(&prompt).await;
                Some(
                    SourceItem::new(format!("{}.png", full_prompt), url)
                        .with_album(self.archive_album.clone()),
                )
            }
            Err(e) => {
                tracing::warn!(prompt = %full_prompt, "Image generation failed, reverting to baseline prompt: {:#}", e);
                let baseline = self.baseline_prompt.clone();
                self.prompt.set(&baseline).await;
                None
            }
        }
    }
}

#[async_trait]
impl ImageSource for GenerativeSource {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn next_item(&mut self) -> Option<SourceItem> {
        self.generate_item().await
    }

    async fn prev_item(&mut self) -> Option<SourceItem> {
        self.generate_item().await
    }

    fn select(&mut self, selector: SourceSelector) {
        if let SourceSelector::Generative(mode) = selector {
            self.mode = mode;
        }
    }
}
