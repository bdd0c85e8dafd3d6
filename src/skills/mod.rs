//! Skill adapters: one stateless call per external capability.
//!
//! Every adapter returns reply text. Upstream failures are folded into a short
//! human-readable string here and never reach the dispatcher as errors.

mod geocode;
mod news;
mod search;
mod video;
mod weather;

use crate::completion::CompletionClient;
use crate::config::{Config, Credentials, Endpoints};
use crate::conversation::Turn;
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use video::youtube_search_url;

/// Internal adapter failure, reported as a fallback literal at the trait boundary.
#[derive(Debug, Error)]
pub(crate) enum SkillError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload is missing {0}")]
    Missing(&'static str),
}

#[async_trait]
pub trait SkillAdapters: Send + Sync {
    async fn weather_by_coordinates(&self, lat: f64, lon: f64) -> String;

    async fn weather_by_city(&self, city: &str) -> String;

    /// Locality name for a coordinate pair, or "Unknown".
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> String;

    /// Up to three headlines, newline-joined.
    async fn news_headlines(&self) -> String;

    /// A playable URL for the request: best match, else a search results page.
    async fn video_link(&self, message: &str) -> String;

    async fn web_search_snippet(&self, query: &str) -> String;

    async fn describe_image(&self, text: Option<&str>, image: &str) -> String;

    async fn chat_completion(&self, system_prompt: &str, history: &[Turn], user_message: &str)
        -> String;
}

/// Skill adapters backed by the public HTTP APIs.
pub struct HttpSkills {
    client: reqwest::Client,
    credentials: Credentials,
    endpoints: Endpoints,
    completion: CompletionClient,
}

impl HttpSkills {
    pub fn new(config: &Config) -> AgentResult<Self> {
        let http = &config.settings.http;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .user_agent(concat!("deskmate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Config(format!("Could not build HTTP client: {}", e)))?;

        let mut endpoints = config.settings.endpoints.clone();
        for url in [
            &mut endpoints.weather,
            &mut endpoints.geocode,
            &mut endpoints.news,
            &mut endpoints.youtube,
            &mut endpoints.search,
        ] {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }

        Ok(Self {
            completion: CompletionClient::new(client.clone(), config),
            client,
            credentials: config.credentials.clone(),
            endpoints,
        })
    }

    fn key(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl SkillAdapters for HttpSkills {
    async fn weather_by_coordinates(&self, lat: f64, lon: f64) -> String {
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", Self::key(&self.credentials.weather_api_key).to_string()),
            ("units", "metric".to_string()),
        ];
        weather::fetch(&self.client, &self.endpoints.weather, &query)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "weather by coordinates failed");
                "Weather error.".to_string()
            })
    }

    async fn weather_by_city(&self, city: &str) -> String {
        let query = [
            ("q", city.to_string()),
            ("appid", Self::key(&self.credentials.weather_api_key).to_string()),
            ("units", "metric".to_string()),
        ];
        weather::fetch(&self.client, &self.endpoints.weather, &query)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, city, "weather by city failed");
                "City not found.".to_string()
            })
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> String {
        geocode::locality(&self.client, &self.endpoints.geocode, lat, lon).await
    }

    async fn news_headlines(&self) -> String {
        news::headlines(
            &self.client,
            &self.endpoints.news,
            Self::key(&self.credentials.gnews_api_key),
        )
        .await
    }

    async fn video_link(&self, message: &str) -> String {
        video::link(
            &self.client,
            &self.endpoints.youtube,
            Self::key(&self.credentials.youtube_api_key),
            message,
        )
        .await
    }

    async fn web_search_snippet(&self, query: &str) -> String {
        search::snippet(
            &self.client,
            &self.endpoints.search,
            Self::key(&self.credentials.google_api_key),
            Self::key(&self.credentials.search_engine_id),
            query,
        )
        .await
    }

    async fn describe_image(&self, text: Option<&str>, image: &str) -> String {
        self.completion.describe_image(text, image).await
    }

    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_message: &str,
    ) -> String {
        self.completion.chat(system_prompt, history, user_message).await
    }
}
