//! Web and image search with an AI summary of the top hits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Role};
use crate::config::SearchConfig;
use crate::error::ChatError;
use crate::provider::{CompletionOptions, ProviderClient};
use crate::store::{ImageResult, SearchResult};
use crate::transport::HttpTransport;

const MAX_IMAGES: usize = 10;
const SUMMARY_SOURCES: usize = 5;
const SUMMARY_TEMPERATURE: f32 = 0.7;
const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes search results concisely.";
const DEFAULT_SUMMARY: &str = "Here are the search results:";
const NO_RESULTS_SUMMARY: &str = "No search results found for your query.";

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub images: Vec<ImageResult>,
    pub summary: String,
}

impl SearchResponse {
    /// Returned when no search API key is configured.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            results: vec![SearchResult {
                title: "Example Search Result".to_string(),
                link: "https://example.com".to_string(),
                snippet: "This is a placeholder result. Please configure SERPAPI_KEY in your environment variables."
                    .to_string(),
            }],
            images: Vec::new(),
            summary: "Search functionality requires SERPAPI_KEY to be configured.".to_string(),
        }
    }
}

#[derive(Deserialize, Default)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    #[serde(default)]
    images_results: Vec<SerpImage>,
}

#[derive(Deserialize)]
struct SerpOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct SerpImage {
    original: Option<String>,
    thumbnail: Option<String>,
    title: Option<String>,
}

impl SerpImage {
    fn into_image(self) -> Option<ImageResult> {
        let url = self
            .original
            .filter(|u| !u.is_empty())
            .or(self.thumbnail.filter(|u| !u.is_empty()))?;
        Some(ImageResult {
            url,
            title: self.title,
        })
    }
}

pub struct SearchClient {
    config: SearchConfig,
    transport: Arc<HttpTransport>,
}

impl SearchClient {
    #[must_use]
    pub fn new(config: SearchConfig, transport: Arc<HttpTransport>) -> Self {
        Self { config, transport }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.configured_key().is_some()
    }

    async fn query(&self, api_key: &str, params: &[(&str, &str)]) -> Result<SerpResponse, ChatError> {
        let mut query = vec![("api_key", api_key), ("engine", "google")];
        query.extend_from_slice(params);
        let response = self
            .transport
            .get_with_query(&self.config.base_url, &query)
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ChatError::Upstream {
                status,
                message: format!("Search provider returned {status}"),
            });
        }
        response.json().await.map_err(|err| ChatError::Upstream {
            status,
            message: format!("Invalid search response: {err}"),
        })
    }

    /// Run a search and summarise it with `provider`.
    ///
    /// Summary failures fall back to a fixed line; only search failures are errors.
    ///
    /// # Errors
    ///
    /// `ChatError::Transport` / `ChatError::Upstream` when either search query fails.
    pub async fn search(
        &self,
        provider: &ProviderClient,
        query: &str,
    ) -> Result<SearchResponse, ChatError> {
        let Some(api_key) = self.config.configured_key() else {
            tracing::debug!("search requested without an API key, returning placeholder");
            return Ok(SearchResponse::placeholder());
        };

        let web_params = [("q", query)];
        let image_params = [("q", query), ("tbm", "isch")];
        let (web, images) = tokio::try_join!(
            self.query(api_key, &web_params),
            self.query(api_key, &image_params),
        )?;

        let results: Vec<SearchResult> = web
            .organic_results
            .into_iter()
            .map(|hit| SearchResult {
                title: hit.title,
                link: hit.link,
                snippet: hit.snippet,
            })
            .collect();
        let images: Vec<ImageResult> = images
            .images_results
            .into_iter()
            .filter_map(SerpImage::into_image)
            .take(MAX_IMAGES)
            .collect();

        let summary = if results.is_empty() {
            NO_RESULTS_SUMMARY.to_string()
        } else {
            let options = CompletionOptions {
                temperature: SUMMARY_TEMPERATURE,
                max_tokens: Some(self.config.summary_max_tokens),
            };
            match provider.complete(&summary_messages(query, &results), options).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => DEFAULT_SUMMARY.to_string(),
                Err(err) => {
                    tracing::warn!(error = %err, "search summary failed, using default");
                    DEFAULT_SUMMARY.to_string()
                }
            }
        };

        Ok(SearchResponse {
            results,
            images,
            summary,
        })
    }
}

fn summary_messages(query: &str, results: &[SearchResult]) -> Vec<ChatMessage> {
    let listing = results
        .iter()
        .take(SUMMARY_SOURCES)
        .enumerate()
        .map(|(i, hit)| format!("{}. {}: {}", i + 1, hit.title, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        ChatMessage::new(Role::System, SUMMARY_SYSTEM_PROMPT),
        ChatMessage::new(
            Role::User,
            format!("Based on these search results for \"{query}\", provide a brief summary:\n\n{listing}"),
        ),
    ]
}
