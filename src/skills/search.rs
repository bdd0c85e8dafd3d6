use super::SkillError;
use serde::Deserialize;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    snippet: String,
}

/// First result snippet from Google Custom Search.
pub(super) async fn snippet(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    engine_id: &str,
    query: &str,
) -> String {
    match first_snippet(client, base_url, api_key, engine_id, query).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "web search failed");
            "Search unavailable.".to_string()
        }
    }
}

async fn first_snippet(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    engine_id: &str,
    query: &str,
) -> Result<String, SkillError> {
    let body = client
        .get(base_url)
        .query(&[("key", api_key), ("cx", engine_id), ("q", query), ("num", "1")])
        .send()
        .await?
        .text()
        .await?;

    let parsed: SearchResponse = serde_json::from_str(&body)?;
    parsed
        .items
        .into_iter()
        .map(|item| item.snippet)
        .find(|s| !s.trim().is_empty())
        .ok_or(SkillError::Missing("search results"))
}
