use super::SkillError;
use crate::intent_recognition::video_query;
use serde::Deserialize;

const YOUTUBE_HOME: &str = "https://www.youtube.com";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: VideoId,
}

#[derive(Deserialize)]
struct VideoId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

pub fn youtube_search_url(query: &str) -> String {
    format!("{}/results?search_query={}", YOUTUBE_HOME, urlencoding::encode(query))
}

/// Watch URL of the best YouTube match, falling back to the search results page.
pub(super) async fn link(client: &reqwest::Client, base_url: &str, api_key: &str, message: &str) -> String {
    let query = video_query(message);
    if query.is_empty() {
        return YOUTUBE_HOME.to_string();
    }

    match best_match(client, base_url, api_key, &query).await {
        Ok(Some(video_id)) => format!("https://youtube.com/watch?v={}", video_id),
        Ok(None) => youtube_search_url(&query),
        Err(e) => {
            tracing::warn!(error = %e, "video search failed");
            youtube_search_url(&query)
        }
    }
}

async fn best_match(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    query: &str,
) -> Result<Option<String>, SkillError> {
    let res = client
        .get(format!("{}/search", base_url))
        .query(&[
            ("part", "snippet"),
            ("type", "video"),
            ("maxResults", "1"),
            ("q", query),
            ("key", api_key),
        ])
        .send()
        .await?;

    if !res.status().is_success() {
        tracing::warn!(status = res.status().as_u16(), "video search API error");
        return Ok(None);
    }

    let parsed: SearchResponse = serde_json::from_str(&res.text().await?)?;
    Ok(parsed.items.into_iter().next().and_then(|item| item.id.video_id))
}
