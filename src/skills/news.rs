use super::SkillError;
use serde::Deserialize;

const MAX_HEADLINES: usize = 3;

#[derive(Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    #[serde(default)]
    title: String,
}

/// Top Indian headlines in English from GNews.
pub(super) async fn headlines(client: &reqwest::Client, base_url: &str, api_key: &str) -> String {
    match fetch(client, base_url, api_key).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "news lookup failed");
            "News unavailable.".to_string()
        }
    }
}

async fn fetch(client: &reqwest::Client, base_url: &str, api_key: &str) -> Result<String, SkillError> {
    let body = client
        .get(format!("{}/top-headlines", base_url))
        .query(&[
            ("lang", "en"),
            ("country", "in"),
            ("max", "3"),
            ("apikey", api_key),
        ])
        .send()
        .await?
        .text()
        .await?;

    let parsed: HeadlinesResponse = serde_json::from_str(&body)?;
    Ok(render(&parsed.articles))
}

fn render(articles: &[Article]) -> String {
    let mut text = String::from("Top Headlines:\n");
    for article in articles.iter().take(MAX_HEADLINES) {
        text.push_str("- ");
        text.push_str(&article.title);
        text.push('\n');
    }
    text
}
